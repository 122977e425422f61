use super::components::Component;

/// Local binary grid around one component, padded by one pixel so the
/// neighbourhood lookups never leave the buffer.
struct Grid {
    w: usize,
    h: usize,
    ox: usize,
    oy: usize,
    cells: Vec<bool>,
}

impl Grid {
    fn from_component(c: &Component) -> Self {
        let w = c.width() + 2;
        let h = c.height() + 2;
        let mut cells = vec![false; w * h];
        for &(x, y) in &c.pixels {
            cells[(y - c.min_y + 1) * w + (x - c.min_x + 1)] = true;
        }
        Self {
            w,
            h,
            ox: c.min_x,
            oy: c.min_y,
            cells,
        }
    }

    #[inline(always)]
    fn at(&self, x: usize, y: usize) -> bool {
        self.cells[y * self.w + x]
    }

    /// P2..P9, clockwise from north.
    fn ring(&self, x: usize, y: usize) -> [bool; 8] {
        [
            self.at(x, y - 1),
            self.at(x + 1, y - 1),
            self.at(x + 1, y),
            self.at(x + 1, y + 1),
            self.at(x, y + 1),
            self.at(x - 1, y + 1),
            self.at(x - 1, y),
            self.at(x - 1, y - 1),
        ]
    }

    fn to_image_coords(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for y in 1..self.h - 1 {
            for x in 1..self.w - 1 {
                if self.at(x, y) {
                    out.push((x - 1 + self.ox, y - 1 + self.oy));
                }
            }
        }
        out
    }
}

/// Zhang–Suen thinning of a single component. May return an empty set for
/// blobs only two pixels thick.
pub fn thin(c: &Component) -> Vec<(usize, usize)> {
    let mut grid = Grid::from_component(c);
    loop {
        let mut changed = false;
        for step in 0..2 {
            let mut remove = Vec::new();
            for y in 1..grid.h - 1 {
                for x in 1..grid.w - 1 {
                    if !grid.at(x, y) {
                        continue;
                    }
                    let p = grid.ring(x, y);
                    let b = p.iter().filter(|&&v| v).count();
                    if !(2..=6).contains(&b) {
                        continue;
                    }
                    let a = (0..8).filter(|&i| !p[i] && p[(i + 1) % 8]).count();
                    if a != 1 {
                        continue;
                    }
                    let (p2, p4, p6, p8) = (p[0], p[2], p[4], p[6]);
                    let ok = if step == 0 {
                        !(p2 && p4 && p6) && !(p4 && p6 && p8)
                    } else {
                        !(p2 && p4 && p8) && !(p2 && p6 && p8)
                    };
                    if ok {
                        remove.push(y * grid.w + x);
                    }
                }
            }
            if !remove.is_empty() {
                changed = true;
                for i in remove {
                    grid.cells[i] = false;
                }
            }
        }
        if !changed {
            break;
        }
    }
    grid.to_image_coords()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(x0: usize, x1: usize, y0: usize, y1: usize) -> Component {
        let mut pixels = Vec::new();
        for y in y0..=y1 {
            for x in x0..=x1 {
                pixels.push((x, y));
            }
        }
        Component {
            pixels,
            min_x: x0,
            min_y: y0,
            max_x: x1,
            max_y: y1,
        }
    }

    #[test]
    fn test_thin_bar_to_line() {
        let c = bar(10, 40, 5, 11);
        let skel = thin(&c);
        assert!(!skel.is_empty());
        assert!(skel.len() < c.area() / 3);
        let min_x = skel.iter().map(|p| p.0).min().unwrap();
        let max_x = skel.iter().map(|p| p.0).max().unwrap();
        assert!(max_x - min_x >= 20);
    }
}
