use crate::cancel::CancelSignal;
use crate::error::ExtractionError;
use crate::raster::InkMask;
use std::collections::VecDeque;

/// An 8-connected blob of ink pixels.
#[derive(Debug, Clone)]
pub struct Component {
    pub pixels: Vec<(usize, usize)>,
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl Component {
    pub fn area(&self) -> usize {
        self.pixels.len()
    }

    pub fn width(&self) -> usize {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> usize {
        self.max_y - self.min_y + 1
    }
}

pub(crate) const NEIGHBORS_8: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Labels components in raster order of their first pixel, so the output
/// order is fully determined by the mask.
pub fn label_components(
    mask: &InkMask,
    cancel: &dyn CancelSignal,
) -> Result<Vec<Component>, ExtractionError> {
    let (w, h) = (mask.width, mask.height);
    let mut seen = vec![false; w * h];
    let mut out = Vec::new();
    let mut queue = VecDeque::new();

    for y in 0..h {
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }
        for x in 0..w {
            let i = y * w + x;
            if !mask.ink[i] || seen[i] {
                continue;
            }

            seen[i] = true;
            queue.push_back((x, y));
            let mut comp = Component {
                pixels: Vec::new(),
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            };

            while let Some((cx, cy)) = queue.pop_front() {
                comp.pixels.push((cx, cy));
                comp.min_x = comp.min_x.min(cx);
                comp.min_y = comp.min_y.min(cy);
                comp.max_x = comp.max_x.max(cx);
                comp.max_y = comp.max_y.max(cy);

                for (dx, dy) in NEIGHBORS_8 {
                    let nx = cx as isize + dx;
                    let ny = cy as isize + dy;
                    if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                        continue;
                    }
                    let ni = ny as usize * w + nx as usize;
                    if mask.ink[ni] && !seen[ni] {
                        seen[ni] = true;
                        queue.push_back((nx as usize, ny as usize));
                    }
                }
            }

            comp.pixels.sort_by_key(|&(px, py)| (py, px));
            out.push(comp);
        }
    }

    Ok(out)
}
