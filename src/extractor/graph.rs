use super::components::NEIGHBORS_8;
use std::collections::{HashMap, HashSet};

pub type Pixel = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Skeleton pixel with a single neighbour (or none).
    End,
    /// Cluster of pixels with three or more neighbours.
    Junction,
    /// Arbitrary point picked to open a ring with no other nodes.
    Anchor,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub pixels: Vec<Pixel>,
}

impl Node {
    pub fn center(&self) -> (f64, f64) {
        let n = self.pixels.len().max(1) as f64;
        let (sx, sy) = self
            .pixels
            .iter()
            .fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x as f64, ay + y as f64));
        (sx / n, sy / n)
    }
}

/// Pixel path between two nodes. `path[0]` lies in `ends[0]`, the last
/// pixel in `ends[1]`.
#[derive(Debug, Clone)]
pub struct Edge {
    pub path: Vec<Pixel>,
    pub ends: [usize; 2],
}

/// A run of edges joined through junctions, as one pixel path.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub pixels: Vec<Pixel>,
    pub closed: bool,
}

/// Node/edge view of a one-pixel-wide skeleton.
#[derive(Debug, Clone)]
pub struct SkeletonGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

struct PixelIndex {
    pixels: Vec<Pixel>,
    lookup: HashMap<Pixel, usize>,
}

impl PixelIndex {
    fn new(skeleton: &[Pixel]) -> Self {
        let mut pixels = skeleton.to_vec();
        pixels.sort_by_key(|&(x, y)| (y, x));
        pixels.dedup();
        let lookup = pixels.iter().enumerate().map(|(i, &p)| (p, i)).collect();
        Self { pixels, lookup }
    }

    fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        let (x, y) = self.pixels[i];
        NEIGHBORS_8.iter().filter_map(move |(dx, dy)| {
            let nx = x as isize + dx;
            let ny = y as isize + dy;
            if nx < 0 || ny < 0 {
                return None;
            }
            self.lookup.get(&(nx as usize, ny as usize)).copied()
        })
    }
}

impl SkeletonGraph {
    pub fn build(skeleton: &[Pixel]) -> Self {
        let idx = PixelIndex::new(skeleton);
        let n = idx.pixels.len();
        let degree: Vec<usize> = (0..n).map(|i| idx.neighbors(i).count()).collect();

        let mut nodes: Vec<Node> = Vec::new();
        let mut node_of: Vec<Option<usize>> = vec![None; n];

        // Junction pixels that touch form one node
        for i in 0..n {
            if node_of[i].is_some() || degree[i] == 2 {
                continue;
            }
            let id = nodes.len();
            if degree[i] < 2 {
                node_of[i] = Some(id);
                nodes.push(Node {
                    kind: NodeKind::End,
                    pixels: vec![idx.pixels[i]],
                });
                continue;
            }
            let mut members = vec![i];
            node_of[i] = Some(id);
            let mut k = 0;
            while k < members.len() {
                let cur = members[k];
                k += 1;
                for j in idx.neighbors(cur) {
                    if node_of[j].is_none() && degree[j] > 2 {
                        node_of[j] = Some(id);
                        members.push(j);
                    }
                }
            }
            nodes.push(Node {
                kind: NodeKind::Junction,
                pixels: members.iter().map(|&m| idx.pixels[m]).collect(),
            });
        }

        let mut visited = vec![false; n];
        let mut edges = Vec::new();
        let mut direct: HashSet<(usize, usize)> = HashSet::new();

        let mut node_id = 0;
        loop {
            while node_id < nodes.len() {
                trace_from(
                    node_id,
                    &idx,
                    &nodes,
                    &node_of,
                    &mut visited,
                    &mut direct,
                    &mut edges,
                );
                node_id += 1;
            }
            // Rings with no node on them
            let ring = (0..n).find(|&i| node_of[i].is_none() && !visited[i]);
            match ring {
                Some(i) => {
                    node_of[i] = Some(nodes.len());
                    visited[i] = true;
                    nodes.push(Node {
                        kind: NodeKind::Anchor,
                        pixels: vec![idx.pixels[i]],
                    });
                }
                None => break,
            }
        }

        Self { nodes, edges }
    }

    /// Number of edge ends at each node.
    pub fn valence(&self) -> Vec<usize> {
        let mut v = vec![0; self.nodes.len()];
        for e in &self.edges {
            v[e.ends[0]] += 1;
            v[e.ends[1]] += 1;
        }
        v
    }

    /// Fuses junctions joined by an edge of at most `max_len` pixels (a
    /// crossing thinned into two forks), then removes dangling spurs shorter
    /// than `spur_len`.
    pub fn simplify(&mut self, max_len: usize, spur_len: usize) {
        let mut parent: Vec<usize> = (0..self.nodes.len()).collect();
        fn root(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        let mut keep = vec![true; self.edges.len()];
        for (ei, e) in self.edges.iter().enumerate() {
            let [a, b] = e.ends;
            let both_junctions = self.nodes[a].kind == NodeKind::Junction
                && self.nodes[b].kind == NodeKind::Junction;
            if both_junctions && e.path.len() <= max_len {
                let ra = root(&mut parent, a);
                let rb = root(&mut parent, b);
                if ra != rb {
                    parent[rb] = ra;
                }
                keep[ei] = false;
            }
        }
        for i in 0..self.nodes.len() {
            let r = root(&mut parent, i);
            if r != i {
                let moved = std::mem::take(&mut self.nodes[i].pixels);
                self.nodes[r].pixels.extend(moved);
            }
        }
        let mut edges = Vec::with_capacity(self.edges.len());
        for (e, k) in self.edges.drain(..).zip(keep) {
            if k {
                let ends = [root(&mut parent, e.ends[0]), root(&mut parent, e.ends[1])];
                edges.push(Edge { path: e.path, ends });
            }
        }
        self.edges = edges;

        let valence = self.valence();
        self.edges.retain(|e| {
            let [a, b] = e.ends;
            let spur = |end: usize, other: usize| {
                self.nodes[end].kind == NodeKind::End
                    && self.nodes[other].kind == NodeKind::Junction
                    && valence[other] >= 3
            };
            !((spur(a, b) || spur(b, a)) && e.path.len() < spur_len)
        });
    }

    /// Joins edges through nodes into chains. At every node the two ends
    /// that continue most straight are paired, as long as they bend less
    /// than 60°; a node with exactly two ends always joins them.
    pub fn chains(&self, reach: usize) -> Vec<Chain> {
        let mut at_node: Vec<Vec<(usize, usize)>> = vec![Vec::new(); self.nodes.len()];
        for (ei, e) in self.edges.iter().enumerate() {
            at_node[e.ends[0]].push((ei, 0));
            at_node[e.ends[1]].push((ei, 1));
        }

        let mut pair: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
        for (ni, ends) in at_node.iter().enumerate() {
            if ends.len() < 2 {
                continue;
            }
            let c = self.nodes[ni].center();
            let dirs: Vec<(f64, f64)> = ends
                .iter()
                .map(|&(ei, side)| self.leaving_direction(ei, side, c, reach))
                .collect();

            if ends.len() == 2 {
                pair.insert(ends[0], ends[1]);
                pair.insert(ends[1], ends[0]);
                continue;
            }

            let mut cands = Vec::new();
            for a in 0..ends.len() {
                for b in a + 1..ends.len() {
                    let dot = dirs[a].0 * dirs[b].0 + dirs[a].1 * dirs[b].1;
                    cands.push((dot, a, b));
                }
            }
            cands.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2)));
            let mut used = vec![false; ends.len()];
            for (dot, a, b) in cands {
                if dot > -0.5 {
                    break;
                }
                if !used[a] && !used[b] {
                    used[a] = true;
                    used[b] = true;
                    pair.insert(ends[a], ends[b]);
                    pair.insert(ends[b], ends[a]);
                }
            }
        }

        let mut done = vec![false; self.edges.len()];
        let mut out = Vec::new();

        // Open chains start at an unpaired end
        for (ei, _) in self.edges.iter().enumerate() {
            for side in 0..2 {
                if done[ei] || pair.contains_key(&(ei, side)) {
                    continue;
                }
                out.push(self.walk(ei, side, &pair, &mut done));
            }
        }
        // Whatever is left is a ring
        for ei in 0..self.edges.len() {
            if !done[ei] {
                out.push(self.walk(ei, 0, &pair, &mut done));
            }
        }
        out
    }

    fn leaving_direction(&self, ei: usize, side: usize, c: (f64, f64), reach: usize) -> (f64, f64) {
        let path = &self.edges[ei].path;
        let k = reach.min(path.len().saturating_sub(1));
        let p = if side == 0 {
            path[k]
        } else {
            path[path.len() - 1 - k]
        };
        let dx = p.0 as f64 - c.0;
        let dy = p.1 as f64 - c.1;
        let len = dx.hypot(dy);
        if len > f64::EPSILON {
            (dx / len, dy / len)
        } else {
            (0.0, 0.0)
        }
    }

    fn walk(
        &self,
        start: usize,
        enter: usize,
        pair: &HashMap<(usize, usize), (usize, usize)>,
        done: &mut [bool],
    ) -> Chain {
        let mut pixels: Vec<Pixel> = Vec::new();
        let (mut ei, mut side) = (start, enter);
        let mut closed = false;
        loop {
            done[ei] = true;
            let path = &self.edges[ei].path;
            let oriented: Box<dyn Iterator<Item = &Pixel>> = if side == 0 {
                Box::new(path.iter())
            } else {
                Box::new(path.iter().rev())
            };
            for &p in oriented {
                if pixels.last() != Some(&p) {
                    pixels.push(p);
                }
            }
            match pair.get(&(ei, 1 - side)) {
                Some(&(next, next_side)) if !done[next] => {
                    ei = next;
                    side = next_side;
                }
                Some(&(next, next_side)) => {
                    closed = next == start && next_side == enter;
                    break;
                }
                None => break,
            }
        }
        Chain { pixels, closed }
    }
}

fn trace_from(
    node: usize,
    idx: &PixelIndex,
    nodes: &[Node],
    node_of: &[Option<usize>],
    visited: &mut [bool],
    direct: &mut HashSet<(usize, usize)>,
    edges: &mut Vec<Edge>,
) {
    for &start_px in &nodes[node].pixels {
        let Some(&s) = idx.lookup.get(&start_px) else {
            continue;
        };
        let starts: Vec<usize> = idx.neighbors(s).collect();
        for first in starts {
            match node_of[first] {
                Some(other) if other == node => {}
                Some(other) => {
                    // Two nodes touching directly
                    let key = (node.min(other), node.max(other));
                    if direct.insert(key) {
                        edges.push(Edge {
                            path: vec![start_px, idx.pixels[first]],
                            ends: [node, other],
                        });
                    }
                }
                None if visited[first] => {}
                None => {
                    visited[first] = true;
                    let mut path = vec![start_px, idx.pixels[first]];
                    let (mut prev, mut cur) = (s, first);
                    let end = loop {
                        let next = idx.neighbors(cur).find(|&j| {
                            j != prev && (node_of[j].is_some() || !visited[j])
                        });
                        match next {
                            Some(j) => {
                                path.push(idx.pixels[j]);
                                if let Some(other) = node_of[j] {
                                    break Some(other);
                                }
                                visited[j] = true;
                                prev = cur;
                                cur = j;
                            }
                            None => break None,
                        }
                    };
                    let end = end.unwrap_or(node);
                    // A pixel bridging two pixels of the same junction
                    if end == node && nodes[node].kind == NodeKind::Junction && path.len() <= 4 {
                        continue;
                    }
                    edges.push(Edge {
                        path,
                        ends: [node, end],
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(x0: usize, y0: usize, x1: usize, y1: usize) -> Vec<Pixel> {
        let mut v = Vec::new();
        if y0 == y1 {
            for x in x0.min(x1)..=x0.max(x1) {
                v.push((x, y0));
            }
        } else {
            for y in y0.min(y1)..=y0.max(y1) {
                v.push((x0, y));
            }
        }
        v
    }

    #[test]
    fn test_plus_sign_gives_two_chains() {
        let mut px = line(0, 10, 20, 10);
        px.extend(line(10, 0, 10, 20));
        let mut g = SkeletonGraph::build(&px);
        g.simplify(4, 3);
        let chains = g.chains(5);
        assert_eq!(chains.len(), 2);
        for c in &chains {
            assert!(!c.closed);
            assert!(c.pixels.len() >= 19);
        }
    }

    #[test]
    fn test_t_junction_keeps_stem_separate() {
        let mut px = line(0, 0, 20, 0);
        px.extend(line(10, 1, 10, 15));
        let mut g = SkeletonGraph::build(&px);
        g.simplify(4, 3);
        let chains = g.chains(5);
        assert_eq!(chains.len(), 2);
        let bar = chains
            .iter()
            .find(|c| c.pixels.iter().all(|p| p.1 == 0))
            .expect("top bar chain");
        let xs: Vec<usize> = bar.pixels.iter().map(|p| p.0).collect();
        assert_eq!(xs.iter().min(), Some(&0));
        assert_eq!(xs.iter().max(), Some(&20));
    }

    #[test]
    fn test_ring_is_closed() {
        let mut px = line(0, 0, 10, 0);
        px.extend(line(10, 1, 10, 10));
        px.extend(line(0, 10, 9, 10));
        px.extend(line(0, 1, 0, 9));
        let g = SkeletonGraph::build(&px);
        let chains = g.chains(5);
        assert_eq!(chains.len(), 1);
        assert!(chains[0].closed);
    }
}
