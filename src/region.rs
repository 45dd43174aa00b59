//! Connected region extraction.
//!
//! Regions are the 8-connected components of a
//! [`BinaryMask`]. Each component is discovered at its first
//! pixel in row-major order, flood filled to collect its
//! members, and its outer border is traced with the
//! Suzuki-Abe border following rule. The discovery order is
//! deterministic for a given mask, but callers should not
//! rely on it beyond that.

use log::trace;
use ndarray::Array2;
use serde_derive::*;

use crate::frame::BinaryMask;

/// Pixel coordinate.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    pub x: usize,
    pub y: usize,
}

impl Point {
    pub fn new(x: usize, y: usize) -> Self {
        Point { x, y }
    }
}

/// Axis-aligned rectangle, inclusive of its first row and
/// column and `width` / `height` pixels wide.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl BoundingBox {
    /// Smallest box enclosing every point; `None` for no
    /// points.
    pub fn enclosing<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in points {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        Some(BoundingBox {
            x: x0,
            y: y0,
            width: x1 - x0 + 1,
            height: y1 - y0 + 1,
        })
    }

    /// `width * height`, saturating on overflow.
    pub fn area(&self) -> usize {
        self.width.saturating_mul(self.height)
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A connected hot region of one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    contour: Vec<Point>,
    bounding_box: BoundingBox,
    pixels: Vec<Point>,
}

impl Region {
    /// Outer border in tracing order. A point may repeat
    /// where the border passes through a one pixel wide
    /// neck.
    pub fn contour(&self) -> &[Point] {
        &self.contour
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    /// Every member pixel, in flood fill order.
    pub fn pixels(&self) -> &[Point] {
        &self.pixels
    }

    /// Distinct corner points of the outer border: points
    /// inside a straight horizontal, vertical or diagonal run
    /// are dropped, keeping only where the border turns.
    pub fn contour_vertices(&self) -> Vec<Point> {
        let n = self.contour.len();
        let step = |a: Point, b: Point| {
            (
                b.x as isize - a.x as isize,
                b.y as isize - a.y as isize,
            )
        };
        let mut vertices: Vec<Point> = (0..n)
            .filter(|&i| {
                let prev = self.contour[(i + n - 1) % n];
                let cur = self.contour[i];
                let next = self.contour[(i + 1) % n];
                n < 3 || step(prev, cur) != step(cur, next)
            })
            .map(|i| self.contour[i])
            .collect();
        if vertices.is_empty() {
            vertices.extend(self.contour.first().copied());
        }
        vertices.sort_unstable();
        vertices.dedup();
        vertices
    }
}

// (dy, dx), clockwise starting east (rows grow downwards).
const NEIGHBOURS: [(isize, isize); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];
const WEST: usize = 4;

type Cell = (isize, isize);

struct Grid<'a> {
    mask: &'a BinaryMask,
    height: isize,
    width: isize,
}

impl<'a> Grid<'a> {
    fn new(mask: &'a BinaryMask) -> Self {
        let (height, width) = mask.dim();
        Grid {
            mask,
            height: height as isize,
            width: width as isize,
        }
    }

    #[inline]
    fn is_set(&self, (y, x): Cell) -> bool {
        y >= 0 && x >= 0 && y < self.height && x < self.width && self.mask[(y as usize, x as usize)]
    }

    #[inline]
    fn step((y, x): Cell, dir: usize) -> Cell {
        let (dy, dx) = NEIGHBOURS[dir];
        (y + dy, x + dx)
    }

    fn direction(from: Cell, to: Cell) -> usize {
        let delta = (to.0 - from.0, to.1 - from.1);
        NEIGHBOURS
            .iter()
            .position(|&n| n == delta)
            .unwrap_or_else(|| unreachable!("{:?} is not adjacent to {:?}", to, from))
    }

    /// Trace the outer border of the component whose first
    /// row-major pixel is `start`.
    fn trace_outer_border(&self, start: Cell) -> Vec<Point> {
        let point = |(y, x): Cell| Point::new(x as usize, y as usize);

        // Clockwise from the (unset) west neighbour.
        let first = (0..8)
            .map(|k| (WEST + k) % 8)
            .find(|&d| self.is_set(Self::step(start, d)));
        let second = match first {
            Some(dir) => Self::step(start, dir),
            None => return vec![point(start)],
        };

        let mut contour = vec![];
        let (mut prev, mut cur) = (second, start);
        loop {
            // Counter-clockwise from just past `prev`; `prev`
            // itself is set, so the search always succeeds.
            let back = Self::direction(cur, prev);
            let dir = (1..=8)
                .map(|k| (back + 8 - k) % 8)
                .find(|&d| self.is_set(Self::step(cur, d)))
                .unwrap_or(back);
            let next = Self::step(cur, dir);
            contour.push(point(cur));
            if next == start && cur == second {
                break;
            }
            prev = cur;
            cur = next;
        }
        contour
    }

    fn flood_fill(&self, start: Cell, labels: &mut Array2<bool>) -> Vec<Point> {
        let mut pixels = vec![];
        let mut stack = vec![start];
        labels[(start.0 as usize, start.1 as usize)] = true;
        while let Some(cell) = stack.pop() {
            pixels.push(Point::new(cell.1 as usize, cell.0 as usize));
            for dir in 0..8 {
                let n = Self::step(cell, dir);
                if self.is_set(n) && !labels[(n.0 as usize, n.1 as usize)] {
                    labels[(n.0 as usize, n.1 as usize)] = true;
                    stack.push(n);
                }
            }
        }
        pixels
    }
}

/// Every 8-connected component of `mask`, in discovery
/// order.
pub fn trace_regions(mask: &BinaryMask) -> Vec<Region> {
    let grid = Grid::new(mask);
    let mut visited = Array2::from_elem(mask.raw_dim(), false);
    let mut regions = vec![];

    for ((y, x), &set) in mask.indexed_iter() {
        if !set || visited[(y, x)] {
            continue;
        }
        let start = (y as isize, x as isize);
        let pixels = grid.flood_fill(start, &mut visited);
        let contour = grid.trace_outer_border(start);
        let bounding_box = match BoundingBox::enclosing(&contour) {
            Some(bb) => bb,
            None => continue,
        };
        regions.push(Region {
            contour,
            bounding_box,
            pixels,
        });
    }
    regions
}

/// Regions of `mask` whose bounding box covers at least
/// `min_area` pixels.
pub fn extract_regions(mask: &BinaryMask, min_area: usize) -> Vec<Region> {
    trace_regions(mask)
        .into_iter()
        .filter(|region| {
            let bb = region.bounding_box();
            let keep = !bb.is_degenerate() && bb.area() >= min_area;
            if !keep {
                trace!("dropping region {:?} (area {} < {})", bb, bb.area(), min_area);
            }
            keep
        })
        .collect()
}
