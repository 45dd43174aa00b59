//! Binary morphology with flat square structuring elements.
//!
//! Squares are separable, so both operations run as a
//! horizontal sweep followed by a vertical one. Pixels
//! outside the grid count as unset for both operations:
//! erosion therefore clears a margin of `radius` pixels
//! along every edge of the grid.

use anyhow::{ensure, Result};
use ndarray::{Axis, Zip};

use crate::frame::BinaryMask;

/// Flat square neighbourhood of odd side, anchored at its
/// center.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructuringElement {
    side: usize,
}

impl StructuringElement {
    pub fn square(side: usize) -> Result<Self> {
        ensure!(side % 2 == 1, "structuring element side must be odd, got {}", side);
        Ok(StructuringElement { side })
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn radius(&self) -> usize {
        self.side / 2
    }
}

impl Default for StructuringElement {
    fn default() -> Self {
        StructuringElement { side: 5 }
    }
}

#[derive(Clone, Copy)]
enum Op {
    Erode,
    Dilate,
}

fn sweep(mask: &BinaryMask, axis: Axis, radius: usize, op: Op) -> BinaryMask {
    let mut out = BinaryMask::from_elem(mask.raw_dim(), false);
    let side = 2 * radius + 1;
    let mut prefix = Vec::with_capacity(mask.len_of(axis) + 1);

    Zip::from(mask.lanes(axis))
        .and(out.lanes_mut(axis))
        .for_each(|src, mut dst| {
            let len = src.len();
            prefix.clear();
            prefix.push(0usize);
            let mut count = 0;
            for &set in src.iter() {
                count += set as usize;
                prefix.push(count);
            }

            for (i, value) in dst.iter_mut().enumerate() {
                let lo = i.saturating_sub(radius);
                let hi = (i + radius + 1).min(len);
                let hits = prefix[hi] - prefix[lo];
                *value = match op {
                    Op::Erode => i >= radius && i + radius < len && hits == side,
                    Op::Dilate => hits > 0,
                };
            }
        });
    out
}

fn apply(mask: &BinaryMask, element: StructuringElement, op: Op) -> BinaryMask {
    let radius = element.radius();
    let rows = sweep(mask, Axis(1), radius, op);
    sweep(&rows, Axis(0), radius, op)
}

/// A pixel stays set only if its whole neighbourhood is set
/// and inside the grid.
pub fn erode(mask: &BinaryMask, element: StructuringElement) -> BinaryMask {
    apply(mask, element, Op::Erode)
}

/// A pixel becomes set if any pixel in its neighbourhood is
/// set.
pub fn dilate(mask: &BinaryMask, element: StructuringElement) -> BinaryMask {
    apply(mask, element, Op::Dilate)
}

/// Morphological opening: `iterations` erosions followed by
/// as many dilations.
pub fn open(mask: &BinaryMask, element: StructuringElement, iterations: usize) -> BinaryMask {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = erode(&out, element);
    }
    for _ in 0..iterations {
        out = dilate(&out, element);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask(dim: (usize, usize), y: usize, x: usize, side: usize) -> BinaryMask {
        BinaryMask::from_shape_fn(dim, |(r, c)| {
            (y..y + side).contains(&r) && (x..x + side).contains(&c)
        })
    }

    fn brute_force(mask: &BinaryMask, radius: usize, op: Op) -> BinaryMask {
        let (h, w) = mask.dim();
        let r = radius as isize;
        BinaryMask::from_shape_fn((h, w), |(y, x)| {
            let mut hits = Vec::new();
            for dy in -r..=r {
                for dx in -r..=r {
                    let (yy, xx) = (y as isize + dy, x as isize + dx);
                    let inside = yy >= 0 && xx >= 0 && (yy as usize) < h && (xx as usize) < w;
                    hits.push(inside && mask[(yy as usize, xx as usize)]);
                }
            }
            match op {
                Op::Erode => hits.iter().all(|&v| v),
                Op::Dilate => hits.iter().any(|&v| v),
            }
        })
    }

    #[test]
    fn even_side_is_rejected() {
        assert!(StructuringElement::square(4).is_err());
        assert!(StructuringElement::square(0).is_err());
        assert_eq!(StructuringElement::square(3).unwrap().radius(), 1);
    }

    #[test]
    fn opening_removes_specks_and_keeps_blocks() {
        let mut mask = square_mask((40, 40), 10, 10, 12);
        mask[(2, 30)] = true;
        mask[(3, 30)] = true;
        mask[(30, 2)] = true;
        let opened = open(&mask, StructuringElement::default(), 1);
        assert_eq!(opened, square_mask((40, 40), 10, 10, 12));
    }

    #[test]
    fn erosion_treats_outside_as_unset() {
        let mask = BinaryMask::from_elem((8, 9), true);
        let eroded = erode(&mask, StructuringElement::default());
        let expected = BinaryMask::from_shape_fn((8, 9), |(r, c)| {
            (2..6).contains(&r) && (2..7).contains(&c)
        });
        assert_eq!(eroded, expected);
        // A full grid shrinks and grows back to itself.
        assert_eq!(dilate(&eroded, StructuringElement::default()), mask);
    }

    #[test]
    fn blocks_touching_the_border_lose_nothing_they_can_regrow() {
        let mask = square_mask((20, 20), 0, 0, 8);
        let opened = open(&mask, StructuringElement::default(), 1);
        // Only 5x5 squares fully inside the grid survive, and
        // the block itself is such a union.
        assert_eq!(opened, mask);

        let thin = square_mask((20, 20), 0, 0, 4);
        assert!(open(&thin, StructuringElement::default(), 1).iter().all(|&v| !v));
    }

    #[test]
    fn separable_sweeps_match_brute_force() {
        let mask = BinaryMask::from_shape_fn((17, 23), |(r, c)| (r * 7 + c * 13) % 5 != 0 || r % 6 == 0);
        for &side in &[1, 3, 5, 7] {
            let element = StructuringElement::square(side).unwrap();
            assert_eq!(erode(&mask, element), brute_force(&mask, side / 2, Op::Erode));
            assert_eq!(dilate(&mask, element), brute_force(&mask, side / 2, Op::Dilate));
        }
    }

    #[test]
    fn empty_grid_is_fine() {
        let mask = BinaryMask::from_elem((0, 0), false);
        assert_eq!(open(&mask, StructuringElement::default(), 2).dim(), (0, 0));
    }
}
