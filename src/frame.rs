//! Pixel grids flowing through the screening pipeline.
//!
//! All grids are indexed `(row, col)`, i.e. `(y, x)`, like
//! the rest of the `ndarray` based code in this crate.

use anyhow::{ensure, Result};
use image::RgbImage;
use ndarray::{Array2, Array3};
use serde_derive::*;

/// Single channel luminance, same shape as its source
/// [`Frame`].
pub type IntensityField = Array2<u8>;

/// Hot / not-hot mask produced by thresholding an
/// [`IntensityField`].
pub type BinaryMask = Array2<bool>;

/// Pseudo-colored RGB image that overlays are drawn onto.
pub type VisualizationField = RgbImage;

/// Order of the three color channels in a raw frame.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

impl Default for ChannelOrder {
    fn default() -> Self {
        ChannelOrder::Rgb
    }
}

/// A raw color frame as handed over by a capture source.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Array3<u8>,
    order: ChannelOrder,
}

impl Frame {
    /// Wrap interleaved 8-bit pixels of a `width x height`
    /// frame.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>, order: ChannelOrder) -> Result<Self> {
        ensure!(
            data.len() == width * height * 3,
            "frame buffer has {} bytes, expected {} for {}x{}",
            data.len(),
            width * height * 3,
            width,
            height
        );
        let pixels = Array3::from_shape_vec((height, width, 3), data)?;
        Ok(Frame { pixels, order })
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let pixels = Array3::from_shape_vec((height as usize, width as usize, 3), image.into_raw())
            .unwrap_or_else(|_| unreachable!("rgb image buffer always holds 3 bytes per pixel"));
        Frame {
            pixels,
            order: ChannelOrder::Rgb,
        }
    }

    /// Build a frame by evaluating `f(row, col)` for every
    /// pixel. The returned triple is interpreted in `order`.
    pub fn from_fn<F>(height: usize, width: usize, order: ChannelOrder, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> [u8; 3],
    {
        let mut pixels = Array3::zeros((height, width, 3));
        for ((row, col, ch), value) in pixels.indexed_iter_mut() {
            *value = f(row, col)[ch];
        }
        Frame { pixels, order }
    }

    /// `(height, width)` of the frame.
    pub fn dim(&self) -> (usize, usize) {
        let (height, width, _) = self.pixels.dim();
        (height, width)
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    /// Pixel at `(row, col)` normalized to RGB order.
    #[inline]
    pub fn rgb(&self, row: usize, col: usize) -> [u8; 3] {
        let px = &self.pixels;
        match self.order {
            ChannelOrder::Rgb => [px[(row, col, 0)], px[(row, col, 1)], px[(row, col, 2)]],
            ChannelOrder::Bgr => [px[(row, col, 2)], px[(row, col, 1)], px[(row, col, 0)]],
        }
    }
}

/// `(height, width)` of a visualization field, in the same
/// convention as [`Frame::dim`].
pub fn field_dim(field: &VisualizationField) -> (usize, usize) {
    let (width, height) = field.dimensions();
    (height as usize, width as usize)
}
