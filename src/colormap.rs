//! Intensity and pseudo-color mapping of raw frames.

use image::Rgb;
use lazy_static::lazy_static;
use ndarray::Array2;

use crate::frame::{Frame, IntensityField, VisualizationField};

// Rec. 601 luma weights in 14-bit fixed point.
const LUMA_SHIFT: u32 = 14;
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;

lazy_static! {
    /// "Hot" ramp: black through red and yellow to white.
    static ref HOT: [[u8; 3]; 256] = {
        let mut lut = [[0u8; 3]; 256];
        for (value, entry) in lut.iter_mut().enumerate() {
            let x = value as f64 / 255.;
            let ramp = |lo: f64, width: f64| {
                (((x - lo) / width).max(0.).min(1.) * 255.).round() as u8
            };
            *entry = [ramp(0., 3. / 8.), ramp(3. / 8., 3. / 8.), ramp(3. / 4., 1. / 4.)];
        }
        lut
    };
}

/// Luminance of an RGB triple.
#[inline]
pub fn luma([r, g, b]: [u8; 3]) -> u8 {
    let sum = LUMA_R * r as u32 + LUMA_G * g as u32 + LUMA_B * b as u32;
    ((sum + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8
}

/// Color of `value` on the hot ramp.
#[inline]
pub fn hot(value: u8) -> Rgb<u8> {
    Rgb(HOT[value as usize])
}

/// Grayscale intensity of a frame, after normalizing its
/// channel order.
pub fn intensity(frame: &Frame) -> IntensityField {
    let (height, width) = frame.dim();
    Array2::from_shape_fn((height, width), |(row, col)| luma(frame.rgb(row, col)))
}

/// Pseudo-color an intensity field with the hot ramp.
pub fn pseudo_color(intensity: &IntensityField) -> VisualizationField {
    let (height, width) = intensity.dim();
    VisualizationField::from_fn(width as u32, height as u32, |x, y| {
        hot(intensity[(y as usize, x as usize)])
    })
}

/// Both products of the mapper stage.
pub fn map_frame(frame: &Frame) -> (IntensityField, VisualizationField) {
    let intensity = intensity(frame);
    let field = pseudo_color(&intensity);
    (intensity, field)
}
