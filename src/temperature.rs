//! Region temperature estimation.
//!
//! The camera is assumed to map temperature linearly onto
//! pixel intensity, so a region's temperature is its mean
//! intensity divided by a conversion factor. This is an
//! approximation, not a radiometric model.

use anyhow::{ensure, Result};

use crate::{
    config::{Configuration, MaskMode},
    frame::IntensityField,
    region::{Point, Region},
};

/// Mean intensity over exactly the given pixels.
///
/// Fails for an empty pixel set: treating it as zero would
/// silently report the region as cold.
pub fn masked_mean(intensity: &IntensityField, pixels: &[Point]) -> Result<f64> {
    ensure!(!pixels.is_empty(), "empty region mask");
    let sum: u64 = pixels
        .iter()
        .map(|p| intensity[(p.y, p.x)] as u64)
        .sum();
    Ok(sum as f64 / pixels.len() as f64)
}

/// Linear intensity to temperature conversion.
#[inline]
pub fn to_temperature(mean_intensity: f64, conversion_factor: f64) -> f64 {
    mean_intensity / conversion_factor
}

/// Temperature of `region`, using the pixels selected by the
/// configured [`MaskMode`].
pub fn estimate(intensity: &IntensityField, region: &Region, config: &Configuration) -> Result<f64> {
    let mean = match config.mask_mode {
        MaskMode::Filled => masked_mean(intensity, region.pixels())?,
        MaskMode::Boundary => masked_mean(intensity, &region.contour_vertices())?,
    };
    Ok(to_temperature(mean, config.conversion_factor))
}

/// Value shown next to a region: rounded to two decimals.
pub fn display_value(temperature: f64) -> f64 {
    (temperature * 100.).round() / 100.
}
