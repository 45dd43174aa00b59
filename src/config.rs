//! Run-wide screening parameters.
//!
//! A [`Configuration`] is built once (defaults, optionally
//! overlaid with a JSON file and command line flags),
//! [validated](Configuration::validate), and then shared
//! read-only by every frame of the run.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{ensure, Context, Result};
use serde_derive::*;

/// Which pixels of a region feed the masked mean.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MaskMode {
    /// Every pixel of the connected region.
    Filled,
    /// Only the corner points of the traced outer border,
    /// see [`Region::contour_vertices`](crate::region::Region::contour_vertices).
    Boundary,
}

impl Default for MaskMode {
    fn default() -> Self {
        MaskMode::Filled
    }
}

/// Overlay colors, as RGB triples.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Palette {
    pub normal: [u8; 3],
    pub alert: [u8; 3],
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            normal: [0, 255, 0],
            alert: [127, 255, 255],
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Configuration {
    /// Regions at or above this temperature raise an alert.
    pub threshold_temperature: f64,
    /// Minimum intensity (0-255) of a hot pixel. Kept wider
    /// than `u8` so that out of range values reach
    /// [`validate`](Self::validate) instead of being
    /// truncated.
    pub binary_threshold: i64,
    /// Divisor turning mean intensity into temperature.
    pub conversion_factor: f64,
    /// Minimum bounding-box area (pixels) of a region.
    pub min_area: usize,
    pub mask_mode: MaskMode,
    /// Side of the square structuring element of the opening.
    pub kernel_size: usize,
    /// Erosions (and then dilations) per opening.
    pub iterations: usize,
    pub palette: Palette,
    pub alert_caption: String,
    /// `(x, y)` of the caption's baseline origin.
    pub caption_origin: (u32, u32),
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            threshold_temperature: 100.5,
            binary_threshold: 200,
            conversion_factor: 2.25,
            min_area: 2400,
            mask_mode: MaskMode::default(),
            kernel_size: 5,
            iterations: 1,
            palette: Palette::default(),
            alert_caption: "High temperature detected!!!".into(),
            caption_origin: (50, 50),
        }
    }
}

impl Configuration {
    /// Read a configuration from a JSON file. Missing fields
    /// keep their defaults.
    pub fn from_json_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("opening configuration `{}`", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing configuration `{}`", path.display()))
    }

    /// Check every parameter before any frame is processed.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.threshold_temperature.is_finite(),
            "threshold temperature must be finite, got {}",
            self.threshold_temperature
        );
        ensure!(
            (0..=255).contains(&self.binary_threshold),
            "binary threshold must be between 0 and 255, got {}",
            self.binary_threshold
        );
        ensure!(
            self.conversion_factor.is_finite() && self.conversion_factor > 0.,
            "conversion factor must be positive, got {}",
            self.conversion_factor
        );
        ensure!(self.min_area >= 1, "minimum area must be at least 1");
        ensure!(
            self.kernel_size % 2 == 1,
            "kernel size must be odd, got {}",
            self.kernel_size
        );
        ensure!(self.iterations >= 1, "opening needs at least one iteration");
        Ok(())
    }

    /// The binary threshold as a channel value.
    pub fn channel_threshold(&self) -> Result<u8> {
        use std::convert::TryFrom;
        u8::try_from(self.binary_threshold)
            .with_context(|| format!("binary threshold {} out of range", self.binary_threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Configuration::default();
        config.validate().unwrap();
        assert_eq!(config.channel_threshold().unwrap(), 200);
        assert_eq!(config.min_area, 2400);
    }

    #[test]
    fn rejects_bad_parameters() {
        let bad = |f: fn(&mut Configuration)| {
            let mut config = Configuration::default();
            f(&mut config);
            config.validate().is_err()
        };
        assert!(bad(|c| c.binary_threshold = 256));
        assert!(bad(|c| c.binary_threshold = -1));
        assert!(bad(|c| c.conversion_factor = 0.));
        assert!(bad(|c| c.conversion_factor = -2.25));
        assert!(bad(|c| c.conversion_factor = f64::NAN));
        assert!(bad(|c| c.threshold_temperature = f64::INFINITY));
        assert!(bad(|c| c.min_area = 0));
        assert!(bad(|c| c.kernel_size = 4));
        assert!(bad(|c| c.iterations = 0));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Configuration = serde_json::from_str(
            r#"{ "binary_threshold": 180, "mask_mode": "boundary", "palette": { "alert": [255, 0, 0] } }"#,
        )
        .unwrap();
        assert_eq!(config.binary_threshold, 180);
        assert_eq!(config.mask_mode, MaskMode::Boundary);
        assert_eq!(config.palette.alert, [255, 0, 0]);
        assert_eq!(config.palette.normal, [0, 255, 0]);
        assert_eq!(config.conversion_factor, 2.25);
    }
}
