//! Threshold classification of region temperatures.

use image::Rgb;
use serde_derive::*;

use crate::{config::Configuration, temperature::display_value};

/// Outcome for a single region of a single frame.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub temperature: f64,
    pub over_threshold: bool,
    #[serde(skip)]
    pub color: Rgb<u8>,
}

impl Classification {
    /// Text drawn beside the region, e.g. `113.33 F`. Whole
    /// values keep one decimal (`100.0 F`).
    pub fn label(&self) -> String {
        let value = display_value(self.temperature);
        if value.is_finite() && value.fract() == 0. {
            format!("{:.1} F", value)
        } else {
            format!("{} F", value)
        }
    }
}

/// Compare `temperature` against the configured threshold
/// (inclusive) and pick the matching palette color.
pub fn classify(temperature: f64, config: &Configuration) -> Classification {
    let over_threshold = temperature >= config.threshold_temperature;
    let color = if over_threshold {
        config.palette.alert
    } else {
        config.palette.normal
    };
    Classification {
        temperature,
        over_threshold,
        color: Rgb(color),
    }
}
