//! Per-frame screening pipeline.
//!
//! [`process_frame`] is a pure function of the frame and
//! the configuration: no state survives between frames, so
//! frames may be processed in any order or in parallel.

use anyhow::{Context, Result};
use log::debug;
use serde_derive::*;

use crate::{
    annotate,
    classify::{classify, Classification},
    colormap,
    config::Configuration,
    frame::{BinaryMask, Frame, IntensityField, VisualizationField},
    morphology::{self, StructuringElement},
    region::{extract_regions, BoundingBox, Region},
    segment, temperature,
};

/// A region together with its classification.
#[derive(Clone, Debug)]
pub struct Detection {
    pub region: Region,
    pub classification: Classification,
}

/// Serializable summary of a [`Detection`].
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct DetectionRecord {
    pub bounding_box: BoundingBox,
    #[serde(flatten)]
    pub classification: Classification,
}

impl From<&Detection> for DetectionRecord {
    fn from(d: &Detection) -> Self {
        DetectionRecord {
            bounding_box: d.region.bounding_box(),
            classification: d.classification,
        }
    }
}

/// Annotated output of one frame.
#[derive(Clone, Debug)]
pub struct ProcessedFrame {
    pub field: VisualizationField,
    pub detections: Vec<Detection>,
}

impl ProcessedFrame {
    pub fn any_alert(&self) -> bool {
        self.detections
            .iter()
            .any(|d| d.classification.over_threshold)
    }

    pub fn records(&self) -> Vec<DetectionRecord> {
        self.detections.iter().map(DetectionRecord::from).collect()
    }
}

/// Hot pixel mask after noise filtering.
pub fn hot_mask(intensity: &IntensityField, config: &Configuration) -> Result<BinaryMask> {
    let mask = segment::threshold(intensity, config.channel_threshold()?);
    let element = StructuringElement::square(config.kernel_size)?;
    Ok(morphology::open(&mask, element, config.iterations))
}

/// Candidate regions and their classifications, without
/// drawing anything.
pub fn detect(intensity: &IntensityField, config: &Configuration) -> Result<Vec<Detection>> {
    let mask = hot_mask(intensity, config)?;
    extract_regions(&mask, config.min_area)
        .into_iter()
        .map(|region| {
            let temp = temperature::estimate(intensity, &region, config)
                .with_context(|| format!("estimating temperature of {:?}", region.bounding_box()))?;
            Ok(Detection {
                classification: classify(temp, config),
                region,
            })
        })
        .collect()
}

/// Draw every detection onto `field`; the alert caption is
/// drawn once if any detection is over threshold.
pub fn draw_detections(field: &mut VisualizationField, detections: &[Detection], config: &Configuration) {
    for d in detections {
        annotate::draw_region(field, d.region.bounding_box(), &d.classification);
    }
    if detections.iter().any(|d| d.classification.over_threshold) {
        annotate::draw_caption(field, config);
    }
}

/// Run every stage on `frame`.
pub fn process_frame(frame: &Frame, config: &Configuration) -> Result<ProcessedFrame> {
    let (intensity, mut field) = colormap::map_frame(frame);
    let detections = detect(&intensity, config)?;
    debug!(
        "{} region(s), {} over threshold",
        detections.len(),
        detections.iter().filter(|d| d.classification.over_threshold).count()
    );
    draw_detections(&mut field, &detections, config);
    Ok(ProcessedFrame { field, detections })
}
