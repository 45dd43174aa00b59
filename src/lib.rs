//! Screen thermal camera video for hot regions.
//!
//! Every frame goes through the same stateless pipeline:
//!
//! 1. [map](colormap::map_frame) the raw frame to a
//! grayscale intensity field and a pseudo-colored
//! visualization field;
//! 2. [threshold](segment::threshold) the intensities into
//! a hot pixel mask;
//! 3. remove specks by morphological
//! [opening](morphology::open);
//! 4. [extract](region::extract_regions) 8-connected
//! regions, dropping those with a small bounding box;
//! 5. [estimate](temperature::estimate) each region's
//! temperature from the mean intensity of its own pixels;
//! 6. [classify](classify::classify) it against the
//! threshold temperature and draw the result.
//!
//! The pixel to temperature mapping is a linear
//! approximation (`mean / conversion_factor`), not a
//! calibrated radiometric model.
//!
//! # Usage
//!
//! ```rust
//! # fn test_compile() -> anyhow::Result<()> {
//! use thermal_screening::{process_frame, ChannelOrder, Configuration, Frame};
//!
//! let config = Configuration::default();
//! config.validate()?;
//! let frame = Frame::from_fn(240, 320, ChannelOrder::Rgb, |row, col| {
//!     if (100..160).contains(&row) && (100..160).contains(&col) {
//!         [255; 3]
//!     } else {
//!         [0; 3]
//!     }
//! });
//! let out = process_frame(&frame, &config)?;
//! assert!(out.any_alert());
//! # Ok(())
//! # }
//! ```
//!
//! Whole videos are handled by a [`Runner`](runner::Runner)
//! pulling from a [`Capture`](video::Capture) and pushing
//! into an [`Encoder`](video::Encoder); see the
//! `thermal-screen` binary.

pub mod annotate;
pub mod classify;
pub mod colormap;
pub mod config;
pub mod font;
pub mod frame;
pub mod morphology;
pub mod pipeline;
pub mod region;
pub mod runner;
pub mod segment;
pub mod temperature;
pub mod video;

#[cfg(feature = "cli")]
pub mod cli;

pub use crate::config::Configuration;
pub use crate::frame::{ChannelOrder, Frame};
pub use crate::pipeline::{process_frame, ProcessedFrame};
