//! Helpers shared by the accompanying binaries.
//!
//! APIs here shouldn't be considered stable / used as a
//! library.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
pub use clap::{App, Arg};
pub use inflector::Inflector;
use serde_derive::*;

use crate::pipeline::{DetectionRecord, ProcessedFrame};

#[macro_export]
macro_rules! args_parser {
    ($name:expr) => {{
        $crate::cli::App::new($name)
            .version(clap::crate_version!())
            .author(clap::crate_authors!())
    }};
}

#[macro_export]
macro_rules! opt {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name)
            .long(&$name.to_kebab_case())
            .value_name(&$name.to_screaming_snake_case())
    }};
}

/// Log to stderr at `info` unless `RUST_LOG` says
/// otherwise; `quiet` lowers the default to `warn`.
pub fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

#[derive(Serialize)]
struct FrameReport {
    frame: usize,
    detections: Vec<DetectionRecord>,
}

/// Writes one JSON line per frame with detections.
pub struct ReportWriter {
    out: BufWriter<File>,
}

impl ReportWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("creating report `{}`", path.display()))?;
        Ok(ReportWriter {
            out: BufWriter::new(file),
        })
    }

    pub fn record(&mut self, index: usize, frame: &ProcessedFrame) -> Result<()> {
        if frame.detections.is_empty() {
            return Ok(());
        }
        let report = FrameReport {
            frame: index,
            detections: frame.records(),
        };
        serde_json::to_writer(&mut self.out, &report)?;
        writeln!(self.out)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Configuration,
        frame::{ChannelOrder, Frame},
        pipeline::process_frame,
    };
    use std::{env, fs};

    #[test]
    fn report_has_one_line_per_frame_with_detections() -> Result<()> {
        let config = Configuration::default();
        let cold = Frame::from_fn(120, 160, ChannelOrder::Rgb, |_, _| [0; 3]);
        let hot = Frame::from_fn(120, 160, ChannelOrder::Rgb, |r, c| {
            if (30..90).contains(&r) && (50..110).contains(&c) {
                [255; 3]
            } else {
                [0; 3]
            }
        });

        let path = env::temp_dir().join(format!("thermal-screening-report-{}.jsonl", std::process::id()));
        let mut report = ReportWriter::create(&path)?;
        report.record(0, &process_frame(&cold, &config)?)?;
        report.record(1, &process_frame(&hot, &config)?)?;
        report.finish()?;

        let text = fs::read_to_string(&path)?;
        fs::remove_file(&path)?;
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 1);

        let line: serde_json::Value = serde_json::from_str(lines[0])?;
        assert_eq!(line["frame"], 1);
        let detections = line["detections"].as_array().unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(
            detections[0]["bounding_box"],
            serde_json::json!({ "x": 50, "y": 30, "width": 60, "height": 60 })
        );
        assert_eq!(detections[0]["over_threshold"], true);
        Ok(())
    }
}
