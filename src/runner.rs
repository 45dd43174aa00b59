//! Drive the pipeline over a whole capture.
//!
//! Frames are pulled in batches. With one job the batch is a
//! single frame, so pulling, processing, display and
//! encoding interleave frame by frame. With more jobs each
//! batch is processed on a dedicated `rayon` pool; results
//! come back in capture order before they are shown or
//! encoded, so the output is identical either way.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};
use serde_derive::*;

use crate::{
    config::Configuration,
    frame::Frame,
    pipeline::{process_frame, ProcessedFrame},
    video::{Capture, DimensionGuard, Display, Encoder},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOptions {
    /// Worker threads; `1` processes strictly sequentially.
    pub jobs: usize,
    /// Frames pulled per parallel batch.
    pub batch_size: usize,
    pub progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            jobs: 1,
            batch_size: 32,
            progress: false,
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: usize,
    pub regions: usize,
    /// Regions at or above the threshold temperature.
    pub alerts: usize,
    /// Frames with at least one alert.
    pub alert_frames: usize,
    /// Whether the run stopped on a quit signal.
    pub interrupted: bool,
}

impl RunSummary {
    fn record(&mut self, frame: &ProcessedFrame) {
        let alerts = frame
            .detections
            .iter()
            .filter(|d| d.classification.over_threshold)
            .count();
        self.frames += 1;
        self.regions += frame.detections.len();
        self.alerts += alerts;
        self.alert_frames += (alerts > 0) as usize;
    }
}

pub struct Runner<'a> {
    config: &'a Configuration,
    options: RunOptions,
    pool: Option<ThreadPool>,
}

impl<'a> Runner<'a> {
    /// `config` must already be validated.
    pub fn new(config: &'a Configuration, options: RunOptions) -> Result<Self> {
        let pool = if options.jobs > 1 {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(options.jobs)
                    .build()
                    .context("building worker pool")?,
            )
        } else {
            None
        };
        Ok(Runner {
            config,
            options,
            pool,
        })
    }

    fn batch_size(&self) -> usize {
        match self.pool {
            Some(_) => self.options.batch_size.max(1),
            None => 1,
        }
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.options.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner().template("[{elapsed_precise}] {spinner} {pos} frames {msg}"),
        );
        bar
    }

    /// Pull up to one batch of frames. The quit signal is
    /// polled before every pull; the flag is `true` when the
    /// stream ended or a quit was requested.
    fn pull_batch(&self, capture: &mut dyn Capture, display: &mut dyn Display) -> Result<(Vec<Frame>, Stop)> {
        let mut batch = Vec::with_capacity(self.batch_size());
        while batch.len() < self.batch_size() {
            if display.poll_quit_signal() {
                return Ok((batch, Stop::Quit));
            }
            match capture.next_frame()? {
                Some(frame) => batch.push(frame),
                None => return Ok((batch, Stop::EndOfStream)),
            }
        }
        Ok((batch, Stop::Continue))
    }

    fn process_batch(&self, batch: &[Frame]) -> Result<Vec<ProcessedFrame>> {
        let config = self.config;
        match &self.pool {
            Some(pool) => pool.install(|| {
                batch
                    .par_iter()
                    .map(|frame| process_frame(frame, config))
                    .collect()
            }),
            None => batch.iter().map(|frame| process_frame(frame, config)).collect(),
        }
    }

    /// Process every frame of `capture` and encode the
    /// results in capture order. `on_frame` sees each
    /// processed frame with its index before it is encoded.
    pub fn run<E, F>(
        &self,
        capture: &mut dyn Capture,
        display: &mut dyn Display,
        encoder: E,
        mut on_frame: F,
    ) -> Result<RunSummary>
    where
        E: Encoder,
        F: FnMut(usize, &ProcessedFrame) -> Result<()>,
    {
        info!(
            "screening with threshold {} (jobs: {})",
            self.config.threshold_temperature, self.options.jobs
        );
        let bar = self.progress_bar();
        let mut encoder = DimensionGuard::new(encoder);
        let mut summary = RunSummary::default();

        loop {
            let (batch, stop) = self.pull_batch(capture, display)?;
            let first = summary.frames;
            let processed = self
                .process_batch(&batch)
                .with_context(|| format!("processing frames from {}", first))?;

            for frame in processed {
                let index = summary.frames;
                display.show(&frame.field);
                on_frame(index, &frame)?;
                encoder.write_frame(&frame.field)?;
                summary.record(&frame);
                bar.inc(1);
                if frame.any_alert() {
                    bar.set_message(format!("({} alert frames)", summary.alert_frames));
                }
            }

            match stop {
                Stop::Continue => continue,
                Stop::EndOfStream => break,
                Stop::Quit => {
                    debug!("quit requested after {} frames", summary.frames);
                    summary.interrupted = true;
                    break;
                }
            }
        }

        encoder.finish()?;
        bar.finish_and_clear();
        info!(
            "processed {} frames: {} regions, {} alerts in {} frames",
            summary.frames, summary.regions, summary.alerts, summary.alert_frames
        );
        Ok(summary)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stop {
    Continue,
    EndOfStream,
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frame::{ChannelOrder, VisualizationField},
        video::{CancelToken, HeadlessDisplay},
    };

    struct Frames(std::vec::IntoIter<Frame>);

    impl Capture for Frames {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            Ok(self.0.next())
        }
    }

    #[derive(Default)]
    struct Sink(Vec<VisualizationField>, bool);

    impl Encoder for Sink {
        fn write_frame(&mut self, field: &VisualizationField) -> Result<()> {
            self.0.push(field.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.1 = true;
            Ok(())
        }
    }

    /// Quits after a fixed number of polls.
    struct QuitAfter(usize);

    impl Display for QuitAfter {
        fn show(&mut self, _field: &VisualizationField) {}

        fn poll_quit_signal(&mut self) -> bool {
            if self.0 == 0 {
                return true;
            }
            self.0 -= 1;
            false
        }
    }

    fn frames(n: usize) -> Frames {
        let frames: Vec<_> = (0..n)
            .map(|i| {
                Frame::from_fn(120, 160, ChannelOrder::Rgb, move |r, c| {
                    let x0 = 10 + 8 * i;
                    if (30..90).contains(&r) && (x0..x0 + 60).contains(&c) {
                        [255; 3]
                    } else {
                        [0; 3]
                    }
                })
            })
            .collect();
        Frames(frames.into_iter())
    }

    #[test]
    fn sequential_run_encodes_every_frame() {
        let config = Configuration::default();
        let runner = Runner::new(&config, RunOptions::default()).unwrap();
        let mut sink = Sink::default();
        let mut seen = vec![];
        let summary = runner
            .run(&mut frames(4), &mut HeadlessDisplay::default(), &mut sink, |i, f| {
                seen.push((i, f.detections.len()));
                Ok(())
            })
            .unwrap();
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.regions, 4);
        assert_eq!(summary.alert_frames, 4);
        assert!(!summary.interrupted);
        assert_eq!(seen, vec![(0, 1), (1, 1), (2, 1), (3, 1)]);
        assert_eq!(sink.0.len(), 4);
        assert!(sink.1);
    }

    #[test]
    fn parallel_run_matches_sequential_order() {
        let config = Configuration::default();
        let mut sequential = Sink::default();
        Runner::new(&config, RunOptions::default())
            .unwrap()
            .run(&mut frames(7), &mut HeadlessDisplay::default(), &mut sequential, |_, _| Ok(()))
            .unwrap();

        let options = RunOptions {
            jobs: 3,
            batch_size: 3,
            progress: false,
        };
        let mut parallel = Sink::default();
        Runner::new(&config, options)
            .unwrap()
            .run(&mut frames(7), &mut HeadlessDisplay::default(), &mut parallel, |_, _| Ok(()))
            .unwrap();

        assert_eq!(sequential.0.len(), 7);
        assert_eq!(sequential.0, parallel.0);
    }

    #[test]
    fn quit_signal_stops_before_next_pull() {
        let config = Configuration::default();
        let runner = Runner::new(&config, RunOptions::default()).unwrap();
        let mut sink = Sink::default();
        let summary = runner
            .run(&mut frames(5), &mut QuitAfter(2), &mut sink, |_, _| Ok(()))
            .unwrap();
        assert_eq!(summary.frames, 2);
        assert!(summary.interrupted);
        assert!(sink.1);
    }

    #[test]
    fn cancelled_token_processes_nothing() {
        let config = Configuration::default();
        let token = CancelToken::new();
        token.cancel();
        let mut sink = Sink::default();
        let summary = Runner::new(&config, RunOptions::default())
            .unwrap()
            .run(&mut frames(3), &mut HeadlessDisplay::new(token), &mut sink, |_, _| Ok(()))
            .unwrap();
        assert_eq!(summary.frames, 0);
        assert!(sink.0.is_empty());
    }

    #[test]
    fn mismatched_frame_aborts_the_run() {
        let config = Configuration::default();
        let mut all: Vec<Frame> = frames(2).0.collect();
        all.push(Frame::from_fn(60, 80, ChannelOrder::Rgb, |_, _| [0; 3]));
        let mut sink = Sink::default();
        let err = Runner::new(&config, RunOptions::default())
            .unwrap()
            .run(&mut Frames(all.into_iter()), &mut HeadlessDisplay::default(), &mut sink, |_, _| Ok(()))
            .unwrap_err();
        assert!(err.to_string().contains("frame 2"), "{}", err);
        assert_eq!(sink.0.len(), 2);
    }
}
