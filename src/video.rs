//! Frame sources and sinks around the pipeline.
//!
//! Video files are decoded and encoded by piping raw RGB24
//! frames through `ffmpeg`, which must be on `PATH`. Image
//! sequences (a directory or a glob pattern) are handled in
//! process by the `image` crate.

use std::{
    fs,
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, bail, ensure, Context, Result};
use glob::glob;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;

use crate::frame::{field_dim, ChannelOrder, Frame, VisualizationField};

/// Pull-based, sequential source of frames.
pub trait Capture {
    /// The next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Optional live view of the annotated output.
pub trait Display {
    fn show(&mut self, field: &VisualizationField);
    /// Checked once per frame; `true` stops the run.
    fn poll_quit_signal(&mut self) -> bool;
}

/// Sink for annotated frames, in order.
pub trait Encoder {
    fn write_frame(&mut self, field: &VisualizationField) -> Result<()>;
    /// Flush and close the output.
    fn finish(&mut self) -> Result<()>;
}

/// Shared flag asking a run to stop before its next frame.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A display that shows nothing and quits on cancellation.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    cancel: CancelToken,
}

impl HeadlessDisplay {
    pub fn new(cancel: CancelToken) -> Self {
        HeadlessDisplay { cancel }
    }
}

impl Display for HeadlessDisplay {
    fn show(&mut self, _field: &VisualizationField) {}

    fn poll_quit_signal(&mut self) -> bool {
        self.cancel.is_cancelled()
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "pnm", "ppm"];

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn is_glob_pattern(s: &str) -> bool {
    s.contains(|c: char| matches!(c, '*' | '?' | '['))
}

/// Frames read from a sorted list of image files.
pub struct ImageSequence {
    paths: std::vec::IntoIter<PathBuf>,
    order: ChannelOrder,
}

impl ImageSequence {
    pub fn from_paths(mut paths: Vec<PathBuf>, order: ChannelOrder) -> Self {
        paths.sort();
        ImageSequence {
            paths: paths.into_iter(),
            order,
        }
    }

    /// All images in a directory, or all paths matching a
    /// glob pattern.
    pub fn open(source: &str, order: ChannelOrder) -> Result<Self> {
        let path = Path::new(source);
        let paths: Vec<PathBuf> = if path.is_dir() {
            fs::read_dir(path)
                .with_context(|| format!("reading directory `{}`", source))?
                .map(|entry| Ok(entry?.path()))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .filter(|p| has_image_extension(p))
                .collect()
        } else {
            glob(source)
                .with_context(|| format!("invalid pattern `{}`", source))?
                .collect::<Result<_, _>>()?
        };
        ensure!(!paths.is_empty(), "no images found at `{}`", source);
        info!("reading {} image(s) from `{}`", paths.len(), source);
        Ok(Self::from_paths(paths, order))
    }
}

impl Capture for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let path = match self.paths.next() {
            Some(p) => p,
            None => return Ok(None),
        };
        match image::open(&path) {
            Ok(image) => {
                let rgb = image.into_rgb8();
                let (width, height) = rgb.dimensions();
                let frame = Frame::from_raw(width as usize, height as usize, rgb.into_raw(), self.order)?;
                Ok(Some(frame))
            }
            Err(e) => {
                warn!("could not decode `{}` ({}); ending stream", path.display(), e);
                self.paths = Vec::new().into_iter();
                Ok(None)
            }
        }
    }
}

/// Parse `WIDTHxHEIGHT` as printed by
/// `ffprobe -of csv=s=x:p=0`.
pub fn parse_probe_output(output: &str) -> Result<(usize, usize)> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"(?m)^\s*(\d+)x(\d+)").unwrap();
    }
    let caps = RE
        .captures(output)
        .ok_or_else(|| anyhow!("unexpected ffprobe output: {:?}", output.trim()))?;
    let width = caps[1].parse()?;
    let height = caps[2].parse()?;
    ensure!(width > 0 && height > 0, "video has empty frames ({}x{})", width, height);
    Ok((width, height))
}

fn probe_dimensions(path: &Path) -> Result<(usize, usize)> {
    let output = Command::new("ffprobe")
        .args(&[
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .output()
        .context("running ffprobe (is ffmpeg installed?)")?;
    ensure!(
        output.status.success(),
        "ffprobe failed on `{}`: {}",
        path.display(),
        String::from_utf8_lossy(&output.stderr).trim()
    );
    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Frames decoded from a video file by an `ffmpeg` child
/// process.
pub struct FfmpegCapture {
    child: Child,
    stdout: ChildStdout,
    width: usize,
    height: usize,
    order: ChannelOrder,
}

impl FfmpegCapture {
    pub fn open(path: &Path, order: ChannelOrder) -> Result<Self> {
        ensure!(path.is_file(), "cannot read input video `{}`", path.display());
        let (width, height) = probe_dimensions(path)?;
        let mut child = Command::new("ffmpeg")
            .args(&["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(&["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .context("spawning ffmpeg (is it installed?)")?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdout not captured"))?;
        info!("decoding `{}` ({}x{})", path.display(), width, height);
        Ok(FfmpegCapture {
            child,
            stdout,
            width,
            height,
            order,
        })
    }
}

impl Capture for FfmpegCapture {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut buf = vec![0u8; self.width * self.height * 3];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => Ok(Some(Frame::from_raw(self.width, self.height, buf, self.order)?)),
            Err(e) => {
                if e.kind() != ErrorKind::UnexpectedEof {
                    warn!("reading decoded frame failed ({}); ending stream", e);
                }
                Ok(None)
            }
        }
    }
}

impl Drop for FfmpegCapture {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Annotated frames encoded into a video file by an
/// `ffmpeg` child process, started at the first frame.
pub struct FfmpegEncoder {
    output: PathBuf,
    fps: u32,
    process: Option<(Child, ChildStdin)>,
}

impl FfmpegEncoder {
    pub fn new(output: &Path, fps: u32) -> Self {
        FfmpegEncoder {
            output: output.into(),
            fps,
            process: None,
        }
    }

    fn spawn(&self, width: u32, height: u32) -> Result<(Child, ChildStdin)> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(&["-v", "error", "-y", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .arg("-s")
            .arg(format!("{}x{}", width, height))
            .arg("-r")
            .arg(self.fps.to_string())
            .args(&["-i", "-"]);
        if self
            .output
            .extension()
            .map_or(false, |e| e.eq_ignore_ascii_case("avi"))
        {
            cmd.args(&["-c:v", "mpeg4", "-vtag", "DIVX"]);
        }
        let mut child = cmd
            .arg(&self.output)
            .stdin(Stdio::piped())
            .spawn()
            .context("spawning ffmpeg (is it installed?)")?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdin not captured"))?;
        info!(
            "encoding {}x{} at {} fps into `{}`",
            width,
            height,
            self.fps,
            self.output.display()
        );
        Ok((child, stdin))
    }
}

impl Encoder for FfmpegEncoder {
    fn write_frame(&mut self, field: &VisualizationField) -> Result<()> {
        if self.process.is_none() {
            let (width, height) = field.dimensions();
            self.process = Some(self.spawn(width, height)?);
        }
        if let Some((_, stdin)) = self.process.as_mut() {
            stdin
                .write_all(field.as_raw())
                .context("writing frame to ffmpeg")?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        match self.close()? {
            Some(status) => ensure!(status.success(), "ffmpeg exited with {}", status),
            None => warn!("no frames to encode; `{}` was not written", self.output.display()),
        }
        Ok(())
    }
}

impl FfmpegEncoder {
    /// Close ffmpeg's input and reap it. `None` when it was
    /// never started.
    fn close(&mut self) -> Result<Option<ExitStatus>> {
        match self.process.take() {
            Some((mut child, stdin)) => {
                drop(stdin);
                Ok(Some(child.wait().context("waiting for ffmpeg")?))
            }
            None => Ok(None),
        }
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if let Ok(Some(status)) = self.close() {
            debug!("ffmpeg closed early ({})", status);
        }
    }
}

/// Annotated frames written as numbered PNG files.
pub struct ImageSequenceEncoder {
    dir: PathBuf,
    next_index: usize,
}

impl ImageSequenceEncoder {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("creating `{}`", dir.display()))?;
        Ok(ImageSequenceEncoder {
            dir: dir.into(),
            next_index: 0,
        })
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", index))
    }
}

impl Encoder for ImageSequenceEncoder {
    fn write_frame(&mut self, field: &VisualizationField) -> Result<()> {
        let path = self.frame_path(self.next_index);
        field
            .save(&path)
            .with_context(|| format!("writing `{}`", path.display()))?;
        self.next_index += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        info!("wrote {} frame(s) to `{}`", self.next_index, self.dir.display());
        Ok(())
    }
}

/// Enforces that every frame has the `(height, width)` of
/// the first one.
pub struct DimensionGuard<E> {
    inner: E,
    dim: Option<(usize, usize)>,
    written: usize,
}

impl<E: Encoder> DimensionGuard<E> {
    pub fn new(inner: E) -> Self {
        DimensionGuard {
            inner,
            dim: None,
            written: 0,
        }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: Encoder> Encoder for DimensionGuard<E> {
    fn write_frame(&mut self, field: &VisualizationField) -> Result<()> {
        let dim = field_dim(field);
        match self.dim {
            None => self.dim = Some(dim),
            Some(expected) if expected != dim => bail!(
                "frame {} is {}x{}, expected {}x{} like the first frame",
                self.written,
                dim.1,
                dim.0,
                expected.1,
                expected.0
            ),
            Some(_) => {}
        }
        self.inner.write_frame(field)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.finish()
    }
}

impl<E: Encoder + ?Sized> Encoder for &mut E {
    fn write_frame(&mut self, field: &VisualizationField) -> Result<()> {
        (**self).write_frame(field)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Pick a capture for `input`: an image sequence for
/// directories and glob patterns, a video file otherwise.
pub fn open_capture(input: &str, order: ChannelOrder) -> Result<Box<dyn Capture>> {
    let path = Path::new(input);
    if path.is_dir() || is_glob_pattern(input) || (path.is_file() && has_image_extension(path)) {
        Ok(Box::new(ImageSequence::open(input, order)?))
    } else {
        Ok(Box::new(FfmpegCapture::open(path, order)?))
    }
}

/// Pick an encoder for `output`: numbered PNGs for a path
/// without extension, a video file otherwise.
pub fn open_encoder(output: &Path, fps: u32) -> Result<Box<dyn Encoder>> {
    ensure!(fps > 0, "output frame rate must be positive");
    if output.is_dir() || output.extension().is_none() {
        Ok(Box::new(ImageSequenceEncoder::create(output)?))
    } else {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating `{}`", parent.display()))?;
        }
        Ok(Box::new(FfmpegEncoder::new(output, fps)))
    }
}
