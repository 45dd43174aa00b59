use anyhow::Result;
use clap::{value_t, value_t_or_exit, ArgMatches};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};
use thermal_screening::{
    args_parser,
    config::{Configuration, MaskMode},
    frame::ChannelOrder,
    opt,
    runner::RunOptions,
};

pub struct Args {
    pub config: Configuration,
    pub input: String,
    pub output: PathBuf,
    pub fps: u32,
    pub order: ChannelOrder,
    pub report: Option<PathBuf>,
    pub quiet: bool,
    pub run: RunOptions,
}

/// Parse an optional flag, exiting with clap's message on
/// malformed values.
macro_rules! maybe {
    ($matches:ident, $name:expr, $ty:ty) => {
        $matches
            .is_present($name)
            .then(|| value_t_or_exit!($matches.value_of($name), $ty))
    };
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        Args::from_matches(&matches_from(std::env::args_os()))
    }

    fn from_matches(matches: &ArgMatches) -> Result<Args> {
        let config = config_from_matches(matches)?;
        let input = value_t_or_exit!(matches, "input", String);
        let output = value_t_or_exit!(matches, "output", PathBuf);
        let fps = value_t_or_exit!(matches, "fps", u32);
        let report = maybe!(matches, "report", PathBuf);
        let order = if matches.is_present("bgr") {
            ChannelOrder::Bgr
        } else {
            ChannelOrder::Rgb
        };
        let quiet = matches.is_present("quiet");
        let run = RunOptions {
            jobs: value_t_or_exit!(matches, "jobs", usize).max(1),
            batch_size: value_t_or_exit!(matches, "batch size", usize).max(1),
            progress: !quiet,
        };

        Ok(Args {
            config,
            input,
            output,
            fps,
            order,
            report,
            quiet,
            run,
        })
    }
}

fn matches_from<I, T>(args: I) -> ArgMatches<'static>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = args_parser!("thermal-screen")
        .setting(clap::AppSettings::AllowLeadingHyphen)
        .about("Detect and annotate hot regions in thermal video.")
        .arg(
            opt!("threshold temperature")
                .short("t")
                .help("Alert at or above this temperature (default: 100.5)"),
        )
        .arg(
            opt!("binary threshold")
                .short("b")
                .help("Pixel value (0-255) for the binary threshold (default: 200)"),
        )
        .arg(
            opt!("conversion factor")
                .short("c")
                .help("Divisor converting pixel value to temperature (default: 2.25)"),
        )
        .arg(
            opt!("min area")
                .short("a")
                .help("Minimum bounding box area of a region (default: 2400)"),
        )
        .arg(
            opt!("mask mode")
                .possible_values(&["filled", "boundary"])
                .help("Pixels averaged per region (default: filled)"),
        )
        .arg(opt!("config").help("JSON file with screening parameters"))
        .arg(
            opt!("input")
                .short("i")
                .default_value("data/input.mp4")
                .help("Input video, image directory or glob pattern"),
        )
        .arg(
            opt!("output")
                .short("o")
                .default_value("output/output.avi")
                .help("Output video, or directory for PNG frames"),
        )
        .arg(
            opt!("fps")
                .short("f")
                .default_value("15")
                .help("Frame rate of the output video"),
        )
        .arg(
            opt!("jobs")
                .short("j")
                .default_value("1")
                .help("Frames processed in parallel"),
        )
        .arg(
            opt!("batch size")
                .default_value("32")
                .help("Frames pulled per parallel batch"),
        )
        .arg(opt!("report").help("Write per-frame detections as JSON lines"))
        .arg(
            opt!("bgr")
                .takes_value(false)
                .help("Input pixels are in BGR order"),
        )
        .arg(
            opt!("quiet")
                .short("q")
                .takes_value(false)
                .help("Only log warnings and hide progress"),
        )
        .get_matches_from(args);
    matches
}

/// Defaults, overlaid by the `--config` file, overlaid by
/// individual flags.
fn config_from_matches(matches: &ArgMatches) -> Result<Configuration> {
    let mut config = match matches.value_of("config") {
        Some(path) => Configuration::from_json_path(Path::new(path))?,
        None => Configuration::default(),
    };
    if let Some(v) = maybe!(matches, "threshold temperature", f64) {
        config.threshold_temperature = v;
    }
    if matches.is_present("binary threshold") {
        config.binary_threshold = value_t!(matches, "binary threshold", i64)?;
    }
    if let Some(v) = maybe!(matches, "conversion factor", f64) {
        config.conversion_factor = v;
    }
    if let Some(v) = maybe!(matches, "min area", usize) {
        config.min_area = v;
    }
    match matches.value_of("mask mode") {
        Some("boundary") => config.mask_mode = MaskMode::Boundary,
        Some("filled") => config.mask_mode = MaskMode::Filled,
        _ => {}
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn flags_override_config_file() -> Result<()> {
        let path = env::temp_dir().join(format!("thermal-screen-args-{}.json", std::process::id()));
        fs::write(&path, r#"{ "threshold_temperature": 90.0, "min_area": 100 }"#)?;
        let path_arg = path.to_string_lossy().into_owned();

        let from_file = config_from_matches(&matches_from(vec!["thermal-screen", "--config", path_arg.as_str()]))?;
        assert_eq!(from_file.threshold_temperature, 90.);
        assert_eq!(from_file.min_area, 100);

        let matches = matches_from(vec![
            "thermal-screen",
            "--config",
            path_arg.as_str(),
            "-t",
            "120.5",
            "--mask-mode",
            "boundary",
        ]);
        let config = config_from_matches(&matches)?;
        fs::remove_file(&path)?;

        assert_eq!(config.threshold_temperature, 120.5);
        assert_eq!(config.min_area, 100);
        assert_eq!(config.mask_mode, MaskMode::Boundary);
        assert_eq!(config.conversion_factor, Configuration::default().conversion_factor);
        Ok(())
    }

    #[test]
    fn defaults_without_flags() -> Result<()> {
        let args = Args::from_matches(&matches_from(vec!["thermal-screen"]))?;
        assert_eq!(args.config, Configuration::default());
        assert_eq!(args.input, "data/input.mp4");
        assert_eq!(args.output, PathBuf::from("output/output.avi"));
        assert_eq!(args.fps, 15);
        assert_eq!(args.order, ChannelOrder::Rgb);
        assert!(args.report.is_none());
        assert_eq!(args.run.jobs, 1);
        Ok(())
    }
}
