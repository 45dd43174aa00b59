mod args;

use anyhow::{Context, Result};
use log::info;
use thermal_screening::{
    cli::{init_logging, ReportWriter},
    runner::Runner,
    video::{open_capture, open_encoder, CancelToken, HeadlessDisplay},
};

use args::Args;

fn main() -> Result<()> {
    let args = Args::from_cmd_line()?;
    init_logging(args.quiet);

    args.config.validate().context("invalid configuration")?;
    let mut capture = open_capture(&args.input, args.order)
        .with_context(|| format!("opening input `{}`", args.input))?;
    let mut encoder = open_encoder(&args.output, args.fps)?;
    let mut report = args.report.as_deref().map(ReportWriter::create).transpose()?;
    let mut display = HeadlessDisplay::new(CancelToken::new());

    let runner = Runner::new(&args.config, args.run.clone())?;
    let summary = runner.run(
        capture.as_mut(),
        &mut display,
        encoder.as_mut(),
        |index, frame| match report.as_mut() {
            Some(report) => report.record(index, frame),
            None => Ok(()),
        },
    )?;
    if let Some(report) = report {
        report.finish()?;
    }

    info!("output written to `{}`", args.output.display());
    serde_json::to_writer(std::io::stdout().lock(), &summary)?;
    println!();
    Ok(())
}
