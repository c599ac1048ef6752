//! docscan command-line tool.
//!
//! Reads document fields one at a time from a still image or a live frame
//! file, and writes the accumulated record as JSON and/or CSV.

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use docscan::capture::{DisplaySize, FrameSource, SnapshotFileSource, StaticImageSource};
use docscan::config::{load_config, ScanConfig};
use docscan::ocr::{crop_roi, normalize, TesseractCli};
use docscan::scan::{
    append_csv, write_json, IntervalTicker, RecordPayload, ScanController, ScanOutcome,
    ScanSession,
};
use docscan::template::RecordTemplate;
use docscan::{logging, paths};

#[derive(Parser)]
#[command(name = "docscan", version, about = "Read document fields through a fixed guide box")]
struct Cli {
    /// Config file (defaults to config.json next to the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List record templates and their fields
    Templates,

    /// Print the region of interest for a source/display size pair
    Roi {
        /// Source resolution, WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        source: DisplaySize,
        /// Rendered size, WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        display: DisplaySize,
    },

    /// Write the normalized guide-box image that OCR would see
    Preprocess {
        image: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, value_parser = parse_size)]
        display: Option<DisplaySize>,
    },

    /// Scan fields from still images (static mode)
    Scan {
        #[arg(short, long)]
        template: String,
        /// Image used for fields without their own
        image: Option<PathBuf>,
        /// Field to read, as KEY or KEY=IMAGE (repeatable, in order)
        #[arg(short, long = "field", required = true)]
        fields: Vec<String>,
        #[arg(long, value_parser = parse_size)]
        display: Option<DisplaySize>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Scan fields from a continuously updated frame file (live mode)
    Watch {
        #[arg(short, long)]
        template: String,
        /// Frame file kept up to date by a capture tool
        frame: PathBuf,
        /// Field to read (repeatable, in order)
        #[arg(short, long = "field", required = true)]
        fields: Vec<String>,
        /// Give up on a field after this many ticks
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_ticks: Option<u64>,
        #[arg(long, value_parser = parse_size)]
        display: Option<DisplaySize>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Write the record as JSON (defaults to the output directory)
    #[arg(long)]
    json: Option<PathBuf>,
    /// Append the record as a CSV row
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn parse_size(s: &str) -> std::result::Result<DisplaySize, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let width = w.trim().parse().map_err(|e| format!("bad width '{}': {}", w, e))?;
    let height = h.trim().parse().map_err(|e| format!("bad height '{}': {}", h, e))?;
    Ok(DisplaySize { width, height })
}

/// Splits `KEY=IMAGE` into its parts.
fn parse_field_arg(arg: &str) -> (&str, Option<PathBuf>) {
    match arg.split_once('=') {
        Some((key, path)) => (key, Some(PathBuf::from(path))),
        None => (arg, None),
    }
}

fn build_controller(
    config: &ScanConfig,
    template: RecordTemplate,
    source: Box<dyn FrameSource>,
) -> ScanController<TesseractCli> {
    let session = ScanSession::new(template, source.mode());
    ScanController::new(session, source, TesseractCli::new(config.tesseract.clone()))
        .with_profiles(config.profiles())
        .with_guide(config.guide_box)
        .with_timing(config.timing())
}

fn open_static(path: &Path, display: Option<DisplaySize>) -> Result<StaticImageSource> {
    let source = StaticImageSource::open(path)
        .with_context(|| format!("Failed to open image {}", path.display()))?;
    Ok(match display {
        Some(d) => source.with_display(d),
        None => source,
    })
}

fn report(label: &str, outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::Recognized { text, .. } => println!("{}: {}", label, text),
        ScanOutcome::NoText => println!("{}: (no text found, realign)", label),
        ScanOutcome::Failed(e) => println!("{}: (error: {})", label, e),
        ScanOutcome::Skipped(reason) => println!("{}: (skipped: {})", label, reason),
    }
}

fn export(session: &ScanSession, output: &OutputArgs) -> Result<()> {
    let payload = RecordPayload::from_session(session);

    let json_path = match &output.json {
        Some(path) => path.clone(),
        None => paths::get_output_dir().join(format!(
            "{}_{}.json",
            Local::now().format("%Y%m%d_%H%M%S"),
            payload.sheet_name
        )),
    };
    write_json(&json_path, &payload)?;
    tracing::info!(path = %json_path.display(), "record written");

    if let Some(csv_path) = &output.csv {
        append_csv(csv_path, session)?;
        tracing::info!(path = %csv_path.display(), "record appended");
    }
    Ok(())
}

fn print_record(session: &ScanSession) {
    println!("[{}]", session.template().name);
    for (field, value) in session.ordered_results() {
        println!("  {} ({}): {}", field.label, field.key, value.unwrap_or("-"));
    }
}

async fn run_scan(
    config: &ScanConfig,
    template: &str,
    image: Option<PathBuf>,
    fields: &[String],
    display: Option<DisplaySize>,
    output: &OutputArgs,
) -> Result<()> {
    let template = config.catalog().get(template)?.clone();
    let display = display.or(config.display);

    // Validate everything before starting the engine
    let mut plan = Vec::new();
    for arg in fields {
        let (key, own_image) = parse_field_arg(arg);
        let label = template.require_field(key)?.label.clone();
        let path = own_image
            .or_else(|| image.clone())
            .ok_or_else(|| anyhow!("no image for field '{}'", key))?;
        plan.push((key.to_string(), label, path));
    }

    let first_image = &plan[0].2;
    let controller = build_controller(
        config,
        template,
        Box::new(open_static(first_image, display)?),
    );
    // A failed start is retried by the first attempt
    if let Err(e) = controller.warm_up().await {
        tracing::warn!(error = %e, "OCR engine not ready yet");
    }

    let mut current_image = first_image.clone();
    for (key, label, path) in &plan {
        if *path != current_image {
            controller.set_source(Box::new(open_static(path, display)?));
            current_image = path.clone();
        }
        controller.wait_for_cooldown().await;
        if let Some(outcome) = controller.select_and_trigger(key).await? {
            report(label, &outcome);
        }
    }

    let session = controller.session();
    print_record(&session);
    export(&session, output)
}

async fn run_watch(
    config: &ScanConfig,
    template: &str,
    frame: PathBuf,
    fields: &[String],
    max_ticks: Option<u64>,
    display: Option<DisplaySize>,
    output: &OutputArgs,
) -> Result<()> {
    let template = config.catalog().get(template)?.clone();
    let labels = fields
        .iter()
        .map(|key| template.require_field(key).map(|f| f.label.clone()))
        .collect::<docscan::Result<Vec<_>>>()?;

    let mut source = SnapshotFileSource::new(frame);
    if let Some(d) = display.or(config.display) {
        source = source.with_display(d);
    }
    let controller = build_controller(config, template, Box::new(source));

    // A failed start is retried by the first attempt
    if let Err(e) = controller.warm_up().await {
        tracing::warn!(error = %e, "OCR engine not ready yet");
    }

    let mut ticker = IntervalTicker::new(config.timing().tick_interval);
    for (key, label) in fields.iter().zip(&labels) {
        controller.select_field(key)?;
        println!("Align \"{}\" with the guide box...", label);

        let mut ticks_left = max_ticks;
        let scan = controller.run_live(&mut ticker, |outcome| {
            if let ScanOutcome::Recognized { .. } = outcome {
                report(label, outcome);
                return false;
            }
            if let ScanOutcome::Failed(e) = outcome {
                tracing::debug!(error = %e, "attempt failed, retrying next tick");
            }
            match ticks_left.as_mut() {
                Some(n) if *n <= 1 => false,
                Some(n) => {
                    *n -= 1;
                    true
                }
                None => true,
            }
        });

        tokio::select! {
            ticks = scan => tracing::debug!(field = %key, ticks, "field done"),
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted");
                break;
            }
        }
    }

    let session = controller.session();
    print_record(&session);
    export(&session, output)
}

fn run_preprocess(
    config: &ScanConfig,
    image: &Path,
    output: &Path,
    display: Option<DisplaySize>,
) -> Result<()> {
    let source = open_static(image, display.or(config.display))?;
    let frame = source.snapshot()?;
    let display = source.display_size();
    let roi = config
        .guide_box
        .compute_roi(frame.width(), frame.height(), display.width, display.height)?;
    let normalized = normalize(&crop_roi(&frame, &roi)?)?;
    normalized
        .save(output)
        .with_context(|| format!("Failed to save {}", output.display()))?;
    println!(
        "ROI x={} y={} {}x{} -> {}",
        roi.x,
        roi.y,
        roi.width,
        roi.height,
        output.display()
    );
    Ok(())
}

fn list_templates(config: &ScanConfig) {
    let profiles = config.profiles();
    for template in config.catalog().iter() {
        println!("{}", template.name);
        for field in &template.fields {
            let profile = profiles.resolve(&field.label);
            println!("  {:<20} {:<12} {:?}", field.key, field.label, profile.class);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    paths::ensure_directories()?;
    logging::init_logging(cli.verbose)?;

    let config_path = cli.config.clone().unwrap_or_else(paths::default_config_path);
    let config = load_config(&config_path);

    match cli.command {
        Command::Templates => list_templates(&config),
        Command::Roi { source, display } => {
            let roi = config
                .guide_box
                .compute_roi(source.width, source.height, display.width, display.height)?;
            println!("x={} y={} width={} height={}", roi.x, roi.y, roi.width, roi.height);
        }
        Command::Preprocess {
            image,
            output,
            display,
        } => run_preprocess(&config, &image, &output, display)?,
        Command::Scan {
            template,
            image,
            fields,
            display,
            output,
        } => run_scan(&config, &template, image, &fields, display, &output).await?,
        Command::Watch {
            template,
            frame,
            fields,
            max_ticks,
            display,
            output,
        } => run_watch(&config, &template, frame, &fields, max_ticks, display, &output).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1280x720").unwrap(), DisplaySize { width: 1280, height: 720 });
        assert_eq!(parse_size("640X360").unwrap().height, 360);
        assert!(parse_size("1280").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn test_parse_field_arg() {
        assert_eq!(parse_field_arg("kingaku"), ("kingaku", None));
        assert_eq!(
            parse_field_arg("kingaku=amount.png"),
            ("kingaku", Some(PathBuf::from("amount.png")))
        );
    }

    #[test]
    fn test_cli_parses_scan() {
        let cli = Cli::try_parse_from([
            "docscan", "scan", "-t", "支払明細", "page.png", "-f", "kingaku", "-f", "no=no.png",
        ])
        .unwrap();
        match cli.command {
            Command::Scan { template, fields, image, .. } => {
                assert_eq!(template, "支払明細");
                assert_eq!(fields, vec!["kingaku", "no=no.png"]);
                assert_eq!(image, Some(PathBuf::from("page.png")));
            }
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn test_cli_max_ticks_must_be_positive() {
        let base = ["docscan", "watch", "-t", "支払明細", "frame.png", "-f", "no"];

        let zero = Cli::try_parse_from(base.iter().copied().chain(["--max-ticks", "0"]));
        assert!(zero.is_err());

        let cli = Cli::try_parse_from(base.iter().copied().chain(["--max-ticks", "3"])).unwrap();
        match cli.command {
            Command::Watch { max_ticks, .. } => assert_eq!(max_ticks, Some(3)),
            _ => panic!("expected watch"),
        }
    }
}
