mod demo;
mod drive;
mod report;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Duration;

use tourtrack_core::{Coordinate, Tour, TrackingConfig, UserId};

use drive::{DriveOptions, Ending, drive_session};
use report::RunReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PositionMode {
    /// Walk a routed path from the origin through every key point
    Simulate,
    /// Pin the tourist to the given positions one poll at a time
    Manual,
}

#[derive(Debug, Parser)]
#[command(name = "tourtrack-sim", version)]
#[command(about = "Drive a tour execution with simulated or manual positions and report the outcome")]
struct Args {
    /// Tour JSON file (defaults to the embedded Belgrade demo tour)
    #[arg(long)]
    tour: Option<PathBuf>,

    /// Tracking config JSON file; missing fields take defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the tour's key points and exit
    #[arg(long)]
    list_key_points: bool,

    /// Tourist id
    #[arg(long, default_value = "tourist")]
    user: String,

    /// Position source
    #[arg(long, value_enum, default_value_t = PositionMode::Simulate)]
    mode: PositionMode,

    /// Starting position as `lat,lon` (simulate mode)
    #[arg(long, allow_hyphen_values = true)]
    origin: Option<Coordinate>,

    /// Positions as `lat,lon;lat,lon;...` (manual mode)
    #[arg(long, allow_hyphen_values = true)]
    positions: Option<String>,

    /// Override the simulation tick in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Override the polling interval in milliseconds
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Override the proximity threshold in metres
    #[arg(long)]
    threshold: Option<f64>,

    /// Abandon the tour after this many seconds
    #[arg(long)]
    abandon_after: Option<f64>,

    /// Give up (and abandon) after this many seconds
    #[arg(long, default_value_t = 600.0)]
    max_seconds: f64,

    /// Seed for deterministic execution ids
    #[arg(long)]
    seed: Option<u64>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let tour = load_tour(&args)?;
    if maybe_list_key_points(&args, &tour)? {
        return Ok(());
    }
    let config = load_config(&args)?;
    let options = drive_options(&args, &tour, &config)?;

    announce_banner(&tour, &args);
    let outcome = drive_session(tour, config, options).await?;
    let report = RunReport::from_outcome(&outcome);
    write_report(&args, &report)?;

    if outcome.ending == Ending::TimedOut {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn load_tour(args: &Args) -> Result<Tour> {
    match &args.tour {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Tour::from_json(&json).with_context(|| format!("invalid tour in {}", path.display()))
        }
        None => demo::demo_tour(),
    }
}

fn load_config(args: &Args) -> Result<TrackingConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            TrackingConfig::from_json(&json)
                .with_context(|| format!("invalid config in {}", path.display()))?
        }
        None => TrackingConfig::default(),
    };
    if let Some(tick) = args.tick_ms {
        config.simulation_tick_ms = tick;
    }
    if let Some(poll) = args.poll_ms {
        config.poll_interval_ms = poll;
    }
    if let Some(threshold) = args.threshold {
        config.proximity_threshold_m = threshold;
    }
    config.validate().context("invalid tracking config")?;
    Ok(config)
}

fn seconds(value: f64, flag: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("--{flag} must be a non-negative number"))
}

fn drive_options(args: &Args, tour: &Tour, config: &TrackingConfig) -> Result<DriveOptions> {
    let positions = match (args.mode, args.positions.as_deref()) {
        (PositionMode::Manual, Some(list)) => demo::parse_positions(list)?,
        (PositionMode::Manual, None) => tour.waypoints(),
        (PositionMode::Simulate, Some(_)) => bail!("--positions only applies to manual mode"),
        (PositionMode::Simulate, None) => Vec::new(),
    };
    let origin = match args.origin {
        Some(origin) => origin,
        None => demo::default_origin(tour),
    };
    Ok(DriveOptions {
        user: UserId::from(args.user.as_str()),
        mode: args.mode,
        origin,
        positions,
        // Two polls per pin so every position is sampled at least once.
        pin_every: config.poll_interval() * 2,
        abandon_after: args
            .abandon_after
            .map(|secs| seconds(secs, "abandon-after"))
            .transpose()?,
        max_duration: seconds(args.max_seconds, "max-seconds")?,
        seed: args.seed,
        verbose: args.verbose,
    })
}

fn maybe_list_key_points(args: &Args, tour: &Tour) -> Result<bool> {
    if !args.list_key_points {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Key points of {}:", tour.id)?;
    for kp in tour.key_points() {
        writeln!(
            output_target.writer(),
            "  {:>2}. {:30} {}",
            kp.ordinal,
            kp.label(),
            kp.coordinate()
        )?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner(tour: &Tour, args: &Args) {
    let title = if tour.name.is_empty() {
        tour.id.to_string()
    } else {
        tour.name.clone()
    };
    println!("{}", format!("🧭 {title}").bright_cyan().bold());
    println!("{}", "================================".cyan());
    println!(
        "{} key points, {:?} positions for {}",
        tour.key_points().len(),
        args.mode,
        args.user.bold()
    );
}

fn write_report(args: &Args, report: &RunReport) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;
    match args.report.as_str() {
        "json" => report::generate_json_report(&mut output_target, report)?,
        "markdown" => report::generate_markdown_report(&mut output_target, report)?,
        _ => report::generate_console_report(&mut output_target, report)?,
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
