//! White Christmas probability maps for Finland from the FMI daily 10 km
//! snow-depth grids (Paituli: il_daily_snow_10km_geotiff_euref).
//!
//! Data directory layout: snow_{year}.tif, one multi-band GeoTIFF per year.
//! Regions overlay: GeoJSON in EPSG:3067.
mod pipeline;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use snow_core::{AnalysisConfig, WhiteMethod, YearRange};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "white-xmas", about = "White Christmas probability maps from FMI snow-depth grids")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON config file; flags below override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory containing snow_{year}.tif
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// GeoJSON region outlines to draw on the maps
    #[arg(long, global = true)]
    regions: Option<PathBuf>,

    /// Output directory (created if absent)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Snow depth in cm for a Christmas to count as white
    #[arg(long, global = true)]
    threshold: Option<f32>,

    /// How the three Christmas days are combined
    #[arg(long, value_enum, global = true)]
    method: Option<MethodArg>,

    /// Expect gaps in the yearly files (logged at debug instead of warn);
    /// `--missing-data=false` overrides a config file that sets it
    #[arg(long, global = true, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    missing_data: Option<bool>,

    /// Draw maps on the native ETRS-TM35FIN grid instead of Web Mercator
    #[arg(long, global = true)]
    no_reproject: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probability map for one period
    Probability {
        /// Period as START-END (default from config: 1991-2020)
        #[arg(long, value_parser = parse_range)]
        period: Option<YearRange>,
    },
    /// Probability maps for two periods and the change between them
    Compare {
        #[arg(long, value_parser = parse_range)]
        period: Option<YearRange>,
        /// Reference period (default from config: 1961-1990)
        #[arg(long, value_parser = parse_range)]
        baseline: Option<YearRange>,
    },
    /// White / no-snow map of one Christmas
    Year {
        #[arg(long)]
        year: i32,
    },
    /// Share of the country with a white Christmas, year by year
    Yearly {
        #[arg(long, value_parser = parse_range)]
        period: Option<YearRange>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MethodArg {
    /// Mean depth over 24-26 Dec reaches the threshold
    Average,
    /// Each of 24-26 Dec reaches the threshold
    AllDays,
}

impl From<MethodArg> for WhiteMethod {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::Average => WhiteMethod::Average,
            MethodArg::AllDays => WhiteMethod::AllDays,
        }
    }
}

fn parse_range(s: &str) -> Result<YearRange, String> {
    s.parse().map_err(|e: snow_core::SnowError| e.to_string())
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Config file (or defaults) with command-line overrides applied.
fn resolve_config(args: &Args) -> Result<AnalysisConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            AnalysisConfig::load(path).with_context(|| format!("Cannot load config {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };

    if let Some(dir) = &args.data_dir {
        cfg.data_dir = dir.clone();
    }
    if let Some(regions) = &args.regions {
        cfg.regions = Some(regions.clone());
    }
    if let Some(output) = &args.output {
        cfg.output_dir = output.clone();
    }
    if let Some(threshold) = args.threshold {
        cfg.snow_threshold = threshold;
    }
    if let Some(method) = args.method {
        cfg.method = method.into();
    }
    if let Some(missing_data) = args.missing_data {
        cfg.missing_data = missing_data;
    }
    if args.no_reproject {
        cfg.reproject = false;
    }

    cfg.validate().context("Invalid configuration")?;
    Ok(cfg)
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&args.log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cfg = resolve_config(&args)?;
    info!(
        data_dir = %cfg.data_dir.display(),
        output = %cfg.output_dir.display(),
        threshold = cfg.snow_threshold,
        method = ?cfg.method,
        "white-xmas starting"
    );

    match args.command {
        Command::Probability { period } => {
            let s = pipeline::run_probability(&cfg, period.unwrap_or(cfg.period))?;
            info!(period = %s.period, map = %s.map.display(), "probability map done");
        }
        Command::Compare { period, baseline } => {
            let s = pipeline::run_compare(&cfg, period.unwrap_or(cfg.period), baseline.unwrap_or(cfg.baseline))?;
            info!(
                fewer_white = s.change.fewer_white,
                unchanged = s.change.unchanged,
                more_white = s.change.more_white,
                mean_percent_change = s.change.mean_percent_change,
                "comparison done"
            );
        }
        Command::Year { year } => {
            let s = pipeline::run_year(&cfg, year)?;
            info!(year, white_share = s.white_share, map = %s.map.display(), "year map done");
        }
        Command::Yearly { period } => {
            let s = pipeline::run_yearly(&cfg, period.unwrap_or(cfg.period))?;
            info!(period = %s.period, years = s.years.len(), "yearly summary done");
        }
    }

    Ok(())
}
