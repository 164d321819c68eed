use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use balloon_pred_core::{
    CsvWriter, DirectoryTileStore, EnsembleConfig, EnsembleIntegrator, FlightProfile, KmlWriter,
    LaunchSite, PositionWriter, RunOutcome, Scenario, TeeWriter, TileCache, WindGridConfig,
    WindSampling,
};

/// High-altitude balloon flight path predictor
#[derive(Parser, Debug)]
#[command(name = "predict", version)]
#[command(about = "Predicts balloon flight paths from decoded GFS wind tiles", long_about = None)]
struct Args {
    /// Launch latitude in decimal degrees
    #[arg(value_name = "LATITUDE", required_unless_present = "scenario")]
    #[arg(conflicts_with = "scenario")]
    latitude: Option<f64>,

    /// Launch longitude in decimal degrees
    #[arg(value_name = "LONGITUDE", required_unless_present = "scenario")]
    #[arg(conflicts_with = "scenario")]
    longitude: Option<f64>,

    /// Launch altitude in metres above sea level
    #[arg(value_name = "ALTITUDE", required_unless_present = "scenario")]
    #[arg(conflicts_with = "scenario")]
    altitude: Option<f64>,

    /// Altitude in metres at which the balloon bursts
    #[arg(short, long, conflicts_with = "scenario")]
    burst_altitude: Option<f64>,

    /// Ascent rate in metres per second
    #[arg(short, long, conflicts_with = "scenario")]
    ascent_rate: Option<f64>,

    /// Drag coefficient of the payload under parachute
    #[arg(long, conflicts_with = "scenario")]
    drag_coeff: Option<f64>,

    /// Sea-level descent rate in metres per second, as an alternative to
    /// the drag coefficient
    #[arg(long, conflicts_with = "scenario")]
    descent_rate: Option<f64>,

    /// Start the flight in the descent phase; no burst altitude or ascent
    /// rate is needed
    #[arg(short, long, conflicts_with = "scenario")]
    descending: bool,

    /// Launch time as a Unix timestamp, defaulting to now
    #[arg(short = 't', long, value_name = "UNIX", conflicts_with = "scenario")]
    start_time: Option<i64>,

    /// Directory holding the decoded wind tile files
    #[arg(short = 'i', long, value_name = "DIR", default_value = ".")]
    data_dir: PathBuf,

    /// CSV trajectory output file, "-" for stdout
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    output: String,

    /// Also write the trajectory as KML to this file
    #[arg(short, long, value_name = "FILE")]
    kml: Option<PathBuf>,

    /// Number of ensemble particles to fly
    #[arg(long, default_value_t = 300, conflicts_with = "scenario")]
    particles: usize,

    /// RMS wind error in metres per second; a value above zero draws each
    /// particle's wind from a Gaussian around the forecast
    #[arg(long, default_value_t = 0.0, conflicts_with = "scenario")]
    rms_wind_error: f64,

    /// Run scenario JSON file, replacing the launch and flight arguments
    #[arg(short, long, value_name = "FILE")]
    scenario: Option<PathBuf>,

    /// More log output on stderr; repeat for debug detail
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let Scenario { launch, flight: profile, ensemble } = build_scenario(&args)?;
    let flight = profile.to_parameters().context("invalid flight profile")?;

    let grid = WindGridConfig::default();
    let store = DirectoryTileStore::open_dir(&args.data_dir, &grid)
        .with_context(|| format!("indexing wind data in {}", args.data_dir.display()))?;
    let cache = TileCache::new(store, grid)?;

    let writer = build_writer(&args)?;
    let mut integrator = EnsembleIntegrator::new(ensemble, flight, cache, writer)
        .context("invalid run configuration")?;
    let summary = integrator.run(&launch)?;

    if matches!(summary.outcome, RunOutcome::WindowBudgetExhausted) {
        warn!(
            windows_used = summary.windows_used,
            "wind data ran out before every particle landed"
        );
    }
    if let Some(mean) = summary.mean_landing_point() {
        info!(
            particles = summary.landing_points.len(),
            elapsed_seconds = summary.elapsed_seconds,
            windows_used = summary.windows_used,
            latitude = mean.latitude,
            longitude = mean.longitude,
            "predicted landing"
        );
    }
    Ok(())
}

/// Route log output to stderr so stdout stays pure CSV.
fn init_logging(verbosity: u8) {
    let fallback = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

/// Assemble the run scenario from a file or from the command line.
fn build_scenario(args: &Args) -> anyhow::Result<Scenario> {
    if let Some(path) = &args.scenario {
        return Scenario::load(path)
            .with_context(|| format!("loading scenario {}", path.display()));
    }

    let (latitude, longitude, altitude) = match (args.latitude, args.longitude, args.altitude) {
        (Some(lat), Some(lng), Some(alt)) => (lat, lng, alt),
        _ => bail!("launch latitude, longitude and altitude are required without a scenario file"),
    };
    let timestamp = match args.start_time {
        Some(t) => t,
        None => unix_now()?,
    };
    let sampling = if args.rms_wind_error > 0.0 {
        WindSampling::Gaussian
    } else {
        WindSampling::DeterministicMean
    };

    Ok(Scenario {
        launch: LaunchSite { latitude, longitude, altitude, timestamp },
        flight: FlightProfile {
            descending: args.descending,
            burst_altitude: args.burst_altitude,
            ascent_rate: args.ascent_rate,
            drag_coeff: args.drag_coeff,
            descent_rate: args.descent_rate,
        },
        ensemble: EnsembleConfig {
            particle_count: args.particles,
            rms_wind_error: args.rms_wind_error,
            sampling,
            ..EnsembleConfig::default()
        },
    })
}

fn unix_now() -> anyhow::Result<i64> {
    let elapsed = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)?;
    Ok(i64::try_from(elapsed.as_secs())?)
}

/// Open the CSV sink, and the KML sink when requested.
fn build_writer(args: &Args) -> anyhow::Result<Box<dyn PositionWriter>> {
    let csv_out: Box<dyn Write> = if args.output == "-" {
        Box::new(io::stdout().lock())
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("creating output file {}", args.output))?;
        Box::new(BufWriter::new(file))
    };
    let csv = CsvWriter::new(csv_out);

    if let Some(path) = &args.kml {
        let file = File::create(path)
            .with_context(|| format!("creating KML file {}", path.display()))?;
        let kml = KmlWriter::new(BufWriter::new(file))?;
        Ok(Box::new(TeeWriter::new(csv, kml)))
    } else {
        Ok(Box::new(csv))
    }
}
