//! Beacon Simulation CLI
//!
//! Runs one Beacon / relay visibility simulation and writes the result JSON.
//!
//! Usage:
//!   beacon-run --altitude-km 700 --lst-hours 10.5 --output result.json
//!   beacon-run --config sim.json --relay-tle iridium.tle --bidirectional
//!   beacon-run --altitude-km 550 --inclination-deg 53 --offline

use anyhow::{bail, Context, Result};
use beacon_sim::{run, run_with_source, LinkMode, SimulationConfig, SimulationResult};
use chrono::{DateTime, Utc};
use clap::Parser;
use orbital_mechanics::OrbitIntent;
use relay_catalog::{load_tle_file, RelayCatalog, RelayCatalogConfig};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_ALTITUDE_KM: f64 = 700.0;
const DEFAULT_LST_HOURS: f64 = 10.5;

#[derive(Parser, Debug, Default)]
#[command(
    name = "beacon-run",
    about = "Simulate Beacon / relay constellation handshakes and blackouts"
)]
struct Args {
    /// Simulation config JSON; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Beacon altitude in km
    #[arg(long)]
    altitude_km: Option<f64>,

    /// Local solar time at the descending node (sun-synchronous Beacon)
    #[arg(long)]
    lst_hours: Option<f64>,

    /// Inclination in degrees (selects a non-polar Beacon)
    #[arg(long)]
    inclination_deg: Option<f64>,

    /// Right ascension of the ascending node in degrees (non-polar Beacon)
    #[arg(long)]
    raan_deg: Option<f64>,

    /// Relay nadir antenna field of view in degrees
    #[arg(long)]
    relay_fov_deg: Option<f64>,

    /// Beacon horizon antenna field of view in degrees
    #[arg(long)]
    beacon_fov_deg: Option<f64>,

    #[arg(long)]
    duration_hours: Option<f64>,

    #[arg(long)]
    step_seconds: Option<f64>,

    /// Also require the relay inside a Beacon horizon antenna
    #[arg(long)]
    bidirectional: bool,

    /// Simulation start, RFC 3339 (default: now)
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Read relay element sets from a TLE file instead of the network
    #[arg(long)]
    relay_tle: Option<PathBuf>,

    /// Use the built-in relay constellation only
    #[arg(long)]
    offline: bool,

    /// Output JSON file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn beacon_intent(args: &Args, base: Option<OrbitIntent>) -> Result<OrbitIntent> {
    let altitude_km = args
        .altitude_km
        .or(base.map(|intent| intent.altitude_km()))
        .unwrap_or(DEFAULT_ALTITUDE_KM);

    let non_polar_flags = args.inclination_deg.is_some() || args.raan_deg.is_some();
    let base_is_non_polar = matches!(base, Some(OrbitIntent::NonPolar { .. }));

    if non_polar_flags && args.lst_hours.is_some() {
        bail!("--lst-hours cannot be combined with --inclination-deg/--raan-deg");
    }

    if non_polar_flags || (base_is_non_polar && args.lst_hours.is_none()) {
        let (base_inclination, base_raan) = match base {
            Some(OrbitIntent::NonPolar {
                inclination_deg,
                raan_deg,
                ..
            }) => (Some(inclination_deg), raan_deg),
            _ => (None, None),
        };
        let inclination_deg = args
            .inclination_deg
            .or(base_inclination)
            .context("--inclination-deg is required for a non-polar Beacon")?;

        return Ok(OrbitIntent::NonPolar {
            altitude_km,
            inclination_deg,
            raan_deg: args.raan_deg.or(base_raan),
        });
    }

    let base_lst = match base {
        Some(OrbitIntent::SunSynchronous {
            local_solar_time_hours,
            ..
        }) => Some(local_solar_time_hours),
        _ => None,
    };

    Ok(OrbitIntent::SunSynchronous {
        altitude_km,
        local_solar_time_hours: args.lst_hours.or(base_lst).unwrap_or(DEFAULT_LST_HOURS),
    })
}

/// Config file (if any) with every flag applied on top
fn build_config(args: &Args) -> Result<SimulationConfig> {
    let base = match &args.config {
        Some(path) => Some(
            SimulationConfig::from_json_file(path)
                .with_context(|| format!("loading {:?}", path))?,
        ),
        None => None,
    };

    let intent = beacon_intent(args, base.as_ref().map(|c| c.beacon_intent))?;
    let mut config = base.unwrap_or_else(|| SimulationConfig::new(intent));
    config.beacon_intent = intent;

    if let Some(v) = args.relay_fov_deg {
        config.relay_fov_deg = v;
    }
    if let Some(v) = args.beacon_fov_deg {
        config.beacon_fov_deg = v;
    }
    if let Some(v) = args.duration_hours {
        config.duration_hours = v;
    }
    if let Some(v) = args.step_seconds {
        config.time_step_seconds = v;
    }
    if args.bidirectional {
        config.link_mode = LinkMode::Bidirectional;
    }

    config.validate()?;
    Ok(config)
}

fn write_result(result: &SimulationResult, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            info!("Writing output to {:?}", path);
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, result)?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, result)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for the result
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    info!("{}", "=".repeat(60));
    info!("Beacon Relay Visibility Simulator");
    info!("{}", "=".repeat(60));

    let config = build_config(&args)?;
    info!("Beacon intent: {:?}", config.beacon_intent);

    let result = match &args.relay_tle {
        Some(path) => {
            let relays = load_tle_file(path)?;
            run(&config, &relays, args.start)?
        }
        None => {
            let mut catalog_config = RelayCatalogConfig::from_env();
            catalog_config.offline |= args.offline;
            let catalog = RelayCatalog::new(catalog_config)?;
            run_with_source(&config, &catalog, args.start).await?
        }
    };

    write_result(&result, args.output.as_ref())?;

    // Summary
    let stats = &result.blackout_statistics;
    info!("{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Window:        {} → {}", result.start_time, result.end_time);
    info!(
        "Steps:         {} simulated, {} skipped",
        result.steps_simulated, result.steps_skipped
    );
    info!("Relays:        {}", result.relay_count);
    info!("Handshakes:    {}", result.total_handshake_count);
    info!(
        "Blackouts:     {} ({:.0} s total, {:.0} s mean, {:.0} s longest)",
        stats.number_of_blackouts,
        stats.total_blackout_duration_seconds,
        stats.average_blackout_duration_seconds,
        stats.longest_blackout_seconds
    );
    info!(
        "Coverage:      {:.1}% ({} of {} steps linked)",
        result.coverage_fraction * 100.0,
        result.connected_steps(),
        result.steps_simulated
    );

    Ok(())
}
