mod config;
mod console;
mod logging;
mod radio;
mod tle;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use satrig_core::{
    DopplerEngine, OperatorCommand, OrbitModel, PassPredictor, PassWindow, SatElements,
    SystemClock, TrackingController,
};
use tokio::sync::mpsc;

use crate::config::{AppConfig, Preset};
use crate::console::format_countdown;
use crate::radio::DryRunRadio;
use crate::tle::TleCatalog;

#[derive(Parser)]
#[command(name = "satrig", version, about = "Pass prediction and Doppler rig control for amateur satellites")]
struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "satrig.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the configured presets.
    Presets,
    /// Predict upcoming passes of a preset's satellite.
    Passes {
        /// Preset name or 1-based index.
        preset: String,
        /// Look-ahead window, hours.
        #[arg(long, default_value_t = 24)]
        hours: u64,
        /// Drop passes peaking below this elevation, degrees.
        #[arg(long, default_value_t = 0.0)]
        min_elevation: f64,
        /// Print at most this many passes.
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Arm a preset's satellite and drive the rig across its passes.
    Track {
        /// Preset name or 1-based index.
        preset: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let cfg = AppConfig::from_file(&cli.config)?;

    // Initialize logging
    let _logging_guard = logging::init_logging(&cfg.log.dir, "satrig", &cfg.log.level);

    match cli.command {
        Command::Presets => cmd_presets(&cfg),
        Command::Passes {
            preset,
            hours,
            min_elevation,
            count,
            json,
        } => cmd_passes(&cfg, &preset, hours, min_elevation, count, json),
        Command::Track { preset } => cmd_track(&cfg, &preset).await,
    }
}

/// Resolve a preset and load its satellite from the TLE file.
fn load_target<'a>(cfg: &'a AppConfig, key: &str) -> Result<(&'a Preset, Arc<SatElements>)> {
    let Some(preset) = cfg.find_preset(key) else {
        bail!(
            "no preset '{key}', configured presets: {}",
            cfg.preset_names().join(", ")
        );
    };
    let catalog = TleCatalog::from_file(&preset.tle_file)?;
    let sat = catalog.find(&preset.satellite).with_context(|| {
        format!(
            "satellite '{}' not found in {} ({} entries)",
            preset.satellite,
            preset.tle_file,
            catalog.len()
        )
    })?;
    Ok((preset, sat))
}

fn cmd_presets(cfg: &AppConfig) -> Result<()> {
    if cfg.presets.is_empty() {
        println!("no presets configured");
        return Ok(());
    }
    for (i, p) in cfg.presets.iter().enumerate() {
        println!(
            "{:>2}  {:<14} {:<18} up {:>9.4} MHz {:<4} down {:>9.4} MHz {}",
            i + 1,
            p.name,
            p.satellite,
            p.uplink_mhz,
            p.uplink_mode,
            p.downlink_mhz,
            p.downlink_mode,
        );
    }
    Ok(())
}

fn cmd_passes(
    cfg: &AppConfig,
    key: &str,
    hours: u64,
    min_elevation: f64,
    count: usize,
    json: bool,
) -> Result<()> {
    let (_, sat) = load_target(cfg, key)?;
    let station = cfg.ground_station()?;
    let step = chrono::Duration::seconds(cfg.tracking.scan_step_s as i64);
    let predictor = PassPredictor::new(OrbitModel::new(station)).with_step(step);

    let start = Utc::now();
    let end = start + chrono::Duration::hours(hours as i64);
    let passes: Vec<PassWindow> = predictor
        .find_passes(&sat, start, end, step)?
        .into_iter()
        .filter(|p| p.max_elevation_deg >= min_elevation)
        .take(count)
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&passes)?);
        return Ok(());
    }
    if passes.is_empty() {
        println!("no passes of {} in the next {hours} h", sat.name());
        return Ok(());
    }
    println!(
        "passes of {} (NORAD {}) over the next {hours} h:",
        sat.name(),
        sat.norad_id()
    );
    for (i, p) in passes.iter().enumerate() {
        let note = if p.clipped_aos { "  (in progress)" } else { "" };
        println!(
            "{:>2}  {} az {:>3.0}  ->  {} az {:>3.0}   max el {:>4.1} at {}   {}{}",
            i + 1,
            p.aos.format("%m-%d %H:%M:%SZ"),
            p.aos_azimuth_deg,
            p.los.format("%H:%M:%SZ"),
            p.los_azimuth_deg,
            p.max_elevation_deg,
            p.tca.format("%H:%M:%SZ"),
            format_countdown(p.duration().num_seconds()),
            note,
        );
    }
    Ok(())
}

async fn cmd_track(cfg: &AppConfig, key: &str) -> Result<()> {
    let (preset, sat) = load_target(cfg, key)?;
    let station = cfg.ground_station()?;
    let plan = preset.frequency_plan()?;

    tracing::info!(
        preset = %preset.name,
        satellite = %sat.name(),
        norad_id = sat.norad_id(),
        "tracking target loaded"
    );

    let predictor = PassPredictor::new(OrbitModel::new(station))
        .with_step(chrono::Duration::seconds(cfg.tracking.scan_step_s as i64));
    let engine = DopplerEngine::new(plan);
    let (controller, status_rx) = TrackingController::new(
        predictor,
        engine,
        DryRunRadio::new(),
        SystemClock,
        cfg.tracking_config(preset),
    )?;

    let (command_tx, command_rx) = mpsc::channel(16);
    command_tx
        .send(OperatorCommand::Arm(Arc::clone(&sat)))
        .await
        .map_err(|_| anyhow::anyhow!("tracking controller unavailable"))?;

    let controller_task = tokio::spawn(controller.run(command_rx));
    let mut console_task = tokio::spawn(console::run_console(
        Arc::clone(&sat),
        command_tx.clone(),
        status_rx,
    ));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("ctrl-c received, shutting down");
        }
        res = &mut console_task => {
            match res {
                Ok(Ok(())) => tracing::info!("console closed, shutting down"),
                Ok(Err(e)) => tracing::error!("console failed: {e:#}"),
                Err(e) => tracing::error!("console task panicked: {e}"),
            }
        }
    }

    // Close the current pass cleanly, then let the controller drain and stop.
    let _ = command_tx.send(OperatorCommand::Cancel).await;
    console_task.abort();
    drop(command_tx);
    if let Err(e) = controller_task.await {
        tracing::error!("controller task failed: {e}");
    }
    tracing::info!("satrig stopped");
    Ok(())
}
