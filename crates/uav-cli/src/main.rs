use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::{info, warn};

use uav_gcs::present::ConsolePanel;
use uav_gcs::sink::{FrameFileSink, FrameSink, NullSink};
use uav_gcs::{doctor as gcs_doctor, GcsConfig, GroundStation};
use uav_sim::{doctor as sim_doctor, SimConfig, Simulator};
use uav_vision::camera::CameraConfig;

#[derive(Debug, Parser)]
#[command(name = "uavlink", version, about = "UAV telemetry/video simulator and ground station over UDP")]
struct Cli {
    /// TOML config; every section is optional.
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fly the simulated vehicle and stream telemetry + video.
    Sim {
        /// Seconds to run before shutting down.
        #[arg(long, default_value_t = 30)]
        duration: u64,
    },
    /// Receive and display the stream.
    Gcs,
    /// Validate the config.
    Doctor,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Config {
    sim: SimConfig,
    camera: CameraConfig,
    gcs: GcsConfig,
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let Some(path) = path else { return Ok(Config::default()) };
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {path}"))?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;

    match cli.cmd {
        Command::Sim { duration } => sim(cfg, Duration::from_secs(duration)).await?,
        Command::Gcs => gcs(cfg).await?,
        Command::Doctor => doctor(&cfg)?,
    }
    Ok(())
}

async fn sim(cfg: Config, duration: Duration) -> Result<()> {
    let mut sim = Simulator::new(cfg.sim, cfg.camera).await?;
    sim.start();
    info!("sim: running for {:?}; Ctrl-C to stop early", duration);

    let stop = sim.stop_signal();
    tokio::select! {
        _ = tokio::time::sleep(duration) => info!("sim: run time elapsed"),
        _ = tokio::signal::ctrl_c() => info!("sim: interrupted"),
        _ = stop.raised() => {}
    }
    sim.stop().await;
    info!("sim: done");
    Ok(())
}

async fn gcs(cfg: Config) -> Result<()> {
    let sink: Box<dyn FrameSink> = match cfg.gcs.frame_path.clone() {
        Some(path) => Box::new(FrameFileSink::new(path)),
        None => Box::new(NullSink::default()),
    };

    let mut station = GroundStation::bind(cfg.gcs).await?;
    station.start(sink, Box::new(ConsolePanel))?;

    let stop = station.stop_signal();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("gcs: interrupted"),
            Err(e) => warn!("gcs: cannot listen for Ctrl-C: {e}"),
        }
        stop.raise();
    });

    station.wait().await;
    info!("gcs: done");
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    sim_doctor::check_sim(&cfg.sim)?;
    gcs_doctor::check_gcs(&cfg.gcs)?;
    anyhow::ensure!(
        matches!(cfg.camera.mode.as_str(), "synthetic" | "libcamera-jpeg" | "v4l2-mjpeg" | "command"),
        "unknown camera.mode: {}",
        cfg.camera.mode
    );
    anyhow::ensure!(
        cfg.camera.mode != "command" || !cfg.camera.command.is_empty(),
        "camera.mode = \"command\" needs camera.command"
    );
    if cfg.sim.telemetry_port != cfg.gcs.telemetry_port || cfg.sim.video_port != cfg.gcs.video_port {
        warn!("doctor: sim and gcs ports differ; fine only if they run on different setups");
    }
    info!("doctor: OK");
    Ok(())
}
