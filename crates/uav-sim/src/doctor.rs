use anyhow::Result;
use crate::SimConfig;

pub fn check_sim(cfg: &SimConfig) -> Result<()> {
    anyhow::ensure!(cfg.telemetry_port != 0 && cfg.video_port != 0, "sim ports must be non-zero");
    anyhow::ensure!(cfg.telemetry_port != cfg.video_port, "sim.telemetry_port and sim.video_port must differ");
    anyhow::ensure!(cfg.heartbeat_s.is_finite() && cfg.heartbeat_s > 0.0, "sim.heartbeat_s must be > 0");
    anyhow::ensure!(cfg.fps.is_finite() && cfg.fps > 0.0 && cfg.fps <= 60.0, "sim.fps should be in (0, 60]");
    anyhow::ensure!((1..=100).contains(&cfg.jpeg_quality), "sim.jpeg_quality should be 1..100");
    anyhow::ensure!(cfg.capture_backoff_s.is_finite() && cfg.capture_backoff_s > 0.0, "sim.capture_backoff_s must be > 0");
    Ok(())
}
