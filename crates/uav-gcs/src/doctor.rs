use anyhow::Result;
use crate::GcsConfig;

pub fn check_gcs(cfg: &GcsConfig) -> Result<()> {
    anyhow::ensure!(cfg.telemetry_port != 0 && cfg.video_port != 0, "gcs ports must be non-zero");
    anyhow::ensure!(cfg.telemetry_port != cfg.video_port, "gcs.telemetry_port and gcs.video_port must differ");
    anyhow::ensure!(cfg.recv_timeout_s.is_finite() && cfg.recv_timeout_s > 0.0, "gcs.recv_timeout_s must be > 0");
    anyhow::ensure!(
        cfg.present_interval_s.is_finite() && cfg.present_interval_s > 0.0,
        "gcs.present_interval_s must be > 0"
    );
    if let Some(p) = &cfg.frame_path {
        let dir = p.parent().filter(|d| !d.as_os_str().is_empty());
        anyhow::ensure!(dir.map(|d| d.is_dir()).unwrap_or(true), "gcs.frame_path directory does not exist");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn defaults_pass() {
        check_gcs(&GcsConfig::default()).unwrap();
    }

    #[test]
    fn bad_values_are_reported() {
        let shared = GcsConfig { video_port: 14550, ..Default::default() };
        assert!(check_gcs(&shared).is_err());

        let no_wait = GcsConfig { recv_timeout_s: 0.0, ..Default::default() };
        assert!(check_gcs(&no_wait).is_err());

        let nowhere = GcsConfig {
            frame_path: Some(PathBuf::from("/no/such/dir/frame.png")),
            ..Default::default()
        };
        assert!(check_gcs(&nowhere).is_err());

        let here = GcsConfig { frame_path: Some(PathBuf::from("frame.png")), ..Default::default() };
        check_gcs(&here).unwrap();
    }
}
