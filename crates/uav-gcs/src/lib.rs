pub mod cell;
pub mod consumer;
pub mod doctor;
pub mod present;
pub mod sink;

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub use cell::TelemetryCell;
pub use consumer::GroundStation;

pub use uav_link::{TELEMETRY_PORT, VIDEO_PORT};
use uav_link::secs_or;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GcsConfig {
    pub bind_ip: IpAddr,
    pub telemetry_port: u16,
    pub video_port: u16,

    /// Upper bound on one blocking receive; also bounds shutdown latency.
    pub recv_timeout_s: f64,
    /// Panel refresh period.
    pub present_interval_s: f64,

    /// If set, every decoded frame is written here for an external viewer.
    pub frame_path: Option<PathBuf>,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            telemetry_port: TELEMETRY_PORT,
            video_port: VIDEO_PORT,
            recv_timeout_s: 1.0,
            present_interval_s: 0.5,
            frame_path: None,
        }
    }
}

impl GcsConfig {
    pub fn telemetry_bind(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.telemetry_port)
    }

    pub fn video_bind(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.video_port)
    }

    pub fn recv_timeout(&self) -> Duration {
        secs_or(self.recv_timeout_s, Duration::from_secs(1))
    }

    pub fn present_interval(&self) -> Duration {
        secs_or(self.present_interval_s, Duration::from_millis(500))
    }
}
