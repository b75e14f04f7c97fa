pub mod doctor;
pub mod producer;
pub mod vehicle;

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

pub use producer::Simulator;
pub use vehicle::{VehicleModel, VehicleState};

pub use uav_link::{TELEMETRY_PORT, VIDEO_PORT};
use uav_link::secs_or;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Where the ground station listens.
    pub target_ip: IpAddr,
    pub telemetry_port: u16,
    pub video_port: u16,

    /// Telemetry publish period (seconds).
    pub heartbeat_s: f64,
    /// Video frames per second.
    pub fps: f64,
    /// 1..=100; low values keep frames well under one datagram.
    pub jpeg_quality: u8,
    /// Pause after a failed capture before trying the camera again.
    pub capture_backoff_s: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            target_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            telemetry_port: TELEMETRY_PORT,
            video_port: VIDEO_PORT,
            heartbeat_s: 1.0,
            fps: 10.0,
            jpeg_quality: uav_vision::DEFAULT_JPEG_QUALITY,
            capture_backoff_s: 1.0,
        }
    }
}

impl SimConfig {
    pub fn telemetry_dest(&self) -> SocketAddr {
        SocketAddr::new(self.target_ip, self.telemetry_port)
    }

    pub fn video_dest(&self) -> SocketAddr {
        SocketAddr::new(self.target_ip, self.video_port)
    }

    pub fn heartbeat(&self) -> Duration {
        secs_or(self.heartbeat_s, Duration::from_secs(1))
    }

    pub fn frame_period(&self) -> Duration {
        if self.fps > 0.0 {
            secs_or(1.0 / self.fps, Duration::from_millis(100))
        } else {
            Duration::from_millis(100)
        }
    }

    pub fn capture_backoff(&self) -> Duration {
        secs_or(self.capture_backoff_s, Duration::from_secs(1))
    }
}
