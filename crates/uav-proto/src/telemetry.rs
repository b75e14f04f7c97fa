use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for one telemetry datagram. Receivers size their buffer with it.
pub const TELEMETRY_MAX_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightStatus {
    #[serde(rename = "Uçuşta")]
    Flying,
    #[serde(rename = "İndi")]
    Landed,
}

impl FlightStatus {
    /// Flying needs both some charge left and a measurable altitude.
    pub fn derive(battery: u8, altitude: f64) -> Self {
        if battery > 5 && altitude > 0.5 {
            FlightStatus::Flying
        } else {
            FlightStatus::Landed
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FlightStatus::Flying => "Uçuşta",
            FlightStatus::Landed => "İndi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One heartbeat worth of vehicle state, as it travels on the wire.
///
/// Field names on the wire are kept stable (`konum`, `hiz`, `pil_durumu`,
/// `durum`) so older ground stations keep decoding new simulators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    /// Wall-clock unix seconds at snapshot time.
    pub timestamp: f64,
    #[serde(rename = "konum")]
    pub position: Position,
    #[serde(rename = "hiz")]
    pub speed: f64,
    #[serde(rename = "pil_durumu")]
    pub battery: u8,
    #[serde(rename = "durum")]
    pub status: FlightStatus,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("telemetry is not valid json: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("battery {0}% outside 0..=100")]
    BatteryOutOfRange(u8),
    #[error("non-finite value in field {0}")]
    NonFinite(&'static str),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("serialize telemetry: {0}")]
    Json(#[from] serde_json::Error),
    #[error("telemetry encodes to {0} bytes, limit is {}", TELEMETRY_MAX_BYTES)]
    TooLarge(usize),
}

impl TelemetryMessage {
    /// Builds a wire snapshot; numeric fields are rounded to 2 decimals here
    /// so that what is sent is exactly what decodes on the other side.
    pub fn snapshot(timestamp: f64, x: f64, y: f64, z: f64, speed: f64, battery: u8) -> Self {
        Self {
            timestamp,
            position: Position { x: round2(x), y: round2(y), z: round2(z) },
            speed: round2(speed),
            battery,
            status: FlightStatus::derive(battery, z),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let buf = serde_json::to_vec(self)?;
        if buf.len() > TELEMETRY_MAX_BYTES {
            return Err(EncodeError::TooLarge(buf.len()));
        }
        Ok(buf)
    }

    /// Parses one datagram. Nothing is returned unless every field checks out.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let msg: TelemetryMessage = serde_json::from_slice(bytes)?;
        if msg.battery > 100 {
            return Err(DecodeError::BatteryOutOfRange(msg.battery));
        }
        let fields = [
            ("timestamp", msg.timestamp),
            ("konum.x", msg.position.x),
            ("konum.y", msg.position.y),
            ("konum.z", msg.position.z),
            ("hiz", msg.speed),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(DecodeError::NonFinite(*name));
        }
        Ok(msg)
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Current wall-clock time as fractional unix seconds.
pub fn now_unix_secs() -> f64 {
    time::OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e9
}
