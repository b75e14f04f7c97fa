pub mod stop;
pub mod transport;

use std::time::Duration;

pub use stop::StopSignal;
pub use transport::{CloseHandle, Datagram, DatagramReceiver, DatagramSender, TransportError};

/// Default ports; both ends of the link read them from here.
pub const TELEMETRY_PORT: u16 = 14550;
pub const VIDEO_PORT: u16 = 14551;

/// Config seconds to a `Duration`. Zero, negative and non-finite values
/// fall back to `fallback`.
pub fn secs_or(s: f64, fallback: Duration) -> Duration {
    match Duration::try_from_secs_f64(s) {
        Ok(d) if !d.is_zero() => d,
        _ => fallback,
    }
}
