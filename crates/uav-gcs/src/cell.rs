use std::sync::{Arc, Mutex, MutexGuard};

use uav_proto::telemetry::TelemetryMessage;

#[derive(Debug, Default)]
struct Slot {
    latest: Option<TelemetryMessage>,
    applied: u64,
}

/// Latest received telemetry, shared between the receive loop (writer)
/// and the presentation loop (reader).
///
/// Writes replace the whole message; reads copy it out under the lock, so a
/// reader never sees half of an update. Whatever was applied last wins, even
/// if it was sent earlier than what it replaces.
#[derive(Debug, Clone, Default)]
pub struct TelemetryCell {
    inner: Arc<Mutex<Slot>>,
}

impl TelemetryCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, msg: TelemetryMessage) {
        let mut slot = self.lock();
        slot.latest = Some(msg);
        slot.applied += 1;
    }

    /// `None` until the first message has been applied.
    pub fn snapshot(&self) -> Option<TelemetryMessage> {
        self.lock().latest.clone()
    }

    /// Number of messages applied so far.
    pub fn applied(&self) -> u64 {
        self.lock().applied
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // Writers only ever swap in a complete message, so a poisoned slot
        // still holds a valid one.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn msg(ts: f64, battery: u8) -> TelemetryMessage {
        TelemetryMessage::snapshot(ts, 1.0, 2.0, 3.0, 1.5, battery)
    }

    #[test]
    fn empty_until_first_write() {
        let cell = TelemetryCell::new();
        assert!(cell.snapshot().is_none());
        assert_eq!(cell.applied(), 0);
        cell.replace(msg(1.0, 90));
        assert_eq!(cell.snapshot().unwrap().battery, 90);
        assert_eq!(cell.applied(), 1);
    }

    #[test]
    fn apply_order_wins_over_timestamp() {
        let cell = TelemetryCell::new();
        let newer = msg(200.0, 50);
        let older = msg(100.0, 60);
        cell.replace(newer);
        cell.replace(older.clone());
        assert_eq!(cell.snapshot(), Some(older));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let cell = TelemetryCell::new();
        cell.replace(msg(1.0, 80));
        let snap = cell.snapshot().unwrap();
        cell.replace(msg(2.0, 70));
        assert_eq!(snap.battery, 80);
    }

    #[test]
    fn readers_never_see_torn_writes() {
        let cell = TelemetryCell::new();
        let writer = {
            let cell = cell.clone();
            thread::spawn(move || {
                for i in 0..2000u32 {
                    let b = (i % 101) as u8;
                    // timestamp and battery always move together
                    cell.replace(msg(f64::from(b), b));
                }
            })
        };
        for _ in 0..2000 {
            if let Some(m) = cell.snapshot() {
                assert_eq!(m.timestamp, f64::from(m.battery));
            }
        }
        writer.join().unwrap();
        assert_eq!(cell.applied(), 2000);
    }
}
