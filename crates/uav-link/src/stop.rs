use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Cancellation flag shared by every loop on one side of the link.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_raised(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal is raised (immediately if it already was).
    pub async fn raised(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so wait_for only fails if we are torn down.
        let _ = rx.wait_for(|raised| *raised).await;
    }

    /// Sleep for `d` unless the signal comes first. Returns true if raised.
    pub async fn sleep(&self, d: Duration) -> bool {
        tokio::select! {
            _ = self.raised() => true,
            _ = tokio::time::sleep(d) => self.is_raised(),
        }
    }

    /// Lower the flag again so a stopped component can be restarted.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn raise_is_seen_by_clones() {
        let stop = StopSignal::new();
        let other = stop.clone();
        assert!(!other.is_raised());
        stop.raise();
        assert!(other.is_raised());
        other.raised().await;
    }

    #[tokio::test]
    async fn sleep_wakes_early_on_raise() {
        let stop = StopSignal::new();
        let s2 = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            s2.raise();
        });
        let t0 = Instant::now();
        assert!(stop.sleep(Duration::from_secs(10)).await);
        assert!(t0.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn sleep_runs_out_when_not_raised() {
        let stop = StopSignal::new();
        assert!(!stop.sleep(Duration::from_millis(20)).await);
        stop.raise();
        stop.reset();
        assert!(!stop.is_raised());
    }
}
