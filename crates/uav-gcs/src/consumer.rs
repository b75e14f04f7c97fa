use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use uav_link::{CloseHandle, DatagramReceiver, StopSignal, TransportError};
use uav_proto::telemetry::{TelemetryMessage, TELEMETRY_MAX_BYTES};
use uav_vision::VIDEO_MAX_DATAGRAM;

use crate::cell::TelemetryCell;
use crate::present::TelemetryView;
use crate::sink::{FrameSink, SinkControl};
use crate::GcsConfig;

/// Pause after an unexpected socket error so a broken socket cannot spin.
const RECV_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// The ground side: two receive loops and a presentation loop.
pub struct GroundStation {
    cfg: GcsConfig,
    stop: StopSignal,
    cell: TelemetryCell,
    telemetry_rx: Option<DatagramReceiver>,
    video_rx: Option<DatagramReceiver>,
    telemetry_close: CloseHandle,
    video_close: CloseHandle,
    telemetry_addr: SocketAddr,
    video_addr: SocketAddr,
    loops: Vec<(&'static str, JoinHandle<()>)>,
}

impl GroundStation {
    /// Binds both ports. Failing to bind is fatal and reported before any
    /// loop exists.
    pub async fn bind(cfg: GcsConfig) -> Result<Self> {
        let (telemetry_rx, telemetry_close) = DatagramReceiver::bind(cfg.telemetry_bind())
            .await
            .context("bind telemetry port")?;
        let (video_rx, video_close) = DatagramReceiver::bind(cfg.video_bind())
            .await
            .context("bind video port")?;

        Ok(Self {
            telemetry_addr: telemetry_rx.local_addr(),
            video_addr: video_rx.local_addr(),
            cfg,
            stop: StopSignal::new(),
            cell: TelemetryCell::new(),
            telemetry_rx: Some(telemetry_rx),
            video_rx: Some(video_rx),
            telemetry_close,
            video_close,
            loops: Vec::new(),
        })
    }

    pub fn telemetry_addr(&self) -> SocketAddr {
        self.telemetry_addr
    }

    pub fn video_addr(&self) -> SocketAddr {
        self.video_addr
    }

    pub fn cell(&self) -> TelemetryCell {
        self.cell.clone()
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Spawns the three loops. The sockets are handed to their loops, so a
    /// ground station runs once.
    pub fn start(&mut self, sink: Box<dyn FrameSink>, view: Box<dyn TelemetryView>) -> Result<()> {
        let (Some(telemetry_rx), Some(video_rx)) = (self.telemetry_rx.take(), self.video_rx.take()) else {
            anyhow::bail!("ground station already started");
        };
        let timeout = self.cfg.recv_timeout();

        self.loops.push((
            "telemetry",
            tokio::spawn(telemetry_loop(telemetry_rx, self.cell.clone(), self.stop.clone(), timeout)),
        ));
        self.loops.push((
            "video",
            tokio::spawn(video_loop(video_rx, sink, self.stop.clone(), timeout)),
        ));
        self.loops.push((
            "presentation",
            tokio::spawn(presentation_loop(
                self.cell.clone(),
                view,
                self.stop.clone(),
                self.cfg.present_interval(),
            )),
        ));
        info!("ground station listening: telemetry {}, video {}", self.telemetry_addr, self.video_addr);
        Ok(())
    }

    /// Raise the signal, close both sockets so blocked receives return at
    /// once, then wait for every loop.
    pub async fn stop(&mut self) {
        self.stop.raise();
        self.telemetry_close.close();
        self.video_close.close();

        for (name, handle) in self.loops.drain(..) {
            if let Err(e) = handle.await {
                warn!("{name} loop ended abnormally: {e}");
            }
        }
        info!("ground station stopped");
    }

    /// Block until something raises the stop signal (a sink quit, Ctrl-C
    /// handler, another task), then shut down.
    pub async fn wait(&mut self) {
        self.stop.raised().await;
        self.stop().await;
    }
}

impl Drop for GroundStation {
    fn drop(&mut self) {
        self.stop.raise();
        self.telemetry_close.close();
        self.video_close.close();
    }
}

async fn telemetry_loop(mut rx: DatagramReceiver, cell: TelemetryCell, stop: StopSignal, timeout: Duration) {
    info!("telemetry: listening on udp {}", rx.local_addr());
    while !stop.is_raised() {
        match rx.receive(TELEMETRY_MAX_BYTES, timeout).await {
            Ok(d) => match TelemetryMessage::decode(&d.payload) {
                Ok(msg) => {
                    debug!("telemetry: battery={}% from {}", msg.battery, d.from);
                    cell.replace(msg);
                }
                Err(e) => warn!("telemetry: dropped datagram from {}: {e}", d.from),
            },
            Err(TransportError::Timeout) => continue,
            Err(TransportError::Closed) => break,
            Err(e) => {
                if !stop.is_raised() {
                    warn!("telemetry: {e}");
                }
                stop.sleep(RECV_ERROR_PAUSE).await;
            }
        }
    }
    info!("telemetry: listener stopped");
}

async fn video_loop(mut rx: DatagramReceiver, sink: Box<dyn FrameSink>, stop: StopSignal, timeout: Duration) {
    info!("video: listening on udp {}", rx.local_addr());
    let mut sink = Some(sink);
    while !stop.is_raised() {
        let d = match rx.receive(VIDEO_MAX_DATAGRAM, timeout).await {
            Ok(d) => d,
            Err(TransportError::Timeout) => continue,
            Err(TransportError::Closed) => break,
            Err(e) => {
                if !stop.is_raised() {
                    warn!("video: {e}");
                }
                stop.sleep(RECV_ERROR_PAUSE).await;
                continue;
            }
        };
        let Some(mut s) = sink.take() else { break };

        // Decoding and the sink (image encode, file io) both block, so the
        // sink travels to the blocking pool with the frame and comes back.
        let payload = d.payload.clone();
        let job = tokio::task::spawn_blocking(move || {
            let shown = uav_vision::decode(&payload).map(|frame| s.show(&frame));
            (s, shown)
        });
        let shown = match job.await {
            Ok((s, shown)) => {
                sink = Some(s);
                shown
            }
            Err(e) => {
                warn!("video: display task failed, video stopped: {e}");
                break;
            }
        };

        match shown {
            Ok(SinkControl::Continue) => {}
            Ok(SinkControl::Quit) => {
                info!("video: quit requested by display");
                stop.raise();
                break;
            }
            Err(e) => warn!("video: dropped {} bytes from {}: {e}", d.payload.len(), d.from),
        }
    }
    if let Some(mut s) = sink {
        s.close();
    }
    info!("video: listener stopped");
}

async fn presentation_loop(
    cell: TelemetryCell,
    mut view: Box<dyn TelemetryView>,
    stop: StopSignal,
    interval: Duration,
) {
    debug!("presentation: refreshing every {:?}", interval);
    while !stop.sleep(interval).await {
        let snapshot = cell.snapshot();
        view.render(snapshot.as_ref());
    }
    debug!("presentation: stopped");
}
