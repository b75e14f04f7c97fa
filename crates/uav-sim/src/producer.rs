use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use uav_link::{DatagramSender, StopSignal};
use uav_vision::camera::{Camera, CameraConfig};

use crate::vehicle::VehicleModel;
use crate::SimConfig;

struct Loops {
    telemetry: JoinHandle<VehicleModel>,
    video: Option<JoinHandle<Camera>>,
}

/// The airborne side: a telemetry heartbeat and a camera stream, each on
/// its own task, both stopped by one [`StopSignal`].
pub struct Simulator {
    cfg: SimConfig,
    stop: StopSignal,
    telemetry_tx: Arc<DatagramSender>,
    video_tx: Arc<DatagramSender>,
    vehicle: Option<VehicleModel>,
    camera: Option<Camera>,
    loops: Option<Loops>,
}

impl Simulator {
    /// Opens the camera and the two sender sockets. A camera that does not
    /// come up only disables the video loop.
    pub async fn new(cfg: SimConfig, camera: CameraConfig) -> Result<Self> {
        let camera = match Camera::open(camera).await {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("video: {e}; video stream disabled");
                None
            }
        };
        let vehicle = VehicleModel::new(cfg.heartbeat());
        Self::with_parts(cfg, vehicle, camera).await
    }

    pub async fn with_parts(cfg: SimConfig, vehicle: VehicleModel, camera: Option<Camera>) -> Result<Self> {
        let telemetry_tx = DatagramSender::to(cfg.telemetry_dest())
            .await
            .context("telemetry socket")?;
        let video_tx = DatagramSender::to(cfg.video_dest()).await.context("video socket")?;

        info!(
            "simulator ready: telemetry -> {}, video -> {}",
            cfg.telemetry_dest(),
            cfg.video_dest()
        );
        Ok(Self {
            cfg,
            stop: StopSignal::new(),
            telemetry_tx: Arc::new(telemetry_tx),
            video_tx: Arc::new(video_tx),
            vehicle: Some(vehicle),
            camera,
            loops: None,
        })
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn is_running(&self) -> bool {
        self.loops.is_some()
    }

    /// Whether a camera is attached, or its loop is streaming.
    pub fn video_enabled(&self) -> bool {
        self.camera.is_some() || self.loops.as_ref().is_some_and(|l| l.video.is_some())
    }

    /// Spawns both loops. Does nothing if they are already running.
    pub fn start(&mut self) {
        if self.loops.is_some() {
            debug!("simulator: already running");
            return;
        }
        let Some(vehicle) = self.vehicle.take() else {
            warn!("simulator: vehicle model missing, not starting");
            return;
        };
        self.stop.reset();

        let telemetry = tokio::spawn(telemetry_loop(
            vehicle,
            self.telemetry_tx.clone(),
            self.stop.clone(),
            self.cfg.heartbeat(),
        ));

        let video = match self.camera.take() {
            Some(cam) => Some(tokio::spawn(video_loop(
                cam,
                self.video_tx.clone(),
                self.stop.clone(),
                VideoPacing {
                    period: self.cfg.frame_period(),
                    backoff: self.cfg.capture_backoff(),
                    quality: self.cfg.jpeg_quality,
                },
            ))),
            None => {
                info!("video: camera not available, video stream skipped");
                None
            }
        };

        self.loops = Some(Loops { telemetry, video });
        info!("simulator started");
    }

    /// Raise the stop signal, wait for both loops, release the camera.
    pub async fn stop(&mut self) {
        self.stop.raise();
        if let Some(loops) = self.loops.take() {
            match loops.telemetry.await {
                Ok(vehicle) => self.vehicle = Some(vehicle),
                Err(e) => warn!("telemetry loop ended abnormally: {e}"),
            }
            if let Some(video) = loops.video {
                match video.await {
                    Ok(cam) => cam.release(),
                    Err(e) => warn!("video loop ended abnormally: {e}"),
                }
            }
        }
        if let Some(cam) = self.camera.take() {
            cam.release();
        }
        info!("simulator stopped, resources released");
    }

    /// Run until `d` elapses or the stop signal is raised elsewhere.
    pub async fn run_for(&mut self, d: Duration) {
        self.start();
        self.stop.sleep(d).await;
        self.stop().await;
    }

    /// Vehicle state as of the last heartbeat; only available while stopped.
    pub fn vehicle(&self) -> Option<&VehicleModel> {
        self.vehicle.as_ref()
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.stop.raise();
    }
}

async fn telemetry_loop(
    mut vehicle: VehicleModel,
    tx: Arc<DatagramSender>,
    stop: StopSignal,
    heartbeat: Duration,
) -> VehicleModel {
    info!("telemetry: publishing to {} every {:?}", tx.dest(), heartbeat);
    while !stop.is_raised() {
        publish_heartbeat(&mut vehicle, &tx).await;
        if stop.sleep(heartbeat).await {
            break;
        }
    }
    info!("telemetry: stopped");
    vehicle
}

async fn publish_heartbeat(vehicle: &mut VehicleModel, tx: &DatagramSender) {
    let msg = vehicle.advance_tick();
    let bytes = match msg.encode() {
        Ok(b) => b,
        Err(e) => {
            warn!("telemetry: encode failed, heartbeat skipped: {e}");
            return;
        }
    };
    match tx.send(&bytes).await {
        Ok(_) => info!("telemetry: sent battery={}% status={}", msg.battery, msg.status.label()),
        Err(e) => warn!("telemetry: {e}"),
    }
}

#[derive(Debug, Clone, Copy)]
struct VideoPacing {
    period: Duration,
    backoff: Duration,
    quality: u8,
}

async fn video_loop(mut cam: Camera, tx: Arc<DatagramSender>, stop: StopSignal, pacing: VideoPacing) -> Camera {
    info!("video: streaming {} to {} every {:?}", cam.mode(), tx.dest(), pacing.period);
    while !stop.is_raised() {
        // An external capture program can hang; dropping the future kills it.
        let captured = tokio::select! {
            biased;
            _ = stop.raised() => break,
            r = cam.capture() => r,
        };
        let raw = match captured {
            Ok(f) => f,
            Err(e) => {
                warn!("video: frame capture failed: {e}");
                if stop.sleep(pacing.backoff).await {
                    break;
                }
                continue;
            }
        };

        // Compression runs off the async workers so it never holds up a heartbeat.
        let quality = pacing.quality;
        match tokio::task::spawn_blocking(move || uav_vision::encode(&raw, quality)).await {
            Ok(Ok(frame)) => match tx.send(frame.as_bytes()).await {
                Ok(n) => debug!("video: sent {} bytes", n),
                Err(e) => warn!("video: {e}"),
            },
            Ok(Err(e)) => warn!("video: frame skipped: {e}"),
            Err(e) => warn!("video: encoder task failed: {e}"),
        }

        if stop.sleep(pacing.period).await {
            break;
        }
    }
    info!("video: stopped");
    cam
}
