use image::{DynamicImage, Rgb, RgbImage};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::{codec, FrameError};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub mode: String,   // "synthetic" | "libcamera-jpeg" | "v4l2-mjpeg" | "command"
    pub device: String, // /dev/video0 (v4l2)
    pub width: u32,
    pub height: u32,
    /// Program and arguments for `command` mode; it must print one JPEG on stdout.
    pub command: Vec<String>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            mode: "synthetic".to_string(),
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            command: Vec::new(),
        }
    }
}

/// Frame source for the simulator.
///
/// - synthetic: a moving test pattern, no hardware needed
/// - libcamera-jpeg: `libcamera-still`, one JPEG on stdout
/// - v4l2-mjpeg: `ffmpeg` grabbing a single MJPEG frame from the device
/// - command: any program that prints one JPEG on stdout
///
/// Capture futures are cancel safe: dropping one kills the child process.
#[derive(Debug)]
pub struct Camera {
    cfg: CameraConfig,
    frames: u64,
}

impl Camera {
    /// Opens the camera and grabs one probe frame. A camera that cannot
    /// deliver that frame is reported as unavailable.
    pub async fn open(cfg: CameraConfig) -> Result<Self, FrameError> {
        let mut cam = Self { cfg, frames: 0 };
        cam.capture().await.map_err(|e| match e {
            FrameError::DeviceUnavailable(m) => FrameError::DeviceUnavailable(m),
            other => FrameError::DeviceUnavailable(format!("probe frame: {other}")),
        })?;
        info!("camera: {} {}x{} ready", cam.cfg.mode, cam.cfg.width, cam.cfg.height);
        Ok(cam)
    }

    pub fn mode(&self) -> &str {
        &self.cfg.mode
    }

    /// Frames delivered so far, the probe frame included.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub async fn capture(&mut self) -> Result<DynamicImage, FrameError> {
        let img = match self.cfg.mode.as_str() {
            "synthetic" => capture_synthetic(&self.cfg, self.frames).await,
            "libcamera-jpeg" => capture_libcamera(&self.cfg).await,
            "v4l2-mjpeg" => capture_v4l2_ffmpeg(&self.cfg).await,
            "command" => capture_command(&self.cfg).await,
            other => Err(FrameError::DeviceUnavailable(format!("unknown camera.mode: {other}"))),
        }?;
        self.frames += 1;
        Ok(img)
    }

    pub fn release(self) {
        info!("camera: released after {} frames", self.frames);
    }
}

async fn capture_synthetic(cfg: &CameraConfig, n: u64) -> Result<DynamicImage, FrameError> {
    let (w, h) = (cfg.width, cfg.height);
    tokio::task::spawn_blocking(move || synthetic_frame(w, h, n))
        .await
        .map_err(|e| FrameError::DeviceUnavailable(format!("synthetic frame task: {e}")))
}

fn synthetic_frame(w: u32, h: u32, n: u64) -> DynamicImage {
    let shift = (n * 8 % 256) as u32;
    DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
        Rgb([
            ((x + shift) % 256) as u8,
            ((y + shift) % 256) as u8,
            ((x ^ y) & 0xff) as u8,
        ])
    }))
}

async fn capture_libcamera(cfg: &CameraConfig) -> Result<DynamicImage, FrameError> {
    let mut cmd = Command::new("libcamera-still");
    // Shortest exposure wait, no preview window, JPEG to stdout.
    cmd.args(["-n", "-t", "1"])
        .args(["--width", &cfg.width.to_string()])
        .args(["--height", &cfg.height.to_string()])
        .args(["-o", "-"]);

    debug!("capture: libcamera-still");
    run_capture(cmd, "libcamera-still").await
}

async fn capture_v4l2_ffmpeg(cfg: &CameraConfig) -> Result<DynamicImage, FrameError> {
    let size = format!("{}x{}", cfg.width, cfg.height);
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-loglevel", "error"])
        .args(["-f", "video4linux2", "-input_format", "mjpeg"])
        .args(["-video_size", &size, "-i", &cfg.device])
        .args(["-vframes", "1", "-f", "image2pipe", "-vcodec", "mjpeg", "-"]);

    debug!("capture: ffmpeg v4l2 {}", cfg.device);
    run_capture(cmd, "ffmpeg").await
}

async fn capture_command(cfg: &CameraConfig) -> Result<DynamicImage, FrameError> {
    let Some((program, args)) = cfg.command.split_first() else {
        return Err(FrameError::DeviceUnavailable("camera.command is empty".into()));
    };
    let mut cmd = Command::new(program);
    cmd.args(args);

    debug!("capture: {program}");
    run_capture(cmd, program).await
}

async fn run_capture(mut cmd: Command, name: &str) -> Result<DynamicImage, FrameError> {
    cmd.kill_on_drop(true);
    let out = cmd
        .output()
        .await
        .map_err(|e| FrameError::DeviceUnavailable(format!("run {name}: {e}")))?;
    if !out.status.success() || out.stdout.is_empty() {
        return Err(FrameError::DeviceUnavailable(format!("{name} exited with {}", out.status)));
    }
    let jpeg = out.stdout;
    tokio::task::spawn_blocking(move || codec::decode(&jpeg))
        .await
        .map_err(|e| FrameError::DeviceUnavailable(format!("{name} decode task: {e}")))?
}
