use image::{DynamicImage, ImageFormat};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkControl {
    Continue,
    /// The user asked to leave; the ground station shuts down.
    Quit,
}

/// Display collaborator for decoded video frames.
pub trait FrameSink: Send {
    fn show(&mut self, frame: &DynamicImage) -> SinkControl;

    /// Release whatever the sink holds (window, file handle).
    fn close(&mut self) {}
}

/// Keeps only a frame counter.
#[derive(Debug, Default)]
pub struct NullSink {
    pub frames: u64,
}

impl FrameSink for NullSink {
    fn show(&mut self, _frame: &DynamicImage) -> SinkControl {
        self.frames += 1;
        SinkControl::Continue
    }

    fn close(&mut self) {
        info!("video sink closed after {} frames", self.frames);
    }
}

/// Writes every frame to one file, replacing it atomically so a viewer
/// watching the path never reads a partial image.
#[derive(Debug)]
pub struct FrameFileSink {
    path: PathBuf,
    tmp: PathBuf,
    format: ImageFormat,
    frames: u64,
}

impl FrameFileSink {
    pub fn new(path: PathBuf) -> Self {
        let format = ImageFormat::from_path(&path).unwrap_or(ImageFormat::Png);
        let mut tmp = path.clone().into_os_string();
        tmp.push(".part");
        Self { path, tmp: tmp.into(), format, frames: 0 }
    }

    fn write(&self, frame: &DynamicImage) -> anyhow::Result<()> {
        frame.save_with_format(&self.tmp, self.format)?;
        std::fs::rename(&self.tmp, &self.path)?;
        Ok(())
    }
}

impl FrameSink for FrameFileSink {
    fn show(&mut self, frame: &DynamicImage) -> SinkControl {
        match self.write(frame) {
            Ok(()) => {
                self.frames += 1;
                debug!("video: frame {} -> {}", self.frames, self.path.display());
            }
            Err(e) => warn!("video: could not write {}: {e:#}", self.path.display()),
        }
        SinkControl::Continue
    }

    fn close(&mut self) {
        let _ = std::fs::remove_file(&self.tmp);
        info!("video: {} frames written to {}", self.frames, self.path.display());
    }
}
