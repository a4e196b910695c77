//! Camera/microphone sources and scoped device handles

use crate::analyser::{AnalyserConfig, AudioBuffers, AudioContextState, SpectrumAnalyser};
use crate::frame::VideoFrame;
use crate::CaptureError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

/// An opened camera + microphone pair
pub trait MediaDevice: Send {
    /// Pixels of the current video frame
    fn capture_frame(&mut self) -> Result<VideoFrame, CaptureError>;

    /// Current frequency/time-domain audio buffers
    fn audio_buffers(&mut self) -> Result<AudioBuffers, CaptureError>;

    /// Stop all tracks and close the audio context. Must be idempotent.
    fn release(&mut self);
}

/// Something that can grant access to a camera and microphone
pub trait MediaSource: Send {
    fn open(&mut self) -> Result<Box<dyn MediaDevice>, CaptureError>;
}

/// Owns an opened device and releases it exactly once
pub struct MediaGuard {
    device: Option<Box<dyn MediaDevice>>,
}

impl MediaGuard {
    pub fn new(device: Box<dyn MediaDevice>) -> Self {
        Self {
            device: Some(device),
        }
    }

    /// Acquire a device from a source
    pub fn acquire(source: &mut dyn MediaSource) -> Result<Self, CaptureError> {
        let device = source.open()?;
        info!("Media device acquired");
        Ok(Self::new(device))
    }

    pub fn device(&mut self) -> Result<&mut dyn MediaDevice, CaptureError> {
        match self.device.as_mut() {
            Some(device) => Ok(device.as_mut()),
            None => Err(CaptureError::Released),
        }
    }

    pub fn is_released(&self) -> bool {
        self.device.is_none()
    }

    /// Release the device now instead of at drop
    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
            info!("Media device released");
        }
    }
}

impl Drop for MediaGuard {
    fn drop(&mut self) {
        self.release();
    }
}

struct TapInner {
    analyser: SpectrumAnalyser,
    state: AudioContextState,
}

/// Microphone input fed by an external capture callback.
///
/// Reports `Suspended` until the first samples arrive and `Closed` once released.
#[derive(Clone)]
pub struct AudioTap {
    inner: Arc<Mutex<TapInner>>,
}

impl AudioTap {
    pub fn new(config: AnalyserConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TapInner {
                analyser: SpectrumAnalyser::new(config),
                state: AudioContextState::Suspended,
            })),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, TapInner>, CaptureError> {
        self.inner
            .lock()
            .map_err(|e| CaptureError::DeviceUnavailable(format!("audio tap lock: {}", e)))
    }

    /// Feed PCM samples in [-1.0, 1.0]
    pub fn push_samples(&self, pcm: &[f32]) -> Result<(), CaptureError> {
        let mut inner = self.lock()?;
        if inner.state == AudioContextState::Closed {
            return Err(CaptureError::Released);
        }
        inner.state = AudioContextState::Running;
        inner.analyser.push_samples(pcm);
        Ok(())
    }

    pub fn set_state(&self, state: AudioContextState) -> Result<(), CaptureError> {
        let mut inner = self.lock()?;
        if inner.state != AudioContextState::Closed {
            inner.state = state;
        }
        Ok(())
    }

    pub fn state(&self) -> Result<AudioContextState, CaptureError> {
        Ok(self.lock()?.state)
    }

    pub fn buffers(&self) -> Result<AudioBuffers, CaptureError> {
        let mut inner = self.lock()?;
        let state = inner.state;
        Ok(inner.analyser.snapshot(state))
    }

    pub fn close(&self) {
        match self.inner.lock() {
            Ok(mut inner) => inner.state = AudioContextState::Closed,
            Err(e) => warn!("Audio tap lock poisoned on close: {}", e),
        }
    }
}

/// A directory of still images replayed in a loop as a camera feed
pub struct ImageSequenceSource {
    dir: PathBuf,
    width: u32,
    height: u32,
    audio: Option<AudioTap>,
}

impl ImageSequenceSource {
    pub fn new(dir: impl AsRef<Path>, width: u32, height: u32) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            width,
            height,
            audio: None,
        }
    }

    /// Pair the camera feed with a microphone tap
    pub fn with_audio(mut self, tap: AudioTap) -> Self {
        self.audio = Some(tap);
        self
    }

    fn is_image(path: &Path) -> bool {
        matches!(
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .as_deref(),
            Some("png" | "jpg" | "jpeg" | "bmp")
        )
    }
}

impl MediaSource for ImageSequenceSource {
    fn open(&mut self) -> Result<Box<dyn MediaDevice>, CaptureError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            CaptureError::DeviceUnavailable(format!("{}: {}", self.dir.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| Self::is_image(p))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(CaptureError::DeviceUnavailable(format!(
                "no images in {}",
                self.dir.display()
            )));
        }

        let mut frames = Vec::with_capacity(paths.len());
        for (i, path) in paths.iter().enumerate() {
            let img = image::open(path)?.to_rgb8();
            let frame = VideoFrame::from_rgb_image(img, 0, i as u32);
            frames.push(frame.resize(self.width, self.height));
        }

        info!(
            "Opened image sequence camera: {} frames from {}",
            frames.len(),
            self.dir.display()
        );

        Ok(Box::new(ImageSequenceDevice {
            frames,
            cursor: 0,
            audio: self.audio.clone(),
            started: Instant::now(),
            released: false,
        }))
    }
}

struct ImageSequenceDevice {
    frames: Vec<VideoFrame>,
    cursor: usize,
    audio: Option<AudioTap>,
    started: Instant,
    released: bool,
}

impl MediaDevice for ImageSequenceDevice {
    fn capture_frame(&mut self) -> Result<VideoFrame, CaptureError> {
        if self.released || self.frames.is_empty() {
            return Err(CaptureError::Released);
        }
        let mut frame = self.frames[self.cursor % self.frames.len()].clone();
        frame.sequence = self.cursor as u32;
        frame.timestamp_ns = self.started.elapsed().as_nanos() as u64;
        self.cursor += 1;
        Ok(frame)
    }

    fn audio_buffers(&mut self) -> Result<AudioBuffers, CaptureError> {
        if self.released {
            return Err(CaptureError::Released);
        }
        match &self.audio {
            Some(tap) => tap.buffers(),
            None => Ok(AudioBuffers::inactive(AudioContextState::Suspended)),
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.frames.clear();
        if let Some(tap) = &self.audio {
            tap.close();
        }
        debug!("Image sequence camera stopped");
    }
}
