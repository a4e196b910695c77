//! Scripted media for tests

use media_capture::{
    AudioBuffers, AudioContextState, CaptureError, MediaDevice, MediaSource, VideoFrame,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Dark frame with a bright square over the central 40%
pub fn lit_square_frame() -> VideoFrame {
    let mut frame = VideoFrame::filled(640, 480, [10, 10, 10]);
    for y in 144..336 {
        for x in 192..448 {
            frame.set_pixel(x, y, [220, 220, 220]);
        }
    }
    frame
}

pub fn silent_audio() -> AudioBuffers {
    AudioBuffers {
        state: AudioContextState::Running,
        frequency: vec![0; 256],
        time_domain: vec![128; 256],
    }
}

pub fn speech_audio() -> AudioBuffers {
    AudioBuffers {
        state: AudioContextState::Running,
        frequency: vec![40; 256],
        time_domain: vec![128; 256],
    }
}

/// Device returning the same frame and audio every tick
pub struct ScriptedDevice {
    frame: VideoFrame,
    audio: AudioBuffers,
    capture_ok: bool,
    releases: Arc<AtomicUsize>,
}

impl ScriptedDevice {
    pub fn new(frame: VideoFrame) -> Self {
        Self {
            frame,
            audio: silent_audio(),
            capture_ok: true,
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_audio(mut self, audio: AudioBuffers) -> Self {
        self.audio = audio;
        self
    }

    pub fn failing_capture(mut self) -> Self {
        self.capture_ok = false;
        self
    }
}

impl MediaDevice for ScriptedDevice {
    fn capture_frame(&mut self) -> Result<VideoFrame, CaptureError> {
        if self.capture_ok {
            Ok(self.frame.clone())
        } else {
            Err(CaptureError::DeviceUnavailable("scripted failure".into()))
        }
    }

    fn audio_buffers(&mut self) -> Result<AudioBuffers, CaptureError> {
        Ok(self.audio.clone())
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Source handing out one `ScriptedDevice`, or refusing access
pub struct ScriptedSource {
    frame: VideoFrame,
    audio: AudioBuffers,
    deny: bool,
    pub releases: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(frame: VideoFrame, audio: AudioBuffers) -> Self {
        Self {
            frame,
            audio,
            deny: false,
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::new(VideoFrame::filled(1, 1, [0, 0, 0]), silent_audio())
        }
    }
}

impl MediaSource for ScriptedSource {
    fn open(&mut self) -> Result<Box<dyn MediaDevice>, CaptureError> {
        if self.deny {
            return Err(CaptureError::PermissionDenied("camera".into()));
        }
        Ok(Box::new(ScriptedDevice {
            frame: self.frame.clone(),
            audio: self.audio.clone(),
            capture_ok: true,
            releases: self.releases.clone(),
        }))
    }
}
