//! Layered session configuration

use alerting::AlertConfig;
use audio_activity::AudioConfig;
use escalation::EscalationConfig;
use fraud_sync::BackendConfig;
use media_capture::CaptureConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use vision::VisionConfig;

use crate::ProctorError;

/// Environment variable prefix; nested keys use `__`
pub const ENV_PREFIX: &str = "PROCTOR";

/// Everything a session needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProctorConfig {
    /// Detection period (milliseconds)
    pub tick_interval_ms: u64,

    /// Ticks waiting for the worker before new ones are dropped
    pub tick_queue_capacity: usize,

    pub capture: CaptureConfig,
    pub vision: VisionConfig,
    pub audio: AudioConfig,
    pub escalation: EscalationConfig,
    pub alerts: AlertConfig,
    pub backend: BackendConfig,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2_000,
            tick_queue_capacity: 2,
            capture: CaptureConfig::default(),
            vision: VisionConfig::default(),
            audio: AudioConfig::default(),
            escalation: EscalationConfig::default(),
            alerts: AlertConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl ProctorConfig {
    /// Tighter detector thresholds
    pub fn strict() -> Self {
        Self {
            vision: VisionConfig::strict(),
            audio: AudioConfig::strict(),
            ..Default::default()
        }
    }

    /// Looser detector thresholds
    pub fn lenient() -> Self {
        Self {
            vision: VisionConfig::lenient(),
            audio: AudioConfig::lenient(),
            ..Default::default()
        }
    }

    /// Defaults, then an optional file, then `PROCTOR__*` environment variables
    pub fn load(path: Option<&str>) -> Result<Self, ProctorError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&ProctorConfig::default())?);

        if let Some(path) = path {
            info!("Loading configuration from {}", path);
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_defaults() {
        let config = ProctorConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_secs(2));
        assert_eq!(config.tick_queue_capacity, 2);
        assert_eq!(config.escalation.threshold, 3);
        assert_eq!(config.alerts.dedup_window_ms, 5_000);
        assert_eq!(config.backend.timeout_ms, 5_000);
        assert_eq!(config.vision.model_load_timeout_ms, 10_000);
        assert_eq!(config.capture.analyser.fft_size, 512);
    }

    #[test]
    fn test_presets_only_touch_detectors() {
        let default = ProctorConfig::default();
        let strict = ProctorConfig::strict();
        let lenient = ProctorConfig::lenient();

        assert!(strict.audio.speech_threshold < default.audio.speech_threshold);
        assert!(lenient.audio.speech_threshold > default.audio.speech_threshold);
        assert!(strict.vision.center_threshold_px < default.vision.center_threshold_px);
        assert!(lenient.vision.center_threshold_px > default.vision.center_threshold_px);
        assert!(lenient.vision.max_motion_zones > default.vision.max_motion_zones);

        for config in [&strict, &lenient] {
            assert_eq!(config.tick_interval_ms, default.tick_interval_ms);
            assert_eq!(config.escalation.threshold, default.escalation.threshold);
            assert_eq!(config.alerts.dedup_window_ms, default.alerts.dedup_window_ms);
        }
    }

    #[test]
    fn test_load_without_file_keeps_defaults() {
        let config = ProctorConfig::load(None).unwrap();
        assert_eq!(config.tick_interval_ms, 2_000);
        assert_eq!(config.audio.speech_threshold, 8.0);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("proctor-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "tick_interval_ms = 500\n[escalation]\nthreshold = 5\n",
        )
        .unwrap();

        let config = ProctorConfig::load(path.to_str()).unwrap();
        assert_eq!(config.tick_interval_ms, 500);
        assert_eq!(config.escalation.threshold, 5);
        assert_eq!(config.escalation.sensitization_ms, 20_000);

        std::fs::remove_file(&path).ok();
    }
}
