//! Silence / ambient / speech classification

use media_capture::{AudioBuffers, AudioContextState};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::statistics::WindowStats;
use crate::{AudioConfig, AudioError};

/// Classification of one audio window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum SpeechVerdict {
    /// Audio context not running; nothing was classified
    Inactive { state: AudioContextState },
    Silent { stats: WindowStats },
    Ambient { stats: WindowStats },
    Speech { stats: WindowStats },
}

impl SpeechVerdict {
    pub fn is_speech(&self) -> bool {
        matches!(self, SpeechVerdict::Speech { .. })
    }
}

pub struct AudioActivityDetector {
    config: AudioConfig,
}

impl AudioActivityDetector {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Classify one analyser snapshot.
    ///
    /// A context that is not running yields `Inactive` without looking at
    /// the buffers.
    pub fn classify(&self, buffers: &AudioBuffers) -> Result<SpeechVerdict, AudioError> {
        if buffers.state != AudioContextState::Running {
            return Ok(SpeechVerdict::Inactive {
                state: buffers.state,
            });
        }

        let stats = WindowStats::compute(buffers)?;
        debug!(
            "Audio window: mean={:.1} max={:.0} peak={:.0}",
            stats.mean, stats.max, stats.time_domain_peak
        );

        let verdict = if stats.mean > self.config.speech_threshold
            || stats.max > self.config.max_threshold
            || stats.time_domain_peak > self.config.time_domain_threshold
        {
            SpeechVerdict::Speech { stats }
        } else if stats.mean > self.config.speech_threshold * self.config.ambient_factor {
            SpeechVerdict::Ambient { stats }
        } else {
            SpeechVerdict::Silent { stats }
        };
        Ok(verdict)
    }
}

impl Default for AudioActivityDetector {
    fn default() -> Self {
        Self::new(AudioConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn running(frequency: Vec<u8>, time_domain: Vec<u8>) -> AudioBuffers {
        AudioBuffers {
            state: AudioContextState::Running,
            frequency,
            time_domain,
        }
    }

    #[test]
    fn test_loud_mean_is_speech() {
        let detector = AudioActivityDetector::default();
        let verdict = detector.classify(&running(vec![40; 256], vec![128; 512])).unwrap();
        assert!(verdict.is_speech());
    }

    #[test]
    fn test_presets_move_speech_threshold() {
        let murmur = running(vec![7; 256], vec![128; 512]);

        let strict = AudioActivityDetector::new(AudioConfig::strict());
        assert!(strict.classify(&murmur).unwrap().is_speech());

        let default = AudioActivityDetector::default();
        assert!(matches!(default.classify(&murmur).unwrap(), SpeechVerdict::Ambient { .. }));

        let lenient = AudioActivityDetector::new(AudioConfig::lenient());
        assert!(matches!(lenient.classify(&murmur).unwrap(), SpeechVerdict::Ambient { .. }));
    }

    #[test]
    fn test_single_spike_is_speech() {
        let detector = AudioActivityDetector::default();
        let mut frequency = vec![0u8; 256];
        frequency[10] = 30;
        let verdict = detector.classify(&running(frequency, vec![128; 512])).unwrap();
        assert!(verdict.is_speech());
    }

    #[test]
    fn test_time_domain_peak_is_speech() {
        let detector = AudioActivityDetector::default();
        let mut time_domain = vec![128u8; 512];
        time_domain[100] = 150;
        let verdict = detector.classify(&running(vec![0; 256], time_domain)).unwrap();
        assert!(verdict.is_speech());
    }

    #[test]
    fn test_ambient_band() {
        let detector = AudioActivityDetector::default();
        let verdict = detector.classify(&running(vec![6; 256], vec![130; 512])).unwrap();
        assert!(matches!(verdict, SpeechVerdict::Ambient { .. }));
    }

    #[test]
    fn test_quiet_room_is_silent() {
        let detector = AudioActivityDetector::default();
        let verdict = detector.classify(&running(vec![2; 256], vec![129; 512])).unwrap();
        assert!(matches!(verdict, SpeechVerdict::Silent { .. }));
    }

    #[test]
    fn test_suspended_context_is_inactive() {
        let detector = AudioActivityDetector::default();
        let buffers = AudioBuffers {
            state: AudioContextState::Suspended,
            frequency: vec![200; 256],
            time_domain: vec![255; 512],
        };
        assert_eq!(
            detector.classify(&buffers).unwrap(),
            SpeechVerdict::Inactive {
                state: AudioContextState::Suspended
            }
        );
    }

    #[test]
    fn test_empty_running_buffers_error() {
        let detector = AudioActivityDetector::default();
        assert!(detector.classify(&running(vec![], vec![])).is_err());
    }

    proptest! {
        #[test]
        fn prop_louder_never_quieter(level in 0u8..=255, bump in 0u8..=64) {
            let detector = AudioActivityDetector::default();
            let rank = |v: SpeechVerdict| match v {
                SpeechVerdict::Inactive { .. } => 0,
                SpeechVerdict::Silent { .. } => 1,
                SpeechVerdict::Ambient { .. } => 2,
                SpeechVerdict::Speech { .. } => 3,
            };
            let quiet = detector.classify(&running(vec![level; 64], vec![128; 64])).unwrap();
            let loud = detector
                .classify(&running(vec![level.saturating_add(bump); 64], vec![128; 64]))
                .unwrap();
            prop_assert!(rank(loud) >= rank(quiet));
        }
    }
}
