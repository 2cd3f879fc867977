use std::sync::Arc;
use std::time::Duration;

use hearth_assets::Asset;

/// Decoded PCM audio, interleaved, normalized to `[-1.0, 1.0]`.
///
/// Samples are shared, so cloning a clip is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Arc<[f32]>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: impl Into<Arc<[f32]>>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            channels,
            sample_rate,
        }
    }

    /// A clip of `duration` silence. Mostly useful in tests.
    pub fn silence(duration: Duration, channels: u16, sample_rate: u32) -> Self {
        let frames = (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        let samples = vec![0.0; frames * usize::from(channels)];
        Self::new(samples, channels, sample_rate)
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / usize::from(self.channels)
    }

    /// Playback length at the clip's sample rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }
}

impl Asset for AudioClip {
    fn type_name() -> &'static str {
        "AudioClip"
    }
}
