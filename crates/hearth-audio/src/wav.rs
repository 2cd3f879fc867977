//! `.wav` decoding through `hound`.

use std::io::Cursor;

use hearth_assets::{AssetLoader, AssetResult, LoadContext};

use crate::clip::AudioClip;

/// Decodes RIFF WAVE files into an [`AudioClip`].
///
/// Integer samples are scaled by their bit depth into `[-1.0, 1.0]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavLoader;

impl WavLoader {
    pub fn new() -> Self {
        Self
    }
}

impl AssetLoader for WavLoader {
    type Asset = AudioClip;

    fn extensions(&self) -> &[&str] {
        &["wav", "wave"]
    }

    fn load(&self, ctx: LoadContext<'_>) -> AssetResult<Self::Asset> {
        let mut reader = hound::WavReader::new(Cursor::new(ctx.bytes))
            .map_err(|e| ctx.error(format!("Invalid WAV data: {e}")))?;
        let spec = reader.spec();

        let samples: Result<Vec<f32>, _> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect(),
            hound::SampleFormat::Int => {
                let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|s| s as f32 / max_value))
                    .collect()
            }
        };
        let samples = samples.map_err(|e| ctx.error(format!("Failed to read WAV samples: {e}")))?;

        tracing::trace!(
            "Decoded {} ({} ch, {} Hz, {} samples)",
            ctx.key,
            spec.channels,
            spec.sample_rate,
            samples.len()
        );
        Ok(AudioClip::new(samples, spec.channels, spec.sample_rate))
    }
}

/// Encode a clip as 16-bit PCM WAV bytes.
pub fn encode_pcm16(clip: &AudioClip) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: clip.channels,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in clip.samples.iter() {
            let scaled = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer.write_sample(scaled)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
