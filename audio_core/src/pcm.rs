//! Raw 16-bit PCM decoding.
//!
//! Speech payloads arrive as interleaved signed 16-bit little-endian samples
//! with no container. Decoding normalizes them into one `f32` sequence per
//! channel so the result can be bound directly to a playback source.

use std::time::Duration;

use serde::Serialize;

/// Divisor used to map `i16` into `[-1.0, 1.0)`.
const PCM16_SCALE: f32 = 32768.0;

/// Decoded audio, one sample sequence per channel.
///
/// All channels have the same length. Built once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Fails if the channels differ in length.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> anyhow::Result<Self> {
        if let Some(first) = channels.first() {
            if let Some((index, ch)) = channels
                .iter()
                .enumerate()
                .find(|(_, ch)| ch.len() != first.len())
            {
                anyhow::bail!(
                    "channel {} has {} samples, expected {}",
                    index,
                    ch.len(),
                    first.len()
                );
            }
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.frames() as u64 * 1_000_000_000 / u64::from(self.sample_rate))
    }

    /// Samples re-interleaved in frame order.
    pub fn interleaved(&self) -> Vec<f32> {
        let channels = self.channel_count();
        let mut out = Vec::with_capacity(self.frames() * channels);
        for frame in 0..self.frames() {
            out.extend(self.channels.iter().filter_map(|ch| ch.get(frame)));
        }
        out
    }
}

/// Decode interleaved signed 16-bit little-endian PCM.
///
/// Any trailing partial frame is dropped. Malformed input only ever yields
/// fewer frames; this never fails.
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32, channels: u16) -> AudioBuffer {
    let channel_count = channels as usize;
    if channel_count == 0 {
        return AudioBuffer {
            sample_rate,
            channels: Vec::new(),
        };
    }

    let frame_bytes = 2 * channel_count;
    let frames = bytes.len() / frame_bytes;
    let dropped = bytes.len() - frames * frame_bytes;
    if dropped > 0 {
        tracing::debug!(
            dropped_bytes = dropped,
            total_bytes = bytes.len(),
            "dropping trailing partial PCM frame"
        );
    }

    let mut out: Vec<Vec<f32>> = (0..channel_count)
        .map(|_| Vec::with_capacity(frames))
        .collect();

    for frame in bytes[..frames * frame_bytes].chunks_exact(frame_bytes) {
        for (ch, sample) in frame.chunks_exact(2).enumerate() {
            let v = i16::from_le_bytes([sample[0], sample[1]]);
            out[ch].push(v as f32 / PCM16_SCALE);
        }
    }

    AudioBuffer {
        sample_rate,
        channels: out,
    }
}

/// Quantize a normalized sample back to `i16`.
pub fn quantize(sample: f32) -> i16 {
    (sample * PCM16_SCALE)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Inverse of [`decode_pcm16`]: interleaved little-endian `i16` bytes.
pub fn encode_pcm16(buffer: &AudioBuffer) -> Vec<u8> {
    buffer
        .interleaved()
        .into_iter()
        .flat_map(|s| quantize(s).to_le_bytes())
        .collect()
}
