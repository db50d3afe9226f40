use std::io::Cursor;

use anyhow::Context;
use base64::{engine::general_purpose, Engine as _};

use crate::pcm::{quantize, AudioBuffer};

/// Wrap a decoded buffer in a 16-bit PCM WAV (RIFF) container.
pub fn encode_wav(buffer: &AudioBuffer) -> anyhow::Result<Vec<u8>> {
    let channels = u16::try_from(buffer.channel_count())
        .context("too many channels for a WAV header")?;
    let spec = hound::WavSpec {
        channels: channels.max(1),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + buffer.frames() * 2 * channels as usize));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| anyhow::anyhow!("wav write err: {e}"))?;
        for s in buffer.interleaved() {
            writer
                .write_sample(quantize(s))
                .map_err(|e| anyhow::anyhow!("wav sample err: {e}"))?;
        }
        writer
            .finalize()
            .map_err(|e| anyhow::anyhow!("wav finalize err: {e}"))?;
    }

    Ok(cursor.into_inner())
}

/// Encode as WAV and return Base64, ready for a JSON response.
pub fn encode_wav_base64(buffer: &AudioBuffer) -> anyhow::Result<String> {
    Ok(general_purpose::STANDARD.encode(encode_wav(buffer)?))
}
