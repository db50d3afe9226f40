//! Audio side of story narration: PCM decoding, WAV delivery encoding and
//! the playback state machine.

pub mod pcm;
pub mod playback;
mod wav;

#[cfg(feature = "cpal")]
pub mod cpal_backend;

pub use pcm::{decode_pcm16, encode_pcm16, AudioBuffer};
pub use playback::{
    AudioBackend, AudioEngine, AudioSource, CompletionCallback, PlaybackController, PlaybackState,
};
pub use wav::{encode_wav, encode_wav_base64};

/// Sample rate of the speech payloads returned by the synthesis service.
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;
/// Speech payloads are mono.
pub const SPEECH_CHANNELS: u16 = 1;
