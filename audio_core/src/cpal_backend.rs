//! Native output through cpal.
//!
//! The engine owns the pause flag that stands in for the audio clock: while
//! suspended the data callback writes silence without advancing the read
//! position. Each source owns one output stream over one buffer.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};

use crate::pcm::AudioBuffer;
use crate::playback::{AudioBackend, AudioEngine, AudioSource, CompletionCallback};

type CallbackSlot = Arc<Mutex<Option<CompletionCallback>>>;

/// Backend bound to the host's default output device.
pub struct CpalBackend {
    device: Device,
}

impl CpalBackend {
    pub fn new() -> anyhow::Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .context("no output device available")?;
        Ok(Self { device })
    }
}

impl AudioBackend for CpalBackend {
    type Engine = CpalEngine;

    fn create_engine(&mut self, sample_rate: u32) -> anyhow::Result<CpalEngine> {
        let supported = self
            .device
            .supported_output_configs()
            .context("failed to query output configs")?
            .find(|range| {
                range.min_sample_rate().0 <= sample_rate && range.max_sample_rate().0 >= sample_rate
            })
            .with_context(|| format!("output device does not support {sample_rate} Hz"))?
            .with_sample_rate(cpal::SampleRate(sample_rate));

        Ok(CpalEngine {
            device: self.device.clone(),
            sample_format: supported.sample_format(),
            config: supported.into(),
            suspended: Arc::new(AtomicBool::new(false)),
        })
    }
}

pub struct CpalEngine {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    suspended: Arc<AtomicBool>,
}

impl CpalEngine {
    fn build_stream<T>(
        &self,
        buffer: Arc<AudioBuffer>,
        position: Arc<AtomicUsize>,
        on_ended: CallbackSlot,
    ) -> anyhow::Result<Stream>
    where
        T: SizedSample + FromSample<f32> + Default + Send + 'static,
    {
        let out_channels = self.config.channels as usize;
        let suspended = self.suspended.clone();

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if suspended.load(Ordering::SeqCst) {
                        data.fill(T::default());
                        return;
                    }

                    let frames = buffer.frames();
                    let src_channels = buffer.channel_count();
                    let mut pos = position.load(Ordering::SeqCst);

                    for frame in data.chunks_mut(out_channels) {
                        if pos >= frames || src_channels == 0 {
                            frame.fill(T::default());
                            continue;
                        }
                        for (c, out) in frame.iter_mut().enumerate() {
                            let sample = buffer
                                .channel(c.min(src_channels - 1))
                                .and_then(|ch| ch.get(pos))
                                .copied()
                                .unwrap_or(0.0);
                            *out = T::from_sample(sample);
                        }
                        pos += 1;
                    }
                    position.store(pos, Ordering::SeqCst);

                    if pos >= frames {
                        let callback = on_ended.lock().ok().and_then(|mut slot| slot.take());
                        if let Some(callback) = callback {
                            callback();
                        }
                    }
                },
                |err| {
                    tracing::error!(error = ?err, "playback stream error");
                },
                None,
            )
            .context("failed to build output stream")
    }
}

impl AudioEngine for CpalEngine {
    type Source = CpalSource;

    fn create_source(&mut self, buffer: Arc<AudioBuffer>) -> anyhow::Result<CpalSource> {
        let position = Arc::new(AtomicUsize::new(0));
        let on_ended: CallbackSlot = Arc::new(Mutex::new(None));

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(buffer, position, on_ended.clone())?,
            SampleFormat::I16 => self.build_stream::<i16>(buffer, position, on_ended.clone())?,
            format => anyhow::bail!("unsupported sample format: {:?}", format),
        };

        Ok(CpalSource {
            stream: Some(stream),
            on_ended,
        })
    }

    fn suspend(&mut self) -> anyhow::Result<()> {
        self.suspended.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> anyhow::Result<()> {
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.suspended.store(true, Ordering::SeqCst);
    }
}

pub struct CpalSource {
    stream: Option<Stream>,
    on_ended: CallbackSlot,
}

impl AudioSource for CpalSource {
    fn start(&mut self, on_ended: CompletionCallback) -> anyhow::Result<()> {
        let stream = self.stream.as_ref().context("source already stopped")?;
        if let Ok(mut slot) = self.on_ended.lock() {
            *slot = Some(on_ended);
        }
        stream.play().context("failed to start playback stream")
    }

    fn clear_on_ended(&mut self) {
        if let Ok(mut slot) = self.on_ended.lock() {
            slot.take();
        }
    }

    fn stop(&mut self) {
        // pause, then drop the stream to release the device callback
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!(error = ?e, "failed to pause stream before release");
            }
            drop(stream);
        }
    }
}
