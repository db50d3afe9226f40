//! Play/pause/stop state machine over a host audio engine.
//!
//! The host facility (browser audio context, native output device, test
//! double) is reached through three traits: a backend that builds engines,
//! an engine that owns the audio clock, and a single-use source bound to one
//! decoded buffer. A [`PlaybackController`] owns at most one live session
//! (engine + source) at a time and guarantees both are released together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::pcm::AudioBuffer;

/// Fired by a source once when its buffer plays to the end.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// A playable source bound to one buffer. Sources are single-use: once
/// stopped or finished they are never started again.
pub trait AudioSource {
    fn start(&mut self, on_ended: CompletionCallback) -> anyhow::Result<()>;
    /// Detach the completion callback so it can no longer fire.
    fn clear_on_ended(&mut self);
    /// Must be safe to call on a source that already finished.
    fn stop(&mut self);
}

/// Owns the audio clock. Suspending halts the clock and keeps the position.
pub trait AudioEngine {
    type Source: AudioSource;

    fn create_source(&mut self, buffer: Arc<AudioBuffer>) -> anyhow::Result<Self::Source>;
    fn suspend(&mut self) -> anyhow::Result<()>;
    fn resume(&mut self) -> anyhow::Result<()>;
    fn close(&mut self);
}

pub trait AudioBackend {
    type Engine: AudioEngine;

    fn create_engine(&mut self, sample_rate: u32) -> anyhow::Result<Self::Engine>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

struct Session<E: AudioEngine> {
    engine: E,
    source: E::Source,
    ended: Arc<AtomicBool>,
    paused: bool,
}

impl<E: AudioEngine> Session<E> {
    fn has_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    // Callback goes first so nothing fires against a released source.
    fn teardown(mut self) {
        self.source.clear_on_ended();
        self.source.stop();
        self.engine.close();
    }
}

/// Playback of one story's narration.
pub struct PlaybackController<B: AudioBackend> {
    backend: B,
    buffer: Option<Arc<AudioBuffer>>,
    session: Option<Session<B::Engine>>,
}

impl<B: AudioBackend> PlaybackController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            buffer: None,
            session: None,
        }
    }

    pub fn with_buffer(backend: B, buffer: Arc<AudioBuffer>) -> Self {
        Self {
            backend,
            buffer: Some(buffer),
            session: None,
        }
    }

    /// Replace the narration. Any live session is torn down first and the
    /// controller returns to Idle.
    pub fn set_buffer(&mut self, buffer: Option<Arc<AudioBuffer>>) {
        self.stop();
        self.buffer = buffer;
    }

    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        match &self.session {
            None => PlaybackState::Idle,
            Some(s) if s.has_ended() => PlaybackState::Idle,
            Some(s) if s.paused => PlaybackState::Paused,
            Some(_) => PlaybackState::Playing,
        }
    }

    /// Release the session if its source reported completion.
    pub fn poll(&mut self) -> PlaybackState {
        if self.session.as_ref().is_some_and(Session::has_ended) {
            if let Some(session) = self.session.take() {
                tracing::debug!("playback finished");
                session.teardown();
            }
        }
        self.state()
    }

    /// Begin playback from Idle. A no-op in any other state or when there is
    /// nothing to play.
    pub fn start(&mut self) -> anyhow::Result<PlaybackState> {
        if self.poll() != PlaybackState::Idle {
            return Ok(self.state());
        }
        let Some(buffer) = self.buffer.clone() else {
            return Ok(PlaybackState::Idle);
        };

        let mut engine = self.backend.create_engine(buffer.sample_rate())?;
        let mut source = match engine.create_source(buffer.clone()) {
            Ok(source) => source,
            Err(e) => {
                engine.close();
                return Err(e);
            }
        };

        let ended = Arc::new(AtomicBool::new(false));
        let flag = ended.clone();
        if let Err(e) = source.start(Box::new(move || flag.store(true, Ordering::SeqCst))) {
            source.clear_on_ended();
            source.stop();
            engine.close();
            return Err(e);
        }

        tracing::debug!(
            sample_rate = buffer.sample_rate(),
            frames = buffer.frames(),
            "playback started"
        );
        self.session = Some(Session {
            engine,
            source,
            ended,
            paused: false,
        });
        Ok(PlaybackState::Playing)
    }

    /// Idle -> Playing, Playing -> Paused, Paused -> Playing.
    pub fn toggle(&mut self) -> anyhow::Result<PlaybackState> {
        match self.poll() {
            PlaybackState::Idle => self.start(),
            PlaybackState::Playing => {
                if let Some(session) = self.session.as_mut() {
                    session.engine.suspend()?;
                    session.paused = true;
                }
                Ok(PlaybackState::Paused)
            }
            PlaybackState::Paused => {
                if let Some(session) = self.session.as_mut() {
                    session.engine.resume()?;
                    session.paused = false;
                }
                Ok(PlaybackState::Playing)
            }
        }
    }

    /// Tear down the live session, if any.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.teardown();
        }
    }
}

impl<B: AudioBackend> Drop for PlaybackController<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm::decode_pcm16;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log {
        engines_created: usize,
        engines_closed: usize,
        sources_created: usize,
        sources_stopped: usize,
        suspends: usize,
        resumes: usize,
        callbacks_cleared: usize,
        pending: Option<CompletionCallback>,
    }

    type SharedLog = Arc<Mutex<Log>>;

    struct FakeBackend(SharedLog);
    struct FakeEngine {
        id: usize,
        log: SharedLog,
    }
    struct FakeSource {
        started: bool,
        log: SharedLog,
    }

    impl AudioBackend for FakeBackend {
        type Engine = FakeEngine;

        fn create_engine(&mut self, _sample_rate: u32) -> anyhow::Result<FakeEngine> {
            let mut log = self.0.lock().unwrap();
            log.engines_created += 1;
            Ok(FakeEngine {
                id: log.engines_created,
                log: self.0.clone(),
            })
        }
    }

    impl AudioEngine for FakeEngine {
        type Source = FakeSource;

        fn create_source(&mut self, _buffer: Arc<AudioBuffer>) -> anyhow::Result<FakeSource> {
            self.log.lock().unwrap().sources_created += 1;
            Ok(FakeSource {
                started: false,
                log: self.log.clone(),
            })
        }

        fn suspend(&mut self) -> anyhow::Result<()> {
            self.log.lock().unwrap().suspends += 1;
            Ok(())
        }

        fn resume(&mut self) -> anyhow::Result<()> {
            self.log.lock().unwrap().resumes += 1;
            Ok(())
        }

        fn close(&mut self) {
            self.log.lock().unwrap().engines_closed += 1;
        }
    }

    impl AudioSource for FakeSource {
        fn start(&mut self, on_ended: CompletionCallback) -> anyhow::Result<()> {
            assert!(!self.started, "source started twice");
            self.started = true;
            self.log.lock().unwrap().pending = Some(on_ended);
            Ok(())
        }

        fn clear_on_ended(&mut self) {
            let mut log = self.log.lock().unwrap();
            log.pending = None;
            log.callbacks_cleared += 1;
        }

        fn stop(&mut self) {
            self.log.lock().unwrap().sources_stopped += 1;
        }
    }

    fn buffer() -> Arc<AudioBuffer> {
        Arc::new(decode_pcm16(&[0u8; 48], 24_000, 1))
    }

    fn controller() -> (PlaybackController<FakeBackend>, SharedLog) {
        let log: SharedLog = Arc::default();
        let ctl = PlaybackController::with_buffer(FakeBackend(log.clone()), buffer());
        (ctl, log)
    }

    fn fire_completion(log: &SharedLog) {
        let cb = log.lock().unwrap().pending.take().expect("no pending callback");
        cb();
    }

    #[test]
    fn test_initial_state_is_idle() {
        let (ctl, log) = controller();
        assert_eq!(ctl.state(), PlaybackState::Idle);
        assert_eq!(ctl.state(), PlaybackState::default());
        assert_eq!(log.lock().unwrap().engines_created, 0);
    }

    #[test]
    fn test_pause_resume_keeps_engine() {
        let (mut ctl, log) = controller();
        assert_eq!(ctl.toggle().unwrap(), PlaybackState::Playing);
        let first_engine = ctl.session.as_ref().unwrap().engine.id;

        assert_eq!(ctl.toggle().unwrap(), PlaybackState::Paused);
        assert_eq!(ctl.toggle().unwrap(), PlaybackState::Playing);

        let log = log.lock().unwrap();
        assert_eq!(log.engines_created, 1);
        assert_eq!(log.suspends, 1);
        assert_eq!(log.resumes, 1);
        assert_eq!(ctl.session.as_ref().unwrap().engine.id, first_engine);
    }

    #[test]
    fn test_completion_returns_to_idle_and_restart_builds_new_engine() {
        let (mut ctl, log) = controller();
        ctl.start().unwrap();
        fire_completion(&log);

        assert_eq!(ctl.state(), PlaybackState::Idle);
        assert_eq!(ctl.poll(), PlaybackState::Idle);
        {
            let log = log.lock().unwrap();
            assert_eq!(log.engines_closed, 1);
            assert_eq!(log.sources_stopped, 1);
        }

        assert_eq!(ctl.start().unwrap(), PlaybackState::Playing);
        let log = log.lock().unwrap();
        assert_eq!(log.engines_created, 2);
        assert_eq!(log.sources_created, 2);
    }

    #[test]
    fn test_completion_while_paused() {
        let (mut ctl, log) = controller();
        ctl.start().unwrap();
        ctl.toggle().unwrap();
        fire_completion(&log);
        assert_eq!(ctl.state(), PlaybackState::Idle);
        assert_eq!(ctl.toggle().unwrap(), PlaybackState::Playing);
        assert_eq!(log.lock().unwrap().engines_created, 2);
    }

    #[test]
    fn test_start_while_playing_is_noop() {
        let (mut ctl, log) = controller();
        ctl.start().unwrap();
        assert_eq!(ctl.start().unwrap(), PlaybackState::Playing);
        assert_eq!(log.lock().unwrap().engines_created, 1);
    }

    #[test]
    fn test_new_buffer_tears_down_session() {
        let (mut ctl, log) = controller();
        ctl.start().unwrap();
        ctl.toggle().unwrap();

        ctl.set_buffer(Some(buffer()));
        assert_eq!(ctl.state(), PlaybackState::Idle);
        let log = log.lock().unwrap();
        assert_eq!(log.callbacks_cleared, 1);
        assert_eq!(log.sources_stopped, 1);
        assert_eq!(log.engines_closed, 1);
        assert!(log.pending.is_none());
    }

    #[test]
    fn test_no_buffer_stays_idle() {
        let log: SharedLog = Arc::default();
        let mut ctl = PlaybackController::new(FakeBackend(log.clone()));
        assert_eq!(ctl.toggle().unwrap(), PlaybackState::Idle);
        assert_eq!(log.lock().unwrap().engines_created, 0);
    }

    #[test]
    fn test_drop_releases_session() {
        let (mut ctl, log) = controller();
        ctl.start().unwrap();
        drop(ctl);
        let log = log.lock().unwrap();
        assert_eq!(log.engines_closed, 1);
        assert_eq!(log.sources_stopped, 1);
    }

    #[test]
    fn test_stale_completion_ignored() {
        let (mut ctl, log) = controller();
        ctl.start().unwrap();
        let stale = log.lock().unwrap().pending.take().unwrap();
        ctl.stop();
        ctl.start().unwrap();

        stale();
        assert_eq!(ctl.state(), PlaybackState::Playing);
    }
}
