//! Tracks the in-flight story and illustration requests.
//!
//! Each pathway has at most one current attempt. Starting a new attempt on a
//! pathway cancels the previous one on that pathway only. Illustrations are
//! keyed to the story they were requested for; once a newer story exists the
//! illustration result is stale.

use std::sync::{Mutex, MutexGuard};

use story_core::CancellationToken;
use uuid::Uuid;

/// One started request: its identifier and the token that cancels it.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub id: Uuid,
    pub token: CancellationToken,
}

impl Attempt {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            token: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Slots {
    story: Option<Attempt>,
    illustration: Option<(Attempt, Uuid)>,
    latest_story: Option<Uuid>,
}

#[derive(Debug, Default)]
pub struct GenerationTracker {
    slots: Mutex<Slots>,
}

impl GenerationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a story attempt, cancelling any story still in flight.
    pub fn begin_story(&self) -> Attempt {
        let attempt = Attempt::new();
        let mut slots = self.slots();
        if let Some(prev) = slots.story.replace(attempt.clone()) {
            tracing::debug!(story_id = %prev.id, "superseding in-flight story");
            prev.token.cancel();
        }
        slots.latest_story = Some(attempt.id);
        attempt
    }

    /// Clear the slot and report whether the attempt is still the latest
    /// story and was not cancelled.
    pub fn finish_story(&self, attempt: &Attempt) -> bool {
        let mut slots = self.slots();
        if slots.story.as_ref().is_some_and(|a| a.id == attempt.id) {
            slots.story = None;
        }
        slots.latest_story == Some(attempt.id) && !attempt.token.is_cancelled()
    }

    pub fn cancel_story(&self) -> bool {
        match self.slots().story.take() {
            Some(attempt) => {
                attempt.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn latest_story(&self) -> Option<Uuid> {
        self.slots().latest_story
    }

    /// Start an illustration for `story_id`. `None` if that story is not the
    /// latest one.
    pub fn begin_illustration(&self, story_id: Uuid) -> Option<Attempt> {
        let mut slots = self.slots();
        if slots.latest_story != Some(story_id) {
            return None;
        }
        let attempt = Attempt::new();
        if let Some((prev, _)) = slots.illustration.replace((attempt.clone(), story_id)) {
            prev.token.cancel();
        }
        Some(attempt)
    }

    pub fn finish_illustration(&self, attempt: &Attempt, story_id: Uuid) -> bool {
        let mut slots = self.slots();
        if slots
            .illustration
            .as_ref()
            .is_some_and(|(a, _)| a.id == attempt.id)
        {
            slots.illustration = None;
        }
        slots.latest_story == Some(story_id) && !attempt.token.is_cancelled()
    }

    pub fn cancel_illustration(&self) -> bool {
        match self.slots().illustration.take() {
            Some((attempt, _)) => {
                attempt.token.cancel();
                true
            }
            None => false,
        }
    }
}
