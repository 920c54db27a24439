//! Short-lived per-item visual cues driven by vote outcomes.
//!
//! Nothing here affects correctness; the cache is the source of truth for
//! what is shown. Each item carries at most one cue at a time, and a new cue
//! replaces the old one and restarts its timer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimationKind {
    Up,
    Down,
    /// Rate-limited vote, rolled back.
    Rejected,
    /// Any other failed vote, rolled back.
    Failed,
}

impl AnimationKind {
    pub fn duration(&self) -> Duration {
        match self {
            AnimationKind::Up | AnimationKind::Down => Duration::from_millis(600),
            AnimationKind::Failed => Duration::from_millis(1_000),
            AnimationKind::Rejected => Duration::from_millis(1_500),
        }
    }
}

#[derive(Default)]
pub struct FeedbackAnimator {
    active: HashMap<ItemId, (AnimationKind, Instant)>,
}

impl FeedbackAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&mut self, id: ItemId, kind: AnimationKind, now: Instant) {
        self.active.insert(id, (kind, now + kind.duration()));
    }

    pub fn current(&self, id: ItemId, now: Instant) -> Option<AnimationKind> {
        self.active
            .get(&id)
            .filter(|(_, expires)| now < *expires)
            .map(|(kind, _)| *kind)
    }

    /// Drop every cue whose timer has run out.
    pub fn sweep(&mut self, now: Instant) {
        self.active.retain(|_, (_, expires)| now < *expires);
    }

    /// Earliest pending expiry, for scheduling the next repaint.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.active.values().map(|(_, expires)| *expires).min()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }
}
