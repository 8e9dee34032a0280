//! # Reflow Scheduling
//!
//! Reflows never run inline with the event that asked for them. They are
//! scheduled for the next frame, optionally after a debounce, and the caller
//! polls for due work with an explicit clock. Passing `now` in keeps the
//! schedulers deterministic under test.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Handle to one scheduled reflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReflowToken(pub u64);

/// Something that can run a reflow later.
pub trait Scheduler {
    /// Schedule one reflow: after `delay` if given, then on the next frame.
    fn schedule_once(&mut self, delay: Option<Duration>, now: Instant) -> ReflowToken;

    /// Cancel a scheduled reflow. Returns `false` if it already ran or was
    /// never scheduled.
    fn cancel(&mut self, token: ReflowToken) -> bool;

    /// Take the earliest reflow due at `now`, if any.
    fn take_due(&mut self, now: Instant) -> Option<ReflowToken>;
}

/// Roughly one frame at 60 Hz.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Runs reflows at frame boundaries.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    frame_interval: Duration,
    pending: Vec<(ReflowToken, Instant)>,
    next_token: u64,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl FrameScheduler {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            pending: Vec::new(),
            next_token: 0,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// When the earliest pending reflow becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|&(_, due)| due).min()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Scheduler for FrameScheduler {
    fn schedule_once(&mut self, delay: Option<Duration>, now: Instant) -> ReflowToken {
        let token = ReflowToken(self.next_token);
        self.next_token += 1;
        let due = now + delay.unwrap_or(Duration::ZERO) + self.frame_interval;
        self.pending.push((token, due));
        token
    }

    fn cancel(&mut self, token: ReflowToken) -> bool {
        let before = self.pending.len();
        self.pending.retain(|&(t, _)| t != token);
        self.pending.len() != before
    }

    fn take_due(&mut self, now: Instant) -> Option<ReflowToken> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.1 <= now)
            .min_by_key(|(_, entry)| entry.1)
            .map(|(index, _)| index)?;
        Some(self.pending.remove(index).0)
    }
}

/// Everything scheduled is due immediately. For tests and batch tools.
#[derive(Debug, Clone, Default)]
pub struct ImmediateScheduler {
    pending: Vec<ReflowToken>,
    next_token: u64,
}

impl Scheduler for ImmediateScheduler {
    fn schedule_once(&mut self, _delay: Option<Duration>, _now: Instant) -> ReflowToken {
        let token = ReflowToken(self.next_token);
        self.next_token += 1;
        self.pending.push(token);
        token
    }

    fn cancel(&mut self, token: ReflowToken) -> bool {
        let before = self.pending.len();
        self.pending.retain(|&t| t != token);
        self.pending.len() != before
    }

    fn take_due(&mut self, _now: Instant) -> Option<ReflowToken> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }
}
