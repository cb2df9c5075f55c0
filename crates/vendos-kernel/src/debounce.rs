//! [`Debouncer`] – per-channel switch debounce filter.
//!
//! Mechanical microswitch contacts chatter for several milliseconds around
//! every transition.  The debouncer samples the raw level once per
//! control-loop tick and only commits a new stable value after the raw level
//! has held unchanged for a full debounce window:
//!
//! - a raw sample that differs from the previous raw sample resets the
//!   channel's settle timer;
//! - a raw level that has held for at least the window *and* differs from
//!   the current stable value updates the stable value and emits exactly one
//!   [`SwitchEdge`].
//!
//! Any oscillation faster than the window therefore produces zero edges;
//! only the eventual settled level (if sustained) produces one.
//!
//! Timestamps are injected by the caller, so the filter is fully
//! deterministic under test.
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, Instant};
//! use vendos_kernel::debounce::{Debouncer, SwitchEdge};
//!
//! let t0 = Instant::now();
//! let mut ch = Debouncer::new(Duration::from_millis(50), false, t0);
//!
//! // Contact closes and holds past the window: one Pressed edge.
//! assert_eq!(ch.sample(true, t0 + Duration::from_millis(10)), None);
//! assert_eq!(
//!     ch.sample(true, t0 + Duration::from_millis(70)),
//!     Some(SwitchEdge::Pressed)
//! );
//! ```

use std::time::{Duration, Instant};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// A committed stable-value transition on one switch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchEdge {
    /// The stable value transitioned to active (contact closed).
    Pressed,
    /// The stable value transitioned to inactive (contact open).
    Released,
}

// ────────────────────────────────────────────────────────────────────────────
// Debouncer
// ────────────────────────────────────────────────────────────────────────────

/// Debounce filter for one switch channel.
///
/// The stable value is the only output the dispense state machine may act
/// on; the raw value is exposed for diagnostics only.
pub struct Debouncer {
    window: Duration,
    raw_value: bool,
    stable_value: bool,
    last_change: Instant,
}

impl Debouncer {
    /// Create a channel whose raw and stable value both start at `initial`.
    pub fn new(window: Duration, initial: bool, now: Instant) -> Self {
        Self {
            window,
            raw_value: initial,
            stable_value: initial,
            last_change: now,
        }
    }

    /// Feed one raw sample taken at `now`.
    ///
    /// Returns the edge committed by this sample, if any.  An edge is
    /// emitted exactly once per settled transition: subsequent samples of
    /// the same raw level return `None` until the level changes again.
    pub fn sample(&mut self, raw: bool, now: Instant) -> Option<SwitchEdge> {
        if raw != self.raw_value {
            self.raw_value = raw;
            self.last_change = now;
        }

        if self.raw_value != self.stable_value
            && now.duration_since(self.last_change) >= self.window
        {
            self.stable_value = self.raw_value;
            return Some(if self.stable_value {
                SwitchEdge::Pressed
            } else {
                SwitchEdge::Released
            });
        }

        None
    }

    /// The debounced value, valid to act on.
    pub fn stable_value(&self) -> bool {
        self.stable_value
    }

    /// The most recent raw sample. Diagnostics only.
    pub fn raw_value(&self) -> bool {
        self.raw_value
    }
}
