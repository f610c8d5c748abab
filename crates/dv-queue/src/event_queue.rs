//! `EventQueue` — the timeline every simulated process suspends on.
//!
//! # Ordering
//!
//! Events are keyed by `(time, priority, seq)`:
//!
//! - earlier `time` first;
//! - at equal time, [`Priority::Low`] before [`Priority::Medium`] before
//!   [`Priority::High`];
//! - within one tier, insertion order (`seq` is a global counter).
//!
//! The key is unique, so it doubles as a cancellation handle: a suspended
//! process keeps the key of its pending timer and the coordinator removes the
//! entry to deliver an interrupt.
//!
//! `BTreeMap` gives O(log n) insert, pop and cancel.  Queue sizes are on the
//! order of the number of vehicles plus pending order releases.

use std::collections::BTreeMap;

use dv_core::{SimulationError, Tick};

// ── Priority ─────────────────────────────────────────────────────────────────

/// Scheduling tier.  The numeric values are part of the ordering contract.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub enum Priority {
    /// Runs first among events due at the same tick.
    Low = 1,
    #[default]
    Medium = 3,
    /// Runs last among events due at the same tick.
    High = 5,
}

// ── EventKey ──────────────────────────────────────────────────────────────────

/// Position of one scheduled event on the timeline.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EventKey {
    pub time:     Tick,
    pub priority: Priority,
    seq:          u64,
}

impl EventKey {
    /// Global insertion sequence number.
    #[inline]
    pub fn seq(self) -> u64 {
        self.seq
    }
}

// ── EventQueue ────────────────────────────────────────────────────────────────

/// A min-ordered, cancellable queue of events of type `E`.
pub struct EventQueue<E> {
    inner:    BTreeMap<EventKey, E>,
    next_seq: u64,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self { inner: BTreeMap::new(), next_seq: 0 }
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `event` at the absolute tick `time`.
    pub fn schedule(&mut self, time: Tick, priority: Priority, event: E) -> EventKey {
        let key = EventKey { time, priority, seq: self.next_seq };
        self.next_seq += 1;
        self.inner.insert(key, event);
        key
    }

    /// Schedule `event` `delay` ticks after `now`.
    #[inline]
    pub fn schedule_after(&mut self, now: Tick, delay: u64, priority: Priority, event: E) -> EventKey {
        self.schedule(now + delay, priority, event)
    }

    /// Schedule `event` at `until`, which must not lie before `now`.
    pub fn schedule_at(
        &mut self,
        now:      Tick,
        until:    Tick,
        priority: Priority,
        event:    E,
    ) -> Result<EventKey, SimulationError> {
        if until < now {
            return Err(SimulationError::NegativeDelay { now, until });
        }
        Ok(self.schedule(until, priority, event))
    }

    /// Remove a pending event.  Returns `None` if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, key: EventKey) -> Option<E> {
        self.inner.remove(&key)
    }

    /// Remove and return the next due event.
    pub fn pop_next(&mut self) -> Option<(EventKey, E)> {
        self.inner.pop_first()
    }

    /// Key of the next due event without removing it.
    pub fn peek_key(&self) -> Option<EventKey> {
        self.inner.keys().next().copied()
    }

    /// Time of the next due event.
    pub fn next_time(&self) -> Option<Tick> {
        self.peek_key().map(|k| k.time)
    }

    pub fn contains(&self, key: EventKey) -> bool {
        self.inner.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
