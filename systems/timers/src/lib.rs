#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Cancellable scheduled continuations advanced by the simulation clock.
//!
//! [`Timers`] replaces engine coroutines: callers schedule a payload after a
//! delay, move the horizon forward with [`Timers::advance_by`] once per tick,
//! then drain due payloads with [`Timers::pop_due`]. Each pop moves the
//! internal clock to the payload's deadline, so anything scheduled while
//! handling it is measured from that deadline rather than from the end of the
//! tick. A long tick therefore fires periodic work the same number of times as
//! several short ticks covering the same span.

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

/// Identifier returned when scheduling, used for cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Ordered queue of pending payloads keyed by deadline.
#[derive(Debug)]
pub struct Timers<T> {
    now: Duration,
    horizon: Duration,
    next_id: u64,
    pending: BTreeMap<(Duration, TimerId), T>,
    deadlines: HashMap<TimerId, Duration>,
}

impl<T> Default for Timers<T> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            horizon: Duration::ZERO,
            next_id: 0,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }
}

impl<T> Timers<T> {
    /// Creates an empty timer queue starting at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current clock reading used as the base for new deadlines.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of payloads still pending.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Reports whether no payloads are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Schedules `payload` to fire `delay` after the current clock reading.
    pub fn schedule(&mut self, delay: Duration, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let deadline = self.now.saturating_add(delay);
        let _ = self.pending.insert((deadline, id), payload);
        let _ = self.deadlines.insert(id, deadline);
        id
    }

    /// Cancels a pending timer, returning its payload if it had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let deadline = self.deadlines.remove(&id)?;
        self.pending.remove(&(deadline, id))
    }

    /// Reports whether the timer is still pending.
    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    /// Time left until the timer fires, measured from the current clock reading.
    #[must_use]
    pub fn remaining(&self, id: TimerId) -> Option<Duration> {
        self.deadlines
            .get(&id)
            .map(|deadline| deadline.saturating_sub(self.now))
    }

    /// Drops every pending payload without firing it.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.deadlines.clear();
    }

    /// Moves the horizon forward by `dt`; call [`Timers::pop_due`] afterwards.
    pub fn advance_by(&mut self, dt: Duration) {
        self.horizon = self.horizon.saturating_add(dt);
    }

    /// Pops the earliest payload due at or before the horizon.
    ///
    /// Once nothing is due the clock catches up with the horizon.
    pub fn pop_due(&mut self) -> Option<(TimerId, T)> {
        let key = match self.pending.keys().next() {
            Some(&(deadline, id)) if deadline <= self.horizon => (deadline, id),
            _ => {
                self.now = self.horizon;
                return None;
            }
        };

        let payload = self.pending.remove(&key)?;
        let _ = self.deadlines.remove(&key.1);
        self.now = key.0;
        Some((key.1, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<T>(timers: &mut Timers<T>) -> Vec<T> {
        let mut fired = Vec::new();
        while let Some((_, payload)) = timers.pop_due() {
            fired.push(payload);
        }
        fired
    }

    #[test]
    fn fires_in_deadline_order_then_schedule_order() {
        let mut timers = Timers::new();
        let _ = timers.schedule(Duration::from_millis(300), "late");
        let _ = timers.schedule(Duration::from_millis(100), "early");
        let _ = timers.schedule(Duration::from_millis(100), "early-second");

        timers.advance_by(Duration::from_millis(99));
        assert!(drain(&mut timers).is_empty());

        timers.advance_by(Duration::from_millis(1));
        assert_eq!(drain(&mut timers), vec!["early", "early-second"]);

        timers.advance_by(Duration::from_secs(1));
        assert_eq!(drain(&mut timers), vec!["late"]);
        assert!(timers.is_empty());
        assert_eq!(timers.now(), Duration::from_millis(1_100));
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut timers = Timers::new();
        let keep = timers.schedule(Duration::from_millis(10), 1);
        let drop = timers.schedule(Duration::from_millis(10), 2);

        assert_eq!(timers.cancel(drop), Some(2));
        assert_eq!(timers.cancel(drop), None, "second cancel is a no-op");
        assert!(timers.is_pending(keep));
        assert!(!timers.is_pending(drop));

        timers.advance_by(Duration::from_millis(10));
        assert_eq!(drain(&mut timers), vec![1]);
        assert!(!timers.is_pending(keep));
    }

    #[test]
    fn rescheduling_while_draining_is_relative_to_the_fired_deadline() {
        let mut timers = Timers::new();
        let interval = Duration::from_millis(250);
        let _ = timers.schedule(interval, 0u32);

        timers.advance_by(Duration::from_secs(1));
        let mut fired = Vec::new();
        while let Some((_, count)) = timers.pop_due() {
            fired.push((timers.now(), count));
            if count < 10 {
                let _ = timers.schedule(interval, count + 1);
            }
        }

        let times: Vec<_> = fired.iter().map(|(at, _)| at.as_millis()).collect();
        assert_eq!(times, vec![250, 500, 750, 1_000]);
        assert_eq!(timers.len(), 1, "the fifth firing waits for the next tick");
        let pending = timers.deadlines.keys().copied().next().expect("pending timer");
        assert_eq!(timers.remaining(pending), Some(interval));
    }

    #[test]
    fn clear_drops_everything() {
        let mut timers = Timers::new();
        let id = timers.schedule(Duration::ZERO, ());
        timers.clear();
        timers.advance_by(Duration::from_secs(1));
        assert!(timers.pop_due().is_none());
        assert!(!timers.is_pending(id));
        assert_eq!(id.get(), 0);
    }
}
