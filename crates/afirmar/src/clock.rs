//! Virtual Clock for Deterministic Timers
//!
//! Simulated time for fixtures. Components schedule callbacks against the
//! clock instead of real timers; a `wait(ms)` predicate advances it and the
//! due callbacks fire synchronously, in due-time order, on the calling thread.
//!
//! ## Toyota Way Application
//!
//! - **Heijunka**: Timers fire in a fixed order (due time, then schedule order)
//! - **Poka-Yoke**: No real sleeping, so no flaky timing in tests

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Identifier of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(u64);

struct Timer {
    id: TimerId,
    due_ms: u64,
    interval_ms: Option<u64>,
    callback: Rc<dyn Fn()>,
}

#[derive(Default)]
struct ClockInner {
    now_ms: Cell<u64>,
    next_id: Cell<u64>,
    fired: Cell<u64>,
    timers: RefCell<Vec<Timer>>,
}

/// Shared simulated clock
#[derive(Clone, Default)]
pub struct VirtualClock {
    inner: Rc<ClockInner>,
}

impl fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualClock")
            .field("now_ms", &self.inner.now_ms.get())
            .field("pending", &self.pending())
            .field("fired", &self.inner.fired.get())
            .finish()
    }
}

impl VirtualClock {
    /// Create a clock at time zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock at a fixed time (milliseconds since Unix epoch)
    #[must_use]
    pub fn starting_at(time_ms: u64) -> Self {
        let clock = Self::new();
        clock.inner.now_ms.set(time_ms);
        clock
    }

    /// Current simulated time in milliseconds
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.inner.now_ms.get()
    }

    /// Current simulated time as Duration since Unix epoch
    #[must_use]
    pub fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms())
    }

    /// Number of timers still scheduled
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Total callbacks fired so far
    #[must_use]
    pub fn fired(&self) -> u64 {
        self.inner.fired.get()
    }

    /// Run `callback` once, `delay_ms` from now
    pub fn set_timeout<F>(&self, delay_ms: u64, callback: F) -> TimerId
    where
        F: Fn() + 'static,
    {
        self.schedule(delay_ms, None, Rc::new(callback))
    }

    /// Run `callback` every `period_ms` (a zero period is treated as 1ms)
    pub fn set_interval<F>(&self, period_ms: u64, callback: F) -> TimerId
    where
        F: Fn() + 'static,
    {
        let period = period_ms.max(1);
        self.schedule(period, Some(period), Rc::new(callback))
    }

    /// Cancel a timer; returns whether it was still scheduled
    pub fn clear(&self, id: TimerId) -> bool {
        let mut timers = self.inner.timers.borrow_mut();
        let before = timers.len();
        timers.retain(|t| t.id != id);
        timers.len() != before
    }

    /// Advance time, firing every timer that falls due on the way.
    ///
    /// Callbacks may schedule new timers; those fire too if they fall due
    /// before the target time. Returns the number of callbacks fired.
    pub fn advance(&self, ms: u64) -> u64 {
        let target = self.now_ms().saturating_add(ms);
        let mut fired = 0;
        while let Some(timer) = self.take_next_due(target) {
            self.inner.now_ms.set(timer.due_ms);
            // Rescheduled before the callback runs, so the callback can clear it
            if let Some(period) = timer.interval_ms {
                let next_due = timer.due_ms.saturating_add(period);
                if next_due > timer.due_ms {
                    self.inner.timers.borrow_mut().push(Timer {
                        id: timer.id,
                        due_ms: next_due,
                        interval_ms: Some(period),
                        callback: Rc::clone(&timer.callback),
                    });
                }
            }
            (timer.callback)();
            fired += 1;
        }
        self.inner.now_ms.set(target);
        self.inner.fired.set(self.inner.fired.get() + fired);
        fired
    }

    /// Advance to the last one-shot timer, firing everything on the way
    pub fn flush(&self) -> u64 {
        let last_due = self
            .inner
            .timers
            .borrow()
            .iter()
            .filter(|t| t.interval_ms.is_none())
            .map(|t| t.due_ms)
            .max();
        match last_due {
            Some(due) => self.advance(due.saturating_sub(self.now_ms())),
            None => 0,
        }
    }

    fn schedule(&self, delay_ms: u64, interval_ms: Option<u64>, callback: Rc<dyn Fn()>) -> TimerId {
        let id = TimerId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner.timers.borrow_mut().push(Timer {
            id,
            due_ms: self.now_ms().saturating_add(delay_ms),
            interval_ms,
            callback,
        });
        id
    }

    fn take_next_due(&self, target: u64) -> Option<Timer> {
        let mut timers = self.inner.timers.borrow_mut();
        let index = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_ms <= target)
            .min_by_key(|(_, t)| (t.due_ms, t.id))
            .map(|(i, _)| i)?;
        Some(timers.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn Fn()>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let make = move |name: &'static str| {
            let sink = sink.clone();
            Box::new(move || sink.borrow_mut().push(name)) as Box<dyn Fn()>
        };
        (log, make)
    }

    #[test]
    fn test_starts_at_given_time() {
        let clock = VirtualClock::starting_at(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        assert_eq!(clock.now(), Duration::from_secs(1));
    }

    #[test]
    fn test_advance_fires_in_due_order() {
        let clock = VirtualClock::new();
        let (log, make) = recorder();
        let late = make("late");
        let early = make("early");
        let _ = clock.set_timeout(200, move || late());
        let _ = clock.set_timeout(100, move || early());

        assert_eq!(clock.advance(150), 1);
        assert_eq!(*log.borrow(), vec!["early"]);
        assert_eq!(clock.now_ms(), 150);

        assert_eq!(clock.advance(50), 1);
        assert_eq!(*log.borrow(), vec!["early", "late"]);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn test_same_due_time_keeps_schedule_order() {
        let clock = VirtualClock::new();
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        let _ = clock.set_timeout(10, move || a());
        let _ = clock.set_timeout(10, move || b());
        let _ = clock.advance(10);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_clear_cancels() {
        let clock = VirtualClock::new();
        let (log, make) = recorder();
        let a = make("a");
        let id = clock.set_timeout(10, move || a());
        assert!(clock.clear(id));
        assert!(!clock.clear(id));
        let _ = clock.advance(100);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_interval_repeats() {
        let clock = VirtualClock::new();
        let (log, make) = recorder();
        let tick = make("tick");
        let id = clock.set_interval(30, move || tick());
        assert_eq!(clock.advance(100), 3);
        assert_eq!(log.borrow().len(), 3);
        assert!(clock.clear(id));
    }

    #[test]
    fn test_interval_cleared_from_its_own_callback() {
        let clock = VirtualClock::new();
        let own_id = Rc::new(Cell::new(None));
        let ticks = Rc::new(Cell::new(0));
        let (handle, slot, count) = (clock.clone(), own_id.clone(), ticks.clone());
        let id = clock.set_interval(10, move || {
            count.set(count.get() + 1);
            if let Some(id) = slot.get() {
                let _ = handle.clear(id);
            }
        });
        own_id.set(Some(id));

        assert_eq!(clock.advance(100), 1);
        assert_eq!(ticks.get(), 1);
        assert_eq!(clock.pending(), 0);
        assert!(!clock.clear(id));
    }

    #[test]
    fn test_interval_near_end_of_time() {
        let clock = VirtualClock::starting_at(u64::MAX - 15);
        let (log, make) = recorder();
        let tick = make("tick");
        let _ = clock.set_interval(10, move || tick());
        // Fires at MAX - 5, then once more at the saturated MAX
        assert_eq!(clock.advance(u64::MAX), 2);
        assert_eq!(clock.now_ms(), u64::MAX);
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn test_callbacks_can_schedule_more_timers() {
        let clock = VirtualClock::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let nested_clock = clock.clone();
        let sink = log.clone();
        let _ = clock.set_timeout(10, move || {
            sink.borrow_mut().push(nested_clock.now_ms());
            let sink = sink.clone();
            let inner_clock = nested_clock.clone();
            let _ = nested_clock.set_timeout(5, move || sink.borrow_mut().push(inner_clock.now_ms()));
        });
        assert_eq!(clock.advance(20), 2);
        assert_eq!(*log.borrow(), vec![10, 15]);
    }

    #[test]
    fn test_flush_runs_one_shots() {
        let clock = VirtualClock::new();
        let (log, make) = recorder();
        let a = make("a");
        let _ = clock.set_timeout(500, move || a());
        assert_eq!(clock.flush(), 1);
        assert_eq!(clock.now_ms(), 500);
        assert_eq!(*log.borrow(), vec!["a"]);
        assert_eq!(clock.flush(), 0);
    }
}
