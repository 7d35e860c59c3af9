//! Transport clock seam.
//!
//! The host's audio clock owns repeating callbacks. Instead of handing it a
//! closure over engine state, the engine registers an interval and gets a
//! `TickHandle` back; the host then reports each firing as
//! `(handle, time)`. Firings for a cancelled handle are ignored by the
//! receiver.

use std::collections::BTreeMap;

/// Identifies one repeating registration on the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TickHandle(pub u64);

/// One firing of a repeating registration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockFiring {
    pub handle: TickHandle,
    pub time: f64,
}

pub trait TransportClock {
    /// Register a callback that fires at `start_at` and then every
    /// `interval_secs` of audio-clock time.
    fn schedule_repeating(&mut self, interval_secs: f64, start_at: f64) -> TickHandle;

    /// Stop a registration. Unknown handles are ignored.
    fn cancel_repeating(&mut self, handle: TickHandle);

    /// Monotonic audio-clock time in seconds.
    fn now(&self) -> f64;
}

/// Floating-point slack when comparing accumulated fire times.
const FIRE_EPSILON: f64 = 1e-9;

struct Repeating {
    interval: f64,
    next_fire: f64,
}

/// Deterministic clock advanced explicitly by the caller.
///
/// Used by tests and by the headless driver.
pub struct ManualClock {
    now: f64,
    next_handle: u64,
    active: BTreeMap<TickHandle, Repeating>,
    cancelled: Vec<TickHandle>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            next_handle: 1,
            active: BTreeMap::new(),
            cancelled: Vec::new(),
        }
    }

    /// Move time forward to `time`, returning every firing due on the way,
    /// in time order.
    pub fn advance_to(&mut self, time: f64) -> Vec<ClockFiring> {
        let mut firings = Vec::new();
        for (handle, rep) in self.active.iter_mut() {
            if rep.interval <= 0.0 {
                continue;
            }
            while rep.next_fire <= time + FIRE_EPSILON {
                firings.push(ClockFiring {
                    handle: *handle,
                    time: rep.next_fire,
                });
                rep.next_fire += rep.interval;
            }
        }
        firings.sort_by(|a, b| {
            a.time
                .partial_cmp(&b.time)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.handle.cmp(&b.handle))
        });
        if time > self.now {
            self.now = time;
        }
        firings
    }

    /// Advance by `secs` relative to the current time.
    pub fn advance_by(&mut self, secs: f64) -> Vec<ClockFiring> {
        let target = self.now + secs;
        self.advance_to(target)
    }

    /// Every handle passed to `cancel_repeating`, in call order.
    pub fn cancelled(&self) -> &[TickHandle] {
        &self.cancelled
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, handle: TickHandle) -> bool {
        self.active.contains_key(&handle)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportClock for ManualClock {
    fn schedule_repeating(&mut self, interval_secs: f64, start_at: f64) -> TickHandle {
        let handle = TickHandle(self.next_handle);
        self.next_handle += 1;
        self.active.insert(
            handle,
            Repeating {
                interval: interval_secs,
                next_fire: start_at,
            },
        );
        handle
    }

    fn cancel_repeating(&mut self, handle: TickHandle) {
        self.cancelled.push(handle);
        self.active.remove(&handle);
    }

    fn now(&self) -> f64 {
        self.now
    }
}
