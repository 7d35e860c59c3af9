//! Cancellable deadline queue.
//!
//! Timers live in an arena of slots. A `TimerId` carries the slot's
//! generation, so an id whose timer already fired or was cancelled can never
//! touch a newer timer that reused the slot.

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    slot: usize,
    generation: u32,
}

struct Slot<T> {
    generation: u32,
    entry: Option<(f64, T)>,
}

pub struct TimerQueue<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Schedule `payload` to become due at `due_at` seconds.
    pub fn schedule(&mut self, due_at: f64, payload: T) -> TimerId {
        if let Some(slot) = self.free.pop() {
            let s = &mut self.slots[slot];
            s.entry = Some((due_at, payload));
            TimerId {
                slot,
                generation: s.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                entry: Some((due_at, payload)),
            });
            TimerId {
                slot: self.slots.len() - 1,
                generation: 0,
            }
        }
    }

    /// Cancel a pending timer, returning its payload. Stale ids return `None`.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let slot = self.slots.get_mut(id.slot)?;
        if slot.generation != id.generation {
            return None;
        }
        let (_, payload) = slot.entry.take()?;
        Self::retire(slot);
        self.free.push(id.slot);
        Some(payload)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.slots
            .get(id.slot)
            .is_some_and(|s| s.generation == id.generation && s.entry.is_some())
    }

    /// Remove and return every timer due at or before `now`, earliest first.
    pub fn drain_due(&mut self, now: f64) -> Vec<(TimerId, T)> {
        let mut due: Vec<(f64, TimerId, T)> = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let is_due = matches!(slot.entry, Some((at, _)) if at <= now);
            if !is_due {
                continue;
            }
            if let Some((at, payload)) = slot.entry.take() {
                let id = TimerId {
                    slot: index,
                    generation: slot.generation,
                };
                Self::retire(slot);
                self.free.push(index);
                due.push((at, id, payload));
            }
        }
        due.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        due.into_iter().map(|(_, id, payload)| (id, payload)).collect()
    }

    /// Earliest pending deadline.
    pub fn next_due(&self) -> Option<f64> {
        self.slots
            .iter()
            .filter_map(|s| s.entry.as_ref().map(|(at, _)| *at))
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn retire(slot: &mut Slot<T>) {
        slot.generation = slot.generation.wrapping_add(1);
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_deadline_order() {
        let mut q = TimerQueue::new();
        q.schedule(2.0, "late");
        q.schedule(1.0, "early");
        q.schedule(5.0, "future");

        let due: Vec<&str> = q.drain_due(2.0).into_iter().map(|(_, p)| p).collect();
        assert_eq!(due, vec!["early", "late"]);
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_due(), Some(5.0));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut q = TimerQueue::new();
        let id = q.schedule(1.0, 7);
        assert_eq!(q.cancel(id), Some(7));
        assert!(!q.is_pending(id));
        assert!(q.drain_due(10.0).is_empty());
    }

    #[test]
    fn stale_id_cannot_cancel_reused_slot() {
        let mut q = TimerQueue::new();
        let old = q.schedule(1.0, "first");
        q.drain_due(1.0);
        let new = q.schedule(3.0, "second");
        assert_eq!(old.slot, new.slot);

        assert_eq!(q.cancel(old), None);
        assert!(q.is_pending(new));
        assert_eq!(q.cancel(new), Some("second"));
    }

    #[test]
    fn empty_queue() {
        let mut q: TimerQueue<()> = TimerQueue::default();
        assert!(q.is_empty());
        assert_eq!(q.next_due(), None);
        assert!(q.drain_due(100.0).is_empty());
    }
}
