use crate::Time;
use core::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

/// Identifies an entry of a [`TimerQueue`].
///
/// Handles are unique for the lifetime of the queue that issued them,
/// so a handle that was cancelled or already fired can never be
/// mistaken for a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    #[cfg(test)]
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Entries of a [`TimerQueue`] ordered by due time, then by insertion.
pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<OrderedByTime<T>>>,
    live: HashSet<TimerHandle>,
    next: u64,
}

struct OrderedByTime<T> {
    due: Time,
    handle: TimerHandle,
    value: T,
}

impl<T> OrderedByTime<T> {
    fn key(&self) -> (Time, TimerHandle) {
        (self.due, self.handle)
    }
}

impl<T> PartialEq for OrderedByTime<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for OrderedByTime<T> {}

impl<T> PartialOrd for OrderedByTime<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for OrderedByTime<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashSet::new(),
            next: 0,
        }
    }

    /// number of entries which are still due to fire
    #[inline]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn push(&mut self, due: Time, value: T) -> TimerHandle {
        let handle = TimerHandle(self.next);
        self.next += 1;
        self.live.insert(handle);
        self.heap.push(Reverse(OrderedByTime { due, handle, value }));
        handle
    }

    /// Cancel a pending entry. Returns `false` if the handle already
    /// fired or was already cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.live.remove(&handle)
    }

    #[inline]
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.live.contains(&handle)
    }

    /// drop the cancelled entries sitting at the top of the heap
    fn discard_cancelled(&mut self) {
        while let Some(Reverse(entry)) = self.heap.peek() {
            if self.live.contains(&entry.handle) {
                break;
            }
            self.heap.pop();
        }
    }

    /// due time of the earliest pending entry
    pub fn next_due(&mut self) -> Option<Time> {
        self.discard_cancelled();
        self.heap.peek().map(|Reverse(entry)| entry.due)
    }

    pub fn pop(&mut self) -> Option<(Time, TimerHandle, T)> {
        self.discard_cancelled();
        let Reverse(entry) = self.heap.pop()?;
        self.live.remove(&entry.handle);
        Some((entry.due, entry.handle, entry.value))
    }

    /// Pop the next entry if it is due at or before `now`.
    pub fn pop_elapsed(&mut self, now: Time) -> Option<(Time, TimerHandle, T)> {
        match self.next_due() {
            Some(due) if due <= now => self.pop(),
            _ => None,
        }
    }

    pub fn pop_all_elapsed(&mut self, now: Time) -> Vec<(TimerHandle, T)> {
        let mut elapsed = Vec::new();
        while let Some((_, handle, value)) = self.pop_elapsed(now) {
            elapsed.push((handle, value));
        }
        elapsed
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
    fn empty() {
        let mut queue = TimerQueue::<()>::new();

        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert!(queue.pop().is_none());
        assert!(queue.next_due().is_none());
    }

    #[test]
    fn entry() {
        let mut queue = TimerQueue::new();
        let due = Time::from_millis(1);

        let handle = queue.push(due, "tick");

        assert!(!queue.is_empty());
        assert!(queue.is_pending(handle));
        assert_eq!(queue.next_due(), Some(due));

        assert!(queue.pop_all_elapsed(Time::ZERO).is_empty());
        let entries = queue.pop_all_elapsed(Time::from_millis(2));
        assert_eq!(entries, vec![(handle, "tick")]);

        assert!(queue.is_empty());
        assert!(!queue.is_pending(handle));
    }

    #[test]
    fn ordered_by_due_time_then_insertion() {
        let mut queue = TimerQueue::new();
        queue.push(Time::from_micros(30), 3);
        queue.push(Time::from_micros(10), 1);
        queue.push(Time::from_micros(20), 2);
        queue.push(Time::from_micros(10), 11);

        let values: Vec<_> = queue
            .pop_all_elapsed(Time::from_micros(100))
            .into_iter()
            .map(|(_, value)| value)
            .collect();
        assert_eq!(values, vec![1, 11, 2, 3]);
    }

    #[test]
    fn cancel() {
        let mut queue = TimerQueue::new();
        let first = queue.push(Time::from_micros(10), 1);
        let second = queue.push(Time::from_micros(20), 2);

        assert!(queue.cancel(first));
        assert!(!queue.cancel(first));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_due(), Some(Time::from_micros(20)));

        let entries = queue.pop_all_elapsed(Time::from_micros(100));
        assert_eq!(entries, vec![(second, 2)]);
        assert!(!queue.cancel(second));
    }

    #[test]
    fn handles_are_never_reused() {
        let mut queue = TimerQueue::new();
        let first = queue.push(Time::ZERO, ());
        queue.pop();
        let second = queue.push(Time::ZERO, ());
        assert_ne!(first, second);
        assert_eq!(first, TimerHandle::new(0));
    }
}
