//! Deferred, cancellable tasks driven by the frame loop.
//!
//! The scheduler owns its own clock that only moves when `advance` is called, so scheduled tasks
//! never fire outside of a frame and a restart can drop every pending task at once.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TaskHandle(u64);

#[derive(Debug)]
struct Entry<T> {
    handle: TaskHandle,
    due: f64,
    task: T,
}

#[derive(Debug)]
pub struct Scheduler<T> {
    now: f64,
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Scheduler {
            now: 0.0,
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Scheduler<T> {
        Scheduler::default()
    }

    /// schedule registers a task that becomes due `delay` seconds after the current scheduler
    /// time. Negative delays are treated as zero.
    pub fn schedule(&mut self, delay: f64, task: T) -> TaskHandle {
        let handle = TaskHandle(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            handle,
            due: self.now + delay.max(0.0),
            task,
        });
        handle
    }

    /// cancel removes a pending task. Returns false if the task already fired or was cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let len_before = self.entries.len();
        self.entries.retain(|entry| entry.handle != handle);
        self.entries.len() < len_before
    }

    /// cancel_all drops every pending task and returns how many were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let no_cancelled = self.entries.len();
        self.entries.clear();
        no_cancelled
    }

    /// advance moves the scheduler clock forward and returns the tasks that became due, ordered
    /// by due time (ties in scheduling order).
    pub fn advance(&mut self, dt: f64) -> Vec<T> {
        self.now += dt.max(0.0);
        let now = self.now;

        let (mut due, pending): (Vec<Entry<T>>, Vec<Entry<T>>) = self
            .entries
            .drain(..)
            .partition(|entry| entry.due <= now);
        self.entries = pending;

        // handles are handed out in increasing order, i.e. they double as scheduling order
        due.sort_by(|a, b| {
            a.due
                .partial_cmp(&b.due)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.handle.0.cmp(&b.handle.0))
        });

        due.into_iter().map(|entry| entry.task).collect()
    }

    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.entries.iter().any(|entry| entry.handle == handle)
    }

    pub fn no_pending(&self) -> usize {
        self.entries.len()
    }

    pub fn now(&self) -> f64 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_fire_in_due_order() {
        let mut sched = Scheduler::new();
        sched.schedule(2.0, "b");
        sched.schedule(1.0, "a");
        sched.schedule(2.0, "c");

        assert!(sched.advance(0.5).is_empty());
        assert_eq!(sched.advance(0.5), vec!["a"]);
        assert_eq!(sched.advance(5.0), vec!["b", "c"]);
        assert_eq!(sched.no_pending(), 0);
    }

    #[test]
    fn zero_delay_fires_on_next_advance() {
        let mut sched = Scheduler::new();
        sched.schedule(0.0, 1);
        assert_eq!(sched.advance(0.0), vec![1]);
    }

    #[test]
    fn cancelled_tasks_never_fire() {
        let mut sched = Scheduler::new();
        let h1 = sched.schedule(1.0, 1);
        let h2 = sched.schedule(1.0, 2);
        assert!(sched.cancel(h1));
        assert!(!sched.cancel(h1));
        assert!(sched.is_pending(h2));
        assert_eq!(sched.advance(1.0), vec![2]);
        assert!(!sched.cancel(h2));

        sched.schedule(1.0, 3);
        sched.schedule(2.0, 4);
        assert_eq!(sched.cancel_all(), 2);
        assert!(sched.advance(10.0).is_empty());
    }
}
