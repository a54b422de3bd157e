/// Deferred callback queue
///
/// Callbacks added during a frame are promoted to the running queue at the end
/// of the next [`CallbackQueue::execute`], so they never run on the call that
/// follows their registration directly. Kept callbacks stay queued until
/// their handle is stopped.
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Keep flag of a queued callback
#[derive(Debug, Clone)]
pub struct CallbackHandle {
    keep: Rc<Cell<bool>>,
}

impl CallbackHandle {
    /// Drops the callback after its current or next run.
    pub fn stop(&self) {
        self.keep.set(false);
    }

    pub fn is_kept(&self) -> bool {
        self.keep.get()
    }
}

type Callback<T> = Box<dyn FnMut(&mut T, &CallbackHandle)>;

struct Entry<T> {
    handle: CallbackHandle,
    callback: Callback<T>,
}

pub struct CallbackQueue<T> {
    pending: Vec<Entry<T>>,
    queue: Vec<Entry<T>>,
}

impl<T> Default for CallbackQueue<T> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            queue: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for CallbackQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackQueue")
            .field("pending", &self.pending.len())
            .field("queue", &self.queue.len())
            .finish()
    }
}

impl<T> CallbackQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        keep: bool,
        callback: impl FnMut(&mut T, &CallbackHandle) + 'static,
    ) -> CallbackHandle {
        let handle = CallbackHandle {
            keep: Rc::new(Cell::new(keep)),
        };
        self.pending.push(Entry {
            handle: handle.clone(),
            callback: Box::new(callback),
        });
        handle
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.queue.len()
    }

    /// Runs every promoted callback, drops the ones not kept, then promotes
    /// the callbacks added since the last call.
    pub fn execute(&mut self, target: &mut T) {
        for entry in self.queue.iter_mut() {
            (entry.callback)(target, &entry.handle);
        }
        self.queue.retain(|entry| entry.handle.is_kept());
        self.tick();
    }

    /// Promotes pending callbacks without running anything.
    pub fn tick(&mut self) {
        self.queue.append(&mut self.pending);
    }

    /// Moves everything from `other` in, keeping each entry's stage.
    pub fn merge(&mut self, mut other: CallbackQueue<T>) {
        self.queue.append(&mut other.queue);
        self.pending.append(&mut other.pending);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_runs_once() {
        let mut queue = CallbackQueue::new();
        let mut count = 0;
        queue.add(false, |count: &mut i32, _| *count += 1);
        queue.execute(&mut count);
        assert_eq!(count, 0);
        queue.execute(&mut count);
        queue.execute(&mut count);
        assert_eq!(count, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_kept_callback_until_stopped() {
        let mut queue = CallbackQueue::new();
        let mut runs = Vec::new();
        let handle = queue.add(true, |runs: &mut Vec<usize>, _| {
            let next = runs.len();
            runs.push(next)
        });
        for _ in 0..3 {
            queue.execute(&mut runs);
        }
        assert_eq!(runs.len(), 2);

        handle.stop();
        queue.execute(&mut runs);
        queue.execute(&mut runs);
        assert_eq!(runs.len(), 3);
    }

    #[test]
    fn test_callback_can_stop_itself() {
        let mut queue = CallbackQueue::new();
        let mut count = 0;
        queue.add(true, |count: &mut i32, handle| {
            *count += 1;
            if *count == 2 {
                handle.stop();
            }
        });
        for _ in 0..6 {
            queue.execute(&mut count);
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_merge_keeps_stage() {
        let mut queue: CallbackQueue<i32> = CallbackQueue::new();
        let mut other = CallbackQueue::new();
        other.add(false, |count: &mut i32, _| *count += 10);
        other.tick();
        other.add(false, |count: &mut i32, _| *count += 1);
        queue.merge(other);

        let mut count = 0;
        queue.execute(&mut count);
        assert_eq!(count, 10);
        queue.execute(&mut count);
        assert_eq!(count, 11);
    }
}
