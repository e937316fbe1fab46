//! Emulated GPU fences.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::timeline::{ExecutionMode, Scheduler};
use crate::error::GraphicsError;

/// One-shot event fired when a fence reaches a value.
#[derive(Debug, Default)]
pub(crate) struct CompletionEvent {
    fired: Mutex<bool>,
    cond: Condvar,
}

impl CompletionEvent {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self) {
        let mut fired = self.fired.lock();
        *fired = true;
        self.cond.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn is_set(&self) -> bool {
        *self.fired.lock()
    }

    /// Block until the event fires. There is no timeout.
    pub(crate) fn wait(&self) {
        let mut fired = self.fired.lock();
        while !*fired {
            self.cond.wait(&mut fired);
        }
    }
}

#[derive(Debug, Default)]
struct FenceState {
    value: u64,
    events: Vec<(u64, Arc<CompletionEvent>)>,
}

/// Completion counter advanced by queue timelines.
#[derive(Debug)]
pub(crate) struct SoftwareFence {
    state: Mutex<FenceState>,
    scheduler: Arc<Scheduler>,
}

impl SoftwareFence {
    pub(crate) fn new(scheduler: Arc<Scheduler>) -> Self {
        Self {
            state: Mutex::new(FenceState::default()),
            scheduler,
        }
    }

    /// Highest value the GPU has completed.
    pub(crate) fn completed_value(&self) -> u64 {
        self.state.lock().value
    }

    /// Advance the counter to `value` and fire every event it satisfies.
    ///
    /// The counter never moves backwards.
    pub(crate) fn complete(&self, value: u64) {
        let mut state = self.state.lock();
        state.value = state.value.max(value);
        let reached = state.value;
        state.events.retain(|(target, event)| {
            if *target <= reached {
                event.set();
                false
            } else {
                true
            }
        });
    }

    /// Get an event that fires once the counter reaches `value`.
    pub(crate) fn set_event_on_completion(&self, value: u64) -> Arc<CompletionEvent> {
        let event = Arc::new(CompletionEvent::new());
        let mut state = self.state.lock();
        if state.value >= value {
            event.set();
        } else {
            state.events.push((value, Arc::clone(&event)));
        }
        event
    }

    /// Block the calling thread until the counter reaches `value`.
    pub(crate) fn wait_cpu(&self, value: u64) -> Result<(), GraphicsError> {
        match self.scheduler.mode() {
            ExecutionMode::Threaded => {
                self.set_event_on_completion(value).wait();
                Ok(())
            }
            ExecutionMode::Deferred => self.scheduler.drive_until(self, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fence(mode: ExecutionMode) -> SoftwareFence {
        SoftwareFence::new(Arc::new(Scheduler::new(mode)))
    }

    #[test]
    fn test_complete_is_monotonic() {
        let fence = fence(ExecutionMode::Threaded);
        fence.complete(5);
        fence.complete(3);
        assert_eq!(fence.completed_value(), 5);
    }

    #[test]
    fn test_event_fires_on_completion() {
        let fence = fence(ExecutionMode::Threaded);
        let early = fence.set_event_on_completion(0);
        assert!(early.is_set());

        let event = fence.set_event_on_completion(2);
        fence.complete(1);
        assert!(!event.is_set());
        fence.complete(2);
        assert!(event.is_set());
    }

    #[test]
    fn test_cpu_wait_across_threads() {
        let fence = Arc::new(fence(ExecutionMode::Threaded));
        let signaller = Arc::clone(&fence);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            signaller.complete(1);
        });

        fence.wait_cpu(1).unwrap();
        assert_eq!(fence.completed_value(), 1);
        handle.join().unwrap();
    }

    #[test]
    fn test_deferred_wait_without_work_stalls() {
        let fence = fence(ExecutionMode::Deferred);
        assert_eq!(fence.wait_cpu(1), Err(GraphicsError::Stalled(1)));
        assert!(fence.wait_cpu(0).is_ok());
    }
}
