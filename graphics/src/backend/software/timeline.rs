//! Queue timelines and the scheduler that drives them.
//!
//! Each software queue owns a [`Timeline`]: an ordered list of jobs that
//! stand in for the work a hardware queue would consume. In
//! [`ExecutionMode::Threaded`] a worker thread per timeline runs jobs as they
//! arrive. In [`ExecutionMode::Deferred`] nothing runs until the scheduler is
//! polled or a CPU wait needs progress, which makes fence landing fully
//! controllable from tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use super::command::Command;
use super::fence::SoftwareFence;
use super::surface::SoftwareSurface;
use crate::error::GraphicsError;

/// How emulated GPU work is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionMode {
    /// A worker thread per queue executes work as soon as it is submitted.
    #[default]
    Threaded,
    /// Work executes only when the instance is polled or a CPU wait needs it.
    Deferred,
}

/// A unit of queue work.
#[derive(Debug)]
pub(crate) enum Job {
    Execute(Vec<Command>),
    Signal {
        fence: Arc<SoftwareFence>,
        value: u64,
    },
    Wait {
        fence: Arc<SoftwareFence>,
        value: u64,
    },
    Present {
        surface: Arc<SoftwareSurface>,
        image: u32,
    },
}

impl Job {
    fn run(self) {
        match self {
            Job::Execute(commands) => {
                for command in &commands {
                    command.execute();
                }
            }
            Job::Signal { fence, value } => fence.complete(value),
            Job::Wait { fence, value } => fence.set_event_on_completion(value).wait(),
            Job::Present { surface, image } => surface.present(image),
        }
    }

    fn is_blocked(&self) -> bool {
        match self {
            Job::Wait { fence, value } => fence.completed_value() < *value,
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
struct Jobs {
    queue: VecDeque<Job>,
    shutdown: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Idle,
    Progress,
    Blocked,
}

#[derive(Debug)]
pub(crate) struct TimelineShared {
    label: String,
    jobs: Mutex<Jobs>,
    cond: Condvar,
    executed: AtomicU64,
}

impl TimelineShared {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            jobs: Mutex::new(Jobs::default()),
            cond: Condvar::new(),
            executed: AtomicU64::new(0),
        }
    }

    fn push(&self, job: Job) {
        let mut jobs = self.jobs.lock();
        jobs.queue.push_back(job);
        self.cond.notify_one();
    }

    /// Run the front job unless it waits on a fence that has not landed yet.
    fn step(&self) -> Step {
        let job = {
            let mut jobs = self.jobs.lock();
            match jobs.queue.front() {
                None => return Step::Idle,
                Some(job) if job.is_blocked() => return Step::Blocked,
                Some(_) => jobs.queue.pop_front(),
            }
        };
        match job {
            Some(job) => {
                job.run();
                self.executed.fetch_add(1, Ordering::Relaxed);
                Step::Progress
            }
            None => Step::Idle,
        }
    }

    fn run_worker(&self) {
        loop {
            let job = {
                let mut jobs = self.jobs.lock();
                while jobs.queue.is_empty() && !jobs.shutdown {
                    self.cond.wait(&mut jobs);
                }
                match jobs.queue.pop_front() {
                    Some(job) => job,
                    None => return,
                }
            };
            job.run();
            self.executed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn pending(&self) -> usize {
        self.jobs.lock().queue.len()
    }
}

/// Ordered job list of one queue.
#[derive(Debug)]
pub(crate) struct Timeline {
    shared: Arc<TimelineShared>,
    worker: Option<JoinHandle<()>>,
}

impl Timeline {
    pub(crate) fn new(label: &str, scheduler: &Scheduler) -> Result<Self, GraphicsError> {
        let shared = Arc::new(TimelineShared::new(label));
        let worker = match scheduler.mode() {
            ExecutionMode::Threaded => {
                let worker_shared = Arc::clone(&shared);
                let handle = std::thread::Builder::new()
                    .name(format!("timeline:{label}"))
                    .spawn(move || worker_shared.run_worker())
                    .map_err(|e| {
                        GraphicsError::ResourceCreationFailed(format!(
                            "failed to spawn timeline worker for {label}: {e}"
                        ))
                    })?;
                Some(handle)
            }
            ExecutionMode::Deferred => {
                scheduler.register(&shared);
                None
            }
        };
        Ok(Self { shared, worker })
    }

    pub(crate) fn submit(&self, job: Job) {
        self.shared.push(job);
    }

    /// Jobs submitted but not yet executed.
    pub(crate) fn pending(&self) -> usize {
        self.shared.pending()
    }

    /// Jobs executed so far.
    #[cfg(test)]
    pub(crate) fn executed(&self) -> u64 {
        self.shared.executed.load(Ordering::Relaxed)
    }
}

impl Drop for Timeline {
    fn drop(&mut self) {
        match self.worker.take() {
            Some(handle) => {
                {
                    let mut jobs = self.shared.jobs.lock();
                    jobs.shutdown = true;
                    self.shared.cond.notify_all();
                }
                if handle.join().is_err() {
                    log::error!("Timeline {}: worker panicked", self.shared.label);
                }
            }
            None => {
                while self.shared.step() == Step::Progress {}
                let pending = self.shared.pending();
                if pending > 0 {
                    log::warn!(
                        "Timeline {}: dropped with {pending} blocked jobs",
                        self.shared.label
                    );
                }
            }
        }
    }
}

/// Instance-wide driver of deferred timelines.
#[derive(Debug)]
pub(crate) struct Scheduler {
    mode: ExecutionMode,
    timelines: Mutex<Vec<Weak<TimelineShared>>>,
}

impl Scheduler {
    pub(crate) fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            timelines: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn mode(&self) -> ExecutionMode {
        self.mode
    }

    fn register(&self, shared: &Arc<TimelineShared>) {
        let mut timelines = self.timelines.lock();
        timelines.retain(|t| t.strong_count() > 0);
        timelines.push(Arc::downgrade(shared));
    }

    /// One pass over every live timeline. Returns the number of jobs run.
    fn poll_once(&self) -> usize {
        let timelines: Vec<Arc<TimelineShared>> = self
            .timelines
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();

        let mut executed = 0;
        for timeline in &timelines {
            while timeline.step() == Step::Progress {
                executed += 1;
            }
        }
        executed
    }

    /// Run deferred work until no timeline can make progress.
    ///
    /// Returns the number of jobs executed. Threaded timelines run on their
    /// own, so this is a no-op for them.
    pub(crate) fn poll(&self) -> usize {
        if self.mode == ExecutionMode::Threaded {
            return 0;
        }
        let mut total = 0;
        loop {
            let executed = self.poll_once();
            if executed == 0 {
                return total;
            }
            total += executed;
        }
    }

    /// Run deferred work until `fence` reaches `value`.
    pub(crate) fn drive_until(&self, fence: &SoftwareFence, value: u64) -> Result<(), GraphicsError> {
        loop {
            if fence.completed_value() >= value {
                return Ok(());
            }
            if self.poll_once() == 0 {
                return Err(GraphicsError::Stalled(value));
            }
        }
    }
}
