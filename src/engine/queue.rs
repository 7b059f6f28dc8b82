//! Parallel dispatch queue: N tasks of M command slots, run as one batch of N worker
//! threads with a join barrier before filling resumes.

use crossbeam_channel::unbounded;
use log::debug;
use std::ffi::OsString;
use std::sync::Arc;
use std::thread;

use crate::engine::runner::{ExitOutcome, RetryableRunner};
use crate::error::{CommandError, QueueError};
use crate::utils::config::Limits;

/// One worker slot: up to `capacity` rendered commands, run in order by one thread.
#[derive(Debug)]
pub struct Task {
    no: usize,
    capacity: usize,
    commands: Vec<OsString>,
}

impl Task {
    fn new(no: usize, capacity: usize) -> Self {
        Self {
            no,
            capacity,
            commands: Vec::with_capacity(capacity),
        }
    }

    pub fn no(&self) -> usize {
        self.no
    }

    /// Filled slots (the next free slot index).
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.commands.len() >= self.capacity
    }

    pub fn commands(&self) -> &[OsString] {
        &self.commands
    }

    fn take(&mut self) -> Vec<OsString> {
        std::mem::replace(&mut self.commands, Vec::with_capacity(self.capacity))
    }
}

/// What one executed batch did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchReport {
    /// 1-based batch number for this queue.
    pub batch: u64,
    /// Commands run across all workers.
    pub executed: usize,
    /// Workers launched (always the task count).
    pub workers: usize,
}

/// What a worker sends back over the channel when its task is done.
struct WorkerReport {
    executed: usize,
    last: Option<ExitOutcome>,
}

/// Run every command of one task in enqueue order. Stops at the first fatal failure.
fn run_task(
    runner: &RetryableRunner,
    task: usize,
    commands: &[OsString],
) -> Result<WorkerReport, CommandError> {
    if commands.is_empty() {
        debug!("Running the queue as task {}, no cmds", task);
    } else {
        debug!("Running the queue as task {}, {} cmds", task, commands.len());
    }
    let mut last = None;
    for command in commands {
        last = Some(runner.run_checked(command)?);
    }
    Ok(WorkerReport {
        executed: commands.len(),
        last,
    })
}

/// Round-robin batching queue. Filled by the coordinator only; `&mut self` plus the
/// running flag keep filling and executing apart.
pub struct TaskQueue {
    tasks: Vec<Task>,
    next_task: usize,
    running: bool,
    runner: Arc<RetryableRunner>,
    batches: u64,
    executed: u64,
}

impl TaskQueue {
    /// `ntasks` workers per batch (1..=64), `capacity` commands per task.
    pub fn new(
        ntasks: usize,
        capacity: usize,
        runner: Arc<RetryableRunner>,
    ) -> Result<Self, QueueError> {
        if ntasks == 0 || ntasks > Limits::MAX_TASKS || capacity == 0 {
            return Err(QueueError::Size {
                tasks: ntasks,
                capacity,
                max: Limits::MAX_TASKS,
            });
        }
        Ok(Self {
            tasks: (0..ntasks).map(|no| Task::new(no, capacity)).collect(),
            next_task: 0,
            running: false,
            runner,
            batches: 0,
            executed: 0,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// True when no command is waiting (Task[0] fills first, so it decides).
    pub fn is_empty(&self) -> bool {
        self.tasks[0].is_empty()
    }

    /// Commands waiting for the next batch.
    pub fn queued(&self) -> usize {
        self.tasks.iter().map(Task::len).sum()
    }

    /// Batches executed so far.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Commands executed so far, over all batches.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Queue `command`. Filling the last slot of the last task runs the batch before
    /// returning; its report is returned in that case.
    pub fn enqueue(
        &mut self,
        command: impl Into<OsString>,
    ) -> Result<Option<BatchReport>, QueueError> {
        if self.running {
            return Err(QueueError::Busy);
        }
        if self.tasks[self.next_task].is_full() {
            self.next_task += 1;
            let task = &self.tasks[self.next_task];
            if !task.is_empty() {
                return Err(QueueError::NonEmptyTask {
                    task: self.next_task,
                    filled: task.len(),
                });
            }
        }
        let task = &mut self.tasks[self.next_task];
        debug!("Filling task {} slot {}", task.no(), task.len());
        task.commands.push(command.into());

        if self.next_task + 1 == self.tasks.len() && self.tasks[self.next_task].is_full() {
            debug!("Start running the queue with {} tasks", self.tasks.len());
            return self.execute_batch().map(Some);
        }
        Ok(None)
    }

    /// Run a partial batch now. No-op when empty or already running.
    pub fn flush(&mut self) -> Result<Option<BatchReport>, QueueError> {
        if self.running || self.is_empty() {
            return Ok(None);
        }
        debug!("Flushing the queue");
        self.execute_batch().map(Some)
    }

    fn execute_batch(&mut self) -> Result<BatchReport, QueueError> {
        self.running = true;
        let result = self.run_workers();
        debug!("Clean up queue");
        self.running = false;
        self.next_task = 0;
        for task in &mut self.tasks {
            task.commands.clear();
        }
        self.batches += 1;
        let report = result?;
        self.executed += report.executed as u64;
        Ok(report)
    }

    /// Launch one thread per task, join them all, then look at what they reported.
    /// The first failing task (by task number) decides the error.
    fn run_workers(&mut self) -> Result<BatchReport, QueueError> {
        let workers = self.tasks.len();
        let batches: Vec<Vec<OsString>> = self.tasks.iter_mut().map(Task::take).collect();
        let shared = Arc::clone(&self.runner);
        let runner: &RetryableRunner = &shared;
        let (report_tx, report_rx) = unbounded::<(usize, Result<WorkerReport, CommandError>)>();

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            let mut launch_error = None;
            for (task, commands) in batches.into_iter().enumerate() {
                let report_tx = report_tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("catfind-task-{task}"))
                    .spawn_scoped(scope, move || {
                        let _ = report_tx.send((task, run_task(runner, task, &commands)));
                    });
                match spawned {
                    Ok(handle) => handles.push((task, handle)),
                    Err(source) => {
                        launch_error = Some(QueueError::Dispatch { task, source });
                        break;
                    }
                }
            }
            let mut join_error = None;
            for (task, handle) in handles {
                if handle.join().is_err() && join_error.is_none() {
                    join_error = Some(QueueError::Join { task });
                }
            }
            match launch_error.or(join_error) {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })?;
        drop(report_tx);

        let mut reports: Vec<_> = report_rx.try_iter().collect();
        reports.sort_by_key(|(task, _)| *task);
        let mut executed = 0;
        for (task, result) in reports {
            match result {
                Ok(report) => {
                    if let Some(last) = report.last {
                        debug!(
                            "Task {} finished {} cmds, last status {}",
                            task, report.executed, last.status
                        );
                    }
                    executed += report.executed;
                }
                Err(source) => return Err(QueueError::Worker { task, source }),
            }
        }
        Ok(BatchReport {
            batch: self.batches + 1,
            executed,
            workers,
        })
    }
}
