//! Error types for catfind.
//!
//! Everything here is fatal for the run: the top level cleans up (closes cursors,
//! rolls back the catalog transaction, prints the summary) and exits with
//! [`CatfindError::exit_code`]. Tolerated command failures (force mode, retries that
//! keep failing) are logged where they happen and never become one of these.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a catfind run.
#[derive(Error, Debug)]
pub enum CatfindError {
    /// Catalog connection, query or cursor failure
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Bad command or statement template, or a leaf the template cannot take
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Command execution failure that is not tolerated
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Task queue invariant or worker failure
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Composed `directory/file` path exceeds the configured maximum
    #[error("Pathname too long ({len} > {max}): '{path}'")]
    PathTooLong { path: String, len: usize, max: usize },

    /// Invalid resolved configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cancelled by a termination signal (Ctrl+C, SIGTERM, SIGHUP)
    #[error("Interrupted, last path was '{last_path}'")]
    Interrupted { last_path: String },

    /// Writing the listing to stdout failed (closed pipe)
    #[error("Cannot write output: {0}")]
    Output(#[from] io::Error),
}

impl CatfindError {
    /// Process exit status for this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            CatfindError::Catalog(CatalogError::Open { .. }) => 2,
            CatfindError::Catalog(_) => 1,
            CatfindError::Template(_) | CatfindError::PathTooLong { .. } => 3,
            CatfindError::Config(_) => 3,
            CatfindError::Command(CommandError::BudgetExhausted { .. }) => 5,
            CatfindError::Command(CommandError::Interrupted { .. }) => 130,
            CatfindError::Command(_) => 4,
            CatfindError::Queue(QueueError::Worker { source, .. }) => match source {
                CommandError::BudgetExhausted { .. } => 5,
                CommandError::Interrupted { .. } => 130,
                _ => 6,
            },
            CatfindError::Queue(_) => 6,
            CatfindError::Interrupted { .. } => 130,
            CatfindError::Output(_) => 1,
        }
    }

    /// True when the run ended because of a signal rather than a failure.
    pub fn is_interrupt(&self) -> bool {
        self.exit_code() == 130
    }
}

/// Catalog session and cursor errors. Always fatal, force and retry do not apply.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Failed to open the catalog database
    #[error("Cannot open catalog '{path}': {reason}")]
    Open { path: PathBuf, reason: String },

    /// A directive (declare, fetch, close, begin, end, statement) failed
    #[error("Error executing '{directive}': {source}")]
    Directive {
        directive: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Fetch or close issued on a cursor that is already closed
    #[error("Cursor '{cursor}' is closed, cannot {operation}")]
    State {
        cursor: &'static str,
        operation: &'static str,
    },

    /// A row did not have the expected shape
    #[error("Unexpected row from cursor '{cursor}': {reason}")]
    RowShape {
        cursor: &'static str,
        reason: String,
    },

    /// Unknown sort order number
    #[error("Wrong sort option {0}, expected 0..=4")]
    SortOrder(u8),
}

/// Template construction and rendering errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Template string is empty
    #[error("Empty command string")]
    Empty,

    /// `%` not followed by `s` or `%`
    #[error("Malformed placeholder at byte {position} in '{template}'")]
    Malformed { template: String, position: usize },

    /// More than four placeholders
    #[error("Too many placeholders ({count}) in '{template}', at most 4 allowed")]
    TooManyPlaceholders { template: String, count: usize },

    /// Statement template has no placeholder for the id
    #[error("Statement '{template}' does not have a %s for the id")]
    MissingPlaceholder { template: String },

    /// Leaf value contains a single quote
    #[error("Single quote detected in '{leaf}'")]
    SingleQuote { leaf: String },

    /// Rendered command would exceed the maximum command length
    #[error("Command too long ({len} > {max}) for '{leaf}'")]
    TooLong { leaf: String, len: usize, max: usize },
}

/// Command execution errors that end the run.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The shell could not be started
    #[error("There was a system error running '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Nonzero exit without force
    #[error("Command returned nonzero status {code}: '{command}'")]
    Failed { command: String, code: i32 },

    /// Killed by a signal that is not an interrupt (without force)
    #[error("Command killed by signal {signal}: '{command}'")]
    Signaled { command: String, signal: i32 },

    /// Killed by an interrupt-equivalent signal, or cancelled while waiting to retry
    #[error("Interrupted with signal {signal}: '{command}'")]
    Interrupted { command: String, signal: i32 },

    /// Retry failure budget used up
    #[error("There were more than {max} command retries - abort ('{command}')")]
    BudgetExhausted { command: String, max: u64 },
}

/// Task queue errors.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Task count outside 1..=MAX_TASKS or zero capacity
    #[error("Wrong number of tasks ({tasks}) or capacity ({capacity}), should be 0 < n <= {max}")]
    Size {
        tasks: usize,
        capacity: usize,
        max: usize,
    },

    /// Moving on to the next task found it already holding commands
    #[error("Moving on to task {task} but it has {filled} filled slots")]
    NonEmptyTask { task: usize, filled: usize },

    /// enqueue or flush while a batch is executing
    #[error("Queue is running a batch")]
    Busy,

    /// A worker thread could not be started
    #[error("Cannot start worker for task {task}: {source}")]
    Dispatch {
        task: usize,
        #[source]
        source: io::Error,
    },

    /// A worker thread could not be joined (panicked)
    #[error("Error waiting for worker of task {task}")]
    Join { task: usize },

    /// A worker hit a fatal command failure
    #[error("Task {task} failed: {source}")]
    Worker {
        task: usize,
        #[source]
        source: CommandError,
    },
}

pub type Result<T, E = CatfindError> = std::result::Result<T, E>;
