//! Resolved run configuration and the counters a traversal reports.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::catalog::{FileFilter, SortOrder};
use crate::error::CatfindError;
use crate::utils::config::{Limits, RetryDefaults};

/// Retry policy from `--retry n,w,m`: `n` re-attempts, `w` seconds between attempts,
/// at most `m` retried failures over the whole run. Empty fields keep their defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetrySettings {
    pub retries: u32,
    pub delay: Duration,
    pub max_failures: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            retries: RetryDefaults::RETRIES,
            delay: RetryDefaults::delay(),
            max_failures: RetryDefaults::MAX_FAILURES,
        }
    }
}

impl FromStr for RetrySettings {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut settings = RetrySettings::default();
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        if fields.len() > 3 {
            return Err(format!("expected at most 3 fields (n,w,m), got '{s}'"));
        }
        let field = |i: usize| fields.get(i).copied().filter(|f| !f.is_empty());
        if let Some(n) = field(0) {
            settings.retries = n
                .parse()
                .map_err(|_| format!("bad retry count '{n}'"))?;
        }
        if let Some(w) = field(1) {
            settings.delay = Duration::from_secs(
                w.parse()
                    .map_err(|_| format!("bad retry delay '{w}'"))?,
            );
        }
        if let Some(m) = field(2) {
            settings.max_failures = m
                .parse()
                .map_err(|_| format!("bad maximum failures '{m}'"))?;
        }
        Ok(settings)
    }
}

/// Fully resolved options (config file merged with the command line).
#[derive(Clone, Debug)]
pub struct Opts {
    /// Catalog directory to start from: absolute, no trailing slash.
    pub root: String,
    /// Catalog database file.
    pub catalog: PathBuf,
    /// Visit directories only; the directory path is the leaf.
    pub dirs_only: bool,
    /// Only replicas on this resource.
    pub resource: Option<String>,
    /// Only this replica number.
    pub replica: Option<u32>,
    /// Print `id path` for every visited leaf.
    pub print_ids: bool,
    /// Follow-up statement with one or more `%s` for the leaf id.
    pub statement: Option<String>,
    pub retry: Option<RetrySettings>,
    pub summary: bool,
    /// Only leaves matching this pattern are printed and dispatched.
    pub regex: Option<String>,
    /// Replacement for the first regex match in printed paths.
    pub substitute: Option<String>,
    /// Rows per cursor fetch.
    pub page_size: usize,
    /// Command template with zero to four `%s`.
    pub command: Option<String>,
    /// Debug level (`-d` count).
    pub debug: u8,
    /// Tolerate nonzero command exits.
    pub force: bool,
    /// Print only paths longer than this.
    pub check_length: Option<usize>,
    /// Parallel tasks per batch; 0 runs commands serially.
    pub tasks: usize,
    /// Commands per task.
    pub task_capacity: usize,
    /// Advance the progress counter every N fetches.
    pub progress: Option<u64>,
    pub quiet: bool,
    pub sort: SortOrder,
    /// Print commands and statements instead of running them.
    pub dry_run: bool,
    /// Report names that are not valid UTF-8.
    pub check_encoding: bool,
    pub verbose: bool,
    pub max_path_length: usize,
    pub max_command_length: usize,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            root: String::new(),
            catalog: PathBuf::new(),
            dirs_only: false,
            resource: None,
            replica: None,
            print_ids: false,
            statement: None,
            retry: None,
            summary: false,
            regex: None,
            substitute: None,
            page_size: Limits::DEFAULT_PAGE_SIZE,
            command: None,
            debug: 0,
            force: false,
            check_length: None,
            tasks: 0,
            task_capacity: Limits::DEFAULT_TASK_CAPACITY,
            progress: None,
            quiet: false,
            sort: SortOrder::None,
            dry_run: false,
            check_encoding: false,
            verbose: false,
            max_path_length: Limits::PATHNAME_LENGTH,
            max_command_length: Limits::COMMAND_LENGTH,
        }
    }
}

fn config_error(msg: impl Into<String>) -> CatfindError {
    CatfindError::Config(msg.into())
}

impl Opts {
    /// Restrictions for the file query.
    pub fn file_filter(&self) -> FileFilter {
        FileFilter {
            resource: self.resource.clone(),
            replica: self.replica,
        }
    }

    /// True when commands go through the task queue.
    pub fn is_parallel(&self) -> bool {
        self.tasks > 0
    }

    /// Check combinations the traversal cannot honour.
    pub fn validate(&self) -> Result<(), CatfindError> {
        if !self.root.starts_with('/') {
            return Err(config_error(format!(
                "Path '{}' must be absolute",
                self.root
            )));
        }
        if self.root.len() > 1 && self.root.ends_with('/') {
            return Err(config_error(format!(
                "Path '{}' must not end with a slash",
                self.root
            )));
        }
        if self.force && self.retry.is_some() {
            return Err(config_error("Options force and retry are mutually exclusive"));
        }
        if self.regex.is_some() && self.check_length.is_some() {
            return Err(config_error(
                "Options regex and check-length are mutually exclusive",
            ));
        }
        if self.substitute.is_some() && self.regex.is_none() {
            return Err(config_error("Option substitute requires regex"));
        }
        if self.page_size == 0 {
            return Err(config_error("Batch size must be positive"));
        }
        if self.task_capacity == 0 {
            return Err(config_error("Task capacity must be positive"));
        }
        if self.tasks > Limits::MAX_TASKS {
            return Err(config_error(format!(
                "Wrong number of tasks {}, should be 0 <= n <= {}",
                self.tasks,
                Limits::MAX_TASKS
            )));
        }
        if self.max_path_length == 0 || self.max_command_length == 0 {
            return Err(config_error("Maximum path and command lengths must be positive"));
        }
        if self.check_length == Some(0) {
            return Err(config_error("Check length must be positive"));
        }
        if self.progress == Some(0) {
            return Err(config_error("Progress interval must be positive"));
        }
        if self.statement.is_some() && self.sort.is_unique() {
            return Err(config_error(
                "A statement needs data ids, which unique sort orders do not have",
            ));
        }
        if self.is_parallel() && self.command.is_none() {
            return Err(config_error("Parallel tasks need a command"));
        }
        if let Some(retry) = &self.retry
            && retry.max_failures == 0
            && retry.retries > 0
        {
            return Err(config_error("Maximum retry failures must be positive"));
        }
        Ok(())
    }
}

/// What a traversal saw and did. Printed by the summary, also on the fatal path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// Rows fetched from either cursor.
    pub rows: u64,
    pub directories: u64,
    pub files: u64,
    /// Sum of file sizes.
    pub bytes: u128,
    /// Paths that are not valid UTF-8.
    pub malformed: u64,
    /// Fetch calls on either cursor (the final empty fetches included).
    pub fetches: u64,
    /// Commands run (or printed in a dry run).
    pub commands: u64,
    /// Follow-up statements run (or printed in a dry run).
    pub statements: u64,
    /// Leaves printed to stdout.
    pub printed: u64,
}
