use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::types::RetrySettings;

fn parse_retry(s: &str) -> Result<RetrySettings, String> {
    s.parse()
}

/// Walk a file catalog like find(1) and run a command for every entry.
#[derive(Clone, Debug, Parser)]
#[command(name = "catfind", version)]
#[command(
    about = "Walk a file catalog like find(1); list every entry or run a command for it.",
    after_help = "Commands take up to four %s placeholders for the path (%% is a literal %).\n\
                  Without one the path is appended in single quotes."
)]
pub struct Cli {
    /// Catalog directory to start from: absolute, without a trailing slash.
    #[arg(value_name = "ROOT")]
    pub root: String,

    /// Catalog database file. Default: `catfind.db` in the current directory.
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Config file. Default: `.catfind.toml` in the current directory, if present.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Visit directories only; the directory path is the leaf.
    #[arg(long, short = 'D', num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub dirs_only: Option<bool>,

    /// Only files with a replica on this resource.
    #[arg(long, short = 'E', value_name = "RESOURCE")]
    pub resource: Option<String>,

    /// Only this replica number.
    #[arg(long, short = 'r', value_name = "N")]
    pub replica: Option<u32>,

    /// Print the catalog id in front of every listed path.
    #[arg(long, short = 'I', num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub print_ids: Option<bool>,

    /// SQL statement run for every object, with %s for its id.
    #[arg(long, short = 'Q', value_name = "SQL")]
    pub statement: Option<String>,

    /// Retry failing commands: n retries, w seconds apart, at most m failures in total.
    #[arg(long, short = 'R', value_name = "n,w,m", value_parser = parse_retry)]
    pub retry: Option<RetrySettings>,

    /// Print a summary at the end.
    #[arg(long, short = 'S', num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub summary: Option<bool>,

    /// Only list and act on paths matching this regular expression (no capture groups).
    #[arg(long, short = 'X', value_name = "REGEX")]
    pub regex: Option<String>,

    /// Replace the first regex match with this text in the listing.
    #[arg(long, short = 'Y', value_name = "TEXT")]
    pub substitute: Option<String>,

    /// Rows per catalog fetch.
    #[arg(long, short = 'b', value_name = "ROWS")]
    pub batch_size: Option<usize>,

    /// Command to run for every path (0 to 4 %s placeholders).
    #[arg(long, short = 'c', value_name = "COMMAND")]
    pub command: Option<String>,

    /// Debug output; repeat for more.
    #[arg(long, short = 'd', action = ArgAction::Count)]
    pub debug: u8,

    /// Keep going when a command fails.
    #[arg(long, short = 'f', num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub force: Option<bool>,

    /// Only list paths longer than this.
    #[arg(long, short = 'l', value_name = "LENGTH")]
    pub check_length: Option<usize>,

    /// Run commands in this many parallel tasks (0 = serial, at most 64).
    #[arg(long, short = 'n', value_name = "TASKS")]
    pub tasks: Option<usize>,

    /// Commands queued per task before a batch runs.
    #[arg(long, short = 'm', value_name = "COMMANDS")]
    pub task_capacity: Option<usize>,

    /// Show a progress counter, advanced every N fetches.
    #[arg(long, short = 'p', value_name = "N")]
    pub progress: Option<u64>,

    /// Only warnings and errors; no path listing.
    #[arg(long, short = 'q', num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub quiet: Option<bool>,

    /// Sort: 0 none, 1 ascending, 2 descending, 3 ascending unique, 4 descending unique.
    #[arg(long, short = 's', value_name = "ORDER", value_parser = clap::value_parser!(u8).range(0..=4))]
    pub sort: Option<u8>,

    /// Print commands and statements instead of running them.
    #[arg(long, short = 't')]
    pub dry_run: bool,

    /// Report paths that are not valid UTF-8; only those get the command.
    #[arg(long, short = 'u', num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub check_encoding: Option<bool>,

    /// List every visited path, also when running commands.
    #[arg(long, short = 'v', num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// Longest composed path accepted, in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_path_length: Option<usize>,

    /// Longest rendered command accepted, in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_command_length: Option<usize>,
}
