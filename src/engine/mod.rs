//! Engine: templating, command running, the task queue and the CLI glue around them

pub mod arg_parser;
pub mod budget;
pub mod cancel;
pub mod cli;
pub mod progress;
pub mod queue;
pub mod runner;
pub mod template;
pub mod tools;

// Re-export commonly used items
pub use arg_parser::Cli;
pub use budget::FailureBudget;
pub use cancel::CancelToken;
pub use cli::handle_run;
pub use queue::{BatchReport, Task, TaskQueue};
pub use runner::{
    CommandExecutor, CommandStatus, ExitOutcome, RetryPolicy, RetryableRunner, ShellExecutor,
};
pub use template::{Arity, CommandTemplate, StatementTemplate};
pub use tools::{PathFilter, compose_path};
