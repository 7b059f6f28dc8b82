//! catfind: find(1) for a file catalog held in a database.
//!
//! Directories and the files inside them are streamed from paged catalog cursors; for
//! every visited entry a command is rendered from a template and run serially or in
//! batches of parallel tasks, under a retry policy and one failure budget for the run.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use error::{CatalogError, CatfindError, CommandError, QueueError, Result, TemplateError};
pub use pipeline::{TraversalOutcome, find};
pub use types::*;
