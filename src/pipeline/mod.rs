//! Pipeline components: context, dispatch, walk loop, orchestration.

pub mod context;
pub mod dispatch;
pub mod orchestrator;
pub mod walk;

pub use context::TraversalContext;
pub use dispatch::{CommandSink, Dispatcher, Leaf};
pub use orchestrator::{TraversalOutcome, build_runner, find, run_traversal};
pub use walk::TreeWalker;
