use log::debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::catalog::CatalogSession;
use crate::engine::budget::FailureBudget;
use crate::engine::cancel::CancelToken;
use crate::engine::progress::FetchProgress;
use crate::engine::runner::{CommandExecutor, RetryPolicy, RetryableRunner};
use crate::error::CatfindError;
use crate::pipeline::context::TraversalContext;
use crate::pipeline::dispatch::Dispatcher;
use crate::pipeline::walk::TreeWalker;
use crate::types::{Counters, Opts};

/// How a traversal ended. Counters are valid on both paths so the summary can be
/// printed once by the caller.
#[derive(Debug)]
pub struct TraversalOutcome {
    pub counters: Counters,
    pub elapsed: Duration,
    pub last_path: String,
    pub last_command: Option<String>,
    pub result: Result<(), CatfindError>,
}

impl TraversalOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Build the runner for `opts`: retry policy and one failure budget for the whole run.
pub fn build_runner(
    opts: &Opts,
    executor: Arc<dyn CommandExecutor>,
    cancel: CancelToken,
) -> Arc<RetryableRunner> {
    let retry = opts.retry.map(|r| RetryPolicy {
        retries: r.retries,
        delay: r.delay,
    });
    let max_failures = opts.retry.map_or(0, |r| r.max_failures);
    Arc::new(RetryableRunner::new(
        executor,
        retry,
        opts.force,
        Arc::new(FailureBudget::new(max_failures)),
        cancel,
    ))
}

fn begin_walk_end<S: CatalogSession + ?Sized>(
    session: &mut S,
    walker: &TreeWalker,
    dispatcher: &mut Dispatcher,
    ctx: &mut TraversalContext,
) -> Result<(), CatfindError> {
    session.begin()?;
    walker.walk(session, ctx, dispatcher)?;
    dispatcher.finish()?;
    ctx.check_cancelled()?;
    session.end()?;
    Ok(())
}

/// One traversal inside one catalog transaction. On any fatal error the transaction
/// is rolled back; queued commands that never ran are dropped.
pub fn run_traversal<S: CatalogSession + ?Sized>(
    session: &mut S,
    walker: &TreeWalker,
    dispatcher: &mut Dispatcher,
    mut ctx: TraversalContext,
) -> TraversalOutcome {
    let start = Instant::now();
    let result = begin_walk_end(session, walker, dispatcher, &mut ctx);
    if result.is_err() {
        session.rollback();
    }
    ctx.progress.finish();
    let elapsed = start.elapsed();
    debug!(
        "Traversal took {:?}: {} rows in {} fetches",
        elapsed, ctx.counters.rows, ctx.counters.fetches
    );
    TraversalOutcome {
        counters: ctx.counters,
        elapsed,
        last_path: ctx.last_path,
        last_command: ctx.last_command,
        result,
    }
}

/// Validate `opts`, build walker and dispatcher, and run one traversal over `session`.
/// Setup errors (bad options or templates) are returned before the catalog is touched.
pub fn find<S: CatalogSession + ?Sized>(
    session: &mut S,
    opts: &Opts,
    executor: Arc<dyn CommandExecutor>,
    cancel: CancelToken,
) -> Result<TraversalOutcome, CatfindError> {
    opts.validate()?;
    let runner = build_runner(opts, executor, cancel.clone());
    let mut dispatcher = Dispatcher::from_opts(opts, runner)?;
    let walker = TreeWalker::from_opts(opts);
    let ctx = TraversalContext::new(cancel, FetchProgress::new(opts.progress));
    Ok(run_traversal(session, &walker, &mut dispatcher, ctx))
}
