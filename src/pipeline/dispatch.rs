//! Leaf dispatch: list the leaf, run (or queue) its command, run its id statement.

use log::{debug, trace};
use std::ffi::OsString;
use std::io::{self, Write};
use std::sync::Arc;

use crate::catalog::CatalogSession;
use crate::engine::queue::TaskQueue;
use crate::engine::runner::RetryableRunner;
use crate::engine::template::{CommandTemplate, StatementTemplate};
use crate::engine::tools::{PathFilter, decode_name};
use crate::error::CatfindError;
use crate::pipeline::context::TraversalContext;
use crate::types::Opts;
use crate::utils::config::COLUMN_WIDTH;

/// One visited leaf: a file path (or a directory path in directories-only mode) and
/// its catalog id, when the query has one.
#[derive(Clone, Copy, Debug)]
pub struct Leaf<'a> {
    pub path: &'a [u8],
    pub id: Option<i64>,
}

/// Where rendered commands go.
pub enum CommandSink {
    /// Run on the coordinating thread, one at a time.
    Serial(Arc<RetryableRunner>),
    /// Batched through the task queue.
    Parallel(TaskQueue),
    /// Printed instead of run.
    DryRun,
}

impl CommandSink {
    /// Serial runner, or a queue of `tasks` x `capacity` when `tasks > 0`.
    pub fn new(
        runner: Arc<RetryableRunner>,
        tasks: usize,
        capacity: usize,
        dry_run: bool,
    ) -> Result<Self, CatfindError> {
        if dry_run {
            return Ok(CommandSink::DryRun);
        }
        if tasks == 0 {
            return Ok(CommandSink::Serial(runner));
        }
        Ok(CommandSink::Parallel(TaskQueue::new(tasks, capacity, runner)?))
    }
}

/// Per-leaf actions of a traversal.
pub struct Dispatcher {
    command: Option<CommandTemplate>,
    statement: Option<StatementTemplate>,
    sink: CommandSink,
    filter: PathFilter,
    list_paths: bool,
    print_ids: bool,
    check_encoding: bool,
    dry_run: bool,
    out: Box<dyn Write>,
}

impl Dispatcher {
    pub fn new(
        command: Option<CommandTemplate>,
        statement: Option<StatementTemplate>,
        sink: CommandSink,
    ) -> Self {
        let dry_run = matches!(sink, CommandSink::DryRun);
        Self {
            command,
            statement,
            sink,
            filter: PathFilter::default(),
            list_paths: false,
            print_ids: false,
            check_encoding: false,
            dry_run,
            out: Box::new(io::stdout()),
        }
    }

    /// Templates, listing and filters as configured in `opts`.
    pub fn from_opts(opts: &Opts, runner: Arc<RetryableRunner>) -> Result<Self, CatfindError> {
        let command = opts
            .command
            .as_deref()
            .map(|t| CommandTemplate::new(t, opts.max_command_length))
            .transpose()?;
        let statement = opts
            .statement
            .as_deref()
            .map(|t| StatementTemplate::new(t, opts.max_command_length))
            .transpose()?;
        let sink = CommandSink::new(runner, opts.tasks, opts.task_capacity, opts.dry_run)?;
        let filter = PathFilter::new(
            opts.regex.as_deref(),
            opts.substitute.as_deref(),
            opts.check_length,
        )?;
        let listing_by_default = command.is_none() && statement.is_none();
        let list_paths = !opts.quiet
            && (opts.verbose
                || opts.print_ids
                || opts.check_encoding
                || listing_by_default
                || filter.has_check_length());
        Ok(Self::new(command, statement, sink)
            .with_filter(filter)
            .with_listing(list_paths, opts.print_ids)
            .with_check_encoding(opts.check_encoding))
    }

    pub fn with_filter(mut self, filter: PathFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Print visited paths (as `id path` when `print_ids`).
    pub fn with_listing(mut self, list_paths: bool, print_ids: bool) -> Self {
        self.list_paths = list_paths;
        self.print_ids = print_ids;
        self
    }

    /// Only act on paths that are not valid UTF-8; statements are skipped.
    pub fn with_check_encoding(mut self, check_encoding: bool) -> Self {
        self.check_encoding = check_encoding;
        self
    }

    /// Send the listing (and dry-run output) somewhere other than stdout.
    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    pub fn sink(&self) -> &CommandSink {
        &self.sink
    }

    /// All actions for one leaf.
    pub fn dispatch<S: CatalogSession + ?Sized>(
        &mut self,
        session: &mut S,
        ctx: &mut TraversalContext,
        leaf: Leaf<'_>,
    ) -> Result<(), CatfindError> {
        ctx.check_cancelled()?;
        let path = decode_name(leaf.path);
        ctx.last_path.clear();
        ctx.last_path.push_str(&path);

        let malformed = self.check_encoding && std::str::from_utf8(leaf.path).is_err();
        if malformed {
            ctx.counters.malformed += 1;
        }
        if self.check_encoding && !malformed {
            return Ok(());
        }

        if self.list_paths
            && let Some(shown) = self.filter.listing(&path)
        {
            match (self.print_ids, leaf.id) {
                (true, Some(id)) => writeln!(self.out, "{:>w$} {}", id, shown, w = COLUMN_WIDTH)?,
                (true, None) => writeln!(self.out, "{:>w$} {}", "-", shown, w = COLUMN_WIDTH)?,
                (false, _) => writeln!(self.out, "{}", shown)?,
            }
            ctx.counters.printed += 1;
        }

        if !self.filter.accepts(&path) {
            return Ok(());
        }
        if let Some(template) = &self.command {
            let command = template.render(leaf.path)?;
            self.submit(ctx, command)?;
        }
        if !self.check_encoding
            && let (Some(template), Some(id)) = (&self.statement, leaf.id)
        {
            let statement = template.render(id)?;
            ctx.last_command = Some(statement.clone());
            ctx.counters.statements += 1;
            if self.dry_run {
                writeln!(self.out, "{}", statement)?;
            } else {
                trace!("Executing statement '{}'", statement);
                session.execute(&statement)?;
            }
        }
        Ok(())
    }

    fn submit(&mut self, ctx: &mut TraversalContext, command: OsString) -> Result<(), CatfindError> {
        ctx.last_command = Some(command.to_string_lossy().into_owned());
        ctx.counters.commands += 1;
        match &mut self.sink {
            CommandSink::Serial(runner) => {
                runner.run_checked(&command)?;
            }
            CommandSink::Parallel(queue) => {
                if let Some(report) = queue.enqueue(command)? {
                    debug!(
                        "Batch {} ran {} cmds on {} tasks",
                        report.batch, report.executed, report.workers
                    );
                }
            }
            CommandSink::DryRun => {
                self.out.write_all(command.as_encoded_bytes())?;
                self.out.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    /// Drain a partially filled queue and flush the output.
    pub fn finish(&mut self) -> Result<(), CatfindError> {
        if let CommandSink::Parallel(queue) = &mut self.sink
            && let Some(report) = queue.flush()?
        {
            debug!(
                "Final batch {} ran {} cmds on {} tasks",
                report.batch, report.executed, report.workers
            );
        }
        self.out.flush()?;
        Ok(())
    }
}
