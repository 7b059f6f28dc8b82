//! Two-level walk: directories from the outer cursor, files of each directory from an
//! inner cursor opened and closed per directory.

use log::{debug, trace};

use crate::catalog::{CatalogSession, CursorStream, DirectoryRow, FileRow, SortOrder};
use crate::engine::tools::{check_path_length, compose_path};
use crate::error::CatfindError;
use crate::pipeline::context::TraversalContext;
use crate::pipeline::dispatch::{Dispatcher, Leaf};
use crate::types::Opts;

/// Closes `stream` whatever `walked` was; the walk error wins over the close error.
fn close_after<S: CatalogSession + ?Sized>(
    session: &mut S,
    stream: &mut CursorStream,
    walked: Result<(), CatfindError>,
) -> Result<(), CatfindError> {
    let closed = stream.close(session);
    walked?;
    closed?;
    Ok(())
}

#[derive(Clone, Debug)]
pub struct TreeWalker {
    root: String,
    sort: SortOrder,
    page_size: usize,
    dirs_only: bool,
    max_path_length: usize,
}

impl TreeWalker {
    pub fn new(root: impl Into<String>, sort: SortOrder, page_size: usize) -> Self {
        Self {
            root: root.into(),
            sort,
            page_size,
            dirs_only: false,
            max_path_length: crate::utils::config::Limits::PATHNAME_LENGTH,
        }
    }

    pub fn from_opts(opts: &Opts) -> Self {
        Self::new(opts.root.clone(), opts.sort, opts.page_size)
            .dirs_only(opts.dirs_only)
            .max_path_length(opts.max_path_length)
    }

    /// Dispatch directories as leaves instead of walking their files.
    pub fn dirs_only(mut self, dirs_only: bool) -> Self {
        self.dirs_only = dirs_only;
        self
    }

    pub fn max_path_length(mut self, max: usize) -> Self {
        self.max_path_length = max;
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Walk `root` and everything below it, dispatching every leaf.
    pub fn walk<S: CatalogSession + ?Sized>(
        &self,
        session: &mut S,
        ctx: &mut TraversalContext,
        dispatcher: &mut Dispatcher,
    ) -> Result<(), CatfindError> {
        ctx.check_cancelled()?;
        let mut outer =
            CursorStream::open_directories(session, &self.root, self.sort, self.page_size)?;
        let walked = self.walk_directories(session, ctx, dispatcher, &mut outer);
        close_after(session, &mut outer, walked)?;
        debug!(
            "Walked '{}': {} directories, {} files",
            self.root, ctx.counters.directories, ctx.counters.files
        );
        Ok(())
    }

    fn walk_directories<S: CatalogSession + ?Sized>(
        &self,
        session: &mut S,
        ctx: &mut TraversalContext,
        dispatcher: &mut Dispatcher,
        outer: &mut CursorStream,
    ) -> Result<(), CatfindError> {
        loop {
            ctx.check_cancelled()?;
            let batch = outer.fetch_next(session)?;
            ctx.record_fetch(batch.row_count);
            if batch.row_count == 0 {
                return Ok(());
            }
            for row in batch.rows {
                let dir = DirectoryRow::from_row(row)?;
                ctx.counters.directories += 1;
                if self.dirs_only {
                    check_path_length(&dir.name, self.max_path_length)?;
                    dispatcher.dispatch(
                        session,
                        ctx,
                        Leaf {
                            path: &dir.name,
                            id: Some(dir.id),
                        },
                    )?;
                } else {
                    self.walk_files(session, ctx, dispatcher, &dir)?;
                }
            }
        }
    }

    fn walk_files<S: CatalogSession + ?Sized>(
        &self,
        session: &mut S,
        ctx: &mut TraversalContext,
        dispatcher: &mut Dispatcher,
        dir: &DirectoryRow,
    ) -> Result<(), CatfindError> {
        trace!("Directory {} '{}'", dir.id, String::from_utf8_lossy(&dir.name));
        ctx.last_path = String::from_utf8_lossy(&dir.name).into_owned();
        let mut inner = CursorStream::open_files(session, dir.id, self.sort, self.page_size)?;
        let walked = self.walk_file_pages(session, ctx, dispatcher, dir, &mut inner);
        close_after(session, &mut inner, walked)
    }

    fn walk_file_pages<S: CatalogSession + ?Sized>(
        &self,
        session: &mut S,
        ctx: &mut TraversalContext,
        dispatcher: &mut Dispatcher,
        dir: &DirectoryRow,
        inner: &mut CursorStream,
    ) -> Result<(), CatfindError> {
        loop {
            ctx.check_cancelled()?;
            let batch = inner.fetch_next(session)?;
            ctx.record_fetch(batch.row_count);
            if batch.row_count == 0 {
                return Ok(());
            }
            for row in batch.rows {
                let file = FileRow::from_row(row)?;
                ctx.counters.files += 1;
                ctx.counters.bytes += u128::from(file.size);
                let path = compose_path(&dir.name, &file.name, self.max_path_length)?;
                dispatcher.dispatch(
                    session,
                    ctx,
                    Leaf {
                        path: &path,
                        id: file.id,
                    },
                )?;
            }
        }
    }
}
