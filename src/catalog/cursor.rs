//! Paged cursors: the handle a session hands out, and the stream that enforces its
//! open/closed lifecycle.

use log::{debug, trace};

use super::{CatalogSession, Field, Row, SortOrder};
use crate::error::CatalogError;

/// Which level of the hierarchy a cursor walks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorKind {
    Directories,
    Files,
}

impl CursorKind {
    /// Cursor name used in directives and messages.
    pub fn name(self) -> &'static str {
        match self {
            CursorKind::Directories => "directories",
            CursorKind::Files => "files",
        }
    }

    /// Columns of one row: (id, name) for directories, (id, size, name) for files.
    pub fn field_count(self) -> usize {
        match self {
            CursorKind::Directories => 2,
            CursorKind::Files => 3,
        }
    }

    /// Name of the temp table holding the cursor's rows. One cursor of each kind is
    /// open at a time, so the name is fixed per kind.
    pub fn table(self) -> &'static str {
        match self {
            CursorKind::Directories => "catfind_directories",
            CursorKind::Files => "catfind_files",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorState {
    Open,
    Closed,
}

/// One declared paged query.
///
/// Built by a [`CatalogSession`]. On open the session copies the rows of `select` (bound
/// with `params`) into the cursor's temp table, numbered by `seq` in sort order; each
/// fetch reads the next page after `position`. Writes made while the cursor is open do
/// not move its rows. The last fetched page is buffered here until the next fetch or close.
#[derive(Debug)]
pub struct CursorHandle {
    kind: CursorKind,
    select: String,
    params: Vec<Field>,
    fetch_directive: String,
    close_directive: String,
    page_size: usize,
    position: u64,
    batch: Vec<Row>,
    row_count: usize,
    field_count: usize,
    state: CursorState,
}

impl CursorHandle {
    /// Declare a cursor over `select` (bound with `params` as `?1..?n`). `select` yields
    /// the row sequence number first, then the row's fields.
    pub fn new(kind: CursorKind, select: String, params: Vec<Field>, page_size: usize) -> Self {
        let table = kind.table();
        let fetch_directive =
            format!("SELECT * FROM temp.{table} WHERE seq > ?1 ORDER BY seq LIMIT {page_size}");
        let close_directive = format!("DROP TABLE IF EXISTS temp.{table}");
        Self {
            kind,
            select,
            params,
            fetch_directive,
            close_directive,
            page_size,
            position: 0,
            batch: Vec::new(),
            row_count: 0,
            field_count: 0,
            state: CursorState::Open,
        }
    }

    pub fn kind(&self) -> CursorKind {
        self.kind
    }

    pub fn select(&self) -> &str {
        &self.select
    }

    pub fn params(&self) -> &[Field] {
        &self.params
    }

    pub fn fetch_directive(&self) -> &str {
        &self.fetch_directive
    }

    pub fn close_directive(&self) -> &str {
        &self.close_directive
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Rows handed out so far; the next page starts at sequence number `position + 1`.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn batch(&self) -> &[Row] {
        &self.batch
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn field_count(&self) -> usize {
        self.field_count
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == CursorState::Open
    }

    fn replace_batch(&mut self, rows: Vec<Row>) {
        self.row_count = rows.len();
        self.field_count = rows.first().map_or(0, Vec::len);
        self.position += rows.len() as u64;
        self.batch = rows;
    }

    fn release(&mut self) {
        self.batch = Vec::new();
        self.row_count = 0;
        self.field_count = 0;
        self.state = CursorState::Closed;
    }
}

/// Rows of the page just fetched. `row_count == 0` means the cursor is exhausted.
#[derive(Debug)]
pub struct BatchResult<'a> {
    pub rows: &'a [Row],
    pub row_count: usize,
}

/// Cursor lifecycle over a session: open, fetch pages until empty, close once.
///
/// The session is passed to every call instead of being held, so a directory stream
/// and a file stream can be open on the same session at the same time.
#[derive(Debug)]
pub struct CursorStream {
    handle: CursorHandle,
    fetches: u64,
}

impl CursorStream {
    pub fn from_handle(handle: CursorHandle) -> Self {
        Self { handle, fetches: 0 }
    }

    /// Open a stream over `root` and all directories below it.
    pub fn open_directories<S: CatalogSession + ?Sized>(
        session: &mut S,
        root: &str,
        sort: SortOrder,
        page_size: usize,
    ) -> Result<Self, CatalogError> {
        let handle = session.open_directory_cursor(root, sort, page_size)?;
        debug!("Declared cursor {} for '{}'", handle.kind().name(), root);
        Ok(Self::from_handle(handle))
    }

    /// Open a stream over the files of directory `parent_id`.
    pub fn open_files<S: CatalogSession + ?Sized>(
        session: &mut S,
        parent_id: i64,
        sort: SortOrder,
        page_size: usize,
    ) -> Result<Self, CatalogError> {
        let handle = session.open_file_cursor(parent_id, sort, page_size)?;
        trace!("Declared cursor {} for id {}", handle.kind().name(), parent_id);
        Ok(Self::from_handle(handle))
    }

    pub fn handle(&self) -> &CursorHandle {
        &self.handle
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    /// Fetch calls issued so far (including the final empty one).
    pub fn fetches(&self) -> u64 {
        self.fetches
    }

    /// Fetch the next page, replacing the buffered one.
    pub fn fetch_next<S: CatalogSession + ?Sized>(
        &mut self,
        session: &mut S,
    ) -> Result<BatchResult<'_>, CatalogError> {
        if !self.handle.is_open() {
            return Err(CatalogError::State {
                cursor: self.handle.kind().name(),
                operation: "fetch",
            });
        }
        let rows = session.fetch(&self.handle)?;
        if rows.len() > self.handle.page_size() {
            return Err(CatalogError::RowShape {
                cursor: self.handle.kind().name(),
                reason: format!(
                    "fetch returned {} rows for a page of {}",
                    rows.len(),
                    self.handle.page_size()
                ),
            });
        }
        self.fetches += 1;
        self.handle.replace_batch(rows);
        if self.handle.row_count() != 0 {
            trace!(
                "    FETCH {} FROM {} {:8}",
                self.handle.page_size(),
                self.handle.kind().name(),
                self.handle.row_count()
            );
        }
        Ok(BatchResult {
            rows: self.handle.batch(),
            row_count: self.handle.row_count(),
        })
    }

    /// Close the cursor and drop the buffered page. The handle is closed afterwards
    /// even when the session fails to close its side.
    pub fn close<S: CatalogSession + ?Sized>(&mut self, session: &mut S) -> Result<(), CatalogError> {
        if !self.handle.is_open() {
            return Err(CatalogError::State {
                cursor: self.handle.kind().name(),
                operation: "close",
            });
        }
        let closed = session.close(&self.handle);
        self.handle.release();
        closed
    }
}
