//! Catalog access: the session interface the walker drives, paged cursors over it,
//! and the SQLite-backed session.

mod connection;
mod cursor;

pub use connection::{
    SqliteCatalog, apply_schema, open_catalog, open_catalog_in_memory,
    open_catalog_or_detect_encrypted,
};
pub use cursor::{BatchResult, CursorHandle, CursorKind, CursorState, CursorStream};

use crate::error::CatalogError;

/// Catalog schema: directories (collections) and the files (data objects) inside them.
/// One data object may have several replicas, on different resources.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    coll_id INTEGER PRIMARY KEY,
    coll_name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS data_objects (
    data_id INTEGER NOT NULL,
    coll_id INTEGER NOT NULL REFERENCES collections(coll_id),
    data_name TEXT NOT NULL,
    data_size INTEGER NOT NULL DEFAULT 0,
    data_repl_num INTEGER NOT NULL DEFAULT 0,
    resc_name TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (data_id, data_repl_num)
);
CREATE INDEX IF NOT EXISTS idx_data_objects_coll ON data_objects(coll_id, data_name);
"#;

/// One column value of a fetched row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Field {
    Null,
    Int(i64),
    /// Text or blob, kept as raw bytes so malformed names survive the fetch.
    Text(Vec<u8>),
}

impl Field {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Field::Int(v) => Some(*v),
            Field::Text(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            Field::Null => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Field::Text(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// One fetched row, fields in select order.
pub type Row = Vec<Field>;

/// Sort order of both the directory and the file queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Catalog id order.
    #[default]
    None,
    Ascending,
    Descending,
    /// Ascending, one row per file name (replicas collapsed, no data id).
    AscendingUnique,
    /// Descending, one row per file name (replicas collapsed, no data id).
    DescendingUnique,
}

impl SortOrder {
    pub fn is_unique(self) -> bool {
        matches!(
            self,
            SortOrder::AscendingUnique | SortOrder::DescendingUnique
        )
    }

    /// `ORDER BY` clause on `column`, tie-broken by `id_columns` so rows get a total
    /// order when a cursor numbers them. Unsorted queries order by id.
    pub fn order_by(self, column: &str, id_columns: &str) -> String {
        match self {
            SortOrder::None => format!(" ORDER BY {id_columns}"),
            SortOrder::Ascending => format!(" ORDER BY {column} ASC, {id_columns}"),
            SortOrder::Descending => format!(" ORDER BY {column} DESC, {id_columns}"),
            SortOrder::AscendingUnique => format!(" ORDER BY {column} ASC"),
            SortOrder::DescendingUnique => format!(" ORDER BY {column} DESC"),
        }
    }
}

impl TryFrom<u8> for SortOrder {
    type Error = CatalogError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SortOrder::None),
            1 => Ok(SortOrder::Ascending),
            2 => Ok(SortOrder::Descending),
            3 => Ok(SortOrder::AscendingUnique),
            4 => Ok(SortOrder::DescendingUnique),
            other => Err(CatalogError::SortOrder(other)),
        }
    }
}

/// Restrictions applied to the file query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileFilter {
    /// Only replicas on this resource.
    pub resource: Option<String>,
    /// Only this replica number.
    pub replica: Option<u32>,
}

/// Directory row: (id, name).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryRow {
    pub id: i64,
    pub name: Vec<u8>,
}

impl DirectoryRow {
    pub fn from_row(row: &Row) -> Result<Self, CatalogError> {
        match row.as_slice() {
            [id, name, ..] => Ok(Self {
                id: id.as_i64().ok_or_else(|| shape("directories", "id is not an integer"))?,
                name: name
                    .as_bytes()
                    .ok_or_else(|| shape("directories", "name is not text"))?
                    .to_vec(),
            }),
            _ => Err(shape("directories", "expected 2 fields")),
        }
    }
}

/// File row: (id?, size, name). The id is absent in the unique sort orders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRow {
    pub id: Option<i64>,
    pub size: u64,
    pub name: Vec<u8>,
}

impl FileRow {
    pub fn from_row(row: &Row) -> Result<Self, CatalogError> {
        match row.as_slice() {
            [id, size, name, ..] => Ok(Self {
                id: id.as_i64(),
                size: size.as_i64().unwrap_or(0).max(0) as u64,
                name: name
                    .as_bytes()
                    .ok_or_else(|| shape("files", "name is not text"))?
                    .to_vec(),
            }),
            _ => Err(shape("files", "expected 3 fields")),
        }
    }
}

fn shape(cursor: &'static str, reason: &str) -> CatalogError {
    CatalogError::RowShape {
        cursor,
        reason: reason.to_string(),
    }
}

/// The catalog as the traversal sees it. Owned by the coordinating thread only.
///
/// Cursor handles are created by the `open_*` methods and must be closed with
/// [`close`](Self::close); at most one directory and one file cursor are open at a time.
pub trait CatalogSession {
    /// Start the read transaction the whole traversal runs in.
    fn begin(&mut self) -> Result<(), CatalogError>;

    /// Commit (statements run by [`execute`](Self::execute) included).
    fn end(&mut self) -> Result<(), CatalogError>;

    /// Best-effort rollback on the fatal path; also forgets open cursors.
    fn rollback(&mut self);

    /// Declare a cursor over `root` and every directory below it.
    fn open_directory_cursor(
        &mut self,
        root: &str,
        sort: SortOrder,
        page_size: usize,
    ) -> Result<CursorHandle, CatalogError>;

    /// Declare a cursor over the files of directory `parent_id`.
    fn open_file_cursor(
        &mut self,
        parent_id: i64,
        sort: SortOrder,
        page_size: usize,
    ) -> Result<CursorHandle, CatalogError>;

    /// Next page of at most `page_size` rows; empty when exhausted.
    fn fetch(&mut self, handle: &CursorHandle) -> Result<Vec<Row>, CatalogError>;

    /// Release the session side of a cursor.
    fn close(&mut self, handle: &CursorHandle) -> Result<(), CatalogError>;

    /// Run a rendered follow-up statement in the traversal transaction.
    fn execute(&mut self, statement: &str) -> Result<(), CatalogError>;
}
