//! Open the catalog database and drive cursors over it.

use log::{debug, info, trace};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, OpenFlags, ToSql, params_from_iter};
use std::path::Path;
use std::time::Duration;

use super::{CatalogSession, CursorHandle, CursorKind, Field, FileFilter, Row, SCHEMA, SortOrder};
use crate::error::CatalogError;
use crate::utils::get_passphrase;

/// How long a fetch waits on a locked catalog before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

impl ToSql for Field {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Field::Null => ToSqlOutput::Owned(Value::Null),
            Field::Int(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            Field::Text(bytes) => ToSqlOutput::Borrowed(ValueRef::Text(bytes.as_slice())),
        })
    }
}

fn read_field(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Field> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Field::Null,
        ValueRef::Integer(v) => Field::Int(v),
        ValueRef::Real(v) => Field::Int(v as i64),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Field::Text(bytes.to_vec()),
    })
}

fn directive_error(directive: &str, source: rusqlite::Error) -> CatalogError {
    CatalogError::Directive {
        directive: directive.to_string(),
        source,
    }
}

fn open_error(path: &Path, reason: impl ToString) -> CatalogError {
    CatalogError::Open {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Prefix every directory strictly below `root` starts with.
fn subtree_prefix(root: &str) -> String {
    if root.ends_with('/') {
        root.to_string()
    } else {
        format!("{root}/")
    }
}

/// Apply the catalog schema (idempotent).
pub fn apply_schema(conn: &Connection) -> Result<(), CatalogError> {
    conn.execute_batch(SCHEMA)
        .map_err(|e| directive_error("create schema", e))
}

/// Open an existing catalog. If `passphrase` is Some, set the SQLCipher key before
/// anything else touches the file.
pub fn open_catalog(path: &Path, passphrase: Option<&str>) -> Result<Connection, CatalogError> {
    if !path.is_file() {
        return Err(open_error(path, "no such catalog file"));
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| open_error(path, e))?;
    if let Some(key) = passphrase {
        conn.pragma_update(None, "key", key)
            .map_err(|e| open_error(path, format!("set SQLCipher key: {e}")))?;
    }
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| open_error(path, e))?;
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))
        .map_err(|e| open_error(path, e))?;
    Ok(conn)
}

/// Open an existing catalog, detecting encryption: try without a key first; if the
/// read fails, load the passphrase (env, then .env in `dir`, then prompt) and retry.
/// Returns the connection and whether a key was used.
pub fn open_catalog_or_detect_encrypted(
    path: &Path,
    dir: &Path,
) -> Result<(Connection, bool), CatalogError> {
    match open_catalog(path, None) {
        Ok(conn) => Ok((conn, false)),
        Err(CatalogError::Open { reason, .. }) if path.is_file() => {
            debug!("Plain open failed ({}), trying SQLCipher key", reason);
            let pass = get_passphrase(dir).map_err(|e| open_error(path, format!("{e:#}")))?;
            let conn = open_catalog(path, Some(pass.as_str()))?;
            info!("Opened encrypted catalog");
            Ok((conn, true))
        }
        Err(e) => Err(e),
    }
}

/// In-memory catalog with the schema applied.
pub fn open_catalog_in_memory() -> Result<Connection, CatalogError> {
    let conn = Connection::open_in_memory()
        .map_err(|e| open_error(Path::new(":memory:"), e))?;
    apply_schema(&conn)?;
    Ok(conn)
}

/// [`CatalogSession`] over one SQLite connection.
///
/// Cursors are emulated with temp tables: opening one copies the query's rows, numbered
/// in sort order, and fetches page through that copy. Statements run by
/// [`execute`](CatalogSession::execute) therefore never shift rows of an open cursor.
pub struct SqliteCatalog {
    conn: Connection,
    filter: FileFilter,
    in_transaction: bool,
}

impl SqliteCatalog {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            filter: FileFilter::default(),
            in_transaction: false,
        }
    }

    /// Restrict the file query to a resource and/or replica number.
    pub fn with_file_filter(mut self, filter: FileFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn declare(&mut self, handle: CursorHandle) -> Result<CursorHandle, CatalogError> {
        let kind = handle.kind();
        let columns: String = (1..=kind.field_count())
            .map(|i| format!(", f{i}"))
            .collect();
        let create = format!(
            "CREATE TEMP TABLE {} (seq INTEGER PRIMARY KEY{columns})",
            kind.table()
        );
        self.conn
            .execute_batch(&create)
            .map_err(|e| directive_error(&create, e))?;
        let fill = format!("INSERT INTO temp.{} {}", kind.table(), handle.select());
        let copied = self
            .conn
            .execute(&fill, params_from_iter(handle.params()))
            .map_err(|e| directive_error(&fill, e));
        let rows = match copied {
            Ok(rows) => rows,
            Err(e) => {
                if let Err(drop_err) = self.conn.execute_batch(handle.close_directive()) {
                    debug!("Dropping {} after a failed open: {}", kind.table(), drop_err);
                }
                return Err(e);
            }
        };
        trace!(
            "DECLARE {} CURSOR FOR {} ({} rows)",
            kind.name(),
            handle.select(),
            rows
        );
        Ok(handle)
    }

    fn file_select(&self, sort: SortOrder) -> (String, Vec<Field>) {
        let mut conditions = String::from("coll_id = ?1");
        let mut params = Vec::new();
        if let Some(resource) = &self.filter.resource {
            params.push(Field::Text(resource.as_bytes().to_vec()));
            conditions.push_str(&format!(" AND resc_name = ?{}", params.len() + 1));
        }
        if let Some(replica) = self.filter.replica {
            params.push(Field::Int(i64::from(replica)));
            conditions.push_str(&format!(" AND data_repl_num = ?{}", params.len() + 1));
        }
        let select = if sort.is_unique() {
            format!(
                "SELECT row_number() OVER ({}), NULL, MAX(data_size), data_name \
                 FROM data_objects WHERE {conditions} GROUP BY data_name",
                sort.order_by("data_name", "data_name")
            )
        } else {
            format!(
                "SELECT row_number() OVER ({}), data_id, data_size, data_name \
                 FROM data_objects WHERE {conditions}",
                sort.order_by("data_name", "data_id, data_repl_num")
            )
        };
        (select, params)
    }
}

impl CatalogSession for SqliteCatalog {
    fn begin(&mut self) -> Result<(), CatalogError> {
        self.conn
            .execute_batch("BEGIN DEFERRED")
            .map_err(|e| directive_error("BEGIN", e))?;
        self.in_transaction = true;
        Ok(())
    }

    fn end(&mut self) -> Result<(), CatalogError> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| directive_error("COMMIT", e))?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) {
        if self.in_transaction {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                debug!("Rollback failed: {}", e);
            }
            self.in_transaction = false;
        }
    }

    fn open_directory_cursor(
        &mut self,
        root: &str,
        sort: SortOrder,
        page_size: usize,
    ) -> Result<CursorHandle, CatalogError> {
        // Byte comparison: case-sensitive, and blob names match too.
        let select = format!(
            "SELECT row_number() OVER ({}), coll_id, coll_name FROM collections \
             WHERE CAST(coll_name AS BLOB) = CAST(?1 AS BLOB) \
             OR substr(CAST(coll_name AS BLOB), 1, ?3) = CAST(?2 AS BLOB)",
            sort.order_by("coll_name", "coll_id")
        );
        let prefix = subtree_prefix(root).into_bytes();
        let prefix_len = i64::try_from(prefix.len()).unwrap_or(i64::MAX);
        let params = vec![
            Field::Text(root.as_bytes().to_vec()),
            Field::Text(prefix),
            Field::Int(prefix_len),
        ];
        self.declare(CursorHandle::new(
            CursorKind::Directories,
            select,
            params,
            page_size,
        ))
    }

    fn open_file_cursor(
        &mut self,
        parent_id: i64,
        sort: SortOrder,
        page_size: usize,
    ) -> Result<CursorHandle, CatalogError> {
        let (select, filters) = self.file_select(sort);
        let mut params = Vec::with_capacity(filters.len() + 1);
        params.push(Field::Int(parent_id));
        params.extend(filters);
        self.declare(CursorHandle::new(CursorKind::Files, select, params, page_size))
    }

    fn fetch(&mut self, handle: &CursorHandle) -> Result<Vec<Row>, CatalogError> {
        let directive = handle.fetch_directive();
        let mut stmt = self
            .conn
            .prepare_cached(directive)
            .map_err(|e| directive_error(directive, e))?;
        let ncols = stmt.column_count();
        let after = i64::try_from(handle.position()).unwrap_or(i64::MAX);
        // Column 0 is the sequence number.
        let rows = stmt
            .query_map([after], |row| {
                (1..ncols)
                    .map(|idx| read_field(row, idx))
                    .collect::<rusqlite::Result<Row>>()
            })
            .map_err(|e| directive_error(directive, e))?;
        rows.collect::<rusqlite::Result<Vec<Row>>>()
            .map_err(|e| directive_error(directive, e))
    }

    fn close(&mut self, handle: &CursorHandle) -> Result<(), CatalogError> {
        let directive = handle.close_directive();
        trace!("{}", directive);
        self.conn
            .execute_batch(directive)
            .map_err(|e| directive_error(directive, e))
    }

    fn execute(&mut self, statement: &str) -> Result<(), CatalogError> {
        self.conn
            .execute_batch(statement)
            .map_err(|e| directive_error(statement, e))
    }
}
