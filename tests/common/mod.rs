//! Shared test doubles: a scripted command executor and small catalog fixtures.

#![allow(dead_code)]

use catfind::catalog::{SqliteCatalog, open_catalog_in_memory};
use catfind::engine::{CommandExecutor, CommandStatus};
use rusqlite::Connection;
use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::io;
use std::sync::Mutex;

/// Records every command and answers from a script (success once the script runs out).
#[derive(Default)]
pub struct Scripted {
    calls: Mutex<Vec<OsString>>,
    script: Mutex<VecDeque<CommandStatus>>,
    always: Option<CommandStatus>,
}

impl Scripted {
    pub fn new(script: &[CommandStatus]) -> Self {
        Self {
            script: Mutex::new(script.iter().copied().collect()),
            ..Default::default()
        }
    }

    /// Every call returns `status`.
    pub fn always(status: CommandStatus) -> Self {
        Self {
            always: Some(status),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.to_string_lossy().into_owned())
            .collect()
    }

    /// Commands exactly as handed to the executor.
    pub fn raw_calls(&self) -> Vec<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.as_encoded_bytes().to_vec())
            .collect()
    }
}

impl CommandExecutor for Scripted {
    fn run_shell(&self, command: &OsStr) -> io::Result<CommandStatus> {
        self.calls.lock().unwrap().push(command.to_os_string());
        if let Some(status) = self.always {
            return Ok(status);
        }
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(CommandStatus::Exited(0)))
    }
}

pub fn add_dir(conn: &Connection, id: i64, name: &str) {
    conn.execute(
        "INSERT INTO collections (coll_id, coll_name) VALUES (?1, ?2)",
        rusqlite::params![id, name],
    )
    .unwrap();
}

pub fn add_file(conn: &Connection, id: i64, dir: i64, name: &str, size: i64) {
    add_replica(conn, id, dir, name, size, 0, "demoResc");
}

pub fn add_replica(
    conn: &Connection,
    id: i64,
    dir: i64,
    name: &str,
    size: i64,
    repl: i64,
    resc: &str,
) {
    conn.execute(
        "INSERT INTO data_objects (data_id, coll_id, data_name, data_size, data_repl_num, resc_name) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![id, dir, name, size, repl, resc],
    )
    .unwrap();
}

/// `/z` holding `fileA`, and `/z/d2` holding `fileB` and `fileC`.
pub fn two_dir_catalog() -> Connection {
    let conn = open_catalog_in_memory().unwrap();
    add_dir(&conn, 1, "/z");
    add_dir(&conn, 2, "/z/d2");
    add_file(&conn, 10, 1, "fileA", 100);
    add_file(&conn, 11, 2, "fileB", 200);
    add_file(&conn, 12, 2, "fileC", 300);
    conn
}

pub fn session(conn: Connection) -> SqliteCatalog {
    SqliteCatalog::new(conn)
}
