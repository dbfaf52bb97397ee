//! SQLite-backed document store
//!
//! Each document is kept as JSON in a `doc` column; the fields launch filters
//! need are duplicated into indexed columns so predicates run in SQL. Name
//! columns hold the Unicode lowercase form computed in Rust, since SQLite's
//! `lower()` only folds ASCII.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{DocumentStore, LaunchQuery, StoreError};
use crate::data::{Launch, Launchpad, Rocket};

/// Layout version recorded in `PRAGMA user_version`
const SCHEMA_VERSION: i64 = 2;

/// SQLite implementation of [`DocumentStore`]
///
/// The connection is shared behind a mutex and every statement runs on the
/// blocking thread pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Option<Connection>>>,
}

/// Launch row prepared for insertion
struct LaunchRow {
    id: String,
    date: Option<String>,
    success: Option<bool>,
    rocket_name_lc: Option<String>,
    launchpad_name_lc: Option<String>,
    doc: String,
}

/// Rocket or launchpad row prepared for insertion
struct NamedRow {
    id: String,
    name: String,
    doc: String,
}

impl SqliteStore {
    /// Opens or creates a store at `path`
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> Result<Self, StoreError> {
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            // Launch rows are refetched by the next backfill
            conn.execute_batch("DROP TABLE IF EXISTS launches;")?;
            debug!(from = version, to = SCHEMA_VERSION, "Applied store schema version");
        }
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Runs `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            let conn = guard.as_mut().ok_or(StoreError::Closed)?;
            f(conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn upsert_named(&self, table: &'static str, rows: Vec<NamedRow>) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let sql = format!(
                    "INSERT INTO {table} (id, name, doc) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(id) DO UPDATE SET name = excluded.name, doc = excluded.doc"
                );
                let mut stmt = tx.prepare(&sql)?;
                for row in &rows {
                    stmt.execute(params![row.id, row.name, row.doc])?;
                }
            }
            tx.commit()?;
            debug!(table, count = rows.len(), "Upserted documents");
            Ok(())
        })
        .await
    }

    async fn load_all<T>(&self, table: &'static str) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!("SELECT doc FROM {table} ORDER BY id ASC"))?;
            let docs = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for doc in docs {
                out.push(serde_json::from_str(&doc?)?);
            }
            Ok(out)
        })
        .await
    }
}

/// Fixed-width UTC timestamp so lexicographic order matches time order
fn encode_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Builds the WHERE clause and bound values for a launch query
fn compile_query(query: &LaunchQuery) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some((start, end)) = &query.date_range {
        clauses.push("date IS NOT NULL AND date >= ? AND date <= ?");
        values.push(Value::Text(encode_date(start)));
        values.push(Value::Text(encode_date(end)));
    }
    if let Some(name) = &query.rocket_name {
        clauses.push("instr(rocket_name_lc, ?) > 0");
        values.push(Value::Text(name.to_lowercase()));
    }
    if let Some(success) = query.success {
        clauses.push("success = ?");
        values.push(Value::Integer(i64::from(success)));
    }
    if let Some(pad) = &query.launchpad {
        clauses.push("instr(launchpad_name_lc, ?) > 0");
        values.push(Value::Text(pad.to_lowercase()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (where_clause, values)
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn count_launches(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM launches", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn upsert_launches(&self, launches: &[Launch]) -> Result<(), StoreError> {
        if launches.is_empty() {
            return Ok(());
        }
        let rows = launches
            .iter()
            .map(|launch| {
                Ok(LaunchRow {
                    id: launch.id.clone(),
                    date: launch.date.as_ref().map(encode_date),
                    success: launch.success,
                    rocket_name_lc: launch.rocket.as_ref().map(|r| r.name.to_lowercase()),
                    launchpad_name_lc: launch.launchpad.as_ref().map(|p| p.name.to_lowercase()),
                    doc: serde_json::to_string(launch)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO launches (id, date, success, rocket_name_lc, launchpad_name_lc, doc) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                     ON CONFLICT(id) DO UPDATE SET date = excluded.date, success = excluded.success, \
                     rocket_name_lc = excluded.rocket_name_lc, \
                     launchpad_name_lc = excluded.launchpad_name_lc, doc = excluded.doc",
                )?;
                for row in &rows {
                    stmt.execute(params![
                        row.id,
                        row.date,
                        row.success,
                        row.rocket_name_lc,
                        row.launchpad_name_lc,
                        row.doc,
                    ])?;
                }
            }
            tx.commit()?;
            debug!(table = "launches", count = rows.len(), "Upserted documents");
            Ok(())
        })
        .await
    }

    async fn upsert_rockets(&self, rockets: &[Rocket]) -> Result<(), StoreError> {
        let rows = rockets
            .iter()
            .map(|rocket| {
                Ok(NamedRow {
                    id: rocket.id.clone(),
                    name: rocket.name.clone(),
                    doc: serde_json::to_string(rocket)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        self.upsert_named("rockets", rows).await
    }

    async fn upsert_launchpads(&self, launchpads: &[Launchpad]) -> Result<(), StoreError> {
        let rows = launchpads
            .iter()
            .map(|pad| {
                Ok(NamedRow {
                    id: pad.id.clone(),
                    name: pad.name.clone(),
                    doc: serde_json::to_string(pad)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        self.upsert_named("launchpads", rows).await
    }

    async fn find_launches(&self, query: &LaunchQuery) -> Result<Vec<Launch>, StoreError> {
        let (where_clause, values) = compile_query(query);
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT doc FROM launches{where_clause} ORDER BY date IS NULL, date ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let docs = stmt.query_map(params_from_iter(values), |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for doc in docs {
                out.push(serde_json::from_str(&doc?)?);
            }
            Ok(out)
        })
        .await
    }

    async fn rockets(&self) -> Result<Vec<Rocket>, StoreError> {
        self.load_all("rockets").await
    }

    async fn launchpads(&self) -> Result<Vec<Launchpad>, StoreError> {
        self.load_all("launchpads").await
    }

    async fn close(&self) -> Result<(), StoreError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            if let Some(conn) = conn.lock().take() {
                conn.close().map_err(|(_, e)| StoreError::Database(e))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}
