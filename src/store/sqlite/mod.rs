//! SQLite-backed interval store.
//!
//! The connection lives on a dedicated worker thread; queries are shipped to
//! it as boxed closures and the caller blocks on the reply. Disposing the
//! store shuts the worker down, after which every query reports
//! [`StoreError::Disposed`].

mod migrations;

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicI64, Ordering},
        mpsc, Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use log::{error, info};
use rusqlite::{params, types::Type, Connection};

use crate::{
    error::StoreError,
    models::{AttributeId, Interval, Value},
};

use super::IntervalStore;
use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct StoreInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StoreInner {
    fn shutdown(&self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to interval store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join interval store thread: {join_err:?}");
            }
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<StoreInner>,
    db_path: Option<Arc<PathBuf>>,
    start: Arc<AtomicI64>,
    end: Arc<AtomicI64>,
}

impl SqliteStore {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create interval store directory {}", parent.display())
            })?;
        }
        let path_for_thread = db_path.clone();
        let store = Self::spawn(move || Connection::open(&path_for_thread), Some(db_path))?;
        info!(
            "Interval store opened at {}",
            store.path().map(|p| p.display().to_string()).unwrap_or_default()
        );
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::spawn(Connection::open_in_memory, None)
    }

    fn spawn<F>(open: F, db_path: Option<PathBuf>) -> Result<Self>
    where
        F: FnOnce() -> rusqlite::Result<Connection> + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("timegraph-store".into())
            .spawn(move || {
                let mut conn = match open() {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite interval store")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run interval store migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Interval store receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => task(&mut conn),
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Interval store thread shutting down");
            })
            .context("failed to spawn interval store worker thread")?;

        ready_rx
            .recv()
            .context("interval store worker exited before signaling readiness")??;

        let store = Self {
            inner: Arc::new(StoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: db_path.map(Arc::new),
            start: Arc::new(AtomicI64::new(0)),
            end: Arc::new(AtomicI64::new(-1)),
        };
        store.refresh_bounds()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref().map(PathBuf::as_path)
    }

    /// Runs `task` on the store thread and blocks for its result.
    pub fn execute<F, T>(&self, task: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Interval store caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|_| StoreError::Disposed)?;

        reply_rx.recv().map_err(|_| StoreError::Disposed)?
    }

    /// Stops the worker thread. Queries issued afterwards fail with
    /// [`StoreError::Disposed`].
    pub fn dispose(&self) {
        self.inner.shutdown();
    }

    pub fn insert_intervals(&self, intervals: &[Interval]) -> Result<(), StoreError> {
        let records = intervals.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO intervals (attribute, start_time, end_time, value_kind, value_int, value_str)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for record in &records {
                    let (kind, int_value, str_value) = encode_value(&record.payload);
                    stmt.execute(params![
                        record.attribute.0,
                        record.span.start,
                        record.span.end,
                        kind,
                        int_value,
                        str_value,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })?;
        self.refresh_bounds()
    }

    pub fn name_attribute(&self, attribute: AttributeId, name: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO attributes (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                params![attribute.0, name],
            )?;
            Ok(())
        })
    }

    /// Every attribute present in the store with its name, if one was recorded.
    pub fn attributes(&self) -> Result<Vec<(AttributeId, Option<String>)>, StoreError> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT i.attribute, a.name
                 FROM intervals i
                 LEFT JOIN attributes a ON a.id = i.attribute
                 ORDER BY i.attribute ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((AttributeId(row.get(0)?), row.get::<_, Option<String>>(1)?))
            })?;

            let mut attributes = Vec::new();
            for row in rows {
                attributes.push(row?);
            }
            Ok(attributes)
        })
    }

    fn refresh_bounds(&self) -> Result<(), StoreError> {
        let (start, end) = self.execute(|conn| {
            let bounds = conn.query_row(
                "SELECT MIN(start_time), MAX(end_time) FROM intervals",
                [],
                |row| Ok((row.get::<_, Option<i64>>(0)?, row.get::<_, Option<i64>>(1)?)),
            )?;
            Ok(bounds)
        })?;
        self.start.store(start.unwrap_or(0), Ordering::SeqCst);
        self.end.store(end.unwrap_or(-1), Ordering::SeqCst);
        Ok(())
    }
}

fn encode_value(value: &Value) -> (&'static str, Option<i64>, Option<&str>) {
    match value {
        Value::Null => ("null", None, None),
        Value::Int(v) => ("int", Some(*v), None),
        Value::Str(s) => ("str", None, Some(s.as_str())),
    }
}

fn read_interval(row: &rusqlite::Row<'_>) -> rusqlite::Result<Interval> {
    let attribute: u32 = row.get(0)?;
    let start: i64 = row.get(1)?;
    let end: i64 = row.get(2)?;
    let kind: String = row.get(3)?;
    let payload = match kind.as_str() {
        "null" => Value::Null,
        "int" => Value::Int(row.get(4)?),
        "str" => Value::Str(row.get(5)?),
        _ => return Err(rusqlite::Error::InvalidColumnType(3, "value_kind".into(), Type::Text)),
    };
    Ok(Interval::new(AttributeId(attribute), start, end, payload))
}

impl IntervalStore for SqliteStore {
    fn start_time(&self) -> i64 {
        self.start.load(Ordering::SeqCst)
    }

    fn current_end_time(&self) -> i64 {
        self.end.load(Ordering::SeqCst)
    }

    fn point_query(&self, time: i64) -> Result<Vec<Interval>, StoreError> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT attribute, start_time, end_time, value_kind, value_int, value_str
                 FROM intervals
                 WHERE start_time <= ?1 AND end_time > ?1
                 ORDER BY attribute ASC",
            )?;
            let rows = stmt.query_map(params![time], read_interval)?;

            let mut state = Vec::new();
            for row in rows {
                state.push(row?);
            }
            Ok(state)
        })
    }

    fn range_query(
        &self,
        attributes: &BTreeSet<AttributeId>,
        start: i64,
        end: i64,
    ) -> Result<Vec<Interval>, StoreError> {
        let attributes: Vec<AttributeId> = attributes.iter().copied().collect();
        self.execute(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT attribute, start_time, end_time, value_kind, value_int, value_str
                 FROM intervals
                 WHERE attribute = ?1 AND start_time <= ?3 AND end_time > ?2",
            )?;

            let mut found = Vec::new();
            for attribute in attributes {
                let rows = stmt.query_map(params![attribute.0, start, end], read_interval)?;
                for row in rows {
                    found.push(row?);
                }
            }
            Ok(found)
        })
    }
}
