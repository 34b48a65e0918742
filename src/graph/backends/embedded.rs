//! Embedded Kuzu backend.
//!
//! This module owns every line that touches the `kuzu` crate. Each opened
//! database gets a dedicated worker thread that owns the `Database` and a
//! single `Connection`; statements arrive over a channel and are answered
//! through oneshot replies. That serializes all access to one database file
//! (the engine connection is effectively single-threaded) and bridges the
//! engine's blocking API into the async world.
//!
//! The handle layer races queries against its timeout budget; a caller
//! that gives up simply drops its reply receiver while the worker finishes
//! the statement.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use tokio::sync::{mpsc, oneshot};

use crate::error::MemoryError;
use crate::graph::traits::{GraphConnection, GraphEngine};
use crate::graph::value::{Node, Params, Path, Rel, Row, Value};

/// Factory for embedded Kuzu databases.
#[derive(Debug, Clone, Default)]
pub struct KuzuEngine;

#[async_trait]
impl GraphEngine for KuzuEngine {
    async fn open(&self, db_path: &FsPath) -> Result<Arc<dyn GraphConnection>, MemoryError> {
        let conn = KuzuConnection::open(db_path.to_path_buf()).await?;
        Ok(Arc::new(conn))
    }
}

enum Command {
    Query {
        cypher: String,
        params: Params,
        reply: oneshot::Sender<Result<Vec<Row>, MemoryError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Client half of one database worker.
pub struct KuzuConnection {
    tx: mpsc::UnboundedSender<Command>,
    db_path: PathBuf,
}

impl KuzuConnection {
    /// Opens the database file, spawning its worker thread.
    ///
    /// The open itself happens on the worker so the `Database` never crosses
    /// a thread boundary; failures are reported back before this returns.
    pub async fn open(db_path: PathBuf) -> Result<Self, MemoryError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let worker_path = db_path.clone();
        std::thread::Builder::new()
            .name("kuzu-worker".to_string())
            .spawn(move || worker_loop(worker_path, rx, ready_tx))
            .map_err(|e| MemoryError::Internal(format!("failed to spawn engine worker: {e}")))?;

        ready_rx
            .await
            .map_err(|_| MemoryError::Internal("engine worker exited before opening".into()))??;

        Ok(Self { tx, db_path })
    }

    pub fn db_path(&self) -> &FsPath {
        &self.db_path
    }
}

#[async_trait]
impl GraphConnection for KuzuConnection {
    async fn query(&self, cypher: &str, params: Params) -> Result<Vec<Row>, MemoryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Query {
                cypher: cypher.to_string(),
                params,
                reply: reply_tx,
            })
            .map_err(|_| MemoryError::Internal("engine worker has stopped".into()))?;

        reply_rx
            .await
            .map_err(|_| MemoryError::Internal("engine worker dropped the reply".into()))?
    }

    async fn close(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Command::Close { reply: reply_tx }).is_ok() {
            let _ = reply_rx.await;
        }
    }
}

fn worker_loop(
    db_path: PathBuf,
    mut rx: mpsc::UnboundedReceiver<Command>,
    ready_tx: oneshot::Sender<Result<(), MemoryError>>,
) {
    let db = match kuzu::Database::new(&db_path, kuzu::SystemConfig::default()) {
        Ok(db) => db,
        Err(e) => {
            let _ = ready_tx.send(Err(map_open_error(&e, &db_path)));
            return;
        }
    };
    let conn = match kuzu::Connection::new(&db) {
        Ok(conn) => conn,
        Err(e) => {
            let _ = ready_tx.send(Err(MemoryError::Internal(format!(
                "failed to open connection: {e}"
            ))));
            return;
        }
    };

    if ready_tx.send(Ok(())).is_err() {
        return;
    }

    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            Command::Query {
                cypher,
                params,
                reply,
            } => {
                let result = run_statement(&conn, &cypher, params);
                // A dropped receiver means the caller timed out; the
                // statement has already run to completion.
                let _ = reply.send(result);
            }
            Command::Close { reply } => {
                let _ = reply.send(());
                break;
            }
        }
    }
    // Database drops here, releasing the engine's file lock.
}

fn run_statement(
    conn: &kuzu::Connection,
    cypher: &str,
    params: Params,
) -> Result<Vec<Row>, MemoryError> {
    if params.is_empty() {
        let result = conn
            .query(cypher)
            .map_err(|e| map_query_error(&e, cypher))?;
        Ok(collect_rows(result))
    } else {
        let mut stmt = conn
            .prepare(cypher)
            .map_err(|e| map_query_error(&e, cypher))?;
        let bound: Vec<(String, kuzu::Value)> = params
            .into_iter()
            .map(|(name, value)| (name, to_engine_value(value)))
            .collect();
        let refs: Vec<(&str, kuzu::Value)> = bound
            .iter()
            .map(|(name, value)| (name.as_str(), value.clone()))
            .collect();
        let result = conn
            .execute(&mut stmt, refs)
            .map_err(|e| map_query_error(&e, cypher))?;
        Ok(collect_rows(result))
    }
}

fn map_open_error(err: &kuzu::Error, db_path: &FsPath) -> MemoryError {
    let message = err.to_string();
    if message.to_lowercase().contains("lock") {
        MemoryError::Lock {
            lock_path: Some(db_path.with_extension("db.lock")),
        }
    } else if message.to_lowercase().contains("permission") {
        MemoryError::Permission {
            path: db_path.to_path_buf(),
        }
    } else {
        MemoryError::Internal(format!("failed to open database: {message}"))
    }
}

fn map_query_error(err: &kuzu::Error, cypher: &str) -> MemoryError {
    let message = err.to_string();
    if message.to_lowercase().contains("lock") {
        MemoryError::Lock { lock_path: None }
    } else {
        MemoryError::query(message, cypher)
    }
}

/// Drains a result into rows; the caller never sees the engine cursor.
fn collect_rows(result: kuzu::QueryResult) -> Vec<Row> {
    let columns = result.get_column_names();
    let mut rows = Vec::new();
    for values in result {
        let mut data = HashMap::with_capacity(columns.len());
        for (name, value) in columns.iter().zip(values.into_iter()) {
            data.insert(name.clone(), from_engine_value(value));
        }
        rows.push(Row::new(data));
    }
    rows
}

// ---------------------------------------------------------------------------
// Value conversions
// ---------------------------------------------------------------------------

fn from_engine_value(value: kuzu::Value) -> Value {
    match value {
        kuzu::Value::Null(_) => Value::Null,
        kuzu::Value::Bool(b) => Value::Bool(b),
        kuzu::Value::Int8(i) => Value::Int64(i64::from(i)),
        kuzu::Value::Int16(i) => Value::Int64(i64::from(i)),
        kuzu::Value::Int32(i) => Value::Int64(i64::from(i)),
        kuzu::Value::Int64(i) => Value::Int64(i),
        kuzu::Value::UInt8(i) => Value::Int64(i64::from(i)),
        kuzu::Value::UInt16(i) => Value::Int64(i64::from(i)),
        kuzu::Value::UInt32(i) => Value::Int64(i64::from(i)),
        kuzu::Value::UInt64(i) => Value::Int64(i as i64),
        kuzu::Value::Int128(i) => Value::Int64(i as i64),
        kuzu::Value::Float(f) => Value::Float64(f64::from(f)),
        kuzu::Value::Double(f) => Value::Float64(f),
        kuzu::Value::String(s) => Value::String(s),
        kuzu::Value::Blob(b) => Value::Bytes(b),
        kuzu::Value::Date(d) => Value::Date(convert_date(d)),
        kuzu::Value::Timestamp(ts) => Value::Timestamp(ts.unix_timestamp_nanos() as i64),
        kuzu::Value::TimestampTz(ts) => Value::Timestamp(ts.unix_timestamp_nanos() as i64),
        kuzu::Value::List(_, items) | kuzu::Value::Array(_, items) => {
            Value::List(items.into_iter().map(from_engine_value).collect())
        }
        kuzu::Value::Struct(fields) => Value::Map(
            fields
                .into_iter()
                .map(|(k, v)| (k, from_engine_value(v)))
                .collect(),
        ),
        kuzu::Value::Node(node) => Value::Node(convert_node(&node)),
        kuzu::Value::Rel(rel) => Value::Rel(convert_rel(&rel)),
        kuzu::Value::RecursiveRel { nodes, rels } => Value::Path(Path {
            nodes: nodes.iter().map(convert_node).collect(),
            rels: rels.iter().map(convert_rel).collect(),
        }),
        kuzu::Value::InternalID(id) => Value::String(format!("{}:{}", id.table_id, id.offset)),
        // Intervals, UUIDs, decimals and other exotic shapes are not part
        // of the schema; fall back to their display form.
        other => Value::String(other.to_string()),
    }
}

fn convert_node(node: &kuzu::NodeVal) -> Node {
    let properties: BTreeMap<String, Value> = node
        .get_properties()
        .iter()
        .map(|(k, v)| (k.clone(), from_engine_value(v.clone())))
        .collect();
    Node {
        label: node.get_label_name().clone(),
        properties,
    }
}

fn convert_rel(rel: &kuzu::RelVal) -> Rel {
    let src = rel.get_src_node();
    let dst = rel.get_dst_node();
    Rel {
        label: rel.get_label_name().clone(),
        from: format!("{}:{}", src.table_id, src.offset),
        to: format!("{}:{}", dst.table_id, dst.offset),
        properties: rel
            .get_properties()
            .iter()
            .map(|(k, v)| (k.clone(), from_engine_value(v.clone())))
            .collect(),
    }
}

fn convert_date(d: time::Date) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(d.year(), u32::from(u8::from(d.month())), u32::from(d.day()))
        .unwrap_or_default()
}

fn to_engine_value(value: Value) -> kuzu::Value {
    match value {
        Value::Null => kuzu::Value::Null(kuzu::LogicalType::Any),
        Value::Bool(b) => kuzu::Value::Bool(b),
        Value::Int64(i) => kuzu::Value::Int64(i),
        Value::Float64(f) => kuzu::Value::Double(f),
        Value::String(s) => kuzu::Value::String(s),
        Value::Bytes(b) => kuzu::Value::Blob(b),
        Value::Date(d) => kuzu::Value::Date(convert_date_back(d)),
        Value::Timestamp(nanos) => kuzu::Value::Timestamp(
            time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
                .unwrap_or(time::OffsetDateTime::UNIX_EPOCH),
        ),
        Value::List(items) => kuzu::Value::List(
            kuzu::LogicalType::String,
            items.into_iter().map(to_engine_value).collect(),
        ),
        // Structured values are stored as JSON text; the schema has no
        // nested column types.
        other @ (Value::Map(_) | Value::Node(_) | Value::Rel(_) | Value::Path(_)) => {
            kuzu::Value::String(other.to_json().to_string())
        }
    }
}

fn convert_date_back(d: chrono::NaiveDate) -> time::Date {
    let month = time::Month::try_from(d.month() as u8).unwrap_or(time::Month::January);
    time::Date::from_calendar_date(d.year(), month, d.day() as u8)
        .unwrap_or(time::Date::MIN)
}
