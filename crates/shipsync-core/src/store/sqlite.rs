//! Durable SQLite-backed shipment mirror.
//!
//! One table, the full record as a JSON blob plus a few indexed metadata
//! columns so change detection never deserializes the whole mirror. Schema
//! is created on open; later columns are added with the
//! duplicate-column-tolerant ALTER pattern so existing databases upgrade
//! in place.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Error as SqliteError, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;

use shipsync_types::models::ShipmentRecord;
use shipsync_types::SyncError;

use crate::detect::StoredMeta;
use crate::store::ShipmentStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn persist_err(err: impl std::fmt::Display) -> SyncError {
    SyncError::Persistence(err.to_string())
}

fn add_column_if_missing(conn: &Connection, statement: &str) -> Result<(), SyncError> {
    match conn.execute(statement, []) {
        Ok(_) => Ok(()),
        Err(SqliteError::SqliteFailure(_, Some(message)))
            if message.contains("duplicate column name") =>
        {
            Ok(())
        },
        Err(err) => Err(persist_err(err)),
    }
}

fn init_schema(conn: &Connection) -> Result<(), SyncError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS shipments (
            awb TEXT PRIMARY KEY,
            status TEXT,
            awb_status_date TEXT,
            has_detail INTEGER NOT NULL DEFAULT 0,
            last_updated TEXT,
            record TEXT NOT NULL
        )",
        [],
    )
    .map_err(persist_err)?;

    add_column_if_missing(conn, "ALTER TABLE shipments ADD COLUMN processing_status TEXT")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_shipments_last_updated ON shipments (last_updated DESC)",
        [],
    )
    .map_err(persist_err)?;

    Ok(())
}

fn row_to_record(json: &str) -> Result<ShipmentRecord, SyncError> {
    serde_json::from_str(json).map_err(persist_err)
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let conn = Connection::open(path).map_err(persist_err)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(persist_err)?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, SyncError> {
        let conn = Connection::open_in_memory().map_err(persist_err)?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

#[async_trait]
impl ShipmentStore for SqliteStore {
    async fn get(&self, awb: &str) -> Result<Option<ShipmentRecord>, SyncError> {
        let conn = self.conn.lock().await;
        let json: Option<String> = conn
            .query_row("SELECT record FROM shipments WHERE awb = ?1", params![awb], |row| {
                row.get(0)
            })
            .optional()
            .map_err(persist_err)?;
        json.as_deref().map(row_to_record).transpose()
    }

    async fn meta_snapshot(&self) -> Result<HashMap<String, StoredMeta>, SyncError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT awb, status, processing_status, awb_status_date, has_detail
                 FROM shipments",
            )
            .map_err(persist_err)?;
        let rows = stmt
            .query_map([], |row| {
                let awb: String = row.get(0)?;
                let status: Option<String> = row.get(1)?;
                let processing_status: Option<String> = row.get(2)?;
                let awb_status_date: Option<String> = row.get(3)?;
                let has_detail: bool = row.get::<_, i64>(4)? != 0;
                Ok((awb, status, processing_status, awb_status_date, has_detail))
            })
            .map_err(persist_err)?;

        let mut out = HashMap::new();
        for row in rows {
            let (awb, status, processing_status, awb_status_date, has_detail) =
                row.map_err(persist_err)?;
            let last_event = awb_status_date
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            out.insert(awb, StoredMeta { status, processing_status, last_event, has_detail });
        }
        Ok(out)
    }

    async fn upsert(&self, record: &ShipmentRecord) -> Result<(), SyncError> {
        if record.awb.trim().is_empty() {
            return Err(SyncError::MissingIdentifier);
        }
        let json = serde_json::to_string(record).map_err(persist_err)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO shipments
                (awb, status, processing_status, awb_status_date, has_detail, last_updated, record)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(awb) DO UPDATE SET
                status = excluded.status,
                processing_status = excluded.processing_status,
                awb_status_date = excluded.awb_status_date,
                has_detail = excluded.has_detail,
                last_updated = excluded.last_updated,
                record = excluded.record",
            params![
                record.awb,
                record.status,
                record.processing_status,
                record.awb_status_date.map(|dt| dt.to_rfc3339()),
                record.has_detail() as i64,
                record.last_updated.map(|dt| dt.to_rfc3339()),
                json,
            ],
        )
        .map_err(persist_err)?;
        Ok(())
    }

    async fn updated_since(&self, since: DateTime<Utc>) -> Result<Vec<ShipmentRecord>, SyncError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT record FROM shipments
                 WHERE last_updated >= ?1
                 ORDER BY last_updated DESC, awb ASC",
            )
            .map_err(persist_err)?;
        let rows = stmt
            .query_map(params![since.to_rfc3339()], |row| row.get::<_, String>(0))
            .map_err(persist_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row_to_record(&row.map_err(persist_err)?)?);
        }
        Ok(out)
    }

    async fn count(&self) -> Result<u64, SyncError> {
        let conn = self.conn.lock().await;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM shipments", [], |row| row.get(0))
            .map_err(persist_err)?;
        Ok(n as u64)
    }
}
