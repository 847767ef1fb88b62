//! Relational backend engine
//!
//! Builds a parameterized SQL predicate — a datetime `BETWEEN` on
//! `originationTime`, optionally conjoined with an OR-alternation over the
//! active optional fields — executes it, and joins device attributes back
//! onto every row. Phone/voicemail filters resolve device ids through a
//! sub-query first; an empty `IN` clause is never emitted.
//!
//! The connection is opened at construction (failure aborts construction,
//! no retry) and owned by the engine for the duration of each call.
//! Statements are scoped and dropped on every exit path.

use rusqlite::{Connection, params, params_from_iter};
use tracing::{debug, info};

use crate::backup;
use crate::config::SqlConfig;
use crate::error::{FilterError, Result};
use crate::filter::{FilterField, FilterSpec};
use crate::generator::GeneratedRecord;
use crate::record::{Device, FilterResult, Record, epoch_to_canonical};

const RECORDS_TABLE: &str = "records";
const DEVICES_TABLE: &str = "devices";

const DEVICES_TABLE_CREATE: &str = "CREATE TABLE IF NOT EXISTS devices (\
     _id INTEGER PRIMARY KEY AUTOINCREMENT, \
     phone TEXT, \
     voicemail TEXT, \
     UNIQUE(phone, voicemail))";

const RECORDS_TABLE_CREATE: &str = "CREATE TABLE IF NOT EXISTS records (\
     _id INTEGER PRIMARY KEY, \
     userId TEXT, \
     deviceId INTEGER, \
     clusterId TEXT, \
     originationTime TEXT, \
     FOREIGN KEY (deviceId) REFERENCES devices(_id))";

/// A built query: SQL text with positional placeholders plus the bound
/// values, preserving the documented clause ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<String>,
}

/// Filter engine over the relational store.
pub struct SqlStore {
    conn: Connection,
}

impl SqlStore {
    /// Open the database at the configured path.
    ///
    /// A failure here is a connection error and aborts construction.
    pub fn open(config: &SqlConfig) -> Result<Self> {
        let conn = Connection::open(&config.db_path).map_err(FilterError::connection)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(FilterError::connection)?;
        Ok(Self { conn })
    }

    /// In-memory engine for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(FilterError::connection)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(FilterError::connection)?;
        Ok(Self { conn })
    }

    /// Build the filter query for a validated spec.
    ///
    /// Shape: `SELECT * FROM records WHERE originationTime BETWEEN ? AND ?`
    /// with the canonical datetime bounds; when any optional field is
    /// active, ` AND (<alt> OR <alt> ...)` follows with the alternatives in
    /// the order userId, clusterId, deviceId IN. The device sub-query runs
    /// during construction, so a database failure here is an operation
    /// error.
    pub fn build_query(&self, spec: &FilterSpec) -> Result<SqlQuery> {
        self.build_query_inner(spec).map_err(FilterError::operation)
    }

    fn build_query_inner(&self, spec: &FilterSpec) -> rusqlite::Result<SqlQuery> {
        let mut sql = format!("SELECT * FROM {RECORDS_TABLE} WHERE originationTime BETWEEN ? AND ?");
        let mut bound = vec![spec.start_datetime_text(), spec.end_datetime_text()];

        if !spec.has_extra_filters() {
            return Ok(SqlQuery { sql, params: bound });
        }

        let mut alternatives: Vec<String> = Vec::new();

        if let Some(user_id) = spec.value(FilterField::UserId) {
            alternatives.push("userId = ?".to_string());
            bound.push(user_id.to_string());
        }
        if let Some(cluster) = spec.value(FilterField::Cluster) {
            alternatives.push("clusterId = ?".to_string());
            bound.push(cluster.to_string());
        }

        let phone = spec.value(FilterField::PhoneNumber);
        let voicemail = spec.value(FilterField::VoiceMail);
        if phone.is_some() || voicemail.is_some() {
            let device_ids =
                self.resolve_device_ids(phone.unwrap_or(""), voicemail.unwrap_or(""))?;
            if device_ids.is_empty() {
                debug!("device sub-query matched nothing; no deviceId clause appended");
            } else {
                let id_list: Vec<String> = device_ids.iter().map(ToString::to_string).collect();
                alternatives.push(format!("deviceId IN ({})", id_list.join(",")));
            }
        }

        if !alternatives.is_empty() {
            sql.push_str(&format!(" AND ({})", alternatives.join(" OR ")));
        }

        Ok(SqlQuery { sql, params: bound })
    }

    /// Resolve device ids matching the phone or voicemail filter.
    fn resolve_device_ids(&self, phone: &str, voicemail: &str) -> rusqlite::Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT _id FROM {DEVICES_TABLE} WHERE phone = ?1 OR voicemail = ?2"
            ))?;
        let rows = stmt.query_map(params![phone, voicemail], |row| row.get(0))?;
        rows.collect()
    }

    /// Execute a built query, join device attributes onto every row, and
    /// return canonical records.
    pub fn execute(&self, query: &SqlQuery) -> Result<Vec<Record>> {
        self.execute_inner(query).map_err(FilterError::operation)
    }

    fn execute_inner(&self, query: &SqlQuery) -> rusqlite::Result<Vec<Record>> {
        struct RawRow {
            id: i64,
            user_id: String,
            device_id: i64,
            cluster_id: String,
            origination_time: String,
        }

        let rows: Vec<RawRow> = {
            let mut stmt = self.conn.prepare(&query.sql)?;
            let mapped = stmt.query_map(params_from_iter(query.params.iter()), |row| {
                Ok(RawRow {
                    id: row.get("_id")?,
                    user_id: row.get("userId")?,
                    device_id: row.get("deviceId")?,
                    cluster_id: row.get("clusterId")?,
                    origination_time: row.get("originationTime")?,
                })
            })?;
            mapped.collect::<rusqlite::Result<_>>()?
        };
        debug!(count = rows.len(), "relational query matched");

        rows.into_iter()
            .map(|raw| {
                let devices = self.device_by_id(raw.device_id)?;
                Ok(Record {
                    id: raw.id,
                    origination_time: raw.origination_time,
                    cluster_id: raw.cluster_id,
                    user_id: raw.user_id,
                    devices,
                })
            })
            .collect()
    }

    fn device_by_id(&self, device_id: i64) -> rusqlite::Result<Device> {
        self.conn.query_row(
            &format!("SELECT phone, voicemail FROM {DEVICES_TABLE} WHERE _id = ?1"),
            [device_id],
            |row| {
                Ok(Device {
                    phone: row.get(0)?,
                    voicemail: row.get(1)?,
                })
            },
        )
    }

    /// Full pipeline: build query → execute/join → normalize/dedup.
    pub fn run(&self, spec: &FilterSpec) -> Result<FilterResult> {
        let query = self.build_query(spec)?;
        debug!(sql = %query.sql, "executing relational filter query");
        let records = self.execute(&query)?;
        let result = FilterResult::new(records);
        info!(count = result.len(), "relational filter pipeline finished");
        Ok(result)
    }

    /// Write a freshly generated dataset.
    ///
    /// For each of the two tables: if it exists in the schema catalog, copy
    /// it to a timestamped backup table and clear it. The two-table
    /// backup-then-clear sequence is not atomic (a failure between the
    /// tables leaves an intermediate state, as in the persisted layout this
    /// reproduces). Both tables are then (re)created if absent and all rows
    /// inserted — device row first, record row referencing the resolved
    /// device id — inside one transaction that rolls back on any failure.
    pub fn store_records(&mut self, records: &[GeneratedRecord]) -> Result<()> {
        self.backup_and_clear(RECORDS_TABLE).map_err(FilterError::operation)?;
        self.backup_and_clear(DEVICES_TABLE).map_err(FilterError::operation)?;
        self.ensure_schema().map_err(FilterError::operation)?;
        self.insert_all(records).map_err(FilterError::operation)?;
        info!(count = records.len(), "records stored in the relational store");
        Ok(())
    }

    fn table_exists(&self, table: &str) -> rusqlite::Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn backup_and_clear(&self, table: &str) -> rusqlite::Result<()> {
        if !self.table_exists(table)? {
            return Ok(());
        }

        // backup names are built from a fixed table constant plus the
        // timestamp, never from caller input
        let backup = backup::backup_name(table);
        info!(table, backup = %backup, "existing table found; taking backup");
        self.conn
            .execute_batch(&format!("CREATE TABLE IF NOT EXISTS {backup} AS SELECT * FROM {table}"))?;
        self.conn.execute(&format!("DELETE FROM {table}"), [])?;
        Ok(())
    }

    fn ensure_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(DEVICES_TABLE_CREATE)?;
        self.conn.execute_batch(RECORDS_TABLE_CREATE)?;
        Ok(())
    }

    fn insert_all(&mut self, records: &[GeneratedRecord]) -> rusqlite::Result<()> {
        // dropping the transaction on an early return rolls it back
        let tx = self.conn.transaction()?;
        {
            let mut device_stmt = tx.prepare(&format!(
                "INSERT INTO {DEVICES_TABLE} (phone, voicemail) VALUES (?1, ?2) \
                 ON CONFLICT(phone, voicemail) DO UPDATE SET phone = excluded.phone \
                 RETURNING _id"
            ))?;
            let mut record_stmt = tx.prepare(&format!(
                "INSERT INTO {RECORDS_TABLE} (_id, userId, deviceId, clusterId, originationTime) \
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ))?;

            for record in records {
                let device_id: i64 = device_stmt.query_row(
                    params![record.devices.phone, record.devices.voicemail],
                    |row| row.get(0),
                )?;
                record_stmt.execute(params![
                    record.id,
                    record.user_id,
                    device_id,
                    record.cluster_id,
                    epoch_to_canonical(record.origination_time),
                ])?;
            }
        }
        tx.commit()
    }
}

impl std::fmt::Debug for SqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlStore").finish_non_exhaustive()
    }
}
