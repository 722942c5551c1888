use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::types::{ExecutionLog, ExecutionStatus, JobStatistics};

/// Initialise the audit schema in `conn`.
///
/// Creates the `job_execution_logs` table (idempotent) and an index on
/// `(job_code, start_time)` for the per-job history query.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS job_execution_logs (
            id               TEXT    NOT NULL PRIMARY KEY,   -- run id, UUID v7
            job_code         TEXT    NOT NULL,
            base_date        TEXT    NOT NULL,               -- YYYY-MM-DD
            status           TEXT    NOT NULL,               -- COMPLETED | STOPPED | FAILED
            start_time       TEXT    NOT NULL,               -- RFC 3339
            end_time         TEXT    NOT NULL,
            processed_count  INTEGER NOT NULL DEFAULT 0,
            success_count    INTEGER NOT NULL DEFAULT 0,
            fail_count       INTEGER NOT NULL DEFAULT 0,
            error_message    TEXT,
            parameters       TEXT    NOT NULL DEFAULT '{}'   -- base parameters JSON
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_job_execution_logs_job
            ON job_execution_logs (job_code, start_time);
        ",
    )?;
    Ok(())
}

/// Append-only store of [`ExecutionLog`] rows.
pub struct ExecutionLogStore {
    conn: Connection,
}

impl ExecutionLogStore {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn record(&self, log: &ExecutionLog) -> Result<()> {
        self.conn.execute(
            "INSERT INTO job_execution_logs
                (id, job_code, base_date, status, start_time, end_time,
                 processed_count, success_count, fail_count, error_message, parameters)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                log.id,
                log.job_code,
                log.base_date,
                log.status.to_string(),
                log.start_time,
                log.end_time,
                log.processed_count as i64,
                log.success_count as i64,
                log.fail_count as i64,
                log.error_message,
                log.parameters,
            ],
        )?;
        info!(
            run_id = %log.id,
            job_code = %log.job_code,
            status = %log.status,
            "execution log recorded"
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<ExecutionLog>> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id],
                raw_row,
            )
            .optional()?;
        Ok(row.and_then(into_log))
    }

    /// Newest first. `job_code = None` lists every job.
    pub fn list_recent(&self, job_code: Option<&str>, limit: usize) -> Result<Vec<ExecutionLog>> {
        let limit = limit as i64;
        let rows: Vec<RawRow> = match job_code {
            Some(code) => {
                let mut stmt = self.conn.prepare_cached(&format!(
                    "{SELECT_COLUMNS} WHERE job_code = ?1 ORDER BY start_time DESC, id DESC LIMIT ?2"
                ))?;
                let rows = stmt
                    .query_map(params![code, limit], raw_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare_cached(&format!(
                    "{SELECT_COLUMNS} ORDER BY start_time DESC, id DESC LIMIT ?1"
                ))?;
                let rows = stmt
                    .query_map([limit], raw_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };

        let logs: Vec<ExecutionLog> = rows.into_iter().filter_map(into_log).collect();
        debug!(job_code = ?job_code, count = logs.len(), "execution logs listed");
        Ok(logs)
    }

    /// Run counts per job and status, ordered by job code.
    ///
    /// `since` keeps runs whose `start_time` sorts at or after it, so both a
    /// bare date (`2024-05-01`) and a full RFC 3339 timestamp work.
    pub fn statistics(&self, since: Option<&str>) -> Result<Vec<JobStatistics>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT job_code,
                    COUNT(*),
                    SUM(CASE WHEN status = 'COMPLETED' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN status = 'STOPPED' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN status = 'FAILED' THEN 1 ELSE 0 END),
                    SUM(processed_count),
                    SUM(success_count),
                    SUM(fail_count),
                    MAX(end_time)
             FROM job_execution_logs
             WHERE ?1 IS NULL OR start_time >= ?1
             GROUP BY job_code
             ORDER BY job_code",
        )?;
        let stats = stmt
            .query_map([since], |row| {
                let count = |i: usize| -> rusqlite::Result<u64> {
                    Ok(row.get::<_, i64>(i)?.max(0) as u64)
                };
                Ok(JobStatistics {
                    job_code: row.get(0)?,
                    run_count: count(1)?,
                    completed_count: count(2)?,
                    stopped_count: count(3)?,
                    failed_count: count(4)?,
                    processed_total: count(5)?,
                    success_total: count(6)?,
                    fail_total: count(7)?,
                    last_end_time: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(since = ?since, jobs = stats.len(), "execution statistics computed");
        Ok(stats)
    }
}

const SELECT_COLUMNS: &str = "SELECT id, job_code, base_date, status, start_time, end_time,
        processed_count, success_count, fail_count, error_message, parameters
     FROM job_execution_logs";

struct RawRow {
    id: String,
    job_code: String,
    base_date: String,
    status: String,
    start_time: String,
    end_time: String,
    processed_count: i64,
    success_count: i64,
    fail_count: i64,
    error_message: Option<String>,
    parameters: String,
}

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        job_code: row.get(1)?,
        base_date: row.get(2)?,
        status: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        processed_count: row.get(6)?,
        success_count: row.get(7)?,
        fail_count: row.get(8)?,
        error_message: row.get(9)?,
        parameters: row.get(10)?,
    })
}

/// Rows with an unreadable status are skipped with a warning.
fn into_log(raw: RawRow) -> Option<ExecutionLog> {
    let status = match raw.status.parse::<ExecutionStatus>() {
        Ok(s) => s,
        Err(e) => {
            warn!(run_id = %raw.id, error = %e, "skipping execution log with bad status");
            return None;
        }
    };
    Some(ExecutionLog {
        id: raw.id,
        job_code: raw.job_code,
        base_date: raw.base_date,
        status,
        start_time: raw.start_time,
        end_time: raw.end_time,
        processed_count: raw.processed_count.max(0) as u64,
        success_count: raw.success_count.max(0) as u64,
        fail_count: raw.fail_count.max(0) as u64,
        error_message: raw.error_message,
        parameters: raw.parameters,
    })
}
