// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Durable result sink backed by SQLite.
//
// One row per sheet outcome, scored or failed. Question outcomes, subtotals
// and anomalies are stored as JSON columns; the source digest lets a caller
// spot the same photo submitted twice.

use std::path::Path;

use chrono::{DateTime, Utc};
use markwerk_core::error::{MarkwerkError, Result};
use markwerk_core::{Anomaly, CategoryScore, QuestionResult, SheetId};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::report::BatchReport;
use crate::runner::{SheetOutcome, SheetResult};

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS sheet_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id TEXT NOT NULL,
        sheet_id TEXT NOT NULL,
        set_label TEXT,
        source TEXT NOT NULL,
        digest TEXT,
        status TEXT NOT NULL,
        total_score INTEGER,
        max_score INTEGER,
        weighted_score REAL,
        outcomes TEXT NOT NULL DEFAULT '[]',
        subtotals TEXT NOT NULL DEFAULT '[]',
        anomalies TEXT NOT NULL DEFAULT '[]',
        error_kind TEXT,
        error_message TEXT,
        processed_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sheet_results_run ON sheet_results (run_id);
    CREATE INDEX IF NOT EXISTS idx_sheet_results_digest ON sheet_results (digest);
"#;

const SELECT_COLUMNS: &str = "SELECT run_id, sheet_id, set_label, source, digest, status,
        total_score, max_score, weighted_score, outcomes, subtotals, anomalies,
        error_kind, error_message, processed_at
 FROM sheet_results";

/// Whether a stored row holds a score or a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Scored,
    Failed,
}

impl ResultStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Scored => "scored",
            Self::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "scored" => Some(Self::Scored),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One persisted sheet outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub run_id: Uuid,
    pub sheet_id: SheetId,
    pub set_label: Option<String>,
    pub source: String,
    pub digest: Option<String>,
    pub status: ResultStatus,
    pub total_score: Option<u32>,
    pub max_score: Option<u32>,
    pub weighted_score: Option<f64>,
    pub outcomes: Vec<QuestionResult>,
    pub subtotals: Vec<CategoryScore>,
    pub anomalies: Vec<Anomaly>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub processed_at: DateTime<Utc>,
}

/// SQLite store of batch results.
pub struct ResultStore {
    conn: Connection,
}

impl ResultStore {
    /// Open (or create) the result database at `path`, in WAL mode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| db_err("open", e))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| db_err("WAL pragma", e))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| db_err("create table", e))?;

        info!("result database opened");
        Ok(Self { conn })
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| db_err("open in-memory", e))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| db_err("create table", e))?;

        debug!("in-memory result database opened");
        Ok(Self { conn })
    }

    /// Persist one sheet outcome of run `run_id`.
    #[instrument(skip(self, outcome), fields(sheet = %outcome.sheet_id))]
    pub fn record_outcome(
        &self,
        run_id: &Uuid,
        set_label: Option<&str>,
        outcome: &SheetOutcome,
    ) -> Result<()> {
        insert_outcome(&self.conn, run_id, set_label, outcome)
    }

    /// Persist every outcome of a batch in one transaction.
    #[instrument(skip_all, fields(run_id = %report.run_id, sheets = report.outcomes.len()))]
    pub fn record_report(&mut self, report: &BatchReport) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| db_err("begin transaction", e))?;
        for outcome in &report.outcomes {
            insert_outcome(&tx, &report.run_id, report.set_label.as_deref(), outcome)?;
        }
        tx.commit().map_err(|e| db_err("commit", e))?;

        info!("batch results stored");
        Ok(())
    }

    /// Results of one run, in insertion order.
    pub fn results_for_run(&self, run_id: &Uuid) -> Result<Vec<StoredResult>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE run_id = ?1 ORDER BY id ASC"),
            params![run_id.to_string()],
        )
    }

    /// Every stored result, newest first.
    pub fn all_results(&self) -> Result<Vec<StoredResult>> {
        self.query(&format!("{SELECT_COLUMNS} ORDER BY id DESC"), [])
    }

    /// Earlier results for a photo with this SHA-256 digest.
    pub fn results_with_digest(&self, digest: &str) -> Result<Vec<StoredResult>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE digest = ?1 ORDER BY id ASC"),
            params![digest],
        )
    }

    /// Delete every result of a run. Returns the number of rows removed.
    #[instrument(skip(self), fields(run_id = %run_id))]
    pub fn delete_run(&self, run_id: &Uuid) -> Result<usize> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM sheet_results WHERE run_id = ?1",
                params![run_id.to_string()],
            )
            .map_err(|e| db_err("delete run", e))?;

        info!(removed, "run deleted");
        Ok(removed)
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<StoredResult>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| db_err("prepare query", e))?;
        let results = stmt
            .query_map(params, row_to_result)
            .map_err(|e| db_err("query", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| db_err("collect rows", e))?;

        debug!(count = results.len(), "results retrieved");
        Ok(results)
    }
}

fn insert_outcome(
    conn: &Connection,
    run_id: &Uuid,
    set_label: Option<&str>,
    outcome: &SheetOutcome,
) -> Result<()> {
    let (status, total, max, weighted, outcomes, subtotals, anomalies, kind, message) =
        match &outcome.result {
            SheetResult::Scored(record) => (
                ResultStatus::Scored,
                Some(record.total_score),
                Some(record.max_score),
                Some(record.weighted_score),
                serde_json::to_string(&record.questions)?,
                serde_json::to_string(&record.subtotals)?,
                serde_json::to_string(&record.anomalies)?,
                None,
                None,
            ),
            SheetResult::Failed(failure) => (
                ResultStatus::Failed,
                None,
                None,
                None,
                "[]".to_owned(),
                "[]".to_owned(),
                "[]".to_owned(),
                Some(failure.kind.as_str()),
                Some(failure.message.as_str()),
            ),
        };

    conn.execute(
        "INSERT INTO sheet_results (run_id, sheet_id, set_label, source, digest,
         status, total_score, max_score, weighted_score, outcomes, subtotals,
         anomalies, error_kind, error_message, processed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            run_id.to_string(),
            outcome.sheet_id.as_str(),
            set_label,
            outcome.source,
            outcome.digest,
            status.as_str(),
            total,
            max,
            weighted,
            outcomes,
            subtotals,
            anomalies,
            kind,
            message,
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| db_err("insert result", e))?;

    debug!(sheet = %outcome.sheet_id, status = status.as_str(), "sheet outcome stored");
    Ok(())
}

fn db_err(action: &str, e: rusqlite::Error) -> MarkwerkError {
    MarkwerkError::Database(format!("{action}: {e}"))
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_error(
    index: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
}

/// Map a row selected with `SELECT_COLUMNS` to a `StoredResult`.
fn row_to_result(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredResult> {
    let run_id: String = row.get(0)?;
    let status: String = row.get(5)?;
    let outcomes: String = row.get(9)?;
    let subtotals: String = row.get(10)?;
    let anomalies: String = row.get(11)?;
    let processed_at: String = row.get(14)?;

    Ok(StoredResult {
        run_id: Uuid::parse_str(&run_id).map_err(|e| conversion_error(0, e))?,
        sheet_id: SheetId::new(row.get::<_, String>(1)?),
        set_label: row.get(2)?,
        source: row.get(3)?,
        digest: row.get(4)?,
        status: ResultStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(5, status.clone(), rusqlite::types::Type::Text)
        })?,
        total_score: row.get(6)?,
        max_score: row.get(7)?,
        weighted_score: row.get(8)?,
        outcomes: serde_json::from_str(&outcomes).map_err(|e| conversion_error(9, e))?,
        subtotals: serde_json::from_str(&subtotals).map_err(|e| conversion_error(10, e))?,
        anomalies: serde_json::from_str(&anomalies).map_err(|e| conversion_error(11, e))?,
        error_kind: row.get(12)?,
        error_message: row.get(13)?,
        processed_at: DateTime::parse_from_rfc3339(&processed_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(14, e))?,
    })
}
