// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch-level report and summary statistics.

use markwerk_core::error::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::runner::SheetOutcome;

/// Aggregate figures for one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_sheets: usize,
    pub scored: usize,
    pub failed: usize,
    /// Percentage of sheets that were scored.
    pub success_rate: f64,
    pub average_score: Option<f64>,
    pub highest_score: Option<u32>,
    pub lowest_score: Option<u32>,
    /// Questions flagged for review across all scored sheets.
    pub anomaly_count: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[SheetOutcome]) -> Self {
        let records: Vec<_> = outcomes.iter().filter_map(SheetOutcome::record).collect();
        let totals: Vec<u32> = records.iter().map(|r| r.total_score).collect();

        let total_sheets = outcomes.len();
        let scored = records.len();
        let average_score = if totals.is_empty() {
            None
        } else {
            Some(totals.iter().map(|t| f64::from(*t)).sum::<f64>() / totals.len() as f64)
        };

        Self {
            total_sheets,
            scored,
            failed: total_sheets - scored,
            success_rate: if total_sheets == 0 {
                0.0
            } else {
                scored as f64 / total_sheets as f64 * 100.0
            },
            average_score,
            highest_score: totals.iter().copied().max(),
            lowest_score: totals.iter().copied().min(),
            anomaly_count: records.iter().map(|r| r.anomalies.len()).sum(),
        }
    }
}

/// Everything produced by one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub set_label: Option<String>,
    /// One entry per input sheet, in input order.
    pub outcomes: Vec<SheetOutcome>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
