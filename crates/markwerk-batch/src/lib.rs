// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// markwerk-batch: runs the sheet-to-score pipeline over a batch of photos
// and keeps the results.
//
// Sheets are processed in parallel on a rayon pool. Each sheet yields either
// a score record or a failure entry; results can be exported as a JSON
// report and persisted in a SQLite store.

pub mod integrity;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod store;

#[cfg(test)]
pub(crate) mod fixtures;

pub use pipeline::{SheetInspection, SheetPipeline};
pub use report::{BatchReport, BatchSummary};
pub use runner::{BatchRunner, SheetFailure, SheetInput, SheetOutcome, SheetResult, SheetSource};
pub use store::{ResultStatus, ResultStore, StoredResult};
