// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parallel batch runner.
//
// Sheets are independent, so the batch is a plain parallel map over the
// inputs. A failing sheet becomes a `Failed` entry in its own slot; it never
// aborts the run or disturbs another sheet's result.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use markwerk_core::error::{MarkwerkError, Result};
use markwerk_core::human_errors::humanize_error;
use markwerk_core::{ScoreRecord, SheetId};
use markwerk_grading::{AnswerKey, CategoryMap};
use markwerk_vision::RawSheetImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::integrity::hash_bytes;
use crate::pipeline::SheetPipeline;
use crate::report::{BatchReport, BatchSummary};

/// Where a sheet's encoded image comes from.
#[derive(Debug, Clone)]
pub enum SheetSource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// One sheet queued for a batch.
#[derive(Debug, Clone)]
pub struct SheetInput {
    pub id: SheetId,
    pub source: SheetSource,
}

impl SheetInput {
    /// A sheet read from disk, identified by its file stem and prefixed with
    /// the answer-key set when one is given (`SET1_alice`).
    pub fn from_path(path: impl Into<PathBuf>, set_label: Option<&str>) -> Self {
        let path = path.into();
        Self {
            id: sheet_id_for(&path, set_label),
            source: SheetSource::File(path),
        }
    }

    pub fn from_bytes(id: SheetId, bytes: Vec<u8>) -> Self {
        Self {
            id,
            source: SheetSource::Bytes(bytes),
        }
    }

    /// Human-readable origin, stored with the result.
    pub fn describe(&self) -> String {
        match &self.source {
            SheetSource::File(path) => path.display().to_string(),
            SheetSource::Bytes(_) => "<memory>".into(),
        }
    }
}

/// Upper-cased set label with whitespace removed: `"Set 1"` -> `"SET1"`.
pub fn set_prefix(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

fn sheet_id_for(path: &Path, set_label: Option<&str>) -> SheetId {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    match set_label.map(set_prefix).filter(|p| !p.is_empty()) {
        Some(prefix) => SheetId::new(format!("{prefix}_{stem}")),
        None => SheetId::new(stem),
    }
}

/// Why a sheet could not be scored, in stored and displayable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetFailure {
    /// Stable error tag (`"geometry"`, `"decode"`, ...).
    pub kind: String,
    pub message: String,
    pub suggestion: String,
    /// Whether a new photo of the same sheet may succeed.
    pub resubmit: bool,
}

impl SheetFailure {
    pub fn from_error(err: &MarkwerkError) -> Self {
        let human = humanize_error(err);
        Self {
            kind: err.kind().to_owned(),
            message: err.to_string(),
            suggestion: human.suggestion,
            resubmit: human.resubmit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SheetResult {
    Scored(ScoreRecord),
    Failed(SheetFailure),
}

/// The result slot for one input sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetOutcome {
    pub sheet_id: SheetId,
    pub source: String,
    /// SHA-256 of the encoded image, when it could be read.
    pub digest: Option<String>,
    pub result: SheetResult,
}

impl SheetOutcome {
    pub fn record(&self) -> Option<&ScoreRecord> {
        match &self.result {
            SheetResult::Scored(record) => Some(record),
            SheetResult::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&SheetFailure> {
        match &self.result {
            SheetResult::Scored(_) => None,
            SheetResult::Failed(failure) => Some(failure),
        }
    }
}

/// Scores a batch of sheets against one answer key.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    pipeline: SheetPipeline,
    key: AnswerKey,
    categories: Option<CategoryMap>,
    set_label: Option<String>,
}

impl BatchRunner {
    /// Fails with `Layout` when the key or categories do not match the
    /// pipeline's layout, before any sheet is touched.
    pub fn new(
        pipeline: SheetPipeline,
        key: AnswerKey,
        categories: Option<CategoryMap>,
    ) -> Result<Self> {
        let layout = pipeline.layout();
        if key.rows() != layout.rows() || key.cols() != layout.cols() {
            return Err(MarkwerkError::Layout(format!(
                "answer key covers {}x{} but the layout is {}x{}",
                key.rows(),
                key.cols(),
                layout.rows(),
                layout.cols()
            )));
        }
        if let Some(map) = &categories {
            if map.cols() != layout.cols() as usize {
                return Err(MarkwerkError::Layout(format!(
                    "categories span {} columns but the layout has {}",
                    map.cols(),
                    layout.cols()
                )));
            }
        }
        Ok(Self {
            pipeline,
            key,
            categories,
            set_label: None,
        })
    }

    /// Tag every result of this runner with an answer-key set label.
    pub fn with_set_label(mut self, label: impl Into<String>) -> Self {
        self.set_label = Some(label.into());
        self
    }

    pub fn set_label(&self) -> Option<&str> {
        self.set_label.as_deref()
    }

    /// Process every input on the current rayon pool. Outcomes keep input
    /// order and there is exactly one per input.
    #[instrument(skip_all, fields(sheets = inputs.len()))]
    pub fn run(&self, inputs: &[SheetInput]) -> BatchReport {
        let run_id = Uuid::new_v4();
        info!(%run_id, threads = rayon::current_num_threads(), "Batch started");

        let outcomes: Vec<SheetOutcome> = inputs
            .par_iter()
            .map(|input| self.process_one(input))
            .collect();

        let summary = BatchSummary::from_outcomes(&outcomes);
        info!(
            %run_id,
            scored = summary.scored,
            failed = summary.failed,
            "Batch finished"
        );

        BatchReport {
            run_id,
            set_label: self.set_label.clone(),
            outcomes,
            summary,
        }
    }

    fn process_one(&self, input: &SheetInput) -> SheetOutcome {
        let bytes: Result<Cow<'_, [u8]>> = match &input.source {
            SheetSource::File(path) => std::fs::read(path).map(Cow::Owned).map_err(Into::into),
            SheetSource::Bytes(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
        };

        let mut digest = None;
        let result = bytes.and_then(|bytes| {
            digest = Some(hash_bytes(&bytes));
            let raw = RawSheetImage::from_bytes(input.id.clone(), &bytes)?;
            self.pipeline
                .process(&raw, &self.key, self.categories.as_ref())
        });

        let result = match result {
            Ok(record) => SheetResult::Scored(record),
            Err(err) => {
                warn!(sheet = %input.id, kind = err.kind(), error = %err, "Sheet failed");
                SheetResult::Failed(SheetFailure::from_error(&err))
            }
        };

        SheetOutcome {
            sheet_id: input.id.clone(),
            source: input.describe(),
            digest,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{png_bytes, sheet_photo};
    use image::{GrayImage, Luma};
    use markwerk_core::{BubbleLayout, PipelineConfig};

    fn runner() -> BatchRunner {
        let layout = BubbleLayout::new(4, 3, 0.2).unwrap();
        let key =
            AnswerKey::from_json_str(r#"{"1": [0], "2": [1], "3": [2], "4": [0]}"#, &layout)
                .unwrap();
        let pipeline = SheetPipeline::new(PipelineConfig::default(), layout).unwrap();
        BatchRunner::new(pipeline, key, None).unwrap()
    }

    fn good_sheet(id: &str, selections: &[Vec<usize>]) -> SheetInput {
        SheetInput::from_bytes(SheetId::new(id), png_bytes(&sheet_photo(4, 3, selections)))
    }

    #[test]
    fn failing_sheets_do_not_disturb_the_batch() {
        let all_right = [vec![0], vec![1], vec![2], vec![0]];
        let half_right = [vec![0], vec![1], vec![0], vec![1]];
        let no_sheet = png_bytes(&GrayImage::from_pixel(300, 300, Luma([90u8])));

        let alone = runner().run(&[good_sheet("a", &all_right)]);

        let inputs = vec![
            good_sheet("a", &all_right),
            SheetInput::from_bytes(SheetId::new("blank"), no_sheet),
            SheetInput::from_bytes(SheetId::new("junk"), b"not a photo".to_vec()),
            good_sheet("b", &half_right),
        ];
        let report = runner().run(&inputs);

        assert_eq!(report.outcomes.len(), inputs.len());
        assert_eq!(report.outcomes[0].record(), alone.outcomes[0].record());
        assert_eq!(report.outcomes[0].record().unwrap().total_score, 4);
        assert_eq!(report.outcomes[1].failure().unwrap().kind, "geometry");
        assert!(report.outcomes[1].failure().unwrap().resubmit);
        assert_eq!(report.outcomes[2].failure().unwrap().kind, "decode");
        assert_eq!(report.outcomes[3].record().unwrap().total_score, 2);

        assert_eq!(report.summary.total_sheets, 4);
        assert_eq!(report.summary.scored, 2);
        assert_eq!(report.summary.failed, 2);
    }

    #[test]
    fn repeated_runs_are_byte_identical() {
        let inputs = vec![
            good_sheet("a", &[vec![0], vec![1], vec![], vec![1, 2]]),
            good_sheet("b", &[vec![2], vec![1], vec![0], vec![0]]),
        ];
        let first = runner().run(&inputs);
        let second = runner().run(&inputs);

        assert_eq!(
            serde_json::to_vec(&first.outcomes).unwrap(),
            serde_json::to_vec(&second.outcomes).unwrap()
        );
        assert_ne!(first.run_id, second.run_id);
    }

    #[test]
    fn file_inputs_are_read_and_fingerprinted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.png");
        let bytes = png_bytes(&sheet_photo(4, 3, &[vec![0], vec![1], vec![2], vec![0]]));
        std::fs::write(&path, &bytes).unwrap();

        let input = SheetInput::from_path(&path, Some("Set 1"));
        assert_eq!(input.id.as_str(), "SET1_alice");

        let report = runner().with_set_label("Set 1").run(&[input]);
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.digest.as_deref(), Some(hash_bytes(&bytes).as_str()));
        assert_eq!(outcome.record().unwrap().sheet_id.as_str(), "SET1_alice");
        assert_eq!(report.set_label.as_deref(), Some("Set 1"));
    }

    #[test]
    fn missing_file_is_an_io_failure() {
        let input = SheetInput::from_path("/nonexistent/bob.jpg", None);
        let report = runner().run(&[input]);
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.sheet_id.as_str(), "bob");
        assert_eq!(outcome.digest, None);
        assert_eq!(outcome.failure().unwrap().kind, "io");
    }

    #[test]
    fn mismatched_key_is_rejected_up_front() {
        let layout = BubbleLayout::new(4, 3, 0.2).unwrap();
        let pipeline = SheetPipeline::new(PipelineConfig::default(), layout).unwrap();
        let key = AnswerKey::sample(&BubbleLayout::new(4, 5, 0.2).unwrap());
        assert!(matches!(
            BatchRunner::new(pipeline, key, None),
            Err(MarkwerkError::Layout(_))
        ));
    }

    #[test]
    fn set_prefix_strips_spaces() {
        assert_eq!(set_prefix("Set 2"), "SET2");
        assert_eq!(set_prefix("  "), "");
    }
}
