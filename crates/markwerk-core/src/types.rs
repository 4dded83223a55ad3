// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Markwerk scoring pipeline.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::MarkwerkError;

/// Margin fraction used when a layout file omits one.
pub const DEFAULT_MARGIN: f32 = 0.2;

/// Identifier of a single answer sheet (usually the student ID or file stem).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SheetId(pub String);

impl SheetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SheetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// -- Layout -------------------------------------------------------------------

/// Bubble grid geometry for one batch: `rows` questions by `cols` options.
/// Fixed for the whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LayoutFields", into = "LayoutFields")]
pub struct BubbleLayout {
    rows: u32,
    cols: u32,
    margin: f32,
}

/// Unvalidated wire form of [`BubbleLayout`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayoutFields {
    rows: u32,
    cols: u32,
    #[serde(default = "default_margin")]
    margin: f32,
}

fn default_margin() -> f32 {
    DEFAULT_MARGIN
}

impl BubbleLayout {
    /// Build a layout, rejecting empty grids and margins that would swallow
    /// the whole cell.
    pub fn new(rows: u32, cols: u32, margin: f32) -> Result<Self, MarkwerkError> {
        if rows == 0 || cols == 0 {
            return Err(MarkwerkError::Layout(format!(
                "grid must have at least one row and column (got {rows}x{cols})"
            )));
        }
        if !(0.0..0.5).contains(&margin) {
            return Err(MarkwerkError::Layout(format!(
                "margin fraction must lie in [0, 0.5), got {margin}"
            )));
        }
        Ok(Self { rows, cols, margin })
    }

    /// Number of questions.
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of options (columns) per question.
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Fraction of each cell trimmed from every side before classification.
    pub fn margin(&self) -> f32 {
        self.margin
    }
}

impl TryFrom<LayoutFields> for BubbleLayout {
    type Error = MarkwerkError;

    fn try_from(fields: LayoutFields) -> Result<Self, Self::Error> {
        Self::new(fields.rows, fields.cols, fields.margin)
    }
}

impl From<BubbleLayout> for LayoutFields {
    fn from(layout: BubbleLayout) -> Self {
        Self {
            rows: layout.rows,
            cols: layout.cols,
            margin: layout.margin,
        }
    }
}

/// Orientation of the detected sheet in the source photograph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetOrientation {
    Portrait,
    Landscape,
}

// -- Marks --------------------------------------------------------------------

/// Per-bubble classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkState {
    /// Fill ratio below the low threshold.
    Unmarked,
    /// Fill ratio at or above the high threshold.
    Marked,
    /// Fill ratio between the two thresholds. Scored as unmarked, reported
    /// for review.
    Ambiguous,
}

/// Classification of one bubble plus the fill ratio that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellMark {
    pub state: MarkState,
    pub fill_ratio: f32,
}

impl CellMark {
    pub fn unmarked() -> Self {
        Self {
            state: MarkState::Unmarked,
            fill_ratio: 0.0,
        }
    }

    pub fn marked() -> Self {
        Self {
            state: MarkState::Marked,
            fill_ratio: 1.0,
        }
    }
}

/// The `rows x cols` decision matrix handed from the classifier to the scorer.
///
/// Rows are zero-based here; question numbers (`row + 1`) only appear once
/// the scorer pairs the matrix with an answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkMatrix {
    rows: usize,
    cols: usize,
    cells: Vec<CellMark>,
}

impl MarkMatrix {
    /// Wrap row-major cells. `cells.len()` must equal `rows * cols`.
    pub fn new(rows: usize, cols: usize, cells: Vec<CellMark>) -> Result<Self, MarkwerkError> {
        if rows == 0 || cols == 0 || cells.len() != rows * cols {
            return Err(MarkwerkError::Layout(format!(
                "mark matrix of {rows}x{cols} cannot hold {} cells",
                cells.len()
            )));
        }
        Ok(Self { rows, cols, cells })
    }

    /// Build a matrix from explicit selections, one column list per row.
    /// Listed columns are `Marked`, everything else `Unmarked`.
    pub fn from_selections(cols: usize, selections: &[Vec<usize>]) -> Result<Self, MarkwerkError> {
        let mut cells = vec![CellMark::unmarked(); selections.len() * cols];
        for (row, selected) in selections.iter().enumerate() {
            for &col in selected {
                if col >= cols {
                    return Err(MarkwerkError::Layout(format!(
                        "row {row} selects column {col} outside 0..{cols}"
                    )));
                }
                cells[row * cols + col] = CellMark::marked();
            }
        }
        Self::new(selections.len(), cols, cells)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Cell at `(row, col)`, or `None` when out of range.
    pub fn get(&self, row: usize, col: usize) -> Option<&CellMark> {
        if row < self.rows && col < self.cols {
            self.cells.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// All cells of one row.
    pub fn row(&self, row: usize) -> &[CellMark] {
        let start = (row * self.cols).min(self.cells.len());
        let end = (start + self.cols).min(self.cells.len());
        &self.cells[start..end]
    }

    /// Columns of `row` whose state is `Marked`.
    pub fn marked_columns(&self, row: usize) -> BTreeSet<usize> {
        self.columns_in_state(row, MarkState::Marked)
    }

    /// Columns of `row` whose state is `Ambiguous`.
    pub fn faint_columns(&self, row: usize) -> BTreeSet<usize> {
        self.columns_in_state(row, MarkState::Ambiguous)
    }

    fn columns_in_state(&self, row: usize, state: MarkState) -> BTreeSet<usize> {
        self.row(row)
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.state == state)
            .map(|(col, _)| col)
            .collect()
    }

    /// Summary counts over the whole matrix.
    pub fn statistics(&self) -> BubbleStatistics {
        let total_bubbles = self.cells.len();
        let marked_bubbles = self
            .cells
            .iter()
            .filter(|c| c.state == MarkState::Marked)
            .count();
        let faint_bubbles = self
            .cells
            .iter()
            .filter(|c| c.state == MarkState::Ambiguous)
            .count();

        let mut multiple_mark_rows = 0;
        let mut unmarked_rows = 0;
        for row in 0..self.rows {
            match self.marked_columns(row).len() {
                0 => unmarked_rows += 1,
                1 => {}
                _ => multiple_mark_rows += 1,
            }
        }

        BubbleStatistics {
            rows: self.rows,
            cols: self.cols,
            total_bubbles,
            marked_bubbles,
            faint_bubbles,
            fill_rate: if total_bubbles > 0 {
                marked_bubbles as f32 / total_bubbles as f32
            } else {
                0.0
            },
            multiple_mark_rows,
            unmarked_rows,
        }
    }
}

/// Aggregate counts describing one sheet's detected marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BubbleStatistics {
    pub rows: usize,
    pub cols: usize,
    pub total_bubbles: usize,
    pub marked_bubbles: usize,
    pub faint_bubbles: usize,
    /// `marked_bubbles / total_bubbles`.
    pub fill_rate: f32,
    /// Rows with more than one `Marked` cell.
    pub multiple_mark_rows: usize,
    /// Rows with no `Marked` cell.
    pub unmarked_rows: usize,
}

// -- Scoring ------------------------------------------------------------------

/// Outcome of one question after reconciling marks with the answer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionOutcome {
    Correct,
    Incorrect,
    Blank,
    Ambiguous,
}

impl QuestionOutcome {
    /// Blank and ambiguous answers go to manual review.
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Self::Blank | Self::Ambiguous)
    }
}

/// Per-question line of a score record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    /// One-based question number.
    pub question: u32,
    pub outcome: QuestionOutcome,
    /// Marked columns, ascending.
    pub selected: Vec<usize>,
}

/// Why a question was flagged for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyKind {
    /// No bubble marked.
    Blank,
    /// More bubbles marked than the key accepts.
    MultipleMarks { selected: Vec<usize> },
    /// A bubble filled between the thresholds; ignored for scoring.
    FaintMark { column: usize, fill_ratio: f32 },
}

/// A question flagged for manual review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub question: u32,
    #[serde(flatten)]
    pub kind: AnomalyKind,
}

/// Correct answers attributed to one category (subject).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub label: String,
    pub correct: u32,
}

/// Final result for one sheet. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub sheet_id: SheetId,
    pub questions: Vec<QuestionResult>,
    pub subtotals: Vec<CategoryScore>,
    /// Number of `Correct` questions.
    pub total_score: u32,
    /// Number of questions on the sheet.
    pub max_score: u32,
    /// Score under the configured weighting policy.
    pub weighted_score: f64,
    pub anomalies: Vec<Anomaly>,
}

impl ScoreRecord {
    /// `total_score / max_score` as a percentage.
    pub fn percentage(&self) -> f64 {
        if self.max_score == 0 {
            0.0
        } else {
            f64::from(self.total_score) / f64::from(self.max_score) * 100.0
        }
    }

    /// Count of questions with the given outcome.
    pub fn count(&self, outcome: QuestionOutcome) -> usize {
        self.questions.iter().filter(|q| q.outcome == outcome).count()
    }
}
