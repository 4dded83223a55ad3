// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reconciles a sheet's mark matrix with the answer key.

use markwerk_core::error::{MarkwerkError, Result};
use markwerk_core::{
    Anomaly, AnomalyKind, CategoryScore, MarkMatrix, QuestionOutcome, QuestionResult, ScoreRecord,
    ScoringPolicy, SheetId,
};
use tracing::{debug, instrument};

use crate::answer_key::AnswerKey;
use crate::categories::CategoryMap;

/// Scores mark matrices against an answer key.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    policy: ScoringPolicy,
}

impl Scorer {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Score one sheet.
    ///
    /// Each row resolves, in order, to `Blank` (nothing marked), `Ambiguous`
    /// (more marks than the key accepts), then `Correct` or `Incorrect` by
    /// the subset rule. Faint cells never count as marks but are reported.
    /// Without a category map every column is its own category.
    #[instrument(skip_all, fields(sheet = %sheet_id))]
    pub fn score(
        &self,
        sheet_id: SheetId,
        matrix: &MarkMatrix,
        key: &AnswerKey,
        categories: Option<&CategoryMap>,
    ) -> Result<ScoreRecord> {
        let (rows, cols) = (key.rows() as usize, key.cols() as usize);
        if matrix.rows() != rows || matrix.cols() != cols {
            return Err(MarkwerkError::Layout(format!(
                "mark matrix is {}x{} but the answer key covers {rows}x{cols}",
                matrix.rows(),
                matrix.cols()
            )));
        }

        let default_map;
        let categories = match categories {
            Some(map) if map.cols() != cols => {
                return Err(MarkwerkError::Layout(format!(
                    "categories span {} columns but the sheet has {cols}",
                    map.cols()
                )));
            }
            Some(map) => map,
            None => {
                default_map = CategoryMap::per_column(cols);
                &default_map
            }
        };

        let mut questions = Vec::with_capacity(rows);
        let mut anomalies = Vec::new();
        let mut subtotals: Vec<CategoryScore> = categories
            .categories()
            .iter()
            .map(|c| CategoryScore {
                label: c.label.clone(),
                correct: 0,
            })
            .collect();
        let mut weighted_score = 0.0;

        for row in 0..rows {
            let question = row as u32 + 1;
            let selected = matrix.marked_columns(row);
            let accepted = key.correct_options(question);

            let outcome = if selected.is_empty() {
                QuestionOutcome::Blank
            } else if selected.len() > accepted.len() {
                QuestionOutcome::Ambiguous
            } else if key.is_correct_selection(question, &selected) {
                QuestionOutcome::Correct
            } else {
                QuestionOutcome::Incorrect
            };

            match outcome {
                QuestionOutcome::Blank => anomalies.push(Anomaly {
                    question,
                    kind: AnomalyKind::Blank,
                }),
                QuestionOutcome::Ambiguous => anomalies.push(Anomaly {
                    question,
                    kind: AnomalyKind::MultipleMarks {
                        selected: selected.iter().copied().collect(),
                    },
                }),
                QuestionOutcome::Correct => {
                    let slot = selected
                        .first()
                        .and_then(|col| categories.position_of(*col));
                    if let Some(slot) = slot {
                        subtotals[slot].correct += 1;
                    }
                }
                QuestionOutcome::Incorrect => {}
            }

            for column in matrix.faint_columns(row) {
                let fill_ratio = matrix.get(row, column).map_or(0.0, |c| c.fill_ratio);
                anomalies.push(Anomaly {
                    question,
                    kind: AnomalyKind::FaintMark { column, fill_ratio },
                });
            }

            weighted_score += self.weight(outcome);
            questions.push(QuestionResult {
                question,
                outcome,
                selected: selected.into_iter().collect(),
            });
        }

        let total_score = questions
            .iter()
            .filter(|q| q.outcome == QuestionOutcome::Correct)
            .count() as u32;

        debug!(
            total_score,
            max_score = rows,
            anomalies = anomalies.len(),
            "Sheet scored"
        );

        Ok(ScoreRecord {
            sheet_id,
            questions,
            subtotals,
            total_score,
            max_score: rows as u32,
            weighted_score,
            anomalies,
        })
    }

    fn weight(&self, outcome: QuestionOutcome) -> f64 {
        match outcome {
            QuestionOutcome::Correct => self.policy.correct,
            QuestionOutcome::Incorrect => self.policy.incorrect,
            QuestionOutcome::Blank => self.policy.blank,
            QuestionOutcome::Ambiguous => self.policy.ambiguous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markwerk_core::{BubbleLayout, CellMark, MarkState};

    fn key() -> AnswerKey {
        let layout = BubbleLayout::new(3, 4, 0.2).unwrap();
        AnswerKey::from_json_str(r#"{"1": [0], "2": [1, 2], "3": [0]}"#, &layout).unwrap()
    }

    fn outcomes(selections: &[Vec<usize>]) -> Vec<QuestionOutcome> {
        let matrix = MarkMatrix::from_selections(4, selections).unwrap();
        Scorer::default()
            .score(SheetId::new("s"), &matrix, &key(), None)
            .unwrap()
            .questions
            .iter()
            .map(|q| q.outcome)
            .collect()
    }

    #[test]
    fn worked_example() {
        use QuestionOutcome::*;

        assert_eq!(outcomes(&[vec![0], vec![1], vec![]]), [Correct, Correct, Blank]);
        assert_eq!(outcomes(&[vec![0], vec![1, 2], vec![0, 1]]), [Correct, Correct, Ambiguous]);
        assert_eq!(outcomes(&[vec![0], vec![0], vec![0]]), [Correct, Incorrect, Correct]);

        let matrix = MarkMatrix::from_selections(4, &[vec![0], vec![1], vec![]]).unwrap();
        let record = Scorer::default()
            .score(SheetId::new("s"), &matrix, &key(), None)
            .unwrap();
        assert_eq!(record.total_score, 2);
        assert_eq!(record.max_score, 3);
        assert_eq!(
            record.anomalies,
            vec![Anomaly {
                question: 3,
                kind: AnomalyKind::Blank
            }]
        );
    }

    #[test]
    fn three_marks_on_two_answer_question_is_ambiguous() {
        let o = outcomes(&[vec![0], vec![1, 2, 3], vec![0]]);
        assert_eq!(o[1], QuestionOutcome::Ambiguous);
    }

    #[test]
    fn subtotals_sum_to_total_when_categories_partition_columns() {
        let categories = CategoryMap::from_json_str(
            r#"[
                {"label": "Maths", "start": 0, "end": 2},
                {"label": "Physics", "start": 2, "end": 4}
            ]"#,
            4,
        )
        .unwrap();
        let matrix = MarkMatrix::from_selections(4, &[vec![0], vec![2], vec![0]]).unwrap();
        let record = Scorer::default()
            .score(SheetId::new("s"), &matrix, &key(), Some(&categories))
            .unwrap();

        let sum: u32 = record.subtotals.iter().map(|s| s.correct).sum();
        assert_eq!(sum, record.total_score);
        assert_eq!(record.subtotals[0].correct, 2);
        assert_eq!(record.subtotals[1].correct, 1);
    }

    #[test]
    fn faint_marks_are_ignored_but_reported() {
        let mut cells = vec![CellMark::unmarked(); 12];
        cells[0] = CellMark::marked();
        cells[5] = CellMark::marked();
        cells[8] = CellMark {
            state: MarkState::Ambiguous,
            fill_ratio: 0.2,
        };
        let matrix = MarkMatrix::new(3, 4, cells).unwrap();
        let record = Scorer::default()
            .score(SheetId::new("s"), &matrix, &key(), None)
            .unwrap();

        assert_eq!(record.questions[2].outcome, QuestionOutcome::Blank);
        assert!(record.anomalies.contains(&Anomaly {
            question: 3,
            kind: AnomalyKind::FaintMark {
                column: 0,
                fill_ratio: 0.2
            },
        }));
    }

    #[test]
    fn weighted_score_applies_policy() {
        let scorer = Scorer::new(ScoringPolicy {
            correct: 1.0,
            incorrect: -0.25,
            blank: 0.0,
            ambiguous: 0.0,
        });
        let matrix = MarkMatrix::from_selections(4, &[vec![0], vec![3], vec![]]).unwrap();
        let record = scorer.score(SheetId::new("s"), &matrix, &key(), None).unwrap();
        assert!((record.weighted_score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn dimension_mismatch_is_layout_error() {
        let matrix = MarkMatrix::from_selections(5, &[vec![0], vec![1], vec![]]).unwrap();
        let result = Scorer::default().score(SheetId::new("s"), &matrix, &key(), None);
        assert!(matches!(result, Err(MarkwerkError::Layout(_))));
    }
}
