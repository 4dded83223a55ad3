// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Answer keys: question number -> non-empty set of accepted columns.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use markwerk_core::error::{MarkwerkError, Result};
use markwerk_core::BubbleLayout;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Validated answer key for one batch.
///
/// Questions are one-based (`1..=rows`), columns zero-based (`0..cols`).
/// Every question in range has at least one accepted column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerKey {
    rows: u32,
    cols: u32,
    answers: BTreeMap<u32, BTreeSet<usize>>,
}

/// One question's entry as written in a key file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeyEntry {
    /// `{"Subject_1": 1, "Subject_2": 0}`: flag 1 marks column `n - 1`.
    Flags(BTreeMap<String, i64>),
    /// `[0, 2]` or `["A", "C"]`.
    Options(Vec<KeyOption>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeyOption {
    Index(usize),
    Letter(String),
}

impl AnswerKey {
    /// Build a key from already-parsed answers, enforcing every invariant.
    pub fn new(layout: &BubbleLayout, answers: BTreeMap<u32, BTreeSet<usize>>) -> Result<Self> {
        let (rows, cols) = (layout.rows(), layout.cols());

        if let Some((&q, _)) = answers.iter().find(|(q, _)| **q == 0 || **q > rows) {
            return Err(MarkwerkError::KeyFormat(format!(
                "question {q} is outside 1..={rows}"
            )));
        }
        for q in 1..=rows {
            let Some(options) = answers.get(&q) else {
                return Err(MarkwerkError::KeyFormat(format!("question Q{q} is missing")));
            };
            if options.is_empty() {
                return Err(MarkwerkError::KeyFormat(format!(
                    "question Q{q} has no correct option"
                )));
            }
            if let Some(col) = options.iter().find(|c| **c >= cols as usize) {
                return Err(MarkwerkError::KeyFormat(format!(
                    "question Q{q} accepts column {col}, outside 0..{cols}"
                )));
            }
        }

        Ok(Self { rows, cols, answers })
    }

    /// Parse a key from JSON text.
    ///
    /// Question names may be `"Q<n>"` or `"<n>"`. Entries may be the legacy
    /// flag map, a list of column indices, or a list of option letters.
    pub fn from_json_str(json: &str, layout: &BubbleLayout) -> Result<Self> {
        let raw: BTreeMap<String, KeyEntry> = serde_json::from_str(json)
            .map_err(|e| MarkwerkError::KeyFormat(format!("not a key mapping: {e}")))?;

        let mut answers = BTreeMap::new();
        for (name, entry) in raw {
            let q = parse_question(&name)?;
            let options = match entry {
                KeyEntry::Flags(flags) => parse_flags(q, &flags)?,
                KeyEntry::Options(options) => options
                    .iter()
                    .map(|option| parse_option(q, option))
                    .collect::<Result<BTreeSet<usize>>>()?,
            };
            if answers.insert(q, options).is_some() {
                return Err(MarkwerkError::KeyFormat(format!(
                    "question Q{q} is listed twice"
                )));
            }
        }

        Self::new(layout, answers)
    }

    /// Load a key from a JSON file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>, layout: &BubbleLayout) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let key = Self::from_json_str(&json, layout)?;
        debug!(questions = key.rows, "answer key loaded");
        Ok(key)
    }

    /// Deterministic key with one correct option per question,
    /// column `(q - 1) mod cols`.
    pub fn sample(layout: &BubbleLayout) -> Self {
        let cols = layout.cols();
        let answers = (1..=layout.rows())
            .map(|q| (q, BTreeSet::from([((q - 1) % cols) as usize])))
            .collect();
        Self {
            rows: layout.rows(),
            cols,
            answers,
        }
    }

    /// Serialize in option-list form, `{"1": [0], "2": [1, 3], ...}`.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.answers)?)
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Accepted columns for `question`; empty when out of range.
    pub fn correct_options(&self, question: u32) -> &BTreeSet<usize> {
        static NONE: BTreeSet<usize> = BTreeSet::new();
        self.answers.get(&question).unwrap_or(&NONE)
    }

    /// A selection is correct iff it is a non-empty subset of the accepted
    /// options.
    pub fn is_correct_selection(&self, question: u32, selected: &BTreeSet<usize>) -> bool {
        !selected.is_empty() && selected.is_subset(self.correct_options(question))
    }
}

fn parse_question(name: &str) -> Result<u32> {
    let digits = name
        .trim()
        .strip_prefix(['Q', 'q'])
        .unwrap_or(name.trim());
    match digits.parse::<u32>() {
        Ok(q) if q > 0 => Ok(q),
        _ => Err(MarkwerkError::KeyFormat(format!(
            "\"{name}\" is not a question number"
        ))),
    }
}

fn parse_flags(q: u32, flags: &BTreeMap<String, i64>) -> Result<BTreeSet<usize>> {
    let mut options = BTreeSet::new();
    for (column, &flag) in flags {
        let index = column
            .rsplit('_')
            .next()
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                MarkwerkError::KeyFormat(format!(
                    "Q{q}: \"{column}\" does not end in a column number"
                ))
            })?;
        match flag {
            0 => {}
            1 => {
                options.insert(index - 1);
            }
            other => {
                return Err(MarkwerkError::KeyFormat(format!(
                    "Q{q}: flag for \"{column}\" must be 0 or 1, got {other}"
                )));
            }
        }
    }
    Ok(options)
}

fn parse_option(q: u32, option: &KeyOption) -> Result<usize> {
    match option {
        KeyOption::Index(index) => Ok(*index),
        KeyOption::Letter(letter) => {
            let mut chars = letter.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => {
                    Ok((c.to_ascii_uppercase() as u8 - b'A') as usize)
                }
                _ => Err(MarkwerkError::KeyFormat(format!(
                    "Q{q}: \"{letter}\" is not an option letter"
                ))),
            }
        }
    }
}
