// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Column ranges attributed to named subjects for per-category subtotals.

use std::path::Path;

use markwerk_core::error::{MarkwerkError, Result};
use serde::{Deserialize, Serialize};

/// A named, half-open column range `start..end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub label: String,
    pub start: usize,
    pub end: usize,
}

impl Category {
    pub fn contains(&self, column: usize) -> bool {
        (self.start..self.end).contains(&column)
    }
}

/// Non-overlapping categories over the columns of a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMap {
    cols: usize,
    categories: Vec<Category>,
}

impl CategoryMap {
    pub fn new(cols: usize, categories: Vec<Category>) -> Result<Self> {
        let mut claimed = vec![false; cols];
        for category in &categories {
            if category.label.trim().is_empty() {
                return Err(MarkwerkError::Config("category label is empty".into()));
            }
            if category.start >= category.end || category.end > cols {
                return Err(MarkwerkError::Config(format!(
                    "category \"{}\" covers columns {}..{}, outside 0..{cols}",
                    category.label, category.start, category.end
                )));
            }
            for slot in &mut claimed[category.start..category.end] {
                if *slot {
                    return Err(MarkwerkError::Config(format!(
                        "category \"{}\" overlaps another category",
                        category.label
                    )));
                }
                *slot = true;
            }
        }
        Ok(Self { cols, categories })
    }

    /// One category per column, labelled `Subject_1`, `Subject_2`, ...
    pub fn per_column(cols: usize) -> Self {
        let categories = (0..cols)
            .map(|c| Category {
                label: format!("Subject_{}", c + 1),
                start: c,
                end: c + 1,
            })
            .collect();
        Self { cols, categories }
    }

    /// Parse a JSON list of `{"label", "start", "end"}` objects.
    pub fn from_json_str(json: &str, cols: usize) -> Result<Self> {
        let categories: Vec<Category> = serde_json::from_str(json)?;
        Self::new(cols, categories)
    }

    pub fn load(path: impl AsRef<Path>, cols: usize) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json, cols)
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Index of the category holding `column`, if any.
    pub fn position_of(&self, column: usize) -> Option<usize> {
        self.categories.iter().position(|c| c.contains(column))
    }
}
