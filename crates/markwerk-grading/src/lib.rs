// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// markwerk-grading: answer keys, subject categories, and the scorer.

pub mod answer_key;
pub mod categories;
pub mod scorer;

pub use answer_key::AnswerKey;
pub use categories::{Category, CategoryMap};
pub use scorer::Scorer;
