// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

pub mod normalizer;
pub mod quad;
pub mod sheet;

pub use normalizer::SheetNormalizer;
pub use quad::SheetQuad;
pub use sheet::{CanonicalSheetImage, RawSheetImage};
