// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// markwerk-vision: the image half of the sheet-to-score pipeline.
//
// Normalises a photographed answer sheet to a canonical perspective-corrected
// image, partitions it into bubble regions, and classifies each region from
// its ink fill ratio.

pub mod classify;
pub mod grid;
pub mod histogram;
pub mod normalize;

pub use classify::MarkClassifier;
pub use grid::{BubbleRegion, CellRect, GridSampler, RegionGrid};
pub use normalize::{CanonicalSheetImage, RawSheetImage, SheetNormalizer, SheetQuad};
