// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-sheet composition: Normalizer -> Grid Sampler -> Mark Classifier ->
// Scorer.

use markwerk_core::error::{MarkwerkError, Result};
use markwerk_core::{
    BubbleLayout, BubbleStatistics, MarkMatrix, PipelineConfig, ScoreRecord, SheetId,
    SheetOrientation,
};
use markwerk_grading::{AnswerKey, CategoryMap, Scorer};
use markwerk_vision::{GridSampler, MarkClassifier, RawSheetImage, SheetNormalizer, SheetQuad};
use serde::Serialize;
use tracing::{info, instrument};

/// Everything the vision stages found on one sheet, without scoring.
#[derive(Debug, Clone, Serialize)]
pub struct SheetInspection {
    pub sheet_id: SheetId,
    pub orientation: SheetOrientation,
    pub quad: SheetQuad,
    pub ink_level: Option<u8>,
    pub matrix: MarkMatrix,
    pub statistics: BubbleStatistics,
}

/// The full sheet-to-score pipeline for one batch layout.
///
/// Holds no per-sheet state, so one instance is shared by every worker.
#[derive(Debug, Clone)]
pub struct SheetPipeline {
    config: PipelineConfig,
    layout: BubbleLayout,
    normalizer: SheetNormalizer,
    sampler: GridSampler,
    scorer: Scorer,
}

impl SheetPipeline {
    pub fn new(config: PipelineConfig, layout: BubbleLayout) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            normalizer: SheetNormalizer::new(config.normalize.clone()),
            sampler: GridSampler::new(config.min_cell_px),
            scorer: Scorer::new(config.scoring.clone()),
            config,
            layout,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &BubbleLayout {
        &self.layout
    }

    /// Normalise, sample and classify a sheet.
    #[instrument(skip_all, fields(sheet = %raw.id()))]
    pub fn inspect(&self, raw: &RawSheetImage) -> Result<SheetInspection> {
        let sheet = self.normalizer.normalize(raw)?;
        let classifier = MarkClassifier::calibrate(&sheet, self.config.classifier.clone());
        let grid = self.sampler.sample(&sheet, &self.layout)?;
        let matrix = classifier.classify_grid(&grid)?;

        Ok(SheetInspection {
            sheet_id: raw.id().clone(),
            orientation: sheet.quad().orientation(),
            quad: *sheet.quad(),
            ink_level: classifier.ink_level(),
            statistics: matrix.statistics(),
            matrix,
        })
    }

    /// Run every stage and score the sheet against `key`.
    #[instrument(skip_all, fields(sheet = %raw.id()))]
    pub fn process(
        &self,
        raw: &RawSheetImage,
        key: &AnswerKey,
        categories: Option<&CategoryMap>,
    ) -> Result<ScoreRecord> {
        if key.rows() != self.layout.rows() || key.cols() != self.layout.cols() {
            return Err(MarkwerkError::Layout(format!(
                "answer key covers {}x{} but the layout is {}x{}",
                key.rows(),
                key.cols(),
                self.layout.rows(),
                self.layout.cols()
            )));
        }

        let inspection = self.inspect(raw)?;
        let record = self
            .scorer
            .score(raw.id().clone(), &inspection.matrix, key, categories)?;
        info!(
            total = record.total_score,
            max = record.max_score,
            anomalies = record.anomalies.len(),
            "Sheet processed"
        );
        Ok(record)
    }
}
