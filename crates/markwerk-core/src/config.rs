// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration. The bubble layout is intentionally absent: it is
// supplied per batch by the caller.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{MarkwerkError, Result};

/// Settings for the image normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Width of the canonical sheet image in pixels.
    pub target_width: u32,
    /// Height of the canonical sheet image in pixels.
    pub target_height: u32,
    /// Gaussian sigma applied before boundary detection.
    pub blur_sigma: f32,
    /// Smallest acceptable sheet quadrilateral, as a fraction of the photo.
    pub min_sheet_area_fraction: f32,
    /// Minimum ratio of contour area to quadrilateral area. Rejects blobs
    /// that are not four-sided.
    pub min_quad_fill: f32,
    /// Radius of the morphological open/close applied to the boundary mask.
    /// Zero disables it.
    pub denoise_radius: u8,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            target_width: 800,
            target_height: 1000,
            blur_sigma: 1.5,
            min_sheet_area_fraction: 0.2,
            min_quad_fill: 0.85,
            denoise_radius: 1,
        }
    }
}

/// Fill-ratio thresholds for the mark classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Below this fill ratio a bubble is unmarked.
    pub low_fill: f32,
    /// At or above this fill ratio a bubble is marked.
    pub high_fill: f32,
    /// Upper bound for the per-sheet ink level derived from the histogram.
    pub ink_level_ceiling: u8,
    /// Minimum gap between mean ink and mean paper intensity. A sheet whose
    /// histogram splits more narrowly than this is treated as unmarked.
    pub min_ink_contrast: u8,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            low_fill: 0.15,
            high_fill: 0.30,
            ink_level_ceiling: 200,
            min_ink_contrast: 48,
        }
    }
}

/// Points awarded per question outcome. The default is one point per
/// correct answer and nothing else; `incorrect = -0.25` reproduces the
/// classic negative-marking scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub correct: f64,
    pub incorrect: f64,
    pub blank: f64,
    pub ambiguous: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            correct: 1.0,
            incorrect: 0.0,
            blank: 0.0,
            ambiguous: 0.0,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub normalize: NormalizeConfig,
    pub classifier: ClassifierThresholds,
    /// Smallest acceptable grid cell edge, in canonical pixels.
    pub min_cell_px: u32,
    pub scoring: ScoringPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeConfig::default(),
            classifier: ClassifierThresholds::default(),
            min_cell_px: 8,
            scoring: ScoringPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        debug!("pipeline configuration loaded");
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let n = &self.normalize;
        if n.target_width == 0 || n.target_height == 0 {
            return Err(MarkwerkError::Config(
                "canonical target size must be non-zero".into(),
            ));
        }
        if !(n.blur_sigma > 0.0) {
            return Err(MarkwerkError::Config(format!(
                "blur_sigma must be positive, got {}",
                n.blur_sigma
            )));
        }
        if !(0.0..=1.0).contains(&n.min_sheet_area_fraction) {
            return Err(MarkwerkError::Config(format!(
                "min_sheet_area_fraction must lie in [0, 1], got {}",
                n.min_sheet_area_fraction
            )));
        }
        if !(0.0..=1.0).contains(&n.min_quad_fill) {
            return Err(MarkwerkError::Config(format!(
                "min_quad_fill must lie in [0, 1], got {}",
                n.min_quad_fill
            )));
        }

        let c = &self.classifier;
        if !(0.0..=1.0).contains(&c.low_fill)
            || !(0.0..=1.0).contains(&c.high_fill)
            || c.low_fill > c.high_fill
        {
            return Err(MarkwerkError::Config(format!(
                "fill thresholds must satisfy 0 <= low ({}) <= high ({}) <= 1",
                c.low_fill, c.high_fill
            )));
        }
        Ok(())
    }
}
