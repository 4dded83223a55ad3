// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-bubble mark classification from ink fill ratios.

use image::GrayImage;
use imageproc::stats::histogram;
use markwerk_core::error::MarkwerkError;
use markwerk_core::{CellMark, ClassifierThresholds, MarkMatrix, MarkState};
use tracing::{debug, instrument};

use crate::grid::{BubbleRegion, RegionGrid};
use crate::histogram::otsu_split;
use crate::normalize::CanonicalSheetImage;

/// Classifies bubble regions as marked or not.
///
/// The ink level is derived once per sheet from the global histogram, so a
/// dim photo and a bright one of the same sheet classify alike. Pixels at or
/// below the level count as ink.
#[derive(Debug, Clone)]
pub struct MarkClassifier {
    ink_level: Option<u8>,
    thresholds: ClassifierThresholds,
}

impl MarkClassifier {
    /// Derive the ink level of a canonical sheet.
    ///
    /// The split is taken on the sheet's intensities before equalisation,
    /// where ink and paper still differ by their true contrast, and then
    /// moved into the equalised intensities the regions are cut from.
    #[instrument(skip_all, fields(sheet = %sheet.id()))]
    pub fn calibrate(sheet: &CanonicalSheetImage, thresholds: ClassifierThresholds) -> Self {
        let tone = sheet.tone();
        let raw_level = ink_split(tone.histogram(), &thresholds);
        let ink_level = raw_level.map(|level| tone.equalized(level));
        debug!(?raw_level, ?ink_level, "Classifier calibrated");
        Self {
            ink_level,
            thresholds,
        }
    }

    /// Derive the ink level from a grayscale sheet image as is.
    #[instrument(skip_all)]
    pub fn calibrate_image(image: &GrayImage, thresholds: ClassifierThresholds) -> Self {
        let ink_level = ink_split(&histogram(image).channels[0], &thresholds);
        debug!(?ink_level, "Classifier calibrated");
        Self {
            ink_level,
            thresholds,
        }
    }

    /// Use a fixed ink level instead of a calibrated one.
    pub fn with_ink_level(ink_level: u8, thresholds: ClassifierThresholds) -> Self {
        Self {
            ink_level: Some(ink_level),
            thresholds,
        }
    }

    pub fn ink_level(&self) -> Option<u8> {
        self.ink_level
    }

    /// Fraction of ink pixels in `pixels`. Empty regions have no ink.
    pub fn fill_ratio(&self, pixels: &GrayImage) -> f32 {
        let Some(level) = self.ink_level else {
            return 0.0;
        };
        let total = pixels.width() as u64 * pixels.height() as u64;
        if total == 0 {
            return 0.0;
        }
        let ink = pixels.pixels().filter(|p| p.0[0] <= level).count() as u64;
        ink as f32 / total as f32
    }

    pub fn classify(&self, region: &BubbleRegion) -> CellMark {
        self.classify_pixels(&region.pixels)
    }

    pub fn classify_pixels(&self, pixels: &GrayImage) -> CellMark {
        let fill_ratio = self.fill_ratio(pixels);
        let state = if fill_ratio < self.thresholds.low_fill {
            MarkState::Unmarked
        } else if fill_ratio >= self.thresholds.high_fill {
            MarkState::Marked
        } else {
            MarkState::Ambiguous
        };
        CellMark { state, fill_ratio }
    }

    /// Classify every region of a sheet into the decision matrix.
    #[instrument(skip_all, fields(rows = grid.rows(), cols = grid.cols()))]
    pub fn classify_grid(&self, grid: &RegionGrid) -> Result<MarkMatrix, MarkwerkError> {
        let cells: Vec<CellMark> = grid.iter().map(|region| self.classify(region)).collect();
        let matrix = MarkMatrix::new(grid.rows(), grid.cols(), cells)?;
        debug!(
            marked = matrix.statistics().marked_bubbles,
            faint = matrix.statistics().faint_bubbles,
            "Sheet classified"
        );
        Ok(matrix)
    }
}

/// Otsu split of a sheet histogram, capped at the configured ceiling so a
/// bright sheet cannot promote paper texture to ink. No split when ink and
/// paper are closer than `min_ink_contrast`.
fn ink_split(histogram: &[u32; 256], thresholds: &ClassifierThresholds) -> Option<u8> {
    otsu_split(histogram, f64::from(thresholds.min_ink_contrast))
        .map(|level| level.min(thresholds.ink_level_ceiling))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use image::imageops::crop_imm;

    fn region_with_ink(ink_pixels: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(10, 10, Luma([240u8]));
        for i in 0..ink_pixels {
            img.put_pixel(i % 10, i / 10, Luma([20u8]));
        }
        img
    }

    fn classifier() -> MarkClassifier {
        MarkClassifier::with_ink_level(128, ClassifierThresholds::default())
    }

    #[test]
    fn fill_ratio_counts_dark_pixels() {
        let c = classifier();
        assert_eq!(c.fill_ratio(&region_with_ink(0)), 0.0);
        assert!((c.fill_ratio(&region_with_ink(25)) - 0.25).abs() < 1e-6);
        assert_eq!(c.fill_ratio(&region_with_ink(100)), 1.0);
    }

    #[test]
    fn thresholds_split_three_ways() {
        let c = classifier();
        assert_eq!(c.classify_pixels(&region_with_ink(10)).state, MarkState::Unmarked);
        assert_eq!(c.classify_pixels(&region_with_ink(20)).state, MarkState::Ambiguous);
        assert_eq!(c.classify_pixels(&region_with_ink(30)).state, MarkState::Marked);
        assert_eq!(c.classify_pixels(&region_with_ink(90)).state, MarkState::Marked);
    }

    #[test]
    fn more_ink_never_lowers_the_state() {
        let c = classifier();
        let rank = |s: MarkState| match s {
            MarkState::Unmarked => 0,
            MarkState::Ambiguous => 1,
            MarkState::Marked => 2,
        };
        let mut previous = 0;
        for ink in 0..=100 {
            let current = rank(c.classify_pixels(&region_with_ink(ink)).state);
            assert!(current >= previous, "ink {ink} dropped the state");
            previous = current;
        }
    }

    #[test]
    fn empty_region_is_unmarked() {
        let mark = classifier().classify_pixels(&GrayImage::new(0, 0));
        assert_eq!(mark.state, MarkState::Unmarked);
        assert_eq!(mark.fill_ratio, 0.0);
    }

    #[test]
    fn blank_sheet_has_no_ink() {
        let sheet = GrayImage::from_pixel(50, 50, Luma([250u8]));
        let c = MarkClassifier::calibrate_image(&sheet, ClassifierThresholds::default());
        assert_eq!(c.ink_level(), None);
        assert_eq!(c.classify_pixels(&sheet).state, MarkState::Unmarked);
    }

    #[test]
    fn calibrated_level_separates_ink_from_paper() {
        let mut sheet = GrayImage::from_pixel(50, 50, Luma([230u8]));
        for y in 0..10 {
            for x in 0..10 {
                sheet.put_pixel(x, y, Luma([40u8]));
            }
        }
        let c = MarkClassifier::calibrate_image(&sheet, ClassifierThresholds::default());
        let level = c.ink_level().unwrap();
        assert!((40..230).contains(&level));
    }

    #[test]
    fn ceiling_caps_bright_levels() {
        let mut sheet = GrayImage::from_pixel(20, 20, Luma([255u8]));
        for x in 0..20 {
            sheet.put_pixel(x, 0, Luma([205u8]));
        }
        let c = MarkClassifier::calibrate_image(&sheet, ClassifierThresholds::default());
        assert_eq!(c.ink_level(), Some(200));
    }

    #[test]
    fn noisy_blank_paper_has_no_ink() {
        let mut sheet = GrayImage::new(60, 60);
        for (x, y, pixel) in sheet.enumerate_pixels_mut() {
            *pixel = Luma([226 + ((x * 7 + y * 13) % 9) as u8]);
        }
        let c = MarkClassifier::calibrate_image(&sheet, ClassifierThresholds::default());
        assert_eq!(c.ink_level(), None);
        assert_eq!(c.classify_pixels(&sheet).state, MarkState::Unmarked);
    }

    #[test]
    fn canonical_sheet_is_calibrated_before_equalisation() {
        use crate::normalize::{RawSheetImage, SheetNormalizer};
        use image::DynamicImage;
        use markwerk_core::SheetId;

        // Canonical-sized noisy paper with one inked block.
        let mut photo = GrayImage::new(800, 1000);
        for (x, y, pixel) in photo.enumerate_pixels_mut() {
            let inked = (200..300).contains(&x) && (200..300).contains(&y);
            let base = if inked { 20 } else { 226 };
            *pixel = Luma([base + ((x * 7 + y * 13) % 9) as u8]);
        }
        let raw = RawSheetImage::from_dynamic(SheetId::new("n"), DynamicImage::ImageLuma8(photo));
        let sheet = SheetNormalizer::default().normalize(&raw).unwrap();
        let c = MarkClassifier::calibrate(&sheet, ClassifierThresholds::default());

        let ink = crop_imm(sheet.image(), 220, 220, 60, 60).to_image();
        let paper = crop_imm(sheet.image(), 500, 500, 60, 60).to_image();
        assert_eq!(c.classify_pixels(&ink).state, MarkState::Marked);
        assert_eq!(c.fill_ratio(&paper), 0.0);

        // Calibrating on the equalised pixels directly spreads paper texture
        // across the range and no longer separates ink from paper.
        let naive = MarkClassifier::calibrate_image(sheet.image(), ClassifierThresholds::default());
        assert!(naive.fill_ratio(&paper) > 0.2);
    }
}
