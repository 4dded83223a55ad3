// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Photo-to-canonical-sheet normalisation.

use image::{GrayImage, Luma};
use imageproc::contrast::equalize_histogram;
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::morphology::{close, open};
use markwerk_core::error::MarkwerkError;
use markwerk_core::NormalizeConfig;
use tracing::{debug, info, instrument, warn};

use super::quad::{SheetQuad, locate_sheet};
use super::sheet::{CanonicalSheetImage, RawSheetImage};
use crate::histogram::{ToneProfile, otsu_level};

/// Fraction of the longer image edge within which a located quad still
/// counts as covering the whole frame.
const FULL_FRAME_TOLERANCE: f32 = 0.01;

/// Minimum gap, in intensity levels, between the mean of the paper and the
/// mean of the background before a photo counts as showing a sheet edge.
const MIN_SHEET_CONTRAST: f64 = 32.0;

/// Turns a photographed sheet into a fixed-size canonical sheet.
///
/// The pipeline is:
///
/// 1. Convert to grayscale
/// 2. Gaussian blur
/// 3. Otsu-level the blurred image into a paper mask (bright pixels)
/// 4. Optionally open then close the mask to drop speckle and fill pinholes
/// 5. Take the dominant four-sided outer contour as the sheet boundary
/// 6. Warp the (unblurred) grayscale image so the boundary maps onto the
///    full target rectangle
/// 7. Record the tone profile, then equalise the histogram
///
/// An image that already is a canonical sheet skips the warp, which makes
/// normalisation idempotent on its own output. A target-sized photo without
/// any sheet/background contrast is taken as such a sheet.
#[derive(Debug, Clone, Default)]
pub struct SheetNormalizer {
    config: NormalizeConfig,
}

impl SheetNormalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    #[instrument(skip_all, fields(sheet = %raw.id(), width = raw.width(), height = raw.height()))]
    pub fn normalize(&self, raw: &RawSheetImage) -> Result<CanonicalSheetImage, MarkwerkError> {
        let (w, h) = (raw.width(), raw.height());
        if w < 2 || h < 2 {
            return Err(MarkwerkError::Geometry(format!(
                "photo is only {w}x{h} pixels"
            )));
        }

        let gray = raw.image().to_luma8();
        let (tw, th) = (self.config.target_width, self.config.target_height);
        let blurred = gaussian_blur_f32(&gray, self.config.blur_sigma);

        let quad = match otsu_level(&blurred, MIN_SHEET_CONTRAST) {
            Some(level) => {
                debug!(level, "Paper mask level");
                let mask = self.paper_mask(&blurred, level);
                locate_sheet(&mask, &self.config)?
            }
            None if (w, h) == (tw, th) => {
                debug!("Target-sized photo without sheet edge; using the full frame");
                SheetQuad::full_frame(w, h)
            }
            None => {
                warn!("Photo has no sheet/background contrast");
                return Err(MarkwerkError::Geometry(
                    "photo has no contrast between sheet and background".into(),
                ));
            }
        };
        debug!(orientation = ?quad.orientation(), area = quad.area(), "Sheet located");

        let tolerance = (w.max(h) as f32 * FULL_FRAME_TOLERANCE).max(1.5);
        let warped = if (w, h) == (tw, th) && quad.is_full_frame(w, h, tolerance) {
            debug!("Photo already canonical; skipping warp");
            gray
        } else {
            warp_to_target(&gray, &quad, tw, th)?
        };

        let tone = ToneProfile::measure(&warped);
        let canonical = equalize_histogram(&warped);
        info!(width = tw, height = th, "Sheet normalised");

        Ok(CanonicalSheetImage::new(raw.id().clone(), canonical, quad, tone))
    }

    fn paper_mask(&self, blurred: &GrayImage, level: u8) -> GrayImage {
        let mut mask = GrayImage::new(blurred.width(), blurred.height());
        for (x, y, pixel) in blurred.enumerate_pixels() {
            if pixel.0[0] > level {
                mask.put_pixel(x, y, Luma([255u8]));
            }
        }

        let radius = self.config.denoise_radius;
        if radius == 0 {
            return mask;
        }
        let opened = open(&mask, Norm::LInf, radius);
        close(&opened, Norm::LInf, radius)
    }
}

/// Map `quad` onto the full `width x height` target rectangle.
fn warp_to_target(
    gray: &GrayImage,
    quad: &SheetQuad,
    width: u32,
    height: u32,
) -> Result<GrayImage, MarkwerkError> {
    let target = SheetQuad::full_frame(width, height);
    let projection = Projection::from_control_points(quad.corners(), target.corners())
        .ok_or_else(|| {
            warn!(corners = ?quad.corners(), "Sheet corners admit no projective mapping");
            MarkwerkError::Geometry("sheet corners are degenerate".into())
        })?;

    let mut output = GrayImage::new(width, height);
    warp_into(gray, &projection, Interpolation::Bilinear, Luma([255u8]), &mut output);
    Ok(output)
}
