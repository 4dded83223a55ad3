// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Intensity histogram helpers shared by the normalizer and the classifier.

use image::GrayImage;
use imageproc::stats::{cumulative_histogram, histogram};

/// Two-class split of an intensity histogram.
///
/// Picks the level `t` maximising the between-class variance of the groups
/// `<= t` and `> t` (Otsu). The split is only accepted when the class means
/// lie at least `min_separation` levels apart: a unimodal histogram such as
/// noisy blank paper always has a best split, but it falls inside the mode
/// and separates nothing. Returns `None` for such histograms and for
/// histograms with fewer than two occupied levels.
pub fn otsu_split(histogram: &[u32; 256], min_separation: f64) -> Option<u8> {
    let total: u64 = histogram.iter().map(|&count| u64::from(count)).sum();
    let intensity_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * f64::from(count))
        .sum();

    let mut dark_count = 0u64;
    let mut dark_sum = 0.0f64;
    let mut best: Option<(u8, f64, f64)> = None;

    for (level, &count) in histogram.iter().enumerate() {
        dark_count += u64::from(count);
        dark_sum += level as f64 * f64::from(count);
        let light_count = total - dark_count;
        if dark_count == 0 {
            continue;
        }
        if light_count == 0 {
            break;
        }

        let dark_mean = dark_sum / dark_count as f64;
        let light_mean = (intensity_sum - dark_sum) / light_count as f64;
        let separation = light_mean - dark_mean;
        let variance = dark_count as f64 * light_count as f64 * separation * separation;

        if best.is_none_or(|(_, best_variance, _)| variance > best_variance) {
            best = Some((level as u8, variance, separation));
        }
    }

    let (level, _, separation) = best?;
    (separation >= min_separation).then_some(level)
}

/// [`otsu_split`] over the pixels of `gray`.
pub fn otsu_level(gray: &GrayImage, min_separation: f64) -> Option<u8> {
    otsu_split(&histogram(gray).channels[0], min_separation)
}

/// Intensity distribution of a sheet before histogram equalisation, with
/// the level mapping equalisation applied to it.
///
/// Equalisation stretches paper texture across the whole intensity range,
/// so ink/paper contrast has to be measured on the distribution recorded
/// here and then carried into equalised space with [`ToneProfile::equalized`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToneProfile {
    histogram: [u32; 256],
    tone_map: [u8; 256],
}

impl ToneProfile {
    /// Profile `gray` and derive the mapping `imageproc`'s
    /// `equalize_histogram` applies to it.
    pub fn measure(gray: &GrayImage) -> Self {
        let histogram = histogram(gray).channels[0];
        let cumulative = cumulative_histogram(gray).channels[0];
        let total = cumulative[255] as f32;

        let mut tone_map = [0u8; 256];
        if total > 0.0 {
            for (mapped, &count) in tone_map.iter_mut().zip(cumulative.iter()) {
                *mapped = f32::min(255f32, 255f32 * (count as f32 / total)) as u8;
            }
        }
        Self {
            histogram,
            tone_map,
        }
    }

    pub fn histogram(&self) -> &[u32; 256] {
        &self.histogram
    }

    /// The equalised value of pre-equalisation intensity `level`.
    pub fn equalized(&self, level: u8) -> u8 {
        self.tone_map[level as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::contrast::equalize_histogram;

    fn paper_with_ink(paper: u8, ink: u8) -> GrayImage {
        let mut img = GrayImage::from_pixel(20, 20, Luma([paper]));
        for y in 0..6 {
            for x in 0..20 {
                img.put_pixel(x, y, Luma([ink]));
            }
        }
        img
    }

    #[test]
    fn uniform_image_has_no_level() {
        let img = GrayImage::from_pixel(20, 20, Luma([200u8]));
        assert_eq!(otsu_level(&img, 0.0), None);
    }

    #[test]
    fn bimodal_image_splits_between_modes() {
        let level = otsu_level(&paper_with_ink(220, 30), 40.0).expect("two modes");
        assert!((30..220).contains(&level), "level {level} outside the modes");
    }

    #[test]
    fn close_modes_are_not_a_split() {
        let img = paper_with_ink(230, 222);
        assert_eq!(otsu_level(&img, 40.0), None);
        assert_eq!(otsu_level(&img, 4.0), Some(222));
    }

    #[test]
    fn unimodal_noise_is_not_a_split() {
        let mut histogram = [0u32; 256];
        for (offset, count) in [(0, 40), (1, 90), (2, 160), (3, 90), (4, 40)] {
            histogram[226 + offset] = count;
        }
        assert_eq!(otsu_split(&histogram, 16.0), None);
    }

    #[test]
    fn tone_map_matches_equalisation() {
        let img = paper_with_ink(230, 40);
        let profile = ToneProfile::measure(&img);
        let equalized = equalize_histogram(&img);

        assert_eq!(profile.histogram()[40], 120);
        assert_eq!(profile.histogram()[230], 280);
        assert_eq!(equalized.get_pixel(0, 0).0[0], profile.equalized(40));
        assert_eq!(equalized.get_pixel(0, 19).0[0], profile.equalized(230));
        assert!(profile.equalized(40) < profile.equalized(230));
    }
}
