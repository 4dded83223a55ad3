// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sheet boundary detection: picks the dominant outer contour of the bright
// paper mask and reduces it to four ordered corners.

use image::GrayImage;
use image::imageops::replace;
use imageproc::contours::{BorderType, find_contours};
use imageproc::point::Point;
use markwerk_core::error::MarkwerkError;
use markwerk_core::{NormalizeConfig, SheetOrientation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Four sheet corners in source-image coordinates, ordered top-left,
/// top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SheetQuad {
    corners: [(f32, f32); 4],
}

impl SheetQuad {
    /// Pick the four extreme points of a point set as corners.
    ///
    /// Top-left minimises `x + y`, bottom-right maximises it; top-right
    /// minimises `y - x`, bottom-left maximises it. Ties keep the first
    /// point seen, so the result is reproducible. Returns `None` when two
    /// corners coincide.
    pub fn from_points(points: &[(f32, f32)]) -> Option<Self> {
        let first = *points.first()?;
        let (mut tl, mut tr, mut br, mut bl) = (first, first, first, first);

        for &p in &points[1..] {
            if p.0 + p.1 < tl.0 + tl.1 {
                tl = p;
            }
            if p.0 + p.1 > br.0 + br.1 {
                br = p;
            }
            if p.1 - p.0 < tr.1 - tr.0 {
                tr = p;
            }
            if p.1 - p.0 > bl.1 - bl.0 {
                bl = p;
            }
        }

        let corners = [tl, tr, br, bl];
        for i in 0..4 {
            for j in (i + 1)..4 {
                if corners[i] == corners[j] {
                    return None;
                }
            }
        }
        Some(Self { corners })
    }

    /// The quad covering a whole `width x height` frame.
    pub fn full_frame(width: u32, height: u32) -> Self {
        let (w, h) = (width.saturating_sub(1) as f32, height.saturating_sub(1) as f32);
        Self {
            corners: [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)],
        }
    }

    pub fn corners(&self) -> [(f32, f32); 4] {
        self.corners
    }

    /// Enclosed area (shoelace formula).
    pub fn area(&self) -> f32 {
        polygon_area(&self.corners)
    }

    /// True when every turn along the corner sequence has the same sign.
    pub fn is_convex(&self) -> bool {
        let mut sign = 0.0f32;
        for i in 0..4 {
            let a = self.corners[i];
            let b = self.corners[(i + 1) % 4];
            let c = self.corners[(i + 2) % 4];
            let cross = (b.0 - a.0) * (c.1 - b.1) - (b.1 - a.1) * (c.0 - b.0);
            if cross == 0.0 {
                return false;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    /// Whether every corner lies within `tolerance` pixels of the matching
    /// frame corner.
    pub fn is_full_frame(&self, width: u32, height: u32, tolerance: f32) -> bool {
        let frame = Self::full_frame(width, height);
        self.corners
            .iter()
            .zip(frame.corners.iter())
            .all(|(a, b)| (a.0 - b.0).abs() <= tolerance && (a.1 - b.1).abs() <= tolerance)
    }

    /// Portrait when the mean vertical edge is at least as long as the mean
    /// horizontal edge.
    pub fn orientation(&self) -> SheetOrientation {
        let [tl, tr, br, bl] = self.corners;
        let width = (distance(tl, tr) + distance(bl, br)) / 2.0;
        let height = (distance(tl, bl) + distance(tr, br)) / 2.0;
        if height >= width {
            SheetOrientation::Portrait
        } else {
            SheetOrientation::Landscape
        }
    }
}

/// Locate the sheet in a binary mask where paper pixels are non-zero.
///
/// Outer contours are tried from largest to smallest enclosed area; the
/// first whose corner quad is large enough, convex, and closely filled by
/// the contour wins.
pub(crate) fn locate_sheet(mask: &GrayImage, config: &NormalizeConfig) -> Result<SheetQuad, MarkwerkError> {
    let image_area = mask.width() as f32 * mask.height() as f32;
    let min_area = image_area * config.min_sheet_area_fraction;

    // Border following needs background all around, otherwise paper that
    // reaches the frame edge yields no outer border.
    let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
    replace(&mut padded, mask, 1, 1);

    let mut candidates: Vec<(f32, Vec<(f32, f32)>)> = find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.points.len() >= 4)
        .map(|c| {
            let points = unpad_points(&c.points);
            (polygon_area(&points), points)
        })
        .filter(|(area, _)| *area >= min_area)
        .collect();

    // Largest first; equal areas keep contour discovery order.
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
    debug!(candidates = candidates.len(), min_area, "Sheet contour candidates");

    let mut last_reason = format!(
        "no outline covers at least {:.0}% of the photo",
        config.min_sheet_area_fraction * 100.0
    );

    for (contour_area, points) in &candidates {
        let Some(quad) = SheetQuad::from_points(points) else {
            last_reason = "outline corners coincide".into();
            continue;
        };

        let quad_area = quad.area();
        if quad_area < min_area {
            last_reason = format!(
                "corner quadrilateral covers {:.1}% of the photo",
                quad_area / image_area * 100.0
            );
            continue;
        }
        if !quad.is_convex() {
            last_reason = "corner quadrilateral is not convex".into();
            continue;
        }

        let fill = contour_area / quad_area;
        if fill < config.min_quad_fill || fill > 1.0 / config.min_quad_fill.max(f32::EPSILON) {
            last_reason = format!("outline is not four-sided (fill {fill:.2})");
            continue;
        }

        debug!(
            top_left = ?quad.corners[0],
            top_right = ?quad.corners[1],
            bottom_right = ?quad.corners[2],
            bottom_left = ?quad.corners[3],
            fill,
            "Sheet quadrilateral accepted"
        );
        return Ok(quad);
    }

    warn!(reason = %last_reason, "No plausible sheet boundary");
    Err(MarkwerkError::Geometry(last_reason))
}

/// Contour points in padded coordinates back to mask coordinates. Only
/// foreground pixels lie on a contour, so the shift never leaves the mask.
fn unpad_points(points: &[Point<i32>]) -> Vec<(f32, f32)> {
    points
        .iter()
        .map(|p| ((p.x - 1) as f32, (p.y - 1) as f32))
        .collect()
}

/// Area of a simple polygon given its vertices in order (CW or CCW).
fn polygon_area(points: &[(f32, f32)]) -> f32 {
    let n = points.len();
    let mut area = 0.0f32;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].0 * points[j].1;
        area -= points[j].0 * points[i].1;
    }
    area.abs() / 2.0
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}
