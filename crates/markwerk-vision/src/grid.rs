// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Uniform grid partitioning of a canonical sheet into bubble regions.

use image::GrayImage;
use image::imageops::crop_imm;
use markwerk_core::error::MarkwerkError;
use markwerk_core::BubbleLayout;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::normalize::CanonicalSheetImage;

/// Pixel rectangle inside the canonical image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The crop for one `(row, col)` bubble, rows and columns zero-based.
#[derive(Debug, Clone)]
pub struct BubbleRegion {
    pub row: usize,
    pub col: usize,
    pub rect: CellRect,
    pub pixels: GrayImage,
}

/// Every bubble region of a sheet, row-major.
#[derive(Debug, Clone)]
pub struct RegionGrid {
    rows: usize,
    cols: usize,
    regions: Vec<BubbleRegion>,
}

impl RegionGrid {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&BubbleRegion> {
        if row < self.rows && col < self.cols {
            self.regions.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BubbleRegion> {
        self.regions.iter()
    }
}

/// Splits a canonical sheet into `rows x cols` equal cells and crops each
/// one, inset by the layout margin on every side.
#[derive(Debug, Clone, Copy)]
pub struct GridSampler {
    min_cell_px: u32,
}

impl GridSampler {
    pub fn new(min_cell_px: u32) -> Self {
        Self { min_cell_px }
    }

    pub fn sample(
        &self,
        sheet: &CanonicalSheetImage,
        layout: &BubbleLayout,
    ) -> Result<RegionGrid, MarkwerkError> {
        self.sample_image(sheet.image(), layout)
    }

    #[instrument(skip_all, fields(rows = layout.rows(), cols = layout.cols()))]
    pub fn sample_image(
        &self,
        image: &GrayImage,
        layout: &BubbleLayout,
    ) -> Result<RegionGrid, MarkwerkError> {
        let (w, h) = image.dimensions();
        let (rows, cols) = (layout.rows(), layout.cols());

        let (cell_w, cell_h) = (w / cols, h / rows);
        if cell_w < self.min_cell_px || cell_h < self.min_cell_px {
            return Err(MarkwerkError::Layout(format!(
                "{rows}x{cols} grid on a {w}x{h} sheet gives {cell_w}x{cell_h} px cells, \
                 below the {} px minimum",
                self.min_cell_px
            )));
        }

        let mut regions = Vec::with_capacity(rows as usize * cols as usize);
        for row in 0..rows {
            let (y0, y1) = (bound(row, rows, h), bound(row + 1, rows, h));
            for col in 0..cols {
                let (x0, x1) = (bound(col, cols, w), bound(col + 1, cols, w));
                let rect = inset(x0, y0, x1 - x0, y1 - y0, layout.margin());
                let pixels = crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image();
                regions.push(BubbleRegion {
                    row: row as usize,
                    col: col as usize,
                    rect,
                    pixels,
                });
            }
        }

        debug!(regions = regions.len(), cell_w, cell_h, "Grid sampled");
        Ok(RegionGrid {
            rows: rows as usize,
            cols: cols as usize,
            regions,
        })
    }
}

/// Start of cell `index` when `extent` pixels are split into `count` cells.
fn bound(index: u32, count: u32, extent: u32) -> u32 {
    (u64::from(index) * u64::from(extent) / u64::from(count)) as u32
}

fn inset(x: u32, y: u32, width: u32, height: u32, margin: f32) -> CellRect {
    let dx = (width as f32 * margin).floor() as u32;
    let dy = (height as f32 * margin).floor() as u32;
    CellRect {
        x: x + dx,
        y: y + dy,
        width: width.saturating_sub(2 * dx).max(1),
        height: height.saturating_sub(2 * dy).max(1),
    }
}
