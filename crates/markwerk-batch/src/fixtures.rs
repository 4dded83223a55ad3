// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic sheet photos for tests.

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};

const PHOTO_WIDTH: u32 = 500;
const PHOTO_HEIGHT: u32 = 625;
const BORDER: u32 = 40;
const TABLE: u8 = 40;

/// A photo of a sheet lying on a dark table, with the central half of each
/// selected `(row, col)` cell inked in.
pub(crate) fn sheet_photo(rows: u32, cols: u32, selections: &[Vec<usize>]) -> GrayImage {
    let mut img = GrayImage::from_pixel(PHOTO_WIDTH, PHOTO_HEIGHT, Luma([TABLE]));
    let (sheet_w, sheet_h) = (PHOTO_WIDTH - 2 * BORDER, PHOTO_HEIGHT - 2 * BORDER);
    fill(&mut img, BORDER, BORDER, BORDER + sheet_w, BORDER + sheet_h, 230);

    for (row, columns) in selections.iter().enumerate() {
        let row = row as u32;
        let y0 = BORDER + row * sheet_h / rows;
        let y1 = BORDER + (row + 1) * sheet_h / rows;
        for &col in columns {
            let col = col as u32;
            let x0 = BORDER + col * sheet_w / cols;
            let x1 = BORDER + (col + 1) * sheet_w / cols;
            let (qw, qh) = ((x1 - x0) / 4, (y1 - y0) / 4);
            fill(&mut img, x0 + qw, y0 + qh, x1 - qw, y1 - qh, 20);
        }
    }
    img
}

/// The same photo taken slightly off-axis: the sheet corners move by up to
/// 15 pixels, so the sheet becomes an irregular quadrilateral.
pub(crate) fn skewed(flat: &GrayImage) -> GrayImage {
    let (right, bottom) = ((PHOTO_WIDTH - BORDER - 1) as f32, (PHOTO_HEIGHT - BORDER - 1) as f32);
    let left_top = BORDER as f32;
    let sheet = [
        (left_top, left_top),
        (right, left_top),
        (right, bottom),
        (left_top, bottom),
    ];
    let seen = [
        (left_top + 15.0, left_top - 5.0),
        (right - 9.0, left_top + 12.0),
        (right + 9.0, bottom + 8.0),
        (left_top - 10.0, bottom - 6.0),
    ];

    let mut photo = GrayImage::from_pixel(flat.width(), flat.height(), Luma([TABLE]));
    if let Some(projection) = Projection::from_control_points(sheet, seen) {
        warp_into(flat, &projection, Interpolation::Bilinear, Luma([TABLE]), &mut photo);
    }
    photo
}

/// Add deterministic sensor noise of up to `amplitude` levels either way.
pub(crate) fn with_noise(mut img: GrayImage, amplitude: u8) -> GrayImage {
    let span = 2 * u32::from(amplitude) + 1;
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
        h ^= h >> 15;
        h = h.wrapping_mul(0x2C1B_3C6D);
        h ^= h >> 12;
        let offset = (h % span) as i16 - i16::from(amplitude);
        pixel.0[0] = (i16::from(pixel.0[0]) + offset).clamp(0, 255) as u8;
    }
    img
}

pub(crate) fn png_bytes(img: &GrayImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn fill(img: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, value: u8) {
    for y in y0..y1 {
        for x in x0..x1 {
            img.put_pixel(x, y, Luma([value]));
        }
    }
}
