// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sheet images at the two ends of normalisation: the raw photograph as
// supplied by the caller, and the canonical perspective-corrected sheet.

use image::{DynamicImage, GrayImage};
use markwerk_core::error::MarkwerkError;
use markwerk_core::SheetId;
use tracing::{debug, instrument};

use super::quad::SheetQuad;
use crate::histogram::ToneProfile;

/// A photographed answer sheet. Never modified by the pipeline.
#[derive(Debug, Clone)]
pub struct RawSheetImage {
    id: SheetId,
    image: DynamicImage,
}

impl RawSheetImage {
    /// Decode a sheet from encoded bytes (JPEG, PNG, TIFF, etc.).
    #[instrument(skip(data), fields(sheet = %id, data_len = data.len()))]
    pub fn from_bytes(id: SheetId, data: &[u8]) -> Result<Self, MarkwerkError> {
        let image = image::load_from_memory(data).map_err(|err| {
            MarkwerkError::Decode(format!("failed to decode sheet {id}: {err}"))
        })?;
        debug!(
            width = image.width(),
            height = image.height(),
            "Sheet image decoded"
        );
        Ok(Self { id, image })
    }

    /// Load a sheet from a file path.
    #[instrument(skip_all, fields(sheet = %id, path = %path.as_ref().display()))]
    pub fn open(id: SheetId, path: impl AsRef<std::path::Path>) -> Result<Self, MarkwerkError> {
        let image = image::open(path.as_ref()).map_err(|err| match err {
            image::ImageError::IoError(io) => MarkwerkError::Io(io),
            other => MarkwerkError::Decode(format!(
                "failed to decode {}: {}",
                path.as_ref().display(),
                other
            )),
        })?;
        Ok(Self { id, image })
    }

    /// Wrap an already-decoded image.
    pub fn from_dynamic(id: SheetId, image: DynamicImage) -> Self {
        Self { id, image }
    }

    pub fn id(&self) -> &SheetId {
        &self.id
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Output of the normalizer: a fixed-size, perspective-corrected,
/// contrast-equalised single-channel sheet.
#[derive(Debug, Clone)]
pub struct CanonicalSheetImage {
    id: SheetId,
    image: GrayImage,
    quad: SheetQuad,
    tone: ToneProfile,
}

impl CanonicalSheetImage {
    pub(crate) fn new(id: SheetId, image: GrayImage, quad: SheetQuad, tone: ToneProfile) -> Self {
        Self {
            id,
            image,
            quad,
            tone,
        }
    }

    pub fn id(&self) -> &SheetId {
        &self.id
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Sheet boundary found in the source photograph.
    pub fn quad(&self) -> &SheetQuad {
        &self.quad
    }

    /// Intensities of the warped sheet before equalisation.
    pub fn tone(&self) -> &ToneProfile {
        &self.tone
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Consume the sheet and return the pixels.
    pub fn into_image(self) -> GrayImage {
        self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let result = RawSheetImage::from_bytes(SheetId::new("s1"), b"not an image");
        assert!(matches!(result, Err(MarkwerkError::Decode(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = RawSheetImage::open(SheetId::new("s1"), "/nonexistent/sheet.png");
        assert!(matches!(result, Err(MarkwerkError::Io(_))));
    }

    #[test]
    fn png_bytes_decode() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(12, 9));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let raw = RawSheetImage::from_bytes(SheetId::new("s1"), &bytes).unwrap();
        assert_eq!((raw.width(), raw.height()), (12, 9));
        assert_eq!(raw.id().as_str(), "s1");
    }
}
