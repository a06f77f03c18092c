//! Image decoding and binarization.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, TIFF, WebP) and produces a
//! [`PixelGrid`] of foreground/background cells padded with a background
//! margin, so later stages can look at neighbours near the image edge
//! without special cases.
//!
//! Steps: pick a background colour from the top-left corner, flatten
//! transparency onto it, convert to grayscale, threshold, pad.

use std::io::Cursor;

use image::{DynamicImage, ImageDecoder, ImageReader, Rgb, RgbImage, RgbaImage};

use crate::grid::PixelGrid;
use crate::resolution::{self, Resolution};
use crate::types::{Dimensions, PipelineError, PixelState};

/// A decoded image together with any resolution found in its metadata.
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Decoded pixels.
    pub image: DynamicImage,
    /// EXIF resolution, if present.
    pub resolution: Option<Resolution>,
}

impl Decoded {
    /// Source image dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.image.width(),
            height: self.image.height(),
        }
    }
}

/// Colour that transparent pixels are flattened onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    /// Flatten onto white.
    White,
    /// Flatten onto black.
    Black,
}

impl Background {
    const fn rgb(self) -> [u8; 3] {
        match self {
            Self::White => [255, 255, 255],
            Self::Black => [0, 0, 0],
        }
    }
}

/// Decode raw image bytes and read any EXIF resolution.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<Decoded, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let mut decoder = reader.into_decoder()?;

    // Metadata problems never fail the load; the DPI is only advisory.
    let resolution = match decoder.exif_metadata() {
        Ok(Some(exif)) => resolution::from_exif(&exif),
        Ok(None) => None,
        Err(e) => {
            tracing::debug!("ignoring unreadable EXIF metadata: {e}");
            None
        }
    };
    if let Some(res) = resolution
        && res.dpi().is_none()
    {
        tracing::warn!(
            "image resolution {} has no usable unit ({:?}); ignoring",
            res.value,
            res.unit
        );
    }

    let image = DynamicImage::from_decoder(decoder)?;
    Ok(Decoded { image, resolution })
}

/// Choose the flattening colour from the top-left pixel.
///
/// A transparent corner or one whose channel average exceeds 127 means a
/// white background; anything else is black. Empty images default to
/// white.
#[must_use]
pub fn background_of(rgba: &RgbaImage) -> Background {
    let Some(corner) = rgba.pixels().next() else {
        return Background::White;
    };
    let [r, g, b, a] = corner.0;
    let average = (u16::from(r) + u16::from(g) + u16::from(b)) / 3;
    if a == 0 || average > 127 {
        Background::White
    } else {
        Background::Black
    }
}

/// Alpha-composite every pixel onto an opaque `background`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn flatten(rgba: &RgbaImage, background: Background) -> RgbImage {
    let bg = background.rgb();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let blend = |c: u8, bg: u8| {
            ((u16::from(c) * alpha + u16::from(bg) * (255 - alpha) + 127) / 255) as u8
        };
        Rgb([blend(r, bg[0]), blend(g, bg[1]), blend(b, bg[2])])
    })
}

/// Threshold an image into a padded [`PixelGrid`].
///
/// Gray levels at or below `threshold` become
/// [`PixelState::Foreground`]; everything else, including the `border`
/// margin, is [`PixelState::Background`].
#[must_use]
pub fn binarize(image: &DynamicImage, threshold: u8, border: u32) -> PixelGrid {
    let rgba = image.to_rgba8();
    let background = background_of(&rgba);
    let gray = DynamicImage::ImageRgb8(flatten(&rgba, background)).to_luma8();

    let mut grid = PixelGrid::new(
        Dimensions {
            width: gray.width(),
            height: gray.height(),
        },
        border,
    );
    for (x, y, pixel) in gray.enumerate_pixels() {
        if pixel.0[0] <= threshold {
            grid.set_image_pixel(x, y, PixelState::Foreground);
        }
    }
    grid
}
