//! Print resolution read from EXIF metadata.
//!
//! Only IFD0 `XResolution` and `ResolutionUnit` are consulted. The value
//! is advisory: the caller decides whether it overrides the configured
//! DPI.

use serde::{Deserialize, Serialize};

const TAG_X_RESOLUTION: u16 = 0x011A;
const TAG_RESOLUTION_UNIT: u16 = 0x0128;
const TYPE_SHORT: u16 = 3;
const TYPE_RATIONAL: u16 = 5;
const IFD_ENTRY_LEN: usize = 12;

/// Unit attached to an EXIF resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionUnit {
    /// No absolute unit; the value only describes aspect ratio.
    Unspecified,
    /// Dots per inch.
    Inch,
    /// Dots per centimetre.
    Centimeter,
}

/// Horizontal resolution as stored in the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Dots per `unit`.
    pub value: f64,
    /// Unit of `value`.
    pub unit: ResolutionUnit,
}

impl Resolution {
    /// Resolution in dots per inch, or `None` when the unit is
    /// unspecified or the value is not positive.
    #[must_use]
    pub fn dpi(&self) -> Option<f64> {
        if !(self.value.is_finite() && self.value > 0.0) {
            return None;
        }
        match self.unit {
            ResolutionUnit::Inch => Some(self.value),
            ResolutionUnit::Centimeter => Some(self.value * 2.54),
            ResolutionUnit::Unspecified => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16(self, bytes: &[u8], at: usize) -> Option<u16> {
        let raw: [u8; 2] = bytes.get(at..at.checked_add(2)?)?.try_into().ok()?;
        Some(match self {
            Self::Little => u16::from_le_bytes(raw),
            Self::Big => u16::from_be_bytes(raw),
        })
    }

    fn u32(self, bytes: &[u8], at: usize) -> Option<u32> {
        let raw: [u8; 4] = bytes.get(at..at.checked_add(4)?)?.try_into().ok()?;
        Some(match self {
            Self::Little => u32::from_le_bytes(raw),
            Self::Big => u32::from_be_bytes(raw),
        })
    }
}

/// Parse the horizontal resolution out of a raw EXIF block.
///
/// Accepts the TIFF structure with or without the leading `Exif\0\0`
/// marker. A missing `ResolutionUnit` defaults to inches, as EXIF
/// prescribes. Returns `None` for malformed data or a missing
/// `XResolution`.
#[must_use]
pub fn from_exif(exif: &[u8]) -> Option<Resolution> {
    let tiff = exif.strip_prefix(b"Exif\0\0").unwrap_or(exif);
    let order = match tiff.get(0..2)? {
        b"II" => ByteOrder::Little,
        b"MM" => ByteOrder::Big,
        _ => return None,
    };
    if order.u16(tiff, 2)? != 42 {
        return None;
    }

    let ifd = order.u32(tiff, 4)? as usize;
    let entries = order.u16(tiff, ifd)? as usize;

    let mut value = None;
    let mut unit = ResolutionUnit::Inch;
    for i in 0..entries {
        let entry = ifd + 2 + i * IFD_ENTRY_LEN;
        let tag = order.u16(tiff, entry)?;
        let kind = order.u16(tiff, entry + 2)?;
        match (tag, kind) {
            (TAG_X_RESOLUTION, TYPE_RATIONAL) => {
                let offset = order.u32(tiff, entry + 8)? as usize;
                let numerator = order.u32(tiff, offset)?;
                let denominator = order.u32(tiff, offset + 4)?;
                if denominator != 0 {
                    value = Some(f64::from(numerator) / f64::from(denominator));
                }
            }
            (TAG_RESOLUTION_UNIT, TYPE_SHORT) => {
                unit = match order.u16(tiff, entry + 8)? {
                    2 => ResolutionUnit::Inch,
                    3 => ResolutionUnit::Centimeter,
                    _ => ResolutionUnit::Unspecified,
                };
            }
            _ => {}
        }
    }

    value.map(|value| Resolution { value, unit })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Build a minimal little-endian EXIF block with `XResolution` and an
    /// optional `ResolutionUnit`.
    fn exif_block(numerator: u32, denominator: u32, unit: Option<u16>) -> Vec<u8> {
        let entries: u16 = if unit.is_some() { 2 } else { 1 };
        let ifd_len = 2 + usize::from(entries) * IFD_ENTRY_LEN + 4;
        let rational_offset = u32::try_from(8 + ifd_len).unwrap();

        let mut out = b"Exif\0\0II".to_vec();
        out.extend_from_slice(&42u16.to_le_bytes());
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&entries.to_le_bytes());

        out.extend_from_slice(&TAG_X_RESOLUTION.to_le_bytes());
        out.extend_from_slice(&TYPE_RATIONAL.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&rational_offset.to_le_bytes());

        if let Some(unit) = unit {
            out.extend_from_slice(&TAG_RESOLUTION_UNIT.to_le_bytes());
            out.extend_from_slice(&TYPE_SHORT.to_le_bytes());
            out.extend_from_slice(&1u32.to_le_bytes());
            out.extend_from_slice(&unit.to_le_bytes());
            out.extend_from_slice(&[0, 0]);
        }

        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&numerator.to_le_bytes());
        out.extend_from_slice(&denominator.to_le_bytes());
        out
    }

    #[test]
    fn inch_resolution() {
        let res = from_exif(&exif_block(600, 2, Some(2))).unwrap();
        assert_eq!(res.unit, ResolutionUnit::Inch);
        assert!((res.dpi().unwrap() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn centimeter_resolution_converts_to_dpi() {
        let res = from_exif(&exif_block(100, 1, Some(3))).unwrap();
        assert!((res.dpi().unwrap() - 254.0).abs() < 1e-9);
    }

    #[test]
    fn unspecified_unit_is_not_usable() {
        let res = from_exif(&exif_block(72, 1, Some(1))).unwrap();
        assert_eq!(res.unit, ResolutionUnit::Unspecified);
        assert!(res.dpi().is_none());
    }

    #[test]
    fn missing_unit_defaults_to_inch() {
        let res = from_exif(&exif_block(72, 1, None)).unwrap();
        assert!((res.dpi().unwrap() - 72.0).abs() < 1e-9);
    }

    #[test]
    fn zero_denominator_is_ignored() {
        assert!(from_exif(&exif_block(72, 0, Some(2))).is_none());
    }

    #[test]
    fn big_endian_block() {
        let mut out = b"MM".to_vec();
        out.extend_from_slice(&42u16.to_be_bytes());
        out.extend_from_slice(&8u32.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&TAG_X_RESOLUTION.to_be_bytes());
        out.extend_from_slice(&TYPE_RATIONAL.to_be_bytes());
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&26u32.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&150u32.to_be_bytes());
        out.extend_from_slice(&1u32.to_be_bytes());

        let res = from_exif(&out).unwrap();
        assert!((res.dpi().unwrap() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(from_exif(&[]).is_none());
        assert!(from_exif(b"XX*\0").is_none());
        assert!(from_exif(b"II\x2a\x00\xff\xff\xff\xff").is_none());
    }
}
