//! Fixed geometry of the settings blob and its configuration sections.
//!
//! ## Blob header (absolute offsets)
//!
//! | Field            | Offset | Size      | Encoding                 |
//! |------------------|--------|-----------|--------------------------|
//! | Camera model     | 0      | up to 11  | NUL-terminated ASCII     |
//! | Firmware version | 24     | up to 5   | NUL-terminated ASCII     |
//! | Checksum         | len-2  | 2         | u16 BE, CRC-16/XMODEM    |
//!
//! ## Section (offsets relative to the section start)
//!
//! | Field         | Offset      | Size     | Encoding                   |
//! |---------------|-------------|----------|----------------------------|
//! | i-menu slot i | 924 + 4*i   | 4        | u32 LE, only low byte used |
//! | Mode id       | 1240        | 1        | u8 enum                    |
//! | File prefix   | 1540        | up to 10 | NUL-terminated ASCII       |

use serde::Serialize;
use std::fmt;

/// Size of one configuration section in bytes
pub const SECTION_SIZE: usize = 6628;

/// Relative offset of the first i-menu slot
pub const IMENU_OFFSET: usize = 924;

/// Number of i-menu slots
pub const IMENU_SLOTS: usize = 12;

/// Width of one i-menu slot
pub const IMENU_SLOT_SIZE: usize = 4;

/// Relative offset of the mode id byte
pub const MODE_ID_OFFSET: usize = 1240;

/// Relative offset of the file-name prefix
pub const PREFIX_OFFSET: usize = 1540;

/// Maximum length of the file-name prefix
pub const PREFIX_LEN: usize = 10;

/// Prefix written when a section is reset
pub const DEFAULT_PREFIX: &[u8] = b"DSC";

const MODEL_RANGE: std::ops::Range<usize> = 0..11;
const FIRMWARE_RANGE: std::ops::Range<usize> = 24..29;

/// Relative offset of i-menu slot `index`
pub const fn imenu_slot_offset(index: usize) -> usize {
    IMENU_OFFSET + IMENU_SLOT_SIZE * index
}

/// Shooting mode or user bank a section belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModeId {
    /// Program (P)
    Program,
    /// Shutter priority (S)
    ShutterPriority,
    /// Aperture priority (A)
    AperturePriority,
    /// Manual (M)
    Manual,
    /// Full auto
    Auto,
    /// User setting 1
    U1,
    /// User setting 2
    U2,
    /// User setting 3
    U3,
    /// Any other byte; preserved as-is
    Unknown(u8),
}

impl ModeId {
    /// All recognised modes, in id order
    pub const ALL: [ModeId; 8] = [
        ModeId::Program,
        ModeId::ShutterPriority,
        ModeId::AperturePriority,
        ModeId::Manual,
        ModeId::Auto,
        ModeId::U1,
        ModeId::U2,
        ModeId::U3,
    ];

    /// Raw byte stored in the section
    pub fn to_byte(self) -> u8 {
        match self {
            ModeId::Program => 29,
            ModeId::ShutterPriority => 30,
            ModeId::AperturePriority => 31,
            ModeId::Manual => 32,
            ModeId::Auto => 33,
            ModeId::U1 => 34,
            ModeId::U2 => 35,
            ModeId::U3 => 36,
            ModeId::Unknown(b) => b,
        }
    }

    /// Returns true for U1, U2 and U3
    pub fn is_user_bank(self) -> bool {
        matches!(self, ModeId::U1 | ModeId::U2 | ModeId::U3)
    }

    /// Human-readable name
    pub fn name(self) -> String {
        match self {
            ModeId::Program => "Program".to_string(),
            ModeId::ShutterPriority => "Shutter Priority".to_string(),
            ModeId::AperturePriority => "Aperture Priority".to_string(),
            ModeId::Manual => "Manual".to_string(),
            ModeId::Auto => "Auto".to_string(),
            ModeId::U1 => "U1".to_string(),
            ModeId::U2 => "U2".to_string(),
            ModeId::U3 => "U3".to_string(),
            ModeId::Unknown(b) => format!("Unknown Mode {}", b),
        }
    }
}

impl From<u8> for ModeId {
    fn from(value: u8) -> Self {
        match value {
            29 => ModeId::Program,
            30 => ModeId::ShutterPriority,
            31 => ModeId::AperturePriority,
            32 => ModeId::Manual,
            33 => ModeId::Auto,
            34 => ModeId::U1,
            35 => ModeId::U2,
            36 => ModeId::U3,
            other => ModeId::Unknown(other),
        }
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl Serialize for ModeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

/// A NUL-terminated text field, decoded as ASCII when possible
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "encoding", content = "value", rename_all = "lowercase")]
pub enum DecodedText {
    /// Valid ASCII
    Ascii(String),
    /// Bytes that are not ASCII, as lowercase hex
    Hex(String),
}

impl DecodedText {
    /// Decodes `bytes` up to the first NUL
    pub fn decode(bytes: &[u8]) -> Self {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let bytes = &bytes[..end];
        if bytes.is_ascii() {
            // ASCII is always valid UTF-8
            DecodedText::Ascii(bytes.iter().map(|&b| b as char).collect())
        } else {
            DecodedText::Hex(bytes.iter().map(|b| format!("{:02x}", b)).collect())
        }
    }

    /// The ASCII text, if the field decoded cleanly
    pub fn as_ascii(&self) -> Option<&str> {
        match self {
            DecodedText::Ascii(s) => Some(s),
            DecodedText::Hex(_) => None,
        }
    }

    /// Returns true for an empty ASCII field
    pub fn is_empty(&self) -> bool {
        matches!(self, DecodedText::Ascii(s) if s.is_empty())
    }
}

impl fmt::Display for DecodedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedText::Ascii(s) => write!(f, "'{}'", s),
            DecodedText::Hex(h) => write!(f, "(hex) {}", h),
        }
    }
}

/// Camera model and firmware read from the blob header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraInfo {
    /// Model string, e.g. `Z 5`
    pub model: Option<DecodedText>,
    /// Firmware version string
    pub firmware: Option<DecodedText>,
}

impl CameraInfo {
    /// Reads the header fields that fit inside `blob`
    pub fn read(blob: &[u8]) -> Self {
        Self {
            model: blob.get(MODEL_RANGE).map(DecodedText::decode),
            firmware: blob.get(FIRMWARE_RANGE).map(DecodedText::decode),
        }
    }

    /// Model string usable for layout matching, empty when unreadable
    pub fn model_str(&self) -> &str {
        self.model
            .as_ref()
            .and_then(DecodedText::as_ascii)
            .unwrap_or("")
    }

    /// Firmware string usable for layout matching, empty when unreadable
    pub fn firmware_str(&self) -> &str {
        self.firmware
            .as_ref()
            .and_then(DecodedText::as_ascii)
            .unwrap_or("")
    }
}

/// Zero / non-zero byte counts over a whole blob
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DensitySummary {
    /// Number of zero bytes
    pub zero_bytes: usize,
    /// Number of non-zero bytes
    pub nonzero_bytes: usize,
    /// Fraction of non-zero bytes (0 for an empty blob)
    pub density: f64,
}

/// Counts zero and non-zero bytes in `blob`
pub fn density_summary(blob: &[u8]) -> DensitySummary {
    let nonzero_bytes = blob.iter().filter(|&&b| b != 0).count();
    let density = if blob.is_empty() {
        0.0
    } else {
        nonzero_bytes as f64 / blob.len() as f64
    };
    DensitySummary {
        zero_bytes: blob.len() - nonzero_bytes,
        nonzero_bytes,
        density,
    }
}

/// Reads a little-endian u32 at `offset`, if it fits
pub(crate) fn read_u32_le(blob: &[u8], offset: usize) -> Option<u32> {
    let bytes = blob.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_id_round_trip() {
        for mode in ModeId::ALL {
            assert_eq!(ModeId::from(mode.to_byte()), mode);
        }
        assert_eq!(ModeId::from(7), ModeId::Unknown(7));
        assert_eq!(ModeId::Unknown(7).to_byte(), 7);
        assert_eq!(ModeId::from(7).to_string(), "Unknown Mode 7");
        assert!(ModeId::U2.is_user_bank());
        assert!(!ModeId::Manual.is_user_bank());
    }

    #[test]
    fn test_decoded_text() {
        assert_eq!(
            DecodedText::decode(b"DSC\0\0\0\0\0\0\0"),
            DecodedText::Ascii("DSC".into())
        );
        assert_eq!(
            DecodedText::decode(b"ABCDEFGHIJ"),
            DecodedText::Ascii("ABCDEFGHIJ".into())
        );
        assert_eq!(
            DecodedText::decode(&[0x44, 0xFF, 0x00, 0x41]),
            DecodedText::Hex("44ff".into())
        );
        assert!(DecodedText::decode(&[0; 10]).is_empty());
    }

    #[test]
    fn test_camera_info() {
        let mut blob = vec![0u8; 64];
        blob[..3].copy_from_slice(b"Z_5");
        blob[24..28].copy_from_slice(b"1.10");
        let info = CameraInfo::read(&blob);
        assert_eq!(info.model_str(), "Z_5");
        assert_eq!(info.firmware_str(), "1.10");

        let info = CameraInfo::read(&blob[..20]);
        assert_eq!(info.model_str(), "Z_5");
        assert!(info.firmware.is_none());
    }

    #[test]
    fn test_density_summary() {
        let summary = density_summary(&[0, 1, 0, 2]);
        assert_eq!(summary.zero_bytes, 2);
        assert_eq!(summary.nonzero_bytes, 2);
        assert!((summary.density - 0.5).abs() < f64::EPSILON);
        assert_eq!(density_summary(&[]).density, 0.0);
    }

    #[test]
    fn test_read_u32_le() {
        let blob = [0x1F, 0x00, 0x00, 0x00, 0xFF];
        assert_eq!(read_u32_le(&blob, 0), Some(31));
        assert_eq!(read_u32_le(&blob, 2), None);
    }
}
