//! Decoded representation of one configuration section.

use crate::layout::{DecodedText, ModeId};
use serde::Serialize;
use std::fmt;

/// Meaning of one i-menu slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ImenuSetting {
    /// Slot holds 0 (unconfigured)
    Empty,
    /// Slot holds an id from the name table
    Known {
        /// Setting id
        id: u8,
        /// Label from the name table
        name: String,
    },
    /// Slot holds an id the name table does not know
    Unknown {
        /// Setting id
        id: u8,
    },
}

impl ImenuSetting {
    /// The raw setting id
    pub fn id(&self) -> u8 {
        match self {
            ImenuSetting::Empty => 0,
            ImenuSetting::Known { id, .. } | ImenuSetting::Unknown { id } => *id,
        }
    }

    /// The label, if the id is known
    pub fn name(&self) -> Option<&str> {
        match self {
            ImenuSetting::Known { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for ImenuSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImenuSetting::Empty => f.write_str("(empty)"),
            ImenuSetting::Known { name, .. } => f.write_str(name),
            ImenuSetting::Unknown { id } => write!(f, "Unknown/Invalid ({})", id),
        }
    }
}

/// One decoded i-menu slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImenuEntry {
    /// Zero-based slot index
    pub slot: usize,
    /// The full 32-bit slot value
    pub raw: u32,
    /// Decoded low byte
    pub setting: ImenuSetting,
}

impl ImenuEntry {
    /// Returns true if any of the upper three bytes is set
    ///
    /// The camera only ever writes the low byte, so this hints at a
    /// misaligned section.
    pub fn has_padding_bytes(&self) -> bool {
        self.raw > 0xFF
    }
}

/// A non-zero scalar field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalarValue {
    /// Offset relative to the section start
    pub offset: usize,
    /// Label from the name table
    pub label: String,
    /// Little-endian u32 at the offset
    pub value: u32,
}

/// Structured view of a section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionView {
    /// Absolute start offset
    pub start: usize,
    /// Mode id
    pub mode_id: ModeId,
    /// All 12 i-menu slots in order
    pub imenu: Vec<ImenuEntry>,
    /// File-name prefix
    pub file_prefix: DecodedText,
    /// Scalar fields with non-zero values
    pub scalars: Vec<ScalarValue>,
}

impl SectionView {
    /// Number of slots whose id is known to the name table
    pub fn known_entries(&self) -> usize {
        self.imenu
            .iter()
            .filter(|e| matches!(e.setting, ImenuSetting::Known { .. }))
            .count()
    }
}
