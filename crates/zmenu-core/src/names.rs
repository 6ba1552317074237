//! Lookup tables consumed by the validator and the codec.
//!
//! A [`NameTable`] is plain data: which i-menu setting id carries which
//! label, and which scalar fields inside a section are worth showing. It is
//! immutable once built and shared through an `Arc`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An opaque 32-bit setting at a fixed section-relative offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarField {
    /// Offset relative to the section start
    pub offset: usize,
    /// Label shown next to the value
    pub label: String,
}

impl ScalarField {
    /// Creates a new scalar field
    pub fn new(offset: usize, label: impl Into<String>) -> Self {
        Self {
            offset,
            label: label.into(),
        }
    }
}

/// Setting-id labels and scalar field list for one camera family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameTable {
    /// i-menu setting id to label
    pub settings: BTreeMap<u8, String>,
    /// Scalar fields decoded alongside the i-menu
    #[serde(default)]
    pub scalar_fields: Vec<ScalarField>,
}

impl Default for NameTable {
    fn default() -> Self {
        Self::z5()
    }
}

impl NameTable {
    /// Creates a table from explicit entries
    pub fn new(
        settings: impl IntoIterator<Item = (u8, String)>,
        scalar_fields: Vec<ScalarField>,
    ) -> Self {
        Self {
            settings: settings.into_iter().collect(),
            scalar_fields,
        }
    }

    /// Parses a table from JSON
    ///
    /// ```
    /// use zmenu_core::NameTable;
    ///
    /// let table = NameTable::from_json(r#"{"settings": {"21": "Image Quality"}}"#)?;
    /// assert_eq!(table.setting_name(21), Some("Image Quality"));
    /// # Ok::<(), zmenu_core::Error>(())
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::NameTableParse)
    }

    /// Label for a setting id, if the id is known
    pub fn setting_name(&self, id: u8) -> Option<&str> {
        self.settings.get(&id).map(String::as_str)
    }

    /// Returns true if `id` is present in the table
    pub fn is_known(&self, id: u8) -> bool {
        self.settings.contains_key(&id)
    }

    /// Table for the Z5 family
    pub fn z5() -> Self {
        let settings = Z5_SETTINGS
            .iter()
            .map(|&(id, name)| (id, name.to_string()));
        let scalars = Z5_SCALAR_FIELDS
            .iter()
            .map(|&(offset, label)| ScalarField::new(offset, label))
            .collect();
        Self::new(settings, scalars)
    }
}

const Z5_SETTINGS: &[(u8, &str)] = &[
    (0, "Active D-Lighting"),
    (1, "AF area mode"),
    (2, "AF tracking sensitivity"),
    (3, "Auto bracketing"),
    (4, "Bluetooth connection"),
    (5, "Monitor/viewfinder brightness"),
    (6, "Color space"),
    (7, "Choose image area"),
    (8, "Custom controls"),
    (9, "Shutter type"),
    (10, "Electronic front-curtain shutter"),
    (11, "Exposure compensation"),
    (12, "Exposure delay mode"),
    (13, "Flash compensation"),
    (14, "Flash mode"),
    (15, "Focus Mode"),
    (16, "Focus peaking"),
    (17, "HDR"),
    (18, "Highlight-weighted metering"),
    (19, "High ISO NR"),
    (20, "Image review"),
    (21, "Image Quality"),
    (22, "Image Size"),
    (23, "ISO display"),
    (24, "ISO sensitivity settings"),
    (25, "Long exposure NR"),
    (26, "Apply settings to live view"),
    (27, "Metering"),
    (28, "Matrix metering"),
    (29, "Multiple Exposure"),
    (30, "Peaking Highlights"),
    (31, "Set Picture Control"),
    (32, "Release Mode"),
    (33, "Silent Photography"),
    (34, "Split-screen display zoom"),
    (35, "Vibration Reduction"),
    (36, "White Balance"),
    (37, "White balance fine-tuning"),
    (38, "Wifi connection"),
    (39, "View memory card info"),
    (40, "Interval timer shooting"),
    (41, "Time-lapse movie"),
    (42, "Focus shift shooting"),
    (43, "Wind noise reduction"),
    (44, "Zebras"),
    (45, "Movie quality"),
    (46, "Movie frame size/frame rate"),
    (47, "Movie microphone"),
    (48, "Movie wind noise reduction"),
    (49, "HDMI output resolution"),
    (50, "Copyright information"),
    (51, "Group flash options"),
    (52, "FV lock"),
    (53, "BKT button assignment"),
    (54, "Fn1 button assignment"),
    (55, "Fn2 button assignment"),
    (56, "AF-assist illuminator"),
    (57, "Beep options"),
    (58, "Touch controls"),
    (59, "Eye-Detection AF"),
    (60, "Animal-Detection AF"),
    (61, "Subject tracking"),
    (62, "Wide-area AF (L)"),
    (63, "Wide-area AF (S)"),
    (64, "Auto-area AF"),
    (65, "Pinpoint AF"),
    (66, "Airplane mode"),
    (67, "Dynamic-area AF"),
    (68, "3D-tracking"),
    (69, "Group-area AF"),
    (70, "Tone mode"),
    (71, "Spot metering"),
    (72, "Center-weighted metering"),
    (73, "Flash sync speed"),
    (74, "Flash control mode"),
    (75, "Wireless flash control"),
    (76, "Built-in flash mode"),
    (77, "Commander mode"),
    (78, "Remote flash control"),
    (79, "TTL flash mode"),
    (80, "Manual flash mode"),
];

// Offsets observed to hold non-zero values; labels are best guesses.
const Z5_SCALAR_FIELDS: &[(usize, &str)] = &[
    (0, "Unknown setting A"),
    (50, "Unknown setting B"),
    (100, "ISO related"),
    (200, "Focus related"),
    (300, "Exposure related"),
    (400, "Flash related"),
    (500, "WB related"),
    (600, "Picture Control related"),
    (700, "VR related"),
    (800, "Custom functions"),
    (900, "Button assignments"),
    (1000, "Display related"),
    (1100, "Playback related"),
    (1200, "Video related"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z5_table() {
        let table = NameTable::z5();
        assert_eq!(table.setting_name(31), Some("Set Picture Control"));
        assert_eq!(table.setting_name(21), Some("Image Quality"));
        assert_eq!(table.setting_name(0), Some("Active D-Lighting"));
        assert!(table.is_known(80));
        assert!(!table.is_known(81));
        assert_eq!(table.settings.len(), 81);
        assert_eq!(table.scalar_fields.len(), 14);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "settings": {"1": "AF-area mode", "70": "Tone mode"},
            "scalar_fields": [{"offset": 100, "label": "ISO"}]
        }"#;
        let table = NameTable::from_json(json).unwrap();
        assert_eq!(table.setting_name(1), Some("AF-area mode"));
        assert!(!table.is_known(31));
        assert_eq!(table.scalar_fields, vec![ScalarField::new(100, "ISO")]);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = NameTable::from_json("{\"settings\": 3}").unwrap_err();
        assert!(matches!(err, Error::NameTableParse(_)));
    }
}
