//! Known section offsets per camera family.
//!
//! Section starts are firmware-specific constants that have been measured,
//! not derived. They are injected into the locator as a [`LayoutTable`] so a
//! new camera can be supported by loading a JSON table instead of editing
//! code.

use crate::error::{Error, Result};
use crate::layout::{CameraInfo, ModeId};
use serde::{Deserialize, Serialize};

/// One section at a fixed absolute offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownSection {
    /// Absolute section start
    pub offset: usize,
    /// Logical name, e.g. `U1`
    pub label: String,
    /// Mode id bytes accepted at this slot; empty accepts anything
    #[serde(default)]
    pub accepted_modes: Vec<u8>,
}

impl KnownSection {
    /// Creates a section that accepts any mode id
    pub fn new(offset: usize, label: impl Into<String>) -> Self {
        Self {
            offset,
            label: label.into(),
            accepted_modes: Vec::new(),
        }
    }

    /// Restricts the mode ids accepted at this slot
    pub fn accepting(mut self, modes: impl IntoIterator<Item = ModeId>) -> Self {
        self.accepted_modes = modes.into_iter().map(ModeId::to_byte).collect();
        self
    }

    /// Returns true if `mode_byte` is acceptable for this slot
    pub fn accepts(&self, mode_byte: u8) -> bool {
        self.accepted_modes.is_empty() || self.accepted_modes.contains(&mode_byte)
    }
}

/// Section offsets of one camera model family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLayout {
    /// Family name, e.g. `Z5 Mark 2`
    pub name: String,
    /// Header model strings that select this family (prefix match)
    #[serde(default)]
    pub model_prefixes: Vec<String>,
    /// Firmware prefixes; empty matches every firmware
    #[serde(default)]
    pub firmware_prefixes: Vec<String>,
    /// Sections in probe order
    pub sections: Vec<KnownSection>,
}

impl ModelLayout {
    /// Returns true if the header identifies this family
    pub fn matches(&self, info: &CameraInfo) -> bool {
        let model = info.model_str();
        let firmware = info.firmware_str();
        !model.is_empty()
            && self.model_prefixes.iter().any(|p| model.starts_with(p.as_str()))
            && (self.firmware_prefixes.is_empty()
                || self
                    .firmware_prefixes
                    .iter()
                    .any(|p| firmware.starts_with(p.as_str())))
    }
}

/// Ordered collection of model layouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutTable {
    /// Layouts in match and probe order
    pub layouts: Vec<ModelLayout>,
}

impl Default for LayoutTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LayoutTable {
    /// Creates a table from layouts, in priority order
    pub fn new(layouts: Vec<ModelLayout>) -> Self {
        Self { layouts }
    }

    /// A table with no layouts; locating always falls back to scanning
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Parses a table from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::LayoutParse)
    }

    /// First layout whose model/firmware prefixes match the header
    pub fn find(&self, info: &CameraInfo) -> Option<&ModelLayout> {
        self.layouts.iter().find(|layout| layout.matches(info))
    }

    /// Layouts measured on Z5 Mark 2 and Z5 bodies
    ///
    /// Mark 2 comes first: its model string also starts with the Z5 one.
    pub fn builtin() -> Self {
        let exposure_modes = [
            ModeId::Program,
            ModeId::ShutterPriority,
            ModeId::AperturePriority,
            ModeId::Manual,
            ModeId::Auto,
        ];

        let mark2 = ModelLayout {
            name: "Z5 Mark 2".to_string(),
            model_prefixes: vec!["Z5_2".into(), "Z 5_2".into(), "Z5II".into(), "Z 5II".into()],
            firmware_prefixes: Vec::new(),
            sections: vec![
                KnownSection::new(250_612, "M/A/S/P Settings (Main)").accepting(exposure_modes),
                KnownSection::new(272_312, "M/A/S/P Settings (Backup)")
                    .accepting(exposure_modes),
                KnownSection::new(294_012, "U1"),
                KnownSection::new(315_712, "U2"),
                KnownSection::new(337_412, "U3"),
            ],
        };

        let mark1 = ModelLayout {
            name: "Z5".to_string(),
            model_prefixes: vec!["Z5".into(), "Z 5".into()],
            firmware_prefixes: Vec::new(),
            sections: vec![
                KnownSection::new(169_824, "Primary M/A/S/P/Auto").accepting(exposure_modes),
                KnownSection::new(176_452, "Secondary M/A/S/P/Auto").accepting(exposure_modes),
                KnownSection::new(183_080, "U1"),
                KnownSection::new(189_708, "U2"),
                KnownSection::new(196_336, "U3"),
            ],
        };

        Self::new(vec![mark2, mark1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DecodedText;

    fn info(model: &str, firmware: &str) -> CameraInfo {
        CameraInfo {
            model: Some(DecodedText::Ascii(model.into())),
            firmware: Some(DecodedText::Ascii(firmware.into())),
        }
    }

    #[test]
    fn test_builtin_matching_order() {
        let table = LayoutTable::builtin();
        assert_eq!(table.find(&info("Z5_2", "1.00")).unwrap().name, "Z5 Mark 2");
        assert_eq!(table.find(&info("Z 5", "1.00")).unwrap().name, "Z5");
        assert!(table.find(&info("Z 6", "1.00")).is_none());
        assert!(table.find(&info("", "")).is_none());
    }

    #[test]
    fn test_firmware_prefixes() {
        let layout = ModelLayout {
            name: "fw-specific".into(),
            model_prefixes: vec!["Z".into()],
            firmware_prefixes: vec!["2.".into()],
            sections: Vec::new(),
        };
        assert!(layout.matches(&info("Z 5", "2.01")));
        assert!(!layout.matches(&info("Z 5", "1.10")));
    }

    #[test]
    fn test_accepts() {
        let any = KnownSection::new(0, "U1");
        assert!(any.accepts(0));
        assert!(any.accepts(36));

        let manual = KnownSection::new(0, "M").accepting([ModeId::Manual]);
        assert!(manual.accepts(32));
        assert!(!manual.accepts(34));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{"layouts": [{
            "name": "Test",
            "model_prefixes": ["TEST"],
            "sections": [{"offset": 1000, "label": "Main", "accepted_modes": [32]}]
        }]}"#;
        let table = LayoutTable::from_json(json).unwrap();
        let layout = table.find(&info("TEST-CAM", "")).unwrap();
        assert_eq!(layout.sections[0].offset, 1000);
        assert!(layout.firmware_prefixes.is_empty());

        assert!(matches!(
            LayoutTable::from_json("[]").unwrap_err(),
            Error::LayoutParse(_)
        ));
    }
}
