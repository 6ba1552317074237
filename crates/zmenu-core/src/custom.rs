//! Camera-wide custom settings stored at fixed blob offsets.
//!
//! Unlike section fields these offsets are absolute. Reads are tolerant and
//! keep unrecognised raw values; writes accept only values the camera
//! understands.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Absolute offset of a1 (AF-C priority selection)
pub const AFC_PRIORITY_OFFSET: usize = 1628;

/// Absolute offset of d2 (max continuous release)
pub const MAX_CONTINUOUS_RELEASE_OFFSET: usize = 1940;

/// Absolute offset of e1 (flash sync speed)
pub const FLASH_SYNC_SPEED_OFFSET: usize = 1964;

/// Accepted range for d2
pub const MAX_CONTINUOUS_RELEASE_RANGE: std::ops::RangeInclusive<u8> = 1..=200;

/// a1: what AF-C waits for before releasing the shutter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfcPriority {
    /// Release priority
    Release,
    /// Focus priority
    Focus,
    /// Unrecognised raw byte
    Unknown(u8),
}

impl AfcPriority {
    /// Raw byte stored in the blob
    pub fn to_byte(self) -> u8 {
        match self {
            AfcPriority::Release => 0,
            AfcPriority::Focus => 1,
            AfcPriority::Unknown(b) => b,
        }
    }
}

impl From<u8> for AfcPriority {
    fn from(value: u8) -> Self {
        match value {
            0 => AfcPriority::Release,
            1 => AfcPriority::Focus,
            other => AfcPriority::Unknown(other),
        }
    }
}

impl fmt::Display for AfcPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AfcPriority::Release => f.write_str("Release"),
            AfcPriority::Focus => f.write_str("Focus"),
            AfcPriority::Unknown(b) => write!(f, "Unknown ({})", b),
        }
    }
}

impl FromStr for AfcPriority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "release" => Ok(AfcPriority::Release),
            "focus" => Ok(AfcPriority::Focus),
            _ => Err(format!("unknown AF-C priority '{}' (release, focus)", s)),
        }
    }
}

/// e1: fastest shutter speed usable with flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashSyncSpeed {
    /// 1/200 s
    Sync200,
    /// 1/160 s
    Sync160,
    /// Unrecognised raw byte
    Unknown(u8),
}

impl FlashSyncSpeed {
    /// Raw byte stored in the blob
    pub fn to_byte(self) -> u8 {
        match self {
            FlashSyncSpeed::Sync200 => 184,
            FlashSyncSpeed::Sync160 => 176,
            FlashSyncSpeed::Unknown(b) => b,
        }
    }
}

impl From<u8> for FlashSyncSpeed {
    fn from(value: u8) -> Self {
        match value {
            184 => FlashSyncSpeed::Sync200,
            176 => FlashSyncSpeed::Sync160,
            other => FlashSyncSpeed::Unknown(other),
        }
    }
}

impl fmt::Display for FlashSyncSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashSyncSpeed::Sync200 => f.write_str("1/200 s"),
            FlashSyncSpeed::Sync160 => f.write_str("1/160 s"),
            FlashSyncSpeed::Unknown(b) => write!(f, "Unknown ({})", b),
        }
    }
}

impl FromStr for FlashSyncSpeed {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim_end_matches(" s").trim_end_matches('s') {
            "1/200" | "200" => Ok(FlashSyncSpeed::Sync200),
            "1/160" | "160" => Ok(FlashSyncSpeed::Sync160),
            _ => Err(format!("unknown flash sync speed '{}' (1/200, 1/160)", s)),
        }
    }
}

impl Serialize for AfcPriority {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Serialize for FlashSyncSpeed {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Custom settings read from a blob; `None` where the blob is too short
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CustomSettings {
    /// a1
    pub afc_priority: Option<AfcPriority>,
    /// d2, in frames
    pub max_continuous_release: Option<u8>,
    /// e1
    pub flash_sync_speed: Option<FlashSyncSpeed>,
}

impl CustomSettings {
    /// Reads all custom settings
    pub fn read(blob: &[u8]) -> Self {
        Self {
            afc_priority: blob.get(AFC_PRIORITY_OFFSET).map(|&b| AfcPriority::from(b)),
            max_continuous_release: blob.get(MAX_CONTINUOUS_RELEASE_OFFSET).copied(),
            flash_sync_speed: blob
                .get(FLASH_SYNC_SPEED_OFFSET)
                .map(|&b| FlashSyncSpeed::from(b)),
        }
    }

    /// Writes a1
    pub fn set_afc_priority(blob: &mut [u8], value: AfcPriority) -> Result<()> {
        if let AfcPriority::Unknown(b) = value {
            return Err(Error::InvalidValue {
                setting: "a1 AF-C priority selection",
                value: u32::from(b),
            });
        }
        write_byte(blob, AFC_PRIORITY_OFFSET, value.to_byte())
    }

    /// Writes d2; the value must lie in 1..=200
    pub fn set_max_continuous_release(blob: &mut [u8], frames: u32) -> Result<()> {
        let byte = u8::try_from(frames)
            .ok()
            .filter(|b| MAX_CONTINUOUS_RELEASE_RANGE.contains(b))
            .ok_or(Error::InvalidValue {
                setting: "d2 max continuous release",
                value: frames,
            })?;
        write_byte(blob, MAX_CONTINUOUS_RELEASE_OFFSET, byte)
    }

    /// Writes e1
    pub fn set_flash_sync_speed(blob: &mut [u8], value: FlashSyncSpeed) -> Result<()> {
        if let FlashSyncSpeed::Unknown(b) = value {
            return Err(Error::InvalidValue {
                setting: "e1 flash sync speed",
                value: u32::from(b),
            });
        }
        write_byte(blob, FLASH_SYNC_SPEED_OFFSET, value.to_byte())
    }
}

fn write_byte(blob: &mut [u8], offset: usize, byte: u8) -> Result<()> {
    let len = blob.len();
    let slot = blob
        .get_mut(offset)
        .ok_or_else(|| Error::out_of_bounds(offset, 1, len))?;
    debug!("Custom setting at {}: {} -> {}", offset, slot, byte);
    *slot = byte;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_tolerates_unknown_values() {
        let mut blob = vec![0u8; 2_000];
        blob[AFC_PRIORITY_OFFSET] = 9;
        blob[MAX_CONTINUOUS_RELEASE_OFFSET] = 100;
        blob[FLASH_SYNC_SPEED_OFFSET] = 176;

        let settings = CustomSettings::read(&blob);
        assert_eq!(settings.afc_priority, Some(AfcPriority::Unknown(9)));
        assert_eq!(settings.afc_priority.map(|v| v.to_string()).as_deref(), Some("Unknown (9)"));
        assert_eq!(settings.max_continuous_release, Some(100));
        assert_eq!(settings.flash_sync_speed, Some(FlashSyncSpeed::Sync160));
    }

    #[test]
    fn test_read_short_blob() {
        let settings = CustomSettings::read(&[0u8; 1_900]);
        assert_eq!(settings.afc_priority, Some(AfcPriority::Release));
        assert_eq!(settings.max_continuous_release, None);
        assert_eq!(settings.flash_sync_speed, None);
    }

    #[test]
    fn test_write_and_read_back() {
        let mut blob = vec![0u8; 2_000];
        CustomSettings::set_afc_priority(&mut blob, AfcPriority::Focus).unwrap();
        CustomSettings::set_max_continuous_release(&mut blob, 200).unwrap();
        CustomSettings::set_flash_sync_speed(&mut blob, FlashSyncSpeed::Sync200).unwrap();

        assert_eq!(blob[AFC_PRIORITY_OFFSET], 1);
        assert_eq!(blob[MAX_CONTINUOUS_RELEASE_OFFSET], 200);
        assert_eq!(blob[FLASH_SYNC_SPEED_OFFSET], 184);
        assert_eq!(
            CustomSettings::read(&blob),
            CustomSettings {
                afc_priority: Some(AfcPriority::Focus),
                max_continuous_release: Some(200),
                flash_sync_speed: Some(FlashSyncSpeed::Sync200),
            }
        );
    }

    #[test]
    fn test_write_rejects_invalid_values() {
        let mut blob = vec![0u8; 2_000];
        for frames in [0, 201, 1_000] {
            assert!(matches!(
                CustomSettings::set_max_continuous_release(&mut blob, frames),
                Err(Error::InvalidValue { value, .. }) if value == frames
            ));
        }
        assert!(CustomSettings::set_afc_priority(&mut blob, AfcPriority::Unknown(5)).is_err());
        assert!(
            CustomSettings::set_flash_sync_speed(&mut blob, FlashSyncSpeed::Unknown(1)).is_err()
        );
        assert!(blob.iter().all(|&b| b == 0));

        let mut short = vec![0u8; 100];
        assert!(matches!(
            CustomSettings::set_afc_priority(&mut short, AfcPriority::Focus),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_parse_from_str() {
        assert_eq!("Focus".parse::<AfcPriority>(), Ok(AfcPriority::Focus));
        assert_eq!("1/160".parse::<FlashSyncSpeed>(), Ok(FlashSyncSpeed::Sync160));
        assert_eq!("1/200 s".parse::<FlashSyncSpeed>(), Ok(FlashSyncSpeed::Sync200));
        assert!("1/250".parse::<FlashSyncSpeed>().is_err());
    }
}
