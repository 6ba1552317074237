//! Byte-level comparison of two settings blobs.

use crate::checksum::CHECKSUM_LEN;
use crate::error::{Error, Result};
use crate::layout::{IMENU_OFFSET, IMENU_SLOTS, IMENU_SLOT_SIZE};
use crate::locator::LocatedSection;
use serde::Serialize;

/// Where a differing byte sits
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffLocation {
    /// Inside the two-byte checksum trailer
    Checksum,
    /// Inside a located section
    Section {
        /// Label of the section
        label: String,
        /// Offset relative to the section start
        relative: usize,
        /// i-menu slot and byte within the slot, if the offset is in the table
        imenu: Option<(usize, usize)>,
    },
    /// Not covered by any located section
    Outside,
}

/// One differing byte
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ByteDiff {
    /// Absolute offset
    pub offset: usize,
    /// Byte in the first blob
    pub left: u8,
    /// Byte in the second blob
    pub right: u8,
    /// Annotation
    pub location: DiffLocation,
}

/// Lists every differing byte of two equal-length blobs
///
/// `sections` annotates offsets; the first section containing an offset wins.
pub fn diff_blobs(left: &[u8], right: &[u8], sections: &[LocatedSection]) -> Result<Vec<ByteDiff>> {
    if left.len() != right.len() {
        return Err(Error::LengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }

    let trailer = left.len().saturating_sub(CHECKSUM_LEN);
    let diffs = left
        .iter()
        .zip(right)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(offset, (&left, &right))| ByteDiff {
            offset,
            left,
            right,
            location: locate_offset(offset, trailer, sections),
        })
        .collect();

    Ok(diffs)
}

fn locate_offset(offset: usize, trailer: usize, sections: &[LocatedSection]) -> DiffLocation {
    if offset >= trailer {
        return DiffLocation::Checksum;
    }
    let Some(section) = sections.iter().find(|s| s.contains(offset)) else {
        return DiffLocation::Outside;
    };

    let relative = offset - section.start;
    let table = IMENU_OFFSET..IMENU_OFFSET + IMENU_SLOTS * IMENU_SLOT_SIZE;
    let imenu = table.contains(&relative).then(|| {
        let within = relative - IMENU_OFFSET;
        (within / IMENU_SLOT_SIZE, within % IMENU_SLOT_SIZE)
    });

    DiffLocation::Section {
        label: section.label.clone(),
        relative,
        imenu,
    }
}
