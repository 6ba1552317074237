//! Search for i-menu tables by content.
//!
//! When the section offsets of a new firmware are unknown, a setting the
//! user knows is on their i-menu (say, Set Picture Control) can be used to
//! find the table directly: every 12-slot run of zero-padded small u32
//! values containing that id is a candidate, and the section start follows
//! from the table position.

use crate::layout::{IMENU_OFFSET, IMENU_SLOTS, IMENU_SLOT_SIZE, MODE_ID_OFFSET};
use serde::Serialize;
use std::collections::BTreeSet;

/// Default upper bound for a plausible setting id
pub const DEFAULT_MAX_SETTING_ID: u8 = 100;

const TABLE_LEN: usize = IMENU_SLOTS * IMENU_SLOT_SIZE;

/// A run of bytes that looks like an i-menu table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImenuCandidate {
    /// Absolute offset of slot 0
    pub table_start: usize,
    /// Implied section start, when the table is not too close to the start
    pub section_start: Option<usize>,
    /// Byte at the implied mode id position
    pub mode_byte: Option<u8>,
    /// Low bytes of all 12 slots
    pub values: [u8; IMENU_SLOTS],
    /// Slot index where the searched value was found first
    pub slot: usize,
}

/// Finds every aligned i-menu table holding `value`
///
/// Slots must be zero-padded little-endian u32 values no larger than
/// `max_id`. A table containing the value twice is reported once.
pub fn find_imenu_tables(blob: &[u8], value: u8, max_id: u8) -> Vec<ImenuCandidate> {
    let mut seen = BTreeSet::new();
    let mut candidates = Vec::new();

    // read_table rejects tables running past the end
    for pos in (0..blob.len()).step_by(IMENU_SLOT_SIZE) {
        if blob[pos] != value {
            continue;
        }
        for slot in 0..IMENU_SLOTS {
            let Some(table_start) = pos.checked_sub(slot * IMENU_SLOT_SIZE) else {
                break;
            };
            if seen.contains(&table_start) {
                continue;
            }
            let Some(values) = read_table(blob, table_start, max_id) else {
                continue;
            };
            seen.insert(table_start);

            let section_start = table_start.checked_sub(IMENU_OFFSET);
            let mode_byte = section_start.and_then(|s| blob.get(s + MODE_ID_OFFSET).copied());
            candidates.push(ImenuCandidate {
                table_start,
                section_start,
                mode_byte,
                values,
                slot,
            });
        }
    }

    candidates
}

fn read_table(blob: &[u8], start: usize, max_id: u8) -> Option<[u8; IMENU_SLOTS]> {
    let table = blob.get(start..start + TABLE_LEN)?;
    let mut values = [0u8; IMENU_SLOTS];
    for (value, slot) in values.iter_mut().zip(table.chunks_exact(IMENU_SLOT_SIZE)) {
        if slot[1..] != [0, 0, 0] || slot[0] > max_id {
            return None;
        }
        *value = slot[0];
    }
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_table(blob: &mut [u8], start: usize, ids: [u8; IMENU_SLOTS]) {
        for (i, id) in ids.iter().enumerate() {
            blob[start + i * 4..start + i * 4 + 4].copy_from_slice(&(*id as u32).to_le_bytes());
        }
    }

    #[test]
    fn test_finds_table_and_section() {
        let mut blob = vec![0xEEu8; 4000];
        let table_start = 1000 + IMENU_OFFSET;
        write_table(&mut blob, table_start, [31, 21, 22, 24, 1, 15, 70, 35, 8, 27, 16, 39]);
        blob[1000 + MODE_ID_OFFSET] = 32;

        let found = find_imenu_tables(&blob, 31, DEFAULT_MAX_SETTING_ID);
        assert_eq!(
            found,
            vec![ImenuCandidate {
                table_start,
                section_start: Some(1000),
                mode_byte: Some(32),
                values: [31, 21, 22, 24, 1, 15, 70, 35, 8, 27, 16, 39],
                slot: 0,
            }]
        );
    }

    #[test]
    fn test_rejects_unpadded_and_large_ids() {
        let mut blob = vec![0xEEu8; 400];
        write_table(&mut blob, 100, [31; IMENU_SLOTS]);
        blob[100 + 4 * 5 + 1] = 1; // padding byte
        assert!(find_imenu_tables(&blob, 31, 100).is_empty());

        write_table(&mut blob, 100, [31, 21, 200, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(find_imenu_tables(&blob, 31, 100).is_empty());
        assert_eq!(find_imenu_tables(&blob, 31, 255).len(), 1);
    }

    #[test]
    fn test_duplicate_values_reported_once() {
        let mut blob = vec![0xEEu8; 400];
        write_table(&mut blob, 64, [5, 31, 5, 31, 5, 5, 5, 5, 5, 5, 5, 5]);
        let found = find_imenu_tables(&blob, 31, 100);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].table_start, 64);
        assert_eq!(found[0].slot, 1);
        // Too close to the blob start for a section
        assert_eq!(found[0].section_start, None);
        assert_eq!(found[0].mode_byte, None);
    }

    #[test]
    fn test_table_at_blob_end() {
        let ids = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 31];

        let mut blob = vec![0xEEu8; 200];
        write_table(&mut blob, 200 - TABLE_LEN, ids);
        let found = find_imenu_tables(&blob, 31, 100);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].table_start, 200 - TABLE_LEN);
        assert_eq!(found[0].slot, 11);

        // Value in the last slot, a few bytes before the end
        let mut blob = vec![0xEEu8; 200];
        write_table(&mut blob, 200 - TABLE_LEN - 8, ids);
        let found = find_imenu_tables(&blob, 31, 100);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].table_start, 200 - TABLE_LEN - 8);
        assert_eq!(found[0].values, ids);
    }

    #[test]
    fn test_short_blob() {
        assert!(find_imenu_tables(&[31; 10], 31, 100).is_empty());
    }
}
