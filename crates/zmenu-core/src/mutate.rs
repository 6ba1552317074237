//! Whole-section operations.
//!
//! A section's mode id byte says which bank it is. Copying another mode's
//! settings into a user bank, or clearing it, must never change that byte,
//! so both operations capture it first and put it back afterwards.
//!
//! Neither operation finalizes the checksum; see
//! [`ChecksumEngine::finalize`](crate::ChecksumEngine::finalize).

use crate::error::{check_window, Result};
use crate::layout::{DEFAULT_PREFIX, MODE_ID_OFFSET, PREFIX_OFFSET, SECTION_SIZE};
use tracing::debug;

/// Copies and resets whole sections in place
#[derive(Debug, Clone, Copy, Default)]
pub struct BlobMutator;

impl BlobMutator {
    /// Copies the section at `source` over the one at `target`
    ///
    /// The target keeps its own mode id. Overlapping windows are handled.
    pub fn copy_section(blob: &mut [u8], source: usize, target: usize) -> Result<()> {
        check_window(source, SECTION_SIZE, blob.len())?;
        check_window(target, SECTION_SIZE, blob.len())?;

        let mode_byte = blob[target + MODE_ID_OFFSET];
        blob.copy_within(source..source + SECTION_SIZE, target);
        blob[target + MODE_ID_OFFSET] = mode_byte;

        debug!(
            "Copied section {} -> {} (kept mode id {})",
            source, target, mode_byte
        );
        Ok(())
    }

    /// Clears the section at `target` to its factory state
    ///
    /// Every byte becomes zero except the mode id, which is kept, and the
    /// file prefix, which becomes `DSC`.
    pub fn reset_section(blob: &mut [u8], target: usize) -> Result<()> {
        check_window(target, SECTION_SIZE, blob.len())?;

        let mode_byte = blob[target + MODE_ID_OFFSET];
        blob[target..target + SECTION_SIZE].fill(0);
        blob[target + MODE_ID_OFFSET] = mode_byte;

        let prefix = target + PREFIX_OFFSET;
        blob[prefix..prefix + DEFAULT_PREFIX.len()].copy_from_slice(DEFAULT_PREFIX);

        debug!("Reset section {} (kept mode id {})", target, mode_byte);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SectionCodec;
    use crate::error::Error;
    use crate::layout::{DecodedText, IMENU_OFFSET};

    fn two_sections() -> Vec<u8> {
        let mut blob: Vec<u8> = (0..2 * SECTION_SIZE + 2).map(|i| (i % 251) as u8).collect();
        blob[MODE_ID_OFFSET] = 32;
        blob[SECTION_SIZE + MODE_ID_OFFSET] = 34;
        blob
    }

    #[test]
    fn test_copy_preserves_target_mode_id() {
        let mut blob = two_sections();
        let source = blob[..SECTION_SIZE].to_vec();

        BlobMutator::copy_section(&mut blob, 0, SECTION_SIZE).unwrap();

        let target = &blob[SECTION_SIZE..2 * SECTION_SIZE];
        assert_eq!(target[MODE_ID_OFFSET], 34);
        for (i, (&a, &b)) in source.iter().zip(target).enumerate() {
            if i != MODE_ID_OFFSET {
                assert_eq!(a, b, "byte {} differs", i);
            }
        }
        // Source untouched
        assert_eq!(&blob[..SECTION_SIZE], &source[..]);
    }

    #[test]
    fn test_copy_onto_itself_is_noop() {
        let mut blob = two_sections();
        let before = blob.clone();
        BlobMutator::copy_section(&mut blob, SECTION_SIZE, SECTION_SIZE).unwrap();
        assert_eq!(blob, before);
    }

    #[test]
    fn test_copy_overlapping_windows() {
        let mut blob = two_sections();
        let source = blob[100..100 + SECTION_SIZE].to_vec();
        let target_mode = blob[150 + MODE_ID_OFFSET];
        BlobMutator::copy_section(&mut blob, 100, 150).unwrap();
        assert_eq!(blob[150 + MODE_ID_OFFSET], target_mode);
        assert_eq!(blob[150], source[0]);
        assert_eq!(blob[150 + SECTION_SIZE - 1], source[SECTION_SIZE - 1]);
    }

    #[test]
    fn test_reset_invariant() {
        let mut blob = two_sections();
        BlobMutator::reset_section(&mut blob, SECTION_SIZE).unwrap();

        let section = &blob[SECTION_SIZE..2 * SECTION_SIZE];
        for (i, &b) in section.iter().enumerate() {
            let kept = i == MODE_ID_OFFSET || (PREFIX_OFFSET..PREFIX_OFFSET + 3).contains(&i);
            if !kept {
                assert_eq!(b, 0, "byte {} not cleared", i);
            }
        }
        assert_eq!(section[MODE_ID_OFFSET], 34);
        assert_eq!(section[IMENU_OFFSET], 0);

        let codec = SectionCodec::default();
        assert_eq!(
            codec.read_prefix(&blob, SECTION_SIZE).unwrap(),
            DecodedText::Ascii("DSC".into())
        );
        // First section untouched
        assert_eq!(blob[MODE_ID_OFFSET], 32);
        assert_eq!(blob[1], 1);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut blob = two_sections();
        let len = blob.len();
        assert!(matches!(
            BlobMutator::copy_section(&mut blob, 0, len - SECTION_SIZE + 1),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(matches!(
            BlobMutator::reset_section(&mut blob, len),
            Err(Error::OutOfBounds { .. })
        ));
        assert_eq!(blob, two_sections());
    }
}
