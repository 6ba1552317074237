//! Decoding and in-place encoding of section fields.
//!
//! The codec only touches the fields it understands: the mode id, the 12
//! i-menu slots, the file-name prefix and a sparse list of scalar fields.
//! Every other byte of a section is left exactly as it was.
//!
//! Writes never touch the checksum. Callers batch their edits and call
//! [`ChecksumEngine::finalize`](crate::ChecksumEngine::finalize) once at the
//! end.

mod view;

use crate::error::{check_window, Error, Result};
use crate::layout::{
    imenu_slot_offset, read_u32_le, DecodedText, ModeId, IMENU_SLOTS, IMENU_SLOT_SIZE,
    MODE_ID_OFFSET, PREFIX_LEN, PREFIX_OFFSET, SECTION_SIZE,
};
use crate::names::NameTable;
use std::sync::Arc;
use tracing::trace;

pub use view::{ImenuEntry, ImenuSetting, ScalarValue, SectionView};

/// Reads and writes the structured fields of a section
#[derive(Debug, Clone)]
pub struct SectionCodec {
    names: Arc<NameTable>,
}

impl Default for SectionCodec {
    fn default() -> Self {
        Self::new(Arc::new(NameTable::z5()))
    }
}

impl SectionCodec {
    /// Creates a codec resolving setting ids through `names`
    pub fn new(names: Arc<NameTable>) -> Self {
        Self { names }
    }

    /// Decodes the section starting at `start`
    pub fn decode(&self, blob: &[u8], start: usize) -> Result<SectionView> {
        check_window(start, SECTION_SIZE, blob.len())?;

        let imenu = (0..IMENU_SLOTS)
            .map(|slot| self.read_imenu_slot(blob, start, slot))
            .collect::<Result<Vec<_>>>()?;

        let scalars = self
            .names
            .scalar_fields
            .iter()
            .filter(|field| field.offset <= SECTION_SIZE - 4)
            .filter_map(|field| {
                let value = read_u32_le(blob, start + field.offset)?;
                (value != 0).then(|| ScalarValue {
                    offset: field.offset,
                    label: field.label.clone(),
                    value,
                })
            })
            .collect();

        Ok(SectionView {
            start,
            mode_id: self.mode_id(blob, start)?,
            imenu,
            file_prefix: self.read_prefix(blob, start)?,
            scalars,
        })
    }

    /// Reads the mode id byte
    pub fn mode_id(&self, blob: &[u8], start: usize) -> Result<ModeId> {
        let pos = start.saturating_add(MODE_ID_OFFSET);
        blob.get(pos)
            .map(|&b| ModeId::from(b))
            .ok_or_else(|| Error::out_of_bounds(pos, 1, blob.len()))
    }

    /// Reads and resolves one i-menu slot
    pub fn read_imenu_slot(&self, blob: &[u8], start: usize, slot: usize) -> Result<ImenuEntry> {
        let pos = slot_position(blob, start, slot)?;
        // slot_position checked the whole 4-byte field
        let raw = read_u32_le(blob, pos).ok_or_else(|| Error::internal("slot read failed"))?;
        let id = (raw & 0xFF) as u8;
        let setting = match (id, self.names.setting_name(id)) {
            (0, _) => ImenuSetting::Empty,
            (id, Some(name)) => ImenuSetting::Known {
                id,
                name: name.to_string(),
            },
            (id, None) => ImenuSetting::Unknown { id },
        };
        Ok(ImenuEntry { slot, raw, setting })
    }

    /// Writes `setting_id` into the low byte of a slot and clears its padding
    pub fn write_imenu_slot(
        &self,
        blob: &mut [u8],
        start: usize,
        slot: usize,
        setting_id: u8,
    ) -> Result<()> {
        let pos = slot_position(blob, start, slot)?;
        blob[pos..pos + IMENU_SLOT_SIZE].copy_from_slice(&u32::from(setting_id).to_le_bytes());
        trace!("Wrote setting {} to slot {} of section {}", setting_id, slot, start);
        Ok(())
    }

    /// Reads the file-name prefix, falling back to hex for non-ASCII bytes
    pub fn read_prefix(&self, blob: &[u8], start: usize) -> Result<DecodedText> {
        let pos = start.saturating_add(PREFIX_OFFSET);
        check_window(pos, PREFIX_LEN, blob.len())?;
        Ok(DecodedText::decode(&blob[pos..pos + PREFIX_LEN]))
    }

    /// Replaces the file-name prefix
    ///
    /// The field is zero-filled first. `prefix` is cut to its first 10
    /// characters, then non-ASCII and NUL characters are dropped, so a
    /// dropped character still counts towards the limit.
    pub fn write_prefix(&self, blob: &mut [u8], start: usize, prefix: &str) -> Result<()> {
        let pos = start.saturating_add(PREFIX_OFFSET);
        check_window(pos, PREFIX_LEN, blob.len())?;

        let kept = prefix
            .chars()
            .take(PREFIX_LEN)
            .filter(|&c| c.is_ascii() && c != '\0');
        let field = &mut blob[pos..pos + PREFIX_LEN];
        field.fill(0);
        for (dst, c) in field.iter_mut().zip(kept) {
            *dst = c as u8;
        }
        Ok(())
    }
}

/// Absolute position of a slot, after validating index and bounds
fn slot_position(blob: &[u8], start: usize, slot: usize) -> Result<usize> {
    if slot >= IMENU_SLOTS {
        return Err(Error::InvalidSlot { index: slot });
    }
    let pos = start.saturating_add(imenu_slot_offset(slot));
    check_window(pos, IMENU_SLOT_SIZE, blob.len())?;
    Ok(pos)
}
