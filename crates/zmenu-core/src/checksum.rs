//! Trailing checksum of a settings blob.
//!
//! The last two bytes of every blob hold a big-endian CRC-16/XMODEM
//! (polynomial `0x1021`, initial value 0, no reflection, no final XOR)
//! computed over every preceding byte. [`ChecksumEngine::finalize`] is the
//! one operation that restores this invariant; every mutation path has to
//! end with it before the blob is written anywhere.

use crate::error::{Error, Result};
use serde::Serialize;
use tracing::{debug, warn};

/// CRC-16/XMODEM generator polynomial
const POLY: u16 = 0x1021;

/// Size of the checksum trailer
pub const CHECKSUM_LEN: usize = 2;

#[inline]
fn update_byte(mut crc: u16, b: u8) -> u16 {
    crc ^= (b as u16) << 8;
    for _ in 0..8 {
        crc = if crc & 0x8000 != 0 {
            (crc << 1) ^ POLY
        } else {
            crc << 1
        };
    }
    crc
}

/// Stored and computed checksum of a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChecksumReport {
    /// Value held in the trailing two bytes
    pub stored: u16,
    /// Value computed over the body
    pub computed: u16,
}

impl ChecksumReport {
    /// Returns true if the stored trailer matches the body
    pub fn is_valid(&self) -> bool {
        self.stored == self.computed
    }
}

/// Computes, verifies and rewrites the trailing CRC
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumEngine;

impl ChecksumEngine {
    /// CRC-16/XMODEM over `bytes`
    pub fn compute(bytes: &[u8]) -> u16 {
        bytes.iter().fold(0u16, |crc, &b| update_byte(crc, b))
    }

    /// Reads the stored trailer and computes the expected one
    ///
    /// Returns `None` for blobs shorter than the trailer.
    pub fn inspect(blob: &[u8]) -> Option<ChecksumReport> {
        let body_len = blob.len().checked_sub(CHECKSUM_LEN)?;
        let (body, trailer) = blob.split_at(body_len);
        Some(ChecksumReport {
            stored: u16::from_be_bytes([trailer[0], trailer[1]]),
            computed: Self::compute(body),
        })
    }

    /// Returns true if the trailer matches the body; never fails
    pub fn verify(blob: &[u8]) -> bool {
        Self::inspect(blob).is_some_and(|report| report.is_valid())
    }

    /// Like [`verify`](Self::verify), but reports a mismatch as an error
    ///
    /// The resulting [`Error::ChecksumMismatch`] is recoverable: callers
    /// usually surface it as a warning and keep going.
    pub fn ensure_valid(blob: &[u8]) -> Result<ChecksumReport> {
        let report = Self::inspect(blob).ok_or(Error::BlobTooShort {
            len: blob.len(),
            min: CHECKSUM_LEN,
        })?;
        if !report.is_valid() {
            warn!(
                "Checksum mismatch: stored 0x{:04X}, computed 0x{:04X}",
                report.stored, report.computed
            );
            return Err(Error::ChecksumMismatch {
                stored: report.stored,
                computed: report.computed,
            });
        }
        Ok(report)
    }

    /// Overwrites the trailer with the CRC of the body
    pub fn finalize(blob: &mut [u8]) -> Result<u16> {
        let body_len = blob
            .len()
            .checked_sub(CHECKSUM_LEN)
            .ok_or(Error::BlobTooShort {
                len: blob.len(),
                min: CHECKSUM_LEN,
            })?;
        let crc = Self::compute(&blob[..body_len]);
        blob[body_len..].copy_from_slice(&crc.to_be_bytes());
        debug!("Finalized checksum 0x{:04X} over {} bytes", crc, body_len);
        Ok(crc)
    }
}
