//! # zmenu-core
//!
//! A library for reading and editing the binary settings file (`NCSET*.BIN`)
//! of Nikon Z-series mirrorless cameras.
//!
//! The file is an opaque blob with no directory. This crate provides the
//! core functionality for:
//! - Locating the per-mode configuration sections (P/S/A/M/Auto and the
//!   U1-U3 user banks) through known offsets or a heuristic scan
//! - Decoding and editing the 12-slot i-menu table, mode id and file-name
//!   prefix of a section
//! - Copying and resetting whole sections
//! - Maintaining the trailing CRC-16/XMODEM checksum
//!
//! ## Architecture
//!
//! - [`checksum`]: CRC computation, verification and finalization
//! - [`layout`]: fixed geometry, header decoding and text fields
//! - [`names`]: setting-id labels and scalar field definitions
//! - [`locator`]: section discovery and validation
//! - [`codec`]: section field decoding and in-place writes
//! - [`mutate`]: whole-section copy and reset
//! - [`diff`]: byte-level comparison of two blobs
//! - [`custom`]: camera-wide custom settings
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use zmenu_core::{ChecksumEngine, SectionCodec, SectionLocator};
//! use std::fs;
//!
//! let mut blob = fs::read("NCSET007.BIN")?;
//!
//! let locator = SectionLocator::default();
//! let codec = SectionCodec::default();
//! for section in locator.locate(&blob) {
//!     let view = codec.decode(&blob, section.start)?;
//!     println!("{}: {} known i-menu entries", section.label, view.known_entries());
//! }
//!
//! // Edits never touch the checksum; finalize once before saving
//! if let Some(first) = locator.locate(&blob).first() {
//!     codec.write_imenu_slot(&mut blob, first.start, 0, 31)?;
//! }
//! ChecksumEngine::finalize(&mut blob)?;
//! fs::write("NCSET007.BIN", &blob)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! All operations work on a caller-owned `&[u8]` / `&mut [u8]`; the crate
//! performs no I/O of its own.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod checksum;
pub mod codec;
pub mod custom;
pub mod diff;
pub mod error;
pub mod layout;
pub mod locator;
pub mod mutate;
pub mod names;

// Re-export primary types for convenience
pub use checksum::{ChecksumEngine, ChecksumReport};
pub use codec::{ImenuEntry, ImenuSetting, SectionCodec, SectionView};
pub use custom::{AfcPriority, CustomSettings, FlashSyncSpeed};
pub use diff::{diff_blobs, ByteDiff, DiffLocation};
pub use error::{Error, Result};
pub use layout::{density_summary, CameraInfo, DecodedText, DensitySummary, ModeId, SECTION_SIZE};
pub use locator::{
    find_imenu_tables, DetectionMethod, LayoutTable, LocateStrategy, LocatedSection,
    LocatorConfig, ModelLayout, SectionLocator, SectionValidator, StrategyKind,
};
pub use mutate::BlobMutator;
pub use names::NameTable;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
