//! Plausibility and quality scoring of candidate section windows.
//!
//! Unused sections in a settings blob are almost entirely zero-filled, so a
//! window is only considered a section when at least `min_density` of its
//! bytes are non-zero. Among plausible windows, the score rewards both
//! density and i-menu slots that decode to known setting ids: coherent slot
//! values are strong evidence that the window is correctly aligned.

use crate::layout::{imenu_slot_offset, IMENU_SLOTS, SECTION_SIZE};
use crate::names::NameTable;
use std::sync::Arc;

/// Default minimum fraction of non-zero bytes
pub const DEFAULT_MIN_DENSITY: f64 = 0.01;

const DENSITY_WEIGHT: f64 = 50.0;
const IMENU_ENTRY_WEIGHT: f64 = 5.0;

/// Decides whether a window looks like a configuration section
#[derive(Debug, Clone)]
pub struct SectionValidator {
    names: Arc<NameTable>,
    min_density: f64,
}

impl SectionValidator {
    /// Creates a validator using the default density threshold
    pub fn new(names: Arc<NameTable>) -> Self {
        Self {
            names,
            min_density: DEFAULT_MIN_DENSITY,
        }
    }

    /// Sets the minimum fraction of non-zero bytes
    pub fn min_density(mut self, min_density: f64) -> Self {
        self.min_density = min_density;
        self
    }

    /// The name table used to recognise i-menu entries
    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// Fraction of non-zero bytes in the section window at `start`
    ///
    /// Returns `None` if the window does not fit inside `blob`.
    pub fn density(&self, blob: &[u8], start: usize) -> Option<f64> {
        let end = start.checked_add(SECTION_SIZE)?;
        let window = blob.get(start..end)?;
        let nonzero = window.iter().filter(|&&b| b != 0).count();
        Some(fraction(nonzero))
    }

    /// Returns true if a full section fits at `start` and is dense enough
    pub fn is_plausible(&self, blob: &[u8], start: usize) -> bool {
        self.density(blob, start)
            .is_some_and(|density| self.passes(density))
    }

    /// Quality score; 0 when the window is not plausible
    pub fn score(&self, blob: &[u8], start: usize) -> f64 {
        match self.density(blob, start) {
            Some(density) if self.passes(density) => self.score_dense(blob, start, density),
            _ => 0.0,
        }
    }

    /// Number of i-menu slots whose low byte is a known setting id
    pub fn valid_imenu_entries(&self, blob: &[u8], start: usize) -> usize {
        (0..IMENU_SLOTS)
            .filter_map(|i| blob.get(start + imenu_slot_offset(i)))
            .filter(|&&id| self.names.is_known(id))
            .count()
    }

    pub(crate) fn passes(&self, density: f64) -> bool {
        density >= self.min_density
    }

    pub(crate) fn score_dense(&self, blob: &[u8], start: usize, density: f64) -> f64 {
        density * DENSITY_WEIGHT + self.valid_imenu_entries(blob, start) as f64 * IMENU_ENTRY_WEIGHT
    }
}

fn fraction(nonzero: usize) -> f64 {
    nonzero as f64 / SECTION_SIZE as f64
}

/// Prefix sums of non-zero bytes, so window densities cost O(1)
///
/// A heuristic scan may test thousands of candidate starts; recounting 6628
/// bytes for each would dominate the scan.
#[derive(Debug, Clone)]
pub(crate) struct DensityIndex {
    prefix: Vec<u32>,
}

impl DensityIndex {
    pub(crate) fn build(blob: &[u8]) -> Self {
        let mut prefix = Vec::with_capacity(blob.len() + 1);
        let mut running = 0u32;
        prefix.push(running);
        for &b in blob {
            running += u32::from(b != 0);
            prefix.push(running);
        }
        Self { prefix }
    }

    /// Density of the section window at `start`, if it fits
    pub(crate) fn density(&self, start: usize) -> Option<f64> {
        let end = start.checked_add(SECTION_SIZE)?;
        let hi = *self.prefix.get(end)?;
        let lo = self.prefix[start];
        Some(fraction((hi - lo) as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::IMENU_OFFSET;

    fn validator() -> SectionValidator {
        SectionValidator::new(Arc::new(NameTable::z5()))
    }

    /// A zeroed blob holding one window at `start` with `nonzero` filler bytes
    fn window_with(nonzero: usize, start: usize) -> Vec<u8> {
        let mut blob = vec![0u8; start + SECTION_SIZE + 2];
        // Stay clear of the i-menu so the filler never scores as entries
        for b in &mut blob[start + 2000..start + 2000 + nonzero] {
            *b = 0xAA;
        }
        blob
    }

    #[test]
    fn test_threshold() {
        let v = validator();
        // 67 / 6628 is the smallest count reaching 1%
        assert!(v.is_plausible(&window_with(67, 0), 0));
        assert!(!v.is_plausible(&window_with(66, 0), 0));
        // 0.5%
        assert!(!v.is_plausible(&window_with(34, 0), 0));
    }

    #[test]
    fn test_window_must_fit() {
        let v = validator();
        let blob = vec![0xFFu8; SECTION_SIZE - 1];
        assert!(!v.is_plausible(&blob, 0));
        assert_eq!(v.score(&blob, 0), 0.0);
        assert!(v.density(&blob, usize::MAX).is_none());
    }

    #[test]
    fn test_score_counts_known_entries() {
        let v = validator();
        let mut blob = window_with(100, 10);
        let base = v.score(&blob, 10);
        assert!(base > 0.0);

        blob[10 + IMENU_OFFSET] = 31;
        blob[10 + IMENU_OFFSET + 4] = 21;
        blob[10 + IMENU_OFFSET + 8] = 200; // unknown id
        // The zero slots already counted ("Active D-Lighting"), so only the
        // unknown id and the added density change the score.
        let density = v.density(&blob, 10).unwrap();
        assert_eq!(v.valid_imenu_entries(&blob, 10), 11);
        assert!((v.score(&blob, 10) - (density * 50.0 + 55.0)).abs() < 1e-9);
        assert!(v.score(&blob, 10) != base);
    }

    #[test]
    fn test_custom_threshold() {
        let v = validator().min_density(0.5);
        assert!(!v.is_plausible(&window_with(100, 0), 0));
        let v = validator().min_density(0.0);
        assert!(v.is_plausible(&vec![0u8; SECTION_SIZE], 0));
    }

    #[test]
    fn test_density_index_matches_direct_count() {
        let v = validator();
        let mut blob = window_with(500, 300);
        blob[17] = 1;
        blob[300 + SECTION_SIZE - 1] = 9;
        let index = DensityIndex::build(&blob);
        for start in [0, 1, 17, 299, 300, 301] {
            assert_eq!(index.density(start), v.density(&blob, start));
        }
        assert_eq!(index.density(blob.len()), None);
    }
}
