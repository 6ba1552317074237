//! Finding configuration sections inside an opaque settings blob.
//!
//! The blob has no directory: sections sit at model- and firmware-specific
//! offsets with nothing marking where they begin. The locator therefore runs
//! a small state machine over two strategies, first success wins:
//!
//! 1. **Known offsets.** The header model string selects a [`ModelLayout`]
//!    from the injected [`LayoutTable`]. Each listed offset is kept if its
//!    window is plausible and its mode id byte is one the slot accepts.
//! 2. **Heuristic scan.** For every mode id value 29..=36, each occurrence
//!    of that byte at position `p` implies a section start at `p - 1240`.
//!    Plausible candidates are scored and only the best one per mode id is
//!    kept. Winners whose starts lie within `dedup_window` bytes of an
//!    earlier winner are the same physical section and are dropped.
//!
//! Finding nothing is not an error: the locator returns an empty list and
//! the caller reports "no sections found".

mod layouts;
mod pattern;
mod validator;

use crate::layout::{CameraInfo, ModeId, MODE_ID_OFFSET, SECTION_SIZE};
use crate::names::NameTable;
use serde::Serialize;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, trace};

pub use layouts::{KnownSection, LayoutTable, ModelLayout};
pub use pattern::{find_imenu_tables, ImenuCandidate, DEFAULT_MAX_SETTING_ID};
pub use validator::{SectionValidator, DEFAULT_MIN_DENSITY};

use validator::DensityIndex;

/// Default proximity under which two scan winners are one section
pub const DEFAULT_DEDUP_WINDOW: usize = 100;

/// How a section was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Listed in a layout table
    KnownOffset {
        /// Name of the layout family
        layout: String,
    },
    /// Found by the mode-id scan
    HeuristicScan,
}

/// A section found in a blob
///
/// Derived data: it describes where a section is, it does not own any bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedSection {
    /// Absolute start offset
    pub start: usize,
    /// Mode id byte found in the section
    pub mode_id: ModeId,
    /// Quality score from the validator
    pub score: f64,
    /// Strategy that produced this section
    pub method: DetectionMethod,
    /// Logical name, e.g. `U1` or `Manual (Auto-detected)`
    pub label: String,
}

impl LocatedSection {
    /// Absolute end offset (exclusive)
    pub fn end(&self) -> usize {
        self.start + SECTION_SIZE
    }

    /// Absolute byte range of the section
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Returns true if the absolute `offset` falls inside the section
    pub fn contains(&self, offset: usize) -> bool {
        self.range().contains(&offset)
    }
}

/// Which strategies the locator may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// Known offsets, falling back to the scan
    #[default]
    Auto,
    /// Known offsets only
    KnownOffset,
    /// Scan only
    HeuristicScan,
}

/// Concrete strategy selected for one blob
#[derive(Debug, Clone, PartialEq)]
pub enum LocateStrategy {
    /// Probe these layouts in order; the first one yielding sections wins
    KnownOffset(Vec<ModelLayout>),
    /// Scan for mode id bytes
    HeuristicScan,
}

/// Configuration for the locator
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Minimum fraction of non-zero bytes in a section window
    pub min_density: f64,
    /// Scan winners closer than this are treated as one section
    pub dedup_window: usize,
    /// Probe every known layout when the model string matches none
    pub probe_unmatched_layouts: bool,
    /// Restricts the strategies used
    pub strategy: StrategyKind,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            min_density: DEFAULT_MIN_DENSITY,
            dedup_window: DEFAULT_DEDUP_WINDOW,
            probe_unmatched_layouts: true,
            strategy: StrategyKind::Auto,
        }
    }
}

impl LocatorConfig {
    /// Creates a new locator config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum section density
    pub fn min_density(mut self, min_density: f64) -> Self {
        self.min_density = min_density;
        self
    }

    /// Sets the deduplication window
    pub fn dedup_window(mut self, window: usize) -> Self {
        self.dedup_window = window;
        self
    }

    /// Sets whether unmatched models probe every known layout
    pub fn probe_unmatched_layouts(mut self, probe: bool) -> Self {
        self.probe_unmatched_layouts = probe;
        self
    }

    /// Restricts the strategies used
    pub fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Locates configuration sections in a blob
#[derive(Debug, Clone)]
pub struct SectionLocator {
    validator: SectionValidator,
    layouts: LayoutTable,
    config: LocatorConfig,
}

impl Default for SectionLocator {
    fn default() -> Self {
        Self::new(Arc::new(NameTable::z5()), LayoutTable::builtin())
    }
}

impl SectionLocator {
    /// Creates a locator with default configuration
    pub fn new(names: Arc<NameTable>, layouts: LayoutTable) -> Self {
        Self::with_config(names, layouts, LocatorConfig::default())
    }

    /// Creates a locator with custom configuration
    pub fn with_config(names: Arc<NameTable>, layouts: LayoutTable, config: LocatorConfig) -> Self {
        let validator = SectionValidator::new(names).min_density(config.min_density);
        Self {
            validator,
            layouts,
            config,
        }
    }

    /// The validator used to accept and score windows
    pub fn validator(&self) -> &SectionValidator {
        &self.validator
    }

    /// Picks the first strategy to try for a blob with this header
    pub fn select_strategy(&self, info: &CameraInfo) -> LocateStrategy {
        if self.config.strategy == StrategyKind::HeuristicScan {
            return LocateStrategy::HeuristicScan;
        }
        if let Some(layout) = self.layouts.find(info) {
            debug!("Header model '{}' selects layout '{}'", info.model_str(), layout.name);
            return LocateStrategy::KnownOffset(vec![layout.clone()]);
        }
        if self.config.probe_unmatched_layouts && !self.layouts.layouts.is_empty() {
            debug!(
                "Header model '{}' matches no layout, probing all {}",
                info.model_str(),
                self.layouts.layouts.len()
            );
            return LocateStrategy::KnownOffset(self.layouts.layouts.clone());
        }
        if self.config.strategy == StrategyKind::KnownOffset {
            return LocateStrategy::KnownOffset(Vec::new());
        }
        LocateStrategy::HeuristicScan
    }

    /// Finds all sections in `blob`
    pub fn locate(&self, blob: &[u8]) -> Vec<LocatedSection> {
        let info = CameraInfo::read(blob);
        let strategy = self.select_strategy(&info);
        self.locate_with(blob, &strategy)
    }

    /// Runs `strategy`, falling back to the scan when allowed
    pub fn locate_with(&self, blob: &[u8], strategy: &LocateStrategy) -> Vec<LocatedSection> {
        match strategy {
            LocateStrategy::KnownOffset(layouts) => {
                let sections = self.probe_layouts(blob, layouts);
                if !sections.is_empty() || self.config.strategy == StrategyKind::KnownOffset {
                    return sections;
                }
                debug!("No known-offset sections, falling back to heuristic scan");
                self.scan(blob)
            }
            LocateStrategy::HeuristicScan => self.scan(blob),
        }
    }

    /// Probes layouts in order and returns the sections of the first hit
    pub fn probe_layouts(&self, blob: &[u8], layouts: &[ModelLayout]) -> Vec<LocatedSection> {
        for layout in layouts {
            let sections = self.probe_layout(blob, layout);
            if !sections.is_empty() {
                debug!(
                    "Layout '{}' yielded {} section(s)",
                    layout.name,
                    sections.len()
                );
                return sections;
            }
        }
        Vec::new()
    }

    /// Checks every known offset of one layout
    pub fn probe_layout(&self, blob: &[u8], layout: &ModelLayout) -> Vec<LocatedSection> {
        let mut sections = Vec::new();

        for known in &layout.sections {
            if !self.validator.is_plausible(blob, known.offset) {
                trace!("{} at {}: not plausible", known.label, known.offset);
                continue;
            }
            // is_plausible guarantees the whole window, mode byte included
            let mode_byte = blob[known.offset + MODE_ID_OFFSET];
            if !known.accepts(mode_byte) {
                trace!(
                    "{} at {}: mode id {} not accepted",
                    known.label,
                    known.offset,
                    mode_byte
                );
                continue;
            }
            sections.push(LocatedSection {
                start: known.offset,
                mode_id: ModeId::from(mode_byte),
                score: self.validator.score(blob, known.offset),
                method: DetectionMethod::KnownOffset {
                    layout: layout.name.clone(),
                },
                label: known.label.clone(),
            });
        }

        sections
    }

    /// Heuristic scan over every mode id value
    pub fn scan(&self, blob: &[u8]) -> Vec<LocatedSection> {
        debug!("Starting heuristic scan of {} bytes", blob.len());
        let index = DensityIndex::build(blob);
        let mut sections: Vec<LocatedSection> = Vec::new();

        for mode in ModeId::ALL {
            let Some(best) = self.best_candidate(blob, &index, mode) else {
                trace!("No plausible candidate for {}", mode);
                continue;
            };

            if let Some(kept) = sections
                .iter()
                .find(|s| s.start.abs_diff(best.start) < self.config.dedup_window)
            {
                trace!(
                    "{} candidate at {} duplicates {} at {}",
                    mode,
                    best.start,
                    kept.label,
                    kept.start
                );
                continue;
            }

            debug!(
                "Found {} section at {} (score {:.1})",
                mode, best.start, best.score
            );
            sections.push(best);
        }

        debug!("Scan complete: found {} sections", sections.len());
        sections
    }

    /// Highest-scoring plausible candidate for one mode id; ties keep the first
    fn best_candidate(
        &self,
        blob: &[u8],
        index: &DensityIndex,
        mode: ModeId,
    ) -> Option<LocatedSection> {
        let needle = mode.to_byte();
        let mut best: Option<(usize, f64)> = None;

        for (pos, _) in blob
            .iter()
            .enumerate()
            .skip(MODE_ID_OFFSET)
            .filter(|&(_, &b)| b == needle)
        {
            let start = pos - MODE_ID_OFFSET;
            let Some(density) = index.density(start) else {
                // Every later start is even further past the end
                break;
            };
            if !self.validator.passes(density) {
                continue;
            }
            let score = self.validator.score_dense(blob, start, density);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((start, score));
            }
        }

        best.map(|(start, score)| LocatedSection {
            start,
            mode_id: mode,
            score,
            method: DetectionMethod::HeuristicScan,
            label: format!("{} (Auto-detected)", mode),
        })
    }
}
