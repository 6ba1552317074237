//! zmenu - Inspect and edit Nikon Z menu-settings files
//!
//! This tool locates the per-mode configuration sections inside an
//! `NCSETxxx.BIN` blob, decodes their i-menu tables and file-name prefixes,
//! and applies edits while keeping the trailing checksum valid.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;
use zmenu_core::locator::DEFAULT_MAX_SETTING_ID;
use zmenu_core::{
    density_summary, diff_blobs, find_imenu_tables, AfcPriority, BlobMutator, CameraInfo,
    ChecksumEngine, ChecksumReport, CustomSettings, DecodedText, DensitySummary,
    DetectionMethod, DiffLocation, Error, FlashSyncSpeed, ImenuSetting, LayoutTable, LocatedSection,
    LocatorConfig, ModeId, NameTable, SectionCodec, SectionLocator, SectionView, StrategyKind,
};

/// Inspect and edit Nikon Z menu-settings files
#[derive(Parser, Debug)]
#[command(name = "zmenu")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// JSON file replacing the built-in section layout table
    #[arg(long, global = true, env = "ZMENU_LAYOUTS")]
    layouts: Option<PathBuf>,

    /// JSON file replacing the built-in setting name table
    #[arg(long, global = true, env = "ZMENU_NAMES")]
    names: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show header, size, checksum status and byte density
    Info {
        /// Settings file
        file: PathBuf,
    },

    /// Locate and decode all configuration sections
    Dump {
        #[command(flatten)]
        input: InputMode,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Section locating strategy
        #[arg(long, value_enum, default_value = "auto")]
        strategy: StrategyArg,
    },

    /// Put a setting into one i-menu slot
    SetImenu {
        /// Settings file
        file: PathBuf,

        /// Section label, mode name or absolute offset
        #[arg(long)]
        section: SectionSelector,

        /// Slot number as shown on the camera (1-12)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=12))]
        slot: u8,

        /// Setting id (0 clears the slot)
        #[arg(long)]
        setting: u8,

        #[command(flatten)]
        write: WriteOptions,
    },

    /// Change the file-name prefix of a section
    SetPrefix {
        /// Settings file
        file: PathBuf,

        /// Section label, mode name or absolute offset
        #[arg(long)]
        section: SectionSelector,

        /// New prefix (ASCII, at most 10 characters are kept)
        prefix: String,

        #[command(flatten)]
        write: WriteOptions,
    },

    /// Copy one section over another, keeping the target's mode id
    Copy {
        /// Settings file
        file: PathBuf,

        /// Source section
        #[arg(long)]
        from: SectionSelector,

        /// Target section
        #[arg(long)]
        to: SectionSelector,

        #[command(flatten)]
        write: WriteOptions,
    },

    /// Reset a section to factory state, keeping its mode id
    Reset {
        /// Settings file
        file: PathBuf,

        /// Section label, mode name or absolute offset
        #[arg(long)]
        section: SectionSelector,

        #[command(flatten)]
        write: WriteOptions,
    },

    /// Recompute the trailing checksum
    FixChecksum {
        /// Settings file
        file: PathBuf,

        #[command(flatten)]
        write: WriteOptions,
    },

    /// Write camera-wide custom settings
    SetCustom {
        /// Settings file
        file: PathBuf,

        /// a1 AF-C priority selection (release, focus)
        #[arg(long)]
        afc_priority: Option<AfcPriority>,

        /// d2 max continuous release (1-200)
        #[arg(long)]
        max_release: Option<u32>,

        /// e1 flash sync speed (1/200, 1/160)
        #[arg(long)]
        flash_sync: Option<FlashSyncSpeed>,

        #[command(flatten)]
        write: WriteOptions,
    },

    /// List byte differences between two settings files
    Diff {
        /// First file
        left: PathBuf,

        /// Second file
        right: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Search for i-menu tables containing a setting id
    FindImenu {
        /// Settings file
        file: PathBuf,

        /// Setting id that is known to be on the i-menu
        #[arg(long)]
        value: u8,

        /// Largest id accepted in the other slots
        #[arg(long, default_value_t = DEFAULT_MAX_SETTING_ID)]
        max_id: u8,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single settings file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Directory searched recursively for NCSET*.BIN files
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Where and how an edited blob is persisted
#[derive(Args, Debug, Clone, Default)]
struct WriteOptions {
    /// Write the result here instead of editing in place
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite an existing --output file
    #[arg(long)]
    force: bool,

    /// Apply the edits in memory only
    #[arg(long)]
    dry_run: bool,

    /// Do not keep a backup when editing in place
    #[arg(long)]
    no_backup: bool,
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Section locating strategy
#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Known offsets, then the heuristic scan
    Auto,
    /// Known offsets only
    Known,
    /// Heuristic scan only
    Scan,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Auto => StrategyKind::Auto,
            StrategyArg::Known => StrategyKind::KnownOffset,
            StrategyArg::Scan => StrategyKind::HeuristicScan,
        }
    }
}

/// Picks a section by label, mode name or absolute offset
#[derive(Debug, Clone, PartialEq, Eq)]
enum SectionSelector {
    Offset(usize),
    Name(String),
}

impl FromStr for SectionSelector {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty section selector".to_string());
        }
        let offset = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => usize::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        };
        Ok(match offset {
            Some(offset) => SectionSelector::Offset(offset),
            None => SectionSelector::Name(s.to_string()),
        })
    }
}

impl SectionSelector {
    /// Resolves to a section start; labels win over mode names
    fn resolve(&self, sections: &[LocatedSection]) -> Result<usize> {
        let name = match self {
            SectionSelector::Offset(offset) => return Ok(*offset),
            SectionSelector::Name(name) => name,
        };

        let by_label = sections.iter().find(|s| s.label.eq_ignore_ascii_case(name));
        let by_mode = || {
            sections
                .iter()
                .find(|s| s.mode_id.name().eq_ignore_ascii_case(name))
        };
        if let Some(section) = by_label.or_else(by_mode) {
            debug!("Selector '{}' resolved to {} at {}", name, section.label, section.start);
            return Ok(section.start);
        }

        if sections.is_empty() {
            bail!("No sections found; select '{}' by absolute offset instead", name);
        }
        let available: Vec<String> = sections
            .iter()
            .map(|s| format!("{} ({})", s.label, s.mode_id))
            .collect();
        bail!(
            "No section matches '{}'. Available: {}",
            name,
            available.join(", ")
        )
    }
}

/// Tables shared by every command
struct Toolkit {
    names: Arc<NameTable>,
    layouts: LayoutTable,
}

impl Toolkit {
    fn load(cli: &Cli) -> Result<Self> {
        let names = match &cli.names {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read name table: {}", path.display()))?;
                NameTable::from_json(&json)
                    .with_context(|| format!("Invalid name table: {}", path.display()))?
            }
            None => NameTable::z5(),
        };
        let layouts = match &cli.layouts {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read layout table: {}", path.display()))?;
                LayoutTable::from_json(&json)
                    .with_context(|| format!("Invalid layout table: {}", path.display()))?
            }
            None => LayoutTable::builtin(),
        };
        Ok(Self {
            names: Arc::new(names),
            layouts,
        })
    }

    fn locator(&self, strategy: StrategyKind) -> SectionLocator {
        SectionLocator::with_config(
            Arc::clone(&self.names),
            self.layouts.clone(),
            LocatorConfig::new().strategy(strategy),
        )
    }

    fn codec(&self) -> SectionCodec {
        SectionCodec::new(Arc::clone(&self.names))
    }
}

impl Default for Toolkit {
    fn default() -> Self {
        Self {
            names: Arc::new(NameTable::z5()),
            layouts: LayoutTable::builtin(),
        }
    }
}

/// One decoded section in a dump
#[derive(Serialize)]
struct SectionReport {
    #[serde(flatten)]
    located: LocatedSection,
    view: SectionView,
}

/// Everything `dump` reports about one file
#[derive(Serialize)]
struct FileReport {
    file: PathBuf,
    size: usize,
    camera: CameraInfo,
    checksum: Option<ChecksumReport>,
    density: DensitySummary,
    custom: CustomSettings,
    sections: Vec<SectionReport>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let toolkit = Toolkit::load(&cli)?;

    match &cli.command {
        Command::Info { file } => cmd_info(file),
        Command::Dump {
            input,
            format,
            strategy,
        } => {
            if let Some(file) = &input.file {
                cmd_dump_file(&toolkit, file, *format, (*strategy).into())
            } else if let Some(directory) = &input.directory {
                cmd_dump_directory(&toolkit, directory, *format, (*strategy).into())
            } else {
                bail!("Either --file or --directory must be specified")
            }
        }
        Command::SetImenu {
            file,
            section,
            slot,
            setting,
            write,
        } => cmd_set_imenu(&toolkit, file, section, *slot, *setting, write),
        Command::SetPrefix {
            file,
            section,
            prefix,
            write,
        } => cmd_set_prefix(&toolkit, file, section, prefix, write),
        Command::Copy {
            file,
            from,
            to,
            write,
        } => cmd_copy(&toolkit, file, from, to, write),
        Command::Reset {
            file,
            section,
            write,
        } => cmd_reset(&toolkit, file, section, write),
        Command::FixChecksum { file, write } => cmd_fix_checksum(file, write),
        Command::SetCustom {
            file,
            afc_priority,
            max_release,
            flash_sync,
            write,
        } => cmd_set_custom(file, *afc_priority, *max_release, *flash_sync, write),
        Command::Diff {
            left,
            right,
            format,
        } => cmd_diff(&toolkit, left, right, *format),
        Command::FindImenu {
            file,
            value,
            max_id,
        } => cmd_find_imenu(&toolkit, file, *value, *max_id),
    }
}

/// Reads a settings file, warning when its checksum does not match
fn read_blob(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        bail!("Input file does not exist: {}", path.display());
    }
    let blob = fs::read(path).map_err(|e| Error::file_read(path, e))?;
    trace!("Read {} bytes from {}", blob.len(), path.display());

    match ChecksumEngine::inspect(&blob) {
        Some(report) if !report.is_valid() => warn!(
            "{}: CRC mismatch (stored 0x{:04X}, computed 0x{:04X}), file may be corrupted",
            path.display(),
            report.stored,
            report.computed
        ),
        Some(_) => {}
        None => warn!("{}: too short to carry a checksum", path.display()),
    }
    Ok(blob)
}

fn checksum_line(report: Option<ChecksumReport>) -> String {
    match report {
        Some(r) if r.is_valid() => format!("0x{:04X} (valid)", r.stored),
        Some(r) => format!(
            "0x{:04X} (INVALID, expected 0x{:04X}) - file may be corrupted",
            r.stored, r.computed
        ),
        None => "(missing)".to_string(),
    }
}

fn cmd_info(file: &Path) -> Result<()> {
    let blob = read_blob(file)?;
    let camera = CameraInfo::read(&blob);
    let density = density_summary(&blob);
    let custom = CustomSettings::read(&blob);

    println!("File: {}", file.display());
    println!("Size: {} bytes", blob.len());
    print_camera(&camera);
    println!("CRC checksum: {}", checksum_line(ChecksumEngine::inspect(&blob)));
    println!(
        "Bytes: {} zero, {} non-zero ({:.2}% density)",
        density.zero_bytes,
        density.nonzero_bytes,
        density.density * 100.0
    );
    print_custom(&custom);
    Ok(())
}

fn print_camera(camera: &CameraInfo) {
    let show = |field: &Option<DecodedText>| {
        field
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "(unavailable)".to_string())
    };
    println!("Camera model: {}", show(&camera.model));
    println!("Firmware: {}", show(&camera.firmware));
}

fn print_custom(custom: &CustomSettings) {
    let show = |value: Option<String>| value.unwrap_or_else(|| "(unavailable)".to_string());
    println!("Custom settings:");
    println!(
        "  a1 AF-C priority selection: {}",
        show(custom.afc_priority.map(|v| v.to_string()))
    );
    println!(
        "  d2 Max continuous release:  {}",
        show(custom.max_continuous_release.map(|v| v.to_string()))
    );
    println!(
        "  e1 Flash sync speed:        {}",
        show(custom.flash_sync_speed.map(|v| v.to_string()))
    );
}

fn build_report(toolkit: &Toolkit, file: &Path, strategy: StrategyKind) -> Result<FileReport> {
    let blob = read_blob(file)?;
    let codec = toolkit.codec();
    let sections = toolkit
        .locator(strategy)
        .locate(&blob)
        .into_iter()
        .map(|located| {
            let view = codec
                .decode(&blob, located.start)
                .with_context(|| format!("Failed to decode section at {}", located.start))?;
            Ok(SectionReport { located, view })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FileReport {
        file: file.to_path_buf(),
        size: blob.len(),
        camera: CameraInfo::read(&blob),
        checksum: ChecksumEngine::inspect(&blob),
        density: density_summary(&blob),
        custom: CustomSettings::read(&blob),
        sections,
    })
}

fn print_report(report: &FileReport) {
    println!("File: {}", report.file.display());
    println!("Size: {} bytes", report.size);
    print_camera(&report.camera);
    println!("CRC checksum: {}", checksum_line(report.checksum));

    if report.sections.is_empty() {
        println!("No sections found");
        return;
    }

    for section in &report.sections {
        let located = &section.located;
        let method = match &located.method {
            DetectionMethod::KnownOffset { layout } => format!("known offset, {}", layout),
            DetectionMethod::HeuristicScan => "heuristic scan".to_string(),
        };
        println!();
        println!("=== {} ===", located.label);
        println!(
            "Offset: {} (0x{:X}), mode: {}, score: {:.1} ({})",
            located.start, located.start, located.mode_id, located.score, method
        );
        println!("File prefix: {}", section.view.file_prefix);
        println!("i-menu:");
        for entry in &section.view.imenu {
            let padding = if entry.has_padding_bytes() {
                format!("  [raw 0x{:08X}]", entry.raw)
            } else {
                String::new()
            };
            println!("  {:2}. {}{}", entry.slot + 1, entry.setting, padding);
        }
        if !section.view.scalars.is_empty() {
            println!("Values:");
            for scalar in &section.view.scalars {
                println!("  +{:<5} {}: {}", scalar.offset, scalar.label, scalar.value);
            }
        }
    }
}

fn emit_reports(reports: &[FileReport], format: OutputFormat, single: bool) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for (i, report) in reports.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                print_report(report);
            }
        }
        OutputFormat::Json => {
            let json = if single {
                match reports.first() {
                    Some(report) => serde_json::to_string_pretty(report)?,
                    None => "null".to_string(),
                }
            } else {
                serde_json::to_string_pretty(reports)?
            };
            println!("{}", json);
        }
    }
    Ok(())
}

fn cmd_dump_file(
    toolkit: &Toolkit,
    file: &Path,
    format: OutputFormat,
    strategy: StrategyKind,
) -> Result<()> {
    let report = build_report(toolkit, file, strategy)?;
    emit_reports(&[report], format, true)
}

fn cmd_dump_directory(
    toolkit: &Toolkit,
    directory: &Path,
    format: OutputFormat,
    strategy: StrategyKind,
) -> Result<()> {
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }
    info!("Scanning directory: {}", directory.display());

    let mut reports = Vec::new();
    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_settings_file(path) {
            trace!("Skipping: {}", path.display());
            continue;
        }

        debug!("Processing: {}", path.display());
        match build_report(toolkit, path, strategy) {
            Ok(report) => reports.push(report),
            // Log error but continue with other files
            Err(e) => warn!("Error processing {}: {:#}", path.display(), e),
        }
    }

    info!("Processed {} settings files", reports.len());
    if reports.is_empty() && format == OutputFormat::Text {
        println!("No settings files found in {}", directory.display());
        return Ok(());
    }
    emit_reports(&reports, format, false)
}

/// Matches `NCSET*.BIN`, case-insensitively, skipping hidden files
fn is_settings_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }
    let upper = name.to_ascii_uppercase();
    upper.starts_with("NCSET") && upper.ends_with(".BIN")
}

/// Short content hash (first 8 hex chars of blake3)
fn content_hash(bytes: &[u8]) -> String {
    let hash = blake3::hash(bytes);
    hash.to_hex()[..8].to_string()
}

/// `<name>~<hash>.bak` next to the original
fn backup_path(path: &Path, original: &[u8]) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "settings".to_string());
    path.with_file_name(format!("{}~{}.bak", name, content_hash(original)))
}

/// Loads `file`, applies `edit`, finalizes the checksum once and persists
///
/// `edit` returns a one-line description of what it changed.
fn run_edit<F>(file: &Path, opts: &WriteOptions, edit: F) -> Result<()>
where
    F: FnOnce(&mut Vec<u8>) -> Result<String>,
{
    let original = read_blob(file)?;
    let mut blob = original.clone();

    let summary = edit(&mut blob)?;
    let crc = ChecksumEngine::finalize(&mut blob)
        .with_context(|| format!("Failed to finalize checksum of {}", file.display()))?;
    println!("{} (checksum 0x{:04X})", summary, crc);

    persist(file, &original, &blob, opts)
}

fn persist(file: &Path, original: &[u8], blob: &[u8], opts: &WriteOptions) -> Result<()> {
    if opts.dry_run {
        let target = opts.output.as_deref().unwrap_or(file);
        println!("Dry run: would write {} bytes to {}", blob.len(), target.display());
        return Ok(());
    }

    if let Some(output) = &opts.output {
        if output.exists() && !opts.force {
            bail!(
                "File already exists: {} (use --force to overwrite)",
                output.display()
            );
        }
        fs::write(output, blob).map_err(|e| Error::file_write(output, e))?;
        println!("Wrote {}", output.display());
        return Ok(());
    }

    if original == blob {
        println!("No changes to write");
        return Ok(());
    }

    if !opts.no_backup {
        let backup = backup_path(file, original);
        fs::write(&backup, original).map_err(|e| Error::file_write(&backup, e))?;
        info!("Backup written to {}", backup.display());
        println!("Backup: {}", backup.display());
    }

    fs::write(file, blob).map_err(|e| Error::file_write(file, e))?;
    println!("Wrote {}", file.display());
    Ok(())
}

fn cmd_set_imenu(
    toolkit: &Toolkit,
    file: &Path,
    section: &SectionSelector,
    slot: u8,
    setting: u8,
    opts: &WriteOptions,
) -> Result<()> {
    run_edit(file, opts, |blob| {
        let start = section.resolve(&toolkit.locator(StrategyKind::Auto).locate(blob))?;
        let codec = toolkit.codec();
        let index = usize::from(slot) - 1;

        let before = codec.read_imenu_slot(blob, start, index)?;
        codec.write_imenu_slot(blob, start, index, setting)?;
        let after = codec.read_imenu_slot(blob, start, index)?;
        if matches!(after.setting, ImenuSetting::Unknown { .. }) {
            warn!("Setting id {} is not in the name table", setting);
        }
        Ok(format!(
            "Section {} slot {}: {} -> {}",
            start, slot, before.setting, after.setting
        ))
    })
}

fn cmd_set_prefix(
    toolkit: &Toolkit,
    file: &Path,
    section: &SectionSelector,
    prefix: &str,
    opts: &WriteOptions,
) -> Result<()> {
    if !prefix.is_ascii() {
        warn!("Non-ASCII characters in '{}' will be dropped", prefix);
    }
    run_edit(file, opts, |blob| {
        let start = section.resolve(&toolkit.locator(StrategyKind::Auto).locate(blob))?;
        let codec = toolkit.codec();
        let before = codec.read_prefix(blob, start)?;
        codec.write_prefix(blob, start, prefix)?;
        let after = codec.read_prefix(blob, start)?;
        Ok(format!("Section {} file prefix: {} -> {}", start, before, after))
    })
}

fn cmd_copy(
    toolkit: &Toolkit,
    file: &Path,
    from: &SectionSelector,
    to: &SectionSelector,
    opts: &WriteOptions,
) -> Result<()> {
    run_edit(file, opts, |blob| {
        let sections = toolkit.locator(StrategyKind::Auto).locate(blob);
        let source = from.resolve(&sections)?;
        let target = to.resolve(&sections)?;
        if source == target {
            bail!("Source and target are the same section ({})", source);
        }
        BlobMutator::copy_section(blob, source, target)?;
        let mode = toolkit.codec().mode_id(blob, target)?;
        Ok(format!(
            "Copied section {} to {} (target keeps mode {})",
            source, target, mode
        ))
    })
}

fn cmd_reset(
    toolkit: &Toolkit,
    file: &Path,
    section: &SectionSelector,
    opts: &WriteOptions,
) -> Result<()> {
    run_edit(file, opts, |blob| {
        let start = section.resolve(&toolkit.locator(StrategyKind::Auto).locate(blob))?;
        BlobMutator::reset_section(blob, start)?;
        let mode = toolkit.codec().mode_id(blob, start)?;
        Ok(format!("Reset section {} (mode {})", start, mode))
    })
}

fn cmd_fix_checksum(file: &Path, opts: &WriteOptions) -> Result<()> {
    run_edit(file, opts, |blob| {
        Ok(match ChecksumEngine::inspect(blob) {
            Some(report) if report.is_valid() => "Checksum already valid".to_string(),
            Some(report) => format!("Checksum was 0x{:04X}", report.stored),
            None => "Blob has no checksum trailer".to_string(),
        })
    })
}

fn cmd_set_custom(
    file: &Path,
    afc_priority: Option<AfcPriority>,
    max_release: Option<u32>,
    flash_sync: Option<FlashSyncSpeed>,
    opts: &WriteOptions,
) -> Result<()> {
    if afc_priority.is_none() && max_release.is_none() && flash_sync.is_none() {
        bail!("Nothing to change: pass --afc-priority, --max-release or --flash-sync");
    }
    run_edit(file, opts, |blob| {
        let mut changed = Vec::new();
        if let Some(value) = afc_priority {
            CustomSettings::set_afc_priority(blob, value)?;
            changed.push(format!("a1 = {}", value));
        }
        if let Some(frames) = max_release {
            CustomSettings::set_max_continuous_release(blob, frames)?;
            changed.push(format!("d2 = {}", frames));
        }
        if let Some(value) = flash_sync {
            CustomSettings::set_flash_sync_speed(blob, value)?;
            changed.push(format!("e1 = {}", value));
        }
        Ok(format!("Custom settings: {}", changed.join(", ")))
    })
}

fn cmd_diff(toolkit: &Toolkit, left: &Path, right: &Path, format: OutputFormat) -> Result<()> {
    let a = read_blob(left)?;
    let b = read_blob(right)?;
    let sections = toolkit.locator(StrategyKind::Auto).locate(&a);
    let diffs = diff_blobs(&a, &b, &sections)
        .with_context(|| format!("Cannot compare {} and {}", left.display(), right.display()))?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&diffs)?);
        return Ok(());
    }

    println!(
        "{} byte(s) differ between {} and {}",
        diffs.len(),
        left.display(),
        right.display()
    );
    for diff in &diffs {
        let location = match &diff.location {
            DiffLocation::Checksum => "checksum".to_string(),
            DiffLocation::Outside => "outside known sections".to_string(),
            DiffLocation::Section {
                label,
                relative,
                imenu: Some((slot, byte)),
            } => format!("{} +{} (i-menu slot {}, byte {})", label, relative, slot + 1, byte),
            DiffLocation::Section {
                label,
                relative,
                imenu: None,
            } => format!("{} +{}", label, relative),
        };
        println!(
            "  0x{:06X}: {:02X} -> {:02X}  {}",
            diff.offset, diff.left, diff.right, location
        );
    }
    Ok(())
}

fn cmd_find_imenu(toolkit: &Toolkit, file: &Path, value: u8, max_id: u8) -> Result<()> {
    let blob = read_blob(file)?;
    let candidates = find_imenu_tables(&blob, value, max_id);
    let name = toolkit.names.setting_name(value).unwrap_or("unknown setting");

    println!(
        "Found {} i-menu table candidate(s) containing {} ({})",
        candidates.len(),
        value,
        name
    );
    for candidate in &candidates {
        let values: Vec<String> = candidate.values.iter().map(|v| v.to_string()).collect();
        println!(
            "  table at {} (slot {}): [{}]",
            candidate.table_start,
            candidate.slot + 1,
            values.join(", ")
        );
        match (candidate.section_start, candidate.mode_byte) {
            (Some(start), Some(mode)) => println!(
                "    implied section start {} (0x{:X}), mode byte {} ({})",
                start,
                start,
                mode,
                ModeId::from(mode)
            ),
            (Some(start), None) => println!("    implied section start {}", start),
            _ => println!("    too close to the start of the file for a section"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zmenu_core::layout::{imenu_slot_offset, MODE_ID_OFFSET, PREFIX_OFFSET};

    const MAIN: usize = 250_612;
    const U1: usize = 294_012;

    fn plant(blob: &mut [u8], start: usize, mode: u8) {
        for b in &mut blob[start + 3_000..start + 3_100] {
            *b = 0x40;
        }
        blob[start + MODE_ID_OFFSET] = mode;
        blob[start + imenu_slot_offset(0)] = 31;
        blob[start + PREFIX_OFFSET..start + PREFIX_OFFSET + 3].copy_from_slice(b"DSC");
    }

    fn settings_file(dir: &TempDir) -> PathBuf {
        let mut blob = vec![0u8; 350_000];
        blob[..4].copy_from_slice(b"Z5_2");
        plant(&mut blob, MAIN, 32);
        plant(&mut blob, U1, 34);
        ChecksumEngine::finalize(&mut blob).unwrap();
        let path = dir.path().join("NCSET007.BIN");
        fs::write(&path, &blob).unwrap();
        path
    }

    fn section(start: usize, label: &str, mode: u8) -> LocatedSection {
        LocatedSection {
            start,
            mode_id: mode.into(),
            score: 1.0,
            method: DetectionMethod::HeuristicScan,
            label: label.to_string(),
        }
    }

    #[test]
    fn test_selector_parse() {
        let parse = |s: &str| s.parse::<SectionSelector>();
        assert_eq!(parse("250612"), Ok(SectionSelector::Offset(250_612)));
        assert_eq!(parse("0x3D2F4"), Ok(SectionSelector::Offset(0x3D2F4)));
        assert_eq!(parse(" u1 "), Ok(SectionSelector::Name("u1".to_string())));
        assert!("".parse::<SectionSelector>().is_err());
    }

    #[test]
    fn test_selector_resolve() {
        let sections = vec![
            section(100, "M/A/S/P Settings (Main)", 32),
            section(9_000, "U1", 34),
        ];
        let resolve = |s: &str| s.parse::<SectionSelector>().unwrap().resolve(&sections);

        assert_eq!(resolve("u1").unwrap(), 9_000);
        assert_eq!(resolve("manual").unwrap(), 100);
        assert_eq!(resolve("m/a/s/p settings (main)").unwrap(), 100);
        assert_eq!(resolve("42").unwrap(), 42);
        let err = resolve("U3").unwrap_err().to_string();
        assert!(err.contains("Available"));
        assert!(SectionSelector::Name("U1".into()).resolve(&[]).is_err());
    }

    #[test]
    fn test_is_settings_file() {
        assert!(is_settings_file(Path::new("/card/NCSET007.BIN")));
        assert!(is_settings_file(Path::new("ncset001.bin")));
        assert!(!is_settings_file(Path::new(".NCSET007.BIN")));
        assert!(!is_settings_file(Path::new("NCSET007.BIN.bak")));
        assert!(!is_settings_file(Path::new("DSC_0001.JPG")));
    }

    #[test]
    fn test_content_hash_and_backup_path() {
        let hash1 = content_hash(b"hello");
        assert_eq!(hash1, content_hash(b"hello"));
        assert_ne!(hash1, content_hash(b"world"));
        assert_eq!(hash1.len(), 8);

        let backup = backup_path(Path::new("/card/NCSET007.BIN"), b"hello");
        assert_eq!(
            backup,
            PathBuf::from(format!("/card/NCSET007.BIN~{}.bak", hash1))
        );
    }

    #[test]
    fn test_set_imenu_in_place_with_backup() {
        let dir = TempDir::new().unwrap();
        let path = settings_file(&dir);
        let original = fs::read(&path).unwrap();

        let u1: SectionSelector = "U1".parse().unwrap();
        cmd_set_imenu(&Toolkit::default(), &path, &u1, 2, 21, &WriteOptions::default()).unwrap();

        let edited = fs::read(&path).unwrap();
        assert!(ChecksumEngine::verify(&edited));
        assert_eq!(edited[U1 + imenu_slot_offset(1)], 21);
        assert_eq!(edited[MAIN + imenu_slot_offset(1)], 0);

        let backup = backup_path(&path, &original);
        assert_eq!(fs::read(backup).unwrap(), original);
    }

    #[test]
    fn test_copy_to_output_respects_force() {
        let dir = TempDir::new().unwrap();
        let path = settings_file(&dir);
        let original = fs::read(&path).unwrap();
        let output = dir.path().join("out.BIN");

        let opts = WriteOptions {
            output: Some(output.clone()),
            ..WriteOptions::default()
        };
        let main: SectionSelector = "Manual".parse().unwrap();
        let u1: SectionSelector = "U1".parse().unwrap();

        cmd_set_prefix(&Toolkit::default(), &path, &main, "MAIN", &opts).unwrap();
        let prefixed = fs::read(&output).unwrap();
        assert!(ChecksumEngine::verify(&prefixed));

        // Existing output is refused without --force
        assert!(cmd_copy(&Toolkit::default(), &path, &main, &u1, &opts).is_err());

        let forced = WriteOptions {
            force: true,
            ..opts
        };
        cmd_copy(&Toolkit::default(), &output, &main, &u1, &forced).unwrap();
        let edited = fs::read(&output).unwrap();
        assert!(ChecksumEngine::verify(&edited));
        assert_eq!(edited[U1 + MODE_ID_OFFSET], 34);
        assert_eq!(&edited[U1 + PREFIX_OFFSET..U1 + PREFIX_OFFSET + 4], b"MAIN");

        // The input itself was never touched
        assert_eq!(fs::read(&path).unwrap(), original);
    }

    #[test]
    fn test_dry_run_and_no_backup() {
        let dir = TempDir::new().unwrap();
        let path = settings_file(&dir);
        let original = fs::read(&path).unwrap();
        let u1: SectionSelector = "U1".parse().unwrap();

        let dry = WriteOptions {
            dry_run: true,
            ..WriteOptions::default()
        };
        cmd_reset(&Toolkit::default(), &path, &u1, &dry).unwrap();
        assert_eq!(fs::read(&path).unwrap(), original);

        let no_backup = WriteOptions {
            no_backup: true,
            ..WriteOptions::default()
        };
        cmd_reset(&Toolkit::default(), &path, &u1, &no_backup).unwrap();
        let edited = fs::read(&path).unwrap();
        assert!(ChecksumEngine::verify(&edited));
        assert_eq!(edited[U1 + imenu_slot_offset(0)], 0);
        assert_eq!(edited[U1 + MODE_ID_OFFSET], 34);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_fix_checksum_and_custom() {
        let dir = TempDir::new().unwrap();
        let path = settings_file(&dir);
        let mut corrupted = fs::read(&path).unwrap();
        let len = corrupted.len();
        corrupted[len - 1] ^= 0xFF;
        fs::write(&path, &corrupted).unwrap();

        let opts = WriteOptions {
            no_backup: true,
            ..WriteOptions::default()
        };
        cmd_fix_checksum(&path, &opts).unwrap();
        assert!(ChecksumEngine::verify(&fs::read(&path).unwrap()));

        cmd_set_custom(&path, Some(AfcPriority::Focus), Some(50), None, &opts).unwrap();
        let edited = fs::read(&path).unwrap();
        assert!(ChecksumEngine::verify(&edited));
        let custom = CustomSettings::read(&edited);
        assert_eq!(custom.afc_priority, Some(AfcPriority::Focus));
        assert_eq!(custom.max_continuous_release, Some(50));

        assert!(cmd_set_custom(&path, None, Some(500), None, &opts).is_err());
        assert!(cmd_set_custom(&path, None, None, None, &opts).is_err());
    }

    #[test]
    fn test_build_report() {
        let dir = TempDir::new().unwrap();
        let path = settings_file(&dir);
        let report = build_report(&Toolkit::default(), &path, StrategyKind::Auto).unwrap();
        assert_eq!(report.size, 350_000);
        assert_eq!(report.camera.model_str(), "Z5_2");
        assert!(report.checksum.map_or(false, |c| c.is_valid()));
        let labels: Vec<&str> = report
            .sections
            .iter()
            .map(|s| s.located.label.as_str())
            .collect();
        assert_eq!(labels, vec!["M/A/S/P Settings (Main)", "U1"]);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["sections"][1]["mode_id"], "U1");
        assert_eq!(
            json["sections"][0]["view"]["imenu"][0]["setting"]["name"],
            "Set Picture Control"
        );
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
