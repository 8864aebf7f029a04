//! Directory-level driver for the obfuscation engine.
//!
//! Discovers files, runs the collection pass over every source file, builds
//! and freezes the registry, then runs the rewrite pass and writes the
//! mirrored output tree. The registry lives for exactly one call.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::{CloakConfig, CONFIG_FILE_NAME};
use crate::error::{Error, Result};
use crate::obfuscate::{
    self, collect, rewrite, Collected, FileScan, ProtectReason, Registry, SourceFormat, Whitelist,
};
use crate::utils::{io, validation};

// ============================================================================
// Reports
// ============================================================================

/// A recoverable scanner warning, located in its file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileWarning {
    pub path: String,
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: String,
    pub format: SourceFormat,
    /// Renameable declaration occurrences found by the collection pass.
    pub declarations: usize,
    /// Spans substituted by the rewrite pass (0 for `scan`).
    pub replacements: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub input: String,
    pub output: String,
    pub files: Vec<FileReport>,
    pub identifiers: usize,
    pub mapping: BTreeMap<String, String>,
    pub protected: BTreeMap<String, ProtectReason>,
    pub warnings: Vec<FileWarning>,
    pub files_written: usize,
    pub files_changed: usize,
    pub assets_copied: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub input: String,
    pub files: Vec<FileReport>,
    pub identifiers: usize,
    pub mapping: BTreeMap<String, String>,
    pub protected: BTreeMap<String, ProtectReason>,
    pub warnings: Vec<FileWarning>,
    /// Files that a run would copy verbatim.
    pub assets: usize,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Remove a non-empty output directory before writing.
    pub clean: bool,
}

// ============================================================================
// Discovery
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct DiscoveredFile {
    path: PathBuf,
    /// `/`-separated path relative to the input root.
    relative: String,
}

#[derive(Debug, Default)]
struct Discovered {
    sources: Vec<(DiscoveredFile, SourceFormat)>,
    assets: Vec<DiscoveredFile>,
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk `root`, classifying files as sources or assets in relative-path
/// order. `skip` (the output root when nested) is never entered.
fn discover(root: &Path, skip: Option<&Path>, config: &CloakConfig) -> Result<Discovered> {
    let mut files = Vec::new();
    walk_recursive(root, root, skip, config, &mut files)?;
    files.sort_by(|a, b| a.relative.cmp(&b.relative));

    let mut discovered = Discovered::default();
    for file in files {
        if file.relative == CONFIG_FILE_NAME {
            continue;
        }
        match config.target_format(&file.path) {
            Some(format) if !config.is_excluded_file(&file.relative) => {
                discovered.sources.push((file, format));
            }
            Some(_) => discovered.assets.push(file),
            None if config.copy_assets => discovered.assets.push(file),
            None => {}
        }
    }

    Ok(discovered)
}

fn walk_recursive(
    dir: &Path,
    root: &Path,
    skip: Option<&Path>,
    config: &CloakConfig,
    files: &mut Vec<DiscoveredFile>,
) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read directory {}", dir.display())))
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read directory {}", dir.display())))
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("stat {}", path.display())))
        })?;

        if file_type.is_dir() {
            let name = entry.file_name().to_string_lossy().to_string();
            if config.is_excluded_dir(&name) || Some(path.as_path()) == skip {
                continue;
            }
            walk_recursive(&path, root, skip, config, files)?;
        } else if path.is_file() {
            files.push(DiscoveredFile {
                relative: relative_path(root, &path),
                path,
            });
        }
    }

    Ok(())
}

// ============================================================================
// Collection pass
// ============================================================================

struct SourceFile {
    file: DiscoveredFile,
    format: SourceFormat,
    text: String,
    scan: FileScan,
    collected: Collected,
}

fn load_sources(discovered: &Discovered, whitelist: &Whitelist) -> Result<Vec<SourceFile>> {
    discovered
        .sources
        .iter()
        .map(|(file, format)| -> Result<SourceFile> {
            let text = io::read_file(&file.path, &format!("read {}", file.path.display()))?;
            let scan = obfuscate::scan(*format, &text);
            let collected = collect(&text, &scan, whitelist);
            Ok(SourceFile {
                file: file.clone(),
                format: *format,
                text,
                scan,
                collected,
            })
        })
        .collect()
}

/// Build the frozen registry from every file's collection result.
///
/// Protected tokens and undeclared script literals are reserved first, since
/// they stay verbatim in the output; identifiers are then resolved in file
/// order and first-seen order within a file.
fn build_registry(
    sources: &[SourceFile],
    config: &CloakConfig,
) -> Result<(Registry, BTreeMap<String, ProtectReason>)> {
    let mut registry = Registry::new(config.name_generator()?);

    let declared: BTreeSet<&str> = sources
        .iter()
        .flat_map(|s| s.collected.renameable.iter().map(String::as_str))
        .collect();

    let mut protected = BTreeMap::new();
    for source in sources {
        for (token, reason) in &source.collected.protected {
            protected.entry(token.clone()).or_insert(*reason);
        }
    }

    for token in protected.keys() {
        registry.reserve(token)?;
    }
    for source in sources {
        for reference in &source.collected.references {
            if !declared.contains(reference.as_str()) {
                registry.reserve(reference)?;
            }
        }
    }

    for source in sources {
        for identifier in &source.collected.renameable {
            registry.resolve(identifier)?;
        }
    }

    registry.freeze();
    Ok((registry, protected))
}

fn file_warnings(source: &SourceFile) -> Vec<FileWarning> {
    source
        .scan
        .warnings
        .iter()
        .map(|w| FileWarning {
            path: source.file.relative.clone(),
            line: obfuscate::line_of(&source.text, w.offset),
            message: w.message.clone(),
        })
        .collect()
}

fn log_warnings(warnings: &[FileWarning]) {
    for warning in warnings {
        log_status!("warn", "{}:{}: {}", warning.path, warning.line, warning.message);
    }
}

fn mapping_of(registry: &Registry) -> BTreeMap<String, String> {
    registry
        .mappings()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// Entry points
// ============================================================================

/// Collection pass only. Reads `input`, writes nothing.
pub fn scan(input: &Path, config: &CloakConfig) -> Result<ScanReport> {
    let input = validation::require_dir(input, "input")?;
    let whitelist = config.effective_whitelist();

    let discovered = discover(&input, None, config)?;
    let sources = load_sources(&discovered, &whitelist)?;
    let (registry, protected) = build_registry(&sources, config)?;

    let mut files = Vec::new();
    let mut warnings = Vec::new();
    for source in &sources {
        let found = file_warnings(source);
        files.push(FileReport {
            path: source.file.relative.clone(),
            format: source.format,
            declarations: source.collected.declarations,
            replacements: 0,
            warnings: found.len(),
        });
        warnings.extend(found);
    }
    log_warnings(&warnings);
    log_status!(
        "scan",
        "{} identifiers from {} files",
        registry.len(),
        sources.len()
    );

    Ok(ScanReport {
        input: input.display().to_string(),
        files,
        identifiers: registry.len(),
        mapping: mapping_of(&registry),
        protected,
        warnings,
        assets: discovered.assets.len(),
    })
}

/// Full two-pass run from `options.input` into `options.output`.
pub fn run(options: &RunOptions, config: &CloakConfig) -> Result<RunReport> {
    let input = validation::require_dir(&options.input, "input")?;
    let output = validation::absolutize(&options.output)?;
    validation::require_disjoint_output(&input, &output)?;

    if output.exists() && !output.is_dir() {
        return Err(Error::validation_invalid_argument(
            "output",
            format!("Output path is not a directory: {}", output.display()),
            None,
            None,
        ));
    }
    if !io::is_empty_dir(&output)? {
        if !options.clean {
            return Err(Error::validation_invalid_argument(
                "output",
                format!("Output directory is not empty: {}", output.display()),
                None,
                None,
            )
            .with_hint("Pass --clean to remove it before writing"));
        }
        log_status!("clean", "Removing existing output {}", output.display());
        io::remove_dir_all(&output)?;
    }

    let whitelist = config.effective_whitelist();
    let skip = output.starts_with(&input).then_some(output.as_path());
    let discovered = discover(&input, skip, config)?;

    let sources = load_sources(&discovered, &whitelist)?;
    let (registry, protected) = build_registry(&sources, config)?;
    log_status!(
        "collect",
        "{} identifiers from {} files",
        registry.len(),
        sources.len()
    );

    io::ensure_dir(&output)?;

    let mut files = Vec::new();
    let mut warnings = Vec::new();
    let mut files_changed = 0;
    for source in &sources {
        let rewritten = rewrite(&source.text, &source.scan, &registry, &whitelist)?;
        let target = output.join(&source.file.relative);
        io::write_file_atomic(
            &target,
            &rewritten.content,
            &format!("write {}", target.display()),
        )?;

        if rewritten.content != source.text {
            files_changed += 1;
        }

        let found = file_warnings(source);
        files.push(FileReport {
            path: source.file.relative.clone(),
            format: source.format,
            declarations: source.collected.declarations,
            replacements: rewritten.replacements,
            warnings: found.len(),
        });
        warnings.extend(found);
    }
    log_warnings(&warnings);

    for asset in &discovered.assets {
        io::copy_file(&asset.path, &output.join(&asset.relative))?;
    }

    log_status!(
        "write",
        "{} files written ({} changed), {} assets copied to {}",
        sources.len(),
        files_changed,
        discovered.assets.len(),
        output.display()
    );

    Ok(RunReport {
        input: input.display().to_string(),
        output: output.display().to_string(),
        files,
        identifiers: registry.len(),
        mapping: mapping_of(&registry),
        protected,
        warnings,
        files_written: sources.len(),
        files_changed,
        assets_copied: discovered.assets.len(),
    })
}

/// Write the identifier mapping as pretty JSON.
pub fn write_mapping(path: &Path, mapping: &BTreeMap<String, String>) -> Result<()> {
    let content = serde_json::to_string_pretty(mapping)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize mapping".to_string())))?;
    io::write_file_atomic(path, &format!("{}\n", content), &format!("write {}", path.display()))
}
