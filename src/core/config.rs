//! Run configuration (`cloak.json`).
//!
//! Every field has a serde default, so an empty object, a partial file, or no
//! file at all yields a usable configuration. CLI overrides are applied on
//! top and the result is validated once before a run starts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::obfuscate::{NameGenerator, SourceFormat, Whitelist};
use crate::utils::io;

pub const CONFIG_FILE_NAME: &str = "cloak.json";

/// Framework layout and state names protected unless
/// `use_default_whitelist` is turned off. Tag names are protected by the
/// classifier regardless.
pub const DEFAULT_WHITELIST: &[&str] = &[
    "active", "checked", "container", "disabled", "hidden", "open", "row", "selected", "show",
    "visible", "width", "height",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloakConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_hash_length")]
    pub hash_length: usize,

    #[serde(default)]
    pub whitelist: Vec<String>,

    #[serde(default = "default_true")]
    pub use_default_whitelist: bool,

    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,

    /// Glob patterns over `/`-separated paths relative to the input root.
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default = "default_true")]
    pub copy_assets: bool,
}

impl Default for CloakConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            hash_length: default_hash_length(),
            whitelist: Vec::new(),
            use_default_whitelist: true,
            extensions: default_extensions(),
            excluded_dirs: default_excluded_dirs(),
            exclude: Vec::new(),
            copy_assets: true,
        }
    }
}

fn default_prefix() -> String {
    crate::obfuscate::naming::DEFAULT_PREFIX.to_string()
}

fn default_hash_length() -> usize {
    crate::obfuscate::naming::DEFAULT_HASH_LENGTH
}

fn default_true() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    ["html", "htm", "css", "js", "mjs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_excluded_dirs() -> Vec<String> {
    [".git", "node_modules", "__pycache__", ".vscode", "venv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Values given on the command line, applied over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub prefix: Option<String>,
    pub hash_length: Option<usize>,
    /// Added to the file's whitelist.
    pub whitelist: Vec<String>,
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigSource {
    Builtin,
    File { path: String },
}

// ============================================================================
// Loading
// ============================================================================

/// Pick the configuration file: an explicit path wins, then
/// `<input>/cloak.json` when present. `None` means built-in defaults.
pub fn resolve_config_path(input: Option<&Path>, explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(Error::validation_invalid_argument(
                "config",
                format!("Configuration file not found: {}", path.display()),
                None,
                None,
            ));
        }
        return Ok(Some(path.to_path_buf()));
    }

    Ok(input
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|candidate| candidate.is_file()))
}

pub fn load_from_file(path: &Path) -> Result<CloakConfig> {
    let content = io::read_file(path, &format!("read {}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

/// Load, apply overrides, and validate.
pub fn load(
    input: Option<&Path>,
    explicit: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<(CloakConfig, ConfigSource)> {
    let (mut config, source) = match resolve_config_path(input, explicit)? {
        Some(path) => (
            load_from_file(&path)?,
            ConfigSource::File {
                path: path.display().to_string(),
            },
        ),
        None => (CloakConfig::default(), ConfigSource::Builtin),
    };

    config.apply_overrides(overrides);
    config.validate()?;
    Ok((config, source))
}

/// Write a default `cloak.json` into `dir`.
pub fn init(dir: &Path, force: bool) -> Result<PathBuf> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() && !force {
        return Err(Error::validation_invalid_argument(
            "input",
            format!("{} already exists", path.display()),
            None,
            None,
        )
        .with_hint("Pass --force to overwrite it"));
    }

    let content = serde_json::to_string_pretty(&CloakConfig::default())
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize cloak.json".to_string())))?;
    io::write_file_atomic(&path, &format!("{}\n", content), &format!("write {}", path.display()))?;
    Ok(path)
}

// ============================================================================
// Queries
// ============================================================================

impl CloakConfig {
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(prefix) = &overrides.prefix {
            self.prefix = prefix.clone();
        }
        if let Some(hash_length) = overrides.hash_length {
            self.hash_length = hash_length;
        }
        for name in &overrides.whitelist {
            let name = name.trim();
            if !name.is_empty() && !self.whitelist.iter().any(|w| w == name) {
                self.whitelist.push(name.to_string());
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.name_generator()?;

        if self.extensions.is_empty() {
            return Err(Error::config_invalid_value(
                "extensions",
                None,
                "at least one extension is required",
            ));
        }
        for ext in &self.extensions {
            if SourceFormat::from_extension(ext.trim_start_matches('.')).is_none() {
                return Err(Error::config_invalid_value(
                    "extensions",
                    Some(ext.clone()),
                    "supported extensions are html, htm, css, js, mjs",
                ));
            }
        }

        if let Some(pattern) = self.exclude.iter().find(|p| p.trim().is_empty()) {
            return Err(Error::config_invalid_value(
                "exclude",
                Some(pattern.clone()),
                "glob patterns must not be empty",
            ));
        }

        Ok(())
    }

    pub fn name_generator(&self) -> Result<NameGenerator> {
        NameGenerator::new(&self.prefix, self.hash_length)
    }

    /// User names plus the built-in list when enabled.
    pub fn effective_whitelist(&self) -> Whitelist {
        let builtin: &[&str] = if self.use_default_whitelist {
            DEFAULT_WHITELIST
        } else {
            &[]
        };
        Whitelist::new(
            builtin
                .iter()
                .map(|s| s.to_string())
                .chain(self.whitelist.iter().cloned()),
        )
    }

    /// Format of a file the engine should process, if any.
    pub fn target_format(&self, path: &Path) -> Option<SourceFormat> {
        let ext = path.extension()?.to_str()?;
        let listed = self
            .extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext));
        if listed {
            SourceFormat::from_extension(ext)
        } else {
            None
        }
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|d| d == name)
    }

    /// True when `relative` (`/`-separated) matches an `exclude` glob.
    pub fn is_excluded_file(&self, relative: &str) -> bool {
        self.exclude
            .iter()
            .any(|pattern| glob_match::glob_match(pattern.trim(), relative))
    }
}
