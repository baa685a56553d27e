//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `--config <path>` on the command line
//! 2. `$MBOXCONTACTS_CONFIG` (environment variable)
//! 3. `~/.config/mboxcontacts/config.toml` (Linux/macOS)
//!    `%APPDATA%\mboxcontacts\config.toml` (Windows)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ContactsError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Addresses that belong to the archive owner.
    pub owner: OwnerConfig,
    /// Deny-list and signature pattern sources.
    pub filters: FiltersConfig,
    /// Memory and heuristic limits.
    pub limits: LimitsConfig,
    /// Report and progress settings.
    pub output: OutputConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override directory for the log file.
    pub log_dir: Option<PathBuf>,
}

/// The archive owner's addresses, used to classify sent vs. received.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerConfig {
    pub addresses: Vec<String>,
}

/// Deny-list and pattern table sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    /// Replaces the embedded deny-list when set.
    pub deny_patterns: Option<Vec<String>>,
    /// Appended to the effective deny-list.
    pub extra_deny_patterns: Vec<String>,
    /// Plain-text deny-list file (one pattern per line, `#` comments).
    pub deny_file: Option<PathBuf>,
    /// TOML signature pattern table replacing the embedded one.
    pub patterns_file: Option<PathBuf>,
}

/// Limits that keep memory bounded and heuristics cheap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Body lines kept per message (headers are always kept).
    pub max_lines_per_message: usize,
    /// Longest physical line kept, in bytes.
    pub max_line_bytes: usize,
    /// Groups with fewer lines are boundary artifacts.
    pub min_message_lines: usize,
    /// Maximum characters of decoded body text per record.
    pub body_excerpt_chars: usize,
    /// Trailing excerpt lines scanned for signature fields.
    pub signature_lines: usize,
    /// Cap on each contact's phones/addresses/titles/companies.
    pub max_values_per_field: usize,
}

/// Report and progress settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write a checkpoint report every N messages (0 = never).
    pub checkpoint_every: u64,
    /// Log progress every N messages.
    pub progress_every: u64,
    /// Sort key: "occurrences" or "sent".
    pub sort: String,
    /// Infer names from the local part for contacts without a display name.
    pub infer_names: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_lines_per_message: 500,
            max_line_bytes: 64 * 1024,
            min_message_lines: 3,
            body_excerpt_chars: 5000,
            signature_lines: 25,
            max_values_per_field: 10,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            checkpoint_every: 5000,
            progress_every: 1000,
            sort: "occurrences".to_string(),
            infer_names: true,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match load_config_from(&path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to load config, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Load configuration from an explicit path. Parse errors are returned.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| ContactsError::open(path, e))?;
    let cfg = toml::from_str::<Config>(&contents).map_err(|e| ContactsError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    tracing::info!(path = %path.display(), "Loaded config");
    Ok(cfg)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MBOXCONTACTS_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mboxcontacts").join("config.toml"))
}

/// Return the directory used for the log file.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mboxcontacts")
}
