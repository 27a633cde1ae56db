//! Configuration (spec §6). Loaded from an optional TOML file, overridden by
//! CLI flags/environment variables (clap's `env` feature), layered onto
//! built-in defaults.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Organization mode, as configured (spec §4.4, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgModeConfig {
    Artist,
    Label,
    Series,
    Hybrid,
}

impl Default for OrgModeConfig {
    fn default() -> Self {
        OrgModeConfig::Hybrid
    }
}

/// A group of artist aliases; the first entry is the canonical primary
/// (spec §4.4, GLOSSARY "Alias group").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasGroup {
    pub primary: String,
    pub aliases: Vec<String>,
}

/// Configuration for a single enrichment provider (spec §4.6, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub enabled: bool,
    pub token: Option<String>,
    pub key: Option<String>,
    pub secret: Option<String>,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_cache_expiry_hours")]
    pub cache_expiry_hours: u64,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

fn default_rate_limit() -> u32 {
    60
}
fn default_cache_expiry_hours() -> u64 {
    24 * 14
}
fn default_confidence_threshold() -> f64 {
    0.65
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            enabled: false,
            token: None,
            key: None,
            secret: None,
            rate_limit_per_minute: default_rate_limit(),
            cache_dir: None,
            cache_expiry_hours: default_cache_expiry_hours(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

/// Full application configuration (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Roots
    pub source_dir: PathBuf,
    pub destination_dir: PathBuf,
    pub unsorted_dir: PathBuf,
    pub duplicates_dir: PathBuf,

    // Safety
    pub dry_run: bool,
    pub incremental: bool,
    pub force_cleanup_locks: bool,

    // Databases
    pub state_db_path: PathBuf,
    pub metadata_db_path: PathBuf,
    pub duplicates_db_path: PathBuf,

    // Organization
    pub mode: OrgModeConfig,
    pub enable_electronic_organization: bool,
    pub min_label_releases: u32,
    pub label_priority_threshold: f64,
    pub separate_remixes: bool,
    pub separate_compilations: bool,
    pub va_patterns: Vec<String>,
    pub underground_patterns: Vec<String>,
    pub remix_keywords: Vec<String>,
    pub artist_alias_groups: Vec<AliasGroup>,
    pub group_artist_aliases: bool,
    pub various_artists_sentinel: String,

    // Enrichment
    pub primary: ProviderConfig,
    pub secondary: ProviderConfig,

    // Performance
    pub worker_count: usize,
    pub large_collection_threshold: usize,
    pub memory_limit_mb: u64,
    pub batch_size_override: Option<usize>,

    // Duplicates
    pub duplicate_threshold: f64,
    pub duration_tolerance_seconds: f64,
    pub fuzzy_match_threshold: f64,

    // Rename policy
    pub rename_audio_files_on_move: bool,

    // Machine-readable progress stream (spec §6)
    pub machine_progress: bool,

    // Logging
    pub log_file: Option<PathBuf>,
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_dir: PathBuf::new(),
            destination_dir: PathBuf::new(),
            unsorted_dir: PathBuf::from("unsorted"),
            duplicates_dir: PathBuf::from("duplicates"),
            dry_run: true,
            incremental: true,
            force_cleanup_locks: false,
            state_db_path: PathBuf::from("state.db"),
            metadata_db_path: PathBuf::from("metadata.db"),
            duplicates_db_path: PathBuf::from("duplicates.db"),
            mode: OrgModeConfig::default(),
            enable_electronic_organization: true,
            min_label_releases: 3,
            label_priority_threshold: 0.8,
            separate_remixes: true,
            separate_compilations: true,
            va_patterns: vec![
                "various artists".into(),
                "various".into(),
                "va".into(),
                "v.a.".into(),
                "compilation".into(),
            ],
            underground_patterns: vec![
                "white".into(),
                "promo".into(),
                "bootleg".into(),
                "unreleased".into(),
                "dubplate".into(),
                "test press".into(),
            ],
            remix_keywords: vec!["remix".into(), "rmx".into(), "mix".into(), "edit".into()],
            artist_alias_groups: Vec::new(),
            group_artist_aliases: false,
            various_artists_sentinel: "Various Artists".into(),
            primary: ProviderConfig::default(),
            secondary: ProviderConfig::default(),
            worker_count: 4,
            large_collection_threshold: 1000,
            memory_limit_mb: 0,
            batch_size_override: None,
            duplicate_threshold: 0.85,
            duration_tolerance_seconds: 2.0,
            fuzzy_match_threshold: 0.7,
            rename_audio_files_on_move: false,
            machine_progress: false,
            log_file: None,
            verbosity: 2,
        }
    }
}

impl Config {
    /// Load a TOML config file (if given), then apply `overrides`.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Config, AppError> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|e| {
                    AppError::ConfigInvalid(format!("reading config {}: {e}", p.display()))
                })?;
                toml::from_str(&text)
                    .map_err(|e| AppError::ConfigInvalid(format!("parsing config: {e}")))?
            }
            None => Config::default(),
        };

        overrides.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.source_dir.as_os_str().is_empty() {
            return Err(AppError::ConfigInvalid("source_dir is required".into()));
        }
        if self.destination_dir.as_os_str().is_empty() {
            return Err(AppError::ConfigInvalid(
                "destination_dir is required".into(),
            ));
        }
        if !self.source_dir.is_dir() {
            return Err(AppError::ConfigInvalid(format!(
                "source_dir does not exist or is not a directory: {}",
                self.source_dir.display()
            )));
        }
        Ok(())
    }

    /// Resolve an artist name to its alias group's canonical primary (spec
    /// §4.4). Returns the input unchanged when grouping is disabled or no
    /// group matches.
    pub fn resolve_alias<'a>(&'a self, artist: &'a str) -> &'a str {
        if !self.group_artist_aliases {
            return artist;
        }
        for group in &self.artist_alias_groups {
            if group.primary.eq_ignore_ascii_case(artist)
                || group.aliases.iter().any(|a| a.eq_ignore_ascii_case(artist))
            {
                return &group.primary;
            }
        }
        artist
    }
}

/// CLI-level overrides layered on top of a loaded config file (spec §6).
#[derive(Debug, Default, Args)]
pub struct ConfigOverrides {
    #[arg(long, env = "SHELFKEEPER_SOURCE_DIR")]
    pub source_dir: Option<PathBuf>,
    #[arg(long, env = "SHELFKEEPER_DEST_DIR")]
    pub destination_dir: Option<PathBuf>,
    #[arg(long, env = "SHELFKEEPER_UNSORTED_DIR")]
    pub unsorted_dir: Option<PathBuf>,
    #[arg(long, env = "SHELFKEEPER_DUPLICATES_DIR")]
    pub duplicates_dir: Option<PathBuf>,
    #[arg(long, env = "SHELFKEEPER_DRY_RUN")]
    pub dry_run: Option<bool>,
    #[arg(long, env = "SHELFKEEPER_WORKERS")]
    pub worker_count: Option<usize>,
    #[arg(long, env = "SHELFKEEPER_LOG_FILE")]
    pub log_file: Option<PathBuf>,
    #[arg(long, env = "SHELFKEEPER_VERBOSITY")]
    pub verbosity: Option<u8>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut Config) {
        if let Some(v) = &self.source_dir {
            config.source_dir = v.clone();
        }
        if let Some(v) = &self.destination_dir {
            config.destination_dir = v.clone();
        }
        if let Some(v) = &self.unsorted_dir {
            config.unsorted_dir = v.clone();
        }
        if let Some(v) = &self.duplicates_dir {
            config.duplicates_dir = v.clone();
        }
        if let Some(v) = self.dry_run {
            config.dry_run = v;
        }
        if let Some(v) = self.worker_count {
            config.worker_count = v;
        }
        if let Some(v) = &self.log_file {
            config.log_file = Some(v.clone());
        }
        if let Some(v) = self.verbosity {
            config.verbosity = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_dry_run() {
        assert!(Config::default().dry_run);
    }

    #[test]
    fn alias_resolution_is_case_insensitive() {
        let mut config = Config::default();
        config.group_artist_aliases = true;
        config.artist_alias_groups.push(AliasGroup {
            primary: "Uwe Schmidt".into(),
            aliases: vec!["Atom\u{2122}".into(), "Atom Heart".into()],
        });
        assert_eq!(config.resolve_alias("atom\u{2122}"), "Uwe Schmidt");
        assert_eq!(config.resolve_alias("Unrelated"), "Unrelated");
    }
}
