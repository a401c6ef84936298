//! Pipeline configuration and target-platform limits.
//!
//! Limits are plain data built once at startup and handed to the sanitizer,
//! the DDL generator, and the loader. Nothing here is process-global, so
//! tests can build alternate [`NamingRules`] (e.g. the legacy and extended
//! identifier tiers) side by side.
//!
//! [`PipelineConfig`] resolves each setting from, in priority order, a CLI
//! override, an environment variable, an optional YAML file, and finally the
//! built-in default.

use std::{
    collections::HashSet,
    env,
    fmt,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Hard ceiling for a character-semantics text column. Mirrors the backend
/// limit and is deliberately not runtime-tunable.
pub const MAX_TEXT_WIDTH: usize = 4000;

/// Widest precision the numeric column type accepts.
pub const MAX_NUMERIC_PRECISION: u32 = 38;

pub const DEFAULT_GROWTH_BUFFER: usize = 50;
pub const DEFAULT_BATCH_SIZE: usize = 1000;

const ENV_GROWTH_BUFFER: &str = "VARCHAR2_GROWTH_BUFFER";
const ENV_BATCH_SIZE: &str = "BATCH_SIZE";
const ENV_MAX_IDENTIFIER_LEN: &str = "MAX_IDENTIFIER_LEN";
const ENV_PROCESSED_DIR: &str = "PROCESSED_DIR";
const ENV_ERROR_DIR: &str = "ERROR_DIR";
const ENV_DRY_RUN: &str = "DRY_RUN";

const DEFAULT_RESERVED_WORDS: &[&str] = &[
    "ACCESS", "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "AUDIT", "BETWEEN", "BY", "CHAR",
    "CHECK", "CLUSTER", "COLUMN", "COMMENT", "COMPRESS", "CONNECT", "CREATE", "CURRENT", "DATE",
    "DECIMAL", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "EXCLUSIVE", "EXISTS",
    "FILE", "FLOAT", "FOR", "FROM", "GRANT", "GROUP", "HAVING", "IDENTIFIED", "IMMEDIATE", "IN",
    "INCREMENT", "INDEX", "INITIAL", "INSERT", "INTEGER", "INTERSECT", "INTO", "IS", "LEVEL",
    "LIKE", "LOCK", "LONG", "MAXEXTENTS", "MINUS", "MLSLABEL", "MODE", "MODIFY", "NOAUDIT",
    "NOCOMPRESS", "NOT", "NOWAIT", "NULL", "NUMBER", "OF", "OFFLINE", "ON", "ONLINE", "OPTION",
    "OR", "ORDER", "PCTFREE", "PRIOR", "PRIVILEGES", "PUBLIC", "RAW", "RENAME", "RESOURCE",
    "REVOKE", "ROW", "ROWID", "ROWNUM", "ROWS", "SELECT", "SESSION", "SET", "SHARE", "SIZE",
    "SMALLINT", "START", "SUCCESSFUL", "SYNONYM", "SYSDATE", "TABLE", "THEN", "TO", "TRIGGER",
    "UID", "UNION", "UNIQUE", "UPDATE", "USER", "VALIDATE", "VALUES", "VARCHAR", "VARCHAR2",
    "VIEW", "WHENEVER", "WHERE", "WITH",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierTier {
    /// Pre-12.2 databases: 30 characters.
    #[default]
    Legacy,
    /// Long identifiers: 128 characters.
    Extended,
}

impl IdentifierTier {
    pub const fn max_len(self) -> usize {
        match self {
            IdentifierTier::Legacy => 30,
            IdentifierTier::Extended => 128,
        }
    }

    pub fn from_max_len(len: usize) -> Option<Self> {
        match len {
            30 => Some(IdentifierTier::Legacy),
            128 => Some(IdentifierTier::Extended),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IdentifierTier::Legacy => "legacy",
            IdentifierTier::Extended => "extended",
        }
    }
}

impl fmt::Display for IdentifierTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} chars)", self.as_str(), self.max_len())
    }
}

impl FromStr for IdentifierTier {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "legacy" | "30" => Ok(IdentifierTier::Legacy),
            "extended" | "long" | "128" => Ok(IdentifierTier::Extended),
            _ => Err(anyhow!(
                "Unknown identifier tier '{value}'. Supported tiers: legacy (30), extended (128)"
            )),
        }
    }
}

/// Identifier rules applied by the sanitizer.
#[derive(Debug, Clone)]
pub struct NamingRules {
    max_len: usize,
    reserved: HashSet<String>,
}

impl NamingRules {
    pub fn new<I, S>(max_len: usize, reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            max_len,
            reserved: reserved
                .into_iter()
                .map(|word| word.as_ref().trim().to_ascii_uppercase())
                .collect(),
        }
    }

    pub fn for_tier(tier: IdentifierTier) -> Self {
        Self::new(tier.max_len(), DEFAULT_RESERVED_WORDS.iter().copied())
    }

    pub fn with_max_len(&self, max_len: usize) -> Self {
        Self {
            max_len,
            reserved: self.reserved.clone(),
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(&name.to_ascii_uppercase())
    }
}

impl Default for NamingRules {
    fn default() -> Self {
        Self::for_tier(IdentifierTier::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Characters added on top of the observed width when sizing text columns.
    pub growth_buffer: usize,
    /// Rows per batch-insert call.
    pub batch_size: usize,
    pub identifier_tier: IdentifierTier,
    pub processed_dir: PathBuf,
    pub error_dir: PathBuf,
    /// Generate DDL without executing it and leave files where they are.
    pub dry_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            growth_buffer: DEFAULT_GROWTH_BUFFER,
            batch_size: DEFAULT_BATCH_SIZE,
            identifier_tier: IdentifierTier::default(),
            processed_dir: PathBuf::from("data/processed"),
            error_dir: PathBuf::from("data/error"),
            dry_run: false,
        }
    }
}

/// Values supplied on the command line; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub growth_buffer: Option<usize>,
    pub batch_size: Option<usize>,
    pub identifier_tier: Option<IdentifierTier>,
    pub processed_dir: Option<PathBuf>,
    pub error_dir: Option<PathBuf>,
    pub dry_run: Option<bool>,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: PipelineConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config file {path:?}"))?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Builds the effective configuration: CLI overrides, then environment,
    /// then `file` (or defaults when no file is given).
    pub fn resolve(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok())?;
        config.apply_overrides(overrides);
        config.ensure_valid()?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_GROWTH_BUFFER) {
            self.growth_buffer = parse_env_number(ENV_GROWTH_BUFFER, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BATCH_SIZE) {
            self.batch_size = parse_env_number(ENV_BATCH_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_IDENTIFIER_LEN) {
            self.identifier_tier = IdentifierTier::from_str(&raw)
                .with_context(|| format!("Reading {ENV_MAX_IDENTIFIER_LEN}"))?;
        }
        if let Some(raw) = lookup(ENV_PROCESSED_DIR).filter(|v| !v.trim().is_empty()) {
            self.processed_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup(ENV_ERROR_DIR).filter(|v| !v.trim().is_empty()) {
            self.error_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup(ENV_DRY_RUN) {
            self.dry_run = raw.trim().eq_ignore_ascii_case("true");
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(buffer) = overrides.growth_buffer {
            self.growth_buffer = buffer;
        }
        if let Some(size) = overrides.batch_size {
            self.batch_size = size;
        }
        if let Some(tier) = overrides.identifier_tier {
            self.identifier_tier = tier;
        }
        if let Some(dir) = &overrides.processed_dir {
            self.processed_dir = dir.clone();
        }
        if let Some(dir) = &overrides.error_dir {
            self.error_dir = dir.clone();
        }
        if let Some(dry_run) = overrides.dry_run {
            self.dry_run = dry_run;
        }
    }

    pub fn ensure_valid(&self) -> Result<()> {
        anyhow::ensure!(self.batch_size > 0, "batch_size must be positive");
        anyhow::ensure!(
            self.growth_buffer <= MAX_TEXT_WIDTH,
            "growth_buffer must be <= {MAX_TEXT_WIDTH}"
        );
        Ok(())
    }

    pub fn naming_rules(&self) -> NamingRules {
        NamingRules::for_tier(self.identifier_tier)
    }

    /// Width to declare for a text column whose longest observed value is
    /// `observed` characters.
    pub fn text_width(&self, column: &str, observed: usize) -> Result<usize, IngestError> {
        if observed > MAX_TEXT_WIDTH {
            return Err(IngestError::SizeBreach {
                column: column.to_string(),
                observed_length: observed,
                limit: MAX_TEXT_WIDTH,
            });
        }
        Ok(observed
            .saturating_add(self.growth_buffer)
            .clamp(1, MAX_TEXT_WIDTH))
    }
}

fn parse_env_number(key: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .with_context(|| format!("Environment variable {key} must be a non-negative integer, got '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn text_width_applies_buffer_and_ceiling() {
        let config = PipelineConfig::default();
        assert_eq!(config.text_width("NOTES", 300).unwrap(), 350);
        assert_eq!(config.text_width("NOTES", 3990).unwrap(), MAX_TEXT_WIDTH);
        assert_eq!(config.text_width("NOTES", MAX_TEXT_WIDTH).unwrap(), MAX_TEXT_WIDTH);
    }

    #[test]
    fn text_width_never_declares_zero() {
        let config = PipelineConfig {
            growth_buffer: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(config.text_width("EMPTY", 0).unwrap(), 1);
    }

    #[test]
    fn text_width_rejects_observed_over_ceiling() {
        let err = PipelineConfig::default()
            .text_width("NOTES", MAX_TEXT_WIDTH + 1)
            .expect_err("breach");
        assert!(matches!(
            err,
            IngestError::SizeBreach {
                observed_length: 4001,
                limit: 4000,
                ..
            }
        ));
    }

    #[test]
    fn env_values_override_file_values() {
        let mut config = PipelineConfig::default();
        let env: HashMap<&str, &str> = [
            ("VARCHAR2_GROWTH_BUFFER", "10"),
            ("BATCH_SIZE", "250"),
            ("MAX_IDENTIFIER_LEN", "128"),
            ("DRY_RUN", "TRUE"),
        ]
        .into_iter()
        .collect();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .expect("apply env");
        assert_eq!(config.growth_buffer, 10);
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.identifier_tier, IdentifierTier::Extended);
        assert!(config.dry_run);
    }

    #[test]
    fn invalid_env_number_is_reported() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_env(|key| (key == "BATCH_SIZE").then(|| "lots".to_string()))
            .expect_err("bad number");
        assert!(err.to_string().contains("BATCH_SIZE"));
    }

    #[test]
    fn overrides_take_priority() {
        let mut config = PipelineConfig::default();
        config.apply_overrides(&ConfigOverrides {
            growth_buffer: Some(5),
            identifier_tier: Some(IdentifierTier::Extended),
            ..ConfigOverrides::default()
        });
        assert_eq!(config.growth_buffer, 5);
        assert_eq!(config.naming_rules().max_len(), 128);
    }

    #[test]
    fn yaml_config_fills_missing_fields_with_defaults() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "growth_buffer: 20").unwrap();
        writeln!(file, "identifier_tier: extended").unwrap();
        let config = PipelineConfig::load(file.path()).expect("load config");
        assert_eq!(config.growth_buffer, 20);
        assert_eq!(config.identifier_tier, IdentifierTier::Extended);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn yaml_config_rejects_zero_batch_size() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "batch_size: 0").unwrap();
        assert!(PipelineConfig::load(file.path()).is_err());
    }

    #[test]
    fn reserved_words_are_case_insensitive() {
        let rules = NamingRules::default();
        assert!(rules.is_reserved("date"));
        assert!(rules.is_reserved("Number"));
        assert!(!rules.is_reserved("AMOUNT"));
    }

    #[test]
    fn identifier_tier_parses_names_and_lengths() {
        assert_eq!(IdentifierTier::from_str("30").unwrap(), IdentifierTier::Legacy);
        assert_eq!(
            IdentifierTier::from_str("Extended").unwrap(),
            IdentifierTier::Extended
        );
        assert!(IdentifierTier::from_str("64").is_err());
        assert_eq!(IdentifierTier::from_max_len(128), Some(IdentifierTier::Extended));
    }
}
