//! Configuration system for DOIP nodes.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $DOIP_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/doip/config.toml
//!   3. ~/.config/doip/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::policy::{NodeClassification, PolicyId, PolicyTable, SecurityLevel};
use crate::wire::{DEFAULT_SEGMENT_SIZE, SENSITIVE_PREFIX_BYTES};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DoipConfig {
    pub segmenter: SegmenterConfig,
    pub node: NodeConfig,
    pub reassembly: ReassemblyConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Payload bytes per segment. Must be non-zero.
    pub segment_size: usize,
    /// Policy id stamped on every segment.
    pub policy_id: PolicyId,
    /// Chunks starting below this offset are tagged LegalProhibited.
    pub sensitive_prefix: u64,
    /// Checksum workers for concurrent splitting. 0 = available parallelism.
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Distribution hops a transfer passes through, in order.
    pub hops: Vec<NodeClassification>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblyConfig {
    pub integrity: IntegrityPolicy,
}

/// What the reassembler does with a segment whose checksum does not match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityPolicy {
    /// Fail the whole reassembly on the first corrupt segment.
    #[default]
    Abort,
    /// Leave the corrupt segment out and report it as missing.
    SkipCorrupt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub entries: Vec<PolicyEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub id: PolicyId,
    pub level: SecurityLevel,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            policy_id: 0xCAFE_BABE,
            sensitive_prefix: SENSITIVE_PREFIX_BYTES,
            workers: 0,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            hops: vec![NodeClassification::External],
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            entries: PolicyTable::default()
                .entries()
                .into_iter()
                .map(|(id, level)| PolicyEntry { id, level })
                .collect(),
        }
    }
}

impl PolicyConfig {
    /// Build the immutable lookup table.
    pub fn table(&self) -> PolicyTable {
        PolicyTable::new(self.entries.iter().map(|e| (e.id, e.level)))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("doip")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("segment_size must be greater than zero")]
    ZeroSegmentSize,
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl DoipConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file(&Self::file_path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file, falling back to defaults when it does not exist.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(DoipConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("DOIP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.segmenter.segment_size == 0 {
            return Err(ConfigError::ZeroSegmentSize);
        }
        Ok(())
    }

    /// Apply DOIP_* overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DOIP_SEGMENTER__SEGMENT_SIZE") {
            self.segmenter.segment_size = v.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: "DOIP_SEGMENTER__SEGMENT_SIZE",
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("DOIP_SEGMENTER__POLICY_ID") {
            self.segmenter.policy_id = parse_policy_id(&v).ok_or(ConfigError::InvalidEnv {
                key: "DOIP_SEGMENTER__POLICY_ID",
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("DOIP_NODE__HOPS") {
            self.node.hops = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .filter_map(|s| s.parse().ok())
                .collect();
        }
        if let Some(v) = lookup("DOIP_REASSEMBLY__INTEGRITY") {
            self.reassembly.integrity = match v.trim() {
                "abort" => IntegrityPolicy::Abort,
                "skip_corrupt" => IntegrityPolicy::SkipCorrupt,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: "DOIP_REASSEMBLY__INTEGRITY",
                        value: v.clone(),
                    })
                }
            };
        }
        Ok(())
    }
}

/// Parse a policy id as decimal or `0x`-prefixed hex.
pub fn parse_policy_id(s: &str) -> Option<PolicyId> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => PolicyId::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}
