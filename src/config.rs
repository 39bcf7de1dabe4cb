// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Configuration file types and parsing for amt-membership.
//!
//! JSON5 configuration format supporting:
//! - Querier defaults (robustness, query interval, max response delay)
//! - Transform behavior (checksum verification, query source copying)
//! - Report source address overrides per protocol
//! - Comments and trailing commas

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;

use crate::logging::Severity;
use crate::membership::{
    DEFAULT_MAX_RESPONSE_DELAY_MS, DEFAULT_QUERY_INTERVAL_MS, DEFAULT_ROBUSTNESS_VARIABLE,
};
use crate::protocols::igmp::IGMP_ASSIGNED_SOURCE;
use crate::protocols::mld::MLD_ASSIGNED_SOURCE;
use crate::transform::{SourceCopyMode, TransformConfig};
use crate::validation;

/// Startup configuration (JSON5 file format)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub membership: MembershipSettings,

    #[serde(default)]
    pub transform: TransformSettings,

    /// Source of locally originated IGMP reports (default 169.254.1.1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub igmp_source: Option<Ipv4Addr>,

    /// Source of locally originated MLD reports (default fe80::1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mld_source: Option<Ipv6Addr>,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Querier defaults, also applied to queries older than IGMPv3/MLDv2
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MembershipSettings {
    #[serde(default = "default_robustness")]
    pub robustness: u8,

    #[serde(default = "default_query_interval_ms")]
    pub query_interval_ms: u32,

    /// Max response delay of locally built queries
    #[serde(default = "default_max_response_delay_ms")]
    pub max_response_delay_ms: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransformSettings {
    #[serde(default = "default_true")]
    pub verify_checksums: bool,

    #[serde(default)]
    pub source_copy: SourceCopyMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: Severity,
}

fn default_robustness() -> u8 {
    DEFAULT_ROBUSTNESS_VARIABLE
}

fn default_query_interval_ms() -> u32 {
    DEFAULT_QUERY_INTERVAL_MS
}

fn default_max_response_delay_ms() -> u32 {
    DEFAULT_MAX_RESPONSE_DELAY_MS
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> Severity {
    Severity::Info
}

impl Default for MembershipSettings {
    fn default() -> Self {
        Self {
            robustness: default_robustness(),
            query_interval_ms: default_query_interval_ms(),
            max_response_delay_ms: default_max_response_delay_ms(),
        }
    }
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            verify_checksums: true,
            source_copy: SourceCopyMode::default(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON5 file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize configuration to JSON5 string (with pretty formatting)
    pub fn to_json5(&self) -> String {
        // json5 has no pretty printer; any JSON is valid JSON5
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5();
        std::fs::write(path, content)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_robustness(self.membership.robustness)
            .map_err(|reason| ConfigError::invalid("membership.robustness", reason))?;
        validation::validate_query_interval_ms(self.membership.query_interval_ms)
            .map_err(|reason| ConfigError::invalid("membership.query_interval_ms", reason))?;
        validation::validate_max_response_delay_ms(self.membership.max_response_delay_ms)
            .map_err(|reason| ConfigError::invalid("membership.max_response_delay_ms", reason))?;

        if let Some(addr) = self.igmp_source {
            validation::validate_unicast_address(addr, "igmp_source")
                .map_err(|reason| ConfigError::invalid("igmp_source", reason))?;
        }
        if let Some(addr) = self.mld_source {
            validation::validate_link_local_address(addr, "mld_source")
                .map_err(|reason| ConfigError::invalid("mld_source", reason))?;
        }
        Ok(())
    }

    /// Settings for the transforms
    pub fn transform_config(&self) -> TransformConfig {
        TransformConfig {
            verify_checksums: self.transform.verify_checksums,
            source_copy: self.transform.source_copy,
            default_robustness: self.membership.robustness,
            default_query_interval_ms: self.membership.query_interval_ms,
            max_response_delay_ms: self.membership.max_response_delay_ms,
        }
    }

    pub fn igmp_source(&self) -> Ipv4Addr {
        self.igmp_source.unwrap_or(IGMP_ASSIGNED_SOURCE)
    }

    pub fn mld_source(&self) -> Ipv6Addr {
        self.mld_source.unwrap_or(MLD_ASSIGNED_SOURCE)
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    IoError(std::path::PathBuf, String),
    ParseError(String),
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: String) -> Self {
        ConfigError::InvalidValue { field, reason }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, msg) => {
                write!(
                    f,
                    "failed to read config file '{}': {}",
                    path.display(),
                    msg
                )
            }
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
