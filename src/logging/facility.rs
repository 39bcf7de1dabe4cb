// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging facilities (component identifiers)

use serde::{Deserialize, Serialize};

/// Logging facility - identifies which component generated the log message
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facility {
    // === Wire handling ===
    /// IPv4/IPv6 header parsing and serialization
    Codec = 0,
    /// IGMP / MLD query and report translation
    Transform = 1,

    // === Membership state ===
    /// Per-group source filter transitions
    Filter = 2,
    /// Membership table and the single-writer service task
    Membership = 3,

    // === Process plumbing ===
    /// Configuration loading and validation
    Config = 4,
    /// Command line front end
    Cli = 5,

    /// Test harness and fixtures
    Test = 12,

    /// Fallback for uncategorized messages
    Unknown = 255,
}

impl Facility {
    /// Every facility a registry creates a logger for
    pub const ALL: [Facility; 7] = [
        Facility::Codec,
        Facility::Transform,
        Facility::Filter,
        Facility::Membership,
        Facility::Config,
        Facility::Cli,
        Facility::Test,
    ];

    /// Get facility code as u8
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Get facility name as static string
    pub const fn as_str(self) -> &'static str {
        match self {
            Facility::Codec => "Codec",
            Facility::Transform => "Transform",
            Facility::Filter => "Filter",
            Facility::Membership => "Membership",
            Facility::Config => "Config",
            Facility::Cli => "Cli",
            Facility::Test => "Test",
            Facility::Unknown => "Unknown",
        }
    }

    /// Create from u8 value (returns Unknown if invalid)
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Facility::Codec,
            1 => Facility::Transform,
            2 => Facility::Filter,
            3 => Facility::Membership,
            4 => Facility::Config,
            5 => Facility::Cli,
            12 => Facility::Test,
            _ => Facility::Unknown,
        }
    }

    /// Check if this facility logs once per packet
    pub const fn is_per_packet(self) -> bool {
        matches!(self, Facility::Codec | Facility::Transform)
    }

    /// Get recommended in-memory buffer size for this facility
    pub const fn buffer_size(self) -> usize {
        match self {
            Facility::Transform => 4096,
            Facility::Codec => 2048,
            Facility::Membership => 1024,
            Facility::Filter => 1024,
            _ => 256,
        }
    }
}

impl std::fmt::Display for Facility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
