// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Per-group source filter (RFC 3376 §3.2, RFC 3810 §4.2)
//!
//! A filter starts in INCLUDE mode with no sources, which means "not a
//! member". An any-source join moves it to EXCLUDE; source-specific joins
//! and leaves edit the source list without touching the mode.
//!
//! ## Transitions
//!
//! | Operation | INCLUDE(S) | EXCLUDE(S) |
//! |-----------|------------|------------|
//! | join | EXCLUDE(S) | error |
//! | leave | error if S empty, else INCLUDE({}) | INCLUDE({}) |
//! | join_source(s) | error if s in S, else INCLUDE(S+s) | error if s in S, else EXCLUDE(S+s) |
//! | leave_source(s) | error if s not in S, else INCLUDE(S-s) | error if s not in S, else EXCLUDE(S-s) |
//! | include(s) | INCLUDE(S+s) | INCLUDE({s}) |
//! | exclude(s) | EXCLUDE({s}) | EXCLUDE(S+s) |

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

use crate::family::MulticastAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterMode {
    Include,
    Exclude,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::Include => f.write_str("INCLUDE"),
            FilterMode::Exclude => f.write_str("EXCLUDE"),
        }
    }
}

/// Illegal filter transitions; the filter is left unchanged
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Group {group} is already joined in EXCLUDE mode")]
    AlreadyJoined { group: IpAddr },

    #[error("Group {group} is not joined")]
    NotJoined { group: IpAddr },

    #[error("Source {source_addr} is already listed for group {group}")]
    SourceAlreadyPresent { group: IpAddr, source_addr: IpAddr },

    #[error("Source {source_addr} is not listed for group {group}")]
    SourceNotPresent { group: IpAddr, source_addr: IpAddr },
}

/// Source filter state for one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "A: Serialize",
    deserialize = "A: Deserialize<'de> + Ord"
))]
pub struct SourceFilter<A> {
    group: A,
    mode: FilterMode,
    sources: BTreeSet<A>,
}

impl<A: MulticastAddress> SourceFilter<A> {
    /// INCLUDE mode, empty source set
    pub fn new(group: A) -> Self {
        Self {
            group,
            mode: FilterMode::Include,
            sources: BTreeSet::new(),
        }
    }

    pub fn with_state<I: IntoIterator<Item = A>>(group: A, mode: FilterMode, sources: I) -> Self {
        Self {
            group,
            mode,
            sources: sources.into_iter().collect(),
        }
    }

    pub fn group(&self) -> A {
        self.group
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn sources(&self) -> &BTreeSet<A> {
        &self.sources
    }

    /// INCLUDE with no sources: no interest in the group at all
    pub fn is_idle(&self) -> bool {
        self.mode == FilterMode::Include && self.sources.is_empty()
    }

    /// Any-source join
    pub fn join(&mut self) -> Result<(), FilterError> {
        if self.mode == FilterMode::Exclude {
            return Err(FilterError::AlreadyJoined {
                group: self.group.into(),
            });
        }
        self.mode = FilterMode::Exclude;
        Ok(())
    }

    /// Any-source leave; in INCLUDE mode drops residual source joins
    pub fn leave(&mut self) -> Result<(), FilterError> {
        if self.mode == FilterMode::Include && self.sources.is_empty() {
            return Err(FilterError::NotJoined {
                group: self.group.into(),
            });
        }
        self.mode = FilterMode::Include;
        self.sources.clear();
        Ok(())
    }

    /// Source-specific join
    pub fn join_source(&mut self, source: A) -> Result<(), FilterError> {
        if !self.sources.insert(source) {
            return Err(FilterError::SourceAlreadyPresent {
                group: self.group.into(),
                source_addr: source.into(),
            });
        }
        Ok(())
    }

    /// Source-specific leave
    pub fn leave_source(&mut self, source: A) -> Result<(), FilterError> {
        if !self.sources.remove(&source) {
            return Err(FilterError::SourceNotPresent {
                group: self.group.into(),
                source_addr: source.into(),
            });
        }
        Ok(())
    }

    pub fn include(&mut self, source: A) {
        if self.mode == FilterMode::Exclude {
            self.mode = FilterMode::Include;
            self.sources.clear();
        }
        self.sources.insert(source);
    }

    pub fn exclude(&mut self, source: A) {
        if self.mode == FilterMode::Include {
            self.mode = FilterMode::Exclude;
            self.sources.clear();
        }
        self.sources.insert(source);
    }

    /// Merge another filter's state into this one
    ///
    /// A different mode replaces this filter's mode and sources with a copy
    /// of the other's; the same mode unions the source sets.
    pub fn apply(&mut self, other: &SourceFilter<A>) {
        if self.mode != other.mode {
            self.mode = other.mode;
            self.sources = other.sources.clone();
        } else {
            self.sources.extend(other.sources.iter().copied());
        }
    }

    pub fn is_excluded(&self, source: &A) -> bool {
        match self.mode {
            FilterMode::Exclude => self.sources.contains(source),
            FilterMode::Include => self.sources.is_empty(),
        }
    }

    pub fn is_included(&self, source: &A) -> bool {
        match self.mode {
            FilterMode::Include => self.sources.contains(source),
            FilterMode::Exclude => self.sources.is_empty(),
        }
    }

    /// Traffic from `source` should not be forwarded
    pub fn is_filtered(&self, source: &A) -> bool {
        self.is_excluded(source) || !self.is_included(source)
    }
}

impl<A: MulticastAddress> fmt::Display for SourceFilter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.group, self.mode)?;
        for (i, source) in self.sources.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", source)?;
        }
        f.write_str(")")
    }
}
