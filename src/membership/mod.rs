// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Protocol-independent membership model
//!
//! Queries and reports here carry no wire details: the transforms in
//! [`crate::transform`] translate between these and IGMP/MLD packets.
//! Source filter state and the membership table built on it live in the
//! submodules.

pub mod filter;
pub mod service;
pub mod table;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::family::MulticastAddress;

pub use filter::{FilterError, FilterMode, SourceFilter};
pub use service::{MembershipHandle, MembershipService, ServiceError};
pub use table::MembershipTable;

/// Robustness Variable assumed when a query does not carry one
pub const DEFAULT_ROBUSTNESS_VARIABLE: u8 = 2;

/// Query interval assumed when a query does not carry one
pub const DEFAULT_QUERY_INTERVAL_MS: u32 = 125_000;

/// Max response delay put in locally built queries
pub const DEFAULT_MAX_RESPONSE_DELAY_MS: u32 = 10_000;

/// Which of the three query shapes a query has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    General,
    GroupSpecific,
    GroupAndSourceSpecific,
}

/// A membership query, independent of IGMP or MLD
///
/// `sources` is `None` unless the query names sources; an empty set passed
/// to [`MembershipQuery::with_sources`] is stored as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "A: Serialize",
    deserialize = "A: Deserialize<'de> + Ord"
))]
#[serde(rename_all = "camelCase")]
pub struct MembershipQuery<A> {
    group: A,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sources: Option<BTreeSet<A>>,
    max_response_delay: u32,
    #[serde(default = "default_robustness")]
    robustness: u8,
    #[serde(default = "default_query_interval_ms")]
    query_interval_ms: u32,
}

fn default_robustness() -> u8 {
    DEFAULT_ROBUSTNESS_VARIABLE
}

fn default_query_interval_ms() -> u32 {
    DEFAULT_QUERY_INTERVAL_MS
}

impl<A: MulticastAddress> MembershipQuery<A> {
    pub fn new(group: A, max_response_delay: u32) -> Self {
        Self {
            group,
            sources: None,
            max_response_delay,
            robustness: DEFAULT_ROBUSTNESS_VARIABLE,
            query_interval_ms: DEFAULT_QUERY_INTERVAL_MS,
        }
    }

    pub fn general(unspecified: A, max_response_delay: u32) -> Self {
        Self::new(unspecified, max_response_delay)
    }

    pub fn with_sources<I: IntoIterator<Item = A>>(mut self, sources: I) -> Self {
        let set: BTreeSet<A> = sources.into_iter().collect();
        self.sources = if set.is_empty() { None } else { Some(set) };
        self
    }

    pub fn with_robustness(mut self, robustness: u8) -> Self {
        self.robustness = robustness;
        self
    }

    pub fn with_query_interval_ms(mut self, query_interval_ms: u32) -> Self {
        self.query_interval_ms = query_interval_ms;
        self
    }

    pub fn group(&self) -> A {
        self.group
    }

    pub fn sources(&self) -> Option<&BTreeSet<A>> {
        self.sources.as_ref()
    }

    /// Max response delay in the originating protocol's units
    pub fn max_response_delay(&self) -> u32 {
        self.max_response_delay
    }

    pub fn robustness(&self) -> u8 {
        self.robustness
    }

    pub fn query_interval_ms(&self) -> u32 {
        self.query_interval_ms
    }

    pub fn is_general_query(&self) -> bool {
        self.group.is_unspecified_addr()
    }

    pub fn is_group_query(&self) -> bool {
        !self.group.is_unspecified_addr() && self.sources.as_ref().map_or(true, |s| s.is_empty())
    }

    pub fn is_source_query(&self) -> bool {
        !self.group.is_unspecified_addr() && self.sources.as_ref().is_some_and(|s| !s.is_empty())
    }

    pub fn kind(&self) -> QueryKind {
        if self.is_general_query() {
            QueryKind::General
        } else if self.is_source_query() {
            QueryKind::GroupAndSourceSpecific
        } else {
            QueryKind::GroupSpecific
        }
    }
}

/// Group record types (RFC 3376 §4.2.12, RFC 3810 §5.2.12)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    ModeIsInclude = 1,
    ModeIsExclude = 2,
    ChangeToIncludeMode = 3,
    ChangeToExcludeMode = 4,
    AllowNewSources = 5,
    BlockOldSources = 6,
}

impl RecordType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(RecordType::ModeIsInclude),
            2 => Some(RecordType::ModeIsExclude),
            3 => Some(RecordType::ChangeToIncludeMode),
            4 => Some(RecordType::ChangeToExcludeMode),
            5 => Some(RecordType::AllowNewSources),
            6 => Some(RecordType::BlockOldSources),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Current-state records answer queries; the rest report changes
    pub fn is_current_state(self) -> bool {
        matches!(self, RecordType::ModeIsInclude | RecordType::ModeIsExclude)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::ModeIsInclude => "MODE_IS_INCLUDE",
            RecordType::ModeIsExclude => "MODE_IS_EXCLUDE",
            RecordType::ChangeToIncludeMode => "CHANGE_TO_INCLUDE_MODE",
            RecordType::ChangeToExcludeMode => "CHANGE_TO_EXCLUDE_MODE",
            RecordType::AllowNewSources => "ALLOW_NEW_SOURCES",
            RecordType::BlockOldSources => "BLOCK_OLD_SOURCES",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (record type, group, sources) entry of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "A: Serialize",
    deserialize = "A: Deserialize<'de> + Ord"
))]
#[serde(rename_all = "camelCase")]
pub struct GroupMembershipRecord<A> {
    pub record_type: RecordType,
    pub group: A,
    #[serde(default = "BTreeSet::new")]
    pub sources: BTreeSet<A>,
}

impl<A: MulticastAddress> GroupMembershipRecord<A> {
    pub fn new<I: IntoIterator<Item = A>>(record_type: RecordType, group: A, sources: I) -> Self {
        Self {
            record_type,
            group,
            sources: sources.into_iter().collect(),
        }
    }
}

/// A membership report, independent of IGMP or MLD
///
/// Records are kept in insertion order; adding a second record with the same
/// type and group merges the source sets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(bound(
    serialize = "A: Serialize",
    deserialize = "A: Deserialize<'de> + Ord"
))]
pub struct MembershipReport<A> {
    records: Vec<GroupMembershipRecord<A>>,
}

impl<A: MulticastAddress> MembershipReport<A> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn from_records<I: IntoIterator<Item = GroupMembershipRecord<A>>>(records: I) -> Self {
        let mut report = Self::new();
        for record in records {
            report.add_record(record);
        }
        report
    }

    pub fn add_record(&mut self, record: GroupMembershipRecord<A>) {
        match self
            .records
            .iter_mut()
            .find(|r| r.record_type == record.record_type && r.group == record.group)
        {
            Some(existing) => existing.sources.extend(record.sources),
            None => self.records.push(record),
        }
    }

    pub fn records(&self) -> &[GroupMembershipRecord<A>] {
        &self.records
    }

    pub fn into_records(self) -> Vec<GroupMembershipRecord<A>> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
