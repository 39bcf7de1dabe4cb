// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Source filters keyed by group
//!
//! A group is present only while its filter expresses some interest; a
//! filter that returns to INCLUDE with no sources is dropped.

use std::collections::{BTreeMap, BTreeSet};

use super::filter::{FilterError, FilterMode, SourceFilter};
use super::{GroupMembershipRecord, MembershipQuery, MembershipReport, QueryKind, RecordType};
use crate::family::MulticastAddress;
use crate::logging::{Facility, Logger};
use crate::{log_debug, log_notice};

#[derive(Debug, Clone)]
pub struct MembershipTable<A> {
    filters: BTreeMap<A, SourceFilter<A>>,
    logger: Logger,
}

impl<A: MulticastAddress> Default for MembershipTable<A> {
    fn default() -> Self {
        Self::new(Logger::discard())
    }
}

impl<A: MulticastAddress> MembershipTable<A> {
    pub fn new(logger: Logger) -> Self {
        Self {
            filters: BTreeMap::new(),
            logger,
        }
    }

    pub fn join(&mut self, group: A) -> Result<(), FilterError> {
        self.update(group, "join", |f| f.join())
    }

    pub fn leave(&mut self, group: A) -> Result<(), FilterError> {
        self.update(group, "leave", |f| f.leave())
    }

    pub fn join_source(&mut self, group: A, source: A) -> Result<(), FilterError> {
        self.update(group, "join_source", |f| f.join_source(source))
    }

    pub fn leave_source(&mut self, group: A, source: A) -> Result<(), FilterError> {
        self.update(group, "leave_source", |f| f.leave_source(source))
    }

    pub fn include(&mut self, group: A, source: A) {
        // include cannot fail
        let _ = self.update(group, "include", |f| {
            f.include(source);
            Ok(())
        });
    }

    pub fn exclude(&mut self, group: A, source: A) {
        let _ = self.update(group, "exclude", |f| {
            f.exclude(source);
            Ok(())
        });
    }

    /// Merge `other` into the filter for its group
    pub fn apply(&mut self, other: &SourceFilter<A>) {
        let _ = self.update(other.group(), "apply", |f| {
            f.apply(other);
            Ok(())
        });
    }

    fn update<F>(&mut self, group: A, operation: &str, op: F) -> Result<(), FilterError>
    where
        F: FnOnce(&mut SourceFilter<A>) -> Result<(), FilterError>,
    {
        let filter = self
            .filters
            .entry(group)
            .or_insert_with(|| SourceFilter::new(group));
        let result = op(filter);

        match &result {
            Ok(()) => log_debug!(
                self.logger,
                Facility::Filter,
                "{} {}: now {}",
                operation,
                group,
                filter
            ),
            Err(e) => log_notice!(
                self.logger,
                Facility::Filter,
                "Refused {} on {}: {}",
                operation,
                group,
                e
            ),
        }

        if filter.is_idle() {
            self.filters.remove(&group);
        }
        result
    }

    pub fn filter(&self, group: &A) -> Option<&SourceFilter<A>> {
        self.filters.get(group)
    }

    pub fn groups(&self) -> impl Iterator<Item = &A> {
        self.filters.keys()
    }

    pub fn filters(&self) -> impl Iterator<Item = &SourceFilter<A>> {
        self.filters.values()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Whether traffic from `source` to `group` should be forwarded
    /// (RFC 3376 §3.2: INCLUDE admits listed sources, EXCLUDE all others)
    pub fn accepts(&self, group: &A, source: &A) -> bool {
        self.filters.get(group).is_some_and(|f| match f.mode() {
            FilterMode::Include => f.sources().contains(source),
            FilterMode::Exclude => !f.sources().contains(source),
        })
    }

    /// One current-state record per group
    pub fn current_state_report(&self) -> MembershipReport<A> {
        MembershipReport::from_records(self.filters.values().map(current_state_record))
    }

    /// The report a host with this state sends in answer to `query`
    /// (RFC 3376 §5.2, RFC 3810 §6.2); `None` when there is nothing to say
    pub fn respond_to(&self, query: &MembershipQuery<A>) -> Option<MembershipReport<A>> {
        let report = match query.kind() {
            QueryKind::General => self.current_state_report(),
            QueryKind::GroupSpecific => {
                let filter = self.filters.get(&query.group())?;
                MembershipReport::from_records([current_state_record(filter)])
            }
            QueryKind::GroupAndSourceSpecific => {
                let filter = self.filters.get(&query.group())?;
                let queried = query.sources()?;
                let sources: BTreeSet<A> = match filter.mode() {
                    FilterMode::Include => filter.sources().intersection(queried).copied().collect(),
                    FilterMode::Exclude => queried.difference(filter.sources()).copied().collect(),
                };
                if sources.is_empty() {
                    return None;
                }
                MembershipReport::from_records([GroupMembershipRecord::new(
                    RecordType::ModeIsInclude,
                    query.group(),
                    sources,
                )])
            }
        };
        if report.is_empty() {
            None
        } else {
            Some(report)
        }
    }
}

fn current_state_record<A: MulticastAddress>(filter: &SourceFilter<A>) -> GroupMembershipRecord<A> {
    let record_type = match filter.mode() {
        FilterMode::Include => RecordType::ModeIsInclude,
        FilterMode::Exclude => RecordType::ModeIsExclude,
    };
    GroupMembershipRecord::new(record_type, filter.group(), filter.sources().iter().copied())
}
