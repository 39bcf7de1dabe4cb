// SPDX-License-Identifier: Apache-2.0 OR MIT
//! End-to-end gateway behavior: a relay's query arrives, the receiver's
//! filter state answers it, and the answer goes back on the wire.

use amt_membership::logging::{Facility, LogRegistry, Severity};
use amt_membership::transform::{
    IgmpQueryTransform, IgmpReportTransform, MembershipToQuery, MldQueryTransform,
    MldReportTransform, ReportToMembership, Transform,
};
use amt_membership::{
    FilterError, FilterMode, Igmp, MembershipQuery, MembershipTable, Mld, RecordType, SourceFilter,
};
use std::net::{Ipv4Addr, Ipv6Addr};

fn group() -> Ipv4Addr {
    Ipv4Addr::new(232, 1, 1, 1)
}

fn src(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, last)
}

#[test]
fn test_ssm_source_join_and_leave() {
    let mut filter = SourceFilter::new(group());
    assert_eq!(filter.mode(), FilterMode::Include);

    filter.join_source(src(1)).unwrap();
    assert_eq!(filter.mode(), FilterMode::Include);
    assert!(filter.sources().contains(&src(1)));

    assert!(matches!(
        filter.join_source(src(1)),
        Err(FilterError::SourceAlreadyPresent { .. })
    ));

    filter.leave_source(src(1)).unwrap();
    assert_eq!(filter.mode(), FilterMode::Include);
    assert!(filter.sources().is_empty());

    assert!(matches!(
        filter.leave_source(src(1)),
        Err(FilterError::SourceNotPresent { .. })
    ));
}

#[test]
fn test_any_source_join_and_leave() {
    let mut filter = SourceFilter::new(group());
    filter.join().unwrap();
    assert_eq!(filter.mode(), FilterMode::Exclude);
    assert!(filter.sources().is_empty());
    assert!(matches!(filter.join(), Err(FilterError::AlreadyJoined { .. })));

    filter.leave().unwrap();
    assert_eq!(filter.mode(), FilterMode::Include);
    assert!(matches!(filter.leave(), Err(FilterError::NotJoined { .. })));
}

#[test]
fn test_source_query_answered_over_igmp() {
    let mut gateway = MembershipTable::default();
    gateway.join_source(group(), src(1)).unwrap();
    gateway.join_source(group(), src(2)).unwrap();

    // relay asks about 10.0.0.2 and 10.0.0.3
    let relay_query = MembershipQuery::new(group(), 50).with_sources([src(2), src(3)]);
    let query_packet = MembershipToQuery::<Igmp>::default()
        .transform(&relay_query)
        .unwrap();
    assert_eq!(query_packet.destination, group());

    let query = IgmpQueryTransform::default()
        .transform(&query_packet)
        .unwrap();
    assert_eq!(query, relay_query);

    let answer = gateway.respond_to(&query).unwrap();
    let report_packet = IgmpReportTransform::default().transform(&answer).unwrap();

    let received = ReportToMembership::<Igmp>::default()
        .transform(&report_packet)
        .unwrap();
    assert_eq!(received.len(), 1);
    let record = &received.records()[0];
    assert_eq!(record.record_type, RecordType::ModeIsInclude);
    assert_eq!(record.group, group());
    assert_eq!(record.sources.iter().copied().collect::<Vec<_>>(), vec![src(2)]);
}

#[test]
fn test_general_query_answered_over_mld() {
    let asm_group: Ipv6Addr = "ff0e::1234".parse().unwrap();
    let ssm_group: Ipv6Addr = "ff3e::8000:1".parse().unwrap();
    let source: Ipv6Addr = "2001:db8::1".parse().unwrap();

    let mut gateway = MembershipTable::default();
    gateway.join(asm_group).unwrap();
    gateway.join_source(ssm_group, source).unwrap();

    let general = MembershipQuery::general(Ipv6Addr::UNSPECIFIED, 10_000);
    let query_packet = MembershipToQuery::<Mld>::default()
        .transform(&general)
        .unwrap();
    let query = MldQueryTransform::default()
        .transform(&query_packet)
        .unwrap();
    assert!(query.is_general_query());

    let answer = gateway.respond_to(&query).unwrap();
    let report_packet = MldReportTransform::default().transform(&answer).unwrap();
    let received = ReportToMembership::<Mld>::default()
        .transform(&report_packet)
        .unwrap();
    assert_eq!(received, gateway.current_state_report());
}

#[test]
fn test_relay_tracks_reported_state() {
    // relay side: apply what a gateway reports to its own view
    let mut gateway = MembershipTable::default();
    gateway.exclude(group(), src(9));

    let report_packet = IgmpReportTransform::default()
        .transform(&gateway.current_state_report())
        .unwrap();
    let received = ReportToMembership::<Igmp>::default()
        .transform(&report_packet)
        .unwrap();

    let mut relay = MembershipTable::default();
    for record in received.records() {
        let mode = match record.record_type {
            RecordType::ModeIsExclude => FilterMode::Exclude,
            _ => FilterMode::Include,
        };
        relay.apply(&SourceFilter::with_state(
            record.group,
            mode,
            record.sources.iter().copied(),
        ));
    }
    assert!(relay.accepts(&group(), &src(1)));
    assert!(!relay.accepts(&group(), &src(9)));
}

#[test]
fn test_transitions_and_rejections_are_logged() {
    let registry = LogRegistry::new_buffered(Severity::Debug);
    let mut table = MembershipTable::new(registry.get_logger(Facility::Filter).unwrap());
    table.join(group()).unwrap();
    assert!(table.join(group()).is_err());

    let buffers = registry.export_buffers();
    let (_, buffer) = buffers
        .iter()
        .find(|(facility, _)| *facility == Facility::Filter)
        .unwrap();
    let mut severities = Vec::new();
    while let Some(entry) = buffer.read() {
        severities.push(entry.severity);
    }
    assert_eq!(severities, vec![Severity::Debug, Severity::Notice]);
}
