// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Membership reports through the IGMPv3/MLDv2 encoders and back.

use amt_membership::packet::checksum::verify_checksum;
use amt_membership::protocols::{igmp, mld};
use amt_membership::transform::{
    IgmpReportTransform, MldReportTransform, ReportToMembership, Transform,
};
use amt_membership::{
    GroupMembershipRecord, Igmp, IpPacket, Ipv4Packet, Ipv6Packet, MembershipReport, Mld,
    RecordType,
};
use std::collections::BTreeSet;
use std::net::{Ipv4Addr, Ipv6Addr};

#[test]
fn test_allow_record_survives_ipv4_round_trip() {
    let group = Ipv4Addr::new(239, 1, 1, 1);
    let sources = [Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 1)];
    let report = MembershipReport::from_records([GroupMembershipRecord::new(
        RecordType::AllowNewSources,
        group,
        sources,
    )]);

    let mut packet = IgmpReportTransform::default().transform(&report).unwrap();
    let bytes = packet.to_bytes().unwrap();
    let reparsed = Ipv4Packet::parse(bytes, true).unwrap();
    let back = ReportToMembership::<Igmp>::default()
        .transform(&reparsed)
        .unwrap();

    assert_eq!(back.len(), 1);
    let record = &back.records()[0];
    assert_eq!(record.record_type, RecordType::AllowNewSources);
    assert_eq!(record.group, group);
    assert_eq!(record.sources, sources.into_iter().collect::<BTreeSet<_>>());
}

#[test]
fn test_ipv4_report_packet_shape() {
    let report = MembershipReport::from_records([
        GroupMembershipRecord::new(RecordType::ModeIsExclude, Ipv4Addr::new(239, 1, 1, 1), []),
        GroupMembershipRecord::new(
            RecordType::ModeIsInclude,
            Ipv4Addr::new(232, 1, 1, 1),
            [Ipv4Addr::new(10, 0, 0, 1)],
        ),
    ]);
    let mut packet = IgmpReportTransform::default().transform(&report).unwrap();
    let bytes = packet.to_bytes().unwrap();

    // 20-byte header + 4 bytes Router Alert
    assert_eq!(bytes[0], 0x46);
    assert_eq!(bytes[1] >> 5, 0b110);
    assert_eq!(bytes[8], 1);
    assert_eq!(bytes[9], igmp::IGMP_PROTOCOL);
    assert_eq!(&bytes[20..24], &[148, 4, 0, 0]);
    assert!(verify_checksum(&bytes[..24], 10).is_ok());

    let message = &bytes[24..];
    assert_eq!(message[0], 0x22);
    assert_eq!(u16::from_be_bytes([message[6], message[7]]), 2);
    // report header, then records of 8 bytes plus 4 per source
    assert_eq!(message.len(), 8 + 8 + 12);
    assert!(verify_checksum(message, 2).is_ok());

    assert_eq!(packet.source, igmp::IGMP_ASSIGNED_SOURCE);
    assert_eq!(packet.destination, igmp::ALL_IGMPV3_ROUTERS);
}

#[test]
fn test_custom_report_source() {
    let source = Ipv4Addr::new(192, 0, 2, 7);
    let report = MembershipReport::from_records([GroupMembershipRecord::new(
        RecordType::BlockOldSources,
        Ipv4Addr::new(232, 9, 9, 9),
        [Ipv4Addr::new(10, 0, 0, 1)],
    )]);
    let mut packet = IgmpReportTransform::default()
        .with_source(source)
        .transform(&report)
        .unwrap();
    let reparsed = Ipv4Packet::parse(packet.to_bytes().unwrap(), true).unwrap();
    assert_eq!(reparsed.source, source);
}

#[test]
fn test_mld_report_round_trip() {
    let group: Ipv6Addr = "ff3e::8000:1".parse().unwrap();
    let sources: [Ipv6Addr; 2] = ["2001:db8::1".parse().unwrap(), "2001:db8::2".parse().unwrap()];
    let report = MembershipReport::from_records([
        GroupMembershipRecord::new(RecordType::ChangeToIncludeMode, group, sources),
        GroupMembershipRecord::new(RecordType::ModeIsExclude, "ff0e::123".parse().unwrap(), []),
    ]);

    let mut packet = MldReportTransform::default().transform(&report).unwrap();
    assert_eq!(packet.hop_limit, 1);
    assert!(packet.has_router_alert());
    assert_eq!(packet.destination, mld::ALL_MLDV2_ROUTERS);

    let reparsed = Ipv6Packet::parse(packet.to_bytes().unwrap(), true).unwrap();
    assert_eq!(reparsed.upper_layer_protocol(), 58);
    let back = ReportToMembership::<Mld>::default()
        .transform(&reparsed)
        .unwrap();
    assert_eq!(back, report);
}

#[test]
fn test_mld_checksum_covers_pseudo_header() {
    let report = MembershipReport::from_records([GroupMembershipRecord::new(
        RecordType::ModeIsExclude,
        "ff3e::1".parse::<Ipv6Addr>().unwrap(),
        [],
    )]);
    let mut packet = MldReportTransform::default().transform(&report).unwrap();
    // same message, different source: the ICMPv6 checksum no longer matches
    packet.source = "fe80::99".parse().unwrap();

    let err = ReportToMembership::<Mld>::default()
        .transform(&packet)
        .unwrap_err();
    assert!(err.is_parse_error());
}

#[test]
fn test_empty_report() {
    let report = MembershipReport::<Ipv4Addr>::new();
    let mut packet = IgmpReportTransform::default().transform(&report).unwrap();
    assert_eq!(packet.payload.len(), 8);

    let back = ReportToMembership::<Igmp>::default()
        .transform(packet.to_bytes().unwrap())
        .unwrap();
    assert!(back.is_empty());
}
