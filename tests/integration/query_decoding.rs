// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Query packets decoded into protocol-independent queries.

use amt_membership::logging::Logger;
use amt_membership::protocols::{
    encode_query, igmp, mld, ExtendedQuery, Igmp, Mld, QueryMessage,
};
use amt_membership::transform::{
    IgmpQueryTransform, MldQueryTransform, ProtocolError, QueryToMembership, SourceCopyMode,
    Transform, TransformConfig,
};
use amt_membership::{AddressFamily, IpPacket, Ipv4, Ipv4Packet, Ipv6, QueryKind};
use bytes::Bytes;
use std::net::{Ipv4Addr, Ipv6Addr};

const QUERIER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 254);

fn igmp_query(group: Ipv4Addr, extended: Option<ExtendedQuery<Ipv4Addr>>) -> Ipv4Packet {
    let query = QueryMessage {
        max_resp_code: 100,
        group,
        extended,
    };
    let destination = if group.is_unspecified() {
        igmp::ALL_SYSTEMS_GROUP
    } else {
        group
    };
    let message = encode_query::<Igmp>(&query, &QUERIER, &destination).unwrap();
    Ipv4::membership_packet(QUERIER, destination, igmp::IGMP_PROTOCOL, message)
}

fn extended(robustness: u8, qqic: u8, sources: Vec<Ipv4Addr>) -> Option<ExtendedQuery<Ipv4Addr>> {
    Some(ExtendedQuery {
        suppress_router_processing: false,
        robustness,
        qqic,
        sources,
    })
}

#[test]
fn test_explicit_zero_robustness_is_kept() {
    let packet = igmp_query(Ipv4Addr::UNSPECIFIED, extended(0, 125, vec![]));
    let query = IgmpQueryTransform::default().transform(&packet).unwrap();

    assert_eq!(query.robustness(), 0);
    assert_eq!(query.query_interval_ms(), 125_000);
    assert!(query.sources().is_none());
    assert_eq!(query.kind(), QueryKind::General);
}

#[test]
fn test_v2_query_gets_defaults() {
    let packet = igmp_query(Ipv4Addr::new(239, 1, 1, 1), None);
    let query = IgmpQueryTransform::default().transform(&packet).unwrap();

    assert_eq!(query.robustness(), 2);
    assert_eq!(query.query_interval_ms(), 125_000);
    assert_eq!(query.max_response_delay(), 100);
    assert_eq!(query.kind(), QueryKind::GroupSpecific);
}

#[test]
fn test_exponential_qqic() {
    // 0x8a: mant 0xa, exp 0 -> (0x1a) << 3 = 208 seconds
    let packet = igmp_query(Ipv4Addr::UNSPECIFIED, extended(2, 0x8a, vec![]));
    let query = IgmpQueryTransform::default().transform(&packet).unwrap();
    assert_eq!(query.query_interval_ms(), 208_000);
}

#[test]
fn test_raw_bytes_and_parsed_packet_agree() {
    let mut packet = igmp_query(
        Ipv4Addr::new(232, 1, 1, 1),
        extended(2, 125, vec![Ipv4Addr::new(10, 0, 0, 1)]),
    );
    let transform = IgmpQueryTransform::default();
    let from_packet = transform.transform(&packet).unwrap();
    let from_bytes = transform.transform(packet.to_bytes().unwrap()).unwrap();
    assert_eq!(from_packet, from_bytes);
}

#[test]
fn test_all_sources_copied_by_default() {
    let sources = vec![
        Ipv4Addr::new(10, 0, 0, 1),
        Ipv4Addr::new(10, 0, 0, 2),
        Ipv4Addr::new(10, 0, 0, 3),
    ];
    let packet = igmp_query(Ipv4Addr::new(232, 1, 1, 1), extended(2, 125, sources.clone()));
    let query = IgmpQueryTransform::default().transform(&packet).unwrap();

    assert_eq!(query.kind(), QueryKind::GroupAndSourceSpecific);
    assert_eq!(
        query.sources().unwrap().iter().copied().collect::<Vec<_>>(),
        sources
    );
}

#[test]
fn test_first_only_source_copy_compatibility() {
    let packet = igmp_query(
        Ipv4Addr::new(232, 1, 1, 1),
        extended(
            2,
            125,
            vec![Ipv4Addr::new(10, 0, 0, 9), Ipv4Addr::new(10, 0, 0, 1)],
        ),
    );
    let config = TransformConfig {
        source_copy: SourceCopyMode::FirstOnly,
        ..TransformConfig::default()
    };
    let query = QueryToMembership::<Igmp>::new(config, Logger::discard())
        .transform(&packet)
        .unwrap();

    // the first source on the wire, not the lowest address
    assert_eq!(
        query.sources().unwrap().iter().copied().collect::<Vec<_>>(),
        vec![Ipv4Addr::new(10, 0, 0, 9)]
    );
}

#[test]
fn test_corrupted_message_checksum() {
    let mut packet = igmp_query(Ipv4Addr::new(239, 1, 1, 1), None);
    let mut message = packet.payload.to_vec();
    message[7] ^= 0x01;
    packet.set_payload(Bytes::from(message));

    let err = IgmpQueryTransform::default().transform(&packet).unwrap_err();
    assert!(err.is_parse_error());
    assert_eq!(err.reason(), "malformed");

    let lenient = QueryToMembership::<Igmp>::new(
        TransformConfig {
            verify_checksums: false,
            ..TransformConfig::default()
        },
        Logger::discard(),
    );
    let query = lenient.transform(&packet).unwrap();
    assert_eq!(query.group(), Ipv4Addr::new(239, 1, 1, 0));
}

#[test]
fn test_truncated_bytes() {
    let mut packet = igmp_query(Ipv4Addr::UNSPECIFIED, extended(2, 125, vec![]));
    let bytes = packet.to_bytes().unwrap();
    let err = IgmpQueryTransform::default()
        .transform(bytes.slice(..10))
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Parse(_)));
}

#[test]
fn test_mld_v2_query() {
    let querier: Ipv6Addr = "fe80::1".parse().unwrap();
    let group: Ipv6Addr = "ff3e::8000:1".parse().unwrap();
    let source: Ipv6Addr = "2001:db8::10".parse().unwrap();
    let query = QueryMessage {
        // 16-bit exponential: mant 0, exp 1 -> 0x1000 << 4
        max_resp_code: 0x9000,
        group,
        extended: Some(ExtendedQuery {
            suppress_router_processing: true,
            robustness: 3,
            qqic: 60,
            sources: vec![source],
        }),
    };
    let message = encode_query::<Mld>(&query, &querier, &group).unwrap();
    let packet = Ipv6::membership_packet(querier, group, 58, message);

    let decoded = MldQueryTransform::default().transform(&packet).unwrap();
    assert_eq!(decoded.group(), group);
    assert_eq!(decoded.max_response_delay(), 0x1000 << 4);
    assert_eq!(decoded.robustness(), 3);
    assert_eq!(decoded.query_interval_ms(), 60_000);
    assert!(decoded.sources().unwrap().contains(&source));
}

#[test]
fn test_mld_v1_query_defaults() {
    let querier: Ipv6Addr = "fe80::1".parse().unwrap();
    let query = QueryMessage {
        max_resp_code: 10_000,
        group: Ipv6Addr::UNSPECIFIED,
        extended: None,
    };
    let message = encode_query::<Mld>(&query, &querier, &mld::ALL_NODES).unwrap();
    let packet = Ipv6::membership_packet(querier, mld::ALL_NODES, 58, message);

    let decoded = MldQueryTransform::default().transform(&packet).unwrap();
    assert!(decoded.is_general_query());
    assert_eq!(decoded.max_response_delay(), 10_000);
    assert_eq!(decoded.robustness(), 2);
    assert_eq!(decoded.query_interval_ms(), 125_000);
}

#[test]
fn test_mld_rejects_ipv4_packet() {
    let mut packet = igmp_query(Ipv4Addr::UNSPECIFIED, None);
    let err = MldQueryTransform::default()
        .transform(packet.to_bytes().unwrap())
        .unwrap_err();
    assert_eq!(
        err,
        ProtocolError::WrongIpVersion {
            expected: 6,
            actual: 4
        }
    );
}
