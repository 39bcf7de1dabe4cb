// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Property-based tests for the IP packet codec.
//!
//! - Writing then parsing an IPv4 packet gives back the same packet.
//! - Any single bit flip in a written header is caught by the checksum.
//! - No byte string makes a parser panic.

use amt_membership::logging::Logger;
use amt_membership::packet::{FragmentFlags, Ipv4Option, TypeOfService};
use amt_membership::transform::{decode_packet, TransformConfig};
use amt_membership::{IpPacket, Ipv4Packet, Ipv6Packet};
use bytes::Bytes;
use proptest::prelude::*;
use std::net::Ipv4Addr;

prop_compose! {
    fn arb_ipv4_packet()(
        tos in any::<u8>(),
        identification in any::<u16>(),
        flags in 0u8..8,
        fragment_offset in 0u16..0x2000,
        ttl in any::<u8>(),
        protocol in any::<u8>(),
        source in any::<u32>(),
        destination in any::<u32>(),
        router_alert in proptest::option::of(any::<u16>()),
        payload in proptest::collection::vec(any::<u8>(), 0..64),
    ) -> Ipv4Packet {
        let mut packet = Ipv4Packet::new(
            Ipv4Addr::from(source),
            Ipv4Addr::from(destination),
            protocol,
            Bytes::from(payload),
        )
        .with_tos(TypeOfService::from_byte(tos))
        .with_identification(identification)
        .with_flags(FragmentFlags::from_bits(flags))
        .with_ttl(ttl);
        packet.fragment_offset = fragment_offset;
        if let Some(value) = router_alert {
            packet.push_option(Ipv4Option::RouterAlert(value));
        }
        packet
    }
}

proptest! {
    #[test]
    fn test_ipv4_round_trip(mut packet in arb_ipv4_packet()) {
        let bytes = packet.to_bytes().unwrap();
        let parsed = Ipv4Packet::parse(bytes, true).unwrap();
        prop_assert_eq!(parsed, packet);
    }

    /// The header length nibble is left alone: a larger IHL moves the
    /// checksummed region instead of corrupting it.
    #[test]
    fn test_header_bit_flip_detected(mut packet in arb_ipv4_packet(), bit in any::<prop::sample::Index>()) {
        let bytes = packet.to_bytes().unwrap();
        let header_len = packet.header_len();
        let bit = match bit.index(header_len * 8 - 4) {
            version @ 0..=3 => version,
            other => other + 4,
        };

        let mut corrupted = bytes.to_vec();
        corrupted[bit / 8] ^= 0x80 >> (bit % 8);
        prop_assert!(Ipv4Packet::parse(Bytes::from(corrupted), true).is_err());
    }

    #[test]
    fn test_parsers_do_not_panic(input in proptest::collection::vec(any::<u8>(), 0..128)) {
        let data = Bytes::from(input);
        let _ = Ipv4Packet::parse(data.clone(), true);
        let _ = Ipv4Packet::parse(data.clone(), false);
        let _ = Ipv6Packet::parse(data.clone(), false);
        let lenient = TransformConfig { verify_checksums: false, ..TransformConfig::default() };
        let _ = decode_packet(data, &lenient, &Logger::discard());
    }
}
