// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Address families
//!
//! The membership model, filters and transforms are written once and
//! instantiated for IPv4 (IGMP) and IPv6 (MLD) through [`AddressFamily`].

use bytes::{BufMut, Bytes};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::packet::checksum::{finish, pseudo_header_v6, sum_words};
use crate::packet::{
    IpPacket, Ipv4Option, Ipv4Packet, Ipv6Option, Ipv6Packet, TypeOfService,
};

/// An IP address usable as a group or source in membership state
pub trait MulticastAddress:
    Copy + Eq + Ord + Hash + Debug + Display + Into<IpAddr> + Send + Sync + 'static
{
    fn is_unspecified_addr(&self) -> bool;
    fn is_multicast_addr(&self) -> bool;
}

impl MulticastAddress for Ipv4Addr {
    fn is_unspecified_addr(&self) -> bool {
        self.is_unspecified()
    }

    fn is_multicast_addr(&self) -> bool {
        self.is_multicast()
    }
}

impl MulticastAddress for Ipv6Addr {
    fn is_unspecified_addr(&self) -> bool {
        self.is_unspecified()
    }

    fn is_multicast_addr(&self) -> bool {
        self.is_multicast()
    }
}

/// IPv4 or IPv6, with the pieces the membership codecs need from each
pub trait AddressFamily: Debug + Send + Sync + 'static {
    type Addr: MulticastAddress + Serialize + DeserializeOwned;
    type Packet: IpPacket<Addr = Self::Addr>;

    const NAME: &'static str;
    const ADDR_LEN: usize;
    const UNSPECIFIED: Self::Addr;

    /// Decode an address from exactly `ADDR_LEN` bytes
    fn addr_from_slice(bytes: &[u8]) -> Option<Self::Addr>;

    fn write_addr<B: BufMut>(addr: &Self::Addr, buf: &mut B);

    /// Checksum of an upper-layer message with the two bytes at
    /// `field_offset` treated as zero
    ///
    /// IPv4 membership messages checksum the message alone; ICMPv6 also
    /// covers the pseudo-header.
    fn upper_layer_checksum(
        source: &Self::Addr,
        destination: &Self::Addr,
        next_header: u8,
        message: &[u8],
        field_offset: usize,
    ) -> u16;

    /// Wrap a membership message the way hosts and routers send them:
    /// TTL/hop limit 1 with Router Alert
    fn membership_packet(
        source: Self::Addr,
        destination: Self::Addr,
        protocol: u8,
        payload: Bytes,
    ) -> Self::Packet;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6;

fn sum_skipping_field(sum: u32, message: &[u8], field_offset: usize) -> u32 {
    let end = (field_offset + 2).min(message.len());
    let sum = sum_words(sum, &message[..field_offset.min(message.len())]);
    sum_words(sum, &message[end..])
}

impl AddressFamily for Ipv4 {
    type Addr = Ipv4Addr;
    type Packet = Ipv4Packet;

    const NAME: &'static str = "IPv4";
    const ADDR_LEN: usize = 4;
    const UNSPECIFIED: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

    fn addr_from_slice(bytes: &[u8]) -> Option<Ipv4Addr> {
        let octets: [u8; 4] = bytes.try_into().ok()?;
        Some(Ipv4Addr::from(octets))
    }

    fn write_addr<B: BufMut>(addr: &Ipv4Addr, buf: &mut B) {
        buf.put_slice(&addr.octets());
    }

    fn upper_layer_checksum(
        _source: &Ipv4Addr,
        _destination: &Ipv4Addr,
        _next_header: u8,
        message: &[u8],
        field_offset: usize,
    ) -> u16 {
        // Even field offsets keep word alignment when the field is skipped
        finish(sum_skipping_field(0, message, field_offset))
    }

    fn membership_packet(
        source: Ipv4Addr,
        destination: Ipv4Addr,
        protocol: u8,
        payload: Bytes,
    ) -> Ipv4Packet {
        Ipv4Packet::new(source, destination, protocol, payload)
            .with_ttl(1)
            .with_tos(TypeOfService::with_precedence(
                TypeOfService::INTERNETWORK_CONTROL,
            ))
            .with_option(Ipv4Option::RouterAlert(0))
    }
}

impl AddressFamily for Ipv6 {
    type Addr = Ipv6Addr;
    type Packet = Ipv6Packet;

    const NAME: &'static str = "IPv6";
    const ADDR_LEN: usize = 16;
    const UNSPECIFIED: Ipv6Addr = Ipv6Addr::UNSPECIFIED;

    fn addr_from_slice(bytes: &[u8]) -> Option<Ipv6Addr> {
        let octets: [u8; 16] = bytes.try_into().ok()?;
        Some(Ipv6Addr::from(octets))
    }

    fn write_addr<B: BufMut>(addr: &Ipv6Addr, buf: &mut B) {
        buf.put_slice(&addr.octets());
    }

    fn upper_layer_checksum(
        source: &Ipv6Addr,
        destination: &Ipv6Addr,
        next_header: u8,
        message: &[u8],
        field_offset: usize,
    ) -> u16 {
        let sum = pseudo_header_v6(source, destination, message.len() as u32, next_header);
        finish(sum_skipping_field(sum, message, field_offset))
    }

    fn membership_packet(
        source: Ipv6Addr,
        destination: Ipv6Addr,
        protocol: u8,
        payload: Bytes,
    ) -> Ipv6Packet {
        Ipv6Packet::new(source, destination, protocol, payload)
            .with_hop_limit(1)
            .with_hop_by_hop(vec![Ipv6Option::RouterAlert(0)])
    }
}
