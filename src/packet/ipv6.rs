// SPDX-License-Identifier: Apache-2.0 OR MIT
//! IPv6 header codec (RFC 8200) with the hop-by-hop options header
//!
//! MLD messages travel with a hop-by-hop header carrying Router Alert, so
//! that is the one extension header decoded here. Any other next-header
//! value is treated as the upper-layer protocol.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Read;
use std::net::Ipv6Addr;

use super::{ip_version, read_exact_or_short, EncodeError, IpPacket, ParseError};

pub const IPV6_VERSION: u8 = 6;
pub const FIXED_HEADER_LEN: usize = 40;
pub const NEXT_HEADER_HOP_BY_HOP: u8 = 0;
pub const NEXT_HEADER_ICMPV6: u8 = 58;
pub const DEFAULT_HOP_LIMIT: u8 = 64;

pub const OPTION_PAD1: u8 = 0;
pub const OPTION_PADN: u8 = 1;

/// Option data length is a single byte
const MAX_OPTION_DATA_LEN: usize = u8::MAX as usize;

/// Router Alert (RFC 2711)
pub const OPTION_ROUTER_ALERT: u8 = 5;

/// A hop-by-hop option; padding is consumed on parse and generated on write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ipv6Option {
    /// Router Alert value (0 = packet contains an MLD message)
    RouterAlert(u16),
    Other { kind: u8, data: Bytes },
}

impl Ipv6Option {
    fn len(&self) -> usize {
        match self {
            Ipv6Option::RouterAlert(_) => 4,
            Ipv6Option::Other { data, .. } => 2 + data.len(),
        }
    }

    fn write<B: BufMut>(&self, buf: &mut B) {
        match self {
            Ipv6Option::RouterAlert(value) => {
                buf.put_u8(OPTION_ROUTER_ALERT);
                buf.put_u8(2);
                buf.put_u16(*value);
            }
            Ipv6Option::Other { kind, data } => {
                buf.put_u8(*kind);
                buf.put_u8(data.len() as u8);
                buf.put_slice(data);
            }
        }
    }
}

/// Hop-by-hop options header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopByHopOptions {
    /// Protocol that follows this header
    pub next_header: u8,
    pub options: Vec<Ipv6Option>,
}

impl HopByHopOptions {
    pub fn router_alert(next_header: u8, value: u16) -> Self {
        Self {
            next_header,
            options: vec![Ipv6Option::RouterAlert(value)],
        }
    }

    /// Encoded size, padded to a multiple of 8
    pub fn encoded_len(&self) -> usize {
        let raw = 2 + self.options.iter().map(Ipv6Option::len).sum::<usize>();
        raw.div_ceil(8) * 8
    }

    /// Both the option data length and the header length are one byte
    fn check(&self) -> Result<(), EncodeError> {
        for option in &self.options {
            if let Ipv6Option::Other { data, .. } = option {
                if data.len() > MAX_OPTION_DATA_LEN {
                    return Err(EncodeError::OptionsTooLong {
                        len: data.len(),
                        max: MAX_OPTION_DATA_LEN,
                    });
                }
            }
        }
        let len = self.encoded_len();
        if len / 8 - 1 > u8::MAX as usize {
            return Err(EncodeError::OptionsTooLong {
                len,
                max: (u8::MAX as usize + 1) * 8,
            });
        }
        Ok(())
    }

    /// Write the header; [`HopByHopOptions::check`] must have passed
    fn write<B: BufMut>(&self, buf: &mut B) {
        let len = self.encoded_len();
        buf.put_u8(self.next_header);
        buf.put_u8((len / 8 - 1) as u8);
        let mut written = 2;
        for option in &self.options {
            option.write(buf);
            written += option.len();
        }
        match len - written {
            0 => {}
            1 => buf.put_u8(OPTION_PAD1),
            pad => {
                buf.put_u8(OPTION_PADN);
                buf.put_u8((pad - 2) as u8);
                buf.put_bytes(0, pad - 2);
            }
        }
    }

    fn parse(data: &Bytes) -> Result<(Self, usize), ParseError> {
        if data.len() < 2 {
            return Err(ParseError::PacketTooShort {
                expected: FIXED_HEADER_LEN + 2,
                actual: FIXED_HEADER_LEN + data.len(),
            });
        }
        let len = (data[1] as usize + 1) * 8;
        if data.len() < len {
            return Err(ParseError::PacketTooShort {
                expected: FIXED_HEADER_LEN + len,
                actual: FIXED_HEADER_LEN + data.len(),
            });
        }

        let mut area = data.slice(2..len);
        let mut options = Vec::new();
        while area.has_remaining() {
            let kind = area.get_u8();
            if kind == OPTION_PAD1 {
                continue;
            }
            if !area.has_remaining() {
                return Err(ParseError::InvalidOption {
                    kind,
                    reason: "missing length byte",
                });
            }
            let opt_len = area.get_u8() as usize;
            if area.remaining() < opt_len {
                return Err(ParseError::InvalidOption {
                    kind,
                    reason: "length runs past the header",
                });
            }
            let value = area.split_to(opt_len);
            match kind {
                OPTION_PADN => {}
                OPTION_ROUTER_ALERT if opt_len == 2 => {
                    options.push(Ipv6Option::RouterAlert(u16::from_be_bytes([
                        value[0], value[1],
                    ])));
                }
                OPTION_ROUTER_ALERT => {
                    return Err(ParseError::InvalidOption {
                        kind,
                        reason: "router alert length must be 2",
                    });
                }
                _ => options.push(Ipv6Option::Other { kind, data: value }),
            }
        }

        Ok((
            Self {
                next_header: data[0],
                options,
            },
            len,
        ))
    }
}

/// Parsed or constructed IPv6 packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6Packet {
    pub traffic_class: u8,
    pub flow_label: u32,
    /// Bytes after the fixed header, extension headers included
    pub payload_length: u16,
    /// Next header of the fixed header; forced to hop-by-hop when present
    pub next_header: u8,
    pub hop_limit: u8,
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
    pub hop_by_hop: Option<HopByHopOptions>,
    pub payload: Bytes,
}

impl Ipv6Packet {
    pub fn new(source: Ipv6Addr, destination: Ipv6Addr, next_header: u8, payload: Bytes) -> Self {
        Self {
            traffic_class: 0,
            flow_label: 0,
            payload_length: payload.len().min(u16::MAX as usize) as u16,
            next_header,
            hop_limit: DEFAULT_HOP_LIMIT,
            source,
            destination,
            hop_by_hop: None,
            payload,
        }
    }

    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    pub fn with_traffic_class(mut self, traffic_class: u8) -> Self {
        self.traffic_class = traffic_class;
        self
    }

    /// Insert a hop-by-hop header ahead of the current upper-layer protocol
    pub fn with_hop_by_hop(mut self, options: Vec<Ipv6Option>) -> Self {
        let next_header = self.upper_layer_protocol();
        self.hop_by_hop = Some(HopByHopOptions {
            next_header,
            options,
        });
        self.next_header = NEXT_HEADER_HOP_BY_HOP;
        self.payload_length = self.computed_payload_length().min(u16::MAX as usize) as u16;
        self
    }

    pub fn has_router_alert(&self) -> bool {
        self.hop_by_hop.as_ref().is_some_and(|h| {
            h.options
                .iter()
                .any(|o| matches!(o, Ipv6Option::RouterAlert(_)))
        })
    }

    fn computed_payload_length(&self) -> usize {
        self.hop_by_hop
            .as_ref()
            .map_or(0, HopByHopOptions::encoded_len)
            + self.payload.len()
    }
}

impl IpPacket for Ipv6Packet {
    type Addr = Ipv6Addr;
    const VERSION: u8 = IPV6_VERSION;

    fn parse(data: Bytes, _verify_checksum: bool) -> Result<Self, ParseError> {
        // version first, so a packet of the other family is named as such
        if let Some(version) = ip_version(&data) {
            if version != IPV6_VERSION {
                return Err(ParseError::InvalidIpVersion {
                    expected: IPV6_VERSION,
                    actual: version,
                });
            }
        }
        if data.len() < FIXED_HEADER_LEN {
            return Err(ParseError::PacketTooShort {
                expected: FIXED_HEADER_LEN,
                actual: data.len(),
            });
        }

        let payload_length = u16::from_be_bytes([data[4], data[5]]);
        let end = FIXED_HEADER_LEN + payload_length as usize;
        if data.len() < end {
            return Err(ParseError::PacketTooShort {
                expected: end,
                actual: data.len(),
            });
        }

        let next_header = data[6];
        let mut body = data.slice(FIXED_HEADER_LEN..end);
        let hop_by_hop = if next_header == NEXT_HEADER_HOP_BY_HOP {
            let (header, len) = HopByHopOptions::parse(&body)?;
            body.advance(len);
            Some(header)
        } else {
            None
        };

        let mut src = [0u8; 16];
        src.copy_from_slice(&data[8..24]);
        let mut dst = [0u8; 16];
        dst.copy_from_slice(&data[24..40]);

        Ok(Self {
            traffic_class: ((data[0] & 0x0f) << 4) | (data[1] >> 4),
            flow_label: u32::from_be_bytes([0, data[1] & 0x0f, data[2], data[3]]),
            payload_length,
            next_header,
            hop_limit: data[7],
            source: Ipv6Addr::from(src),
            destination: Ipv6Addr::from(dst),
            hop_by_hop,
            payload: body,
        })
    }

    fn read_from<R: Read>(reader: &mut R, verify_checksum: bool) -> Result<Self, ParseError> {
        let mut fixed = [0u8; FIXED_HEADER_LEN];
        read_exact_or_short(reader, &mut fixed, 0)?;

        let payload_length = u16::from_be_bytes([fixed[4], fixed[5]]) as usize;
        let mut data = BytesMut::with_capacity(FIXED_HEADER_LEN + payload_length);
        data.put_slice(&fixed);
        let mut rest = vec![0u8; payload_length];
        read_exact_or_short(reader, &mut rest, FIXED_HEADER_LEN)?;
        data.put_slice(&rest);
        Self::parse(data.freeze(), verify_checksum)
    }

    fn write_to(&mut self, buf: &mut BytesMut) -> Result<usize, EncodeError> {
        if let Some(hop_by_hop) = &self.hop_by_hop {
            hop_by_hop.check()?;
        }
        let payload_length = self.computed_payload_length();
        if payload_length > u16::MAX as usize {
            return Err(EncodeError::PacketTooLong {
                len: payload_length,
                max: u16::MAX as usize,
            });
        }
        self.payload_length = payload_length as u16;
        if self.hop_by_hop.is_some() {
            self.next_header = NEXT_HEADER_HOP_BY_HOP;
        }

        buf.reserve(FIXED_HEADER_LEN + payload_length);
        let word = (IPV6_VERSION as u32) << 28
            | (self.traffic_class as u32) << 20
            | (self.flow_label & 0x000f_ffff);
        buf.put_u32(word);
        buf.put_u16(self.payload_length);
        buf.put_u8(self.next_header);
        buf.put_u8(self.hop_limit);
        buf.put_slice(&self.source.octets());
        buf.put_slice(&self.destination.octets());
        if let Some(hop_by_hop) = &self.hop_by_hop {
            hop_by_hop.write(buf);
        }
        buf.put_slice(&self.payload);
        Ok(FIXED_HEADER_LEN + payload_length)
    }

    fn source(&self) -> Ipv6Addr {
        self.source
    }

    fn destination(&self) -> Ipv6Addr {
        self.destination
    }

    fn upper_layer_protocol(&self) -> u8 {
        match &self.hop_by_hop {
            Some(header) => header.next_header,
            None => self.next_header,
        }
    }

    fn payload(&self) -> &Bytes {
        &self.payload
    }
}
