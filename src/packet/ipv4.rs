// SPDX-License-Identifier: Apache-2.0 OR MIT
//! IPv4 header codec (RFC 791)

use bytes::{BufMut, Bytes, BytesMut};
use std::io::Read;
use std::net::Ipv4Addr;

use super::checksum::{internet_checksum, verify_checksum};
use super::options::{options_len, parse_options, Ipv4Option, OptionParser, StandardOptions};
use super::{ip_version, read_exact_or_short, EncodeError, IpPacket, ParseError};

pub const IPV4_VERSION: u8 = 4;
pub const MIN_HEADER_LEN: usize = 20;
pub const MAX_HEADER_LEN: usize = 60;
pub const MAX_OPTIONS_LEN: usize = MAX_HEADER_LEN - MIN_HEADER_LEN;
pub const DEFAULT_TTL: u8 = 64;
const CHECKSUM_OFFSET: usize = 10;

/// Type of service byte: 3-bit precedence, four service flags, one reserved bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeOfService {
    pub precedence: u8,
    pub low_delay: bool,
    pub high_throughput: bool,
    pub high_reliability: bool,
    pub low_cost: bool,
    pub reserved: bool,
}

impl TypeOfService {
    pub const ROUTINE: u8 = 0b000;
    pub const INTERNETWORK_CONTROL: u8 = 0b110;

    pub fn with_precedence(precedence: u8) -> Self {
        Self {
            precedence: precedence & 0x07,
            ..Self::default()
        }
    }

    pub fn from_byte(byte: u8) -> Self {
        Self {
            precedence: byte >> 5,
            low_delay: byte & 0x10 != 0,
            high_throughput: byte & 0x08 != 0,
            high_reliability: byte & 0x04 != 0,
            low_cost: byte & 0x02 != 0,
            reserved: byte & 0x01 != 0,
        }
    }

    pub fn to_byte(self) -> u8 {
        ((self.precedence & 0x07) << 5)
            | (self.low_delay as u8) << 4
            | (self.high_throughput as u8) << 3
            | (self.high_reliability as u8) << 2
            | (self.low_cost as u8) << 1
            | self.reserved as u8
    }
}

/// The three flag bits preceding the fragment offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FragmentFlags {
    pub reserved: bool,
    pub dont_fragment: bool,
    pub more_fragments: bool,
}

impl FragmentFlags {
    pub fn from_bits(bits: u8) -> Self {
        Self {
            reserved: bits & 0b100 != 0,
            dont_fragment: bits & 0b010 != 0,
            more_fragments: bits & 0b001 != 0,
        }
    }

    pub fn to_bits(self) -> u8 {
        (self.reserved as u8) << 2 | (self.dont_fragment as u8) << 1 | self.more_fragments as u8
    }
}

/// Parsed or constructed IPv4 packet
///
/// `header_length` (in 32-bit words), `total_length` and `checksum` reflect
/// the last parse or write; `write_to` recomputes all three.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Packet {
    pub version: u8,
    pub header_length: u8,
    pub tos: TypeOfService,
    pub total_length: u16,
    pub identification: u16,
    pub flags: FragmentFlags,
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub options: Vec<Ipv4Option>,
    pub payload: Bytes,
}

impl Ipv4Packet {
    pub fn new(source: Ipv4Addr, destination: Ipv4Addr, protocol: u8, payload: Bytes) -> Self {
        let mut packet = Self {
            version: IPV4_VERSION,
            header_length: (MIN_HEADER_LEN / 4) as u8,
            tos: TypeOfService::default(),
            total_length: 0,
            identification: 0,
            flags: FragmentFlags::default(),
            fragment_offset: 0,
            ttl: DEFAULT_TTL,
            protocol,
            checksum: 0,
            source,
            destination,
            options: Vec::new(),
            payload,
        };
        packet.update_lengths();
        packet
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_tos(mut self, tos: TypeOfService) -> Self {
        self.tos = tos;
        self
    }

    pub fn with_identification(mut self, identification: u16) -> Self {
        self.identification = identification;
        self
    }

    pub fn with_flags(mut self, flags: FragmentFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_option(mut self, option: Ipv4Option) -> Self {
        self.push_option(option);
        self
    }

    /// Append an option and refresh the length fields
    pub fn push_option(&mut self, option: Ipv4Option) {
        self.options.push(option);
        self.update_lengths();
    }

    /// Replace the payload and refresh the total length
    pub fn set_payload(&mut self, payload: Bytes) {
        self.payload = payload;
        self.update_lengths();
    }

    /// Header size in bytes with options padded to a 4-byte boundary
    pub fn header_len(&self) -> usize {
        MIN_HEADER_LEN + options_len(&self.options).div_ceil(4) * 4
    }

    pub fn has_router_alert(&self) -> bool {
        self.options
            .iter()
            .any(|o| matches!(o, Ipv4Option::RouterAlert(_)))
    }

    pub fn is_fragment(&self) -> bool {
        self.flags.more_fragments || self.fragment_offset != 0
    }

    fn update_lengths(&mut self) {
        let header_len = self.header_len();
        self.header_length = (header_len / 4).min(0x0f) as u8;
        self.total_length = (header_len + self.payload.len()).min(u16::MAX as usize) as u16;
    }

    /// Parse with a caller-supplied option parser
    pub fn parse_with<P: OptionParser + ?Sized>(
        data: Bytes,
        verify: bool,
        parser: &P,
    ) -> Result<Self, ParseError> {
        // version first, so a packet of the other family is named as such
        if let Some(version) = ip_version(&data) {
            if version != IPV4_VERSION {
                return Err(ParseError::InvalidIpVersion {
                    expected: IPV4_VERSION,
                    actual: version,
                });
            }
        }
        if data.len() < MIN_HEADER_LEN {
            return Err(ParseError::PacketTooShort {
                expected: MIN_HEADER_LEN,
                actual: data.len(),
            });
        }

        let ihl = data[0] & 0x0f;
        if ihl < 5 {
            return Err(ParseError::HeaderTooSmall(ihl));
        }
        let header_len = ihl as usize * 4;
        if data.len() < header_len {
            return Err(ParseError::PacketTooShort {
                expected: header_len,
                actual: data.len(),
            });
        }

        if verify {
            verify_checksum(&data[..header_len], CHECKSUM_OFFSET).map_err(|(stored, computed)| {
                ParseError::IpChecksumMismatch { stored, computed }
            })?;
        }

        let total_length = u16::from_be_bytes([data[2], data[3]]);
        if (total_length as usize) < header_len {
            return Err(ParseError::TotalLengthTooSmall {
                total_length,
                header_len,
            });
        }
        if data.len() < total_length as usize {
            return Err(ParseError::PacketTooShort {
                expected: total_length as usize,
                actual: data.len(),
            });
        }

        let flags_fragment = u16::from_be_bytes([data[6], data[7]]);
        let options = parse_options(data.slice(MIN_HEADER_LEN..header_len), parser)?;

        Ok(Self {
            version: IPV4_VERSION,
            header_length: ihl,
            tos: TypeOfService::from_byte(data[1]),
            total_length,
            identification: u16::from_be_bytes([data[4], data[5]]),
            flags: FragmentFlags::from_bits((flags_fragment >> 13) as u8),
            fragment_offset: flags_fragment & 0x1fff,
            ttl: data[8],
            protocol: data[9],
            checksum: u16::from_be_bytes([data[10], data[11]]),
            source: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            destination: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
            options,
            payload: data.slice(header_len..total_length as usize),
        })
    }
}

impl IpPacket for Ipv4Packet {
    type Addr = Ipv4Addr;
    const VERSION: u8 = IPV4_VERSION;

    fn parse(data: Bytes, verify_checksum: bool) -> Result<Self, ParseError> {
        Self::parse_with(data, verify_checksum, &StandardOptions)
    }

    fn read_from<R: Read>(reader: &mut R, verify_checksum: bool) -> Result<Self, ParseError> {
        let mut fixed = [0u8; MIN_HEADER_LEN];
        read_exact_or_short(reader, &mut fixed, 0)?;

        let total_length = u16::from_be_bytes([fixed[2], fixed[3]]) as usize;
        let mut data = BytesMut::with_capacity(total_length.max(MIN_HEADER_LEN));
        data.put_slice(&fixed);
        if total_length > MIN_HEADER_LEN {
            let mut rest = vec![0u8; total_length - MIN_HEADER_LEN];
            read_exact_or_short(reader, &mut rest, MIN_HEADER_LEN)?;
            data.put_slice(&rest);
        }
        Self::parse(data.freeze(), verify_checksum)
    }

    fn write_to(&mut self, buf: &mut BytesMut) -> Result<usize, EncodeError> {
        let opts_len = options_len(&self.options);
        if opts_len > MAX_OPTIONS_LEN {
            return Err(EncodeError::OptionsTooLong {
                len: opts_len,
                max: MAX_OPTIONS_LEN,
            });
        }
        let header_len = self.header_len();
        let total = header_len + self.payload.len();
        if total > u16::MAX as usize {
            return Err(EncodeError::PacketTooLong {
                len: total,
                max: u16::MAX as usize,
            });
        }
        self.update_lengths();

        let start = buf.len();
        buf.reserve(total);
        buf.put_u8((self.version << 4) | (self.header_length & 0x0f));
        buf.put_u8(self.tos.to_byte());
        buf.put_u16(self.total_length);
        buf.put_u16(self.identification);
        buf.put_u16(((self.flags.to_bits() as u16) << 13) | (self.fragment_offset & 0x1fff));
        buf.put_u8(self.ttl);
        buf.put_u8(self.protocol);
        buf.put_u16(0);
        buf.put_slice(&self.source.octets());
        buf.put_slice(&self.destination.octets());
        for option in &self.options {
            option.write(buf);
        }
        buf.put_bytes(0, header_len - MIN_HEADER_LEN - opts_len);

        self.checksum = internet_checksum(&buf[start..start + header_len]);
        buf[start + CHECKSUM_OFFSET..start + CHECKSUM_OFFSET + 2]
            .copy_from_slice(&self.checksum.to_be_bytes());

        buf.put_slice(&self.payload);
        Ok(total)
    }

    fn source(&self) -> Ipv4Addr {
        self.source
    }

    fn destination(&self) -> Ipv4Addr {
        self.destination
    }

    fn upper_layer_protocol(&self) -> u8 {
        self.protocol
    }

    fn payload(&self) -> &Bytes {
        &self.payload
    }
}
