// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Membership protocol wire formats: IGMP (RFC 2236, RFC 3376) and MLD
//! (RFC 2710, RFC 3810)
//!
//! IGMPv3 and MLDv2 share their report layout and the tail of their query
//! layout, differing only in address width. Those parts are decoded here
//! once, generic over the [`AddressFamily`]. Each protocol module supplies
//! the query header, the single-group legacy messages and its
//! Max Resp Code encoding through [`MembershipProtocol`].
//!
//! ## Message Types
//!
//! | Message | IGMP | MLD |
//! |---------|------|-----|
//! | Query | 0x11 | 130 |
//! | v3/v2 Report | 0x22 | 143 |
//! | v1 Report | 0x12 | - |
//! | v2/v1 Report | 0x16 | 131 |
//! | Leave / Done | 0x17 | 132 |

pub mod igmp;
pub mod mld;

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt::Debug;

use crate::family::AddressFamily;
use crate::packet::{EncodeError, IpPacket, ParseError};

pub use igmp::Igmp;
pub use mld::Mld;

/// Address type used by a protocol
pub type ProtocolAddr<P> = <<P as MembershipProtocol>::Family as AddressFamily>::Addr;

/// IP packet type that carries a protocol's messages
pub type ProtocolPacket<P> = <<P as MembershipProtocol>::Family as AddressFamily>::Packet;

/// Offset of the checksum field in every IGMP and MLD message
pub const CHECKSUM_OFFSET: usize = 2;

/// Length of the fixed part of a v3/v2 report before its group records
pub const REPORT_HEADER_LEN: usize = 8;

/// Query fields only present in IGMPv3 and MLDv2 queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedQuery<A> {
    /// S flag
    pub suppress_router_processing: bool,
    /// Querier's Robustness Variable (3 bits)
    pub robustness: u8,
    /// Querier's Query Interval Code
    pub qqic: u8,
    pub sources: Vec<A>,
}

impl<A> ExtendedQuery<A> {
    fn flags_byte(&self) -> u8 {
        (self.suppress_router_processing as u8) << 3 | (self.robustness & 0x07)
    }
}

/// A decoded membership query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMessage<A> {
    /// Raw Max Resp Code (8 bits for IGMP, 16 for MLD)
    pub max_resp_code: u16,
    pub group: A,
    /// Present for IGMPv3/MLDv2 queries, absent for older versions
    pub extended: Option<ExtendedQuery<A>>,
}

/// One group record of a v3/v2 report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord<A> {
    /// Raw record type; unknown values are kept so callers can skip them
    pub record_type: u8,
    pub group: A,
    pub sources: Vec<A>,
    pub aux_data: Bytes,
}

/// IGMPv3 or MLDv2 report
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportMessage<A> {
    pub records: Vec<GroupRecord<A>>,
}

/// Any message carried in an IGMP or MLD payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<A> {
    Query(QueryMessage<A>),
    Report(ReportMessage<A>),
    /// Older single-group report, leave or done
    Legacy { msg_type: u8, group: A },
    /// A type this codec does not decode
    Other { msg_type: u8 },
}

/// IGMP or MLD
pub trait MembershipProtocol: Debug + Send + Sync + 'static {
    type Family: AddressFamily;

    const NAME: &'static str;
    /// IP protocol / next header number
    const PROTOCOL_NUMBER: u8;
    const QUERY_TYPE: u8;
    const REPORT_TYPE: u8;
    /// Older report types, answered as "is exclude, no sources"
    const LEGACY_REPORT_TYPES: &'static [u8];
    /// Leave Group / Done, answered as "change to include, no sources"
    const LEAVE_TYPE: u8;
    /// Shortest message of any type
    const MIN_MESSAGE_LEN: usize;
    /// Milliseconds per unit of max response delay
    const DELAY_UNIT_MS: u32;

    /// Destination of general queries
    const ALL_SYSTEMS: <Self::Family as AddressFamily>::Addr;
    /// Destination of v3/v2 reports
    const REPORT_DESTINATION: <Self::Family as AddressFamily>::Addr;
    /// Source address used when a report is originated locally
    const ASSIGNED_SOURCE: <Self::Family as AddressFamily>::Addr;

    fn parse_query(
        message: &[u8],
    ) -> Result<QueryMessage<<Self::Family as AddressFamily>::Addr>, ParseError>;

    /// Append a query with a zero checksum
    fn write_query(
        query: &QueryMessage<<Self::Family as AddressFamily>::Addr>,
        buf: &mut BytesMut,
    ) -> Result<(), EncodeError>;

    /// Group address of a legacy report or leave
    fn parse_legacy(message: &[u8]) -> Result<<Self::Family as AddressFamily>::Addr, ParseError>;

    /// Append a legacy report or leave with a zero checksum
    fn write_legacy(
        msg_type: u8,
        group: &<Self::Family as AddressFamily>::Addr,
        buf: &mut BytesMut,
    );

    /// Max response delay in protocol units (tenths of a second for IGMP,
    /// milliseconds for MLD)
    fn max_response_delay(query: &QueryMessage<<Self::Family as AddressFamily>::Addr>) -> u32;

    /// Wire code for a max response delay, rounded down when the
    /// exponential form cannot represent it exactly
    fn max_resp_code(delay: u32, extended: bool) -> u16;
}

/// Decode an 8-bit exponential code (IGMPv3 Max Resp Code, QQIC)
pub fn decode_exp8(code: u8) -> u32 {
    if code < 0x80 {
        return code as u32;
    }
    let mant = (code & 0x0f) as u32;
    let exp = ((code >> 4) & 0x07) as u32;
    (mant | 0x10) << (exp + 3)
}

/// Largest value an 8-bit exponential code represents
pub const EXP8_MAX: u32 = 0x1f << 10;

pub fn encode_exp8(value: u32) -> u8 {
    if value < 0x80 {
        return value as u8;
    }
    for exp in 0..8u8 {
        let mant = value >> (exp + 3);
        if mant <= 0x1f {
            return 0x80 | exp << 4 | (mant & 0x0f) as u8;
        }
    }
    0xff
}

/// Decode the 16-bit MLDv2 Maximum Response Code
pub fn decode_exp16(code: u16) -> u32 {
    if code < 0x8000 {
        return code as u32;
    }
    let mant = (code & 0x0fff) as u32;
    let exp = ((code >> 12) & 0x07) as u32;
    (mant | 0x1000) << (exp + 3)
}

pub fn encode_exp16(value: u32) -> u16 {
    if value < 0x8000 {
        return value as u16;
    }
    for exp in 0..8u16 {
        let mant = value >> (exp + 3);
        if mant <= 0x1fff {
            return 0x8000 | exp << 12 | (mant & 0x0fff) as u16;
        }
    }
    0xffff
}

/// Decode the message carried by `packet`
///
/// The checksum is verified before the message type is looked at.
pub fn decode_message<P: MembershipProtocol>(
    packet: &ProtocolPacket<P>,
    verify_checksum: bool,
) -> Result<Message<ProtocolAddr<P>>, ParseError> {
    let message = packet.payload();
    if message.len() < P::MIN_MESSAGE_LEN {
        return Err(ParseError::MessageTooShort {
            protocol: P::NAME,
            expected: P::MIN_MESSAGE_LEN,
            actual: message.len(),
        });
    }

    if verify_checksum {
        let stored = u16::from_be_bytes([message[CHECKSUM_OFFSET], message[CHECKSUM_OFFSET + 1]]);
        let computed = P::Family::upper_layer_checksum(
            &packet.source(),
            &packet.destination(),
            P::PROTOCOL_NUMBER,
            message,
            CHECKSUM_OFFSET,
        );
        if stored != computed {
            return Err(ParseError::MessageChecksumMismatch {
                protocol: P::NAME,
                stored,
                computed,
            });
        }
    }

    let msg_type = message[0];
    if msg_type == P::QUERY_TYPE {
        P::parse_query(message).map(Message::Query)
    } else if msg_type == P::REPORT_TYPE {
        parse_report::<P>(message).map(Message::Report)
    } else if msg_type == P::LEAVE_TYPE || P::LEGACY_REPORT_TYPES.contains(&msg_type) {
        Ok(Message::Legacy {
            msg_type,
            group: P::parse_legacy(message)?,
        })
    } else {
        Ok(Message::Other { msg_type })
    }
}

/// Encode a query with its checksum filled in
pub fn encode_query<P: MembershipProtocol>(
    query: &QueryMessage<ProtocolAddr<P>>,
    source: &ProtocolAddr<P>,
    destination: &ProtocolAddr<P>,
) -> Result<Bytes, EncodeError> {
    let mut buf = BytesMut::new();
    P::write_query(query, &mut buf)?;
    Ok(seal::<P>(buf, source, destination))
}

/// Encode a v3/v2 report with its checksum filled in
pub fn encode_report<P: MembershipProtocol>(
    report: &ReportMessage<ProtocolAddr<P>>,
    source: &ProtocolAddr<P>,
    destination: &ProtocolAddr<P>,
) -> Result<Bytes, EncodeError> {
    let count = check_count(P::NAME, "group records", report.records.len())?;
    let mut buf = BytesMut::with_capacity(REPORT_HEADER_LEN);
    buf.put_u8(P::REPORT_TYPE);
    buf.put_u8(0);
    buf.put_u16(0);
    buf.put_u16(0);
    buf.put_u16(count);
    for record in &report.records {
        write_group_record::<P::Family>(P::NAME, record, &mut buf)?;
    }
    Ok(seal::<P>(buf, source, destination))
}

/// Encode a legacy report or leave with its checksum filled in
pub fn encode_legacy<P: MembershipProtocol>(
    msg_type: u8,
    group: &ProtocolAddr<P>,
    source: &ProtocolAddr<P>,
    destination: &ProtocolAddr<P>,
) -> Bytes {
    let mut buf = BytesMut::new();
    P::write_legacy(msg_type, group, &mut buf);
    seal::<P>(buf, source, destination)
}

fn seal<P: MembershipProtocol>(
    mut buf: BytesMut,
    source: &ProtocolAddr<P>,
    destination: &ProtocolAddr<P>,
) -> Bytes {
    let checksum = P::Family::upper_layer_checksum(
        source,
        destination,
        P::PROTOCOL_NUMBER,
        &buf,
        CHECKSUM_OFFSET,
    );
    buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&checksum.to_be_bytes());
    buf.freeze()
}

fn check_count(protocol: &'static str, what: &'static str, count: usize) -> Result<u16, EncodeError> {
    u16::try_from(count).map_err(|_| EncodeError::TooManyEntries {
        protocol,
        what,
        count,
    })
}

fn read_addrs<F: AddressFamily>(
    protocol: &'static str,
    bytes: &[u8],
) -> Result<Vec<F::Addr>, ParseError> {
    bytes
        .chunks_exact(F::ADDR_LEN)
        .map(|chunk| {
            F::addr_from_slice(chunk).ok_or(ParseError::MalformedMessage {
                protocol,
                reason: "bad address length",
            })
        })
        .collect()
}

pub(crate) fn read_addr<F: AddressFamily>(
    protocol: &'static str,
    bytes: &[u8],
) -> Result<F::Addr, ParseError> {
    F::addr_from_slice(bytes).ok_or(ParseError::MalformedMessage {
        protocol,
        reason: "bad address length",
    })
}

/// Decode the query tail shared by IGMPv3 and MLDv2, starting at `offset`
/// (the flags byte)
pub(crate) fn parse_extended_query<F: AddressFamily>(
    protocol: &'static str,
    message: &[u8],
    offset: usize,
) -> Result<ExtendedQuery<F::Addr>, ParseError> {
    if message.len() < offset + 4 {
        return Err(ParseError::MessageTooShort {
            protocol,
            expected: offset + 4,
            actual: message.len(),
        });
    }
    let flags = message[offset];
    let qqic = message[offset + 1];
    let count = u16::from_be_bytes([message[offset + 2], message[offset + 3]]) as usize;
    let start = offset + 4;
    let end = start + count * F::ADDR_LEN;
    if message.len() < end {
        return Err(ParseError::MessageTooShort {
            protocol,
            expected: end,
            actual: message.len(),
        });
    }

    Ok(ExtendedQuery {
        suppress_router_processing: flags & 0x08 != 0,
        robustness: flags & 0x07,
        qqic,
        sources: read_addrs::<F>(protocol, &message[start..end])?,
    })
}

pub(crate) fn write_extended_query<F: AddressFamily>(
    protocol: &'static str,
    extended: &ExtendedQuery<F::Addr>,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    let count = check_count(protocol, "sources", extended.sources.len())?;
    buf.put_u8(extended.flags_byte());
    buf.put_u8(extended.qqic);
    buf.put_u16(count);
    for source in &extended.sources {
        F::write_addr(source, buf);
    }
    Ok(())
}

fn parse_report<P: MembershipProtocol>(
    message: &[u8],
) -> Result<ReportMessage<ProtocolAddr<P>>, ParseError> {
    if message.len() < REPORT_HEADER_LEN {
        return Err(ParseError::MessageTooShort {
            protocol: P::NAME,
            expected: REPORT_HEADER_LEN,
            actual: message.len(),
        });
    }
    let count = u16::from_be_bytes([message[6], message[7]]) as usize;
    let mut rest = &message[REPORT_HEADER_LEN..];
    let mut records = Vec::with_capacity(count.min(rest.len() / (4 + P::Family::ADDR_LEN) + 1));
    for _ in 0..count {
        records.push(parse_group_record::<P::Family>(P::NAME, &mut rest)?);
    }
    Ok(ReportMessage { records })
}

fn parse_group_record<F: AddressFamily>(
    protocol: &'static str,
    rest: &mut &[u8],
) -> Result<GroupRecord<F::Addr>, ParseError> {
    let fixed = 4 + F::ADDR_LEN;
    if rest.len() < fixed {
        return Err(ParseError::MalformedMessage {
            protocol,
            reason: "group record truncated",
        });
    }
    let record_type = rest[0];
    let aux_len = rest[1] as usize * 4;
    let count = u16::from_be_bytes([rest[2], rest[3]]) as usize;
    let sources_end = fixed + count * F::ADDR_LEN;
    let end = sources_end + aux_len;
    if rest.len() < end {
        return Err(ParseError::MalformedMessage {
            protocol,
            reason: "group record truncated",
        });
    }

    let record = GroupRecord {
        record_type,
        group: read_addr::<F>(protocol, &rest[4..fixed])?,
        sources: read_addrs::<F>(protocol, &rest[fixed..sources_end])?,
        aux_data: Bytes::copy_from_slice(&rest[sources_end..end]),
    };
    *rest = &rest[end..];
    Ok(record)
}

fn write_group_record<F: AddressFamily>(
    protocol: &'static str,
    record: &GroupRecord<F::Addr>,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    let count = check_count(protocol, "sources", record.sources.len())?;
    let aux_words = record.aux_data.len().div_ceil(4);
    let aux_words = u8::try_from(aux_words).map_err(|_| EncodeError::TooManyEntries {
        protocol,
        what: "auxiliary data words",
        count: aux_words,
    })?;
    buf.put_u8(record.record_type);
    buf.put_u8(aux_words);
    buf.put_u16(count);
    F::write_addr(&record.group, buf);
    for source in &record.sources {
        F::write_addr(source, buf);
    }
    buf.put_slice(&record.aux_data);
    buf.put_bytes(0, aux_words as usize * 4 - record.aux_data.len());
    Ok(())
}
