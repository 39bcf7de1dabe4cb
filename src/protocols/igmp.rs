// SPDX-License-Identifier: Apache-2.0 OR MIT
//! IGMP message codec (RFC 2236, RFC 3376)
//!
//! ## Query Formats
//!
//! | Version | Length | Max Resp Code |
//! |---------|--------|---------------|
//! | IGMPv1 | 8 bytes | 0 |
//! | IGMPv2 | 8 bytes | tenths of a second |
//! | IGMPv3 | 12 + 4n bytes | exponential, tenths of a second |
//!
//! Queries of 9 to 11 bytes match neither format and are rejected.
//!
//! ## IGMP Message Types
//!
//! | Type | Value | Description |
//! |------|-------|-------------|
//! | Membership Query | 0x11 | Sent by querier |
//! | V1 Membership Report | 0x12 | Legacy host report |
//! | V2 Membership Report | 0x16 | Legacy host report |
//! | Leave Group | 0x17 | Host left group |
//! | V3 Membership Report | 0x22 | Source-filter report |

use bytes::{BufMut, BytesMut};
use std::net::Ipv4Addr;

use super::{
    decode_exp8, encode_exp8, parse_extended_query, read_addr, write_extended_query,
    MembershipProtocol, QueryMessage,
};
use crate::family::Ipv4;
use crate::packet::{EncodeError, ParseError};

pub const IGMP_PROTOCOL: u8 = 2;

// IGMP message types
pub const IGMP_MEMBERSHIP_QUERY: u8 = 0x11;
pub const IGMP_V1_MEMBERSHIP_REPORT: u8 = 0x12;
pub const IGMP_V2_MEMBERSHIP_REPORT: u8 = 0x16;
pub const IGMP_LEAVE_GROUP: u8 = 0x17;
pub const IGMP_V3_MEMBERSHIP_REPORT: u8 = 0x22;

pub const IGMP_V2_MESSAGE_LEN: usize = 8;
pub const IGMP_V3_QUERY_MIN_LEN: usize = 12;

/// All systems multicast address (224.0.0.1)
pub const ALL_SYSTEMS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 1);

/// All routers address for Leave messages (224.0.0.2)
pub const ALL_ROUTERS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 2);

/// All IGMPv3-capable routers, destination of v3 reports (224.0.0.22)
pub const ALL_IGMPV3_ROUTERS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 22);

/// Source of locally originated reports unless configured otherwise
pub const IGMP_ASSIGNED_SOURCE: Ipv4Addr = Ipv4Addr::new(169, 254, 1, 1);

const PROTOCOL_NAME: &str = "IGMP";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Igmp;

impl MembershipProtocol for Igmp {
    type Family = Ipv4;

    const NAME: &'static str = PROTOCOL_NAME;
    const PROTOCOL_NUMBER: u8 = IGMP_PROTOCOL;
    const QUERY_TYPE: u8 = IGMP_MEMBERSHIP_QUERY;
    const REPORT_TYPE: u8 = IGMP_V3_MEMBERSHIP_REPORT;
    const LEGACY_REPORT_TYPES: &'static [u8] =
        &[IGMP_V1_MEMBERSHIP_REPORT, IGMP_V2_MEMBERSHIP_REPORT];
    const LEAVE_TYPE: u8 = IGMP_LEAVE_GROUP;
    const MIN_MESSAGE_LEN: usize = IGMP_V2_MESSAGE_LEN;
    const DELAY_UNIT_MS: u32 = 100;

    const ALL_SYSTEMS: Ipv4Addr = ALL_SYSTEMS_GROUP;
    const REPORT_DESTINATION: Ipv4Addr = ALL_IGMPV3_ROUTERS;
    const ASSIGNED_SOURCE: Ipv4Addr = IGMP_ASSIGNED_SOURCE;

    fn parse_query(message: &[u8]) -> Result<QueryMessage<Ipv4Addr>, ParseError> {
        if message.len() < IGMP_V2_MESSAGE_LEN {
            return Err(ParseError::MessageTooShort {
                protocol: PROTOCOL_NAME,
                expected: IGMP_V2_MESSAGE_LEN,
                actual: message.len(),
            });
        }
        if message.len() > IGMP_V2_MESSAGE_LEN && message.len() < IGMP_V3_QUERY_MIN_LEN {
            return Err(ParseError::MalformedMessage {
                protocol: PROTOCOL_NAME,
                reason: "query length matches neither the v2 nor the v3 format",
            });
        }

        let extended = if message.len() >= IGMP_V3_QUERY_MIN_LEN {
            Some(parse_extended_query::<Ipv4>(
                PROTOCOL_NAME,
                message,
                IGMP_V2_MESSAGE_LEN,
            )?)
        } else {
            None
        };

        Ok(QueryMessage {
            max_resp_code: message[1] as u16,
            group: read_addr::<Ipv4>(PROTOCOL_NAME, &message[4..8])?,
            extended,
        })
    }

    fn write_query(query: &QueryMessage<Ipv4Addr>, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(IGMP_MEMBERSHIP_QUERY);
        buf.put_u8(query.max_resp_code.min(u8::MAX as u16) as u8);
        buf.put_u16(0);
        buf.put_slice(&query.group.octets());
        if let Some(extended) = &query.extended {
            write_extended_query::<Ipv4>(PROTOCOL_NAME, extended, buf)?;
        }
        Ok(())
    }

    fn parse_legacy(message: &[u8]) -> Result<Ipv4Addr, ParseError> {
        if message.len() < IGMP_V2_MESSAGE_LEN {
            return Err(ParseError::MessageTooShort {
                protocol: PROTOCOL_NAME,
                expected: IGMP_V2_MESSAGE_LEN,
                actual: message.len(),
            });
        }
        read_addr::<Ipv4>(PROTOCOL_NAME, &message[4..8])
    }

    fn write_legacy(msg_type: u8, group: &Ipv4Addr, buf: &mut BytesMut) {
        buf.put_u8(msg_type);
        buf.put_u8(0);
        buf.put_u16(0);
        buf.put_slice(&group.octets());
    }

    fn max_response_delay(query: &QueryMessage<Ipv4Addr>) -> u32 {
        let code = query.max_resp_code.min(u8::MAX as u16) as u8;
        if query.extended.is_some() {
            decode_exp8(code)
        } else {
            code as u32
        }
    }

    fn max_resp_code(delay: u32, extended: bool) -> u16 {
        if extended {
            encode_exp8(delay) as u16
        } else {
            delay.min(u8::MAX as u32) as u16
        }
    }
}

/// Get the message type as a string
pub fn type_name(msg_type: u8) -> &'static str {
    match msg_type {
        IGMP_MEMBERSHIP_QUERY => "Membership Query",
        IGMP_V1_MEMBERSHIP_REPORT => "V1 Membership Report",
        IGMP_V2_MEMBERSHIP_REPORT => "V2 Membership Report",
        IGMP_LEAVE_GROUP => "Leave Group",
        IGMP_V3_MEMBERSHIP_REPORT => "V3 Membership Report",
        _ => "Unknown",
    }
}
