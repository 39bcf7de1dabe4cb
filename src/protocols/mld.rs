// SPDX-License-Identifier: Apache-2.0 OR MIT
//! MLD message codec (RFC 2710, RFC 3810)
//!
//! MLD messages are ICMPv6 messages, so their checksum covers the IPv6
//! pseudo-header. A 24-byte query is MLDv1; 28 bytes or more is MLDv2.
//! The MLDv2 Maximum Response Code is 16 bits wide and counts milliseconds.

use bytes::{BufMut, BytesMut};
use std::net::Ipv6Addr;

use super::{
    decode_exp16, encode_exp16, parse_extended_query, read_addr, write_extended_query,
    MembershipProtocol, QueryMessage,
};
use crate::family::Ipv6;
use crate::packet::ipv6::NEXT_HEADER_ICMPV6;
use crate::packet::{EncodeError, ParseError};

pub const MLD_LISTENER_QUERY: u8 = 130;
pub const MLD_V1_LISTENER_REPORT: u8 = 131;
pub const MLD_LISTENER_DONE: u8 = 132;
pub const MLD_V2_LISTENER_REPORT: u8 = 143;

pub const MLD_V1_MESSAGE_LEN: usize = 24;
pub const MLD_V2_QUERY_MIN_LEN: usize = 28;
pub const MLD_V2_REPORT_MIN_LEN: usize = 8;

/// Link-scope all-nodes address (ff02::1)
pub const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// Link-scope all-routers address, destination of Done (ff02::2)
pub const ALL_ROUTERS: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 2);

/// All MLDv2-capable routers, destination of v2 reports (ff02::16)
pub const ALL_MLDV2_ROUTERS: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0x16);

/// Link-local source of locally originated reports unless configured otherwise
pub const MLD_ASSIGNED_SOURCE: Ipv6Addr = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1);

const PROTOCOL_NAME: &str = "MLD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mld;

fn check_v1_len(message: &[u8]) -> Result<(), ParseError> {
    if message.len() < MLD_V1_MESSAGE_LEN {
        return Err(ParseError::MessageTooShort {
            protocol: PROTOCOL_NAME,
            expected: MLD_V1_MESSAGE_LEN,
            actual: message.len(),
        });
    }
    Ok(())
}

impl MembershipProtocol for Mld {
    type Family = Ipv6;

    const NAME: &'static str = PROTOCOL_NAME;
    const PROTOCOL_NUMBER: u8 = NEXT_HEADER_ICMPV6;
    const QUERY_TYPE: u8 = MLD_LISTENER_QUERY;
    const REPORT_TYPE: u8 = MLD_V2_LISTENER_REPORT;
    const LEGACY_REPORT_TYPES: &'static [u8] = &[MLD_V1_LISTENER_REPORT];
    const LEAVE_TYPE: u8 = MLD_LISTENER_DONE;
    const MIN_MESSAGE_LEN: usize = MLD_V2_REPORT_MIN_LEN;
    const DELAY_UNIT_MS: u32 = 1;

    const ALL_SYSTEMS: Ipv6Addr = ALL_NODES;
    const REPORT_DESTINATION: Ipv6Addr = ALL_MLDV2_ROUTERS;
    const ASSIGNED_SOURCE: Ipv6Addr = MLD_ASSIGNED_SOURCE;

    fn parse_query(message: &[u8]) -> Result<QueryMessage<Ipv6Addr>, ParseError> {
        check_v1_len(message)?;
        if message.len() > MLD_V1_MESSAGE_LEN && message.len() < MLD_V2_QUERY_MIN_LEN {
            return Err(ParseError::MalformedMessage {
                protocol: PROTOCOL_NAME,
                reason: "query length matches neither the v1 nor the v2 format",
            });
        }

        let extended = if message.len() >= MLD_V2_QUERY_MIN_LEN {
            Some(parse_extended_query::<Ipv6>(
                PROTOCOL_NAME,
                message,
                MLD_V1_MESSAGE_LEN,
            )?)
        } else {
            None
        };

        Ok(QueryMessage {
            max_resp_code: u16::from_be_bytes([message[4], message[5]]),
            group: read_addr::<Ipv6>(PROTOCOL_NAME, &message[8..24])?,
            extended,
        })
    }

    fn write_query(query: &QueryMessage<Ipv6Addr>, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(MLD_LISTENER_QUERY);
        buf.put_u8(0);
        buf.put_u16(0);
        buf.put_u16(query.max_resp_code);
        buf.put_u16(0);
        buf.put_slice(&query.group.octets());
        if let Some(extended) = &query.extended {
            write_extended_query::<Ipv6>(PROTOCOL_NAME, extended, buf)?;
        }
        Ok(())
    }

    fn parse_legacy(message: &[u8]) -> Result<Ipv6Addr, ParseError> {
        check_v1_len(message)?;
        read_addr::<Ipv6>(PROTOCOL_NAME, &message[8..24])
    }

    fn write_legacy(msg_type: u8, group: &Ipv6Addr, buf: &mut BytesMut) {
        buf.put_u8(msg_type);
        buf.put_u8(0);
        buf.put_u16(0);
        buf.put_u16(0);
        buf.put_u16(0);
        buf.put_slice(&group.octets());
    }

    fn max_response_delay(query: &QueryMessage<Ipv6Addr>) -> u32 {
        if query.extended.is_some() {
            decode_exp16(query.max_resp_code)
        } else {
            query.max_resp_code as u32
        }
    }

    fn max_resp_code(delay: u32, extended: bool) -> u16 {
        if extended {
            encode_exp16(delay)
        } else {
            delay.min(u16::MAX as u32) as u16
        }
    }
}

pub fn type_name(msg_type: u8) -> &'static str {
    match msg_type {
        MLD_LISTENER_QUERY => "Multicast Listener Query",
        MLD_V1_LISTENER_REPORT => "V1 Multicast Listener Report",
        MLD_LISTENER_DONE => "Multicast Listener Done",
        MLD_V2_LISTENER_REPORT => "V2 Multicast Listener Report",
        _ => "Unknown",
    }
}
