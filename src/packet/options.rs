// SPDX-License-Identifier: Apache-2.0 OR MIT
//! IPv4 header options (RFC 791, RFC 2113)

use bytes::{Buf, BufMut, Bytes};

use super::ParseError;

pub const OPTION_END_OF_LIST: u8 = 0;
pub const OPTION_NO_OPERATION: u8 = 1;
/// Router Alert: copied flag set, class 0, number 20
pub const OPTION_ROUTER_ALERT: u8 = 148;
pub const ROUTER_ALERT_LENGTH: u8 = 4;

/// A single IPv4 option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ipv4Option {
    /// End of option list; terminates parsing and is not kept in parsed lists
    EndOfList,
    NoOperation,
    /// Router Alert with its 16-bit value (0 = examine packet)
    RouterAlert(u16),
    /// Any other option, kept verbatim
    Other { kind: u8, data: Bytes },
}

impl Ipv4Option {
    pub fn kind(&self) -> u8 {
        match self {
            Ipv4Option::EndOfList => OPTION_END_OF_LIST,
            Ipv4Option::NoOperation => OPTION_NO_OPERATION,
            Ipv4Option::RouterAlert(_) => OPTION_ROUTER_ALERT,
            Ipv4Option::Other { kind, .. } => *kind,
        }
    }

    /// Encoded length in bytes
    pub fn len(&self) -> usize {
        match self {
            Ipv4Option::EndOfList | Ipv4Option::NoOperation => 1,
            Ipv4Option::RouterAlert(_) => ROUTER_ALERT_LENGTH as usize,
            Ipv4Option::Other { data, .. } => 2 + data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn write<B: BufMut>(&self, buf: &mut B) {
        match self {
            Ipv4Option::EndOfList | Ipv4Option::NoOperation => buf.put_u8(self.kind()),
            Ipv4Option::RouterAlert(value) => {
                buf.put_u8(OPTION_ROUTER_ALERT);
                buf.put_u8(ROUTER_ALERT_LENGTH);
                buf.put_u16(*value);
            }
            Ipv4Option::Other { kind, data } => {
                buf.put_u8(*kind);
                buf.put_u8((data.len() + 2) as u8);
                buf.put_slice(data);
            }
        }
    }
}

/// Reads one option from the front of the option area
///
/// The codec calls `parse_option` until the area is exhausted or
/// `EndOfList` is returned. Implementations must advance `buf` past the
/// option they decode.
pub trait OptionParser {
    fn parse_option(&self, buf: &mut Bytes) -> Result<Ipv4Option, ParseError>;
}

/// Decodes EOOL, NOP and Router Alert; anything else becomes `Other`
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardOptions;

impl OptionParser for StandardOptions {
    fn parse_option(&self, buf: &mut Bytes) -> Result<Ipv4Option, ParseError> {
        let kind = buf.get_u8();
        match kind {
            OPTION_END_OF_LIST => return Ok(Ipv4Option::EndOfList),
            OPTION_NO_OPERATION => return Ok(Ipv4Option::NoOperation),
            _ => {}
        }

        if !buf.has_remaining() {
            return Err(ParseError::InvalidOption {
                kind,
                reason: "missing length byte",
            });
        }
        let length = buf.get_u8() as usize;
        if length < 2 {
            return Err(ParseError::InvalidOption {
                kind,
                reason: "length below 2",
            });
        }
        if buf.remaining() < length - 2 {
            return Err(ParseError::InvalidOption {
                kind,
                reason: "length runs past the header",
            });
        }

        if kind == OPTION_ROUTER_ALERT {
            if length != ROUTER_ALERT_LENGTH as usize {
                return Err(ParseError::InvalidOption {
                    kind,
                    reason: "router alert length must be 4",
                });
            }
            return Ok(Ipv4Option::RouterAlert(buf.get_u16()));
        }

        let data = buf.split_to(length - 2);
        Ok(Ipv4Option::Other { kind, data })
    }
}

/// Decode a whole option area, stopping at the first EOOL
pub(crate) fn parse_options<P: OptionParser + ?Sized>(
    mut area: Bytes,
    parser: &P,
) -> Result<Vec<Ipv4Option>, ParseError> {
    let mut options = Vec::new();
    while area.has_remaining() {
        match parser.parse_option(&mut area)? {
            Ipv4Option::EndOfList => break,
            option => options.push(option),
        }
    }
    Ok(options)
}

/// Total encoded length of an option list before padding
pub(crate) fn options_len(options: &[Ipv4Option]) -> usize {
    options.iter().map(Ipv4Option::len).sum()
}
