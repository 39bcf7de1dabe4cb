// SPDX-License-Identifier: Apache-2.0 OR MIT
//! IP packet codec
//!
//! Parses and serializes the IPv4 and IPv6 headers that carry IGMP and MLD
//! messages. Parsing takes a `Bytes` buffer and keeps the payload as a
//! zero-copy view of it; serialization appends to a `BytesMut`.
//!
//! Header checksums (IPv4 only) are verified right after the fixed header
//! and options are read, before any other field is decoded, and are
//! recomputed and patched in place as the last step of `write_to`.

pub mod checksum;
pub mod ipv4;
pub mod ipv6;
pub mod options;

use bytes::{Bytes, BytesMut};
use std::io::Read;
use thiserror::Error;

pub use ipv4::{FragmentFlags, Ipv4Packet, TypeOfService};
pub use ipv6::{HopByHopOptions, Ipv6Option, Ipv6Packet};
pub use options::{Ipv4Option, OptionParser, StandardOptions};

/// Errors raised while decoding packets and membership messages
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    #[error("Invalid IP version: expected {expected}, got {actual}")]
    InvalidIpVersion { expected: u8, actual: u8 },

    #[error("IP header length too small: {0} words")]
    HeaderTooSmall(u8),

    #[error("IP total length {total_length} is smaller than the header length {header_len}")]
    TotalLengthTooSmall { total_length: u16, header_len: usize },

    #[error("IP header checksum mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    IpChecksumMismatch { stored: u16, computed: u16 },

    #[error("Malformed IP option {kind}: {reason}")]
    InvalidOption { kind: u8, reason: &'static str },

    #[error("{protocol} message too short: expected at least {expected} bytes, got {actual}")]
    MessageTooShort {
        protocol: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{protocol} checksum mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    MessageChecksumMismatch {
        protocol: &'static str,
        stored: u16,
        computed: u16,
    },

    #[error("Malformed {protocol} message: {reason}")]
    MalformedMessage {
        protocol: &'static str,
        reason: &'static str,
    },

    #[error("I/O error while reading packet: {0}")]
    Io(String),
}

/// Errors raised while serializing packets
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("IP options occupy {len} bytes, at most {max} fit in the header")]
    OptionsTooLong { len: usize, max: usize },

    #[error("Packet of {len} bytes exceeds the {max} byte length field")]
    PacketTooLong { len: usize, max: usize },

    #[error("{protocol} message carries {count} {what}, the count field holds at most 65535")]
    TooManyEntries {
        protocol: &'static str,
        what: &'static str,
        count: usize,
    },
}

/// Behavior shared by the IPv4 and IPv6 packet types
pub trait IpPacket: Sized + Clone + std::fmt::Debug + Send + Sync {
    /// Address type of the header
    type Addr: Copy;

    /// Value of the version nibble
    const VERSION: u8;

    /// Parse a packet, optionally verifying the header checksum
    ///
    /// Bytes past the declared packet length (link-layer padding) are ignored.
    fn parse(data: Bytes, verify_checksum: bool) -> Result<Self, ParseError>;

    /// Parse from a borrowed slice (copies once)
    fn from_slice(data: &[u8], verify_checksum: bool) -> Result<Self, ParseError> {
        Self::parse(Bytes::copy_from_slice(data), verify_checksum)
    }

    /// Read exactly one packet from a byte stream
    fn read_from<R: Read>(reader: &mut R, verify_checksum: bool) -> Result<Self, ParseError>;

    /// Serialize, recomputing lengths and checksum; returns bytes written
    fn write_to(&mut self, buf: &mut BytesMut) -> Result<usize, EncodeError>;

    /// Serialize into a fresh buffer
    fn to_bytes(&mut self) -> Result<Bytes, EncodeError> {
        let mut buf = BytesMut::new();
        self.write_to(&mut buf)?;
        Ok(buf.freeze())
    }

    fn source(&self) -> Self::Addr;

    fn destination(&self) -> Self::Addr;

    /// Protocol number of the payload, after any extension headers
    fn upper_layer_protocol(&self) -> u8;

    fn payload(&self) -> &Bytes;
}

/// Version nibble of a raw packet, if there is at least one byte
pub fn ip_version(data: &[u8]) -> Option<u8> {
    data.first().map(|b| b >> 4)
}

/// Fill `buf` from `reader`, mapping a short read to `PacketTooShort`
pub(crate) fn read_exact_or_short<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    already: usize,
) -> Result<(), ParseError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ParseError::PacketTooShort {
                expected: already + buf.len(),
                actual: already,
            }
        } else {
            ParseError::Io(e.to_string())
        }
    })
}
