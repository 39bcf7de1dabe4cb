// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Internet checksum (RFC 1071) helpers shared by the IP header codec and the
//! IGMP/MLD message codecs.

use std::net::Ipv6Addr;

/// Add `data` as big-endian 16-bit words into a running 32-bit sum.
///
/// An odd trailing byte is padded with a zero low byte.
pub fn sum_words(mut sum: u32, data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum = sum.wrapping_add(u16::from_be_bytes([chunk[0], chunk[1]]) as u32);
    }
    if let Some(&byte) = chunks.remainder().first() {
        sum = sum.wrapping_add((byte as u32) << 8);
    }
    sum
}

/// Fold carries into the low 16 bits and complement.
pub fn finish(mut sum: u32) -> u16 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// One's-complement checksum over `data`.
pub fn internet_checksum(data: &[u8]) -> u16 {
    finish(sum_words(0, data))
}

/// Checksum of `data` computed as if the two bytes at `field_offset` were zero.
pub fn checksum_with_zeroed_field(data: &[u8], field_offset: usize) -> u16 {
    let mut sum = sum_words(0, &data[..field_offset]);
    if field_offset + 2 < data.len() {
        sum = sum_words(sum, &data[field_offset + 2..]);
    }
    finish(sum)
}

/// Recompute the checksum over `data` (field zeroed) and compare it with the
/// value stored at `field_offset`.
///
/// Returns `(stored, computed)` on mismatch.
pub fn verify_checksum(data: &[u8], field_offset: usize) -> Result<(), (u16, u16)> {
    let stored = u16::from_be_bytes([data[field_offset], data[field_offset + 1]]);
    let computed = checksum_with_zeroed_field(data, field_offset);
    if stored == computed {
        Ok(())
    } else {
        Err((stored, computed))
    }
}

/// Partial sum of the IPv6 pseudo-header (RFC 8200 §8.1).
pub fn pseudo_header_v6(src: &Ipv6Addr, dst: &Ipv6Addr, upper_len: u32, next_header: u8) -> u32 {
    let mut sum = sum_words(0, &src.octets());
    sum = sum_words(sum, &dst.octets());
    sum = sum_words(sum, &upper_len.to_be_bytes());
    sum_words(sum, &[0, 0, 0, next_header])
}
