// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Shared validation utilities for configuration and CLI input.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::protocols::EXP8_MAX;

/// Largest Robustness Variable a query can carry (QRV is 3 bits)
pub const MAX_ROBUSTNESS: u8 = 7;

/// Largest query interval representable as a QQIC, in milliseconds
pub const MAX_QUERY_INTERVAL_MS: u32 = EXP8_MAX * 1000;

/// Largest max response delay an IGMPv3 Max Resp Code can carry
pub const MAX_RESPONSE_DELAY_MS: u32 = EXP8_MAX * 100;

/// Result type for validation functions
pub type ValidationResult = Result<(), String>;

/// Check if an IPv4 address is a valid unicast address.
///
/// Returns `false` for multicast, broadcast, and unspecified (0.0.0.0) addresses.
#[inline]
pub fn is_valid_unicast(addr: Ipv4Addr) -> bool {
    !addr.is_multicast() && !addr.is_broadcast() && !addr.is_unspecified()
}

/// fe80::/10
#[inline]
pub fn is_link_local_v6(addr: Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xffc0) == 0xfe80
}

/// Validate that an IPv4 address is a valid unicast address.
///
/// # Arguments
/// * `addr` - The address to validate
/// * `context` - Description of what this address represents (e.g., "igmp_source")
pub fn validate_unicast_address(addr: Ipv4Addr, context: &str) -> ValidationResult {
    if is_valid_unicast(addr) {
        Ok(())
    } else {
        Err(format!(
            "{} must be a valid unicast address, got {}",
            context, addr
        ))
    }
}

/// MLD messages must be sent from a link-local address (RFC 3810 §5).
pub fn validate_link_local_address(addr: Ipv6Addr, context: &str) -> ValidationResult {
    if is_link_local_v6(addr) {
        Ok(())
    } else {
        Err(format!(
            "{} must be an IPv6 link-local address, got {}",
            context, addr
        ))
    }
}

pub fn validate_multicast_group(addr: IpAddr, context: &str) -> ValidationResult {
    if addr.is_multicast() {
        Ok(())
    } else {
        Err(format!("{} must be a multicast address, got {}", context, addr))
    }
}

/// Validate a Robustness Variable.
///
/// Zero is legal on the wire (a querier with a larger value sends 0) but
/// not as a configured value.
pub fn validate_robustness(robustness: u8) -> ValidationResult {
    if (1..=MAX_ROBUSTNESS).contains(&robustness) {
        Ok(())
    } else {
        Err(format!(
            "robustness must be between 1 and {}, got {}",
            MAX_ROBUSTNESS, robustness
        ))
    }
}

pub fn validate_query_interval_ms(interval_ms: u32) -> ValidationResult {
    if interval_ms == 0 {
        return Err("query interval cannot be 0".to_string());
    }
    if interval_ms > MAX_QUERY_INTERVAL_MS {
        return Err(format!(
            "query interval {} ms exceeds the largest encodable interval of {} ms",
            interval_ms, MAX_QUERY_INTERVAL_MS
        ));
    }
    Ok(())
}

/// Validate a max response delay against the smaller of the IGMP and MLD ranges
pub fn validate_max_response_delay_ms(delay_ms: u32) -> ValidationResult {
    if delay_ms > MAX_RESPONSE_DELAY_MS {
        return Err(format!(
            "max response delay {} ms exceeds the largest encodable delay of {} ms",
            delay_ms, MAX_RESPONSE_DELAY_MS
        ));
    }
    Ok(())
}
