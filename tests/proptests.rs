//! Property-Based Tests
//!
//! Wires the `proptests/` modules into one test crate.

#[path = "proptests/codec.rs"]
mod codec; // IPv4 round trip and checksum bit flips, parsers never panic

#[path = "proptests/membership.rs"]
mod membership; // query classification, filter predicates, exponential codes
