// SPDX-License-Identifier: Apache-2.0 OR MIT
//! IGMPv3/MLDv2 membership translation for AMT gateways and relays.
//!
//! Membership queries arriving as IPv4/IGMP or IPv6/MLD packets are decoded
//! into one protocol-independent [`MembershipQuery`]; membership reports built
//! from [`MembershipReport`] records are encoded back into the wire protocol
//! of the tunnel's family. Per-group [`SourceFilter`]s track which sources a
//! receiver wants, and a [`MembershipService`] serializes every change to them.
//!
//! ```
//! use amt_membership::transform::{IgmpReportTransform, Transform};
//! use amt_membership::{GroupMembershipRecord, MembershipReport, RecordType};
//! use std::net::Ipv4Addr;
//!
//! let report = MembershipReport::from_records([GroupMembershipRecord::new(
//!     RecordType::ModeIsInclude,
//!     Ipv4Addr::new(232, 1, 1, 1),
//!     [Ipv4Addr::new(10, 0, 0, 1)],
//! )]);
//! let packet = IgmpReportTransform::default().transform(&report).unwrap();
//! assert_eq!(packet.destination, Ipv4Addr::new(224, 0, 0, 22));
//! ```

#[macro_use]
pub mod logging;

pub mod config;
pub mod family;
pub mod membership;
pub mod packet;
pub mod protocols;
pub mod transform;
pub mod validation;

pub use config::{Config, ConfigError};
pub use family::{AddressFamily, Ipv4, Ipv6, MulticastAddress};
pub use membership::{
    FilterError, FilterMode, GroupMembershipRecord, MembershipHandle, MembershipQuery,
    MembershipReport, MembershipService, MembershipTable, QueryKind, RecordType, ServiceError,
    SourceFilter,
};
pub use packet::{EncodeError, IpPacket, Ipv4Packet, Ipv6Packet, ParseError};
pub use protocols::{Igmp, MembershipProtocol, Mld};
pub use transform::{
    decode_packet, DecodedMessage, ProtocolError, SourceCopyMode, Transform, TransformConfig,
};
