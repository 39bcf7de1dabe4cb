// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Translation between IGMP/MLD packets and the membership model
//!
//! | Transform | Input | Output |
//! |-----------|-------|--------|
//! | [`QueryToMembership`] | query packet | [`MembershipQuery`] |
//! | [`MembershipToReport`] | [`MembershipReport`] | report packet |
//! | [`ReportToMembership`] | report packet | [`MembershipReport`] |
//! | [`MembershipToQuery`] | [`MembershipQuery`] | query packet |
//!
//! Each is written once and instantiated per protocol; the `Igmp*` and
//! `Mld*` aliases name the four query/report adapters a relay needs.
//! Packet transforms accept either a parsed packet or raw `Bytes`.

use bytes::Bytes;
use metrics::{counter, describe_counter};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;

use crate::family::AddressFamily;
use crate::logging::{Facility, Logger};
use crate::membership::{
    GroupMembershipRecord, MembershipQuery, MembershipReport, RecordType,
    DEFAULT_MAX_RESPONSE_DELAY_MS, DEFAULT_QUERY_INTERVAL_MS, DEFAULT_ROBUSTNESS_VARIABLE,
};
use crate::packet::{ip_version, EncodeError, IpPacket, ParseError};
use crate::protocols::{
    decode_exp8, decode_message, encode_exp8, encode_query, encode_report, ExtendedQuery,
    GroupRecord, Igmp, MembershipProtocol, Message, Mld, ProtocolAddr, ProtocolPacket,
    QueryMessage, ReportMessage,
};
use crate::{log_debug, log_warning};

/// Counter of transform outcomes, labelled by transform, protocol and result
pub const TRANSFORM_COUNTER: &str = "membership_transforms_total";

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    describe_counter!(
        TRANSFORM_COUNTER,
        "Membership transforms by outcome (ok or rejection reason)"
    );
}

/// Rejections raised by the transforms
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed packet: {0}")]
    Parse(ParseError),

    #[error("Cannot encode packet: {0}")]
    Encode(#[from] EncodeError),

    #[error("Wrong IP version: expected {expected}, got {actual}")]
    WrongIpVersion { expected: u8, actual: u8 },

    #[error("Expected {protocol} (protocol {expected}), packet carries protocol {actual}")]
    WrongProtocol {
        protocol: &'static str,
        expected: u8,
        actual: u8,
    },

    #[error("{protocol} message type {msg_type} is not a membership query")]
    NotAQuery { protocol: &'static str, msg_type: u8 },

    #[error("{protocol} message type {msg_type} is not a membership report")]
    NotAReport { protocol: &'static str, msg_type: u8 },
}

impl From<ParseError> for ProtocolError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidIpVersion { expected, actual } => {
                ProtocolError::WrongIpVersion { expected, actual }
            }
            other => ProtocolError::Parse(other),
        }
    }
}

impl ProtocolError {
    /// Malformed input, as opposed to well-formed input of the wrong kind
    pub fn is_parse_error(&self) -> bool {
        matches!(self, ProtocolError::Parse(_))
    }

    /// Short label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ProtocolError::Parse(_) => "malformed",
            ProtocolError::Encode(_) => "encode",
            ProtocolError::WrongIpVersion { .. } => "wrong_ip_version",
            ProtocolError::WrongProtocol { .. } => "wrong_protocol",
            ProtocolError::NotAQuery { .. } => "not_a_query",
            ProtocolError::NotAReport { .. } => "not_a_report",
        }
    }
}

/// A one-way translation
pub trait Transform<I> {
    type Output;

    fn transform(&self, input: I) -> Result<Self::Output, ProtocolError>;
}

/// How many sources of a v3/v2 query end up in the decoded query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCopyMode {
    /// Every listed source
    #[default]
    All,
    /// Only the first listed source, for peers that expect the legacy
    /// decoding
    FirstOnly,
}

/// Settings shared by the transforms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    pub verify_checksums: bool,
    pub source_copy: SourceCopyMode,
    /// Robustness assumed for queries older than IGMPv3/MLDv2, and put in
    /// locally built queries
    pub default_robustness: u8,
    /// Query interval assumed for queries older than IGMPv3/MLDv2, and put
    /// in locally built queries
    pub default_query_interval_ms: u32,
    /// Max response delay of locally built queries
    pub max_response_delay_ms: u32,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            verify_checksums: true,
            source_copy: SourceCopyMode::All,
            default_robustness: DEFAULT_ROBUSTNESS_VARIABLE,
            default_query_interval_ms: DEFAULT_QUERY_INTERVAL_MS,
            max_response_delay_ms: DEFAULT_MAX_RESPONSE_DELAY_MS,
        }
    }
}

fn record_outcome<P: MembershipProtocol, T>(
    name: &'static str,
    logger: &Logger,
    result: &Result<T, ProtocolError>,
) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(err) => {
            if err.is_parse_error() {
                log_warning!(logger, Facility::Transform, "{} {} rejected: {}", P::NAME, name, err);
            } else {
                log_debug!(logger, Facility::Transform, "{} {} rejected: {}", P::NAME, name, err);
            }
            err.reason()
        }
    };
    counter!(TRANSFORM_COUNTER, "transform" => name, "protocol" => P::NAME, "result" => outcome)
        .increment(1);
}

fn check_protocol<P: MembershipProtocol>(packet: &ProtocolPacket<P>) -> Result<(), ProtocolError> {
    let actual = packet.upper_layer_protocol();
    if actual != P::PROTOCOL_NUMBER {
        return Err(ProtocolError::WrongProtocol {
            protocol: P::NAME,
            expected: P::PROTOCOL_NUMBER,
            actual,
        });
    }
    Ok(())
}

fn message_type<P: MembershipProtocol>(packet: &ProtocolPacket<P>) -> u8 {
    packet.payload().first().copied().unwrap_or_default()
}

/// Decodes a query packet into a [`MembershipQuery`]
#[derive(Debug, Clone)]
pub struct QueryToMembership<P> {
    config: TransformConfig,
    logger: Logger,
    _protocol: PhantomData<fn() -> P>,
}

pub type IgmpQueryTransform = QueryToMembership<Igmp>;
pub type MldQueryTransform = QueryToMembership<Mld>;

impl<P: MembershipProtocol> Default for QueryToMembership<P> {
    fn default() -> Self {
        Self::new(TransformConfig::default(), Logger::discard())
    }
}

impl<P: MembershipProtocol> QueryToMembership<P> {
    pub fn new(config: TransformConfig, logger: Logger) -> Self {
        Self {
            config,
            logger,
            _protocol: PhantomData,
        }
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    fn decode(
        &self,
        packet: &ProtocolPacket<P>,
    ) -> Result<MembershipQuery<ProtocolAddr<P>>, ProtocolError> {
        check_protocol::<P>(packet)?;
        let wire = match decode_message::<P>(packet, self.config.verify_checksums)? {
            Message::Query(query) => query,
            _ => {
                return Err(ProtocolError::NotAQuery {
                    protocol: P::NAME,
                    msg_type: message_type::<P>(packet),
                })
            }
        };

        let max_response_delay = P::max_response_delay(&wire);
        let query = MembershipQuery::new(wire.group, max_response_delay);
        let query = match wire.extended {
            Some(extended) => {
                let interval_ms = decode_exp8(extended.qqic).saturating_mul(1000);
                let sources = self.copy_sources(extended.sources);
                query
                    .with_robustness(extended.robustness)
                    .with_query_interval_ms(interval_ms)
                    .with_sources(sources)
            }
            None => query
                .with_robustness(self.config.default_robustness)
                .with_query_interval_ms(self.config.default_query_interval_ms),
        };

        log_debug!(
            self.logger,
            Facility::Transform,
            "{} {:?} query for {}, max response {}",
            P::NAME,
            query.kind(),
            query.group(),
            max_response_delay
        );
        Ok(query)
    }

    fn copy_sources(&self, sources: Vec<ProtocolAddr<P>>) -> Vec<ProtocolAddr<P>> {
        match self.config.source_copy {
            SourceCopyMode::All => sources,
            SourceCopyMode::FirstOnly => sources.into_iter().take(1).collect(),
        }
    }
}

impl<'a, P: MembershipProtocol> Transform<&'a ProtocolPacket<P>> for QueryToMembership<P> {
    type Output = MembershipQuery<ProtocolAddr<P>>;

    fn transform(&self, packet: &'a ProtocolPacket<P>) -> Result<Self::Output, ProtocolError> {
        let result = self.decode(packet);
        record_outcome::<P, _>("query_to_membership", &self.logger, &result);
        result
    }
}

impl<P: MembershipProtocol> Transform<Bytes> for QueryToMembership<P> {
    type Output = MembershipQuery<ProtocolAddr<P>>;

    fn transform(&self, data: Bytes) -> Result<Self::Output, ProtocolError> {
        let packet = ProtocolPacket::<P>::parse(data, self.config.verify_checksums).map_err(
            |err| {
                let err = ProtocolError::from(err);
                record_outcome::<P, ()>("query_to_membership", &self.logger, &Err(err.clone()));
                err
            },
        )?;
        self.transform(&packet)
    }
}

/// Encodes a [`MembershipReport`] as an IGMPv3 or MLDv2 report packet
#[derive(Debug, Clone)]
pub struct MembershipToReport<P: MembershipProtocol> {
    source: ProtocolAddr<P>,
    logger: Logger,
    _protocol: PhantomData<fn() -> P>,
}

pub type IgmpReportTransform = MembershipToReport<Igmp>;
pub type MldReportTransform = MembershipToReport<Mld>;

impl<P: MembershipProtocol> Default for MembershipToReport<P> {
    fn default() -> Self {
        Self::new(Logger::discard())
    }
}

impl<P: MembershipProtocol> MembershipToReport<P> {
    /// Reports are sourced from the protocol's assigned address
    pub fn new(logger: Logger) -> Self {
        Self {
            source: P::ASSIGNED_SOURCE,
            logger,
            _protocol: PhantomData,
        }
    }

    pub fn with_source(mut self, source: ProtocolAddr<P>) -> Self {
        self.source = source;
        self
    }

    pub fn source(&self) -> ProtocolAddr<P> {
        self.source
    }

    fn encode(
        &self,
        report: &MembershipReport<ProtocolAddr<P>>,
    ) -> Result<ProtocolPacket<P>, ProtocolError> {
        let wire = ReportMessage {
            records: report
                .records()
                .iter()
                .map(|record| GroupRecord {
                    record_type: record.record_type.as_u8(),
                    group: record.group,
                    sources: record.sources.iter().copied().collect(),
                    aux_data: Bytes::new(),
                })
                .collect(),
        };
        let payload = encode_report::<P>(&wire, &self.source, &P::REPORT_DESTINATION)?;

        log_debug!(
            self.logger,
            Facility::Transform,
            "{} report with {} records, {} bytes",
            P::NAME,
            wire.records.len(),
            payload.len()
        );
        Ok(<P::Family as AddressFamily>::membership_packet(
            self.source,
            P::REPORT_DESTINATION,
            P::PROTOCOL_NUMBER,
            payload,
        ))
    }
}

impl<'a, P: MembershipProtocol> Transform<&'a MembershipReport<ProtocolAddr<P>>>
    for MembershipToReport<P>
{
    type Output = ProtocolPacket<P>;

    fn transform(
        &self,
        report: &'a MembershipReport<ProtocolAddr<P>>,
    ) -> Result<Self::Output, ProtocolError> {
        let result = self.encode(report);
        record_outcome::<P, _>("membership_to_report", &self.logger, &result);
        result
    }
}

/// Decodes a report packet into a [`MembershipReport`]
///
/// Older single-group messages are mapped the way an IGMPv3/MLDv2 router
/// treats them: a report becomes MODE_IS_EXCLUDE with no sources, a leave
/// or done becomes CHANGE_TO_INCLUDE_MODE with no sources. Records of an
/// unknown type are skipped.
#[derive(Debug, Clone)]
pub struct ReportToMembership<P> {
    config: TransformConfig,
    logger: Logger,
    _protocol: PhantomData<fn() -> P>,
}

impl<P: MembershipProtocol> Default for ReportToMembership<P> {
    fn default() -> Self {
        Self::new(TransformConfig::default(), Logger::discard())
    }
}

impl<P: MembershipProtocol> ReportToMembership<P> {
    pub fn new(config: TransformConfig, logger: Logger) -> Self {
        Self {
            config,
            logger,
            _protocol: PhantomData,
        }
    }

    fn decode(
        &self,
        packet: &ProtocolPacket<P>,
    ) -> Result<MembershipReport<ProtocolAddr<P>>, ProtocolError> {
        check_protocol::<P>(packet)?;
        let mut report = MembershipReport::new();
        match decode_message::<P>(packet, self.config.verify_checksums)? {
            Message::Report(wire) => {
                for record in wire.records {
                    match RecordType::from_u8(record.record_type) {
                        Some(record_type) => report.add_record(GroupMembershipRecord::new(
                            record_type,
                            record.group,
                            record.sources,
                        )),
                        None => log_debug!(
                            self.logger,
                            Facility::Transform,
                            "Skipping {} record of unknown type {} for {}",
                            P::NAME,
                            record.record_type,
                            record.group
                        ),
                    }
                }
            }
            Message::Legacy { msg_type, group } => {
                let record_type = if msg_type == P::LEAVE_TYPE {
                    RecordType::ChangeToIncludeMode
                } else {
                    RecordType::ModeIsExclude
                };
                report.add_record(GroupMembershipRecord::new(record_type, group, []));
            }
            _ => {
                return Err(ProtocolError::NotAReport {
                    protocol: P::NAME,
                    msg_type: message_type::<P>(packet),
                })
            }
        }
        Ok(report)
    }
}

impl<'a, P: MembershipProtocol> Transform<&'a ProtocolPacket<P>> for ReportToMembership<P> {
    type Output = MembershipReport<ProtocolAddr<P>>;

    fn transform(&self, packet: &'a ProtocolPacket<P>) -> Result<Self::Output, ProtocolError> {
        let result = self.decode(packet);
        record_outcome::<P, _>("report_to_membership", &self.logger, &result);
        result
    }
}

impl<P: MembershipProtocol> Transform<Bytes> for ReportToMembership<P> {
    type Output = MembershipReport<ProtocolAddr<P>>;

    fn transform(&self, data: Bytes) -> Result<Self::Output, ProtocolError> {
        let packet = ProtocolPacket::<P>::parse(data, self.config.verify_checksums).map_err(
            |err| {
                let err = ProtocolError::from(err);
                record_outcome::<P, ()>("report_to_membership", &self.logger, &Err(err.clone()));
                err
            },
        )?;
        self.transform(&packet)
    }
}

/// Encodes a [`MembershipQuery`] as an IGMPv3 or MLDv2 query packet
///
/// General queries go to the all-systems/all-nodes address, the others to
/// the queried group.
#[derive(Debug, Clone)]
pub struct MembershipToQuery<P: MembershipProtocol> {
    source: ProtocolAddr<P>,
    robustness: u8,
    query_interval_ms: u32,
    max_response_delay_ms: u32,
    logger: Logger,
    _protocol: PhantomData<fn() -> P>,
}

impl<P: MembershipProtocol> Default for MembershipToQuery<P> {
    fn default() -> Self {
        Self::new(Logger::discard())
    }
}

impl<P: MembershipProtocol> MembershipToQuery<P> {
    pub fn new(logger: Logger) -> Self {
        Self {
            source: P::ASSIGNED_SOURCE,
            robustness: DEFAULT_ROBUSTNESS_VARIABLE,
            query_interval_ms: DEFAULT_QUERY_INTERVAL_MS,
            max_response_delay_ms: DEFAULT_MAX_RESPONSE_DELAY_MS,
            logger,
            _protocol: PhantomData,
        }
    }

    pub fn with_source(mut self, source: ProtocolAddr<P>) -> Self {
        self.source = source;
        self
    }

    /// Take the querier defaults used by [`MembershipToQuery::query`]
    pub fn with_config(mut self, config: &TransformConfig) -> Self {
        self.robustness = config.default_robustness;
        self.query_interval_ms = config.default_query_interval_ms;
        self.max_response_delay_ms = config.max_response_delay_ms;
        self
    }

    /// A query for `group` carrying the querier defaults; pass the
    /// unspecified address for a general query
    pub fn query(&self, group: ProtocolAddr<P>) -> MembershipQuery<ProtocolAddr<P>> {
        MembershipQuery::new(group, self.max_response_delay_ms / P::DELAY_UNIT_MS)
            .with_robustness(self.robustness)
            .with_query_interval_ms(self.query_interval_ms)
    }

    fn encode(
        &self,
        query: &MembershipQuery<ProtocolAddr<P>>,
    ) -> Result<ProtocolPacket<P>, ProtocolError> {
        // QRV is 3 bits; larger robustness values are sent as 0
        let robustness = if query.robustness() > 7 {
            0
        } else {
            query.robustness()
        };
        let wire = QueryMessage {
            max_resp_code: P::max_resp_code(query.max_response_delay(), true),
            group: query.group(),
            extended: Some(ExtendedQuery {
                suppress_router_processing: false,
                robustness,
                qqic: encode_exp8(query.query_interval_ms() / 1000),
                sources: query
                    .sources()
                    .map(|s| s.iter().copied().collect())
                    .unwrap_or_default(),
            }),
        };
        let destination = if query.is_general_query() {
            P::ALL_SYSTEMS
        } else {
            query.group()
        };
        let payload = encode_query::<P>(&wire, &self.source, &destination)?;
        Ok(<P::Family as AddressFamily>::membership_packet(
            self.source,
            destination,
            P::PROTOCOL_NUMBER,
            payload,
        ))
    }
}

impl<'a, P: MembershipProtocol> Transform<&'a MembershipQuery<ProtocolAddr<P>>>
    for MembershipToQuery<P>
{
    type Output = ProtocolPacket<P>;

    fn transform(
        &self,
        query: &'a MembershipQuery<ProtocolAddr<P>>,
    ) -> Result<Self::Output, ProtocolError> {
        let result = self.encode(query);
        record_outcome::<P, _>("membership_to_query", &self.logger, &result);
        result
    }
}

/// A membership message decoded from a packet of either family
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DecodedMessage {
    IgmpQuery(MembershipQuery<Ipv4Addr>),
    IgmpReport(MembershipReport<Ipv4Addr>),
    MldQuery(MembershipQuery<Ipv6Addr>),
    MldReport(MembershipReport<Ipv6Addr>),
}

enum Decoded<A> {
    Query(MembershipQuery<A>),
    Report(MembershipReport<A>),
}

/// Decode an IPv4 packet carrying IGMP or an IPv6 packet carrying MLD
///
/// Queries go through [`QueryToMembership`], everything else through
/// [`ReportToMembership`].
pub fn decode_packet(
    data: Bytes,
    config: &TransformConfig,
    logger: &Logger,
) -> Result<DecodedMessage, ProtocolError> {
    match ip_version(&data) {
        Some(4) => Ok(match decode_with::<Igmp>(data, config, logger)? {
            Decoded::Query(query) => DecodedMessage::IgmpQuery(query),
            Decoded::Report(report) => DecodedMessage::IgmpReport(report),
        }),
        Some(6) => Ok(match decode_with::<Mld>(data, config, logger)? {
            Decoded::Query(query) => DecodedMessage::MldQuery(query),
            Decoded::Report(report) => DecodedMessage::MldReport(report),
        }),
        Some(actual) => Err(ProtocolError::WrongIpVersion {
            expected: 4,
            actual,
        }),
        None => Err(ProtocolError::Parse(ParseError::PacketTooShort {
            expected: 1,
            actual: 0,
        })),
    }
}

fn decode_with<P: MembershipProtocol>(
    data: Bytes,
    config: &TransformConfig,
    logger: &Logger,
) -> Result<Decoded<ProtocolAddr<P>>, ProtocolError> {
    let packet = ProtocolPacket::<P>::parse(data, config.verify_checksums)?;
    if packet.payload().first() == Some(&P::QUERY_TYPE) {
        QueryToMembership::<P>::new(config.clone(), logger.clone())
            .transform(&packet)
            .map(Decoded::Query)
    } else {
        ReportToMembership::<P>::new(config.clone(), logger.clone())
            .transform(&packet)
            .map(Decoded::Report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::Ipv4;
    use crate::packet::{Ipv4Packet, Ipv6Packet};
    use crate::protocols::igmp::{ALL_IGMPV3_ROUTERS, IGMP_ASSIGNED_SOURCE, IGMP_PROTOCOL};
    use crate::protocols::mld::ALL_MLDV2_ROUTERS;
    use crate::protocols::{encode_legacy, igmp, mld};

    fn igmp_packet(message: Bytes) -> Ipv4Packet {
        Ipv4::membership_packet(
            Ipv4Addr::new(10, 0, 0, 254),
            igmp::ALL_SYSTEMS_GROUP,
            IGMP_PROTOCOL,
            message,
        )
    }

    fn v3_query_bytes(robustness: u8, qqic: u8, sources: &[Ipv4Addr]) -> Bytes {
        let wire = QueryMessage {
            max_resp_code: 100,
            group: Ipv4Addr::new(232, 1, 1, 1),
            extended: Some(ExtendedQuery {
                suppress_router_processing: false,
                robustness,
                qqic,
                sources: sources.to_vec(),
            }),
        };
        encode_query::<Igmp>(&wire, &Ipv4Addr::new(10, 0, 0, 254), &wire.group).unwrap()
    }

    #[test]
    fn test_v3_query_fields() {
        let packet = igmp_packet(v3_query_bytes(3, 60, &[Ipv4Addr::new(10, 0, 0, 1)]));
        let query = IgmpQueryTransform::default().transform(&packet).unwrap();

        assert_eq!(query.group(), Ipv4Addr::new(232, 1, 1, 1));
        assert_eq!(query.max_response_delay(), 100);
        assert_eq!(query.robustness(), 3);
        assert_eq!(query.query_interval_ms(), 60_000);
        assert!(query.is_source_query());
    }

    #[test]
    fn test_legacy_query_uses_configured_defaults() {
        let message = crate::protocols::encode_query::<Igmp>(
            &QueryMessage {
                max_resp_code: 100,
                group: Ipv4Addr::UNSPECIFIED,
                extended: None,
            },
            &Ipv4Addr::new(10, 0, 0, 254),
            &igmp::ALL_SYSTEMS_GROUP,
        )
        .unwrap();
        let config = TransformConfig {
            default_robustness: 4,
            default_query_interval_ms: 60_000,
            ..TransformConfig::default()
        };
        let query = QueryToMembership::<Igmp>::new(config, Logger::discard())
            .transform(&igmp_packet(message))
            .unwrap();
        assert_eq!(query.robustness(), 4);
        assert_eq!(query.query_interval_ms(), 60_000);
        assert!(query.is_general_query());
    }

    #[test]
    fn test_wrong_protocol() {
        let packet = Ipv4Packet::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            17,
            Bytes::from_static(&[0; 8]),
        );
        let err = IgmpQueryTransform::default().transform(&packet).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::WrongProtocol {
                protocol: "IGMP",
                expected: 2,
                actual: 17
            }
        );
    }

    #[test]
    fn test_report_is_not_a_query() {
        let message = encode_legacy::<Igmp>(
            igmp::IGMP_V2_MEMBERSHIP_REPORT,
            &Ipv4Addr::new(239, 1, 1, 1),
            &IGMP_ASSIGNED_SOURCE,
            &Ipv4Addr::new(239, 1, 1, 1),
        );
        let err = IgmpQueryTransform::default()
            .transform(&igmp_packet(message))
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::NotAQuery {
                protocol: "IGMP",
                msg_type: 0x16
            }
        );
        assert!(!err.is_parse_error());
    }

    #[test]
    fn test_ipv6_bytes_rejected_by_igmp() {
        let mut packet = Ipv6Packet::new(
            Ipv6Addr::LOCALHOST,
            Ipv6Addr::LOCALHOST,
            58,
            Bytes::from_static(&[0; 8]),
        );
        let bytes = packet.to_bytes().unwrap();
        let err = IgmpQueryTransform::default().transform(bytes).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::WrongIpVersion {
                expected: 4,
                actual: 6
            }
        );
    }

    #[test]
    fn test_report_to_packet() {
        let report = MembershipReport::from_records([GroupMembershipRecord::new(
            RecordType::AllowNewSources,
            Ipv4Addr::new(239, 1, 1, 1),
            [Ipv4Addr::new(10, 0, 0, 1)],
        )]);
        let packet = IgmpReportTransform::default().transform(&report).unwrap();

        assert_eq!(packet.source, IGMP_ASSIGNED_SOURCE);
        assert_eq!(packet.destination, ALL_IGMPV3_ROUTERS);
        assert_eq!(packet.ttl, 1);
        assert!(packet.has_router_alert());
        assert_eq!(packet.payload[0], igmp::IGMP_V3_MEMBERSHIP_REPORT);
    }

    #[test]
    fn test_report_source_override() {
        let source = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0x42);
        let report = MembershipReport::from_records([GroupMembershipRecord::new(
            RecordType::ChangeToExcludeMode,
            "ff3e::1".parse().unwrap(),
            [],
        )]);
        let packet = MldReportTransform::default()
            .with_source(source)
            .transform(&report)
            .unwrap();
        assert_eq!(packet.source, source);
        assert_eq!(packet.destination, ALL_MLDV2_ROUTERS);

        let back = ReportToMembership::<Mld>::default()
            .transform(&packet)
            .unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_legacy_messages_as_records() {
        let group = Ipv4Addr::new(239, 9, 9, 9);
        let transform = ReportToMembership::<Igmp>::default();

        let join = encode_legacy::<Igmp>(igmp::IGMP_V2_MEMBERSHIP_REPORT, &group, &group, &group);
        let report = transform.transform(&igmp_packet(join)).unwrap();
        assert_eq!(report.records()[0].record_type, RecordType::ModeIsExclude);

        let leave = encode_legacy::<Igmp>(igmp::IGMP_LEAVE_GROUP, &group, &group, &group);
        let report = transform.transform(&igmp_packet(leave)).unwrap();
        assert_eq!(
            report.records()[0].record_type,
            RecordType::ChangeToIncludeMode
        );
        assert!(report.records()[0].sources.is_empty());
    }

    #[test]
    fn test_unknown_record_type_skipped() {
        let wire = ReportMessage {
            records: vec![
                GroupRecord {
                    record_type: 9,
                    group: Ipv4Addr::new(239, 1, 1, 1),
                    sources: vec![],
                    aux_data: Bytes::new(),
                },
                GroupRecord {
                    record_type: 2,
                    group: Ipv4Addr::new(239, 1, 1, 2),
                    sources: vec![],
                    aux_data: Bytes::new(),
                },
            ],
        };
        let message =
            encode_report::<Igmp>(&wire, &IGMP_ASSIGNED_SOURCE, &ALL_IGMPV3_ROUTERS).unwrap();
        let report = ReportToMembership::<Igmp>::default()
            .transform(&igmp_packet(message))
            .unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.records()[0].group, Ipv4Addr::new(239, 1, 1, 2));
    }

    #[test]
    fn test_query_is_not_a_report() {
        let packet = igmp_packet(v3_query_bytes(2, 125, &[]));
        let err = ReportToMembership::<Igmp>::default()
            .transform(&packet)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::NotAReport { msg_type: 0x11, .. }));
    }

    #[test]
    fn test_query_to_packet_destinations() {
        let transform = MembershipToQuery::<Mld>::default();
        let general = MembershipQuery::general(Ipv6Addr::UNSPECIFIED, 10_000);
        let packet = transform.transform(&general).unwrap();
        assert_eq!(packet.destination, mld::ALL_NODES);

        let group: Ipv6Addr = "ff3e::8000:1".parse().unwrap();
        let specific = MembershipQuery::new(group, 10_000).with_sources(["2001:db8::1"
            .parse::<Ipv6Addr>()
            .unwrap()]);
        let packet = transform.transform(&specific).unwrap();
        assert_eq!(packet.destination, group);

        let back = MldQueryTransform::default().transform(&packet).unwrap();
        assert_eq!(back, specific);
    }

    #[test]
    fn test_large_robustness_sent_as_zero() {
        let query = MembershipQuery::new(Ipv4Addr::new(239, 1, 1, 1), 100).with_robustness(9);
        let packet = MembershipToQuery::<Igmp>::default()
            .transform(&query)
            .unwrap();
        let back = IgmpQueryTransform::default().transform(&packet).unwrap();
        assert_eq!(back.robustness(), 0);
    }

    #[test]
    fn test_locally_built_queries_use_configured_defaults() {
        let config = TransformConfig {
            default_robustness: 3,
            default_query_interval_ms: 60_000,
            max_response_delay_ms: 2500,
            ..TransformConfig::default()
        };

        let igmp_querier = MembershipToQuery::<Igmp>::default().with_config(&config);
        let query = igmp_querier.query(Ipv4Addr::new(239, 1, 1, 1));
        assert!(query.is_group_query());
        // tenths of a second on the IGMP wire
        assert_eq!(query.max_response_delay(), 25);
        assert_eq!(query.robustness(), 3);
        let back = IgmpQueryTransform::default()
            .transform(&igmp_querier.transform(&query).unwrap())
            .unwrap();
        assert_eq!(back, query);

        let mld_querier = MembershipToQuery::<Mld>::default().with_config(&config);
        let general = mld_querier.query(Ipv6Addr::UNSPECIFIED);
        assert!(general.is_general_query());
        assert_eq!(general.max_response_delay(), 2500);
        let packet = mld_querier.transform(&general).unwrap();
        assert_eq!(packet.destination, mld::ALL_NODES);
        let back = MldQueryTransform::default().transform(&packet).unwrap();
        assert_eq!(back.max_response_delay(), 2500);
        assert_eq!(back.query_interval_ms(), 60_000);
    }

    #[test]
    fn test_default_query_delay_is_ten_seconds() {
        let query = MembershipToQuery::<Igmp>::default().query(Ipv4Addr::UNSPECIFIED);
        assert_eq!(query.max_response_delay(), 100);
        let query = MembershipToQuery::<Mld>::default().query(Ipv6Addr::UNSPECIFIED);
        assert_eq!(query.max_response_delay(), 10_000);
    }

    #[test]
    fn test_source_copy_modes() {
        let sources = [
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(10, 0, 0, 3),
        ];
        let packet = igmp_packet(v3_query_bytes(2, 125, &sources));

        let all = IgmpQueryTransform::default().transform(&packet).unwrap();
        assert_eq!(all.sources().unwrap().len(), 3);

        let config = TransformConfig {
            source_copy: SourceCopyMode::FirstOnly,
            ..TransformConfig::default()
        };
        let first = QueryToMembership::<Igmp>::new(config, Logger::discard())
            .transform(&packet)
            .unwrap();
        assert_eq!(
            first.sources().unwrap().iter().copied().collect::<Vec<_>>(),
            vec![Ipv4Addr::new(10, 0, 0, 1)]
        );
    }

    #[test]
    fn test_decode_packet_detects_family() {
        let mut packet = igmp_packet(v3_query_bytes(2, 125, &[]));
        let decoded = decode_packet(
            packet.to_bytes().unwrap(),
            &TransformConfig::default(),
            &Logger::discard(),
        )
        .unwrap();
        assert!(matches!(decoded, DecodedMessage::IgmpQuery(_)));

        let report = MembershipReport::from_records([GroupMembershipRecord::new(
            RecordType::ModeIsExclude,
            "ff3e::1".parse::<Ipv6Addr>().unwrap(),
            [],
        )]);
        let mut packet = MldReportTransform::default().transform(&report).unwrap();
        let decoded = decode_packet(
            packet.to_bytes().unwrap(),
            &TransformConfig::default(),
            &Logger::discard(),
        )
        .unwrap();
        assert_eq!(decoded, DecodedMessage::MldReport(report));
    }

    #[test]
    fn test_decode_packet_rejects_unknown_version() {
        let err = decode_packet(
            Bytes::from_static(&[0x50; 20]),
            &TransformConfig::default(),
            &Logger::discard(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::WrongIpVersion {
                expected: 4,
                actual: 5
            }
        );
        assert!(decode_packet(Bytes::new(), &TransformConfig::default(), &Logger::discard()).is_err());
    }
}
