use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::Parser;
use serde::Deserialize;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use amt_membership::logging::{Facility, Logger, Severity};
use amt_membership::transform::{IgmpReportTransform, MldReportTransform};
use amt_membership::{
    decode_packet, log_info, Config, GroupMembershipRecord, IpPacket, MembershipReport, Transform,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON5 configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured log level
    #[arg(long, global = true)]
    log_level: Option<Severity>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug, PartialEq)]
enum Command {
    /// Decode a hex IPv4/IGMP or IPv6/MLD packet and print it as JSON
    Decode {
        hex: String,
        /// Skip IP and message checksum verification
        #[arg(long)]
        no_verify: bool,
    },
    /// Encode a JSON5 report file as a wire packet, printed as hex
    EncodeReport { file: PathBuf },
    /// Load and validate a configuration file
    CheckConfig { file: PathBuf },
}

/// Input of `encode-report`
#[derive(Debug, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
enum ReportFile {
    Ipv4 {
        records: Vec<GroupMembershipRecord<Ipv4Addr>>,
    },
    Ipv6 {
        records: Vec<GroupMembershipRecord<Ipv6Addr>>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let level = args.log_level.unwrap_or(config.logging.level);
    let logger = Logger::stderr_json(level);

    match args.command {
        Command::Decode { hex, no_verify } => {
            let data = hex::decode(hex.trim()).context("packet is not valid hex")?;
            let mut transform_config = config.transform_config();
            if no_verify {
                transform_config.verify_checksums = false;
            }
            let decoded = decode_packet(Bytes::from(data), &transform_config, &logger)?;
            println!("{}", serde_json::to_string_pretty(&decoded)?);
        }
        Command::EncodeReport { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let report: ReportFile = json5::from_str(&content)
                .with_context(|| format!("failed to parse {}", file.display()))?;
            println!("{}", encode_report(report, &config, &logger)?);
        }
        Command::CheckConfig { file } => {
            let checked = load_config(&file)?;
            log_info!(logger, Facility::Cli, "Configuration {} is valid", file.display());
            println!("{}", checked.to_json5());
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_from_file(path)?;
    config.validate()?;
    Ok(config)
}

fn encode_report(report: ReportFile, config: &Config, logger: &Logger) -> Result<String> {
    let bytes = match report {
        ReportFile::Ipv4 { records } => {
            if records.is_empty() {
                bail!("report has no records");
            }
            IgmpReportTransform::new(logger.clone())
                .with_source(config.igmp_source())
                .transform(&MembershipReport::from_records(records))?
                .to_bytes()?
        }
        ReportFile::Ipv6 { records } => {
            if records.is_empty() {
                bail!("report has no records");
            }
            MldReportTransform::new(logger.clone())
                .with_source(config.mld_source())
                .transform(&MembershipReport::from_records(records))?
                .to_bytes()?
        }
    };
    Ok(hex::encode(bytes))
}
