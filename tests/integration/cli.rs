// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Integration Test for the amt-membership binary.

use anyhow::Result;
use std::io::Write;
use std::process::Command;

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_amt-membership"))
}

#[test]
fn test_encode_then_decode_report() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"{{
            family: "ipv4",
            records: [
                {{ recordType: "ALLOW_NEW_SOURCES", group: "239.1.1.1", sources: ["10.0.0.1", "10.0.0.2"] }},
            ],
        }}"#
    )?;

    let output = binary().arg("encode-report").arg(file.path()).output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let hex = String::from_utf8(output.stdout)?;

    let output = binary().arg("decode").arg(hex.trim()).output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let decoded: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let record = &decoded["igmpReport"]["records"][0];
    assert_eq!(record["recordType"], "ALLOW_NEW_SOURCES");
    assert_eq!(record["group"], "239.1.1.1");
    assert_eq!(record["sources"], serde_json::json!(["10.0.0.1", "10.0.0.2"]));
    Ok(())
}

#[test]
fn test_decode_rejects_garbage() -> Result<()> {
    let output = binary().arg("decode").arg("not-hex").output()?;
    assert!(!output.status.success());

    let output = binary().arg("decode").arg("4500").output()?;
    assert!(!output.status.success());
    Ok(())
}

#[test]
fn test_check_config() -> Result<()> {
    let mut good = tempfile::NamedTempFile::new()?;
    write!(good, "{{ membership: {{ robustness: 3 }}, transform: {{ source_copy: 'first_only' }} }}")?;
    let output = binary().arg("check-config").arg(good.path()).output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let mut bad = tempfile::NamedTempFile::new()?;
    write!(bad, "{{ membership: {{ robustness: 9 }} }}")?;
    let output = binary().arg("check-config").arg(bad.path()).output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("membership.robustness"));
    Ok(())
}
