// SPDX-License-Identifier: Apache-2.0 OR MIT
// Log entry structure

use super::{Facility, Severity};
use chrono::{DateTime, Utc};

/// Maximum number of key-value pairs carried by one entry
pub const MAX_KVS: usize = 4;

/// Maximum message length in bytes; longer messages are truncated
pub const MAX_MESSAGE_LEN: usize = 256;

/// Key-value pair for structured logging
#[derive(Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl std::fmt::Debug for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// One log record as handed to a backend
#[derive(Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub facility: Facility,
    message: String,
    kvs: Vec<KeyValue>,
}

impl LogEntry {
    /// Create a new log entry stamped with the current time
    pub fn new(severity: Severity, facility: Facility, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            facility,
            message: truncate(message, MAX_MESSAGE_LEN).to_string(),
            kvs: Vec::new(),
        }
    }

    pub fn get_message(&self) -> &str {
        &self.message
    }

    /// Add a key-value pair (extra pairs beyond MAX_KVS are dropped)
    pub fn add_kv(&mut self, key: &str, value: &str) {
        if self.kvs.len() < MAX_KVS {
            self.kvs.push(KeyValue::new(key, value));
        }
    }

    pub fn get_kvs(&self) -> &[KeyValue] {
        &self.kvs
    }

    /// Render as `[SEVERITY] [Facility] message k=v ...`
    pub fn render(&self) -> String {
        let mut line = format!(
            "[{}] [{}] {}",
            self.severity,
            self.facility.as_str(),
            self.message
        );
        for kv in &self.kvs {
            line.push(' ');
            line.push_str(&format!("{:?}", kv));
        }
        line
    }
}

impl std::fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("LogEntry");
        debug
            .field("severity", &self.severity)
            .field("facility", &self.facility)
            .field("message", &self.message);

        if !self.kvs.is_empty() {
            debug.field("kvs", &self.kvs);
        }

        debug.finish()
    }
}

/// Truncate on a char boundary
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
