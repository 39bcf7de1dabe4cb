// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging macros for convenient logging
//
// Every macro also accepts a format string with arguments; the message is
// only formatted when the level is enabled for the facility.

/// Log a message with error severity
///
/// # Examples
/// ```ignore
/// log_error!(logger, Facility::Transform, "Failed to encode report");
/// ```
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.error($facility, $msg)
    };
    ($logger:expr, $facility:expr, $fmt:expr, $($arg:tt)+) => {
        if $logger.enabled($crate::logging::Severity::Error, $facility) {
            $logger.error($facility, &format!($fmt, $($arg)+))
        }
    };
}

/// Log a message with warning severity
///
/// # Examples
/// ```ignore
/// log_warning!(logger, Facility::Transform, "Dropping packet: {}", err);
/// ```
#[macro_export]
macro_rules! log_warning {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.warning($facility, $msg)
    };
    ($logger:expr, $facility:expr, $fmt:expr, $($arg:tt)+) => {
        if $logger.enabled($crate::logging::Severity::Warning, $facility) {
            $logger.warning($facility, &format!($fmt, $($arg)+))
        }
    };
}

/// Log a message with notice severity
///
/// # Examples
/// ```ignore
/// log_notice!(logger, Facility::Filter, "Refused join: already joined");
/// ```
#[macro_export]
macro_rules! log_notice {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.notice($facility, $msg)
    };
    ($logger:expr, $facility:expr, $fmt:expr, $($arg:tt)+) => {
        if $logger.enabled($crate::logging::Severity::Notice, $facility) {
            $logger.notice($facility, &format!($fmt, $($arg)+))
        }
    };
}

/// Log a message with info severity
///
/// # Examples
/// ```ignore
/// log_info!(logger, Facility::Config, "Configuration loaded");
/// ```
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.info($facility, $msg)
    };
    ($logger:expr, $facility:expr, $fmt:expr, $($arg:tt)+) => {
        if $logger.enabled($crate::logging::Severity::Info, $facility) {
            $logger.info($facility, &format!($fmt, $($arg)+))
        }
    };
}

/// Log a message with debug severity
///
/// # Examples
/// ```ignore
/// log_debug!(logger, Facility::Codec, "Parsed {} byte header", len);
/// ```
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.debug($facility, $msg)
    };
    ($logger:expr, $facility:expr, $fmt:expr, $($arg:tt)+) => {
        if $logger.enabled($crate::logging::Severity::Debug, $facility) {
            $logger.debug($facility, &format!($fmt, $($arg)+))
        }
    };
}

/// Log a message with key-value pairs
///
/// # Examples
/// ```ignore
/// log_kv!(logger, Severity::Info, Facility::Membership, "Group joined",
///         "group" => "239.1.1.1");
/// ```
#[macro_export]
macro_rules! log_kv {
    ($logger:expr, $severity:expr, $facility:expr, $msg:expr, $($key:expr => $value:expr),+) => {{
        let kvs: &[(&str, &str)] = &[$(($key, $value)),+];
        $logger.log_kv($severity, $facility, $msg, kvs)
    }};
}
