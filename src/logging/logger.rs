// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logger handles, backends and the per-facility registry

use super::entry::LogEntry;
use super::{Facility, Severity};
use crossbeam_queue::ArrayQueue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

type FacilityLevels = Arc<RwLock<HashMap<Facility, Severity>>>;

/// Destination for log entries that passed level filtering
pub trait LogBackend: Send + Sync {
    fn write(&self, entry: LogEntry);
}

/// Bounded in-memory buffer; the oldest entry is dropped when full
pub struct MemoryBuffer {
    queue: ArrayQueue<LogEntry>,
    overruns: AtomicU64,
}

impl MemoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            overruns: AtomicU64::new(0),
        }
    }

    /// Pop the oldest buffered entry
    pub fn read(&self) -> Option<LogEntry> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of entries lost to overwrites
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}

impl LogBackend for MemoryBuffer {
    fn write(&self, entry: LogEntry) {
        if self.queue.force_push(entry).is_some() {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Simple stderr JSON logger (no buffering, direct output)
pub struct StderrJsonLogger;

impl StderrJsonLogger {
    /// The JSON line written for `entry`
    pub fn render(entry: &LogEntry) -> serde_json::Value {
        let kvs: serde_json::Map<String, serde_json::Value> = entry
            .get_kvs()
            .iter()
            .map(|kv| (kv.key.clone(), serde_json::Value::from(kv.value.as_str())))
            .collect();
        serde_json::json!({
            "timestamp": entry.timestamp.to_rfc3339(),
            "level": entry.severity.as_str(),
            "facility": entry.facility.as_str(),
            "message": entry.get_message(),
            "kvs": kvs,
        })
    }
}

impl LogBackend for StderrJsonLogger {
    fn write(&self, entry: LogEntry) {
        eprintln!("{}", Self::render(&entry));
    }
}

/// Backend that drops everything
pub struct DiscardLogger;

impl LogBackend for DiscardLogger {
    fn write(&self, _entry: LogEntry) {}
}

/// Logger handle for writing log entries
///
/// Cheap to clone; clones share the backend and the level settings.
pub struct Logger {
    backend: Arc<dyn LogBackend>,
    /// Global minimum log level (default: Info)
    global_min_level: Arc<AtomicU8>,
    /// Per-facility minimum log levels
    facility_min_levels: FacilityLevels,
}

impl Logger {
    /// Create a logger over an arbitrary backend
    pub fn with_backend(backend: Arc<dyn LogBackend>, level: Severity) -> Self {
        Self {
            backend,
            global_min_level: Arc::new(AtomicU8::new(level as u8)),
            facility_min_levels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn shared(
        backend: Arc<dyn LogBackend>,
        global_min_level: Arc<AtomicU8>,
        facility_min_levels: FacilityLevels,
    ) -> Self {
        Self {
            backend,
            global_min_level,
            facility_min_levels,
        }
    }

    /// Create a logger that writes JSON lines to stderr
    pub fn stderr_json(level: Severity) -> Self {
        Self::with_backend(Arc::new(StderrJsonLogger), level)
    }

    /// Create a logger writing into a bounded memory buffer
    pub fn memory(buffer: Arc<MemoryBuffer>, level: Severity) -> Self {
        Self::with_backend(buffer, level)
    }

    /// Create a logger that discards all output
    pub fn discard() -> Self {
        Self::with_backend(Arc::new(DiscardLogger), Severity::Emergency)
    }

    #[inline]
    fn should_log(&self, severity: Severity, facility: Facility) -> bool {
        // Facility-specific level overrides the global one
        let levels = self
            .facility_min_levels
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(&min_level) = levels.get(&facility) {
            return severity <= min_level;
        }
        drop(levels);

        let global_min = self.global_min_level.load(Ordering::Relaxed);
        (severity as u8) <= global_min
    }

    /// Write a log entry
    #[inline]
    pub fn log(&self, severity: Severity, facility: Facility, message: &str) {
        if !self.should_log(severity, facility) {
            return;
        }
        self.backend.write(LogEntry::new(severity, facility, message));
    }

    /// Write a log entry with key-value pairs
    #[inline]
    pub fn log_kv(
        &self,
        severity: Severity,
        facility: Facility,
        message: &str,
        kvs: &[(&str, &str)],
    ) {
        if !self.should_log(severity, facility) {
            return;
        }

        let mut entry = LogEntry::new(severity, facility, message);
        for (key, value) in kvs {
            entry.add_kv(key, value);
        }
        self.backend.write(entry);
    }

    /// Check whether a message at this level would be written
    ///
    /// Lets callers skip building expensive messages.
    #[inline]
    pub fn enabled(&self, severity: Severity, facility: Facility) -> bool {
        self.should_log(severity, facility)
    }

    #[inline]
    pub fn emergency(&self, facility: Facility, message: &str) {
        self.log(Severity::Emergency, facility, message);
    }

    #[inline]
    pub fn alert(&self, facility: Facility, message: &str) {
        self.log(Severity::Alert, facility, message);
    }

    #[inline]
    pub fn critical(&self, facility: Facility, message: &str) {
        self.log(Severity::Critical, facility, message);
    }

    #[inline]
    pub fn error(&self, facility: Facility, message: &str) {
        self.log(Severity::Error, facility, message);
    }

    #[inline]
    pub fn warning(&self, facility: Facility, message: &str) {
        self.log(Severity::Warning, facility, message);
    }

    #[inline]
    pub fn notice(&self, facility: Facility, message: &str) {
        self.log(Severity::Notice, facility, message);
    }

    #[inline]
    pub fn info(&self, facility: Facility, message: &str) {
        self.log(Severity::Info, facility, message);
    }

    #[inline]
    pub fn debug(&self, facility: Facility, message: &str) {
        self.log(Severity::Debug, facility, message);
    }

    /// Set the global minimum log level
    pub fn set_global_level(&self, level: Severity) {
        self.global_min_level.store(level as u8, Ordering::Relaxed);
    }

    /// Set the minimum log level for a specific facility
    pub fn set_facility_level(&self, facility: Facility, level: Severity) {
        self.facility_min_levels
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(facility, level);
    }

    /// Clear the facility-specific log level (fall back to global)
    pub fn clear_facility_level(&self, facility: Facility) {
        self.facility_min_levels
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&facility);
    }
}

impl Clone for Logger {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            global_min_level: Arc::clone(&self.global_min_level),
            facility_min_levels: Arc::clone(&self.facility_min_levels),
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::discard()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field(
                "global_min_level",
                &Severity::from_u8(self.global_min_level.load(Ordering::Relaxed)),
            )
            .finish_non_exhaustive()
    }
}

/// Registry handing out one logger per facility
///
/// All loggers from one registry share the level settings, so a level
/// change through the registry applies everywhere.
pub struct LogRegistry {
    loggers: HashMap<Facility, Logger>,
    global_min_level: Arc<AtomicU8>,
    facility_min_levels: FacilityLevels,
    buffers: Vec<(Facility, Arc<MemoryBuffer>)>,
}

impl LogRegistry {
    /// Registry with one bounded memory buffer per facility
    pub fn new_buffered(level: Severity) -> Self {
        let global_min_level = Arc::new(AtomicU8::new(level as u8));
        let facility_min_levels: FacilityLevels = Arc::new(RwLock::new(HashMap::new()));
        let mut loggers = HashMap::new();
        let mut buffers = Vec::new();

        for facility in Facility::ALL {
            let buffer = Arc::new(MemoryBuffer::new(facility.buffer_size()));
            let logger = Logger::shared(
                Arc::clone(&buffer) as Arc<dyn LogBackend>,
                Arc::clone(&global_min_level),
                Arc::clone(&facility_min_levels),
            );
            loggers.insert(facility, logger);
            buffers.push((facility, buffer));
        }

        Self {
            loggers,
            global_min_level,
            facility_min_levels,
            buffers,
        }
    }

    /// Registry where every facility writes JSON to stderr
    pub fn new_stderr(level: Severity) -> Self {
        let global_min_level = Arc::new(AtomicU8::new(level as u8));
        let facility_min_levels: FacilityLevels = Arc::new(RwLock::new(HashMap::new()));
        let backend: Arc<dyn LogBackend> = Arc::new(StderrJsonLogger);
        let loggers = Facility::ALL
            .iter()
            .map(|facility| {
                (
                    *facility,
                    Logger::shared(
                        Arc::clone(&backend),
                        Arc::clone(&global_min_level),
                        Arc::clone(&facility_min_levels),
                    ),
                )
            })
            .collect();

        Self {
            loggers,
            global_min_level,
            facility_min_levels,
            buffers: Vec::new(),
        }
    }

    pub fn get(&self, facility: Facility) -> Option<&Logger> {
        self.loggers.get(&facility)
    }

    pub fn get_logger(&self, facility: Facility) -> Option<Logger> {
        self.loggers.get(&facility).cloned()
    }

    pub fn set_global_level(&self, level: Severity) {
        self.global_min_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> Severity {
        let level = self.global_min_level.load(Ordering::Relaxed);
        Severity::from_u8(level).unwrap_or(Severity::Info)
    }

    pub fn set_facility_level(&self, facility: Facility, level: Severity) {
        self.facility_min_levels
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(facility, level);
    }

    pub fn clear_facility_level(&self, facility: Facility) {
        self.facility_min_levels
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&facility);
    }

    /// Facility-specific level if set, otherwise the global level
    pub fn get_facility_level(&self, facility: Facility) -> Severity {
        let levels = self
            .facility_min_levels
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        levels
            .get(&facility)
            .copied()
            .unwrap_or_else(|| self.get_global_level())
    }

    /// Memory buffers for a consumer (empty for a stderr registry)
    pub fn export_buffers(&self) -> Vec<(Facility, Arc<MemoryBuffer>)> {
        self.buffers
            .iter()
            .map(|(facility, buffer)| (*facility, Arc::clone(buffer)))
            .collect()
    }
}
