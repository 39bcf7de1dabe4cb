// Log consumer - drains memory buffers and outputs log entries

use super::entry::LogEntry;
use super::logger::MemoryBuffer;
use super::Facility;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Output sink for log entries
pub trait LogSink: Send {
    /// Write a log entry to the sink
    fn write_entry(&mut self, entry: &LogEntry);

    /// Flush any buffered output
    fn flush(&mut self);
}

/// Standard output sink
pub struct StdoutSink {
    stdout: std::io::Stdout,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            stdout: std::io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for StdoutSink {
    fn write_entry(&mut self, entry: &LogEntry) {
        let _ = writeln!(self.stdout, "{}", entry.render());
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

/// Standard error sink
pub struct StderrSink {
    stderr: std::io::Stderr,
}

impl StderrSink {
    pub fn new() -> Self {
        Self {
            stderr: std::io::stderr(),
        }
    }
}

impl Default for StderrSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for StderrSink {
    fn write_entry(&mut self, entry: &LogEntry) {
        let _ = writeln!(self.stderr, "{}", entry.render());
    }

    fn flush(&mut self) {
        let _ = self.stderr.flush();
    }
}

/// Drains a set of memory buffers into one sink
pub struct BufferConsumer {
    buffers: Vec<(Facility, Arc<MemoryBuffer>)>,
    sink: Box<dyn LogSink>,
    running: Arc<AtomicBool>,
}

impl BufferConsumer {
    pub fn new(buffers: Vec<(Facility, Arc<MemoryBuffer>)>, sink: Box<dyn LogSink>) -> Self {
        Self {
            buffers,
            sink,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Create a consumer that writes to stderr
    pub fn stderr(buffers: Vec<(Facility, Arc<MemoryBuffer>)>) -> Self {
        Self::new(buffers, Box::new(StderrSink::new()))
    }

    /// Get a handle to stop the consumer
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Read everything currently buffered; returns the number of entries written
    pub fn process_once(&mut self) -> usize {
        let mut written = 0;
        for (_facility, buffer) in &self.buffers {
            while let Some(entry) = buffer.read() {
                self.sink.write_entry(&entry);
                written += 1;
            }
        }
        if written > 0 {
            self.sink.flush();
        }
        written
    }

    /// Poll until the stop handle is cleared, then drain what is left
    pub fn run(mut self) {
        while self.running.load(Ordering::Relaxed) {
            if self.process_once() == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        self.process_once();
        self.sink.flush();
    }
}
