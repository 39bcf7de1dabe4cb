// Facility/severity logging for the membership translator
//
// Loggers are plain handles passed into the components that log; there is
// no global logger. Backends decide where entries go: stderr JSON lines for
// the CLI, bounded memory buffers drained by a consumer, or nowhere.

mod consumer;
mod entry;
mod facility;
mod logger;
#[macro_use]
mod macros;
mod severity;

// Public exports
pub use consumer::{BufferConsumer, LogSink, StderrSink, StdoutSink};
pub use entry::{KeyValue, LogEntry};
pub use facility::Facility;
pub use logger::{DiscardLogger, LogBackend, LogRegistry, Logger, MemoryBuffer, StderrJsonLogger};
pub use severity::Severity;
