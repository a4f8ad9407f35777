//! Structured logging subsystem (spec §4.5).
//!
//! Multi-sink, matcher-filtered logging used by every other core component
//! through `ten_env.log(...)`. This is distinct from the ambient `tracing`-
//! based developer log the runtime uses for its own internal diagnostics
//! (startup/shutdown, thread lifecycle), which is configured once in
//! `ten-app`'s binary entry point rather than through this subsystem.

mod emitter;
mod event;
mod formatter;
mod glob;
mod handler;
mod logger;
mod matcher;

pub use emitter::{Emitter, EmitterConfig, EmitterKind};
pub use event::{LogEvent, LogLevel};
pub use formatter::{Formatter, FormatterConfig, FormatterKind};
pub use handler::{Handler, HandlerConfig};
pub use logger::{fields, Logger, LoggerConfig};
pub use matcher::{MatchRule, Matcher};
