//! The TEN runtime: a graph-oriented dataflow core that hosts extensions
//! and routes typed messages between them, in one process or across a
//! msgpack-over-TCP wire.
//!
//! [`app`] is the process-wide root; it owns the [`addon`] registry and the
//! structured [`log`] subsystem and accepts `StartGraph` commands that spin
//! up an [`engine`]. Each engine owns one running [`graph`] and one
//! [`extension_thread`] per extension group; extensions talk to their host
//! exclusively through [`ten_env`]. [`message`] and [`value`] define what
//! moves through the system; [`loc`] names where it's going; [`wire`] gets
//! it there when "where" is another process.

pub mod addon;
pub mod app;
pub mod engine;
pub mod error;
pub mod extension;
pub mod extension_thread;
pub mod graph;
pub mod loc;
pub mod log;
pub mod message;
pub mod ten_env;
pub mod util;
pub mod value;
pub mod wire;

pub use addon::{AddonKind, AddonRegistry, AddonLoaderFactory, ExtensionFactory, ExtensionGroupFactory};
pub use app::{App, AppConfig};
pub use engine::{EngineClosed, EngineHandle, StartOutcome};
pub use error::{ErrorCode, Result, TenError};
pub use extension::{DefaultExtensionGroupHandler, Extension, ExtensionGroupHandler};
pub use graph::{validate_graph, Graph};
pub use loc::Loc;
pub use log::{LogLevel, Logger, LoggerConfig};
pub use message::{builtin_cmd, Cmd, CmdResult, Message, MessageKind};
pub use ten_env::{Attachment, TenEnv};
pub use value::Value;
