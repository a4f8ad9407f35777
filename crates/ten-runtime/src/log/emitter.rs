use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterKind {
    Console,
    File,
    Network,
}

#[derive(Debug, Clone, Default)]
pub struct EmitterConfig {
    pub kind: Option<EmitterKind>,
    /// Console: "stdout" (default) or "stderr".
    pub stream: Option<String>,
    /// File: path on disk. Never rotated by the core (spec §6).
    pub path: Option<PathBuf>,
    /// Network: "host:port" address.
    pub address: Option<String>,
}

impl EmitterConfig {
    pub fn console(stream: impl Into<String>) -> Self {
        EmitterConfig { kind: Some(EmitterKind::Console), stream: Some(stream.into()), ..Default::default() }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        EmitterConfig { kind: Some(EmitterKind::File), path: Some(path.into()), ..Default::default() }
    }

    pub fn network(address: impl Into<String>) -> Self {
        EmitterConfig { kind: Some(EmitterKind::Network), address: Some(address.into()), ..Default::default() }
    }
}

/// Process-wide registry of open file sinks, keyed by absolute path, so
/// multiple handlers sharing a `path` write through the same underlying
/// file handle with writes serialized (spec §4.5 / §9 open question (b)).
fn file_sinks() -> &'static Mutex<HashMap<PathBuf, Arc<Mutex<File>>>> {
    static SINKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<File>>>>> = OnceLock::new();
    SINKS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn open_file_sink(path: &Path) -> std::io::Result<Arc<Mutex<File>>> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut registry = file_sinks().lock();
    if let Some(existing) = registry.get(&abs) {
        return Ok(existing.clone());
    }
    if let Some(parent) = abs.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&abs)?;
    let sink = Arc::new(Mutex::new(file));
    registry.insert(abs, sink.clone());
    Ok(sink)
}

enum Sink {
    Stdout,
    Stderr,
    File(Arc<Mutex<File>>),
    Network(Mutex<Option<TcpStream>>, String),
}

pub struct Emitter {
    sink: Sink,
}

impl Emitter {
    pub fn new(config: &EmitterConfig) -> crate::error::Result<Self> {
        let sink = match config.kind.unwrap_or(EmitterKind::Console) {
            EmitterKind::Console => match config.stream.as_deref() {
                Some("stderr") => Sink::Stderr,
                _ => Sink::Stdout,
            },
            EmitterKind::File => {
                let path = config
                    .path
                    .as_ref()
                    .ok_or_else(|| crate::error::TenError::Configuration("file emitter requires path".into()))?;
                Sink::File(open_file_sink(path)?)
            }
            EmitterKind::Network => {
                let addr = config
                    .address
                    .clone()
                    .ok_or_else(|| crate::error::TenError::Configuration("network emitter requires address".into()))?;
                Sink::Network(Mutex::new(None), addr)
            }
        };
        Ok(Emitter { sink })
    }

    /// Writes one already-formatted line (no trailing newline) to the sink.
    pub fn emit(&self, line: &str) {
        match &self.sink {
            Sink::Stdout => {
                println!("{line}");
            }
            Sink::Stderr => {
                eprintln!("{line}");
            }
            Sink::File(file) => {
                let mut f = file.lock();
                let _ = writeln!(f, "{line}");
            }
            Sink::Network(conn, addr) => {
                let mut guard = conn.lock();
                if guard.is_none() {
                    *guard = TcpStream::connect(addr).ok();
                }
                if let Some(stream) = guard.as_mut() {
                    if writeln!(stream, "{line}").is_err() {
                        tracing::warn!(target: "ten:runtime", address = %addr, "log network emitter write failed, dropping connection");
                        *guard = None;
                    }
                } else {
                    tracing::warn!(target: "ten:runtime", address = %addr, "log network emitter could not connect");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_handlers_sharing_a_path_write_through_the_same_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.log");

        let e1 = Emitter::new(&EmitterConfig::file(&path)).unwrap();
        let e2 = Emitter::new(&EmitterConfig::file(&path)).unwrap();
        e1.emit("line one");
        e2.emit("line two");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("line one"));
        assert!(contents.contains("line two"));
    }
}
