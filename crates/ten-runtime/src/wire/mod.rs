//! Wire listener and outbound hub (spec §4.1 "wire layer", §6 "Wire
//! protocol"). The App binds one `msgpack://host:port/` listener; inbound
//! frames are decoded and handed to `App::handle_app_cmd`/`App::route`.
//! Outbound traffic comes from an Engine's `to_wire` crossbeam sender
//! (Engines run on plain OS threads, not the tokio runtime) and is bridged
//! onto async TCP connections cached per destination `app_uri`.

mod codec;

pub use codec::{decode_frame, encode_frame, read_frame, write_frame};

use crate::app::App;
use crate::error::{Result, TenError};
use crate::message::{builtin_cmd, Message};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};

/// Parses the host:port out of a `msgpack://host:port/` app uri.
fn addr_of(app_uri: &str) -> Result<String> {
    app_uri
        .strip_prefix("msgpack://")
        .map(|rest| rest.trim_end_matches('/').to_string())
        .ok_or_else(|| TenError::Configuration(format!("app uri '{app_uri}' is not a msgpack:// uri")))
}

/// Binds `app.app_uri`'s listener and serves inbound connections until the
/// app's shutdown notification fires. Each connection is read in its own
/// task; every frame is either dispatched as an app-level command (the
/// three builtins) or forwarded into the owning Engine via `App::route`.
pub async fn serve(app: Arc<App>) -> Result<()> {
    let addr = addr_of(&app.app_uri)?;
    let listener = TcpListener::bind(&addr).await.map_err(TenError::Io)?;
    tracing::info!(target: "ten:runtime", %addr, "wire listener bound");

    let shutdown = app.shutdown_handle();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted.map_err(TenError::Io)?;
                let app = app.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(app, stream).await {
                        tracing::warn!(target: "ten:runtime", %peer, error = %e, "wire connection closed with error");
                    }
                });
            }
            _ = shutdown.notified() => {
                tracing::info!(target: "ten:runtime", "wire listener shutting down");
                return Ok(());
            }
        }
    }
}

async fn serve_connection(app: Arc<App>, stream: TcpStream) -> Result<()> {
    stream.set_nodelay(true).ok();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let message = match read_frame(&mut reader).await? {
            Some(m) => m,
            None => return Ok(()),
        };

        let is_app_cmd = matches!(
            &message,
            Message::Cmd(cmd) if matches!(cmd.envelope.name.as_str(), builtin_cmd::START_GRAPH | builtin_cmd::STOP_GRAPH | builtin_cmd::CLOSE_APP)
        );

        if is_app_cmd {
            let Message::Cmd(cmd) = message else { unreachable!() };
            let app = app.clone();
            let result = tokio::task::spawn_blocking(move || app.handle_app_cmd(cmd)).await.map_err(|e| TenError::Other(anyhow::anyhow!(e)))?;
            write_frame(&mut write_half, &Message::CmdResult(result)).await?;
        } else if let Err(e) = app.route(message) {
            tracing::debug!(target: "ten:runtime", error = %e, "dropping inbound frame with no local route");
        }
    }
}

/// Caches one outbound connection per destination `app_uri` and pumps
/// messages handed to it by an Engine's crossbeam sender onto the matching
/// async TCP stream.
pub struct WireHub {
    connections: Mutex<HashMap<String, mpsc::UnboundedSender<Message>>>,
}

impl WireHub {
    /// Spawns the bridge thread and returns the hub plus the crossbeam
    /// sender Engines should be given as their `to_wire` channel.
    pub fn spawn(rt: tokio::runtime::Handle) -> (Arc<WireHub>, crossbeam_channel::Sender<Message>) {
        let hub = Arc::new(WireHub { connections: Mutex::new(HashMap::new()) });
        let (tx, rx) = crossbeam_channel::unbounded::<Message>();
        let bridge_hub = hub.clone();
        std::thread::spawn(move || {
            while let Ok(message) = rx.recv() {
                let hub = bridge_hub.clone();
                rt.spawn(async move { hub.dispatch(message).await });
            }
        });
        (hub, tx)
    }

    async fn dispatch(&self, message: Message) {
        let Some(dest) = message.dests().first() else { return };
        let dest_uri = dest.app_uri.clone();
        if dest_uri.is_empty() {
            tracing::warn!(target: "ten:runtime", "wire hub asked to route a message with no destination app_uri");
            return;
        }
        match self.sender_for(&dest_uri).await {
            Ok(sender) => {
                if sender.send(message).is_err() {
                    self.connections.lock().await.remove(&dest_uri);
                }
            }
            Err(e) => tracing::warn!(target: "ten:runtime", %dest_uri, error = %e, "failed to reach remote app"),
        }
    }

    async fn sender_for(&self, dest_uri: &str) -> Result<mpsc::UnboundedSender<Message>> {
        let mut connections = self.connections.lock().await;
        if let Some(sender) = connections.get(dest_uri) {
            return Ok(sender.clone());
        }
        let addr = addr_of(dest_uri)?;
        let stream = TcpStream::connect(&addr).await.map_err(TenError::Io)?;
        let sender = connection_writer(stream);
        connections.insert(dest_uri.to_string(), sender.clone());
        Ok(sender)
    }
}

/// Spawns the task that owns a connection's write half and pumps messages
/// handed to the returned sender onto it, one `write_frame` at a time.
fn connection_writer(stream: TcpStream) -> mpsc::UnboundedSender<Message> {
    let (_read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if write_frame(&mut write_half, &message).await.is_err() {
                break;
            }
        }
        write_half.flush().await.ok();
    });
    tx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_of_strips_scheme_and_trailing_slash() {
        assert_eq!(addr_of("msgpack://127.0.0.1:8000/").unwrap(), "127.0.0.1:8000");
    }

    #[test]
    fn addr_of_rejects_non_msgpack_uri() {
        assert!(addr_of("http://127.0.0.1:8000/").is_err());
    }
}
