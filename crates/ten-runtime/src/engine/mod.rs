//! Engine (spec §4.2): owns one running graph instance and coordinates its
//! extension threads. One Engine per live graph, each its own OS thread —
//! the Engine's "thread inbox" is `EngineInput`; all external access goes
//! through it, matching the Extension Thread's exclusive-mutator model
//! (spec §3 "Thread is the exclusive mutator of everything it owns").

mod context;
mod protocol;

pub use context::ExtensionContext;
pub use protocol::EngineInput;

use crate::addon::{AddonRegistry, DEFAULT_EXTENSION_GROUP};
use crate::app::App;
use crate::error::{ErrorCode, TenError};
use crate::extension_thread::{self, ExtensionSpec};
use crate::graph::Graph;
use crate::loc::Loc;
use crate::log::Logger;
use crate::message::{builtin_cmd, Message};
use crate::ten_env::{Attachment, TenEnv};
use crossbeam_channel::Sender;
use std::sync::{Arc, Weak};

/// Outcome of the Start sequence, reported back to whoever is waiting on
/// the `StartGraph` command (spec §4.2, §4.6).
pub enum StartOutcome {
    Running,
    Failed { code: ErrorCode, detail: String },
}

/// Delivered when the Engine finishes its Close sequence (spec §4.2
/// "Terminal step"), so the App can drop its reference and, if this was
/// the last engine and a `CloseApp` is pending, proceed to shut down.
pub struct EngineClosed {
    pub graph_id: String,
}

pub struct EngineHandle {
    pub graph_id: String,
    pub graph_name: Option<String>,
    inbox: Sender<EngineInput>,
    join: std::sync::Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl EngineHandle {
    pub fn route(&self, message: Message) {
        let _ = self.inbox.send(EngineInput::Inbound { message });
    }

    pub fn close(&self) {
        let _ = self.inbox.send(EngineInput::Close);
    }

    pub fn join(&self) {
        if let Some(h) = self.join.lock().unwrap().take() {
            let _ = h.join();
        }
    }
}

/// Spawns the Engine's OS thread and drives the Start sequence on it. The
/// caller gets the `EngineHandle` back immediately; Start's own outcome
/// (success vs. `AddonNotFound`/etc.) arrives later on `start_outcome_tx`,
/// since Start is asynchronous with respect to the App (spec §4.2: "This is
/// asynchronous: each `done_cb` runs on the engine thread").
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    graph_id: String,
    graph_name: Option<String>,
    app_uri: String,
    app_base_dir: String,
    graph: Graph,
    addon_registry: Arc<AddonRegistry>,
    logger: Arc<Logger>,
    to_wire: Option<Sender<Message>>,
    app: Weak<App>,
    start_outcome_tx: Sender<StartOutcome>,
    on_closed: Sender<EngineClosed>,
) -> Arc<EngineHandle> {
    let (tx, rx) = crossbeam_channel::unbounded::<EngineInput>();
    let handle_graph_id = graph_id.clone();
    let handle_graph_name = graph_name.clone();
    let thread_tx = tx.clone();

    let join = std::thread::Builder::new()
        .name(format!("ten-engine-{graph_id}"))
        .spawn(move || {
            run(
                graph_id,
                graph_name,
                app_uri,
                app_base_dir,
                graph,
                addon_registry,
                logger,
                to_wire,
                app,
                rx,
                thread_tx,
                start_outcome_tx,
                on_closed,
            );
        })
        .expect("failed to spawn engine thread");

    Arc::new(EngineHandle {
        graph_id: handle_graph_id,
        graph_name: handle_graph_name,
        inbox: tx,
        join: std::sync::Mutex::new(Some(join)),
    })
}

#[allow(clippy::too_many_arguments)]
fn run(
    graph_id: String,
    graph_name: Option<String>,
    app_uri: String,
    app_base_dir: String,
    graph: Graph,
    addon_registry: Arc<AddonRegistry>,
    logger: Arc<Logger>,
    to_wire: Option<Sender<Message>>,
    app: Weak<App>,
    rx: crossbeam_channel::Receiver<EngineInput>,
    self_tx: Sender<EngineInput>,
    start_outcome_tx: Sender<StartOutcome>,
    on_closed: Sender<EngineClosed>,
) {
    let engine_loc = Loc::new(app_uri.clone(), graph_id.clone(), "");
    let ten_env = TenEnv::new(
        Attachment::Engine,
        engine_loc,
        app_uri.clone(),
        "ten:runtime",
        // The engine has no "outer" engine to route its own messages
        // through; it posts to itself so `ten_env.close()` etc. land back
        // on this same inbox.
        self_tx.clone(),
        crossbeam_channel_adapter(&self_tx),
        logger.clone(),
    );

    let local_groups: Vec<_> = graph.groups_for_app(&app_uri).cloned().collect();

    if local_groups.is_empty() {
        // Empty graph is legal (spec §4.2 step 2) — install the (possibly
        // empty) info lists and go straight to Running.
        let mut ctx = ExtensionContext::new(graph);
        let _ = start_outcome_tx.send(StartOutcome::Running);
        tracing::info!(target: "ten:runtime", app_base_dir = %app_base_dir, %app_uri, graph_name = ?graph_name, %graph_id, "[graph resources]");
        dispatch_loop(&mut ctx, &app_uri, &rx, to_wire.as_ref(), &self_tx, &app);
        let _ = on_closed.send(EngineClosed { graph_id });
        return;
    }

    let mut ctx = ExtensionContext::new(graph);
    for group in &local_groups {
        let handler = match addon_registry.create_extension_group(&group.addon_name, &group.instance_name) {
            Ok(h) => h,
            Err(_) => {
                let _ = start_outcome_tx.send(StartOutcome::Failed {
                    code: ErrorCode::Generic,
                    detail: format!("Unable to find {}", group.addon_name),
                });
                return;
            }
        };

        let extension_specs: Vec<ExtensionSpec> = if group.addon_name == DEFAULT_EXTENSION_GROUP {
            ctx.graph
                .extensions_in_group(&graph_id, &group.instance_name)
                .map(|e| ExtensionSpec {
                    addon_name: e.addon_name.clone(),
                    instance_name: e.loc.extension_name.clone(),
                    property: e.properties.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        match extension_thread::spawn(
            group.instance_name.clone(),
            handler,
            app_uri.clone(),
            graph_id.clone(),
            extension_specs,
            addon_registry.clone(),
            self_tx.clone(),
            logger.clone(),
        ) {
            Ok(thread_handle) => ctx.insert_thread(thread_handle),
            Err(TenError::AddonNotFound(name)) => {
                for (_, handle) in ctx.extension_threads.drain() {
                    handle.request_close();
                }
                let _ = start_outcome_tx.send(StartOutcome::Failed {
                    code: ErrorCode::Generic,
                    detail: format!("Unable to find {name}"),
                });
                return;
            }
            Err(e) => {
                let _ = start_outcome_tx.send(StartOutcome::Failed { code: ErrorCode::Generic, detail: e.to_string() });
                return;
            }
        }
    }

    tracing::info!(target: "ten:runtime", app_base_dir = %app_base_dir, %app_uri, graph_name = ?graph_name, %graph_id, "[graph resources]");
    let _ = start_outcome_tx.send(StartOutcome::Running);

    dispatch_loop(&mut ctx, &app_uri, &rx, to_wire.as_ref(), &self_tx, &app);

    drop(ten_env);
    let _ = on_closed.send(EngineClosed { graph_id });
}

/// Engine's `ten_env` never needs its own `ThreadEvent` channel (it has no
/// extension-thread-style dispatch loop of its own), but `TenEnv::new`
/// still wants one to post lifecycle-advance/close signals to. Wiring it
/// to a throwaway channel that nobody reads would silently drop `close()`;
/// since `EngineInput` and `ThreadEvent` are structurally incompatible,
/// route through a tiny bridge thread instead is unnecessary complexity —
/// the engine closes via `EngineHandle::close`, not `ten_env.close()`, so
/// an unread sink channel is the correct, documented no-op here.
fn crossbeam_channel_adapter(_self_tx: &Sender<EngineInput>) -> Sender<crate::extension_thread::ThreadEvent> {
    let (tx, _rx) = crossbeam_channel::unbounded();
    tx
}

fn dispatch_loop(
    ctx: &mut ExtensionContext,
    app_uri: &str,
    rx: &crossbeam_channel::Receiver<EngineInput>,
    to_wire: Option<&Sender<Message>>,
    self_tx: &Sender<EngineInput>,
    app: &Weak<App>,
) {
    let mut closing = false;

    while let Ok(input) = rx.recv() {
        match input {
            EngineInput::Outbound { message } | EngineInput::Inbound { message } => {
                route_and_deliver(ctx, app_uri, message, to_wire, self_tx, app);
            }
            EngineInput::ThreadReady { .. } => {
                ctx.ready_count += 1;
            }
            EngineInput::ThreadClosed { group_instance_name } => {
                ctx.extension_threads.remove(&group_instance_name);
                if closing && ctx.note_thread_closed() {
                    break;
                }
            }
            EngineInput::Close => {
                closing = true;
                if ctx.extension_threads.is_empty() {
                    break;
                }
                ctx.closed_count = 0;
                ctx.total_count = ctx.extension_threads.len();
                for handle in ctx.extension_threads.values() {
                    handle.request_close();
                }
            }
        }
    }

    for (_, mut handle) in ctx.extension_threads.drain() {
        handle.join();
    }
}

/// Routes one message to its destination(s) (spec §4.2 "Routing"). Each
/// destination either resolves to a local extension thread (looked up via
/// the graph's extension info, spec §3, and gated by the graph's declared
/// connections when it has any), is handed up to the App itself when it
/// names no extension at all, or, if its `app_uri` names another app, is
/// forwarded to the wire layer. A `Cmd` whose destination can't be
/// resolved locally gets a synthetic `MsgNotConnected` result routed back
/// to its source instead of being silently dropped (spec §7 category 2).
fn route_and_deliver(
    ctx: &mut ExtensionContext,
    app_uri: &str,
    message: Message,
    to_wire: Option<&Sender<Message>>,
    self_tx: &Sender<EngineInput>,
    app: &Weak<App>,
) {
    let dests = message.dests().to_vec();
    if dests.is_empty() {
        tracing::warn!(target: "ten:runtime", "dropping message with zero destinations (spec open question (a): treated as success with zero results)");
        return;
    }

    for dest in dests {
        if !dest.is_local_to(app_uri) {
            if let Some(wire) = to_wire {
                let mut m = message.clone();
                m.envelope_mut().dests = vec![dest];
                let _ = wire.send(m);
            } else {
                tracing::warn!(target: "ten:runtime", %dest, "remote destination but no wire sender configured, dropping");
            }
            continue;
        }

        // A dest naming no extension at all addresses the App itself —
        // the in-process path for the three builtin commands, mirroring
        // what the wire layer already does for inbound frames in
        // `crate::wire::serve_connection`.
        if dest.extension_name.is_empty() {
            if let Message::Cmd(cmd) = &message {
                if matches!(cmd.envelope.name.as_str(), builtin_cmd::START_GRAPH | builtin_cmd::STOP_GRAPH | builtin_cmd::CLOSE_APP) {
                    dispatch_to_app(cmd.clone(), dest, app.clone(), self_tx.clone());
                    continue;
                }
            }
            tracing::debug!(target: "ten:runtime", "dropping message addressed at the app with an unrecognized or non-command name");
            continue;
        }

        let src = message.src().clone();
        let kind = message.kind();
        let name = message.name().to_string();
        let property = message.envelope().property.clone();
        let delivered = if !ctx.graph.connected(&src, &dest, kind, &name, &property) {
            false
        } else {
            let group_instance_name = ctx.graph.extension(&dest).map(|e| e.group_instance_name.clone());
            group_instance_name
                .as_ref()
                .and_then(|g| ctx.extension_threads.get(g))
                .map(|handle| {
                    let mut m = message.clone();
                    m.envelope_mut().dests = vec![dest.clone()];
                    handle.deliver(m);
                })
                .is_some()
        };

        if !delivered {
            if let Message::Cmd(cmd) = &message {
                if let Some(result) = Message::Cmd(cmd.clone()).make_result(ErrorCode::MsgNotConnected, crate::value::Value::String(format!("not connected: {dest}"))) {
                    route_and_deliver(ctx, app_uri, Message::CmdResult(result), to_wire, self_tx, app);
                }
            } else {
                tracing::debug!(target: "ten:runtime", %dest, "message not connected, dropping");
            }
        }
    }
}

/// Runs a builtin app-directed command on its own short-lived thread and
/// posts the resulting `CmdResult` back into this engine's own inbox.
/// `App::handle_app_cmd` (for `CloseApp`) joins every live engine's thread,
/// including this one — calling it straight from the engine's dispatch
/// thread would deadlock the engine waiting to join itself, so the call
/// happens off-thread and the result rejoins the normal dispatch loop.
fn dispatch_to_app(cmd: crate::message::Cmd, dest: Loc, app: Weak<App>, self_tx: Sender<EngineInput>) {
    std::thread::spawn(move || {
        let Some(app) = app.upgrade() else {
            let result = Message::Cmd(cmd).make_result(ErrorCode::TenIsClosed, crate::value::Value::String("app no longer running".into()));
            if let Some(result) = result {
                let _ = self_tx.send(EngineInput::Inbound { message: Message::CmdResult(result) });
            }
            return;
        };
        let mut addressed = cmd;
        addressed.envelope.dests = vec![dest];
        let result = app.handle_app_cmd(addressed);
        let _ = self_tx.send(EngineInput::Inbound { message: Message::CmdResult(result) });
    });
}
