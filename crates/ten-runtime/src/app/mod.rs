//! App (spec §4.1): process-wide root. Loads configuration, owns the addon
//! registry and structured logger, creates one Engine per accepted
//! `StartGraph`, and exposes the wire listener (`crate::wire`).

mod config;

pub use config::{AppConfig, PackageMetadata, ProjectManifest};

use crate::addon::AddonRegistry;
use crate::engine::{self, EngineClosed, EngineHandle, StartOutcome};
use crate::error::{ErrorCode, Result, TenError};
use crate::graph;
use crate::log::Logger;
use crate::message::{builtin_cmd, Cmd, CmdResult, Envelope, Message};
use crate::value::Value;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

/// Diagnostic-only process-wide list of live app URIs (spec §4.1 `g_apps`;
/// §9 "replace global mutable state with a typed registry behind a
/// mutex"). Never read by routing logic — `App` holds its own state.
fn g_apps() -> &'static Mutex<HashSet<String>> {
    static REGISTRY: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

pub fn live_app_uris() -> Vec<String> {
    g_apps().lock().iter().cloned().collect()
}

pub struct App {
    pub app_uri: String,
    pub base_dir: String,
    pub addon_registry: Arc<AddonRegistry>,
    pub logger: Arc<Logger>,
    engines: Mutex<HashMap<String, Arc<EngineHandle>>>,
    to_wire: Mutex<Option<Sender<Message>>>,
    shutdown: Arc<tokio::sync::Notify>,
}

impl App {
    /// Parses the embedded `ten` config object (spec §4.1 `configure`).
    pub fn configure(property_json: &str) -> Result<AppConfig> {
        AppConfig::parse(property_json)
    }

    /// Builds a new App from a parsed config and a pre-seeded addon
    /// registry. Registers the app's `uri` in the diagnostic `g_apps`
    /// list (spec invariant: "Apps are added on construction and removed
    /// on destruction").
    pub fn new(config: AppConfig, addon_registry: Arc<AddonRegistry>, base_dir: impl Into<String>) -> Result<Arc<App>> {
        let logger = Arc::new(Logger::from_config(&config.log)?);
        g_apps().lock().insert(config.uri.clone());
        Ok(Arc::new(App {
            app_uri: config.uri,
            base_dir: base_dir.into(),
            addon_registry,
            logger,
            engines: Mutex::new(HashMap::new()),
            to_wire: Mutex::new(None),
            shutdown: Arc::new(tokio::sync::Notify::new()),
        }))
    }

    pub fn set_wire_sender(&self, sender: Sender<Message>) {
        *self.to_wire.lock() = Some(sender);
    }

    /// Starts every `predefined_graphs` entry from config, in order,
    /// failing fast on the first rejection.
    pub fn start_predefined_graphs(self: &Arc<Self>, config: &AppConfig) -> Result<()> {
        for predefined in &config.predefined_graphs {
            let mut cmd = Cmd::new(builtin_cmd::START_GRAPH, crate::loc::Loc::local(""), vec![crate::loc::Loc::local("")]);
            cmd.envelope.property = predefined.as_start_graph_property();
            let result = self.start_graph(cmd);
            if !result.status_code.is_ok() {
                return Err(TenError::Configuration(format!(
                    "predefined graph '{}' failed to start: {}",
                    predefined.graph_name, result.detail
                )));
            }
        }
        Ok(())
    }

    /// Accepts a `StartGraph` command for a not-yet-existing graph,
    /// builds and validates the graph, and drives the Start sequence
    /// (spec §4.2). Blocks the caller until the Engine reports its
    /// outcome — Start is asynchronous with respect to the engine thread,
    /// but synchronous from the App's point of view.
    pub fn start_graph(self: &Arc<Self>, cmd: Cmd) -> CmdResult {
        let graph_id = crate::util::next_graph_id();
        let parsed = match graph::build_graph(&self.app_uri, &graph_id, &cmd.envelope.property) {
            Ok(p) => p,
            Err(e) => return make_result(&cmd, e.code(), Value::String(e.to_string())),
        };
        if let Err(e) = graph::validate_graph(&parsed.graph) {
            return make_result(&cmd, ErrorCode::Generic, Value::String(e.to_string()));
        }

        let (outcome_tx, outcome_rx) = crossbeam_channel::bounded(1);
        let (closed_tx, closed_rx) = crossbeam_channel::unbounded();
        let to_wire = self.to_wire.lock().clone();

        let handle = engine::spawn(
            graph_id.clone(),
            parsed.graph_name,
            self.app_uri.clone(),
            self.base_dir.clone(),
            parsed.graph,
            self.addon_registry.clone(),
            self.logger.clone(),
            to_wire,
            Arc::downgrade(self),
            outcome_tx,
            closed_tx,
        );

        match outcome_rx.recv() {
            Ok(StartOutcome::Running) => {
                self.engines.lock().insert(graph_id.clone(), handle.clone());
                self.reap_on_close(graph_id.clone(), closed_rx);
                make_result(&cmd, ErrorCode::Ok, Value::String(graph_id))
            }
            Ok(StartOutcome::Failed { code, detail }) => {
                handle.close();
                handle.join();
                make_result(&cmd, code, Value::String(detail))
            }
            Err(_) => make_result(&cmd, ErrorCode::Generic, Value::String("engine start channel closed".into())),
        }
    }

    /// Spawns a small reaper thread that removes the engine from the live
    /// table once its Close sequence finishes (spec §4.2 terminal step),
    /// keeping `self.engines` from accumulating closed entries.
    fn reap_on_close(self: &Arc<Self>, graph_id: String, closed_rx: crossbeam_channel::Receiver<EngineClosed>) {
        let app = self.clone();
        std::thread::spawn(move || {
            if closed_rx.recv().is_ok() {
                app.engines.lock().remove(&graph_id);
            }
        });
    }

    /// `StopGraph`: closes one graph's Engine by id without touching the
    /// rest of the App.
    pub fn stop_graph(&self, graph_id: &str) -> bool {
        if let Some(handle) = self.engines.lock().get(graph_id).cloned() {
            handle.close();
            handle.join();
            true
        } else {
            false
        }
    }

    /// `CloseApp`: closes every live Engine, then wakes `run()`.
    pub fn close_app(&self) {
        let handles: Vec<_> = self.engines.lock().values().cloned().collect();
        for handle in &handles {
            handle.close();
        }
        for handle in &handles {
            handle.join();
        }
        self.shutdown.notify_waiters();
    }

    /// Routes an already-addressed message to the Engine owning its
    /// destination graph id. Used by the wire layer for inbound frames
    /// and by tests driving an engine directly.
    pub fn route(&self, message: Message) -> Result<()> {
        let graph_id = message.dests().first().map(|d| d.graph_id.clone()).unwrap_or_default();
        let engines = self.engines.lock();
        let handle = engines
            .get(&graph_id)
            .ok_or_else(|| TenError::NotConnected(format!("no engine for graph '{graph_id}'")))?;
        handle.route(message);
        Ok(())
    }

    pub fn engine(&self, graph_id: &str) -> Option<Arc<EngineHandle>> {
        self.engines.lock().get(graph_id).cloned()
    }

    /// Dispatches a command addressed at this App itself rather than at a
    /// graph — the three built-in commands `StartGraph`/`StopGraph`/
    /// `CloseApp` (spec §3, §4.6).
    pub fn handle_app_cmd(self: &Arc<Self>, cmd: Cmd) -> CmdResult {
        match cmd.envelope.name.as_str() {
            builtin_cmd::START_GRAPH => self.start_graph(cmd),
            builtin_cmd::STOP_GRAPH => {
                let graph_id = cmd.envelope.property.get_path("graph_id").and_then(Value::as_str).unwrap_or_default();
                let found = self.stop_graph(graph_id);
                if found {
                    make_result(&cmd, ErrorCode::Ok, Value::Null)
                } else {
                    make_result(&cmd, ErrorCode::InvalidArgument, Value::String(format!("no such graph '{graph_id}'")))
                }
            }
            builtin_cmd::CLOSE_APP => {
                self.close_app();
                make_result(&cmd, ErrorCode::Ok, Value::Null)
            }
            other => make_result(&cmd, ErrorCode::InvalidArgument, Value::String(format!("unknown app command '{other}'"))),
        }
    }

    /// Blocks until `close_app()` is called (directly, or via a `CloseApp`
    /// command), returning the process exit status (spec §4.1 `run`, §6
    /// CLI surface: `0` on clean shutdown).
    pub async fn run(self: &Arc<Self>) -> i32 {
        self.shutdown.notified().await;
        0
    }

    pub fn shutdown_handle(&self) -> Arc<tokio::sync::Notify> {
        self.shutdown.clone()
    }
}

impl Drop for App {
    fn drop(&mut self) {
        g_apps().lock().remove(&self.app_uri);
    }
}

fn make_result(cmd: &Cmd, status_code: ErrorCode, detail: Value) -> CmdResult {
    CmdResult {
        envelope: Envelope::new(cmd.envelope.name.clone(), cmd.envelope.dests[0].clone(), vec![cmd.envelope.src.clone()]),
        correlation_id: cmd.correlation_id,
        status_code,
        detail,
        is_final: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loc::Loc;

    fn test_app() -> Arc<App> {
        let config = AppConfig::parse(r#"{"uri":"msgpack://127.0.0.1:9000/"}"#).unwrap();
        App::new(config, Arc::new(AddonRegistry::new()), "/tmp").unwrap()
    }

    #[test]
    fn app_uri_registered_and_removed_from_g_apps() {
        let app = test_app();
        assert!(live_app_uris().contains(&app.app_uri));
        let uri = app.app_uri.clone();
        drop(app);
        assert!(!live_app_uris().contains(&uri));
    }

    #[test]
    fn start_graph_with_empty_nodes_succeeds_immediately() {
        let app = test_app();
        let mut cmd = Cmd::new(builtin_cmd::START_GRAPH, Loc::local(""), vec![Loc::local("")]);
        cmd.envelope.property = {
            let mut m = crate::value::ValueMap::new();
            m.insert("nodes".into(), Value::Array(vec![]));
            Value::Map(m)
        };
        let result = app.start_graph(cmd);
        assert!(result.status_code.is_ok());
    }

    #[test]
    fn start_graph_with_missing_addon_reports_generic_with_name() {
        let app = test_app();
        let mut cmd = Cmd::new(builtin_cmd::START_GRAPH, Loc::local(""), vec![Loc::local("")]);
        cmd.envelope.property = {
            let mut node = crate::value::ValueMap::new();
            node.insert("type".into(), Value::String("extension_group".into()));
            node.insert("name".into(), Value::String("g1".into()));
            node.insert("addon".into(), Value::String("does_not_exist".into()));
            let mut m = crate::value::ValueMap::new();
            m.insert("nodes".into(), Value::Array(vec![Value::Map(node)]));
            Value::Map(m)
        };
        let result = app.start_graph(cmd);
        assert_eq!(result.status_code, ErrorCode::Generic);
        assert!(result.detail.to_string().contains("does_not_exist"));
    }

    #[test]
    fn close_app_closes_engines_and_wakes_run() {
        let app = test_app();
        let mut cmd = Cmd::new(builtin_cmd::START_GRAPH, Loc::local(""), vec![Loc::local("")]);
        cmd.envelope.property = {
            let mut m = crate::value::ValueMap::new();
            m.insert("nodes".into(), Value::Array(vec![]));
            Value::Map(m)
        };
        app.start_graph(cmd);

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let app2 = app.clone();
            let run_task = tokio::spawn(async move { app2.run().await });
            app.close_app();
            let status = run_task.await.unwrap();
            assert_eq!(status, 0);
        });
    }
}
