//! Process-internal end-to-end scenarios from spec §8.
//!
//! These drive a real `App` through `StartGraph` with addons registered
//! against live extension threads — no wire transport involved, which
//! matches scenarios 2 and 3 as written (a single process, two extensions).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ten_runtime::{
    builtin_cmd, App, AppConfig, AddonRegistry, Cmd, CmdResult, Extension, ExtensionFactory,
    Loc, Message, TenEnv, Value,
};

fn new_app(registry: AddonRegistry) -> Arc<App> {
    let config = AppConfig::parse(r#"{"uri":"msgpack://127.0.0.1:9100/"}"#).unwrap();
    App::new(config, Arc::new(registry), "/tmp").unwrap()
}

fn start_graph_cmd(nodes: Value) -> Cmd {
    let mut m = ten_runtime::value::ValueMap::new();
    m.insert("nodes".into(), nodes);
    let mut cmd = Cmd::new(builtin_cmd::START_GRAPH, Loc::local(""), vec![Loc::local("")]);
    cmd.envelope.property = Value::Map(m);
    cmd
}

fn extension_node(name: &str, addon: &str) -> Value {
    let mut m = ten_runtime::value::ValueMap::new();
    m.insert("type".into(), Value::String("extension".into()));
    m.insert("name".into(), Value::String(name.into()));
    m.insert("addon".into(), Value::String(addon.into()));
    Value::Map(m)
}

// ---------------------------------------------------------------------
// Scenario 2: single extension round-trip.
// ---------------------------------------------------------------------

/// Replies `OK`/`"hello world, too"` to a `hello_world` cmd (spec §8
/// scenario 2). Lives in its own extension group/thread.
struct HelloWorldExtension;

impl Extension for HelloWorldExtension {
    fn on_cmd(&mut self, ten_env: &TenEnv, cmd: Cmd) {
        if cmd.envelope.name == "hello_world" {
            if let Some(result) =
                Message::Cmd(cmd).make_result(ten_runtime::ErrorCode::Ok, Value::String("hello world, too".into()))
            {
                let _ = ten_env.return_result(result);
            }
        }
    }
}

struct HelloWorldFactory;
impl ExtensionFactory for HelloWorldFactory {
    fn create(&self, _instance_name: &str, _property: &Value) -> Box<dyn Extension> {
        Box::new(HelloWorldExtension)
    }
}

/// Sends `hello_world` to `test_extension` from a background thread on
/// `on_start` (never from the dispatch thread itself — that would hit
/// `DeadlockPrevented`, spec §5) and forwards every `CmdResult` it gets
/// back out over `tx` for the test to observe.
struct ClientExtension {
    tx: crossbeam_channel::Sender<CmdResult>,
    target: String,
    cmd_name: String,
}

impl Extension for ClientExtension {
    fn on_start(&mut self, ten_env: &TenEnv) {
        ten_env.on_start_done();
        let env = ten_env.clone();
        let tx = self.tx.clone();
        let target = self.target.clone();
        let cmd_name = self.cmd_name.clone();
        std::thread::spawn(move || {
            let cmd = Cmd::new(cmd_name, Loc::default(), vec![Loc::local(target)]);
            if let Ok(results) = env.send_cmd_blocking(cmd, Some(5_000)) {
                for r in results {
                    let _ = tx.send(r);
                }
            }
        });
    }
}

struct ClientFactory {
    tx: crossbeam_channel::Sender<CmdResult>,
    target: String,
    cmd_name: String,
}
impl ExtensionFactory for ClientFactory {
    fn create(&self, _instance_name: &str, _property: &Value) -> Box<dyn Extension> {
        Box::new(ClientExtension {
            tx: self.tx.clone(),
            target: self.target.clone(),
            cmd_name: self.cmd_name.clone(),
        })
    }
}

#[test]
fn scenario_2_single_extension_round_trip() {
    let (tx, rx) = crossbeam_channel::unbounded::<CmdResult>();
    let registry = AddonRegistry::new();
    registry.register_extension("hello_world_addon", Arc::new(HelloWorldFactory)).unwrap();
    registry
        .register_extension(
            "client_addon",
            Arc::new(ClientFactory { tx, target: "test_extension".into(), cmd_name: "hello_world".into() }),
        )
        .unwrap();
    let app = new_app(registry);

    let nodes = Value::Array(vec![
        extension_node("test_extension", "hello_world_addon"),
        extension_node("client", "client_addon"),
    ]);
    let result = app.start_graph(start_graph_cmd(nodes));
    assert!(result.status_code.is_ok(), "start_graph failed: {:?}", result.detail);

    let received = rx.recv_timeout(Duration::from_secs(5)).expect("no CmdResult received");
    assert_eq!(received.status_code, ten_runtime::ErrorCode::Ok);
    assert_eq!(received.detail.as_str(), Some("hello world, too"));

    app.close_app();
}

// ---------------------------------------------------------------------
// Scenario 3: two extensions ping-pong a hundred round trips, then
// close the app from inside an extension callback.
// ---------------------------------------------------------------------

const ROUND_TRIPS: usize = 100;

struct Ext1 {
    count: usize,
    deinit_flag: Arc<AtomicBool>,
}

impl Extension for Ext1 {
    fn on_start(&mut self, ten_env: &TenEnv) {
        ten_env.on_start_done();
        let cmd = Cmd::new("test_cmd_from_1", Loc::default(), vec![Loc::local("ext2")]);
        let _ = ten_env.send_cmd(cmd, None);
    }

    fn on_cmd(&mut self, ten_env: &TenEnv, cmd: Cmd) {
        if cmd.envelope.name != "test_cmd_from_2" {
            return;
        }
        if let Some(result) = Message::Cmd(cmd).make_result(ten_runtime::ErrorCode::Ok, Value::Null) {
            let _ = ten_env.return_result(result);
        }
        self.count += 1;
        if self.count < ROUND_TRIPS {
            let next = Cmd::new("test_cmd_from_1", Loc::default(), vec![Loc::local("ext2")]);
            let _ = ten_env.send_cmd(next, None);
        } else {
            let close = Cmd::new(builtin_cmd::CLOSE_APP, Loc::default(), vec![Loc::default()]);
            let _ = ten_env.send_cmd(close, None);
        }
    }

    fn on_deinit(&mut self, ten_env: &TenEnv) {
        self.deinit_flag.store(true, Ordering::SeqCst);
        ten_env.on_deinit_done();
    }
}

struct Ext2 {
    deinit_flag: Arc<AtomicBool>,
}

impl Extension for Ext2 {
    fn on_cmd(&mut self, ten_env: &TenEnv, cmd: Cmd) {
        if cmd.envelope.name != "test_cmd_from_1" {
            return;
        }
        if let Some(result) = Message::Cmd(cmd).make_result(ten_runtime::ErrorCode::Ok, Value::Null) {
            let _ = ten_env.return_result(result);
        }
        let next = Cmd::new("test_cmd_from_2", Loc::default(), vec![Loc::local("ext1")]);
        let _ = ten_env.send_cmd(next, None);
    }

    fn on_deinit(&mut self, ten_env: &TenEnv) {
        self.deinit_flag.store(true, Ordering::SeqCst);
        ten_env.on_deinit_done();
    }
}

struct Ext1Factory {
    deinit_flag: Arc<AtomicBool>,
}
impl ExtensionFactory for Ext1Factory {
    fn create(&self, _instance_name: &str, _property: &Value) -> Box<dyn Extension> {
        Box::new(Ext1 { count: 0, deinit_flag: self.deinit_flag.clone() })
    }
}

struct Ext2Factory {
    deinit_flag: Arc<AtomicBool>,
}
impl ExtensionFactory for Ext2Factory {
    fn create(&self, _instance_name: &str, _property: &Value) -> Box<dyn Extension> {
        Box::new(Ext2 { deinit_flag: self.deinit_flag.clone() })
    }
}

#[test]
fn scenario_3_two_extensions_ping_pong_then_close_app() {
    let ext1_deinit = Arc::new(AtomicBool::new(false));
    let ext2_deinit = Arc::new(AtomicBool::new(false));

    let registry = AddonRegistry::new();
    registry.register_extension("ext1_addon", Arc::new(Ext1Factory { deinit_flag: ext1_deinit.clone() })).unwrap();
    registry.register_extension("ext2_addon", Arc::new(Ext2Factory { deinit_flag: ext2_deinit.clone() })).unwrap();
    let app = new_app(registry);

    let nodes = Value::Array(vec![extension_node("ext1", "ext1_addon"), extension_node("ext2", "ext2_addon")]);
    let result = app.start_graph(start_graph_cmd(nodes));
    assert!(result.status_code.is_ok(), "start_graph failed: {:?}", result.detail);

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let status = rt.block_on(async {
        let app2 = app.clone();
        tokio::time::timeout(Duration::from_secs(10), app2.run()).await.expect("app did not shut down in time")
    });

    assert_eq!(status, 0);
    assert!(ext1_deinit.load(Ordering::SeqCst), "ext1 never ran on_deinit_done");
    assert!(ext2_deinit.load(Ordering::SeqCst), "ext2 never ran on_deinit_done");
}

// ---------------------------------------------------------------------
// Scenario 6: missing addon during Start is reported without taking the
// App down (covered more narrowly in `app::tests`; repeated here against
// the public API surface a caller outside the crate actually sees).
// ---------------------------------------------------------------------

#[test]
fn scenario_6_missing_addon_reports_generic_and_app_keeps_running() {
    let app = new_app(AddonRegistry::new());
    let missing_group = {
        let mut m = ten_runtime::value::ValueMap::new();
        m.insert("type".into(), Value::String("extension_group".into()));
        m.insert("name".into(), Value::String("g1".into()));
        m.insert("addon".into(), Value::String("does_not_exist".into()));
        Value::Map(m)
    };
    let result = app.start_graph(start_graph_cmd(Value::Array(vec![missing_group])));
    assert_eq!(result.status_code, ten_runtime::ErrorCode::Generic);
    assert!(result.detail.to_string().contains("does_not_exist"));

    // App still accepts further commands.
    let ok = app.start_graph(start_graph_cmd(Value::Array(vec![])));
    assert!(ok.status_code.is_ok());
    app.close_app();
}
