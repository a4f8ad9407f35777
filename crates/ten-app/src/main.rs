//! `ten-app`: the process binary that hosts one [`ten_runtime::App`], its
//! engines, and the msgpack-over-TCP wire listener (spec §4.1, §6 "CLI
//! surface of the App binary").
//!
//! CLI surface: `ten-app run [--config PATH]`. Exit codes: `0` on clean
//! shutdown, `2` on config error, `3` on listener error, `1` otherwise.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ten_runtime::{wire, AddonRegistry, App, AppConfig};

#[derive(Parser)]
#[command(name = "ten-app", author, version, about = "TEN runtime process", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse the app config, bring up the addon registry and every
    /// predefined graph, open the wire listener, and block until the app
    /// is closed.
    Run {
        /// Path to the app's property.json (the file whose top-level `ten`
        /// object is this app's configuration, spec §6).
        #[arg(long, value_name = "PATH", default_value = "property.json")]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { config } => run(config),
    }
}

fn run(config_path: PathBuf) -> ExitCode {
    init_ambient_logging();

    let (config, base_dir) = match load_app_config(&config_path) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("config error: {e}");
            return ExitCode::from(2);
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start tokio runtime: {e}");
            return ExitCode::from(1);
        }
    };

    rt.block_on(async_main(config, base_dir))
}

/// The ambient developer log (spec §4.5 note distinguishing it from the
/// structured `ten_env.log` subsystem, which each `App` builds for itself
/// from its own config once parsed). Filterable via `RUST_LOG`.
fn init_ambient_logging() {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Reads `path`, pulls out its top-level `ten` object, and parses it into
/// an [`AppConfig`] (spec §6 "App config (JSON)"). Returns the config plus
/// the directory the config file lives in, used as `app_base_dir` for the
/// `[graph resources]` log line (spec §4.2 step 5).
fn load_app_config(path: &PathBuf) -> anyhow::Result<(AppConfig, String)> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read '{}': {e}", path.display()))?;
    let full: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| anyhow::anyhow!("'{}' is not valid JSON: {e}", path.display()))?;
    let ten_obj = full
        .get("ten")
        .ok_or_else(|| anyhow::anyhow!("'{}' has no top-level 'ten' object", path.display()))?;
    let config = App::configure(&ten_obj.to_string())?;
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());
    Ok((config, base_dir))
}

async fn async_main(config: AppConfig, base_dir: String) -> ExitCode {
    let addon_registry = Arc::new(AddonRegistry::new());
    let app = match App::new(config.clone(), addon_registry, base_dir) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("failed to construct app: {e}");
            return ExitCode::from(1);
        }
    };

    let (_wire_hub, to_wire) = wire::WireHub::spawn(tokio::runtime::Handle::current());
    app.set_wire_sender(to_wire);

    if let Err(e) = app.start_predefined_graphs(&config) {
        eprintln!("failed to start predefined graph: {e}");
        return ExitCode::from(1);
    }

    tracing::info!(target: "ten:runtime", uri = %app.app_uri, "app starting");

    let listener_app = app.clone();
    let mut listener_task = tokio::spawn(async move { wire::serve(listener_app).await });

    let outcome = tokio::select! {
        status = app.run() => Outcome::ShutdownWithStatus(status),
        res = &mut listener_task => Outcome::ListenerExited(res),
    };

    match outcome {
        Outcome::ShutdownWithStatus(status) => {
            tracing::info!(target: "ten:runtime", "app shut down cleanly");
            ExitCode::from(status as u8)
        }
        Outcome::ListenerExited(Ok(Ok(()))) => ExitCode::from(0),
        Outcome::ListenerExited(Ok(Err(e))) => {
            eprintln!("wire listener error: {e}");
            ExitCode::from(3)
        }
        Outcome::ListenerExited(Err(e)) => {
            eprintln!("wire listener task panicked: {e}");
            ExitCode::from(3)
        }
    }
}

enum Outcome {
    ShutdownWithStatus(i32),
    ListenerExited(Result<ten_runtime::error::Result<()>, tokio::task::JoinError>),
}
