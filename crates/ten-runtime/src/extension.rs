//! Extension and extension-group callback contracts (spec §3 "Lifecycles",
//! §4.3 "Extension Thread").
//!
//! Default method bodies call the matching `on_X_done` synchronously, which
//! is correct for extensions that do no asynchronous work in a given phase.
//! An extension overriding e.g. `on_init` to kick off async setup must hold
//! onto its `TenEnv` and call `on_init_done` itself once that work
//! completes — the thread will not advance past `Inited` until it does
//! (spec §3: "the thread refuses to advance until it is called").

use crate::message::{AudioFrame, Cmd, Data, VideoFrame};
use crate::ten_env::TenEnv;

/// A hosted user code unit. One instance lives on exactly one extension
/// thread for its entire life; every method below runs on that thread.
pub trait Extension: Send {
    fn on_configure(&mut self, ten_env: &TenEnv) {
        ten_env.on_configure_done();
    }

    fn on_init(&mut self, ten_env: &TenEnv) {
        ten_env.on_init_done();
    }

    fn on_start(&mut self, ten_env: &TenEnv) {
        ten_env.on_start_done();
    }

    fn on_stop(&mut self, ten_env: &TenEnv) {
        ten_env.on_stop_done();
    }

    fn on_deinit(&mut self, ten_env: &TenEnv) {
        ten_env.on_deinit_done();
    }

    fn on_cmd(&mut self, _ten_env: &TenEnv, _cmd: Cmd) {}
    fn on_data(&mut self, _ten_env: &TenEnv, _data: Data) {}
    fn on_audio_frame(&mut self, _ten_env: &TenEnv, _frame: AudioFrame) {}
    fn on_video_frame(&mut self, _ten_env: &TenEnv, _frame: VideoFrame) {}
}

/// An extension group is primarily a deployment/scheduling unit (spec §3):
/// it owns N extensions on one thread. Most group addons (in particular the
/// built-in `default_extension_group`) need no behavior of their own beyond
/// hosting whatever extensions the graph assigned to them, so this trait is
/// intentionally thin.
pub trait ExtensionGroupHandler: Send {
    fn on_create(&mut self) {}
    fn on_destroy(&mut self) {}
}

/// The handler used by the built-in `default_extension_group` addon.
pub struct DefaultExtensionGroupHandler;

impl ExtensionGroupHandler for DefaultExtensionGroupHandler {}
