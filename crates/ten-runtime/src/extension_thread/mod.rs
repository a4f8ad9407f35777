//! Extension Thread (spec §4.3): the cooperative scheduler for one
//! extension group and its extensions.

mod protocol;

pub use protocol::ThreadEvent;

use crate::addon::AddonRegistry;
use crate::engine::EngineInput;
use crate::error::Result;
use crate::extension::{Extension, ExtensionGroupHandler};
use crate::loc::Loc;
use crate::log::Logger;
use crate::message::{CorrelationId, Message};
use crate::ten_env::lifecycle::LifecyclePhase;
use crate::ten_env::{Attachment, TenEnv};
use crate::value::Value;
use crossbeam_channel::{RecvTimeoutError, Sender};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What the engine's Start sequence needs to know about one extension
/// scheduled into a group (spec §4.2 step 4: default groups "inherit the
/// list of (extension_addon_name, extension_instance_name) pairs").
#[derive(Debug, Clone)]
pub struct ExtensionSpec {
    pub addon_name: String,
    pub instance_name: String,
    pub property: Value,
}

struct Hosted {
    instance_name: String,
    extension: Box<dyn Extension>,
    ten_env: TenEnv,
}

/// A live handle to a running extension thread, held by the Engine /
/// Extension-Context. Dropping it does not stop the thread — use
/// `request_close` and `join`.
pub struct ExtensionThreadHandle {
    pub group_instance_name: String,
    inbox: Sender<ThreadEvent>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl ExtensionThreadHandle {
    pub fn deliver(&self, message: Message) {
        let _ = self.inbox.send(ThreadEvent::Deliver(message));
    }

    pub fn request_close(&self) {
        let _ = self.inbox.send(ThreadEvent::Close);
    }

    pub fn join(&mut self) {
        if let Some(h) = self.join.take() {
            let _ = h.join();
        }
    }
}

/// Resolves every extension's addon up front (outside the spawned thread),
/// so addon-resolution failures surface synchronously to the caller, then
/// spawns the OS thread that owns the group and drives its extensions
/// through their lifecycle and dispatch loop.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    group_instance_name: String,
    _group_handler: Box<dyn ExtensionGroupHandler>,
    app_uri: String,
    graph_id: String,
    extension_specs: Vec<ExtensionSpec>,
    addon_registry: Arc<AddonRegistry>,
    to_engine: Sender<EngineInput>,
    logger: Arc<Logger>,
) -> Result<ExtensionThreadHandle> {
    let mut built = Vec::with_capacity(extension_specs.len());
    for spec in &extension_specs {
        let extension = addon_registry.create_extension(&spec.addon_name, &spec.instance_name, &spec.property)?;
        built.push((spec.instance_name.clone(), extension, spec.property.clone()));
    }

    let (tx, rx) = crossbeam_channel::unbounded::<ThreadEvent>();
    let thread_tx = tx.clone();
    let group_name_for_thread = group_instance_name.clone();

    let join = std::thread::Builder::new()
        .name(format!("ten-ext-{group_instance_name}"))
        .spawn(move || {
            let hosted: Vec<Hosted> = built
                .into_iter()
                .map(|(instance_name, extension, property)| {
                    let owner_loc = Loc::new(app_uri.clone(), graph_id.clone(), instance_name.clone());
                    let ten_env = TenEnv::new(
                        Attachment::Extension,
                        owner_loc,
                        app_uri.clone(),
                        instance_name.clone(),
                        to_engine.clone(),
                        thread_tx.clone(),
                        logger.clone(),
                    );
                    if !matches!(property, Value::Null) {
                        let _ = ten_env.init_property_from_json(&property.to_json_string().unwrap_or_default());
                    }
                    Hosted { instance_name, extension, ten_env }
                })
                .collect();

            run(group_name_for_thread, hosted, rx, to_engine);
        })
        .expect("failed to spawn extension thread");

    Ok(ExtensionThreadHandle { group_instance_name, inbox: tx, join: Some(join) })
}

fn run(group_instance_name: String, mut hosted: Vec<Hosted>, rx: crossbeam_channel::Receiver<ThreadEvent>, to_engine: Sender<EngineInput>) {
    if !run_phase(&mut hosted, &rx, LifecyclePhase::Configure, |e, t| e.on_configure(t)) {
        return;
    }
    if !run_phase(&mut hosted, &rx, LifecyclePhase::Init, |e, t| e.on_init(t)) {
        return;
    }
    if !run_phase(&mut hosted, &rx, LifecyclePhase::Start, |e, t| e.on_start(t)) {
        return;
    }

    let _ = to_engine.send(EngineInput::ThreadReady { group_instance_name: group_instance_name.clone() });

    dispatch_loop(&mut hosted, &rx);

    // Close: reverse creation order, on_stop then on_deinit per extension
    // (spec §4.3 "Close").
    for h in hosted.iter_mut().rev() {
        drive_one(h, &rx, LifecyclePhase::Stop, |e, t| e.on_stop(t));
    }
    for h in hosted.iter_mut().rev() {
        drive_one(h, &rx, LifecyclePhase::Deinit, |e, t| e.on_deinit(t));
    }
    for h in &hosted {
        h.ten_env.fail_all_pending_with_closed();
    }

    let _ = to_engine.send(EngineInput::ThreadClosed { group_instance_name });
}

/// Runs one lifecycle phase across every hosted extension; returns `false`
/// if a `Close` arrived before the phase completed (caller should unwind
/// without entering the dispatch loop).
fn run_phase(hosted: &mut [Hosted], rx: &crossbeam_channel::Receiver<ThreadEvent>, phase: LifecyclePhase, call: impl Fn(&mut dyn Extension, &TenEnv)) -> bool {
    for h in hosted.iter_mut() {
        if !drive_one(h, rx, phase, &call) {
            return false;
        }
    }
    true
}

fn drive_one(h: &mut Hosted, rx: &crossbeam_channel::Receiver<ThreadEvent>, phase: LifecyclePhase, call: impl Fn(&mut dyn Extension, &TenEnv)) -> bool {
    call(h.extension.as_mut(), &h.ten_env);
    while !h.ten_env.lifecycle_is_done(phase) {
        match rx.recv() {
            Ok(ThreadEvent::Close) => return false,
            Ok(_) => continue,
            Err(_) => return false,
        }
    }
    true
}

fn dispatch_loop(hosted: &mut [Hosted], rx: &crossbeam_channel::Receiver<ThreadEvent>) {
    let mut timers: BinaryHeap<Reverse<(Instant, CorrelationId)>> = BinaryHeap::new();

    loop {
        let recv_result = match timers.peek() {
            Some(Reverse((deadline, _))) => {
                let now = Instant::now();
                if *deadline <= now {
                    Err(RecvTimeoutError::Timeout)
                } else {
                    rx.recv_timeout(*deadline - now)
                }
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match recv_result {
            Ok(ThreadEvent::Deliver(message)) => dispatch_message(hosted, message),
            Ok(ThreadEvent::ScheduleTimeout { correlation_id, after }) => {
                timers.push(Reverse((Instant::now() + after, correlation_id)));
            }
            Ok(ThreadEvent::LifecycleAdvance) => {}
            Ok(ThreadEvent::Close) => break,
            Err(RecvTimeoutError::Timeout) => {
                while let Some(Reverse((deadline, correlation_id))) = timers.peek().copied() {
                    if deadline > Instant::now() {
                        break;
                    }
                    timers.pop();
                    for h in hosted.iter() {
                        if h.ten_env.fail_pending_with_timeout(correlation_id) {
                            break;
                        }
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn dispatch_message(hosted: &mut [Hosted], message: Message) {
    let Some(dest) = message.dests().first() else { return };
    let target_name = dest.extension_name.clone();
    let Some(h) = hosted.iter_mut().find(|h| h.instance_name == target_name) else {
        tracing::warn!(target: "ten:runtime", extension = %target_name, "message addressed to unknown extension in this group, dropping");
        return;
    };
    match message {
        Message::Cmd(cmd) => h.extension.on_cmd(&h.ten_env, cmd),
        Message::Data(data) => h.extension.on_data(&h.ten_env, data),
        Message::AudioFrame(frame) => h.extension.on_audio_frame(&h.ten_env, frame),
        Message::VideoFrame(frame) => h.extension.on_video_frame(&h.ten_env, frame),
        Message::CmdResult(result) => h.ten_env.resolve_pending_result(result),
    }
}
