use crate::message::Message;

/// The Engine's own thread inbox (spec §4.2: the Engine is itself a
/// single-threaded state machine; external access is exclusively by
/// posting one of these).
pub enum EngineInput {
    /// A message an extension thread wants routed, produced by a
    /// `ten_env.send_*` / `return_result` call.
    Outbound { message: Message },
    /// A message that arrived off the wire, already addressed to a local
    /// extension.
    Inbound { message: Message },
    /// An extension thread finished its startup sequence and reached
    /// `Running`.
    ThreadReady { group_instance_name: String },
    /// An extension thread finished its Close sequence and exited.
    ThreadClosed { group_instance_name: String },
    /// Requests the Close sequence (spec §4.2).
    Close,
}
