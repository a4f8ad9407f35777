//! Message model (spec §3 "Message").
//!
//! A `Message` is the unit of communication between extensions, both within
//! a process and across the wire. Messages are owned; `send_*` (see
//! `ten_env`) transfers ownership rather than cloning by default.

use crate::error::ErrorCode;
use crate::loc::Loc;
use crate::value::Value;
use uuid::Uuid;

/// Correlation id used to match a `CmdResult` back to the `Cmd` that
/// produced it. 128-bit, spec §3.
pub type CorrelationId = Uuid;

/// Built-in command names the core interprets specially. Any other name is
/// an application-defined command routed purely by graph connections.
pub mod builtin_cmd {
    pub const START_GRAPH: &str = "ten:start_graph";
    pub const STOP_GRAPH: &str = "ten:stop_graph";
    pub const CLOSE_APP: &str = "ten:close_app";
    pub const TIMER: &str = "ten:timer";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Cmd,
    CmdResult,
    Data,
    AudioFrame,
    VideoFrame,
}

impl MessageKind {
    /// Small integer wire tag (spec §6).
    pub fn wire_tag(self) -> u8 {
        match self {
            MessageKind::Cmd => 1,
            MessageKind::CmdResult => 2,
            MessageKind::Data => 3,
            MessageKind::AudioFrame => 4,
            MessageKind::VideoFrame => 5,
        }
    }

    pub fn from_wire_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => MessageKind::Cmd,
            2 => MessageKind::CmdResult,
            3 => MessageKind::Data,
            4 => MessageKind::AudioFrame,
            5 => MessageKind::VideoFrame,
            _ => return None,
        })
    }
}

/// Common envelope fields carried by every message kind (spec §3).
#[derive(Debug, Clone)]
pub struct Envelope {
    pub name: String,
    pub src: Loc,
    /// Non-empty list of destinations. Validated at construction.
    pub dests: Vec<Loc>,
    pub property: Value,
    /// Monotonically increasing per-process sequence number used as an
    /// integrity marker (detects duplicate/out-of-order delivery across the
    /// wire codec); not part of the public ordering contract, which is
    /// defined purely by submit order per (src, dst, name).
    pub msg_id: u64,
}

impl Envelope {
    pub fn new(name: impl Into<String>, src: Loc, dests: Vec<Loc>) -> Self {
        Envelope {
            name: name.into(),
            src,
            dests,
            property: Value::Map(Default::default()),
            msg_id: crate::util::next_msg_id(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cmd {
    pub envelope: Envelope,
    pub correlation_id: CorrelationId,
}

#[derive(Debug, Clone)]
pub struct CmdResult {
    pub envelope: Envelope,
    pub correlation_id: CorrelationId,
    pub status_code: ErrorCode,
    pub detail: Value,
    /// Whether more `CmdResult`s for the same correlation id are expected.
    /// Always `true` today (one shot per destination); kept as an explicit
    /// field so a future streaming-result extension is additive.
    pub is_final: bool,
}

#[derive(Debug, Clone)]
pub struct Data {
    pub envelope: Envelope,
    pub buf: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub envelope: Envelope,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<u8>,
    pub timestamp_us: i64,
}

#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub envelope: Envelope,
    pub width: u32,
    pub height: u32,
    pub pixel_format: String,
    pub data: Vec<u8>,
    pub timestamp_us: i64,
}

#[derive(Debug, Clone)]
pub enum Message {
    Cmd(Cmd),
    CmdResult(CmdResult),
    Data(Data),
    AudioFrame(AudioFrame),
    VideoFrame(VideoFrame),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Cmd(_) => MessageKind::Cmd,
            Message::CmdResult(_) => MessageKind::CmdResult,
            Message::Data(_) => MessageKind::Data,
            Message::AudioFrame(_) => MessageKind::AudioFrame,
            Message::VideoFrame(_) => MessageKind::VideoFrame,
        }
    }

    pub fn envelope(&self) -> &Envelope {
        match self {
            Message::Cmd(m) => &m.envelope,
            Message::CmdResult(m) => &m.envelope,
            Message::Data(m) => &m.envelope,
            Message::AudioFrame(m) => &m.envelope,
            Message::VideoFrame(m) => &m.envelope,
        }
    }

    pub fn envelope_mut(&mut self) -> &mut Envelope {
        match self {
            Message::Cmd(m) => &mut m.envelope,
            Message::CmdResult(m) => &mut m.envelope,
            Message::Data(m) => &mut m.envelope,
            Message::AudioFrame(m) => &mut m.envelope,
            Message::VideoFrame(m) => &mut m.envelope,
        }
    }

    pub fn name(&self) -> &str {
        &self.envelope().name
    }

    pub fn src(&self) -> &Loc {
        &self.envelope().src
    }

    pub fn dests(&self) -> &[Loc] {
        &self.envelope().dests
    }

    pub fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            Message::Cmd(m) => Some(m.correlation_id),
            Message::CmdResult(m) => Some(m.correlation_id),
            _ => None,
        }
    }

    /// Builds a `CmdResult` replying to this message (must be a `Cmd`).
    /// Returns `None` for non-command messages, which never receive results
    /// (spec §3: "commands additionally carry a response sink").
    pub fn make_result(&self, status_code: ErrorCode, detail: Value) -> Option<CmdResult> {
        let Message::Cmd(cmd) = self else { return None };
        let envelope = Envelope::new(cmd.envelope.name.clone(), cmd.envelope.dests[0].clone(), vec![cmd.envelope.src.clone()]);
        Some(CmdResult {
            envelope,
            correlation_id: cmd.correlation_id,
            status_code,
            detail,
            is_final: true,
        })
    }
}

impl Cmd {
    pub fn new(name: impl Into<String>, src: Loc, dests: Vec<Loc>) -> Self {
        Cmd {
            envelope: Envelope::new(name, src, dests),
            correlation_id: Uuid::new_v4(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_result_carries_correlation_id_and_swaps_src_dst() {
        let cmd = Cmd::new("hello_world", Loc::local("caller"), vec![Loc::local("callee")]);
        let msg = Message::Cmd(cmd.clone());
        let result = msg.make_result(ErrorCode::Ok, Value::String("hi".into())).unwrap();
        assert_eq!(result.correlation_id, cmd.correlation_id);
        assert_eq!(result.envelope.src, Loc::local("callee"));
        assert_eq!(result.envelope.dests, vec![Loc::local("caller")]);
    }

    #[test]
    fn wire_tag_round_trip() {
        for kind in [
            MessageKind::Cmd,
            MessageKind::CmdResult,
            MessageKind::Data,
            MessageKind::AudioFrame,
            MessageKind::VideoFrame,
        ] {
            assert_eq!(MessageKind::from_wire_tag(kind.wire_tag()), Some(kind));
        }
    }
}
