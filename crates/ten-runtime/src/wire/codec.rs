//! msgpack-over-TCP framing (spec §6 "Wire protocol").
//!
//! Each frame is `<u32 length BE><msgpack body>`. The body is a 3-tuple
//! `[kind_tag, header, payload]`: `header` is a map carrying `name, src,
//! dests[], correlation_id?, status_code?, msg_id`; `payload` is the
//! property `Value` encoded as msgpack. `kind_tag` is the small integer
//! from `MessageKind::wire_tag`. `rmpv` gives a dynamic msgpack value for
//! the header map (which has no fixed Rust shape across message kinds);
//! `rmp-serde` drives the outer tuple's encode/decode.

use crate::error::{Result, TenError};
use crate::loc::Loc;
use crate::message::{AudioFrame, Cmd, CmdResult, Data, Envelope, Message, MessageKind, VideoFrame};
use crate::value::{Value, ValueMap};
use rmpv::Value as Rv;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn value_to_rmpv(v: &Value) -> Rv {
    match v {
        Value::Null => Rv::Nil,
        Value::Bool(b) => Rv::Boolean(*b),
        Value::I8(n) => Rv::from(*n),
        Value::I16(n) => Rv::from(*n),
        Value::I32(n) => Rv::from(*n),
        Value::I64(n) => Rv::from(*n),
        Value::U8(n) => Rv::from(*n),
        Value::U16(n) => Rv::from(*n),
        Value::U32(n) => Rv::from(*n),
        Value::U64(n) => Rv::from(*n),
        Value::F32(n) => Rv::from(*n),
        Value::F64(n) => Rv::from(*n),
        Value::String(s) => Rv::String(s.clone().into()),
        Value::Bytes(b) => Rv::Binary(b.clone()),
        Value::Array(a) => Rv::Array(a.iter().map(value_to_rmpv).collect()),
        Value::Map(m) => Rv::Map(m.iter().map(|(k, v)| (Rv::String(k.clone().into()), value_to_rmpv(v))).collect()),
    }
}

fn rmpv_to_value(v: &Rv) -> Value {
    match v {
        Rv::Nil => Value::Null,
        Rv::Boolean(b) => Value::Bool(*b),
        Rv::Integer(n) => {
            if let Some(i) = n.as_i64() {
                Value::I64(i)
            } else {
                Value::U64(n.as_u64().unwrap_or(0))
            }
        }
        Rv::F32(n) => Value::F32(*n),
        Rv::F64(n) => Value::F64(*n),
        Rv::String(s) => Value::String(s.as_str().unwrap_or_default().to_string()),
        Rv::Binary(b) => Value::Bytes(b.clone()),
        Rv::Array(a) => Value::Array(a.iter().map(rmpv_to_value).collect()),
        Rv::Map(m) => {
            let mut out = ValueMap::new();
            for (k, v) in m {
                if let Some(key) = k.as_str() {
                    out.insert(key.to_string(), rmpv_to_value(v));
                }
            }
            Value::Map(out)
        }
        Rv::Ext(_, _) => Value::Null,
    }
}

fn loc_to_rmpv(l: &Loc) -> Rv {
    Rv::Map(vec![
        (Rv::String("app_uri".into()), Rv::String(l.app_uri.clone().into())),
        (Rv::String("graph_id".into()), Rv::String(l.graph_id.clone().into())),
        (Rv::String("extension_name".into()), Rv::String(l.extension_name.clone().into())),
    ])
}

fn rmpv_to_loc(v: &Rv) -> Loc {
    let get = |key: &str| -> String {
        v.as_map()
            .and_then(|m| m.iter().find(|(k, _)| k.as_str() == Some(key)))
            .and_then(|(_, v)| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    Loc::new(get("app_uri"), get("graph_id"), get("extension_name"))
}

fn build_header(message: &Message) -> Rv {
    let envelope = message.envelope();
    let mut fields = vec![
        (Rv::String("name".into()), Rv::String(envelope.name.clone().into())),
        (Rv::String("src".into()), loc_to_rmpv(&envelope.src)),
        (Rv::String("dests".into()), Rv::Array(envelope.dests.iter().map(loc_to_rmpv).collect())),
        (Rv::String("msg_id".into()), Rv::from(envelope.msg_id)),
    ];
    if let Some(correlation_id) = message.correlation_id() {
        fields.push((Rv::String("correlation_id".into()), Rv::Binary(correlation_id.as_bytes().to_vec())));
    }
    if let Message::CmdResult(r) = message {
        fields.push((Rv::String("status_code".into()), Rv::from(r.status_code.as_i32())));
        fields.push((Rv::String("is_final".into()), Rv::Boolean(r.is_final)));
    }
    Rv::Map(fields)
}

fn header_field<'a>(header: &'a Rv, key: &str) -> Option<&'a Rv> {
    header.as_map()?.iter().find(|(k, _)| k.as_str() == Some(key)).map(|(_, v)| v)
}

fn payload_of(message: &Message) -> Value {
    match message {
        Message::Cmd(_) => Value::Null,
        Message::CmdResult(r) => r.detail.clone(),
        Message::Data(d) => Value::Bytes(d.buf.clone()),
        Message::AudioFrame(f) => Value::Bytes(f.samples.clone()),
        Message::VideoFrame(f) => Value::Bytes(f.data.clone()),
    }
}

/// Encodes one `Message` into a length-prefixed frame ready to write to a
/// socket.
pub fn encode_frame(message: &Message) -> Result<Vec<u8>> {
    let body = (message.kind().wire_tag(), build_header(message), value_to_rmpv(&payload_of(message)));
    let encoded = rmp_serde::to_vec_named(&body).map_err(|e| TenError::Other(anyhow::anyhow!("msgpack encode failed: {e}")))?;
    let mut frame = Vec::with_capacity(4 + encoded.len());
    frame.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
    frame.extend_from_slice(&encoded);
    Ok(frame)
}

/// Decodes one already-length-delimited frame body back into a `Message`.
pub fn decode_frame(body: &[u8]) -> Result<Message> {
    let (kind_tag, header, payload): (u8, Rv, Rv) =
        rmp_serde::from_slice(body).map_err(|e| TenError::Other(anyhow::anyhow!("msgpack decode failed: {e}")))?;
    let kind = MessageKind::from_wire_tag(kind_tag).ok_or_else(|| TenError::InvalidArgument(format!("unknown wire kind tag {kind_tag}")))?;

    let name = header_field(&header, "name").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let src = header_field(&header, "src").map(rmpv_to_loc).unwrap_or_default();
    let dests = header_field(&header, "dests").and_then(|v| v.as_array()).map(|a| a.iter().map(rmpv_to_loc).collect()).unwrap_or_default();
    let msg_id = header_field(&header, "msg_id").and_then(|v| v.as_u64()).unwrap_or(0);
    let correlation_id = header_field(&header, "correlation_id")
        .and_then(|v| v.as_slice())
        .and_then(|b| <[u8; 16]>::try_from(b).ok())
        .map(uuid::Uuid::from_bytes)
        .unwrap_or_default();

    let property = rmpv_to_value(&payload);
    let envelope = Envelope { name, src, dests, property: property.clone(), msg_id };

    Ok(match kind {
        MessageKind::Cmd => Message::Cmd(Cmd { envelope, correlation_id }),
        MessageKind::CmdResult => {
            let status_code = header_field(&header, "status_code")
                .and_then(|v| v.as_i64())
                .and_then(|n| crate::error::ErrorCode::from_i32(n as i32))
                .unwrap_or(crate::error::ErrorCode::Generic);
            let is_final = header_field(&header, "is_final").and_then(|v| v.as_bool()).unwrap_or(true);
            Message::CmdResult(CmdResult { envelope, correlation_id, status_code, detail: property, is_final })
        }
        MessageKind::Data => {
            let buf = match property {
                Value::Bytes(b) => b,
                _ => Vec::new(),
            };
            Message::Data(Data { envelope, buf })
        }
        MessageKind::AudioFrame => {
            let samples = match property {
                Value::Bytes(b) => b,
                _ => Vec::new(),
            };
            Message::AudioFrame(AudioFrame { envelope, sample_rate: 0, channels: 0, samples, timestamp_us: 0 })
        }
        MessageKind::VideoFrame => {
            let data = match property {
                Value::Bytes(b) => b,
                _ => Vec::new(),
            };
            Message::VideoFrame(VideoFrame { envelope, width: 0, height: 0, pixel_format: String::new(), data, timestamp_us: 0 })
        }
    })
}

/// Reads and decodes exactly one frame from `stream`. Returns `Ok(None)`
/// on a clean EOF before any bytes of a new frame arrive.
pub async fn read_frame<R: tokio::io::AsyncRead + Unpin>(stream: &mut R) -> Result<Option<Message>> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(TenError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.map_err(TenError::Io)?;
    decode_frame(&body).map(Some)
}

pub async fn write_frame<W: tokio::io::AsyncWrite + Unpin>(stream: &mut W, message: &Message) -> Result<()> {
    let frame = encode_frame(message)?;
    stream.write_all(&frame).await.map_err(TenError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loc::Loc;

    #[test]
    fn cmd_round_trips_through_the_wire_framing() {
        let cmd = Cmd::new("hello_world", Loc::new("msgpack://a/", "g1", "ext1"), vec![Loc::new("msgpack://b/", "g1", "ext2")]);
        let correlation_id = cmd.correlation_id;
        let message = Message::Cmd(cmd);

        let frame = encode_frame(&message).unwrap();
        let decoded = decode_frame(&frame[4..]).unwrap();

        assert_eq!(decoded.name(), "hello_world");
        assert_eq!(decoded.correlation_id(), Some(correlation_id));
        assert_eq!(decoded.src().extension_name, "ext1");
        assert_eq!(decoded.dests()[0].extension_name, "ext2");
    }

    #[tokio::test]
    async fn read_frame_round_trips_over_an_in_memory_duplex() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let cmd_result = CmdResult {
            envelope: Envelope::new("hello_world", Loc::local("ext2"), vec![Loc::local("ext1")]),
            correlation_id: uuid::Uuid::new_v4(),
            status_code: crate::error::ErrorCode::Ok,
            detail: Value::String("hello world, too".into()),
            is_final: true,
        };
        let message = Message::CmdResult(cmd_result);
        write_frame(&mut client, &message).await.unwrap();
        let decoded = read_frame(&mut server).await.unwrap().unwrap();
        assert_eq!(decoded.name(), "hello_world");
        if let Message::CmdResult(r) = decoded {
            assert_eq!(r.detail, Value::String("hello world, too".into()));
        } else {
            panic!("expected CmdResult");
        }
    }

    #[test]
    fn data_message_payload_round_trips_as_bytes() {
        let data = Data { envelope: Envelope::new("blob", Loc::local("ext1"), vec![Loc::local("ext2")]), buf: vec![1, 2, 3, 4] };
        let message = Message::Data(data);
        let frame = encode_frame(&message).unwrap();
        let decoded = decode_frame(&frame[4..]).unwrap();
        if let Message::Data(d) = decoded {
            assert_eq!(d.buf, vec![1, 2, 3, 4]);
        } else {
            panic!("expected Data");
        }
    }
}
