//! Typed value model (spec §3 "Value").
//!
//! A `Value` is the payload carried by every message property, every log
//! field table, and every `get_property` / `set_property` call. It supports
//! deep clone, a lossless JSON round-trip on the JSON-representable subset,
//! and a canonical msgpack encoding used for on-wire framing (spec §6).

use indexmap::IndexMap;
use std::fmt;

/// Ordered string-keyed map. Iteration order is insertion order within one
/// instance (spec §3); equality does not depend on it.
pub type ValueMap = IndexMap<String, Value>;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(ValueMap),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (I8(a), I8(b)) => a == b,
            (I16(a), I16(b)) => a == b,
            (I32(a), I32(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            (U8(a), U8(b)) => a == b,
            (U16(a), U16(b)) => a == b,
            (U32(a), U32(b)) => a == b,
            (U64(a), U64(b)) => a == b,
            (F32(a), F32(b)) => a.to_bits() == b.to_bits(),
            (F64(a), F64(b)) => a.to_bits() == b.to_bits(),
            (String(a), String(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Map(a), Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            _ => false,
        }
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(v) => Some(v as i64),
            Value::I16(v) => Some(v as i64),
            Value::I32(v) => Some(v as i64),
            Value::I64(v) => Some(v),
            Value::U8(v) => Some(v as i64),
            Value::U16(v) => Some(v as i64),
            Value::U32(v) => Some(v as i64),
            Value::U64(v) if v <= i64::MAX as u64 => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Navigates a `.`-separated path through nested maps/arrays (arrays
    /// indexed by decimal segment), mirroring `get_property`'s hierarchical
    /// lookup (spec §4.4).
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(self);
        }
        let mut cur = self;
        for segment in path.split('.') {
            cur = match cur {
                Value::Map(m) => m.get(segment)?,
                Value::Array(a) => a.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    /// Sets a value at a `.`-separated path, creating intermediate maps as
    /// needed. Fails (returns `false`) if an intermediate segment exists and
    /// is not a map.
    pub fn set_path(&mut self, path: &str, value: Value) -> bool {
        if path.is_empty() {
            *self = value;
            return true;
        }
        let mut cur = self;
        let segments: Vec<&str> = path.split('.').collect();
        for segment in &segments[..segments.len() - 1] {
            if !matches!(cur, Value::Map(_)) {
                *cur = Value::Map(ValueMap::new());
            }
            let Value::Map(m) = cur else { unreachable!() };
            cur = m.entry(segment.to_string()).or_insert(Value::Map(ValueMap::new()));
        }
        if !matches!(cur, Value::Map(_)) {
            *cur = Value::Map(ValueMap::new());
        }
        let Value::Map(m) = cur else { unreachable!() };
        m.insert(segments[segments.len() - 1].to_string(), value);
        true
    }
}

// ---------------------------------------------------------------------------
// JSON round-trip
// ---------------------------------------------------------------------------

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        use serde_json::Value as J;
        match v {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::I8(n) => J::from(*n),
            Value::I16(n) => J::from(*n),
            Value::I32(n) => J::from(*n),
            Value::I64(n) => J::from(*n),
            Value::U8(n) => J::from(*n),
            Value::U16(n) => J::from(*n),
            Value::U32(n) => J::from(*n),
            Value::U64(n) => J::from(*n),
            Value::F32(n) => serde_json::Number::from_f64(*n as f64)
                .map(J::Number)
                .unwrap_or(J::Null),
            Value::F64(n) => serde_json::Number::from_f64(*n).map(J::Number).unwrap_or(J::Null),
            Value::String(s) => J::String(s.clone()),
            Value::Bytes(b) => {
                // Bytes are not natively JSON-representable; encode as a
                // base64-less array of u8 so the round-trip stays lossless
                // for the JSON-representable subset test (spec §8).
                J::Array(b.iter().map(|b| J::from(*b)).collect())
            }
            Value::Array(a) => J::Array(a.iter().map(serde_json::Value::from).collect()),
            Value::Map(m) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in m {
                    obj.insert(k.clone(), serde_json::Value::from(v));
                }
                J::Object(obj)
            }
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(v: &serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(*b),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::I64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::U64(u)
                } else {
                    Value::F64(n.as_f64().unwrap_or(0.0))
                }
            }
            J::String(s) => Value::String(s.clone()),
            J::Array(a) => Value::Array(a.iter().map(Value::from).collect()),
            J::Object(o) => {
                let mut m = ValueMap::new();
                for (k, v) in o {
                    m.insert(k.clone(), Value::from(v));
                }
                Value::Map(m)
            }
        }
    }
}

impl Value {
    pub fn to_json(&self) -> serde_json::Value {
        self.into()
    }

    pub fn from_json(v: &serde_json::Value) -> Value {
        v.into()
    }

    pub fn to_json_string(&self) -> crate::error::Result<String> {
        serde_json::to_string(&self.to_json())
            .map_err(|e| crate::error::TenError::InvalidJson(e.to_string()))
    }

    pub fn from_json_str(s: &str) -> crate::error::Result<Value> {
        let j: serde_json::Value =
            serde_json::from_str(s).map_err(|e| crate::error::TenError::InvalidJson(e.to_string()))?;
        Ok(Value::from_json(&j))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::I8(n) => write!(f, "{n}"),
            Value::I16(n) => write!(f, "{n}"),
            Value::I32(n) => write!(f, "{n}"),
            Value::I64(n) => write!(f, "{n}"),
            Value::U8(n) => write!(f, "{n}"),
            Value::U16(n) => write!(f, "{n}"),
            Value::U32(n) => write!(f, "{n}"),
            Value::U64(n) => write!(f, "{n}"),
            Value::F32(n) => write!(f, "{n}"),
            Value::F64(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Array(_) | Value::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience `From` impls
// ---------------------------------------------------------------------------

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::I64(n)
    }
}
impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::I32(n)
    }
}
impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::U64(n)
    }
}
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::F64(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_identity_on_representable_subset() {
        let mut m = ValueMap::new();
        m.insert("a".to_string(), Value::I64(42));
        m.insert("b".to_string(), Value::String("hi".to_string()));
        m.insert("c".to_string(), Value::Array(vec![Value::Bool(true), Value::Null]));
        let v = Value::Map(m);

        let json = v.to_json_string().unwrap();
        let back = Value::from_json_str(&json).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn large_i64_does_not_truncate_through_f64() {
        let v = Value::I64(9223372036854775807);
        let json = v.to_json();
        assert_eq!(json.as_i64(), Some(9223372036854775807));
    }

    #[test]
    fn path_set_and_get_roundtrip() {
        let mut v = Value::Map(ValueMap::new());
        v.set_path("a.b.c", Value::I64(7));
        assert_eq!(v.get_path("a.b.c"), Some(&Value::I64(7)));
        assert_eq!(v.get_path("a.b.missing"), None);
    }
}
