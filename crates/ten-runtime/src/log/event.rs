use crate::value::{Value, ValueMap};

/// Severity, ordered by increasing urgency. `Off` is only meaningful as a
/// matcher rule level (spec §4.5); no event is ever emitted at `Off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Trace = 1,
    Debug = 2,
    Info = 3,
    Warn = 4,
    Error = 5,
    Fatal = 6,
}

impl LogLevel {
    pub fn letter(self) -> char {
        match self {
            LogLevel::Off => '-',
            LogLevel::Trace => 'T',
            LogLevel::Debug => 'D',
            LogLevel::Info => 'I',
            LogLevel::Warn => 'W',
            LogLevel::Error => 'E',
            LogLevel::Fatal => 'F',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "off" => LogLevel::Off,
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "fatal" => LogLevel::Fatal,
            _ => return None,
        })
    }
}

/// One structured log record, as emitted through `ten_env.log(...)`.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// Microseconds since the Unix epoch.
    pub ts_us: i64,
    pub level: LogLevel,
    pub category: String,
    pub func: String,
    pub file: String,
    pub line: u32,
    pub message: String,
    pub fields: ValueMap,
}

impl LogEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ts_us: i64,
        level: LogLevel,
        category: impl Into<String>,
        func: impl Into<String>,
        file: impl Into<String>,
        line: u32,
        message: impl Into<String>,
        fields: ValueMap,
    ) -> Self {
        LogEvent {
            ts_us,
            level,
            category: category.into(),
            func: func.into(),
            file: file.into(),
            line,
            message: message.into(),
            fields,
        }
    }

    pub fn fields_value(&self) -> Value {
        Value::Map(self.fields.clone())
    }
}
