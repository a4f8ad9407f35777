use super::event::LogEvent;
use crate::value::Value;
use chrono::{TimeZone, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatterKind {
    Plain,
    Json,
}

#[derive(Debug, Clone)]
pub struct FormatterConfig {
    pub kind: FormatterKind,
    /// Only meaningful for `Plain`.
    pub colored: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        FormatterConfig { kind: FormatterKind::Plain, colored: false }
    }
}

#[derive(Debug, Clone)]
pub struct Formatter {
    config: FormatterConfig,
}

impl Formatter {
    pub fn new(config: FormatterConfig) -> Self {
        Formatter { config }
    }

    pub fn format(&self, event: &LogEvent) -> String {
        match self.config.kind {
            FormatterKind::Plain => self.format_plain(event),
            FormatterKind::Json => self.format_json(event),
        }
    }

    fn format_plain(&self, event: &LogEvent) -> String {
        let ts = Utc
            .timestamp_micros(event.ts_us)
            .single()
            .unwrap_or_else(Utc::now)
            .format("%Y-%m-%d %H:%M:%S%.6f");
        let mut fields = String::new();
        for (k, v) in &event.fields {
            fields.push(' ');
            fields.push_str(k);
            fields.push('=');
            fields.push_str(&v.to_string());
        }
        let line = format!(
            "{ts} {} {} {}:{} {}{fields}",
            event.level.letter(),
            event.category,
            event.file,
            event.line,
            event.message
        );
        if self.config.colored {
            colorize(event.level, &line)
        } else {
            line
        }
    }

    fn format_json(&self, event: &LogEvent) -> String {
        let mut obj = serde_json::Map::new();
        obj.insert("ts".into(), serde_json::Value::from(event.ts_us));
        obj.insert("level".into(), serde_json::Value::from(event.level.as_str()));
        obj.insert("category".into(), serde_json::Value::from(event.category.clone()));
        obj.insert("func".into(), serde_json::Value::from(event.func.clone()));
        obj.insert("file".into(), serde_json::Value::from(event.file.clone()));
        obj.insert("line".into(), serde_json::Value::from(event.line));
        obj.insert("message".into(), serde_json::Value::from(event.message.clone()));
        obj.insert("fields".into(), Value::Map(event.fields.clone()).to_json());
        serde_json::Value::Object(obj).to_string()
    }
}

fn colorize(level: super::event::LogLevel, line: &str) -> String {
    use super::event::LogLevel::*;
    let code = match level {
        Trace => "90",
        Debug => "36",
        Info => "32",
        Warn => "33",
        Error => "31",
        Fatal => "35",
        Off => "0",
    };
    format!("\x1b[{code}m{line}\x1b[0m")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::event::LogLevel;
    use crate::value::ValueMap;

    fn sample_event() -> LogEvent {
        let mut fields = ValueMap::new();
        fields.insert("string_field".into(), Value::String("hello world".into()));
        fields.insert("int_field".into(), Value::I64(42));
        fields.insert("float_field".into(), Value::F64(3.14159));
        fields.insert("bool_field".into(), Value::Bool(true));
        fields.insert("negative_int".into(), Value::I64(-100));
        fields.insert("large_number".into(), Value::I64(9223372036854775807));
        LogEvent::new(0, LogLevel::Info, "ten:runtime", "f", "file.rs", 10, "hello", fields)
    }

    #[test]
    fn json_fields_round_trip_large_i64_losslessly() {
        let f = Formatter::new(FormatterConfig { kind: FormatterKind::Json, colored: false });
        let line = f.format(&sample_event());
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            parsed["fields"]["large_number"].as_i64(),
            Some(9223372036854775807)
        );
        assert_eq!(parsed["fields"]["negative_int"].as_i64(), Some(-100));
        assert_eq!(parsed["fields"]["bool_field"].as_bool(), Some(true));
    }

    #[test]
    fn plain_line_contains_level_letter_and_message() {
        let f = Formatter::new(FormatterConfig { kind: FormatterKind::Plain, colored: false });
        let line = f.format(&sample_event());
        assert!(line.contains(" I "));
        assert!(line.contains("hello"));
        assert!(line.contains("string_field=hello world"));
    }
}
