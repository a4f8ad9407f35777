use super::event::{LogEvent, LogLevel};
use super::handler::{Handler, HandlerConfig};
use crate::error::Result;
use crate::value::{Value, ValueMap};
use serde::Deserialize;

/// Wire/JSON shape of `ten.log` (spec §6).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggerConfig {
    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,
}

/// The structured logger: a list of independently matcher-filtered
/// handlers, each with its own formatter and emitter. Thread-safe — every
/// `ten_env` clone shares one `Logger` (via `Arc`).
pub struct Logger {
    handlers: Vec<Handler>,
}

impl Logger {
    pub fn new(handlers: Vec<Handler>) -> Self {
        Logger { handlers }
    }

    pub fn from_config(config: &LoggerConfig) -> Result<Self> {
        let mut handlers = Vec::with_capacity(config.handlers.len());
        for h in &config.handlers {
            handlers.push(h.build()?);
        }
        Ok(Logger { handlers })
    }

    /// No configured handlers: a silent logger, used before `App::configure`
    /// has run and by tests that don't care about log output.
    pub fn noop() -> Self {
        Logger { handlers: Vec::new() }
    }

    /// Dispatches `event` to every handler; each independently decides
    /// whether to emit it.
    pub fn log(&self, event: LogEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_fields(
        &self,
        level: LogLevel,
        category: impl Into<String>,
        func: impl Into<String>,
        file: impl Into<String>,
        line: u32,
        message: impl Into<String>,
        fields: ValueMap,
    ) {
        let ts_us = chrono::Utc::now().timestamp_micros();
        self.log(LogEvent::new(ts_us, level, category, func, file, line, message, fields));
    }

    pub fn log_simple(
        &self,
        level: LogLevel,
        category: impl Into<String>,
        func: impl Into<String>,
        file: impl Into<String>,
        line: u32,
        message: impl Into<String>,
    ) {
        self.log_fields(level, category, func, file, line, message, ValueMap::new());
    }
}

/// Helper for building a one-off field map in a call to `log_fields`.
pub fn fields(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> ValueMap {
    let mut m = ValueMap::new();
    for (k, v) in pairs {
        m.insert(k.to_string(), v);
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::emitter::EmitterConfig;
    use crate::log::formatter::{FormatterConfig, FormatterKind};
    use crate::log::handler::Handler;
    use crate::log::matcher::{MatchRule, Matcher};

    #[test]
    fn category_log_filter_scenario_4() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined.log");

        let formatter = || crate::log::formatter::Formatter::new(FormatterConfig { kind: FormatterKind::Plain, colored: false });

        let handler_a = Handler::new(
            Matcher::new(vec![MatchRule::new(Some("ten:runtime".into()), LogLevel::Info)]),
            formatter(),
            crate::log::emitter::Emitter::new(&EmitterConfig::file(&path)).unwrap(),
        );
        let handler_b = Handler::new(
            Matcher::new(vec![
                MatchRule::new(Some("ten:runtime".into()), LogLevel::Off),
                MatchRule::new(None, LogLevel::Debug),
            ]),
            formatter(),
            crate::log::emitter::Emitter::new(&EmitterConfig::file(&path)).unwrap(),
        );

        let logger = Logger::new(vec![handler_a, handler_b]);

        logger.log_simple(
            LogLevel::Debug,
            "my_extension",
            "f",
            "ext.rs",
            1,
            "extension_debug_log_should_appear",
        );
        logger.log_simple(
            LogLevel::Info,
            "my_extension",
            "f",
            "ext.rs",
            2,
            "extension_info_log_should_appear",
        );

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("extension_debug_log_should_appear"));
        assert!(contents.contains("extension_info_log_should_appear"));
        assert!(!contents.lines().any(|l| l.contains(" D ") && l.contains("ten:runtime")));
    }
}
