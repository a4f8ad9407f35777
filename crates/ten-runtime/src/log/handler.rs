use super::emitter::{Emitter, EmitterConfig, EmitterKind};
use super::event::{LogEvent, LogLevel};
use super::formatter::{Formatter, FormatterConfig, FormatterKind};
use super::matcher::{MatchRule, Matcher};
use crate::error::{Result, TenError};
use serde::Deserialize;
use std::path::PathBuf;

/// Wire/JSON shape of one handler entry under `ten.log.handlers[]` (spec §6).
#[derive(Debug, Clone, Deserialize)]
pub struct HandlerConfig {
    #[serde(default)]
    pub matchers: Vec<MatchRuleConfig>,
    #[serde(default)]
    pub formatter: FormatterConfigJson,
    pub emitter: EmitterConfigJson,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchRuleConfig {
    pub category: Option<String>,
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatterConfigJson {
    #[serde(rename = "type", default = "default_formatter_type")]
    pub kind: String,
    #[serde(default)]
    pub colored: bool,
}

fn default_formatter_type() -> String {
    "plain".to_string()
}

impl Default for FormatterConfigJson {
    fn default() -> Self {
        FormatterConfigJson { kind: default_formatter_type(), colored: false }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmitterConfigJson {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: EmitterInnerConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmitterInnerConfig {
    pub stream: Option<String>,
    pub path: Option<PathBuf>,
    pub address: Option<String>,
}

impl HandlerConfig {
    pub fn build(&self) -> Result<Handler> {
        let mut rules = Vec::with_capacity(self.matchers.len());
        for m in &self.matchers {
            let level = LogLevel::parse(&m.level)
                .ok_or_else(|| TenError::Configuration(format!("unknown log level: {}", m.level)))?;
            rules.push(MatchRule::new(m.category.clone(), level));
        }
        let formatter_kind = match self.formatter.kind.as_str() {
            "plain" => FormatterKind::Plain,
            "json" => FormatterKind::Json,
            other => return Err(TenError::Configuration(format!("unknown formatter type: {other}"))),
        };
        let emitter_kind = match self.emitter.kind.as_str() {
            "console" => EmitterKind::Console,
            "file" => EmitterKind::File,
            "network" => EmitterKind::Network,
            other => return Err(TenError::Configuration(format!("unknown emitter type: {other}"))),
        };
        let emitter_config = EmitterConfig {
            kind: Some(emitter_kind),
            stream: self.emitter.config.stream.clone(),
            path: self.emitter.config.path.clone(),
            address: self.emitter.config.address.clone(),
        };
        Ok(Handler {
            matcher: Matcher::new(rules),
            formatter: Formatter::new(FormatterConfig { kind: formatter_kind, colored: self.formatter.colored }),
            emitter: Emitter::new(&emitter_config)?,
        })
    }
}

/// One configured (matcher, formatter, emitter) triple.
pub struct Handler {
    matcher: Matcher,
    formatter: Formatter,
    emitter: Emitter,
}

impl Handler {
    pub fn new(matcher: Matcher, formatter: Formatter, emitter: Emitter) -> Self {
        Handler { matcher, formatter, emitter }
    }

    /// Applies the matcher; if it allows the event, formats and emits it.
    pub fn handle(&self, event: &LogEvent) {
        if self.matcher.allows(event) {
            let line = self.formatter.format(event);
            self.emitter.emit(&line);
        }
    }
}
