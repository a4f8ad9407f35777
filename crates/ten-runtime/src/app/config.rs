//! App configuration (spec §4.1 `configure`, §6 "App config (JSON)").
//!
//! Parses the embedded `ten` object: `{ uri, log, predefined_graphs? }`.
//! `ten.toml` project-manifest parsing (package name/version, grounded on
//! the teacher's `ProjectConfig`) lives alongside this for `ten-app`'s CLI
//! to read, but carries no processor/addon schema — that's out of scope.

use crate::error::{Result, TenError};
use crate::log::LoggerConfig;
use crate::value::Value;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub uri: String,
    #[serde(default)]
    pub log: LoggerConfig,
    #[serde(default)]
    pub predefined_graphs: Vec<PredefinedGraphConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredefinedGraphConfig {
    pub graph_name: String,
    #[serde(default)]
    pub singleton: bool,
    #[serde(flatten)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

impl PredefinedGraphConfig {
    /// Reassembles the node/connection body into the same `Value` shape
    /// `graph::build_graph` expects for a `StartGraph` command property.
    pub fn as_start_graph_property(&self) -> Value {
        let mut obj = self.body.clone();
        obj.insert("graph_name".to_string(), serde_json::Value::String(self.graph_name.clone()));
        obj.insert("singleton".to_string(), serde_json::Value::Bool(self.singleton));
        Value::from_json(&serde_json::Value::Object(obj))
    }
}

impl AppConfig {
    /// Parses the top-level `ten` object (spec §6). `property_json` is the
    /// object's own JSON text, not a wrapper with a `ten` key — callers
    /// that read a full app manifest extract the `ten` member first.
    pub fn parse(property_json: &str) -> Result<AppConfig> {
        serde_json::from_str(property_json).map_err(|e| TenError::Configuration(format!("invalid 'ten' config: {e}")))
    }
}

/// `ten.toml` project manifest: `[package]` metadata only (spec §6 addendum;
/// grounded on the teacher's `core/config/project_config.rs`).
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectManifest {
    pub package: PackageMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
}

impl ProjectManifest {
    pub fn parse(toml_text: &str) -> Result<ProjectManifest> {
        toml::from_str(toml_text).map_err(|e| TenError::Configuration(format!("invalid ten.toml: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let cfg = AppConfig::parse(r#"{"uri":"msgpack://127.0.0.1:8000/"}"#).unwrap();
        assert_eq!(cfg.uri, "msgpack://127.0.0.1:8000/");
        assert!(cfg.log.handlers.is_empty());
        assert!(cfg.predefined_graphs.is_empty());
    }

    #[test]
    fn parses_predefined_graph_body_into_start_graph_property() {
        let cfg = AppConfig::parse(
            r#"{"uri":"msgpack://127.0.0.1:8000/","predefined_graphs":[{"graph_name":"g","nodes":[]}]}"#,
        )
        .unwrap();
        assert_eq!(cfg.predefined_graphs.len(), 1);
        let property = cfg.predefined_graphs[0].as_start_graph_property();
        assert_eq!(property.get_path("graph_name").and_then(Value::as_str), Some("g"));
        assert!(property.get_path("nodes").and_then(Value::as_array).unwrap().is_empty());
    }

    #[test]
    fn rejects_missing_uri() {
        assert!(AppConfig::parse(r#"{"log":{}}"#).is_err());
    }

    #[test]
    fn parses_project_manifest() {
        let manifest = ProjectManifest::parse("[package]\nname = \"demo\"\nversion = \"0.1.0\"\n").unwrap();
        assert_eq!(manifest.package.name, "demo");
    }
}
