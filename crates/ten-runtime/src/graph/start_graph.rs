//! Parses a `StartGraph` command's property into a [`Graph`] (spec §4.6).
//!
//! Property shape: `{ nodes: [NodeDesc], connections: [ConnDesc]?,
//! graph_name?: string, singleton?: bool }`. `NodeDesc = { type:
//! extension|extension_group, name, addon, extension_group?, app?,
//! property? }`. `ConnDesc = { source: {app?, extension}, dest: {app?,
//! extension}, msg_kind?, msg_name?, property_match? }`.

use super::model::{ConnectionInfo, ExtensionGroupInfo, ExtensionInfo, Graph, MessageKindFilter, PropertyMatch};
use crate::addon::DEFAULT_EXTENSION_GROUP;
use crate::error::{Result, TenError};
use crate::loc::Loc;
use crate::message::MessageKind;
use crate::value::Value;
use std::collections::{HashMap, HashSet};

pub struct ParsedStartGraph {
    pub graph: Graph,
    pub graph_name: Option<String>,
    pub singleton: bool,
}

/// Builds a graph for a fresh `graph_id` in `app_uri`, materializing an
/// implicit `default_extension_group` for any extension whose declared
/// `extension_group` names no group node (spec §4.6 second paragraph).
pub fn build_graph(app_uri: &str, graph_id: &str, property: &Value) -> Result<ParsedStartGraph> {
    let root = property.as_map().ok_or_else(|| TenError::InvalidArgument("StartGraph property must be an object".into()))?;

    let graph_name = root.get("graph_name").and_then(Value::as_str).map(str::to_string);
    let singleton = root.get("singleton").and_then(Value::as_bool).unwrap_or(false);

    let nodes = root
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| TenError::InvalidArgument("StartGraph property missing 'nodes' array".into()))?;

    let mut declared_groups = Vec::new();
    let mut declared_group_names = HashSet::new();
    // (name, addon, app_uri, requested_group_name, properties)
    let mut extension_nodes = Vec::new();

    for node in nodes {
        let node_map = node.as_map().ok_or_else(|| TenError::InvalidArgument("node must be an object".into()))?;
        let node_type = node_map.get("type").and_then(Value::as_str).unwrap_or("extension");
        let name = node_map
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| TenError::InvalidArgument("node missing 'name'".into()))?
            .to_string();
        let addon = node_map
            .get("addon")
            .and_then(Value::as_str)
            .ok_or_else(|| TenError::InvalidArgument("node missing 'addon'".into()))?
            .to_string();
        let node_app = node_map.get("app").and_then(Value::as_str).map(str::to_string).unwrap_or_else(|| app_uri.to_string());

        match node_type {
            "extension_group" => {
                declared_group_names.insert(name.clone());
                declared_groups.push(ExtensionGroupInfo {
                    app_uri: node_app,
                    graph_id: graph_id.to_string(),
                    addon_name: addon,
                    instance_name: name,
                });
            }
            "extension" => {
                let group_name = node_map.get("extension_group").and_then(Value::as_str).map(str::to_string);
                let properties = node_map.get("property").cloned().unwrap_or(Value::Map(Default::default()));
                extension_nodes.push((name, addon, node_app, group_name, properties));
            }
            other => return Err(TenError::InvalidArgument(format!("unknown node type '{other}'"))),
        }
    }

    let mut implicit_groups: HashMap<String, ExtensionGroupInfo> = HashMap::new();
    let mut extensions = Vec::with_capacity(extension_nodes.len());

    for (name, addon, node_app, requested_group, properties) in extension_nodes {
        let group_instance_name = match requested_group {
            Some(g) if declared_group_names.contains(&g) => g,
            Some(g) => {
                implicit_groups.entry(g.clone()).or_insert_with(|| ExtensionGroupInfo {
                    app_uri: node_app.clone(),
                    graph_id: graph_id.to_string(),
                    addon_name: DEFAULT_EXTENSION_GROUP.to_string(),
                    instance_name: g.clone(),
                });
                g
            }
            None => {
                let implicit_name = format!("{DEFAULT_EXTENSION_GROUP}:{name}");
                implicit_groups.entry(implicit_name.clone()).or_insert_with(|| ExtensionGroupInfo {
                    app_uri: node_app.clone(),
                    graph_id: graph_id.to_string(),
                    addon_name: DEFAULT_EXTENSION_GROUP.to_string(),
                    instance_name: implicit_name.clone(),
                });
                implicit_name
            }
        };

        extensions.push(ExtensionInfo {
            loc: Loc::new(node_app, graph_id.to_string(), name),
            addon_name: addon,
            group_instance_name,
            properties,
        });
    }

    let mut groups = declared_groups;
    groups.extend(implicit_groups.into_values());

    let connections = root
        .get("connections")
        .and_then(Value::as_array)
        .map(|conns| parse_connections(app_uri, graph_id, conns))
        .transpose()?
        .unwrap_or_default();

    let graph = Graph { name: graph_name.clone(), groups, extensions, connections };

    Ok(ParsedStartGraph { graph, graph_name, singleton })
}

fn parse_connections(app_uri: &str, graph_id: &str, conns: &[Value]) -> Result<Vec<ConnectionInfo>> {
    let mut out = Vec::with_capacity(conns.len());
    for c in conns {
        let m = c.as_map().ok_or_else(|| TenError::InvalidArgument("connection must be an object".into()))?;
        let source = parse_loc(app_uri, graph_id, m.get("source"))?;
        let dest = parse_loc(app_uri, graph_id, m.get("dest"))?;
        let kind_filter = match m.get("msg_kind").and_then(Value::as_str) {
            Some(k) => MessageKindFilter(Some(vec![parse_kind(k)?])),
            None => MessageKindFilter(None),
        };
        let name_filter = m.get("msg_name").and_then(Value::as_str).map(str::to_string);
        let property_match = match m.get("property_match").and_then(Value::as_map) {
            Some(pm) => PropertyMatch(pm.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            None => PropertyMatch::default(),
        };
        out.push(ConnectionInfo { source, dest, kind_filter, name_filter, property_match });
    }
    Ok(out)
}

fn parse_loc(app_uri: &str, graph_id: &str, v: Option<&Value>) -> Result<Loc> {
    let m = v
        .and_then(Value::as_map)
        .ok_or_else(|| TenError::InvalidArgument("connection endpoint must be an object".into()))?;
    let extension_name = m
        .get("extension")
        .and_then(Value::as_str)
        .ok_or_else(|| TenError::InvalidArgument("connection endpoint missing 'extension'".into()))?
        .to_string();
    let app = m.get("app").and_then(Value::as_str).unwrap_or(app_uri).to_string();
    Ok(Loc::new(app, graph_id.to_string(), extension_name))
}

fn parse_kind(s: &str) -> Result<MessageKind> {
    Ok(match s {
        "cmd" => MessageKind::Cmd,
        "cmd_result" => MessageKind::CmdResult,
        "data" => MessageKind::Data,
        "audio_frame" => MessageKind::AudioFrame,
        "video_frame" => MessageKind::VideoFrame,
        other => return Err(TenError::InvalidArgument(format!("unknown msg_kind '{other}'"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueMap;

    fn node(ty: &str, name: &str, addon: &str, group: Option<&str>) -> Value {
        let mut m = ValueMap::new();
        m.insert("type".into(), Value::String(ty.into()));
        m.insert("name".into(), Value::String(name.into()));
        m.insert("addon".into(), Value::String(addon.into()));
        if let Some(g) = group {
            m.insert("extension_group".into(), Value::String(g.into()));
        }
        Value::Map(m)
    }

    #[test]
    fn extension_with_no_group_gets_implicit_default_group() {
        let mut root = ValueMap::new();
        root.insert("nodes".into(), Value::Array(vec![node("extension", "ext1", "my_addon", None)]));
        let parsed = build_graph("msgpack://local/", "g1", &Value::Map(root)).unwrap();
        assert_eq!(parsed.graph.groups.len(), 1);
        assert_eq!(parsed.graph.groups[0].addon_name, DEFAULT_EXTENSION_GROUP);
        assert_eq!(parsed.graph.extensions[0].group_instance_name, parsed.graph.groups[0].instance_name);
    }

    #[test]
    fn named_group_not_declared_as_node_is_materialized_once() {
        let mut root = ValueMap::new();
        root.insert(
            "nodes".into(),
            Value::Array(vec![
                node("extension", "ext1", "a", Some("g")),
                node("extension", "ext2", "a", Some("g")),
            ]),
        );
        let parsed = build_graph("msgpack://local/", "g1", &Value::Map(root)).unwrap();
        assert_eq!(parsed.graph.groups.len(), 1);
        assert_eq!(parsed.graph.groups[0].instance_name, "g");
        assert_eq!(parsed.graph.groups[0].addon_name, DEFAULT_EXTENSION_GROUP);
    }

    #[test]
    fn explicit_group_node_is_used_as_is() {
        let mut root = ValueMap::new();
        root.insert(
            "nodes".into(),
            Value::Array(vec![
                node("extension_group", "g1", "custom_group_addon", None),
                node("extension", "ext1", "a", Some("g1")),
            ]),
        );
        let parsed = build_graph("msgpack://local/", "g1", &Value::Map(root)).unwrap();
        assert_eq!(parsed.graph.groups.len(), 1);
        assert_eq!(parsed.graph.groups[0].addon_name, "custom_group_addon");
    }

    #[test]
    fn empty_nodes_yields_empty_graph() {
        let mut root = ValueMap::new();
        root.insert("nodes".into(), Value::Array(vec![]));
        let parsed = build_graph("msgpack://local/", "g1", &Value::Map(root)).unwrap();
        assert!(parsed.graph.groups.is_empty());
        assert!(parsed.graph.extensions.is_empty());
    }
}
