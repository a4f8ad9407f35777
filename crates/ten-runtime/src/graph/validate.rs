//! Graph invariant checks (spec §3 "Graph" invariants).

use super::model::Graph;
use crate::error::{Result, TenError};

/// Checks the two invariants spec §3 places on a parsed `Graph`:
///
/// 1. For every connection endpoint, a matching node info exists within the
///    same graph.
/// 2. Every extension's group is in the same `(app_uri, graph_id)`.
///
/// Does not check addon resolvability — that happens during the Start
/// sequence (spec §4.2), since it depends on which addons are registered.
pub fn validate_graph(graph: &Graph) -> Result<()> {
    for conn in &graph.connections {
        if graph.extension(&conn.source).is_none() {
            return Err(TenError::Graph(format!(
                "connection source {} has no matching extension info",
                conn.source
            )));
        }
        if graph.extension(&conn.dest).is_none() {
            return Err(TenError::Graph(format!(
                "connection dest {} has no matching extension info",
                conn.dest
            )));
        }
    }

    for ext in &graph.extensions {
        let group = graph.group(&ext.loc.app_uri, &ext.loc.graph_id, &ext.group_instance_name);
        let Some(group) = group else {
            return Err(TenError::Graph(format!(
                "extension {} references unknown group '{}'",
                ext.loc, ext.group_instance_name
            )));
        };
        if group.app_uri != ext.loc.app_uri || group.graph_id != ext.loc.graph_id {
            return Err(TenError::Graph(format!(
                "extension {} and its group '{}' disagree on (app_uri, graph_id)",
                ext.loc, ext.group_instance_name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{ConnectionInfo, ExtensionGroupInfo, ExtensionInfo, MessageKindFilter, PropertyMatch};
    use crate::loc::Loc;
    use crate::value::Value;

    fn group(instance: &str) -> ExtensionGroupInfo {
        ExtensionGroupInfo {
            app_uri: String::new(),
            graph_id: "g1".into(),
            addon_name: "default_extension_group".into(),
            instance_name: instance.into(),
        }
    }

    fn ext(name: &str, group_instance: &str) -> ExtensionInfo {
        ExtensionInfo {
            loc: Loc::new("", "g1", name),
            addon_name: "test_extension".into(),
            group_instance_name: group_instance.into(),
            properties: Value::Map(Default::default()),
        }
    }

    #[test]
    fn rejects_connection_to_unknown_extension() {
        let graph = Graph {
            name: None,
            groups: vec![group("grp")],
            extensions: vec![ext("ext1", "grp")],
            connections: vec![ConnectionInfo {
                source: Loc::new("", "g1", "ext1"),
                dest: Loc::new("", "g1", "does_not_exist"),
                kind_filter: MessageKindFilter::default(),
                name_filter: None,
                property_match: PropertyMatch::default(),
            }],
        };
        assert!(validate_graph(&graph).is_err());
    }

    #[test]
    fn accepts_well_formed_graph() {
        let graph = Graph {
            name: None,
            groups: vec![group("grp")],
            extensions: vec![ext("ext1", "grp"), ext("ext2", "grp")],
            connections: vec![ConnectionInfo {
                source: Loc::new("", "g1", "ext1"),
                dest: Loc::new("", "g1", "ext2"),
                kind_filter: MessageKindFilter::default(),
                name_filter: None,
                property_match: PropertyMatch::default(),
            }],
        };
        assert!(validate_graph(&graph).is_ok());
    }

    #[test]
    fn rejects_extension_group_app_uri_mismatch() {
        let mut bad_group = group("grp");
        bad_group.app_uri = "msgpack://other:1/".into();
        let graph = Graph {
            name: None,
            groups: vec![bad_group],
            extensions: vec![ext("ext1", "grp")],
            connections: vec![],
        };
        assert!(validate_graph(&graph).is_err());
    }
}
