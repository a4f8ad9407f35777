use crate::loc::Loc;
use crate::message::MessageKind;
use crate::value::Value;

/// `(app_uri, graph_id, addon_name, instance_name)` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionGroupInfo {
    pub app_uri: String,
    pub graph_id: String,
    pub addon_name: String,
    pub instance_name: String,
}

/// `(loc, addon_name, group_instance_name, properties)` (spec §3).
#[derive(Debug, Clone)]
pub struct ExtensionInfo {
    pub loc: Loc,
    pub addon_name: String,
    pub group_instance_name: String,
    pub properties: Value,
}

/// Restricts which message kinds a connection carries. `None` means no
/// filter (all kinds).
#[derive(Debug, Clone, Default)]
pub struct MessageKindFilter(pub Option<Vec<MessageKind>>);

impl MessageKindFilter {
    pub fn allows(&self, kind: MessageKind) -> bool {
        match &self.0 {
            None => true,
            Some(kinds) => kinds.contains(&kind),
        }
    }
}

/// Optional property-value predicate on a connection: every `(key,
/// expected)` pair must match the message's property at that path.
#[derive(Debug, Clone, Default)]
pub struct PropertyMatch(pub Vec<(String, Value)>);

impl PropertyMatch {
    pub fn matches(&self, property: &Value) -> bool {
        self.0.iter().all(|(path, expected)| property.get_path(path) == Some(expected))
    }
}

/// `(source Loc, dest Loc, message-kind-filter, name-filter)` (spec §3).
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub source: Loc,
    pub dest: Loc,
    pub kind_filter: MessageKindFilter,
    pub name_filter: Option<String>,
    pub property_match: PropertyMatch,
}

impl ConnectionInfo {
    /// Whether this connection carries `kind`/`name` messages from `src`.
    pub fn matches(&self, src: &Loc, kind: MessageKind, name: &str, property: &Value) -> bool {
        &self.source == src
            && self.kind_filter.allows(kind)
            && self.name_filter.as_deref().is_none_or(|n| n == name)
            && self.property_match.matches(property)
    }
}

/// A parsed graph description: nodes (extensions + groups) and connections
/// between them (spec §3). Invariants are checked by `validate_graph`, not
/// enforced at construction, so a `Graph` can represent an
/// in-progress/unvalidated description while it's being built from a
/// `StartGraph` command.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub name: Option<String>,
    pub groups: Vec<ExtensionGroupInfo>,
    pub extensions: Vec<ExtensionInfo>,
    pub connections: Vec<ConnectionInfo>,
}

impl Graph {
    pub fn group(&self, app_uri: &str, graph_id: &str, instance_name: &str) -> Option<&ExtensionGroupInfo> {
        self.groups
            .iter()
            .find(|g| g.app_uri == app_uri && g.graph_id == graph_id && g.instance_name == instance_name)
    }

    pub fn extension(&self, loc: &Loc) -> Option<&ExtensionInfo> {
        self.extensions.iter().find(|e| &e.loc == loc)
    }

    /// Groups whose `app_uri` matches `app_uri` (spec §4.2 start sequence
    /// step 1: "Partition the graph's extension-group infos by `app_uri`").
    pub fn groups_for_app<'a>(&'a self, app_uri: &'a str) -> impl Iterator<Item = &'a ExtensionGroupInfo> {
        self.groups.iter().filter(move |g| g.app_uri == app_uri)
    }

    pub fn extensions_in_group<'a>(&'a self, graph_id: &'a str, group_instance_name: &'a str) -> impl Iterator<Item = &'a ExtensionInfo> {
        self.extensions
            .iter()
            .filter(move |e| e.loc.graph_id == graph_id && e.group_instance_name == group_instance_name)
    }

    /// Whether a message of `kind`/`name` from `src` is allowed to reach
    /// `dest` (spec §4.2 "Routing" / §3 "Message Router"). A graph with no
    /// declared connections at all imposes no gating — every extension can
    /// reach every other one directly, matching the trivial single/two-
    /// extension graphs used throughout spec §8's scenarios, none of which
    /// declare a `connections` list.
    pub fn connected(&self, src: &Loc, dest: &Loc, kind: MessageKind, name: &str, property: &Value) -> bool {
        if self.connections.is_empty() {
            return true;
        }
        self.connections.iter().any(|c| &c.dest == dest && c.matches(src, kind, name, property))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(source: &str, dest: &str, name_filter: Option<&str>) -> ConnectionInfo {
        ConnectionInfo {
            source: Loc::local(source),
            dest: Loc::local(dest),
            kind_filter: MessageKindFilter(None),
            name_filter: name_filter.map(str::to_string),
            property_match: PropertyMatch::default(),
        }
    }

    #[test]
    fn connection_matches_checks_source_kind_name_and_property() {
        let c = conn("ext1", "ext2", Some("hello_world"));
        let property = Value::Map(Default::default());
        assert!(c.matches(&Loc::local("ext1"), MessageKind::Cmd, "hello_world", &property));
        assert!(!c.matches(&Loc::local("ext1"), MessageKind::Cmd, "other_cmd", &property));
        assert!(!c.matches(&Loc::local("ext3"), MessageKind::Cmd, "hello_world", &property));
    }

    #[test]
    fn graph_with_no_connections_allows_everything() {
        let graph = Graph::default();
        let property = Value::Map(Default::default());
        assert!(graph.connected(&Loc::local("ext1"), &Loc::local("ext2"), MessageKind::Cmd, "hello_world", &property));
    }

    #[test]
    fn graph_with_connections_rejects_an_unlisted_dest() {
        let graph = Graph {
            connections: vec![conn("ext1", "ext2", None)],
            ..Default::default()
        };
        let property = Value::Map(Default::default());
        assert!(graph.connected(&Loc::local("ext1"), &Loc::local("ext2"), MessageKind::Data, "x", &property));
        assert!(!graph.connected(&Loc::local("ext1"), &Loc::local("ext3"), MessageKind::Data, "x", &property));
    }
}
