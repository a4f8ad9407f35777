//! Location addressing (spec §3 "Location (`Loc`)").

use std::fmt;

/// `(app_uri, graph_id, extension_name)`. Any field may be empty, meaning
/// "current" — resolved relative to whatever context a message is passing
/// through (the owning app, the owning graph, the sending extension).
/// Locations are value-typed, hashable, and compare string-exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Loc {
    pub app_uri: String,
    pub graph_id: String,
    pub extension_name: String,
}

impl Loc {
    pub fn new(app_uri: impl Into<String>, graph_id: impl Into<String>, extension_name: impl Into<String>) -> Self {
        Loc {
            app_uri: app_uri.into(),
            graph_id: graph_id.into(),
            extension_name: extension_name.into(),
        }
    }

    /// A `Loc` naming only an extension within the current app/graph.
    pub fn local(extension_name: impl Into<String>) -> Self {
        Loc {
            app_uri: String::new(),
            graph_id: String::new(),
            extension_name: extension_name.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.app_uri.is_empty() && self.graph_id.is_empty() && self.extension_name.is_empty()
    }

    /// `true` when the `app_uri` is empty or equals `current_app_uri`, i.e.
    /// the destination resolves to this process (spec §4.2 routing: "A
    /// destination whose `app_uri` is not this App is handed to the wire
    /// layer").
    pub fn is_local_to(&self, current_app_uri: &str) -> bool {
        self.app_uri.is_empty() || self.app_uri == current_app_uri
    }

    /// Fills empty fields from `defaults`, used when rewriting a message's
    /// source/dest locations as it crosses a boundary that knows the
    /// concrete app_uri/graph_id.
    pub fn resolved_against(&self, defaults: &Loc) -> Loc {
        Loc {
            app_uri: if self.app_uri.is_empty() { defaults.app_uri.clone() } else { self.app_uri.clone() },
            graph_id: if self.graph_id.is_empty() { defaults.graph_id.clone() } else { self.graph_id.clone() },
            extension_name: if self.extension_name.is_empty() {
                defaults.extension_name.clone()
            } else {
                self.extension_name.clone()
            },
        }
    }

    /// Same as [`Loc::resolved_against`] but leaves `extension_name` alone.
    /// Used to resolve a message *destination* against the sending
    /// extension's own location: an empty `app_uri`/`graph_id` means "this
    /// app/this graph", but an empty `extension_name` means "the app/engine
    /// itself", not "me" — filling it from `defaults` would silently turn a
    /// `CloseApp` addressed at the app into one addressed back at the
    /// sender.
    pub fn resolved_dest_against(&self, defaults: &Loc) -> Loc {
        Loc {
            app_uri: if self.app_uri.is_empty() { defaults.app_uri.clone() } else { self.app_uri.clone() },
            graph_id: if self.graph_id.is_empty() { defaults.graph_id.clone() } else { self.graph_id.clone() },
            extension_name: self.extension_name.clone(),
        }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app_uri, self.graph_id, self.extension_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_against_fills_only_empty_fields() {
        let defaults = Loc::new("msgpack://host:1/", "g1", "ext_a");
        let partial = Loc::new("", "", "ext_b");
        let resolved = partial.resolved_against(&defaults);
        assert_eq!(resolved, Loc::new("msgpack://host:1/", "g1", "ext_b"));
    }

    #[test]
    fn is_local_to_empty_app_uri() {
        let loc = Loc::new("", "g1", "ext_a");
        assert!(loc.is_local_to("msgpack://host:1/"));
        let remote = Loc::new("msgpack://other:2/", "g1", "ext_a");
        assert!(!remote.is_local_to("msgpack://host:1/"));
    }

    #[test]
    fn resolved_dest_against_leaves_an_all_empty_extension_name_alone() {
        let owner = Loc::new("msgpack://host:1/", "g1", "ext_a");
        let dest = Loc::default();
        let resolved = dest.resolved_dest_against(&owner);
        assert_eq!(resolved, Loc::new("msgpack://host:1/", "g1", ""));
    }
}
