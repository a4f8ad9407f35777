//! Graph model (spec §3 "Graph", §4.6 Start-Graph protocol wire shapes).

mod model;
mod start_graph;
mod validate;

pub use model::{
    ConnectionInfo, ExtensionGroupInfo, ExtensionInfo, Graph, MessageKindFilter, PropertyMatch,
};
pub use start_graph::{build_graph, ParsedStartGraph};
pub use validate::validate_graph;
