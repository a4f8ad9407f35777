//! Extension-Context (spec §3, §4.2): holds the graph info once `StartGraph`
//! is accepted, plus the set of active extension threads and the counters
//! the Close protocol uses.

use crate::extension_thread::ExtensionThreadHandle;
use crate::graph::Graph;
use std::collections::HashMap;

pub struct ExtensionContext {
    pub graph: Graph,
    pub extension_threads: HashMap<String, ExtensionThreadHandle>,
    pub ready_count: usize,
    pub closed_count: usize,
    pub total_count: usize,
}

impl ExtensionContext {
    pub fn new(graph: Graph) -> Self {
        ExtensionContext {
            graph,
            extension_threads: HashMap::new(),
            ready_count: 0,
            closed_count: 0,
            total_count: 0,
        }
    }

    pub fn insert_thread(&mut self, handle: ExtensionThreadHandle) {
        self.total_count += 1;
        self.extension_threads.insert(handle.group_instance_name.clone(), handle);
    }

    /// `closed_count <= total_count` always (spec §8 invariant); this is
    /// the only place `closed_count` is mutated.
    pub fn note_thread_closed(&mut self) -> bool {
        self.closed_count += 1;
        debug_assert!(self.closed_count <= self.total_count);
        self.closed_count == self.total_count
    }
}
