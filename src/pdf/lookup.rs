//! Source-to-destination object mapping

use std::collections::HashMap;

use lopdf::ObjectId;

use super::graph::GraphId;

/// Maps objects of one or more source graphs to their copies in a single destination graph.
///
/// An entry is recorded before the copier descends into the object, so a reference cycle
/// reaches the in-progress mapping instead of recursing again. Entries are never removed
/// individually; the whole table is cleared once its destination is finished.
#[derive(Debug, Default)]
pub struct ObjectLookupTable {
    forward: HashMap<(GraphId, ObjectId), ObjectId>,
    reverse: HashMap<ObjectId, (GraphId, ObjectId)>,
}

impl ObjectLookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination identity of a source object, if it was already copied
    pub fn get(&self, graph: GraphId, source: ObjectId) -> Option<ObjectId> {
        self.forward.get(&(graph, source)).copied()
    }

    /// Source identity of a destination object
    pub fn source_of(&self, destination: ObjectId) -> Option<(GraphId, ObjectId)> {
        self.reverse.get(&destination).copied()
    }

    /// Return the recorded destination for `source`, or record the one produced by `create`.
    ///
    /// The boolean is true when `create` was called.
    pub fn map_or_create<F>(&mut self, graph: GraphId, source: ObjectId, create: F) -> (ObjectId, bool)
    where
        F: FnOnce() -> ObjectId,
    {
        if let Some(existing) = self.get(graph, source) {
            return (existing, false);
        }
        let destination = create();
        self.record(graph, source, destination);
        (destination, true)
    }

    /// Record a mapping. An existing mapping for `source` is kept.
    pub fn record(&mut self, graph: GraphId, source: ObjectId, destination: ObjectId) -> ObjectId {
        let destination = *self.forward.entry((graph, source)).or_insert(destination);
        self.reverse.entry(destination).or_insert((graph, source));
        destination
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}
