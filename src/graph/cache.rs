//! Graph cache
//!
//! Holds the current [`GraphSnapshot`] behind an `ArcSwap`. Readers load the
//! snapshot without locking and keep it for the whole request; `refresh()`
//! builds a complete new snapshot and swaps it in. Nothing else updates the
//! published listing.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use super::backend::GraphConnection;
use super::object::{GraphObject, ObjectType};
use super::snapshot::GraphSnapshot;
use crate::error::{ControlError, Result};

pub struct GraphCache {
    connection: Arc<GraphConnection>,
    snapshot: ArcSwap<GraphSnapshot>,
    /// Serializes refreshes so they publish in order
    refresh_lock: Mutex<()>,
}

impl GraphCache {
    /// An empty cache; call `refresh()` to populate it
    pub fn new(connection: Arc<GraphConnection>) -> Self {
        Self {
            connection,
            snapshot: ArcSwap::from_pointee(GraphSnapshot::empty()),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn connection(&self) -> &Arc<GraphConnection> {
        &self.connection
    }

    /// Re-enumerate the live graph and publish the result
    ///
    /// Returns the number of objects in the new snapshot. On failure the
    /// previous snapshot stays published.
    pub fn refresh(&self) -> Result<usize> {
        let _guard = self.refresh_lock.lock();
        let snapshot = self.probe_live()?;
        let count = snapshot.len();
        self.snapshot.store(Arc::new(snapshot));
        info!("Graph cache refreshed: {} objects", count);
        Ok(count)
    }

    /// Build a snapshot of the live graph without publishing it
    pub fn probe_live(&self) -> Result<GraphSnapshot> {
        let raw = self.connection.with(|g| g.enumerate())?;
        debug!("Enumerated {} raw objects", raw.len());
        // indexing happens outside the connection lock
        Ok(GraphSnapshot::from_raw(raw))
    }

    /// The current snapshot
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.snapshot.load_full()
    }

    pub fn list(&self, filter: Option<ObjectType>) -> Vec<GraphObject> {
        self.snapshot.load().list(filter)
    }

    pub fn get(&self, id: u32) -> Result<GraphObject> {
        self.snapshot
            .load()
            .get(id)
            .cloned()
            .ok_or_else(|| ControlError::not_found(format!("object {}", id)))
    }

    pub fn find_by_name(&self, name: &str) -> Option<GraphObject> {
        self.snapshot.load().find_by_name(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::memory::MemoryGraph;

    fn cache_with(graph: &MemoryGraph) -> GraphCache {
        GraphCache::new(Arc::new(GraphConnection::new(graph.clone())))
    }

    #[test]
    fn test_listing_only_changes_on_refresh() {
        let graph = MemoryGraph::new();
        graph.add_node("a", "Audio/Sink");
        let cache = cache_with(&graph);
        assert!(cache.list(None).is_empty());

        assert_eq!(cache.refresh().unwrap(), 1);
        graph.add_node("b", "Audio/Sink");
        assert_eq!(cache.list(Some(ObjectType::Node)).len(), 1);

        assert_eq!(cache.refresh().unwrap(), 2);
        assert_eq!(cache.list(Some(ObjectType::Node)).len(), 2);
    }

    #[test]
    fn test_reader_keeps_its_version() {
        let graph = MemoryGraph::new();
        let a = graph.add_node("a", "Audio/Sink");
        let cache = cache_with(&graph);
        cache.refresh().unwrap();

        let held = cache.snapshot();
        graph.remove(a);
        cache.refresh().unwrap();

        assert!(held.get(a).is_some());
        assert!(matches!(cache.get(a), Err(ControlError::NotFound(_))));
    }

    #[test]
    fn test_failed_refresh_keeps_previous() {
        let graph = MemoryGraph::new();
        graph.add_node("a", "Audio/Sink");
        let cache = cache_with(&graph);
        cache.refresh().unwrap();

        graph.set_offline(true);
        assert!(cache.refresh().is_err());
        assert_eq!(cache.list(None).len(), 1);
        assert!(cache.find_by_name("a").is_some());
    }
}
