//! Cached parameter view of one plugin node
//!
//! The view is loaded on first use and replaced wholesale: a write merges its
//! batch into a copy and swaps the copy in. Readers never see a half-applied
//! batch.

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tracing::{debug, info};

use super::value::{ParamMap, ParamValue};
use crate::error::{ControlError, Result};
use crate::graph::GraphCache;
use crate::revision::Revision;

/// A node's id together with its last known parameters
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub node_id: u32,
    pub params: ParamMap,
}

impl NodeView {
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }
}

pub struct NodeParams {
    node_name: String,
    cache: Arc<GraphCache>,
    revision: Arc<Revision>,
    view: ArcSwapOption<NodeView>,
}

impl NodeParams {
    pub fn new(node_name: impl Into<String>, cache: Arc<GraphCache>, revision: Arc<Revision>) -> Self {
        Self {
            node_name: node_name.into(),
            cache,
            revision,
            view: ArcSwapOption::empty(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// The cached view, loading it if needed
    pub fn load(&self) -> Result<Arc<NodeView>> {
        match self.view.load_full() {
            Some(view) => Ok(view),
            None => self.refresh(),
        }
    }

    /// Re-read the node's parameters from the live graph
    ///
    /// A node that is missing from the graph reports `ProbeFailure`. When a
    /// cached view existed and the re-read values differ from it, the module
    /// revision advances.
    pub fn refresh(&self) -> Result<Arc<NodeView>> {
        self.revision.observe(|_| {
            let live = self.cache.probe_live()?;
            let node_id = live
                .find_node(&self.node_name)
                .map(|n| n.id)
                .ok_or_else(|| {
                    ControlError::ProbeFailure(format!("node '{}' not found", self.node_name))
                })?;

            let params = self
                .cache
                .connection()
                .with(|g| g.node_params(node_id))?;
            debug!(
                "Loaded {} parameters from {} (id {})",
                params.len(),
                self.node_name,
                node_id
            );

            let changed = self
                .view
                .load_full()
                .is_some_and(|previous| previous.params != params);
            if changed {
                debug!("Parameters of {} changed in the graph", self.node_name);
                self.revision.advance();
            }

            let view = Arc::new(NodeView { node_id, params });
            self.view.store(Some(view.clone()));
            Ok(view)
        })
    }

    /// Write a batch in one backend call, then fold it into the cached view
    pub fn set(&self, batch: ParamMap) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let loaded = self.load()?;
        self.revision.mutate(|| {
            let base = self.view.load_full().unwrap_or(loaded);
            self.cache
                .connection()
                .with(|g| g.set_node_params(base.node_id, &batch))?;

            let mut next = NodeView::clone(&base);
            let count = batch.len();
            next.params.extend(batch);
            self.view.store(Some(Arc::new(next)));
            info!("Wrote {} parameters to {}", count, self.node_name);
            Ok(())
        })
    }

    /// Drop the cached view; the next access reloads it
    pub fn invalidate(&self) {
        self.view.store(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphConnection, MemoryGraph};

    fn setup() -> (MemoryGraph, u32, NodeParams, Arc<Revision>) {
        let graph = MemoryGraph::new();
        let node = graph.add_node("fx", "Audio/Sink");
        graph.set_param(node, "fx:gain", 0.0f32);
        let cache = Arc::new(GraphCache::new(Arc::new(GraphConnection::new(graph.clone()))));
        let revision = Arc::new(Revision::new());
        let params = NodeParams::new("fx", cache, revision.clone());
        (graph, node, params, revision)
    }

    #[test]
    fn test_lazy_load_and_write_through() {
        let (graph, node, params, revision) = setup();
        assert_eq!(params.load().unwrap().node_id, node);

        let mut batch = ParamMap::new();
        batch.insert("fx:gain".into(), ParamValue::Float(-3.0));
        params.set(batch).unwrap();

        assert_eq!(graph.param(node, "fx:gain"), Some(ParamValue::Float(-3.0)));
        assert_eq!(params.load().unwrap().get("fx:gain"), Some(&ParamValue::Float(-3.0)));
        assert_eq!(revision.current(), 1);
    }

    #[test]
    fn test_failed_write_keeps_view_and_revision() {
        let (graph, _node, params, revision) = setup();
        params.load().unwrap();
        graph.set_offline(true);

        let mut batch = ParamMap::new();
        batch.insert("fx:gain".into(), ParamValue::Float(6.0));
        assert!(params.set(batch).is_err());

        graph.set_offline(false);
        assert_eq!(params.load().unwrap().get("fx:gain"), Some(&ParamValue::Float(0.0)));
        assert_eq!(revision.current(), 0);
    }

    #[test]
    fn test_refresh_advances_revision_only_on_change() {
        let (graph, node, params, revision) = setup();
        params.refresh().unwrap();
        assert_eq!(revision.current(), 0);

        params.refresh().unwrap();
        assert_eq!(revision.current(), 0);

        graph.set_param(node, "fx:gain", 4.0f32);
        let view = params.refresh().unwrap();
        assert_eq!(view.get("fx:gain"), Some(&ParamValue::Float(4.0)));
        assert_eq!(revision.current(), 1);
    }

    #[test]
    fn test_missing_node_is_probe_failure() {
        let (_graph, _node, _params, revision) = setup();
        let graph = MemoryGraph::new();
        let cache = Arc::new(GraphCache::new(Arc::new(GraphConnection::new(graph))));
        let params = NodeParams::new("absent", cache, revision);
        assert!(matches!(params.load(), Err(ControlError::ProbeFailure(_))));
    }
}
