//! In-process live graph
//!
//! `MemoryGraph` behaves like a small PipeWire instance: it hands out ids,
//! keeps node parameters and volumes, and validates link endpoints. Handles
//! are cheap clones sharing one state, so a test can keep a handle while the
//! control plane owns another.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::backend::LiveGraph;
use super::object::{ObjectType, PortDirection, RawObject};
use crate::error::{ControlError, Result};
use crate::params::value::{ParamMap, ParamValue};

#[derive(Debug)]
struct MemoryState {
    objects: BTreeMap<u32, RawObject>,
    params: HashMap<u32, ParamMap>,
    volumes: HashMap<u32, f32>,
    next_id: u32,
    offline: bool,
    param_writes: usize,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            params: HashMap::new(),
            volumes: HashMap::new(),
            next_id: 30,
            offline: false,
            param_writes: 0,
        }
    }
}

impl MemoryState {
    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            Err(ControlError::backend("graph connection lost"))
        } else {
            Ok(())
        }
    }

    fn port(&self, id: u32) -> Option<(u32, PortDirection)> {
        let obj = self.objects.get(&id)?;
        if obj.object_type != ObjectType::Port {
            return None;
        }
        let node = obj.properties.get("node.id")?.parse().ok()?;
        let direction = PortDirection::from_property(obj.properties.get("port.direction")?)?;
        Some((node, direction))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// Add an object with arbitrary properties
    pub fn add_object(&self, object_type: ObjectType, props: &[(&str, &str)]) -> u32 {
        let mut state = self.state.lock();
        let id = state.alloc();
        let mut raw = RawObject::new(id, object_type);
        raw.properties.insert("object.serial".into(), id.to_string());
        for (k, v) in props {
            raw.properties.insert((*k).to_string(), (*v).to_string());
        }
        state.objects.insert(id, raw);
        id
    }

    pub fn add_node(&self, name: &str, media_class: &str) -> u32 {
        self.add_object(
            ObjectType::Node,
            &[("node.name", name), ("media.class", media_class)],
        )
    }

    pub fn add_device(&self, name: &str) -> u32 {
        self.add_object(
            ObjectType::Device,
            &[("device.name", name), ("media.class", "Audio/Device")],
        )
    }

    pub fn add_port(&self, node_id: u32, port_name: &str, direction: PortDirection) -> u32 {
        let node = node_id.to_string();
        self.add_object(
            ObjectType::Port,
            &[
                ("node.id", node.as_str()),
                ("port.name", port_name),
                ("port.direction", direction.as_property()),
            ],
        )
    }

    /// Replace a node's parameter map
    pub fn set_params(&self, node_id: u32, params: ParamMap) {
        self.state.lock().params.insert(node_id, params);
    }

    pub fn set_param(&self, node_id: u32, key: &str, value: impl Into<ParamValue>) {
        self.state
            .lock()
            .params
            .entry(node_id)
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Give an object a volume control
    pub fn set_volume_control(&self, id: u32, volume: f32) {
        self.state.lock().volumes.insert(id, volume);
    }

    pub fn remove(&self, id: u32) {
        let mut state = self.state.lock();
        state.objects.remove(&id);
        state.params.remove(&id);
        state.volumes.remove(&id);
    }

    /// Make every backend call fail until switched back
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn param(&self, node_id: u32, key: &str) -> Option<ParamValue> {
        self.state
            .lock()
            .params
            .get(&node_id)
            .and_then(|p| p.get(key).cloned())
    }

    pub fn volume_of(&self, id: u32) -> Option<f32> {
        self.state.lock().volumes.get(&id).copied()
    }

    /// Number of parameter batches written so far
    pub fn param_writes(&self) -> usize {
        self.state.lock().param_writes
    }

    pub fn link_count(&self) -> usize {
        self.state
            .lock()
            .objects
            .values()
            .filter(|o| o.object_type == ObjectType::Link)
            .count()
    }
}

impl LiveGraph for MemoryGraph {
    fn enumerate(&mut self) -> Result<Vec<RawObject>> {
        let state = self.state.lock();
        state.check_online()?;
        Ok(state.objects.values().cloned().collect())
    }

    fn node_params(&mut self, node_id: u32) -> Result<ParamMap> {
        let state = self.state.lock();
        state.check_online()?;
        if !state.objects.contains_key(&node_id) {
            return Err(ControlError::backend(format!("no object {}", node_id)));
        }
        Ok(state.params.get(&node_id).cloned().unwrap_or_default())
    }

    fn set_node_params(&mut self, node_id: u32, params: &ParamMap) -> Result<()> {
        let mut state = self.state.lock();
        state.check_online()?;
        if !state.objects.contains_key(&node_id) {
            return Err(ControlError::backend(format!("no object {}", node_id)));
        }
        let current = state.params.entry(node_id).or_default();
        for (k, v) in params {
            current.insert(k.clone(), v.clone());
        }
        state.param_writes += 1;
        Ok(())
    }

    fn create_link(&mut self, output_port: u32, input_port: u32) -> Result<u32> {
        let mut state = self.state.lock();
        state.check_online()?;

        let (out_node, out_dir) = state
            .port(output_port)
            .ok_or_else(|| ControlError::backend(format!("no port {}", output_port)))?;
        let (in_node, in_dir) = state
            .port(input_port)
            .ok_or_else(|| ControlError::backend(format!("no port {}", input_port)))?;

        if out_dir != PortDirection::Output || in_dir != PortDirection::Input {
            return Err(ControlError::backend(format!(
                "cannot link port {} to port {}: wrong direction",
                output_port, input_port
            )));
        }
        if out_node == in_node {
            return Err(ControlError::backend("cannot link a node to itself"));
        }

        let (out_port, in_port) = (output_port.to_string(), input_port.to_string());
        let duplicate = state.objects.values().any(|o| {
            o.object_type == ObjectType::Link
                && o.properties.get("link.output.port") == Some(&out_port)
                && o.properties.get("link.input.port") == Some(&in_port)
        });
        if duplicate {
            return Err(ControlError::backend("link already exists"));
        }

        let id = state.alloc();
        let raw = RawObject::new(id, ObjectType::Link)
            .with_prop("object.serial", id.to_string())
            .with_prop("link.output.node", out_node.to_string())
            .with_prop("link.output.port", out_port)
            .with_prop("link.input.node", in_node.to_string())
            .with_prop("link.input.port", in_port);
        state.objects.insert(id, raw);
        Ok(id)
    }

    fn destroy_link(&mut self, link_id: u32) -> Result<()> {
        let mut state = self.state.lock();
        state.check_online()?;
        match state.objects.get(&link_id) {
            Some(o) if o.object_type == ObjectType::Link => {
                state.objects.remove(&link_id);
                Ok(())
            }
            _ => Err(ControlError::backend(format!("no link {}", link_id))),
        }
    }

    fn volume(&mut self, id: u32) -> Result<Option<f32>> {
        let state = self.state.lock();
        state.check_online()?;
        Ok(state.volumes.get(&id).copied())
    }

    fn set_volume(&mut self, id: u32, volume: f32) -> Result<()> {
        let mut state = self.state.lock();
        state.check_online()?;
        match state.volumes.get_mut(&id) {
            Some(v) => {
                *v = volume;
                Ok(())
            }
            None => Err(ControlError::backend(format!(
                "object {} has no volume control",
                id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_validation() {
        let mut graph = MemoryGraph::new();
        let a = graph.add_node("a", "Audio/Source");
        let b = graph.add_node("b", "Audio/Sink");
        let a_out = graph.add_port(a, "out", PortDirection::Output);
        let a_in = graph.add_port(a, "in", PortDirection::Input);
        let b_in = graph.add_port(b, "in", PortDirection::Input);

        let link = graph.create_link(a_out, b_in).unwrap();
        assert_eq!(graph.link_count(), 1);
        assert!(graph.create_link(a_out, b_in).is_err());
        assert!(graph.create_link(a_out, a_in).is_err());
        assert!(graph.create_link(b_in, a_out).is_err());
        assert!(graph.create_link(a_out, 9999).is_err());

        graph.destroy_link(link).unwrap();
        assert_eq!(graph.link_count(), 0);
        assert!(graph.destroy_link(link).is_err());
    }

    #[test]
    fn test_batched_params() {
        let mut graph = MemoryGraph::new();
        let node = graph.add_node("fx", "Audio/Sink");
        graph.set_param(node, "fx:gain", 0.0f32);

        let mut batch = ParamMap::new();
        batch.insert("fx:gain".into(), ParamValue::Float(3.0));
        batch.insert("fx:on".into(), ParamValue::Bool(true));
        graph.set_node_params(node, &batch).unwrap();

        assert_eq!(graph.param_writes(), 1);
        assert_eq!(graph.param(node, "fx:gain"), Some(ParamValue::Float(3.0)));
        assert_eq!(graph.node_params(node).unwrap().len(), 2);
    }

    #[test]
    fn test_offline_fails_calls() {
        let mut graph = MemoryGraph::new();
        graph.add_node("a", "Audio/Sink");
        graph.set_offline(true);
        assert!(graph.enumerate().is_err());
        graph.set_offline(false);
        assert_eq!(graph.enumerate().unwrap().len(), 1);
    }
}
