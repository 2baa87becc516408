//! Link management
//!
//! Endpoints are port names (`node_name:port_name`) or numeric port ids; an
//! all-digit string is always an id. Every operation resolves against a fresh
//! probe of the live graph, not the published listing.
//!
//! [`LinkManager::apply_rule`] links or unlinks whole nodes for the rules in
//! [`super::link_rules`].

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::cache::GraphCache;
use super::link_rules::{CompiledLinkRule, LinkRuleResult, LinkType};
use super::object::{GraphObject, Link, Port, PortDirection};
use super::snapshot::GraphSnapshot;
use crate::error::{ControlError, Result};

/// Result of an existence check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkExists {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_id: Option<u32>,
}

#[derive(Clone)]
pub struct LinkManager {
    cache: Arc<GraphCache>,
}

impl LinkManager {
    pub fn new(cache: Arc<GraphCache>) -> Self {
        Self { cache }
    }

    pub fn list_links(&self) -> Result<Vec<Link>> {
        Ok(self.cache.probe_live()?.links().cloned().collect())
    }

    pub fn list_ports(&self, direction: Option<PortDirection>) -> Result<Vec<Port>> {
        Ok(self.cache.probe_live()?.ports(direction))
    }

    /// Link `output` to `input` and return the link id
    ///
    /// Linking two ports that are already linked succeeds and returns the
    /// existing link's id.
    pub fn create(&self, output: &str, input: &str) -> Result<u32> {
        let live = self.cache.probe_live()?;
        let out_port = resolve(&live, output, PortDirection::Output)?;
        let in_port = resolve(&live, input, PortDirection::Input)?;

        if out_port.node_id == in_port.node_id {
            return Err(ControlError::validation(format!(
                "cannot link node '{}' to itself",
                out_port.node_name
            )));
        }
        if let Some(existing) = live.find_link(out_port.id, in_port.id) {
            return Ok(existing.id);
        }

        let (out_id, in_id) = (out_port.id, in_port.id);
        let id = self
            .cache
            .connection()
            .with(|g| g.create_link(out_id, in_id))?;
        info!("Created link {}: {} -> {}", id, out_port.name, in_port.name);
        Ok(id)
    }

    pub fn delete(&self, link_id: u32) -> Result<()> {
        let live = self.cache.probe_live()?;
        if live.link(link_id).is_none() {
            return Err(ControlError::not_found(format!("link {}", link_id)));
        }
        self.cache.connection().with(|g| g.destroy_link(link_id))?;
        info!("Removed link {}", link_id);
        Ok(())
    }

    /// Remove the link between two ports, returning its id
    pub fn delete_by_name(&self, output: &str, input: &str) -> Result<u32> {
        let live = self.cache.probe_live()?;
        let link_id = find(&live, output, input)?
            .ok_or_else(|| ControlError::not_found(format!("link {} -> {}", output, input)))?;
        self.cache.connection().with(|g| g.destroy_link(link_id))?;
        info!("Removed link {}: {} -> {}", link_id, output, input);
        Ok(link_id)
    }

    pub fn exists(&self, output: &str, input: &str) -> Result<LinkExists> {
        let live = self.cache.probe_live()?;
        let link_id = find(&live, output, input)?;
        Ok(LinkExists {
            exists: link_id.is_some(),
            link_id,
        })
    }
}

impl LinkManager {
    /// Link or unlink every matching source/destination node pair
    ///
    /// Output ports of the source pair with input ports of the destination
    /// in id order. Fails only when no source or no destination matches;
    /// problems with single pairs are reported in the results.
    pub fn apply_rule(&self, rule: &CompiledLinkRule) -> Result<Vec<LinkRuleResult>> {
        let live = self.cache.probe_live()?;
        let sources: Vec<&GraphObject> = live.nodes().filter(|n| rule.source.matches(n)).collect();
        if sources.is_empty() {
            return Err(ControlError::not_found(format!(
                "no source nodes match rule '{}'",
                rule.name
            )));
        }
        let destinations: Vec<&GraphObject> =
            live.nodes().filter(|n| rule.destination.matches(n)).collect();
        if destinations.is_empty() {
            return Err(ControlError::not_found(format!(
                "no destination nodes match rule '{}'",
                rule.name
            )));
        }

        let mut results = Vec::new();
        for source in &sources {
            for dest in &destinations {
                if source.id == dest.id {
                    continue;
                }
                let outputs = rule_ports(&live, source.id, PortDirection::Output);
                let inputs = rule_ports(&live, dest.id, PortDirection::Input);
                match rule.link_type {
                    LinkType::Link => self.link_pairs(&live, source, dest, &outputs, &inputs, &mut results),
                    LinkType::Unlink => self.unlink_pairs(&live, &outputs, &inputs, &mut results),
                }
            }
        }
        Ok(results)
    }

    fn link_pairs(
        &self,
        live: &GraphSnapshot,
        source: &GraphObject,
        dest: &GraphObject,
        outputs: &[&Port],
        inputs: &[&Port],
        results: &mut Vec<LinkRuleResult>,
    ) {
        if outputs.len() != inputs.len() {
            results.push(LinkRuleResult::failed(format!(
                "port count mismatch for {} -> {}: {} output(s), {} input(s)",
                source.name,
                dest.name,
                outputs.len(),
                inputs.len()
            )));
            return;
        }
        if outputs.is_empty() {
            results.push(LinkRuleResult::failed(format!(
                "no ports to link {} -> {}",
                source.name, dest.name
            )));
            return;
        }

        for (out_port, in_port) in outputs.iter().zip(inputs) {
            if live.find_link(out_port.id, in_port.id).is_some() {
                results.push(LinkRuleResult::ok(format!(
                    "link exists: {} -> {}",
                    out_port.name, in_port.name
                )));
                continue;
            }
            let (out_id, in_id) = (out_port.id, in_port.id);
            match self.cache.connection().with(|g| g.create_link(out_id, in_id)) {
                Ok(id) => {
                    info!("Created link {}: {} -> {}", id, out_port.name, in_port.name);
                    results.push(LinkRuleResult::ok(format!(
                        "created link: {} -> {}",
                        out_port.name, in_port.name
                    )));
                }
                Err(e) => results.push(LinkRuleResult::failed(format!(
                    "failed to link {} -> {}: {}",
                    out_port.name, in_port.name, e
                ))),
            }
        }
    }

    fn unlink_pairs(
        &self,
        live: &GraphSnapshot,
        outputs: &[&Port],
        inputs: &[&Port],
        results: &mut Vec<LinkRuleResult>,
    ) {
        for (out_port, in_port) in outputs.iter().zip(inputs) {
            let Some(link_id) = live.find_link(out_port.id, in_port.id).map(|l| l.id) else {
                results.push(LinkRuleResult::ok(format!(
                    "no link: {} -> {}",
                    out_port.name, in_port.name
                )));
                continue;
            };
            match self.cache.connection().with(|g| g.destroy_link(link_id)) {
                Ok(()) => {
                    info!("Removed link {}: {} -> {}", link_id, out_port.name, in_port.name);
                    results.push(LinkRuleResult::ok(format!(
                        "removed link: {} -> {}",
                        out_port.name, in_port.name
                    )));
                }
                Err(e) => results.push(LinkRuleResult::failed(format!(
                    "failed to unlink {} -> {}: {}",
                    out_port.name, in_port.name, e
                ))),
            }
        }
    }
}

/// Non-monitor ports of one direction, in id order
fn rule_ports(live: &GraphSnapshot, node_id: u32, direction: PortDirection) -> Vec<&Port> {
    live.node_ports(node_id)
        .filter(|p| p.direction == direction)
        .filter(|p| live.get(p.id).and_then(|o| o.get("port.monitor")) != Some("true"))
        .collect()
}

fn find(live: &GraphSnapshot, output: &str, input: &str) -> Result<Option<u32>> {
    let out_port = resolve(live, output, PortDirection::Output)?;
    let in_port = resolve(live, input, PortDirection::Input)?;
    Ok(live.find_link(out_port.id, in_port.id).map(|l| l.id))
}

fn resolve<'a>(live: &'a GraphSnapshot, endpoint: &str, direction: PortDirection) -> Result<&'a Port> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ControlError::validation("empty port name"));
    }

    let port = if endpoint.chars().all(|c| c.is_ascii_digit()) {
        let id: u32 = endpoint
            .parse()
            .map_err(|_| ControlError::validation(format!("invalid port id '{}'", endpoint)))?;
        live.port(id)
    } else {
        live.port_by_name(endpoint)
    };
    let port = port.ok_or_else(|| ControlError::not_found(format!("port '{}'", endpoint)))?;

    if port.direction != direction {
        return Err(ControlError::validation(format!(
            "port '{}' is not an {} port",
            port.name,
            match direction {
                PortDirection::Input => "input",
                PortDirection::Output => "output",
            }
        )));
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::backend::GraphConnection;
    use crate::graph::memory::MemoryGraph;
    use crate::graph::object::ObjectType;

    fn setup() -> (MemoryGraph, LinkManager) {
        let graph = MemoryGraph::new();
        let src = graph.add_node("src", "Audio/Source");
        let dst = graph.add_node("dst", "Audio/Sink");
        graph.add_port(src, "out_FL", PortDirection::Output);
        graph.add_port(src, "in_FL", PortDirection::Input);
        graph.add_port(dst, "in_FL", PortDirection::Input);
        let cache = Arc::new(GraphCache::new(Arc::new(GraphConnection::new(graph.clone()))));
        (graph, LinkManager::new(cache))
    }

    #[test]
    fn test_create_is_idempotent() {
        let (graph, links) = setup();
        let id = links.create("src:out_FL", "dst:in_FL").unwrap();
        assert_eq!(links.create("src:out_FL", "dst:in_FL").unwrap(), id);
        assert_eq!(graph.link_count(), 1);
    }

    #[test]
    fn test_self_link_rejected() {
        let (_graph, links) = setup();
        let err = links.create("src:out_FL", "src:in_FL").unwrap_err();
        assert!(matches!(err, ControlError::Validation(_)));
    }

    fn rule(json: &str) -> CompiledLinkRule {
        CompiledLinkRule::compile(&serde_json::from_str(json).unwrap()).unwrap()
    }

    #[test]
    fn test_rule_pairs_ports_in_id_order() {
        let graph = MemoryGraph::new();
        let src = graph.add_node("fx.output", "Stream/Output/Audio");
        let dst = graph.add_node("dac", "Audio/Sink");
        let out_l = graph.add_port(src, "out_FL", PortDirection::Output);
        let out_r = graph.add_port(src, "out_FR", PortDirection::Output);
        let src_id = src.to_string();
        graph.add_object(
            ObjectType::Port,
            &[
                ("node.id", src_id.as_str()),
                ("port.name", "monitor_FL"),
                ("port.direction", "out"),
                ("port.monitor", "true"),
            ],
        );
        let in_l = graph.add_port(dst, "in_FL", PortDirection::Input);
        let in_r = graph.add_port(dst, "in_FR", PortDirection::Input);
        let cache = Arc::new(GraphCache::new(Arc::new(GraphConnection::new(graph.clone()))));
        let links = LinkManager::new(cache);

        let link = rule(
            r#"{"name": "fx", "source": {"node.name": "^fx"}, "destination": {"node.name": "^dac$"}, "type": "link"}"#,
        );
        let results = links.apply_rule(&link).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        let live = links.list_links().unwrap();
        assert!(live.iter().any(|l| l.output_port_id == out_l && l.input_port_id == in_l));
        assert!(live.iter().any(|l| l.output_port_id == out_r && l.input_port_id == in_r));

        // applying again finds the links in place
        let again = links.apply_rule(&link).unwrap();
        assert!(again.iter().all(|r| r.success && r.message.starts_with("link exists")));
        assert_eq!(graph.link_count(), 2);

        let unlink = rule(
            r#"{"name": "fx", "source": {"node.name": "^fx"}, "destination": {"node.name": "^dac$"}, "type": "unlink"}"#,
        );
        assert!(links.apply_rule(&unlink).unwrap().iter().all(|r| r.success));
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_rule_port_count_mismatch_and_no_match() {
        let (graph, links) = setup();
        let wide = graph.add_node("wide", "Audio/Sink");
        graph.add_port(wide, "in_FL", PortDirection::Input);
        graph.add_port(wide, "in_FR", PortDirection::Input);

        let results = links
            .apply_rule(&rule(
                r#"{"name": "r", "source": {"node.name": "^src$"}, "destination": {"node.name": "^(dst|wide)$"}, "type": "link"}"#,
            ))
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1].message.contains("mismatch"));
        assert_eq!(graph.link_count(), 1);

        assert!(matches!(
            links.apply_rule(&rule(
                r#"{"name": "r", "source": {"node.name": "^none$"}, "destination": {"node.name": "^dst$"}, "type": "link"}"#,
            )),
            Err(ControlError::NotFound(_))
        ));
    }

    #[test]
    fn test_endpoint_errors() {
        let (_graph, links) = setup();
        assert!(matches!(
            links.create("nope:out", "dst:in_FL"),
            Err(ControlError::NotFound(_))
        ));
        assert!(matches!(
            links.create("dst:in_FL", "src:in_FL"),
            Err(ControlError::Validation(_))
        ));
        assert!(matches!(links.delete(12345), Err(ControlError::NotFound(_))));
        assert!(matches!(
            links.delete_by_name("src:out_FL", "dst:in_FL"),
            Err(ControlError::NotFound(_))
        ));
    }
}
