//! Graphviz DOT rendering of the audio topology
//!
//! Filter-chains appear as one combined node, port links are folded into
//! node-to-node edges, and MIDI/video nodes are left out.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Write;

use super::object::GraphObject;
use super::snapshot::GraphSnapshot;

/// A filter-chain's two halves merged into one graph node
#[derive(Debug, Clone, PartialEq)]
struct Chain {
    name: String,
    input_id: u32,
    output_id: u32,
}

fn is_audio(obj: &GraphObject) -> bool {
    let class = obj.media_class().unwrap_or_default().to_ascii_lowercase();
    let name = obj.get("node.name").unwrap_or_default().to_ascii_lowercase();
    !(class.contains("midi") || class.contains("video") || name.contains("midi"))
}

fn detect_chains(nodes: &[&GraphObject]) -> Vec<Chain> {
    let by_name: HashMap<&str, &GraphObject> = nodes
        .iter()
        .filter_map(|n| n.get("node.name").map(|name| (name, *n)))
        .collect();
    let mut used = HashSet::new();
    let mut chains = Vec::new();

    // `X` (Audio/Sink or Audio/Source/Virtual) paired with `X.output`
    for node in nodes {
        let (Some(name), Some(class)) = (node.get("node.name"), node.media_class()) else {
            continue;
        };
        if class != "Audio/Sink" && class != "Audio/Source/Virtual" {
            continue;
        }
        let Some(output) = by_name.get(format!("{}.output", name).as_str()) else {
            continue;
        };
        if output.media_class() == Some("Stream/Output/Audio")
            && !used.contains(&node.id)
            && !used.contains(&output.id)
        {
            used.insert(node.id);
            used.insert(output.id);
            chains.push(Chain {
                name: name.to_string(),
                input_id: node.id,
                output_id: output.id,
            });
        }
    }

    // `X_input.proc` paired with `X_output.proc`
    for node in nodes {
        let Some(base) = node
            .get("node.name")
            .and_then(|n| n.strip_suffix("_input.proc"))
        else {
            continue;
        };
        let Some(output) = by_name.get(format!("{}_output.proc", base).as_str()) else {
            continue;
        };
        if !used.contains(&node.id) && !used.contains(&output.id) {
            used.insert(node.id);
            used.insert(output.id);
            chains.push(Chain {
                name: base.to_string(),
                input_id: node.id,
                output_id: output.id,
            });
        }
    }

    chains
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn node_color(obj: &GraphObject) -> &'static str {
    let class = obj.media_class().unwrap_or_default().to_ascii_lowercase();
    if class.contains("sink") || class.contains("playback") {
        "lightblue"
    } else if class.contains("source") || class.contains("capture") {
        "lightgreen"
    } else if class.contains("filter") {
        "lightyellow"
    } else {
        "white"
    }
}

/// Render the snapshot as a DOT digraph
pub fn render_dot(snapshot: &GraphSnapshot) -> String {
    let nodes: Vec<&GraphObject> = snapshot.nodes().filter(|n| is_audio(n)).collect();
    let devices: Vec<&GraphObject> = snapshot.devices().filter(|d| is_audio(d)).collect();
    let audio_nodes: HashSet<u32> = nodes.iter().map(|n| n.id).collect();

    let chains = detect_chains(&nodes);
    let mut chain_of: HashMap<u32, &Chain> = HashMap::new();
    for chain in &chains {
        chain_of.insert(chain.input_id, chain);
        chain_of.insert(chain.output_id, chain);
    }
    let vertex = |node_id: u32| match chain_of.get(&node_id) {
        Some(chain) => format!("chain_{}", chain.input_id),
        None => format!("node_{}", node_id),
    };

    let mut dot = String::new();
    dot.push_str("digraph PipeWire {\n");
    dot.push_str("    rankdir=LR;\n");
    dot.push_str("    node [shape=box, style=filled];\n\n");

    if !devices.is_empty() {
        dot.push_str("    subgraph cluster_devices {\n");
        dot.push_str("        label=\"Devices\";\n");
        dot.push_str("        style=dashed;\n");
        dot.push_str("        color=gray;\n");
        for device in &devices {
            let _ = writeln!(
                dot,
                "        dev_{} [label=\"{}\", fillcolor=lightgray];",
                device.id,
                escape(&device.name)
            );
        }
        dot.push_str("    }\n\n");
    }

    for chain in &chains {
        let _ = writeln!(
            dot,
            "    chain_{} [label=\"{}\\nID: {}/{}\", fillcolor=lightyellow, style=\"filled,bold\"];",
            chain.input_id,
            escape(&chain.name),
            chain.input_id,
            chain.output_id
        );
    }

    for node in nodes.iter().filter(|n| !chain_of.contains_key(&n.id)) {
        let _ = writeln!(
            dot,
            "    node_{} [label=\"{}\\nID: {}\", fillcolor={}];",
            node.id,
            escape(&node.name),
            node.id,
            node_color(node)
        );
    }
    dot.push('\n');

    let mut edges = BTreeSet::new();
    for link in snapshot.links() {
        let (Some(out_port), Some(in_port)) = (
            snapshot.port(link.output_port_id),
            snapshot.port(link.input_port_id),
        ) else {
            continue;
        };
        if !audio_nodes.contains(&out_port.node_id) || !audio_nodes.contains(&in_port.node_id) {
            continue;
        }
        let (from, to) = (vertex(out_port.node_id), vertex(in_port.node_id));
        // links inside one chain collapse to a self-edge; drop them
        if from != to {
            edges.insert((from, to));
        }
    }
    for (from, to) in edges {
        let _ = writeln!(dot, "    {} -> {};", from, to);
    }

    dot.push_str("}\n");
    dot
}
