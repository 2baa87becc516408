#![allow(dead_code)]

use pwcontrol_lib::graph::{MemoryGraph, PortDirection};
use pwcontrol_lib::params::ParamValue;
use pwcontrol_lib::{ControlPlane, ServiceConfig};
use tempfile::TempDir;

pub const BANDS: usize = 20;

pub struct Fixture {
    pub dir: TempDir,
    pub graph: MemoryGraph,
    pub plane: ControlPlane,
    pub eq_node: u32,
    pub riaa_node: u32,
    pub sink: u32,
    pub player: u32,
    pub device: u32,
}

/// A 2x2 speaker EQ node with `BANDS` bands per block
pub fn add_speakereq(graph: &MemoryGraph) -> u32 {
    let node = graph.add_node("speakereq2x2", "Audio/Sink");
    let p = |key: &str, value: ParamValue| graph.set_param(node, &format!("speakereq2x2:{}", key), value);

    p("Enable", ParamValue::Bool(true));
    p("master_gain_db", ParamValue::Float(0.0));
    for i in 0..2 {
        for j in 0..2 {
            let v = if i == j { 1.0 } else { 0.0 };
            p(&format!("xbar_{}_to_{}", i, j), ParamValue::Float(v));
        }
    }
    for block in ["input_0", "input_1", "output_0", "output_1"] {
        p(&format!("{}_gain_db", block), ParamValue::Float(0.0));
        for n in 1..=BANDS {
            p(&format!("{}_eq_{}_type", block, n), ParamValue::Int(0));
            p(&format!("{}_eq_{}_f", block, n), ParamValue::Float(1000.0));
            p(&format!("{}_eq_{}_q", block, n), ParamValue::Float(1.0));
            p(&format!("{}_eq_{}_gain", block, n), ParamValue::Float(0.0));
            p(&format!("{}_eq_{}_enabled", block, n), ParamValue::Bool(true));
        }
    }
    for j in 0..2 {
        p(&format!("delay_{}_ms", j), ParamValue::Float(0.0));
    }
    node
}

pub fn add_riaa(graph: &MemoryGraph) -> u32 {
    let node = graph.add_node("riaa", "Audio/Sink");
    let p = |key: &str, value: ParamValue| graph.set_param(node, &format!("riaa:{}", key), value);
    p("Gain (dB)", ParamValue::Float(0.0));
    p("Subsonic Filter", ParamValue::Int(0));
    p("RIAA Enable", ParamValue::Bool(true));
    p("Declick Enable", ParamValue::Bool(false));
    p("Spike Threshold (dB)", ParamValue::Float(20.0));
    p("Spike Width (ms)", ParamValue::Float(1.0));
    p("Notch Filter Enable", ParamValue::Bool(false));
    p("Notch Frequency (Hz)", ParamValue::Float(250.0));
    p("Notch Q Factor", ParamValue::Float(25.0));
    node
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(|_| {})
    }

    /// Build with extra files written into the state directory first
    pub fn build(prepare: impl FnOnce(&std::path::Path)) -> Self {
        let dir = TempDir::new().expect("tempdir");
        prepare(dir.path());

        let graph = MemoryGraph::new();
        let eq_node = add_speakereq(&graph);
        let riaa_node = add_riaa(&graph);

        let sink = graph.add_node("alsa_output.usb-dac", "Audio/Sink");
        graph.set_volume_control(sink, 1.0);
        graph.add_port(sink, "playback_FL", PortDirection::Input);
        graph.add_port(sink, "playback_FR", PortDirection::Input);

        let player = graph.add_node("player", "Stream/Output/Audio");
        graph.set_volume_control(player, 0.8);
        graph.add_port(player, "output_FL", PortDirection::Output);
        graph.add_port(player, "output_FR", PortDirection::Output);

        let device = graph.add_device("alsa_card.usb-dac");
        graph.set_volume_control(device, 0.5);

        let mut config = ServiceConfig::rooted_at(dir.path());
        config.autosave_interval_secs = 1;
        let plane = ControlPlane::new(config, graph.clone()).expect("control plane");
        plane.graph().refresh().expect("refresh");

        Self {
            dir,
            graph,
            plane,
            eq_node,
            riaa_node,
            sink,
            player,
            device,
        }
    }

    pub fn eq_param(&self, key: &str) -> Option<ParamValue> {
        self.graph.param(self.eq_node, &format!("speakereq2x2:{}", key))
    }
}
