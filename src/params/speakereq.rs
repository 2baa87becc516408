//! Speaker EQ module
//!
//! The plugin exposes everything as flat `<prefix>:<name>` properties. The
//! module's shape is probed from which names exist:
//!
//! - inputs: consecutive `xbar_{i}_to_0`
//! - outputs: consecutive `xbar_0_to_{j}`
//! - bands per block: consecutive `{block}_eq_{n}_type` from `n = 1`
//!
//! Each band has `_type` (int code), `_f`, `_q`, `_gain` and `_enabled`.

use arc_swap::ArcSwapOption;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::bridge::{NodeParams, NodeView};
use super::crossbar::{cell_key, CrossbarMatrix};
use super::eq::{
    Capabilities, EqBand, EqType, BLOCK_GAIN_RANGE, CROSSBAR_RANGE, DELAY_RANGE,
    MASTER_GAIN_RANGE,
};
use super::value::{ParamMap, ParamValue};
use crate::error::{ControlError, Result};

pub const MODULE_NAME: &str = "speakereq";

const MAX_IO: usize = 16;
const MAX_BANDS: usize = 100;
/// Fewer bands than this in any block means the layout was misread
const MIN_BANDS: usize = 10;

lazy_static! {
    static ref BLOCK_RE: Regex = Regex::new(r"^(input|output)_(\d+)$").unwrap();
}

// =============================================================================
// Block identification
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockKind {
    Input,
    Output,
}

/// An EQ block, `input_{i}` or `output_{j}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    pub kind: BlockKind,
    pub index: usize,
}

impl BlockId {
    pub fn input(index: usize) -> Self {
        Self {
            kind: BlockKind::Input,
            index,
        }
    }

    pub fn output(index: usize) -> Self {
        Self {
            kind: BlockKind::Output,
            index,
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            BlockKind::Input => write!(f, "input_{}", self.index),
            BlockKind::Output => write!(f, "output_{}", self.index),
        }
    }
}

impl FromStr for BlockId {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = BLOCK_RE
            .captures(s)
            .ok_or_else(|| ControlError::validation(format!("invalid block name '{}'", s)))?;
        let index = caps[2]
            .parse()
            .map_err(|_| ControlError::validation(format!("invalid block name '{}'", s)))?;
        Ok(match &caps[1] {
            "input" => BlockId::input(index),
            _ => BlockId::output(index),
        })
    }
}

// =============================================================================
// Layout
// =============================================================================

/// Probed shape of the plugin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakerEqLayout {
    pub inputs: usize,
    pub outputs: usize,
    pub eq_slots: BTreeMap<String, usize>,
    pub plugin_name: String,
    pub method: String,
}

impl SpeakerEqLayout {
    fn probe(node_name: &str, view: &NodeView) -> Result<Self> {
        let prefix = view
            .params
            .keys()
            .filter_map(|k| k.split_once(':').map(|(p, _)| p))
            .find(|p| p.starts_with(MODULE_NAME))
            .unwrap_or(node_name)
            .to_string();
        let has = |name: &str| view.contains(&format!("{}:{}", prefix, name));

        let inputs = (0..MAX_IO).take_while(|&i| has(&cell_key(i, 0))).count();
        let outputs = (0..MAX_IO).take_while(|&j| has(&cell_key(0, j))).count();
        if inputs == 0 || outputs == 0 {
            return Err(ControlError::ProbeFailure(format!(
                "{}: no crossbar parameters under prefix '{}'",
                node_name, prefix
            )));
        }

        let blocks = (0..inputs)
            .map(BlockId::input)
            .chain((0..outputs).map(BlockId::output));
        let mut eq_slots = BTreeMap::new();
        for block in blocks {
            let slots = (1..=MAX_BANDS)
                .take_while(|&n| has(&band_key(block, n, "type")))
                .count();
            if slots < MIN_BANDS {
                return Err(ControlError::ProbeFailure(format!(
                    "{}: block {} has {} EQ bands, expected at least {}",
                    node_name, block, slots, MIN_BANDS
                )));
            }
            eq_slots.insert(block.to_string(), slots);
        }

        Ok(Self {
            inputs,
            outputs,
            eq_slots,
            plugin_name: prefix,
            method: "probed".to_string(),
        })
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.plugin_name, name)
    }

    pub fn blocks(&self) -> impl Iterator<Item = BlockId> {
        (0..self.inputs)
            .map(BlockId::input)
            .chain((0..self.outputs).map(BlockId::output))
    }

    /// Band count of a block, `NotFound` for blocks beyond the probed I/O
    pub fn slots(&self, block: BlockId) -> Result<usize> {
        self.eq_slots
            .get(&block.to_string())
            .copied()
            .ok_or_else(|| ControlError::not_found(format!("block {}", block)))
    }

    fn check_band(&self, block: BlockId, band: usize) -> Result<()> {
        let slots = self.slots(block)?;
        if band == 0 || band > slots {
            return Err(ControlError::not_found(format!(
                "band {} of block {} (bands are 1..={})",
                band, block, slots
            )));
        }
        Ok(())
    }

    fn check_cell(&self, input: usize, output: usize) -> Result<()> {
        if input >= self.inputs || output >= self.outputs {
            return Err(ControlError::validation(format!(
                "crossbar cell {}->{} outside {}x{}",
                input, output, self.inputs, self.outputs
            )));
        }
        Ok(())
    }
}

fn band_key(block: BlockId, band: usize, field: &str) -> String {
    format!("{}_eq_{}_{}", block, band, field)
}

fn block_gain_key(block: BlockId) -> String {
    format!("{}_gain_db", block)
}

fn delay_key(block: BlockId) -> String {
    format!("delay_{}_ms", block.index)
}

const MASTER_GAIN: &str = "master_gain_db";
const ENABLE: &str = "Enable";
const SAVE_SETTINGS: &str = "save_settings";

// =============================================================================
// Module configuration
// =============================================================================

/// Full persisted state of the module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub enabled: bool,
    pub master_gain_db: f32,
    pub eq_slots: BTreeMap<String, usize>,
    pub crossbar: CrossbarMatrix,
    pub bands: BTreeMap<String, Vec<EqBand>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub block_gains: BTreeMap<String, f32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub delays: BTreeMap<String, f32>,
}

// =============================================================================
// Module
// =============================================================================

pub struct SpeakerEq {
    params: NodeParams,
    layout: ArcSwapOption<SpeakerEqLayout>,
}

impl SpeakerEq {
    pub fn new(params: NodeParams) -> Self {
        Self {
            params,
            layout: ArcSwapOption::empty(),
        }
    }

    /// Probed layout, probing on first use
    pub fn layout(&self) -> Result<Arc<SpeakerEqLayout>> {
        if let Some(layout) = self.layout.load_full() {
            return Ok(layout);
        }
        let view = self.params.load()?;
        self.probe(&view)
    }

    fn probe(&self, view: &NodeView) -> Result<Arc<SpeakerEqLayout>> {
        let layout = match SpeakerEqLayout::probe(self.params.node_name(), view) {
            Ok(layout) => Arc::new(layout),
            Err(e) => {
                warn!("Speaker EQ probe failed: {}", e);
                return Err(e);
            }
        };
        info!(
            "Speaker EQ '{}': {} inputs, {} outputs",
            layout.plugin_name, layout.inputs, layout.outputs
        );
        debug!("Speaker EQ slots: {:?}", layout.eq_slots);
        self.layout.store(Some(layout.clone()));
        Ok(layout)
    }

    /// Re-read the plugin and probe its layout again
    pub fn refresh(&self) -> Result<Arc<SpeakerEqLayout>> {
        self.layout.store(None);
        let view = self.params.refresh()?;
        self.probe(&view)
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::describe()
    }

    fn read(&self) -> Result<(Arc<SpeakerEqLayout>, Arc<NodeView>)> {
        let layout = self.layout()?;
        let view = self.params.load()?;
        Ok((layout, view))
    }

    // -------------------------------------------------------------------------
    // Bands
    // -------------------------------------------------------------------------

    pub fn get_band(&self, block: &str, band: usize) -> Result<EqBand> {
        let block: BlockId = block.parse()?;
        let (layout, view) = self.read()?;
        layout.check_band(block, band)?;
        read_band(&layout, &view, block, band)
    }

    pub fn set_band(&self, block: &str, band: usize, value: EqBand) -> Result<EqBand> {
        let block: BlockId = block.parse()?;
        let layout = self.layout()?;
        layout.check_band(block, band)?;
        value.validate()?;

        let mut batch = ParamMap::new();
        write_band(&layout, &mut batch, block, band, &value);
        self.params.set(batch)?;
        Ok(value)
    }

    pub fn set_band_enabled(&self, block: &str, band: usize, enabled: bool) -> Result<()> {
        let block: BlockId = block.parse()?;
        let layout = self.layout()?;
        layout.check_band(block, band)?;

        let mut batch = ParamMap::new();
        batch.insert(
            layout.key(&band_key(block, band, "enabled")),
            ParamValue::Bool(enabled),
        );
        self.params.set(batch)
    }

    /// Turn every band of a block off; returns the number of bands cleared
    pub fn clear_block(&self, block: &str) -> Result<usize> {
        let block: BlockId = block.parse()?;
        let layout = self.layout()?;
        let slots = layout.slots(block)?;

        let batch = (1..=slots)
            .map(|n| {
                (
                    layout.key(&band_key(block, n, "type")),
                    ParamValue::Int(EqType::Off.code()),
                )
            })
            .collect();
        self.params.set(batch)?;
        Ok(slots)
    }

    // -------------------------------------------------------------------------
    // Gains, enable, delay
    // -------------------------------------------------------------------------

    pub fn master_gain(&self) -> Result<f32> {
        let (layout, view) = self.read()?;
        required_f32(&view, &layout.key(MASTER_GAIN))
    }

    pub fn set_master_gain(&self, gain_db: f32) -> Result<()> {
        MASTER_GAIN_RANGE.check("master gain", gain_db)?;
        let layout = self.layout()?;
        self.params.set(single(layout.key(MASTER_GAIN), gain_db))
    }

    pub fn enabled(&self) -> Result<bool> {
        let (layout, view) = self.read()?;
        let key = layout.key(ENABLE);
        view.get(&key)
            .and_then(ParamValue::as_bool)
            .ok_or_else(|| ControlError::not_found(format!("parameter {}", key)))
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        let layout = self.layout()?;
        self.params.set(single(layout.key(ENABLE), enabled))
    }

    pub fn block_gain(&self, block: &str) -> Result<f32> {
        let block: BlockId = block.parse()?;
        let (layout, view) = self.read()?;
        layout.slots(block)?;
        required_f32(&view, &layout.key(&block_gain_key(block)))
    }

    pub fn set_block_gain(&self, block: &str, gain_db: f32) -> Result<()> {
        let block: BlockId = block.parse()?;
        let (layout, view) = self.read()?;
        let key = layout.key(&block_gain_key(block));
        if layout.slots(block).is_err() || !view.contains(&key) {
            return Err(ControlError::not_found(format!("gain of block {}", block)));
        }
        BLOCK_GAIN_RANGE.check("block gain", gain_db)?;
        self.params.set(single(key, gain_db))
    }

    pub fn delay(&self, block: &str) -> Result<f32> {
        let (_, view, key) = self.delay_target(block)?;
        required_f32(&view, &key)
    }

    pub fn set_delay(&self, block: &str, delay_ms: f32) -> Result<()> {
        let (_, _, key) = self.delay_target(block)?;
        DELAY_RANGE.check("delay", delay_ms)?;
        self.params.set(single(key, delay_ms))
    }

    fn delay_target(&self, block: &str) -> Result<(Arc<SpeakerEqLayout>, Arc<NodeView>, String)> {
        let block: BlockId = block.parse()?;
        if block.kind != BlockKind::Output {
            return Err(ControlError::validation(format!(
                "delay is only available on output blocks, not {}",
                block
            )));
        }
        let (layout, view) = self.read()?;
        layout.slots(block)?;
        let key = layout.key(&delay_key(block));
        if !view.contains(&key) {
            return Err(ControlError::not_found(format!("delay of block {}", block)));
        }
        Ok((layout, view, key))
    }

    // -------------------------------------------------------------------------
    // Crossbar
    // -------------------------------------------------------------------------

    pub fn crossbar(&self) -> Result<CrossbarMatrix> {
        let (layout, view) = self.read()?;
        Ok(read_crossbar(&layout, &view))
    }

    pub fn set_crossbar_cell(&self, input: usize, output: usize, value: f32) -> Result<()> {
        let layout = self.layout()?;
        layout.check_cell(input, output)?;
        CROSSBAR_RANGE.check("crossbar value", value)?;
        self.params.set(single(layout.key(&cell_key(input, output)), value))
    }

    pub fn set_crossbar(&self, matrix: &CrossbarMatrix) -> Result<()> {
        let layout = self.layout()?;
        matrix.validate(layout.inputs, layout.outputs)?;

        let batch = matrix
            .cells()
            .map(|(i, j, v)| (layout.key(&cell_key(i, j)), ParamValue::Float(v)))
            .collect();
        self.params.set(batch)
    }

    // -------------------------------------------------------------------------
    // Whole-module operations
    // -------------------------------------------------------------------------

    /// Put every parameter back to its neutral value in one batch
    pub fn reset_to_defaults(&self) -> Result<()> {
        let (layout, view) = self.read()?;
        let mut batch = ParamMap::new();

        batch.insert(layout.key(MASTER_GAIN), ParamValue::Float(0.0));
        for block in layout.blocks() {
            let gain = layout.key(&block_gain_key(block));
            if view.contains(&gain) {
                batch.insert(gain, ParamValue::Float(0.0));
            }
            for band in 1..=layout.slots(block)? {
                write_band(&layout, &mut batch, block, band, &EqBand::DEFAULT);
            }
        }
        for (i, j, v) in CrossbarMatrix::identity(layout.inputs, layout.outputs).cells() {
            batch.insert(layout.key(&cell_key(i, j)), ParamValue::Float(v));
        }
        batch.insert(layout.key(ENABLE), ParamValue::Bool(true));

        self.params.set(batch)?;
        info!("Speaker EQ reset to defaults");
        Ok(())
    }

    /// Current state of the whole module
    pub fn status(&self) -> Result<ModuleConfig> {
        let (layout, view) = self.read()?;

        let mut bands = BTreeMap::new();
        let mut block_gains = BTreeMap::new();
        let mut delays = BTreeMap::new();
        for block in layout.blocks() {
            let slots = layout.slots(block)?;
            let list = (1..=slots)
                .map(|n| read_band(&layout, &view, block, n))
                .collect::<Result<Vec<_>>>()?;
            bands.insert(block.to_string(), list);

            if let Some(g) = view.get(&layout.key(&block_gain_key(block))).and_then(ParamValue::as_f32) {
                block_gains.insert(block.to_string(), g);
            }
            if block.kind == BlockKind::Output {
                if let Some(d) = view.get(&layout.key(&delay_key(block))).and_then(ParamValue::as_f32) {
                    delays.insert(block.to_string(), d);
                }
            }
        }

        Ok(ModuleConfig {
            enabled: view
                .get(&layout.key(ENABLE))
                .and_then(ParamValue::as_bool)
                .unwrap_or(false),
            master_gain_db: view
                .get(&layout.key(MASTER_GAIN))
                .and_then(ParamValue::as_f32)
                .unwrap_or(0.0),
            eq_slots: layout.eq_slots.clone(),
            crossbar: read_crossbar(&layout, &view),
            bands,
            block_gains,
            delays,
        })
    }

    /// Apply a full configuration; everything is validated before one batch
    pub fn apply_config(&self, config: &ModuleConfig) -> Result<()> {
        let (layout, view) = self.read()?;
        MASTER_GAIN_RANGE.check("master gain", config.master_gain_db)?;
        config.crossbar.validate(layout.inputs, layout.outputs)?;

        let mut batch = ParamMap::new();
        batch.insert(layout.key(ENABLE), ParamValue::Bool(config.enabled));
        batch.insert(
            layout.key(MASTER_GAIN),
            ParamValue::Float(config.master_gain_db),
        );
        for (i, j, v) in config.crossbar.cells() {
            batch.insert(layout.key(&cell_key(i, j)), ParamValue::Float(v));
        }

        for (name, list) in &config.bands {
            let block: BlockId = name.parse()?;
            let slots = layout
                .slots(block)
                .map_err(|_| ControlError::validation(format!("unknown block {}", name)))?;
            if list.len() != slots {
                return Err(ControlError::validation(format!(
                    "block {} has {} bands, configuration has {}",
                    name,
                    slots,
                    list.len()
                )));
            }
            for (idx, band) in list.iter().enumerate() {
                band.validate().map_err(|e| {
                    ControlError::validation(format!("{} band {}: {}", name, idx + 1, e))
                })?;
                write_band(&layout, &mut batch, block, idx + 1, band);
            }
        }

        for (name, &gain) in &config.block_gains {
            let block: BlockId = name.parse()?;
            let key = layout.key(&block_gain_key(block));
            if layout.slots(block).is_err() || !view.contains(&key) {
                return Err(ControlError::validation(format!("block {} has no gain", name)));
            }
            BLOCK_GAIN_RANGE.check("block gain", gain)?;
            batch.insert(key, ParamValue::Float(gain));
        }

        for (name, &delay) in &config.delays {
            let block: BlockId = name.parse()?;
            let key = layout.key(&delay_key(block));
            if block.kind != BlockKind::Output || layout.slots(block).is_err() || !view.contains(&key) {
                return Err(ControlError::validation(format!("block {} has no delay", name)));
            }
            DELAY_RANGE.check("delay", delay)?;
            batch.insert(key, ParamValue::Float(delay));
        }

        self.params.set(batch)?;
        info!("Speaker EQ configuration applied");
        Ok(())
    }

    /// Ask the plugin to store its current parameters in its own config file
    ///
    /// Writing 1 to the plugin's `save_settings` control port triggers the
    /// save; this is independent of `settings.json`.
    pub fn save_config(&self) -> Result<()> {
        let layout = self.layout()?;
        self.params.set(single(layout.key(SAVE_SETTINGS), ParamValue::Int(1)))?;
        info!("Speaker EQ '{}' asked to save its settings", layout.plugin_name);
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn single(key: String, value: impl Into<ParamValue>) -> ParamMap {
    let mut batch = ParamMap::new();
    batch.insert(key, value.into());
    batch
}

fn required_f32(view: &NodeView, key: &str) -> Result<f32> {
    view.get(key)
        .and_then(ParamValue::as_f32)
        .ok_or_else(|| ControlError::not_found(format!("parameter {}", key)))
}

fn read_band(layout: &SpeakerEqLayout, view: &NodeView, block: BlockId, band: usize) -> Result<EqBand> {
    let get = |field: &str| view.get(&layout.key(&band_key(block, band, field)));

    let code = get("type")
        .and_then(ParamValue::as_i32)
        .ok_or_else(|| ControlError::not_found(format!("EQ band {}/{}", block, band)))?;

    Ok(EqBand {
        eq_type: EqType::from_code(code),
        frequency: get("f").and_then(ParamValue::as_f32).unwrap_or(1000.0),
        q: get("q").and_then(ParamValue::as_f32).unwrap_or(1.0),
        gain: get("gain").and_then(ParamValue::as_f32).unwrap_or(0.0),
        enabled: get("enabled").and_then(ParamValue::as_bool).unwrap_or(true),
    })
}

fn write_band(layout: &SpeakerEqLayout, batch: &mut ParamMap, block: BlockId, band: usize, value: &EqBand) {
    let key = |field: &str| layout.key(&band_key(block, band, field));
    batch.insert(key("type"), ParamValue::Int(value.eq_type.code()));
    batch.insert(key("f"), ParamValue::Float(value.frequency));
    batch.insert(key("q"), ParamValue::Float(value.q));
    batch.insert(key("gain"), ParamValue::Float(value.gain));
    batch.insert(key("enabled"), ParamValue::Bool(value.enabled));
}

fn read_crossbar(layout: &SpeakerEqLayout, view: &NodeView) -> CrossbarMatrix {
    CrossbarMatrix(
        (0..layout.inputs)
            .map(|i| {
                (0..layout.outputs)
                    .map(|j| {
                        view.get(&layout.key(&cell_key(i, j)))
                            .and_then(ParamValue::as_f32)
                            .unwrap_or(0.0)
                    })
                    .collect()
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_parsing() {
        assert_eq!("input_0".parse::<BlockId>().unwrap(), BlockId::input(0));
        assert_eq!("output_12".parse::<BlockId>().unwrap(), BlockId::output(12));
        assert!(matches!(
            "crossbar".parse::<BlockId>(),
            Err(ControlError::Validation(_))
        ));
        assert!("input_".parse::<BlockId>().is_err());
        assert!("Input_0".parse::<BlockId>().is_err());
        assert_eq!(BlockId::output(1).to_string(), "output_1");
    }

    fn view(inputs: usize, outputs: usize, bands: usize) -> NodeView {
        let mut params = ParamMap::new();
        params.insert("speakereq2x2:Enable".into(), ParamValue::Bool(true));
        for i in 0..inputs {
            for j in 0..outputs {
                params.insert(format!("speakereq2x2:xbar_{}_to_{}", i, j), ParamValue::Float(0.0));
            }
        }
        let blocks = (0..inputs)
            .map(BlockId::input)
            .chain((0..outputs).map(BlockId::output));
        for block in blocks {
            for n in 1..=bands {
                params.insert(
                    format!("speakereq2x2:{}", band_key(block, n, "type")),
                    ParamValue::Int(0),
                );
            }
        }
        NodeView { node_id: 1, params }
    }

    #[test]
    fn test_probe_layout() {
        let layout = SpeakerEqLayout::probe("speakereq2x2", &view(2, 3, 20)).unwrap();
        assert_eq!(layout.inputs, 2);
        assert_eq!(layout.outputs, 3);
        assert_eq!(layout.eq_slots["output_2"], 20);
        assert_eq!(layout.plugin_name, "speakereq2x2");
        assert_eq!(layout.method, "probed");
    }

    #[test]
    fn test_probe_rejects_short_blocks() {
        assert!(matches!(
            SpeakerEqLayout::probe("speakereq2x2", &view(2, 2, 5)),
            Err(ControlError::ProbeFailure(_))
        ));
        assert!(matches!(
            SpeakerEqLayout::probe("speakereq2x2", &view(0, 0, 20)),
            Err(ControlError::ProbeFailure(_))
        ));
    }

    #[test]
    fn test_band_bounds() {
        let layout = SpeakerEqLayout::probe("speakereq2x2", &view(2, 2, 10)).unwrap();
        assert!(layout.check_band(BlockId::input(0), 1).is_ok());
        assert!(layout.check_band(BlockId::input(0), 10).is_ok());
        assert!(matches!(
            layout.check_band(BlockId::input(0), 0),
            Err(ControlError::NotFound(_))
        ));
        assert!(matches!(
            layout.check_band(BlockId::input(0), 11),
            Err(ControlError::NotFound(_))
        ));
        assert!(matches!(
            layout.check_band(BlockId::output(5), 1),
            Err(ControlError::NotFound(_))
        ));
    }

    #[test]
    fn test_cell_bounds_are_validation_errors() {
        let layout = SpeakerEqLayout::probe("speakereq2x2", &view(2, 3, 20)).unwrap();
        assert!(layout.check_cell(1, 2).is_ok());
        assert!(matches!(layout.check_cell(2, 0), Err(ControlError::Validation(_))));
        assert!(matches!(layout.check_cell(0, 3), Err(ControlError::Validation(_))));
    }
}
