//! RIAA phono-correction module

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::bridge::{NodeParams, NodeView};
use super::value::{ParamMap, ParamValue};
use crate::error::{ControlError, Result};

pub const MODULE_NAME: &str = "riaa";

const GAIN: &str = "Gain (dB)";
const SUBSONIC: &str = "Subsonic Filter";
const RIAA_ENABLE: &str = "RIAA Enable";
const DECLICK_ENABLE: &str = "Declick Enable";
const SPIKE_THRESHOLD: &str = "Spike Threshold (dB)";
const SPIKE_WIDTH: &str = "Spike Width (ms)";
const NOTCH_ENABLE: &str = "Notch Filter Enable";
const NOTCH_FREQUENCY: &str = "Notch Frequency (Hz)";
const NOTCH_Q: &str = "Notch Q Factor";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeConfig {
    pub threshold_db: f32,
    pub width_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NotchConfig {
    pub enabled: bool,
    pub frequency_hz: f32,
    pub q_factor: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiaaConfig {
    pub gain_db: f32,
    pub subsonic_filter: i32,
    pub riaa_enable: bool,
    pub declick_enable: bool,
    pub spike: SpikeConfig,
    pub notch: NotchConfig,
}

fn finite(what: &str, value: f32) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ControlError::validation(format!("{} must be a finite number", what)))
    }
}

fn positive(what: &str, value: f32) -> Result<f32> {
    if finite(what, value)? > 0.0 {
        Ok(value)
    } else {
        Err(ControlError::validation(format!("{} must be greater than 0", what)))
    }
}

impl SpikeConfig {
    fn validate(&self) -> Result<()> {
        finite("spike threshold", self.threshold_db)?;
        positive("spike width", self.width_ms)?;
        Ok(())
    }
}

impl NotchConfig {
    fn validate(&self) -> Result<()> {
        positive("notch frequency", self.frequency_hz)?;
        positive("notch Q factor", self.q_factor)?;
        Ok(())
    }
}

impl RiaaConfig {
    pub fn validate(&self) -> Result<()> {
        finite("gain", self.gain_db)?;
        if self.subsonic_filter < 0 {
            return Err(ControlError::validation("subsonic filter must be >= 0"));
        }
        self.spike.validate()?;
        self.notch.validate()
    }
}

pub struct Riaa {
    params: NodeParams,
}

impl Riaa {
    pub fn new(params: NodeParams) -> Self {
        Self { params }
    }

    /// Loaded view and the property prefix it uses
    fn view(&self) -> Result<(Arc<NodeView>, String)> {
        let view = self.params.load()?;
        let suffix = format!(":{}", GAIN);
        let prefix = view
            .params
            .keys()
            .find_map(|k| k.strip_suffix(&suffix))
            .map(str::to_string)
            .ok_or_else(|| {
                ControlError::ProbeFailure(format!(
                    "{}: no '{}' parameter",
                    self.params.node_name(),
                    GAIN
                ))
            })?;
        Ok((view, prefix))
    }

    fn write(&self, pairs: Vec<(&str, ParamValue)>) -> Result<()> {
        let (_, prefix) = self.view()?;
        let batch: ParamMap = pairs
            .into_iter()
            .map(|(name, value)| (format!("{}:{}", prefix, name), value))
            .collect();
        self.params.set(batch)
    }

    pub fn config(&self) -> Result<RiaaConfig> {
        let (view, prefix) = self.view()?;
        let get = |name: &str| view.get(&format!("{}:{}", prefix, name));
        let float = |name: &str, default: f32| get(name).and_then(ParamValue::as_f32).unwrap_or(default);
        let flag = |name: &str, default: bool| get(name).and_then(ParamValue::as_bool).unwrap_or(default);

        Ok(RiaaConfig {
            gain_db: float(GAIN, 0.0),
            subsonic_filter: get(SUBSONIC).and_then(ParamValue::as_i32).unwrap_or(0),
            riaa_enable: flag(RIAA_ENABLE, true),
            declick_enable: flag(DECLICK_ENABLE, false),
            spike: SpikeConfig {
                threshold_db: float(SPIKE_THRESHOLD, 20.0),
                width_ms: float(SPIKE_WIDTH, 1.0),
            },
            notch: NotchConfig {
                enabled: flag(NOTCH_ENABLE, false),
                frequency_hz: float(NOTCH_FREQUENCY, 250.0),
                q_factor: float(NOTCH_Q, 25.0),
            },
        })
    }

    pub fn set_gain(&self, gain_db: f32) -> Result<()> {
        finite("gain", gain_db)?;
        self.write(vec![(GAIN, ParamValue::Float(gain_db))])
    }

    pub fn set_subsonic_filter(&self, filter: i32) -> Result<()> {
        if filter < 0 {
            return Err(ControlError::validation("subsonic filter must be >= 0"));
        }
        self.write(vec![(SUBSONIC, ParamValue::Int(filter))])
    }

    pub fn set_riaa_enable(&self, enabled: bool) -> Result<()> {
        self.write(vec![(RIAA_ENABLE, ParamValue::Bool(enabled))])
    }

    pub fn set_declick_enable(&self, enabled: bool) -> Result<()> {
        self.write(vec![(DECLICK_ENABLE, ParamValue::Bool(enabled))])
    }

    pub fn set_spike(&self, spike: SpikeConfig) -> Result<()> {
        spike.validate()?;
        self.write(vec![
            (SPIKE_THRESHOLD, ParamValue::Float(spike.threshold_db)),
            (SPIKE_WIDTH, ParamValue::Float(spike.width_ms)),
        ])
    }

    pub fn set_notch(&self, notch: NotchConfig) -> Result<()> {
        notch.validate()?;
        self.write(vec![
            (NOTCH_ENABLE, ParamValue::Bool(notch.enabled)),
            (NOTCH_FREQUENCY, ParamValue::Float(notch.frequency_hz)),
            (NOTCH_Q, ParamValue::Float(notch.q_factor)),
        ])
    }

    /// Gain 0, subsonic filter off, RIAA and declick off
    pub fn reset_to_defaults(&self) -> Result<()> {
        self.write(vec![
            (GAIN, ParamValue::Float(0.0)),
            (SUBSONIC, ParamValue::Int(0)),
            (RIAA_ENABLE, ParamValue::Bool(false)),
            (DECLICK_ENABLE, ParamValue::Bool(false)),
        ])?;
        info!("RIAA reset to defaults");
        Ok(())
    }

    pub fn apply_config(&self, config: &RiaaConfig) -> Result<()> {
        config.validate()?;
        self.write(vec![
            (GAIN, ParamValue::Float(config.gain_db)),
            (SUBSONIC, ParamValue::Int(config.subsonic_filter)),
            (RIAA_ENABLE, ParamValue::Bool(config.riaa_enable)),
            (DECLICK_ENABLE, ParamValue::Bool(config.declick_enable)),
            (SPIKE_THRESHOLD, ParamValue::Float(config.spike.threshold_db)),
            (SPIKE_WIDTH, ParamValue::Float(config.spike.width_ms)),
            (NOTCH_ENABLE, ParamValue::Bool(config.notch.enabled)),
            (NOTCH_FREQUENCY, ParamValue::Float(config.notch.frequency_hz)),
            (NOTCH_Q, ParamValue::Float(config.notch.q_factor)),
        ])?;
        info!("RIAA configuration applied");
        Ok(())
    }

    pub fn refresh(&self) -> Result<RiaaConfig> {
        self.params.refresh()?;
        self.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RiaaConfig {
        RiaaConfig {
            gain_db: 3.0,
            subsonic_filter: 1,
            riaa_enable: true,
            declick_enable: false,
            spike: SpikeConfig {
                threshold_db: 18.0,
                width_ms: 0.5,
            },
            notch: NotchConfig {
                enabled: true,
                frequency_hz: 60.0,
                q_factor: 10.0,
            },
        }
    }

    #[test]
    fn test_validation() {
        assert!(sample().validate().is_ok());

        let mut bad = sample();
        bad.subsonic_filter = -1;
        assert!(bad.validate().is_err());

        let mut bad = sample();
        bad.spike.width_ms = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = sample();
        bad.notch.q_factor = -2.0;
        assert!(bad.validate().is_err());

        let mut bad = sample();
        bad.gain_db = f32::INFINITY;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_document_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["spike"]["width_ms"], serde_json::json!(0.5));
        assert_eq!(json["notch"]["frequency_hz"], serde_json::json!(60.0));
    }
}
