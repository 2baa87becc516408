//! Parametric EQ bands
//!
//! Band types travel as snake_case names and are stored in the plugin as
//! integer codes 0-8.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{ControlError, Result};

// =============================================================================
// Ranges
// =============================================================================

/// Inclusive numeric range a parameter must fall in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub unit: &'static str,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32, unit: &'static str) -> Self {
        Self { min, max, unit }
    }

    /// Validate a value; non-finite values are always rejected
    pub fn check(&self, what: &str, value: f32) -> Result<f32> {
        if !value.is_finite() {
            return Err(ControlError::validation(format!("{} must be a finite number", what)));
        }
        if value < self.min || value > self.max {
            return Err(ControlError::validation(format!(
                "{} must be between {} and {} {}, got {}",
                what, self.min, self.max, self.unit, value
            )));
        }
        Ok(value)
    }
}

pub const FREQUENCY_RANGE: ParamRange = ParamRange::new(20.0, 20000.0, "Hz");
pub const Q_RANGE: ParamRange = ParamRange::new(0.1, 10.0, "");
pub const BAND_GAIN_RANGE: ParamRange = ParamRange::new(-24.0, 24.0, "dB");
pub const MASTER_GAIN_RANGE: ParamRange = ParamRange::new(-60.0, 12.0, "dB");
pub const BLOCK_GAIN_RANGE: ParamRange = ParamRange::new(-60.0, 12.0, "dB");
pub const DELAY_RANGE: ParamRange = ParamRange::new(0.0, 10.0, "ms");
pub const CROSSBAR_RANGE: ParamRange = ParamRange::new(0.0, 2.0, "");

// =============================================================================
// EQ type
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EqType {
    Off,
    LowShelf,
    HighShelf,
    Peaking,
    LowPass,
    HighPass,
    BandPass,
    Notch,
    AllPass,
    /// A code the plugin reported that this crate has no name for
    Unknown(i32),
}

impl EqType {
    pub const ALL: [EqType; 9] = [
        EqType::Off,
        EqType::LowShelf,
        EqType::HighShelf,
        EqType::Peaking,
        EqType::LowPass,
        EqType::HighPass,
        EqType::BandPass,
        EqType::Notch,
        EqType::AllPass,
    ];

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => EqType::Off,
            1 => EqType::LowShelf,
            2 => EqType::HighShelf,
            3 => EqType::Peaking,
            4 => EqType::LowPass,
            5 => EqType::HighPass,
            6 => EqType::BandPass,
            7 => EqType::Notch,
            8 => EqType::AllPass,
            other => EqType::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            EqType::Off => 0,
            EqType::LowShelf => 1,
            EqType::HighShelf => 2,
            EqType::Peaking => 3,
            EqType::LowPass => 4,
            EqType::HighPass => 5,
            EqType::BandPass => 6,
            EqType::Notch => 7,
            EqType::AllPass => 8,
            EqType::Unknown(code) => code,
        }
    }

    pub fn name(self) -> String {
        match self {
            EqType::Unknown(code) => format!("unknown_{}", code),
            known => known.known_name().to_string(),
        }
    }

    fn known_name(self) -> &'static str {
        match self {
            EqType::Off => "off",
            EqType::LowShelf => "low_shelf",
            EqType::HighShelf => "high_shelf",
            EqType::Peaking => "peaking",
            EqType::LowPass => "low_pass",
            EqType::HighPass => "high_pass",
            EqType::BandPass => "band_pass",
            EqType::Notch => "notch",
            EqType::AllPass => "all_pass",
            EqType::Unknown(_) => "unknown",
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, EqType::Unknown(_))
    }

    pub fn description(self) -> &'static str {
        match self {
            EqType::Off => "Disabled, no filtering",
            EqType::LowShelf => "Low shelf, boosts or cuts low frequencies",
            EqType::HighShelf => "High shelf, boosts or cuts high frequencies",
            EqType::Peaking => "Peaking, boosts or cuts around the center frequency",
            EqType::LowPass => "Low pass, passes frequencies below the cutoff",
            EqType::HighPass => "High pass, passes frequencies above the cutoff",
            EqType::BandPass => "Band pass, passes frequencies around the center",
            EqType::Notch => "Notch, attenuates frequencies around the center",
            EqType::AllPass => "All pass, affects phase only",
            EqType::Unknown(_) => "Unrecognized filter type",
        }
    }

    /// Whether the band's gain has any effect for this type
    pub fn uses_gain(self) -> bool {
        matches!(self, EqType::LowShelf | EqType::HighShelf | EqType::Peaking)
    }
}

impl fmt::Display for EqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for EqType {
    type Err = ControlError;

    /// Parses the nine type names case-insensitively. `unknown_<code>` parses
    /// too so read-back documents stay loadable; writes reject it.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        if let Some(t) = EqType::ALL.into_iter().find(|t| t.known_name() == lower) {
            return Ok(t);
        }
        lower
            .strip_prefix("unknown_")
            .and_then(|code| code.parse().ok())
            .map(EqType::Unknown)
            .ok_or_else(|| ControlError::validation(format!("invalid EQ type: {}", s)))
    }
}

impl Serialize for EqType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

impl<'de> Deserialize<'de> for EqType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// EQ band
// =============================================================================

fn default_enabled() -> bool {
    true
}

/// One parametric EQ band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    #[serde(rename = "type")]
    pub eq_type: EqType,
    pub frequency: f32,
    pub q: f32,
    pub gain: f32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl EqBand {
    /// The state every band returns to on reset
    pub const DEFAULT: EqBand = EqBand {
        eq_type: EqType::Off,
        frequency: 1000.0,
        q: 1.0,
        gain: 0.0,
        enabled: true,
    };

    pub fn new(eq_type: EqType, frequency: f32, q: f32, gain: f32) -> Self {
        Self {
            eq_type,
            frequency,
            q,
            gain,
            enabled: true,
        }
    }

    /// Check every field; nothing is written unless this passes
    pub fn validate(&self) -> Result<()> {
        if !self.eq_type.is_known() {
            return Err(ControlError::validation(format!(
                "invalid EQ type: {}",
                self.eq_type
            )));
        }
        FREQUENCY_RANGE.check("frequency", self.frequency)?;
        Q_RANGE.check("q", self.q)?;
        BAND_GAIN_RANGE.check("gain", self.gain)?;
        Ok(())
    }
}

impl Default for EqBand {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// =============================================================================
// Capabilities
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EqTypeInfo {
    pub name: String,
    pub description: String,
    pub requires_gain: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeInfo {
    pub min: f32,
    pub max: f32,
    pub unit: String,
    pub description: String,
}

impl RangeInfo {
    fn from_range(range: ParamRange, unit: &str, description: &str) -> Self {
        Self {
            min: range.min,
            max: range.max,
            unit: unit.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterRanges {
    pub frequency: RangeInfo,
    pub gain: RangeInfo,
    pub q: RangeInfo,
    pub crossbar: RangeInfo,
    pub master_gain: RangeInfo,
    pub block_gain: RangeInfo,
    pub delay: RangeInfo,
}

/// Supported filter types and accepted parameter ranges
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capabilities {
    pub eq_types: Vec<EqTypeInfo>,
    pub parameter_ranges: ParameterRanges,
}

impl Capabilities {
    pub fn describe() -> Self {
        let eq_types = EqType::ALL
            .into_iter()
            .map(|t| EqTypeInfo {
                name: t.name(),
                description: t.description().to_string(),
                requires_gain: t.uses_gain(),
            })
            .collect();

        Self {
            eq_types,
            parameter_ranges: ParameterRanges {
                frequency: RangeInfo::from_range(
                    FREQUENCY_RANGE,
                    "Hz",
                    "Center or cutoff frequency",
                ),
                gain: RangeInfo::from_range(BAND_GAIN_RANGE, "dB", "Shelf and peaking gain"),
                q: RangeInfo::from_range(Q_RANGE, "Q factor", "Filter bandwidth"),
                crossbar: RangeInfo::from_range(
                    CROSSBAR_RANGE,
                    "linear gain",
                    "Crossbar routing coefficient",
                ),
                master_gain: RangeInfo::from_range(MASTER_GAIN_RANGE, "dB", "Master output gain"),
                block_gain: RangeInfo::from_range(BLOCK_GAIN_RANGE, "dB", "Per-block gain"),
                delay: RangeInfo::from_range(DELAY_RANGE, "ms", "Output delay compensation"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_table() {
        for t in EqType::ALL {
            assert_eq!(EqType::from_code(t.code()), t);
            assert_eq!(t.name().parse::<EqType>().unwrap(), t);
        }
        assert_eq!(EqType::from_code(12).name(), "unknown_12");
        assert_eq!("PEAKING".parse::<EqType>().unwrap(), EqType::Peaking);
        assert!("invalid_type".parse::<EqType>().is_err());
    }

    #[test]
    fn test_band_enabled_defaults_true() {
        let band: EqBand =
            serde_json::from_str(r#"{"type": "peaking", "frequency": 100, "q": 1, "gain": 3}"#)
                .unwrap();
        assert!(band.enabled);
        assert_eq!(band.eq_type, EqType::Peaking);
    }

    #[test]
    fn test_band_validation() {
        let ok = EqBand::new(EqType::Peaking, 1000.0, 1.0, 0.0);
        assert!(ok.validate().is_ok());

        let bad = [
            EqBand { frequency: 10.0, ..ok },
            EqBand { q: 20.0, ..ok },
            EqBand { gain: 50.0, ..ok },
            EqBand { frequency: f32::NAN, ..ok },
            EqBand { eq_type: EqType::Unknown(9), ..ok },
        ];
        for band in bad {
            assert!(
                matches!(band.validate(), Err(ControlError::Validation(_))),
                "accepted {:?}",
                band
            );
        }
    }

    #[test]
    fn test_capabilities() {
        let caps = Capabilities::describe();
        assert_eq!(caps.eq_types.len(), 9);
        assert!(caps.eq_types.iter().any(|t| t.name == "notch" && !t.requires_gain));
        assert_eq!(caps.parameter_ranges.crossbar.max, 2.0);
    }
}
