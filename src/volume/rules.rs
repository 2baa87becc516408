//! Volume rules
//!
//! `volume.conf` is a JSON array of rules:
//!
//! ```json
//! [
//!   {
//!     "name": "USB DAC",
//!     "object": { "device.name": "alsa_card\\.usb-.*" },
//!     "volume": 0.8,
//!     "use_state_file": true
//!   }
//! ]
//! ```
//!
//! A rule matches an object when every pattern matches the object's property
//! of that name. Patterns are unanchored regexes.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{ControlError, Result};
use crate::graph::Properties;
use crate::persist;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRule {
    pub name: String,
    #[serde(alias = "object", default)]
    pub object_match: BTreeMap<String, String>,
    #[serde(alias = "volume")]
    pub fixed_volume: f32,
    #[serde(default)]
    pub use_state_file: bool,
}

/// A rule with its patterns compiled
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub fixed_volume: f32,
    pub use_state_file: bool,
    matchers: Vec<(String, Regex)>,
}

impl CompiledRule {
    pub fn compile(rule: &VolumeRule) -> Result<Self> {
        if !(0.0..=1.0).contains(&rule.fixed_volume) {
            return Err(ControlError::validation(format!(
                "rule '{}': volume {} outside 0.0..=1.0",
                rule.name, rule.fixed_volume
            )));
        }

        let matchers = rule
            .object_match
            .iter()
            .map(|(key, pattern)| {
                Regex::new(pattern)
                    .map(|re| (key.clone(), re))
                    .map_err(|e| {
                        ControlError::validation(format!(
                            "rule '{}': invalid pattern '{}': {}",
                            rule.name, pattern, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: rule.name.clone(),
            fixed_volume: rule.fixed_volume,
            use_state_file: rule.use_state_file,
            matchers,
        })
    }

    /// Every pattern must match; a rule without patterns matches nothing
    pub fn matches(&self, props: &Properties) -> bool {
        !self.matchers.is_empty()
            && self
                .matchers
                .iter()
                .all(|(key, re)| props.get(key).map_or(false, |v| re.is_match(v)))
    }
}

/// Ordered rule list; earlier rules take precedence
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile rules, dropping invalid ones with a warning
    pub fn from_rules(rules: &[VolumeRule]) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| match CompiledRule::compile(rule) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!("Skipping volume rule: {}", e);
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// Load `volume.conf`; a missing file means no rules
    pub fn load(path: &Path) -> Result<Self> {
        let rules: Vec<VolumeRule> = persist::read_json(path)?.unwrap_or_default();
        let set = Self::from_rules(&rules);
        info!(
            "Loaded {} volume rule(s) from {}",
            set.rules.len(),
            path.display()
        );
        Ok(set)
    }

    pub fn first_match(&self, props: &Properties) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.matches(props))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn rule(name: &str, key: &str, pattern: &str, volume: f32) -> VolumeRule {
        VolumeRule {
            name: name.into(),
            object_match: [(key.to_string(), pattern.to_string())].into_iter().collect(),
            fixed_volume: volume,
            use_state_file: false,
        }
    }

    #[test]
    fn test_first_match_wins() {
        let set = RuleSet::from_rules(&[
            rule("specific", "node.name", "^alsa_output\\.usb", 0.3),
            rule("general", "node.name", "alsa", 0.9),
        ]);
        let usb = props(&[("node.name", "alsa_output.usb-dac")]);
        let pci = props(&[("node.name", "alsa_output.pci")]);
        assert_eq!(set.first_match(&usb).unwrap().name, "specific");
        assert_eq!(set.first_match(&pci).unwrap().name, "general");
    }

    #[test]
    fn test_missing_property_and_empty_match() {
        let set = RuleSet::from_rules(&[
            rule("needs-class", "media.class", "Sink", 0.5),
            VolumeRule {
                name: "empty".into(),
                object_match: BTreeMap::new(),
                fixed_volume: 0.5,
                use_state_file: false,
            },
        ]);
        assert!(set.first_match(&props(&[("node.name", "x")])).is_none());
    }

    #[test]
    fn test_invalid_rules_dropped() {
        let set = RuleSet::from_rules(&[
            rule("bad-regex", "node.name", "([", 0.5),
            rule("too-loud", "node.name", "x", 1.5),
            rule("ok", "node.name", "x", 0.5),
        ]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_load_with_aliases() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("volume.conf");
        fs::write(
            &path,
            r#"[{"name": "dac", "object": {"device.name": "usb"}, "volume": 0.7, "use_state_file": true}]"#,
        )
        .unwrap();
        let set = RuleSet::load(&path).unwrap();
        let m = set.first_match(&props(&[("device.name", "alsa_card.usb")])).unwrap();
        assert!(m.use_state_file);
        assert_eq!(m.fixed_volume, 0.7);

        assert!(RuleSet::load(&dir.path().join("absent.conf")).unwrap().is_empty());
    }
}
