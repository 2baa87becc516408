//! Parameter rules
//!
//! `param-rules.conf` is a JSON array of rules that write fixed parameter
//! values to matching nodes:
//!
//! ```json
//! [
//!   {
//!     "name": "Enable speakereq",
//!     "node": { "node.name": "^speakereq[0-9]x[0-9]$" },
//!     "parameters": { "speakereq2x2:Enable": true },
//!     "set_at_startup": true
//!   }
//! ]
//! ```
//!
//! A node matches when every given pattern matches its property of that name.
//! The parameters of one rule go to each matching node as one batch.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, error, info, warn};

use super::value::{ParamMap, ParamValue};
use crate::error::{ControlError, Result};
use crate::graph::{GraphCache, GraphObject, GraphSnapshot};
use crate::persist;

fn default_true() -> bool {
    true
}

/// Which nodes a rule targets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMatcher {
    #[serde(rename = "node.name", default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(rename = "object.path", default, skip_serializing_if = "Option::is_none")]
    pub object_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRule {
    pub name: String,
    pub node: NodeMatcher,
    pub parameters: BTreeMap<String, serde_json::Value>,
    #[serde(default = "default_true")]
    pub set_at_startup: bool,
}

/// A rule with its patterns compiled and its values converted
#[derive(Debug, Clone)]
pub struct CompiledParamRule {
    pub name: String,
    pub set_at_startup: bool,
    params: ParamMap,
    matchers: Vec<(&'static str, Regex)>,
}

impl CompiledParamRule {
    pub fn compile(rule: &ParamRule) -> Result<Self> {
        let patterns = [
            ("node.name", rule.node.node_name.as_deref()),
            ("object.path", rule.node.object_path.as_deref()),
        ];
        let mut matchers = Vec::new();
        for (key, pattern) in patterns {
            let Some(pattern) = pattern else { continue };
            let re = Regex::new(pattern).map_err(|e| {
                ControlError::validation(format!(
                    "rule '{}': invalid pattern '{}': {}",
                    rule.name, pattern, e
                ))
            })?;
            matchers.push((key, re));
        }

        let mut params = ParamMap::new();
        for (key, value) in &rule.parameters {
            match ParamValue::from_json(value) {
                Some(v) => {
                    params.insert(key.clone(), v);
                }
                None => warn!(
                    "Rule '{}': unsupported value for {}: {}",
                    rule.name, key, value
                ),
            }
        }

        Ok(Self {
            name: rule.name.clone(),
            set_at_startup: rule.set_at_startup,
            params,
            matchers,
        })
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    /// Every pattern must match; a rule without patterns matches nothing
    pub fn matches(&self, node: &GraphObject) -> bool {
        !self.matchers.is_empty()
            && self
                .matchers
                .iter()
                .all(|(key, re)| node.get(key).map_or(false, |v| re.is_match(v)))
    }
}

/// Outcome of writing one rule to one node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamRuleResult {
    pub rule: String,
    pub node_id: u32,
    pub node_name: String,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParamRuleSet {
    rules: Vec<CompiledParamRule>,
}

impl ParamRuleSet {
    /// Compile rules, dropping invalid ones with a warning
    pub fn from_rules(rules: &[ParamRule]) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| match CompiledParamRule::compile(rule) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!("Skipping parameter rule: {}", e);
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// Load `param-rules.conf`; a missing file means no rules
    pub fn load(path: &Path) -> Result<Self> {
        let rules: Vec<ParamRule> = persist::read_json(path)?.unwrap_or_default();
        let set = Self::from_rules(&rules);
        info!(
            "Loaded {} parameter rule(s) from {}",
            set.rules.len(),
            path.display()
        );
        Ok(set)
    }

    pub fn rules(&self) -> &[CompiledParamRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every `set_at_startup` rule against the live graph
    pub fn apply_startup(&self, cache: &GraphCache) -> Result<Vec<ParamRuleResult>> {
        let startup: Vec<&CompiledParamRule> = self.rules.iter().filter(|r| r.set_at_startup).collect();
        if startup.is_empty() {
            debug!("No parameter rules to apply at startup");
            return Ok(Vec::new());
        }
        let live = cache.probe_live()?;
        Ok(startup
            .into_iter()
            .flat_map(|rule| apply_rule(cache, &live, rule))
            .collect())
    }

    /// Apply one rule by name, regardless of `set_at_startup`
    pub fn apply_named(&self, cache: &GraphCache, name: &str) -> Result<Vec<ParamRuleResult>> {
        let rule = self
            .rules
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| ControlError::not_found(format!("parameter rule '{}'", name)))?;
        let live = cache.probe_live()?;
        Ok(apply_rule(cache, &live, rule))
    }
}

fn apply_rule(cache: &GraphCache, live: &GraphSnapshot, rule: &CompiledParamRule) -> Vec<ParamRuleResult> {
    if rule.params.is_empty() {
        warn!("Parameter rule '{}' has no usable parameters", rule.name);
        return Vec::new();
    }
    let targets: Vec<&GraphObject> = live.nodes().filter(|n| rule.matches(n)).collect();
    if targets.is_empty() {
        warn!("No nodes match parameter rule '{}'", rule.name);
        return Vec::new();
    }

    targets
        .into_iter()
        .map(|node| {
            let result = cache
                .connection()
                .with(|g| g.set_node_params(node.id, &rule.params));
            let (success, message) = match result {
                Ok(()) => {
                    info!(
                        "Rule '{}': wrote {} parameter(s) to {} ({})",
                        rule.name,
                        rule.params.len(),
                        node.name,
                        node.id
                    );
                    (true, format!("set {} parameter(s)", rule.params.len()))
                }
                Err(e) => {
                    error!("Rule '{}': failed to set parameters on {}: {}", rule.name, node.name, e);
                    (false, e.to_string())
                }
            };
            ParamRuleResult {
                rule: rule.name.clone(),
                node_id: node.id,
                node_name: node.name.clone(),
                success,
                message,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ObjectType, RawObject};

    fn rule(json: &str) -> ParamRule {
        serde_json::from_str(json).unwrap()
    }

    fn node(name: &str, path: Option<&str>) -> GraphObject {
        let mut raw = RawObject::new(50, ObjectType::Node).with_prop("node.name", name);
        if let Some(path) = path {
            raw = raw.with_prop("object.path", path);
        }
        GraphObject::from_raw(raw)
    }

    #[test]
    fn test_defaults_and_value_conversion() {
        let parsed = rule(
            r#"{"name": "r", "node": {"node.name": "^fx$"},
                "parameters": {"a": 1, "b": 0.5, "c": true, "d": "x", "e": [1]}}"#,
        );
        assert!(parsed.set_at_startup);

        let compiled = CompiledParamRule::compile(&parsed).unwrap();
        let params = compiled.params();
        assert_eq!(params["a"], ParamValue::Int(1));
        assert_eq!(params["b"], ParamValue::Float(0.5));
        assert_eq!(params["c"], ParamValue::Bool(true));
        assert_eq!(params["d"], ParamValue::String("x".into()));
        assert!(!params.contains_key("e"));
    }

    #[test]
    fn test_all_patterns_must_match() {
        let compiled = CompiledParamRule::compile(&rule(
            r#"{"name": "r", "node": {"node.name": "^fx", "object.path": "^alsa:"},
                "parameters": {"a": 1}}"#,
        ))
        .unwrap();
        assert!(compiled.matches(&node("fx_a", Some("alsa:pcm:0"))));
        assert!(!compiled.matches(&node("fx_a", None)));
        assert!(!compiled.matches(&node("other", Some("alsa:pcm:0"))));
    }

    #[test]
    fn test_empty_matcher_matches_nothing() {
        let compiled =
            CompiledParamRule::compile(&rule(r#"{"name": "r", "node": {}, "parameters": {"a": 1}}"#)).unwrap();
        assert!(!compiled.matches(&node("fx", None)));
    }

    #[test]
    fn test_invalid_pattern_is_dropped() {
        let set = ParamRuleSet::from_rules(&[
            rule(r#"{"name": "bad", "node": {"node.name": "(["}, "parameters": {"a": 1}}"#),
            rule(r#"{"name": "good", "node": {"node.name": "fx"}, "parameters": {"a": 1}}"#),
        ]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.rules()[0].name, "good");
    }
}
