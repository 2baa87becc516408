//! Rule-driven linking
//!
//! `link-rules.conf` is a JSON array of rules naming a source and a
//! destination node:
//!
//! ```json
//! [
//!   {
//!     "name": "speakereq to DAC",
//!     "source": { "node.name": "^speakereq.x.\\.output$" },
//!     "destination": { "object.path": "alsa:.*:sndrpihifiberry:.*:playback" },
//!     "type": "link",
//!     "link_at_startup": true,
//!     "relink_every": 10
//!   }
//! ]
//! ```
//!
//! An identifier matches a node when ANY of its patterns matches. The
//! [`LinkScheduler`] applies rules once at startup and then re-applies those
//! with a non-zero `relink_every` on a tokio interval.

use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::links::LinkManager;
use super::object::GraphObject;
use crate::error::{ControlError, Result};
use crate::persist;
use crate::task::BackgroundTask;

/// How often the scheduler looks for due rules
pub const LINK_CHECK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Link,
    Unlink,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeIdentifier {
    #[serde(rename = "node.name", default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(rename = "node.nick", default, skip_serializing_if = "Option::is_none")]
    pub node_nick: Option<String>,
    #[serde(rename = "object.path", default, skip_serializing_if = "Option::is_none")]
    pub object_path: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRule {
    pub name: String,
    pub source: NodeIdentifier,
    pub destination: NodeIdentifier,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    #[serde(default = "default_true")]
    pub link_at_startup: bool,
    /// Seconds between re-applications; 0 applies the rule once
    #[serde(default)]
    pub relink_every: u64,
}

/// Compiled identifier patterns
#[derive(Debug, Clone)]
pub struct NodeSelector {
    patterns: Vec<(&'static str, Regex)>,
}

impl NodeSelector {
    fn compile(rule: &str, id: &NodeIdentifier) -> Result<Self> {
        let mut patterns = Vec::new();
        for (key, pattern) in [
            ("node.name", &id.node_name),
            ("node.nick", &id.node_nick),
            ("object.path", &id.object_path),
        ] {
            let Some(pattern) = pattern else { continue };
            let re = Regex::new(pattern).map_err(|e| {
                ControlError::validation(format!(
                    "link rule '{}': invalid pattern '{}': {}",
                    rule, pattern, e
                ))
            })?;
            patterns.push((key, re));
        }
        Ok(Self { patterns })
    }

    /// Any pattern may match; no patterns match nothing
    pub fn matches(&self, node: &GraphObject) -> bool {
        self.patterns
            .iter()
            .any(|(key, re)| node.get(key).map_or(false, |v| re.is_match(v)))
    }
}

#[derive(Debug, Clone)]
pub struct CompiledLinkRule {
    pub name: String,
    pub link_type: LinkType,
    pub link_at_startup: bool,
    pub relink_every: u64,
    pub source: NodeSelector,
    pub destination: NodeSelector,
}

impl CompiledLinkRule {
    pub fn compile(rule: &LinkRule) -> Result<Self> {
        Ok(Self {
            name: rule.name.clone(),
            link_type: rule.link_type,
            link_at_startup: rule.link_at_startup,
            relink_every: rule.relink_every,
            source: NodeSelector::compile(&rule.name, &rule.source)?,
            destination: NodeSelector::compile(&rule.name, &rule.destination)?,
        })
    }
}

/// Rules used when no `link-rules.conf` exists
pub fn default_rules() -> Vec<LinkRule> {
    vec![LinkRule {
        name: "speakereq to hifiberry".to_string(),
        source: NodeIdentifier {
            node_name: Some("^speakereq.x.\\.output$".to_string()),
            ..NodeIdentifier::default()
        },
        destination: NodeIdentifier {
            object_path: Some("alsa:.*:sndrpihifiberry:.*:playback".to_string()),
            ..NodeIdentifier::default()
        },
        link_type: LinkType::Link,
        link_at_startup: true,
        relink_every: 0,
    }]
}

#[derive(Debug, Clone, Default)]
pub struct LinkRuleSet {
    rules: Vec<CompiledLinkRule>,
}

impl LinkRuleSet {
    /// Compile rules, dropping invalid ones with a warning
    pub fn from_rules(rules: &[LinkRule]) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| match CompiledLinkRule::compile(rule) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!("Skipping link rule: {}", e);
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// Load `link-rules.conf`; a missing file yields [`default_rules`]
    pub fn load(path: &Path) -> Result<Self> {
        let set = match persist::read_json::<Vec<LinkRule>>(path)? {
            Some(rules) => Self::from_rules(&rules),
            None => {
                info!("No link rules at {}, using built-in defaults", path.display());
                Self::from_rules(&default_rules())
            }
        };
        info!("{} link rule(s) configured", set.rules.len());
        Ok(set)
    }

    pub fn rules(&self) -> &[CompiledLinkRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Outcome for one port pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkRuleResult {
    pub success: bool,
    pub message: String,
}

impl LinkRuleResult {
    pub(crate) fn ok(message: String) -> Self {
        Self {
            success: true,
            message,
        }
    }

    pub(crate) fn failed(message: String) -> Self {
        Self {
            success: false,
            message,
        }
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Whether a rule should run at `now`
///
/// A rule that has run is due again once `relink_every` seconds have passed,
/// never if that is 0. A rule that has not run is due immediately when it
/// links at startup, otherwise `relink_every` seconds after the scheduler
/// started.
pub fn is_due(rule: &CompiledLinkRule, last: Option<Instant>, started: Instant, now: Instant) -> bool {
    let every = Duration::from_secs(rule.relink_every);
    match last {
        Some(last) => rule.relink_every > 0 && now.saturating_duration_since(last) >= every,
        None if rule.link_at_startup => true,
        None => rule.relink_every > 0 && now.saturating_duration_since(started) >= every,
    }
}

/// Last outcome of one rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkRuleStatus {
    pub name: String,
    pub link_type: LinkType,
    pub relink_every: u64,
    pub runs: u64,
    pub links_ok: usize,
    pub links_failed: usize,
    pub last_error: Option<String>,
}

struct SchedulerState {
    last_applied: HashMap<usize, Instant>,
    status: Vec<LinkRuleStatus>,
}

pub struct LinkScheduler {
    links: LinkManager,
    rules: LinkRuleSet,
    started: Instant,
    state: Mutex<SchedulerState>,
}

impl LinkScheduler {
    pub fn new(links: LinkManager, rules: LinkRuleSet) -> Self {
        let status = rules
            .rules()
            .iter()
            .map(|r| LinkRuleStatus {
                name: r.name.clone(),
                link_type: r.link_type,
                relink_every: r.relink_every,
                runs: 0,
                links_ok: 0,
                links_failed: 0,
                last_error: None,
            })
            .collect();
        Self {
            links,
            rules,
            started: Instant::now(),
            state: Mutex::new(SchedulerState {
                last_applied: HashMap::new(),
                status,
            }),
        }
    }

    pub fn rules(&self) -> &LinkRuleSet {
        &self.rules
    }

    pub fn status(&self) -> Vec<LinkRuleStatus> {
        self.state.lock().status.clone()
    }

    /// Apply every `link_at_startup` rule; returns successful port pairs
    pub fn apply_startup(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let mut ok = 0;
        for (idx, rule) in self.rules.rules().iter().enumerate() {
            if !rule.link_at_startup {
                debug!("Link rule '{}' does not run at startup", rule.name);
                continue;
            }
            ok += self.run(&mut state, idx, rule, now);
        }
        info!("Startup link rules applied: {} link(s) in place", ok);
        ok
    }

    /// Apply the rules due at `now`; returns how many rules ran
    pub fn tick(&self, now: Instant) -> usize {
        let mut state = self.state.lock();
        let mut ran = 0;
        for (idx, rule) in self.rules.rules().iter().enumerate() {
            let last = state.last_applied.get(&idx).copied();
            if is_due(rule, last, self.started, now) {
                debug!("Link rule '{}' is due", rule.name);
                self.run(&mut state, idx, rule, now);
                ran += 1;
            }
        }
        ran
    }

    fn run(&self, state: &mut SchedulerState, idx: usize, rule: &CompiledLinkRule, now: Instant) -> usize {
        state.last_applied.insert(idx, now);
        let Some(status) = state.status.get_mut(idx) else {
            return 0;
        };
        status.runs += 1;

        match self.links.apply_rule(rule) {
            Ok(results) => {
                let ok = results.iter().filter(|r| r.success).count();
                let failures: Vec<&str> = results
                    .iter()
                    .filter(|r| !r.success)
                    .map(|r| r.message.as_str())
                    .collect();
                if failures.is_empty() {
                    info!("Link rule '{}': {}/{} pair(s) ok", rule.name, ok, results.len());
                    status.last_error = None;
                } else {
                    let joined = failures.join("; ");
                    error!("Link rule '{}' failed: {}", rule.name, joined);
                    status.last_error = Some(joined);
                }
                status.links_ok = ok;
                status.links_failed = failures.len();
                ok
            }
            Err(e) => {
                warn!("Link rule '{}' not applied: {}", rule.name, e);
                status.links_ok = 0;
                status.links_failed = 0;
                status.last_error = Some(e.to_string());
                0
            }
        }
    }

    /// Check for due rules every `period` on tokio
    pub fn spawn(self: Arc<Self>, period: Duration) -> BackgroundTask {
        info!("Link scheduler checking every {:?}", period);
        let scheduler = self;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let tick = scheduler.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || tick.tick(Instant::now())).await {
                    error!("Link scheduler tick panicked: {}", e);
                }
            }
        });
        BackgroundTask::new("link-scheduler", task)
    }
}
