//! Volume resolution and volume CRUD
//!
//! Rule application happens in two stages. [`plan`] decides which volume each
//! object should get from the rules and the state file without touching the
//! graph; [`VolumeResolver::apply`] then sets those volumes.

use arc_swap::ArcSwap;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::rules::RuleSet;
use super::state::{VolumeState, VolumeStateFile};
use crate::error::{ControlError, Result};
use crate::graph::{GraphCache, GraphObject, GraphSnapshot, ObjectType};

/// Where a planned volume came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeSource {
    /// The rule's fixed volume
    Fixed,
    /// The saved volume for the object's name
    StateFile,
    /// The rule wanted saved state but none existed
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedVolume {
    pub id: u32,
    pub name: String,
    pub rule: String,
    pub volume: f32,
    pub source: VolumeSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VolumePlan {
    pub entries: Vec<PlannedVolume>,
}

impl VolumePlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_candidate(obj: &GraphObject) -> bool {
    matches!(obj.object_type, ObjectType::Node | ObjectType::Device)
}

/// Decide volumes for every node and device; unmatched objects are left out
pub fn plan(snapshot: &GraphSnapshot, rules: &RuleSet, state: &VolumeState) -> VolumePlan {
    let entries = snapshot
        .objects()
        .filter(|o| is_candidate(o))
        .filter_map(|obj| {
            let rule = rules.first_match(obj.properties())?;
            let (volume, source) = match (rule.use_state_file, state.get(&obj.name)) {
                (true, Some(&saved)) if (0.0..=1.0).contains(&saved) => (saved, VolumeSource::StateFile),
                (true, Some(&saved)) => {
                    warn!(
                        "Saved volume {} for {} is outside 0..=1, using rule '{}'",
                        saved, obj.name, rule.name
                    );
                    (rule.fixed_volume, VolumeSource::Fallback)
                }
                (true, None) => (rule.fixed_volume, VolumeSource::Fallback),
                (false, _) => (rule.fixed_volume, VolumeSource::Fixed),
            };
            Some(PlannedVolume {
                id: obj.id,
                name: obj.name.clone(),
                rule: rule.name.clone(),
                volume,
                source,
            })
        })
        .collect();
    VolumePlan { entries }
}

/// Volume of one node or device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeInfo {
    pub id: u32,
    pub name: String,
    pub object_type: String,
    pub volume: f32,
}

/// `sink`, `source`, `stream`, `filter` or `device`
pub fn volume_object_type(obj: &GraphObject) -> &'static str {
    if obj.object_type == ObjectType::Device {
        return "device";
    }
    match obj.media_class() {
        Some(class) if class.starts_with("Stream/") => "stream",
        Some(class) if class.contains("Sink") => "sink",
        Some(class) if class.contains("Source") => "source",
        _ => "filter",
    }
}

pub struct VolumeResolver {
    cache: Arc<GraphCache>,
    rules: ArcSwap<RuleSet>,
    state: VolumeStateFile,
}

impl VolumeResolver {
    pub fn new(cache: Arc<GraphCache>, rules: RuleSet, state: VolumeStateFile) -> Self {
        Self {
            cache,
            rules: ArcSwap::from_pointee(rules),
            state,
        }
    }

    pub fn state_file(&self) -> &VolumeStateFile {
        &self.state
    }

    /// Replace the rule set from `volume.conf`
    pub fn reload_rules(&self, path: &Path) -> Result<usize> {
        let rules = RuleSet::load(path)?;
        let count = rules.len();
        self.rules.store(Arc::new(rules));
        Ok(count)
    }

    /// Plan against the current cache and state file
    pub fn plan(&self) -> Result<VolumePlan> {
        let state = self.state.load()?;
        Ok(plan(&self.cache.snapshot(), &self.rules.load(), &state))
    }

    /// Set every planned volume; failures are logged and skipped
    pub fn apply(&self, plan: &VolumePlan) -> usize {
        let mut applied = 0;
        for entry in &plan.entries {
            let result = self
                .cache
                .connection()
                .with(|g| g.set_volume(entry.id, entry.volume));
            match result {
                Ok(()) => {
                    info!(
                        "Volume {:.3} -> {} ({}) via rule '{}' [{:?}]",
                        entry.volume, entry.name, entry.id, entry.rule, entry.source
                    );
                    applied += 1;
                }
                Err(e) => error!("Failed to set volume of {} ({}): {}", entry.name, entry.id, e),
            }
        }
        applied
    }

    /// Plan over the cached graph and apply it; returns volumes set
    pub fn apply_rules(&self) -> Result<usize> {
        let state = match self.state.load() {
            Ok(state) => state,
            Err(e) => {
                warn!("Ignoring unreadable volume state: {}", e);
                VolumeState::new()
            }
        };
        let plan = plan(&self.cache.snapshot(), &self.rules.load(), &state);
        if plan.is_empty() {
            debug!("No objects matched any volume rule");
        }
        Ok(self.apply(&plan))
    }

    // =========================================================================
    // Volume CRUD
    // =========================================================================

    /// Every cached node and device that has a volume control
    pub fn list(&self) -> Result<Vec<VolumeInfo>> {
        let snapshot = self.cache.snapshot();
        let candidates: Vec<&GraphObject> = snapshot.objects().filter(|o| is_candidate(o)).collect();
        self.cache.connection().with(|g| {
            let mut out = Vec::new();
            for obj in candidates {
                if let Some(volume) = g.volume(obj.id)? {
                    out.push(VolumeInfo {
                        id: obj.id,
                        name: obj.name.clone(),
                        object_type: volume_object_type(obj).to_string(),
                        volume,
                    });
                }
            }
            Ok(out)
        })
    }

    fn object(&self, id: u32) -> Result<GraphObject> {
        let obj = self.cache.get(id)?;
        if !is_candidate(&obj) {
            return Err(ControlError::not_found(format!("object {} has no volume", id)));
        }
        Ok(obj)
    }

    pub fn get(&self, id: u32) -> Result<VolumeInfo> {
        let obj = self.object(id)?;
        let volume = self
            .cache
            .connection()
            .with(|g| g.volume(id))?
            .ok_or_else(|| ControlError::not_found(format!("object {} has no volume control", id)))?;
        Ok(VolumeInfo {
            id,
            object_type: volume_object_type(&obj).to_string(),
            name: obj.name,
            volume,
        })
    }

    pub fn set(&self, id: u32, volume: f32) -> Result<VolumeInfo> {
        if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
            return Err(ControlError::validation(format!(
                "volume must be between 0.0 and 1.0, got {}",
                volume
            )));
        }
        let obj = self.object(id)?;
        self.cache.connection().with(|g| g.set_volume(id, volume))?;
        info!("Set volume of {} ({}) to {:.3}", obj.name, id, volume);
        Ok(VolumeInfo {
            id,
            object_type: volume_object_type(&obj).to_string(),
            name: obj.name,
            volume,
        })
    }

    /// Save one object's live volume under its name
    pub fn save(&self, id: u32) -> Result<VolumeInfo> {
        let info = self.get(id)?;
        self.state.save([(info.name.clone(), info.volume)])?;
        Ok(info)
    }

    /// Save every listed volume; returns how many were written
    pub fn save_all(&self) -> Result<usize> {
        let volumes = self.list()?;
        self.state
            .save(volumes.into_iter().map(|v| (v.name, v.volume)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ObjectType, RawObject};
    use crate::volume::rules::VolumeRule;

    fn rule(name: &str, pattern: &str, volume: f32, use_state_file: bool) -> VolumeRule {
        VolumeRule {
            name: name.into(),
            object_match: [("node.name".to_string(), pattern.to_string())]
                .into_iter()
                .collect(),
            fixed_volume: volume,
            use_state_file,
        }
    }

    fn snapshot() -> GraphSnapshot {
        GraphSnapshot::from_raw(vec![
            RawObject::new(40, ObjectType::Node)
                .with_prop("node.name", "sink_a")
                .with_prop("media.class", "Audio/Sink"),
            RawObject::new(41, ObjectType::Node)
                .with_prop("node.name", "sink_b")
                .with_prop("media.class", "Audio/Sink"),
            RawObject::new(42, ObjectType::Node)
                .with_prop("node.name", "other")
                .with_prop("media.class", "Audio/Source"),
            // ports never get volumes even if a rule would match
            RawObject::new(43, ObjectType::Port).with_prop("node.name", "sink_a"),
        ])
    }

    #[test]
    fn test_plan_sources() {
        let rules = RuleSet::from_rules(&[
            rule("a", "^sink_a$", 0.5, true),
            rule("b", "^sink_b$", 0.25, true),
            rule("any-sink", "^sink_", 0.9, false),
        ]);
        let mut state = VolumeState::new();
        state.insert("sink_a".into(), 0.33);

        let plan = plan(&snapshot(), &rules, &state);
        assert_eq!(plan.len(), 2);

        let a = &plan.entries[0];
        assert_eq!((a.id, a.source, a.volume), (40, VolumeSource::StateFile, 0.33));
        let b = &plan.entries[1];
        assert_eq!((b.id, b.source, b.volume), (41, VolumeSource::Fallback, 0.25));
    }

    #[test]
    fn test_out_of_range_saved_volume_falls_back() {
        let rules = RuleSet::from_rules(&[rule("sinks", "^sink_", 0.6, true)]);
        let mut state = VolumeState::new();
        state.insert("sink_a".into(), 1.7);
        state.insert("sink_b".into(), f32::NAN);

        let plan = plan(&snapshot(), &rules, &state);
        assert_eq!(plan.len(), 2);
        assert!(plan
            .entries
            .iter()
            .all(|e| e.source == VolumeSource::Fallback && e.volume == 0.6));
    }

    #[test]
    fn test_plan_without_state_uses_fixed() {
        let rules = RuleSet::from_rules(&[rule("all", ".*", 0.7, false)]);
        let plan = plan(&snapshot(), &rules, &VolumeState::new());
        assert_eq!(plan.len(), 3);
        assert!(plan
            .entries
            .iter()
            .all(|e| e.source == VolumeSource::Fixed && e.volume == 0.7));
    }

    #[test]
    fn test_object_type_from_media_class() {
        let snap = snapshot();
        assert_eq!(volume_object_type(snap.get(40).unwrap()), "sink");
        assert_eq!(volume_object_type(snap.get(42).unwrap()), "source");
    }
}
