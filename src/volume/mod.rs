//! Volume rules, persisted volume state and volume CRUD

pub mod resolver;
pub mod rules;
pub mod state;

pub use resolver::{plan, PlannedVolume, VolumeInfo, VolumePlan, VolumeResolver, VolumeSource};
pub use rules::{CompiledRule, RuleSet, VolumeRule};
pub use state::{VolumeState, VolumeStateEntry, VolumeStateFile};
