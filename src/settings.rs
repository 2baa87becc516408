//! Module settings persistence
//!
//! `settings.json` holds one [`SettingsDocument`] with the state of every
//! available module. Explicit saves and the autosave task go through the same
//! persistence mutex, and each document is captured under the module revision
//! lock so it never observes half of a mutation.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::{ControlError, Result};
use crate::params::{ModuleConfig, Riaa, RiaaConfig, SpeakerEq};
use crate::persist;
use crate::revision::Revision;
use crate::task::BackgroundTask;

/// The running autosave task
pub type AutosaveHandle = BackgroundTask;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsDocument {
    pub version: String,
    #[serde(default)]
    pub speakereq: Option<ModuleConfig>,
    #[serde(default)]
    pub riaa: Option<RiaaConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestoreReport {
    pub success: bool,
    pub modules_restored: Vec<String>,
    pub message: String,
}

/// What was last written to (or read from) disk
#[derive(Debug, Default)]
struct Persisted {
    revision: u64,
    document: Option<SettingsDocument>,
}

pub struct SettingsStore {
    path: PathBuf,
    revision: Arc<Revision>,
    speakereq: Arc<SpeakerEq>,
    riaa: Arc<Riaa>,
    persisted: Mutex<Persisted>,
}

/// A module that cannot be read is recorded as absent
fn module_state<T>(name: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(state) => Some(state),
        Err(ControlError::ProbeFailure(reason)) => {
            debug!("Module {} unavailable: {}", name, reason);
            None
        }
        Err(e) => {
            warn!("Could not read module {}: {}", name, e);
            None
        }
    }
}

impl SettingsStore {
    pub fn new(
        path: impl Into<PathBuf>,
        revision: Arc<Revision>,
        speakereq: Arc<SpeakerEq>,
        riaa: Arc<Riaa>,
    ) -> Self {
        let persisted = Persisted {
            revision: revision.current(),
            document: None,
        };
        Self {
            path: path.into(),
            revision,
            speakereq,
            riaa,
            persisted: Mutex::new(persisted),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Document and the revision it reflects
    fn capture(&self) -> (u64, SettingsDocument) {
        self.revision.observe(|revision| {
            let document = SettingsDocument {
                version: env!("CARGO_PKG_VERSION").to_string(),
                speakereq: module_state("speakereq", self.speakereq.status()),
                riaa: module_state("riaa", self.riaa.config()),
            };
            (revision, document)
        })
    }

    /// Current state of every module, unavailable ones as `None`
    pub fn snapshot(&self) -> SettingsDocument {
        self.capture().1
    }

    fn write(&self, persisted: &mut Persisted, revision: u64, document: SettingsDocument) -> Result<()> {
        persist::write_json_atomic(&self.path, &document)?;
        info!("Saved settings to {}", self.path.display());
        persisted.revision = revision;
        persisted.document = Some(document);
        Ok(())
    }

    /// Write the current document; returns the file written
    pub fn save(&self) -> Result<PathBuf> {
        let mut persisted = self.persisted.lock();
        let (revision, document) = self.capture();
        self.write(&mut persisted, revision, document)?;
        Ok(self.path.clone())
    }

    /// Apply every module found in `settings.json`
    ///
    /// A module that fails to apply is logged and left out of the report.
    pub fn restore(&self) -> Result<RestoreReport> {
        let mut persisted = self.persisted.lock();
        let document: SettingsDocument = match persist::read_json(&self.path)? {
            Some(document) => document,
            None => {
                info!("No saved settings at {}", self.path.display());
                return Ok(RestoreReport {
                    success: true,
                    modules_restored: Vec::new(),
                    message: "no saved settings".to_string(),
                });
            }
        };

        let mut restored = Vec::new();
        let mut failed = Vec::new();
        if let Some(config) = &document.speakereq {
            match self.speakereq.apply_config(config) {
                Ok(()) => restored.push("speakereq".to_string()),
                Err(e) => {
                    error!("Failed to restore speakereq: {}", e);
                    failed.push("speakereq");
                }
            }
        }
        if let Some(config) = &document.riaa {
            match self.riaa.apply_config(config) {
                Ok(()) => restored.push("riaa".to_string()),
                Err(e) => {
                    error!("Failed to restore riaa: {}", e);
                    failed.push("riaa");
                }
            }
        }

        // Restored state came from disk; autosave has nothing new to write
        let (revision, current) = self.capture();
        persisted.revision = revision;
        persisted.document = Some(current);

        let message = if failed.is_empty() {
            format!("restored {} module(s)", restored.len())
        } else {
            format!(
                "restored {} module(s), failed: {}",
                restored.len(),
                failed.join(", ")
            )
        };
        info!("Settings restore from {}: {}", self.path.display(), message);
        Ok(RestoreReport {
            success: failed.is_empty(),
            modules_restored: restored,
            message,
        })
    }

    /// Persist if module state differs from the last write; true when written
    ///
    /// Before the first save or restore an unchanged revision means nothing
    /// to do. After that the captured document is compared with the persisted
    /// one whatever the revision says.
    pub fn autosave_tick(&self) -> bool {
        let mut persisted = self.persisted.lock();
        if persisted.document.is_none() && self.revision.current() == persisted.revision {
            debug!("Autosave: no module changes since startup");
            return false;
        }

        let (revision, document) = self.capture();
        if persisted.document.as_ref() == Some(&document) {
            debug!("Autosave: revision {} matches saved settings", revision);
            persisted.revision = revision;
            return false;
        }

        match self.write(&mut persisted, revision, document) {
            Ok(()) => true,
            Err(e) => {
                error!("Autosave failed: {}", e);
                false
            }
        }
    }

    /// Run [`autosave_tick`](Self::autosave_tick) every `interval` on tokio
    pub fn spawn_autosave(self: Arc<Self>, interval: Duration) -> AutosaveHandle {
        info!("Autosave every {:?}", interval);
        let store = self;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let tick = store.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || tick.autosave_tick()).await {
                    error!("Autosave tick panicked: {}", e);
                }
            }
        });
        BackgroundTask::new("autosave", task)
    }
}
