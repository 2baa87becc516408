//! pwcontrol - PipeWire control plane
//!
//! A cached mirror of the audio graph with link management, typed control of
//! the speaker EQ and RIAA plugin nodes, rule-based volume restoration and
//! settings persistence. Parameter and link rules from the config directory
//! run at startup, and link rules can be re-applied periodically.
//! [`ControlPlane`] wires the components over one [`LiveGraph`] backend.

pub mod config;
pub mod error;
pub mod graph;
pub mod params;
pub mod persist;
pub mod revision;
pub mod settings;
pub mod task;
pub mod volume;

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

pub use config::ServiceConfig;
pub use error::{ControlError, ErrorKind, Result};
pub use graph::{
    GraphCache, GraphConnection, LinkManager, LinkRuleSet, LinkScheduler, LiveGraph, MemoryGraph,
    PwCliGraph,
};
pub use params::{NodeParams, ParamRuleSet, Riaa, SpeakerEq};
pub use revision::Revision;
pub use settings::{AutosaveHandle, RestoreReport, SettingsDocument, SettingsStore};
pub use task::BackgroundTask;
pub use volume::{RuleSet, VolumeResolver, VolumeStateFile};

/// Outcome of [`ControlPlane::startup`]
#[derive(Debug, Clone, Serialize)]
pub struct StartupReport {
    pub objects: usize,
    pub restore: Option<RestoreReport>,
    /// Nodes that accepted a parameter rule batch
    pub params_applied: usize,
    pub volumes_applied: usize,
    /// Port pairs linked (or unlinked) by startup link rules
    pub links_applied: usize,
}

pub struct ControlPlane {
    config: ServiceConfig,
    cache: Arc<GraphCache>,
    revision: Arc<Revision>,
    links: LinkManager,
    speakereq: Arc<SpeakerEq>,
    riaa: Arc<Riaa>,
    volumes: VolumeResolver,
    settings: Arc<SettingsStore>,
    param_rules: ParamRuleSet,
    link_scheduler: Arc<LinkScheduler>,
}

impl ControlPlane {
    /// Wire every component over `backend`
    ///
    /// Fails only when `volume.conf`, `param-rules.conf` or `link-rules.conf`
    /// exists but cannot be parsed.
    pub fn new(config: ServiceConfig, backend: impl LiveGraph + 'static) -> Result<Self> {
        let cache = Arc::new(GraphCache::new(Arc::new(GraphConnection::new(backend))));
        let revision = Arc::new(Revision::new());

        let speakereq = Arc::new(SpeakerEq::new(NodeParams::new(
            config.speakereq_node.clone(),
            cache.clone(),
            revision.clone(),
        )));
        let riaa = Arc::new(Riaa::new(NodeParams::new(
            config.riaa_node.clone(),
            cache.clone(),
            revision.clone(),
        )));

        let rules = RuleSet::load(&config.volume_rules_path())?;
        let volumes = VolumeResolver::new(
            cache.clone(),
            rules,
            VolumeStateFile::new(config.volume_state_path()),
        );
        let settings = Arc::new(SettingsStore::new(
            config.settings_path(),
            revision.clone(),
            speakereq.clone(),
            riaa.clone(),
        ));

        let param_rules = ParamRuleSet::load(&config.param_rules_path())?;
        let links = LinkManager::new(cache.clone());
        let link_scheduler = Arc::new(LinkScheduler::new(
            links.clone(),
            LinkRuleSet::load(&config.link_rules_path())?,
        ));

        Ok(Self {
            links,
            param_rules,
            link_scheduler,
            config,
            cache,
            revision,
            speakereq,
            riaa,
            volumes,
            settings,
        })
    }

    /// Control plane over the PipeWire command-line tools
    pub fn with_pw_cli(config: ServiceConfig) -> Result<Self> {
        Self::new(config, PwCliGraph::new())
    }

    /// Mirror the graph, restore saved settings, then apply parameter,
    /// volume and link rules
    ///
    /// Only a failed graph refresh is an error; the later steps log failures.
    pub fn startup(&self) -> Result<StartupReport> {
        let objects = self.cache.refresh()?;

        let restore = match self.settings.restore() {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Settings restore failed: {}", e);
                None
            }
        };

        let params_applied = self.apply_param_rules();

        let volumes_applied = match self.volumes.apply_rules() {
            Ok(count) => count,
            Err(e) => {
                error!("Volume rules failed: {}", e);
                0
            }
        };

        let links_applied = if self.config.auto_link {
            self.link_scheduler.apply_startup()
        } else {
            info!("Automatic linking disabled");
            0
        };

        info!(
            "Startup complete: {} objects, {} parameter node(s), {} volume(s), {} link(s)",
            objects, params_applied, volumes_applied, links_applied
        );
        Ok(StartupReport {
            objects,
            restore,
            params_applied,
            volumes_applied,
            links_applied,
        })
    }

    /// Apply the startup parameter rules; returns nodes written
    ///
    /// Module views of written nodes are re-read so they reflect the rules.
    pub fn apply_param_rules(&self) -> usize {
        let results = match self.param_rules.apply_startup(&self.cache) {
            Ok(results) => results,
            Err(e) => {
                error!("Parameter rules failed: {}", e);
                return 0;
            }
        };
        let written: Vec<&str> = results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.node_name.as_str())
            .collect();

        if written.contains(&self.config.speakereq_node.as_str()) {
            if let Err(e) = self.speakereq.refresh() {
                warn!("Could not re-read speaker EQ after parameter rules: {}", e);
            }
        }
        if written.contains(&self.config.riaa_node.as_str()) {
            if let Err(e) = self.riaa.refresh() {
                warn!("Could not re-read RIAA after parameter rules: {}", e);
            }
        }
        written.len()
    }

    /// Start autosave if the configuration enables it
    pub fn spawn_autosave(&self) -> Option<AutosaveHandle> {
        if !self.config.autosave {
            info!("Autosave disabled");
            return None;
        }
        Some(self.settings.clone().spawn_autosave(self.config.autosave_interval()))
    }

    /// Start the relink scheduler unless automatic linking is off or no
    /// rules are configured
    pub fn spawn_link_scheduler(&self) -> Option<BackgroundTask> {
        if !self.config.auto_link || self.link_scheduler.rules().is_empty() {
            info!("Link scheduler not started");
            return None;
        }
        Some(self.link_scheduler.clone().spawn(graph::link_rules::LINK_CHECK_PERIOD))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn graph(&self) -> &Arc<GraphCache> {
        &self.cache
    }

    pub fn revision(&self) -> &Arc<Revision> {
        &self.revision
    }

    pub fn links(&self) -> &LinkManager {
        &self.links
    }

    pub fn speakereq(&self) -> &Arc<SpeakerEq> {
        &self.speakereq
    }

    pub fn riaa(&self) -> &Arc<Riaa> {
        &self.riaa
    }

    pub fn volumes(&self) -> &VolumeResolver {
        &self.volumes
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn param_rules(&self) -> &ParamRuleSet {
        &self.param_rules
    }

    pub fn link_scheduler(&self) -> &Arc<LinkScheduler> {
        &self.link_scheduler
    }

    /// Graphviz rendering of the cached graph
    pub fn render_dot(&self) -> String {
        graph::render_dot(&self.cache.snapshot())
    }
}
