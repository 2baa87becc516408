//! Service Configuration
//! Node names, on-disk locations and autosave cadence

use crate::error::{ControlError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Application directory name under the user's config/state dirs
const APP_DIR: &str = "pwcontrol";

/// Default autosave interval
const DEFAULT_AUTOSAVE_SECS: u64 = 10;

pub const VOLUME_RULES_FILE: &str = "volume.conf";
pub const VOLUME_STATE_FILE: &str = "volume.state";
pub const SETTINGS_FILE: &str = "settings.json";
pub const PARAM_RULES_FILE: &str = "param-rules.conf";
pub const LINK_RULES_FILE: &str = "link-rules.conf";

fn default_config_dir() -> String {
    dirs::config_dir()
        .map(|p| p.join(APP_DIR).to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("~/.config/{}", APP_DIR))
}

fn default_state_dir() -> String {
    dirs::state_dir()
        .map(|p| p.join(APP_DIR).to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("~/.state/{}", APP_DIR))
}

fn default_speakereq_node() -> String {
    "speakereq2x2".to_string()
}

fn default_riaa_node() -> String {
    "riaa".to_string()
}

fn default_autosave_secs() -> u64 {
    DEFAULT_AUTOSAVE_SECS
}

fn default_true() -> bool {
    true
}

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// `node.name` of the speaker EQ plugin node
    #[serde(default = "default_speakereq_node")]
    pub speakereq_node: String,
    /// `node.name` of the RIAA plugin node
    #[serde(default = "default_riaa_node")]
    pub riaa_node: String,
    /// Directory holding `volume.conf`, `param-rules.conf` and `link-rules.conf`
    #[serde(default = "default_config_dir")]
    pub config_dir: String,
    /// Directory holding `volume.state` and `settings.json`
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// Seconds between autosave checks
    #[serde(default = "default_autosave_secs")]
    pub autosave_interval_secs: u64,
    /// Whether the autosave task should run at all
    #[serde(default = "default_true")]
    pub autosave: bool,
    /// Whether link rules run at startup and on the relink scheduler
    #[serde(default = "default_true")]
    pub auto_link: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            speakereq_node: default_speakereq_node(),
            riaa_node: default_riaa_node(),
            config_dir: default_config_dir(),
            state_dir: default_state_dir(),
            autosave_interval_secs: DEFAULT_AUTOSAVE_SECS,
            autosave: true,
            auto_link: true,
        }
    }
}

impl ServiceConfig {
    /// Configuration rooted in one directory (config and state side by side)
    pub fn rooted_at(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_string_lossy().into_owned();
        Self {
            config_dir: dir.clone(),
            state_dir: dir,
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file; a missing file yields defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No service config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content =
            fs::read_to_string(path).map_err(|e| ControlError::read_file(path, e))?;
        let config: ServiceConfig =
            serde_json::from_str(&content).map_err(|e| ControlError::parse(path, e))?;
        info!("Loaded service configuration from {}", path.display());
        Ok(config)
    }

    /// Expanded config directory
    pub fn config_dir(&self) -> PathBuf {
        expand_dir(&self.config_dir)
    }

    /// Expanded state directory
    pub fn state_dir(&self) -> PathBuf {
        expand_dir(&self.state_dir)
    }

    pub fn volume_rules_path(&self) -> PathBuf {
        self.config_dir().join(VOLUME_RULES_FILE)
    }

    pub fn param_rules_path(&self) -> PathBuf {
        self.config_dir().join(PARAM_RULES_FILE)
    }

    pub fn link_rules_path(&self) -> PathBuf {
        self.config_dir().join(LINK_RULES_FILE)
    }

    pub fn volume_state_path(&self) -> PathBuf {
        self.state_dir().join(VOLUME_STATE_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.state_dir().join(SETTINGS_FILE)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs.max(1))
    }
}

/// Expand `~` and environment variables; unresolvable input is used verbatim
fn expand_dir(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.speakereq_node, "speakereq2x2");
        assert_eq!(config.riaa_node, "riaa");
        assert_eq!(config.autosave_interval(), Duration::from_secs(10));
        assert!(config.settings_path().ends_with("pwcontrol/settings.json"));
        assert!(config.volume_rules_path().ends_with("pwcontrol/volume.conf"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ServiceConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("service.json");
        fs::write(&path, r#"{ "riaa_node": "phono", "autosave_interval_secs": 3 }"#).unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.riaa_node, "phono");
        assert_eq!(config.speakereq_node, "speakereq2x2");
        assert_eq!(config.autosave_interval(), Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("service.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ServiceConfig::load(&path),
            Err(ControlError::Parse { .. })
        ));
    }

    #[test]
    fn test_tilde_expansion() {
        let mut config = ServiceConfig::default();
        config.state_dir = "~/somewhere".to_string();
        let state = config.state_dir();
        assert!(!state.to_string_lossy().starts_with('~'));
        assert!(state.ends_with("somewhere"));
    }

    #[test]
    fn test_rooted_at() {
        let config = ServiceConfig::rooted_at("/tmp/pwc");
        assert_eq!(config.settings_path(), PathBuf::from("/tmp/pwc/settings.json"));
        assert_eq!(config.volume_state_path(), PathBuf::from("/tmp/pwc/volume.state"));
        assert_eq!(config.param_rules_path(), PathBuf::from("/tmp/pwc/param-rules.conf"));
        assert_eq!(config.link_rules_path(), PathBuf::from("/tmp/pwc/link-rules.conf"));
        assert!(config.auto_link);
    }
}
