//! Provisioning settings.
//!
//! Everything the orchestrator needs to know about *which* container to
//! manage and *how* to initialize it lives here rather than in process-wide
//! literals, so the lifecycle logic can be exercised against fakes.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{CtlhostError, Result};
use crate::types::ImageReference;

/// Root settings for one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionSettings {
    /// Image the container is created from.
    pub image: String,
    /// Logical name used to find "the" managed container across runs.
    pub container_name: String,
    /// Directory inside the container that receives the SSH key.
    pub ssh_key_dir_in_container: String,
    /// Directory inside the container that receives the inventory file.
    pub inventory_dir_in_container: String,
    /// Absolute path of the init script inside the container.
    pub init_script: String,
    /// User the init script runs as.
    pub exec_user: String,
    /// Working directory of the init script.
    pub exec_working_dir: String,
    /// Connectivity probe behaviour.
    pub probe: ProbeSettings,
    /// Interactive prompt behaviour.
    pub prompt: PromptSettings,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            image: constants::DEFAULT_IMAGE.to_owned(),
            container_name: constants::DEFAULT_CONTAINER_NAME.to_owned(),
            ssh_key_dir_in_container: constants::DEFAULT_SSH_KEY_DIR_IN_CONTAINER.to_owned(),
            inventory_dir_in_container: constants::DEFAULT_INVENTORY_DIR_IN_CONTAINER.to_owned(),
            init_script: constants::DEFAULT_INIT_SCRIPT.to_owned(),
            exec_user: constants::DEFAULT_EXEC_USER.to_owned(),
            exec_working_dir: constants::DEFAULT_EXEC_WORKING_DIR.to_owned(),
            probe: ProbeSettings::default(),
            prompt: PromptSettings::default(),
        }
    }
}

impl ProvisionSettings {
    /// Loads settings from a JSON file. Absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// contains an empty mandatory value.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CtlhostError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings: Self = serde_json::from_str(&content)?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "provision settings loaded");
        Ok(settings)
    }

    /// Checks that no mandatory value is blank.
    ///
    /// # Errors
    ///
    /// Returns [`CtlhostError::Config`] naming the first blank field.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("image", &self.image),
            ("container_name", &self.container_name),
            ("ssh_key_dir_in_container", &self.ssh_key_dir_in_container),
            ("inventory_dir_in_container", &self.inventory_dir_in_container),
            ("init_script", &self.init_script),
            ("exec_user", &self.exec_user),
            ("exec_working_dir", &self.exec_working_dir),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(CtlhostError::Config {
                message: format!("{name} must not be empty"),
            });
        }
        if self.prompt.max_attempts == 0 {
            return Err(CtlhostError::Config {
                message: "prompt.max_attempts must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Returns the configured image as a typed reference.
    #[must_use]
    pub fn image_reference(&self) -> ImageReference {
        ImageReference::new(&self.image)
    }
}

/// Retry behaviour of the initial connectivity probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Retries after the first failed ping; `0` fails on the first error.
    pub max_retries: u32,
    /// Fixed delay between attempts, in milliseconds.
    pub delay_ms: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            max_retries: constants::DEFAULT_PROBE_MAX_RETRIES,
            delay_ms: constants::DEFAULT_PROBE_DELAY_MS,
        }
    }
}

impl ProbeSettings {
    /// Returns the inter-attempt delay.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Behaviour of yes/no confirmations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Attempts before a prompt gives up.
    pub max_attempts: u32,
    /// When `true`, a prompt that never received a clear answer counts as
    /// "no" instead of aborting the run.
    pub unanswered_is_decline: bool,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_PROMPT_ATTEMPTS,
            unanswered_is_decline: false,
        }
    }
}
