//! Orchestrator configuration
//!
//! Layers, lowest priority first: built-in defaults, the YAML config file,
//! `HERMES_*` environment variables (a `.env` file is loaded by the binary
//! before this runs), then CLI flags applied by the caller.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::classifier::{default_rules, MilestoneRule, OutputClassifier};
use crate::error::{OrchestratorError, Result};

pub const DEFAULT_CREDENTIAL_VAR: &str = "GOOGLE_API_KEY";
pub const DEFAULT_AGENT_SCRIPT: &str = "hermes-core/zswe_agent/main.py";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Interpreter path or bare name; discovered on PATH when unset
    pub interpreter: Option<PathBuf>,
    /// Agent entry script, relative paths resolve against `project_root`
    pub agent_script: PathBuf,
    pub project_root: PathBuf,
    /// Variable the credential is injected under
    pub credential_var: String,
    /// Never written to or read from the config file
    #[serde(skip)]
    pub credential: Option<String>,
    /// Refresh cadence of poll-style views
    pub poll_interval_ms: u64,
    /// Milestone table, in priority order
    pub milestones: Vec<MilestoneRule>,
    /// Where the TUI writes its log; defaults to the cache directory
    pub log_file: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            interpreter: None,
            agent_script: PathBuf::from(DEFAULT_AGENT_SCRIPT),
            project_root: PathBuf::from("."),
            credential_var: DEFAULT_CREDENTIAL_VAR.to_string(),
            credential: None,
            poll_interval_ms: 1000,
            milestones: default_rules(),
            log_file: None,
        }
    }
}

impl OrchestratorConfig {
    /// `<config dir>/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "hermes", "hermes").map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Default log location for the TUI
    pub fn default_log_file() -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from("dev", "hermes", "hermes") {
            proj_dirs.cache_dir().join("hermes.log")
        } else {
            PathBuf::from(".hermes.log")
        }
    }

    /// Load from an explicit file (which must exist) or from the default
    /// location (skipped when absent), then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");
        let content = std::fs::read_to_string(path).map_err(|e| OrchestratorError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&content, path)
    }

    pub fn from_yaml_str(content: &str, origin: &Path) -> Result<Self> {
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| OrchestratorError::Config {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?
        };
        config.validate(origin)?;
        Ok(config)
    }

    /// Overlay `HERMES_*` variables. `lookup` abstracts the environment so
    /// tests do not have to mutate the process env.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("HERMES_PYTHON").filter(|v| !v.is_empty()) {
            self.interpreter = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("HERMES_AGENT_SCRIPT").filter(|v| !v.is_empty()) {
            self.agent_script = PathBuf::from(value);
        }
        if let Some(value) = lookup("HERMES_PROJECT_ROOT").filter(|v| !v.is_empty()) {
            self.project_root = PathBuf::from(value);
        }
        if let Some(value) = lookup("HERMES_CREDENTIAL_VAR").filter(|v| !v.is_empty()) {
            self.credential_var = value;
        }
        if let Some(value) = lookup("HERMES_API_KEY").filter(|v| !v.is_empty()) {
            self.credential = Some(value);
        }
        if let Some(value) = lookup("HERMES_POLL_INTERVAL_MS") {
            self.poll_interval_ms = value.parse().map_err(|_| OrchestratorError::Config {
                path: PathBuf::from("HERMES_POLL_INTERVAL_MS"),
                message: format!("'{}' is not a number of milliseconds", value),
            })?;
        }
        self.validate(Path::new("environment"))
    }

    fn validate(&self, origin: &Path) -> Result<()> {
        let invalid = |message: String| OrchestratorError::Config {
            path: origin.to_path_buf(),
            message,
        };

        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms must be greater than zero".to_string()));
        }
        if self.credential_var.trim().is_empty() {
            return Err(invalid("credential_var must not be empty".to_string()));
        }
        OutputClassifier::new(self.milestones.clone()).map_err(invalid)?;
        Ok(())
    }

    /// Agent script resolved against the project root
    pub fn agent_script_path(&self) -> PathBuf {
        if self.agent_script.is_absolute() {
            self.agent_script.clone()
        } else {
            self.project_root.join(&self.agent_script)
        }
    }

    pub fn classifier(&self) -> Result<OutputClassifier> {
        OutputClassifier::new(self.milestones.clone()).map_err(|message| OrchestratorError::Config {
            path: PathBuf::from("milestones"),
            message,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `(variable, value)` to overlay on the child's environment, if any
    pub fn credential_env(&self) -> Option<(String, String)> {
        self.credential
            .as_ref()
            .map(|value| (self.credential_var.clone(), value.clone()))
    }
}
