//! Configuration module for vaultsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, Identity, MachineId, Resolution, Role, UserId};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for vaultsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vault: VaultConfig,
    pub identity: IdentityConfig,
    pub executor: ExecutorConfig,
    pub classifier: ClassifierConfig,
    pub conflicts: ConflictsConfig,
    pub ignore: IgnoreConfig,
    pub logging: LoggingConfig,
}

/// Working tree location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Root directory of the local working tree.
    pub root: PathBuf,
    /// Trash folder for deleted items, relative to the root.
    pub trash_dir: String,
}

/// Who the client acts as.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Vault user id. Required before any command can run.
    pub user_id: Option<String>,
    /// Stable id of this workstation. Generated on first use when unset.
    pub machine_id: Option<String>,
    /// Human-readable workstation name shown to other users.
    pub machine_name: String,
    /// `member` or `admin`.
    pub role: String,
}

/// Batch execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Upper bound on units of work running at once.
    pub max_concurrency: usize,
    /// Weight of the newest sample in the throughput moving average.
    pub throughput_smoothing: f64,
}

/// Diff classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Remote-only files created by someone else within this window are `cloudNew`.
    pub cloud_new_window_hours: u32,
}

/// Placement collision settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// `overwrite`, `rename` or `skip`.
    pub default_resolution: String,
}

/// Vault ignore rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Glob patterns matched against vault-relative paths and file names.
    pub patterns: Vec<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/vaultsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("vaultsync")
            .join("config.yaml")
    }

    /// Build the acting identity from the `identity` section.
    ///
    /// A missing machine id is replaced by a freshly generated one; callers
    /// that want it stable across runs should persist the config afterwards.
    pub fn identity(&self) -> Result<Identity, DomainError> {
        let user_id = self
            .identity
            .user_id
            .as_deref()
            .ok_or_else(|| DomainError::ValidationFailed("identity.user_id is not set".into()))
            .and_then(UserId::new)?;
        let machine_id = match self.identity.machine_id.as_deref() {
            Some(id) => MachineId::new(id)?,
            None => MachineId::generate(),
        };
        let role: Role = self.identity.role.parse()?;
        Ok(Identity::new(
            user_id,
            machine_id,
            self.identity.machine_name.clone(),
            role,
        ))
    }

    /// Parsed default collision resolution.
    pub fn default_resolution(&self) -> Result<Resolution, DomainError> {
        self.conflicts.default_resolution.parse()
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Vault"),
            trash_dir: ".vaultsync/trash".to_string(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            machine_id: None,
            machine_name: "workstation".to_string(),
            role: "member".to_string(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            throughput_smoothing: 0.3,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            cloud_new_window_hours: 24,
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            default_resolution: "rename".to_string(),
        }
    }
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            patterns: [
                "~$*", "*.tmp", "*.bak", "*.swp", ".~lock.*#", "Thumbs.db", ".DS_Store",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"executor.max_concurrency"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `conflicts.default_resolution`.
const VALID_RESOLUTIONS: &[&str] = &["overwrite", "rename", "skip"];

/// Valid values for `identity.role`.
const VALID_ROLES: &[&str] = &["member", "admin"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- vault ---
        let root_str = self.vault.root.to_string_lossy();
        if !root_str.starts_with('~') && !self.vault.root.exists() {
            errors.push(ValidationError {
                field: "vault.root".into(),
                message: format!("directory does not exist: {}", self.vault.root.display()),
            });
        }
        if self.vault.trash_dir.trim().is_empty() {
            errors.push(ValidationError {
                field: "vault.trash_dir".into(),
                message: "must not be empty".into(),
            });
        } else if self.vault.trash_dir.split(['/', '\\']).any(|c| c == "..") {
            errors.push(ValidationError {
                field: "vault.trash_dir".into(),
                message: "must stay inside the vault root".into(),
            });
        }

        // --- identity ---
        match self.identity.user_id.as_deref() {
            None => errors.push(ValidationError {
                field: "identity.user_id".into(),
                message: "must be set".into(),
            }),
            Some(id) => {
                if let Err(e) = UserId::new(id) {
                    errors.push(ValidationError {
                        field: "identity.user_id".into(),
                        message: e.to_string(),
                    });
                }
            }
        }
        if let Some(Err(e)) = self.identity.machine_id.as_deref().map(MachineId::new) {
            errors.push(ValidationError {
                field: "identity.machine_id".into(),
                message: e.to_string(),
            });
        }
        if !VALID_ROLES.contains(&self.identity.role.as_str()) {
            errors.push(ValidationError {
                field: "identity.role".into(),
                message: format!(
                    "invalid role '{}'; valid options: {}",
                    self.identity.role,
                    VALID_ROLES.join(", ")
                ),
            });
        }

        // --- executor ---
        if self.executor.max_concurrency == 0 || self.executor.max_concurrency > 64 {
            errors.push(ValidationError {
                field: "executor.max_concurrency".into(),
                message: "must be in range 1..=64".into(),
            });
        }
        let smoothing = self.executor.throughput_smoothing;
        if !(smoothing > 0.0 && smoothing <= 1.0) {
            errors.push(ValidationError {
                field: "executor.throughput_smoothing".into(),
                message: "must be in range (0, 1]".into(),
            });
        }

        // --- classifier ---
        if self.classifier.cloud_new_window_hours == 0 {
            errors.push(ValidationError {
                field: "classifier.cloud_new_window_hours".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- conflicts ---
        if !VALID_RESOLUTIONS.contains(&self.conflicts.default_resolution.as_str()) {
            errors.push(ValidationError {
                field: "conflicts.default_resolution".into(),
                message: format!(
                    "invalid resolution '{}'; valid options: {}",
                    self.conflicts.default_resolution,
                    VALID_RESOLUTIONS.join(", ")
                ),
            });
        }

        // --- ignore ---
        for (i, pattern) in self.ignore.patterns.iter().enumerate() {
            if let Err(e) = glob::Pattern::new(pattern) {
                errors.push(ValidationError {
                    field: format!("ignore.patterns[{i}]"),
                    message: format!("invalid glob '{pattern}': {e}"),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use vaultsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .vault_root(PathBuf::from("/home/user/Vault"))
///     .identity_user_id("alice")
///     .executor_max_concurrency(16)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- vault ---

    pub fn vault_root(mut self, root: PathBuf) -> Self {
        self.config.vault.root = root;
        self
    }

    pub fn vault_trash_dir(mut self, trash_dir: impl Into<String>) -> Self {
        self.config.vault.trash_dir = trash_dir.into();
        self
    }

    // --- identity ---

    pub fn identity_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.config.identity.user_id = Some(user_id.into());
        self
    }

    pub fn identity_machine_id(mut self, machine_id: impl Into<String>) -> Self {
        self.config.identity.machine_id = Some(machine_id.into());
        self
    }

    pub fn identity_machine_name(mut self, name: impl Into<String>) -> Self {
        self.config.identity.machine_name = name.into();
        self
    }

    pub fn identity_role(mut self, role: impl Into<String>) -> Self {
        self.config.identity.role = role.into();
        self
    }

    // --- executor ---

    pub fn executor_max_concurrency(mut self, n: usize) -> Self {
        self.config.executor.max_concurrency = n;
        self
    }

    pub fn executor_throughput_smoothing(mut self, alpha: f64) -> Self {
        self.config.executor.throughput_smoothing = alpha;
        self
    }

    // --- classifier ---

    pub fn classifier_cloud_new_window_hours(mut self, hours: u32) -> Self {
        self.config.classifier.cloud_new_window_hours = hours;
        self
    }

    // --- conflicts ---

    pub fn conflicts_default_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.config.conflicts.default_resolution = resolution.into();
        self
    }

    // --- ignore ---

    pub fn ignore_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.ignore.patterns.push(pattern.into());
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
