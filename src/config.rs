//! Configuration management.

use serde::Deserialize;
use std::path::PathBuf;

/// Policy for containment-cycle prevention in subcomponent links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePolicy {
    /// Reject only the direct two-cycle (A contains B, B contains A).
    #[default]
    DirectOnly,
    /// Walk the containment graph and reject any cycle, however long.
    Transitive,
}

impl CyclePolicy {
    /// Parses a policy string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "transitive" | "deep" => Self::Transitive,
            _ => Self::DirectOnly,
        }
    }
}

/// Main configuration for a chronograph registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Path to the data directory.
    pub data_dir: PathBuf,
    /// Database filename inside the data directory.
    pub db_filename: String,
    /// Containment-cycle prevention policy.
    pub cycle_policy: CyclePolicy,
    /// Whether mutating operations require a permission check.
    ///
    /// Disabled by default for single-operator use; a deployment with shared
    /// write access turns this on and manages users and groups.
    pub enforce_permissions: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".chronograph"),
            db_filename: "registry.db".to_string(),
            cycle_policy: CyclePolicy::default(),
            enforce_permissions: false,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Database filename.
    pub db_filename: Option<String>,
    /// Cycle policy: "direct" or "transitive".
    pub cycle_policy: Option<String>,
    /// Permission enforcement.
    pub enforce_permissions: Option<bool>,
}

impl RegistryConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the full path to the database file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_filename)
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: e.to_string(),
            })?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir, then `~/.config/chronograph/`, and
    /// falls back to defaults if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs
            .config_dir()
            .join("chronograph")
            .join("config.toml");
        if platform_config.exists() {
            if let Ok(config) = Self::load_from_file(&platform_config) {
                return config;
            }
        }

        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("chronograph")
            .join("config.toml");
        if xdg_config.exists() {
            if let Ok(config) = Self::load_from_file(&xdg_config) {
                return config;
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `RegistryConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(db_filename) = file.db_filename {
            config.db_filename = db_filename;
        }
        if let Some(policy) = file.cycle_policy {
            config.cycle_policy = CyclePolicy::parse(&policy);
        }
        if let Some(enforce) = file.enforce_permissions {
            config.enforce_permissions = enforce;
        }

        config
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets the cycle policy.
    #[must_use]
    pub const fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }

    /// Enables or disables permission enforcement.
    #[must_use]
    pub const fn with_permissions(mut self, enforce: bool) -> Self {
        self.enforce_permissions = enforce;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.db_filename, "registry.db");
        assert_eq!(config.cycle_policy, CyclePolicy::DirectOnly);
        assert!(!config.enforce_permissions);
        assert!(config.db_path().ends_with("registry.db"));
    }

    #[test]
    fn test_parse_config_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            data_dir = "/var/lib/chronograph"
            cycle_policy = "transitive"
            enforce_permissions = true
            "#,
        )
        .unwrap();
        let config = RegistryConfig::from_config_file(file);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/chronograph"));
        assert_eq!(config.cycle_policy, CyclePolicy::Transitive);
        assert!(config.enforce_permissions);
    }

    #[test]
    fn test_cycle_policy_parse() {
        assert_eq!(CyclePolicy::parse("transitive"), CyclePolicy::Transitive);
        assert_eq!(CyclePolicy::parse("direct"), CyclePolicy::DirectOnly);
        assert_eq!(CyclePolicy::parse("anything"), CyclePolicy::DirectOnly);
    }
}
