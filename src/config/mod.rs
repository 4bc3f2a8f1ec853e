//! Configuration management for the toolkit
//!
//! Settings are loaded from TOML files. Every section is optional and falls
//! back to defaults, so an empty file is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ToolkitError;

/// Main configuration struct containing all toolkit settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ToolkitConfig {
    /// Cursor theme selection
    #[serde(default)]
    pub cursor: CursorConfig,

    /// Shared-memory buffer allocation
    #[serde(default)]
    pub shm: ShmConfig,

    /// Log filter used by [`crate::logging::init_logging`]
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cursor theme configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CursorConfig {
    /// Theme name, `None` picks the compositor default theme
    #[serde(default)]
    pub theme: Option<String>,

    /// Nominal cursor size in pixels
    #[serde(default = "CursorConfig::default_size")]
    pub size: u32,
}

/// Shared-memory pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShmConfig {
    /// Directory for backing files; `XDG_RUNTIME_DIR` when unset
    #[serde(default)]
    pub runtime_dir: Option<PathBuf>,

    /// File name prefix for the (immediately unlinked) backing files
    #[serde(default = "ShmConfig::default_file_prefix")]
    pub file_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter ("trace", "debug", "info", "warn", "error", "off")
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl CursorConfig {
    fn default_size() -> u32 {
        32
    }
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            theme: None,
            size: Self::default_size(),
        }
    }
}

impl ShmConfig {
    fn default_file_prefix() -> String {
        "axiom-toolkit-shared-".to_string()
    }

    /// Resolve the directory shm backing files are created in
    pub fn runtime_dir(&self) -> std::result::Result<PathBuf, ToolkitError> {
        if let Some(dir) = &self.runtime_dir {
            return Ok(dir.clone());
        }

        match std::env::var_os("XDG_RUNTIME_DIR") {
            Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
            _ => Err(ToolkitError::config("XDG_RUNTIME_DIR not set")),
        }
    }
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            runtime_dir: None,
            file_prefix: Self::default_file_prefix(),
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

impl ToolkitConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            let rest = path.strip_prefix("~").unwrap_or(path);
            Path::new(&home).join(rest)
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: ToolkitConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cursor.size == 0 || self.cursor.size > 256 {
            anyhow::bail!("Invalid cursor size {}: must be between 1 and 256", self.cursor.size);
        }

        if let Some(theme) = &self.cursor.theme {
            if theme.trim().is_empty() {
                anyhow::bail!("Invalid cursor theme: name must not be empty");
            }
        }

        if self.shm.file_prefix.is_empty() || self.shm.file_prefix.contains('/') {
            anyhow::bail!("Invalid shm file_prefix {:?}: must be a non-empty file name", self.shm.file_prefix);
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests;
