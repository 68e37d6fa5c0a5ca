//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{DeployConfig, StackConfig};

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./cloud-pocket.yaml",
    "./cloud-pocket.yml",
    "./.cloud-pocket.yaml",
    "~/.config/cloud-pocket/config.yaml",
];

/// Largest `MinimumCompressionSize` API Gateway accepts (10 MiB)
const MAX_COMPRESSION_SIZE: u32 = 10_485_760;

/// Full configuration file structure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Stack declaration settings
    #[serde(default)]
    pub stack: StackConfig,

    /// Provisioning settings
    #[serde(default)]
    pub deploy: DeployConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            stack: StackConfig::default(),
            deploy: DeployConfig::default(),
        }
    }
}

impl ConfigFile {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        match Self::find() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        let stack = &self.stack;
        if !is_valid_stack_name(&stack.stack_name) {
            anyhow::bail!(
                "Invalid stack name '{}': use letters, digits and hyphens, starting with a letter",
                stack.stack_name
            );
        }
        if stack.api_name.trim().is_empty() {
            anyhow::bail!("API name must not be empty");
        }
        if !is_valid_bucket_name(&stack.backend_bucket) {
            anyhow::bail!("Invalid S3 bucket name: '{}'", stack.backend_bucket);
        }
        if stack.stage_name.is_empty()
            || !stack
                .stage_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            anyhow::bail!("Invalid stage name: '{}'", stack.stage_name);
        }
        if stack.minimum_compression_size > MAX_COMPRESSION_SIZE {
            anyhow::bail!(
                "stack.minimum_compression_size must be at most {MAX_COMPRESSION_SIZE} bytes, got {}",
                stack.minimum_compression_size
            );
        }
        if self.deploy.aws_cli.trim().is_empty() {
            anyhow::bail!("deploy.aws_cli must not be empty");
        }
        if self.deploy.poll_interval_secs == 0 {
            anyhow::bail!("deploy.poll_interval_secs must be greater than zero");
        }

        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        let mut config = Self::default();
        config.stack.region = Some("us-east-1".to_string());
        config.deploy.profile = Some("default".to_string());
        config
    }

    /// Set a value by dotted key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let stack = &mut self.stack;
        match key {
            "stack.stack_name" => stack.stack_name = value.to_string(),
            "stack.api_name" => stack.api_name = value.to_string(),
            "stack.description" => stack.description = value.to_string(),
            "stack.backend_bucket" => stack.backend_bucket = value.to_string(),
            "stack.stage_name" => stack.stage_name = value.to_string(),
            "stack.region" => stack.region = Some(value.to_string()),
            "stack.minimum_compression_size" => {
                stack.minimum_compression_size = value.parse()?
            }
            "stack.bucket_from_path" => stack.bucket_from_path = value.parse()?,
            "stack.validate_request_parameters" => {
                stack.validate_request_parameters = value.parse()?
            }
            "stack.map_backend_errors" => stack.map_backend_errors = value.parse()?,
            "deploy.profile" => self.deploy.profile = Some(value.to_string()),
            "deploy.timeout_secs" => self.deploy.timeout_secs = value.parse()?,
            "deploy.poll_interval_secs" => self.deploy.poll_interval_secs = value.parse()?,
            "deploy.template_dir" => self.deploy.template_dir = value.to_string(),
            "deploy.aws_cli" => self.deploy.aws_cli = value.to_string(),
            _ => anyhow::bail!("Unknown configuration key: {key}"),
        }
        Ok(())
    }

    /// Read a value by dotted key
    pub fn get(&self, key: &str) -> Result<String> {
        let stack = &self.stack;
        let value = match key {
            "stack.stack_name" => stack.stack_name.clone(),
            "stack.api_name" => stack.api_name.clone(),
            "stack.description" => stack.description.clone(),
            "stack.backend_bucket" => stack.backend_bucket.clone(),
            "stack.stage_name" => stack.stage_name.clone(),
            "stack.region" => stack.region.clone().unwrap_or_default(),
            "stack.minimum_compression_size" => stack.minimum_compression_size.to_string(),
            "stack.bucket_from_path" => stack.bucket_from_path.to_string(),
            "stack.validate_request_parameters" => stack.validate_request_parameters.to_string(),
            "stack.map_backend_errors" => stack.map_backend_errors.to_string(),
            "deploy.profile" => self.deploy.profile.clone().unwrap_or_default(),
            "deploy.timeout_secs" => self.deploy.timeout_secs.to_string(),
            "deploy.poll_interval_secs" => self.deploy.poll_interval_secs.to_string(),
            "deploy.template_dir" => self.deploy.template_dir.clone(),
            "deploy.aws_cli" => self.deploy.aws_cli.clone(),
            _ => anyhow::bail!("Unknown configuration key: {key}"),
        };
        Ok(value)
    }

    /// JSON schema of the configuration file
    pub fn schema() -> Result<String> {
        let schema = schemars::schema_for!(ConfigFile);
        serde_json::to_string_pretty(&schema).context("Failed to serialize config schema")
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

/// CloudFormation stack names: `[a-zA-Z][-a-zA-Z0-9]*`, at most 128 characters
fn is_valid_stack_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && name.len() <= 128
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// S3 bucket naming rules (general purpose buckets)
fn is_valid_bucket_name(name: &str) -> bool {
    let len_ok = (3..=63).contains(&name.len());
    let chars_ok = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let edges_ok = name
        .chars()
        .next()
        .zip(name.chars().last())
        .map(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric())
        .unwrap_or(false);

    len_ok && chars_ok && edges_ok && !name.contains("..")
}
