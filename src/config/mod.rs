//! Configuration module
//!
//! Handles loading and managing configuration.

pub mod env;
mod file;

pub use env::EnvConfig;
pub use file::ConfigFile;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Declaration settings for the proxy stack
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StackConfig {
    /// CloudFormation stack name
    pub stack_name: String,

    /// REST API name
    pub api_name: String,

    /// REST API description
    pub description: String,

    /// Bucket every integration reads from
    pub backend_bucket: String,

    /// Deployment stage name
    pub stage_name: String,

    /// Region used when rendering integration URIs outside CloudFormation
    pub region: Option<String>,

    /// Media types passed through as raw bytes
    pub binary_media_types: Vec<String>,

    /// Minimum response size eligible for compression
    pub minimum_compression_size: u32,

    /// Serve get-object from the `{bucket}` path segment instead of `backend_bucket`
    pub bucket_from_path: bool,

    /// Reject requests missing required parameters at the gateway
    pub validate_request_parameters: bool,

    /// Map S3 403/404/5xx onto matching method responses
    pub map_backend_errors: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: "CloudPocketInfraStack".to_string(),
            api_name: "data-bucket-rest-api".to_string(),
            description: "REST API for serving raw data files".to_string(),
            backend_bucket: "test-mediahstf".to_string(),
            stage_name: "prod".to_string(),
            region: None,
            binary_media_types: vec!["*/*".to_string()],
            minimum_compression_size: 0,
            bucket_from_path: false,
            validate_request_parameters: true,
            map_backend_errors: true,
        }
    }
}

impl StackConfig {
    /// Region for URI rendering, falling back to `us-east-1`
    pub fn region_or_default(&self) -> &str {
        self.region.as_deref().unwrap_or("us-east-1")
    }
}

/// Provisioning settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DeployConfig {
    /// AWS CLI profile
    pub profile: Option<String>,

    /// Wait timeout in seconds
    pub timeout_secs: u64,

    /// Status polling interval in seconds
    pub poll_interval_secs: u64,

    /// Directory the synthesized template is written to
    pub template_dir: String,

    /// AWS CLI executable
    pub aws_cli: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            profile: None,
            timeout_secs: 600,
            poll_interval_secs: 10,
            template_dir: "cdk.out".to_string(),
            aws_cli: "aws".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stack_config() {
        let config = StackConfig::default();
        assert_eq!(config.api_name, "data-bucket-rest-api");
        assert_eq!(config.backend_bucket, "test-mediahstf");
        assert_eq!(config.binary_media_types, vec!["*/*"]);
        assert_eq!(config.minimum_compression_size, 0);
        assert!(!config.bucket_from_path);
        assert_eq!(config.region_or_default(), "us-east-1");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: StackConfig = serde_yaml::from_str("backend_bucket: reports\n").unwrap();
        assert_eq!(config.backend_bucket, "reports");
        assert_eq!(config.stage_name, "prod");
        assert!(config.validate_request_parameters);
    }

    #[test]
    fn test_deploy_config() {
        let config = DeployConfig::default();
        assert_eq!(config.timeout_secs, 600);
        assert_eq!(config.template_dir, "cdk.out");
        assert_eq!(config.aws_cli, "aws");
    }
}
