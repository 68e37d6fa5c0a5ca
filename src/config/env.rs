//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::ConfigFile;

/// Environment variable prefix
const ENV_PREFIX: &str = "CLOUD_POCKET";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvConfig {
    /// Stack name from CLOUD_POCKET_STACK_NAME
    pub stack_name: Option<String>,
    /// Backend bucket from CLOUD_POCKET_BUCKET
    pub bucket: Option<String>,
    /// Region from CLOUD_POCKET_REGION, then AWS_REGION
    pub region: Option<String>,
    /// AWS CLI profile from CLOUD_POCKET_PROFILE, then AWS_PROFILE
    pub profile: Option<String>,
    /// Stage name from CLOUD_POCKET_STAGE
    pub stage: Option<String>,
    /// Config file from CLOUD_POCKET_CONFIG
    pub config_file: Option<String>,
    /// Output format from CLOUD_POCKET_FORMAT
    pub format: Option<String>,
    /// Log level from CLOUD_POCKET_LOG
    pub log_level: Option<String>,
    /// Plain output when NO_COLOR is set
    pub no_color: bool,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefixed = |name: &str| lookup(&format!("{ENV_PREFIX}_{name}")).filter(|v| !v.is_empty());

        Self {
            stack_name: prefixed("STACK_NAME"),
            bucket: prefixed("BUCKET"),
            region: prefixed("REGION").or_else(|| lookup("AWS_REGION")),
            profile: prefixed("PROFILE").or_else(|| lookup("AWS_PROFILE")),
            stage: prefixed("STAGE"),
            config_file: prefixed("CONFIG"),
            format: prefixed("FORMAT"),
            log_level: prefixed("LOG"),
            no_color: lookup("NO_COLOR").is_some(),
        }
    }

    /// Check if any override is set
    pub fn has_any(&self) -> bool {
        self.stack_name.is_some()
            || self.bucket.is_some()
            || self.region.is_some()
            || self.profile.is_some()
            || self.stage.is_some()
            || self.config_file.is_some()
            || self.format.is_some()
            || self.log_level.is_some()
    }

    /// Override file configuration with environment values
    pub fn apply_to(&self, config: &mut ConfigFile) {
        if let Some(name) = &self.stack_name {
            config.stack.stack_name = name.clone();
        }
        if let Some(bucket) = &self.bucket {
            config.stack.backend_bucket = bucket.clone();
        }
        if let Some(region) = &self.region {
            config.stack.region = Some(region.clone());
        }
        if let Some(stage) = &self.stage {
            config.stack.stage_name = stage.clone();
        }
        if let Some(profile) = &self.profile {
            config.deploy.profile = Some(profile.clone());
        }
    }

    /// Get format with fallback
    pub fn format_or(&self, default: &str) -> String {
        self.format.clone().unwrap_or_else(|| default.to_string())
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_STACK_NAME: {:?}", ENV_PREFIX, self.stack_name);
        println!("  {}_BUCKET:     {:?}", ENV_PREFIX, self.bucket);
        println!("  {}_REGION:     {:?}", ENV_PREFIX, self.region);
        println!("  {}_PROFILE:    {:?}", ENV_PREFIX, self.profile);
        println!("  {}_STAGE:      {:?}", ENV_PREFIX, self.stage);
        println!("  {}_CONFIG:     {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_FORMAT:     {:?}", ENV_PREFIX, self.format);
        println!("  {}_LOG:        {:?}", ENV_PREFIX, self.log_level);
        println!("  NO_COLOR:           {}", self.no_color);
    }
}

/// Print all CLOUD_POCKET environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_STACK_NAME  CloudFormation stack name");
    println!("  {ENV_PREFIX}_BUCKET      Backend S3 bucket");
    println!("  {ENV_PREFIX}_REGION      AWS region (falls back to AWS_REGION)");
    println!("  {ENV_PREFIX}_PROFILE     AWS CLI profile (falls back to AWS_PROFILE)");
    println!("  {ENV_PREFIX}_STAGE       Deployment stage name");
    println!("  {ENV_PREFIX}_CONFIG      Path to configuration file");
    println!("  {ENV_PREFIX}_FORMAT      Output format (table, json, json-pretty, yaml)");
    println!("  {ENV_PREFIX}_LOG         Log level (trace, debug, info, warn, error)");
    println!("  NO_COLOR                 Disable colored output");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_BUCKET=my-data-bucket");
    println!("  cloud-pocket-infra synth --format yaml");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.bucket.is_none());
        assert!(!config.has_any());
        assert_eq!(config.format_or("table"), "table");
    }

    #[test]
    fn test_prefixed_variables() {
        let config = EnvConfig::from_lookup(lookup_from(&[
            ("CLOUD_POCKET_BUCKET", "reports"),
            ("CLOUD_POCKET_STAGE", "dev"),
            ("CLOUD_POCKET_FORMAT", "yaml"),
        ]));

        assert_eq!(config.bucket, Some("reports".to_string()));
        assert_eq!(config.stage, Some("dev".to_string()));
        assert_eq!(config.format_or("table"), "yaml");
        assert!(config.has_any());
    }

    #[test]
    fn test_aws_fallbacks() {
        let config = EnvConfig::from_lookup(lookup_from(&[
            ("AWS_REGION", "eu-central-1"),
            ("AWS_PROFILE", "ops"),
        ]));
        assert_eq!(config.region, Some("eu-central-1".to_string()));
        assert_eq!(config.profile, Some("ops".to_string()));

        let config = EnvConfig::from_lookup(lookup_from(&[
            ("AWS_REGION", "eu-central-1"),
            ("CLOUD_POCKET_REGION", "ap-south-1"),
        ]));
        assert_eq!(config.region, Some("ap-south-1".to_string()));
    }

    #[test]
    fn test_no_color() {
        assert!(!EnvConfig::from_lookup(lookup_from(&[])).no_color);

        let config = EnvConfig::from_lookup(lookup_from(&[("NO_COLOR", "1")]));
        assert!(config.no_color);
        assert!(!config.has_any());
    }

    #[test]
    fn test_empty_values_ignored() {
        let config = EnvConfig::from_lookup(lookup_from(&[("CLOUD_POCKET_BUCKET", "")]));
        assert!(config.bucket.is_none());
    }

    #[test]
    fn test_apply_to() {
        let env = EnvConfig {
            bucket: Some("override-bucket".to_string()),
            region: Some("us-west-2".to_string()),
            profile: Some("ci".to_string()),
            ..Default::default()
        };

        let mut config = ConfigFile::default();
        env.apply_to(&mut config);

        assert_eq!(config.stack.backend_bucket, "override-bucket");
        assert_eq!(config.stack.region.as_deref(), Some("us-west-2"));
        assert_eq!(config.deploy.profile.as_deref(), Some("ci"));
        assert_eq!(config.stack.stage_name, "prod");
    }
}
