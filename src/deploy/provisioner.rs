//! Stack provisioning through the AWS CLI
//!
//! Writes the synthesized template and drives `aws cloudformation` to
//! deploy, destroy and inspect the stack.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::stack::Template;
use crate::utils::Timer;

/// Provisioner configuration
#[derive(Clone, Debug)]
pub struct ProvisionerConfig {
    /// CloudFormation stack name
    pub stack_name: String,

    /// AWS region passed as `--region`
    pub region: Option<String>,

    /// AWS CLI profile passed as `--profile`
    pub profile: Option<String>,

    /// Directory the template is written to
    pub template_dir: PathBuf,

    /// Wait timeout in seconds
    pub timeout_secs: u64,

    /// Status polling interval in seconds
    pub poll_interval_secs: u64,

    /// AWS CLI executable
    pub aws_cli: String,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            stack_name: "CloudPocketInfraStack".to_string(),
            region: None,
            profile: None,
            template_dir: PathBuf::from("cdk.out"),
            timeout_secs: 600,
            poll_interval_secs: 10,
            aws_cli: "aws".to_string(),
        }
    }
}

impl ProvisionerConfig {
    pub fn from_config(config: &ConfigFile) -> Self {
        let mut provisioner = Self {
            stack_name: config.stack.stack_name.clone(),
            template_dir: PathBuf::from(&config.deploy.template_dir),
            poll_interval_secs: config.deploy.poll_interval_secs,
            ..Self::default()
        }
        .timeout(config.deploy.timeout_secs)
        .aws_cli(&config.deploy.aws_cli);

        if let Some(region) = &config.stack.region {
            provisioner = provisioner.region(region);
        }
        if let Some(profile) = &config.deploy.profile {
            provisioner = provisioner.profile(profile);
        }
        provisioner
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn aws_cli(mut self, executable: impl Into<String>) -> Self {
        self.aws_cli = executable.into();
        self
    }

    /// Template file path inside the template directory
    pub fn template_path(&self) -> PathBuf {
        self.template_dir
            .join(format!("{}.template.json", self.stack_name))
    }
}

/// CloudFormation stack provisioner
pub struct StackProvisioner {
    config: ProvisionerConfig,
}

impl StackProvisioner {
    pub fn new(config: ProvisionerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Write the template as pretty JSON; returns its path
    pub fn write_template(&self, template: &Template) -> Result<PathBuf> {
        let path = self.config.template_path();
        std::fs::create_dir_all(&self.config.template_dir).with_context(|| {
            format!(
                "Failed to create directory: {}",
                self.config.template_dir.display()
            )
        })?;
        std::fs::write(&path, template.to_json_pretty()?)
            .with_context(|| format!("Failed to write template: {}", path.display()))?;

        debug!("Template written to {}", path.display());
        Ok(path)
    }

    /// Arguments for `aws cloudformation deploy`
    pub fn deploy_args(&self, template_path: &Path) -> Vec<String> {
        let mut args = vec![
            "cloudformation".to_string(),
            "deploy".to_string(),
            "--template-file".to_string(),
            template_path.display().to_string(),
            "--stack-name".to_string(),
            self.config.stack_name.clone(),
            "--capabilities".to_string(),
            "CAPABILITY_IAM".to_string(),
            "--no-fail-on-empty-changeset".to_string(),
        ];
        args.extend(self.global_args());
        args
    }

    fn stack_args(&self, subcommand: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = subcommand.iter().map(|s| s.to_string()).collect();
        args.push("--stack-name".to_string());
        args.push(self.config.stack_name.clone());
        args.extend(self.global_args());
        args
    }

    fn global_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(region) = &self.config.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        if let Some(profile) = &self.config.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        args
    }

    async fn aws(&self, args: &[String]) -> Result<std::process::Output> {
        debug!("Running {} {}", self.config.aws_cli, args.join(" "));
        Command::new(&self.config.aws_cli)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.config.aws_cli))
    }

    /// Deploy (create or update) the stack
    pub async fn deploy(&self, template: &Template) -> Result<DeployResult> {
        let timer = Timer::start("deploy");
        let template_path = self.write_template(template)?;

        info!("Deploying stack {}...", self.config.stack_name);

        let output = self.aws(&self.deploy_args(&template_path)).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Failed to deploy stack {}: {}",
                self.config.stack_name,
                stderr.trim()
            );
        }

        let description = self.describe().await?;
        let endpoint = description.as_ref().and_then(StackDescription::endpoint);
        let status = description
            .map(|d| StackStatus::parse(&d.stack_status))
            .unwrap_or(StackStatus::NotFound);

        info!("Stack {} is {}", self.config.stack_name, status.as_str());

        Ok(DeployResult {
            stack_name: self.config.stack_name.clone(),
            template_path,
            status,
            endpoint,
            elapsed_secs: timer.stop().as_secs_f64(),
        })
    }

    /// Delete the stack and wait for the deletion to finish
    pub async fn destroy(&self) -> Result<()> {
        info!("Destroying stack {}...", self.config.stack_name);

        let output = self
            .aws(&self.stack_args(&["cloudformation", "delete-stack"]))
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to delete stack: {}", stderr.trim());
        }

        let output = self
            .aws(&self.stack_args(&["cloudformation", "wait", "stack-delete-complete"]))
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Stack deletion did not complete: {}", stderr.trim());
        }

        info!("Stack {} deleted", self.config.stack_name);
        Ok(())
    }

    /// Current stack status
    pub async fn status(&self) -> Result<StackStatus> {
        Ok(self
            .describe()
            .await?
            .map(|d| StackStatus::parse(&d.stack_status))
            .unwrap_or(StackStatus::NotFound))
    }

    /// Stack outputs by key
    pub async fn outputs(&self) -> Result<BTreeMap<String, String>> {
        let description = self
            .describe()
            .await?
            .with_context(|| format!("Stack {} does not exist", self.config.stack_name))?;
        Ok(description.output_map())
    }

    /// Poll until the stack leaves its in-progress state; errors once the
    /// timeout expires
    pub async fn wait_ready(&self) -> Result<StackStatus> {
        let start = std::time::Instant::now();
        let timeout = Duration::from_secs(self.config.timeout_secs);

        info!("Waiting for stack {} to settle...", self.config.stack_name);

        loop {
            let status = self.status().await?;
            if status.is_terminal() {
                return Ok(status);
            }

            if start.elapsed() >= timeout {
                warn!("Timeout waiting for stack {}", self.config.stack_name);
                anyhow::bail!(
                    "Timed out after {}s waiting for stack {} (last status {})",
                    self.config.timeout_secs,
                    self.config.stack_name,
                    status.as_str()
                );
            }

            debug!("Stack status {}, retrying...", status.as_str());
            sleep(Duration::from_secs(self.config.poll_interval_secs)).await;
        }
    }

    /// `describe-stacks`, or `None` when the stack does not exist
    async fn describe(&self) -> Result<Option<StackDescription>> {
        let output = self
            .aws(&self.stack_args(&["cloudformation", "describe-stacks", "--output", "json"]))
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("does not exist") {
                return Ok(None);
            }
            anyhow::bail!("Failed to describe stack: {}", stderr.trim());
        }

        let description = parse_describe_stacks(&String::from_utf8_lossy(&output.stdout))?;
        if let Some(d) = &description {
            debug!("Stack {} reports {}", d.stack_name, d.stack_status);
        }
        Ok(description)
    }
}

/// `describe-stacks` response
#[derive(Debug, Deserialize)]
struct DescribeStacksOutput {
    #[serde(rename = "Stacks", default)]
    stacks: Vec<StackDescription>,
}

/// One stack in a `describe-stacks` response
#[derive(Clone, Debug, Deserialize)]
pub struct StackDescription {
    #[serde(rename = "StackName")]
    pub stack_name: String,

    #[serde(rename = "StackStatus")]
    pub stack_status: String,

    #[serde(rename = "Outputs", default)]
    pub outputs: Vec<StackOutput>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StackOutput {
    #[serde(rename = "OutputKey")]
    pub key: String,

    #[serde(rename = "OutputValue")]
    pub value: String,
}

impl StackDescription {
    pub fn output_map(&self) -> BTreeMap<String, String> {
        self.outputs
            .iter()
            .map(|o| (o.key.clone(), o.value.clone()))
            .collect()
    }

    /// Invoke URL from the `*Endpoint` output
    pub fn endpoint(&self) -> Option<String> {
        self.outputs
            .iter()
            .find(|o| o.key.ends_with("Endpoint"))
            .map(|o| o.value.clone())
    }
}

pub fn parse_describe_stacks(json: &str) -> Result<Option<StackDescription>> {
    let output: DescribeStacksOutput =
        serde_json::from_str(json).context("Failed to parse describe-stacks output")?;
    Ok(output.stacks.into_iter().next())
}

/// Stack lifecycle state
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum StackStatus {
    NotFound,
    InProgress(String),
    Ready(String),
    RolledBack(String),
    Failed(String),
    Deleted,
}

impl StackStatus {
    /// Classify a CloudFormation status string
    pub fn parse(status: &str) -> Self {
        match status {
            "DELETE_COMPLETE" => StackStatus::Deleted,
            s if s.ends_with("_IN_PROGRESS") => StackStatus::InProgress(s.to_string()),
            s if s.contains("FAILED") => StackStatus::Failed(s.to_string()),
            s if s.contains("ROLLBACK_COMPLETE") => StackStatus::RolledBack(s.to_string()),
            s if s.ends_with("_COMPLETE") => StackStatus::Ready(s.to_string()),
            s => StackStatus::Failed(s.to_string()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, StackStatus::Ready(_))
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StackStatus::InProgress(_))
    }

    /// Error unless the stack settled in a usable state
    pub fn ensure_ready(&self, stack_name: &str) -> Result<()> {
        if !self.is_ready() {
            anyhow::bail!("Stack {} is {}, not ready", stack_name, self.as_str());
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        match self {
            StackStatus::NotFound => "NOT_FOUND",
            StackStatus::Deleted => "DELETE_COMPLETE",
            StackStatus::InProgress(s)
            | StackStatus::Ready(s)
            | StackStatus::RolledBack(s)
            | StackStatus::Failed(s) => s.as_str(),
        }
    }
}

/// Deployment result
#[derive(Clone, Debug, Serialize)]
pub struct DeployResult {
    pub stack_name: String,
    pub template_path: PathBuf,
    pub status: StackStatus,
    /// Invoke URL of the deployed stage
    pub endpoint: Option<String>,
    pub elapsed_secs: f64,
}
