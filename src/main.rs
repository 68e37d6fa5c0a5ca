//! Cloud Pocket Infra - API Gateway to S3 read-only proxy stack
//!
//! Declares a REST API whose two IAM-authorized GET routes proxy S3
//! list-objects and get-object calls through a shared execution role.
//!
//! ## Features
//!
//! - CloudFormation template synthesis (JSON or YAML)
//! - Static shape validation of the declared stack
//! - Local request resolution: routing, signature presence, parameter
//!   validation and integration mapping
//! - Deployment through the AWS CLI
//!
//! ## Usage
//!
//! ```bash
//! # Print the template
//! cloud-pocket-infra synth --format yaml
//!
//! # Check the declaration
//! cloud-pocket-infra validate --strict
//!
//! # See what a request would do
//! cloud-pocket-infra resolve '/anybucket/tenant123/reports/2024.csv?prefix=reports/' \
//!     -H 'Content-Type: application/octet-stream' \
//!     -H 'Authorization: AWS4-HMAC-SHA256 Credential=...'
//!
//! # Deploy
//! cloud-pocket-infra deploy deploy --wait
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::Path;
use tracing::{debug, info};

mod cli;
mod config;
mod deploy;
mod models;
mod output;
mod proxy;
mod stack;
mod utils;
mod validate;

use cli::Args;
use config::{ConfigFile, EnvConfig};
use models::HttpMethod;
use output::{OutputFormat, ReportFormatter};
use proxy::{parse_header_arg, BackendResponse, ProxyRequest, RequestResolver};
use stack::template::METHOD_TYPE;
use stack::{ProxyStack, TemplateSynthesizer};
use utils::{init_logger, LogLevel};
use validate::StackValidator;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    init_logger(LogLevel::resolve(args.verbose, env.log_level.as_deref()));

    let config_path = args.config.clone().or_else(|| env.config_file.clone());

    match args.command {
        cli::Command::Synth(synth_args) => {
            let config = load_config(config_path.as_deref(), &env)?;
            synth(synth_args, &config, &env)?;
        }
        cli::Command::Validate(validate_args) => {
            let config = load_config(config_path.as_deref(), &env)?;
            run_validate(validate_args, &config, &env)?;
        }
        cli::Command::Routes(routes_args) => {
            let config = load_config(config_path.as_deref(), &env)?;
            list_routes(routes_args, &config, &env)?;
        }
        cli::Command::Resolve(resolve_args) => {
            let config = load_config(config_path.as_deref(), &env)?;
            resolve(resolve_args, &config, &env)?;
        }
        cli::Command::Deploy(deploy_args) => {
            let config = load_config(config_path.as_deref(), &env)?;
            manage_deploy(deploy_args, &config).await?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, config_path.as_deref(), &env)?;
        }
    }

    Ok(())
}

/// Explicit file, else the standard locations, then environment overrides
fn load_config(path: Option<&str>, env: &EnvConfig) -> Result<ConfigFile> {
    let mut config = match path {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };

    if env.has_any() {
        debug!("Applying environment overrides");
        env.apply_to(&mut config);
        config
            .validate()
            .context("Configuration invalid after environment overrides")?;
    }

    Ok(config)
}

fn formatter(format: Option<&str>, env: &EnvConfig, default: &str) -> Result<ReportFormatter> {
    let name = format.map(str::to_string).unwrap_or_else(|| env.format_or(default));
    let format =
        OutputFormat::from_str(&name).with_context(|| format!("Unknown output format: {name}"))?;

    let formatter = ReportFormatter::new(format);
    if env.no_color || !std::io::stdout().is_terminal() {
        return Ok(formatter.no_color());
    }
    Ok(formatter)
}

fn synth(args: cli::SynthArgs, config: &ConfigFile, env: &EnvConfig) -> Result<()> {
    let stack = ProxyStack::from_config(&config.stack)?;
    let template = TemplateSynthesizer::synthesize(&stack);
    let output = formatter(args.format.as_deref(), env, "json-pretty")?.format_template(&template)?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, output)
                .with_context(|| format!("Failed to write template: {path}"))?;
            info!(
                "Wrote {} resources ({} methods) for {} to {}",
                template.resources.len(),
                template.resource_count(METHOD_TYPE),
                stack.name,
                path
            );
            println!("✓ Template written: {path}");
        }
        None => println!("{output}"),
    }

    Ok(())
}

fn run_validate(args: cli::ValidateArgs, config: &ConfigFile, env: &EnvConfig) -> Result<()> {
    let stack = ProxyStack::from_config(&config.stack)?;
    let report = StackValidator::validate(&stack).strict(args.strict);

    println!(
        "{}",
        formatter(args.format.as_deref(), env, "table")?.format_report(&report)?
    );

    if !report.passed() {
        anyhow::bail!("Validation failed for stack {}", stack.name);
    }
    Ok(())
}

fn list_routes(args: cli::RoutesArgs, config: &ConfigFile, env: &EnvConfig) -> Result<()> {
    let stack = ProxyStack::from_config(&config.stack)?;
    println!(
        "{}",
        formatter(args.format.as_deref(), env, "table")?.format_routes(&stack, args.detailed)?
    );
    Ok(())
}

fn resolve(args: cli::ResolveArgs, config: &ConfigFile, env: &EnvConfig) -> Result<()> {
    let method = HttpMethod::from_str(&args.method)
        .ok_or_else(|| anyhow::anyhow!("Unknown HTTP method: {}", args.method))?;

    let mut request = ProxyRequest::parse(method, &args.target)?;
    for header in &args.headers {
        let (name, value) = parse_header_arg(header)?;
        request = request.header(name, value);
    }

    let stack = ProxyStack::from_config(&config.stack)?;
    let resolver = RequestResolver::new(stack, config.stack.region_or_default())?;
    let formatter = formatter(args.format.as_deref(), env, "table")?;

    let backend = match args.status {
        Some(status) => {
            let mut backend = BackendResponse::new(status);
            for header in &args.backend_headers {
                let (name, value) = parse_header_arg(header)?;
                backend = backend.header(name, value);
            }
            Some(backend)
        }
        None => None,
    };

    match resolver.resolve(&request) {
        Ok(resolution) => {
            let response = backend
                .as_ref()
                .map(|backend| resolver.map_response(&resolution, backend));
            println!("{}", formatter.format_resolution(&resolution, response.as_ref())?);
            Ok(())
        }
        Err(e) => {
            println!("{}", formatter.format_rejection(&e));
            Err(e).context("Request rejected")
        }
    }
}

async fn manage_deploy(args: cli::DeployArgs, config: &ConfigFile) -> Result<()> {
    use deploy::{ProvisionerConfig, StackProvisioner};

    let provisioner = StackProvisioner::new(ProvisionerConfig::from_config(config));

    match args.action {
        cli::DeployAction::Deploy { wait, no_validate } => {
            let stack = ProxyStack::from_config(&config.stack)?;

            if !no_validate {
                let report = StackValidator::validate(&stack);
                if !report.passed() {
                    println!("{}", report.format_table());
                    anyhow::bail!("Refusing to deploy an invalid stack");
                }
            }

            let template = TemplateSynthesizer::synthesize(&stack);
            println!("Deploying stack {}...", stack.name);

            let result = provisioner.deploy(&template).await?;
            let status = if wait {
                provisioner.wait_ready().await?
            } else {
                result.status.clone()
            };
            status.ensure_ready(&result.stack_name)?;

            println!("\n✓ Deployment complete!");
            println!("  Stack: {}", result.stack_name);
            println!("  Template: {}", result.template_path.display());
            println!("  Status: {}", status.as_str());
            if let Some(endpoint) = &result.endpoint {
                println!("  Endpoint: {endpoint}");
            }
            println!("  Elapsed: {:.1}s", result.elapsed_secs);
        }

        cli::DeployAction::Destroy { yes } => {
            if !yes {
                anyhow::bail!(
                    "Refusing to delete stack {} without --yes",
                    provisioner.config().stack_name
                );
            }

            println!("Destroying stack {}...", provisioner.config().stack_name);
            provisioner.destroy().await?;
            println!("✓ Stack deleted");
        }

        cli::DeployAction::Status => {
            let status = provisioner.status().await?;
            let icon = if status.is_ready() { "✓" } else { "○" };
            println!(
                "{icon} {}: {}",
                provisioner.config().stack_name,
                status.as_str()
            );
        }

        cli::DeployAction::Outputs => {
            let outputs = provisioner.outputs().await?;
            if outputs.is_empty() {
                println!("Stack has no outputs");
            }
            for (key, value) in outputs {
                println!("{key:30} {value}");
            }
        }
    }

    Ok(())
}

fn manage_config(args: cli::ConfigArgs, config_path: Option<&str>, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            let config = ConfigFile::example();
            config.save(path)?;
            println!("✓ Configuration file created: {output}");
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { env: show_env, format } => {
            if show_env {
                env.print_summary();
            } else {
                let config = load_config(config_path, env)?;
                let output = if format == "json" {
                    serde_json::to_string_pretty(&config)?
                } else {
                    serde_yaml::to_string(&config)?
                };
                println!("{output}");
            }
        }

        cli::ConfigAction::Validate { file } => {
            let path = file
                .or_else(|| config_path.map(str::to_string))
                .or_else(|| ConfigFile::find().map(|p| p.to_string_lossy().to_string()))
                .unwrap_or_else(|| "./cloud-pocket.yaml".to_string());

            match ConfigFile::load(&path) {
                Ok(_) => {
                    println!("✓ Configuration file is valid: {path}");
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {path}");
                    println!("  Error: {e:#}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::Schema => {
            println!("{}", ConfigFile::schema()?);
        }

        cli::ConfigAction::Set { key, value, file } => {
            let path = file
                .or_else(|| config_path.map(str::to_string))
                .unwrap_or_else(|| "./cloud-pocket.yaml".to_string());
            let mut config = if Path::new(&path).exists() {
                ConfigFile::load(&path)?
            } else {
                ConfigFile::default()
            };

            config.set(&key, &value)?;
            config.validate()?;
            config.save(&path)?;
            println!("✓ Set {key} = {value} in {path}");
        }

        cli::ConfigAction::Get { key, file } => {
            let config = match file {
                Some(path) => ConfigFile::load(&path)?,
                None => load_config(config_path, env)?,
            };
            println!("{}", config.get(&key)?);
        }

        cli::ConfigAction::Env => {
            config::env::print_env_help();
        }
    }

    Ok(())
}
