//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// API Gateway to S3 read-only proxy stack
#[derive(Parser, Debug)]
#[command(name = "cloud-pocket-infra")]
#[command(author = "hephaex@gmail.com")]
#[command(version = "0.1.0")]
#[command(about = "Declare, check and deploy the API Gateway to S3 proxy stack")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Synthesize the CloudFormation template
    Synth(SynthArgs),

    /// Check the stack declaration
    Validate(ValidateArgs),

    /// List declared routes
    Routes(RoutesArgs),

    /// Resolve a request against the routes without deploying
    Resolve(ResolveArgs),

    /// Deploy and manage the stack
    Deploy(DeployArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for synth command
#[derive(Parser, Debug)]
pub struct SynthArgs {
    /// Output format (json, json-pretty, yaml)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Write the template to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Arguments for validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Fail on warnings too
    #[arg(long)]
    pub strict: bool,

    /// Output format (table, json, json-pretty, yaml)
    #[arg(short, long)]
    pub format: Option<String>,
}

/// Arguments for routes command
#[derive(Parser, Debug)]
pub struct RoutesArgs {
    /// Show parameters, mappings and responses
    #[arg(short, long)]
    pub detailed: bool,

    /// Output format (table, json, json-pretty, yaml)
    #[arg(short, long)]
    pub format: Option<String>,
}

/// Arguments for resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Request target, e.g. /bucket/tenant/key.csv?prefix=reports/
    pub target: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request header as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Backend status to map through the integration responses
    #[arg(short, long)]
    pub status: Option<u16>,

    /// Backend response header as 'Name: value' (repeatable, used with --status)
    #[arg(long = "backend-header")]
    pub backend_headers: Vec<String>,

    /// Output format (table, json, json-pretty, yaml)
    #[arg(short, long)]
    pub format: Option<String>,
}

/// Arguments for deploy command
#[derive(Parser, Debug)]
pub struct DeployArgs {
    #[command(subcommand)]
    pub action: DeployAction,
}

#[derive(Subcommand, Debug)]
pub enum DeployAction {
    /// Create or update the stack
    Deploy {
        /// Wait until the stack settles
        #[arg(short, long)]
        wait: bool,

        /// Skip shape validation before deploying
        #[arg(long)]
        no_validate: bool,
    },

    /// Delete the stack
    Destroy {
        /// Confirm deletion
        #[arg(short, long)]
        yes: bool,
    },

    /// Show stack status
    Status,

    /// Show stack outputs
    Outputs,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output file
        #[arg(short, long, default_value = "./cloud-pocket.yaml")]
        output: String,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Show environment variables instead
        #[arg(short, long)]
        env: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the standard locations)
        file: Option<String>,
    },

    /// Print the configuration JSON schema
    Schema,

    /// Set a value by dotted key, e.g. stack.backend_bucket
    Set {
        key: String,
        value: String,

        /// File to update
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Read a value by dotted key
    Get {
        key: String,

        /// File to read
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Describe supported environment variables
    Env,
}
