//! Stack deployment and management module
//!
//! Writes the synthesized template and drives CloudFormation through the
//! AWS CLI.

mod provisioner;

pub use provisioner::{ProvisionerConfig, StackProvisioner};
