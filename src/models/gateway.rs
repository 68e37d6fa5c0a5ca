//! Gateway and execution role declarations

use serde::{Deserialize, Serialize};

use super::policy::{Action, PolicyDocument, PolicyStatement, Principal};

/// Service principal for API Gateway
pub const APIGATEWAY_SERVICE: &str = "apigateway.amazonaws.com";

/// REST API declaration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayDeclaration {
    /// CloudFormation logical id
    pub logical_id: String,
    pub name: String,
    pub description: String,
    /// Resource policy attached to the API
    pub policy: PolicyDocument,
    /// Media types treated as binary (`*/*` passes everything through as bytes)
    pub binary_media_types: Vec<String>,
    /// Minimum payload size for compression; zero compresses everything
    pub minimum_compression_size: u32,
    pub stage_name: String,
    /// Attach a request validator that enforces required parameters
    pub validate_request_parameters: bool,
}

impl GatewayDeclaration {
    pub fn new(logical_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            name: name.into(),
            description: String::new(),
            policy: PolicyDocument::new(),
            binary_media_types: Vec::new(),
            minimum_compression_size: 0,
            stage_name: "prod".to_string(),
            validate_request_parameters: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn policy_statement(mut self, statement: PolicyStatement) -> Self {
        self.policy.statements.push(statement);
        self
    }

    pub fn binary_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.binary_media_types.push(media_type.into());
        self
    }

    pub fn minimum_compression_size(mut self, bytes: u32) -> Self {
        self.minimum_compression_size = bytes;
        self
    }

    pub fn stage(mut self, stage_name: impl Into<String>) -> Self {
        self.stage_name = stage_name.into();
        self
    }

    pub fn validate_request_parameters(mut self, enabled: bool) -> Self {
        self.validate_request_parameters = enabled;
        self
    }
}

/// Role the gateway assumes to call S3
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionRole {
    pub logical_id: String,
    /// Service principal allowed to assume the role
    pub trusted_service: String,
    /// Permissions policy
    pub policy: PolicyDocument,
}

impl ExecutionRole {
    /// Role trusted by API Gateway
    pub fn for_apigateway(logical_id: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            trusted_service: APIGATEWAY_SERVICE.to_string(),
            policy: PolicyDocument::new(),
        }
    }

    pub fn add_to_policy(mut self, statement: PolicyStatement) -> Self {
        self.policy.statements.push(statement);
        self
    }

    /// Trust policy document
    pub fn trust_policy(&self) -> PolicyDocument {
        PolicyDocument::new().statement(PolicyStatement::assume_role_by(&self.trusted_service))
    }

    /// Logical id of the inline policy resource
    pub fn policy_logical_id(&self) -> String {
        format!("{}DefaultPolicy", self.logical_id)
    }

    /// Whether only `service` may assume the role
    pub fn trusted_only_by(&self, service: &str) -> bool {
        self.trust_policy().statements.iter().all(|s| {
            s.actions == vec![Action::AssumeRole]
                && s.principal == Some(Principal::Service(service.to_string()))
        })
    }
}
