//! Backend integration models
//!
//! Describes how a route's parameters reach the S3 backend and how the
//! backend's response is mapped back onto the method response.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::policy::S3Action;
use super::route::{HttpMethod, RequestParameter};

/// S3 operation issued by an integration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum S3Operation {
    ListObjects,
    GetObject,
}

impl S3Operation {
    /// Action name used in the integration URI
    pub fn action_name(&self) -> &'static str {
        match self {
            S3Operation::ListObjects => "ListBucket",
            S3Operation::GetObject => "GetObject",
        }
    }

    /// IAM action the execution role needs for this operation
    pub fn required_action(&self) -> S3Action {
        match self {
            S3Operation::ListObjects => S3Action::ListBucket,
            S3Operation::GetObject => S3Action::GetObject,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            S3Operation::ListObjects => "list-objects",
            S3Operation::GetObject => "get-object",
        }
    }
}

/// How the integration addresses the S3 API.
///
/// Action and path addressing are exclusive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationTarget {
    /// `<subdomain>.s3:action/<action>`
    Action {
        subdomain: Option<String>,
        action: String,
    },
    /// `s3:path/<path>`, where `{name}` placeholders are filled from
    /// `integration.request.path.<name>`
    Path { path: String },
}

impl IntegrationTarget {
    /// Service host segment of the URI, e.g. `media.s3`
    pub fn service_host(&self) -> String {
        match self {
            IntegrationTarget::Action {
                subdomain: Some(sub),
                ..
            } => format!("{sub}.s3"),
            _ => "s3".to_string(),
        }
    }

    /// API segment of the URI, e.g. `action/ListBucket`
    pub fn api_path(&self) -> String {
        match self {
            IntegrationTarget::Action { action, .. } => format!("action/{action}"),
            IntegrationTarget::Path { path } => format!("path/{path}"),
        }
    }

    /// Full integration URI for a partition and region
    pub fn uri(&self, partition: &str, region: &str) -> String {
        format!(
            "arn:{partition}:apigateway:{region}:{}:{}",
            self.service_host(),
            self.api_path()
        )
    }

    /// Bucket addressed by the target, before placeholder substitution
    pub fn bucket(&self) -> Option<&str> {
        match self {
            IntegrationTarget::Action { subdomain, .. } => subdomain.as_deref(),
            IntegrationTarget::Path { path } => path.split('/').next().filter(|s| !s.is_empty()),
        }
    }

    /// Whether the bucket comes from a request placeholder rather than a fixed name
    pub fn bucket_is_dynamic(&self) -> bool {
        self.bucket()
            .map(|b| b.starts_with('{') && b.ends_with('}'))
            .unwrap_or(false)
    }

    /// `{name}` placeholders in a path target
    pub fn placeholders(&self) -> Vec<&str> {
        match self {
            IntegrationTarget::Action { .. } => Vec::new(),
            IntegrationTarget::Path { path } => path
                .split('/')
                .filter_map(|s| s.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
                .collect(),
        }
    }
}

/// Integration request parameter fed from a method request parameter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterMapping {
    /// Integration-side parameter
    pub target: RequestParameter,
    /// Method-side source parameter
    pub source: RequestParameter,
}

impl ParameterMapping {
    pub fn new(target: RequestParameter, source: RequestParameter) -> Self {
        Self { target, source }
    }

    /// Forward a parameter unchanged (same location and name)
    pub fn passthrough(parameter: RequestParameter) -> Self {
        Self::new(parameter.clone(), parameter)
    }
}

/// Integration response selected by backend status code
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationResponse {
    /// Method response status to return
    pub status_code: u16,
    /// Regex matched against the backend status; `None` is the default response
    pub selection_pattern: Option<String>,
    /// Backend headers copied onto the method response
    pub mapped_headers: Vec<String>,
}

impl IntegrationResponse {
    /// Default (catch-all) response
    pub fn default_for(status_code: u16) -> Self {
        Self {
            status_code,
            selection_pattern: None,
            mapped_headers: Vec::new(),
        }
    }

    pub fn selected_by(status_code: u16, pattern: impl Into<String>) -> Self {
        Self {
            status_code,
            selection_pattern: Some(pattern.into()),
            mapped_headers: Vec::new(),
        }
    }

    pub fn map_header(mut self, name: impl Into<String>) -> Self {
        self.mapped_headers.push(name.into());
        self
    }

    /// Selection pattern anchored to the whole status code; `None` for the default
    pub fn selection_regex(&self) -> Option<Result<Regex, regex::Error>> {
        self.selection_pattern
            .as_ref()
            .map(|pattern| Regex::new(&format!("^(?:{pattern})$")))
    }
}

/// Integration responses with their selection patterns compiled
#[derive(Clone, Debug)]
pub struct ResponseSelector {
    selected: Vec<(Regex, IntegrationResponse)>,
    default: Option<IntegrationResponse>,
}

impl ResponseSelector {
    /// Compile every selection pattern; fails on the first invalid one
    pub fn compile(responses: &[IntegrationResponse]) -> Result<Self, regex::Error> {
        let mut selected = Vec::new();
        let mut default = None;

        for response in responses {
            match response.selection_regex() {
                Some(regex) => selected.push((regex?, response.clone())),
                None if default.is_none() => default = Some(response.clone()),
                None => {}
            }
        }

        Ok(Self { selected, default })
    }

    /// First response whose pattern matches `status`, else the default
    pub fn select(&self, status: u16) -> Option<&IntegrationResponse> {
        let status = status.to_string();
        self.selected
            .iter()
            .find(|(regex, _)| regex.is_match(&status))
            .map(|(_, response)| response)
            .or(self.default.as_ref())
    }
}

/// `integration.response.header.<name>`
pub fn integration_response_header_expr(name: &str) -> String {
    format!("integration.response.header.{name}")
}

/// Mapping from a route to an S3 operation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendIntegration {
    pub operation: S3Operation,
    pub http_method: HttpMethod,
    pub target: IntegrationTarget,
    /// Logical id of the role the gateway assumes for this call
    pub credentials_role: String,
    pub request_mappings: Vec<ParameterMapping>,
    pub responses: Vec<IntegrationResponse>,
}

impl BackendIntegration {
    pub fn new(operation: S3Operation, target: IntegrationTarget, role: impl Into<String>) -> Self {
        Self {
            operation,
            http_method: HttpMethod::Get,
            target,
            credentials_role: role.into(),
            request_mappings: Vec::new(),
            responses: Vec::new(),
        }
    }

    pub fn map(mut self, mapping: ParameterMapping) -> Self {
        self.request_mappings.push(mapping);
        self
    }

    pub fn response(mut self, response: IntegrationResponse) -> Self {
        self.responses.push(response);
        self
    }

    /// Whether a method parameter reaches the backend
    pub fn forwards(&self, source: &RequestParameter) -> bool {
        self.request_mappings.iter().any(|m| &m.source == source)
    }

    /// Compiled response selection for this integration
    pub fn response_selector(&self) -> Result<ResponseSelector, regex::Error> {
        ResponseSelector::compile(&self.responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_target() -> IntegrationTarget {
        IntegrationTarget::Action {
            subdomain: Some("media".to_string()),
            action: "ListBucket".to_string(),
        }
    }

    #[test]
    fn test_action_target_uri() {
        let target = list_target();
        assert_eq!(
            target.uri("aws", "us-east-1"),
            "arn:aws:apigateway:us-east-1:media.s3:action/ListBucket"
        );
        assert_eq!(target.bucket(), Some("media"));
        assert!(target.placeholders().is_empty());
    }

    #[test]
    fn test_path_target_uri() {
        let target = IntegrationTarget::Path {
            path: "media/{key}".to_string(),
        };
        assert_eq!(
            target.uri("aws", "eu-west-1"),
            "arn:aws:apigateway:eu-west-1:s3:path/media/{key}"
        );
        assert_eq!(target.bucket(), Some("media"));
        assert!(!target.bucket_is_dynamic());
        assert_eq!(target.placeholders(), vec!["key"]);

        let dynamic = IntegrationTarget::Path {
            path: "{bucket}/{key}".to_string(),
        };
        assert!(dynamic.bucket_is_dynamic());
    }

    #[test]
    fn test_select_response() {
        let integration = BackendIntegration::new(S3Operation::GetObject, list_target(), "Role")
            .response(IntegrationResponse::default_for(200).map_header("Content-Type"))
            .response(IntegrationResponse::selected_by(404, "404"))
            .response(IntegrationResponse::selected_by(500, r"5\d{2}"));
        let selector = integration.response_selector().unwrap();

        assert_eq!(selector.select(200).unwrap().status_code, 200);
        assert_eq!(selector.select(404).unwrap().status_code, 404);
        assert_eq!(selector.select(503).unwrap().status_code, 500);
        // Unmatched statuses fall through to the default response
        assert_eq!(selector.select(403).unwrap().status_code, 200);
    }

    #[test]
    fn test_selection_requires_full_match() {
        let selector =
            ResponseSelector::compile(&[IntegrationResponse::selected_by(404, "40")]).unwrap();
        assert!(selector.select(404).is_none());
        assert!(selector.select(40).is_some());
    }

    #[test]
    fn test_invalid_selection_pattern() {
        let response = IntegrationResponse::selected_by(500, r"5\d{2");
        assert!(matches!(response.selection_regex(), Some(Err(_))));
        assert!(IntegrationResponse::default_for(200).selection_regex().is_none());

        let integration = BackendIntegration::new(S3Operation::GetObject, list_target(), "Role")
            .response(IntegrationResponse::default_for(200))
            .response(response);
        assert!(integration.response_selector().is_err());
    }

    #[test]
    fn test_forwards() {
        let integration = BackendIntegration::new(S3Operation::ListObjects, list_target(), "Role")
            .map(ParameterMapping::passthrough(RequestParameter::query("prefix")));

        assert!(integration.forwards(&RequestParameter::query("prefix")));
        assert!(!integration.forwards(&RequestParameter::path("bucket")));
    }

    #[test]
    fn test_operation_actions() {
        assert_eq!(S3Operation::ListObjects.required_action(), S3Action::ListBucket);
        assert_eq!(S3Operation::GetObject.action_name(), "GetObject");
    }
}
