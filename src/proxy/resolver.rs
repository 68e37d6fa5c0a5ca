//! Request resolution against the declared routes
//!
//! Mirrors what the gateway does with a request before calling S3: route
//! matching, IAM signature presence, required parameter validation and
//! integration parameter mapping.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{ProxyError, ProxyRequest};
use crate::models::{
    AuthorizationType, HttpMethod, IntegrationTarget, ParameterLocation, RequestParameter,
    ResponseSelector, RouteDefinition, S3Operation,
};
use crate::stack::ProxyStack;

/// `AWS4-HMAC-SHA256 Credential=<akid>/<scope>, SignedHeaders=<h;h>, Signature=<hex>`
const SIGV4_PATTERN: &str = r"^AWS4-HMAC-SHA256\s+Credential=([^/,\s]+)/[^,\s]+,\s*SignedHeaders=[a-z0-9;-]+,\s*Signature=[0-9a-f]{64}$";

const AUTHORIZATION_HEADER: &str = "Authorization";

/// Call the gateway would issue to S3
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BackendCall {
    pub operation: S3Operation,
    pub http_method: HttpMethod,
    pub bucket: String,
    /// Object key (get-object only)
    pub key: Option<String>,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    /// Integration URI with placeholders filled
    pub uri: String,
    /// Role the gateway assumes for the call
    pub credentials: String,
}

/// A request accepted by the gateway
#[derive(Clone, Debug, Serialize)]
pub struct Resolution {
    pub route: String,
    pub label: String,
    pub path_params: BTreeMap<String, String>,
    /// Access key id from the signature credential
    pub identity: Option<String>,
    pub call: BackendCall,
}

/// What S3 answered
#[derive(Clone, Debug, Default)]
pub struct BackendResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
}

impl BackendResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// What the client receives
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Gateway-generated error message, when the gateway answers itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Resolves requests against a [`ProxyStack`]
pub struct RequestResolver {
    stack: ProxyStack,
    partition: String,
    region: String,
    signature: Regex,
    /// Compiled integration responses by route name
    selectors: BTreeMap<String, ResponseSelector>,
}

impl RequestResolver {
    pub fn new(stack: ProxyStack, region: impl Into<String>) -> Result<Self> {
        let region = region.into();
        let selectors = stack
            .routes
            .iter()
            .map(|route| {
                route
                    .integration
                    .response_selector()
                    .map(|selector| (route.name.clone(), selector))
                    .with_context(|| format!("Invalid selection pattern on route {}", route.name))
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            stack,
            partition: partition_for(&region).to_string(),
            region,
            signature: Regex::new(SIGV4_PATTERN).context("Invalid signature pattern")?,
            selectors,
        })
    }

    /// Resolve a request into the backend call it produces
    pub fn resolve(&self, request: &ProxyRequest) -> Result<Resolution, ProxyError> {
        let segments = request.path_segments()?;

        let (route, path_params) = self
            .stack
            .routes_by_specificity()
            .into_iter()
            .filter(|r| r.method == request.method)
            .find_map(|r| {
                r.path
                    .match_segments(&segments, r.capture_remainder)
                    .map(|params| (r, params))
            })
            .ok_or(ProxyError::MissingAuthenticationToken)?;

        debug!("{} {} matched {}", request.method, request.path, route.label());

        let identity = match route.authorization {
            AuthorizationType::Iam => Some(self.check_signature(request)?),
            AuthorizationType::None => None,
        };

        let values = collect_parameters(route, request, &path_params);

        if self.stack.gateway.validate_request_parameters {
            let missing: Vec<String> = route
                .required_parameters()
                .filter(|p| !values.contains_key(*p))
                .map(|p| p.name.clone())
                .collect();
            if !missing.is_empty() {
                return Err(ProxyError::MissingParameter(missing));
            }
        }

        let call = self.backend_call(route, &values)?;
        info!(
            "{} -> {} s3://{}/{}",
            route.label(),
            call.operation.name(),
            call.bucket,
            call.key.as_deref().unwrap_or("")
        );

        Ok(Resolution {
            route: route.name.clone(),
            label: route.label(),
            path_params,
            identity,
            call,
        })
    }

    /// Map a backend response through the route's integration responses
    pub fn map_response(&self, resolution: &Resolution, backend: &BackendResponse) -> ProxyResponse {
        let selected = self
            .selectors
            .get(&resolution.route)
            .and_then(|selector| selector.select(backend.status));

        // The gateway answers 500 itself when nothing is selected or the
        // selected status has no method response
        let declared = |status: u16| {
            self.stack
                .route(&resolution.route)
                .and_then(|route| route.method_response(status))
                .is_some()
        };
        let Some(selected) = selected.filter(|r| declared(r.status_code)) else {
            debug!("No integration response for backend status {}", backend.status);
            return ProxyResponse {
                status: 500,
                headers: BTreeMap::new(),
                message: Some("Internal server error".to_string()),
            };
        };

        let headers = selected
            .mapped_headers
            .iter()
            .filter_map(|name| {
                backend
                    .headers
                    .iter()
                    .find(|(n, _)| n.eq_ignore_ascii_case(name))
                    .map(|(_, v)| (name.clone(), v.clone()))
            })
            .collect();

        ProxyResponse {
            status: selected.status_code,
            headers,
            message: None,
        }
    }

    /// Presence and shape of the SigV4 `Authorization` header; returns the access key id
    fn check_signature(&self, request: &ProxyRequest) -> Result<String, ProxyError> {
        let header = request
            .header_value(AUTHORIZATION_HEADER)
            .ok_or(ProxyError::MissingAuthenticationToken)?;

        let captures = self.signature.captures(header.trim()).ok_or_else(|| {
            ProxyError::IncompleteSignature(
                "'Credential', 'SignedHeaders' and 'Signature' in AWS4-HMAC-SHA256 form"
                    .to_string(),
            )
        })?;

        Ok(captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default())
    }

    fn backend_call(
        &self,
        route: &RouteDefinition,
        values: &BTreeMap<RequestParameter, String>,
    ) -> Result<BackendCall, ProxyError> {
        let integration = &route.integration;

        // Absent optional sources are skipped
        let mapped: BTreeMap<&RequestParameter, &String> = integration
            .request_mappings
            .iter()
            .filter_map(|m| values.get(&m.source).map(|v| (&m.target, v)))
            .collect();

        let by_location = |location: ParameterLocation| -> BTreeMap<String, String> {
            mapped
                .iter()
                .filter(|(p, _)| p.location == location)
                .map(|(p, v)| (p.name.clone(), (*v).clone()))
                .collect()
        };
        let path_values = by_location(ParameterLocation::Path);

        let (target, bucket, key) = match &integration.target {
            IntegrationTarget::Action { subdomain, action } => {
                let bucket = subdomain.clone().ok_or_else(|| {
                    ProxyError::Integration(format!("{} has no bucket subdomain", route.name))
                })?;
                (
                    IntegrationTarget::Action {
                        subdomain: Some(bucket.clone()),
                        action: action.clone(),
                    },
                    bucket,
                    None,
                )
            }
            IntegrationTarget::Path { path } => {
                let mut decoded = Vec::new();
                let mut encoded = Vec::new();
                for part in path.split('/') {
                    let value = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                        Some(name) => path_values.get(name).cloned().ok_or_else(|| {
                            ProxyError::Integration(format!(
                                "integration.request.path.{name} is not mapped"
                            ))
                        })?,
                        None => part.to_string(),
                    };
                    encoded.push(urlencoding::encode(&value).into_owned());
                    decoded.push(value);
                }

                let bucket = decoded.first().cloned().unwrap_or_default();
                let key = (decoded.len() > 1).then(|| decoded[1..].join("/"));
                (
                    IntegrationTarget::Path {
                        path: encoded.join("/"),
                    },
                    bucket,
                    key,
                )
            }
        };

        Ok(BackendCall {
            operation: integration.operation,
            http_method: integration.http_method,
            bucket,
            key,
            query: by_location(ParameterLocation::QueryString),
            headers: by_location(ParameterLocation::Header),
            uri: target.uri(&self.partition, &self.region),
            credentials: integration.credentials_role.clone(),
        })
    }
}

/// AWS partition a region belongs to
fn partition_for(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else {
        "aws"
    }
}

/// Values of every declared method parameter present on the request
fn collect_parameters(
    route: &RouteDefinition,
    request: &ProxyRequest,
    path_params: &BTreeMap<String, String>,
) -> BTreeMap<RequestParameter, String> {
    route
        .parameters
        .iter()
        .filter_map(|declared| {
            let p = &declared.parameter;
            let value = match p.location {
                ParameterLocation::Path => path_params.get(&p.name).cloned(),
                ParameterLocation::QueryString => request.query.get(&p.name).cloned(),
                ParameterLocation::Header => request.header_value(&p.name).map(str::to_string),
            };
            value.map(|v| (p.clone(), v))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::stack::definition::{GET_ROUTE, LIST_ROUTE};

    const SIGNATURE: &str = "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240101/us-east-1/execute-api/aws4_request, SignedHeaders=content-type;host;x-amz-date, Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7";

    fn resolver_with(config: StackConfig) -> RequestResolver {
        RequestResolver::new(ProxyStack::from_config(&config).unwrap(), "us-east-1").unwrap()
    }

    fn resolver() -> RequestResolver {
        resolver_with(StackConfig::default())
    }

    fn signed(target: &str) -> ProxyRequest {
        ProxyRequest::get(target)
            .unwrap()
            .header("Authorization", SIGNATURE)
            .header("Content-Type", "application/octet-stream")
    }

    #[test]
    fn test_get_object_end_to_end() {
        let resolution = resolver()
            .resolve(&signed("/anybucket/tenant123/reports/2024.csv?prefix=reports/"))
            .unwrap();

        assert_eq!(resolution.route, GET_ROUTE);
        assert_eq!(resolution.identity.as_deref(), Some("AKIDEXAMPLE"));
        assert_eq!(resolution.path_params["bucket"], "anybucket");
        assert_eq!(resolution.path_params["key"], "reports/2024.csv");

        let call = &resolution.call;
        assert_eq!(call.operation, S3Operation::GetObject);
        assert_eq!(call.bucket, "test-mediahstf");
        assert_eq!(call.key.as_deref(), Some("reports/2024.csv"));
        assert_eq!(call.query.get("prefix").map(String::as_str), Some("reports/"));
        assert_eq!(
            call.uri,
            "arn:aws:apigateway:us-east-1:s3:path/test-mediahstf/reports%2F2024.csv"
        );
        assert_eq!(call.credentials, "S3CommunicationWithAPIGtw");
    }

    #[test]
    fn test_encoded_key_matches_get_route() {
        let resolution = resolver()
            .resolve(&signed("/b/t/reports%2F2024.csv"))
            .unwrap();
        assert_eq!(resolution.call.key.as_deref(), Some("reports/2024.csv"));
        assert!(resolution.call.query.is_empty());
    }

    #[test]
    fn test_list_objects() {
        let resolution = resolver().resolve(&signed("/anybucket/tenant123?prefix=logs/")).unwrap();

        assert_eq!(resolution.route, LIST_ROUTE);
        let call = &resolution.call;
        assert_eq!(call.operation, S3Operation::ListObjects);
        assert_eq!(call.bucket, "test-mediahstf");
        assert_eq!(call.key, None);
        assert_eq!(call.query.get("prefix").map(String::as_str), Some("logs/"));
        assert_eq!(
            call.uri,
            "arn:aws:apigateway:us-east-1:test-mediahstf.s3:action/ListBucket"
        );
    }

    #[test]
    fn test_bucket_from_path() {
        let resolver = resolver_with(StackConfig {
            bucket_from_path: true,
            ..StackConfig::default()
        });
        let resolution = resolver.resolve(&signed("/anybucket/t/a.txt")).unwrap();

        assert_eq!(resolution.call.bucket, "anybucket");
        assert_eq!(resolution.call.key.as_deref(), Some("a.txt"));
    }

    #[test]
    fn test_unsigned_request_rejected() {
        let request = ProxyRequest::get("/b/t/k")
            .unwrap()
            .header("Content-Type", "text/plain");
        let err = resolver().resolve(&request).unwrap_err();
        assert_eq!(err, ProxyError::MissingAuthenticationToken);
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let request = ProxyRequest::get("/b/t/k")
            .unwrap()
            .header("Authorization", "Bearer token")
            .header("Content-Type", "text/plain");
        let err = resolver().resolve(&request).unwrap_err();
        assert!(matches!(err, ProxyError::IncompleteSignature(_)));
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_unknown_route() {
        let resolver = resolver();
        assert_eq!(
            resolver.resolve(&signed("/only-bucket")).unwrap_err(),
            ProxyError::MissingAuthenticationToken
        );

        let mut request = signed("/b/t/k");
        request.method = HttpMethod::Post;
        assert_eq!(
            resolver.resolve(&request).unwrap_err(),
            ProxyError::MissingAuthenticationToken
        );
    }

    #[test]
    fn test_missing_content_type() {
        let request = ProxyRequest::get("/b/t/k")
            .unwrap()
            .header("Authorization", SIGNATURE);
        let err = resolver().resolve(&request).unwrap_err();
        assert_eq!(err, ProxyError::MissingParameter(vec!["Content-Type".to_string()]));
        assert_eq!(err.status_code(), 400);

        let lenient = resolver_with(StackConfig {
            validate_request_parameters: false,
            ..StackConfig::default()
        });
        assert!(lenient.resolve(&request).is_ok());
    }

    #[test]
    fn test_map_response() {
        let resolver = resolver();
        let resolution = resolver.resolve(&signed("/b/t/k")).unwrap();

        let ok = resolver.map_response(
            &resolution,
            &BackendResponse::new(200)
                .header("content-type", "text/csv")
                .header("ETag", "\"abc\""),
        );
        assert_eq!(ok.status, 200);
        assert_eq!(ok.headers.get("Content-Type").map(String::as_str), Some("text/csv"));
        assert!(!ok.headers.contains_key("ETag"));
        assert!(ok.message.is_none());

        assert_eq!(resolver.map_response(&resolution, &BackendResponse::new(404)).status, 404);
        assert_eq!(resolver.map_response(&resolution, &BackendResponse::new(503)).status, 500);
    }

    #[test]
    fn test_unselected_status_is_internal_error() {
        let mut stack = ProxyStack::from_config(&StackConfig::default()).unwrap();
        for route in &mut stack.routes {
            route.integration.responses.retain(|r| r.selection_pattern.is_some());
        }
        let resolver = RequestResolver::new(stack, "us-east-1").unwrap();
        let resolution = resolver.resolve(&signed("/b/t/k")).unwrap();

        let response = resolver.map_response(&resolution, &BackendResponse::new(200));
        assert_eq!(response.status, 500);
        assert_eq!(response.message.as_deref(), Some("Internal server error"));
        assert_eq!(resolver.map_response(&resolution, &BackendResponse::new(404)).status, 404);
    }

    #[test]
    fn test_undeclared_method_response_is_internal_error() {
        let mut stack = ProxyStack::from_config(&StackConfig::default()).unwrap();
        for route in &mut stack.routes {
            route.method_responses.retain(|r| r.status_code != 404);
        }
        let resolver = RequestResolver::new(stack, "us-east-1").unwrap();
        let resolution = resolver.resolve(&signed("/b/t/k")).unwrap();

        assert_eq!(resolver.map_response(&resolution, &BackendResponse::new(404)).status, 500);
        assert_eq!(resolver.map_response(&resolution, &BackendResponse::new(403)).status, 403);
    }

    #[test]
    fn test_invalid_selection_pattern_rejected_up_front() {
        let mut stack = ProxyStack::from_config(&StackConfig::default()).unwrap();
        stack.routes[0].integration.responses[1].selection_pattern = Some("40[".to_string());

        let err = RequestResolver::new(stack, "us-east-1").err().unwrap();
        assert!(format!("{err:#}").contains("Invalid selection pattern on route ListObjects"));
    }

    #[test]
    fn test_partition_follows_region() {
        let resolver = RequestResolver::new(
            ProxyStack::from_config(&StackConfig::default()).unwrap(),
            "cn-north-1",
        )
        .unwrap();
        let resolution = resolver.resolve(&signed("/b/t")).unwrap();
        assert_eq!(
            resolution.call.uri,
            "arn:aws-cn:apigateway:cn-north-1:test-mediahstf.s3:action/ListBucket"
        );

        assert_eq!(partition_for("us-gov-west-1"), "aws-us-gov");
        assert_eq!(partition_for("eu-west-1"), "aws");
    }

    #[test]
    fn test_unmapped_errors_become_200() {
        let resolver = resolver_with(StackConfig {
            map_backend_errors: false,
            ..StackConfig::default()
        });
        let resolution = resolver.resolve(&signed("/b/t/k")).unwrap();
        assert_eq!(resolver.map_response(&resolution, &BackendResponse::new(404)).status, 200);
    }
}
