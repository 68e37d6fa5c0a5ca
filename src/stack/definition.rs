//! Proxy stack declaration
//!
//! Assembles the gateway, the execution role and the two S3 proxy routes
//! from a [`StackConfig`].

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::config::StackConfig;
use crate::models::{
    AuthorizationType, BackendIntegration, ExecutionRole, GatewayDeclaration, HttpMethod,
    IntegrationResponse, IntegrationTarget, MethodParameter, MethodResponse, ParameterMapping,
    PathTemplate, PolicyStatement, RequestParameter, RouteDefinition, S3Operation,
};

/// Path parameter naming the bucket
pub const BUCKET_PARAM: &str = "bucket";
/// Path parameter naming the tenant
pub const TENANT_PARAM: &str = "cognitoId";
/// Path parameter naming the object key
pub const KEY_PARAM: &str = "key";
/// Optional query parameter forwarded to S3
pub const PREFIX_PARAM: &str = "prefix";
/// Header required on requests and mapped back on responses
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

pub const API_LOGICAL_ID: &str = "DataBucketApi";
pub const ROLE_LOGICAL_ID: &str = "S3CommunicationWithAPIGtw";

pub const LIST_ROUTE: &str = "ListObjects";
pub const GET_ROUTE: &str = "GetObject";

const LIST_PATH: &str = "/{bucket}/{cognitoId}";
const GET_PATH: &str = "/{bucket}/{cognitoId}/{key}";

/// Complete declaration of the proxy stack
#[derive(Clone, Debug, Serialize)]
pub struct ProxyStack {
    pub name: String,
    pub gateway: GatewayDeclaration,
    pub role: ExecutionRole,
    pub routes: Vec<RouteDefinition>,
}

impl ProxyStack {
    /// Build the stack declaration from configuration
    pub fn from_config(config: &StackConfig) -> Result<Self> {
        debug!(
            "Declaring stack {} (backend bucket {}, bucket_from_path={})",
            config.stack_name, config.backend_bucket, config.bucket_from_path
        );

        let mut gateway = GatewayDeclaration::new(API_LOGICAL_ID, &config.api_name)
            .description(&config.description)
            .policy_statement(PolicyStatement::s3_read_all_buckets())
            .minimum_compression_size(config.minimum_compression_size)
            .stage(&config.stage_name)
            .validate_request_parameters(config.validate_request_parameters);
        for media_type in &config.binary_media_types {
            gateway = gateway.binary_media_type(media_type);
        }

        let role = ExecutionRole::for_apigateway(ROLE_LOGICAL_ID)
            .add_to_policy(PolicyStatement::s3_read_all_buckets());

        let routes = vec![list_route(config)?, get_object_route(config)?];

        Ok(Self {
            name: config.stack_name.clone(),
            gateway,
            role,
            routes,
        })
    }

    pub fn route(&self, name: &str) -> Option<&RouteDefinition> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Routes ordered most specific (deepest) first
    pub fn routes_by_specificity(&self) -> Vec<&RouteDefinition> {
        let mut routes: Vec<&RouteDefinition> = self.routes.iter().collect();
        routes.sort_by(|a, b| b.path.depth().cmp(&a.path.depth()));
        routes
    }
}

/// Parameters shared by both routes: bucket, tenant, Content-Type, optional prefix
fn common_parameters() -> Vec<MethodParameter> {
    vec![
        MethodParameter::required(RequestParameter::path(BUCKET_PARAM)),
        MethodParameter::required(RequestParameter::path(TENANT_PARAM)),
        MethodParameter::required(RequestParameter::header(CONTENT_TYPE_HEADER)),
        MethodParameter::optional(RequestParameter::query(PREFIX_PARAM)),
    ]
}

fn method_responses(config: &StackConfig) -> Vec<MethodResponse> {
    let mut responses = vec![MethodResponse::new(200).header(CONTENT_TYPE_HEADER)];
    if config.map_backend_errors {
        responses.extend([403, 404, 500].map(MethodResponse::new));
    }
    responses
}

/// Content-Type passthrough on success, plus the mapped backend errors
fn with_responses(integration: BackendIntegration, config: &StackConfig) -> BackendIntegration {
    let integration =
        integration.response(IntegrationResponse::default_for(200).map_header(CONTENT_TYPE_HEADER));
    if !config.map_backend_errors {
        return integration;
    }
    integration
        .response(IntegrationResponse::selected_by(403, "403"))
        .response(IntegrationResponse::selected_by(404, "404"))
        .response(IntegrationResponse::selected_by(500, r"5\d{2}"))
}

fn route_path(template: &str) -> Result<PathTemplate> {
    PathTemplate::parse(template).with_context(|| format!("Invalid route path {template}"))
}

/// `GET /{bucket}/{cognitoId}`: list objects, optionally by prefix
fn list_route(config: &StackConfig) -> Result<RouteDefinition> {
    let integration = BackendIntegration::new(
        S3Operation::ListObjects,
        IntegrationTarget::Action {
            subdomain: Some(config.backend_bucket.clone()),
            action: S3Operation::ListObjects.action_name().to_string(),
        },
        ROLE_LOGICAL_ID,
    )
    .map(ParameterMapping::passthrough(RequestParameter::query(PREFIX_PARAM)));

    Ok(RouteDefinition {
        name: LIST_ROUTE.to_string(),
        method: HttpMethod::Get,
        path: route_path(LIST_PATH)?,
        authorization: AuthorizationType::Iam,
        parameters: common_parameters(),
        method_responses: method_responses(config),
        integration: with_responses(integration, config),
        capture_remainder: false,
    })
}

/// `GET /{bucket}/{cognitoId}/{key}`: fetch one object
fn get_object_route(config: &StackConfig) -> Result<RouteDefinition> {
    let path = if config.bucket_from_path {
        format!("{{{BUCKET_PARAM}}}/{{{KEY_PARAM}}}")
    } else {
        format!("{}/{{{KEY_PARAM}}}", config.backend_bucket)
    };

    let mut integration = BackendIntegration::new(
        S3Operation::GetObject,
        IntegrationTarget::Path { path },
        ROLE_LOGICAL_ID,
    )
    .map(ParameterMapping::passthrough(RequestParameter::query(PREFIX_PARAM)))
    .map(ParameterMapping::passthrough(RequestParameter::path(KEY_PARAM)));
    if config.bucket_from_path {
        integration = integration.map(ParameterMapping::passthrough(RequestParameter::path(
            BUCKET_PARAM,
        )));
    }

    let mut parameters = common_parameters();
    parameters.push(MethodParameter::required(RequestParameter::path(KEY_PARAM)));

    Ok(RouteDefinition {
        name: GET_ROUTE.to_string(),
        method: HttpMethod::Get,
        path: route_path(GET_PATH)?,
        authorization: AuthorizationType::Iam,
        parameters,
        method_responses: method_responses(config),
        integration: with_responses(integration, config),
        capture_remainder: true,
    })
}
