//! Data models for the proxy stack
//!
//! Policy documents, gateway and role declarations, routes and backend
//! integrations.

pub mod gateway;
pub mod integration;
pub mod policy;
pub mod route;

pub use gateway::{ExecutionRole, GatewayDeclaration, APIGATEWAY_SERVICE};
pub use integration::{
    BackendIntegration, IntegrationResponse, IntegrationTarget, ParameterMapping,
    ResponseSelector, S3Operation,
};
pub use policy::{Action, PolicyDocument, PolicyStatement, S3Action};
pub use route::{
    AuthorizationType, HttpMethod, MethodParameter, MethodResponse, ParameterLocation,
    PathSegment, PathTemplate, RequestParameter, RouteDefinition,
};
