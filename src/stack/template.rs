//! CloudFormation template synthesis for the proxy stack
//!
//! Renders a [`ProxyStack`] into the JSON/YAML template consumed by
//! `aws cloudformation deploy`.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::definition::ProxyStack;
use crate::models::integration::integration_response_header_expr;
use crate::models::route::method_response_header_expr;
use crate::models::{PathSegment, PathTemplate, PolicyDocument, RouteDefinition};

pub const REST_API_TYPE: &str = "AWS::ApiGateway::RestApi";
pub const RESOURCE_TYPE: &str = "AWS::ApiGateway::Resource";
pub const METHOD_TYPE: &str = "AWS::ApiGateway::Method";
pub const REQUEST_VALIDATOR_TYPE: &str = "AWS::ApiGateway::RequestValidator";
pub const DEPLOYMENT_TYPE: &str = "AWS::ApiGateway::Deployment";
pub const STAGE_TYPE: &str = "AWS::ApiGateway::Stage";
pub const ROLE_TYPE: &str = "AWS::IAM::Role";
pub const POLICY_TYPE: &str = "AWS::IAM::Policy";

/// CloudFormation value: literal or intrinsic function
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CfnValue {
    Literal(String),
    Ref {
        #[serde(rename = "Ref")]
        target: String,
    },
    GetAtt {
        #[serde(rename = "Fn::GetAtt")]
        attribute: [String; 2],
    },
    Join {
        #[serde(rename = "Fn::Join")]
        join: (String, Vec<CfnValue>),
    },
}

impl CfnValue {
    pub fn literal(s: impl Into<String>) -> Self {
        CfnValue::Literal(s.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        CfnValue::Ref {
            target: logical_id.into(),
        }
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        CfnValue::GetAtt {
            attribute: [logical_id.into(), attribute.into()],
        }
    }

    pub fn join(parts: Vec<CfnValue>) -> Self {
        CfnValue::Join {
            join: (String::new(), parts),
        }
    }
}

/// `AWS::ApiGateway::RestApi` properties
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestApiProperties {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub policy: PolicyDocument,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub binary_media_types: Vec<String>,
    pub minimum_compression_size: u32,
}

/// `AWS::IAM::Role` properties
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleProperties {
    pub assume_role_policy_document: PolicyDocument,
}

/// `AWS::IAM::Policy` properties
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyProperties {
    pub policy_document: PolicyDocument,
    pub policy_name: String,
    pub roles: Vec<CfnValue>,
}

/// `AWS::ApiGateway::Resource` properties
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResourceProperties {
    pub parent_id: CfnValue,
    pub path_part: String,
    pub rest_api_id: CfnValue,
}

/// `AWS::ApiGateway::Method` properties
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MethodProperties {
    pub http_method: String,
    pub resource_id: CfnValue,
    pub rest_api_id: CfnValue,
    pub authorization_type: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub request_parameters: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_validator_id: Option<CfnValue>,
    pub method_responses: Vec<MethodResponseProperties>,
    pub integration: IntegrationProperties,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MethodResponseProperties {
    pub status_code: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub response_parameters: BTreeMap<String, bool>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IntegrationProperties {
    #[serde(rename = "Type")]
    pub integration_type: String,
    pub integration_http_method: String,
    pub uri: CfnValue,
    pub credentials: CfnValue,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub request_parameters: BTreeMap<String, String>,
    pub integration_responses: Vec<IntegrationResponseProperties>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IntegrationResponseProperties {
    pub status_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_pattern: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub response_parameters: BTreeMap<String, String>,
}

/// `AWS::ApiGateway::RequestValidator` properties
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestValidatorProperties {
    pub rest_api_id: CfnValue,
    pub validate_request_body: bool,
    pub validate_request_parameters: bool,
}

/// `AWS::ApiGateway::Deployment` properties
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentProperties {
    pub rest_api_id: CfnValue,
    pub description: String,
}

/// `AWS::ApiGateway::Stage` properties
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StageProperties {
    pub rest_api_id: CfnValue,
    pub deployment_id: CfnValue,
    pub stage_name: String,
}

/// Typed resource properties
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum ResourceProperties {
    RestApi(RestApiProperties),
    Role(RoleProperties),
    Policy(PolicyProperties),
    ApiResource(ApiResourceProperties),
    Method(Box<MethodProperties>),
    RequestValidator(RequestValidatorProperties),
    Deployment(DeploymentProperties),
    Stage(StageProperties),
}

impl ResourceProperties {
    pub fn resource_type(&self) -> &'static str {
        match self {
            ResourceProperties::RestApi(_) => REST_API_TYPE,
            ResourceProperties::Role(_) => ROLE_TYPE,
            ResourceProperties::Policy(_) => POLICY_TYPE,
            ResourceProperties::ApiResource(_) => RESOURCE_TYPE,
            ResourceProperties::Method(_) => METHOD_TYPE,
            ResourceProperties::RequestValidator(_) => REQUEST_VALIDATOR_TYPE,
            ResourceProperties::Deployment(_) => DEPLOYMENT_TYPE,
            ResourceProperties::Stage(_) => STAGE_TYPE,
        }
    }
}

/// Template resource entry
#[derive(Clone, Debug, Serialize)]
pub struct TemplateResource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(rename = "Properties")]
    pub properties: ResourceProperties,
    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl TemplateResource {
    pub fn new(properties: ResourceProperties) -> Self {
        Self {
            resource_type: properties.resource_type().to_string(),
            properties,
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on(mut self, logical_ids: Vec<String>) -> Self {
        self.depends_on = logical_ids;
        self
    }
}

/// Template output entry
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateOutput {
    pub description: String,
    pub value: CfnValue,
}

/// CloudFormation template
#[derive(Clone, Debug, Serialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, TemplateResource>,
    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, TemplateOutput>,
}

impl Template {
    pub fn new() -> Self {
        Self {
            format_version: "2010-09-09".to_string(),
            description: None,
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, logical_id: impl Into<String>, resource: TemplateResource) {
        self.resources.insert(logical_id.into(), resource);
    }

    pub fn resource(&self, logical_id: &str) -> Option<&TemplateResource> {
        self.resources.get(logical_id)
    }

    /// Resources of one CloudFormation type, keyed by logical id
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<(&str, &TemplateResource)> {
        self.resources
            .iter()
            .filter(|(_, r)| r.resource_type == resource_type)
            .map(|(id, r)| (id.as_str(), r))
            .collect()
    }

    pub fn resource_count(&self, resource_type: &str) -> usize {
        self.resources_of_type(resource_type).len()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize template")
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize template")
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize template")
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}

/// Synthesizes a [`Template`] from a [`ProxyStack`]
pub struct TemplateSynthesizer;

impl TemplateSynthesizer {
    pub fn synthesize(stack: &ProxyStack) -> Template {
        let api_id = stack.gateway.logical_id.as_str();
        let mut template = Template::new();
        template.description = Some(format!(
            "{}: {} proxying GET requests to S3",
            stack.name, stack.gateway.name
        ));

        template.add(
            api_id,
            TemplateResource::new(ResourceProperties::RestApi(RestApiProperties {
                name: stack.gateway.name.clone(),
                description: stack.gateway.description.clone(),
                policy: stack.gateway.policy.clone(),
                binary_media_types: stack.gateway.binary_media_types.clone(),
                minimum_compression_size: stack.gateway.minimum_compression_size,
            })),
        );

        Self::add_role(&mut template, stack);

        let validator_id = stack
            .gateway
            .validate_request_parameters
            .then(|| format!("{api_id}ParameterValidator"));
        if let Some(id) = &validator_id {
            template.add(
                id.clone(),
                TemplateResource::new(ResourceProperties::RequestValidator(
                    RequestValidatorProperties {
                        rest_api_id: CfnValue::reference(api_id),
                        validate_request_body: false,
                        validate_request_parameters: true,
                    },
                )),
            );
        }

        let mut method_ids = Vec::new();
        for route in &stack.routes {
            let resource_id = Self::add_resource_tree(&mut template, api_id, &route.path);
            let method_id = format!(
                "{}{}",
                resource_id.as_deref().unwrap_or(api_id),
                pascal_case(&route.method.as_str().to_lowercase())
            );
            let resource_ref = match resource_id {
                Some(id) => CfnValue::reference(id),
                None => CfnValue::get_att(api_id, "RootResourceId"),
            };

            debug!("Synthesizing method {} for {}", method_id, route.label());
            template.add(
                method_id.clone(),
                TemplateResource::new(ResourceProperties::Method(Box::new(Self::method(
                    api_id,
                    resource_ref,
                    route,
                    validator_id.as_deref(),
                )))),
            );
            method_ids.push(method_id);
        }

        Self::add_deployment(&mut template, stack, method_ids);
        template
    }

    fn add_role(template: &mut Template, stack: &ProxyStack) {
        let role = &stack.role;
        template.add(
            role.logical_id.clone(),
            TemplateResource::new(ResourceProperties::Role(RoleProperties {
                assume_role_policy_document: role.trust_policy(),
            })),
        );
        template.add(
            role.policy_logical_id(),
            TemplateResource::new(ResourceProperties::Policy(PolicyProperties {
                policy_document: role.policy.clone(),
                policy_name: role.policy_logical_id(),
                roles: vec![CfnValue::reference(&role.logical_id)],
            })),
        );
    }

    /// Add one `AWS::ApiGateway::Resource` per path prefix (shared prefixes
    /// are added once). Returns the logical id of the deepest resource, or
    /// `None` for the root path.
    fn add_resource_tree(template: &mut Template, api_id: &str, path: &PathTemplate) -> Option<String> {
        let mut parent: Option<String> = None;

        for prefix in path.prefixes() {
            let logical_id = resource_logical_id(api_id, &prefix);
            if template.resource(&logical_id).is_none() {
                let parent_id = match &parent {
                    Some(id) => CfnValue::reference(id),
                    None => CfnValue::get_att(api_id, "RootResourceId"),
                };
                let path_part = prefix
                    .segments()
                    .last()
                    .map(PathSegment::path_part)
                    .unwrap_or_default();

                template.add(
                    logical_id.clone(),
                    TemplateResource::new(ResourceProperties::ApiResource(ApiResourceProperties {
                        parent_id,
                        path_part,
                        rest_api_id: CfnValue::reference(api_id),
                    })),
                );
            }
            parent = Some(logical_id);
        }

        parent
    }

    fn method(
        api_id: &str,
        resource_ref: CfnValue,
        route: &RouteDefinition,
        validator_id: Option<&str>,
    ) -> MethodProperties {
        let integration = &route.integration;

        let request_parameters = route
            .parameters
            .iter()
            .map(|p| (p.parameter.method_expr(), p.required))
            .collect();

        let method_responses = route
            .method_responses
            .iter()
            .map(|r| MethodResponseProperties {
                status_code: r.status_code.to_string(),
                response_parameters: r
                    .headers
                    .iter()
                    .map(|h| (method_response_header_expr(h), true))
                    .collect(),
            })
            .collect();

        let integration_responses = integration
            .responses
            .iter()
            .map(|r| IntegrationResponseProperties {
                status_code: r.status_code.to_string(),
                selection_pattern: r.selection_pattern.clone(),
                response_parameters: r
                    .mapped_headers
                    .iter()
                    .map(|h| (method_response_header_expr(h), integration_response_header_expr(h)))
                    .collect(),
            })
            .collect();

        let uri = CfnValue::join(vec![
            CfnValue::literal("arn:"),
            CfnValue::reference("AWS::Partition"),
            CfnValue::literal(":apigateway:"),
            CfnValue::reference("AWS::Region"),
            CfnValue::literal(format!(
                ":{}:{}",
                integration.target.service_host(),
                integration.target.api_path()
            )),
        ]);

        MethodProperties {
            http_method: route.method.as_str().to_string(),
            resource_id: resource_ref,
            rest_api_id: CfnValue::reference(api_id),
            authorization_type: route.authorization.as_str().to_string(),
            request_parameters,
            request_validator_id: validator_id.map(CfnValue::reference),
            method_responses,
            integration: IntegrationProperties {
                integration_type: "AWS".to_string(),
                integration_http_method: integration.http_method.as_str().to_string(),
                uri,
                credentials: CfnValue::get_att(&integration.credentials_role, "Arn"),
                request_parameters: integration
                    .request_mappings
                    .iter()
                    .map(|m| (m.target.integration_expr(), m.source.method_expr()))
                    .collect(),
                integration_responses,
            },
        }
    }

    fn add_deployment(template: &mut Template, stack: &ProxyStack, method_ids: Vec<String>) {
        let api_id = stack.gateway.logical_id.as_str();
        let deployment_id = format!("{api_id}Deployment");
        let stage = &stack.gateway.stage_name;
        let stage_id = format!("{deployment_id}Stage{}", pascal_case(stage));

        template.add(
            deployment_id.clone(),
            TemplateResource::new(ResourceProperties::Deployment(DeploymentProperties {
                rest_api_id: CfnValue::reference(api_id),
                description: stack.gateway.description.clone(),
            }))
            .depends_on(method_ids),
        );

        template.add(
            stage_id.clone(),
            TemplateResource::new(ResourceProperties::Stage(StageProperties {
                rest_api_id: CfnValue::reference(api_id),
                deployment_id: CfnValue::reference(&deployment_id),
                stage_name: stage.clone(),
            })),
        );

        template.outputs.insert(
            format!("{api_id}Endpoint"),
            TemplateOutput {
                description: format!("Invoke URL of {}", stack.gateway.name),
                value: CfnValue::join(vec![
                    CfnValue::literal("https://"),
                    CfnValue::reference(api_id),
                    CfnValue::literal(".execute-api."),
                    CfnValue::reference("AWS::Region"),
                    CfnValue::literal("."),
                    CfnValue::reference("AWS::URLSuffix"),
                    CfnValue::literal("/"),
                    CfnValue::reference(stage_id),
                    CfnValue::literal("/"),
                ]),
            },
        );
    }
}

/// `DataBucketApi` + `/{bucket}/{cognitoId}` → `DataBucketApiBucketCognitoId`
pub fn resource_logical_id(api_id: &str, path: &PathTemplate) -> String {
    let mut id = api_id.to_string();
    for segment in path.segments() {
        let name = match segment {
            PathSegment::Literal(s) | PathSegment::Param(s) => s,
        };
        id.push_str(&pascal_case(name));
    }
    id
}

/// Upper-case the first character and drop characters invalid in logical ids
fn pascal_case(s: &str) -> String {
    let cleaned: String = s.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let mut chars = cleaned.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;

    fn synth(config: &StackConfig) -> Template {
        TemplateSynthesizer::synthesize(&ProxyStack::from_config(config).unwrap())
    }

    fn json(template: &Template) -> serde_json::Value {
        serde_json::to_value(template).unwrap()
    }

    fn default_template() -> serde_json::Value {
        json(&synth(&StackConfig::default()))
    }

    #[test]
    fn test_resource_counts() {
        let template = synth(&StackConfig::default());

        assert_eq!(template.resource_count(REST_API_TYPE), 1);
        assert_eq!(template.resource_count(ROLE_TYPE), 1);
        assert_eq!(template.resource_count(POLICY_TYPE), 1);
        assert_eq!(template.resource_count(RESOURCE_TYPE), 3);
        assert_eq!(template.resource_count(METHOD_TYPE), 2);
        assert_eq!(template.resource_count(REQUEST_VALIDATOR_TYPE), 1);
        assert_eq!(template.resource_count(DEPLOYMENT_TYPE), 1);
        assert_eq!(template.resource_count(STAGE_TYPE), 1);
        // Nothing outside the declared gateway/role/routes
        assert_eq!(template.resource_count("AWS::SQS::Queue"), 0);
        assert_eq!(template.resource_count("AWS::SNS::Topic"), 0);
    }

    #[test]
    fn test_rest_api_properties() {
        let json = default_template();
        let api = &json["Resources"]["DataBucketApi"];

        assert_eq!(api["Type"], "AWS::ApiGateway::RestApi");
        let props = &api["Properties"];
        assert_eq!(props["Name"], "data-bucket-rest-api");
        assert_eq!(props["Description"], "REST API for serving raw data files");
        assert_eq!(props["BinaryMediaTypes"], serde_json::json!(["*/*"]));
        assert_eq!(props["MinimumCompressionSize"], 0);
        assert_eq!(
            props["Policy"]["Statement"][0]["Action"],
            serde_json::json!(["s3:GetObject", "s3:ListBucket", "s3:ListAllMyBuckets"])
        );
        assert_eq!(
            props["Policy"]["Statement"][0]["Resource"],
            serde_json::json!(["arn:aws:s3:::*"])
        );
    }

    #[test]
    fn test_role_and_policy() {
        let json = default_template();
        let role = &json["Resources"]["S3CommunicationWithAPIGtw"]["Properties"];
        let trust = &role["AssumeRolePolicyDocument"]["Statement"][0];
        assert_eq!(trust["Principal"]["Service"], "apigateway.amazonaws.com");
        assert_eq!(trust["Action"][0], "sts:AssumeRole");

        let policy = &json["Resources"]["S3CommunicationWithAPIGtwDefaultPolicy"]["Properties"];
        assert_eq!(policy["Roles"][0]["Ref"], "S3CommunicationWithAPIGtw");
        assert_eq!(
            policy["PolicyDocument"]["Statement"][0]["Action"],
            serde_json::json!(["s3:GetObject", "s3:ListBucket", "s3:ListAllMyBuckets"])
        );
    }

    #[test]
    fn test_resource_tree() {
        let json = default_template();
        let resources = &json["Resources"];

        let bucket = &resources["DataBucketApiBucket"]["Properties"];
        assert_eq!(bucket["PathPart"], "{bucket}");
        assert_eq!(
            bucket["ParentId"]["Fn::GetAtt"],
            serde_json::json!(["DataBucketApi", "RootResourceId"])
        );

        let tenant = &resources["DataBucketApiBucketCognitoId"]["Properties"];
        assert_eq!(tenant["PathPart"], "{cognitoId}");
        assert_eq!(tenant["ParentId"]["Ref"], "DataBucketApiBucket");

        let key = &resources["DataBucketApiBucketCognitoIdKey"]["Properties"];
        assert_eq!(key["PathPart"], "{key}");
        assert_eq!(key["ParentId"]["Ref"], "DataBucketApiBucketCognitoId");
    }

    #[test]
    fn test_list_method() {
        let json = default_template();
        let method = &json["Resources"]["DataBucketApiBucketCognitoIdGet"]["Properties"];

        assert_eq!(method["HttpMethod"], "GET");
        assert_eq!(method["AuthorizationType"], "AWS_IAM");
        assert_eq!(
            method["RequestParameters"],
            serde_json::json!({
                "method.request.path.bucket": true,
                "method.request.path.cognitoId": true,
                "method.request.header.Content-Type": true,
                "method.request.querystring.prefix": false,
            })
        );

        let integration = &method["Integration"];
        assert_eq!(integration["Type"], "AWS");
        assert_eq!(integration["IntegrationHttpMethod"], "GET");
        assert_eq!(
            integration["Credentials"]["Fn::GetAtt"],
            serde_json::json!(["S3CommunicationWithAPIGtw", "Arn"])
        );
        assert_eq!(
            integration["RequestParameters"],
            serde_json::json!({
                "integration.request.querystring.prefix": "method.request.querystring.prefix"
            })
        );
        assert_eq!(
            integration["Uri"]["Fn::Join"][1][4],
            ":test-mediahstf.s3:action/ListBucket"
        );
        assert_eq!(
            integration["IntegrationResponses"][0]["ResponseParameters"],
            serde_json::json!({
                "method.response.header.Content-Type": "integration.response.header.Content-Type"
            })
        );
        assert_eq!(
            method["MethodResponses"][0]["ResponseParameters"],
            serde_json::json!({ "method.response.header.Content-Type": true })
        );
    }

    #[test]
    fn test_get_object_method() {
        let json = default_template();
        let method = &json["Resources"]["DataBucketApiBucketCognitoIdKeyGet"]["Properties"];

        assert_eq!(method["AuthorizationType"], "AWS_IAM");
        assert_eq!(method["RequestParameters"]["method.request.path.key"], true);
        assert_eq!(
            method["Integration"]["RequestParameters"],
            serde_json::json!({
                "integration.request.path.key": "method.request.path.key",
                "integration.request.querystring.prefix": "method.request.querystring.prefix",
            })
        );
        // Fixed backend bucket regardless of the {bucket} path segment
        assert_eq!(
            method["Integration"]["Uri"]["Fn::Join"][1][4],
            ":s3:path/test-mediahstf/{key}"
        );
    }

    #[test]
    fn test_error_responses() {
        let json = default_template();
        let responses =
            &json["Resources"]["DataBucketApiBucketCognitoIdKeyGet"]["Properties"]["Integration"]
                ["IntegrationResponses"];

        assert_eq!(responses[1]["StatusCode"], "403");
        assert_eq!(responses[1]["SelectionPattern"], "403");
        assert_eq!(responses[3]["SelectionPattern"], r"5\d{2}");
        assert!(responses[0].get("SelectionPattern").is_none());
    }

    #[test]
    fn test_validator_optional() {
        let config = StackConfig {
            validate_request_parameters: false,
            ..StackConfig::default()
        };
        let template = synth(&config);
        assert_eq!(template.resource_count(REQUEST_VALIDATOR_TYPE), 0);

        let json = json(&template);
        assert!(json["Resources"]["DataBucketApiBucketCognitoIdGet"]["Properties"]
            .get("RequestValidatorId")
            .is_none());
    }

    #[test]
    fn test_deployment_and_output() {
        let template = synth(&StackConfig::default());
        let deployment = template.resource("DataBucketApiDeployment").unwrap();
        assert_eq!(
            deployment.depends_on,
            vec![
                "DataBucketApiBucketCognitoIdGet".to_string(),
                "DataBucketApiBucketCognitoIdKeyGet".to_string()
            ]
        );
        assert!(template.resource("DataBucketApiDeploymentStageProd").is_some());
        assert!(template.outputs.contains_key("DataBucketApiEndpoint"));
    }

    #[test]
    fn test_hyphenated_stage_logical_ids() {
        let mut file = crate::config::ConfigFile::default();
        file.stack.stage_name = "dev-v1".to_string();
        assert!(file.validate().is_ok());

        let template = synth(&file.stack);
        let stage = template.resource("DataBucketApiDeploymentStageDevv1").unwrap();
        assert_eq!(stage.resource_type, STAGE_TYPE);
        assert!(template
            .resources
            .keys()
            .all(|id| id.chars().all(|c| c.is_ascii_alphanumeric())));

        let json = json(&template);
        assert_eq!(
            json["Resources"]["DataBucketApiDeploymentStageDevv1"]["Properties"]["StageName"],
            "dev-v1"
        );
    }

    #[test]
    fn test_bucket_from_path_template() {
        let config = StackConfig {
            bucket_from_path: true,
            ..StackConfig::default()
        };
        let json = json(&synth(&config));
        let integration =
            &json["Resources"]["DataBucketApiBucketCognitoIdKeyGet"]["Properties"]["Integration"];

        assert_eq!(integration["Uri"]["Fn::Join"][1][4], ":s3:path/{bucket}/{key}");
        assert_eq!(
            integration["RequestParameters"]["integration.request.path.bucket"],
            "method.request.path.bucket"
        );
    }

    #[test]
    fn test_yaml_output() {
        let yaml = synth(&StackConfig::default()).to_yaml().unwrap();
        assert!(yaml.contains("AWSTemplateFormatVersion"));
        assert!(yaml.contains("AWS::ApiGateway::RestApi"));
    }

    #[test]
    fn test_logical_ids() {
        let path = PathTemplate::parse("/{bucket}/{cognitoId}").unwrap();
        assert_eq!(resource_logical_id("Api", &path), "ApiBucketCognitoId");
        assert_eq!(pascal_case("get"), "Get");
        assert_eq!(pascal_case("my-files"), "Myfiles");
    }
}
