//! Stack shape checks

use std::collections::BTreeSet;
use tracing::{debug, info};

use super::{Check, ValidationReport};
use crate::models::policy::{bucket_arn, object_arn, ALL_BUCKETS_ARN};
use crate::models::{
    Action, AuthorizationType, ParameterLocation, RequestParameter, RouteDefinition, S3Action,
    S3Operation, APIGATEWAY_SERVICE,
};
use crate::stack::definition::BUCKET_PARAM;
use crate::stack::ProxyStack;

pub const GATEWAY_POLICY: &str = "Gateway policy";
pub const ROLE_TRUST: &str = "Role trust";
pub const ROLE_COVERAGE: &str = "Role coverage";
pub const MAPPING_SOURCES: &str = "Mapping sources";
pub const PATH_PLACEHOLDERS: &str = "Path placeholders";
pub const RESPONSE_COVERAGE: &str = "Response coverage";
pub const SELECTION_PATTERNS: &str = "Selection patterns";
pub const ROUTE_AUTHORIZATION: &str = "Route authorization";
pub const FORWARDED_PARAMETERS: &str = "Forwarded parameters";
pub const BUCKET_PARAMETER: &str = "Bucket parameter";

/// Validator for proxy stack declarations
pub struct StackValidator;

impl StackValidator {
    /// Run every check against `stack`
    pub fn validate(stack: &ProxyStack) -> ValidationReport {
        info!("Validating stack {}", stack.name);

        let checks = vec![
            Self::check_gateway_policy(stack),
            Self::check_role_trust(stack),
            Self::check_role_coverage(stack),
            Self::check_mapping_sources(stack),
            Self::check_path_placeholders(stack),
            Self::check_response_coverage(stack),
            Self::check_selection_patterns(stack),
            Self::check_route_authorization(stack),
            Self::check_forwarded_parameters(stack),
            Self::check_bucket_parameter(stack),
        ];

        for check in &checks {
            debug!(
                "{}: {} ({})",
                check.name,
                if check.passed { "passed" } else { "failed" },
                check.message
            );
        }

        ValidationReport::new(&stack.name, checks)
    }

    /// Gateway policy grants exactly the read-only S3 actions on all buckets
    fn check_gateway_policy(stack: &ProxyStack) -> Check {
        let policy = &stack.gateway.policy;
        let expected: BTreeSet<Action> = S3Action::read_only().into_iter().map(Action::from).collect();
        let granted = policy.granted_actions();
        let resources = policy.granted_resources();

        if granted != expected {
            let names: Vec<&str> = granted.iter().map(Action::as_str).collect();
            return Check::fail(GATEWAY_POLICY, format!("Unexpected actions: {}", names.join(", ")));
        }
        if resources.len() != 1 || !resources.contains(ALL_BUCKETS_ARN) {
            return Check::fail(
                GATEWAY_POLICY,
                format!("Expected resource {ALL_BUCKETS_ARN}, got {resources:?}"),
            );
        }

        Check::pass(GATEWAY_POLICY, "Read-only S3 access on all buckets")
    }

    fn check_role_trust(stack: &ProxyStack) -> Check {
        if stack.role.trusted_only_by(APIGATEWAY_SERVICE) {
            Check::pass(ROLE_TRUST, format!("Assumable only by {APIGATEWAY_SERVICE}"))
        } else {
            Check::fail(
                ROLE_TRUST,
                format!("Role trusts {}", stack.role.trusted_service),
            )
        }
    }

    /// Role policy allows each integration's action on its target bucket
    fn check_role_coverage(stack: &ProxyStack) -> Check {
        let missing: Vec<String> = stack
            .routes
            .iter()
            .filter(|route| {
                let integration = &route.integration;
                let bucket = match integration.target.bucket() {
                    Some(b) if !integration.target.bucket_is_dynamic() => b,
                    _ => "*",
                };
                let resource = match integration.operation {
                    S3Operation::GetObject => object_arn(bucket, "*"),
                    S3Operation::ListObjects => bucket_arn(bucket),
                };
                !stack
                    .role
                    .policy
                    .allows(integration.operation.required_action(), &resource)
            })
            .map(|route| route.name.clone())
            .collect();

        if missing.is_empty() {
            Check::pass(ROLE_COVERAGE, "Role permits every backend call")
        } else {
            Check::fail(ROLE_COVERAGE, format!("Not permitted: {}", missing.join(", ")))
        }
    }

    fn check_mapping_sources(stack: &ProxyStack) -> Check {
        let undeclared: Vec<String> = stack
            .routes
            .iter()
            .flat_map(|route| {
                route
                    .integration
                    .request_mappings
                    .iter()
                    .filter(|m| !route.declares(&m.source))
                    .map(move |m| format!("{}: {}", route.name, m.source.method_expr()))
            })
            .collect();

        if undeclared.is_empty() {
            Check::pass(MAPPING_SOURCES, "All mapped parameters are declared")
        } else {
            Check::fail(MAPPING_SOURCES, format!("Undeclared: {}", undeclared.join(", ")))
        }
    }

    /// Every `{name}` in a path target is fed by `integration.request.path.<name>`
    fn check_path_placeholders(stack: &ProxyStack) -> Check {
        let unmapped: Vec<String> = stack
            .routes
            .iter()
            .flat_map(|route| {
                let integration = &route.integration;
                integration
                    .target
                    .placeholders()
                    .into_iter()
                    .filter(move |name| {
                        let target = RequestParameter::path(*name);
                        !integration.request_mappings.iter().any(|m| m.target == target)
                    })
                    .map(move |name| format!("{}: {{{name}}}", route.name))
            })
            .collect();

        if unmapped.is_empty() {
            Check::pass(PATH_PLACEHOLDERS, "Every path placeholder is mapped")
        } else {
            Check::fail(PATH_PLACEHOLDERS, format!("Unmapped: {}", unmapped.join(", ")))
        }
    }

    fn check_response_coverage(stack: &ProxyStack) -> Check {
        let uncovered: Vec<String> = stack
            .routes
            .iter()
            .flat_map(|route| {
                route
                    .integration
                    .responses
                    .iter()
                    .filter(|r| route.method_response(r.status_code).is_none())
                    .map(move |r| format!("{} {}", route.name, r.status_code))
            })
            .collect();

        if uncovered.is_empty() {
            Check::pass(RESPONSE_COVERAGE, "Integration responses have method responses")
        } else {
            Check::fail(
                RESPONSE_COVERAGE,
                format!("No method response for: {}", uncovered.join(", ")),
            )
        }
    }

    fn check_selection_patterns(stack: &ProxyStack) -> Check {
        let invalid: Vec<String> = stack
            .routes
            .iter()
            .flat_map(|route| {
                route.integration.responses.iter().filter_map(move |response| {
                    match response.selection_regex()? {
                        Ok(_) => None,
                        Err(e) => {
                            debug!("{} selection pattern rejected: {e}", route.name);
                            Some(format!(
                                "{} {} {:?}",
                                route.name,
                                response.status_code,
                                response.selection_pattern.as_deref().unwrap_or_default()
                            ))
                        }
                    }
                })
            })
            .collect();

        if invalid.is_empty() {
            Check::pass(SELECTION_PATTERNS, "Selection patterns compile")
        } else {
            Check::fail(SELECTION_PATTERNS, format!("Invalid: {}", invalid.join(", ")))
        }
    }

    fn check_route_authorization(stack: &ProxyStack) -> Check {
        let open: Vec<&str> = stack
            .routes
            .iter()
            .filter(|r| r.authorization != AuthorizationType::Iam)
            .map(|r| r.name.as_str())
            .collect();

        if open.is_empty() {
            Check::pass(ROUTE_AUTHORIZATION, "All routes require IAM")
        } else {
            Check::fail(ROUTE_AUTHORIZATION, format!("Unauthenticated: {}", open.join(", ")))
        }
    }

    /// Required path and query parameters should reach the backend
    fn check_forwarded_parameters(stack: &ProxyStack) -> Check {
        let unused: BTreeSet<String> = stack
            .routes
            .iter()
            .flat_map(unforwarded_parameters)
            .collect();

        if unused.is_empty() {
            Check::pass(FORWARDED_PARAMETERS, "Every required parameter is forwarded")
        } else {
            let names: Vec<String> = unused.into_iter().collect();
            Check::warn(
                FORWARDED_PARAMETERS,
                format!("Required but unused: {}", names.join(", ")),
            )
        }
    }

    /// A `{bucket}` path parameter should select the bucket
    fn check_bucket_parameter(stack: &ProxyStack) -> Check {
        let ignored: Vec<String> = stack
            .routes
            .iter()
            .filter(|r| r.path.params().contains(&BUCKET_PARAM))
            .filter(|r| !r.integration.target.bucket_is_dynamic())
            .map(|r| {
                format!(
                    "{} -> {}",
                    r.name,
                    r.integration.target.bucket().unwrap_or("?")
                )
            })
            .collect();

        if ignored.is_empty() {
            Check::pass(BUCKET_PARAMETER, "Bucket taken from the request path")
        } else {
            Check::warn(BUCKET_PARAMETER, format!("Fixed bucket: {}", ignored.join(", ")))
        }
    }
}

/// Required path/query parameters of `route` that no mapping forwards.
/// Headers are checked by the gateway and not expected downstream.
fn unforwarded_parameters(route: &RouteDefinition) -> Vec<String> {
    route
        .required_parameters()
        .filter(|p| p.location != ParameterLocation::Header)
        .filter(|p| !route.integration.forwards(p))
        .map(|p| format!("{}.{}", route.name, p.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::models::{IntegrationResponse, ParameterMapping, RequestParameter};
    use crate::stack::definition::{GET_ROUTE, LIST_ROUTE};

    fn stack() -> ProxyStack {
        ProxyStack::from_config(&StackConfig::default()).unwrap()
    }

    fn route_mut<'a>(stack: &'a mut ProxyStack, name: &str) -> &'a mut RouteDefinition {
        stack.routes.iter_mut().find(|r| r.name == name).unwrap()
    }

    fn find_check<'a>(report: &'a ValidationReport, name: &str) -> &'a Check {
        report.checks.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn test_default_stack_passes_with_warnings() {
        let report = StackValidator::validate(&stack());

        assert!(report.passed());
        assert_eq!(report.errors().count(), 0);
        let warnings: Vec<&str> = report.warnings().map(|c| c.name.as_str()).collect();
        assert_eq!(warnings, vec![FORWARDED_PARAMETERS, BUCKET_PARAMETER]);
        assert!(!report.strict(true).passed());
    }

    #[test]
    fn test_unused_parameters_reported() {
        let report = StackValidator::validate(&stack());
        let check = find_check(&report, FORWARDED_PARAMETERS);

        assert!(check.message.contains("GetObject.cognitoId"));
        assert!(check.message.contains("ListObjects.bucket"));
        assert!(!check.message.contains("Content-Type"));
    }

    #[test]
    fn test_fixed_bucket_flagged() {
        let report = StackValidator::validate(&stack());
        let check = find_check(&report, BUCKET_PARAMETER);
        assert!(!check.passed);
        assert!(check.message.contains("GetObject -> test-mediahstf"));
    }

    #[test]
    fn test_bucket_from_path_clears_get_warning() {
        let config = StackConfig {
            bucket_from_path: true,
            ..StackConfig::default()
        };
        let report = StackValidator::validate(&ProxyStack::from_config(&config).unwrap());
        let check = find_check(&report, BUCKET_PARAMETER);

        // The list route still addresses the bucket by subdomain
        assert!(!check.message.contains("GetObject"));
        assert!(check.message.contains("ListObjects"));
        assert!(find_check(&report, ROLE_COVERAGE).passed);
    }

    #[test]
    fn test_open_route_fails() {
        let mut stack = stack();
        route_mut(&mut stack, LIST_ROUTE).authorization = AuthorizationType::None;

        let report = StackValidator::validate(&stack);
        assert!(!report.passed());
        assert!(find_check(&report, ROUTE_AUTHORIZATION).is_error());
    }

    #[test]
    fn test_undeclared_mapping_fails() {
        let mut stack = stack();
        let route = route_mut(&mut stack, GET_ROUTE);
        route.integration = route
            .integration
            .clone()
            .map(ParameterMapping::passthrough(RequestParameter::query("versionId")));

        let report = StackValidator::validate(&stack);
        assert!(!find_check(&report, MAPPING_SOURCES).passed);
        assert!(!report.passed());
    }

    #[test]
    fn test_response_without_method_response_fails() {
        let mut stack = stack();
        let route = route_mut(&mut stack, GET_ROUTE);
        route.integration = route
            .integration
            .clone()
            .response(IntegrationResponse::selected_by(429, "429"));

        let report = StackValidator::validate(&stack);
        let check = find_check(&report, RESPONSE_COVERAGE);
        assert!(check.message.contains("GetObject 429"));
    }

    #[test]
    fn test_unmapped_path_placeholder_fails() {
        let mut stack = stack();
        let route = route_mut(&mut stack, GET_ROUTE);
        route
            .integration
            .request_mappings
            .retain(|m| m.target != RequestParameter::path("key"));

        let report = StackValidator::validate(&stack);
        let placeholders = find_check(&report, PATH_PLACEHOLDERS);
        assert!(placeholders.is_error());
        assert_eq!(placeholders.message, "Unmapped: GetObject: {key}");
        assert!(!report.passed());
    }

    #[test]
    fn test_bucket_placeholder_needs_mapping() {
        let config = StackConfig {
            bucket_from_path: true,
            ..StackConfig::default()
        };
        let mut stack = ProxyStack::from_config(&config).unwrap();
        assert!(find_check(&StackValidator::validate(&stack), PATH_PLACEHOLDERS).passed);

        route_mut(&mut stack, GET_ROUTE)
            .integration
            .request_mappings
            .retain(|m| m.target != RequestParameter::path(BUCKET_PARAM));
        let report = StackValidator::validate(&stack);
        assert!(find_check(&report, PATH_PLACEHOLDERS).message.contains("{bucket}"));
    }

    #[test]
    fn test_invalid_selection_pattern_fails() {
        let mut stack = stack();
        route_mut(&mut stack, LIST_ROUTE).integration.responses[3].selection_pattern =
            Some(r"5\d{2".to_string());

        let report = StackValidator::validate(&stack);
        let patterns = find_check(&report, SELECTION_PATTERNS);
        assert!(patterns.is_error());
        assert!(patterns.message.contains("ListObjects 500"));
        assert!(!report.passed());
    }

    #[test]
    fn test_role_trust_and_coverage() {
        let mut stack = stack();
        stack.role.trusted_service = "lambda.amazonaws.com".to_string();
        stack.role.policy.statements.clear();

        let report = StackValidator::validate(&stack);
        assert!(!find_check(&report, ROLE_TRUST).passed);
        assert!(!find_check(&report, ROLE_COVERAGE).passed);
    }

    #[test]
    fn test_gateway_policy_drift() {
        let mut stack = stack();
        stack.gateway.policy.statements[0].actions.pop();

        let report = StackValidator::validate(&stack);
        assert!(!find_check(&report, GATEWAY_POLICY).passed);
    }
}
