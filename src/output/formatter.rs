//! Output formatters for templates, reports and resolutions
//!
//! Provides table, JSON and YAML output formats.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write;

use crate::proxy::{ProxyError, ProxyResponse, Resolution};
use crate::stack::{ProxyStack, Template};
use crate::validate::ValidationReport;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Yaml,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "yaml" | "yml" => Some(OutputFormat::Yaml),
            _ => None,
        }
    }
}

/// Formatter for command output
pub struct ReportFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ReportFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn serialize<T: Serialize>(&self, value: &T) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string(value).context("Failed to serialize JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(value).context("Failed to serialize YAML"),
            OutputFormat::JsonPretty | OutputFormat::Table => {
                serde_json::to_string_pretty(value).context("Failed to serialize JSON")
            }
        }
    }

    /// Template output; tables fall back to pretty JSON
    pub fn format_template(&self, template: &Template) -> Result<String> {
        match self.format {
            OutputFormat::Yaml => template.to_yaml(),
            OutputFormat::Json => template.to_json(),
            OutputFormat::JsonPretty | OutputFormat::Table => template.to_json_pretty(),
        }
    }

    pub fn format_report(&self, report: &ValidationReport) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(report.format_table()),
            _ => self.serialize(report),
        }
    }

    /// Accepted request, with the mapped response when a backend status was given
    pub fn format_resolution(
        &self,
        resolution: &Resolution,
        response: Option<&ProxyResponse>,
    ) -> Result<String> {
        if self.format != OutputFormat::Table {
            #[derive(Serialize)]
            struct Output<'a> {
                #[serde(flatten)]
                resolution: &'a Resolution,
                #[serde(skip_serializing_if = "Option::is_none")]
                response: Option<&'a ProxyResponse>,
            }
            return self.serialize(&Output {
                resolution,
                response,
            });
        }

        let call = &resolution.call;
        let mut output = String::new();
        let _ = writeln!(output, "{} {}", self.paint("✓ ACCEPTED", "32"), resolution.label);
        let _ = writeln!(output, "  Route:       {}", resolution.route);
        if let Some(identity) = &resolution.identity {
            let _ = writeln!(output, "  Identity:    {identity}");
        }
        for (name, value) in &resolution.path_params {
            let _ = writeln!(output, "  Path param:  {name} = {value}");
        }
        let _ = writeln!(output, "  Operation:   {}", call.operation.name());
        let _ = writeln!(output, "  Bucket:      {}", call.bucket);
        if let Some(key) = &call.key {
            let _ = writeln!(output, "  Key:         {key}");
        }
        for (name, value) in &call.query {
            let _ = writeln!(output, "  Query:       {name} = {value}");
        }
        let _ = writeln!(output, "  URI:         {}", call.uri);
        let _ = writeln!(output, "  Credentials: {}", call.credentials);

        if let Some(response) = response {
            let _ = writeln!(output, "  Response:    {}", response.status);
            if let Some(message) = &response.message {
                let _ = writeln!(output, "    {message}");
            }
            for (name, value) in &response.headers {
                let _ = writeln!(output, "    {name}: {value}");
            }
        }

        Ok(output)
    }

    /// Rejected request, shaped like the gateway's error body
    pub fn format_rejection(&self, error: &ProxyError) -> String {
        if self.format != OutputFormat::Table {
            let body = serde_json::json!({
                "status": error.status_code(),
                "errorType": error.error_type(),
                "message": error.to_string(),
            });
            return self.serialize(&body).unwrap_or_else(|_| error.to_string());
        }

        format!(
            "{} {} {}\n  {}\n",
            self.paint("✗ REJECTED", "31"),
            error.status_code(),
            error.error_type(),
            error
        )
    }

    pub fn format_routes(&self, stack: &ProxyStack, detailed: bool) -> Result<String> {
        if self.format != OutputFormat::Table {
            return self.serialize(&stack.routes);
        }

        let mut output = String::new();
        let _ = writeln!(output, "\nRoutes of {} ({}):\n", stack.gateway.name, stack.name);

        for route in &stack.routes {
            let _ = writeln!(
                output,
                "  {:40} {:8} -> {}",
                route.label(),
                route.authorization.as_str(),
                route.integration.operation.name()
            );

            if detailed {
                for p in &route.parameters {
                    let _ = writeln!(
                        output,
                        "      {} {}",
                        if p.required { "required" } else { "optional" },
                        p.parameter.method_expr()
                    );
                }
                for m in &route.integration.request_mappings {
                    let _ = writeln!(
                        output,
                        "      map {} <- {}",
                        m.target.integration_expr(),
                        m.source.method_expr()
                    );
                }
                let _ = writeln!(
                    output,
                    "      uri {}:{}",
                    route.integration.target.service_host(),
                    route.integration.target.api_path()
                );
                let statuses: Vec<String> = route
                    .integration
                    .responses
                    .iter()
                    .map(|r| match &r.selection_pattern {
                        Some(pattern) => format!("{} ({pattern})", r.status_code),
                        None => format!("{} (default)", r.status_code),
                    })
                    .collect();
                let _ = writeln!(output, "      responses {}", statuses.join(", "));
                let _ = writeln!(output);
            }
        }

        Ok(output)
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.colorize {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::proxy::{ProxyRequest, RequestResolver};
    use crate::stack::TemplateSynthesizer;
    use crate::validate::StackValidator;

    fn stack() -> ProxyStack {
        ProxyStack::from_config(&StackConfig::default()).unwrap()
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("YAML"), Some(OutputFormat::Yaml));
        assert_eq!(OutputFormat::from_str("json-pretty"), Some(OutputFormat::JsonPretty));
        assert_eq!(OutputFormat::from_str("csv"), None);
    }

    #[test]
    fn test_format_template() {
        let template = TemplateSynthesizer::synthesize(&stack());
        let yaml = ReportFormatter::new(OutputFormat::Yaml)
            .format_template(&template)
            .unwrap();
        assert!(yaml.contains("AWS::ApiGateway::Method"));

        let json = ReportFormatter::new(OutputFormat::Json)
            .format_template(&template)
            .unwrap();
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_format_report_json() {
        let report = StackValidator::validate(&stack());
        let json = ReportFormatter::new(OutputFormat::Json)
            .format_report(&report)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["checks"].as_array().unwrap().len(), 10);
        assert_eq!(value["checks"][8]["severity"], "warning");
        assert_eq!(value["checks"][8]["name"], "Forwarded parameters");
    }

    #[test]
    fn test_format_routes_table() {
        let output = ReportFormatter::new(OutputFormat::Table)
            .format_routes(&stack(), true)
            .unwrap();
        assert!(output.contains("GET /{bucket}/{cognitoId}/{key}"));
        assert!(output.contains("optional method.request.querystring.prefix"));
        assert!(output.contains("uri s3:path/test-mediahstf/{key}"));
    }

    #[test]
    fn test_format_resolution_and_rejection() {
        let resolver = RequestResolver::new(stack(), "us-east-1").unwrap();
        let request = ProxyRequest::get("/b/t/k").unwrap();
        let err = resolver.resolve(&request).unwrap_err();

        let formatter = ReportFormatter::new(OutputFormat::Table).no_color();
        let text = formatter.format_rejection(&err);
        assert!(text.starts_with("✗ REJECTED 403 MissingAuthenticationTokenException"));

        let json = ReportFormatter::new(OutputFormat::Json).format_rejection(&err);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], 403);
    }

    #[test]
    fn test_format_resolution_json() {
        let resolver = RequestResolver::new(stack(), "us-east-1").unwrap();
        let request = ProxyRequest::get("/b/t/a.csv")
            .unwrap()
            .header(
                "Authorization",
                "AWS4-HMAC-SHA256 Credential=AKID/20240101/us-east-1/execute-api/aws4_request, \
                 SignedHeaders=host, Signature=0000000000000000000000000000000000000000000000000000000000000000",
            )
            .header("Content-Type", "text/csv");
        let resolution = resolver.resolve(&request).unwrap();

        let json = ReportFormatter::new(OutputFormat::Json)
            .format_resolution(&resolution, None)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["route"], "GetObject");
        assert_eq!(value["call"]["key"], "a.csv");
        assert!(value.get("response").is_none());

        let response = resolver.map_response(
            &resolution,
            &crate::proxy::BackendResponse::new(200).header("Content-Type", "text/csv"),
        );
        let json = ReportFormatter::new(OutputFormat::Json)
            .format_resolution(&resolution, Some(&response))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["response"]["status"], 200);
        assert_eq!(value["response"]["headers"]["Content-Type"], "text/csv");
        assert!(value["response"].get("message").is_none());

        let table = ReportFormatter::new(OutputFormat::Table)
            .no_color()
            .format_resolution(&resolution, None)
            .unwrap();
        assert!(table.contains("Bucket:      test-mediahstf"));
    }
}
