//! Route models
//!
//! Path templates, method request parameters and method responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use super::integration::BackendIntegration;

/// Path template errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Path template must start with '/': {0}")]
    MissingLeadingSlash(String),

    #[error("Empty segment in path template: {0}")]
    EmptySegment(String),

    #[error("Malformed parameter segment: {0}")]
    MalformedParameter(String),

    #[error("Duplicate path parameter: {0}")]
    DuplicateParameter(String),
}

/// HTTP method
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "HEAD" => Some(HttpMethod::Head),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "OPTIONS" => Some(HttpMethod::Options),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method authorization type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationType {
    None,
    Iam,
}

impl AuthorizationType {
    /// CloudFormation value
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationType::None => "NONE",
            AuthorizationType::Iam => "AWS_IAM",
        }
    }
}

/// Where a request parameter lives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    QueryString,
    Header,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::QueryString => "querystring",
            ParameterLocation::Header => "header",
        }
    }
}

/// A named request parameter, e.g. path `bucket` or header `Content-Type`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestParameter {
    pub location: ParameterLocation,
    pub name: String,
}

impl RequestParameter {
    pub fn new(location: ParameterLocation, name: impl Into<String>) -> Self {
        Self {
            location,
            name: name.into(),
        }
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::new(ParameterLocation::Path, name)
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::new(ParameterLocation::QueryString, name)
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self::new(ParameterLocation::Header, name)
    }

    /// `method.request.<location>.<name>`
    pub fn method_expr(&self) -> String {
        format!("method.request.{}.{}", self.location.as_str(), self.name)
    }

    /// `integration.request.<location>.<name>`
    pub fn integration_expr(&self) -> String {
        format!("integration.request.{}.{}", self.location.as_str(), self.name)
    }
}

impl fmt::Display for RequestParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.location.as_str(), self.name)
    }
}

/// Method request parameter with its required flag
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodParameter {
    pub parameter: RequestParameter,
    pub required: bool,
}

impl MethodParameter {
    pub fn required(parameter: RequestParameter) -> Self {
        Self {
            parameter,
            required: true,
        }
    }

    pub fn optional(parameter: RequestParameter) -> Self {
        Self {
            parameter,
            required: false,
        }
    }
}

/// Path template segment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSegment {
    Literal(String),
    Param(String),
}

impl PathSegment {
    /// Segment as written in the template (`{name}` for parameters)
    pub fn path_part(&self) -> String {
        match self {
            PathSegment::Literal(s) => s.clone(),
            PathSegment::Param(name) => format!("{{{name}}}"),
        }
    }
}

/// Route path template such as `/{bucket}/{cognitoId}/{key}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTemplate {
    segments: Vec<PathSegment>,
}

impl PathTemplate {
    /// Parse a template; `/` alone is the root
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let rest = template
            .strip_prefix('/')
            .ok_or_else(|| TemplateError::MissingLeadingSlash(template.to_string()))?;

        let mut segments = Vec::new();
        if rest.is_empty() {
            return Ok(Self { segments });
        }

        for raw in rest.split('/') {
            if raw.is_empty() {
                return Err(TemplateError::EmptySegment(template.to_string()));
            }

            let segment = match (raw.strip_prefix('{'), raw.ends_with('}')) {
                (Some(inner), true) => {
                    let name = &inner[..inner.len() - 1];
                    if name.is_empty() || name.contains(&['{', '}'][..]) {
                        return Err(TemplateError::MalformedParameter(raw.to_string()));
                    }
                    PathSegment::Param(name.to_string())
                }
                (None, false) if !raw.contains(&['{', '}'][..]) => PathSegment::Literal(raw.to_string()),
                _ => return Err(TemplateError::MalformedParameter(raw.to_string())),
            };

            if let PathSegment::Param(name) = &segment {
                if segments
                    .iter()
                    .any(|s| matches!(s, PathSegment::Param(n) if n == name))
                {
                    return Err(TemplateError::DuplicateParameter(name.clone()));
                }
            }
            segments.push(segment);
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Parameter names in path order
    pub fn params(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                PathSegment::Param(name) => Some(name.as_str()),
                PathSegment::Literal(_) => None,
            })
            .collect()
    }

    /// Every ancestor template including this one, shortest first (root excluded)
    pub fn prefixes(&self) -> Vec<PathTemplate> {
        (1..=self.segments.len())
            .map(|n| PathTemplate {
                segments: self.segments[..n].to_vec(),
            })
            .collect()
    }

    /// Match decoded path segments, binding parameters.
    ///
    /// With `capture_remainder` the final parameter absorbs every trailing
    /// segment, joined with `/`.
    pub fn match_segments(
        &self,
        path: &[String],
        capture_remainder: bool,
    ) -> Option<BTreeMap<String, String>> {
        let n = self.segments.len();
        let tail_is_param = matches!(self.segments.last(), Some(PathSegment::Param(_)));

        if path.len() < n || (path.len() > n && !(capture_remainder && tail_is_param)) {
            return None;
        }

        let mut bindings = BTreeMap::new();
        for (i, segment) in self.segments.iter().enumerate() {
            let is_tail = i + 1 == n;
            match segment {
                PathSegment::Literal(lit) => {
                    if &path[i] != lit {
                        return None;
                    }
                }
                PathSegment::Param(name) => {
                    let value = if is_tail && capture_remainder {
                        path[i..].join("/")
                    } else {
                        path[i].clone()
                    };
                    if value.is_empty() {
                        return None;
                    }
                    bindings.insert(name.clone(), value);
                }
            }
        }

        Some(bindings)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment.path_part())?;
        }
        Ok(())
    }
}

/// Declared method response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodResponse {
    pub status_code: u16,
    /// Response headers the method may return
    pub headers: Vec<String>,
}

impl MethodResponse {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>) -> Self {
        self.headers.push(name.into());
        self
    }
}

/// `method.response.header.<name>`
pub fn method_response_header_expr(name: &str) -> String {
    format!("method.response.header.{name}")
}

/// A routed endpoint: path + method, its request contract and backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Route name, e.g. `ListObjects`
    pub name: String,
    pub method: HttpMethod,
    pub path: PathTemplate,
    pub authorization: AuthorizationType,
    pub parameters: Vec<MethodParameter>,
    pub method_responses: Vec<MethodResponse>,
    pub integration: BackendIntegration,
    /// Trailing path parameter captures nested key paths
    #[serde(default)]
    pub capture_remainder: bool,
}

impl RouteDefinition {
    /// Parameters that must be present on the incoming request
    pub fn required_parameters(&self) -> impl Iterator<Item = &RequestParameter> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| &p.parameter)
    }

    /// Whether a method parameter is declared (required or optional)
    pub fn declares(&self, parameter: &RequestParameter) -> bool {
        self.parameters.iter().any(|p| &p.parameter == parameter)
    }

    pub fn method_response(&self, status_code: u16) -> Option<&MethodResponse> {
        self.method_responses
            .iter()
            .find(|r| r.status_code == status_code)
    }

    /// `GET /{bucket}/{cognitoId}` style label
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}
