//! Incoming request model

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;

use super::ProxyError;
use crate::models::HttpMethod;

/// A request as it arrives at the gateway
#[derive(Clone, Debug, Serialize)]
pub struct ProxyRequest {
    pub method: HttpMethod,
    /// Raw (still percent-encoded) path
    pub path: String,
    /// Decoded query parameters; the last occurrence wins
    pub query: BTreeMap<String, String>,
    pub headers: Vec<(String, String)>,
}

impl ProxyRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            headers: Vec::new(),
        }
    }

    /// Parse a request target such as `/a/b/c?prefix=x`
    pub fn parse(method: HttpMethod, target: &str) -> Result<Self, ProxyError> {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        if !path.starts_with('/') {
            return Err(ProxyError::InvalidRequest(format!(
                "path must start with '/': {target}"
            )));
        }

        let mut request = Self::new(method, path);
        for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            request
                .query
                .insert(decode_component(name)?, decode_component(value)?);
        }

        Ok(request)
    }

    /// `GET` request for a target
    pub fn get(target: &str) -> Result<Self, ProxyError> {
        Self::parse(HttpMethod::Get, target)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup (first occurrence)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Percent-decoded path segments
    pub fn path_segments(&self) -> Result<Vec<String>, ProxyError> {
        let trimmed = self.path.trim_start_matches('/');
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        trimmed.split('/').map(decode_component).collect()
    }
}

fn decode_component(raw: &str) -> Result<String, ProxyError> {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|e| ProxyError::InvalidRequest(format!("bad percent-encoding in '{raw}': {e}")))
}

/// Parse a `Name: value` header argument
pub fn parse_header_arg(arg: &str) -> Result<(String, String)> {
    let (name, value) = arg
        .split_once(':')
        .with_context(|| format!("Invalid header '{arg}': expected 'Name: value'"))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Invalid header '{arg}': empty name");
    }
    Ok((name.to_string(), value.trim().to_string()))
}
