//! IAM policy documents
//!
//! Typed policy statements shared by the gateway resource policy and the
//! execution role.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// IAM policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// Resource ARN covering every S3 bucket and object
pub const ALL_BUCKETS_ARN: &str = "arn:aws:s3:::*";

/// Statement effect
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

/// S3 actions the proxy needs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum S3Action {
    GetObject,
    ListBucket,
    ListAllMyBuckets,
}

impl S3Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            S3Action::GetObject => "s3:GetObject",
            S3Action::ListBucket => "s3:ListBucket",
            S3Action::ListAllMyBuckets => "s3:ListAllMyBuckets",
        }
    }

    /// Read/list actions granted on all buckets
    pub fn read_only() -> Vec<S3Action> {
        vec![
            S3Action::GetObject,
            S3Action::ListBucket,
            S3Action::ListAllMyBuckets,
        ]
    }
}

/// Policy action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Action {
    S3(S3Action),
    AssumeRole,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::S3(action) => action.as_str(),
            Action::AssumeRole => "sts:AssumeRole",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "s3:GetObject" => Some(Action::S3(S3Action::GetObject)),
            "s3:ListBucket" => Some(Action::S3(S3Action::ListBucket)),
            "s3:ListAllMyBuckets" => Some(Action::S3(S3Action::ListAllMyBuckets)),
            "sts:AssumeRole" => Some(Action::AssumeRole),
            _ => None,
        }
    }
}

impl From<S3Action> for Action {
    fn from(action: S3Action) -> Self {
        Action::S3(action)
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

impl TryFrom<String> for Action {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Action::from_str(&value).ok_or_else(|| format!("unsupported policy action: {value}"))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statement principal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Principal {
    #[serde(rename = "Service")]
    Service(String),
    #[serde(rename = "AWS")]
    Aws(String),
}

/// Single policy statement
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyStatement {
    #[serde(rename = "Sid", skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    #[serde(rename = "Effect")]
    pub effect: Effect,

    #[serde(rename = "Principal", skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,

    #[serde(rename = "Action")]
    pub actions: Vec<Action>,

    #[serde(rename = "Resource", default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
}

impl PolicyStatement {
    /// Create an allow statement
    pub fn allow() -> Self {
        Self::default()
    }

    /// Read/list access on every bucket
    pub fn s3_read_all_buckets() -> Self {
        Self::allow()
            .actions(S3Action::read_only())
            .resource(ALL_BUCKETS_ARN)
    }

    /// Trust statement letting an AWS service assume a role
    pub fn assume_role_by(service: impl Into<String>) -> Self {
        Self::allow()
            .action(Action::AssumeRole)
            .principal(Principal::Service(service.into()))
    }

    pub fn action(mut self, action: impl Into<Action>) -> Self {
        let action = action.into();
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
        self
    }

    pub fn actions<I, A>(self, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Action>,
    {
        actions.into_iter().fold(self, |stmt, a| stmt.action(a))
    }

    pub fn resource(mut self, arn: impl Into<String>) -> Self {
        self.resources.push(arn.into());
        self
    }

    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Whether this statement names `action` on `resource`
    pub fn matches(&self, action: Action, resource: &str) -> bool {
        self.actions.contains(&action)
            && (self.resources.is_empty()
                || self.resources.iter().any(|r| arn_matches(r, resource)))
    }
}

/// Policy document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,

    #[serde(rename = "Statement")]
    pub statements: Vec<PolicyStatement>,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statements: Vec::new(),
        }
    }
}

impl PolicyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statement(mut self, statement: PolicyStatement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Evaluate `action` on `resource`: an explicit deny wins over any allow
    pub fn allows(&self, action: impl Into<Action>, resource: &str) -> bool {
        let action = action.into();
        let mut allowed = false;
        for stmt in self.statements.iter().filter(|s| s.matches(action, resource)) {
            match stmt.effect {
                Effect::Deny => return false,
                Effect::Allow => allowed = true,
            }
        }
        allowed
    }

    /// Every action granted by an allow statement, regardless of resource
    pub fn granted_actions(&self) -> BTreeSet<Action> {
        self.statements
            .iter()
            .filter(|s| s.effect == Effect::Allow)
            .flat_map(|s| s.actions.iter().copied())
            .collect()
    }

    /// Every resource named by an allow statement
    pub fn granted_resources(&self) -> BTreeSet<&str> {
        self.statements
            .iter()
            .filter(|s| s.effect == Effect::Allow)
            .flat_map(|s| s.resources.iter().map(String::as_str))
            .collect()
    }
}

/// Match an ARN against a pattern where `*` spans any run of characters and
/// `?` matches exactly one
pub fn arn_matches(pattern: &str, value: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = value.chars().collect();

    let (mut pi, mut vi) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while vi < v.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == v[vi]) {
            pi += 1;
            vi += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, vi));
            pi += 1;
        } else if let Some((sp, sv)) = star {
            pi = sp + 1;
            vi = sv + 1;
            star = Some((sp, sv + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}

/// ARN of an object inside a bucket
pub fn object_arn(bucket: &str, key: &str) -> String {
    format!("arn:aws:s3:::{bucket}/{key}")
}

/// ARN of a bucket
pub fn bucket_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{bucket}")
}
