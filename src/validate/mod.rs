//! Static shape validation of the proxy stack
//!
//! Runs named checks over a [`crate::stack::ProxyStack`] and collects them
//! into a [`ValidationReport`].

mod checks;

pub use checks::StackValidator;

use serde::Serialize;

/// Check severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Individual check result
#[derive(Clone, Debug, Serialize)]
pub struct Check {
    /// Check name
    pub name: String,

    pub severity: Severity,

    /// Whether check passed
    pub passed: bool,

    /// Result message
    pub message: String,
}

impl Check {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            severity: Severity::Error,
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            severity: Severity::Error,
            passed: false,
            message: message.into(),
        }
    }

    /// Failed check that does not fail the report unless strict
    pub fn warn(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::fail(name, message)
        }
    }

    pub fn is_error(&self) -> bool {
        !self.passed && self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        !self.passed && self.severity == Severity::Warning
    }
}

/// Outcome of validating a stack
#[derive(Clone, Debug, Serialize)]
pub struct ValidationReport {
    pub stack: String,
    pub strict: bool,
    pub checks: Vec<Check>,
}

impl ValidationReport {
    pub fn new(stack: impl Into<String>, checks: Vec<Check>) -> Self {
        Self {
            stack: stack.into(),
            strict: false,
            checks,
        }
    }

    /// Treat warnings as failures
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn errors(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| c.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| c.is_warning())
    }

    /// No error failed (and, when strict, no warning either)
    pub fn passed(&self) -> bool {
        self.errors().next().is_none() && !(self.strict && self.warnings().next().is_some())
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        let total = self.checks.len();
        let warnings = self.warnings().count();

        if passed == total {
            "All checks passed".to_string()
        } else {
            format!("{passed}/{total} checks passed, {warnings} warning(s)")
        }
    }

    /// Format as table
    pub fn format_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\n┌──────────────────────────────────────────────────────────────────────┐\n");
        output.push_str(&format!(
            "│ Validation: {:44} {:12} │\n",
            truncate(&self.stack, 44),
            if self.passed() { "✓ Passed" } else { "✗ Failed" }
        ));
        output.push_str("├──────────────────────────────────────────────────────────────────────┤\n");

        for check in &self.checks {
            let status = match (check.passed, check.severity) {
                (true, _) => "✓",
                (false, Severity::Warning) => "!",
                (false, Severity::Error) => "✗",
            };
            output.push_str(&format!(
                "│ {} {:26} {:39} │\n",
                status,
                truncate(&check.name, 26),
                truncate(&check.message, 39)
            ));
        }

        output.push_str("└──────────────────────────────────────────────────────────────────────┘\n");
        output.push_str(&format!("{}\n", self.summary()));

        output
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}
