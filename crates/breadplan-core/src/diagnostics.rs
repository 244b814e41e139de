//! Diagnostics infrastructure for tracking non-fatal issues during planning.
//!
//! Several parts of the spec distinguish "hard error" from "warning with a
//! safe default": missing weekend labor becomes zero capacity rather than a
//! fatal error, route-enumeration filtering is reported rather than silently
//! discarded, and so on. [`Diagnostics`] is the common container those
//! call sites append to so the caller can inspect what happened after a
//! build completes, without every subsystem inventing its own warning list.
//!
//! # Example
//!
//! ```
//! use breadplan_core::diagnostics::{Diagnostics, Severity};
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning("labor_calendar", "no weekend entry for 2025-01-11, assuming zero capacity");
//! assert_eq!(diag.warning_count(), 1);
//! assert!(!diag.has_errors());
//! ```

use serde::Serialize;

/// Severity level for a diagnostic issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but handled with a documented default (e.g. zero weekend capacity).
    Warning,
    /// Could not complete the operation (e.g. missing critical weekday labor).
    Error,
}

/// A single diagnostic issue encountered while building or validating a plan.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Category for grouping, e.g. "labor_calendar", "route_enumeration", "demand".
    pub category: String,
    pub message: String,
    /// Optional entity reference (e.g. a location id or a demand key).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl DiagnosticIssue {
    pub fn new(severity: Severity, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }
        Ok(())
    }
}

/// Collection of diagnostic issues accumulated over a build or validation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    pub fn add_warning(&mut self, category: &str, message: impl Into<String>) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message.into()));
    }

    pub fn add_warning_with_entity(&mut self, category: &str, message: impl Into<String>, entity: &str) {
        self.issues.push(
            DiagnosticIssue::new(Severity::Warning, category, message.into()).with_entity(entity),
        );
    }

    pub fn add_error(&mut self, category: &str, message: impl Into<String>) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message.into()));
    }

    pub fn add_error_with_entity(&mut self, category: &str, message: impl Into<String>, entity: &str) {
        self.issues.push(
            DiagnosticIssue::new(Severity::Error, category, message.into()).with_entity(entity),
        );
    }

    pub fn warning_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == Severity::Warning).count()
    }

    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == Severity::Error).count()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn summary(&self) -> String {
        let warnings = self.warning_count();
        let errors = self.error_count();
        match (warnings, errors) {
            (0, 0) => "No issues".to_string(),
            (w, 0) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (0, e) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (w, e) => format!(
                "{} warning{}, {} error{}",
                w,
                if w == 1 { "" } else { "s" },
                e,
                if e == 1 { "" } else { "s" }
            ),
        }
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}
