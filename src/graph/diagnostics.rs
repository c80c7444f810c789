//! Diagnostics
//!
//! Collects non-fatal warnings raised while building the graph and while
//! running the analysis stages. Dangling references and isolated rule
//! failures end up here instead of aborting the run.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::QualifiedName;
use crate::error::DetectionError;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Foreign key target table not present in the graph
    DanglingForeignKey,
    /// A role rule failed and its contribution was dropped
    RoleRuleFailed,
    /// A pattern rule failed and its contribution was dropped
    PatternRuleFailed,
    /// A tension rule failed and its contribution was dropped
    TensionRuleFailed,
    /// Foreign key column list does not match its target column list
    ForeignKeyArityMismatch,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DanglingForeignKey => "W001",
            Self::RoleRuleFailed => "W002",
            Self::PatternRuleFailed => "W003",
            Self::TensionRuleFailed => "W004",
            Self::ForeignKeyArityMismatch => "W005",
        }
    }

    pub fn level(&self) -> DiagnosticLevel {
        match self {
            Self::DanglingForeignKey | Self::ForeignKeyArityMismatch => DiagnosticLevel::Warning,
            Self::RoleRuleFailed | Self::PatternRuleFailed | Self::TensionRuleFailed => {
                DiagnosticLevel::Error
            }
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Level
// =============================================================================

/// How much a diagnostic reduces confidence in the results
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Table the diagnostic is about, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<QualifiedName>,
    pub code: DiagnosticCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(table: Option<QualifiedName>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            table,
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn level(&self) -> DiagnosticLevel {
        self.code.level()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.code.level(), self.message)?;
        if let Some(table) = &self.table {
            write!(f, " ({})", table)?;
        }
        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }
        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    pub fn dangling_foreign_key(&mut self, table: &QualifiedName, fk_name: &str, target: &QualifiedName) {
        self.push(
            DiagnosticItem::new(
                Some(table.clone()),
                DiagnosticCode::DanglingForeignKey,
                format!("Foreign key '{}' references '{}', which is not in the schema graph", fk_name, target),
            )
            .with_context("Evidence depending on the target table is skipped"),
        );
    }

    pub fn arity_mismatch(&mut self, table: &QualifiedName, fk_name: &str, source: usize, target: usize) {
        self.push(DiagnosticItem::new(
            Some(table.clone()),
            DiagnosticCode::ForeignKeyArityMismatch,
            format!(
                "Foreign key '{}' maps {} column(s) onto {} target column(s)",
                fk_name, source, target
            ),
        ));
    }

    /// Record an isolated rule failure
    pub fn rule_failed(&mut self, code: DiagnosticCode, table: Option<&QualifiedName>, error: &DetectionError) {
        self.push(DiagnosticItem::new(table.cloned(), code, error.to_string()));
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.level() == DiagnosticLevel::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.level() == DiagnosticLevel::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.level() == DiagnosticLevel::Warning)
    }

    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn format_all(&self) -> String {
        self.items
            .iter()
            .map(|item| item.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_and_filters() {
        let mut diagnostics = Diagnostics::new();
        let table = QualifiedName::parse("public.orders");
        diagnostics.dangling_foreign_key(&table, "orders_user_fk", &QualifiedName::parse("auth.users"));
        diagnostics.rule_failed(
            DiagnosticCode::PatternRuleFailed,
            Some(&table),
            &DetectionError::new("soft_delete", "boom"),
        );

        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.warnings().count(), 1);
        assert_eq!(diagnostics.with_code(DiagnosticCode::PatternRuleFailed).count(), 1);
    }

    #[test]
    fn test_display() {
        let item = DiagnosticItem::new(
            Some(QualifiedName::parse("public.orders")),
            DiagnosticCode::DanglingForeignKey,
            "missing target",
        )
        .with_context("skipped");

        let rendered = item.to_string();
        assert!(rendered.starts_with("[W001] warning: missing target (public.orders)"));
        assert!(rendered.contains("\n  - skipped"));
    }
}
