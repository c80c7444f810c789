//! Report Boundary
//!
//! Renders an [`Analysis`] for people. Nothing here feeds back into the
//! analysis stages.

pub mod mermaid;

pub use mermaid::mermaid_erd;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::analysis::{Analysis, RoleType, Severity};
use crate::graph::SchemaGraph;

/// Headline numbers of one analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaReport {
    pub fingerprint: String,
    pub table_count: usize,
    pub relationship_count: usize,
    pub roles: BTreeMap<RoleType, usize>,
    pub severities: BTreeMap<Severity, usize>,
    pub pattern_count: usize,
    pub diagnostic_count: usize,
}

impl SchemaReport {
    pub fn new(graph: &SchemaGraph, analysis: &Analysis) -> Self {
        let mut roles = BTreeMap::new();
        for result in &analysis.roles {
            *roles.entry(result.primary()).or_insert(0) += 1;
        }
        let mut severities = BTreeMap::new();
        for tension in &analysis.tensions {
            *severities.entry(tension.severity).or_insert(0) += 1;
        }

        Self {
            fingerprint: analysis.fingerprint.clone(),
            table_count: graph.table_count(),
            relationship_count: graph.relationships().count(),
            roles,
            severities,
            pattern_count: analysis.patterns.len(),
            diagnostic_count: analysis.diagnostics.len(),
        }
    }
}

/// Markdown report: summary, tensions (ranked), patterns, roles, diagnostics
pub fn render_markdown(graph: &SchemaGraph, analysis: &Analysis) -> String {
    let summary = SchemaReport::new(graph, analysis);
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "# Schema report\n");
    let _ = writeln!(
        out,
        "{} tables, {} relationships, {} patterns, {} tensions (fingerprint `{}`)\n",
        summary.table_count,
        summary.relationship_count,
        summary.pattern_count,
        analysis.tensions.len(),
        &summary.fingerprint[..summary.fingerprint.len().min(12)]
    );

    let _ = writeln!(out, "## Design tensions\n");
    if analysis.tensions.is_empty() {
        let _ = writeln!(out, "None for the stated intent.\n");
    }
    for (i, tension) in analysis.tensions.iter().enumerate() {
        let _ = writeln!(out, "{}. **[{}]** {}", i + 1, tension.severity, tension.description);
        for alternative in &tension.alternatives {
            let _ = writeln!(out, "   - {} _(effort: {})_", alternative.description, alternative.effort);
        }
    }

    let _ = writeln!(out, "\n## Patterns\n");
    for pattern in &analysis.patterns {
        let tables: Vec<String> = pattern.tables.iter().map(|t| t.to_string()).collect();
        let _ = writeln!(
            out,
            "- `{}` on {} ({:.0}%)",
            pattern.pattern_type,
            tables.join(", "),
            pattern.confidence * 100.0
        );
    }

    let _ = writeln!(out, "\n## Roles\n");
    let _ = writeln!(out, "| table | role | confidence |");
    let _ = writeln!(out, "|---|---|---|");
    for result in &analysis.roles {
        let _ = writeln!(
            out,
            "| {} | {} | {:.2} |",
            result.table,
            result.primary(),
            result.confidence()
        );
    }

    if !analysis.diagnostics.is_empty() {
        let _ = writeln!(out, "\n## Diagnostics\n");
        for item in analysis.diagnostics.all() {
            let _ = writeln!(out, "- {}", item.to_string().replace('\n', "\n  "));
        }
    }

    out
}
