//! Analysis Pipeline
//!
//! Owns the three stages, built once from an [`AnalysisConfig`]. Running it
//! is a pure function of the graph: identical graph and configuration give an
//! identical [`Analysis`].

use serde::Serialize;
use tracing::{debug, info};

use super::patterns::{DetectedPattern, PatternDetector};
use super::roles::{RoleDetector, RoleType, TableRoleResult};
use super::tensions::{DesignTension, TensionAnalyzer};
use crate::config::AnalysisConfig;
use crate::error::ConfigurationError;
use crate::graph::{Diagnostics, QualifiedName, SchemaGraph};
use crate::intent::Intent;

/// Everything one run produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    /// Fingerprint of the analyzed graph
    pub fingerprint: String,
    /// One result per table, in graph order
    pub roles: Vec<TableRoleResult>,
    pub patterns: Vec<DetectedPattern>,
    /// Ranked
    pub tensions: Vec<DesignTension>,
    /// Graph warnings followed by isolated rule failures
    pub diagnostics: Diagnostics,
}

impl Analysis {
    pub fn role_of(&self, table: &QualifiedName) -> Option<&TableRoleResult> {
        self.roles.iter().find(|r| &r.table == table)
    }

    pub fn primary_role(&self, table: &QualifiedName) -> Option<RoleType> {
        self.role_of(table).map(|r| r.primary())
    }

    pub fn patterns_on<'a>(&'a self, table: &'a QualifiedName) -> impl Iterator<Item = &'a DetectedPattern> + 'a {
        self.patterns.iter().filter(move |p| p.tables.contains(table))
    }
}

pub struct Analyzer {
    roles: RoleDetector,
    patterns: PatternDetector,
    tensions: TensionAnalyzer,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::from_stages(RoleDetector::new(), PatternDetector::new(), TensionAnalyzer::default())
    }
}

impl Analyzer {
    /// Validate the configuration and build every stage
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let roles = RoleDetector::new();
        let patterns = PatternDetector::from_config(&config);
        let tensions = TensionAnalyzer::new(config.intent);
        debug!(
            roles = ?roles.rule_names(),
            patterns = ?patterns.rule_names(),
            tensions = ?tensions.rule_ids(),
            "analyzer configured"
        );
        Ok(Self::from_stages(roles, patterns, tensions))
    }

    /// Assemble from explicitly built stages (custom rule lists)
    pub fn from_stages(roles: RoleDetector, patterns: PatternDetector, tensions: TensionAnalyzer) -> Self {
        Self {
            roles,
            patterns,
            tensions,
        }
    }

    pub fn intent(&self) -> &Intent {
        self.tensions.intent()
    }

    pub fn analyze(&self, graph: &SchemaGraph) -> Analysis {
        let mut diagnostics = graph.warnings().clone();

        let roles = self.roles.detect(graph, &mut diagnostics);
        debug!(tables = roles.len(), "roles detected");

        let patterns = self.patterns.detect(graph, &roles, &mut diagnostics);
        debug!(patterns = patterns.len(), "patterns detected");

        let tensions = self.tensions.analyze(graph, &patterns, &roles, &mut diagnostics);
        info!(
            tables = roles.len(),
            patterns = patterns.len(),
            tensions = tensions.len(),
            diagnostics = diagnostics.len(),
            "analysis complete"
        );

        Analysis {
            fingerprint: graph.fingerprint().to_string(),
            roles,
            patterns,
            tensions,
            diagnostics,
        }
    }
}

/// Run the full pipeline with default settings. No intent means balanced.
pub fn analyze_schema(graph: &SchemaGraph, intent: Option<Intent>) -> Result<Analysis, ConfigurationError> {
    let config = AnalysisConfig::default().with_intent(intent.unwrap_or_default());
    Ok(Analyzer::new(config)?.analyze(graph))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PatternType;
    use crate::graph::{Column, DataType, PrimaryKey, Table};
    use crate::intent::Priority;

    fn graph() -> SchemaGraph {
        SchemaGraph::new([Table::new("public.posts")
            .column(Column::new("id", DataType::from_raw("bigserial"), false))
            .column(Column::new("title", DataType::from_raw("text"), false))
            .column(Column::new("is_deleted", DataType::from_raw("boolean"), true))
            .primary_key(PrimaryKey::new("posts_pkey", ["id"]))])
        .unwrap()
    }

    #[test]
    fn test_default_intent_is_balanced() {
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        assert_eq!(analyzer.intent(), &Intent::balanced());
        assert!(analyze_schema(&graph(), None).is_ok());
    }

    #[test]
    fn test_invalid_config_fails_before_analysis() {
        let config = AnalysisConfig::default().with_threshold(PatternType::SoftDelete, -0.1);
        assert!(Analyzer::new(config).is_err());
    }

    #[test]
    fn test_disabled_pattern_is_skipped() {
        let config = AnalysisConfig::default().disable(PatternType::SoftDelete);
        let analysis = Analyzer::new(config).unwrap().analyze(&graph());
        assert!(analysis.patterns.is_empty());
        assert!(analysis.tensions.is_empty());
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let intent = Intent::balanced().with(Priority::ReadSimplicity, 0.9).unwrap();
        let first = analyze_schema(&graph(), Some(intent.clone())).unwrap();
        let second = analyze_schema(&graph(), Some(intent)).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.patterns_on(&QualifiedName::parse("public.posts")).count(), 1);
    }
}
