//! Tension Analysis
//!
//! The decision layer. Each pattern carries a cost profile: how it moves every
//! [`Priority`] (negative impact = it costs that priority). The profile is
//! weighed against the caller's [`Intent`]:
//!
//! ```text
//! mismatch = confidence * sum(weight(p) * -impact(p))
//! ```
//!
//! A rule fires when the mismatch exceeds its threshold; the mismatch also
//! picks the severity. Shape rules look at tables directly, independent of any
//! pattern. The final list is ranked by [`rank_tensions`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use super::patterns::{DetectedPattern, PatternType};
use super::roles::{RoleType, TableRoleResult};
use super::{round_score, run_isolated};
use crate::error::DetectionError;
use crate::graph::{DiagnosticCode, Diagnostics, QualifiedName, SchemaGraph};
use crate::intent::{Intent, Priority};

// =============================================================================
// Severity, Effort, Category
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_score(mismatch: f64) -> Self {
        match mismatch {
            m if m >= 0.75 => Self::Critical,
            m if m >= 0.5 => Self::High,
            m if m >= 0.3 => Self::Medium,
            m if m >= 0.15 => Self::Low,
            _ => Self::Info,
        }
    }

    /// One level up, saturating at critical
    pub fn raised(self) -> Self {
        match self {
            Self::Info => Self::Low,
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High | Self::Critical => Self::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effort {
    Trivial,
    Small,
    Medium,
    Large,
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trivial => write!(f, "trivial"),
            Self::Small => write!(f, "small"),
            Self::Medium => write!(f, "medium"),
            Self::Large => write!(f, "large"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensionCategory {
    QueryComplexity,
    Performance,
    DataIntegrity,
    Storage,
    Auditability,
    Evolution,
}

// =============================================================================
// Tension Values
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    pub description: String,
    pub effort: Effort,
}

impl Alternative {
    pub fn new(description: impl Into<String>, effort: Effort) -> Self {
        Self {
            description: description.into(),
            effort,
        }
    }
}

/// One term of the weighted mismatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensionSignal {
    pub priority: Priority,
    /// Intent weight of the priority
    pub weight: f64,
    /// Pattern impact on the priority
    pub impact: f64,
    /// `weight * -impact`, scaled by confidence
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignTension {
    /// Rule that raised it
    pub id: String,
    pub category: TensionCategory,
    pub severity: Severity,
    pub description: String,
    pub tables: Vec<QualifiedName>,
    pub alternatives: Vec<Alternative>,
    pub signals: Vec<TensionSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<PatternType>,
    /// Weighted mismatch
    pub score: f64,
}

impl DesignTension {
    /// Cheapest alternative; a tension without alternatives counts as large
    pub fn min_effort(&self) -> Effort {
        self.alternatives
            .iter()
            .map(|a| a.effort)
            .min()
            .unwrap_or(Effort::Large)
    }
}

/// Severity descending, then cheapest fix first. Stable: equal keys keep
/// detection order.
pub fn rank_tensions(mut tensions: Vec<DesignTension>) -> Vec<DesignTension> {
    tensions.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.min_effort().cmp(&b.min_effort()))
    });
    tensions
}

// =============================================================================
// Cost Profiles
// =============================================================================

/// Priority impacts in [-1, 1]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostProfile {
    impacts: Vec<(Priority, f64)>,
}

impl CostProfile {
    pub fn new(impacts: impl IntoIterator<Item = (Priority, f64)>) -> Self {
        Self {
            impacts: impacts.into_iter().collect(),
        }
    }

    /// Weighted mismatch against `intent`, with its per-priority terms
    pub fn mismatch(&self, intent: &Intent, confidence: f64) -> (f64, Vec<TensionSignal>) {
        let signals: Vec<TensionSignal> = self
            .impacts
            .iter()
            .map(|&(priority, impact)| {
                let weight = intent.weight(priority);
                TensionSignal {
                    priority,
                    weight,
                    impact,
                    contribution: round_score(confidence * weight * -impact),
                }
            })
            .collect();
        let total = self
            .impacts
            .iter()
            .map(|&(priority, impact)| intent.weight(priority) * -impact)
            .sum::<f64>();
        (round_score(confidence * total), signals)
    }
}

// =============================================================================
// Rule Interface
// =============================================================================

/// Inputs shared by every tension rule
pub struct TensionContext<'a> {
    pub graph: &'a SchemaGraph,
    pub patterns: &'a [DetectedPattern],
    pub roles: &'a [TableRoleResult],
    pub intent: &'a Intent,
    role_index: HashMap<&'a QualifiedName, RoleType>,
}

impl<'a> TensionContext<'a> {
    pub fn new(
        graph: &'a SchemaGraph,
        patterns: &'a [DetectedPattern],
        roles: &'a [TableRoleResult],
        intent: &'a Intent,
    ) -> Self {
        let role_index = roles.iter().map(|r| (&r.table, r.primary())).collect();
        Self {
            graph,
            patterns,
            roles,
            intent,
            role_index,
        }
    }

    pub fn primary_role(&self, table: &QualifiedName) -> Option<RoleType> {
        self.role_index.get(table).copied()
    }
}

pub trait TensionRule: Send + Sync {
    /// Stable identifier, copied into every tension the rule raises
    fn id(&self) -> &'static str;

    fn evaluate(&self, ctx: &TensionContext<'_>) -> Result<Vec<DesignTension>, DetectionError>;
}

// =============================================================================
// Pattern Rules
// =============================================================================

/// Weighs one pattern type's cost profile against the intent
pub struct PatternTensionRule {
    pub id: &'static str,
    pub pattern: PatternType,
    pub category: TensionCategory,
    pub profile: CostProfile,
    /// Fires when the mismatch is strictly greater
    pub threshold: f64,
    pub summary: &'static str,
    pub alternatives: Vec<Alternative>,
}

impl TensionRule for PatternTensionRule {
    fn id(&self) -> &'static str {
        self.id
    }

    fn evaluate(&self, ctx: &TensionContext<'_>) -> Result<Vec<DesignTension>, DetectionError> {
        let mut tensions = Vec::new();

        for pattern in ctx.patterns.iter().filter(|p| p.pattern_type == self.pattern) {
            let (score, signals) = self.profile.mismatch(ctx.intent, pattern.confidence);
            if score <= self.threshold {
                debug!(rule = self.id, table = %pattern.table(), score, "below tension threshold");
                continue;
            }

            let columns = if pattern.columns.is_empty() {
                String::new()
            } else {
                format!(" ({})", pattern.columns.join(", "))
            };
            tensions.push(DesignTension {
                id: self.id.to_string(),
                category: self.category,
                severity: Severity::from_score(score),
                description: format!("{}{}: {}", pattern.table(), columns, self.summary),
                tables: pattern.tables.clone(),
                alternatives: self.alternatives.clone(),
                signals,
                pattern: Some(self.pattern),
                score,
            });
        }

        Ok(tensions)
    }
}

/// One rule per pattern type, in pattern declaration order
pub fn pattern_rules() -> Vec<PatternTensionRule> {
    use Effort::*;
    use Priority::*;

    vec![
        PatternTensionRule {
            id: "soft_delete_read_overhead",
            pattern: PatternType::SoftDelete,
            category: TensionCategory::QueryComplexity,
            profile: CostProfile::new([
                (ReadSimplicity, -0.6),
                (StorageCost, -0.3),
                (Integrity, -0.3),
                (Auditability, 0.5),
                (WriteThroughput, 0.2),
            ]),
            threshold: 0.1,
            summary: "every read must filter out deleted rows and unique constraints still see them",
            alternatives: vec![
                Alternative::new("Expose live rows through a view backed by a partial index", Small),
                Alternative::new("Move deleted rows into an archive table", Medium),
                Alternative::new("Hard delete and keep history in an audit table", Medium),
            ],
        },
        PatternTensionRule {
            id: "scd_type2_query_complexity",
            pattern: PatternType::ScdType2,
            category: TensionCategory::QueryComplexity,
            profile: CostProfile::new([
                (ReadSimplicity, -0.7),
                (StorageCost, -0.4),
                (WriteThroughput, -0.2),
                (Integrity, -0.2),
                (Auditability, 0.7),
            ]),
            threshold: 0.15,
            summary: "point-in-time versioning makes every current-state query range-filtered",
            alternatives: vec![
                Alternative::new("Add a current-rows view or materialized snapshot", Small),
                Alternative::new("Guard validity ranges with an exclusion constraint", Medium),
                Alternative::new("Split current state and history into separate tables", Large),
            ],
        },
        PatternTensionRule {
            id: "polymorphic_reference_integrity",
            pattern: PatternType::PolymorphicAssociation,
            category: TensionCategory::DataIntegrity,
            profile: CostProfile::new([
                (Integrity, -0.9),
                (ReadSimplicity, -0.4),
                (Flexibility, 0.6),
            ]),
            threshold: 0.1,
            summary: "the reference is not enforced by the database and joins depend on the discriminator",
            alternatives: vec![
                Alternative::new("Enumerate allowed discriminator values in a check constraint", Small),
                Alternative::new("Use one nullable foreign key per target (exclusive arcs)", Medium),
                Alternative::new("Introduce a shared supertype table referenced by a real foreign key", Large),
            ],
        },
        PatternTensionRule {
            id: "junction_join_cost",
            pattern: PatternType::JunctionTable,
            category: TensionCategory::QueryComplexity,
            profile: CostProfile::new([
                (ReadSimplicity, -0.3),
                (Integrity, 0.4),
                (Flexibility, 0.2),
            ]),
            threshold: 0.1,
            summary: "many-to-many reads always go through an extra join",
            alternatives: vec![
                Alternative::new("Index the second key column for reverse lookups", Trivial),
                Alternative::new("Denormalize the association into an array column", Medium),
            ],
        },
        PatternTensionRule {
            id: "natural_key_evolution",
            pattern: PatternType::NaturalKey,
            category: TensionCategory::Evolution,
            profile: CostProfile::new([
                (Flexibility, -0.5),
                (Integrity, -0.3),
                (WriteThroughput, -0.2),
                (ReadSimplicity, 0.3),
            ]),
            threshold: 0.1,
            summary: "a business key as primary key breaks the surrogate-key convention and is costly to change",
            alternatives: vec![
                Alternative::new("Declare ON UPDATE CASCADE on referencing foreign keys", Small),
                Alternative::new("Add a surrogate key and keep the business key unique", Medium),
            ],
        },
        PatternTensionRule {
            id: "eav_untyped_attributes",
            pattern: PatternType::EntityAttributeValue,
            category: TensionCategory::DataIntegrity,
            profile: CostProfile::new([
                (Integrity, -0.8),
                (ReadSimplicity, -0.8),
                (StorageCost, -0.3),
                (Flexibility, 0.9),
            ]),
            threshold: 0.1,
            summary: "attribute values are untyped and every attribute read is a pivot",
            alternatives: vec![
                Alternative::new("Promote frequently used attributes to typed columns", Medium),
                Alternative::new("Replace rows with a validated json document", Medium),
                Alternative::new("Model attribute groups as subtype tables", Large),
            ],
        },
        PatternTensionRule {
            id: "json_payload_schema_drift",
            pattern: PatternType::JsonPayload,
            category: TensionCategory::Evolution,
            profile: CostProfile::new([
                (Integrity, -0.5),
                (ReadSimplicity, -0.3),
                (Flexibility, 0.7),
                (WriteThroughput, 0.1),
            ]),
            threshold: 0.1,
            summary: "structure hidden in a json document is not validated or typed by the database",
            alternatives: vec![
                Alternative::new("Index the queried keys with a gin or expression index", Trivial),
                Alternative::new("Validate the document shape with a check constraint", Small),
                Alternative::new("Extract stable keys into typed columns", Medium),
            ],
        },
        PatternTensionRule {
            id: "timestamps_without_history",
            pattern: PatternType::AuditTimestamps,
            category: TensionCategory::Auditability,
            profile: CostProfile::new([
                (Auditability, -0.6),
                (WriteThroughput, -0.1),
                (ReadSimplicity, 0.1),
            ]),
            threshold: 0.25,
            summary: "timestamps record when a row changed but not what changed",
            alternatives: vec![
                Alternative::new("Record the acting user in created_by/updated_by", Small),
                Alternative::new("Keep a history table populated by triggers", Medium),
            ],
        },
    ]
}

// =============================================================================
// Shape Rules
// =============================================================================

/// Foreign keys whose columns do not lead any index or the primary key
pub struct UnindexedForeignKeyRule {
    pub profile: CostProfile,
    pub threshold: f64,
}

impl Default for UnindexedForeignKeyRule {
    fn default() -> Self {
        Self {
            profile: CostProfile::new([(Priority::ReadSimplicity, -0.6), (Priority::WriteThroughput, 0.1)]),
            threshold: 0.1,
        }
    }
}

impl TensionRule for UnindexedForeignKeyRule {
    fn id(&self) -> &'static str {
        "unindexed_foreign_key"
    }

    fn evaluate(&self, ctx: &TensionContext<'_>) -> Result<Vec<DesignTension>, DetectionError> {
        let mut tensions = Vec::new();

        for table in ctx.graph.tables() {
            let unindexed: Vec<_> = table
                .foreign_keys
                .iter()
                .filter(|fk| !table.has_leading_index(&fk.columns))
                .collect();
            if unindexed.is_empty() {
                continue;
            }

            let (score, signals) = self.profile.mismatch(ctx.intent, 1.0);
            if score <= self.threshold {
                continue;
            }
            let mut severity = Severity::from_score(score);
            if ctx.primary_role(&table.name) == Some(RoleType::Fact) {
                severity = severity.raised();
            }

            let names: Vec<String> = unindexed
                .iter()
                .map(|fk| format!("{} ({})", fk.name, fk.columns.join(", ")))
                .collect();
            let mut tables = vec![table.name.clone()];
            for fk in &unindexed {
                if ctx.graph.contains(&fk.target) && !tables.contains(&fk.target) {
                    tables.push(fk.target.clone());
                }
            }

            tensions.push(DesignTension {
                id: self.id().to_string(),
                category: TensionCategory::Performance,
                severity,
                description: format!(
                    "{}: foreign keys without a supporting index: {}; joins and parent deletes scan the table",
                    table.name,
                    names.join(", ")
                ),
                tables,
                alternatives: vec![Alternative::new(
                    format!("Create an index on each listed foreign key's columns ({})", unindexed.len()),
                    Effort::Trivial,
                )],
                signals,
                pattern: None,
                score,
            });
        }

        Ok(tensions)
    }
}

/// Tables without a primary key. Framework tables are exempt.
pub struct MissingPrimaryKeyRule {
    pub profile: CostProfile,
    pub threshold: f64,
}

impl Default for MissingPrimaryKeyRule {
    fn default() -> Self {
        Self {
            profile: CostProfile::new([(Priority::Integrity, -0.8), (Priority::ReadSimplicity, -0.2)]),
            threshold: 0.1,
        }
    }
}

impl TensionRule for MissingPrimaryKeyRule {
    fn id(&self) -> &'static str {
        "missing_primary_key"
    }

    fn evaluate(&self, ctx: &TensionContext<'_>) -> Result<Vec<DesignTension>, DetectionError> {
        let mut tensions = Vec::new();

        for table in ctx.graph.tables().filter(|t| t.primary_key.is_none()) {
            if ctx.primary_role(&table.name) == Some(RoleType::System) {
                continue;
            }
            let (score, signals) = self.profile.mismatch(ctx.intent, 1.0);
            if score <= self.threshold {
                continue;
            }

            tensions.push(DesignTension {
                id: self.id().to_string(),
                category: TensionCategory::DataIntegrity,
                severity: Severity::from_score(score),
                description: format!("{}: no primary key, so rows cannot be addressed or deduplicated", table.name),
                tables: vec![table.name.clone()],
                alternatives: vec![
                    Alternative::new("Promote an existing unique column set to the primary key", Effort::Trivial),
                    Alternative::new("Add a generated identity primary key", Effort::Small),
                ],
                signals,
                pattern: None,
                score,
            });
        }

        Ok(tensions)
    }
}

pub fn default_rules() -> Vec<Box<dyn TensionRule>> {
    let mut rules: Vec<Box<dyn TensionRule>> = pattern_rules()
        .into_iter()
        .map(|r| Box::new(r) as Box<dyn TensionRule>)
        .collect();
    rules.push(Box::new(UnindexedForeignKeyRule::default()));
    rules.push(Box::new(MissingPrimaryKeyRule::default()));
    rules
}

// =============================================================================
// Analyzer
// =============================================================================

pub struct TensionAnalyzer {
    intent: Intent,
    rules: Vec<Box<dyn TensionRule>>,
}

impl Default for TensionAnalyzer {
    fn default() -> Self {
        Self::new(Intent::balanced())
    }
}

impl TensionAnalyzer {
    pub fn new(intent: Intent) -> Self {
        Self::with_rules(intent, default_rules())
    }

    pub fn with_rules(intent: Intent, rules: Vec<Box<dyn TensionRule>>) -> Self {
        Self { intent, rules }
    }

    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// Ranked tensions
    pub fn analyze(
        &self,
        graph: &SchemaGraph,
        patterns: &[DetectedPattern],
        roles: &[TableRoleResult],
        diagnostics: &mut Diagnostics,
    ) -> Vec<DesignTension> {
        let ctx = TensionContext::new(graph, patterns, roles, &self.intent);
        let mut tensions = Vec::new();

        for rule in &self.rules {
            match run_isolated(rule.id(), || rule.evaluate(&ctx)) {
                Ok(found) => {
                    debug!(rule = rule.id(), count = found.len(), "tension rule evaluated");
                    tensions.extend(found);
                }
                Err(err) => {
                    warn!(rule = rule.id(), error = %err, "tension rule failed");
                    diagnostics.rule_failed(DiagnosticCode::TensionRuleFailed, None, &err);
                }
            }
        }

        rank_tensions(tensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{PatternDetector, RoleDetector};
    use crate::graph::{Column, DataType, ForeignKey, Index, PrimaryKey, Table};

    fn tension(id: &str, severity: Severity, efforts: &[Effort]) -> DesignTension {
        DesignTension {
            id: id.to_string(),
            category: TensionCategory::QueryComplexity,
            severity,
            description: id.to_string(),
            tables: Vec::new(),
            alternatives: efforts.iter().map(|&e| Alternative::new(id, e)).collect(),
            signals: Vec::new(),
            pattern: None,
            score: 0.0,
        }
    }

    fn ids(tensions: &[DesignTension]) -> Vec<&str> {
        tensions.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(Severity::from_score(0.75), Severity::Critical);
        assert_eq!(Severity::from_score(0.5), Severity::High);
        assert_eq!(Severity::from_score(0.3), Severity::Medium);
        assert_eq!(Severity::from_score(0.15), Severity::Low);
        assert_eq!(Severity::from_score(0.149), Severity::Info);
        assert_eq!(Severity::Critical.raised(), Severity::Critical);
        assert!(Severity::Info < Severity::Low && Effort::Trivial < Effort::Large);
    }

    #[test]
    fn test_severity_beats_effort() {
        let ranked = rank_tensions(vec![
            tension("medium_small", Severity::Medium, &[Effort::Small]),
            tension("high_large", Severity::High, &[Effort::Large]),
        ]);
        assert_eq!(ids(&ranked), vec!["high_large", "medium_small"]);
    }

    #[test]
    fn test_cheapest_alternative_breaks_severity_ties() {
        let ranked = rank_tensions(vec![
            tension("large", Severity::Low, &[Effort::Large]),
            tension("mixed", Severity::Low, &[Effort::Large, Effort::Trivial]),
        ]);
        assert_eq!(ids(&ranked), vec!["mixed", "large"]);
    }

    #[test]
    fn test_ranking_is_stable() {
        let ranked = rank_tensions(vec![
            tension("first", Severity::Medium, &[Effort::Small]),
            tension("second", Severity::Medium, &[Effort::Small]),
            tension("third", Severity::Medium, &[Effort::Small]),
        ]);
        assert_eq!(ids(&ranked), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_mismatch_formula() {
        let profile = CostProfile::new([(Priority::ReadSimplicity, -0.6), (Priority::Auditability, 0.5)]);
        let intent = Intent::balanced()
            .with(Priority::ReadSimplicity, 1.0)
            .unwrap()
            .with(Priority::Auditability, 0.2)
            .unwrap();

        let (score, signals) = profile.mismatch(&intent, 0.5);
        // 0.5 * (1.0 * 0.6 + 0.2 * -0.5)
        assert!((score - 0.25).abs() < 1e-9);
        assert_eq!(signals.len(), 2);
        assert!((signals[1].contribution + 0.05).abs() < 1e-9);
    }

    fn analyze(tables: Vec<Table>, intent: Intent) -> Vec<DesignTension> {
        let graph = SchemaGraph::new(tables).unwrap();
        let mut diagnostics = Diagnostics::new();
        let roles = RoleDetector::new().detect(&graph, &mut diagnostics);
        let patterns = PatternDetector::new().detect(&graph, &roles, &mut diagnostics);
        TensionAnalyzer::new(intent).analyze(&graph, &patterns, &roles, &mut diagnostics)
    }

    fn posts() -> Table {
        Table::new("public.posts")
            .column(Column::new("id", DataType::from_raw("bigserial"), false))
            .column(Column::new("title", DataType::from_raw("text"), false))
            .column(Column::new("deleted_at", DataType::from_raw("timestamptz"), true))
            .primary_key(PrimaryKey::new("posts_pkey", ["id"]))
    }

    #[test]
    fn test_intent_changes_the_verdict() {
        let balanced = analyze(vec![posts()], Intent::balanced());
        assert_eq!(ids(&balanced), vec!["soft_delete_read_overhead"]);
        assert_eq!(balanced[0].pattern, Some(PatternType::SoftDelete));

        // Auditability outweighs the read overhead
        let audit = analyze(vec![posts()], Intent::audit_heavy());
        assert!(audit.is_empty());
    }

    #[test]
    fn test_unindexed_foreign_key_on_fact_table_is_raised() {
        let dims = ["dim_date", "dim_store"].map(|name| {
            Table::new(QualifiedName::new("public", name))
                .column(Column::new("id", DataType::from_raw("integer"), false))
                .primary_key(PrimaryKey::new(format!("{}_pkey", name), ["id"]))
        });
        let sales = Table::new("public.fact_sales")
            .column(Column::new("id", DataType::from_raw("bigserial"), false))
            .column(Column::new("date_id", DataType::from_raw("integer"), false))
            .column(Column::new("store_id", DataType::from_raw("integer"), false))
            .column(Column::new("quantity", DataType::from_raw("integer"), false))
            .column(Column::new("amount", DataType::from_raw("numeric(12,2)"), false))
            .primary_key(PrimaryKey::new("fact_sales_pkey", ["id"]))
            .foreign_key(ForeignKey::new("sales_date_fk", ["date_id"], "public.dim_date", ["id"]))
            .foreign_key(ForeignKey::new("sales_store_fk", ["store_id"], "public.dim_store", ["id"]))
            .index(Index::new("sales_date_idx", ["date_id"]));

        let [date, store] = dims;
        let tensions = analyze(vec![date, store, sales], Intent::balanced());
        let unindexed: Vec<&DesignTension> = tensions.iter().filter(|t| t.id == "unindexed_foreign_key").collect();
        assert_eq!(unindexed.len(), 1);
        // 0.5 * 0.6 - 0.5 * 0.1 = 0.25 is low, raised for a fact table
        assert_eq!(unindexed[0].severity, Severity::Medium);
        assert!(unindexed[0].description.contains("sales_store_fk"));
        assert!(!unindexed[0].description.contains("sales_date_fk"));
    }

    #[test]
    fn test_missing_primary_key() {
        let table = Table::new("public.imports").column(Column::new("line", DataType::from_raw("text"), false));
        let tensions = analyze(vec![table], Intent::balanced());
        assert_eq!(ids(&tensions), vec!["missing_primary_key"]);
        assert_eq!(tensions[0].severity, Severity::High);
        assert_eq!(tensions[0].min_effort(), Effort::Trivial);
    }

    struct Exploding;

    impl TensionRule for Exploding {
        fn id(&self) -> &'static str {
            "exploding"
        }

        fn evaluate(&self, _ctx: &TensionContext<'_>) -> Result<Vec<DesignTension>, DetectionError> {
            panic!("unexpected shape")
        }
    }

    #[test]
    fn test_panicking_rule_is_isolated() {
        let graph = SchemaGraph::new([Table::new("public.imports")]).unwrap();
        let mut diagnostics = Diagnostics::new();
        let analyzer = TensionAnalyzer::with_rules(
            Intent::balanced(),
            vec![Box::new(Exploding), Box::new(MissingPrimaryKeyRule::default())],
        );

        let tensions = analyzer.analyze(&graph, &[], &[], &mut diagnostics);
        assert_eq!(ids(&tensions), vec!["missing_primary_key"]);
        let failures: Vec<_> = diagnostics.with_code(DiagnosticCode::TensionRuleFailed).collect();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("unexpected shape"));
    }
}
