//! Role Detection
//!
//! Assigns every table one primary functional role from a fixed battery of
//! weighted signal rules. Signals for the same role sum; the highest sum
//! wins and ties fall back to [`RoleType::PRIORITY`]. The full ranked list
//! is kept so reports can explain the verdict.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use super::naming::{self, vocabulary, Vocabulary};
use super::{round_score, run_isolated};
use crate::error::DetectionError;
use crate::graph::{DataTypeCategory, DiagnosticCode, Diagnostics, QualifiedName, SchemaGraph, Table};

// =============================================================================
// Role Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    Entity,
    Fact,
    Dimension,
    Junction,
    Lookup,
    Audit,
    System,
}

impl RoleType {
    /// Tie-break order for equally scored roles, most specific first.
    /// Entity is the generic fallback and always loses a tie.
    pub const PRIORITY: [RoleType; 7] = [
        RoleType::Junction,
        RoleType::System,
        RoleType::Audit,
        RoleType::Fact,
        RoleType::Dimension,
        RoleType::Lookup,
        RoleType::Entity,
    ];

    pub fn priority_rank(&self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|r| r == self)
            .unwrap_or(Self::PRIORITY.len())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Fact => "fact",
            Self::Dimension => "dimension",
            Self::Junction => "junction",
            Self::Lookup => "lookup",
            Self::Audit => "audit",
            Self::System => "system",
        }
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Signals & Results
// =============================================================================

/// One weighted piece of evidence toward a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Rule that emitted it
    pub rule: String,
    pub role: RoleType,
    pub weight: f64,
    pub description: String,
}

impl Signal {
    pub fn new(rule: &str, role: RoleType, weight: f64, description: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            role,
            weight,
            description: description.into(),
        }
    }
}

/// Aggregate score of one role for one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleScore {
    pub role: RoleType,
    pub score: f64,
    pub signals: Vec<Signal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRoleResult {
    pub table: QualifiedName,
    /// Ranked best first; never empty
    pub ranked: Vec<RoleScore>,
}

impl TableRoleResult {
    /// Result for a table no rule had anything to say about
    fn fallback(table: QualifiedName) -> Self {
        Self {
            table,
            ranked: vec![RoleScore {
                role: RoleType::Entity,
                score: 0.0,
                signals: Vec::new(),
            }],
        }
    }

    pub fn primary(&self) -> RoleType {
        self.ranked.first().map(|r| r.role).unwrap_or(RoleType::Entity)
    }

    /// Primary score clipped to [0, 1]
    pub fn confidence(&self) -> f64 {
        self.ranked
            .first()
            .map(|r| r.score.clamp(0.0, 1.0))
            .unwrap_or(0.0)
    }

    pub fn score(&self, role: RoleType) -> f64 {
        self.ranked
            .iter()
            .find(|r| r.role == role)
            .map(|r| r.score)
            .unwrap_or(0.0)
    }

    pub fn signals(&self) -> impl Iterator<Item = &Signal> {
        self.ranked.iter().flat_map(|r| r.signals.iter())
    }
}

// =============================================================================
// Rule Interface
// =============================================================================

/// A single structural heuristic. Must be stateless.
pub trait RoleRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, table: &Table, graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError>;
}

fn fire(rule: &dyn RoleRule, role: RoleType, weight: f64, fired: bool, description: impl FnOnce() -> String) -> Vec<Signal> {
    if fired {
        vec![Signal::new(rule.name(), role, weight, description())]
    } else {
        Vec::new()
    }
}

// =============================================================================
// Default Battery
// =============================================================================

/// Composite primary key made entirely of foreign key columns
pub struct ForeignKeyPrimaryKey {
    pub weight: f64,
}

impl Default for ForeignKeyPrimaryKey {
    fn default() -> Self {
        Self { weight: 0.6 }
    }
}

impl RoleRule for ForeignKeyPrimaryKey {
    fn name(&self) -> &'static str {
        "foreign_key_primary_key"
    }

    fn evaluate(&self, table: &Table, _graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError> {
        Ok(fire(self, RoleType::Junction, self.weight, table.has_foreign_key_primary_key(), || {
            "primary key is composed entirely of foreign key columns".to_string()
        }))
    }
}

/// Foreign-key primary key with almost nothing else on the row
pub struct ThinPayload {
    pub weight: f64,
    pub max_payload_columns: usize,
}

impl Default for ThinPayload {
    fn default() -> Self {
        Self {
            weight: 0.3,
            max_payload_columns: 2,
        }
    }
}

impl RoleRule for ThinPayload {
    fn name(&self) -> &'static str {
        "thin_payload"
    }

    fn evaluate(&self, table: &Table, _graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError> {
        let payload = table.payload_columns().count();
        let fired = table.has_foreign_key_primary_key() && payload <= self.max_payload_columns;
        Ok(fire(self, RoleType::Junction, self.weight, fired, || {
            format!("only {} non-key column(s)", payload)
        }))
    }
}

/// Framework and migration bookkeeping tables
pub struct SystemTableName {
    pub weight: f64,
}

impl Default for SystemTableName {
    fn default() -> Self {
        Self { weight: 0.9 }
    }
}

impl RoleRule for SystemTableName {
    fn name(&self) -> &'static str {
        "system_table_name"
    }

    fn evaluate(&self, table: &Table, _graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError> {
        let fired = Vocabulary::matches(&vocabulary().system_table, &table.name.name);
        Ok(fire(self, RoleType::System, self.weight, fired, || {
            format!("'{}' is a known framework/migration table", table.name.name)
        }))
    }
}

pub struct AuditTableName {
    pub weight: f64,
}

impl Default for AuditTableName {
    fn default() -> Self {
        Self { weight: 0.5 }
    }
}

impl RoleRule for AuditTableName {
    fn name(&self) -> &'static str {
        "audit_table_name"
    }

    fn evaluate(&self, table: &Table, _graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError> {
        let fired = Vocabulary::matches(&vocabulary().audit_table, &table.name.name);
        Ok(fire(self, RoleType::Audit, self.weight, fired, || {
            "table name follows log/history naming".to_string()
        }))
    }
}

/// Timestamped action or before/after rows that are never updated in place
pub struct AppendOnlyShape {
    pub weight: f64,
}

impl Default for AppendOnlyShape {
    fn default() -> Self {
        Self { weight: 0.4 }
    }
}

impl RoleRule for AppendOnlyShape {
    fn name(&self) -> &'static str {
        "append_only_shape"
    }

    fn evaluate(&self, table: &Table, _graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError> {
        let vocab = vocabulary();
        let has_timestamp = table.columns.iter().any(|c| c.category() == DataTypeCategory::Timestamp);
        let has_change_record = table.columns.iter().any(|c| {
            Vocabulary::matches(&vocab.audit_action, &c.name) || Vocabulary::matches(&vocab.audit_values, &c.name)
        });
        let has_update_marker = table
            .columns
            .iter()
            .any(|c| Vocabulary::matches(&vocab.updated_timestamp, &c.name));

        let fired = has_timestamp && has_change_record && !has_update_marker;
        Ok(fire(self, RoleType::Audit, self.weight, fired, || {
            "timestamped change records without an update marker".to_string()
        }))
    }
}

pub struct FactTableName {
    pub weight: f64,
}

impl Default for FactTableName {
    fn default() -> Self {
        Self { weight: 0.5 }
    }
}

impl RoleRule for FactTableName {
    fn name(&self) -> &'static str {
        "fact_table_name"
    }

    fn evaluate(&self, table: &Table, _graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError> {
        let fired = Vocabulary::matches(&vocabulary().fact_table, &table.name.name);
        Ok(fire(self, RoleType::Fact, self.weight, fired, || {
            "table name follows fact naming".to_string()
        }))
    }
}

/// Several foreign keys plus several numeric measures
pub struct MeasuresAndDimensions {
    pub weight: f64,
    pub min_foreign_keys: usize,
    pub min_measures: usize,
}

impl Default for MeasuresAndDimensions {
    fn default() -> Self {
        Self {
            weight: 0.4,
            min_foreign_keys: 2,
            min_measures: 2,
        }
    }
}

impl RoleRule for MeasuresAndDimensions {
    fn name(&self) -> &'static str {
        "measures_and_dimensions"
    }

    fn evaluate(&self, table: &Table, _graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError> {
        let measures = table
            .payload_columns()
            .filter(|c| c.category().is_numeric())
            .count();
        let fks = table.foreign_keys.len();
        let fired = fks >= self.min_foreign_keys && measures >= self.min_measures;
        Ok(fire(self, RoleType::Fact, self.weight, fired, || {
            format!("{} foreign keys and {} numeric measures", fks, measures)
        }))
    }
}

pub struct DimensionTableName {
    pub weight: f64,
}

impl Default for DimensionTableName {
    fn default() -> Self {
        Self { weight: 0.5 }
    }
}

impl RoleRule for DimensionTableName {
    fn name(&self) -> &'static str {
        "dimension_table_name"
    }

    fn evaluate(&self, table: &Table, _graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError> {
        let fired = Vocabulary::matches(&vocabulary().dimension_table, &table.name.name);
        Ok(fire(self, RoleType::Dimension, self.weight, fired, || {
            "table name follows dimension naming".to_string()
        }))
    }
}

pub struct ValidityRange {
    pub weight: f64,
}

impl Default for ValidityRange {
    fn default() -> Self {
        Self { weight: 0.3 }
    }
}

impl RoleRule for ValidityRange {
    fn name(&self) -> &'static str {
        "validity_range"
    }

    fn evaluate(&self, table: &Table, _graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError> {
        let range = naming::validity_range(table);
        Ok(fire(self, RoleType::Dimension, self.weight, range.is_some(), || {
            range
                .map(|(start, end)| format!("validity range {}..{}", start.name, end.name))
                .unwrap_or_default()
        }))
    }
}

/// Small, referenced, self-contained code/label table
pub struct EnumerationShape {
    pub weight: f64,
    pub max_columns: usize,
}

impl Default for EnumerationShape {
    fn default() -> Self {
        Self {
            weight: 0.6,
            max_columns: 4,
        }
    }
}

impl RoleRule for EnumerationShape {
    fn name(&self) -> &'static str {
        "enumeration_shape"
    }

    fn evaluate(&self, table: &Table, graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError> {
        if table.columns.len() > self.max_columns || !table.foreign_keys.is_empty() {
            return Ok(Vec::new());
        }
        let label = naming::find_column(table, &vocabulary().lookup_label, |c| c.is_textual());
        let fan_in = graph.fan_in(&table.name);
        Ok(fire(self, RoleType::Lookup, self.weight, label.is_some() && fan_in >= 1, || {
            format!(
                "{} columns with label '{}', referenced by {} table(s)",
                table.columns.len(),
                label.map(|c| c.name.as_str()).unwrap_or_default(),
                fan_in
            )
        }))
    }
}

/// Referenced from several other tables
pub struct ReferencedHub {
    pub weight: f64,
    pub min_fan_in: usize,
}

impl Default for ReferencedHub {
    fn default() -> Self {
        Self {
            weight: 0.3,
            min_fan_in: 2,
        }
    }
}

impl RoleRule for ReferencedHub {
    fn name(&self) -> &'static str {
        "referenced_hub"
    }

    fn evaluate(&self, table: &Table, graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError> {
        let fan_in = graph.fan_in(&table.name);
        Ok(fire(self, RoleType::Entity, self.weight, fan_in >= self.min_fan_in, || {
            format!("referenced by {} tables", fan_in)
        }))
    }
}

/// Single generated/identifier key plus descriptive attributes
pub struct SurrogateIdentity {
    pub weight: f64,
}

impl Default for SurrogateIdentity {
    fn default() -> Self {
        Self { weight: 0.3 }
    }
}

impl RoleRule for SurrogateIdentity {
    fn name(&self) -> &'static str {
        "surrogate_identity"
    }

    fn evaluate(&self, table: &Table, _graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError> {
        let key_column = table
            .primary_key
            .as_ref()
            .filter(|pk| pk.columns.len() == 1)
            .and_then(|pk| table.get_column(&pk.columns[0]));

        let surrogate = key_column.is_some_and(|c| {
            c.is_generated()
                || matches!(c.category(), DataTypeCategory::Integer | DataTypeCategory::Uuid)
        });
        let descriptive = table.payload_columns().any(|c| c.category().is_textual());

        Ok(fire(self, RoleType::Entity, self.weight, surrogate && descriptive, || {
            "surrogate identifier with descriptive attributes".to_string()
        }))
    }
}

pub struct LifecycleTimestamps {
    pub weight: f64,
}

impl Default for LifecycleTimestamps {
    fn default() -> Self {
        Self { weight: 0.2 }
    }
}

impl RoleRule for LifecycleTimestamps {
    fn name(&self) -> &'static str {
        "lifecycle_timestamps"
    }

    fn evaluate(&self, table: &Table, _graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError> {
        Ok(fire(self, RoleType::Entity, self.weight, naming::has_created_and_updated(table), || {
            "tracks creation and modification times".to_string()
        }))
    }
}

/// The default rule battery, in evaluation order
pub fn default_rules() -> Vec<Box<dyn RoleRule>> {
    vec![
        Box::new(ForeignKeyPrimaryKey::default()),
        Box::new(ThinPayload::default()),
        Box::new(SystemTableName::default()),
        Box::new(AuditTableName::default()),
        Box::new(AppendOnlyShape::default()),
        Box::new(FactTableName::default()),
        Box::new(MeasuresAndDimensions::default()),
        Box::new(DimensionTableName::default()),
        Box::new(ValidityRange::default()),
        Box::new(EnumerationShape::default()),
        Box::new(ReferencedHub::default()),
        Box::new(SurrogateIdentity::default()),
        Box::new(LifecycleTimestamps::default()),
    ]
}

// =============================================================================
// Detector
// =============================================================================

pub struct RoleDetector {
    rules: Vec<Box<dyn RoleRule>>,
}

impl Default for RoleDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl RoleDetector {
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    pub fn with_rules(rules: Vec<Box<dyn RoleRule>>) -> Self {
        Self { rules }
    }

    /// Append a rule after the existing ones
    pub fn push_rule(&mut self, rule: Box<dyn RoleRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// One result per table, in graph order
    pub fn detect(&self, graph: &SchemaGraph, diagnostics: &mut Diagnostics) -> Vec<TableRoleResult> {
        graph
            .tables()
            .map(|table| self.detect_table(table, graph, diagnostics))
            .collect()
    }

    pub fn detect_table(
        &self,
        table: &Table,
        graph: &SchemaGraph,
        diagnostics: &mut Diagnostics,
    ) -> TableRoleResult {
        let mut by_role: BTreeMap<RoleType, Vec<Signal>> = BTreeMap::new();

        for rule in &self.rules {
            match run_isolated(rule.name(), || rule.evaluate(table, graph)) {
                Ok(signals) => {
                    for signal in signals {
                        by_role.entry(signal.role).or_default().push(signal);
                    }
                }
                Err(err) => {
                    warn!(table = %table.name, rule = rule.name(), error = %err, "role rule failed");
                    diagnostics.rule_failed(DiagnosticCode::RoleRuleFailed, Some(&table.name), &err);
                }
            }
        }

        if by_role.is_empty() {
            debug!(table = %table.name, "no role signal fired, defaulting to entity");
            return TableRoleResult::fallback(table.name.clone());
        }

        let mut ranked: Vec<RoleScore> = by_role
            .into_iter()
            .map(|(role, signals)| RoleScore {
                role,
                score: round_score(signals.iter().map(|s| s.weight).sum()),
                signals,
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.role.priority_rank().cmp(&b.role.priority_rank()))
        });

        debug!(table = %table.name, role = %ranked[0].role, score = ranked[0].score, "role detected");
        TableRoleResult {
            table: table.name.clone(),
            ranked,
        }
    }
}
