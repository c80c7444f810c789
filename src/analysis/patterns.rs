//! Pattern Detection
//!
//! Recognizes named design patterns table by table. Every pattern has its own
//! [`PatternRule`]; rules are independent and may overlap on one table. Role
//! results are available as corroborating (or contradicting) evidence through
//! the [`DetectionContext`].
//!
//! A candidate becomes a [`DetectedPattern`] when it carries at least one
//! positive signal and its clipped confidence reaches the pattern threshold.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use super::naming::{self, vocabulary, Vocabulary};
use super::roles::{RoleType, TableRoleResult};
use super::{round_score, run_isolated};
use crate::config::AnalysisConfig;
use crate::error::{ConfigurationError, DetectionError};
use crate::graph::{
    Column, ConstraintType, DataTypeCategory, DiagnosticCode, Diagnostics, IndexMethod,
    QualifiedName, ReferentialAction, SchemaGraph, Table,
};

// =============================================================================
// Pattern Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    SoftDelete,
    ScdType2,
    PolymorphicAssociation,
    JunctionTable,
    NaturalKey,
    EntityAttributeValue,
    JsonPayload,
    AuditTimestamps,
}

impl PatternType {
    /// Declared detector order
    pub const ALL: [PatternType; 8] = [
        PatternType::SoftDelete,
        PatternType::ScdType2,
        PatternType::PolymorphicAssociation,
        PatternType::JunctionTable,
        PatternType::NaturalKey,
        PatternType::EntityAttributeValue,
        PatternType::JsonPayload,
        PatternType::AuditTimestamps,
    ];

    pub const DEFAULT_THRESHOLD: f64 = 0.5;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SoftDelete => "soft_delete",
            Self::ScdType2 => "scd_type2",
            Self::PolymorphicAssociation => "polymorphic_association",
            Self::JunctionTable => "junction_table",
            Self::NaturalKey => "natural_key",
            Self::EntityAttributeValue => "entity_attribute_value",
            Self::JsonPayload => "json_payload",
            Self::AuditTimestamps => "audit_timestamps",
        }
    }

    pub fn category(&self) -> PatternCategory {
        match self {
            Self::SoftDelete => PatternCategory::Lifecycle,
            Self::ScdType2 | Self::AuditTimestamps => PatternCategory::Temporal,
            Self::PolymorphicAssociation | Self::JunctionTable => PatternCategory::Relationship,
            Self::NaturalKey => PatternCategory::Identity,
            Self::EntityAttributeValue | Self::JsonPayload => PatternCategory::Flexibility,
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        PatternType::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| ConfigurationError::UnknownPattern(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Lifecycle,
    Temporal,
    Relationship,
    Identity,
    Flexibility,
}

// =============================================================================
// Evidence & Results
// =============================================================================

/// Weighted evidence for (positive) or against (negative) a pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSignal {
    pub name: String,
    pub weight: f64,
    pub description: String,
}

/// One candidate occurrence reported by a rule, before thresholding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternEvidence {
    /// Tables involved besides the evaluated one
    pub related: Vec<QualifiedName>,
    pub columns: Vec<String>,
    pub signals: Vec<PatternSignal>,
}

impl PatternEvidence {
    pub fn on<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn signal(mut self, name: &str, weight: f64, description: impl Into<String>) -> Self {
        self.signals.push(PatternSignal {
            name: name.to_string(),
            weight,
            description: description.into(),
        });
        self
    }

    /// Add a signal only when `fired`
    pub fn signal_if(self, fired: bool, name: &str, weight: f64, description: impl Into<String>) -> Self {
        if fired {
            self.signal(name, weight, description)
        } else {
            self
        }
    }

    pub fn related(mut self, table: QualifiedName) -> Self {
        if !self.related.contains(&table) {
            self.related.push(table);
        }
        self
    }

    /// Sum of signal weights clipped to [0, 1]
    pub fn confidence(&self) -> f64 {
        round_score(self.signals.iter().map(|s| s.weight).sum::<f64>()).clamp(0.0, 1.0)
    }

    pub fn has_positive_signal(&self) -> bool {
        self.signals.iter().any(|s| s.weight > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub pattern_type: PatternType,
    pub category: PatternCategory,
    /// Evaluated table first, then related tables
    pub tables: Vec<QualifiedName>,
    pub columns: Vec<String>,
    pub confidence: f64,
    pub signals: Vec<PatternSignal>,
}

impl DetectedPattern {
    /// The table the pattern was detected on
    pub fn table(&self) -> &QualifiedName {
        &self.tables[0]
    }
}

// =============================================================================
// Detection Context
// =============================================================================

/// Read-only view shared by every rule during one detection run
pub struct DetectionContext<'a> {
    pub graph: &'a SchemaGraph,
    pub roles: &'a [TableRoleResult],
    role_index: HashMap<&'a QualifiedName, usize>,
    /// Tables with a primary key
    keyed_tables: usize,
    /// Tables whose primary key is a surrogate
    surrogate_tables: usize,
}

impl<'a> DetectionContext<'a> {
    pub fn new(graph: &'a SchemaGraph, roles: &'a [TableRoleResult]) -> Self {
        let role_index = roles.iter().enumerate().map(|(i, r)| (&r.table, i)).collect();
        let keyed_tables = graph.tables().filter(|t| t.primary_key.is_some()).count();
        let surrogate_tables = graph.tables().filter(|t| has_surrogate_key(t)).count();

        Self {
            graph,
            roles,
            role_index,
            keyed_tables,
            surrogate_tables,
        }
    }

    pub fn role(&self, table: &QualifiedName) -> Option<&'a TableRoleResult> {
        self.role_index.get(table).map(|&i| &self.roles[i])
    }

    pub fn primary_role(&self, table: &QualifiedName) -> Option<RoleType> {
        self.role(table).map(|r| r.primary())
    }

    fn has_role(&self, table: &QualifiedName, role: RoleType) -> bool {
        self.primary_role(table) == Some(role)
    }
}

/// Single-column key produced by the database or typed as a bare identifier
pub fn has_surrogate_key(table: &Table) -> bool {
    let Some(pk) = table.primary_key.as_ref().filter(|pk| pk.columns.len() == 1) else {
        return false;
    };
    table.get_column(&pk.columns[0]).is_some_and(|c| {
        c.is_generated() || matches!(c.category(), DataTypeCategory::Integer | DataTypeCategory::Uuid)
    })
}

// =============================================================================
// Rule Interface
// =============================================================================

pub trait PatternRule: Send + Sync {
    fn pattern_type(&self) -> PatternType;

    fn name(&self) -> &'static str {
        self.pattern_type().as_str()
    }

    /// Zero or more candidates on `table`
    fn evaluate(&self, table: &Table, ctx: &DetectionContext<'_>) -> Result<Vec<PatternEvidence>, DetectionError>;
}

// =============================================================================
// Detectors
// =============================================================================

/// Nullable deletion marker. Signal weights are named after the signals
/// they set; negative weights are counter-evidence.
pub struct SoftDeleteRule {
    pub deletion_marker: f64,
    pub deletion_actor: f64,
    pub live_rows_index: f64,
    pub cascading_hard_delete: f64,
}

impl Default for SoftDeleteRule {
    fn default() -> Self {
        Self {
            deletion_marker: 0.6,
            deletion_actor: 0.2,
            live_rows_index: 0.2,
            cascading_hard_delete: -0.3,
        }
    }
}

impl PatternRule for SoftDeleteRule {
    fn pattern_type(&self) -> PatternType {
        PatternType::SoftDelete
    }

    fn evaluate(&self, table: &Table, ctx: &DetectionContext<'_>) -> Result<Vec<PatternEvidence>, DetectionError> {
        let vocab = vocabulary();
        let Some(marker) = table.columns.iter().find(|c| {
            c.nullable
                && Vocabulary::matches(&vocab.deletion_marker, &c.name)
                && (c.category() == DataTypeCategory::Boolean || c.category().is_temporal())
        }) else {
            return Ok(Vec::new());
        };

        let actor = naming::find_column(table, &vocab.deletion_actor, |_| true);
        let marker_lower = marker.name.to_lowercase();
        let filtered_index = table.indexes.iter().find(|i| {
            i.predicate
                .as_deref()
                .is_some_and(|p| p.to_lowercase().contains(&marker_lower))
        });
        let cascading: Vec<&Table> = ctx
            .graph
            .foreign_keys_into(&table.name)
            .filter(|(_, fk)| fk.on_delete == ReferentialAction::Cascade)
            .map(|(owner, _)| owner)
            .collect();

        let mut evidence = PatternEvidence::on([marker.name.as_str()])
            .signal(
                "deletion_marker",
                self.deletion_marker,
                format!("nullable {:?} column '{}' marks deletion", marker.category(), marker.name),
            )
            .signal_if(actor.is_some(), "deletion_actor", self.deletion_actor, "records who deleted the row")
            .signal_if(
                filtered_index.is_some(),
                "live_rows_index",
                self.live_rows_index,
                format!(
                    "partial index '{}' filters on the marker",
                    filtered_index.map(|i| i.name.as_str()).unwrap_or_default()
                ),
            )
            .signal_if(
                !cascading.is_empty(),
                "cascading_hard_delete",
                self.cascading_hard_delete,
                "referencing foreign keys cascade deletes, so rows are physically removed",
            );

        if let Some(actor) = actor {
            evidence.columns.push(actor.name.clone());
        }
        for owner in cascading {
            evidence = evidence.related(owner.name.clone());
        }
        Ok(vec![evidence])
    }
}

/// Validity range, optionally with current flag, version and repeating key
pub struct ScdType2Rule {
    pub validity_range: f64,
    pub current_flag: f64,
    pub version_column: f64,
    pub repeating_natural_key: f64,
    pub dimension_role: f64,
}

impl Default for ScdType2Rule {
    fn default() -> Self {
        Self {
            validity_range: 0.4,
            current_flag: 0.15,
            version_column: 0.1,
            repeating_natural_key: 0.15,
            dimension_role: 0.2,
        }
    }
}

impl PatternRule for ScdType2Rule {
    fn pattern_type(&self) -> PatternType {
        PatternType::ScdType2
    }

    fn evaluate(&self, table: &Table, ctx: &DetectionContext<'_>) -> Result<Vec<PatternEvidence>, DetectionError> {
        let Some((start, end)) = naming::validity_range(table) else {
            return Ok(Vec::new());
        };
        let vocab = vocabulary();

        let current = naming::find_column(table, &vocab.current_flag, |c| c == DataTypeCategory::Boolean);
        let version = naming::find_column(table, &vocab.version, |c| c.is_numeric());
        let natural_key = table.columns.iter().find(|c| {
            !table.is_primary_key_column(&c.name)
                && Vocabulary::matches(&vocab.natural_key, &c.name)
                && !table.is_unique_set(std::slice::from_ref(&c.name))
        });

        let mut evidence = PatternEvidence::on([start.name.as_str(), end.name.as_str()])
            .signal(
                "validity_range",
                self.validity_range,
                format!("rows carry a validity range {}..{}", start.name, end.name),
            )
            .signal_if(current.is_some(), "current_flag", self.current_flag, "flags the current version")
            .signal_if(version.is_some(), "version_column", self.version_column, "numbers successive versions")
            .signal_if(
                natural_key.is_some(),
                "repeating_natural_key",
                self.repeating_natural_key,
                format!(
                    "business key '{}' is not unique, so it repeats across versions",
                    natural_key.map(|c| c.name.as_str()).unwrap_or_default()
                ),
            )
            .signal_if(
                ctx.has_role(&table.name, RoleType::Dimension),
                "dimension_role",
                self.dimension_role,
                "table is classified as a dimension",
            );

        for column in [current, version, natural_key].into_iter().flatten() {
            evidence.columns.push(column.name.clone());
        }
        Ok(vec![evidence])
    }
}

/// Discriminator column selecting the target of an unenforced reference
pub struct PolymorphicAssociationRule {
    /// `<prefix>_type` paired with `<prefix>_id`
    pub discriminated_reference: f64,
    /// Discriminator next to a generic reference column
    pub generic_reference: f64,
    pub enumerated_discriminator: f64,
}

impl Default for PolymorphicAssociationRule {
    fn default() -> Self {
        Self {
            discriminated_reference: 0.7,
            generic_reference: 0.35,
            enumerated_discriminator: 0.2,
        }
    }
}

impl PolymorphicAssociationRule {
    fn reference_for<'t>(table: &'t Table, prefix: Option<&str>) -> Option<(&'t Column, bool)> {
        let unenforced = |c: &&Column| !table.is_foreign_key_column(&c.name) && !table.is_primary_key_column(&c.name);

        if let Some(prefix) = prefix {
            let paired = format!("{}_id", prefix);
            if let Some(column) = table.columns.iter().filter(unenforced).find(|c| c.name.eq_ignore_ascii_case(&paired)) {
                return Some((column, true));
            }
        }

        table
            .columns
            .iter()
            .filter(unenforced)
            .find(|c| Vocabulary::matches(&vocabulary().generic_reference, &c.name))
            .map(|c| (c, false))
    }
}

impl PatternRule for PolymorphicAssociationRule {
    fn pattern_type(&self) -> PatternType {
        PatternType::PolymorphicAssociation
    }

    fn evaluate(&self, table: &Table, _ctx: &DetectionContext<'_>) -> Result<Vec<PatternEvidence>, DetectionError> {
        let vocab = vocabulary();
        let mut found = Vec::new();
        let mut used_references = BTreeSet::new();

        for discriminator in table.columns.iter().filter(|c| c.category().is_textual()) {
            let lowered = discriminator.name.to_lowercase();
            let Some(caps) = vocab.discriminator.captures(&lowered) else {
                continue;
            };
            let prefix = caps.name("prefix").map(|m| m.as_str());
            let Some((reference, paired)) = Self::reference_for(table, prefix) else {
                continue;
            };
            if !used_references.insert(reference.name.as_str()) {
                continue;
            }

            let checked = table.constraints.iter().any(|c| {
                c.kind == ConstraintType::Check
                    && (c.columns.contains(&discriminator.name)
                        || c.expression
                            .as_deref()
                            .is_some_and(|e| e.to_lowercase().contains(&lowered)))
            });

            let evidence = PatternEvidence::on([discriminator.name.as_str(), reference.name.as_str()]);
            let evidence = if paired {
                evidence.signal(
                    "discriminated_reference",
                    self.discriminated_reference,
                    format!(
                        "'{}' selects the target of '{}', which has no foreign key",
                        discriminator.name, reference.name
                    ),
                )
            } else {
                evidence.signal(
                    "generic_reference",
                    self.generic_reference,
                    format!(
                        "generic reference '{}' next to discriminator '{}', without a foreign key",
                        reference.name, discriminator.name
                    ),
                )
            };
            found.push(evidence.signal_if(
                checked,
                "enumerated_discriminator",
                self.enumerated_discriminator,
                "a check constraint enumerates the discriminator values",
            ));
        }

        Ok(found)
    }
}

pub struct JunctionTableRule {
    pub max_extra_columns: usize,
    pub foreign_key_primary_key: f64,
    pub thin_payload: f64,
    pub junction_role: f64,
}

impl Default for JunctionTableRule {
    fn default() -> Self {
        Self {
            max_extra_columns: 2,
            foreign_key_primary_key: 0.5,
            thin_payload: 0.2,
            junction_role: 0.3,
        }
    }
}

impl PatternRule for JunctionTableRule {
    fn pattern_type(&self) -> PatternType {
        PatternType::JunctionTable
    }

    fn evaluate(&self, table: &Table, ctx: &DetectionContext<'_>) -> Result<Vec<PatternEvidence>, DetectionError> {
        if !table.has_foreign_key_primary_key() {
            return Ok(Vec::new());
        }
        let pk_columns = table
            .primary_key
            .as_ref()
            .map(|pk| pk.columns.clone())
            .unwrap_or_default();
        let extra = table.payload_columns().count();

        let mut evidence = PatternEvidence::on(pk_columns)
            .signal("foreign_key_primary_key", self.foreign_key_primary_key, "composite primary key built from foreign keys")
            .signal_if(
                extra <= self.max_extra_columns,
                "thin_payload",
                self.thin_payload,
                format!("{} additional column(s)", extra),
            )
            .signal_if(
                ctx.has_role(&table.name, RoleType::Junction),
                "junction_role",
                self.junction_role,
                "table is classified as a junction",
            );

        // Dangling targets are unknown and stay out of the involved set
        for fk in &table.foreign_keys {
            if ctx.graph.contains(&fk.target) {
                evidence = evidence.related(fk.target.clone());
            }
        }
        Ok(vec![evidence])
    }
}

/// Business primary key in a schema whose other tables use surrogate keys.
/// Needs at least one other keyed table to compare against, whatever
/// `min_keyed_tables` says.
pub struct NaturalKeyRule {
    pub min_keyed_tables: usize,
    pub majority: f64,
    pub strong_majority: f64,
    pub business_key: f64,
    pub surrogate_convention: f64,
    pub referenced_business_key: f64,
    pub lookup_role: f64,
}

impl Default for NaturalKeyRule {
    fn default() -> Self {
        Self {
            min_keyed_tables: 3,
            majority: 0.5,
            strong_majority: 0.8,
            business_key: 0.5,
            surrogate_convention: 0.2,
            referenced_business_key: 0.1,
            lookup_role: -0.3,
        }
    }
}

impl PatternRule for NaturalKeyRule {
    fn pattern_type(&self) -> PatternType {
        PatternType::NaturalKey
    }

    fn evaluate(&self, table: &Table, ctx: &DetectionContext<'_>) -> Result<Vec<PatternEvidence>, DetectionError> {
        let Some(pk) = &table.primary_key else {
            return Ok(Vec::new());
        };
        if has_surrogate_key(table)
            || table.has_foreign_key_primary_key()
            || pk.columns.iter().any(|c| table.get_column(c).is_some_and(Column::is_generated))
            || ctx.keyed_tables < self.min_keyed_tables
        {
            return Ok(Vec::new());
        }

        let siblings = ctx.keyed_tables - 1;
        if siblings == 0 {
            return Ok(Vec::new());
        }
        let share = ctx.surrogate_tables as f64 / siblings as f64;
        if share < self.majority {
            return Ok(Vec::new());
        }
        let fan_in = ctx.graph.fan_in(&table.name);

        let evidence = PatternEvidence::on(pk.columns.clone())
            .signal(
                "business_key",
                self.business_key,
                format!(
                    "business key ({}) while {} of {} other keyed tables use surrogate keys",
                    pk.columns.join(", "),
                    ctx.surrogate_tables,
                    siblings
                ),
            )
            .signal_if(share >= self.strong_majority, "surrogate_convention", self.surrogate_convention, "surrogate keys are the clear convention")
            .signal_if(fan_in > 0, "referenced_business_key", self.referenced_business_key, format!("referenced by {} table(s)", fan_in))
            .signal_if(
                ctx.has_role(&table.name, RoleType::Lookup),
                "lookup_role",
                self.lookup_role,
                "code keys are conventional for lookup tables",
            );
        Ok(vec![evidence])
    }
}

pub struct EntityAttributeValueRule {
    pub attribute_value_rows: f64,
    pub unique_attribute_per_entity: f64,
}

impl Default for EntityAttributeValueRule {
    fn default() -> Self {
        Self {
            attribute_value_rows: 0.7,
            unique_attribute_per_entity: 0.15,
        }
    }
}

impl PatternRule for EntityAttributeValueRule {
    fn pattern_type(&self) -> PatternType {
        PatternType::EntityAttributeValue
    }

    fn evaluate(&self, table: &Table, _ctx: &DetectionContext<'_>) -> Result<Vec<PatternEvidence>, DetectionError> {
        let vocab = vocabulary();
        let Some(attribute) = table
            .columns
            .iter()
            .find(|c| Vocabulary::matches(&vocab.eav_attribute, &c.name))
        else {
            return Ok(Vec::new());
        };
        let Some(value) = naming::find_column(table, &vocab.eav_value, |c| {
            c.is_textual() || c == DataTypeCategory::Json
        }) else {
            return Ok(Vec::new());
        };
        let Some(entity) = table.columns.iter().find(|c| {
            c.name != attribute.name
                && !table.is_primary_key_column(&c.name)
                && (table.is_foreign_key_column(&c.name) || c.name.to_lowercase().ends_with("_id"))
        }) else {
            return Ok(Vec::new());
        };

        let unique_pair = table.is_unique_set(&[entity.name.clone(), attribute.name.clone()]);
        let evidence = PatternEvidence::on([entity.name.as_str(), attribute.name.as_str(), value.name.as_str()])
            .signal(
                "attribute_value_rows",
                self.attribute_value_rows,
                format!(
                    "'{}' rows hold one '{}' / '{}' pair each",
                    entity.name, attribute.name, value.name
                ),
            )
            .signal_if(unique_pair, "unique_attribute_per_entity", self.unique_attribute_per_entity, "one value per entity and attribute");
        Ok(vec![evidence])
    }
}

pub struct JsonPayloadRule {
    pub catch_all_document: f64,
    pub json_heavy: f64,
    /// Share of json columns that counts as json heavy
    pub json_heavy_share: f64,
    pub multiple_documents: f64,
    /// Counter-evidence: a gin index on the document
    pub indexed_document: f64,
}

impl Default for JsonPayloadRule {
    fn default() -> Self {
        Self {
            catch_all_document: 0.4,
            json_heavy: 0.2,
            json_heavy_share: 0.25,
            multiple_documents: 0.1,
            indexed_document: -0.1,
        }
    }
}

impl PatternRule for JsonPayloadRule {
    fn pattern_type(&self) -> PatternType {
        PatternType::JsonPayload
    }

    fn evaluate(&self, table: &Table, _ctx: &DetectionContext<'_>) -> Result<Vec<PatternEvidence>, DetectionError> {
        let catch_all: Vec<&Column> = table
            .columns
            .iter()
            .filter(|c| {
                c.category() == DataTypeCategory::Json && Vocabulary::matches(&vocabulary().json_catch_all, &c.name)
            })
            .collect();
        if catch_all.is_empty() {
            return Ok(Vec::new());
        }

        let json_columns = table
            .columns
            .iter()
            .filter(|c| c.category() == DataTypeCategory::Json)
            .count();
        let share = json_columns as f64 / table.columns.len() as f64;
        let indexed = table.indexes.iter().any(|i| {
            i.method == IndexMethod::Gin && catch_all.iter().any(|c| i.columns.contains(&c.name))
        });

        let evidence = PatternEvidence::on(catch_all.iter().map(|c| c.name.as_str()))
            .signal(
                "catch_all_document",
                self.catch_all_document,
                format!("json column '{}' named like a catch-all", catch_all[0].name),
            )
            .signal_if(share >= self.json_heavy_share, "json_heavy", self.json_heavy, format!("{} of {} columns are json", json_columns, table.columns.len()))
            .signal_if(json_columns >= 2, "multiple_documents", self.multiple_documents, "several json columns")
            .signal_if(indexed, "indexed_document", self.indexed_document, "a gin index makes the document queryable");
        Ok(vec![evidence])
    }
}

pub struct AuditTimestampsRule {
    pub lifecycle_timestamps: f64,
    pub change_actor: f64,
}

impl Default for AuditTimestampsRule {
    fn default() -> Self {
        Self {
            lifecycle_timestamps: 0.6,
            change_actor: 0.2,
        }
    }
}

impl PatternRule for AuditTimestampsRule {
    fn pattern_type(&self) -> PatternType {
        PatternType::AuditTimestamps
    }

    fn evaluate(&self, table: &Table, _ctx: &DetectionContext<'_>) -> Result<Vec<PatternEvidence>, DetectionError> {
        let vocab = vocabulary();
        let temporal = |c: DataTypeCategory| c.is_temporal();
        let (Some(created), Some(updated)) = (
            naming::find_column(table, &vocab.created_timestamp, temporal),
            naming::find_column(table, &vocab.updated_timestamp, temporal),
        ) else {
            return Ok(Vec::new());
        };
        let actor = naming::find_column(table, &vocab.change_actor, |_| true);

        let mut evidence = PatternEvidence::on([created.name.as_str(), updated.name.as_str()])
            .signal("lifecycle_timestamps", self.lifecycle_timestamps, "tracks creation and last modification time")
            .signal_if(actor.is_some(), "change_actor", self.change_actor, "records who changed the row");
        if let Some(actor) = actor {
            evidence.columns.push(actor.name.clone());
        }
        Ok(vec![evidence])
    }
}

/// Every detector, in declared order
pub fn default_rules() -> Vec<Box<dyn PatternRule>> {
    vec![
        Box::new(SoftDeleteRule::default()),
        Box::new(ScdType2Rule::default()),
        Box::new(PolymorphicAssociationRule::default()),
        Box::new(JunctionTableRule::default()),
        Box::new(NaturalKeyRule::default()),
        Box::new(EntityAttributeValueRule::default()),
        Box::new(JsonPayloadRule::default()),
        Box::new(AuditTimestampsRule::default()),
    ]
}

// =============================================================================
// Detector
// =============================================================================

pub struct PatternDetector {
    rules: Vec<Box<dyn PatternRule>>,
    thresholds: BTreeMap<PatternType, f64>,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector {
    /// All detectors at default thresholds
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    pub fn with_rules(rules: Vec<Box<dyn PatternRule>>) -> Self {
        Self {
            rules,
            thresholds: BTreeMap::new(),
        }
    }

    /// Enabled detectors and thresholds from configuration. The config is
    /// expected to be validated already.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let rules = default_rules()
            .into_iter()
            .filter(|r| config.enabled_patterns.contains(&r.pattern_type()))
            .collect();
        Self {
            rules,
            thresholds: config.confidence_thresholds.clone(),
        }
    }

    pub fn with_threshold(mut self, pattern: PatternType, threshold: f64) -> Self {
        self.thresholds.insert(pattern, threshold);
        self
    }

    pub fn threshold(&self, pattern: PatternType) -> f64 {
        self.thresholds
            .get(&pattern)
            .copied()
            .unwrap_or(PatternType::DEFAULT_THRESHOLD)
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Detected patterns in table order, then detector order
    pub fn detect(
        &self,
        graph: &SchemaGraph,
        roles: &[TableRoleResult],
        diagnostics: &mut Diagnostics,
    ) -> Vec<DetectedPattern> {
        let ctx = DetectionContext::new(graph, roles);
        let mut detected = Vec::new();

        for table in graph.tables() {
            for rule in &self.rules {
                let candidates = match run_isolated(rule.name(), || rule.evaluate(table, &ctx)) {
                    Ok(candidates) => candidates,
                    Err(err) => {
                        warn!(table = %table.name, rule = rule.name(), error = %err, "pattern rule failed");
                        diagnostics.rule_failed(DiagnosticCode::PatternRuleFailed, Some(&table.name), &err);
                        continue;
                    }
                };

                let pattern_type = rule.pattern_type();
                let threshold = self.threshold(pattern_type);
                for evidence in candidates {
                    let confidence = evidence.confidence();
                    if !evidence.has_positive_signal() || confidence < threshold {
                        debug!(table = %table.name, pattern = %pattern_type, confidence, "candidate below threshold");
                        continue;
                    }

                    debug!(table = %table.name, pattern = %pattern_type, confidence, "pattern detected");
                    let mut tables = vec![table.name.clone()];
                    tables.extend(evidence.related.into_iter().filter(|t| t != &table.name));
                    detected.push(DetectedPattern {
                        pattern_type,
                        category: pattern_type.category(),
                        tables,
                        columns: evidence.columns,
                        confidence,
                        signals: evidence.signals,
                    });
                }
            }
        }

        detected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RoleDetector;
    use crate::graph::{Constraint, DataType, ForeignKey, Index, PrimaryKey};

    fn col(name: &str, ty: &str) -> Column {
        Column::new(name, DataType::from_raw(ty), false)
    }

    fn nullable(name: &str, ty: &str) -> Column {
        Column::new(name, DataType::from_raw(ty), true)
    }

    fn run(tables: Vec<Table>) -> Vec<DetectedPattern> {
        let graph = SchemaGraph::new(tables).unwrap();
        let mut diagnostics = Diagnostics::new();
        let roles = RoleDetector::new().detect(&graph, &mut diagnostics);
        let patterns = PatternDetector::new().detect(&graph, &roles, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{}", diagnostics);
        patterns
    }

    fn of_type(patterns: &[DetectedPattern], pattern_type: PatternType) -> Vec<&DetectedPattern> {
        patterns.iter().filter(|p| p.pattern_type == pattern_type).collect()
    }

    fn posts(deleted: Column) -> Table {
        Table::new("public.posts")
            .column(col("id", "bigserial"))
            .column(col("title", "text"))
            .column(deleted)
            .primary_key(PrimaryKey::new("posts_pkey", ["id"]))
    }

    #[test]
    fn test_soft_delete_nullable_flag() {
        let patterns = run(vec![posts(nullable("is_deleted", "boolean"))]);
        let found = of_type(&patterns, PatternType::SoftDelete);
        assert_eq!(found.len(), 1);
        assert!(found[0].confidence >= 0.5);
        assert_eq!(found[0].columns, vec!["is_deleted"]);
        assert_eq!(found[0].category, PatternCategory::Lifecycle);
    }

    #[test]
    fn test_soft_delete_not_null_flag_is_ignored() {
        let patterns = run(vec![posts(col("is_deleted", "boolean"))]);
        assert!(of_type(&patterns, PatternType::SoftDelete).is_empty());
    }

    #[test]
    fn test_soft_delete_cascade_counter_evidence() {
        let comments = Table::new("public.comments")
            .column(col("id", "bigserial"))
            .column(col("post_id", "bigint"))
            .primary_key(PrimaryKey::new("comments_pkey", ["id"]))
            .foreign_key(
                ForeignKey::new("comments_post_fk", ["post_id"], "public.posts", ["id"])
                    .on_delete(ReferentialAction::Cascade),
            );
        let patterns = run(vec![posts(nullable("deleted_at", "timestamptz")), comments]);
        // 0.6 - 0.3 falls below the default threshold
        assert!(of_type(&patterns, PatternType::SoftDelete).is_empty());
    }

    #[test]
    fn test_soft_delete_with_partial_index() {
        let table = posts(nullable("deleted_at", "timestamptz"))
            .index(Index::new("posts_live_idx", ["title"]).partial("deleted_at IS NULL"));
        let patterns = run(vec![table]);
        let found = of_type(&patterns, PatternType::SoftDelete);
        assert!((found[0].confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_scd_type2() {
        let customers = Table::new("public.dim_customer")
            .column(col("customer_sk", "bigserial"))
            .column(col("customer_code", "text"))
            .column(col("name", "text"))
            .column(col("valid_from", "date"))
            .column(nullable("valid_to", "date"))
            .column(col("is_current", "boolean"))
            .primary_key(PrimaryKey::new("dim_customer_pkey", ["customer_sk"]));

        let patterns = run(vec![customers]);
        let found = of_type(&patterns, PatternType::ScdType2);
        assert_eq!(found.len(), 1);
        // range + current flag + repeating natural key + dimension role
        assert!((found[0].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_polymorphic_association() {
        let comments = Table::new("public.comments")
            .column(col("id", "bigserial"))
            .column(col("body", "text"))
            .column(col("commentable_type", "varchar(50)"))
            .column(col("commentable_id", "bigint"))
            .primary_key(PrimaryKey::new("comments_pkey", ["id"]))
            .constraint(Constraint::check(
                "comments_type_check",
                "commentable_type",
                "commentable_type IN ('Post', 'Photo')",
            ));

        let patterns = run(vec![comments]);
        let found = of_type(&patterns, PatternType::PolymorphicAssociation);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].columns, vec!["commentable_type", "commentable_id"]);
        assert!((found[0].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_enforced_reference_is_not_polymorphic() {
        let owners = Table::new("public.owners")
            .column(col("id", "bigserial"))
            .primary_key(PrimaryKey::new("owners_pkey", ["id"]));
        let pets = Table::new("public.pets")
            .column(col("id", "bigserial"))
            .column(col("owner_type", "text"))
            .column(col("owner_id", "bigint"))
            .primary_key(PrimaryKey::new("pets_pkey", ["id"]))
            .foreign_key(ForeignKey::new("pets_owner_fk", ["owner_id"], "public.owners", ["id"]));

        let patterns = run(vec![owners, pets]);
        assert!(of_type(&patterns, PatternType::PolymorphicAssociation).is_empty());
    }

    #[test]
    fn test_junction_table_involves_resolved_targets() {
        let users = Table::new("public.users")
            .column(col("id", "bigserial"))
            .primary_key(PrimaryKey::new("users_pkey", ["id"]));
        let tags = Table::new("public.user_tags")
            .column(col("user_id", "bigint"))
            .column(col("tag_id", "bigint"))
            .primary_key(PrimaryKey::new("user_tags_pkey", ["user_id", "tag_id"]))
            .foreign_key(ForeignKey::new("ut_user_fk", ["user_id"], "public.users", ["id"]))
            .foreign_key(ForeignKey::new("ut_tag_fk", ["tag_id"], "public.tags", ["id"]));

        let patterns = run(vec![users, tags]);
        let found = of_type(&patterns, PatternType::JunctionTable);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].confidence, 1.0);
        assert_eq!(
            found[0].tables,
            vec![QualifiedName::parse("public.user_tags"), QualifiedName::parse("public.users")]
        );
    }

    #[test]
    fn test_natural_key_against_surrogate_convention() {
        let mut tables: Vec<Table> = ["users", "orders", "invoices", "shipments"]
            .iter()
            .map(|name| {
                Table::new(QualifiedName::new("public", *name))
                    .column(col("id", "bigserial"))
                    .primary_key(PrimaryKey::new(format!("{}_pkey", name), ["id"]))
            })
            .collect();
        tables.push(
            Table::new("public.products")
                .column(col("sku", "text"))
                .column(col("title", "text"))
                .column(col("price", "numeric(10,2)"))
                .primary_key(PrimaryKey::new("products_pkey", ["sku"])),
        );

        let patterns = run(tables);
        let found = of_type(&patterns, PatternType::NaturalKey);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].table(), &QualifiedName::parse("public.products"));
        assert!((found[0].confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_natural_key_needs_another_keyed_table() {
        let products = Table::new("public.products")
            .column(col("sku", "text"))
            .column(col("title", "text"))
            .primary_key(PrimaryKey::new("products_pkey", ["sku"]));
        let graph = SchemaGraph::new([products]).unwrap();
        let ctx = DetectionContext::new(&graph, &[]);
        let rule = NaturalKeyRule {
            min_keyed_tables: 1,
            ..NaturalKeyRule::default()
        };

        let table = graph.lookup_str("public.products").unwrap();
        assert!(rule.evaluate(table, &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_signal_weights_are_configurable() {
        let comments = Table::new("public.comments")
            .column(col("id", "bigserial"))
            .column(col("post_id", "bigint"))
            .primary_key(PrimaryKey::new("comments_pkey", ["id"]))
            .foreign_key(
                ForeignKey::new("comments_post_fk", ["post_id"], "public.posts", ["id"])
                    .on_delete(ReferentialAction::Cascade),
            );
        let graph = SchemaGraph::new([posts(nullable("deleted_at", "timestamptz")), comments]).unwrap();
        let mut diagnostics = Diagnostics::new();
        let roles = RoleDetector::new().detect(&graph, &mut diagnostics);

        let lenient = SoftDeleteRule {
            cascading_hard_delete: -0.1,
            ..SoftDeleteRule::default()
        };
        let patterns = PatternDetector::with_rules(vec![Box::new(lenient)]).detect(&graph, &roles, &mut diagnostics);
        let found = of_type(&patterns, PatternType::SoftDelete);
        assert_eq!(found.len(), 1);
        assert!((found[0].confidence - 0.5).abs() < 1e-9);
        assert!(found[0]
            .signals
            .iter()
            .any(|s| s.name == "cascading_hard_delete" && s.weight == -0.1));
    }

    #[test]
    fn test_entity_attribute_value() {
        let settings = Table::new("public.user_settings")
            .column(col("id", "bigserial"))
            .column(col("user_id", "bigint"))
            .column(col("attribute_name", "text"))
            .column(col("value", "text"))
            .primary_key(PrimaryKey::new("user_settings_pkey", ["id"]))
            .constraint(Constraint::unique("user_settings_key", ["user_id", "attribute_name"]));

        let patterns = run(vec![settings]);
        let found = of_type(&patterns, PatternType::EntityAttributeValue);
        assert_eq!(found.len(), 1);
        assert!((found[0].confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_json_payload() {
        let events = Table::new("public.webhooks")
            .column(col("id", "bigserial"))
            .column(col("url", "text"))
            .column(col("payload", "jsonb"))
            .column(col("metadata", "jsonb"))
            .primary_key(PrimaryKey::new("webhooks_pkey", ["id"]));

        let patterns = run(vec![events]);
        let found = of_type(&patterns, PatternType::JsonPayload);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].columns, vec!["payload", "metadata"]);
        assert!((found[0].confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_indexed_json_document_is_counter_evidence() {
        let settings = Table::new("public.settings")
            .column(col("id", "bigserial"))
            .column(col("name", "text"))
            .column(col("owner_id", "bigint"))
            .column(col("data", "jsonb"))
            .column(col("extra", "jsonb"))
            .primary_key(PrimaryKey::new("settings_pkey", ["id"]))
            .index(Index::new("settings_data_idx", ["data"]).method(IndexMethod::Gin));

        let patterns = run(vec![settings]);
        let found = of_type(&patterns, PatternType::JsonPayload);
        assert_eq!(found.len(), 1);
        // 0.4 + 0.2 + 0.1 - 0.1
        assert!((found[0].confidence - 0.6).abs() < 1e-9);
        assert!(found[0].signals.iter().any(|s| s.name == "indexed_document" && s.weight < 0.0));
    }

    struct Broken;

    impl PatternRule for Broken {
        fn pattern_type(&self) -> PatternType {
            PatternType::NaturalKey
        }

        fn name(&self) -> &'static str {
            "broken"
        }

        fn evaluate(&self, _table: &Table, _ctx: &DetectionContext<'_>) -> Result<Vec<PatternEvidence>, DetectionError> {
            Err(DetectionError::new("broken", "cannot classify"))
        }
    }

    #[test]
    fn test_failing_rule_is_isolated() {
        let graph = SchemaGraph::new([posts(nullable("is_deleted", "boolean"))]).unwrap();
        let mut diagnostics = Diagnostics::new();
        let roles = RoleDetector::new().detect(&graph, &mut diagnostics);

        let detector = PatternDetector::with_rules(vec![Box::new(Broken), Box::new(SoftDeleteRule::default())]);
        let patterns = detector.detect(&graph, &roles, &mut diagnostics);

        assert_eq!(of_type(&patterns, PatternType::SoftDelete).len(), 1);
        assert_eq!(diagnostics.with_code(DiagnosticCode::PatternRuleFailed).count(), 1);
    }

    #[test]
    fn test_threshold_override() {
        let graph = SchemaGraph::new([posts(nullable("is_deleted", "boolean"))]).unwrap();
        let mut diagnostics = Diagnostics::new();
        let roles = RoleDetector::new().detect(&graph, &mut diagnostics);

        let strict = PatternDetector::new().with_threshold(PatternType::SoftDelete, 0.9);
        assert!(strict.detect(&graph, &roles, &mut diagnostics).is_empty());
    }

    #[test]
    fn test_pattern_names_parse() {
        assert_eq!("scd-type2".parse::<PatternType>().unwrap(), PatternType::ScdType2);
        assert!(matches!(
            "star_schema".parse::<PatternType>(),
            Err(ConfigurationError::UnknownPattern(_))
        ));
    }
}
