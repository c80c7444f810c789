//! Schema Graph
//!
//! Immutable structural model of a database: tables keyed by schema-qualified
//! name, in the order introspection presented them. Foreign keys are indexed
//! in a petgraph directed graph (referencing table -> referenced table) so
//! fan-in questions are cheap.
//!
//! Every analysis stage consumes the same `SchemaGraph` read-only.

pub mod builder;
pub mod diagnostics;
pub mod model;

pub use builder::GraphBuilder;
pub use diagnostics::{DiagnosticCode, DiagnosticItem, DiagnosticLevel, Diagnostics};
pub use model::{
    Column, Constraint, ConstraintType, DataType, DataTypeCategory, ForeignKey, Index,
    IndexMethod, PrimaryKey, QualifiedName, ReferentialAction, Table,
};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::GraphConstructionError;

// =============================================================================
// Relationships
// =============================================================================

/// Multiplicity between two related tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    /// One referenced (parent) row to many referencing (child) rows
    OneToMany,
    ManyToMany,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneToOne => write!(f, "1:1"),
            Self::OneToMany => write!(f, "1:N"),
            Self::ManyToMany => write!(f, "N:M"),
        }
    }
}

/// Relationship derived from a foreign key (or from a junction table's pair of
/// foreign keys). Never stored; computed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Table holding the foreign key (for many-to-many: the first side)
    pub source: QualifiedName,
    /// Referenced table (for many-to-many: the second side)
    pub target: QualifiedName,
    /// Foreign key name, or the junction table name for composed relationships
    pub constraint: String,
    pub source_columns: Vec<String>,
    pub target_columns: Vec<String>,
    pub cardinality: Cardinality,
    /// False when a referenced table is missing from the graph
    pub target_resolved: bool,
    /// Junction table a many-to-many relationship was composed through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<QualifiedName>,
}

// =============================================================================
// Schema Graph
// =============================================================================

/// The schema graph. Built once by [`GraphBuilder`], never mutated afterwards.
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    /// Tables in insertion order
    pub(crate) tables: Vec<Table>,

    /// Index: qualified name -> position in `tables`
    pub(crate) by_name: HashMap<QualifiedName, usize>,

    /// Foreign key edges between resolved tables; edge weight is the FK
    /// position within the referencing table
    pub(crate) graph: DiGraph<QualifiedName, usize>,

    /// Node index lookup: qualified name -> NodeIndex
    pub(crate) node_indices: HashMap<QualifiedName, NodeIndex>,

    /// Hex SHA-256 over the canonical table structure
    pub(crate) fingerprint: String,

    /// Non-fatal construction warnings
    pub(crate) warnings: Diagnostics,
}

impl SchemaGraph {
    /// Build a graph from tables in introspection order
    pub fn new(tables: impl IntoIterator<Item = Table>) -> Result<Self, GraphConstructionError> {
        GraphBuilder::new().tables(tables).build()
    }

    // ========== Public API ==========

    /// Tables in insertion order. Call again to restart.
    pub fn tables(&self) -> impl Iterator<Item = &Table> + '_ {
        self.tables.iter()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Find a table. Absence is normal: foreign keys may dangle.
    pub fn lookup(&self, name: &QualifiedName) -> Option<&Table> {
        self.by_name.get(name).map(|&idx| &self.tables[idx])
    }

    /// Convenience lookup by `schema.name` string
    pub fn lookup_str(&self, qualified: &str) -> Option<&Table> {
        self.lookup(&QualifiedName::parse(qualified))
    }

    pub fn contains(&self, name: &QualifiedName) -> bool {
        self.by_name.contains_key(name)
    }

    /// Number of foreign key edges between tables present in the graph
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn warnings(&self) -> &Diagnostics {
        &self.warnings
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Distinct other tables holding a foreign key to `name`, in insertion order
    pub fn referencing(&self, name: &QualifiedName) -> Vec<&QualifiedName> {
        let Some(&node_idx) = self.node_indices.get(name) else {
            return Vec::new();
        };

        // Node indices follow insertion order
        let sources: BTreeSet<NodeIndex> = self
            .graph
            .edges_directed(node_idx, Direction::Incoming)
            .map(|e| e.source())
            .filter(|&source| source != node_idx)
            .collect();

        sources
            .into_iter()
            .filter_map(|idx| self.graph.node_weight(idx))
            .collect()
    }

    /// Fan-in: how many other tables reference this one
    pub fn fan_in(&self, name: &QualifiedName) -> usize {
        self.referencing(name).len()
    }

    /// Every foreign key (with its owning table) that targets `name`
    pub fn foreign_keys_into<'a>(
        &'a self,
        name: &'a QualifiedName,
    ) -> impl Iterator<Item = (&'a Table, &'a ForeignKey)> + 'a {
        self.tables.iter().flat_map(move |table| {
            table
                .foreign_keys
                .iter()
                .filter(move |fk| &fk.target == name)
                .map(move |fk| (table, fk))
        })
    }

    /// Relationships derived from foreign keys, followed by many-to-many
    /// relationships composed through junction tables. Lazy; call again to
    /// restart.
    pub fn relationships(&self) -> impl Iterator<Item = Relationship> + '_ {
        let direct = self.tables.iter().flat_map(move |table| {
            table
                .foreign_keys
                .iter()
                .map(move |fk| self.relationship_for(table, fk))
        });
        let composed = self
            .tables
            .iter()
            .filter_map(move |table| self.junction_relationship(table));

        direct.chain(composed)
    }

    fn relationship_for(&self, table: &Table, fk: &ForeignKey) -> Relationship {
        let source_unique = table.is_unique_set(&fk.columns);
        let target = self.lookup(&fk.target);
        // A foreign key can only reference a unique key, so an unknown target
        // is assumed unique on its side
        let target_unique = target.map_or(true, |t| t.is_unique_set(&fk.target_columns));

        let cardinality = match (source_unique, target_unique) {
            (true, true) => Cardinality::OneToOne,
            (false, false) => Cardinality::ManyToMany,
            _ => Cardinality::OneToMany,
        };

        Relationship {
            source: table.name.clone(),
            target: fk.target.clone(),
            constraint: fk.name.clone(),
            source_columns: fk.columns.clone(),
            target_columns: fk.target_columns.clone(),
            cardinality,
            target_resolved: target.is_some(),
            via: None,
        }
    }

    /// A table whose primary key is exactly the union of two foreign keys
    /// links their targets many-to-many
    fn junction_relationship(&self, table: &Table) -> Option<Relationship> {
        let pk = table.primary_key.as_ref()?;
        if !pk.is_composite() || table.foreign_keys.len() != 2 {
            return None;
        }

        let (left, right) = (&table.foreign_keys[0], &table.foreign_keys[1]);
        let union: BTreeSet<&String> = left.columns.iter().chain(right.columns.iter()).collect();
        let key: BTreeSet<&String> = pk.columns.iter().collect();
        if union != key {
            return None;
        }

        Some(Relationship {
            source: left.target.clone(),
            target: right.target.clone(),
            constraint: table.name.to_string(),
            source_columns: left.target_columns.clone(),
            target_columns: right.target_columns.clone(),
            cardinality: Cardinality::ManyToMany,
            target_resolved: self.contains(&left.target) && self.contains(&right.target),
            via: Some(table.name.clone()),
        })
    }
}
