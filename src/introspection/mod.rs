//! Introspection Boundary
//!
//! Turns some external description of a database into a [`SchemaGraph`].
//! One [`Introspector`] per dialect, selected through a caller-owned
//! [`IntrospectorRegistry`]. There is no process-wide registry.

pub mod json;

pub use json::{JsonSnapshotIntrospector, Snapshot};

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::IntrospectionError;
use crate::graph::{SchemaGraph, Table};
use crate::intent::Intent;

/// What to introspect
#[derive(Debug, Clone, Default)]
pub struct IntrospectionConfig {
    /// Snapshot file, connection string file, ...
    pub source: Option<PathBuf>,
    /// Only these schemas when non-empty
    pub include_schemas: Vec<String>,
    pub exclude_schemas: Vec<String>,
}

impl IntrospectionConfig {
    pub fn from_source(source: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    pub fn include_schema(mut self, schema: impl Into<String>) -> Self {
        self.include_schemas.push(schema.into());
        self
    }

    pub fn exclude_schema(mut self, schema: impl Into<String>) -> Self {
        self.exclude_schemas.push(schema.into());
        self
    }

    /// Whether a table's schema passes the include/exclude filters
    pub fn accepts(&self, table: &Table) -> bool {
        let schema = &table.name.schema;
        (self.include_schemas.is_empty() || self.include_schemas.contains(schema))
            && !self.exclude_schemas.contains(schema)
    }
}

/// Graph plus whatever else the source knew
#[derive(Debug)]
pub struct IntrospectionResult {
    /// Construction warnings are available through `graph.warnings()`
    pub graph: SchemaGraph,
    /// Intent stored alongside the schema, if any
    pub intent: Option<Intent>,
    /// Tables dropped by the schema filters
    pub filtered_tables: usize,
}

pub trait Introspector: Send + Sync {
    /// Dialect name this introspector is registered under
    fn dialect(&self) -> &'static str;

    fn introspect(&self, config: &IntrospectionConfig) -> Result<IntrospectionResult, IntrospectionError>;
}

pub type IntrospectorConstructor = fn() -> Box<dyn Introspector>;

/// Dialect name -> constructor
#[derive(Default)]
pub struct IntrospectorRegistry {
    constructors: BTreeMap<String, IntrospectorConstructor>,
}

impl IntrospectorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in dialect
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("json", || Box::new(JsonSnapshotIntrospector));
        registry
    }

    /// Register (or replace) a dialect
    pub fn register(&mut self, dialect: &str, constructor: IntrospectorConstructor) {
        self.constructors.insert(dialect.to_lowercase(), constructor);
    }

    pub fn create(&self, dialect: &str) -> Result<Box<dyn Introspector>, IntrospectionError> {
        self.constructors
            .get(&dialect.to_lowercase())
            .map(|construct| construct())
            .ok_or_else(|| IntrospectionError::UnknownDialect(dialect.to_string()))
    }

    pub fn dialects(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}
