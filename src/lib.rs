//! flaqes
//!
//! A schema critic for relational databases. Given a structural model of
//! tables, keys, constraints and indexes it infers each table's role,
//! recognizes recurring design patterns and, weighed against a stated
//! [`Intent`], surfaces ranked design tensions with concrete alternatives.
//!
//! ## Features
//!
//! - **Role Detection**: entity, fact, dimension, junction, lookup, audit, system
//! - **Pattern Detection**: soft delete, SCD type 2, polymorphic association,
//!   junction tables, natural keys, EAV, json payloads, audit timestamps
//! - **Tension Analysis**: intent-aware cost profiles, severity and effort ranking
//! - **Deterministic**: identical input always yields identical, ordered output
//!
//! ## Architecture
//!
//! ```text
//! introspection ──► SchemaGraph ──► roles ──► patterns ──► tensions ──► report
//!   (json, ...)      (immutable)                             ▲
//!                                                          Intent
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use flaqes::introspection::{IntrospectionConfig, IntrospectorRegistry};
//! use flaqes::{analyze_schema, Intent};
//!
//! # fn main() -> flaqes::Result<()> {
//! let registry = IntrospectorRegistry::with_defaults();
//! let result = registry
//!     .create("json")?
//!     .introspect(&IntrospectionConfig::from_source("schema.json"))?;
//!
//! let analysis = analyze_schema(&result.graph, Some(Intent::oltp()))?;
//! for tension in &analysis.tensions {
//!     println!("[{}] {}", tension.severity, tension.description);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod graph;
pub mod intent;
pub mod introspection;
pub mod report;

pub use analysis::{
    analyze_schema, Analysis, Analyzer, DesignTension, DetectedPattern, PatternDetector,
    PatternType, RoleDetector, RoleType, Severity, TableRoleResult, TensionAnalyzer,
};
pub use config::{AnalysisConfig, CriticConfig};
pub use error::{
    ConfigurationError, CriticError, DetectionError, GraphConstructionError, IntrospectionError,
    Result,
};
pub use graph::{Diagnostics, QualifiedName, SchemaGraph, Table};
pub use intent::{Intent, IntentWeights, Priority};
