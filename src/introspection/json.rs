//! JSON snapshot dialect
//!
//! Reads a previously dumped schema:
//!
//! ```json
//! {
//!   "tables": [
//!     {
//!       "schema": "public",
//!       "name": "users",
//!       "columns": [{"name": "id", "data_type": {"raw": "bigint", "category": "integer"}, "nullable": false}],
//!       "primary_key": {"name": "users_pkey", "columns": ["id"]}
//!     }
//!   ],
//!   "intent": {"weights": {"auditability": 0.9}}
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::{IntrospectionConfig, IntrospectionResult, Introspector};
use crate::error::IntrospectionError;
use crate::graph::{SchemaGraph, Table};
use crate::intent::{Intent, IntentWeights};

/// On-disk snapshot layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub tables: Vec<Table>,
    /// Kept string-keyed until introspection so a bad key is reported as
    /// a configuration error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentWeights>,
}

impl Snapshot {
    pub fn from_graph(graph: &SchemaGraph) -> Self {
        Self {
            tables: graph.tables().cloned().collect(),
            intent: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self, IntrospectionError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), IntrospectionError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Introspector for the `json` dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSnapshotIntrospector;

impl JsonSnapshotIntrospector {
    /// Build from an in-memory snapshot, applying the schema filters
    pub fn from_snapshot(
        snapshot: Snapshot,
        config: &IntrospectionConfig,
    ) -> Result<IntrospectionResult, IntrospectionError> {
        let intent = snapshot.intent.map(Intent::try_from).transpose()?;
        let total = snapshot.tables.len();
        let tables: Vec<Table> = snapshot
            .tables
            .into_iter()
            .filter(|t| config.accepts(t))
            .collect();
        let filtered_tables = total - tables.len();
        debug!(total, filtered_tables, "snapshot tables filtered");

        let graph = SchemaGraph::new(tables)?;
        info!(tables = graph.table_count(), edges = graph.edge_count(), "snapshot loaded");

        Ok(IntrospectionResult {
            graph,
            intent,
            filtered_tables,
        })
    }

    pub fn from_json(
        json: &str,
        config: &IntrospectionConfig,
    ) -> Result<IntrospectionResult, IntrospectionError> {
        Self::from_snapshot(serde_json::from_str(json)?, config)
    }
}

impl Introspector for JsonSnapshotIntrospector {
    fn dialect(&self) -> &'static str {
        "json"
    }

    fn introspect(&self, config: &IntrospectionConfig) -> Result<IntrospectionResult, IntrospectionError> {
        let path = config
            .source
            .as_deref()
            .ok_or_else(|| IntrospectionError::MissingSource("json dialect needs a snapshot path".to_string()))?;
        Self::from_snapshot(Snapshot::load(path)?, config)
    }
}
