//! Graph Construction
//!
//! Assembles a `SchemaGraph` from tables handed over by introspection:
//! rejects duplicate names, indexes foreign key edges, records dangling
//! references as warnings and fingerprints the structure.

use petgraph::graph::DiGraph;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{Diagnostics, SchemaGraph, Table};
use crate::error::GraphConstructionError;

/// Collects tables, then builds an immutable graph in one step
#[derive(Debug, Default)]
pub struct GraphBuilder {
    tables: Vec<Table>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    pub fn tables(mut self, tables: impl IntoIterator<Item = Table>) -> Self {
        self.tables.extend(tables);
        self
    }

    /// Build the graph. Fails on the first duplicate qualified name.
    pub fn build(self) -> Result<SchemaGraph, GraphConstructionError> {
        let table_count = self.tables.len();

        let mut graph = DiGraph::with_capacity(table_count, table_count * 2);
        let mut by_name = HashMap::with_capacity(table_count);
        let mut node_indices = HashMap::with_capacity(table_count);
        let mut hasher = Sha256::new();

        for (idx, table) in self.tables.iter().enumerate() {
            if by_name.insert(table.name.clone(), idx).is_some() {
                return Err(GraphConstructionError::DuplicateTable {
                    name: table.name.clone(),
                });
            }

            let node_idx = graph.add_node(table.name.clone());
            node_indices.insert(table.name.clone(), node_idx);

            // Table serialization is field-ordered, so the digest is stable
            let canonical = serde_json::to_string(table).map_err(|e| GraphConstructionError::Fingerprint {
                name: table.name.clone(),
                reason: e.to_string(),
            })?;
            hasher.update(canonical.as_bytes());
            hasher.update(b"\n");
        }

        // Create edges
        let mut warnings = Diagnostics::new();
        for table in &self.tables {
            let from_idx = node_indices[&table.name];

            for (fk_pos, fk) in table.foreign_keys.iter().enumerate() {
                if fk.columns.len() != fk.target_columns.len() {
                    warn!(table = %table.name, fk = %fk.name, "foreign key arity mismatch");
                    warnings.arity_mismatch(&table.name, &fk.name, fk.columns.len(), fk.target_columns.len());
                }

                match node_indices.get(&fk.target) {
                    Some(&to_idx) => {
                        graph.add_edge(from_idx, to_idx, fk_pos);
                    }
                    None => {
                        warn!(table = %table.name, fk = %fk.name, target = %fk.target, "dangling foreign key");
                        warnings.dangling_foreign_key(&table.name, &fk.name, &fk.target);
                    }
                }
            }
        }

        let fingerprint = format!("{:x}", hasher.finalize());
        debug!(
            tables = table_count,
            edges = graph.edge_count(),
            dangling = warnings.len(),
            "schema graph built"
        );

        Ok(SchemaGraph {
            tables: self.tables,
            by_name,
            graph,
            node_indices,
            fingerprint,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Column, DataType, DiagnosticCode, ForeignKey, QualifiedName};

    fn table(name: &str) -> Table {
        Table::new(name).column(Column::new("id", DataType::from_raw("integer"), false))
    }

    #[test]
    fn test_duplicate_table_is_fatal() {
        let result = GraphBuilder::new()
            .table(table("public.users"))
            .table(table("public.users"))
            .build();

        assert_eq!(
            result.unwrap_err(),
            GraphConstructionError::DuplicateTable {
                name: QualifiedName::parse("public.users")
            }
        );
    }

    #[test]
    fn test_same_name_in_different_schemas_is_allowed() {
        let graph = GraphBuilder::new()
            .table(table("public.users"))
            .table(table("auth.users"))
            .build()
            .unwrap();
        assert_eq!(graph.table_count(), 2);
    }

    #[test]
    fn test_dangling_foreign_key_is_a_warning() {
        let orders = table("public.orders")
            .column(Column::new("user_id", DataType::from_raw("integer"), false))
            .foreign_key(ForeignKey::new("orders_user_fk", ["user_id"], "auth.users", ["id"]));

        let graph = GraphBuilder::new().table(orders).build().unwrap();
        assert_eq!(graph.edge_count(), 0);
        let dangling: Vec<_> = graph.warnings().with_code(DiagnosticCode::DanglingForeignKey).collect();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].table, Some(QualifiedName::parse("public.orders")));
    }

    #[test]
    fn test_fingerprint_is_stable_and_order_sensitive() {
        let a = GraphBuilder::new()
            .tables([table("public.a"), table("public.b")])
            .build()
            .unwrap();
        let again = GraphBuilder::new()
            .tables([table("public.a"), table("public.b")])
            .build()
            .unwrap();
        let swapped = GraphBuilder::new()
            .tables([table("public.b"), table("public.a")])
            .build()
            .unwrap();

        assert_eq!(a.fingerprint(), again.fingerprint());
        assert_ne!(a.fingerprint(), swapped.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_covers_table_structure() {
        let strict = GraphBuilder::new().table(table("public.a")).build().unwrap();
        let loose = GraphBuilder::new()
            .table(Table::new("public.a").column(Column::new("id", DataType::from_raw("integer"), true)))
            .build()
            .unwrap();
        let empty = format!("{:x}", Sha256::digest(b"\n"));

        assert_ne!(strict.fingerprint(), loose.fingerprint());
        assert_ne!(strict.fingerprint(), empty);
    }
}
