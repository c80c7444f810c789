//! Mermaid ER diagram of a schema graph

use crate::graph::{QualifiedName, SchemaGraph, Table};

/// Entity name as Mermaid accepts it. Tables in the default schema keep their
/// bare name.
pub fn entity_name(name: &QualifiedName) -> String {
    let raw = if name.schema == QualifiedName::DEFAULT_SCHEMA {
        name.name.clone()
    } else {
        format!("{}_{}", name.schema, name.name)
    };
    raw.replace([' ', '.', '-'], "_")
}

fn type_token(raw: &str) -> String {
    raw.replace(' ', "_").replace(['(', ')', '[', ']', ','], "")
}

fn column_lines(table: &Table, output: &mut String) {
    for column in &table.columns {
        let mut keys = Vec::new();
        if table.is_primary_key_column(&column.name) {
            keys.push("PK");
        }
        if table.is_foreign_key_column(&column.name) {
            keys.push("FK");
        }
        let suffix = if keys.is_empty() {
            String::new()
        } else {
            format!(" {}", keys.join(","))
        };
        output.push_str(&format!(
            "        {} {}{}\n",
            type_token(&column.data_type.raw),
            column.name.replace(' ', "_"),
            suffix
        ));
    }
}

/// Render `erDiagram` syntax: one block per table, then one edge per foreign
/// key. A foreign key with any nullable column is drawn as optional
/// (`||--o{`), otherwise as required (`||--|{`).
pub fn mermaid_erd(graph: &SchemaGraph) -> String {
    let mut output = String::from("erDiagram\n\n");

    for table in graph.tables() {
        output.push_str(&format!("    {} {{\n", entity_name(&table.name)));
        column_lines(table, &mut output);
        output.push_str("    }\n\n");
    }

    for table in graph.tables() {
        for fk in &table.foreign_keys {
            let optional = table
                .columns
                .iter()
                .any(|c| c.nullable && fk.columns.contains(&c.name));
            let edge = if optional { "||--o{" } else { "||--|{" };
            output.push_str(&format!(
                "    {} {} {} : \"{}\"\n",
                entity_name(&fk.target),
                edge,
                entity_name(&table.name),
                fk.columns.join(", ")
            ));
        }
    }

    output.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Column, DataType, ForeignKey, PrimaryKey};

    fn column(name: &str, ty: &str, nullable: bool) -> Column {
        Column::new(name, DataType::from_raw(ty), nullable)
    }

    fn shop(nullable_fk: bool) -> SchemaGraph {
        let users = Table::new("public.users")
            .column(column("id", "integer", false))
            .column(column("email", "character varying(255)", false))
            .primary_key(PrimaryKey::new("users_pkey", ["id"]));
        let orders = Table::new("sales.orders")
            .column(column("id", "integer", false))
            .column(column("user_id", "integer", nullable_fk))
            .column(column("total", "numeric(10,2)", true))
            .primary_key(PrimaryKey::new("orders_pkey", ["id"]))
            .foreign_key(ForeignKey::new("orders_user_id_fkey", ["user_id"], "public.users", ["id"]));
        SchemaGraph::new([users, orders]).unwrap()
    }

    #[test]
    fn test_tables_and_columns() {
        let erd = mermaid_erd(&shop(false));
        assert!(erd.starts_with("erDiagram"));
        assert!(erd.contains("    users {"));
        assert!(erd.contains("    sales_orders {"));
        assert!(erd.contains("        integer id PK"));
        assert!(erd.contains("        character_varying255 email"));
        assert!(erd.contains("        numeric102 total"));
        assert!(erd.contains("        integer user_id FK"));
    }

    #[test]
    fn test_relationship_optionality() {
        let required = mermaid_erd(&shop(false));
        assert!(required.contains("    users ||--|{ sales_orders : \"user_id\""));

        let optional = mermaid_erd(&shop(true));
        assert!(optional.contains("    users ||--o{ sales_orders : \"user_id\""));
    }
}
