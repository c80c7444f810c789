//! End-to-end analysis tests
//!
//! Runs the full pipeline over a small shop schema snapshot: introspection,
//! roles, patterns, tensions and the report renderers.

use flaqes::analysis::{RoleRule, Signal};
use flaqes::graph::{Column, DataType, DiagnosticCode, QualifiedName, Table};
use flaqes::introspection::{
    IntrospectionConfig, IntrospectionResult, IntrospectorRegistry, JsonSnapshotIntrospector, Snapshot,
};
use flaqes::report::{mermaid_erd, render_markdown, SchemaReport};
use flaqes::{
    analyze_schema, AnalysisConfig, Analyzer, DetectionError, Intent, PatternDetector, PatternType,
    RoleDetector, RoleType, SchemaGraph, TensionAnalyzer,
};

fn shop() -> IntrospectionResult {
    JsonSnapshotIntrospector::from_json(include_str!("fixtures/shop.json"), &IntrospectionConfig::default())
        .unwrap()
}

fn name(qualified: &str) -> QualifiedName {
    QualifiedName::parse(qualified)
}

// =============================================================================
// Graph
// =============================================================================

#[test]
fn test_table_lookup() {
    let graph = shop().graph;

    assert_eq!(graph.table_count(), 5);
    assert!(graph.lookup(&name("public.users")).is_some());
    assert!(graph.lookup(&name("public.orders")).is_some());
    assert!(graph.lookup(&name("public.missing")).is_none());
    assert_eq!(graph.fan_in(&name("public.orders")), 1);
}

#[test]
fn test_dangling_reference_is_a_warning() {
    let result = shop();
    let warnings: Vec<_> = result
        .graph
        .warnings()
        .with_code(DiagnosticCode::DanglingForeignKey)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("public.coupons"));

    let analysis = analyze_schema(&result.graph, None).unwrap();
    assert!(!analysis.diagnostics.has_errors());
    assert_eq!(analysis.diagnostics.with_code(DiagnosticCode::DanglingForeignKey).count(), 1);
}

// =============================================================================
// Roles and Patterns
// =============================================================================

#[test]
fn test_roles() {
    let graph = shop().graph;
    let analysis = analyze_schema(&graph, None).unwrap();

    let items = analysis.role_of(&name("public.order_items")).unwrap();
    assert_eq!(items.primary(), RoleType::Junction);
    assert!(items.confidence() >= 0.8);

    assert_eq!(analysis.primary_role(&name("public.order_statuses")), Some(RoleType::Lookup));
    assert_eq!(analysis.primary_role(&name("public.users")), Some(RoleType::Entity));
    assert_eq!(analysis.roles.len(), graph.table_count());
}

#[test]
fn test_junction_pattern_involves_both_targets() {
    let analysis = analyze_schema(&shop().graph, None).unwrap();
    let junction = analysis
        .patterns
        .iter()
        .find(|p| p.pattern_type == PatternType::JunctionTable)
        .unwrap();

    assert_eq!(junction.table(), &name("public.order_items"));
    assert!(junction.tables.contains(&name("public.orders")));
    assert!(junction.tables.contains(&name("public.products")));
}

#[test]
fn test_soft_delete_requires_nullable_marker() {
    let users = name("public.users");
    let result = shop();
    let analysis = analyze_schema(&result.graph, None).unwrap();
    assert!(analysis
        .patterns_on(&users)
        .any(|p| p.pattern_type == PatternType::SoftDelete));

    let mut snapshot = Snapshot::from_graph(&result.graph);
    for table in snapshot.tables.iter_mut().filter(|t| t.name == users) {
        for column in table.columns.iter_mut().filter(|c| c.name == "deleted_at") {
            column.nullable = false;
        }
    }
    let strict = JsonSnapshotIntrospector::from_snapshot(snapshot, &IntrospectionConfig::default()).unwrap();
    let analysis = analyze_schema(&strict.graph, None).unwrap();
    assert!(!analysis
        .patterns_on(&users)
        .any(|p| p.pattern_type == PatternType::SoftDelete));
}

#[test]
fn test_disabled_pattern_is_not_reported() {
    let graph = shop().graph;
    let config = AnalysisConfig::default().disable(PatternType::SoftDelete);
    let analysis = Analyzer::new(config).unwrap().analyze(&graph);

    assert!(analysis.patterns.iter().all(|p| p.pattern_type != PatternType::SoftDelete));
    assert!(analysis.tensions.iter().all(|t| t.pattern != Some(PatternType::SoftDelete)));
}

// =============================================================================
// Tensions
// =============================================================================

#[test]
fn test_tensions_are_ranked() {
    let analysis = analyze_schema(&shop().graph, None).unwrap();
    assert!(!analysis.tensions.is_empty());

    for pair in analysis.tensions.windows(2) {
        assert!(pair[0].severity >= pair[1].severity);
        if pair[0].severity == pair[1].severity {
            assert!(pair[0].min_effort() <= pair[1].min_effort());
        }
    }
    for tension in &analysis.tensions {
        assert!(!tension.alternatives.is_empty(), "{}", tension.id);
    }
}

#[test]
fn test_intent_changes_soft_delete_verdict() {
    let graph = shop().graph;
    let soft_delete = |intent: Intent| {
        analyze_schema(&graph, Some(intent))
            .unwrap()
            .tensions
            .iter()
            .any(|t| t.id == "soft_delete_read_overhead")
    };

    assert!(soft_delete(Intent::balanced()));
    assert!(!soft_delete(Intent::audit_heavy()));
}

#[test]
fn test_default_intent_is_balanced() {
    let graph = shop().graph;
    assert_eq!(
        analyze_schema(&graph, None).unwrap(),
        analyze_schema(&graph, Some(Intent::balanced())).unwrap()
    );
}

#[test]
fn test_analysis_is_deterministic() {
    let graph = shop().graph;
    let first = analyze_schema(&graph, Some(Intent::oltp())).unwrap();
    let second = analyze_schema(&graph, Some(Intent::oltp())).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(first.fingerprint, graph.fingerprint());
}

// =============================================================================
// Rule Isolation
// =============================================================================

struct Exploding;

impl RoleRule for Exploding {
    fn name(&self) -> &'static str {
        "exploding"
    }

    fn evaluate(&self, table: &Table, _graph: &SchemaGraph) -> Result<Vec<Signal>, DetectionError> {
        if table.name.name == "orders" {
            panic!("cannot classify {}", table.name);
        }
        Ok(Vec::new())
    }
}

#[test]
fn test_failing_role_rule_does_not_abort_the_run() {
    let graph = shop().graph;
    let mut roles = RoleDetector::new();
    roles.push_rule(Box::new(Exploding));
    let analyzer = Analyzer::from_stages(roles, PatternDetector::new(), TensionAnalyzer::default());

    let analysis = analyzer.analyze(&graph);
    let failures: Vec<_> = analysis.diagnostics.with_code(DiagnosticCode::RoleRuleFailed).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].table, Some(name("public.orders")));

    let baseline = analyze_schema(&graph, None).unwrap();
    assert_eq!(analysis.roles, baseline.roles);
    assert_eq!(analysis.patterns, baseline.patterns);
}

// =============================================================================
// Introspection and Reports
// =============================================================================

#[test]
fn test_snapshot_round_trip_through_registry() {
    let graph = shop().graph;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.json");
    Snapshot::from_graph(&graph).save(&path).unwrap();

    let registry = IntrospectorRegistry::with_defaults();
    let reloaded = registry
        .create("JSON")
        .unwrap()
        .introspect(&IntrospectionConfig::from_source(&path))
        .unwrap();

    assert_eq!(reloaded.graph.fingerprint(), graph.fingerprint());
    assert!(reloaded.intent.is_none());
}

#[test]
fn test_schema_filter_drops_tables() {
    let mut snapshot = Snapshot::from_graph(&shop().graph);
    snapshot.tables.push(
        Table::new("staging.raw_orders")
            .column(Column::new("payload", DataType::from_raw("jsonb"), true)),
    );

    let config = IntrospectionConfig::default().include_schema("public");
    let result = JsonSnapshotIntrospector::from_snapshot(snapshot, &config).unwrap();
    assert_eq!(result.filtered_tables, 1);
    assert_eq!(result.graph.table_count(), 5);
}

#[test]
fn test_erd() {
    let erd = mermaid_erd(&shop().graph);

    assert!(erd.starts_with("erDiagram"));
    assert!(erd.contains("    order_items {"));
    assert!(erd.contains("        bigint order_id PK,FK"));
    assert!(erd.contains("    users ||--|{ orders : \"user_id\""));
    assert!(erd.contains("    order_statuses ||--o{ orders : \"status_code\""));
}

#[test]
fn test_report() {
    let graph = shop().graph;
    let analysis = analyze_schema(&graph, None).unwrap();

    let summary = SchemaReport::new(&graph, &analysis);
    assert_eq!(summary.table_count, 5);
    assert_eq!(summary.roles.get(&RoleType::Junction), Some(&1));
    assert_eq!(summary.severities.values().sum::<usize>(), analysis.tensions.len());

    let markdown = render_markdown(&graph, &analysis);
    assert!(markdown.contains("## Design tensions"));
    assert!(markdown.contains("| public.order_items | junction |"));
    assert!(markdown.contains("## Diagnostics"));
}
