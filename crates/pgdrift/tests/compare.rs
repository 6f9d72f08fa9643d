//! End-to-end comparisons driven through in-memory snapshots.

use pgdrift::model::{
    AttributeDifference, Column, ForeignKey, Index, PrimaryKey, Routine, RoutineKind, Table,
    Trigger, View,
};
use pgdrift::{
    ComparisonFilter, Connector, DatabaseDiffService, DatabaseSnapshot, DifferenceType, Error,
    ObjectType, Result, SchemaExtractor, SchemaRef, SchemaSnapshot, Severity, SnapshotConnection,
    SnapshotConnector, SnapshotExtractor,
};
use indexmap::IndexMap;
use pgdrift::model::{Sequence, TypeDef};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// ---------------------------------------------------------------------------
// Collaborator wrappers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    open: AtomicUsize,
}

/// Counts connections so tests can check they are all released.
struct Counting {
    inner: SnapshotConnector,
    counters: Arc<Counters>,
}

struct Counted {
    conn: SnapshotConnection,
    counters: Arc<Counters>,
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Connector for Counting {
    type Connection = Counted;

    async fn connect(&self, target: &SchemaRef) -> Result<Counted> {
        let conn = self.inner.connect(target).await?;
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        self.counters.open.fetch_add(1, Ordering::SeqCst);
        Ok(Counted {
            conn,
            counters: self.counters.clone(),
        })
    }
}

/// Snapshot extraction, with routines optionally failing.
#[derive(Default)]
struct Extractor {
    fail_routines: bool,
}

impl SchemaExtractor<Counted> for Extractor {
    async fn tables(&self, conn: &Counted, schema: &str) -> Result<Vec<Table>> {
        SnapshotExtractor.tables(&conn.conn, schema).await
    }

    async fn views(&self, conn: &Counted, schema: &str) -> Result<Vec<View>> {
        SnapshotExtractor.views(&conn.conn, schema).await
    }

    async fn routines(&self, conn: &Counted, schema: &str) -> Result<Vec<Routine>> {
        if self.fail_routines {
            return Err(Error::Extraction(
                "permission denied for table pg_proc".to_string(),
            ));
        }
        SnapshotExtractor.routines(&conn.conn, schema).await
    }

    async fn sequences(&self, conn: &Counted, schema: &str) -> Result<Vec<Sequence>> {
        SnapshotExtractor.sequences(&conn.conn, schema).await
    }

    async fn types(&self, conn: &Counted, schema: &str) -> Result<Vec<TypeDef>> {
        SnapshotExtractor.types(&conn.conn, schema).await
    }

    async fn extensions(&self, conn: &Counted) -> Result<IndexMap<String, String>> {
        SnapshotExtractor.extensions(&conn.conn).await
    }

    async fn list_schemas(&self, conn: &Counted) -> Result<Vec<String>> {
        SnapshotExtractor.list_schemas(&conn.conn).await
    }
}

struct Harness {
    service: DatabaseDiffService<Counting, Extractor>,
    counters: Arc<Counters>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl Harness {
    fn new(databases: Vec<(&str, DatabaseSnapshot)>) -> Self {
        Self::with_extractor(databases, Extractor::default())
    }

    fn with_extractor(databases: Vec<(&str, DatabaseSnapshot)>, extractor: Extractor) -> Self {
        init_tracing();
        let mut inner = SnapshotConnector::new();
        for (key, snapshot) in databases {
            inner.insert(key, snapshot);
        }
        let counters = Arc::new(Counters::default());
        let connector = Counting {
            inner,
            counters: counters.clone(),
        };
        Self {
            service: DatabaseDiffService::new(connector, extractor),
            counters,
        }
    }

    async fn compare(&self, filter: &ComparisonFilter) -> pgdrift::SchemaComparisonResult {
        self.service
            .compare(&prod(), &staging(), filter)
            .await
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn prod() -> SchemaRef {
    SchemaRef::new("prod", "public")
}

fn staging() -> SchemaRef {
    SchemaRef::new("staging", "public")
}

fn customers(schema: &str) -> Table {
    let mut table = Table::new(schema, "customers").with_columns(vec![
        Column::new("id", "integer").not_null(),
        Column::new("email", "text").not_null(),
    ]);
    table.primary_key = Some(PrimaryKey {
        name: "customers_pkey".to_string(),
        columns: vec!["id".to_string()],
    });
    table
}

fn orders(schema: &str) -> Table {
    let mut table = Table::new(schema, "orders").with_columns(vec![
        Column::new("id", "integer").not_null(),
        Column::new("customer_id", "integer").not_null(),
        Column::new("total", "numeric(12,2)")
            .not_null()
            .with_default("0"),
    ]);
    table.primary_key = Some(PrimaryKey {
        name: "orders_pkey".to_string(),
        columns: vec!["id".to_string()],
    });
    table.foreign_keys.push(ForeignKey {
        name: "fk_orders_customer".to_string(),
        columns: vec!["customer_id".to_string()],
        referenced_schema: None,
        referenced_table: "customers".to_string(),
        referenced_columns: vec!["id".to_string()],
        update_rule: "NO ACTION".to_string(),
        delete_rule: "CASCADE".to_string(),
    });
    table.indexes.push(Index {
        name: "idx_orders_id".to_string(),
        definition: format!("CREATE INDEX idx_orders_id ON {schema}.orders USING btree (id)"),
        columns: vec!["id".to_string()],
        unique: false,
        method: "btree".to_string(),
        predicate: None,
    });
    table
}

fn function(name: &str, args: &[&str]) -> Routine {
    Routine {
        schema: "public".to_string(),
        name: name.to_string(),
        kind: RoutineKind::Function,
        argument_types: args.iter().map(|a| a.to_string()).collect(),
        return_type: Some("integer".to_string()),
        language: "sql".to_string(),
        volatility: Some("IMMUTABLE".to_string()),
        security_definer: false,
        body: "SELECT 1".to_string(),
        definition: None,
        owner: None,
        comment: None,
    }
}

fn audit_trigger(name: &str, schema: &str, when: Option<&str>) -> Trigger {
    let when = when.map(|w| format!(" WHEN ({w})")).unwrap_or_default();
    Trigger {
        name: name.to_string(),
        definition: format!(
            "CREATE TRIGGER {name} AFTER INSERT OR UPDATE ON {schema}.orders FOR EACH ROW{when} EXECUTE FUNCTION audit()"
        ),
        timing: "AFTER".to_string(),
        events: "INSERT OR UPDATE".to_string(),
        orientation: "ROW".to_string(),
        function: "audit".to_string(),
    }
}

fn order_numbers(increment: i64) -> Sequence {
    Sequence {
        schema: "public".to_string(),
        name: "order_no".to_string(),
        data_type: "bigint".to_string(),
        start_value: 1000,
        increment,
        min_value: 1,
        max_value: i64::MAX,
        cache_size: 1,
        cycle: false,
        owner: Some("app".to_string()),
    }
}

fn with_triggers_and_sequence(mut schema: SchemaSnapshot) -> SchemaSnapshot {
    schema.tables[1].triggers = vec![
        audit_trigger("orders_audit", "public", None),
        audit_trigger("orders_touch", "public", None),
    ];
    schema.sequences.push(order_numbers(1));
    schema
}

fn schema_with(tables: Vec<Table>) -> SchemaSnapshot {
    SchemaSnapshot {
        tables,
        ..Default::default()
    }
}

fn database(schema: SchemaSnapshot) -> DatabaseSnapshot {
    DatabaseSnapshot::default().with_schema("public", schema)
}

fn baseline() -> SchemaSnapshot {
    SchemaSnapshot {
        tables: vec![customers("public"), orders("public")],
        views: vec![View::new(
            "public",
            "big_orders",
            "SELECT id FROM orders WHERE total > 1000",
        )],
        routines: vec![function("order_count", &["integer"])],
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_identical_schemas_have_no_differences() {
    let harness = Harness::new(vec![
        ("prod", database(baseline())),
        ("staging", database(baseline())),
    ]);

    let result = harness.compare(&ComparisonFilter::all()).await;

    assert!(result.success);
    assert!(result.is_identical(), "{result}");
    assert_eq!(result.source, "prod.public");
    assert_eq!(result.destination, "staging.public");
}

#[tokio::test]
async fn test_extra_column_is_breaking() {
    let mut destination = baseline();
    destination.tables[1].columns.push(Column::new("notes", "text"));
    let harness = Harness::new(vec![
        ("prod", database(baseline())),
        ("staging", database(destination)),
    ]);

    let result = harness.compare(&ComparisonFilter::all()).await;

    assert!(result.success);
    assert_eq!(result.differences.len(), 1, "{result}");
    let diff = &result.differences[0];
    assert_eq!(diff.object_type, ObjectType::Column);
    assert_eq!(diff.object_name, "orders.notes");
    assert_eq!(diff.difference_type, DifferenceType::Extra);
    assert_eq!(diff.severity, Severity::Breaking);
    assert_eq!(diff.destination_definition.as_deref(), Some("\"notes\" text"));
    assert!(diff.source_definition.is_none());
}

#[tokio::test]
async fn test_missing_index_is_info_with_source_definition() {
    let mut destination = baseline();
    destination.tables[1].indexes.clear();
    let harness = Harness::new(vec![
        ("prod", database(baseline())),
        ("staging", database(destination)),
    ]);

    let result = harness.compare(&ComparisonFilter::all()).await;

    assert_eq!(result.differences.len(), 1, "{result}");
    let diff = &result.differences[0];
    assert_eq!(diff.object_type, ObjectType::Index);
    assert_eq!(diff.object_name, "orders.idx_orders_id");
    assert_eq!(diff.difference_type, DifferenceType::Missing);
    assert_eq!(diff.severity, Severity::Info);
    assert_eq!(
        diff.source_definition.as_deref(),
        Some("CREATE INDEX idx_orders_id ON public.orders USING btree (id)")
    );
}

#[tokio::test]
async fn test_foreign_key_rule_change_is_warning() {
    let mut destination = baseline();
    destination.tables[1].foreign_keys[0].delete_rule = "RESTRICT".to_string();
    let harness = Harness::new(vec![
        ("prod", database(baseline())),
        ("staging", database(destination)),
    ]);

    let result = harness.compare(&ComparisonFilter::all()).await;

    assert_eq!(result.differences.len(), 1, "{result}");
    let diff = &result.differences[0];
    assert_eq!(diff.object_type, ObjectType::ForeignKey);
    assert_eq!(diff.object_name, "orders.fk_orders_customer");
    assert_eq!(diff.difference_type, DifferenceType::Modified);
    assert_eq!(diff.severity, Severity::Warning);
    assert_eq!(
        diff.attribute_differences,
        vec![AttributeDifference::new(
            "deleteRule",
            Some("CASCADE".to_string()),
            Some("RESTRICT".to_string()),
        )]
    );
    assert!(diff.source_definition.is_some() && diff.destination_definition.is_some());
}

#[tokio::test]
async fn test_unreachable_destination_aborts_and_releases_source() {
    let harness = Harness::new(vec![("prod", database(baseline()))]);

    let result = harness.compare(&ComparisonFilter::all()).await;

    assert!(!result.success);
    assert!(result.differences.is_empty());
    let message = result.error_message.as_deref().unwrap_or_default();
    assert!(message.contains("staging.public"), "{message}");
    assert_eq!(harness.counters.opened.load(Ordering::SeqCst), 1);
    assert_eq!(harness.counters.open.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unreachable_source_opens_nothing() {
    let harness = Harness::new(vec![("staging", database(baseline()))]);

    let result = harness.compare(&ComparisonFilter::all()).await;

    assert!(!result.success);
    assert!(result.error_message.is_some());
    assert_eq!(harness.counters.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_connections_released_after_success() {
    let harness = Harness::new(vec![
        ("prod", database(baseline())),
        ("staging", database(baseline())),
    ]);

    harness.compare(&ComparisonFilter::all()).await;

    assert_eq!(harness.counters.opened.load(Ordering::SeqCst), 2);
    assert_eq!(harness.counters.open.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_kind_is_skipped_and_others_still_run() {
    let mut destination = baseline();
    destination.tables[1].columns.push(Column::new("notes", "text"));
    destination.routines.clear();
    let harness = Harness::with_extractor(
        vec![
            ("prod", database(baseline())),
            ("staging", database(destination)),
        ],
        Extractor {
            fail_routines: true,
        },
    );

    let result = harness.compare(&ComparisonFilter::all()).await;

    assert!(result.success);
    assert!(result.is_partial());
    assert!(!result.is_identical());
    assert_eq!(result.skipped_kinds.len(), 1);
    assert_eq!(result.skipped_kinds[0].object_type, ObjectType::Function);
    assert!(result.skipped_kinds[0].message.contains("permission denied"));
    assert_eq!(result.differences.len(), 1, "{result}");
    assert_eq!(result.differences[0].object_name, "orders.notes");
}

#[tokio::test]
async fn test_empty_filter_compares_nothing() {
    let harness = Harness::new(vec![
        ("prod", database(baseline())),
        ("staging", database(SchemaSnapshot::default())),
    ]);

    let result = harness.compare(&ComparisonFilter::none()).await;

    assert!(result.success);
    assert!(result.differences.is_empty());
}

#[tokio::test]
async fn test_disabled_kinds_contribute_nothing() {
    let mut destination = baseline();
    destination.views.clear();
    destination.routines.clear();
    destination.tables[1].indexes.clear();
    let harness = Harness::new(vec![
        ("prod", database(baseline())),
        ("staging", database(destination)),
    ]);

    let result = harness
        .compare(&ComparisonFilter::tables_only().with_indexes(false))
        .await;

    assert!(result.success);
    assert!(result.differences.is_empty(), "{result}");

    let result = harness.compare(&ComparisonFilter::all()).await;
    assert_eq!(result.of_type(ObjectType::View).count(), 1);
    assert_eq!(result.of_type(ObjectType::Function).count(), 1);
    assert_eq!(result.of_type(ObjectType::Index).count(), 1);
}

#[tokio::test]
async fn test_missing_table_reports_only_the_table() {
    let mut destination = baseline();
    destination.tables.retain(|t| t.name != "orders");
    let harness = Harness::new(vec![
        ("prod", database(baseline())),
        ("staging", database(destination)),
    ]);

    let result = harness
        .compare(&ComparisonFilter::tables_only())
        .await;

    assert_eq!(result.differences.len(), 1, "{result}");
    let diff = &result.differences[0];
    assert_eq!(diff.object_type, ObjectType::Table);
    assert_eq!(diff.difference_type, DifferenceType::Missing);
    assert_eq!(diff.severity, Severity::Info);
    assert!(
        diff.source_definition
            .as_deref()
            .is_some_and(|d| d.starts_with("CREATE TABLE \"public\".\"orders\""))
    );
}

#[tokio::test]
async fn test_name_pattern_limits_tables_and_views() {
    let mut destination = baseline();
    destination.tables.push(Table::new("public", "audit_log"));
    destination
        .views
        .push(View::new("public", "audit_summary", "SELECT 1"));
    destination.routines.push(function("audit", &[]));
    let harness = Harness::new(vec![
        ("prod", database(baseline())),
        ("staging", database(destination)),
    ]);

    let result = harness
        .compare(&ComparisonFilter::all().with_name_pattern("order*"))
        .await;

    // Routines are not subject to the name pattern.
    assert_eq!(result.differences.len(), 1, "{result}");
    assert_eq!(result.differences[0].object_type, ObjectType::Function);
    assert_eq!(result.differences[0].object_name, "audit()");
}

#[tokio::test]
async fn test_overloads_are_distinct_objects() {
    let mut destination = baseline();
    destination.routines.push(function("order_count", &["text"]));
    let harness = Harness::new(vec![
        ("prod", database(baseline())),
        ("staging", database(destination)),
    ]);

    let result = harness.compare(&ComparisonFilter::all()).await;

    assert_eq!(result.differences.len(), 1, "{result}");
    let diff = &result.differences[0];
    assert_eq!(diff.object_type, ObjectType::Function);
    assert_eq!(diff.object_name, "order_count(text)");
    assert_eq!(diff.difference_type, DifferenceType::Extra);
    assert_eq!(diff.severity, Severity::Breaking);
}

#[tokio::test]
async fn test_cross_database_on_one_instance() {
    let mut archive = baseline();
    archive.tables[1].columns[2].data_type = "numeric(14,2)".to_string();
    let harness = Harness::new(vec![
        ("prod", database(baseline())),
        ("prod:archive", database(archive)),
    ]);

    let destination = SchemaRef::new("prod", "public").with_database("archive");
    let result = harness
        .service
        .compare(&prod(), &destination, &ComparisonFilter::all())
        .await;

    assert!(result.success);
    assert_eq!(result.destination, "prod:archive.public");
    assert_eq!(result.differences.len(), 1, "{result}");
    let diff = &result.differences[0];
    assert_eq!(diff.object_name, "orders.total");
    assert_eq!(diff.severity, Severity::Warning);
    assert_eq!(diff.attribute_differences[0].attribute_name, "dataType");
}

#[tokio::test]
async fn test_different_schema_names_compare_by_object_name() {
    let staging_schema = SchemaSnapshot {
        tables: vec![customers("staging"), orders("staging")],
        ..Default::default()
    };
    let harness = Harness::new(vec![(
        "prod",
        DatabaseSnapshot::default()
            .with_schema("public", schema_with(vec![customers("public"), orders("public")]))
            .with_schema("staging", staging_schema),
    )]);

    let result = harness
        .service
        .compare(
            &prod(),
            &SchemaRef::new("prod", "staging"),
            &ComparisonFilter::all(),
        )
        .await;

    assert!(result.success);
    assert!(result.is_identical(), "{result}");
}

#[tokio::test]
async fn test_loosened_nullability_is_warning() {
    let mut destination = baseline();
    destination.tables[1].columns[1].nullable = true;
    let harness = Harness::new(vec![
        ("prod", database(baseline())),
        ("staging", database(destination)),
    ]);

    let result = harness.compare(&ComparisonFilter::all()).await;

    assert_eq!(result.differences.len(), 1, "{result}");
    assert_eq!(result.differences[0].object_name, "orders.customer_id");
    assert_eq!(result.differences[0].severity, Severity::Warning);
}

#[tokio::test]
async fn test_extension_version_change() {
    let harness = Harness::new(vec![
        (
            "prod",
            database(baseline()).with_extension("pgcrypto", "1.3"),
        ),
        (
            "staging",
            database(baseline())
                .with_extension("pgcrypto", "1.2")
                .with_extension("pg_trgm", "1.6"),
        ),
    ]);

    let result = harness.compare(&ComparisonFilter::all()).await;

    assert_eq!(result.differences.len(), 2, "{result}");
    let modified = &result.differences[0];
    assert_eq!(modified.object_name, "pgcrypto");
    assert_eq!(modified.difference_type, DifferenceType::Modified);
    assert_eq!(modified.severity, Severity::Info);
    let extra = &result.differences[1];
    assert_eq!(extra.object_name, "pg_trgm");
    assert_eq!(extra.severity, Severity::Breaking);
}

#[tokio::test]
async fn test_repeated_comparisons_agree() {
    let mut destination = baseline();
    destination.tables[1].columns.push(Column::new("notes", "text"));
    destination.tables[1].indexes.clear();
    destination.tables.push(Table::new("public", "zz_extra"));
    let harness = Harness::new(vec![
        ("prod", database(baseline())),
        ("staging", database(destination)),
    ]);

    let first = harness.compare(&ComparisonFilter::all()).await;
    let second = harness.compare(&ComparisonFilter::all()).await;

    assert_eq!(first.differences, second.differences);
    let names: Vec<&str> = first
        .differences
        .iter()
        .map(|d| d.object_name.as_str())
        .collect();
    assert_eq!(names, ["zz_extra", "orders.notes", "orders.idx_orders_id"]);
}

#[tokio::test]
async fn test_trigger_and_sequence_drift() {
    let mut destination = with_triggers_and_sequence(baseline());
    destination.tables[1].triggers = vec![audit_trigger(
        "orders_audit",
        "public",
        Some("(new.total > 0)"),
    )];
    destination.sequences[0].increment = 10;
    let harness = Harness::new(vec![
        ("prod", database(with_triggers_and_sequence(baseline()))),
        ("staging", database(destination)),
    ]);

    let result = harness.compare(&ComparisonFilter::all()).await;

    assert!(result.success);
    assert_eq!(result.differences.len(), 3, "{result}");

    let changed = &result.differences[0];
    assert_eq!(changed.object_type, ObjectType::Trigger);
    assert_eq!(changed.object_name, "orders.orders_audit");
    assert_eq!(changed.difference_type, DifferenceType::Modified);
    assert_eq!(changed.severity, Severity::Warning);
    assert_eq!(changed.attribute_differences[0].attribute_name, "definition");

    let missing = &result.differences[1];
    assert_eq!(missing.object_type, ObjectType::Trigger);
    assert_eq!(missing.object_name, "orders.orders_touch");
    assert_eq!(missing.difference_type, DifferenceType::Missing);
    assert_eq!(missing.severity, Severity::Warning);

    let sequence = &result.differences[2];
    assert_eq!(sequence.object_type, ObjectType::Sequence);
    assert_eq!(sequence.object_name, "order_no");
    assert_eq!(sequence.difference_type, DifferenceType::Modified);
    assert_eq!(sequence.severity, Severity::Info);
    assert_eq!(
        sequence.attribute_differences,
        vec![AttributeDifference::new(
            "increment",
            Some("1".to_string()),
            Some("10".to_string()),
        )]
    );
}

#[tokio::test]
async fn test_disabling_tables_hides_every_table_part() {
    let source = with_triggers_and_sequence(baseline());
    let mut destination = with_triggers_and_sequence(baseline());
    destination.tables[1].columns.push(Column::new("notes", "text"));
    destination.tables[1].indexes.clear();
    destination.tables[1].triggers.pop();
    destination.tables.push(Table::new("public", "audit_log"));
    destination.views[0].definition = "SELECT id FROM orders".to_string();
    let harness = Harness::new(vec![
        ("prod", database(source)),
        ("staging", database(destination)),
    ]);

    let result = harness
        .compare(&ComparisonFilter::all().with_tables(false))
        .await;

    assert!(result.success);
    assert_eq!(
        result
            .differences
            .iter()
            .filter(|d| d.object_type.is_table_part())
            .count(),
        0,
        "{result}"
    );
    assert_eq!(result.differences.len(), 1, "{result}");
    assert_eq!(result.differences[0].object_type, ObjectType::View);

    let result = harness.compare(&ComparisonFilter::all()).await;
    assert_eq!(result.of_type(ObjectType::Table).count(), 1);
    assert_eq!(result.of_type(ObjectType::Column).count(), 1);
    assert_eq!(result.of_type(ObjectType::Index).count(), 1);
    assert_eq!(result.of_type(ObjectType::Trigger).count(), 1);
}
