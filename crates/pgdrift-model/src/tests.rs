use super::*;

fn orders_fk(delete_rule: &str) -> ForeignKey {
    ForeignKey {
        name: "fk_orders_customer".to_string(),
        columns: vec!["customer_id".to_string()],
        referenced_schema: None,
        referenced_table: "customers".to_string(),
        referenced_columns: vec!["id".to_string()],
        update_rule: "NO ACTION".to_string(),
        delete_rule: delete_rule.to_string(),
    }
}

fn routine(name: &str, args: &[&str]) -> Routine {
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

#[test]
fn test_foreign_key_delete_rule_difference() {
    let diffs = orders_fk("CASCADE").differences_from(&orders_fk("RESTRICT"));
    assert_eq!(
        diffs,
        vec![AttributeDifference::new(
            "deleteRule",
            Some("CASCADE".to_string()),
            Some("RESTRICT".to_string())
        )]
    );
}

#[test]
fn test_foreign_key_definition() {
    let mut fk = orders_fk("CASCADE");
    assert_eq!(
        fk.definition().as_deref(),
        Some(
            "CONSTRAINT \"fk_orders_customer\" FOREIGN KEY (\"customer_id\") REFERENCES \"customers\" (\"id\") ON UPDATE NO ACTION ON DELETE CASCADE"
        )
    );

    fk.referenced_schema = Some("crm".to_string());
    assert!(
        fk.definition()
            .unwrap()
            .contains("REFERENCES \"crm\".\"customers\" (\"id\")")
    );
}

#[test]
fn test_overloaded_routines_have_distinct_keys() {
    let a = routine("total", &["integer"]);
    let b = routine("total", &["integer", "numeric"]);
    assert_eq!(a.identity_key(), "total(integer)");
    assert_eq!(b.identity_key(), "total(integer, numeric)");
    assert_ne!(a.identity_key(), b.identity_key());
}

#[test]
fn test_routine_definition_prefers_stored_text() {
    let mut r = routine("total", &[]);
    assert_eq!(
        r.definition().as_deref(),
        Some("CREATE FUNCTION \"public\".\"total\"() RETURNS integer LANGUAGE sql AS $$\nSELECT 1\n$$;")
    );

    r.definition = Some("CREATE OR REPLACE FUNCTION public.total() ...".to_string());
    assert_eq!(
        r.definition().as_deref(),
        Some("CREATE OR REPLACE FUNCTION public.total() ...")
    );
}

#[test]
fn test_column_differences_are_ordered() {
    let source = Column::new("total", "numeric").not_null();
    let dest = Column::new("total", "integer").with_default("0");
    let names: Vec<_> = source
        .differences_from(&dest)
        .into_iter()
        .map(|d| d.attribute_name)
        .collect();
    assert_eq!(names, vec!["dataType", "nullable", "defaultValue"]);
}

#[test]
fn test_column_definition() {
    let col = Column::new("created_at", "timestamp with time zone")
        .not_null()
        .with_default("now()");
    assert_eq!(
        col.definition().as_deref(),
        Some("\"created_at\" timestamp with time zone NOT NULL DEFAULT now()")
    );

    let mut generated = Column::new("total_cents", "bigint").with_default("total * 100");
    generated.generated = true;
    assert_eq!(
        generated.definition().as_deref(),
        Some("\"total_cents\" bigint GENERATED ALWAYS AS (total * 100) STORED")
    );
}

#[test]
fn test_table_definition_inlines_constraints() {
    let mut table = Table::new("public", "orders").with_columns([
        Column::new("id", "integer").not_null(),
        Column::new("total", "numeric"),
    ]);
    table.primary_key = Some(PrimaryKey {
        name: "orders_pkey".to_string(),
        columns: vec!["id".to_string()],
    });
    table.check_constraints.push(CheckConstraint {
        name: "orders_total_check".to_string(),
        expression: "total >= 0".to_string(),
    });

    assert_eq!(
        table.definition().unwrap(),
        "CREATE TABLE \"public\".\"orders\" (\n    \"id\" integer NOT NULL,\n    \"total\" numeric,\n    CONSTRAINT \"orders_pkey\" PRIMARY KEY (\"id\"),\n    CONSTRAINT \"orders_total_check\" CHECK (total >= 0)\n);"
    );
}

#[test]
fn test_table_diff_covers_only_table_attributes() {
    let source = Table::new("public", "orders").with_columns([Column::new("id", "integer")]);
    let mut dest = Table::new("staging", "orders");
    dest.owner = Some("app".to_string());

    let diffs = source.differences_from(&dest);
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].attribute_name, "owner");
    assert_eq!(source.identity_key(), dest.identity_key());
}

fn orders_index(definition: &str) -> Index {
    Index {
        name: "idx_orders_id".to_string(),
        definition: definition.to_string(),
        columns: vec!["id".to_string()],
        unique: false,
        method: "btree".to_string(),
        predicate: None,
    }
}

fn audit_trigger(definition: &str) -> Trigger {
    Trigger {
        name: "orders_audit".to_string(),
        definition: definition.to_string(),
        timing: "AFTER".to_string(),
        events: "INSERT OR UPDATE".to_string(),
        orientation: "ROW".to_string(),
        function: "audit".to_string(),
    }
}

#[test]
fn test_index_definition_ignores_schema() {
    let source = orders_index("CREATE INDEX idx_orders_id ON public.orders USING btree (id)");
    let mut dest = orders_index("CREATE INDEX idx_orders_id ON staging.orders USING btree (id)");
    assert!(source.differences_from(&dest).is_empty());

    dest.method = "hash".to_string();
    assert_eq!(source.differences_from(&dest)[0].attribute_name, "method");
}

#[test]
fn test_index_include_columns_are_compared() {
    let source = orders_index("CREATE INDEX idx_orders_id ON public.orders USING btree (id) INCLUDE (total)");
    let dest = orders_index("CREATE INDEX idx_orders_id ON public.orders USING btree (id)");
    let diffs = source.differences_from(&dest);
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].attribute_name, "definition");
    assert_eq!(
        diffs[0].source_value.as_deref(),
        Some("CREATE INDEX idx_orders_id ON orders USING btree (id) INCLUDE (total)")
    );
}

#[test]
fn test_trigger_when_clause_is_compared() {
    let source = audit_trigger(
        "CREATE TRIGGER orders_audit AFTER INSERT OR UPDATE ON public.orders FOR EACH ROW WHEN ((new.total > 0)) EXECUTE FUNCTION audit()",
    );
    let dest = audit_trigger(
        "CREATE TRIGGER orders_audit AFTER INSERT OR UPDATE ON public.orders FOR EACH ROW EXECUTE FUNCTION audit()",
    );
    let diffs = source.differences_from(&dest);
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].attribute_name, "definition");
}

#[test]
fn test_trigger_differences() {
    let source = audit_trigger(
        "CREATE TRIGGER orders_audit AFTER INSERT OR UPDATE ON public.orders FOR EACH ROW EXECUTE FUNCTION public.audit()",
    );
    let same_elsewhere = audit_trigger(
        "CREATE TRIGGER orders_audit AFTER INSERT OR UPDATE ON staging.orders FOR EACH ROW EXECUTE FUNCTION staging.audit()",
    );
    assert!(source.differences_from(&same_elsewhere).is_empty());

    let mut before = same_elsewhere.clone();
    before.timing = "BEFORE".to_string();
    before.definition = before.definition.replace("AFTER", "BEFORE");
    let names: Vec<_> = source
        .differences_from(&before)
        .into_iter()
        .map(|d| d.attribute_name)
        .collect();
    assert_eq!(names, vec!["timing", "definition"]);
    assert_eq!(source.identity_key(), "orders_audit");
}

#[test]
fn test_schema_neutral_definitions() {
    use crate::table::schema_neutral;

    assert_eq!(
        schema_neutral("CREATE INDEX i ON ONLY \"Sales Data\".orders USING btree (id)"),
        "CREATE INDEX i ON ONLY orders USING btree (id)"
    );
    assert_eq!(
        schema_neutral("CREATE INDEX i ON app.orders USING gin (myapp.tags)"),
        "CREATE INDEX i ON orders USING gin (myapp.tags)"
    );
    assert_eq!(
        schema_neutral("CREATE INDEX i ON orders USING btree (id)"),
        "CREATE INDEX i ON orders USING btree (id)"
    );
}

#[test]
fn test_sequence_differences_and_definition() {
    let source = Sequence {
        schema: "public".to_string(),
        name: "order_no".to_string(),
        data_type: "bigint".to_string(),
        start_value: 1,
        increment: 1,
        min_value: 1,
        max_value: i64::MAX,
        cache_size: 1,
        cycle: false,
        owner: None,
    };
    let mut dest = source.clone();
    dest.increment = 10;
    dest.cycle = true;

    let diffs = source.differences_from(&dest);
    assert_eq!(
        diffs,
        vec![
            AttributeDifference::new("increment", Some("1".to_string()), Some("10".to_string())),
            AttributeDifference::new("cycle", Some("false".to_string()), Some("true".to_string())),
        ]
    );
    assert_eq!(
        source.definition().as_deref(),
        Some(
            "CREATE SEQUENCE \"public\".\"order_no\" AS bigint START WITH 1 INCREMENT BY 1 MINVALUE 1 MAXVALUE 9223372036854775807 CACHE 1 NO CYCLE;"
        )
    );
}

#[test]
fn test_enum_labels_with_commas_differ() {
    let mut source = TypeDef {
        schema: "public".to_string(),
        name: "pair".to_string(),
        kind: TypeKind::Enum,
        labels: vec!["a, b".to_string()],
        attributes: vec![],
        base_type: None,
        default: None,
        not_null: false,
        check: None,
        owner: None,
        comment: None,
    };
    let dest = TypeDef {
        labels: vec!["a".to_string(), "b".to_string()],
        ..source.clone()
    };
    let diffs = source.differences_from(&dest);
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].attribute_name, "labels");

    source.labels = dest.labels.clone();
    assert!(source.differences_from(&dest).is_empty());
}

#[test]
fn test_enum_type_definition_escapes_labels() {
    let ty = TypeDef {
        schema: "public".to_string(),
        name: "mood".to_string(),
        kind: TypeKind::Enum,
        labels: vec!["ok".to_string(), "it's fine".to_string()],
        attributes: vec![],
        base_type: None,
        default: None,
        not_null: false,
        check: None,
        owner: None,
        comment: None,
    };
    assert_eq!(
        ty.definition().as_deref(),
        Some("CREATE TYPE \"public\".\"mood\" AS ENUM ('ok', 'it''s fine');")
    );
}

#[test]
fn test_composite_attributes_compare_as_list() {
    let mut source = TypeDef {
        schema: "public".to_string(),
        name: "address".to_string(),
        kind: TypeKind::Composite,
        labels: vec![],
        attributes: vec![TypeAttribute {
            name: "street".to_string(),
            data_type: "text".to_string(),
        }],
        base_type: None,
        default: None,
        not_null: false,
        check: None,
        owner: None,
        comment: None,
    };
    let dest = source.clone();
    source.attributes.push(TypeAttribute {
        name: "zip".to_string(),
        data_type: "text".to_string(),
    });

    let diffs = source.differences_from(&dest);
    assert_eq!(diffs.len(), 1);
    assert_eq!(
        diffs[0].source_value.as_deref(),
        Some("\"street\" text, \"zip\" text")
    );
}

#[test]
fn test_extension_version_difference() {
    let diffs = Extension::new("pgcrypto", "1.3").differences_from(&Extension::new("pgcrypto", "1.2"));
    assert_eq!(diffs[0].to_string(), "version: 1.3 -> 1.2");
}

#[test]
fn test_table_from_json_snapshot() {
    let json = r#"{
        "schema": "public",
        "name": "orders",
        "columns": [
            { "name": "id", "dataType": "integer", "nullable": false },
            { "name": "notes", "dataType": "text", "nullable": true, "comment": "free text" }
        ],
        "primaryKey": { "name": "orders_pkey", "columns": ["id"] }
    }"#;

    let table: Table = facet_json::from_str(json).unwrap();
    assert_eq!(table.columns.len(), 2);
    assert_eq!(table.column("notes").unwrap().comment.as_deref(), Some("free text"));
    assert!(!table.column("id").unwrap().identity);
    assert_eq!(table.primary_key.unwrap().columns, vec!["id"]);
    assert!(table.indexes.is_empty());
}
