//! Catalog extractor for live Postgres servers.
//!
//! One query per object kind (and per table part) for the whole schema,
//! assembled in memory. Objects owned by extensions are left out so that
//! an extension's internals are not reported object by object.

use crate::traced::{Connection, ConnectionExt};
use crate::{Result, SchemaExtractor};
use indexmap::IndexMap;
use pgdrift_model::{
    CheckConstraint, Column, ForeignKey, Index, PrimaryKey, Routine, RoutineKind, Sequence, Table,
    Trigger, TypeAttribute, TypeDef, TypeKind, UniqueConstraint, View,
};

const TABLES: &str = r#"
    SELECT c.relname::text AS name,
           pg_get_userbyid(c.relowner)::text AS owner,
           obj_description(c.oid, 'pg_class') AS comment
    FROM pg_class c
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1 AND c.relkind IN ('r', 'p')
      AND NOT EXISTS (
          SELECT 1 FROM pg_depend d
          WHERE d.classid = 'pg_class'::regclass AND d.objid = c.oid AND d.deptype = 'e'
      )
    ORDER BY c.relname
"#;

const COLUMNS: &str = r#"
    SELECT c.relname::text AS table_name,
           a.attname::text AS name,
           format_type(a.atttypid, a.atttypmod) AS data_type,
           NOT a.attnotnull AS nullable,
           pg_get_expr(d.adbin, d.adrelid) AS default_expr,
           a.attidentity <> '' AS is_identity,
           a.attgenerated <> '' AS is_generated,
           col_description(c.oid, a.attnum) AS comment
    FROM pg_attribute a
    JOIN pg_class c ON c.oid = a.attrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
    WHERE n.nspname = $1 AND c.relkind IN ('r', 'p')
      AND a.attnum > 0 AND NOT a.attisdropped
    ORDER BY c.relname, a.attnum
"#;

const CONSTRAINTS: &str = r#"
    SELECT cl.relname::text AS table_name,
           con.conname::text AS name,
           con.contype::text AS kind,
           ARRAY(
               SELECT a.attname::text
               FROM unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
               JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
               ORDER BY k.ord
           ) AS columns,
           fn.nspname::text AS referenced_schema,
           fc.relname::text AS referenced_table,
           ARRAY(
               SELECT a.attname::text
               FROM unnest(con.confkey) WITH ORDINALITY AS k(attnum, ord)
               JOIN pg_attribute a ON a.attrelid = con.confrelid AND a.attnum = k.attnum
               ORDER BY k.ord
           ) AS referenced_columns,
           con.confupdtype::text AS update_rule,
           con.confdeltype::text AS delete_rule,
           pg_get_constraintdef(con.oid) AS definition
    FROM pg_constraint con
    JOIN pg_class cl ON cl.oid = con.conrelid
    JOIN pg_namespace n ON n.oid = cl.relnamespace
    LEFT JOIN pg_class fc ON fc.oid = con.confrelid
    LEFT JOIN pg_namespace fn ON fn.oid = fc.relnamespace
    WHERE n.nspname = $1 AND con.contype IN ('p', 'f', 'u', 'c')
    ORDER BY cl.relname, con.conname
"#;

// Indexes backing a constraint are reported through the constraint.
const INDEXES: &str = r#"
    SELECT t.relname::text AS table_name,
           i.relname::text AS name,
           pg_get_indexdef(i.oid) AS definition,
           ix.indisunique AS is_unique,
           am.amname::text AS method,
           pg_get_expr(ix.indpred, ix.indrelid) AS predicate,
           ARRAY(
               SELECT pg_get_indexdef(i.oid, k, true)
               FROM generate_series(1, ix.indnkeyatts::int) AS k
           ) AS columns
    FROM pg_index ix
    JOIN pg_class i ON i.oid = ix.indexrelid
    JOIN pg_class t ON t.oid = ix.indrelid
    JOIN pg_namespace n ON n.oid = t.relnamespace
    JOIN pg_am am ON am.oid = i.relam
    WHERE n.nspname = $1
      AND NOT EXISTS (SELECT 1 FROM pg_constraint con WHERE con.conindid = i.oid)
    ORDER BY t.relname, i.relname
"#;

const TRIGGERS: &str = r#"
    SELECT c.relname::text AS table_name,
           t.tgname::text AS name,
           pg_get_triggerdef(t.oid) AS definition,
           t.tgtype::int AS tgtype,
           p.proname::text AS function
    FROM pg_trigger t
    JOIN pg_class c ON c.oid = t.tgrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    JOIN pg_proc p ON p.oid = t.tgfoid
    WHERE n.nspname = $1 AND NOT t.tgisinternal
    ORDER BY c.relname, t.tgname
"#;

const VIEWS: &str = r#"
    SELECT c.relname::text AS name,
           c.relkind = 'm' AS materialized,
           pg_get_viewdef(c.oid, true) AS definition,
           pg_get_userbyid(c.relowner)::text AS owner,
           obj_description(c.oid, 'pg_class') AS comment
    FROM pg_class c
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1 AND c.relkind IN ('v', 'm')
      AND NOT EXISTS (
          SELECT 1 FROM pg_depend d
          WHERE d.classid = 'pg_class'::regclass AND d.objid = c.oid AND d.deptype = 'e'
      )
    ORDER BY c.relname
"#;

const ROUTINES: &str = r#"
    SELECT p.proname::text AS name,
           p.prokind = 'p' AS is_procedure,
           ARRAY(
               SELECT format_type(a.t, NULL)
               FROM unnest(p.proargtypes::oid[]) WITH ORDINALITY AS a(t, ord)
               ORDER BY a.ord
           ) AS argument_types,
           CASE WHEN p.prokind = 'p' THEN NULL ELSE pg_get_function_result(p.oid) END AS return_type,
           l.lanname::text AS language,
           CASE p.provolatile
               WHEN 'i' THEN 'IMMUTABLE'
               WHEN 's' THEN 'STABLE'
               ELSE 'VOLATILE'
           END AS volatility,
           p.prosecdef AS security_definer,
           p.prosrc AS body,
           pg_get_functiondef(p.oid) AS definition,
           pg_get_userbyid(p.proowner)::text AS owner,
           obj_description(p.oid, 'pg_proc') AS comment
    FROM pg_proc p
    JOIN pg_namespace n ON n.oid = p.pronamespace
    JOIN pg_language l ON l.oid = p.prolang
    WHERE n.nspname = $1 AND p.prokind IN ('f', 'p')
      AND NOT EXISTS (
          SELECT 1 FROM pg_depend d
          WHERE d.classid = 'pg_proc'::regclass AND d.objid = p.oid AND d.deptype = 'e'
      )
    ORDER BY p.proname, p.oid
"#;

const SEQUENCES: &str = r#"
    SELECT s.sequencename::text AS name,
           s.data_type::text AS data_type,
           s.start_value,
           s.increment_by,
           s.min_value,
           s.max_value,
           s.cache_size,
           s.cycle,
           s.sequenceowner::text AS owner
    FROM pg_sequences s
    WHERE s.schemaname = $1
      AND NOT EXISTS (
          SELECT 1 FROM pg_depend d
          WHERE d.classid = 'pg_class'::regclass
            AND d.objid = format('%I.%I', s.schemaname, s.sequencename)::regclass
            AND d.deptype = 'e'
      )
    ORDER BY s.sequencename
"#;

const TYPES: &str = r#"
    SELECT t.typname::text AS name,
           t.typtype::text AS kind,
           ARRAY(
               SELECT e.enumlabel::text FROM pg_enum e
               WHERE e.enumtypid = t.oid
               ORDER BY e.enumsortorder
           ) AS labels,
           ARRAY(
               SELECT a.attname::text FROM pg_attribute a
               WHERE a.attrelid = t.typrelid AND a.attnum > 0 AND NOT a.attisdropped
               ORDER BY a.attnum
           ) AS attribute_names,
           ARRAY(
               SELECT format_type(a.atttypid, a.atttypmod) FROM pg_attribute a
               WHERE a.attrelid = t.typrelid AND a.attnum > 0 AND NOT a.attisdropped
               ORDER BY a.attnum
           ) AS attribute_types,
           CASE t.typtype
               WHEN 'd' THEN format_type(t.typbasetype, t.typtypmod)
               WHEN 'r' THEN (SELECT format_type(r.rngsubtype, NULL) FROM pg_range r WHERE r.rngtypid = t.oid)
           END AS base_type,
           t.typdefault AS default_value,
           t.typnotnull AS not_null,
           (
               SELECT pg_get_constraintdef(con.oid) FROM pg_constraint con
               WHERE con.contypid = t.oid AND con.contype = 'c'
               ORDER BY con.conname LIMIT 1
           ) AS check_def,
           pg_get_userbyid(t.typowner)::text AS owner,
           obj_description(t.oid, 'pg_type') AS comment
    FROM pg_type t
    JOIN pg_namespace n ON n.oid = t.typnamespace
    WHERE n.nspname = $1 AND t.typtype IN ('e', 'c', 'd', 'r')
      AND (t.typtype <> 'c' OR (SELECT c.relkind FROM pg_class c WHERE c.oid = t.typrelid) = 'c')
      AND NOT EXISTS (
          SELECT 1 FROM pg_depend d
          WHERE d.classid = 'pg_type'::regclass AND d.objid = t.oid AND d.deptype = 'e'
      )
    ORDER BY t.typname
"#;

const EXTENSIONS: &str = "SELECT extname::text AS name, extversion AS version FROM pg_extension ORDER BY extname";

const SCHEMAS: &str = r#"
    SELECT nspname::text AS name
    FROM pg_namespace
    WHERE nspname NOT LIKE 'pg\_%' AND nspname <> 'information_schema'
    ORDER BY nspname
"#;

/// Reads structural objects from the system catalogs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgExtractor;

impl<C: Connection> SchemaExtractor<C> for PgExtractor {
    async fn tables(&self, conn: &C, schema: &str) -> Result<Vec<Table>> {
        let conn = conn.traced();
        let mut tables: IndexMap<String, Table> = IndexMap::new();

        for row in conn.query(TABLES, &[&schema]).await? {
            let name: String = row.try_get("name")?;
            let mut table = Table::new(schema, name.clone());
            table.owner = row.try_get("owner")?;
            table.comment = row.try_get("comment")?;
            tables.insert(name, table);
        }

        for row in conn.query(COLUMNS, &[&schema]).await? {
            let table_name: String = row.try_get("table_name")?;
            let Some(table) = tables.get_mut(&table_name) else {
                continue;
            };
            table.columns.push(Column {
                name: row.try_get("name")?,
                data_type: row.try_get("data_type")?,
                nullable: row.try_get("nullable")?,
                default: row.try_get("default_expr")?,
                identity: row.try_get("is_identity")?,
                generated: row.try_get("is_generated")?,
                comment: row.try_get("comment")?,
            });
        }

        for row in conn.query(CONSTRAINTS, &[&schema]).await? {
            let table_name: String = row.try_get("table_name")?;
            let Some(table) = tables.get_mut(&table_name) else {
                continue;
            };
            let name: String = row.try_get("name")?;
            let kind: String = row.try_get("kind")?;
            let columns: Vec<String> = row.try_get("columns")?;

            match kind.as_str() {
                "p" => table.primary_key = Some(PrimaryKey { name, columns }),
                "u" => table.unique_constraints.push(UniqueConstraint { name, columns }),
                "c" => {
                    let definition: String = row.try_get("definition")?;
                    table.check_constraints.push(CheckConstraint {
                        name,
                        expression: check_expression(&definition),
                    });
                }
                "f" => {
                    let referenced_schema: Option<String> = row.try_get("referenced_schema")?;
                    let update_rule: String = row.try_get("update_rule")?;
                    let delete_rule: String = row.try_get("delete_rule")?;
                    table.foreign_keys.push(ForeignKey {
                        name,
                        columns,
                        referenced_schema: referenced_schema.filter(|s| s != schema),
                        referenced_table: row
                            .try_get::<_, Option<String>>("referenced_table")?
                            .unwrap_or_default(),
                        referenced_columns: row.try_get("referenced_columns")?,
                        update_rule: referential_action(&update_rule).to_string(),
                        delete_rule: referential_action(&delete_rule).to_string(),
                    });
                }
                _ => {}
            }
        }

        for row in conn.query(INDEXES, &[&schema]).await? {
            let table_name: String = row.try_get("table_name")?;
            let Some(table) = tables.get_mut(&table_name) else {
                continue;
            };
            table.indexes.push(Index {
                name: row.try_get("name")?,
                definition: row.try_get("definition")?,
                columns: row.try_get("columns")?,
                unique: row.try_get("is_unique")?,
                method: row.try_get("method")?,
                predicate: row.try_get("predicate")?,
            });
        }

        for row in conn.query(TRIGGERS, &[&schema]).await? {
            let table_name: String = row.try_get("table_name")?;
            let Some(table) = tables.get_mut(&table_name) else {
                continue;
            };
            let shape = TriggerShape::decode(row.try_get("tgtype")?);
            table.triggers.push(Trigger {
                name: row.try_get("name")?,
                definition: row.try_get("definition")?,
                timing: shape.timing.to_string(),
                events: shape.events,
                orientation: shape.orientation.to_string(),
                function: row.try_get("function")?,
            });
        }

        Ok(tables.into_values().collect())
    }

    async fn views(&self, conn: &C, schema: &str) -> Result<Vec<View>> {
        let rows = conn.traced().query(VIEWS, &[&schema]).await?;
        rows.iter()
            .map(|row| -> Result<View> {
                Ok(View {
                    schema: schema.to_string(),
                    name: row.try_get("name")?,
                    materialized: row.try_get("materialized")?,
                    definition: row.try_get("definition")?,
                    owner: row.try_get("owner")?,
                    comment: row.try_get("comment")?,
                })
            })
            .collect()
    }

    async fn routines(&self, conn: &C, schema: &str) -> Result<Vec<Routine>> {
        let rows = conn.traced().query(ROUTINES, &[&schema]).await?;
        rows.iter()
            .map(|row| -> Result<Routine> {
                let is_procedure: bool = row.try_get("is_procedure")?;
                Ok(Routine {
                    schema: schema.to_string(),
                    name: row.try_get("name")?,
                    kind: if is_procedure {
                        RoutineKind::Procedure
                    } else {
                        RoutineKind::Function
                    },
                    argument_types: row.try_get("argument_types")?,
                    return_type: row.try_get("return_type")?,
                    language: row.try_get("language")?,
                    volatility: row.try_get("volatility")?,
                    security_definer: row.try_get("security_definer")?,
                    body: row.try_get("body")?,
                    definition: row.try_get("definition")?,
                    owner: row.try_get("owner")?,
                    comment: row.try_get("comment")?,
                })
            })
            .collect()
    }

    async fn sequences(&self, conn: &C, schema: &str) -> Result<Vec<Sequence>> {
        let rows = conn.traced().query(SEQUENCES, &[&schema]).await?;
        rows.iter()
            .map(|row| -> Result<Sequence> {
                Ok(Sequence {
                    schema: schema.to_string(),
                    name: row.try_get("name")?,
                    data_type: row.try_get("data_type")?,
                    start_value: row.try_get("start_value")?,
                    increment: row.try_get("increment_by")?,
                    min_value: row.try_get("min_value")?,
                    max_value: row.try_get("max_value")?,
                    cache_size: row.try_get("cache_size")?,
                    cycle: row.try_get("cycle")?,
                    owner: row.try_get("owner")?,
                })
            })
            .collect()
    }

    async fn types(&self, conn: &C, schema: &str) -> Result<Vec<TypeDef>> {
        let rows = conn.traced().query(TYPES, &[&schema]).await?;
        let mut types = Vec::with_capacity(rows.len());

        for row in &rows {
            let kind: String = row.try_get("kind")?;
            let Some(kind) = type_kind(&kind) else {
                continue;
            };
            let names: Vec<String> = row.try_get("attribute_names")?;
            let data_types: Vec<String> = row.try_get("attribute_types")?;
            let check: Option<String> = row.try_get("check_def")?;

            types.push(TypeDef {
                schema: schema.to_string(),
                name: row.try_get("name")?,
                kind,
                labels: row.try_get("labels")?,
                attributes: names
                    .into_iter()
                    .zip(data_types)
                    .map(|(name, data_type)| TypeAttribute { name, data_type })
                    .collect(),
                base_type: row.try_get("base_type")?,
                default: row.try_get("default_value")?,
                not_null: row.try_get("not_null")?,
                check: check.as_deref().map(check_expression),
                owner: row.try_get("owner")?,
                comment: row.try_get("comment")?,
            });
        }

        Ok(types)
    }

    async fn extensions(&self, conn: &C) -> Result<IndexMap<String, String>> {
        let rows = conn.traced().query(EXTENSIONS, &[]).await?;
        rows.iter()
            .map(|row| -> Result<(String, String)> {
                Ok((row.try_get("name")?, row.try_get("version")?))
            })
            .collect()
    }

    async fn list_schemas(&self, conn: &C) -> Result<Vec<String>> {
        let rows = conn.traced().query(SCHEMAS, &[]).await?;
        rows.iter()
            .map(|row| -> Result<String> { Ok(row.try_get("name")?) })
            .collect()
    }
}

/// `pg_constraint.confupdtype` / `confdeltype` codes.
fn referential_action(code: &str) -> &'static str {
    match code {
        "r" => "RESTRICT",
        "c" => "CASCADE",
        "n" => "SET NULL",
        "d" => "SET DEFAULT",
        _ => "NO ACTION",
    }
}

fn type_kind(code: &str) -> Option<TypeKind> {
    match code {
        "e" => Some(TypeKind::Enum),
        "c" => Some(TypeKind::Composite),
        "d" => Some(TypeKind::Domain),
        "r" => Some(TypeKind::Range),
        _ => None,
    }
}

/// `CHECK ((amount > 0))` to `(amount > 0)`.
fn check_expression(definition: &str) -> String {
    let trimmed = definition.trim();
    let trimmed = trimmed.strip_suffix(" NOT VALID").unwrap_or(trimmed);
    let body = trimmed.strip_prefix("CHECK ").unwrap_or(trimmed);
    outer_parens(body).unwrap_or(body).to_string()
}

/// The inside of `body` when its first `(` closes at its last `)`.
fn outer_parens(body: &str) -> Option<&str> {
    let inner = body.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth = 0usize;
    let mut quoted = false;
    for c in inner.chars() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.checked_sub(1)?,
            _ => {}
        }
    }
    (depth == 0).then_some(inner)
}

/// Decoded `pg_trigger.tgtype` bits.
#[derive(Debug, PartialEq)]
struct TriggerShape {
    timing: &'static str,
    events: String,
    orientation: &'static str,
}

impl TriggerShape {
    const ROW: i32 = 1 << 0;
    const BEFORE: i32 = 1 << 1;
    const INSERT: i32 = 1 << 2;
    const DELETE: i32 = 1 << 3;
    const UPDATE: i32 = 1 << 4;
    const TRUNCATE: i32 = 1 << 5;
    const INSTEAD: i32 = 1 << 6;

    fn decode(tgtype: i32) -> Self {
        let timing = if tgtype & Self::BEFORE != 0 {
            "BEFORE"
        } else if tgtype & Self::INSTEAD != 0 {
            "INSTEAD OF"
        } else {
            "AFTER"
        };

        let events: Vec<&str> = [
            (Self::INSERT, "INSERT"),
            (Self::UPDATE, "UPDATE"),
            (Self::DELETE, "DELETE"),
            (Self::TRUNCATE, "TRUNCATE"),
        ]
        .into_iter()
        .filter(|(bit, _)| tgtype & bit != 0)
        .map(|(_, name)| name)
        .collect();

        Self {
            timing,
            events: events.join(" OR "),
            orientation: if tgtype & Self::ROW != 0 {
                "ROW"
            } else {
                "STATEMENT"
            },
        }
    }
}
