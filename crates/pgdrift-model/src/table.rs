//! Tables and the objects that live inside them.

use crate::{AttributeDiffer, AttributeDifference, Diffable, Ident, Keyed, ident_list, qualified};
use facet::Facet;

/// A table column.
#[derive(Debug, Clone, PartialEq, Facet)]
#[facet(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    /// Type name as reported by the catalog (already lower-cased).
    pub data_type: String,
    pub nullable: bool,
    /// Default expression, or the generation expression when `generated` is set.
    #[facet(default)]
    pub default: Option<String>,
    #[facet(default)]
    pub identity: bool,
    #[facet(default)]
    pub generated: bool,
    #[facet(default)]
    pub comment: Option<String>,
}

impl Column {
    /// A nullable column with no default.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            identity: false,
            generated: false,
            comment: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }
}

impl Keyed for Column {
    fn identity_key(&self) -> String {
        self.name.clone()
    }

    fn definition(&self) -> Option<String> {
        let mut def = format!("{} {}", Ident(&self.name), self.data_type);
        if self.identity {
            def.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        }
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        match (&self.default, self.generated) {
            (Some(expr), true) => def.push_str(&format!(" GENERATED ALWAYS AS ({expr}) STORED")),
            (Some(expr), false) => def.push_str(&format!(" DEFAULT {expr}")),
            (None, _) => {}
        }
        Some(def)
    }
}

impl Diffable for Column {
    fn differences_from(&self, other: &Self) -> Vec<AttributeDifference> {
        AttributeDiffer::new()
            .attr("dataType", &self.data_type, &other.data_type)
            .attr("nullable", &self.nullable, &other.nullable)
            .attr("defaultValue", &self.default, &other.default)
            .attr("identity", &self.identity, &other.identity)
            .attr("generated", &self.generated, &other.generated)
            .attr("comment", &self.comment, &other.comment)
            .finish()
    }
}

/// A table's primary key constraint.
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct PrimaryKey {
    pub name: String,
    /// Key columns, in key order.
    pub columns: Vec<String>,
}

impl Keyed for PrimaryKey {
    fn identity_key(&self) -> String {
        self.name.clone()
    }

    fn definition(&self) -> Option<String> {
        Some(format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            Ident(&self.name),
            ident_list(&self.columns)
        ))
    }
}

/// A table has at most one primary key, so the constraint name is compared
/// as an attribute rather than used for matching.
impl Diffable for PrimaryKey {
    fn differences_from(&self, other: &Self) -> Vec<AttributeDifference> {
        AttributeDiffer::new()
            .attr("name", &self.name, &other.name)
            .attr("columns", &self.columns, &other.columns)
            .finish()
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Facet)]
#[facet(rename_all = "camelCase")]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    /// `None` when the referenced table is in the same schema as the
    /// referencing one, which keeps the key comparable across schemas.
    #[facet(default)]
    pub referenced_schema: Option<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    /// `NO ACTION`, `RESTRICT`, `CASCADE`, `SET NULL` or `SET DEFAULT`.
    pub update_rule: String,
    pub delete_rule: String,
}

impl Keyed for ForeignKey {
    fn identity_key(&self) -> String {
        self.name.clone()
    }

    fn definition(&self) -> Option<String> {
        let target = match &self.referenced_schema {
            Some(schema) => qualified(schema, &self.referenced_table),
            None => Ident(&self.referenced_table).to_string(),
        };
        Some(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON UPDATE {} ON DELETE {}",
            Ident(&self.name),
            ident_list(&self.columns),
            target,
            ident_list(&self.referenced_columns),
            self.update_rule,
            self.delete_rule
        ))
    }
}

impl Diffable for ForeignKey {
    fn differences_from(&self, other: &Self) -> Vec<AttributeDifference> {
        AttributeDiffer::new()
            .attr("columns", &self.columns, &other.columns)
            .attr("referencedSchema", &self.referenced_schema, &other.referenced_schema)
            .attr("referencedTable", &self.referenced_table, &other.referenced_table)
            .attr("referencedColumns", &self.referenced_columns, &other.referenced_columns)
            .attr("updateRule", &self.update_rule, &other.update_rule)
            .attr("deleteRule", &self.delete_rule, &other.delete_rule)
            .finish()
    }
}

/// A UNIQUE constraint. Matched by name only.
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

impl Keyed for UniqueConstraint {
    fn identity_key(&self) -> String {
        self.name.clone()
    }

    fn definition(&self) -> Option<String> {
        Some(format!(
            "CONSTRAINT {} UNIQUE ({})",
            Ident(&self.name),
            ident_list(&self.columns)
        ))
    }
}

/// A CHECK constraint. Matched by name only.
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct CheckConstraint {
    pub name: String,
    /// The boolean expression, without the surrounding `CHECK (...)`.
    pub expression: String,
}

impl Keyed for CheckConstraint {
    fn identity_key(&self) -> String {
        self.name.clone()
    }

    fn definition(&self) -> Option<String> {
        Some(format!(
            "CONSTRAINT {} CHECK ({})",
            Ident(&self.name),
            self.expression
        ))
    }
}

/// An index on a table.
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct Index {
    pub name: String,
    /// Full `CREATE INDEX` statement as stored by the server.
    pub definition: String,
    pub columns: Vec<String>,
    #[facet(default)]
    pub unique: bool,
    /// Access method (`btree`, `gin`, ...).
    pub method: String,
    /// WHERE clause of a partial index.
    #[facet(default)]
    pub predicate: Option<String>,
}

impl Keyed for Index {
    fn identity_key(&self) -> String {
        self.name.clone()
    }

    fn definition(&self) -> Option<String> {
        Some(self.definition.clone())
    }
}

/// `INCLUDE` columns, opclasses, sort order and storage parameters only
/// show up in the definition, so it is compared too, minus the schema.
impl Diffable for Index {
    fn differences_from(&self, other: &Self) -> Vec<AttributeDifference> {
        AttributeDiffer::new()
            .attr("columns", &self.columns, &other.columns)
            .attr("unique", &self.unique, &other.unique)
            .attr("method", &self.method, &other.method)
            .attr("predicate", &self.predicate, &other.predicate)
            .attr(
                "definition",
                &schema_neutral(&self.definition),
                &schema_neutral(&other.definition),
            )
            .finish()
    }
}

/// A trigger on a table.
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct Trigger {
    pub name: String,
    /// Full `CREATE TRIGGER` statement as stored by the server.
    pub definition: String,
    /// `BEFORE`, `AFTER` or `INSTEAD OF`.
    pub timing: String,
    /// Firing events, e.g. `INSERT OR UPDATE`.
    pub events: String,
    /// `ROW` or `STATEMENT`.
    pub orientation: String,
    /// Unqualified name of the function the trigger executes.
    pub function: String,
}

impl Keyed for Trigger {
    fn identity_key(&self) -> String {
        self.name.clone()
    }

    fn definition(&self) -> Option<String> {
        Some(self.definition.clone())
    }
}

impl Diffable for Trigger {
    fn differences_from(&self, other: &Self) -> Vec<AttributeDifference> {
        AttributeDiffer::new()
            .attr("timing", &self.timing, &other.timing)
            .attr("events", &self.events, &other.events)
            .attr("orientation", &self.orientation, &other.orientation)
            .attr("function", &self.function, &other.function)
            .attr(
                "definition",
                &schema_neutral(&self.definition),
                &schema_neutral(&other.definition),
            )
            .finish()
    }
}

/// Definition text with the table's schema qualifier removed.
///
/// `pg_get_indexdef` and `pg_get_triggerdef` qualify the table, and a
/// trigger function outside the search path, with its schema. The schema is
/// read from the `ON` clause and every `schema.` prefix of it is dropped.
pub(crate) fn schema_neutral(definition: &str) -> String {
    let Some(schema) = on_clause_schema(definition) else {
        return definition.to_string();
    };
    let prefix = format!("{schema}.");
    let mut out = String::with_capacity(definition.len());
    let mut rest = definition;
    while let Some(at) = rest.find(&prefix) {
        out.push_str(&rest[..at]);
        if out.chars().next_back().is_some_and(is_ident_char) {
            out.push_str(&prefix);
        }
        rest = &rest[at + prefix.len()..];
    }
    out.push_str(rest);
    out
}

fn on_clause_schema(definition: &str) -> Option<&str> {
    let target = &definition[definition.find(" ON ")? + 4..];
    let target = target.strip_prefix("ONLY ").unwrap_or(target);
    if let Some(quoted) = target.strip_prefix('"') {
        let end = quoted.find("\".")?;
        return Some(&target[..end + 2]);
    }
    let end = target.find(|c: char| !is_ident_char(c))?;
    target[end..].starts_with('.').then(|| &target[..end])
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// A table with everything nested inside it.
#[derive(Debug, Clone, PartialEq, Facet)]
#[facet(rename_all = "camelCase")]
pub struct Table {
    pub schema: String,
    pub name: String,
    #[facet(default)]
    pub owner: Option<String>,
    #[facet(default)]
    pub comment: Option<String>,
    #[facet(default)]
    pub columns: Vec<Column>,
    #[facet(default)]
    pub primary_key: Option<PrimaryKey>,
    #[facet(default)]
    pub foreign_keys: Vec<ForeignKey>,
    #[facet(default)]
    pub unique_constraints: Vec<UniqueConstraint>,
    #[facet(default)]
    pub check_constraints: Vec<CheckConstraint>,
    #[facet(default)]
    pub indexes: Vec<Index>,
    #[facet(default)]
    pub triggers: Vec<Trigger>,
}

impl Table {
    /// An empty table with no columns or constraints.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            owner: None,
            comment: None,
            columns: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            unique_constraints: Vec::new(),
            check_constraints: Vec::new(),
            indexes: Vec::new(),
            triggers: Vec::new(),
        }
    }

    pub fn with_columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// `table.child` naming used for sub-objects in reports.
    pub fn child_name(&self, child: &str) -> String {
        format!("{}.{}", self.name, child)
    }
}

impl Keyed for Table {
    fn identity_key(&self) -> String {
        self.name.clone()
    }

    /// `CREATE TABLE` with columns and inline constraints. Foreign keys are
    /// left out since they depend on creation order.
    fn definition(&self) -> Option<String> {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .filter_map(Keyed::definition)
            .collect();
        parts.extend(self.primary_key.iter().filter_map(Keyed::definition));
        parts.extend(self.unique_constraints.iter().filter_map(Keyed::definition));
        parts.extend(self.check_constraints.iter().filter_map(Keyed::definition));

        let body = parts
            .iter()
            .map(|p| format!("    {p}"))
            .collect::<Vec<_>>()
            .join(",\n");
        Some(format!(
            "CREATE TABLE {} (\n{}\n);",
            qualified(&self.schema, &self.name),
            body
        ))
    }
}

/// Table-level attributes only. Columns, constraints, indexes and triggers
/// are reconciled separately.
impl Diffable for Table {
    fn differences_from(&self, other: &Self) -> Vec<AttributeDifference> {
        AttributeDiffer::new()
            .attr("owner", &self.owner, &other.owner)
            .attr("comment", &self.comment, &other.comment)
            .finish()
    }
}
