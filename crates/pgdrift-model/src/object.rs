//! Schema-level objects other than tables.

use crate::{AttributeDiffer, AttributeDifference, AttributeValue, Diffable, Ident, Keyed, qualified};
use facet::Facet;
use std::fmt;

/// Single-quoted SQL literal with embedded quotes doubled.
fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A plain or materialized view.
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct View {
    pub schema: String,
    pub name: String,
    #[facet(default)]
    pub materialized: bool,
    /// The view's SELECT text.
    pub definition: String,
    #[facet(default)]
    pub owner: Option<String>,
    #[facet(default)]
    pub comment: Option<String>,
}

impl View {
    /// A plain view with no owner or comment.
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            materialized: false,
            definition: definition.into(),
            owner: None,
            comment: None,
        }
    }

    pub fn materialized(mut self) -> Self {
        self.materialized = true;
        self
    }
}

impl Keyed for View {
    fn identity_key(&self) -> String {
        self.name.clone()
    }

    fn definition(&self) -> Option<String> {
        let kind = if self.materialized {
            "MATERIALIZED VIEW"
        } else {
            "VIEW"
        };
        Some(format!(
            "CREATE {} {} AS\n{}",
            kind,
            qualified(&self.schema, &self.name),
            self.definition.trim_end()
        ))
    }
}

impl Diffable for View {
    fn differences_from(&self, other: &Self) -> Vec<AttributeDifference> {
        AttributeDiffer::new()
            .attr("materialized", &self.materialized, &other.materialized)
            .attr("definition", &self.definition, &other.definition)
            .attr("owner", &self.owner, &other.owner)
            .attr("comment", &self.comment, &other.comment)
            .finish()
    }
}

/// Whether a routine is a function or a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Facet)]
#[facet(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum RoutineKind {
    Function,
    Procedure,
}

impl fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutineKind::Function => write!(f, "FUNCTION"),
            RoutineKind::Procedure => write!(f, "PROCEDURE"),
        }
    }
}

impl AttributeValue for RoutineKind {
    fn render(&self) -> Option<String> {
        Some(self.to_string())
    }
}

/// A function or stored procedure.
///
/// Overloads share a name, so routines are matched on their full signature.
#[derive(Debug, Clone, PartialEq, Facet)]
#[facet(rename_all = "camelCase")]
pub struct Routine {
    pub schema: String,
    pub name: String,
    pub kind: RoutineKind,
    /// Parameter types in declaration order.
    #[facet(default)]
    pub argument_types: Vec<String>,
    /// `None` for procedures.
    #[facet(default)]
    pub return_type: Option<String>,
    pub language: String,
    /// `IMMUTABLE`, `STABLE` or `VOLATILE`.
    #[facet(default)]
    pub volatility: Option<String>,
    #[facet(default)]
    pub security_definer: bool,
    /// The routine body as written.
    pub body: String,
    /// Full `CREATE` statement as stored by the server.
    #[facet(default)]
    pub definition: Option<String>,
    #[facet(default)]
    pub owner: Option<String>,
    #[facet(default)]
    pub comment: Option<String>,
}

impl Routine {
    /// `name(type, type)`.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.argument_types.join(", "))
    }
}

impl Keyed for Routine {
    fn identity_key(&self) -> String {
        self.signature()
    }

    fn definition(&self) -> Option<String> {
        if let Some(stored) = &self.definition {
            return Some(stored.clone());
        }
        let returns = self
            .return_type
            .as_ref()
            .map(|r| format!(" RETURNS {r}"))
            .unwrap_or_default();
        Some(format!(
            "CREATE {} {}({}){} LANGUAGE {} AS $$\n{}\n$$;",
            self.kind,
            qualified(&self.schema, &self.name),
            self.argument_types.join(", "),
            returns,
            self.language,
            self.body.trim()
        ))
    }
}

impl Diffable for Routine {
    fn differences_from(&self, other: &Self) -> Vec<AttributeDifference> {
        AttributeDiffer::new()
            .attr("kind", &self.kind, &other.kind)
            .attr("returnType", &self.return_type, &other.return_type)
            .attr("language", &self.language, &other.language)
            .attr("volatility", &self.volatility, &other.volatility)
            .attr("securityDefiner", &self.security_definer, &other.security_definer)
            .attr("body", &self.body, &other.body)
            .attr("owner", &self.owner, &other.owner)
            .attr("comment", &self.comment, &other.comment)
            .finish()
    }
}

/// A sequence.
#[derive(Debug, Clone, PartialEq, Facet)]
#[facet(rename_all = "camelCase")]
pub struct Sequence {
    pub schema: String,
    pub name: String,
    pub data_type: String,
    pub start_value: i64,
    pub increment: i64,
    pub min_value: i64,
    pub max_value: i64,
    pub cache_size: i64,
    #[facet(default)]
    pub cycle: bool,
    #[facet(default)]
    pub owner: Option<String>,
}

impl Keyed for Sequence {
    fn identity_key(&self) -> String {
        self.name.clone()
    }

    fn definition(&self) -> Option<String> {
        Some(format!(
            "CREATE SEQUENCE {} AS {} START WITH {} INCREMENT BY {} MINVALUE {} MAXVALUE {} CACHE {}{};",
            qualified(&self.schema, &self.name),
            self.data_type,
            self.start_value,
            self.increment,
            self.min_value,
            self.max_value,
            self.cache_size,
            if self.cycle { " CYCLE" } else { " NO CYCLE" }
        ))
    }
}

impl Diffable for Sequence {
    fn differences_from(&self, other: &Self) -> Vec<AttributeDifference> {
        AttributeDiffer::new()
            .attr("dataType", &self.data_type, &other.data_type)
            .attr("startValue", &self.start_value, &other.start_value)
            .attr("increment", &self.increment, &other.increment)
            .attr("minValue", &self.min_value, &other.min_value)
            .attr("maxValue", &self.max_value, &other.max_value)
            .attr("cacheSize", &self.cache_size, &other.cache_size)
            .attr("cycle", &self.cycle, &other.cycle)
            .attr("owner", &self.owner, &other.owner)
            .finish()
    }
}

/// The flavor of a user-defined type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Facet)]
#[facet(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TypeKind {
    Enum,
    Composite,
    Domain,
    Range,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Enum => write!(f, "ENUM"),
            TypeKind::Composite => write!(f, "COMPOSITE"),
            TypeKind::Domain => write!(f, "DOMAIN"),
            TypeKind::Range => write!(f, "RANGE"),
        }
    }
}

impl AttributeValue for TypeKind {
    fn render(&self) -> Option<String> {
        Some(self.to_string())
    }
}

/// One field of a composite type.
#[derive(Debug, Clone, PartialEq, Facet)]
#[facet(rename_all = "camelCase")]
pub struct TypeAttribute {
    pub name: String,
    pub data_type: String,
}

impl fmt::Display for TypeAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", Ident(&self.name), self.data_type)
    }
}

/// A user-defined type: enum, composite, domain or range.
///
/// Only the fields relevant to `kind` are populated.
#[derive(Debug, Clone, PartialEq, Facet)]
#[facet(rename_all = "camelCase")]
pub struct TypeDef {
    pub schema: String,
    pub name: String,
    pub kind: TypeKind,
    /// Enum labels in sort order.
    #[facet(default)]
    pub labels: Vec<String>,
    /// Composite fields in declaration order.
    #[facet(default)]
    pub attributes: Vec<TypeAttribute>,
    /// Domain base type, or range subtype.
    #[facet(default)]
    pub base_type: Option<String>,
    #[facet(default)]
    pub default: Option<String>,
    #[facet(default)]
    pub not_null: bool,
    /// Domain CHECK expression.
    #[facet(default)]
    pub check: Option<String>,
    #[facet(default)]
    pub owner: Option<String>,
    #[facet(default)]
    pub comment: Option<String>,
}

impl TypeDef {
    fn attribute_list(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.to_string()).collect()
    }
}

impl Keyed for TypeDef {
    fn identity_key(&self) -> String {
        self.name.clone()
    }

    fn definition(&self) -> Option<String> {
        let name = qualified(&self.schema, &self.name);
        let sql = match self.kind {
            TypeKind::Enum => {
                let labels: Vec<String> = self.labels.iter().map(|l| literal(l)).collect();
                format!("CREATE TYPE {} AS ENUM ({});", name, labels.join(", "))
            }
            TypeKind::Composite => {
                format!(
                    "CREATE TYPE {} AS ({});",
                    name,
                    self.attribute_list().join(", ")
                )
            }
            TypeKind::Domain => {
                let mut sql = format!(
                    "CREATE DOMAIN {} AS {}",
                    name,
                    self.base_type.as_deref().unwrap_or("text")
                );
                if let Some(default) = &self.default {
                    sql.push_str(&format!(" DEFAULT {default}"));
                }
                if self.not_null {
                    sql.push_str(" NOT NULL");
                }
                if let Some(check) = &self.check {
                    sql.push_str(&format!(" CHECK ({check})"));
                }
                sql.push(';');
                sql
            }
            TypeKind::Range => {
                format!(
                    "CREATE TYPE {} AS RANGE (SUBTYPE = {});",
                    name,
                    self.base_type.as_deref().unwrap_or("text")
                )
            }
        };
        Some(sql)
    }
}

impl Diffable for TypeDef {
    fn differences_from(&self, other: &Self) -> Vec<AttributeDifference> {
        AttributeDiffer::new()
            .attr("kind", &self.kind, &other.kind)
            .attr("labels", &self.labels, &other.labels)
            .attr("attributes", &self.attribute_list(), &other.attribute_list())
            .attr("baseType", &self.base_type, &other.base_type)
            .attr("defaultValue", &self.default, &other.default)
            .attr("notNull", &self.not_null, &other.not_null)
            .attr("check", &self.check, &other.check)
            .attr("owner", &self.owner, &other.owner)
            .attr("comment", &self.comment, &other.comment)
            .finish()
    }
}

/// An installed extension.
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct Extension {
    pub name: String,
    pub version: String,
}

impl Extension {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Keyed for Extension {
    fn identity_key(&self) -> String {
        self.name.clone()
    }

    fn definition(&self) -> Option<String> {
        Some(format!(
            "CREATE EXTENSION IF NOT EXISTS {} VERSION {};",
            Ident(&self.name),
            literal(&self.version)
        ))
    }
}

impl Diffable for Extension {
    fn differences_from(&self, other: &Self) -> Vec<AttributeDifference> {
        AttributeDiffer::new()
            .attr("version", &self.version, &other.version)
            .finish()
    }
}
