//! Object-level differences: what changed, where, and how much it matters.

use crate::{Error, Result, severity};
use facet::Facet;
use pgdrift_model::AttributeDifference;
use std::fmt;

/// The kind of schema object a difference is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Facet)]
#[facet(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ObjectType {
    Table,
    Column,
    PrimaryKey,
    ForeignKey,
    UniqueConstraint,
    CheckConstraint,
    Index,
    Trigger,
    View,
    MaterializedView,
    Function,
    Procedure,
    Sequence,
    Type,
    Extension,
}

impl ObjectType {
    /// Whether this kind only exists inside a table.
    pub fn is_table_part(self) -> bool {
        matches!(
            self,
            ObjectType::Table
                | ObjectType::Column
                | ObjectType::PrimaryKey
                | ObjectType::ForeignKey
                | ObjectType::UniqueConstraint
                | ObjectType::CheckConstraint
                | ObjectType::Index
                | ObjectType::Trigger
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Table => "TABLE",
            ObjectType::Column => "COLUMN",
            ObjectType::PrimaryKey => "PRIMARY_KEY",
            ObjectType::ForeignKey => "FOREIGN_KEY",
            ObjectType::UniqueConstraint => "UNIQUE_CONSTRAINT",
            ObjectType::CheckConstraint => "CHECK_CONSTRAINT",
            ObjectType::Index => "INDEX",
            ObjectType::Trigger => "TRIGGER",
            ObjectType::View => "VIEW",
            ObjectType::MaterializedView => "MATERIALIZED_VIEW",
            ObjectType::Function => "FUNCTION",
            ObjectType::Procedure => "PROCEDURE",
            ObjectType::Sequence => "SEQUENCE",
            ObjectType::Type => "TYPE",
            ObjectType::Extension => "EXTENSION",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an object differs between source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[facet(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum DifferenceType {
    /// Present in source, absent from destination.
    Missing,
    /// Present in destination only.
    Extra,
    /// Present on both sides with differing attributes.
    Modified,
}

impl DifferenceType {
    /// Marker used in rendered reports.
    pub fn symbol(self) -> char {
        match self {
            DifferenceType::Missing => '+',
            DifferenceType::Extra => '-',
            DifferenceType::Modified => '~',
        }
    }
}

impl fmt::Display for DifferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifferenceType::Missing => write!(f, "MISSING"),
            DifferenceType::Extra => write!(f, "EXTRA"),
            DifferenceType::Modified => write!(f, "MODIFIED"),
        }
    }
}

/// How risky a difference is to reconcile. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Facet)]
#[facet(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Severity {
    Info,
    Warning,
    Breaking,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Breaking => write!(f, "BREAKING"),
        }
    }
}

/// One object that differs between source and destination.
///
/// This is the input contract for migration generators: they read
/// `object_type`, `difference_type` and the two definitions.
#[derive(Debug, Clone, PartialEq, Facet)]
#[facet(rename_all = "camelCase")]
pub struct ObjectDifference {
    pub object_type: ObjectType,
    /// Object name; table parts are named `table.part`.
    pub object_name: String,
    pub difference_type: DifferenceType,
    pub severity: Severity,
    #[facet(default)]
    pub attribute_differences: Vec<AttributeDifference>,
    #[facet(default)]
    pub source_definition: Option<String>,
    #[facet(default)]
    pub destination_definition: Option<String>,
}

impl ObjectDifference {
    /// Build a difference, classifying its severity.
    ///
    /// A `Modified` difference must carry at least one attribute difference.
    pub fn new(
        object_type: ObjectType,
        object_name: impl Into<String>,
        difference_type: DifferenceType,
        attribute_differences: Vec<AttributeDifference>,
        source_definition: Option<String>,
        destination_definition: Option<String>,
    ) -> Result<Self> {
        let object_name = object_name.into();
        if difference_type == DifferenceType::Modified && attribute_differences.is_empty() {
            return Err(Error::EmptyModification {
                object_type,
                object_name,
            });
        }

        let severity = severity::classify(object_type, difference_type, &attribute_differences);
        Ok(Self {
            object_type,
            object_name,
            difference_type,
            severity,
            attribute_differences,
            source_definition,
            destination_definition,
        })
    }

    /// An object present in source only.
    pub fn missing(
        object_type: ObjectType,
        object_name: impl Into<String>,
        source_definition: Option<String>,
    ) -> Self {
        let object_name = object_name.into();
        Self {
            severity: severity::classify(object_type, DifferenceType::Missing, &[]),
            object_type,
            object_name,
            difference_type: DifferenceType::Missing,
            attribute_differences: Vec::new(),
            source_definition,
            destination_definition: None,
        }
    }

    /// An object present in destination only.
    pub fn extra(
        object_type: ObjectType,
        object_name: impl Into<String>,
        destination_definition: Option<String>,
    ) -> Self {
        let object_name = object_name.into();
        Self {
            severity: severity::classify(object_type, DifferenceType::Extra, &[]),
            object_type,
            object_name,
            difference_type: DifferenceType::Extra,
            attribute_differences: Vec::new(),
            source_definition: None,
            destination_definition,
        }
    }

    /// An object present on both sides whose attributes differ.
    pub fn modified(
        object_type: ObjectType,
        object_name: impl Into<String>,
        attribute_differences: Vec<AttributeDifference>,
        source_definition: Option<String>,
        destination_definition: Option<String>,
    ) -> Result<Self> {
        Self::new(
            object_type,
            object_name,
            DifferenceType::Modified,
            attribute_differences,
            source_definition,
            destination_definition,
        )
    }
}

impl fmt::Display for ObjectDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} [{}]",
            self.difference_type.symbol(),
            self.object_type,
            self.object_name,
            self.severity
        )
    }
}
