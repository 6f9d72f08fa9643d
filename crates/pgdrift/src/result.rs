//! The outcome of one comparison.

use crate::{ComparisonFilter, DifferenceType, ObjectDifference, ObjectType, Severity};
use chrono::{DateTime, Utc};
use facet::Facet;
use std::fmt;

/// One side of a comparison: an instance, optionally a database on it, and a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Facet)]
pub struct SchemaRef {
    /// Instance name, as configured.
    pub instance: String,
    /// Database on the instance; `None` means the instance's home database.
    #[facet(default)]
    pub database: Option<String>,
    pub schema: String,
}

impl SchemaRef {
    pub fn new(instance: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            database: None,
            schema: schema.into(),
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// `instance` or `instance:database`.
    pub fn database_key(&self) -> String {
        match &self.database {
            Some(database) => format!("{}:{}", self.instance, database),
            None => self.instance.clone(),
        }
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database_key(), self.schema)
    }
}

/// An object kind whose extraction failed and which contributed nothing.
#[derive(Debug, Clone, PartialEq, Facet)]
#[facet(rename_all = "camelCase")]
pub struct SkippedKind {
    pub object_type: ObjectType,
    pub message: String,
}

/// Everything one comparison produced.
///
/// Plain data; safe to serialize and to hand to a migration generator.
#[derive(Debug, Clone, PartialEq, Facet)]
#[facet(rename_all = "camelCase")]
pub struct SchemaComparisonResult {
    /// `instance[:database].schema` of the source.
    pub source: String,
    /// `instance[:database].schema` of the destination.
    pub destination: String,
    pub filter: ComparisonFilter,
    pub compared_at: DateTime<Utc>,
    #[facet(default)]
    pub differences: Vec<ObjectDifference>,
    pub success: bool,
    /// Set only when the comparison could not run at all.
    #[facet(default)]
    pub error_message: Option<String>,
    /// Kinds that failed to extract. `success` stays true when this is
    /// non-empty, so check it before reading "no differences" as "in sync".
    #[facet(default)]
    pub skipped_kinds: Vec<SkippedKind>,
}

impl SchemaComparisonResult {
    /// A result that has not run yet.
    pub fn new(source: &SchemaRef, destination: &SchemaRef, filter: ComparisonFilter) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            filter,
            compared_at: Utc::now(),
            differences: Vec::new(),
            success: false,
            error_message: None,
            skipped_kinds: Vec::new(),
        }
    }

    /// Mark the comparison as aborted. Any collected differences are dropped.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(message.into());
        self.differences.clear();
        self
    }

    /// Successful, nothing skipped, and no differences.
    pub fn is_identical(&self) -> bool {
        self.success && self.skipped_kinds.is_empty() && self.differences.is_empty()
    }

    /// Whether some kinds were left out because their extraction failed.
    pub fn is_partial(&self) -> bool {
        !self.skipped_kinds.is_empty()
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.differences
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn count_by_type(&self, difference_type: DifferenceType) -> usize {
        self.differences
            .iter()
            .filter(|d| d.difference_type == difference_type)
            .count()
    }

    /// Differences about one kind of object.
    pub fn of_type(&self, object_type: ObjectType) -> impl Iterator<Item = &ObjectDifference> {
        self.differences
            .iter()
            .filter(move |d| d.object_type == object_type)
    }

    /// Differences at or above `min`.
    pub fn filter_by_severity(&self, min: Severity) -> impl Iterator<Item = &ObjectDifference> {
        self.differences.iter().filter(move |d| d.severity >= min)
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.differences.iter().map(|d| d.severity).max()
    }
}

impl fmt::Display for SchemaComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} -> {}", self.source, self.destination)?;

        if !self.success {
            let message = self.error_message.as_deref().unwrap_or("unknown error");
            return writeln!(f, "  comparison failed: {message}");
        }

        for skipped in &self.skipped_kinds {
            writeln!(f, "  ! {} skipped: {}", skipped.object_type, skipped.message)?;
        }

        if self.differences.is_empty() {
            return writeln!(f, "  No differences.");
        }

        for diff in &self.differences {
            writeln!(f, "  {diff}")?;
            for attr in &diff.attribute_differences {
                writeln!(f, "      {attr}")?;
            }
        }

        writeln!(
            f,
            "\n  {} differences: {} breaking, {} warning, {} info",
            self.differences.len(),
            self.count_by_severity(Severity::Breaking),
            self.count_by_severity(Severity::Warning),
            self.count_by_severity(Severity::Info)
        )
    }
}
