//! Severity policy.
//!
//! The comparison is directional: the source is authoritative, so anything
//! only found in the destination is drift that a forward migration cannot
//! resolve on its own. Missing objects rank by how much behavior they
//! carry: constraints and triggers above plain columns and indexes.

use crate::{DifferenceType, ObjectType, Severity};
use pgdrift_model::AttributeDifference;

/// Classify one difference. The policy is fixed.
pub fn classify(
    object_type: ObjectType,
    difference_type: DifferenceType,
    attribute_differences: &[AttributeDifference],
) -> Severity {
    match difference_type {
        DifferenceType::Extra => Severity::Breaking,
        DifferenceType::Missing => missing(object_type),
        DifferenceType::Modified => modified(object_type, attribute_differences),
    }
}

fn missing(object_type: ObjectType) -> Severity {
    match object_type {
        ObjectType::PrimaryKey
        | ObjectType::ForeignKey
        | ObjectType::Trigger
        | ObjectType::Extension => Severity::Warning,
        _ => Severity::Info,
    }
}

fn modified(object_type: ObjectType, attribute_differences: &[AttributeDifference]) -> Severity {
    match object_type {
        ObjectType::Column => column(attribute_differences),
        ObjectType::PrimaryKey
        | ObjectType::ForeignKey
        | ObjectType::Trigger
        | ObjectType::View
        | ObjectType::MaterializedView
        | ObjectType::Function
        | ObjectType::Procedure
        | ObjectType::Type => Severity::Warning,
        // Tables only compare owner and comment here, extensions only their
        // version. Unique and check constraints are matched by name alone.
        ObjectType::Table
        | ObjectType::Index
        | ObjectType::Sequence
        | ObjectType::Extension
        | ObjectType::UniqueConstraint
        | ObjectType::CheckConstraint => Severity::Info,
    }
}

/// A type change, or a column that is nullable in the destination but
/// NOT NULL in the source, can fail against existing rows.
fn column(attribute_differences: &[AttributeDifference]) -> Severity {
    let risky = attribute_differences.iter().any(|d| match d.attribute_name.as_str() {
        "dataType" => true,
        "nullable" => {
            d.source_value.as_deref() == Some("false")
                && d.destination_value.as_deref() == Some("true")
        }
        _ => false,
    });

    if risky {
        Severity::Warning
    } else {
        Severity::Info
    }
}
