//! Structural model of Postgres schema objects.
//!
//! These are the value objects the comparison engine works on. They are
//! produced by an extractor (a catalog reader, a saved snapshot, ...) and
//! never mutated afterwards.
//!
//! Every kind exposes an identity key through [`Keyed`], which is how the
//! same object is found on both sides of a comparison. Kinds whose
//! attributes are compared also implement [`Diffable`].
//!
//! Identity keys never include the schema name, so that `public.orders`
//! and `staging.orders` are the same table when comparing `public` against
//! `staging`.

use std::fmt;

mod attr;
mod object;
mod table;

pub use attr::{AttributeDifference, AttributeDiffer, AttributeValue};
pub use object::{Extension, Routine, RoutineKind, Sequence, TypeAttribute, TypeDef, TypeKind, View};
pub use table::{
    CheckConstraint, Column, ForeignKey, Index, PrimaryKey, Table, Trigger, UniqueConstraint,
};

/// An object that can be matched between source and destination.
pub trait Keyed {
    /// The value used to match this object against the other side.
    fn identity_key(&self) -> String;

    /// DDL-like text describing this object, if one can be rendered.
    fn definition(&self) -> Option<String>;
}

/// An object whose attributes are compared once it is matched.
pub trait Diffable: Keyed {
    /// Attribute differences between `self` (source) and `other` (destination).
    ///
    /// Both objects are expected to share the same identity key.
    fn differences_from(&self, other: &Self) -> Vec<AttributeDifference>;
}

/// A PostgreSQL identifier, always double-quoted.
///
/// ```
/// use pgdrift_model::Ident;
/// assert_eq!(Ident("order").to_string(), "\"order\"");
/// assert_eq!(Ident("we\"ird").to_string(), "\"we\"\"ird\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0.as_ref().replace('"', "\"\""))
    }
}

/// Schema-qualified, quoted name: `"schema"."name"`.
pub(crate) fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", Ident(schema), Ident(name))
}

/// Quote every identifier in a list and join with commas.
pub(crate) fn ident_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| Ident(n).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests;
