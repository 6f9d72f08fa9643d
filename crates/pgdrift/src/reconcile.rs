//! Keyed set reconciliation.
//!
//! Given the objects of one kind on each side, emit:
//!
//! - `MISSING` for keys only in the source,
//! - `EXTRA` for keys only in the destination,
//! - `MODIFIED` for keys on both sides whose attributes differ.
//!
//! Emission order is source order (missing and modified interleaved as
//! they are encountered), then destination order for extras. It only
//! depends on the input order, so repeated runs agree.

use crate::{ObjectDifference, ObjectType, Result};
use indexmap::IndexMap;
use pgdrift_model::{
    AttributeDifference, CheckConstraint, Column, Diffable, Extension, ForeignKey, Index, Keyed,
    PrimaryKey, Routine, RoutineKind, Sequence, Table, Trigger, TypeDef, UniqueConstraint, View,
};

/// A model object that knows which [`ObjectType`] it reports as.
pub trait SchemaObject: Keyed {
    fn object_type(&self) -> ObjectType;
}

macro_rules! fixed_object_type {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl SchemaObject for $ty {
                fn object_type(&self) -> ObjectType {
                    ObjectType::$variant
                }
            }
        )*
    };
}

fixed_object_type! {
    Table => Table,
    Column => Column,
    PrimaryKey => PrimaryKey,
    ForeignKey => ForeignKey,
    UniqueConstraint => UniqueConstraint,
    CheckConstraint => CheckConstraint,
    Index => Index,
    Trigger => Trigger,
    Sequence => Sequence,
    TypeDef => Type,
    Extension => Extension,
}

impl SchemaObject for View {
    fn object_type(&self) -> ObjectType {
        if self.materialized {
            ObjectType::MaterializedView
        } else {
            ObjectType::View
        }
    }
}

impl SchemaObject for Routine {
    fn object_type(&self) -> ObjectType {
        match self.kind {
            RoutineKind::Function => ObjectType::Function,
            RoutineKind::Procedure => ObjectType::Procedure,
        }
    }
}

/// Index objects by identity key. On duplicate keys the last one wins.
pub fn keyed<T: Keyed>(items: &[T]) -> IndexMap<String, &T> {
    let mut map = IndexMap::with_capacity(items.len());
    for item in items {
        let key = item.identity_key();
        if map.insert(key.clone(), item).is_some() {
            tracing::warn!(%key, "duplicate identity key, keeping the last occurrence");
        }
    }
    map
}

/// Appends differences for one object kind to a shared accumulator.
pub struct Reconciler<'a> {
    /// Owning table, for table parts.
    scope: Option<&'a str>,
    out: &'a mut Vec<ObjectDifference>,
}

impl<'a> Reconciler<'a> {
    /// Reconciler for schema-level objects.
    pub fn new(out: &'a mut Vec<ObjectDifference>) -> Self {
        Self { scope: None, out }
    }

    /// Reconciler for the parts of one table; names come out as `table.part`.
    pub fn scoped(table: &'a str, out: &'a mut Vec<ObjectDifference>) -> Self {
        Self {
            scope: Some(table),
            out,
        }
    }

    fn name(&self, key: &str) -> String {
        match self.scope {
            Some(table) => format!("{table}.{key}"),
            None => key.to_string(),
        }
    }

    /// Reconcile with attribute comparison of matched pairs.
    ///
    /// Returns the number of differences emitted.
    pub fn reconcile<T: SchemaObject + Diffable>(&mut self, source: &[T], destination: &[T]) -> Result<usize> {
        self.walk(source, destination, |s, d| s.differences_from(d))
    }

    /// Reconcile on presence only; matched pairs never count as modified.
    pub fn reconcile_presence<T: SchemaObject>(&mut self, source: &[T], destination: &[T]) -> usize {
        let before = self.out.len();
        let source = keyed(source);
        let destination = keyed(destination);

        for (key, s) in &source {
            if !destination.contains_key(key) {
                self.push_missing(key, *s);
            }
        }
        for (key, d) in &destination {
            if !source.contains_key(key) {
                self.push_extra(key, *d);
            }
        }
        self.out.len() - before
    }

    /// Reconcile an object a table has at most one of, like its primary key.
    ///
    /// Presence on one side only is reported without looking at attributes;
    /// when both sides have it, the attributes decide, names included.
    pub fn reconcile_single<T: SchemaObject + Diffable>(
        &mut self,
        source: Option<&T>,
        destination: Option<&T>,
    ) -> Result<usize> {
        let before = self.out.len();
        match (source, destination) {
            (Some(s), None) => self.push_missing(&s.identity_key(), s),
            (None, Some(d)) => self.push_extra(&d.identity_key(), d),
            (Some(s), Some(d)) => {
                let diffs = s.differences_from(d);
                self.push_modified(&s.identity_key(), s, d, diffs)?;
            }
            (None, None) => {}
        }
        Ok(self.out.len() - before)
    }

    fn walk<T, F>(&mut self, source: &[T], destination: &[T], diff: F) -> Result<usize>
    where
        T: SchemaObject,
        F: Fn(&T, &T) -> Vec<AttributeDifference>,
    {
        let before = self.out.len();
        let source = keyed(source);
        let destination = keyed(destination);

        for (key, s) in &source {
            match destination.get(key) {
                None => self.push_missing(key, *s),
                Some(d) => {
                    let diffs = diff(*s, *d);
                    self.push_modified(key, *s, *d, diffs)?;
                }
            }
        }
        for (key, d) in &destination {
            if !source.contains_key(key) {
                self.push_extra(key, *d);
            }
        }
        Ok(self.out.len() - before)
    }

    fn push_missing<T: SchemaObject>(&mut self, key: &str, object: &T) {
        let name = self.name(key);
        self.out.push(ObjectDifference::missing(
            object.object_type(),
            name,
            object.definition(),
        ));
    }

    fn push_extra<T: SchemaObject>(&mut self, key: &str, object: &T) {
        let name = self.name(key);
        self.out.push(ObjectDifference::extra(
            object.object_type(),
            name,
            object.definition(),
        ));
    }

    fn push_modified<T: SchemaObject>(
        &mut self,
        key: &str,
        source: &T,
        destination: &T,
        diffs: Vec<AttributeDifference>,
    ) -> Result<()> {
        if diffs.is_empty() {
            return Ok(());
        }
        let name = self.name(key);
        self.out.push(ObjectDifference::modified(
            source.object_type(),
            name,
            diffs,
            source.definition(),
            destination.definition(),
        )?);
        Ok(())
    }
}
