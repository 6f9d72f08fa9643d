//! Seams between the comparison engine and whatever produces structural objects.
//!
//! The orchestrator only knows these two traits. [`crate::PgConnector`] and
//! [`crate::PgExtractor`] talk to live servers; [`crate::SnapshotConnector`]
//! and [`crate::SnapshotExtractor`] serve saved snapshots.

use crate::reconcile::SchemaObject;
use crate::{ObjectType, Result, SchemaRef};
use indexmap::IndexMap;
use pgdrift_model::{Routine, Sequence, Table, TypeDef, View};
use std::future::Future;

/// Opens a connection to one side of a comparison.
///
/// The returned connection is owned by the caller and released when dropped.
pub trait Connector: Send + Sync {
    type Connection: Send + Sync;

    fn connect(
        &self,
        target: &SchemaRef,
    ) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// Builds structural objects for one schema over a connection.
///
/// Every method returns a complete snapshot for its kind: tables come with
/// their columns, constraints, indexes and triggers already nested.
pub trait SchemaExtractor<Conn: Sync>: Send + Sync {
    fn tables(&self, conn: &Conn, schema: &str)
    -> impl Future<Output = Result<Vec<Table>>> + Send;

    /// Plain and materialized views.
    fn views(&self, conn: &Conn, schema: &str) -> impl Future<Output = Result<Vec<View>>> + Send;

    /// Functions and procedures.
    fn routines(
        &self,
        conn: &Conn,
        schema: &str,
    ) -> impl Future<Output = Result<Vec<Routine>>> + Send;

    fn sequences(
        &self,
        conn: &Conn,
        schema: &str,
    ) -> impl Future<Output = Result<Vec<Sequence>>> + Send;

    fn types(&self, conn: &Conn, schema: &str)
    -> impl Future<Output = Result<Vec<TypeDef>>> + Send;

    /// Installed extensions, name to version. Database-wide.
    fn extensions(&self, conn: &Conn)
    -> impl Future<Output = Result<IndexMap<String, String>>> + Send;

    /// User schemas visible on the connection.
    fn list_schemas(&self, conn: &Conn) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Object counts per kind, tables and their parts included.
    fn schema_summary(
        &self,
        conn: &Conn,
        schema: &str,
    ) -> impl Future<Output = Result<IndexMap<ObjectType, usize>>> + Send {
        async move {
            let mut summary = IndexMap::new();

            for table in self.tables(conn, schema).await? {
                let parts = [
                    (ObjectType::Table, 1),
                    (ObjectType::Column, table.columns.len()),
                    (ObjectType::PrimaryKey, usize::from(table.primary_key.is_some())),
                    (ObjectType::ForeignKey, table.foreign_keys.len()),
                    (ObjectType::UniqueConstraint, table.unique_constraints.len()),
                    (ObjectType::CheckConstraint, table.check_constraints.len()),
                    (ObjectType::Index, table.indexes.len()),
                    (ObjectType::Trigger, table.triggers.len()),
                ];
                for (object_type, count) in parts {
                    *summary.entry(object_type).or_insert(0) += count;
                }
            }

            count_into(&mut summary, &self.views(conn, schema).await?);
            count_into(&mut summary, &self.routines(conn, schema).await?);
            count_into(&mut summary, &self.sequences(conn, schema).await?);
            count_into(&mut summary, &self.types(conn, schema).await?);

            summary.retain(|_, count| *count > 0);
            Ok(summary)
        }
    }
}

fn count_into<T: SchemaObject>(summary: &mut IndexMap<ObjectType, usize>, objects: &[T]) {
    for object in objects {
        *summary.entry(object.object_type()).or_insert(0) += 1;
    }
}
