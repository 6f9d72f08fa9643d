//! Saved schema snapshots served through the collaborator traits.
//!
//! A snapshot is what an extractor would have produced for each schema of
//! one database, stored as JSON. Comparing two snapshots needs no server.

use crate::{Connector, Error, Result, SchemaExtractor, SchemaRef};
use facet::Facet;
use indexmap::IndexMap;
use pgdrift_model::{Routine, Sequence, Table, TypeDef, View};
use std::path::Path;
use std::sync::Arc;

/// Every object of one schema.
#[derive(Debug, Clone, Default, PartialEq, Facet)]
pub struct SchemaSnapshot {
    #[facet(default)]
    pub tables: Vec<Table>,
    #[facet(default)]
    pub views: Vec<View>,
    #[facet(default)]
    pub routines: Vec<Routine>,
    #[facet(default)]
    pub sequences: Vec<Sequence>,
    #[facet(default)]
    pub types: Vec<TypeDef>,
}

/// Every schema of one database, plus its extensions.
#[derive(Debug, Clone, Default, PartialEq, Facet)]
pub struct DatabaseSnapshot {
    #[facet(default)]
    pub schemas: IndexMap<String, SchemaSnapshot>,
    /// Extension name to version.
    #[facet(default)]
    pub extensions: IndexMap<String, String>,
}

impl DatabaseSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        facet_json::from_str(json).map_err(|e| Error::Snapshot(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Snapshot(format!("{}: {e}", path.display())))?;
        Self::from_json(&json).map_err(|e| match e {
            Error::Snapshot(message) => Error::Snapshot(format!("{}: {message}", path.display())),
            other => other,
        })
    }

    pub fn with_schema(mut self, name: impl Into<String>, schema: SchemaSnapshot) -> Self {
        self.schemas.insert(name.into(), schema);
        self
    }

    pub fn with_extension(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.extensions.insert(name.into(), version.into());
        self
    }
}

/// Serves snapshots keyed by `instance` or `instance:database`.
#[derive(Debug, Clone, Default)]
pub struct SnapshotConnector {
    databases: IndexMap<String, Arc<DatabaseSnapshot>>,
}

impl SnapshotConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a snapshot under a database key (see [`SchemaRef::database_key`]).
    pub fn insert(&mut self, key: impl Into<String>, snapshot: DatabaseSnapshot) {
        self.databases.insert(key.into(), Arc::new(snapshot));
    }

    pub fn with_database(mut self, key: impl Into<String>, snapshot: DatabaseSnapshot) -> Self {
        self.insert(key, snapshot);
        self
    }
}

/// A handle on one registered snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotConnection {
    database: Arc<DatabaseSnapshot>,
}

impl SnapshotConnection {
    fn schema(&self, name: &str) -> Option<&SchemaSnapshot> {
        self.database.schemas.get(name)
    }
}

impl Connector for SnapshotConnector {
    type Connection = SnapshotConnection;

    async fn connect(&self, target: &SchemaRef) -> Result<SnapshotConnection> {
        let key = target.database_key();
        let database = self
            .databases
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::Connection {
                target: target.to_string(),
                message: format!("no snapshot registered for {key}"),
            })?;
        Ok(SnapshotConnection { database })
    }
}

/// Reads objects out of a [`SnapshotConnection`]. Unknown schemas are empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotExtractor;

impl SnapshotExtractor {
    fn collect<T: Clone>(
        conn: &SnapshotConnection,
        schema: &str,
        pick: impl Fn(&SchemaSnapshot) -> &Vec<T>,
    ) -> Vec<T> {
        conn.schema(schema).map(|s| pick(s).clone()).unwrap_or_default()
    }
}

impl SchemaExtractor<SnapshotConnection> for SnapshotExtractor {
    async fn tables(&self, conn: &SnapshotConnection, schema: &str) -> Result<Vec<Table>> {
        Ok(Self::collect(conn, schema, |s| &s.tables))
    }

    async fn views(&self, conn: &SnapshotConnection, schema: &str) -> Result<Vec<View>> {
        Ok(Self::collect(conn, schema, |s| &s.views))
    }

    async fn routines(&self, conn: &SnapshotConnection, schema: &str) -> Result<Vec<Routine>> {
        Ok(Self::collect(conn, schema, |s| &s.routines))
    }

    async fn sequences(&self, conn: &SnapshotConnection, schema: &str) -> Result<Vec<Sequence>> {
        Ok(Self::collect(conn, schema, |s| &s.sequences))
    }

    async fn types(&self, conn: &SnapshotConnection, schema: &str) -> Result<Vec<TypeDef>> {
        Ok(Self::collect(conn, schema, |s| &s.types))
    }

    async fn extensions(&self, conn: &SnapshotConnection) -> Result<IndexMap<String, String>> {
        Ok(conn.database.extensions.clone())
    }

    async fn list_schemas(&self, conn: &SnapshotConnection) -> Result<Vec<String>> {
        Ok(conn.database.schemas.keys().cloned().collect())
    }
}
