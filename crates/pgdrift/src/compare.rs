//! The comparison orchestrator.
//!
//! A comparison opens one connection per side, then walks the enabled
//! object kinds in a fixed order: tables (with their parts), views,
//! functions and procedures, sequences, types, extensions. Each kind is
//! extracted from both sides and reconciled on its own; a kind that fails
//! to extract is recorded in [`SchemaComparisonResult::skipped_kinds`] and
//! the walk goes on. Only a failure to connect aborts the comparison.

use crate::filter::NamePattern;
use crate::reconcile::{Reconciler, keyed};
use crate::{
    ComparisonFilter, Connector, ObjectDifference, ObjectType, Result, SchemaComparisonResult,
    SchemaExtractor, SchemaRef, SkippedKind,
};
use indexmap::IndexMap;
use pgdrift_model::{Extension, Table, View};
use tracing::Instrument;

/// Compares two schemas, possibly on different instances and databases.
///
/// Holds no per-comparison state, so one service can serve concurrent
/// callers.
pub struct DatabaseDiffService<C, E> {
    connector: C,
    extractor: E,
}

/// The two open connections of one comparison and the schema on each.
struct Sides<'a, Conn> {
    source: &'a Conn,
    source_schema: &'a str,
    destination: &'a Conn,
    destination_schema: &'a str,
}

impl<C, E> DatabaseDiffService<C, E>
where
    C: Connector,
    E: SchemaExtractor<C::Connection>,
{
    pub fn new(connector: C, extractor: E) -> Self {
        Self {
            connector,
            extractor,
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Compare `source` (the reference) against `destination`.
    ///
    /// Never fails: connection errors come back as a result with
    /// `success == false` and an error message.
    pub async fn compare(
        &self,
        source: &SchemaRef,
        destination: &SchemaRef,
        filter: &ComparisonFilter,
    ) -> SchemaComparisonResult {
        let span = tracing::info_span!(
            "pgdrift.compare",
            source = %source,
            destination = %destination,
        );
        self.run(source, destination, filter).instrument(span).await
    }

    async fn run(
        &self,
        source: &SchemaRef,
        destination: &SchemaRef,
        filter: &ComparisonFilter,
    ) -> SchemaComparisonResult {
        let mut result = SchemaComparisonResult::new(source, destination, filter.clone());

        let source_conn = match self.connector.connect(source).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "cannot connect to source");
                return result.fail(format!("source {source}: {e}"));
            }
        };
        // Returning here drops `source_conn`.
        let destination_conn = match self.connector.connect(destination).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "cannot connect to destination");
                return result.fail(format!("destination {destination}: {e}"));
            }
        };

        let sides = Sides {
            source: &source_conn,
            source_schema: &source.schema,
            destination: &destination_conn,
            destination_schema: &destination.schema,
        };
        let matcher = filter.name_matcher();

        if filter.include_tables {
            let outcome = self.tables(&sides, filter, &matcher).await;
            absorb(&mut result, ObjectType::Table, outcome);
        }
        if filter.include_views {
            let outcome = self.views(&sides, &matcher).await;
            absorb(&mut result, ObjectType::View, outcome);
        }
        if filter.include_functions {
            let outcome = self.routines(&sides).await;
            absorb(&mut result, ObjectType::Function, outcome);
        }
        if filter.include_sequences {
            let outcome = self.sequences(&sides).await;
            absorb(&mut result, ObjectType::Sequence, outcome);
        }
        if filter.include_types {
            let outcome = self.types(&sides).await;
            absorb(&mut result, ObjectType::Type, outcome);
        }
        if filter.include_extensions {
            let outcome = self.extensions(&sides).await;
            absorb(&mut result, ObjectType::Extension, outcome);
        }

        result.success = true;
        tracing::info!(
            differences = result.differences.len(),
            skipped = result.skipped_kinds.len(),
            max_severity = ?result.max_severity(),
            "comparison finished"
        );
        result
    }

    async fn tables(
        &self,
        sides: &Sides<'_, C::Connection>,
        filter: &ComparisonFilter,
        matcher: &NamePattern,
    ) -> Result<Vec<ObjectDifference>> {
        let mut source = self
            .extractor
            .tables(sides.source, sides.source_schema)
            .await?;
        let mut destination = self
            .extractor
            .tables(sides.destination, sides.destination_schema)
            .await?;
        source.retain(|t| matcher.matches(&t.name));
        destination.retain(|t| matcher.matches(&t.name));

        let mut out = Vec::new();
        Reconciler::new(&mut out).reconcile(&source, &destination)?;

        let destination_by_key = keyed(&destination);
        for (key, table) in keyed(&source) {
            if let Some(other) = destination_by_key.get(&key) {
                table_parts(table, other, filter, &mut out)?;
            }
        }
        Ok(out)
    }

    async fn views(
        &self,
        sides: &Sides<'_, C::Connection>,
        matcher: &NamePattern,
    ) -> Result<Vec<ObjectDifference>> {
        let keep = |views: Vec<View>| -> Vec<View> {
            views
                .into_iter()
                .filter(|v| matcher.matches(&v.name))
                .collect()
        };
        let source = keep(
            self.extractor
                .views(sides.source, sides.source_schema)
                .await?,
        );
        let destination = keep(
            self.extractor
                .views(sides.destination, sides.destination_schema)
                .await?,
        );

        let mut out = Vec::new();
        Reconciler::new(&mut out).reconcile(&source, &destination)?;
        Ok(out)
    }

    async fn routines(&self, sides: &Sides<'_, C::Connection>) -> Result<Vec<ObjectDifference>> {
        let source = self
            .extractor
            .routines(sides.source, sides.source_schema)
            .await?;
        let destination = self
            .extractor
            .routines(sides.destination, sides.destination_schema)
            .await?;

        let mut out = Vec::new();
        Reconciler::new(&mut out).reconcile(&source, &destination)?;
        Ok(out)
    }

    async fn sequences(&self, sides: &Sides<'_, C::Connection>) -> Result<Vec<ObjectDifference>> {
        let source = self
            .extractor
            .sequences(sides.source, sides.source_schema)
            .await?;
        let destination = self
            .extractor
            .sequences(sides.destination, sides.destination_schema)
            .await?;

        let mut out = Vec::new();
        Reconciler::new(&mut out).reconcile(&source, &destination)?;
        Ok(out)
    }

    async fn types(&self, sides: &Sides<'_, C::Connection>) -> Result<Vec<ObjectDifference>> {
        let source = self
            .extractor
            .types(sides.source, sides.source_schema)
            .await?;
        let destination = self
            .extractor
            .types(sides.destination, sides.destination_schema)
            .await?;

        let mut out = Vec::new();
        Reconciler::new(&mut out).reconcile(&source, &destination)?;
        Ok(out)
    }

    async fn extensions(&self, sides: &Sides<'_, C::Connection>) -> Result<Vec<ObjectDifference>> {
        let source = as_extensions(self.extractor.extensions(sides.source).await?);
        let destination = as_extensions(self.extractor.extensions(sides.destination).await?);

        let mut out = Vec::new();
        Reconciler::new(&mut out).reconcile(&source, &destination)?;
        Ok(out)
    }
}

/// Columns, keys, constraints, indexes and triggers of a table present on
/// both sides. Each part is gated by its own filter toggle.
fn table_parts(
    source: &Table,
    destination: &Table,
    filter: &ComparisonFilter,
    out: &mut Vec<ObjectDifference>,
) -> Result<()> {
    let mut parts = Reconciler::scoped(&source.name, out);

    if filter.include_columns {
        parts.reconcile(&source.columns, &destination.columns)?;
    }
    if filter.include_primary_keys {
        parts.reconcile_single(source.primary_key.as_ref(), destination.primary_key.as_ref())?;
    }
    if filter.include_foreign_keys {
        parts.reconcile(&source.foreign_keys, &destination.foreign_keys)?;
    }
    if filter.include_unique_constraints {
        parts.reconcile_presence(&source.unique_constraints, &destination.unique_constraints);
    }
    if filter.include_check_constraints {
        parts.reconcile_presence(&source.check_constraints, &destination.check_constraints);
    }
    if filter.include_indexes {
        parts.reconcile(&source.indexes, &destination.indexes)?;
    }
    if filter.include_triggers {
        parts.reconcile(&source.triggers, &destination.triggers)?;
    }
    Ok(())
}

fn as_extensions(versions: IndexMap<String, String>) -> Vec<Extension> {
    versions
        .into_iter()
        .map(|(name, version)| Extension::new(name, version))
        .collect()
}

/// Fold one kind's outcome into the result.
fn absorb(
    result: &mut SchemaComparisonResult,
    object_type: ObjectType,
    outcome: Result<Vec<ObjectDifference>>,
) {
    match outcome {
        Ok(differences) => {
            tracing::debug!(kind = %object_type, count = differences.len(), "compared");
            result.differences.extend(differences);
        }
        Err(e) => {
            tracing::warn!(kind = %object_type, error = %e, "extraction failed, skipping kind");
            result.skipped_kinds.push(SkippedKind {
                object_type,
                message: e.to_string(),
            });
        }
    }
}
