//! Structural comparison of Postgres schemas.
//!
//! Given two schemas, possibly on different server instances or in
//! different databases of one instance, pgdrift matches their objects by
//! identity, compares matched pairs attribute by attribute, and reports
//! every difference with a severity:
//!
//! - `MISSING`: in the source (the reference) but not the destination,
//! - `EXTRA`: in the destination only,
//! - `MODIFIED`: on both sides with differing attributes.
//!
//! The result is plain data meant for migration generators, reports and
//! storage. Nothing here ever writes to a database.
//!
//! ```ignore
//! let (config, _path) = pgdrift_config::load()?;
//! let service = DatabaseDiffService::new(PgConnector::from_config(&config)?, PgExtractor);
//!
//! let result = service
//!     .compare(
//!         &SchemaRef::new("prod", "public"),
//!         &SchemaRef::new("staging", "public"),
//!         &ComparisonFilter::from(&config.filter),
//!     )
//!     .await;
//! println!("{result}");
//! ```
//!
//! Saved snapshots go through [`SnapshotConnector`] and [`SnapshotExtractor`]
//! instead, with no server involved.

mod catalog;
mod compare;
mod difference;
mod error;
mod extract;
mod filter;
mod pool;
pub mod reconcile;
mod result;
pub mod severity;
mod snapshot;
mod traced;

pub use catalog::PgExtractor;
pub use compare::DatabaseDiffService;
pub use difference::{DifferenceType, ObjectDifference, ObjectType, Severity};
pub use error::Error;
pub use extract::{Connector, SchemaExtractor};
pub use filter::{ComparisonFilter, NamePattern};
pub use pool::{PgConnection, PgConnector};
pub use result::{SchemaComparisonResult, SchemaRef, SkippedKind};
pub use snapshot::{DatabaseSnapshot, SchemaSnapshot, SnapshotConnection, SnapshotConnector, SnapshotExtractor};
pub use traced::{Connection, ConnectionExt, TracedConn};

pub use pgdrift_model as model;

pub type Result<T> = std::result::Result<T, Error>;
