//! Live connections to configured Postgres instances.

use crate::traced::{BoxFuture, Connection};
use crate::{Connector, Error, Result, SchemaRef};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use indexmap::IndexMap;
use pgdrift_config::{Config, Instance};
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

struct InstanceHandle {
    settings: Instance,
    pool: Pool,
}

/// Connects to instances by name.
///
/// Each instance gets one pool for its home database. A [`SchemaRef`]
/// naming another database gets a dedicated connection instead, closed
/// when the returned [`PgConnection`] is dropped.
pub struct PgConnector {
    instances: IndexMap<String, InstanceHandle>,
}

impl PgConnector {
    pub fn new() -> Self {
        Self {
            instances: IndexMap::new(),
        }
    }

    /// One pool per configured instance. Pools connect lazily.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut connector = Self::new();
        for (name, instance) in &config.instances {
            connector.add_instance(name.clone(), instance.clone())?;
        }
        Ok(connector)
    }

    pub fn add_instance(&mut self, name: impl Into<String>, settings: Instance) -> Result<()> {
        let name = name.into();
        let manager = Manager::from_config(
            Self::base_config(&settings),
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(settings.pool_size())
            .build()
            .map_err(|e| Error::PoolSetup {
                instance: name.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!(instance = %name, host = %settings.host, "registered instance");
        self.instances.insert(name, InstanceHandle { settings, pool });
        Ok(())
    }

    pub fn instance_names(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    fn base_config(settings: &Instance) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&settings.host)
            .port(settings.port())
            .user(&settings.user)
            .dbname(&settings.database)
            .application_name("pgdrift");
        if let Some(password) = &settings.password {
            config.password(password);
        }
        config
    }

    fn handle(&self, target: &SchemaRef) -> Result<&InstanceHandle> {
        self.instances
            .get(&target.instance)
            .ok_or_else(|| Error::UnknownInstance(target.instance.clone()))
    }

    /// Client settings for `target`, with its database applied.
    pub fn connection_config(&self, target: &SchemaRef) -> Result<tokio_postgres::Config> {
        let handle = self.handle(target)?;
        let mut config = Self::base_config(&handle.settings);
        if let Some(database) = &target.database {
            config.dbname(database);
        }
        Ok(config)
    }

    fn uses_home_database(handle: &InstanceHandle, target: &SchemaRef) -> bool {
        target
            .database
            .as_deref()
            .is_none_or(|db| db == handle.settings.database)
    }
}

impl Default for PgConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for PgConnector {
    type Connection = PgConnection;

    async fn connect(&self, target: &SchemaRef) -> Result<PgConnection> {
        let handle = self.handle(target)?;

        if Self::uses_home_database(handle, target) {
            let object = handle.pool.get().await.map_err(|e| Error::Connection {
                target: target.to_string(),
                message: e.to_string(),
            })?;
            tracing::debug!(schema = %target, "checked out pooled connection");
            return Ok(PgConnection::Pooled(object));
        }

        let config = self.connection_config(target)?;
        let (client, connection) = config.connect(NoTls).await.map_err(|e| Error::Connection {
            target: target.to_string(),
            message: e.to_string(),
        })?;

        let label = target.to_string();
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(schema = %label, error = %e, "connection closed with error");
            }
        });
        tracing::debug!(schema = %target, "opened dedicated connection");

        Ok(PgConnection::Dedicated { client, driver })
    }
}

/// A connection owned by one side of one comparison.
pub enum PgConnection {
    /// Returned to its pool on drop.
    Pooled(deadpool_postgres::Object),
    /// Closed on drop.
    Dedicated {
        client: tokio_postgres::Client,
        driver: JoinHandle<()>,
    },
}

impl Drop for PgConnection {
    fn drop(&mut self) {
        if let PgConnection::Dedicated { driver, .. } = self {
            driver.abort();
        }
    }
}

impl Connection for PgConnection {
    fn query<'a>(&'a self, sql: &'a str, params: &'a [&'a (dyn ToSql + Sync)]) -> BoxFuture<'a, Vec<Row>> {
        match self {
            PgConnection::Pooled(object) => Connection::query(object, sql, params),
            PgConnection::Dedicated { client, .. } => Connection::query(client, sql, params),
        }
    }
}
