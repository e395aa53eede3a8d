//! Live queries against MongoDB endpoints.
//!
//! Used for the connectivity probe before every attempt, database discovery
//! in whole-instance mode, and the post-restore validation counts.

use crate::error::{MigrateError, Result};
use crate::request::{is_system_database, Endpoint};
use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Facts reported by the connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server version string, "Unknown" if not reported.
    pub version: String,
}

/// Basic statistics for one database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub collections: i64,
    pub objects: i64,
    pub data_size: i64,
    pub storage_size: i64,
}

/// Read-only access to an endpoint.
#[async_trait]
pub trait EndpointInspector: Send + Sync {
    /// Handshake plus server version.
    async fn probe(&self, endpoint: &Endpoint) -> Result<ServerInfo>;

    /// All database names, system databases included.
    async fn list_databases(&self, endpoint: &Endpoint) -> Result<Vec<String>>;

    /// Number of collections in `db`.
    async fn collection_count(&self, endpoint: &Endpoint, db: &str) -> Result<usize>;

    /// `dbStats` for `db`.
    async fn database_stats(&self, endpoint: &Endpoint, db: &str) -> Result<DatabaseStats>;

    /// Database names without `admin`, `config` and `local`, sorted.
    async fn list_user_databases(&self, endpoint: &Endpoint) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .list_databases(endpoint)
            .await?
            .into_iter()
            .filter(|name| !is_system_database(name))
            .collect();
        names.sort();
        Ok(names)
    }
}

/// [`EndpointInspector`] backed by the MongoDB driver.
#[derive(Debug, Clone)]
pub struct MongoInspector {
    timeout: Duration,
}

impl MongoInspector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn client(&self, endpoint: &Endpoint) -> Result<Client> {
        let mut options = ClientOptions::parse(&endpoint.uri)
            .await
            .map_err(|e| connectivity(endpoint, e))?;
        options.server_selection_timeout = Some(self.timeout);
        options.connect_timeout = Some(self.timeout);
        options.app_name = Some("mongo-migrate".to_string());
        Client::with_options(options).map_err(|e| connectivity(endpoint, e))
    }
}

impl Default for MongoInspector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

fn connectivity(endpoint: &Endpoint, err: mongodb::error::Error) -> MigrateError {
    MigrateError::connectivity(endpoint.display(), err.to_string())
}

/// Numeric field that the server may report as int32, int64 or double.
fn number(doc: &Document, key: &str) -> i64 {
    match doc.get(key) {
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Double(v)) => *v as i64,
        _ => 0,
    }
}

#[async_trait]
impl EndpointInspector for MongoInspector {
    async fn probe(&self, endpoint: &Endpoint) -> Result<ServerInfo> {
        let client = self.client(endpoint).await?;
        let admin = client.database("admin");

        // hello does not require authentication.
        admin
            .run_command(doc! { "hello": 1 })
            .await
            .map_err(|e| connectivity(endpoint, e))?;

        let build_info = admin
            .run_command(doc! { "buildInfo": 1 })
            .await
            .map_err(|e| connectivity(endpoint, e))?;
        let version = build_info
            .get_str("version")
            .unwrap_or("Unknown")
            .to_string();

        debug!("{} is MongoDB {}", endpoint.display(), version);
        Ok(ServerInfo { version })
    }

    async fn list_databases(&self, endpoint: &Endpoint) -> Result<Vec<String>> {
        let client = self.client(endpoint).await?;
        client
            .list_database_names()
            .await
            .map_err(|e| connectivity(endpoint, e))
    }

    async fn collection_count(&self, endpoint: &Endpoint, db: &str) -> Result<usize> {
        let client = self.client(endpoint).await?;
        let names = client
            .database(db)
            .list_collection_names()
            .await
            .map_err(|e| connectivity(endpoint, e))?;
        Ok(names.len())
    }

    async fn database_stats(&self, endpoint: &Endpoint, db: &str) -> Result<DatabaseStats> {
        let client = self.client(endpoint).await?;
        let stats = client
            .database(db)
            .run_command(doc! { "dbStats": 1 })
            .await
            .map_err(|e| connectivity(endpoint, e))?;

        Ok(DatabaseStats {
            collections: number(&stats, "collections"),
            objects: number(&stats, "objects"),
            data_size: number(&stats, "dataSize"),
            storage_size: number(&stats, "storageSize"),
        })
    }
}
