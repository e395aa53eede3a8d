//! # mongo-migrate
//!
//! MongoDB to MongoDB migration library built on `mongodump` and
//! `mongorestore`.
//!
//! Each attempt dumps the source into a private temporary workspace,
//! restores it into the target and reports progress as a stream of
//! [`LogEvent`]s:
//!
//! - **Single-database mode** copies one database, optionally under a new name
//! - **Whole-instance mode** copies every non-system database, or a selection
//! - **Credential redaction** on every line that leaves the library
//! - **Cancellation** stops the running tool and still cleans up
//!
//! ## Example
//!
//! ```rust,no_run
//! use mongo_migrate::{Config, MemorySink, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> mongo_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?.with_auto_tuning();
//!     let orchestrator = Orchestrator::new(config.tools.clone());
//!     let sink = MemorySink::new();
//!     let result = orchestrator
//!         .run(&config.request(), &sink, &CancellationToken::new())
//!         .await;
//!     println!("{}: {}", result.attempt_id, result.message);
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod inspect;
pub mod orchestrator;
pub mod request;
pub mod runner;
pub mod uri;
pub mod workspace;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SystemResources, ToolsConfig};
pub use error::{MigrateError, Result};
pub use event::{LogEvent, LogSink, MemorySink, MigrationPhase};
pub use inspect::{DatabaseStats, EndpointInspector, MongoInspector, ServerInfo};
pub use orchestrator::{
    CheckStatus, HealthCheckResult, MigrationHandle, MigrationResult, Orchestrator,
    PreflightCheck,
};
pub use request::{Endpoint, MigrationMode, MigrationRequest};
pub use runner::{ProcessRunner, Redactor, ToolInvocation, ToolRunner};
pub use workspace::Workspace;
