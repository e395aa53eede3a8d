//! Configuration validation.

use super::{Config, MAX_PARALLEL_COLLECTIONS, MIN_PARALLEL_COLLECTIONS};
use crate::error::{MigrateError, Result};

/// Validate the configuration.
///
/// Mode-specific request checks happen per attempt, after command-line
/// overrides have been applied.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.uri.trim().is_empty() {
        return Err(MigrateError::Config("source.uri is required".into()));
    }
    if config.target.uri.trim().is_empty() {
        return Err(MigrateError::Config("target.uri is required".into()));
    }

    if config.source.base_uri() == config.target.base_uri()
        && config.source.dbname == config.target.dbname
    {
        return Err(MigrateError::Config(
            "source and target point at the same location".into(),
        ));
    }

    if config.tools.dump_tool.trim().is_empty() {
        return Err(MigrateError::Config("tools.dump_tool cannot be empty".into()));
    }
    if config.tools.restore_tool.trim().is_empty() {
        return Err(MigrateError::Config(
            "tools.restore_tool cannot be empty".into(),
        ));
    }

    // Tuning validation - only check if explicitly set
    if let Some(n) = config.tools.parallel_collections {
        if !(MIN_PARALLEL_COLLECTIONS..=MAX_PARALLEL_COLLECTIONS).contains(&n) {
            return Err(MigrateError::Config(format!(
                "tools.parallel_collections must be between {} and {}, got {}",
                MIN_PARALLEL_COLLECTIONS, MAX_PARALLEL_COLLECTIONS, n
            )));
        }
    }
    if let Some(0) = config.tools.insertion_workers {
        return Err(MigrateError::Config(
            "tools.insertion_workers must be at least 1".into(),
        ));
    }
    if config.tools.probe_timeout_ms == 0 {
        return Err(MigrateError::Config(
            "tools.probe_timeout_ms must be at least 1".into(),
        ));
    }

    if config
        .migration
        .databases
        .iter()
        .any(|name| name.trim().is_empty())
    {
        return Err(MigrateError::Config(
            "migration.databases cannot contain empty names".into(),
        ));
    }

    Ok(())
}
