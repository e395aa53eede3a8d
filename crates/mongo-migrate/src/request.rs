//! Endpoints and per-attempt migration requests.

use crate::error::{MigrateError, Result};
use crate::runner::Redactor;
use crate::uri;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A MongoDB deployment plus, optionally, one database on it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Connection URI. May carry credentials and options.
    pub uri: String,

    /// Database name. Empty when the whole instance is addressed.
    #[serde(default)]
    pub dbname: String,
}

impl Endpoint {
    pub fn new(uri: impl Into<String>, dbname: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            dbname: dbname.into(),
        }
    }

    /// Endpoint addressing a whole instance.
    pub fn instance(uri: impl Into<String>) -> Self {
        Self::new(uri, "")
    }

    /// URI with any database path removed, as handed to the tools.
    pub fn base_uri(&self) -> String {
        uri::strip_database(&self.uri)
    }

    /// Credential-free identity for messages.
    pub fn display(&self) -> String {
        let host = uri::display_host(&self.uri);
        if self.dbname.is_empty() {
            host
        } else {
            format!("{}/{}", host, self.dbname)
        }
    }

    /// Strings that must be scrubbed from output involving this endpoint.
    pub fn secrets(&self) -> Vec<String> {
        let mut secrets = uri::secrets(&self.uri);
        let base = self.base_uri();
        if !secrets.is_empty() && base != self.uri {
            secrets.push(base);
        }
        secrets
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uri = uri::mask_password(&self.uri, Redactor::MASK);
        f.debug_struct("Endpoint")
            .field("uri", &uri)
            .field("dbname", &self.dbname)
            .finish()
    }
}

/// What a migration attempt copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationMode {
    /// One database, optionally renamed on the target.
    #[default]
    SingleDatabase,

    /// Every non-system database of the source instance.
    WholeInstance,
}

/// Databases that are never migrated in whole-instance mode.
pub const SYSTEM_DATABASES: [&str; 3] = ["admin", "config", "local"];

/// Whether `name` is one of the server's own databases.
pub fn is_system_database(name: &str) -> bool {
    SYSTEM_DATABASES.contains(&name)
}

/// Everything needed to run one migration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRequest {
    pub source: Endpoint,
    pub target: Endpoint,
    pub mode: MigrationMode,

    /// Explicit database list (whole-instance mode only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_databases: Option<BTreeSet<String>>,

    /// Drop target collections in scope before loading. The caller opts in
    /// to this overwrite explicitly.
    pub drop_existing: bool,
}

impl MigrationRequest {
    /// Copy `source.dbname` to `target.dbname`.
    pub fn single_database(source: Endpoint, target: Endpoint) -> Self {
        Self {
            source,
            target,
            mode: MigrationMode::SingleDatabase,
            selected_databases: None,
            drop_existing: true,
        }
    }

    /// Copy every non-system database.
    pub fn whole_instance(source: Endpoint, target: Endpoint) -> Self {
        Self {
            source,
            target,
            mode: MigrationMode::WholeInstance,
            selected_databases: None,
            drop_existing: true,
        }
    }

    /// Restrict a whole-instance migration to these databases.
    pub fn with_databases<I, S>(mut self, databases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_databases = Some(databases.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_drop_existing(mut self, drop_existing: bool) -> Self {
        self.drop_existing = drop_existing;
        self
    }

    /// Check the request shape. Nothing is contacted or spawned.
    pub fn validate(&self) -> Result<()> {
        if self.source.uri.trim().is_empty() {
            return Err(MigrateError::Validation("source uri is required".into()));
        }
        if self.target.uri.trim().is_empty() {
            return Err(MigrateError::Validation("target uri is required".into()));
        }

        let same_instance = self.source.base_uri() == self.target.base_uri();

        match self.mode {
            MigrationMode::SingleDatabase => {
                if self.source.dbname.trim().is_empty() {
                    return Err(MigrateError::Validation(
                        "source database name is required in single-database mode".into(),
                    ));
                }
                if self.target.dbname.trim().is_empty() {
                    return Err(MigrateError::Validation(
                        "target database name is required in single-database mode".into(),
                    ));
                }
                if self.selected_databases.is_some() {
                    return Err(MigrateError::Validation(
                        "a database selection is only supported in whole-instance mode".into(),
                    ));
                }
                if same_instance && self.source.dbname == self.target.dbname {
                    return Err(MigrateError::Validation(
                        "source and target cannot be the same database".into(),
                    ));
                }
            }
            MigrationMode::WholeInstance => {
                if let Some(selected) = &self.selected_databases {
                    if selected.is_empty() {
                        return Err(MigrateError::Validation(
                            "database selection is empty".into(),
                        ));
                    }
                    if selected.iter().any(|name| name.trim().is_empty()) {
                        return Err(MigrateError::Validation(
                            "database selection contains an empty name".into(),
                        ));
                    }
                }
                if same_instance {
                    return Err(MigrateError::Validation(
                        "source and target cannot be the same instance".into(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Redactor covering the credentials of both endpoints.
    pub fn redactor(&self) -> Redactor {
        Redactor::new(
            self.source
                .secrets()
                .into_iter()
                .chain(self.target.secrets()),
        )
    }

    /// Whether restore has to move the namespace to a new database name.
    pub fn renames_database(&self) -> bool {
        self.mode == MigrationMode::SingleDatabase && self.source.dbname != self.target.dbname
    }
}
