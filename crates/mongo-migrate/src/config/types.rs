//! Configuration type definitions with auto-tuning based on system resources.

use crate::request::{Endpoint, MigrationMode, MigrationRequest};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use sysinfo::System;
use tracing::info;

/// Lower bound for collection-level parallelism handed to the tools.
pub const MIN_PARALLEL_COLLECTIONS: usize = 4;

/// Upper bound for collection-level parallelism handed to the tools.
pub const MAX_PARALLEL_COLLECTIONS: usize = 16;

/// Collection-level parallelism for a host with `cores` processing units.
pub fn parallelism_for_cores(cores: usize) -> usize {
    cores.clamp(MIN_PARALLEL_COLLECTIONS, MAX_PARALLEL_COLLECTIONS)
}

/// Insertion workers per collection for a host with `cores` processing units.
pub fn insertion_workers_for_cores(cores: usize) -> usize {
    (cores / 4).clamp(1, 8)
}

/// Processing units on this host, detected once per process.
pub fn detected_cpu_cores() -> usize {
    static CORES: OnceLock<usize> = OnceLock::new();
    *CORES.get_or_init(|| {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.cpus().len()
    })
}

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total RAM in GB.
    pub total_memory_gb: f64,
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        let total_memory_gb = sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0);
        let cpu_cores = detected_cpu_cores();

        Self {
            total_memory_gb,
            cpu_cores,
        }
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!(
            "System resources: {:.1} GB RAM, {} CPU cores",
            self.total_memory_gb, self.cpu_cores
        );
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source deployment.
    pub source: Endpoint,

    /// Target deployment.
    pub target: Endpoint,

    /// What to migrate.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// How to run the dump and restore tools.
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set in the config file.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.tools = self.tools.with_auto_tuning(&resources);
        self
    }

    /// Build the migration request described by this configuration.
    pub fn request(&self) -> MigrationRequest {
        let request = match self.migration.mode {
            MigrationMode::SingleDatabase => {
                MigrationRequest::single_database(self.source.clone(), self.target.clone())
            }
            MigrationMode::WholeInstance => {
                let request =
                    MigrationRequest::whole_instance(self.source.clone(), self.target.clone());
                if self.migration.databases.is_empty() {
                    request
                } else {
                    request.with_databases(self.migration.databases.iter().cloned())
                }
            }
        };
        request.with_drop_existing(self.migration.drop_existing)
    }
}

/// Migration scope configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Migration mode (default: single_database).
    #[serde(default)]
    pub mode: MigrationMode,

    /// Databases to migrate in whole_instance mode. Empty means all
    /// non-system databases.
    #[serde(default)]
    pub databases: Vec<String>,

    /// Drop target collections before restoring (default: true).
    #[serde(default = "default_true")]
    pub drop_existing: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            mode: MigrationMode::default(),
            databases: Vec::new(),
            drop_existing: true,
        }
    }
}

/// Dump/restore tool configuration.
/// Performance-related fields use Option<T> to distinguish between
/// "not set" (use auto-tuned default) and "explicitly set" (use provided value).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Dump executable (default: "mongodump").
    #[serde(default = "default_dump_tool")]
    pub dump_tool: String,

    /// Restore executable (default: "mongorestore").
    #[serde(default = "default_restore_tool")]
    pub restore_tool: String,

    /// Parent directory for per-attempt workspaces (default: system temp dir).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,

    /// Collections dumped/restored in parallel. Auto-tuned based on CPU cores if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_collections: Option<usize>,

    /// Insertion workers per collection during restore. Auto-tuned based on CPU cores if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insertion_workers: Option<usize>,

    /// Server selection timeout for connectivity checks (default: 5000 ms).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            dump_tool: default_dump_tool(),
            restore_tool: default_restore_tool(),
            work_dir: None,
            parallel_collections: None,
            insertion_workers: None,
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl ToolsConfig {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that are None (not explicitly set).
    pub fn with_auto_tuning(mut self, resources: &SystemResources) -> Self {
        let cores = resources.cpu_cores;

        if self.parallel_collections.is_none() {
            self.parallel_collections = Some(parallelism_for_cores(cores));
        }

        // Insertion workers: a quarter of the cores, 1-8 range
        if self.insertion_workers.is_none() {
            self.insertion_workers = Some(insertion_workers_for_cores(cores));
        }

        info!(
            "Auto-tuned tools: parallel_collections={}, insertion_workers={}",
            self.get_parallel_collections(),
            self.get_insertion_workers(),
        );

        self
    }

    // Accessors return the effective value. Unset values follow the
    // detected core count, so configs that skipped auto-tuning still scale.

    pub fn get_parallel_collections(&self) -> usize {
        parallelism_for_cores(
            self.parallel_collections
                .unwrap_or_else(detected_cpu_cores),
        )
    }

    pub fn get_insertion_workers(&self) -> usize {
        self.insertion_workers
            .unwrap_or_else(|| insertion_workers_for_cores(detected_cpu_cores()))
            .max(1)
    }

    pub fn get_work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

// Default value functions for serde
fn default_dump_tool() -> String {
    "mongodump".to_string()
}

fn default_restore_tool() -> String {
    "mongorestore".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}
