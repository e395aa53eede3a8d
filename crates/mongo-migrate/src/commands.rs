//! Argument vectors for `mongodump` and `mongorestore`.
//!
//! Databases are always passed separately from the URI, which is stripped
//! of its path so the two can never disagree.

use crate::config::ToolsConfig;
use crate::request::{MigrationMode, MigrationRequest};
use crate::runner::ToolInvocation;
use std::path::{Path, PathBuf};

/// Namespace pattern matching every collection of `db`.
pub fn namespace(db: &str) -> String {
    format!("{}.*", db)
}

/// Dump invocation.
///
/// `databases` is the discovered database list for whole-instance mode and
/// is ignored in single-database mode.
pub fn dump_command(
    tools: &ToolsConfig,
    request: &MigrationRequest,
    databases: &[String],
    out_dir: &Path,
) -> ToolInvocation {
    let mut cmd = ToolInvocation::new(&tools.dump_tool)
        .flag("--uri", request.source.base_uri())
        .flag("--out", out_dir.to_string_lossy());

    match request.mode {
        MigrationMode::SingleDatabase => {
            cmd = cmd.flag("--db", &request.source.dbname);
        }
        MigrationMode::WholeInstance => {
            for db in databases {
                cmd = cmd.flag("--nsInclude", namespace(db));
            }
        }
    }

    cmd.flag(
        "--numParallelCollections",
        tools.get_parallel_collections().to_string(),
    )
}

/// Restore invocation reading from the dump root `dump_dir`.
pub fn restore_command(
    tools: &ToolsConfig,
    request: &MigrationRequest,
    databases: &[String],
    dump_dir: &Path,
) -> ToolInvocation {
    let mut cmd = ToolInvocation::new(&tools.restore_tool).flag("--uri", request.target.base_uri());

    if request.drop_existing {
        cmd = cmd.arg("--drop");
    }

    match request.mode {
        MigrationMode::SingleDatabase => {
            let source_ns = namespace(&request.source.dbname);
            cmd = cmd.flag("--nsInclude", &source_ns);
            if request.renames_database() {
                cmd = cmd
                    .flag("--nsFrom", source_ns)
                    .flag("--nsTo", namespace(&request.target.dbname));
            }
        }
        MigrationMode::WholeInstance => {
            for db in databases {
                cmd = cmd.flag("--nsInclude", namespace(db));
            }
        }
    }

    cmd.flag(
        "--numParallelCollections",
        tools.get_parallel_collections().to_string(),
    )
    .flag(
        "--numInsertionWorkersPerCollection",
        tools.get_insertion_workers().to_string(),
    )
    .arg(dump_dir.to_string_lossy())
}

/// Directory that must exist after a successful dump.
pub fn expected_dump_path(request: &MigrationRequest, dump_dir: &Path) -> PathBuf {
    match request.mode {
        MigrationMode::SingleDatabase => dump_dir.join(&request.source.dbname),
        MigrationMode::WholeInstance => dump_dir.to_path_buf(),
    }
}
