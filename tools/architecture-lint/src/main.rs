//! Command-line entry point: lints `roster/src` in the enclosing workspace.
//!
//! An explicit crate directory may be passed as the only argument.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const LINTED_CRATE: &str = "roster";

fn main() -> ExitCode {
    let crate_dir = match std::env::args_os().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => match workspace_root() {
            Ok(root) => root.join(LINTED_CRATE),
            Err(err) => return report(&err),
        },
    };
    match architecture_lint::lint_crate_sources(&crate_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

fn report(err: &dyn fmt::Display) -> ExitCode {
    let _ = writeln!(io::stderr().lock(), "{err}");
    ExitCode::FAILURE
}

#[derive(Debug, Clone, Copy)]
struct WorkspaceRootError;

impl fmt::Display for WorkspaceRootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("no enclosing Cargo workspace found; pass the crate directory explicitly")
    }
}

impl std::error::Error for WorkspaceRootError {}

/// First directory holding a workspace manifest, searched upwards from
/// `CARGO_WORKSPACE_DIR`, the working directory and this tool's manifest.
fn workspace_root() -> Result<PathBuf, WorkspaceRootError> {
    let starts = [
        std::env::var_os("CARGO_WORKSPACE_DIR").map(PathBuf::from),
        std::env::current_dir().ok(),
        Some(PathBuf::from(env!("CARGO_MANIFEST_DIR"))),
    ];
    starts
        .iter()
        .flatten()
        .find_map(|start| find_workspace_root(start))
        .ok_or(WorkspaceRootError)
}

fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| is_workspace_manifest(&dir.join("Cargo.toml")))
        .map(Path::to_path_buf)
}

fn is_workspace_manifest(path: &Path) -> bool {
    fs::read_to_string(path).is_ok_and(|contents| {
        contents
            .lines()
            .any(|line| line.trim() == "[workspace]")
    })
}
