use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{OrchestratorError, Result};

/// Interpreter names tried, in order, when none is configured
pub const INTERPRETER_CANDIDATES: &[&str] = &["python3", "python"];

/// Locate the interpreter used to launch the agent.
///
/// A configured path wins and must point to an executable file. A bare name
/// (no path separator) is looked up on `PATH`. Without configuration the
/// [`INTERPRETER_CANDIDATES`] are tried.
pub fn discover_interpreter(configured: Option<&Path>) -> Result<PathBuf> {
    let search_paths = get_search_paths();

    if let Some(configured) = configured {
        let found = if configured.components().count() > 1 || configured.is_absolute() {
            is_executable(configured).then(|| configured.to_path_buf())
        } else {
            find_in(&search_paths, &configured.to_string_lossy())
        };
        return found.ok_or_else(|| {
            OrchestratorError::Environment(format!(
                "Configured interpreter '{}' was not found or is not executable",
                configured.display()
            ))
        });
    }

    for name in INTERPRETER_CANDIDATES {
        if let Some(path) = find_in(&search_paths, name) {
            debug!(interpreter = %path.display(), "discovered interpreter");
            return Ok(path);
        }
    }

    Err(OrchestratorError::Environment(format!(
        "No Python interpreter found on PATH (tried {}). Set HERMES_PYTHON or `interpreter` in the config file.",
        INTERPRETER_CANDIDATES.join(", ")
    )))
}

/// Check that the agent entry script exists
pub fn validate_agent_script(script: &Path) -> Result<PathBuf> {
    if script.is_file() {
        Ok(script.to_path_buf())
    } else {
        Err(OrchestratorError::Environment(format!(
            "Agent script '{}' does not exist",
            script.display()
        )))
    }
}

/// Directories from `PATH`
fn get_search_paths() -> Vec<PathBuf> {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).collect())
        .unwrap_or_default()
}

fn find_in(search_paths: &[PathBuf], name: &str) -> Option<PathBuf> {
    for dir in search_paths {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }

        #[cfg(windows)]
        {
            let candidate = dir.join(format!("{}.exe", name));
            if is_executable(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

/// Check if a file is executable
fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    #[cfg(windows)]
    {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("exe"))
            .unwrap_or(false)
    }

    #[cfg(not(any(unix, windows)))]
    {
        true // Assume executable on other platforms
    }
}
