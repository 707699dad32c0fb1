//! One-shot constitution fetch
//!
//! Runs the agent's constitution generator once and returns its stdout. Has no
//! relation to the workflow state and may run while a workflow is active.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{OrchestratorError, Result};

/// Prints the generated constitution for the project root given as argv[1]
const GENERATOR_SNIPPET: &str = "import sys\n\
from zswe_agent.constitution import ConstitutionGenerator\n\
sys.stdout.write(ConstitutionGenerator(sys.argv[1]).generate())\n";

#[derive(Debug, Clone)]
pub struct ConstitutionFetcher {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl ConstitutionFetcher {
    /// Fetcher that imports the generator from the package containing
    /// `agent_script` (`<pkg_parent>/zswe_agent/main.py`).
    pub fn for_agent(interpreter: impl Into<PathBuf>, agent_script: &Path) -> Self {
        let working_dir = agent_script
            .parent()
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf);

        Self {
            program: interpreter.into(),
            args: vec!["-c".to_string(), GENERATOR_SNIPPET.to_string()],
            working_dir,
        }
    }

    /// Fetcher running an arbitrary generator; the project root is appended
    /// as the last argument.
    pub fn with_command(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    /// Generate the constitution for `project_root`.
    ///
    /// Returns the whole stdout on exit code 0. Any other outcome is an error
    /// carrying stderr; no partial document is ever returned.
    pub async fn fetch(&self, project_root: &Path) -> Result<String> {
        let project_root = project_root
            .canonicalize()
            .unwrap_or_else(|_| project_root.to_path_buf());

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        debug!(root = %project_root.display(), "fetching constitution");
        let output = cmd.output().await.map_err(|e| {
            OrchestratorError::Constitution(format!(
                "failed to run '{}': {}",
                self.program.display(),
                e
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(code = ?output.status.code(), "constitution generator failed");
            return Err(OrchestratorError::Constitution(if stderr.is_empty() {
                match output.status.code() {
                    Some(code) => format!("generator exited with code {}", code),
                    None => "generator was terminated by a signal".to_string(),
                }
            } else {
                stderr
            }));
        }

        String::from_utf8(output.stdout).map_err(|_| {
            OrchestratorError::Constitution("generator output was not valid UTF-8".to_string())
        })
    }
}
