//! External search command backend.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use searchlight_core::config::CommandBackendConfig;
use tokio::process::Command;
use tracing::{debug, warn};

use super::LocatorBackend;
use crate::errors::LocatorError;

/// Runs a search tool that prints one matching path per line.
///
/// The query is passed as the final argument, never through a shell.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandBackend {
    /// Creates a backend for `program` with fixed leading `args`.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Creates a backend from its configuration section.
    pub fn from_config(config: &CommandBackendConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }
}

#[async_trait]
impl LocatorBackend for CommandBackend {
    fn name(&self) -> &str {
        "command"
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, LocatorError> {
        debug!(
            "Running {} for query '{}'",
            self.program.display(),
            query
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(query)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                LocatorError::backend(
                    self.name(),
                    format!("failed to run {}: {e}", self.program.display()),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().next().unwrap_or("").trim();
            warn!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                detail
            );
            return Err(LocatorError::backend(
                self.name(),
                format!("{} exited with {}", self.program.display(), output.status),
            ));
        }

        Ok(parse_lines(&output.stdout))
    }
}

fn parse_lines(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines_trims_and_drops_blanks() {
        let stdout = b"C:\\media\\a.mkv\r\n\r\n  /srv/b.mp4  \n/srv/b.mp4\n";
        assert_eq!(
            parse_lines(stdout),
            vec!["C:\\media\\a.mkv", "/srv/b.mp4", "/srv/b.mp4"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_query_is_last_argument() {
        let backend = CommandBackend::new(
            "sh",
            vec![
                "-c".to_string(),
                "printf '/found/%s\\n' \"$1\"".to_string(),
                "sh".to_string(),
            ],
        );

        let paths = backend.search("two words").await.unwrap();

        assert_eq!(paths, vec!["/found/two words"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_failure() {
        let backend = CommandBackend::new("sh", vec!["-c".to_string(), "exit 2".to_string()]);

        let result = backend.search("anything").await;

        assert!(matches!(
            result,
            Err(LocatorError::BackendFailed { ref backend, .. }) if backend == "command"
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_failure() {
        let backend = CommandBackend::new("/nonexistent/searchlight-es", Vec::new());
        assert!(backend.search("q").await.is_err());
    }
}
