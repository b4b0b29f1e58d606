//! Transcoder abstraction and the ffmpeg implementation.
//!
//! A transcoder turns a source file into a fragmented MP4 written to its
//! standard output. Encoding parameters are process-wide constants; nothing
//! from the request reaches the command line except the source path.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{info, warn};

use crate::ServeError;

/// Encoder arguments placed between the input and the output target.
///
/// H.264/AAC with a bitrate ceiling and fixed buffer size keeps the
/// per-request CPU and memory cost bounded.
const ENCODE_ARGS: &[&str] = &[
    "-c:v",
    "libx264",
    "-preset",
    "fast",
    "-crf",
    "23",
    "-maxrate",
    "2M",
    "-bufsize",
    "4M",
    "-c:a",
    "aac",
    "-f",
    "mp4",
    "-movflags",
    "frag_keyframe+empty_moov+default_base_moof",
    "pipe:1",
];

/// A running transcoder with its output and diagnostic channels detached.
pub struct TranscodeProcess {
    pub child: Child,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

impl TranscodeProcess {
    /// Spawns `command` with piped stdout/stderr and a null stdin.
    ///
    /// The child is killed if its handle is dropped before being reaped.
    ///
    /// # Errors
    /// - `ServeError::Internal` - The process could not be started
    pub fn spawn(mut command: Command) -> Result<Self, ServeError> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ServeError::Internal {
                operation: "spawn transcoder".to_string(),
                source: e,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        Ok(Self {
            child,
            stdout,
            stderr,
        })
    }
}

fn missing_pipe(name: &str) -> ServeError {
    ServeError::Internal {
        operation: format!("attach transcoder {name}"),
        source: std::io::Error::other(format!("{name} pipe was not captured")),
    }
}

/// External re-encoder that streams a browser-playable container.
pub trait Transcoder: Send + Sync {
    /// Whether the transcoder was found at startup.
    fn is_available(&self) -> bool;

    /// Starts transcoding `source`.
    ///
    /// # Errors
    /// - `ServeError::Internal` - The process could not be started
    fn spawn(&self, source: &Path) -> Result<TranscodeProcess, ServeError>;
}

/// ffmpeg invoked as a child process.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
    available: bool,
}

impl FfmpegTranscoder {
    /// Probes `binary -version` once and remembers whether it succeeded.
    pub async fn probe(binary: impl Into<PathBuf>) -> Self {
        let binary = binary.into();
        let result = Command::new(&binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;

        let available = match result {
            Ok(status) if status.success() => {
                info!("Transcoder available: {}", binary.display());
                true
            }
            Ok(status) => {
                warn!(
                    "Transcoder {} found but `-version` exited with {}",
                    binary.display(),
                    status
                );
                false
            }
            Err(e) => {
                warn!("Transcoder {} not usable: {}", binary.display(), e);
                false
            }
        };

        Self { binary, available }
    }

    /// Creates a transcoder with a known availability, skipping the probe.
    pub fn with_availability(binary: impl Into<PathBuf>, available: bool) -> Self {
        Self {
            binary: binary.into(),
            available,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Builds the full ffmpeg argument list for `source`.
    pub fn build_args(source: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-nostats", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(source.as_os_str().to_os_string());
        args.extend(ENCODE_ARGS.iter().map(OsString::from));
        args
    }
}

impl Transcoder for FfmpegTranscoder {
    fn is_available(&self) -> bool {
        self.available
    }

    fn spawn(&self, source: &Path) -> Result<TranscodeProcess, ServeError> {
        let mut command = Command::new(&self.binary);
        command.args(Self::build_args(source));
        info!("Starting transcoder for {}", source.display());
        TranscodeProcess::spawn(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_args() {
        let args = FfmpegTranscoder::build_args(Path::new("/media/clip.avi"));
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "/media/clip.avi");
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
        assert!(args.windows(2).any(|w| w == ["-maxrate", "2M"]));
        assert!(args.windows(2).any(|w| w == ["-bufsize", "4M"]));
        assert!(args.iter().any(|a| a.contains("empty_moov")));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn test_source_with_spaces_stays_one_argument() {
        let args = FfmpegTranscoder::build_args(Path::new("/media/my clip -c:v copy.avi"));
        assert!(args.iter().any(|a| a == "/media/my clip -c:v copy.avi"));
        assert_eq!(args.iter().filter(|a| *a == "-c:v").count(), 1);
    }

    #[tokio::test]
    async fn test_probe_missing_binary_is_unavailable() {
        let transcoder = FfmpegTranscoder::probe("/nonexistent/searchlight-ffmpeg").await;
        assert!(!transcoder.is_available());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_failing_binary_is_unavailable() {
        let transcoder = FfmpegTranscoder::probe("false").await;
        assert!(!transcoder.is_available());
    }

    #[test]
    fn test_with_availability_skips_probe() {
        let transcoder = FfmpegTranscoder::with_availability("ffmpeg", true);
        assert!(transcoder.is_available());
        assert_eq!(transcoder.binary(), Path::new("ffmpeg"));
    }
}
