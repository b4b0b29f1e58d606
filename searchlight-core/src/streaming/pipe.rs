//! Live transcoding pipe.
//!
//! Streams a transcoder's stdout straight into an HTTP body while a second
//! task drains its stderr. A supervisor task owns the child process and
//! reaps it on every exit path: normal EOF, read failure, or client
//! disconnect (the body is dropped, which closes the channel).

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::stream;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::transcode::{TranscodeProcess, Transcoder};
use crate::ServeError;
use crate::config::TranscodeConfig;

/// Upper bound on waiting for stderr EOF after the child has been reaped.
const DIAGNOSTICS_GRACE: Duration = Duration::from_secs(5);

type Chunk = Result<Bytes, std::io::Error>;

/// Final accounting for one transcode request.
#[derive(Debug)]
pub struct TranscodeOutcome {
    /// Bytes handed to the response body
    pub bytes_sent: u64,
    /// Exit status once reaped; `None` if waiting on the child failed
    pub exit: Option<ExitStatus>,
    /// Whether the response body was dropped before the stream ended
    pub client_disconnected: bool,
    /// Diagnostic lines that mentioned an error
    pub diagnostic_errors: usize,
}

impl TranscodeOutcome {
    pub fn succeeded(&self) -> bool {
        !self.client_disconnected && self.exit.is_some_and(|status| status.success())
    }
}

/// A started transcode: the response body plus the supervisor handle.
pub struct TranscodeSession {
    body: Body,
    completion: JoinHandle<TranscodeOutcome>,
}

impl TranscodeSession {
    /// Splits the session into its body and the supervisor handle.
    pub fn into_parts(self) -> (Body, JoinHandle<TranscodeOutcome>) {
        (self.body, self.completion)
    }
}

impl IntoResponse for TranscodeSession {
    /// Detaches the supervisor; it keeps running until the child is reaped.
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "video/mp4"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            self.body,
        )
            .into_response()
    }
}

/// Admission-controlled launcher for transcoder processes.
pub struct TranscodingPipe {
    transcoder: Arc<dyn Transcoder>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    admission_timeout: Duration,
    read_chunk_size: usize,
    channel_capacity: usize,
}

impl TranscodingPipe {
    pub fn new(transcoder: Arc<dyn Transcoder>, config: &TranscodeConfig) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            transcoder,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            admission_timeout: config.admission_timeout,
            read_chunk_size: config.read_chunk_size.max(1),
            channel_capacity: config.channel_capacity.max(1),
        }
    }

    pub fn is_available(&self) -> bool {
        self.transcoder.is_available()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Transcoder processes currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent
            .saturating_sub(self.permits.available_permits())
    }

    /// Starts transcoding `source` and returns the streaming session.
    ///
    /// The slot taken here is released only after the child is reaped.
    ///
    /// # Errors
    /// - `ServeError::Unavailable` - No transcoder, or no slot freed up in time
    /// - `ServeError::NotFound` - Source file does not exist
    /// - `ServeError::InvalidArgument` - Source is not a regular file
    /// - `ServeError::Internal` - Stat or spawn failed
    pub async fn start(&self, source: &Path) -> Result<TranscodeSession, ServeError> {
        if !self.transcoder.is_available() {
            return Err(ServeError::Unavailable {
                reason: "Transcoder not available".to_string(),
            });
        }

        let metadata = tokio::fs::metadata(source)
            .await
            .map_err(|e| ServeError::from_io(source, "stat", e))?;
        if !metadata.is_file() {
            return Err(ServeError::InvalidArgument {
                reason: format!("Not a regular file: {}", source.display()),
            });
        }

        let permit = self.acquire_slot().await?;
        let process = self.transcoder.spawn(source)?;
        info!(
            "Transcoding {} ({} of {} slots in use)",
            source.display(),
            self.in_flight(),
            self.max_concurrent
        );

        let (tx, rx) = mpsc::channel::<Chunk>(self.channel_capacity);
        let completion = tokio::spawn(supervise(
            process,
            tx,
            permit,
            source.to_path_buf(),
            self.read_chunk_size,
        ));

        let body = Body::from_stream(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        }));

        Ok(TranscodeSession { body, completion })
    }

    async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit, ServeError> {
        let acquire = Arc::clone(&self.permits).acquire_owned();
        match tokio::time::timeout(self.admission_timeout, acquire).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_closed)) => Err(ServeError::Unavailable {
                reason: "Transcoder shut down".to_string(),
            }),
            Err(_elapsed) => {
                warn!(
                    "No transcoder slot freed within {:?} ({} in flight)",
                    self.admission_timeout, self.max_concurrent
                );
                Err(ServeError::Unavailable {
                    reason: "Too many concurrent transcodes".to_string(),
                })
            }
        }
    }
}

/// Owns the child for its whole life and reports how it ended.
async fn supervise(
    process: TranscodeProcess,
    tx: mpsc::Sender<Chunk>,
    permit: OwnedSemaphorePermit,
    source: PathBuf,
    read_chunk_size: usize,
) -> TranscodeOutcome {
    let TranscodeProcess {
        mut child,
        stdout,
        stderr,
    } = process;

    let diagnostics = spawn_diagnostics(stderr, source.clone());
    let copy = copy_output(stdout, &tx, read_chunk_size).await;

    if copy.client_disconnected || copy.read_error.is_some() {
        if let Err(e) = child.start_kill() {
            debug!("Transcoder for {} already gone: {}", source.display(), e);
        }
    }

    let exit = match child.wait().await {
        Ok(status) => Some(status),
        Err(e) => {
            error!("Failed to reap transcoder for {}: {}", source.display(), e);
            None
        }
    };

    let diagnostic_errors = match tokio::time::timeout(DIAGNOSTICS_GRACE, diagnostics).await {
        Ok(Ok(count)) => count,
        Ok(Err(e)) => {
            error!("Transcoder diagnostics task failed: {}", e);
            0
        }
        Err(_) => {
            warn!(
                "Transcoder stderr for {} still open after exit",
                source.display()
            );
            0
        }
    };

    if !copy.client_disconnected {
        let failure = match (&copy.read_error, exit) {
            (Some(e), _) => Some(format!("reading transcoder output failed: {e}")),
            (None, Some(status)) if !status.success() => {
                Some(format!("transcoder exited with {status}"))
            }
            (None, None) => Some("transcoder exit status unknown".to_string()),
            _ => None,
        };
        if let Some(message) = failure {
            warn!("Aborting transcode of {}: {}", source.display(), message);
            // Ends the body with an error so the client sees a truncated
            // transfer rather than a clean EOF.
            let _ = tx.send(Err(std::io::Error::other(message))).await;
        }
    }
    drop(tx);
    drop(permit);

    let outcome = TranscodeOutcome {
        bytes_sent: copy.bytes_sent,
        exit,
        client_disconnected: copy.client_disconnected,
        diagnostic_errors,
    };

    if outcome.client_disconnected {
        info!(
            "Client left transcode of {} after {} bytes; process reaped",
            source.display(),
            outcome.bytes_sent
        );
    } else if outcome.succeeded() {
        info!(
            "Transcode of {} finished: {} bytes",
            source.display(),
            outcome.bytes_sent
        );
    }

    outcome
}

struct CopyResult {
    bytes_sent: u64,
    client_disconnected: bool,
    read_error: Option<std::io::Error>,
}

/// Moves stdout chunks into the body channel until EOF, error or disconnect.
///
/// A full channel blocks the loop, so a slow client throttles the child.
async fn copy_output(
    mut stdout: ChildStdout,
    tx: &mpsc::Sender<Chunk>,
    read_chunk_size: usize,
) -> CopyResult {
    let mut result = CopyResult {
        bytes_sent: 0,
        client_disconnected: false,
        read_error: None,
    };
    let mut buffer = BytesMut::with_capacity(read_chunk_size);

    loop {
        buffer.reserve(read_chunk_size);
        tokio::select! {
            biased;

            _ = tx.closed() => {
                result.client_disconnected = true;
                break;
            }
            read = stdout.read_buf(&mut buffer) => match read {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = buffer.split().freeze();
                    if tx.send(Ok(chunk)).await.is_err() {
                        result.client_disconnected = true;
                        break;
                    }
                    result.bytes_sent += n as u64;
                }
                Err(e) => {
                    result.read_error = Some(e);
                    break;
                }
            }
        }
    }

    result
}

/// Drains stderr line by line so the child never blocks on a full pipe.
///
/// Only lines that mention an error are logged; progress output is
/// discarded. Returns the number of error lines.
fn spawn_diagnostics(stderr: ChildStderr, source: PathBuf) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut line = Vec::new();
        let mut errors = 0;

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    let text = text.trim_end();
                    if text.to_ascii_lowercase().contains("error") {
                        errors += 1;
                        warn!("Transcoder [{}]: {}", source.display(), text);
                    }
                }
                Err(e) => {
                    debug!("Transcoder stderr closed for {}: {}", source.display(), e);
                    break;
                }
            }
        }

        errors
    })
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::StreamExt;
    use tokio::process::Command;

    use super::*;

    /// Runs a shell script as the transcoder; `$1` is the source path.
    struct ScriptTranscoder {
        script: &'static str,
        spawns: AtomicUsize,
    }

    impl ScriptTranscoder {
        fn new(script: &'static str) -> Arc<Self> {
            Arc::new(Self {
                script,
                spawns: AtomicUsize::new(0),
            })
        }
    }

    impl Transcoder for ScriptTranscoder {
        fn is_available(&self) -> bool {
            true
        }

        fn spawn(&self, source: &Path) -> Result<TranscodeProcess, ServeError> {
            self.spawns.fetch_add(1, Ordering::SeqCst);
            let mut command = Command::new("sh");
            command.arg("-c").arg(self.script).arg("sh").arg(source);
            TranscodeProcess::spawn(command)
        }
    }

    struct MissingTranscoder {
        spawns: AtomicUsize,
    }

    impl Transcoder for MissingTranscoder {
        fn is_available(&self) -> bool {
            false
        }

        fn spawn(&self, _source: &Path) -> Result<TranscodeProcess, ServeError> {
            self.spawns.fetch_add(1, Ordering::SeqCst);
            Err(ServeError::Unavailable {
                reason: "should not be called".to_string(),
            })
        }
    }

    fn config(max_concurrent: usize, admission_timeout: Duration) -> TranscodeConfig {
        TranscodeConfig {
            max_concurrent,
            admission_timeout,
            read_chunk_size: 16,
            channel_capacity: 2,
            ..TranscodeConfig::default()
        }
    }

    fn source_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[tokio::test]
    async fn test_streams_stdout_and_counts_diagnostics() {
        let transcoder = ScriptTranscoder::new("cat \"$1\"; echo 'Error: odd frame' >&2");
        let pipe = TranscodingPipe::new(transcoder, &config(2, Duration::from_secs(1)));
        let source = source_file(b"fragmented mp4 payload that spans several chunks");

        let (body, completion) = pipe.start(source.path()).await.unwrap().into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let outcome = completion.await.unwrap();

        assert_eq!(&bytes[..], b"fragmented mp4 payload that spans several chunks");
        assert!(outcome.succeeded());
        assert_eq!(outcome.bytes_sent, bytes.len() as u64);
        assert_eq!(outcome.diagnostic_errors, 1);
        assert_eq!(pipe.in_flight(), 0);
    }

    /// Counts events whose message contains `needle`.
    struct MessageCounter {
        needle: &'static str,
        hits: Arc<AtomicUsize>,
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for MessageCounter {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut message = String::new();
            event.record(&mut MessageVisitor(&mut message));
            if message.contains(self.needle) {
                self.hits.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct MessageVisitor<'a>(&'a mut String);

    impl tracing::field::Visit for MessageVisitor<'_> {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0.push_str(&format!("{value:?}"));
            }
        }
    }

    #[tokio::test]
    async fn test_progress_lines_are_drained_without_logging() {
        use tracing_subscriber::layer::SubscriberExt;

        let progress = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry()
            .with(MessageCounter {
                needle: "frame=",
                hits: Arc::clone(&progress),
            })
            .with(MessageCounter {
                needle: "odd packet",
                hits: Arc::clone(&errors),
            });
        let _guard = tracing::subscriber::set_default(subscriber);

        let transcoder = ScriptTranscoder::new(
            "i=0; while [ $i -lt 50 ]; do echo \"frame=$i fps=30 progress\" >&2; i=$((i+1)); done; \
             echo 'Error: odd packet' >&2; cat \"$1\"",
        );
        let pipe = TranscodingPipe::new(transcoder, &config(2, Duration::from_secs(1)));
        let source = source_file(b"payload");

        let (body, completion) = pipe.start(source.path()).await.unwrap().into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let outcome = completion.await.unwrap();

        assert_eq!(&bytes[..], b"payload");
        assert_eq!(outcome.diagnostic_errors, 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(progress.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_exit_aborts_body() {
        let transcoder = ScriptTranscoder::new("printf partial; exit 3");
        let pipe = TranscodingPipe::new(transcoder, &config(2, Duration::from_secs(1)));
        let source = source_file(b"x");

        let (body, completion) = pipe.start(source.path()).await.unwrap().into_parts();
        let result = axum::body::to_bytes(body, usize::MAX).await;
        let outcome = completion.await.unwrap();

        assert!(result.is_err());
        assert_eq!(outcome.exit.and_then(|s| s.code()), Some(3));
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn test_client_disconnect_kills_and_reaps() {
        let transcoder = ScriptTranscoder::new("exec yes");
        let pipe = TranscodingPipe::new(transcoder, &config(1, Duration::from_secs(1)));
        let source = source_file(b"x");

        let (body, completion) = pipe.start(source.path()).await.unwrap().into_parts();
        let mut frames = body.into_data_stream();
        assert!(frames.next().await.unwrap().is_ok());
        drop(frames);

        let outcome = tokio::time::timeout(Duration::from_secs(5), completion)
            .await
            .expect("supervisor should finish after disconnect")
            .unwrap();

        assert!(outcome.client_disconnected);
        assert!(outcome.exit.is_some_and(|s| !s.success()));
        assert_eq!(pipe.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_transcoder_never_spawns() {
        let transcoder = Arc::new(MissingTranscoder {
            spawns: AtomicUsize::new(0),
        });
        let pipe = TranscodingPipe::new(transcoder.clone(), &config(2, Duration::from_secs(1)));
        let source = source_file(b"x");

        let result = pipe.start(source.path()).await;

        assert!(matches!(result, Err(ServeError::Unavailable { .. })));
        assert_eq!(transcoder.spawns.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_source_is_not_found() {
        let transcoder = ScriptTranscoder::new("cat \"$1\"");
        let pipe = TranscodingPipe::new(transcoder.clone(), &config(2, Duration::from_secs(1)));
        let dir = tempfile::tempdir().unwrap();

        let result = pipe.start(&dir.path().join("missing.avi")).await;

        assert!(matches!(result, Err(ServeError::NotFound { .. })));
        assert_eq!(transcoder.spawns.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_admission_limit_rejects_when_full() {
        let transcoder = ScriptTranscoder::new("exec sleep 30");
        let pipe = TranscodingPipe::new(transcoder.clone(), &config(1, Duration::from_millis(50)));
        let source = source_file(b"x");

        let first = pipe.start(source.path()).await.unwrap();
        assert_eq!(pipe.in_flight(), 1);

        let second = pipe.start(source.path()).await;
        assert!(matches!(second, Err(ServeError::Unavailable { .. })));
        assert_eq!(transcoder.spawns.load(Ordering::SeqCst), 1);

        let (body, completion) = first.into_parts();
        drop(body);
        let outcome = completion.await.unwrap();
        assert!(outcome.client_disconnected);
        assert_eq!(pipe.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_session_response_headers() {
        let transcoder = ScriptTranscoder::new("cat \"$1\"");
        let pipe = TranscodingPipe::new(transcoder, &config(1, Duration::from_secs(1)));
        let source = source_file(b"abc");

        let response = pipe.start(source.path()).await.unwrap().into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert!(response.headers().get(header::ACCEPT_RANGES).is_none());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"abc");
    }
}
