//! Shared harness: a router over temp files with observable collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use searchlight_core::config::{SearchConfig, TranscodeConfig};
use searchlight_core::streaming::TranscodeProcess;
use searchlight_core::{QueryCache, RangeContentServer, ServeError, Transcoder, TranscodingPipe};
use searchlight_search::{Locator, LocatorError, PaginatedSearchService};
use searchlight_web::{AppState, build_router};
use tower::ServiceExt;

/// Locator with a fixed answer that records every call.
pub struct CountingLocator {
    paths: Vec<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl CountingLocator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Locator for CountingLocator {
    async fn search(&self, _query: &str) -> Result<Vec<String>, LocatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LocatorError::AllBackendsFailed {
                failures: vec!["sdk failed: not running".to_string()],
            });
        }
        Ok(self.paths.clone())
    }
}

/// Transcoder spy; when available it runs `script` under `sh` with the
/// source path as `$1`.
pub struct SpyTranscoder {
    available: bool,
    script: &'static str,
    spawns: AtomicUsize,
}

impl SpyTranscoder {
    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }
}

impl Transcoder for SpyTranscoder {
    fn is_available(&self) -> bool {
        self.available
    }

    fn spawn(&self, source: &Path) -> Result<TranscodeProcess, ServeError> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        let mut command = tokio::process::Command::new("sh");
        command.arg("-c").arg(self.script).arg("sh").arg(source);
        TranscodeProcess::spawn(command)
    }
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub router: Router,
    pub cache: Arc<QueryCache>,
    pub locator: Arc<CountingLocator>,
    pub transcoder: Arc<SpyTranscoder>,
}

pub struct HarnessBuilder {
    files: Vec<(&'static str, Vec<u8>)>,
    located: Vec<&'static str>,
    locator_fails: bool,
    transcoder_available: bool,
    transcoder_script: &'static str,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            located: Vec::new(),
            locator_fails: false,
            transcoder_available: false,
            transcoder_script: "cat \"$1\"",
        }
    }

    pub fn file(mut self, name: &'static str, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push((name, contents.into()));
        self
    }

    /// Names (relative to the temp dir) the locator will return, in order.
    pub fn located(mut self, names: &[&'static str]) -> Self {
        self.located = names.to_vec();
        self
    }

    pub fn locator_fails(mut self) -> Self {
        self.locator_fails = true;
        self
    }

    pub fn transcoder(mut self, script: &'static str) -> Self {
        self.transcoder_available = true;
        self.transcoder_script = script;
        self
    }

    pub fn build(self) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in &self.files {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }

        let locator = Arc::new(CountingLocator {
            paths: self
                .located
                .iter()
                .map(|name| dir.path().join(name).to_string_lossy().into_owned())
                .collect(),
            fail: self.locator_fails,
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(QueryCache::new(Duration::from_secs(600)));
        let search = Arc::new(PaginatedSearchService::new(
            Arc::clone(&cache),
            Arc::clone(&locator) as Arc<dyn Locator>,
            SearchConfig::default(),
        ));

        let transcoder = Arc::new(SpyTranscoder {
            available: self.transcoder_available,
            script: self.transcoder_script,
            spawns: AtomicUsize::new(0),
        });
        let config = TranscodeConfig {
            admission_timeout: Duration::from_millis(200),
            ..TranscodeConfig::default()
        };
        let pipe = Arc::new(TranscodingPipe::new(
            Arc::clone(&transcoder) as Arc<dyn Transcoder>,
            &config,
        ));

        let state = AppState::new(search, RangeContentServer::default(), pipe);
        Harness {
            dir,
            router: build_router(state),
            cache,
            locator,
            transcoder,
        }
    }
}

impl Harness {
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Route prefix followed by the percent-encoded absolute path of `name`.
    pub fn media_uri(&self, prefix: &str, name: &str) -> String {
        let path = self.path(name);
        format!("{prefix}/{}", urlencoding::encode(&path.to_string_lossy()))
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, uri: &str) -> TestResponse {
        self.send(Request::post(uri).body(Body::empty()).unwrap())
            .await
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Deterministic payload where byte `i` is `i % 251`.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
