//! Background feed fetcher.
//!
//! Each fetch runs on its own tokio task. The task reads the request (HTTP GET
//! or local file), parses it with the parser supplied by the owning source,
//! and sends exactly one [`FetchCompletion`] to the owner, unless its stop
//! flag was raised, in which case it sends nothing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, CONTENT_TYPE};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span, warn};
use url::Url;

use super::{Feed, FeedRequest, FetchError};
use crate::book::mime::is_html_content_type;
use crate::user_agent;

/// Catalog connect timeout (10 seconds).
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Catalog read timeout (30 seconds).
const READ_TIMEOUT_SECS: u64 = 30;

/// Terminal message of one fetch worker.
#[derive(Debug)]
pub struct FetchCompletion {
    pub worker_id: u64,
    pub result: Result<Feed, FetchError>,
}

/// Handle to a running fetch worker.
///
/// Dropping the handle does not stop the worker; call [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct WorkerHandle {
    id: u64,
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Worker id carried by its completion message.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Raises the stop flag. The worker checks it before the read and
    /// again before delivering its result.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Returns true once the stop flag has been raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Returns true once the worker task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Reads catalog feeds on background workers.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: Client,
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedFetcher {
    /// Creates a fetcher with catalog timeouts (10s connect, 30s read).
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a fetcher with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_catalog_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Spawns a worker that reads `request`, parses it with `parser` and
    /// sends the outcome to `completions`.
    pub fn spawn<P>(
        &self,
        worker_id: u64,
        request: FeedRequest,
        parser: P,
        completions: UnboundedSender<FetchCompletion>,
    ) -> WorkerHandle
    where
        P: FnOnce(&[u8]) -> Result<Feed, FetchError> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let client = self.client.clone();
        let span = info_span!("feed_fetch", worker_id, location = %request.location());

        let task = tokio::spawn(
            async move {
                if worker_stop.load(Ordering::SeqCst) {
                    debug!("fetch cancelled before read");
                    return;
                }
                let result = match read_request(&client, &request).await {
                    Ok(bytes) => parser(&bytes),
                    Err(error) => Err(error),
                };
                if worker_stop.load(Ordering::SeqCst) {
                    debug!("fetch cancelled; dropping result");
                    return;
                }
                match &result {
                    Ok(feed) => debug!(entries = feed.entries.len(), "fetch complete"),
                    Err(error) => warn!(error = %error, "fetch failed"),
                }
                if completions
                    .send(FetchCompletion { worker_id, result })
                    .is_err()
                {
                    debug!("owner dropped before fetch completed");
                }
            }
            .instrument(span),
        );

        WorkerHandle {
            id: worker_id,
            stop,
            task,
        }
    }

    /// Reads the raw bytes of a request on the current task.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on network, HTTP status, HTML misdirection or
    /// local IO failures.
    pub async fn fetch_bytes(&self, request: &FeedRequest) -> Result<Vec<u8>, FetchError> {
        read_request(&self.client, request).await
    }
}

async fn read_request(client: &Client, request: &FeedRequest) -> Result<Vec<u8>, FetchError> {
    match request {
        FeedRequest::Local { path } => tokio::fs::read(path)
            .await
            .map_err(|e| FetchError::io(path.clone(), e)),
        FeedRequest::Remote {
            uri,
            accept_language,
        } => {
            Url::parse(uri).map_err(|_| FetchError::invalid_uri(uri.clone()))?;

            let mut builder = client.get(uri);
            if let Some(language) = accept_language {
                builder = builder.header(ACCEPT_LANGUAGE, language);
            }
            let response = builder
                .send()
                .await
                .map_err(|e| FetchError::network(uri.clone(), e))?;

            if !response.status().is_success() {
                return Err(FetchError::http_status(
                    uri.clone(),
                    response.status().as_u16(),
                ));
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            if is_html_content_type(&content_type) {
                return Err(FetchError::server_misdirection(uri.clone(), content_type));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| FetchError::network(uri.clone(), e))?;
            Ok(body.to_vec())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::feed::parse_atom;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use tokio::sync::mpsc;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    const EMPTY_FEED: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>t</title></feed>"#;

    #[tokio::test]
    async fn test_worker_delivers_parsed_feed_with_language_header() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/opds"))
            .and(header("Accept-Language", "es"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/atom+xml")
                    .set_body_string(EMPTY_FEED),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = FeedRequest::from_location(&format!("{}/opds", server.uri()), Some("es".into()));
        let handle = FeedFetcher::new().spawn(7, request, parse_atom, tx);

        let completion = rx.recv().await.unwrap();
        assert_eq!(completion.worker_id, 7);
        assert_eq!(handle.id(), 7);
        assert_eq!(completion.result.unwrap().title.as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn test_worker_reports_html_page_as_misdirection() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/opds"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>Maintenance</body></html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = FeedRequest::from_location(&format!("{}/opds", server.uri()), None);
        let _handle = FeedFetcher::new().spawn(1, request, parse_atom, tx);

        let completion = rx.recv().await.unwrap();
        assert!(matches!(
            completion.result,
            Err(FetchError::ServerMisdirection { .. })
        ));
    }

    #[tokio::test]
    async fn test_worker_cancelled_before_completion_sends_nothing() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(EMPTY_FEED)
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = FeedRequest::from_location(&format!("{}/slow", server.uri()), None);
        let handle = FeedFetcher::new().spawn(1, request, parse_atom, tx);
        handle.cancel();
        assert!(handle.is_cancelled());

        // The sender is dropped when the worker exits without sending.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_bytes_reads_local_file_and_reports_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("catalog.xml");
        std::fs::write(&file, EMPTY_FEED).unwrap();
        let fetcher = FeedFetcher::new();

        let bytes = fetcher
            .fetch_bytes(&FeedRequest::Local { path: file })
            .await
            .unwrap();
        assert_eq!(bytes, EMPTY_FEED.as_bytes());

        let missing = fetcher
            .fetch_bytes(&FeedRequest::Local {
                path: dir.path().join("missing.xml"),
            })
            .await;
        assert!(matches!(missing, Err(FetchError::Io { .. })));
    }

    #[tokio::test]
    async fn test_fetch_bytes_maps_http_error_status() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let request = FeedRequest::from_location(&format!("{}/gone", server.uri()), None);
        let result = FeedFetcher::new().fetch_bytes(&request).await;
        assert!(matches!(result, Err(FetchError::HttpStatus { status: 404, .. })));
    }
}
