//! Single-use file download with progress events and cooperative
//! cancellation.
//!
//! The transfer runs on a tokio task; it owns nothing the caller reads.
//! Progress and the terminal outcome cross an mpsc channel and are applied
//! to the downloader when the owner calls [`FileDownloader::next_event`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};

use super::client::HttpClient;
use super::constants::PROGRESS_STEP_BYTES;
use super::error::DownloadError;
use crate::archive::ArchiveManifestResolver;
use crate::book::Book;

/// Lifecycle of a [`FileDownloader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// A completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub content_type: Option<String>,
    pub bytes: u64,
}

/// Message from a download worker.
#[derive(Debug)]
pub enum DownloadEvent {
    /// Bytes written so far. `fraction` is set when the total is known and
    /// non-zero.
    Progress {
        bytes_transferred: u64,
        bytes_total: Option<u64>,
        fraction: Option<f64>,
    },
    /// Terminal outcome; delivered exactly once unless the job was cancelled.
    Finished(Result<DownloadOutcome, DownloadError>),
}

impl DownloadEvent {
    #[allow(clippy::cast_precision_loss)]
    fn progress(bytes_transferred: u64, bytes_total: Option<u64>) -> Self {
        let fraction = bytes_total
            .filter(|total| *total > 0)
            .map(|total| bytes_transferred as f64 / total as f64);
        Self::Progress {
            bytes_transferred,
            bytes_total,
            fraction,
        }
    }
}

/// Where the bytes come from.
#[derive(Debug, Clone)]
enum DownloadSource {
    Uri(String),
    /// Resolved through the item manifest inside the worker.
    ArchiveItem {
        resolver: ArchiveManifestResolver,
        identifier: String,
        content_type: String,
    },
}

impl DownloadSource {
    fn describe(&self) -> String {
        match self {
            Self::Uri(uri) => uri.clone(),
            Self::ArchiveItem { identifier, .. } => format!("archive item {identifier}"),
        }
    }
}

/// Downloads one resource to one destination path.
#[derive(Debug)]
pub struct FileDownloader {
    source: DownloadSource,
    destination: PathBuf,
    client: HttpClient,
    state: JobState,
    bytes_transferred: u64,
    bytes_total: Option<u64>,
    content_type: Option<String>,
    stop: Arc<AtomicBool>,
    events: Option<UnboundedReceiver<DownloadEvent>>,
    task: Option<JoinHandle<()>>,
}

impl FileDownloader {
    /// Downloader for `source_uri` (remote URL, `file://` URI or path).
    #[must_use]
    pub fn new(source_uri: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self::with_client(HttpClient::new(), source_uri, destination)
    }

    /// Downloader sharing an existing client's connection pool.
    #[must_use]
    pub fn with_client(
        client: HttpClient,
        source_uri: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self::from_source(client, DownloadSource::Uri(source_uri.into()), destination.into())
    }

    /// Downloader for one format of a book.
    ///
    /// With a resolver, books carrying an archive identifier are resolved
    /// through the item manifest when the job starts. Otherwise the book's
    /// own download link for `content_type` is used.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::NotFound`] if the book has no link for
    /// `content_type` and cannot be resolved.
    pub fn for_book(
        client: HttpClient,
        book: &Book,
        content_type: &str,
        destination: impl Into<PathBuf>,
        resolver: Option<&ArchiveManifestResolver>,
    ) -> Result<Self, DownloadError> {
        let source = match (resolver, book.identifier()) {
            (Some(resolver), Some(identifier)) => DownloadSource::ArchiveItem {
                resolver: resolver.clone(),
                identifier: identifier.to_string(),
                content_type: content_type.to_string(),
            },
            _ => book
                .download_link(content_type)
                .map(DownloadSource::Uri)
                .ok_or_else(|| DownloadError::not_found(book.title(), content_type))?,
        };
        Ok(Self::from_source(client, source, destination.into()))
    }

    fn from_source(client: HttpClient, source: DownloadSource, destination: PathBuf) -> Self {
        Self {
            source,
            destination,
            client,
            state: JobState::Pending,
            bytes_transferred: 0,
            bytes_total: None,
            content_type: None,
            stop: Arc::new(AtomicBool::new(false)),
            events: None,
            task: None,
        }
    }

    /// Spawns the transfer.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::AlreadyStarted`] unless the job is pending.
    pub fn start(&mut self) -> Result<(), DownloadError> {
        if self.state != JobState::Pending {
            return Err(DownloadError::AlreadyStarted);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let source = self.source.clone();
        let destination = self.destination.clone();
        let client = self.client.clone();
        let stop = Arc::clone(&self.stop);
        let span = info_span!(
            "download",
            source = %source.describe(),
            destination = %destination.display()
        );

        self.state = JobState::Running;
        self.events = Some(rx);
        self.task = Some(tokio::spawn(
            run_download(client, source, destination, stop, tx).instrument(span),
        ));
        Ok(())
    }

    /// Raises the stop flag. No `Finished` event is delivered afterwards and
    /// the partial file is removed by the worker.
    pub fn cancel(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.events = None;
        if matches!(self.state, JobState::Pending | JobState::Running) {
            debug!(destination = %self.destination.display(), "download cancelled");
            self.state = JobState::Cancelled;
        }
    }

    /// Waits for the next event and applies it to the job.
    ///
    /// Returns `None` once the job is terminal or was never started.
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        let event = self.events.as_mut()?.recv().await;
        self.apply(event)
    }

    /// Non-blocking variant of [`next_event`](Self::next_event).
    pub fn try_next_event(&mut self) -> Option<DownloadEvent> {
        match self.events.as_mut()?.try_recv() {
            Ok(event) => self.apply(Some(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => self.apply(None),
        }
    }

    /// Waits for the terminal event, discarding progress.
    ///
    /// # Errors
    ///
    /// Returns the job's [`DownloadError`], or [`DownloadError::Cancelled`]
    /// if the job was cancelled or never delivered an outcome.
    pub async fn wait(&mut self) -> Result<DownloadOutcome, DownloadError> {
        while let Some(event) = self.next_event().await {
            if let DownloadEvent::Finished(result) = event {
                return result;
            }
        }
        Err(DownloadError::cancelled(self.source.describe()))
    }

    fn apply(&mut self, event: Option<DownloadEvent>) -> Option<DownloadEvent> {
        match &event {
            Some(DownloadEvent::Progress {
                bytes_transferred,
                bytes_total,
                ..
            }) => {
                self.bytes_transferred = *bytes_transferred;
                self.bytes_total = *bytes_total;
            }
            Some(DownloadEvent::Finished(result)) => {
                self.events = None;
                self.task = None;
                match result {
                    Ok(outcome) => {
                        self.state = JobState::Succeeded;
                        self.bytes_transferred = outcome.bytes;
                        self.content_type.clone_from(&outcome.content_type);
                    }
                    Err(_) => self.state = JobState::Failed,
                }
            }
            None => {
                self.events = None;
                if self.state == JobState::Running {
                    warn!(destination = %self.destination.display(), "download worker exited without a result");
                    self.state = JobState::Failed;
                }
            }
        }
        event
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Source URI, or the archive item for manifest-resolved downloads.
    #[must_use]
    pub fn source_uri(&self) -> String {
        self.source.describe()
    }

    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    #[must_use]
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// Expected size, once the server announced one.
    #[must_use]
    pub fn bytes_total(&self) -> Option<u64> {
        self.bytes_total
    }

    /// Content type reported by the server, once the job succeeded.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

impl Drop for FileDownloader {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.stop.store(true, Ordering::SeqCst);
        }
    }
}

async fn run_download(
    client: HttpClient,
    source: DownloadSource,
    destination: PathBuf,
    stop: Arc<AtomicBool>,
    events: UnboundedSender<DownloadEvent>,
) {
    let uri = match source {
        DownloadSource::Uri(uri) => Ok(uri),
        DownloadSource::ArchiveItem {
            resolver,
            identifier,
            content_type,
        } => resolver.resolve(&identifier, &content_type).await,
    };

    let mut last_reported: u64 = 0;
    let result = match uri {
        Ok(uri) => {
            client
                .transfer(&uri, &destination, &stop, |transferred, total| {
                    let finished = total.is_some_and(|total| transferred >= total);
                    if transferred - last_reported >= PROGRESS_STEP_BYTES || finished {
                        last_reported = transferred;
                        let _ = events.send(DownloadEvent::progress(transferred, total));
                    }
                })
                .await
        }
        Err(error) => Err(error),
    };

    if stop.load(Ordering::SeqCst) {
        debug!("download cancelled; dropping outcome");
        let _ = tokio::fs::remove_file(&destination).await;
        return;
    }

    let result = result.map(|outcome| {
        info!(
            path = %outcome.path.display(),
            bytes = outcome.bytes_transferred,
            "download finished"
        );
        DownloadOutcome {
            path: outcome.path,
            content_type: outcome.content_type,
            bytes: outcome.bytes_transferred,
        }
    });
    if let Err(error) = &result {
        warn!(error = %error, kind = error.kind().label(), "download failed");
    }
    if events.send(DownloadEvent::Finished(result)).is_err() {
        debug!("owner dropped before download finished");
    }
}
