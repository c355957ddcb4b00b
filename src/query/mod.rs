//! One in-flight or completed catalog query.
//!
//! A [`QueryResult`] owns its fetch worker, its accumulated books and
//! sub-catalogs, and its pagination cursor. The worker never touches any of
//! that: it sends a single tagged completion, and the owner applies it in
//! [`QueryResult::next_event`] on its own task.
//!
//! ```text
//! Created --start/browse--> Fetching --ok--> Ready --update_with_next--> Fetching
//!                               \--err--> Failed (first page)
//!                               \--err--> Ready  (continuation; next page retryable)
//! any --cancel--> Cancelled
//! ```

mod error;

pub use error::QueryError;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, error::TryRecvError};
use tracing::{debug, info, warn};
use url::Url;

use crate::book::Book;
use crate::catalog::{CatalogSource, effective_language};
use crate::feed::{
    Entry, EntryLinks, Feed, FeedFetcher, FeedRequest, FetchCompletion, FetchError, WorkerHandle,
};

/// Lifecycle of a [`QueryResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Created,
    Fetching,
    Ready,
    Failed,
    Cancelled,
}

/// Outcome of one fetch, applied on the owner's task.
#[derive(Debug)]
pub enum QueryEvent {
    /// Entries were appended to the result.
    Updated {
        added_books: usize,
        added_subcatalogs: usize,
    },
    /// The fetch failed. A failed first page leaves the result
    /// [`QueryState::Failed`]; a failed next page leaves it
    /// [`QueryState::Ready`] with that page offered again by `has_next`.
    Failed(FetchError),
}

/// One catalog query against one source.
#[derive(Debug)]
pub struct QueryResult {
    source: Arc<dyn CatalogSource>,
    fetcher: FeedFetcher,
    search_term: String,
    language_filter: Option<String>,
    state: QueryState,
    books: Vec<Book>,
    subcatalogs: Vec<Book>,
    /// URI the active or last fetch read.
    current_uri: Option<String>,
    /// `next` link of the last applied feed, resolved against `current_uri`.
    advertised_next: Option<String>,
    /// Next-page URI cached by `has_next`.
    next_page_uri: Option<String>,
    /// Continuation URI being fetched; restored as `advertised_next` on failure.
    pending_page: Option<String>,
    worker: Option<WorkerHandle>,
    completions: Option<UnboundedReceiver<FetchCompletion>>,
    next_worker_id: u64,
}

impl QueryResult {
    /// Creates an idle query against `source` with a fresh fetcher.
    #[must_use]
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self::with_fetcher(source, FeedFetcher::new())
    }

    /// Creates an idle query sharing an existing fetcher's connection pool.
    #[must_use]
    pub fn with_fetcher(source: Arc<dyn CatalogSource>, fetcher: FeedFetcher) -> Self {
        Self {
            source,
            fetcher,
            search_term: String::new(),
            language_filter: None,
            state: QueryState::Created,
            books: Vec::new(),
            subcatalogs: Vec::new(),
            current_uri: None,
            advertised_next: None,
            next_page_uri: None,
            pending_page: None,
            worker: None,
            completions: None,
            next_worker_id: 0,
        }
    }

    /// Starts the search.
    ///
    /// Sources searched server-side reject a blank term before any worker
    /// exists; sources matched locally treat it as "list everything".
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::EmptySearchTerm`] for a blank term on a remote
    /// source and [`QueryError::AlreadyStarted`] if this query already ran.
    pub fn start(&mut self, term: &str, language_filter: Option<&str>) -> Result<(), QueryError> {
        if self.state != QueryState::Created {
            return Err(QueryError::AlreadyStarted);
        }
        let term = term.trim();
        if term.is_empty() && !self.source.filters_locally() {
            return Err(QueryError::EmptySearchTerm {
                source_name: self.source.name().to_string(),
            });
        }

        self.search_term = term.to_string();
        self.language_filter = language_filter.map(str::to_string);
        let request = self.source.build_request(term, language_filter);
        info!(source = self.source.key(), term, "starting catalog query");
        self.spawn_fetch(request);
        Ok(())
    }

    /// Starts reading a sub-catalog URI verbatim, without a search term.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::AlreadyStarted`] if this query already ran.
    pub fn browse(&mut self, uri: &str, language_filter: Option<&str>) -> Result<(), QueryError> {
        if self.state != QueryState::Created {
            return Err(QueryError::AlreadyStarted);
        }
        self.language_filter = language_filter.map(str::to_string);
        let request = FeedRequest::from_location(
            uri,
            effective_language(language_filter).map(str::to_string),
        );
        info!(source = self.source.key(), uri, "browsing sub-catalog");
        self.spawn_fetch(request);
        Ok(())
    }

    /// Returns true iff the last fetched feed advertised a `next` page, and
    /// caches that URI for [`update_with_next`](Self::update_with_next).
    pub fn has_next(&mut self) -> bool {
        if self.next_page_uri.is_none() {
            self.next_page_uri.clone_from(&self.advertised_next);
        }
        self.next_page_uri.is_some()
    }

    /// Fetches the cached next page and appends its entries.
    ///
    /// No-op unless the result is [`QueryState::Ready`] and
    /// [`has_next`](Self::has_next) cached a URI. Returns true if a fetch
    /// was started.
    pub fn update_with_next(&mut self) -> bool {
        if self.state != QueryState::Ready {
            return false;
        }
        let Some(uri) = self.next_page_uri.take() else {
            return false;
        };
        self.advertised_next = None;
        if let Some(lingering) = self.worker.take() {
            lingering.cancel();
        }
        debug!(uri = %uri, "fetching next page");
        let request = FeedRequest::from_location(
            &uri,
            effective_language(self.language_filter.as_deref()).map(str::to_string),
        );
        self.pending_page = Some(uri);
        self.spawn_fetch(request);
        true
    }

    /// Stops the active worker and discards everything delivered so far.
    ///
    /// Terminal: any completion still in flight is dropped.
    pub fn cancel(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel();
        }
        self.completions = None;
        self.books.clear();
        self.subcatalogs.clear();
        self.advertised_next = None;
        self.next_page_uri = None;
        self.pending_page = None;
        if self.state != QueryState::Cancelled {
            debug!(source = self.source.key(), "query cancelled");
        }
        self.state = QueryState::Cancelled;
    }

    /// Waits for the active worker and applies its result.
    ///
    /// Returns `None` when no worker is active.
    pub async fn next_event(&mut self) -> Option<QueryEvent> {
        loop {
            let completion = self.completions.as_mut()?.recv().await;
            match completion {
                Some(completion) => {
                    if let Some(event) = self.accept(completion) {
                        return Some(event);
                    }
                }
                None => {
                    self.worker_vanished();
                    return None;
                }
            }
        }
    }

    /// Non-blocking variant of [`next_event`](Self::next_event) for UI loops.
    pub fn try_next_event(&mut self) -> Option<QueryEvent> {
        loop {
            match self.completions.as_mut()?.try_recv() {
                Ok(completion) => {
                    if let Some(event) = self.accept(completion) {
                        return Some(event);
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    self.worker_vanished();
                    return None;
                }
            }
        }
    }

    /// Resolves a link of this result's feeds (for example a sub-catalog
    /// URI) against the URI it was read from.
    #[must_use]
    pub fn resolve_uri(&self, href: &str) -> String {
        match &self.current_uri {
            Some(base) => resolve_against(base, href),
            None => href.to_string(),
        }
    }

    #[must_use]
    pub fn state(&self) -> QueryState {
        self.state
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == QueryState::Ready
    }

    /// True while a worker is running for this result.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.worker.is_some()
    }

    #[must_use]
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    #[must_use]
    pub fn book(&self, index: usize) -> Option<&Book> {
        self.books.get(index)
    }

    #[must_use]
    pub fn subcatalogs(&self) -> &[Book] {
        &self.subcatalogs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.books.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    #[must_use]
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    #[must_use]
    pub fn language_filter(&self) -> Option<&str> {
        self.language_filter.as_deref()
    }

    #[must_use]
    pub fn source(&self) -> &Arc<dyn CatalogSource> {
        &self.source
    }

    /// Next-page URI cached by [`has_next`](Self::has_next).
    #[must_use]
    pub fn next_page_uri(&self) -> Option<&str> {
        self.next_page_uri.as_deref()
    }

    fn spawn_fetch(&mut self, request: FeedRequest) {
        self.next_worker_id += 1;
        let worker_id = self.next_worker_id;
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Arc::clone(&self.source);

        self.current_uri = Some(request.location());
        self.state = QueryState::Fetching;
        self.completions = Some(rx);
        self.worker = Some(
            self.fetcher
                .spawn(worker_id, request, move |bytes| source.parse(bytes), tx),
        );
    }

    /// Applies a completion from the active worker; stale ones yield `None`.
    fn accept(&mut self, completion: FetchCompletion) -> Option<QueryEvent> {
        let active = self.worker.as_ref().map(WorkerHandle::id);
        if active != Some(completion.worker_id) || self.state != QueryState::Fetching {
            debug!(worker_id = completion.worker_id, "dropping stale completion");
            return None;
        }
        self.worker = None;
        self.completions = None;
        let continuation = self.pending_page.take();

        Some(match completion.result {
            Ok(feed) => self.apply_feed(feed),
            Err(error) => {
                if let Some(uri) = continuation {
                    // Pages already applied stay; the failed page can be retried.
                    warn!(source = self.source.key(), uri = %uri, error = %error, "next page failed");
                    self.advertised_next = Some(uri);
                    self.state = QueryState::Ready;
                } else {
                    warn!(source = self.source.key(), error = %error, "catalog query failed");
                    self.state = QueryState::Failed;
                }
                QueryEvent::Failed(error)
            }
        })
    }

    fn apply_feed(&mut self, feed: Feed) -> QueryEvent {
        let crawlable = feed.is_crawlable();
        self.advertised_next = feed.next_page_uri().map(|href| self.resolve_uri(href));

        let (books_before, subcatalogs_before) = (self.books.len(), self.subcatalogs.len());
        let config = self.source.config();
        for mut entry in feed.entries {
            if !self
                .source
                .retains(&entry, &self.search_term, self.language_filter.as_deref())
            {
                continue;
            }
            self.absolutize_links(&mut entry);
            if crawlable || entry.has_subcatalog_link() {
                if entry
                    .title
                    .as_deref()
                    .is_some_and(|title| config.is_blacklisted(title))
                {
                    debug!(title = ?entry.title, "skipping blacklisted sub-catalog");
                    continue;
                }
                self.subcatalogs.push(self.source.make_book(entry));
            } else {
                self.books.push(self.source.make_book(entry));
            }
        }

        self.state = QueryState::Ready;
        let added_books = self.books.len() - books_before;
        let added_subcatalogs = self.subcatalogs.len() - subcatalogs_before;
        info!(
            source = self.source.key(),
            added_books,
            added_subcatalogs,
            total_books = self.books.len(),
            "catalog query updated"
        );
        QueryEvent::Updated {
            added_books,
            added_subcatalogs,
        }
    }

    /// Rewrites relative entry links against the URI the feed was read from.
    fn absolutize_links(&self, entry: &mut Entry) {
        let Some(base) = self.current_uri.as_deref() else {
            return;
        };
        match &mut entry.links {
            EntryLinks::List(links) => {
                for link in links {
                    link.href = resolve_against(base, &link.href);
                }
            }
            EntryLinks::ByType(links) => {
                for href in links.values_mut() {
                    *href = resolve_against(base, href);
                }
            }
        }
        if let Some(cover) = entry.fields.get_mut("cover_image") {
            *cover = resolve_against(base, cover);
        }
    }

    /// The worker exited without delivering (it panicked or was stopped).
    fn worker_vanished(&mut self) {
        self.completions = None;
        if self.worker.take().is_some() && self.state == QueryState::Fetching {
            warn!(source = self.source.key(), "fetch worker exited without a result");
            match self.pending_page.take() {
                Some(uri) => {
                    self.advertised_next = Some(uri);
                    self.state = QueryState::Ready;
                }
                None => self.state = QueryState::Failed,
            }
        }
    }
}

impl Drop for QueryResult {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.cancel();
        }
    }
}

/// Resolves `href` against a URI or a local catalog path.
fn resolve_against(base: &str, href: &str) -> String {
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    if let Ok(base_url) = Url::parse(base) {
        return base_url
            .join(href)
            .map_or_else(|_| href.to_string(), String::from);
    }
    match Path::new(base).parent() {
        Some(dir) if !href.starts_with('/') => dir.join(href).display().to_string(),
        _ => href.to_string(),
    }
}
