//! Holder for the single live job of a logical slot.
//!
//! A presentation layer keeps one current query and one current download;
//! starting a new one must stop the old one. [`Slot::replace`] does that.

use crate::download::FileDownloader;
use crate::query::QueryResult;

/// A job that can be stopped by its owner.
pub trait Cancellable {
    fn cancel(&mut self);
}

impl Cancellable for QueryResult {
    fn cancel(&mut self) {
        QueryResult::cancel(self);
    }
}

impl Cancellable for FileDownloader {
    fn cancel(&mut self) {
        FileDownloader::cancel(self);
    }
}

/// Owns at most one job; replacing or clearing cancels the previous one.
#[derive(Debug)]
pub struct Slot<T: Cancellable> {
    current: Option<T>,
}

impl<T: Cancellable> Default for Slot<T> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<T: Cancellable> Slot<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `job`, cancelling the previous occupant. Returns a mutable
    /// reference to the new job.
    pub fn replace(&mut self, job: T) -> &mut T {
        if let Some(mut previous) = self.current.take() {
            previous.cancel();
        }
        self.current.insert(job)
    }

    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.current.as_mut()
    }

    /// Removes the job without cancelling it.
    pub fn take(&mut self) -> Option<T> {
        self.current.take()
    }

    /// Cancels and drops the current job.
    pub fn clear(&mut self) {
        if let Some(mut previous) = self.current.take() {
            previous.cancel();
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::{OpdsSource, SourceConfig};
    use crate::download::JobState;
    use crate::query::QueryState;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    #[derive(Debug)]
    struct Job(Arc<AtomicBool>);

    impl Cancellable for Job {
        fn cancel(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_replace_and_clear_cancel_occupant() {
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));
        let mut slot = Slot::new();

        slot.replace(Job(Arc::clone(&first)));
        slot.replace(Job(Arc::clone(&second)));
        assert!(first.load(Ordering::SeqCst));
        assert!(!second.load(Ordering::SeqCst));

        slot.clear();
        assert!(second.load(Ordering::SeqCst));
        assert!(slot.is_empty());
    }

    #[test]
    fn test_take_does_not_cancel() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut slot = Slot::new();
        slot.replace(Job(Arc::clone(&flag)));
        assert!(slot.take().is_some());
        assert!(!flag.load(Ordering::SeqCst));
        assert!(slot.get().is_none());
    }

    #[tokio::test]
    async fn test_query_and_download_slots() {
        let dir = TempDir::new().unwrap();
        let catalog = dir.path().join("catalog.xml");
        std::fs::write(&catalog, r#"<feed xmlns="http://www.w3.org/2005/Atom"/>"#).unwrap();
        let source = Arc::new(OpdsSource::new(SourceConfig::new(
            "usb",
            "USB",
            catalog.to_str().unwrap(),
        )));

        let mut queries: Slot<QueryResult> = Slot::new();
        queries.replace(QueryResult::new(source.clone())).start("", None).unwrap();
        let query = queries.replace(QueryResult::new(source));
        assert_eq!(query.state(), QueryState::Created);
        queries.get_mut().unwrap().start("", None).unwrap();
        assert!(queries.get().unwrap().is_fetching());

        let mut downloads: Slot<FileDownloader> = Slot::new();
        downloads.replace(FileDownloader::new("/nonexistent", dir.path().join("x")));
        let downloader = downloads.replace(FileDownloader::new("/nonexistent", dir.path().join("y")));
        assert_eq!(downloader.state(), JobState::Pending);
    }
}
