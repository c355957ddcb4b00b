//! Book and cover downloads.
//!
//! [`HttpClient`] streams one resource to disk; [`FileDownloader`] wraps a
//! transfer as a single-use background job with progress events and
//! cooperative cancellation.
//!
//! # Example
//!
//! ```no_run
//! use getbooks_core::download::{DownloadEvent, FileDownloader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut downloader = FileDownloader::new("https://example.com/book.epub", "./book.epub");
//! downloader.start()?;
//! while let Some(event) = downloader.next_event().await {
//!     if let DownloadEvent::Finished(result) = event {
//!         println!("Downloaded: {}", result?.path.display());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod downloader;
mod error;
mod filename;

pub use client::{HttpClient, TransferOutcome};
pub use constants::{CONNECT_TIMEOUT_SECS, PROGRESS_STEP_BYTES, READ_TIMEOUT_SECS};
pub use downloader::{DownloadEvent, DownloadOutcome, FileDownloader, JobState};
pub use error::DownloadError;
pub use filename::{book_file_name, resolve_unique_path};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
