//! Get command handler: search, download one book, optionally register it
//! in a document store.

use anyhow::{Context, Result, bail};
use getbooks_core::book::{Book, UNKNOWN};
use getbooks_core::download::{book_file_name, resolve_unique_path};
use getbooks_core::{
    ArchiveManifestResolver, CatalogSourceRegistry, DirectoryStore, DocumentStore, DownloadEvent,
    FileDownloader, HttpClient, JournalEntry, QueryResult,
};
use tracing::{debug, warn};

use super::{failure_error, run_query};
use crate::cli::GetArgs;
use crate::progress::DownloadProgress;

pub async fn run_get_command(
    registry: &CatalogSourceRegistry,
    args: &GetArgs,
    show_progress: bool,
) -> Result<()> {
    let query = run_query(registry, &args.query, 1, show_progress).await?;
    let position = usize::try_from(args.index).context("book index out of range")?;
    let book = query.book(position.saturating_sub(1)).with_context(|| {
        format!(
            "no book #{} in {} results from {}",
            args.index,
            query.len(),
            query.source().name()
        )
    })?;

    let client = HttpClient::new();
    let resolver = ArchiveManifestResolver::for_source(query.source().config(), client.clone());
    let author = Some(book.author()).filter(|author| *author != UNKNOWN);
    let file_name = book_file_name(book.title(), author, &args.format);
    let destination = resolve_unique_path(&args.output_dir, &file_name);
    debug!(destination = %destination.display(), "downloading book");

    let mut downloader = FileDownloader::for_book(
        client.clone(),
        book,
        &args.format,
        &destination,
        resolver.as_ref(),
    )
    .map_err(|error| failure_error(error.kind(), &error))?;
    downloader.start()?;

    let mut progress = DownloadProgress::new(show_progress, &file_name);
    let result = loop {
        match downloader.next_event().await {
            Some(DownloadEvent::Progress {
                bytes_transferred,
                bytes_total,
                ..
            }) => progress.update(bytes_transferred, bytes_total),
            Some(DownloadEvent::Finished(result)) => break result,
            None => {
                progress.finish();
                bail!("download ended without a result");
            }
        }
    };
    progress.finish();
    let outcome = result.map_err(|error| failure_error(error.kind(), &error))?;
    println!(
        "Downloaded {} ({} bytes)",
        outcome.path.display(),
        outcome.bytes
    );

    if let Some(journal_dir) = &args.journal {
        let cover = if args.no_cover || !registry.settings().show_images {
            None
        } else {
            fetch_cover(&client, &query, book).await
        };
        let entry = JournalEntry::from_download(
            book,
            query.source().name(),
            &args.format,
            cover.as_deref(),
            None,
        );
        let stored = DirectoryStore::new(journal_dir)
            .create(entry, &outcome.path)
            .await
            .context("failed to register the book in the journal")?;
        println!("Added to journal: {}", stored.entry.display_title());
    }
    Ok(())
}

/// Cover bytes for the journal record; failures only lose the cover.
async fn fetch_cover(client: &HttpClient, query: &QueryResult, book: &Book) -> Option<Vec<u8>> {
    let url = query.resolve_uri(book.cover_image_url()?);
    match client.get_bytes(&url).await {
        Ok(bytes) => Some(bytes),
        Err(error) => {
            warn!(url = %url, error = %error, "could not fetch cover image");
            None
        }
    }
}
