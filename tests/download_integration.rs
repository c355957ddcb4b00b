//! Integration tests for book downloads.
//!
//! These tests drive a query to a book, download one of its formats with
//! `FileDownloader` and register the result with a `DirectoryStore`.

mod support;

use std::time::Duration;

use getbooks_core::book::mime::{EPUB, PDF};
use getbooks_core::catalog::{CatalogSourceRegistry, SourceConfig, SourceFormat};
use getbooks_core::download::{DownloadError, book_file_name, resolve_unique_path};
use getbooks_core::{
    ArchiveManifestResolver, DirectoryStore, DocumentStore, DownloadEvent, FailureKind,
    FileDownloader, HttpClient, JobState, JournalEntry, QueryResult,
};
use support::socket_guard::start_mock_server_or_skip;
use support::write_file;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<files>
  <file name="verne_meta.xml" source="original"><format>Metadata</format></file>
  <file name="Le Tour du monde.pdf" source="original"><format>Text PDF</format></file>
</files>"#;

#[tokio::test]
async fn test_download_delivers_progress_and_exact_content() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let body: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    Mock::given(method("GET"))
        .and(path("/books/big.epub"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.clone(), EPUB))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("big.epub");
    let mut downloader = FileDownloader::new(format!("{}/books/big.epub", server.uri()), &destination);
    downloader.start().unwrap();

    let mut last_fraction = 0.0;
    let mut progress_events = 0;
    let outcome = loop {
        match downloader.next_event().await.expect("terminal event") {
            DownloadEvent::Progress {
                bytes_transferred,
                fraction,
                ..
            } => {
                progress_events += 1;
                assert!(bytes_transferred <= body.len() as u64);
                if let Some(fraction) = fraction {
                    assert!(fraction >= last_fraction);
                    assert!(fraction <= 1.0);
                    last_fraction = fraction;
                }
            }
            DownloadEvent::Finished(result) => break result.unwrap(),
        }
    };

    assert!(progress_events >= 1);
    assert_eq!(outcome.bytes, body.len() as u64);
    assert_eq!(outcome.content_type.as_deref(), Some(EPUB));
    assert_eq!(std::fs::read(&destination).unwrap(), body);
    assert_eq!(downloader.state(), JobState::Succeeded);
    assert!(downloader.next_event().await.is_none());
}

#[tokio::test]
async fn test_login_page_is_misdirection_and_leaves_no_file() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>Sign in to borrow</body></html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("book.epub");
    let mut downloader = FileDownloader::new(format!("{}/borrow", server.uri()), &destination);
    downloader.start().unwrap();

    let err = downloader.wait().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::ServerMisdirection);
    assert!(err.kind().describe().to_string().contains("Fix:"));
    assert_eq!(downloader.state(), JobState::Failed);
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_empty_payload_fails() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(Vec::<u8>::new(), PDF))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("empty.pdf");
    let mut downloader = FileDownloader::new(format!("{}/empty.pdf", server.uri()), &destination);
    downloader.start().unwrap();

    let err = downloader.wait().await.unwrap_err();
    assert!(matches!(err, DownloadError::EmptyPayload { .. }), "{err}");
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_http_error_removes_destination() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("nested").join("gone.epub");
    let mut downloader = FileDownloader::new(format!("{}/gone.epub", server.uri()), &destination);
    downloader.start().unwrap();

    let err = downloader.wait().await.unwrap_err();
    assert!(matches!(err, DownloadError::HttpStatus { status: 404, .. }), "{err}");
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_cancel_mid_transfer_never_finishes() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(vec![7u8; 4096], EPUB)
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("slow.epub");
    let mut downloader = FileDownloader::new(format!("{}/slow.epub", server.uri()), &destination);
    downloader.start().unwrap();
    downloader.cancel();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(downloader.state(), JobState::Cancelled);
    assert!(downloader.try_next_event().is_none());
    assert!(matches!(
        downloader.wait().await,
        Err(DownloadError::Cancelled { .. })
    ));
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_local_catalog_book_downloads_and_is_stored() {
    let dir = TempDir::new().unwrap();
    let book_file = write_file(dir.path(), "library/tour.epub", "PK epub bytes");
    let catalog = write_file(
        dir.path(),
        "library/catalog.xml",
        r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title>Le Tour du monde</title>
    <author><name>Jules Verne</name></author>
    <summary>Phileas Fogg bets he can circle the world.</summary>
    <link rel="http://opds-spec.org/acquisition" type="application/epub+zip" href="tour.epub"/>
  </entry>
</feed>"#,
    );

    let mut registry = CatalogSourceRegistry::default();
    registry.register(SourceConfig::new("shelf", "Shelf", catalog.to_str().unwrap()));
    let mut query = QueryResult::new(registry.get("shelf").unwrap());
    query.start("Tour", None).unwrap();
    query.next_event().await.unwrap();
    let book = query.book(0).unwrap();
    assert_eq!(
        book.download_link(EPUB).as_deref(),
        Some(book_file.to_str().unwrap())
    );

    let out = TempDir::new().unwrap();
    let name = book_file_name(book.title(), Some(book.author()), EPUB);
    let destination = resolve_unique_path(out.path(), &name);
    let mut downloader =
        FileDownloader::for_book(HttpClient::new(), book, EPUB, &destination, None).unwrap();
    downloader.start().unwrap();
    let outcome = downloader.wait().await.unwrap();
    assert_eq!(std::fs::read_to_string(&outcome.path).unwrap(), "PK epub bytes");

    let journal = TempDir::new().unwrap();
    let entry = JournalEntry::from_download(book, query.source().name(), EPUB, None, None);
    let stored = DirectoryStore::new(journal.path())
        .create(entry, &outcome.path)
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&stored.path).unwrap(), "PK epub bytes");
    let record: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&stored.metadata_path).unwrap()).unwrap();
    assert_eq!(record["title"], "Le Tour du monde");
    assert_eq!(record["author"], "Jules Verne");
    assert_eq!(record["source"], "Shelf");
    assert_eq!(record["mime_type"], EPUB);
    assert!(record.get("cover_image").is_none());
}

#[tokio::test]
async fn test_archive_book_resolves_file_through_manifest() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let csv = "creator,description,format,identifier,language,publisher,title,volume\n\
               Jules Verne,,Text PDF,tourdumonde,fr,Hetzel,Le Tour du monde,\n";
    Mock::given(method("GET"))
        .and(path("/advancedsearch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(csv))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/tourdumonde/tourdumonde_files.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MANIFEST))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/tourdumonde/Le%20Tour%20du%20monde.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4 tour".to_vec(), PDF))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = SourceConfig::new(
        "ia",
        "Internet Archive",
        format!("{}/advancedsearch?q=", server.uri()),
    );
    config.format = SourceFormat::ArchiveCsv;
    config.download_base = Some(format!("{}/download", server.uri()));
    let mut registry = CatalogSourceRegistry::default();
    registry.register(config);

    let mut query = QueryResult::new(registry.get("ia").unwrap());
    query.start("verne", None).unwrap();
    query.next_event().await.unwrap();
    let book = query.book(0).unwrap();
    assert_eq!(book.identifier(), Some("tourdumonde"));

    let client = HttpClient::new();
    let resolver = ArchiveManifestResolver::for_source(query.source().config(), client.clone())
        .expect("archive sources get a resolver");
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("tour.pdf");
    let mut downloader =
        FileDownloader::for_book(client, book, PDF, &destination, Some(&resolver)).unwrap();
    downloader.start().unwrap();

    let outcome = downloader.wait().await.unwrap();
    assert_eq!(outcome.content_type.as_deref(), Some(PDF));
    assert_eq!(std::fs::read(&destination).unwrap(), b"%PDF-1.4 tour");
}
