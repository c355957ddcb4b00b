//! Archive item file resolution.
//!
//! Archive items publish a `<id>_files.xml` manifest listing every file of
//! the item with a human format name (`Text PDF`, `DjVu`, ...). The catalog
//! only says which formats exist; the concrete file name comes from here.

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, info, instrument};

use crate::book::mime::archive_format;
use crate::catalog::{DEFAULT_ARCHIVE_DOWNLOAD_BASE, SourceConfig, SourceFormat};
use crate::download::{DownloadError, HttpClient};

/// One `<file>` of an item manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    pub name: String,
    pub format: String,
}

/// Resolves archive item identifiers to concrete file URIs.
#[derive(Debug, Clone)]
pub struct ArchiveManifestResolver {
    client: HttpClient,
    download_base: String,
}

impl ArchiveManifestResolver {
    #[must_use]
    pub fn new(client: HttpClient, download_base: impl Into<String>) -> Self {
        let download_base = download_base.into().trim_end_matches('/').to_string();
        Self {
            client,
            download_base,
        }
    }

    /// Resolver for an archive CSV source; `None` for other formats.
    #[must_use]
    pub fn for_source(config: &SourceConfig, client: HttpClient) -> Option<Self> {
        if config.format != SourceFormat::ArchiveCsv {
            return None;
        }
        let base = config
            .download_base
            .as_deref()
            .unwrap_or(DEFAULT_ARCHIVE_DOWNLOAD_BASE);
        Some(Self::new(client, base))
    }

    #[must_use]
    pub fn download_base(&self) -> &str {
        &self.download_base
    }

    /// `<download_base>/<id>/<id>_files.xml`
    #[must_use]
    pub fn manifest_url(&self, identifier: &str) -> String {
        format!("{}/{identifier}/{identifier}_files.xml", self.download_base)
    }

    /// Returns the URI of the first manifest file whose format maps to
    /// `content_type`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Manifest`] if the manifest cannot be fetched
    /// or parsed, and [`DownloadError::NotFound`] if no file matches.
    #[instrument(skip(self))]
    pub async fn resolve(&self, identifier: &str, content_type: &str) -> Result<String, DownloadError> {
        let url = self.manifest_url(identifier);
        let bytes = self
            .client
            .get_bytes(&url)
            .await
            .map_err(|e| DownloadError::manifest(&url, e.to_string()))?;
        let files = parse_manifest(&bytes).map_err(|detail| DownloadError::manifest(&url, detail))?;
        debug!(files = files.len(), "read item manifest");

        let file = files
            .iter()
            .find(|file| {
                archive_format(&file.format).is_some_and(|format| format.content_type == content_type)
            })
            .ok_or_else(|| DownloadError::not_found(identifier, content_type))?;

        let uri = format!(
            "{}/{identifier}/{}",
            self.download_base,
            urlencoding::encode(&file.name)
        );
        info!(uri = %uri, format = %file.format, "resolved archive file");
        Ok(uri)
    }
}

/// Reads `<file name=".."><format>..</format></file>` pairs in document
/// order. Files without a name or format are skipped.
///
/// # Errors
///
/// Returns a description of the XML error for malformed manifests.
pub fn parse_manifest(bytes: &[u8]) -> Result<Vec<ManifestFile>, String> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut files = Vec::new();
    let mut current_name: Option<String> = None;
    let mut in_format = false;
    let mut format = String::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| e.to_string())? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"file" => {
                    current_name = None;
                    format.clear();
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| e.to_string())?;
                        if attr.key.local_name().as_ref() == b"name" {
                            let value = attr.unescape_value().map_err(|e| e.to_string())?;
                            current_name = Some(value.into_owned());
                        }
                    }
                }
                b"format" => in_format = true,
                _ => {}
            },
            Event::Text(ref t) if in_format => {
                format.push_str(&t.unescape().map_err(|e| e.to_string())?);
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"format" => in_format = false,
                b"file" => {
                    if let Some(name) = current_name.take()
                        && !format.trim().is_empty()
                    {
                        files.push(ManifestFile {
                            name,
                            format: format.trim().to_string(),
                        });
                    }
                    format.clear();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(files)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::book::mime::{DJVU, EPUB, PDF, PDF_BW};
    use crate::failure::FailureKind;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<files>
  <file name="verne_meta.xml" source="original"><format>Metadata</format></file>
  <file name="Twenty Thousand.pdf" source="original"><format>Text PDF</format></file>
  <file name="verne_bw.pdf" source="derivative"><format>Grayscale PDF</format></file>
  <file name="verne.djvu" source="derivative"><format>DjVu</format></file>
  <file source="derivative"><format>EPUB</format></file>
</files>"#;

    #[test]
    fn test_parse_manifest_reads_files_in_order() {
        let files = parse_manifest(MANIFEST.as_bytes()).unwrap();
        assert_eq!(files.len(), 4);
        assert_eq!(files[1].name, "Twenty Thousand.pdf");
        assert_eq!(files[1].format, "Text PDF");
        assert_eq!(files[3].format, "DjVu");
    }

    #[test]
    fn test_parse_manifest_rejects_malformed_xml() {
        assert!(parse_manifest(b"<files><file name=\"a\"></files>").is_err());
    }

    #[test]
    fn test_manifest_url_and_for_source() {
        let config = SourceConfig {
            format: SourceFormat::ArchiveCsv,
            ..SourceConfig::new("ia", "Archive", "http://archive.example/search?q=")
        };
        let resolver = ArchiveManifestResolver::for_source(&config, HttpClient::new()).unwrap();
        assert_eq!(resolver.download_base(), DEFAULT_ARCHIVE_DOWNLOAD_BASE);
        assert_eq!(
            resolver.manifest_url("verne"),
            "http://www.archive.org/download/verne/verne_files.xml"
        );

        let opds = SourceConfig::new("fb", "Feedbooks", "http://fb.example/?q=");
        assert!(ArchiveManifestResolver::for_source(&opds, HttpClient::new()).is_none());
    }

    #[tokio::test]
    async fn test_resolve_maps_formats_to_content_types() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/download/verne/verne_files.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MANIFEST))
            .mount(&server)
            .await;

        let resolver = ArchiveManifestResolver::new(HttpClient::new(), format!("{}/download/", server.uri()));
        let base = format!("{}/download/verne", server.uri());
        assert_eq!(
            resolver.resolve("verne", PDF).await.unwrap(),
            format!("{base}/Twenty%20Thousand.pdf")
        );
        assert_eq!(
            resolver.resolve("verne", PDF_BW).await.unwrap(),
            format!("{base}/verne_bw.pdf")
        );
        assert_eq!(
            resolver.resolve("verne", DJVU).await.unwrap(),
            format!("{base}/verne.djvu")
        );

        let err = resolver.resolve("verne", EPUB).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_missing_manifest_is_manifest_error() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resolver = ArchiveManifestResolver::new(HttpClient::new(), server.uri());
        let err = resolver.resolve("missing", PDF).await.unwrap_err();
        assert!(matches!(err, DownloadError::Manifest { .. }), "{err}");
    }
}
