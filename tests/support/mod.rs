#![allow(dead_code)]

#[path = "../../src/test_support/socket_guard.rs"]
pub mod socket_guard;

use std::path::{Path, PathBuf};

/// Atom feed with one book entry per title and an optional `next` link.
#[must_use]
pub fn opds_feed(titles: &[&str], next: Option<&str>) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:dcterms="http://purl.org/dc/terms/">
  <title>Results</title>
"#,
    );
    if let Some(next) = next {
        xml.push_str(&format!(
            "  <link rel=\"next\" type=\"application/atom+xml\" href=\"{}\"/>\n",
            next.replace('&', "&amp;")
        ));
    }
    for (index, title) in titles.iter().enumerate() {
        xml.push_str(&format!(
            r#"  <entry>
    <title>{title}</title>
    <author><name>Author {index}</name></author>
    <dcterms:language>en</dcterms:language>
    <link rel="http://opds-spec.org/acquisition" type="application/epub+zip" href="http://books.example/{index}.epub"/>
  </entry>
"#
        ));
    }
    xml.push_str("</feed>\n");
    xml
}

/// Writes `contents` to `dir/name` and returns the path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}
