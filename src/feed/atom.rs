//! Atom/OPDS feed parser.
//!
//! Reads feed-level links, and per entry: title, authors, `<link>` elements,
//! summary/content, and any other direct child as a field. Prefixed elements
//! are keyed `prefix_local` with `dc:` folded into `dcterms_`
//! (`dcterms_publisher`, `dcterms_language`, ...).

use std::mem;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{Entry, EntryLinks, Feed, FetchError, Link};

const FORMAT: &str = "atom";

/// Parses an Atom/OPDS document.
///
/// # Errors
///
/// Returns [`FetchError::Parse`] if the document is not well-formed XML or
/// has no `<feed>` root element.
pub fn parse_atom(bytes: &[u8]) -> Result<Feed, FetchError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut state = AtomState::default();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            FetchError::parse(FORMAT, format!("at byte {}: {e}", reader.buffer_position()))
        })?;
        match event {
            Event::Start(ref e) => {
                let key = state.open(e)?;
                state.stack.push(key);
            }
            Event::Empty(ref e) => {
                let key = state.open(e)?;
                state.close(&key);
            }
            Event::Text(ref t) => {
                let text = t
                    .unescape()
                    .map_err(|e| FetchError::parse(FORMAT, e.to_string()))?;
                state.push_text(&text);
            }
            Event::CData(t) => {
                state.push_text(&String::from_utf8_lossy(&t.into_inner()));
            }
            Event::End(_) => {
                if let Some(key) = state.stack.pop() {
                    state.close(&key);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    state.finish()
}

#[derive(Default)]
struct AtomState {
    feed: Feed,
    saw_root: bool,
    stack: Vec<String>,
    entry: Option<Entry>,
    entry_links: Vec<Link>,
    authors: Vec<String>,
    text: String,
    /// Stack depth of an open `<summary>`/`<content>` whose markup is flattened.
    capture_depth: Option<usize>,
}

impl AtomState {
    fn open(&mut self, e: &BytesStart<'_>) -> Result<String, FetchError> {
        let key = element_key(e);
        if self.capture_depth.is_some() {
            return Ok(key);
        }
        match key.as_str() {
            "feed" => self.saw_root = true,
            "entry" => {
                self.entry = Some(Entry::default());
                self.entry_links.clear();
                self.authors.clear();
            }
            "link" => {
                let link = parse_link(e)?;
                if self.entry.is_some() {
                    self.entry_links.push(link);
                } else {
                    self.feed.links.push(link);
                }
            }
            "summary" | "content" if self.entry.is_some() => {
                self.capture_depth = Some(self.stack.len());
            }
            _ => {}
        }
        self.text.clear();
        Ok(key)
    }

    fn push_text(&mut self, text: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(text);
    }

    fn close(&mut self, key: &str) {
        if let Some(depth) = self.capture_depth {
            if self.stack.len() != depth {
                return;
            }
            self.capture_depth = None;
        }

        let text = mem::take(&mut self.text).trim().to_string();
        let parent = self.stack.last().map(String::as_str);

        match (key, parent) {
            ("entry", _) => {
                if let Some(mut entry) = self.entry.take() {
                    entry.links = EntryLinks::List(mem::take(&mut self.entry_links));
                    if !self.authors.is_empty() {
                        entry.author = Some(self.authors.join(", "));
                    }
                    self.feed.entries.push(entry);
                }
            }
            ("name", Some("author")) => {
                if self.entry.is_some() && !text.is_empty() {
                    self.authors.push(text);
                }
            }
            ("title", Some("entry")) => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.title = Some(text).filter(|t| !t.is_empty());
                }
            }
            ("title", Some("feed")) => {
                self.feed.title = Some(text).filter(|t| !t.is_empty());
            }
            (_, Some("entry")) => {
                if let Some(entry) = self.entry.as_mut()
                    && !text.is_empty()
                {
                    entry.fields.insert(key.to_string(), text);
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> Result<Feed, FetchError> {
        if !self.saw_root {
            return Err(FetchError::parse(FORMAT, "document has no <feed> element"));
        }
        if !self.stack.is_empty() {
            return Err(FetchError::parse(
                FORMAT,
                format!("document ended inside <{}>", self.stack.join("/")),
            ));
        }
        Ok(self.feed)
    }
}

fn element_key(e: &BytesStart<'_>) -> String {
    let name = e.name();
    let local = String::from_utf8_lossy(name.local_name().as_ref()).into_owned();
    let Some(prefix) = name.prefix() else {
        return local;
    };
    match prefix.as_ref() {
        b"atom" => local,
        b"dc" | b"dcterms" => format!("dcterms_{local}"),
        other => format!("{}_{local}", String::from_utf8_lossy(other)),
    }
}

fn parse_link(e: &BytesStart<'_>) -> Result<Link, FetchError> {
    let mut link = Link::new("alternate", None, "");
    for attr in e.attributes() {
        let attr = attr.map_err(|err| FetchError::parse(FORMAT, err.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|err| FetchError::parse(FORMAT, err.to_string()))?
            .into_owned();
        match attr.key.local_name().as_ref() {
            b"rel" => link.rel = value,
            b"type" => link.media_type = Some(value),
            b"href" => link.href = value,
            b"title" => link.title = Some(value),
            _ => {}
        }
    }
    Ok(link)
}
