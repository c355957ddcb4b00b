//! Search command handler: run a catalog query and print the results.

use anyhow::Result;
use getbooks_core::book::mime::format_label;
use getbooks_core::book::{Book, UNKNOWN};
use getbooks_core::{CatalogSourceRegistry, QueryResult};

use super::run_query;
use crate::cli::SearchArgs;

pub async fn run_search_command(
    registry: &CatalogSourceRegistry,
    args: &SearchArgs,
    show_progress: bool,
) -> Result<()> {
    let mut query = run_query(registry, &args.query, args.pages, show_progress).await?;
    print_results(&mut query);
    Ok(())
}

fn print_results(query: &mut QueryResult) {
    if query.is_empty() && query.subcatalogs().is_empty() {
        println!("No books found in {}.", query.source().name());
        return;
    }

    for (index, book) in query.books().iter().enumerate() {
        println!("{}", render_book_row(index + 1, book));
    }

    if !query.subcatalogs().is_empty() {
        println!("\nCatalogs:");
        for catalog in query.subcatalogs() {
            let uri = catalog.catalog_uri().unwrap_or_default();
            println!("  {}  ({uri})", catalog.title());
        }
    }

    if query.has_next() {
        println!("\nMore results available; rerun with a larger --pages.");
    }
}

/// `  3. Title by Author (1870) [EPUB, PDF]`
pub(crate) fn render_book_row(position: usize, book: &Book) -> String {
    let links = book.download_links();
    let formats: Vec<&str> = links
        .keys()
        .map(|content_type| format_label(content_type))
        .collect();
    let mut row = format!("{position:>3}. {}", book.title());
    if book.author() != UNKNOWN {
        row.push_str(&format!(" by {}", book.author()));
    }
    if book.published_year() != UNKNOWN {
        row.push_str(&format!(" ({})", book.published_year()));
    }
    if !formats.is_empty() {
        row.push_str(&format!(" [{}]", formats.join(", ")));
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use getbooks_core::feed::{Entry, EntryLinks, Link, REL_ACQUISITION};

    #[test]
    fn test_render_book_row_lists_formats() {
        let mut entry = Entry {
            title: Some("Around the World".into()),
            author: Some("Jules Verne".into()),
            links: EntryLinks::List(vec![
                Link::new(REL_ACQUISITION, Some("application/epub+zip"), "http://a/1.epub"),
                Link::new(REL_ACQUISITION, Some("application/pdf"), "http://a/1.pdf"),
            ]),
            ..Entry::default()
        };
        entry.fields.insert("published".into(), "1873-01-01".into());
        let row = render_book_row(3, &Book::from_entry(entry));
        assert_eq!(row, "  3. Around the World by Jules Verne (1873) [EPUB, PDF]");
    }

    #[test]
    fn test_render_book_row_skips_unknown_fields() {
        let row = render_book_row(12, &Book::from_entry(Entry::default()));
        assert_eq!(row, " 12. Unknown");
    }
}
