//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use getbooks_core::book::mime;

/// Search book catalogs and download books.
///
/// Queries OPDS catalogs, archive exports, offline JSON catalogs and catalogs
/// found on mounted volumes.
#[derive(Parser, Debug)]
#[command(name = "getbooks")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Sources file (defaults to $XDG_CONFIG_HOME/getbooks/sources.ini)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory scanned for volumes carrying a catalog.xml (repeatable)
    #[arg(long = "mount-root", global = true, value_name = "DIR")]
    pub mount_roots: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List configured catalog sources
    Sources,
    /// Search a catalog and list matching books
    Search(SearchArgs),
    /// Download one book from a search
    Get(GetArgs),
}

/// Options shared by commands that run a catalog query.
#[derive(ClapArgs, Debug, Clone)]
pub struct QueryArgs {
    /// Source key (see `getbooks sources`)
    #[arg(short, long, default_value = "feedbooks")]
    pub source: String,

    /// Language filter sent as Accept-Language ("all" disables it)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Read this sub-catalog URI instead of searching
    #[arg(long, value_name = "URI", conflicts_with = "terms")]
    pub browse: Option<String>,

    /// Search terms
    pub terms: Vec<String>,
}

impl QueryArgs {
    #[must_use]
    pub fn term(&self) -> String {
        self.terms.join(" ")
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Number of result pages to fetch (1-50)
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=50))]
    pub pages: u32,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct GetArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// 1-based position of the book in the result list
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub index: u32,

    /// Format: epub, pdf, pdf-bw, djvu or a content type
    #[arg(short, long, default_value = "epub", value_parser = parse_format)]
    pub format: String,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Also register the book in this document store directory
    #[arg(long, value_name = "DIR")]
    pub journal: Option<PathBuf>,

    /// Skip fetching the cover image for the journal record
    #[arg(long)]
    pub no_cover: bool,
}

/// Maps a short format name to its content type; content types pass through.
pub fn parse_format(raw: &str) -> Result<String, String> {
    let content_type = match raw.trim().to_ascii_lowercase().as_str() {
        "epub" => mime::EPUB.to_string(),
        "pdf" => mime::PDF.to_string(),
        "pdf-bw" | "bw" => mime::PDF_BW.to_string(),
        "djvu" => mime::DJVU.to_string(),
        other if other.contains('/') => other.to_string(),
        other => return Err(format!("unknown format '{other}' (try epub, pdf, pdf-bw, djvu)")),
    };
    Ok(content_type)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let cli = Cli::try_parse_from(["getbooks", "-vv", "sources"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let cli = Cli::try_parse_from(["getbooks", "sources", "--verbose"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let cli = Cli::try_parse_from(["getbooks", "-q", "sources"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        let err = Cli::try_parse_from(["getbooks"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Cli::try_parse_from(["getbooks", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_search_collects_terms() {
        let cli =
            Cli::try_parse_from(["getbooks", "search", "-s", "internet-archive", "jules", "verne"])
                .unwrap();
        let Command::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.query.source, "internet-archive");
        assert_eq!(args.query.term(), "jules verne");
        assert_eq!(args.pages, 1);
    }

    #[test]
    fn test_cli_search_pages_range() {
        assert!(Cli::try_parse_from(["getbooks", "search", "-p", "0", "x"]).is_err());
        assert!(Cli::try_parse_from(["getbooks", "search", "-p", "51", "x"]).is_err());
    }

    #[test]
    fn test_cli_browse_conflicts_with_terms() {
        let err = Cli::try_parse_from(["getbooks", "search", "--browse", "http://a/b", "x"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_get_defaults() {
        let cli = Cli::try_parse_from(["getbooks", "get", "verne"]).unwrap();
        let Command::Get(args) = cli.command else {
            panic!("expected get");
        };
        assert_eq!(args.index, 1);
        assert_eq!(args.format, mime::EPUB);
        assert_eq!(args.output_dir, PathBuf::from("."));
        assert!(args.journal.is_none());
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("PDF").unwrap(), mime::PDF);
        assert_eq!(parse_format("pdf-bw").unwrap(), mime::PDF_BW);
        assert_eq!(parse_format("image/vnd.djvu").unwrap(), mime::DJVU);
        assert!(parse_format("docx").is_err());
    }

    #[test]
    fn test_cli_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "getbooks",
            "sources",
            "--config",
            "/tmp/sources.ini",
            "--mount-root",
            "/media",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/sources.ini")));
        assert_eq!(cli.mount_roots, vec![PathBuf::from("/media")]);
    }
}
