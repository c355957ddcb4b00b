//! Shared User-Agent strings for feed and download HTTP clients.
//!
//! Single source for project URL and UA format so catalog and download traffic
//! stay consistent and easy to update.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/sugarlabs/getbooks-activity";

/// Default User-Agent for book and cover downloads.
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("getbooks/{version} (book-downloader; +{PROJECT_UA_URL})")
}

/// Default User-Agent for catalog feed requests.
#[must_use]
pub(crate) fn default_catalog_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("getbooks/{version} (catalog-reader; +{PROJECT_UA_URL})")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agents_share_project_url_and_version() {
        let download_ua = default_download_user_agent();
        let catalog_ua = default_catalog_user_agent();
        assert!(download_ua.contains(PROJECT_UA_URL));
        assert!(catalog_ua.contains(PROJECT_UA_URL));
        for ua in [&download_ua, &catalog_ua] {
            assert_eq!(
                env!("CARGO_PKG_VERSION"),
                ua.strip_prefix("getbooks/")
                    .and_then(|s| s.split(' ').next())
                    .unwrap(),
                "UA must contain crate version: {ua}"
            );
        }
    }

    #[test]
    fn test_user_agents_identify_purpose() {
        assert!(default_download_user_agent().contains("book-downloader"));
        assert!(default_catalog_user_agent().contains("catalog-reader"));
    }
}
