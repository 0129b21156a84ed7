//! URL helpers.

use url::Url;

/// Last non-empty path segment of a URL.
///
/// Falls back to plain string splitting for inputs that are not absolute URLs.
pub fn last_path_segment(url: &str) -> Option<String> {
    if let Ok(parsed) = Url::parse(url) {
        return parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
            .map(|s| s.to_string());
    }

    url.split(['?', '#'])
        .next()
        .and_then(|path| path.split('/').filter(|s| !s.is_empty()).next_back())
        .map(|s| s.to_string())
}

/// Resolve an href against the page it was found on.
pub fn resolve_href(page_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    Url::parse(page_url)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_segment_of_entry_url() {
        assert_eq!(
            last_path_segment("https://www.dakotamatrix.com/mineralpedia/2/quartz"),
            Some("quartz".to_string())
        );
    }

    #[test]
    fn test_last_segment_ignores_trailing_slash_and_query() {
        assert_eq!(
            last_path_segment("https://example.com/minerals/beryl/?tab=1"),
            Some("beryl".to_string())
        );
    }

    #[test]
    fn test_last_segment_of_image_uri() {
        assert_eq!(last_path_segment("http://x/y.jpg"), Some("y.jpg".to_string()));
    }

    #[test]
    fn test_last_segment_relative() {
        assert_eq!(last_path_segment("images/a/b.png"), Some("b.png".to_string()));
        assert_eq!(last_path_segment("https://example.com/"), None);
    }

    #[test]
    fn test_resolve_href() {
        let page = "https://www.dakotamatrix.com/mineralpedia?page=3";
        assert_eq!(
            resolve_href(page, "/mineralpedia/7/calcite"),
            "https://www.dakotamatrix.com/mineralpedia/7/calcite"
        );
        assert_eq!(
            resolve_href(page, "https://cdn.example.com/a.jpg"),
            "https://cdn.example.com/a.jpg"
        );
    }
}
