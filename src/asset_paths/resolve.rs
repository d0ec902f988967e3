use std::path::PathBuf;

use percent_encoding::percent_decode_str;
use sha1::{Digest, Sha1};

use crate::models::AssetKind;
use crate::site::SiteContext;

/// Map a resource URL to the file that serves it under the document root.
///
/// Only the URL path is used; query strings and fragments are dropped and percent escapes are
/// decoded. Dot segments are normalised away so the result never leaves the document root.
pub fn local_path_for_url(site: &SiteContext, url: &str) -> PathBuf {
    let url_path = match site.site_url.join(url.trim()) {
        Ok(resolved) => resolved.path().to_string(),
        Err(_) => strip_query(url).to_string(),
    };

    let mut path = site.document_root.clone();
    for segment in url_path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            continue;
        }
        let decoded = percent_decode_str(segment).decode_utf8_lossy();
        path.push(&*decoded);
    }
    path
}

/// Final path segment of a URL, without query string or fragment.
pub fn basename(url: &str) -> String {
    let path = strip_query(url).trim_end_matches('/');
    let segment = path.rsplit('/').next().unwrap_or(path);
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

/// Ensure a unify target prefix ends with a single slash.
pub fn normalise_prefix(prefix: &str) -> String {
    format!("{}/", prefix.trim().trim_end_matches('/'))
}

/// Artifact filename for an ordered list of source basenames.
///
/// The name is `sha1(concat(basenames))` in lowercase hex plus the kind's extension. It depends
/// only on the names and their order, never on file content.
pub fn artifact_file_name<I, S>(kind: AssetKind, basenames: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha1::new();
    for name in basenames {
        hasher.update(name.as_ref().as_bytes());
    }
    format!("{}{}", hex::encode(hasher.finalize()), kind.extension())
}

fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use url::Url;

    fn site() -> SiteContext {
        SiteContext::new(Url::parse("http://example.org/").unwrap(), "/srv/www")
    }

    #[test]
    fn resolves_absolute_and_relative_urls_under_document_root() {
        let site = site();
        assert_eq!(
            local_path_for_url(&site, "http://example.org/wp-content/css/style.css?ver=2"),
            Path::new("/srv/www/wp-content/css/style.css")
        );
        assert_eq!(
            local_path_for_url(&site, "/min/css/"),
            Path::new("/srv/www/min/css")
        );
    }

    #[test]
    fn decodes_and_contains_paths() {
        let site = site();
        assert_eq!(
            local_path_for_url(&site, "/css/../../etc/my%20style.css"),
            Path::new("/srv/www/etc/my style.css")
        );
    }

    #[test]
    fn basename_drops_query_and_fragment() {
        assert_eq!(basename("https://cdn.example.net/lib/html5.js?ver=3#x"), "html5.js");
        assert_eq!(basename("navigation.js"), "navigation.js");
    }

    #[test]
    fn normalises_prefix_slashes() {
        assert_eq!(normalise_prefix("min/css"), "min/css/");
        assert_eq!(normalise_prefix("min/css//"), "min/css/");
    }

    #[test]
    fn artifact_name_hashes_ordered_basenames() {
        assert_eq!(
            artifact_file_name(AssetKind::Script, ["html5.js", "navigation.js"]),
            "b9a5ca67c05900b54559c6de185c321a3be68ac4.js"
        );
        assert_eq!(
            artifact_file_name(AssetKind::Script, ["navigation.js", "html5.js"]),
            "1436a17cf754626747c7a73ca0180e4808106d2a.js"
        );
        assert_eq!(
            artifact_file_name(AssetKind::Style, ["editor-style.css", "style.css"]),
            "551f80cf3bcff4fe53f3732ecfb69cf68278c7bc.css"
        );
    }
}
