use crate::site::SiteContext;

/// Determine whether `url` is hosted somewhere other than the current site.
///
/// Site-relative references (`/wp-content/...`, `css/app.css`) resolve against the site URL and
/// therefore count as local. Absolute and scheme-relative URLs are external when their origin
/// (scheme, host and port) differs from the site's origin.
pub fn is_external_url(site: &SiteContext, url: &str) -> bool {
    match site.site_url.join(url.trim()) {
        Ok(resolved) => resolved.origin() != site.site_url.origin(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::is_external_url;
    use crate::site::SiteContext;
    use url::Url;

    fn site() -> SiteContext {
        SiteContext::new(Url::parse("http://example.org/").unwrap(), "/srv/www")
    }

    #[test]
    fn treats_site_urls_as_local() {
        let site = site();
        assert!(!is_external_url(&site, "http://example.org/wp-content/style.css"));
        assert!(!is_external_url(&site, "/wp-content/style.css"));
        assert!(!is_external_url(&site, "css/style.css"));
    }

    #[test]
    fn flags_other_origins() {
        let site = site();
        assert!(is_external_url(&site, "https://cdn.example.net/jquery.js"));
        assert!(is_external_url(&site, "//cdn.example.net/jquery.js"));
        assert!(is_external_url(&site, "http://example.org:8080/style.css"));
    }
}
