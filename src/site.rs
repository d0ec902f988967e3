//! Request-scoped description of the site the registry is running for.

use std::path::{Path, PathBuf};

use url::Url;

use crate::models::Place;

/// Site level facts needed to map URLs to files and pick the publication hook.
#[derive(Debug, Clone)]
pub struct SiteContext {
  /// Public base URL of the site, e.g. `https://example.org/`.
  pub site_url: Url,
  /// Directory that serves the site's URL paths.
  pub document_root: PathBuf,
  /// Base URL of the plugins directory exposed to scripts as `plugin_url`.
  pub plugin_url: Option<String>,
  /// Scope of the current request.
  pub place: Place,
}

impl SiteContext {
  /// Create a front-end context without a plugin URL.
  pub fn new(site_url: Url, document_root: impl Into<PathBuf>) -> Self {
    Self {
      site_url,
      document_root: document_root.into(),
      plugin_url: None,
      place: Place::Front,
    }
  }

  /// Switch the request scope.
  pub fn with_place(mut self, place: Place) -> Self {
    self.place = place;
    self
  }

  /// Set the plugin base URL.
  pub fn with_plugin_url(mut self, plugin_url: impl Into<String>) -> Self {
    self.plugin_url = Some(plugin_url.into());
    self
  }

  /// Document root as a path reference.
  pub fn document_root(&self) -> &Path {
    &self.document_root
  }

  /// `plugin_url` value handed to client-side code: the base URL with a trailing slash,
  /// or an empty string when unknown.
  pub fn plugin_url_param(&self) -> String {
    match self.plugin_url.as_deref() {
      Some(url) if !url.is_empty() => format!("{}/", url.trim_end_matches('/')),
      _ => String::new(),
    }
  }
}
