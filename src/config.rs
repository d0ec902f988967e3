//! Site configuration loader for the command line tool.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::models::Place;
use crate::site::SiteContext;
use crate::tracker::StalenessMode;

const DEFAULT_CONFIG_FILE: &str = "asset-unify.config.json";

/// Failure while loading or interpreting the site configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    /// The configuration file is not valid JSON for [`SiteConfig`].
    #[error("failed to parse {}", .0.display())]
    Parse(PathBuf, #[source] serde_json::Error),
    /// `site_url` is not an absolute URL.
    #[error("invalid site_url `{0}`")]
    SiteUrl(String, #[source] url::ParseError),
}

/// Discoverable description of the site the tool runs against.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Public base URL of the site.
    pub site_url: String,
    /// Directory serving the site's URL paths, relative to the config file's directory.
    pub document_root: String,
    /// Base URL of the plugins directory, exposed to scripts as `plugin_url`.
    pub plugin_url: Option<String>,
    /// JSON file holding persisted options, relative to the config file's directory.
    pub options_file: String,
    /// How source modification is detected.
    pub staleness: StalenessMode,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_url: "http://localhost/".into(),
            document_root: ".".into(),
            plugin_url: None,
            options_file: "asset-unify.options.json".into(),
            staleness: StalenessMode::default(),
        }
    }
}

impl SiteConfig {
    /// Load `asset-unify.config.json` from `dir`.
    ///
    /// A missing or unreadable file yields [`SiteConfig::default`]: a localhost site served from
    /// `dir` itself.
    pub fn discover(dir: &Path) -> Self {
        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        Self::from_path(&candidate).unwrap_or_default()
    }

    /// Read configuration from a specific JSON file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        serde_json::from_str(&content).map_err(|err| ConfigError::Parse(path.to_path_buf(), err))
    }

    /// Parsed site URL.
    pub fn site_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.site_url).map_err(|err| ConfigError::SiteUrl(self.site_url.clone(), err))
    }

    /// Document root resolved against `base_dir`.
    pub fn document_root_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.document_root)
    }

    /// Options file resolved against `base_dir`.
    pub fn options_file_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.options_file)
    }

    /// Build the request scope for `place`.
    pub fn site_context(&self, base_dir: &Path, place: Place) -> Result<SiteContext, ConfigError> {
        let mut site =
            SiteContext::new(self.site_url()?, self.document_root_path(base_dir)).with_place(place);
        if let Some(plugin_url) = &self.plugin_url {
            site = site.with_plugin_url(plugin_url.clone());
        }
        Ok(site)
    }
}
