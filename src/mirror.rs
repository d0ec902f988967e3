//! Local mirroring of externally hosted resources.

use std::io;
use std::path::Path;
use std::sync::OnceLock;

use thiserror::Error;

use crate::builder::write_file;

/// Failure to retrieve a remote resource.
#[derive(Debug, Error)]
pub enum FetchError {
  /// The request could not be completed.
  #[error("request to {url} failed")]
  Http {
    /// Requested URL.
    url: String,
    /// Transport error.
    #[source]
    source: reqwest::Error,
  },
  /// The server answered with a non-success status.
  #[error("request to {url} returned status {status}")]
  Status {
    /// Requested URL.
    url: String,
    /// HTTP status code.
    status: u16,
  },
  /// The response body was empty.
  #[error("request to {url} returned an empty body")]
  Empty {
    /// Requested URL.
    url: String,
  },
  /// The fetcher has no content for this URL.
  #[error("{url} is not available")]
  Unavailable {
    /// Requested URL.
    url: String,
  },
}

/// Blocking primitive used to download external resources.
pub trait RemoteFetcher {
  /// Retrieve the body of `url`.
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// [`RemoteFetcher`] backed by `reqwest`'s blocking client.
///
/// The client is built on the first request, so a fetcher that never downloads anything costs
/// nothing to create.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
  client: OnceLock<reqwest::blocking::Client>,
}

impl HttpFetcher {
  /// Create a fetcher; the underlying client is built lazily.
  pub fn new() -> Self {
    Self::default()
  }

  fn client(&self) -> &reqwest::blocking::Client {
    self.client.get_or_init(reqwest::blocking::Client::new)
  }
}

impl RemoteFetcher for HttpFetcher {
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    let http_error = |source| FetchError::Http {
      url: url.to_string(),
      source,
    };

    let response = self.client().get(url).send().map_err(http_error)?;
    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }

    let body = response.bytes().map_err(http_error)?;
    if body.is_empty() {
      return Err(FetchError::Empty {
        url: url.to_string(),
      });
    }
    Ok(body.to_vec())
  }
}

/// Downloads external resources into the unify target directory.
pub struct ExternalMirror<'a> {
  fetcher: &'a dyn RemoteFetcher,
}

impl<'a> ExternalMirror<'a> {
  /// Mirror through `fetcher`.
  pub fn new(fetcher: &'a dyn RemoteFetcher) -> Self {
    Self { fetcher }
  }

  /// Fetch `url`, returning `None` on any failure or an empty body.
  pub fn fetch(&self, url: &str) -> Option<Vec<u8>> {
    match self.fetcher.fetch(url) {
      Ok(bytes) if !bytes.is_empty() => Some(bytes),
      Ok(_) => {
        tracing::warn!(url, "remote resource returned no content");
        None
      }
      Err(err) => {
        tracing::warn!(url, error = %err, "failed to fetch remote resource");
        None
      }
    }
  }

  /// Fetch `url` and write it to `local_path`.
  ///
  /// A failed fetch yields empty bytes and leaves `local_path` untouched. Only a failure to
  /// write the mirrored copy is reported as an error.
  pub fn fetch_and_store(&self, url: &str, local_path: &Path) -> io::Result<Vec<u8>> {
    match self.fetch(url) {
      Some(bytes) => {
        store(local_path, &bytes)?;
        Ok(bytes)
      }
      None => Ok(Vec::new()),
    }
  }
}

/// Write already fetched bytes as the mirrored copy of a resource.
pub fn store(local_path: &Path, bytes: &[u8]) -> io::Result<()> {
  tracing::debug!(path = %local_path.display(), bytes = bytes.len(), "writing mirrored copy");
  write_file(local_path, bytes)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;
  use std::fs;
  use tempfile::tempdir;

  struct MapFetcher(BTreeMap<String, Vec<u8>>);

  impl RemoteFetcher for MapFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
      self.0.get(url).cloned().ok_or_else(|| FetchError::Unavailable {
        url: url.to_string(),
      })
    }
  }

  fn fetcher() -> MapFetcher {
    let mut bodies = BTreeMap::new();
    bodies.insert("https://cdn.example.net/lib.js".to_string(), b"lib();".to_vec());
    bodies.insert("https://cdn.example.net/empty.js".to_string(), Vec::new());
    MapFetcher(bodies)
  }

  #[test]
  fn http_fetcher_defers_client_construction() {
    let fetcher = HttpFetcher::new();
    assert!(fetcher.client.get().is_none());
  }

  #[test]
  fn stores_fetched_bytes_creating_directories() {
    let temp = tempdir().unwrap();
    let target = temp.path().join("min/js/lib.js");
    let fetcher = fetcher();
    let mirror = ExternalMirror::new(&fetcher);

    let bytes = mirror
      .fetch_and_store("https://cdn.example.net/lib.js", &target)
      .unwrap();

    assert_eq!(bytes, b"lib();");
    assert_eq!(fs::read(&target).unwrap(), b"lib();");
  }

  #[test]
  fn failed_or_empty_fetch_writes_nothing() {
    let temp = tempdir().unwrap();
    let fetcher = fetcher();
    let mirror = ExternalMirror::new(&fetcher);

    for url in [
      "https://cdn.example.net/missing.js",
      "https://cdn.example.net/empty.js",
    ] {
      let target = temp.path().join("out.js");
      let bytes = mirror.fetch_and_store(url, &target).unwrap();
      assert!(bytes.is_empty());
      assert!(!target.exists());
    }
  }
}
