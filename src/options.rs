//! Persistent key-value option storage used to remember file signatures between runs.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure while reading or writing persisted options.
#[derive(Debug, Error)]
pub enum OptionStoreError {
  /// The backing file could not be read or written.
  #[error("failed to access option file {}", .path.display())]
  Io {
    /// Backing file.
    path: PathBuf,
    /// Underlying I/O error.
    #[source]
    source: std::io::Error,
  },
  /// The backing file does not hold a JSON object of strings.
  #[error("failed to parse option file {}", .path.display())]
  Parse {
    /// Backing file.
    path: PathBuf,
    /// Underlying parse error.
    #[source]
    source: serde_json::Error,
  },
}

/// Host-provided named option storage.
pub trait OptionStore {
  /// Read an option, `None` when it was never written.
  fn get_option(&self, name: &str) -> Result<Option<String>, OptionStoreError>;

  /// Create or replace an option.
  fn set_option(&mut self, name: &str, value: &str) -> Result<(), OptionStoreError>;
}

impl<T: OptionStore + ?Sized> OptionStore for &mut T {
  fn get_option(&self, name: &str) -> Result<Option<String>, OptionStoreError> {
    (**self).get_option(name)
  }

  fn set_option(&mut self, name: &str, value: &str) -> Result<(), OptionStoreError> {
    (**self).set_option(name, value)
  }
}

/// In-process option store.
#[derive(Debug, Clone, Default)]
pub struct MemoryOptionStore {
  values: BTreeMap<String, String>,
  writes: usize,
}

impl MemoryOptionStore {
  /// Create an empty store.
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of `set_option` calls served so far.
  pub fn writes(&self) -> usize {
    self.writes
  }
}

impl OptionStore for MemoryOptionStore {
  fn get_option(&self, name: &str) -> Result<Option<String>, OptionStoreError> {
    Ok(self.values.get(name).cloned())
  }

  fn set_option(&mut self, name: &str, value: &str) -> Result<(), OptionStoreError> {
    self.values.insert(name.to_string(), value.to_string());
    self.writes += 1;
    Ok(())
  }
}

/// Option store persisted as a single JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileOptionStore {
  path: PathBuf,
}

impl JsonFileOptionStore {
  /// Use `path` as the backing file. The file is created on first write.
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// Backing file location.
  pub fn path(&self) -> &Path {
    &self.path
  }

  fn read_all(&self) -> Result<BTreeMap<String, String>, OptionStoreError> {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
      Err(source) => {
        return Err(OptionStoreError::Io {
          path: self.path.clone(),
          source,
        });
      }
    };

    serde_json::from_str(&content).map_err(|source| OptionStoreError::Parse {
      path: self.path.clone(),
      source,
    })
  }
}

impl OptionStore for JsonFileOptionStore {
  fn get_option(&self, name: &str) -> Result<Option<String>, OptionStoreError> {
    Ok(self.read_all()?.remove(name))
  }

  fn set_option(&mut self, name: &str, value: &str) -> Result<(), OptionStoreError> {
    let mut values = self.read_all()?;
    values.insert(name.to_string(), value.to_string());

    let io_error = |source| OptionStoreError::Io {
      path: self.path.clone(),
      source,
    };
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      fs::create_dir_all(parent).map_err(io_error)?;
    }
    let serialised = serde_json::to_string_pretty(&values).map_err(|source| {
      OptionStoreError::Parse {
        path: self.path.clone(),
        source,
      }
    })?;
    fs::write(&self.path, serialised).map_err(io_error)
  }
}
