//! Modification tracking for unified source files.
//!
//! The tracker keeps one signature per source file in a single persisted option, keyed by the
//! file's path. A build pass loads the record once, compares every site-local source against it,
//! and writes it back only when something changed. Entries for files that no longer exist are
//! dropped on load.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use crate::options::{OptionStore, OptionStoreError};

/// Name of the option holding the signature map.
pub const TRACKING_OPTION: &str = "asset_unify_files";

/// How file modification is detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StalenessMode {
  /// Compare a blake3 digest of the file content.
  #[default]
  ContentHash,
  /// Compare the modification time in whole seconds.
  Timestamp,
}

/// Last observed state of a file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Signature {
  /// Modification time, seconds since the Unix epoch.
  Timestamp(u64),
  /// Hex encoded content digest.
  Digest(String),
}

/// Compute the current signature of `path`.
pub fn file_signature(path: &Path, mode: StalenessMode) -> io::Result<Signature> {
  match mode {
    StalenessMode::ContentHash => Ok(Signature::Digest(content_digest(&fs::read(path)?))),
    StalenessMode::Timestamp => {
      let modified = fs::metadata(path)?.modified()?;
      let seconds = modified
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
      Ok(Signature::Timestamp(seconds))
    }
  }
}

/// Hex blake3 digest of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String {
  blake3::hash(bytes).to_hex().to_string()
}

/// Key under which a path's signature is stored.
pub fn record_key(path: &Path) -> String {
  path.to_string_lossy().into_owned()
}

/// In-memory view of the persisted signature map for one build pass.
#[derive(Debug, Clone, Default)]
pub struct ModificationTracker {
  mode: StalenessMode,
  records: BTreeMap<String, Signature>,
  changes: bool,
  pruned: bool,
}

impl ModificationTracker {
  /// Read the signature map from `store`, starting empty when it is absent.
  ///
  /// A record that no longer parses is discarded; every file then reads as modified, which
  /// forces one rebuild and rewrites the record. Entries whose file is gone are dropped so
  /// renamed or deleted sources do not accumulate.
  pub fn load(store: &dyn OptionStore, mode: StalenessMode) -> Result<Self, OptionStoreError> {
    let mut records: BTreeMap<String, Signature> = match store.get_option(TRACKING_OPTION)? {
      Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
        tracing::warn!(option = TRACKING_OPTION, error = %err, "discarding unreadable tracking record");
        BTreeMap::new()
      }),
      None => BTreeMap::new(),
    };

    let before = records.len();
    records.retain(|key, _| Path::new(key).is_file());
    let pruned = records.len() != before;
    if pruned {
      tracing::debug!(dropped = before - records.len(), "pruned records of missing files");
    }

    Ok(Self {
      mode,
      records,
      changes: false,
      pruned,
    })
  }

  /// Staleness mode used for comparisons.
  pub fn mode(&self) -> StalenessMode {
    self.mode
  }

  /// Signatures currently held in memory.
  pub fn records(&self) -> &BTreeMap<String, Signature> {
    &self.records
  }

  /// Compare `path` with its stored signature, recording the new one on mismatch.
  pub fn is_modified(&mut self, path: &Path) -> io::Result<bool> {
    let current = file_signature(path, self.mode)?;
    let key = record_key(path);

    if self.records.get(&key) == Some(&current) {
      return Ok(false);
    }

    self.records.insert(key, current);
    self.changes = true;
    Ok(true)
  }

  /// Flag the pass as changed for a reason other than a tracked file.
  pub fn mark_changed(&mut self) {
    self.changes = true;
  }

  /// Whether any change was observed during this pass.
  pub fn has_changes(&self) -> bool {
    self.changes
  }

  /// Persist the signature map when this pass observed a change or dropped stale entries.
  /// Returns whether it wrote.
  pub fn flush_if_changed(&self, store: &mut dyn OptionStore) -> Result<bool, OptionStoreError> {
    if !self.changes && !self.pruned {
      return Ok(false);
    }

    let serialised = serde_json::to_string(&self.records)
      .expect("signature map always serialises to JSON");
    store.set_option(TRACKING_OPTION, &serialised)?;
    Ok(true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::options::MemoryOptionStore;
  use tempfile::tempdir;

  #[test]
  fn first_sighting_counts_as_modified() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("style.css");
    fs::write(&file, "body{}").unwrap();

    let store = MemoryOptionStore::new();
    let mut tracker = ModificationTracker::load(&store, StalenessMode::ContentHash).unwrap();

    assert!(tracker.is_modified(&file).unwrap());
    assert!(!tracker.is_modified(&file).unwrap());
    assert!(tracker.has_changes());
  }

  #[test]
  fn persisted_signatures_survive_reload() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("app.js");
    fs::write(&file, "let a = 1;").unwrap();

    let mut store = MemoryOptionStore::new();
    let mut tracker = ModificationTracker::load(&store, StalenessMode::ContentHash).unwrap();
    tracker.is_modified(&file).unwrap();
    assert!(tracker.flush_if_changed(&mut store).unwrap());

    let mut reloaded = ModificationTracker::load(&store, StalenessMode::ContentHash).unwrap();
    assert!(!reloaded.is_modified(&file).unwrap());
    assert!(!reloaded.flush_if_changed(&mut store).unwrap());
    assert_eq!(store.writes(), 1);

    fs::write(&file, "let a = 2;").unwrap();
    assert!(reloaded.is_modified(&file).unwrap());
    assert!(reloaded.flush_if_changed(&mut store).unwrap());
    assert_eq!(store.writes(), 2);
  }

  #[test]
  fn timestamp_mode_detects_any_difference() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("app.js");
    fs::write(&file, "x").unwrap();

    let mut stale = BTreeMap::new();
    stale.insert(record_key(&file), Signature::Timestamp(1));
    let mut store = MemoryOptionStore::new();
    store
      .set_option(TRACKING_OPTION, &serde_json::to_string(&stale).unwrap())
      .unwrap();

    let mut tracker = ModificationTracker::load(&store, StalenessMode::Timestamp).unwrap();
    assert!(tracker.is_modified(&file).unwrap());
    assert!(matches!(
      tracker.records().get(&record_key(&file)),
      Some(Signature::Timestamp(seconds)) if *seconds > 1
    ));
  }

  #[test]
  fn unreadable_record_starts_empty() {
    let mut store = MemoryOptionStore::new();
    store.set_option(TRACKING_OPTION, "[").unwrap();

    let tracker = ModificationTracker::load(&store, StalenessMode::ContentHash).unwrap();
    assert!(tracker.records().is_empty());
  }

  #[test]
  fn drops_records_of_missing_files_without_flagging_changes() {
    let temp = tempdir().unwrap();
    let kept = temp.path().join("kept.css");
    let renamed = temp.path().join("old-name.css");
    fs::write(&kept, "a{}").unwrap();
    fs::write(&renamed, "b{}").unwrap();

    let mut store = MemoryOptionStore::new();
    let mut tracker = ModificationTracker::load(&store, StalenessMode::ContentHash).unwrap();
    tracker.is_modified(&kept).unwrap();
    tracker.is_modified(&renamed).unwrap();
    tracker.flush_if_changed(&mut store).unwrap();

    fs::rename(&renamed, temp.path().join("new-name.css")).unwrap();

    let tracker = ModificationTracker::load(&store, StalenessMode::ContentHash).unwrap();
    assert!(!tracker.has_changes());
    assert_eq!(
      tracker.records().keys().collect::<Vec<_>>(),
      [&record_key(&kept)]
    );
    assert!(tracker.flush_if_changed(&mut store).unwrap());

    let reloaded = ModificationTracker::load(&store, StalenessMode::ContentHash).unwrap();
    assert_eq!(reloaded.records().len(), 1);
    assert!(!reloaded.flush_if_changed(&mut store).unwrap());
  }

  #[test]
  fn signatures_use_integers_and_hex_strings() {
    let mut records = BTreeMap::new();
    records.insert("a".to_string(), Signature::Timestamp(42));
    records.insert("b".to_string(), Signature::Digest("ff".into()));

    let json = serde_json::to_string(&records).unwrap();
    assert_eq!(json, r#"{"a":42,"b":"ff"}"#);
  }
}
