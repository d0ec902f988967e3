//! Declaration manifests consumed by the command line tool.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::host::AssetHost;
use crate::models::{AssetKind, DeclarationInput, UnifyConfig};
use crate::options::OptionStore;
use crate::registry::AssetRegistry;

/// Scripts, styles and optional unify settings, as written in a JSON or YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeclarationManifest {
  /// Aggregation settings applied before publication.
  pub unify: Option<UnifyConfig>,
  /// Script declarations in declaration order.
  pub scripts: Vec<DeclarationInput>,
  /// Style declarations in declaration order.
  pub styles: Vec<DeclarationInput>,
}

impl DeclarationManifest {
  /// Load a manifest, parsing `.yaml`/`.yml` files as YAML and anything else as JSON.
  pub fn load(path: &Path) -> Result<Self> {
    let content =
      fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let is_yaml = path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
      serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    } else {
      serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
  }

  /// Declare everything in the manifest on `registry`. Returns the number of rejected entries.
  pub fn apply<H: AssetHost, S: OptionStore>(self, registry: &mut AssetRegistry<H, S>) -> usize {
    if let Some(unify) = self.unify {
      registry.unify(unify.artifact_id, unify.target, unify.minify);
    }

    let mut rejected = 0;
    let entries = self
      .styles
      .into_iter()
      .map(|input| (AssetKind::Style, input))
      .chain(self.scripts.into_iter().map(|input| (AssetKind::Script, input)));
    for (kind, input) in entries {
      let label = input.name.clone().unwrap_or_default();
      if !registry.add(kind, input) {
        tracing::warn!(%kind, name = %label, "declaration rejected");
        rejected += 1;
      }
    }
    rejected
  }
}
