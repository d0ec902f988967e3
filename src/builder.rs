//! Unified artifact builder: decides staleness, concatenates sources and republishes metadata.
//!
//! One call to [`UnifiedArtifactBuilder::build`] handles one kind:
//!
//! 1. resolve every declared source and evaluate its staleness signals,
//! 2. derive the artifact filename from the ordered source basenames,
//! 3. rebuild the artifact when it is missing or any signal fired,
//! 4. persist the tracking record when it changed,
//! 5. describe the artifact as a single replacement declaration.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::asset_paths::{
  artifact_file_name, basename, is_external_url, local_path_for_url, normalise_prefix,
};
use crate::compress::compress;
use crate::mirror::{ExternalMirror, RemoteFetcher, store as store_mirror};
use crate::models::{AssetKind, KindFields, ResourceDeclaration, UnifyConfig};
use crate::options::{OptionStore, OptionStoreError};
use crate::site::SiteContext;
use crate::tracker::{ModificationTracker, StalenessMode, content_digest};

/// Version given to an artifact whose sources disagree or carry none.
pub const DEFAULT_VERSION: &str = "1.0.0";
/// Media given to a unified stylesheet whose sources disagree or carry none.
pub const DEFAULT_MEDIA: &str = "all";

/// Failure that aborts a unify pass for one kind.
#[derive(Debug, Error)]
pub enum UnifyError {
  /// A site-local source has no file under the document root.
  #[error("source `{name}` has no file at {}", .path.display())]
  MissingSource {
    /// Declaration name.
    name: String,
    /// Resolved path.
    path: PathBuf,
  },
  /// A source file or mirrored copy could not be read.
  #[error("failed to read {}", .path.display())]
  ReadSource {
    /// File being read.
    path: PathBuf,
    /// Underlying error.
    #[source]
    source: io::Error,
  },
  /// A fetched external resource could not be written to its mirror location.
  #[error("failed to mirror {url} to {}", .path.display())]
  WriteMirror {
    /// Remote URL.
    url: String,
    /// Mirror location.
    path: PathBuf,
    /// Underlying error.
    #[source]
    source: io::Error,
  },
  /// The unified artifact could not be written.
  #[error("failed to write unified artifact {}", .path.display())]
  WriteArtifact {
    /// Artifact location.
    path: PathBuf,
    /// Underlying error.
    #[source]
    source: io::Error,
  },
  /// The tracking record could not be loaded or saved.
  #[error("failed to access the modification record")]
  Tracking(#[from] OptionStoreError),
}

/// Result of a successful unify pass.
#[derive(Debug, Clone)]
pub struct BuildOutput {
  /// Declaration replacing every source of the kind.
  pub artifact: ResourceDeclaration,
  /// Artifact location on disk.
  pub path: PathBuf,
  /// Whether the artifact was written during this pass.
  pub rebuilt: bool,
  /// Whether the tracking record was persisted during this pass.
  pub tracking_flushed: bool,
}

#[derive(Debug)]
enum SourcePlan {
  /// Read from a file on disk: a site-local source or an up to date mirror.
  Local(PathBuf),
  /// External source without a mirror; fetch and mirror during the rebuild.
  Remote { url: String, mirror: PathBuf },
  /// External source whose mirror drifted; the live copy was already fetched.
  Fetched { url: String, mirror: PathBuf, bytes: Vec<u8> },
}

#[derive(Debug)]
struct PreparedSource {
  name: String,
  basename: String,
  plan: SourcePlan,
}

/// Builds the unified artifact for one kind.
pub struct UnifiedArtifactBuilder<'a> {
  site: &'a SiteContext,
  config: &'a UnifyConfig,
  mirror: ExternalMirror<'a>,
  mode: StalenessMode,
}

impl<'a> UnifiedArtifactBuilder<'a> {
  /// Create a builder for the provided site and configuration.
  pub fn new(
    site: &'a SiteContext,
    config: &'a UnifyConfig,
    fetcher: &'a dyn RemoteFetcher,
    mode: StalenessMode,
  ) -> Self {
    Self {
      site,
      config,
      mirror: ExternalMirror::new(fetcher),
      mode,
    }
  }

  /// Run the unify pass for `kind` over `declarations`, in their iteration order.
  ///
  /// Returns `Ok(None)` when the configuration does not aggregate this kind or there is
  /// nothing to aggregate. On error nothing is persisted and the caller should keep the
  /// original declarations.
  pub fn build(
    &self,
    kind: AssetKind,
    declarations: &IndexMap<String, ResourceDeclaration>,
    store: &mut dyn OptionStore,
  ) -> Result<Option<BuildOutput>, UnifyError> {
    let Some(prefix) = self.config.prefix_for(kind) else {
      return Ok(None);
    };
    if declarations.is_empty() {
      return Ok(None);
    }

    let _span = tracing::debug_span!("unify", %kind, id = %self.config.artifact_id).entered();

    let prefix = normalise_prefix(prefix);
    let target_dir = local_path_for_url(self.site, &prefix);
    let mut tracker = ModificationTracker::load(store, self.mode)?;

    let sources = self.prepare_sources(declarations, &target_dir, &mut tracker)?;

    let file_name = artifact_file_name(kind, sources.iter().map(|source| &source.basename));
    let artifact_path = target_dir.join(&file_name);
    let rebuilt = !artifact_path.is_file() || tracker.has_changes();

    if rebuilt {
      self.rebuild(&sources, &artifact_path)?;
    } else {
      tracing::debug!(path = %artifact_path.display(), "unified artifact is up to date");
    }

    let tracking_flushed = tracker.flush_if_changed(store)?;

    let artifact = unify_declarations(
      kind,
      self.site,
      &self.config.artifact_id,
      format!("{prefix}{file_name}"),
      declarations.values(),
    );

    Ok(Some(BuildOutput {
      artifact,
      path: artifact_path,
      rebuilt,
      tracking_flushed,
    }))
  }

  fn prepare_sources(
    &self,
    declarations: &IndexMap<String, ResourceDeclaration>,
    target_dir: &Path,
    tracker: &mut ModificationTracker,
  ) -> Result<Vec<PreparedSource>, UnifyError> {
    let mut sources = Vec::with_capacity(declarations.len());

    for (name, declaration) in declarations {
      let basename = basename(&declaration.url);

      let plan = if is_external_url(self.site, &declaration.url) {
        let url = self
          .site
          .site_url
          .join(declaration.url.trim())
          .map(|resolved| resolved.to_string())
          .unwrap_or_else(|_| declaration.url.clone());
        let mirror = target_dir.join(&basename);
        self.plan_external(url, mirror, tracker)?
      } else {
        let path = local_path_for_url(self.site, &declaration.url);
        if !path.is_file() {
          return Err(UnifyError::MissingSource {
            name: name.clone(),
            path,
          });
        }
        let modified = tracker
          .is_modified(&path)
          .map_err(|source| UnifyError::ReadSource {
            path: path.clone(),
            source,
          })?;
        if modified {
          tracing::debug!(%name, path = %path.display(), "source modified since last pass");
        }
        SourcePlan::Local(path)
      };

      sources.push(PreparedSource {
        name: name.clone(),
        basename,
        plan,
      });
    }

    Ok(sources)
  }

  fn plan_external(
    &self,
    url: String,
    mirror: PathBuf,
    tracker: &mut ModificationTracker,
  ) -> Result<SourcePlan, UnifyError> {
    if !mirror.is_file() {
      return Ok(SourcePlan::Remote { url, mirror });
    }

    let Some(live) = self.mirror.fetch(&url) else {
      tracing::debug!(%url, "keeping previous mirror after failed fetch");
      return Ok(SourcePlan::Local(mirror));
    };

    let mirrored = fs::read(&mirror).map_err(|source| UnifyError::ReadSource {
      path: mirror.clone(),
      source,
    })?;
    if content_digest(&live) == content_digest(&mirrored) {
      return Ok(SourcePlan::Local(mirror));
    }

    tracing::debug!(%url, mirror = %mirror.display(), "remote resource drifted from mirror");
    tracker.mark_changed();
    Ok(SourcePlan::Fetched {
      url,
      mirror,
      bytes: live,
    })
  }

  fn rebuild(&self, sources: &[PreparedSource], artifact_path: &Path) -> Result<(), UnifyError> {
    let mut buffer = Vec::new();

    for source in sources {
      match &source.plan {
        SourcePlan::Local(path) => {
          let bytes = fs::read(path).map_err(|err| UnifyError::ReadSource {
            path: path.clone(),
            source: err,
          })?;
          buffer.extend_from_slice(&bytes);
        }
        SourcePlan::Remote { url, mirror } => {
          let bytes = self
            .mirror
            .fetch_and_store(url, mirror)
            .map_err(|err| UnifyError::WriteMirror {
              url: url.clone(),
              path: mirror.clone(),
              source: err,
            })?;
          if bytes.is_empty() {
            tracing::warn!(name = %source.name, %url, "remote source contributes no content");
          }
          buffer.extend_from_slice(&bytes);
        }
        SourcePlan::Fetched { url, mirror, bytes } => {
          store_mirror(mirror, bytes).map_err(|err| UnifyError::WriteMirror {
            url: url.clone(),
            path: mirror.clone(),
            source: err,
          })?;
          buffer.extend_from_slice(bytes);
        }
      }
    }

    if self.config.minify {
      buffer = compress(&buffer);
    }

    write_file(artifact_path, &buffer).map_err(|source| UnifyError::WriteArtifact {
      path: artifact_path.to_path_buf(),
      source,
    })?;

    tracing::info!(
      path = %artifact_path.display(),
      sources = sources.len(),
      bytes = buffer.len(),
      minify = self.config.minify,
      "rebuilt unified artifact"
    );
    Ok(())
  }
}

/// Merge the metadata of `sources` into the declaration describing their unified artifact.
///
/// Dependencies are the de-duplicated union in first-seen order. Version, media and footer
/// placement carry over only when every source agrees on a non-empty value; otherwise the
/// defaults apply. Script parameters are merged in order, later keys overriding earlier ones.
pub fn unify_declarations<'d>(
  kind: AssetKind,
  site: &SiteContext,
  artifact_id: &str,
  url: String,
  sources: impl IntoIterator<Item = &'d ResourceDeclaration>,
) -> ResourceDeclaration {
  let sources: Vec<&ResourceDeclaration> = sources.into_iter().collect();

  let dependencies: IndexSet<String> = sources
    .iter()
    .flat_map(|source| source.dependencies.iter().cloned())
    .collect();

  let version = unanimous(sources.iter().map(|source| source.version.clone()))
    .flatten()
    .filter(|version| !version.is_empty())
    .unwrap_or_else(|| DEFAULT_VERSION.to_string());

  let fields = match kind {
    AssetKind::Style => {
      let media = unanimous(sources.iter().filter_map(|source| match &source.fields {
        KindFields::Style { media } => Some(media.clone()),
        KindFields::Script { .. } => None,
      }))
      .filter(|media| !media.is_empty())
      .unwrap_or_else(|| DEFAULT_MEDIA.to_string());
      KindFields::Style { media }
    }
    AssetKind::Script => {
      let footer = unanimous(sources.iter().filter_map(|source| match &source.fields {
        KindFields::Script { footer, .. } => Some(*footer),
        KindFields::Style { .. } => None,
      }))
      .unwrap_or(false);

      let mut params: Map<String, Value> = Map::new();
      for source in &sources {
        if let KindFields::Script { params: extra, .. } = &source.fields {
          for (key, value) in extra {
            params.insert(key.clone(), value.clone());
          }
        }
      }
      KindFields::Script { footer, params }
    }
  };

  ResourceDeclaration {
    name: artifact_id.to_string(),
    url,
    place: site.place,
    dependencies: dependencies.into_iter().collect(),
    version: Some(version),
    fields,
  }
}

/// The common value of `values`, or `None` when they differ or there are none.
fn unanimous<T: PartialEq>(values: impl IntoIterator<Item = T>) -> Option<T> {
  let mut values = values.into_iter();
  let first = values.next()?;
  for value in values {
    if value != first {
      return None;
    }
  }
  Some(first)
}

/// Write `bytes` to `path`, creating parent directories.
///
/// Content goes to a sibling temporary file that is renamed into place, so readers never see a
/// partially written file.
pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
  let parent = path.parent().filter(|parent| !parent.as_os_str().is_empty());
  if let Some(parent) = parent {
    fs::create_dir_all(parent)?;
  }

  let file_name = path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();
  let temporary = path.with_file_name(format!(".{file_name}.tmp"));

  fs::write(&temporary, bytes)?;
  if let Err(err) = fs::rename(&temporary, path) {
    let _ = fs::remove_file(&temporary);
    return Err(err);
  }
  Ok(())
}
