//! Request-scoped registration store and the publication entry points.

use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::builder::{UnifiedArtifactBuilder, UnifyError};
use crate::host::{AssetHost, LifecycleHook, PublicationAdapter};
use crate::mirror::{HttpFetcher, RemoteFetcher};
use crate::models::{
  AssetKind, DeclarationInput, KindFields, Place, ResourceDeclaration, UnifyConfig, UnifyTarget,
};
use crate::options::OptionStore;
use crate::site::SiteContext;
use crate::tracker::StalenessMode;

/// What the unify step did during one publication pass.
#[derive(Debug)]
pub enum UnifyOutcome {
  /// Aggregation is not configured for this kind, or there was nothing to aggregate.
  Skipped,
  /// The artifact was written during this pass.
  Rebuilt(PathBuf),
  /// The existing artifact was still current.
  Cached(PathBuf),
  /// The build failed; the original declarations were published instead.
  Failed(UnifyError),
}

/// Summary of one publication pass for one kind.
#[derive(Debug)]
pub struct PublishReport {
  /// Kind that was published.
  pub kind: AssetKind,
  /// Result of the unify step.
  pub unify: UnifyOutcome,
  /// Names handed to the host, in order.
  pub published: Vec<String>,
}

/// Declared scripts and styles for one request, plus the collaborators needed to publish them.
pub struct AssetRegistry<H: AssetHost, S: OptionStore> {
  site: SiteContext,
  host: H,
  options: S,
  fetcher: Box<dyn RemoteFetcher>,
  staleness: StalenessMode,
  scripts: IndexMap<String, ResourceDeclaration>,
  styles: IndexMap<String, ResourceDeclaration>,
  bound: IndexSet<(AssetKind, Place)>,
  unified: IndexMap<AssetKind, PathBuf>,
  unify: Option<UnifyConfig>,
}

impl<H: AssetHost, S: OptionStore> AssetRegistry<H, S> {
  /// Create an empty registry for `site`, fetching external resources over HTTP.
  pub fn new(site: SiteContext, host: H, options: S) -> Self {
    Self {
      site,
      host,
      options,
      fetcher: Box::new(HttpFetcher::new()),
      staleness: StalenessMode::default(),
      scripts: IndexMap::new(),
      styles: IndexMap::new(),
      bound: IndexSet::new(),
      unified: IndexMap::new(),
      unify: None,
    }
  }

  /// Replace the fetcher used to mirror external resources.
  pub fn with_fetcher(mut self, fetcher: impl RemoteFetcher + 'static) -> Self {
    self.fetcher = Box::new(fetcher);
    self
  }

  /// Choose how source modification is detected.
  pub fn with_staleness(mut self, staleness: StalenessMode) -> Self {
    self.staleness = staleness;
    self
  }

  /// Declare a resource.
  ///
  /// Returns `false` without touching any state when `name` or `url` is missing, or when the
  /// declaration's place does not match the request scope. The first accepted declaration of a
  /// kind binds that kind's publication routine to the request's lifecycle hook.
  pub fn add(&mut self, kind: AssetKind, input: DeclarationInput) -> bool {
    let Some(declaration) = input.into_declaration(kind) else {
      tracing::debug!(%kind, "rejected declaration without name or url");
      return false;
    };
    if declaration.place != self.site.place {
      tracing::debug!(%kind, name = %declaration.name, place = %declaration.place, "rejected declaration for another place");
      return false;
    }

    let place = self.site.place;
    if self.bound.insert((kind, place)) {
      self.host.bind_hook(LifecycleHook::for_place(place), kind);
    }

    self
      .collection_mut(kind)
      .insert(declaration.name.clone(), declaration);
    true
  }

  /// Forget a declaration. Removing an absent name is not an error.
  pub fn remove(&mut self, kind: AssetKind, name: &str) -> bool {
    self.collection_mut(kind).shift_remove(name);
    true
  }

  /// Whether `name` is currently declared for `kind`.
  pub fn is_added(&self, kind: AssetKind, name: &str) -> bool {
    self.collection(kind).contains_key(name)
  }

  /// Configure aggregation. Passing [`UnifyTarget::Disabled`] (or `false`) switches it off.
  pub fn unify(
    &mut self,
    artifact_id: impl Into<String>,
    target: impl Into<UnifyTarget>,
    minify: bool,
  ) -> bool {
    let target = target.into();
    self.unify = match target {
      UnifyTarget::Disabled => None,
      target => Some(UnifyConfig {
        artifact_id: artifact_id.into(),
        target,
        minify,
      }),
    };
    true
  }

  /// Current aggregation settings.
  pub fn unify_config(&self) -> Option<&UnifyConfig> {
    self.unify.as_ref()
  }

  /// Declarations of `kind` in declaration order.
  pub fn declarations(&self, kind: AssetKind) -> &IndexMap<String, ResourceDeclaration> {
    self.collection(kind)
  }

  /// Whether the publication routine of `kind` is bound for `place`.
  pub fn is_bound(&self, kind: AssetKind, place: Place) -> bool {
    self.bound.contains(&(kind, place))
  }

  /// Request scope.
  pub fn site(&self) -> &SiteContext {
    &self.site
  }

  /// Host collaborator.
  pub fn host(&self) -> &H {
    &self.host
  }

  /// Option store collaborator.
  pub fn options(&self) -> &S {
    &self.options
  }

  /// Tear the registry down, returning its host and option store.
  pub fn into_parts(self) -> (H, S) {
    (self.host, self.options)
  }

  /// Entry point bound for scripts.
  pub fn publish_scripts(&mut self) -> PublishReport {
    self.publish(AssetKind::Script)
  }

  /// Entry point bound for styles.
  pub fn publish_styles(&mut self) -> PublishReport {
    self.publish(AssetKind::Style)
  }

  /// Run every publication routine bound to `hook`, in binding order.
  pub fn run_hook(&mut self, hook: LifecycleHook) -> Vec<PublishReport> {
    let kinds: Vec<AssetKind> = self
      .bound
      .iter()
      .filter(|(_, place)| *place == hook.place())
      .map(|(kind, _)| *kind)
      .collect();

    kinds.into_iter().map(|kind| self.publish(kind)).collect()
  }

  /// Unify `kind` when configured, then hand its declarations to the host.
  ///
  /// A kind is unified at most once per registry. Later passes republish the replacement
  /// declaration and report the existing artifact as cached.
  pub fn publish(&mut self, kind: AssetKind) -> PublishReport {
    let unify = self.unify_kind(kind);

    let declarations = match kind {
      AssetKind::Script => &self.scripts,
      AssetKind::Style => &self.styles,
    };
    let mut adapter = PublicationAdapter::new(&mut self.host, &self.site);
    let mut published = Vec::with_capacity(declarations.len());
    for declaration in declarations.values() {
      adapter.publish(declaration);
      published.push(declaration.name.clone());
    }

    PublishReport {
      kind,
      unify,
      published,
    }
  }

  fn unify_kind(&mut self, kind: AssetKind) -> UnifyOutcome {
    let Some(config) = self.unify.as_ref() else {
      return UnifyOutcome::Skipped;
    };
    if let Some(path) = self.unified.get(&kind) {
      tracing::debug!(%kind, path = %path.display(), "already unified in this request");
      return UnifyOutcome::Cached(path.clone());
    }
    let declarations = match kind {
      AssetKind::Script => &self.scripts,
      AssetKind::Style => &self.styles,
    };

    let builder =
      UnifiedArtifactBuilder::new(&self.site, config, self.fetcher.as_ref(), self.staleness);
    let output = match builder.build(kind, declarations, &mut self.options) {
      Ok(Some(output)) => output,
      Ok(None) => return UnifyOutcome::Skipped,
      Err(err) => {
        tracing::warn!(%kind, error = %err, "unify failed, publishing individual resources");
        return UnifyOutcome::Failed(err);
      }
    };

    let mut artifact = output.artifact;
    if let KindFields::Script { params, .. } = &mut artifact.fields {
      let nonce = self.host.create_nonce(&artifact.name);
      params.insert("nonce".to_string(), Value::String(nonce));
    }

    let mut replacement = IndexMap::with_capacity(1);
    replacement.insert(artifact.name.clone(), artifact);
    *self.collection_mut(kind) = replacement;
    self.unified.insert(kind, output.path.clone());

    if output.rebuilt {
      UnifyOutcome::Rebuilt(output.path)
    } else {
      UnifyOutcome::Cached(output.path)
    }
  }

  fn collection(&self, kind: AssetKind) -> &IndexMap<String, ResourceDeclaration> {
    match kind {
      AssetKind::Script => &self.scripts,
      AssetKind::Style => &self.styles,
    }
  }

  fn collection_mut(&mut self, kind: AssetKind) -> &mut IndexMap<String, ResourceDeclaration> {
    match kind {
      AssetKind::Script => &mut self.scripts,
      AssetKind::Style => &mut self.styles,
    }
  }
}
