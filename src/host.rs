//! Boundary with the host's publication mechanism.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{AssetKind, KindFields, Place, ResourceDeclaration};
use crate::site::SiteContext;

/// Lifecycle phase in which the host emits resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LifecycleHook {
  /// Resource emission for public pages.
  FrontEnqueue,
  /// Resource emission for administrative screens.
  AdminEnqueue,
}

impl LifecycleHook {
  /// Hook that publishes resources for requests scoped to `place`.
  pub fn for_place(place: Place) -> Self {
    match place {
      Place::Front => Self::FrontEnqueue,
      Place::Admin => Self::AdminEnqueue,
    }
  }

  /// Place served by this hook.
  pub fn place(self) -> Place {
    match self {
      Self::FrontEnqueue => Place::Front,
      Self::AdminEnqueue => Place::Admin,
    }
  }

  /// Host-side action name.
  pub fn name(self) -> &'static str {
    match self {
      Self::FrontEnqueue => "wp_enqueue_scripts",
      Self::AdminEnqueue => "admin_enqueue_scripts",
    }
  }
}

impl fmt::Display for LifecycleHook {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Operations the registry needs from the host environment.
pub trait AssetHost {
  /// Arrange for the publication routine of `kind` to run when `hook` fires.
  fn bind_hook(&mut self, hook: LifecycleHook, kind: AssetKind);

  /// Register a script's metadata.
  fn register_script(
    &mut self,
    name: &str,
    url: &str,
    dependencies: &[String],
    version: Option<&str>,
    in_footer: bool,
  );

  /// Mark a registered script for emission.
  fn enqueue_script(&mut self, name: &str);

  /// Expose `params` to client-side code as `object_name`, attached to script `name`.
  fn localize_script(&mut self, name: &str, object_name: &str, params: &Map<String, Value>);

  /// Register a stylesheet's metadata.
  fn register_style(
    &mut self,
    name: &str,
    url: &str,
    dependencies: &[String],
    version: Option<&str>,
    media: &str,
  );

  /// Mark a registered stylesheet for emission.
  fn enqueue_style(&mut self, name: &str);

  /// Create a one-off token bound to `action`.
  fn create_nonce(&mut self, action: &str) -> String {
    let _ = action;
    uuid::Uuid::new_v4().simple().to_string()
  }
}

impl<T: AssetHost + ?Sized> AssetHost for &mut T {
  fn bind_hook(&mut self, hook: LifecycleHook, kind: AssetKind) {
    (**self).bind_hook(hook, kind)
  }

  fn register_script(
    &mut self,
    name: &str,
    url: &str,
    dependencies: &[String],
    version: Option<&str>,
    in_footer: bool,
  ) {
    (**self).register_script(name, url, dependencies, version, in_footer)
  }

  fn enqueue_script(&mut self, name: &str) {
    (**self).enqueue_script(name)
  }

  fn localize_script(&mut self, name: &str, object_name: &str, params: &Map<String, Value>) {
    (**self).localize_script(name, object_name, params)
  }

  fn register_style(
    &mut self,
    name: &str,
    url: &str,
    dependencies: &[String],
    version: Option<&str>,
    media: &str,
  ) {
    (**self).register_style(name, url, dependencies, version, media)
  }

  fn enqueue_style(&mut self, name: &str) {
    (**self).enqueue_style(name)
  }

  fn create_nonce(&mut self, action: &str) -> String {
    (**self).create_nonce(action)
  }
}

/// Hands final declarations to the host.
pub struct PublicationAdapter<'a, H: AssetHost + ?Sized> {
  host: &'a mut H,
  site: &'a SiteContext,
}

impl<'a, H: AssetHost + ?Sized> PublicationAdapter<'a, H> {
  /// Publish through `host` for `site`.
  pub fn new(host: &'a mut H, site: &'a SiteContext) -> Self {
    Self { host, site }
  }

  /// Register, enqueue and, for scripts, localize one declaration.
  ///
  /// Scripts receive `plugin_url` and a fresh `nonce` on top of their own parameters.
  pub fn publish(&mut self, declaration: &ResourceDeclaration) {
    let version = declaration.version.as_deref();
    match &declaration.fields {
      KindFields::Script { footer, params } => {
        let mut params = params.clone();
        params.insert(
          "plugin_url".to_string(),
          Value::String(self.site.plugin_url_param()),
        );
        params.insert(
          "nonce".to_string(),
          Value::String(self.host.create_nonce(&declaration.name)),
        );

        self.host.register_script(
          &declaration.name,
          &declaration.url,
          &declaration.dependencies,
          version,
          *footer,
        );
        self.host.enqueue_script(&declaration.name);
        self
          .host
          .localize_script(&declaration.name, &declaration.name, &params);
      }
      KindFields::Style { media } => {
        self.host.register_style(
          &declaration.name,
          &declaration.url,
          &declaration.dependencies,
          version,
          media,
        );
        self.host.enqueue_style(&declaration.name);
      }
    }
  }
}

/// A resource as the host saw it, captured by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedResource {
  /// Resource kind.
  pub kind: AssetKind,
  /// Handle name.
  pub name: String,
  /// Source URL.
  pub url: String,
  /// Dependency handles.
  pub dependencies: Vec<String>,
  /// Version string.
  pub version: Option<String>,
  /// Scripts: footer placement.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub footer: Option<bool>,
  /// Styles: media attribute.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub media: Option<String>,
  /// Scripts: localized parameters.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub params: Option<Map<String, Value>>,
  /// Whether the resource was enqueued after registration.
  pub enqueued: bool,
}

/// In-process host that records every call.
///
/// Used by the command line tool to report what would be emitted, and by tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
  bindings: Vec<(LifecycleHook, AssetKind)>,
  resources: Vec<PublishedResource>,
}

impl RecordingHost {
  /// Create an empty recorder.
  pub fn new() -> Self {
    Self::default()
  }

  /// Hook bindings in the order they were requested.
  pub fn bindings(&self) -> &[(LifecycleHook, AssetKind)] {
    &self.bindings
  }

  /// Registered resources in registration order.
  pub fn resources(&self) -> &[PublishedResource] {
    &self.resources
  }

  /// Look up a registered resource.
  pub fn resource(&self, kind: AssetKind, name: &str) -> Option<&PublishedResource> {
    self
      .resources
      .iter()
      .find(|resource| resource.kind == kind && resource.name == name)
  }

  fn resource_mut(&mut self, kind: AssetKind, name: &str) -> Option<&mut PublishedResource> {
    self
      .resources
      .iter_mut()
      .find(|resource| resource.kind == kind && resource.name == name)
  }

  fn upsert(&mut self, resource: PublishedResource) {
    match self.resource_mut(resource.kind, &resource.name) {
      Some(existing) => *existing = resource,
      None => self.resources.push(resource),
    }
  }
}

impl AssetHost for RecordingHost {
  fn bind_hook(&mut self, hook: LifecycleHook, kind: AssetKind) {
    self.bindings.push((hook, kind));
  }

  fn register_script(
    &mut self,
    name: &str,
    url: &str,
    dependencies: &[String],
    version: Option<&str>,
    in_footer: bool,
  ) {
    self.upsert(PublishedResource {
      kind: AssetKind::Script,
      name: name.to_string(),
      url: url.to_string(),
      dependencies: dependencies.to_vec(),
      version: version.map(str::to_string),
      footer: Some(in_footer),
      media: None,
      params: None,
      enqueued: false,
    });
  }

  fn enqueue_script(&mut self, name: &str) {
    if let Some(resource) = self.resource_mut(AssetKind::Script, name) {
      resource.enqueued = true;
    }
  }

  fn localize_script(&mut self, name: &str, _object_name: &str, params: &Map<String, Value>) {
    if let Some(resource) = self.resource_mut(AssetKind::Script, name) {
      resource.params = Some(params.clone());
    }
  }

  fn register_style(
    &mut self,
    name: &str,
    url: &str,
    dependencies: &[String],
    version: Option<&str>,
    media: &str,
  ) {
    self.upsert(PublishedResource {
      kind: AssetKind::Style,
      name: name.to_string(),
      url: url.to_string(),
      dependencies: dependencies.to_vec(),
      version: version.map(str::to_string),
      footer: None,
      media: Some(media.to_string()),
      params: None,
      enqueued: false,
    });
  }

  fn enqueue_style(&mut self, name: &str) {
    if let Some(resource) = self.resource_mut(AssetKind::Style, name) {
      resource.enqueued = true;
    }
  }
}
