//! Data structures describing declared resources and the unify configuration.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Resource category handled by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
  /// JavaScript resource.
  Script,
  /// CSS stylesheet.
  Style,
}

impl AssetKind {
  /// Both kinds, in the order the CLI publishes them.
  pub const ALL: [AssetKind; 2] = [AssetKind::Style, AssetKind::Script];

  /// Plural key used by per-kind unify targets (`"scripts"` / `"styles"`).
  pub fn plural(self) -> &'static str {
    match self {
      Self::Script => "scripts",
      Self::Style => "styles",
    }
  }

  /// File extension, including the leading dot, of unified artifacts.
  pub fn extension(self) -> &'static str {
    match self {
      Self::Script => ".js",
      Self::Style => ".css",
    }
  }
}

impl fmt::Display for AssetKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Script => f.write_str("script"),
      Self::Style => f.write_str("style"),
    }
  }
}

/// Rendering scope a declaration belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Place {
  /// Public facing pages.
  #[default]
  Front,
  /// Administrative screens.
  Admin,
}

impl fmt::Display for Place {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Front => f.write_str("front"),
      Self::Admin => f.write_str("admin"),
    }
  }
}

/// Kind-specific metadata attached to a declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KindFields {
  /// Script metadata.
  Script {
    /// Emit the script tag in the page footer.
    footer: bool,
    /// Parameters exposed to client-side code under the script name.
    params: Map<String, Value>,
  },
  /// Stylesheet metadata.
  Style {
    /// Media query the stylesheet applies to.
    media: String,
  },
}

/// A validated script or style registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDeclaration {
  /// Unique key within its kind.
  pub name: String,
  /// Absolute or site-relative URL of the resource.
  pub url: String,
  /// Rendering scope.
  pub place: Place,
  /// Names of resources this one depends on, without duplicates.
  pub dependencies: Vec<String>,
  /// Version string, or `None` when the host should not append one.
  pub version: Option<String>,
  /// Script or style specific metadata.
  #[serde(flatten)]
  pub fields: KindFields,
}

impl ResourceDeclaration {
  /// The kind implied by the declaration's kind-specific fields.
  pub fn kind(&self) -> AssetKind {
    match self.fields {
      KindFields::Script { .. } => AssetKind::Script,
      KindFields::Style { .. } => AssetKind::Style,
    }
  }
}

/// Loosely typed declaration as supplied by plugin code or a manifest file.
///
/// `name` and `url` are optional here so incomplete input can be rejected as a whole by
/// [`DeclarationInput::into_declaration`]. Fields that do not apply to the requested kind
/// are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeclarationInput {
  /// Unique key within the kind.
  pub name: Option<String>,
  /// Resource URL.
  pub url: Option<String>,
  /// Rendering scope, `front` when absent.
  pub place: Option<Place>,
  /// Dependency names.
  pub deps: Vec<String>,
  /// Optional version string.
  pub version: Option<String>,
  /// Scripts only: load in the footer, `true` when absent.
  pub footer: Option<bool>,
  /// Scripts only: client-side parameters.
  pub params: Map<String, Value>,
  /// Styles only: media attribute, empty when absent.
  pub media: Option<String>,
}

impl DeclarationInput {
  /// Start a declaration with the two required fields.
  pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
    Self {
      name: Some(name.into()),
      url: Some(url.into()),
      ..Self::default()
    }
  }

  /// Set the rendering scope.
  pub fn place(mut self, place: Place) -> Self {
    self.place = Some(place);
    self
  }

  /// Set the dependency list.
  pub fn deps<I, S>(mut self, deps: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.deps = deps.into_iter().map(Into::into).collect();
    self
  }

  /// Set the version string.
  pub fn version(mut self, version: impl Into<String>) -> Self {
    self.version = Some(version.into());
    self
  }

  /// Set footer placement (scripts).
  pub fn footer(mut self, footer: bool) -> Self {
    self.footer = Some(footer);
    self
  }

  /// Add one client-side parameter (scripts).
  pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.params.insert(key.into(), value.into());
    self
  }

  /// Set the media attribute (styles).
  pub fn media(mut self, media: impl Into<String>) -> Self {
    self.media = Some(media.into());
    self
  }

  /// Validate the input and apply per-kind defaults.
  ///
  /// Returns `None` when `name` or `url` is missing or blank.
  pub fn into_declaration(self, kind: AssetKind) -> Option<ResourceDeclaration> {
    let name = self.name.filter(|value| !value.trim().is_empty())?;
    let url = self.url.filter(|value| !value.trim().is_empty())?;

    let mut dependencies: Vec<String> = Vec::with_capacity(self.deps.len());
    for dep in self.deps {
      if !dependencies.contains(&dep) {
        dependencies.push(dep);
      }
    }

    let fields = match kind {
      AssetKind::Script => KindFields::Script {
        footer: self.footer.unwrap_or(true),
        params: self.params,
      },
      AssetKind::Style => KindFields::Style {
        media: self.media.unwrap_or_default(),
      },
    };

    Some(ResourceDeclaration {
      name,
      url,
      place: self.place.unwrap_or_default(),
      dependencies,
      version: self.version,
      fields,
    })
  }
}

/// Where unified artifacts are written, expressed as public URL prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawUnifyTarget")]
pub enum UnifyTarget {
  /// Aggregation is switched off.
  #[default]
  Disabled,
  /// One prefix shared by scripts and styles.
  Shared(String),
  /// Separate prefixes; a kind without a prefix is not aggregated.
  PerKind {
    /// Prefix for unified scripts.
    scripts: Option<String>,
    /// Prefix for unified styles.
    styles: Option<String>,
  },
}

impl UnifyTarget {
  /// URL prefix for the given kind, when that kind is aggregated.
  pub fn prefix_for(&self, kind: AssetKind) -> Option<&str> {
    match self {
      Self::Disabled => None,
      Self::Shared(prefix) => Some(prefix.as_str()),
      Self::PerKind { scripts, styles } => match kind {
        AssetKind::Script => scripts.as_deref(),
        AssetKind::Style => styles.as_deref(),
      },
    }
  }
}

impl From<&str> for UnifyTarget {
  fn from(prefix: &str) -> Self {
    Self::Shared(prefix.to_string())
  }
}

impl From<String> for UnifyTarget {
  fn from(prefix: String) -> Self {
    Self::Shared(prefix)
  }
}

impl From<bool> for UnifyTarget {
  fn from(_: bool) -> Self {
    Self::Disabled
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUnifyTarget {
  Flag(bool),
  Prefix(String),
  PerKind {
    #[serde(default)]
    scripts: Option<String>,
    #[serde(default)]
    styles: Option<String>,
  },
}

impl From<RawUnifyTarget> for UnifyTarget {
  fn from(raw: RawUnifyTarget) -> Self {
    match raw {
      RawUnifyTarget::Flag(_) => Self::Disabled,
      RawUnifyTarget::Prefix(prefix) => Self::Shared(prefix),
      RawUnifyTarget::PerKind { scripts, styles } => Self::PerKind { scripts, styles },
    }
  }
}

/// Aggregation settings, last write wins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UnifyConfig {
  /// Name given to every unified artifact.
  #[serde(rename = "id")]
  pub artifact_id: String,
  /// Target URL prefix(es).
  pub target: UnifyTarget,
  /// Run the compaction pass over the concatenated content.
  #[serde(default)]
  pub minify: bool,
}

impl UnifyConfig {
  /// URL prefix used for `kind`, or `None` when this kind is not aggregated.
  pub fn prefix_for(&self, kind: AssetKind) -> Option<&str> {
    self.target.prefix_for(kind)
  }
}
