#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod asset_paths;
pub mod builder;
pub mod compress;
pub mod config;
pub mod host;
pub mod manifest;
pub mod mirror;
pub mod models;
pub mod options;
pub mod registry;
pub mod site;
pub mod tracker;

pub use builder::{BuildOutput, UnifiedArtifactBuilder, UnifyError};
pub use host::{AssetHost, LifecycleHook, PublicationAdapter, RecordingHost};
pub use mirror::{ExternalMirror, FetchError, HttpFetcher, RemoteFetcher};
pub use models::{
  AssetKind, DeclarationInput, KindFields, Place, ResourceDeclaration, UnifyConfig, UnifyTarget,
};
pub use options::{JsonFileOptionStore, MemoryOptionStore, OptionStore, OptionStoreError};
pub use registry::{AssetRegistry, PublishReport, UnifyOutcome};
pub use site::SiteContext;
pub use tracker::{ModificationTracker, StalenessMode};
