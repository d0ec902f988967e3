//! Command line front end: publish a declaration manifest, compact a file, or name an artifact.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use asset_unify::asset_paths::artifact_file_name;
use asset_unify::compress::compress;
use asset_unify::config::SiteConfig;
use asset_unify::manifest::DeclarationManifest;
use asset_unify::{
  AssetKind, AssetRegistry, JsonFileOptionStore, LifecycleHook, Place, RecordingHost,
  UnifyOutcome,
};

#[derive(Debug, Parser)]
#[command(name = "asset-unify", version, about = "Register, unify and minify CSS/JS resources")]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Declare the manifest's resources and print what the host would emit.
  Publish {
    /// JSON or YAML declaration manifest.
    #[arg(long)]
    manifest: PathBuf,
    /// Site configuration; defaults to asset-unify.config.json in the current directory.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Request scope.
    #[arg(long, value_enum, default_value_t = PlaceArg::Front)]
    place: PlaceArg,
  },
  /// Run the compaction pass over a file and print the result.
  Compress {
    /// File to compact.
    file: PathBuf,
  },
  /// Print the artifact filename for an ordered list of source basenames.
  ArtifactName {
    /// Resource kind.
    #[arg(long, value_enum)]
    kind: KindArg,
    /// Source basenames in declaration order.
    #[arg(required = true)]
    basenames: Vec<String>,
  },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlaceArg {
  Front,
  Admin,
}

impl From<PlaceArg> for Place {
  fn from(value: PlaceArg) -> Self {
    match value {
      PlaceArg::Front => Place::Front,
      PlaceArg::Admin => Place::Admin,
    }
  }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
  Script,
  Style,
}

impl From<KindArg> for AssetKind {
  fn from(value: KindArg) -> Self {
    match value {
      KindArg::Script => AssetKind::Script,
      KindArg::Style => AssetKind::Style,
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("asset_unify=info")),
    )
    .with_writer(io::stderr)
    .init();

  match Cli::parse().command {
    Command::Publish {
      manifest,
      config,
      place,
    } => publish(&manifest, config.as_deref(), place.into()),
    Command::Compress { file } => {
      let content = fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
      io::stdout().write_all(&compress(&content))?;
      Ok(())
    }
    Command::ArtifactName { kind, basenames } => {
      println!("{}", artifact_file_name(kind.into(), &basenames));
      Ok(())
    }
  }
}

fn publish(manifest_path: &Path, config_path: Option<&Path>, place: Place) -> Result<()> {
  let (config, base_dir) = match config_path {
    Some(path) => {
      let config = SiteConfig::from_path(path)?;
      let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
      (config, base_dir)
    }
    None => {
      let base_dir = std::env::current_dir().context("failed to read current directory")?;
      (SiteConfig::discover(&base_dir), base_dir)
    }
  };

  let site = config.site_context(&base_dir, place)?;
  let options = JsonFileOptionStore::new(config.options_file_path(&base_dir));
  let mut registry =
    AssetRegistry::new(site, RecordingHost::new(), options).with_staleness(config.staleness);

  let rejected = DeclarationManifest::load(manifest_path)?.apply(&mut registry);
  if rejected > 0 {
    tracing::warn!(rejected, "some declarations were rejected");
  }

  let mut failed = false;
  for report in registry.run_hook(LifecycleHook::for_place(place)) {
    match &report.unify {
      UnifyOutcome::Rebuilt(path) => {
        tracing::info!(kind = %report.kind, path = %path.display(), "artifact rebuilt")
      }
      UnifyOutcome::Cached(path) => {
        tracing::info!(kind = %report.kind, path = %path.display(), "artifact up to date")
      }
      UnifyOutcome::Failed(err) => {
        tracing::error!(kind = %report.kind, error = %err, "unify failed");
        failed = true;
      }
      UnifyOutcome::Skipped => {}
    }
  }

  let (host, _) = registry.into_parts();
  println!("{}", serde_json::to_string_pretty(host.resources())?);

  if failed {
    bail!("unify failed for at least one kind");
  }
  Ok(())
}
