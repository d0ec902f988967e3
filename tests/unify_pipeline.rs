use std::fs;
use std::path::Path;

use asset_unify::compress::compress;
use asset_unify::{
  AssetKind, AssetRegistry, DeclarationInput, FetchError, JsonFileOptionStore, KindFields,
  LifecycleHook, RecordingHost, RemoteFetcher, SiteContext, UnifyOutcome, UnifyTarget,
};
use tempfile::tempdir;
use url::Url;

const SITE: &str = "http://example.org/";
const THEME: &str = "http://example.org/wp-content/themes/tests/";

const EDITOR_STYLE: &str = "body {\n  font-size: 1.6em;\n}\n/* editor */\n";
const DEFAULT_STYLE: &str = "h1 { color: red; }\n";

struct Offline;

impl RemoteFetcher for Offline {
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    Err(FetchError::Unavailable {
      url: url.to_string(),
    })
  }
}

fn write(root: &Path, relative: &str, content: &str) {
  let path = root.join(relative);
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, content).unwrap();
}

fn seed_theme(root: &Path) {
  write(root, "wp-content/themes/tests/css/editor-style.css", EDITOR_STYLE);
  write(root, "wp-content/themes/tests/css/style.css", DEFAULT_STYLE);
  write(root, "wp-content/themes/tests/js/html5.js", "var html5;");
  write(root, "wp-content/themes/tests/js/navigation.js", "var navigation;");
}

/// One request: fresh registry, shared filesystem and option file.
fn request(root: &Path) -> AssetRegistry<RecordingHost, JsonFileOptionStore> {
  let site = SiteContext::new(Url::parse(SITE).unwrap(), root);
  let options = JsonFileOptionStore::new(root.join("options.json"));
  AssetRegistry::new(site, RecordingHost::new(), options).with_fetcher(Offline)
}

fn declare_styles(registry: &mut AssetRegistry<RecordingHost, JsonFileOptionStore>) {
  assert!(registry.add(
    AssetKind::Style,
    DeclarationInput::new("EditorStyle", format!("{THEME}css/editor-style.css"))
      .version("1.1.3")
      .media("all")
  ));
  assert!(registry.add(
    AssetKind::Style,
    DeclarationInput::new("DefaultStyle", format!("{THEME}css/style.css"))
      .deps(["EditorStyle", "dashicons"])
      .version("1.1.3")
      .media("all")
  ));
}

fn styles_only(prefix: String) -> UnifyTarget {
  UnifyTarget::PerKind {
    scripts: None,
    styles: Some(prefix),
  }
}

#[test]
fn unifies_styles_into_hashed_artifact() {
  let temp = tempdir().unwrap();
  let root = temp.path();
  seed_theme(root);

  let mut registry = request(root);
  registry.unify("UniqueID", styles_only(format!("{THEME}min/css/")), false);
  declare_styles(&mut registry);

  let report = registry.publish_styles();
  let artifact_path = root
    .join("wp-content/themes/tests/min/css")
    .join("551f80cf3bcff4fe53f3732ecfb69cf68278c7bc.css");
  assert!(matches!(&report.unify, UnifyOutcome::Rebuilt(path) if *path == artifact_path));
  assert_eq!(
    fs::read_to_string(&artifact_path).unwrap(),
    format!("{EDITOR_STYLE}{DEFAULT_STYLE}")
  );

  let styles = registry.declarations(AssetKind::Style);
  assert_eq!(styles.len(), 1);
  let artifact = &styles["UniqueID"];
  assert_eq!(
    artifact.url,
    format!("{THEME}min/css/551f80cf3bcff4fe53f3732ecfb69cf68278c7bc.css")
  );
  assert_eq!(artifact.dependencies, vec!["EditorStyle", "dashicons"]);
  assert_eq!(artifact.version.as_deref(), Some("1.1.3"));
  assert_eq!(artifact.fields, KindFields::Style {
    media: "all".into()
  });

  let published = registry.host().resource(AssetKind::Style, "UniqueID").unwrap();
  assert_eq!(published.url, artifact.url);
  assert!(published.enqueued);
  assert!(registry.host().resource(AssetKind::Style, "EditorStyle").is_none());
}

#[test]
fn minified_artifact_keeps_declaration_order() {
  let temp = tempdir().unwrap();
  let root = temp.path();
  seed_theme(root);

  let mut registry = request(root);
  registry.unify("UniqueID", styles_only(format!("{THEME}min/css/")), true);
  declare_styles(&mut registry);

  let report = registry.publish_styles();
  let UnifyOutcome::Rebuilt(path) = report.unify else {
    panic!("expected a rebuild");
  };

  let content = fs::read_to_string(path).unwrap();
  assert_eq!(content, "body {font-size: 1.6em;}h1 {color: red;}");
  assert!(content.starts_with(std::str::from_utf8(&compress(EDITOR_STYLE.as_bytes())).unwrap()));
  assert!(!content.contains("/*"));
}

#[test]
fn shared_prefix_unifies_both_kinds() {
  let temp = tempdir().unwrap();
  let root = temp.path();
  seed_theme(root);

  let mut registry = request(root);
  registry.unify("UniqueID", "min/", false);
  declare_styles(&mut registry);
  registry.add(
    AssetKind::Script,
    DeclarationInput::new("html5", format!("{THEME}js/html5.js")).footer(false),
  );
  registry.add(
    AssetKind::Script,
    DeclarationInput::new("navigation", format!("{THEME}js/navigation.js"))
      .footer(false)
      .param("menu", "primary"),
  );

  let reports = registry.run_hook(LifecycleHook::FrontEnqueue);
  assert_eq!(reports.len(), 2);
  assert!(reports.iter().all(|report| report.published == ["UniqueID"]));

  let script_path = root.join("min/b9a5ca67c05900b54559c6de185c321a3be68ac4.js");
  assert_eq!(
    fs::read_to_string(script_path).unwrap(),
    "var html5;var navigation;"
  );
  assert!(
    root
      .join("min/551f80cf3bcff4fe53f3732ecfb69cf68278c7bc.css")
      .is_file()
  );

  let script = registry.host().resource(AssetKind::Script, "UniqueID").unwrap();
  assert_eq!(script.url, "min/b9a5ca67c05900b54559c6de185c321a3be68ac4.js");
  assert_eq!(script.footer, Some(false));
  let params = script.params.as_ref().unwrap();
  assert_eq!(params.get("menu").and_then(|v| v.as_str()), Some("primary"));
  assert!(params.contains_key("nonce"));
  assert!(params.contains_key("plugin_url"));
}

#[test]
fn unchanged_sources_reuse_artifact_across_requests() {
  let temp = tempdir().unwrap();
  let root = temp.path();
  seed_theme(root);

  let mut first = request(root);
  first.unify("UniqueID", styles_only(format!("{THEME}min/css/")), false);
  declare_styles(&mut first);
  let UnifyOutcome::Rebuilt(path) = first.publish_styles().unify else {
    panic!("first request should build the artifact");
  };
  let built_at = fs::metadata(&path).unwrap().modified().unwrap();
  let options_after_first = fs::read_to_string(root.join("options.json")).unwrap();

  let mut second = request(root);
  second.unify("UniqueID", styles_only(format!("{THEME}min/css/")), false);
  declare_styles(&mut second);
  let report = second.publish_styles();

  assert!(matches!(&report.unify, UnifyOutcome::Cached(cached) if *cached == path));
  assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), built_at);
  assert_eq!(
    fs::read_to_string(root.join("options.json")).unwrap(),
    options_after_first
  );
}

#[test]
fn edited_source_rebuilds_artifact_in_place() {
  let temp = tempdir().unwrap();
  let root = temp.path();
  seed_theme(root);

  let mut first = request(root);
  first.unify("UniqueID", styles_only(format!("{THEME}min/css/")), false);
  declare_styles(&mut first);
  let UnifyOutcome::Rebuilt(path) = first.publish_styles().unify else {
    panic!("first request should build the artifact");
  };

  write(root, "wp-content/themes/tests/css/style.css", "h2 { color: blue; }\n");

  let mut second = request(root);
  second.unify("UniqueID", styles_only(format!("{THEME}min/css/")), false);
  declare_styles(&mut second);
  let report = second.publish_styles();

  assert!(matches!(&report.unify, UnifyOutcome::Rebuilt(rebuilt) if *rebuilt == path));
  assert_eq!(
    fs::read_to_string(&path).unwrap(),
    format!("{EDITOR_STYLE}h2 {{ color: blue; }}\n")
  );
}

#[test]
fn disabled_unify_publishes_every_declaration() {
  let temp = tempdir().unwrap();
  let root = temp.path();
  seed_theme(root);

  let mut registry = request(root);
  registry.unify("UniqueID", "min/", false);
  registry.unify("UniqueID", false, false);
  declare_styles(&mut registry);

  let report = registry.publish_styles();
  assert!(matches!(report.unify, UnifyOutcome::Skipped));
  assert_eq!(report.published, ["EditorStyle", "DefaultStyle"]);
  assert!(!root.join("min").exists());
}
