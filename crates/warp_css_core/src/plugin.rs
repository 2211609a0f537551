use std::fmt::Debug;
use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use indexmap::IndexMap;

/// How a module was reached during resolution
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResolveKind {
  EntryPoint,
  #[default]
  ImportStatement,
  RequireCall,
  DynamicImport,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolveArgs {
  /// The specifier as written in the importing module
  pub path: String,
  /// Absolute path of the importing module, empty for entry points
  pub importer: PathBuf,
  pub kind: ResolveKind,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadArgs {
  pub path: PathBuf,
}

/// How the bundler should parse loaded contents
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Loader {
  Js,
  Jsx,
  Ts,
  Tsx,
  Css,
  Json,
  Text,
  Other(String),
}

impl Loader {
  /// Infers the loader from a file extension, folding module flavours onto
  /// their base language (`mjs`/`cjs` are `js`, `mts`/`cts` are `ts`).
  pub fn from_path(path: &Path) -> Self {
    let extension = path
      .extension()
      .map(|extension| extension.to_string_lossy().to_string())
      .unwrap_or_default();

    match extension.as_str() {
      "js" | "mjs" | "cjs" => Loader::Js,
      "jsx" => Loader::Jsx,
      "ts" | "mts" | "cts" => Loader::Ts,
      "tsx" => Loader::Tsx,
      "css" => Loader::Css,
      "json" => Loader::Json,
      "txt" => Loader::Text,
      other => Loader::Other(other.to_string()),
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadResult {
  pub contents: String,
  pub loader: Loader,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildOptions {
  /// Whether the bundler reports its output paths in a metafile
  pub metafile: bool,
  /// Whether outputs are written to disk rather than kept in memory
  pub write: bool,
}

/// An output artifact held in memory
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputFile {
  pub path: PathBuf,
  pub contents: Vec<u8>,
  /// Entry point this output was produced from, if known
  pub entry_point: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetafileOutput {
  pub entry_point: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metafile {
  /// Output artifacts written to disk, keyed by path
  pub outputs: IndexMap<PathBuf, MetafileOutput>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildResult {
  /// Present when the bundler kept its outputs in memory
  pub output_files: Option<Vec<OutputFile>>,
  pub metafile: Option<Metafile>,
}

/// Lifecycle hooks a bundler invokes on a plugin during a build
///
/// Resolve and load hooks may run concurrently and interleave; the end hook
/// runs once both have settled for the run.
#[async_trait]
pub trait BundlerPlugin: Debug + Send + Sync {
  fn name(&self) -> &str;

  /// Adjusts the build options before the build starts
  fn setup(&self, _options: &mut BuildOptions) {}

  async fn on_start(&self) -> anyhow::Result<()> {
    Ok(())
  }

  /// Observes a resolution; resolution itself is left to the bundler
  async fn on_resolve(&self, args: &ResolveArgs) -> anyhow::Result<()>;

  /// Loads a module, or returns `None` to let the bundler load it
  async fn on_load(&self, args: &LoadArgs) -> anyhow::Result<Option<LoadResult>>;

  async fn on_end(&self, result: &mut BuildResult) -> anyhow::Result<()>;

  async fn on_dispose(&self) {}
}
