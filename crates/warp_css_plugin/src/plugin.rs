use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use warp_css_core::generate_styles;
use warp_css_core::plugin::{
  BuildOptions, BuildResult, BundlerPlugin, LoadArgs, LoadResult, Loader, ResolveArgs, ResolveKind,
};
use warp_css_core::BuildContext;
use warp_css_core::BuildPhase;
use warp_css_core::IdGenerator;
use warp_css_core::NanoIdGenerator;
use warp_css_core::PlaceholderTagger;
use warp_css_core::Resolution;
use warp_css_core::StyleGenerator;
use warp_css_core::Substitutor;
use warp_css_core::TaggedModule;
use warp_css_core::WarpCssError;
use warp_css_filesystem::normalize_path;
use warp_css_filesystem::FileSystemRef;

use crate::lightning_css::LightningCssPostProcessor;
use crate::options::WarpCssOptions;

/// Inlines generated styles at placeholder markers, scoped to the modules
/// below each marker in every entry point's import graph.
///
/// One instance drives one bundling run at a time; `on_start` resets it for
/// the next run and `on_dispose` releases everything it holds.
#[derive(Debug)]
pub struct WarpCssPlugin {
  options: WarpCssOptions,
  filter: Regex,
  file_system: FileSystemRef,
  style_generator: Arc<dyn StyleGenerator>,
  context: Mutex<BuildContext>,
}

/// Keeps a load counted as in flight until its content is recorded or the
/// guard is dropped, so failed and cancelled loads settle too
struct PendingLoad<'a> {
  context: &'a Mutex<BuildContext>,
  settled: bool,
}

impl<'a> PendingLoad<'a> {
  fn begin(context: &'a Mutex<BuildContext>) -> Result<Self, WarpCssError> {
    context.lock().begin_load()?;
    Ok(PendingLoad {
      context,
      settled: false,
    })
  }

  /// Records the loaded content and settles the load under a single lock
  fn record(mut self, path: &Path, contents: String) -> Result<TaggedModule, WarpCssError> {
    let context = self.context;
    let mut context = context.lock();
    self.settled = true;
    let tagged = context.record_load(path, contents);
    context.end_load();
    tagged
  }
}

impl Drop for PendingLoad<'_> {
  fn drop(&mut self) {
    if !self.settled {
      self.context.lock().end_load();
    }
  }
}

impl WarpCssPlugin {
  /// Creates the plugin. Styles from `style_generator` are post-processed
  /// with lightningcss for the `browserslist` targets of the options.
  pub fn new(
    options: WarpCssOptions,
    file_system: FileSystemRef,
    style_generator: Arc<dyn StyleGenerator>,
  ) -> Result<Self, WarpCssError> {
    Self::with_id_generator(
      options,
      file_system,
      style_generator,
      Arc::new(NanoIdGenerator),
    )
  }

  pub fn with_id_generator(
    options: WarpCssOptions,
    file_system: FileSystemRef,
    style_generator: Arc<dyn StyleGenerator>,
    id_generator: Arc<dyn IdGenerator>,
  ) -> Result<Self, WarpCssError> {
    options.validate()?;
    let filter = options.filter_regex()?;
    let style_generator = LightningCssPostProcessor::new(style_generator, &options.browserslist)
      .map_err(|err| WarpCssError::InvalidOptions(format!("invalid browserslist query: {err}")))?;
    let tagger = PlaceholderTagger::new(
      options.placeholder.clone(),
      options.tag_prefix.clone(),
      options.tag_length,
      id_generator,
    );

    Ok(WarpCssPlugin {
      options,
      filter,
      file_system,
      style_generator: Arc::new(style_generator),
      context: Mutex::new(BuildContext::new(tagger)),
    })
  }

  pub fn options(&self) -> &WarpCssOptions {
    &self.options
  }

  pub fn phase(&self) -> BuildPhase {
    self.context.lock().phase()
  }

  /// Whether `path` is tracked by the graph of at least one entry point
  pub fn is_tracked(&self, path: &Path) -> bool {
    self
      .context
      .lock()
      .registry()
      .graphs_containing(path)
      .next()
      .is_some()
  }

  /// Absolute module path for a resolution, relative specifiers being taken
  /// from the importer's directory (or the working directory for entry points)
  fn module_path(&self, args: &ResolveArgs) -> anyhow::Result<PathBuf> {
    let importer_dir = match args.kind {
      ResolveKind::EntryPoint => None,
      _ => args.importer.parent().filter(|dir| !dir.as_os_str().is_empty()),
    };

    let base = match importer_dir {
      Some(dir) => dir.to_path_buf(),
      None => self.file_system.cwd()?,
    };

    Ok(normalize_path(&base, Path::new(&args.path)))
  }

  async fn read_module(&self, path: &Path) -> anyhow::Result<String> {
    let file_system = self.file_system.clone();
    let owned_path = path.to_path_buf();

    tokio::task::spawn_blocking(move || file_system.read_to_string(&owned_path))
      .await?
      .with_context(|| format!("Failed to read {}", path.display()))
  }
}

#[async_trait]
impl BundlerPlugin for WarpCssPlugin {
  fn name(&self) -> &str {
    "warp-css"
  }

  fn setup(&self, options: &mut BuildOptions) {
    // On-disk outputs are only discoverable through the metafile
    options.metafile = true;
  }

  async fn on_start(&self) -> anyhow::Result<()> {
    self.context.lock().start();
    Ok(())
  }

  #[tracing::instrument(level = "debug", skip_all, fields(path = %args.path))]
  async fn on_resolve(&self, args: &ResolveArgs) -> anyhow::Result<()> {
    if !self.filter.is_match(&args.path) {
      return Ok(());
    }

    let path = self.module_path(args)?;
    let mut context = self.context.lock();

    let resolution = match args.kind {
      ResolveKind::EntryPoint => context.record_entry(path)?,
      _ => context.record_import(&args.importer, &path)?,
    };

    if resolution == Resolution::Linked(0) {
      tracing::trace!(
        importer = %args.importer.display(),
        "Importer is not part of any entry point graph"
      );
    }

    Ok(())
  }

  #[tracing::instrument(level = "debug", skip_all, fields(path = %args.path.display()))]
  async fn on_load(&self, args: &LoadArgs) -> anyhow::Result<Option<LoadResult>> {
    let path = args.path.as_path();
    if !self.filter.is_match(&path.to_string_lossy()) {
      return Ok(None);
    }

    let pending = PendingLoad::begin(&self.context)?;
    let contents = self.read_module(path).await?;
    let tagged = pending.record(path, contents)?;

    Ok(Some(LoadResult {
      contents: tagged.contents,
      loader: Loader::from_path(path),
    }))
  }

  #[tracing::instrument(level = "debug", skip_all)]
  async fn on_end(&self, result: &mut BuildResult) -> anyhow::Result<()> {
    let mut contents = self.context.lock().begin_aggregation()?;

    let generated = generate_styles(
      &mut contents,
      self.style_generator.as_ref(),
      self.options.minify,
    )
    .await?;

    let substitutor = Substitutor::new(&contents)?.with_base_dir(self.file_system.cwd()?);
    self.context.lock().begin_substitution()?;

    let rewritten = if substitutor.is_empty() {
      0
    } else if let Some(output_files) = result.output_files.as_mut() {
      substitutor.rewrite_output_files(output_files)
    } else if let Some(metafile) = &result.metafile {
      substitutor.rewrite_disk_outputs(
        &self.file_system,
        metafile
          .outputs
          .iter()
          .map(|(path, output)| (path.as_path(), output.entry_point.as_deref())),
      )?
    } else {
      tracing::warn!("Build result has neither output files nor a metafile");
      0
    };

    self.context.lock().finish()?;

    tracing::info!(
      graphs = contents.len(),
      tags = contents.iter().map(|graph| graph.tags.len()).sum::<usize>(),
      generated,
      rewritten,
      "Inlined scoped styles"
    );

    Ok(())
  }

  async fn on_dispose(&self) {
    self.context.lock().dispose();
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use warp_css_core::plugin::{Metafile, MetafileOutput, OutputFile};
  use warp_css_core::MockIdGenerator;
  use warp_css_core::MockStyleGenerator;
  use warp_css_core::DEFAULT_PLACEHOLDER;
  use warp_css_core::DEFAULT_TAG_LENGTH;
  use warp_css_core::DEFAULT_TAG_PREFIX;
  use warp_css_filesystem::in_memory_file_system::InMemoryFileSystem;
  use warp_css_filesystem::FileSystem;

  use super::*;

  const TAG: &str = "@css-placeholder-abc123";

  fn fixture_fs() -> Arc<InMemoryFileSystem> {
    let fs = InMemoryFileSystem::default();
    fs.set_current_working_directory(Path::new("/project"));
    fs.write_file(
      Path::new("/project/src/main.js"),
      "import './a.js';import './b.js';",
    );
    fs.write_file(
      Path::new("/project/src/a.js"),
      "const css = `@warp-css`;import './c.js';",
    );
    fs.write_file(Path::new("/project/src/b.js"), "B");
    fs.write_file(Path::new("/project/src/c.js"), "C");
    Arc::new(fs)
  }

  fn fixed_ids() -> Arc<dyn IdGenerator> {
    let mut id_generator = MockIdGenerator::new();
    id_generator
      .expect_generate()
      .returning(|_| String::from("abc123"));
    Arc::new(id_generator)
  }

  fn plugin(fs: Arc<InMemoryFileSystem>, generator: MockStyleGenerator) -> WarpCssPlugin {
    WarpCssPlugin::with_id_generator(
      WarpCssOptions::default(),
      fs,
      Arc::new(generator),
      fixed_ids(),
    )
    .unwrap()
  }

  fn entry(path: &str) -> ResolveArgs {
    ResolveArgs {
      path: path.into(),
      importer: PathBuf::new(),
      kind: ResolveKind::EntryPoint,
    }
  }

  fn import(path: &str, importer: &str) -> ResolveArgs {
    ResolveArgs {
      path: path.into(),
      importer: importer.into(),
      kind: ResolveKind::ImportStatement,
    }
  }

  fn load(path: &str) -> LoadArgs {
    LoadArgs { path: path.into() }
  }

  async fn collect_fixture(plugin: &WarpCssPlugin) {
    plugin.on_start().await.unwrap();
    plugin.on_resolve(&entry("src/main.js")).await.unwrap();
    plugin
      .on_resolve(&import("./a.js", "/project/src/main.js"))
      .await
      .unwrap();
    plugin
      .on_resolve(&import("./b.js", "/project/src/main.js"))
      .await
      .unwrap();
    plugin
      .on_resolve(&import("./c.js", "/project/src/a.js"))
      .await
      .unwrap();
    for path in [
      "/project/src/main.js",
      "/project/src/a.js",
      "/project/src/b.js",
      "/project/src/c.js",
    ] {
      plugin.on_load(&load(path)).await.unwrap();
    }
  }

  #[test]
  fn setup_enables_the_metafile() {
    let plugin = plugin(fixture_fs(), MockStyleGenerator::new());
    let mut options = BuildOptions::default();

    plugin.setup(&mut options);

    assert!(options.metafile);
  }

  #[test]
  fn rejects_invalid_options() {
    let result = WarpCssPlugin::new(
      WarpCssOptions {
        filter: String::from("["),
        ..WarpCssOptions::default()
      },
      fixture_fs(),
      Arc::new(MockStyleGenerator::new()),
    );

    assert!(matches!(result, Err(WarpCssError::InvalidOptions(_))));
  }

  #[test]
  fn rejects_unparseable_browserslist_queries() {
    let result = WarpCssPlugin::new(
      WarpCssOptions {
        browserslist: String::from("this is (not a query"),
        ..WarpCssOptions::default()
      },
      fixture_fs(),
      Arc::new(MockStyleGenerator::new()),
    );

    assert!(matches!(result, Err(WarpCssError::InvalidOptions(_))));
  }

  fn load_context() -> Mutex<BuildContext> {
    let mut context = BuildContext::new(PlaceholderTagger::new(
      DEFAULT_PLACEHOLDER,
      DEFAULT_TAG_PREFIX,
      DEFAULT_TAG_LENGTH,
      fixed_ids(),
    ));
    context.start();
    context.record_entry(PathBuf::from("/project/src/main.js")).unwrap();
    Mutex::new(context)
  }

  #[test]
  fn pending_load_is_counted_until_its_content_is_recorded() {
    let context = load_context();
    let main = Path::new("/project/src/main.js");

    let pending = PendingLoad::begin(&context).unwrap();
    assert_eq!(context.lock().pending_loads(), 1);
    assert!(matches!(
      context.lock().begin_aggregation(),
      Err(WarpCssError::LoadsOutstanding(1))
    ));

    let tagged = pending.record(main, String::from("M@warp-css")).unwrap();

    assert_eq!(tagged.contents, format!("M{TAG}"));
    assert_eq!(context.lock().pending_loads(), 0);
    let contents = context.lock().begin_aggregation().unwrap();
    assert_eq!(contents[0].tags[0].code, format!("M{TAG}"));
  }

  #[test]
  fn dropped_pending_load_settles_without_recording() {
    let context = load_context();

    let pending = PendingLoad::begin(&context).unwrap();
    drop(pending);

    assert_eq!(context.lock().pending_loads(), 0);
    assert_eq!(context.lock().begin_aggregation().unwrap(), Vec::new());
  }

  #[tokio::test]
  async fn generated_styles_are_printed_per_the_minify_option() {
    let mut generator = MockStyleGenerator::new();
    generator
      .expect_generate()
      .withf(|_, minify| !*minify)
      .times(1)
      .returning(|_, _| Ok(String::from(".a{color:red}")));
    let plugin = WarpCssPlugin::with_id_generator(
      WarpCssOptions {
        minify: false,
        ..WarpCssOptions::default()
      },
      fixture_fs(),
      Arc::new(generator),
      fixed_ids(),
    )
    .unwrap();
    collect_fixture(&plugin).await;

    let mut result = BuildResult {
      output_files: Some(vec![OutputFile {
        path: "/project/dist/main.js".into(),
        contents: format!("x=`{TAG}`").into_bytes(),
        entry_point: None,
      }]),
      metafile: None,
    };
    plugin.on_end(&mut result).await.unwrap();

    let output = String::from_utf8(result.output_files.unwrap()[0].contents.clone()).unwrap();
    assert_eq!(output, "x=`.a {\n  color: red;\n}\n`");
  }

  #[tokio::test]
  async fn minified_output_is_the_default() {
    let mut generator = MockStyleGenerator::new();
    generator
      .expect_generate()
      .returning(|_, _| Ok(String::from(".a {\n  color: red;\n}\n")));
    let plugin = plugin(fixture_fs(), generator);
    collect_fixture(&plugin).await;

    let mut result = BuildResult {
      output_files: Some(vec![OutputFile {
        path: "/project/dist/main.js".into(),
        contents: format!("x=`{TAG}`").into_bytes(),
        entry_point: None,
      }]),
      metafile: None,
    };
    plugin.on_end(&mut result).await.unwrap();

    let output = String::from_utf8(result.output_files.unwrap()[0].contents.clone()).unwrap();
    assert_eq!(output, "x=`.a{color:red}`");
  }

  #[tokio::test]
  async fn resolves_specifiers_against_the_importer() {
    let plugin = plugin(fixture_fs(), MockStyleGenerator::new());
    plugin.on_resolve(&entry("./src/main.js")).await.unwrap();
    plugin
      .on_resolve(&import("../lib/d.js", "/project/src/main.js"))
      .await
      .unwrap();

    assert!(plugin.is_tracked(Path::new("/project/src/main.js")));
    assert!(plugin.is_tracked(Path::new("/project/lib/d.js")));
  }

  #[tokio::test]
  async fn load_tags_the_marker_and_infers_the_loader() {
    let plugin = plugin(fixture_fs(), MockStyleGenerator::new());
    plugin.on_resolve(&entry("src/main.js")).await.unwrap();
    plugin
      .on_resolve(&import("./a.js", "/project/src/main.js"))
      .await
      .unwrap();

    let result = plugin.on_load(&load("/project/src/a.js")).await.unwrap();

    assert_eq!(
      result,
      Some(LoadResult {
        contents: format!("const css = `{TAG}`;import './c.js';"),
        loader: Loader::Js,
      })
    );
  }

  #[tokio::test]
  async fn filtered_modules_are_left_to_the_bundler() {
    let plugin = WarpCssPlugin::with_id_generator(
      WarpCssOptions {
        filter: String::from(r"\.ts$"),
        ..WarpCssOptions::default()
      },
      fixture_fs(),
      Arc::new(MockStyleGenerator::new()),
      fixed_ids(),
    )
    .unwrap();

    plugin.on_resolve(&entry("src/main.js")).await.unwrap();
    let result = plugin.on_load(&load("/project/src/main.js")).await.unwrap();

    assert_eq!(result, None);
    assert!(!plugin.is_tracked(Path::new("/project/src/main.js")));
  }

  #[tokio::test]
  async fn failed_reads_settle_the_pending_load() {
    let plugin = plugin(fixture_fs(), MockStyleGenerator::new());
    plugin.on_resolve(&entry("src/main.js")).await.unwrap();

    let result = plugin.on_load(&load("/project/src/missing.js")).await;

    assert!(result.is_err());
    assert!(plugin.on_end(&mut BuildResult::default()).await.is_ok());
  }

  #[tokio::test]
  async fn end_substitutes_in_memory_outputs() {
    let mut generator = MockStyleGenerator::new();
    generator
      .expect_generate()
      .withf(|code, minify| {
        code == format!("const css = `{TAG}`;import './c.js';C") && *minify
      })
      .times(1)
      .returning(|_, _| Ok(String::from(".a{color:red}")));
    let plugin = plugin(fixture_fs(), generator);
    collect_fixture(&plugin).await;

    let mut result = BuildResult {
      output_files: Some(vec![OutputFile {
        path: "/project/dist/main.js".into(),
        contents: format!("M;const css = `{TAG}`;C;B").into_bytes(),
        entry_point: None,
      }]),
      metafile: None,
    };
    plugin.on_end(&mut result).await.unwrap();

    let output = String::from_utf8(result.output_files.unwrap()[0].contents.clone()).unwrap();
    assert_eq!(output, "M;const css = `.a{color:red}`;C;B");
    assert_eq!(plugin.phase(), BuildPhase::Finished);
  }

  #[tokio::test]
  async fn end_rewrites_metafile_outputs_on_disk() {
    let fs = fixture_fs();
    fs.write_file(Path::new("/project/dist/main.js"), format!("x=`{TAG}`"));
    let mut generator = MockStyleGenerator::new();
    generator
      .expect_generate()
      .times(1)
      .returning(|_, _| Ok(String::from(".a{color:red}")));
    let plugin = plugin(fs.clone(), generator);
    collect_fixture(&plugin).await;

    let mut result = BuildResult {
      output_files: None,
      metafile: Some(Metafile {
        outputs: [(
          PathBuf::from("/project/dist/main.js"),
          MetafileOutput {
            entry_point: Some("/project/src/main.js".into()),
          },
        )]
        .into_iter()
        .collect(),
      }),
    };
    plugin.on_end(&mut result).await.unwrap();

    assert_eq!(
      fs.read_to_string(Path::new("/project/dist/main.js")).unwrap(),
      "x=`.a{color:red}`"
    );
  }

  #[tokio::test]
  async fn generation_failures_fail_the_build() {
    let mut generator = MockStyleGenerator::new();
    generator
      .expect_generate()
      .returning(|_, _| Err(anyhow::anyhow!("bad input")));
    let plugin = plugin(fixture_fs(), generator);
    collect_fixture(&plugin).await;

    let error = plugin
      .on_end(&mut BuildResult::default())
      .await
      .unwrap_err();

    assert!(matches!(
      error.downcast_ref::<WarpCssError>(),
      Some(WarpCssError::Generation { .. })
    ));
  }

  #[tokio::test]
  async fn dispose_releases_all_graphs() {
    let plugin = plugin(fixture_fs(), MockStyleGenerator::new());
    collect_fixture(&plugin).await;
    assert!(plugin.is_tracked(Path::new("/project/src/c.js")));

    plugin.on_dispose().await;

    assert!(!plugin.is_tracked(Path::new("/project/src/c.js")));
    assert_eq!(plugin.phase(), BuildPhase::Disposed);
  }

  #[tokio::test]
  async fn start_begins_a_fresh_run_after_dispose() {
    let plugin = plugin(fixture_fs(), MockStyleGenerator::new());
    collect_fixture(&plugin).await;
    plugin.on_dispose().await;

    plugin.on_start().await.unwrap();
    plugin.on_resolve(&entry("src/b.js")).await.unwrap();

    assert!(plugin.is_tracked(Path::new("/project/src/b.js")));
    assert!(!plugin.is_tracked(Path::new("/project/src/main.js")));
  }
}
