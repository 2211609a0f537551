use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use aho_corasick::AhoCorasick;
use aho_corasick::MatchKind;
use indexmap::IndexMap;
use warp_css_filesystem::normalize_path;
use warp_css_filesystem::FileSystemRef;

use crate::error::ArtifactFailure;
use crate::graph_registry::GraphTagContents;
use crate::plugin::OutputFile;
use crate::WarpCssError;

#[derive(Debug)]
struct Replacer {
  automaton: AhoCorasick,
  replacements: Vec<String>,
}

impl Replacer {
  /// Builds a replacer from `(tag, css)` pairs; the first pair wins for duplicate tags.
  fn new<'a>(
    pairs: impl Iterator<Item = (&'a str, &'a str)>,
  ) -> Result<Option<Self>, WarpCssError> {
    let mut table: IndexMap<&str, &str> = IndexMap::new();
    for (tag, css) in pairs {
      table.entry(tag).or_insert(css);
    }

    if table.is_empty() {
      return Ok(None);
    }

    // Counter-suffixed tags may extend another tag, so the longest match must win
    let automaton = AhoCorasick::builder()
      .match_kind(MatchKind::LeftmostLongest)
      .build(table.keys())?;

    Ok(Some(Replacer {
      automaton,
      replacements: table.values().map(|css| css.to_string()).collect(),
    }))
  }

  fn replace_all(&self, input: &[u8]) -> Vec<u8> {
    self.automaton.replace_all_bytes(input, &self.replacements)
  }
}

/// Replaces every tag occurrence in output artifacts with its generated styles.
///
/// When a tag holds different styles in different graphs, an artifact built
/// from a known entry point uses that entry point's graph; otherwise the first
/// graph in registry order wins. Relative entry points are resolved against
/// the base directory set with [`Substitutor::with_base_dir`].
#[derive(Debug)]
pub struct Substitutor {
  default: Option<Replacer>,
  by_entry_point: HashMap<PathBuf, Replacer>,
  base_dir: Option<PathBuf>,
}

impl Substitutor {
  pub fn new(contents: &[GraphTagContents]) -> Result<Self, WarpCssError> {
    let mut pairs = Vec::new();
    for graph in contents {
      for record in &graph.tags {
        let css = record
          .css
          .as_deref()
          .ok_or_else(|| WarpCssError::MissingStyle(record.tag.clone()))?;
        pairs.push((graph.entry_point.as_path(), record.tag.as_str(), css));
      }
    }

    let default = Replacer::new(pairs.iter().map(|(_, tag, css)| (*tag, *css)))?;

    let mut by_entry_point = HashMap::new();
    for graph in contents {
      let entry_point = graph.entry_point.as_path();
      if by_entry_point.contains_key(entry_point) {
        continue;
      }

      let own = pairs.iter().filter(|(entry, ..)| *entry == entry_point);
      let others = pairs.iter().filter(|(entry, ..)| *entry != entry_point);
      if let Some(replacer) = Replacer::new(own.chain(others).map(|(_, tag, css)| (*tag, *css)))? {
        by_entry_point.insert(entry_point.to_path_buf(), replacer);
      }
    }

    Ok(Substitutor {
      default,
      by_entry_point,
      base_dir: None,
    })
  }

  /// Directory that relative artifact entry points are reported from
  pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
    self.base_dir = Some(base_dir.into());
    self
  }

  pub fn is_empty(&self) -> bool {
    self.default.is_none()
  }

  /// Returns `input` with every tag replaced
  pub fn replace_all(&self, input: &[u8], entry_point: Option<&Path>) -> Vec<u8> {
    let replacer = entry_point
      .and_then(|entry_point| match &self.base_dir {
        Some(base_dir) => self
          .by_entry_point
          .get(&normalize_path(base_dir, entry_point)),
        None => self.by_entry_point.get(entry_point),
      })
      .or(self.default.as_ref());

    match replacer {
      Some(replacer) => replacer.replace_all(input),
      None => input.to_vec(),
    }
  }

  /// Rewrites in-memory outputs in place, returning how many changed
  pub fn rewrite_output_files(&self, files: &mut [OutputFile]) -> usize {
    let mut changed = 0;

    for file in files.iter_mut() {
      let contents = self.replace_all(&file.contents, file.entry_point.as_deref());
      if contents != file.contents {
        file.contents = contents;
        changed += 1;
      }
    }

    changed
  }

  /// Reads, rewrites and writes back outputs on disk.
  ///
  /// Every artifact is attempted; failures are collected and reported together.
  pub fn rewrite_disk_outputs<'a>(
    &self,
    file_system: &FileSystemRef,
    outputs: impl IntoIterator<Item = (&'a Path, Option<&'a Path>)>,
  ) -> Result<usize, WarpCssError> {
    let mut written = 0;
    let mut failures = Vec::new();

    for (path, entry_point) in outputs {
      let result = file_system.read(path).and_then(|contents| {
        let contents = self.replace_all(&contents, entry_point);
        file_system.write(path, &contents)
      });

      match result {
        Ok(()) => written += 1,
        Err(error) => {
          tracing::error!(path = %path.display(), %error, "Failed to rewrite output");
          failures.push(ArtifactFailure {
            path: path.to_path_buf(),
            error,
          });
        }
      }
    }

    if failures.is_empty() {
      Ok(written)
    } else {
      Err(WarpCssError::ArtifactRewrite { failures })
    }
  }
}
