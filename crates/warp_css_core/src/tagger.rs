use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::graph_registry::GraphRegistry;

pub const DEFAULT_PLACEHOLDER: &str = "@warp-css";
pub const DEFAULT_TAG_PREFIX: &str = "@css-placeholder-";
pub const DEFAULT_TAG_LENGTH: usize = 6;

/// Number of fresh identifiers requested before falling back to a counter suffix
const MAX_GENERATE_ATTEMPTS: usize = 8;

/// Produces random identifiers used to build placeholder tags
#[mockall::automock]
pub trait IdGenerator: std::fmt::Debug + Send + Sync {
  fn generate(&self, length: usize) -> String;
}

/// Alphanumeric identifiers from the thread-local RNG
#[derive(Debug, Default)]
pub struct NanoIdGenerator;

impl IdGenerator for NanoIdGenerator {
  fn generate(&self, length: usize) -> String {
    rand::thread_rng()
      .sample_iter(&Alphanumeric)
      .take(length)
      .map(char::from)
      .collect()
  }
}

/// Result of tagging a loaded module
#[derive(Debug, PartialEq)]
pub struct TaggedModule {
  /// Module source with the first marker replaced by `tag`
  pub contents: String,
  pub tag: Option<String>,
}

/// Replaces the placeholder marker in loaded modules with tags that are
/// unique within the current run.
#[derive(Debug)]
pub struct PlaceholderTagger {
  marker: String,
  prefix: String,
  length: usize,
  id_generator: Arc<dyn IdGenerator>,
  issued: HashSet<String>,
}

impl PlaceholderTagger {
  pub fn new(
    marker: impl Into<String>,
    prefix: impl Into<String>,
    length: usize,
    id_generator: Arc<dyn IdGenerator>,
  ) -> Self {
    PlaceholderTagger {
      marker: marker.into(),
      prefix: prefix.into(),
      length,
      id_generator,
      issued: HashSet::new(),
    }
  }

  pub fn marker(&self) -> &str {
    &self.marker
  }

  pub fn issued(&self) -> &HashSet<String> {
    &self.issued
  }

  /// Forgets the tags issued in a previous run
  pub fn reset(&mut self) {
    self.issued.clear();
  }

  /// Tags the module's content and records it in every graph containing `path`.
  ///
  /// Only the first occurrence of the marker is replaced.
  pub fn tag_module(
    &mut self,
    registry: &mut GraphRegistry,
    path: &Path,
    contents: String,
  ) -> TaggedModule {
    let (contents, tag) = if contents.contains(&self.marker) {
      let tag = self.fresh_tag();
      let graphs = registry.tag(path, &tag);
      tracing::debug!(path = %path.display(), tag = %tag, graphs, "Tagged style placeholder");
      (contents.replacen(&self.marker, &tag, 1), Some(tag))
    } else {
      (contents, None)
    };

    registry.set_content(path, &contents);

    TaggedModule { contents, tag }
  }

  fn fresh_tag(&mut self) -> String {
    let mut tag = String::new();

    for _ in 0..MAX_GENERATE_ATTEMPTS {
      tag = format!("{}{}", self.prefix, self.id_generator.generate(self.length));
      if self.is_available(&tag) {
        self.issued.insert(tag.clone());
        return tag;
      }
    }

    let base = tag;
    let mut suffix = self.issued.len();
    loop {
      let tag = format!("{base}{suffix}");
      if self.is_available(&tag) {
        self.issued.insert(tag.clone());
        return tag;
      }
      suffix += 1;
    }
  }

  fn is_available(&self, tag: &str) -> bool {
    !self.issued.contains(tag)
  }
}
