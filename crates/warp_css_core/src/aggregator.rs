use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::graph_registry::GraphRegistry;
use crate::graph_registry::GraphTagContents;
use crate::WarpCssError;

/// Turns the aggregated source of a tagged module into style text
///
/// Implementations are opaque to this crate; they are called at most once
/// per distinct tag and aggregated code within a run.
#[mockall::automock]
#[async_trait]
pub trait StyleGenerator: Debug + Send + Sync {
  async fn generate(&self, code: &str, minify: bool) -> anyhow::Result<String>;
}

#[async_trait]
impl<G: StyleGenerator + ?Sized> StyleGenerator for Arc<G> {
  async fn generate(&self, code: &str, minify: bool) -> anyhow::Result<String> {
    (**self).generate(code, minify).await
  }
}

/// Collects the tag contents of every graph in the registry
pub fn aggregate(registry: &GraphRegistry) -> Vec<GraphTagContents> {
  registry.tag_contents()
}

/// Fills in the generated style text of every record.
///
/// Records sharing both tag and code (a shared module reached with the same
/// subtree from several entry points) reuse one generation. The first
/// failure aborts and is returned. Returns the number of generator calls.
#[tracing::instrument(level = "debug", skip_all)]
pub async fn generate_styles(
  contents: &mut [GraphTagContents],
  generator: &dyn StyleGenerator,
  minify: bool,
) -> Result<usize, WarpCssError> {
  let mut generated: HashMap<(String, String), String> = HashMap::new();

  for record in contents.iter_mut().flat_map(|graph| graph.tags.iter_mut()) {
    let key = (record.tag.clone(), record.code.clone());

    let css = match generated.get(&key) {
      Some(css) => css.clone(),
      None => {
        let css = generator
          .generate(&record.code, minify)
          .await
          .map_err(|source| WarpCssError::Generation {
            tag: record.tag.clone(),
            source,
          })?;
        generated.insert(key, css.clone());
        css
      }
    };

    record.css = Some(css);
  }

  Ok(generated.len())
}
