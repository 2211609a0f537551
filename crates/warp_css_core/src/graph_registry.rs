use std::path::Path;
use std::path::PathBuf;

use crate::dependency_graph::DependencyGraph;
use crate::dependency_graph::TagContent;

/// Identifies a graph within the registry of the current run
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct GraphId(usize);

impl GraphId {
  pub fn index(&self) -> usize {
    self.0
  }
}

/// Tagged content of one entry point's graph
#[derive(Clone, Debug, PartialEq)]
pub struct GraphTagContents {
  pub graph: GraphId,
  pub entry_point: PathBuf,
  pub tags: Vec<TagContent>,
}

/// All dependency graphs of a bundling run, one per entry point, in the
/// order the entry points were resolved.
///
/// A module shared by several entry points has an independent node in each
/// graph that reaches it.
#[derive(Debug, Default)]
pub struct GraphRegistry {
  graphs: Vec<DependencyGraph>,
}

impl GraphRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Starts a new graph rooted at an entry point
  pub fn add_entry(&mut self, path: impl Into<PathBuf>) -> GraphId {
    let mut graph = DependencyGraph::new();
    graph.set(path, None);
    self.graphs.push(graph);
    GraphId(self.graphs.len() - 1)
  }

  /// Records `path` as imported by `importer` in every graph containing the
  /// importer. Returns the number of graphs that recorded the edge.
  pub fn link(&mut self, importer: &Path, path: &Path) -> usize {
    self
      .graphs
      .iter_mut()
      .filter(|graph| graph.has(importer))
      .map(|graph| graph.set(path, Some(importer)))
      .filter(|linked| *linked)
      .count()
  }

  /// Tags the module in every graph containing it, returning the number of graphs tagged
  pub fn tag(&mut self, path: &Path, tag: &str) -> usize {
    self
      .graphs
      .iter_mut()
      .map(|graph| graph.tag(path, tag))
      .filter(|tagged| *tagged)
      .count()
  }

  pub fn set_content(&mut self, path: &Path, content: &str) -> usize {
    self
      .graphs
      .iter_mut()
      .map(|graph| graph.set_content(path, content))
      .filter(|updated| *updated)
      .count()
  }

  pub fn graphs_containing<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = GraphId> + 'a {
    self
      .iter()
      .filter(move |(_, graph)| graph.has(path))
      .map(|(id, _)| id)
  }

  pub fn graph(&self, id: GraphId) -> Option<&DependencyGraph> {
    self.graphs.get(id.0)
  }

  pub fn iter(&self) -> impl Iterator<Item = (GraphId, &DependencyGraph)> {
    self
      .graphs
      .iter()
      .enumerate()
      .map(|(index, graph)| (GraphId(index), graph))
  }

  pub fn len(&self) -> usize {
    self.graphs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.graphs.is_empty()
  }

  /// Collects the tagged content of every graph, skipping graphs without tags.
  pub fn tag_contents(&self) -> Vec<GraphTagContents> {
    self
      .iter()
      .filter_map(|(id, graph)| {
        let root = graph.root()?;
        let tags = graph.get_content_from_tags();
        (!tags.is_empty()).then(|| GraphTagContents {
          graph: id,
          entry_point: root.path.clone(),
          tags,
        })
      })
      .collect()
  }

  /// Releases every graph
  pub fn clear(&mut self) {
    for graph in self.graphs.iter_mut() {
      graph.clear();
    }
    self.graphs.clear();
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn path(name: &str) -> PathBuf {
    PathBuf::from(format!("/project/src/{name}"))
  }

  /// Two entry points sharing `shared.js`, which imports `leaf.js`
  fn shared_registry() -> GraphRegistry {
    let mut registry = GraphRegistry::new();
    registry.add_entry(path("e1.js"));
    registry.add_entry(path("e2.js"));
    registry.link(&path("e1.js"), &path("only1.js"));
    registry.link(&path("e1.js"), &path("shared.js"));
    registry.link(&path("e2.js"), &path("shared.js"));
    registry.link(&path("shared.js"), &path("leaf.js"));

    for (name, content) in [
      ("e1.js", "E1"),
      ("e2.js", "E2"),
      ("only1.js", "O"),
      ("shared.js", "S"),
      ("leaf.js", "L"),
    ] {
      registry.set_content(&path(name), content);
    }

    registry
  }

  #[test]
  fn link_records_the_edge_in_every_graph_containing_the_importer() {
    let registry = shared_registry();

    assert_eq!(
      registry.graphs_containing(&path("leaf.js")).collect::<Vec<_>>(),
      vec![GraphId(0), GraphId(1)]
    );
    assert_eq!(
      registry.graphs_containing(&path("only1.js")).collect::<Vec<_>>(),
      vec![GraphId(0)]
    );
  }

  #[test]
  fn link_with_unknown_importer_touches_no_graph() {
    let mut registry = shared_registry();

    assert_eq!(registry.link(&path("unknown.js"), &path("x.js")), 0);
    assert_eq!(registry.graphs_containing(&path("x.js")).count(), 0);
  }

  #[test]
  fn shared_tagged_module_yields_one_scoped_record_per_graph() {
    let mut registry = shared_registry();

    assert_eq!(registry.tag(&path("shared.js"), "T"), 2);

    assert_eq!(
      registry.tag_contents(),
      vec![
        GraphTagContents {
          graph: GraphId(0),
          entry_point: path("e1.js"),
          tags: vec![TagContent {
            tag: "T".into(),
            code: "SL".into(),
            css: None
          }],
        },
        GraphTagContents {
          graph: GraphId(1),
          entry_point: path("e2.js"),
          tags: vec![TagContent {
            tag: "T".into(),
            code: "SL".into(),
            css: None
          }],
        },
      ]
    );
  }

  #[test]
  fn tagging_an_entry_does_not_leak_into_other_graphs() {
    let mut registry = shared_registry();

    assert_eq!(registry.tag(&path("e2.js"), "T"), 1);

    let contents = registry.tag_contents();
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0].entry_point, path("e2.js"));
    assert_eq!(contents[0].tags[0].code, "E2SL");
  }

  #[test]
  fn clear_releases_all_graphs() {
    let mut registry = shared_registry();
    registry.tag(&path("shared.js"), "T");

    registry.clear();

    assert!(registry.is_empty());
    assert_eq!(registry.graphs_containing(&path("shared.js")).count(), 0);
    assert_eq!(registry.tag_contents(), Vec::new());
  }
}
