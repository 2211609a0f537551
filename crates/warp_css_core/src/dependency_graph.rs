use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;

/// Position of a module inside a single `DependencyGraph`.
pub type NodeIndex = usize;

/// A module discovered while resolving one entry point.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleNode {
  pub path: PathBuf,
  /// Raw source text, absent until the module has been loaded
  pub content: Option<String>,
  /// Unique tag that replaced the placeholder marker in this module's source
  pub tag: Option<String>,
  children: Vec<NodeIndex>,
  parent: Option<NodeIndex>,
}

impl ModuleNode {
  fn new(path: PathBuf, parent: Option<NodeIndex>) -> Self {
    ModuleNode {
      path,
      content: None,
      tag: None,
      children: Vec::new(),
      parent,
    }
  }

  /// Imported modules, in the order their resolution was first observed
  pub fn children(&self) -> &[NodeIndex] {
    &self.children
  }

  /// The module that first imported this one, `None` for the entry point
  pub fn parent(&self) -> Option<NodeIndex> {
    self.parent
  }
}

/// Aggregated source for one tagged module.
#[derive(Clone, Debug, PartialEq)]
pub struct TagContent {
  pub tag: String,
  /// Content of the tagged module followed by the content of all its descendants
  pub code: String,
  /// Generated style text, filled in after aggregation
  pub css: Option<String>,
}

/// Import tree for a single bundling entry point.
///
/// Nodes live in an arena keyed by module path, so every path maps to exactly
/// one node per graph and parent/child links are arena indices. The entry
/// point is always at index 0.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
  nodes: IndexMap<PathBuf, ModuleNode>,
}

impl DependencyGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Inserts a module into the graph.
  ///
  /// Without a parent `path` becomes the root. Setting the current root again
  /// keeps every node; a different root replaces the whole tree, since the
  /// previous nodes would no longer be reachable from it. With a parent
  /// the module is appended to the parent's children. Inserting the same
  /// `(path, parent)` pair twice does not duplicate the edge, and importing an
  /// existing module from another parent adds an extra edge while keeping the
  /// original parent link.
  ///
  /// Returns `false` without changing anything when the parent is not part of
  /// this graph.
  pub fn set(&mut self, path: impl Into<PathBuf>, parent: Option<&Path>) -> bool {
    let path = path.into();

    let Some(parent) = parent else {
      if self.root().is_some_and(|root| root.path == path) {
        return true;
      }
      self.nodes.clear();
      self.nodes.insert(path.clone(), ModuleNode::new(path, None));
      return true;
    };

    let Some(parent_index) = self.nodes.get_index_of(parent) else {
      return false;
    };

    let child_index = match self.nodes.get_index_of(&path) {
      Some(index) => index,
      None => {
        tracing::trace!(path = %path.display(), parent = %parent.display(), "Added module to graph");
        let (index, _) = self
          .nodes
          .insert_full(path.clone(), ModuleNode::new(path, Some(parent_index)));
        index
      }
    };

    // Self imports carry no new content
    if child_index == parent_index {
      return true;
    }

    let children = &mut self.nodes[parent_index].children;
    if !children.contains(&child_index) {
      children.push(child_index);
    }

    true
  }

  pub fn has(&self, path: &Path) -> bool {
    self.nodes.contains_key(path)
  }

  pub fn get(&self, path: &Path) -> Option<&ModuleNode> {
    self.nodes.get(path)
  }

  pub fn node(&self, index: NodeIndex) -> Option<&ModuleNode> {
    self.nodes.get_index(index).map(|(_, node)| node)
  }

  pub fn root(&self) -> Option<&ModuleNode> {
    self.node(0)
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn nodes(&self) -> impl Iterator<Item = &ModuleNode> {
    self.nodes.values()
  }

  /// Assigns the placeholder tag of a module, replacing any previous tag.
  pub fn tag(&mut self, path: &Path, tag: impl Into<String>) -> bool {
    match self.nodes.get_mut(path) {
      Some(node) => {
        node.tag = Some(tag.into());
        true
      }
      None => false,
    }
  }

  pub fn set_content(&mut self, path: &Path, content: impl Into<String>) -> bool {
    match self.nodes.get_mut(path) {
      Some(node) => {
        node.content = Some(content.into());
        true
      }
      None => false,
    }
  }

  /// Builds one record per tagged module, in module insertion order.
  ///
  /// Each record holds the tagged module's content followed by the content of
  /// every module below it, visited depth-first in child insertion order.
  /// Modules reachable through more than one path are included once, and
  /// modules that were never loaded contribute nothing.
  pub fn get_content_from_tags(&self) -> Vec<TagContent> {
    self
      .nodes
      .values()
      .enumerate()
      .filter_map(|(index, node)| {
        node.tag.as_ref().map(|tag| TagContent {
          tag: tag.clone(),
          code: self.subtree_content(index),
          css: None,
        })
      })
      .collect()
  }

  fn subtree_content(&self, start: NodeIndex) -> String {
    let mut code = String::new();
    let mut visited = vec![false; self.nodes.len()];
    let mut stack = vec![start];

    while let Some(index) = stack.pop() {
      if visited[index] {
        continue;
      }
      visited[index] = true;

      let node = &self.nodes[index];
      if let Some(content) = &node.content {
        code.push_str(content);
      }

      stack.extend(node.children.iter().rev().filter(|child| !visited[**child]));
    }

    code
  }

  pub fn clear(&mut self) {
    self.nodes.clear();
  }
}
