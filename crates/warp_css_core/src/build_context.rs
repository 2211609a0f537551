use std::path::Path;
use std::path::PathBuf;

use crate::aggregator::aggregate;
use crate::graph_registry::GraphRegistry;
use crate::graph_registry::GraphTagContents;
use crate::tagger::PlaceholderTagger;
use crate::tagger::TaggedModule;
use crate::WarpCssError;

/// Lifecycle of one bundling run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BuildPhase {
  #[default]
  Idle,
  /// Resolution and load events are being recorded, possibly interleaved
  Collecting,
  Aggregating,
  Substituting,
  Finished,
  Disposed,
}

/// How a resolution event was recorded
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
  /// A new graph was started for an entry point
  Entry(PathBuf),
  /// The import edge was recorded in this many graphs
  Linked(usize),
}

/// Mutable state of one bundling run, owned by the plugin driving it.
#[derive(Debug)]
pub struct BuildContext {
  phase: BuildPhase,
  registry: GraphRegistry,
  tagger: PlaceholderTagger,
  pending_loads: usize,
}

impl BuildContext {
  pub fn new(tagger: PlaceholderTagger) -> Self {
    BuildContext {
      phase: BuildPhase::Idle,
      registry: GraphRegistry::new(),
      tagger,
      pending_loads: 0,
    }
  }

  pub fn phase(&self) -> BuildPhase {
    self.phase
  }

  pub fn registry(&self) -> &GraphRegistry {
    &self.registry
  }

  pub fn pending_loads(&self) -> usize {
    self.pending_loads
  }

  /// Empties all state left by a previous run and starts collecting
  pub fn start(&mut self) {
    self.registry.clear();
    self.tagger.reset();
    self.pending_loads = 0;
    self.phase = BuildPhase::Collecting;
  }

  pub fn record_entry(&mut self, path: PathBuf) -> Result<Resolution, WarpCssError> {
    self.ensure_collecting("record a resolution")?;
    self.registry.add_entry(path.clone());
    Ok(Resolution::Entry(path))
  }

  pub fn record_import(&mut self, importer: &Path, path: &Path) -> Result<Resolution, WarpCssError> {
    self.ensure_collecting("record a resolution")?;
    Ok(Resolution::Linked(self.registry.link(importer, path)))
  }

  /// Marks a module load as in flight
  pub fn begin_load(&mut self) -> Result<(), WarpCssError> {
    self.ensure_collecting("load a module")?;
    self.pending_loads += 1;
    Ok(())
  }

  /// Marks an in-flight load as settled, whether or not it succeeded
  pub fn end_load(&mut self) {
    self.pending_loads = self.pending_loads.saturating_sub(1);
  }

  /// Tags and records the content of a loaded module
  pub fn record_load(&mut self, path: &Path, contents: String) -> Result<TaggedModule, WarpCssError> {
    self.ensure_collecting("record a load")?;
    Ok(self.tagger.tag_module(&mut self.registry, path, contents))
  }

  /// Moves to aggregation and returns the tag contents of every graph.
  ///
  /// Rejected while any load is still in flight.
  pub fn begin_aggregation(&mut self) -> Result<Vec<GraphTagContents>, WarpCssError> {
    if !matches!(self.phase, BuildPhase::Idle | BuildPhase::Collecting) {
      return Err(WarpCssError::InvalidPhase {
        operation: "aggregate styles",
        phase: self.phase,
      });
    }

    if self.pending_loads > 0 {
      return Err(WarpCssError::LoadsOutstanding(self.pending_loads));
    }

    self.phase = BuildPhase::Aggregating;
    Ok(aggregate(&self.registry))
  }

  pub fn begin_substitution(&mut self) -> Result<(), WarpCssError> {
    self.transition(BuildPhase::Aggregating, BuildPhase::Substituting, "substitute styles")
  }

  pub fn finish(&mut self) -> Result<(), WarpCssError> {
    self.transition(BuildPhase::Substituting, BuildPhase::Finished, "finish the build")
  }

  /// Releases every graph. Valid from any phase, including aborted runs.
  pub fn dispose(&mut self) {
    self.registry.clear();
    self.tagger.reset();
    self.pending_loads = 0;
    self.phase = BuildPhase::Disposed;
  }

  fn ensure_collecting(&mut self, operation: &'static str) -> Result<(), WarpCssError> {
    match self.phase {
      BuildPhase::Collecting => Ok(()),
      // Bundlers without a start hook go straight to resolution
      BuildPhase::Idle => {
        self.phase = BuildPhase::Collecting;
        Ok(())
      }
      phase => Err(WarpCssError::InvalidPhase { operation, phase }),
    }
  }

  fn transition(
    &mut self,
    from: BuildPhase,
    to: BuildPhase,
    operation: &'static str,
  ) -> Result<(), WarpCssError> {
    if self.phase != from {
      return Err(WarpCssError::InvalidPhase {
        operation,
        phase: self.phase,
      });
    }
    self.phase = to;
    Ok(())
  }
}
