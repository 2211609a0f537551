use std::fmt::Display;
use std::fmt::Formatter;
use std::path::PathBuf;

use thiserror::Error;

use crate::build_context::BuildPhase;

/// An output artifact that could not be rewritten
#[derive(Debug)]
pub struct ArtifactFailure {
  pub path: PathBuf,
  pub error: std::io::Error,
}

impl Display for ArtifactFailure {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {}", self.path.display(), self.error)
  }
}

/// Fatal conditions surfaced to the bundler.
///
/// Missing graph membership is never an error; graph mutations report it
/// through their return values instead.
#[derive(Debug, Error)]
pub enum WarpCssError {
  #[error("Failed to generate styles for {tag}")]
  Generation {
    tag: String,
    #[source]
    source: anyhow::Error,
  },

  #[error("No generated styles for {0}")]
  MissingStyle(String),

  #[error("Failed to rewrite {} output artifact(s): {}", .failures.len(), format_failures(.failures))]
  ArtifactRewrite { failures: Vec<ArtifactFailure> },

  #[error("Cannot aggregate styles while {0} module load(s) are still in flight")]
  LoadsOutstanding(usize),

  #[error("Cannot {operation} during the {phase:?} phase")]
  InvalidPhase {
    operation: &'static str,
    phase: BuildPhase,
  },

  #[error("Invalid options: {0}")]
  InvalidOptions(String),

  #[error("Failed to build tag substitution: {0}")]
  Substitution(#[from] aho_corasick::BuildError),
}

fn format_failures(failures: &[ArtifactFailure]) -> String {
  failures
    .iter()
    .map(|failure| failure.to_string())
    .collect::<Vec<_>>()
    .join(", ")
}
