//! Per entry point scoped style extraction for bundlers.
//!
//! Modules containing a placeholder marker get a unique tag. Each tag is
//! resolved to the source of its module and every module below it in the
//! entry point's import graph, handed to a `StyleGenerator`, and the generated
//! styles are spliced over the tag in the final outputs.
pub use aggregator::*;
pub use build_context::*;
pub use dependency_graph::*;
pub use error::*;
pub use graph_registry::*;
pub use substitutor::*;
pub use tagger::*;

pub mod aggregator;
pub mod build_context;
pub mod dependency_graph;
pub mod graph_registry;
pub mod plugin;
pub mod substitutor;
pub mod tagger;

mod error;
