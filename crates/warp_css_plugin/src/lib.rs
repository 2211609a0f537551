//! Bundler plugin inlining generated styles at `@warp-css` placeholders.
//!
//! Hosts set up tracing through [`monitoring`] before driving the plugin.
pub use lightning_css::*;
pub use options::*;
pub use plugin::*;
pub use warp_css_monitoring as monitoring;

mod lightning_css;
mod options;
mod plugin;
