use std::path::Path;

use anyhow::Context;
use regex::Regex;
use serde::Deserialize;
use warp_css_core::WarpCssError;
use warp_css_core::DEFAULT_PLACEHOLDER;
use warp_css_core::DEFAULT_TAG_LENGTH;
use warp_css_core::DEFAULT_TAG_PREFIX;
use warp_css_filesystem::FileSystemRef;

use crate::lightning_css::DEFAULT_BROWSERSLIST;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct WarpCssOptions {
  /// Pattern restricting which modules are tracked and loaded by the plugin
  pub filter: String,
  /// Marker replaced with the generated styles of the module's subtree
  pub placeholder: String,
  pub minify: bool,
  pub tag_prefix: String,
  pub tag_length: usize,
  /// Query selecting the browsers generated styles are lowered for
  pub browserslist: String,
}

impl Default for WarpCssOptions {
  fn default() -> Self {
    WarpCssOptions {
      filter: String::from(".*?"),
      placeholder: String::from(DEFAULT_PLACEHOLDER),
      minify: true,
      tag_prefix: String::from(DEFAULT_TAG_PREFIX),
      tag_length: DEFAULT_TAG_LENGTH,
      browserslist: String::from(DEFAULT_BROWSERSLIST),
    }
  }
}

#[derive(Deserialize)]
struct PackageJson {
  #[serde(rename = "warpCss")]
  config: Option<WarpCssOptions>,
}

impl WarpCssOptions {
  /// Reads options from the `warpCss` key of the project's package.json,
  /// falling back to defaults when either is missing.
  pub fn load(file_system: &FileSystemRef, project_root: &Path) -> anyhow::Result<Self> {
    let package_json_path = project_root.join("package.json");
    if !file_system.is_file(&package_json_path) {
      return Ok(WarpCssOptions::default());
    }

    let contents = file_system.read_to_string(&package_json_path)?;
    let package_json: PackageJson = serde_json::from_str(&contents)
      .with_context(|| format!("Failed to parse {}", package_json_path.display()))?;

    Ok(package_json.config.unwrap_or_default())
  }

  pub fn validate(&self) -> Result<(), WarpCssError> {
    if self.placeholder.is_empty() {
      return Err(WarpCssError::InvalidOptions(
        "placeholder must not be empty".into(),
      ));
    }

    if self.tag_prefix.is_empty() {
      return Err(WarpCssError::InvalidOptions(
        "tagPrefix must not be empty".into(),
      ));
    }

    if self.tag_length == 0 {
      return Err(WarpCssError::InvalidOptions(
        "tagLength must be at least 1".into(),
      ));
    }

    Ok(())
  }

  pub fn filter_regex(&self) -> Result<Regex, WarpCssError> {
    Regex::new(&self.filter)
      .map_err(|err| WarpCssError::InvalidOptions(format!("invalid filter pattern: {err}")))
  }
}
