use anyhow::anyhow;
use async_trait::async_trait;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use warp_css_core::StyleGenerator;

pub const DEFAULT_BROWSERSLIST: &str = "supports es6-module and > 0.25% in NO and not dead";

/// Lowers the output of another `StyleGenerator` for the configured browsers.
///
/// The printed CSS has its backslashes doubled so it survives being inlined
/// into a JS string literal (`lg\:text-left` would otherwise lose its escape).
#[derive(Debug)]
pub struct LightningCssPostProcessor<G> {
  inner: G,
  browsers: Option<Browsers>,
}

impl<G> LightningCssPostProcessor<G> {
  pub fn new(inner: G, browserslist: &str) -> anyhow::Result<Self> {
    let browsers = Browsers::from_browserslist([browserslist])?;

    Ok(LightningCssPostProcessor { inner, browsers })
  }

  pub fn process(&self, css: &str, minify: bool) -> anyhow::Result<String> {
    let targets = Targets {
      browsers: self.browsers,
      include: Default::default(),
      exclude: Default::default(),
    };

    let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
      .map_err(|err| anyhow!("Failed to parse generated CSS: {err}"))?;

    stylesheet
      .minify(MinifyOptions {
        targets,
        ..MinifyOptions::default()
      })
      .map_err(|err| anyhow!("Failed to transform generated CSS: {err}"))?;

    let output = stylesheet.to_css(PrinterOptions {
      minify,
      targets,
      ..PrinterOptions::default()
    })?;

    Ok(escape_backslashes(&output.code))
  }
}

fn escape_backslashes(css: &str) -> String {
  css.replace('\\', "\\\\")
}

#[async_trait]
impl<G: StyleGenerator> StyleGenerator for LightningCssPostProcessor<G> {
  async fn generate(&self, code: &str, minify: bool) -> anyhow::Result<String> {
    let css = self.inner.generate(code, minify).await?;
    self.process(&css, minify)
  }
}
