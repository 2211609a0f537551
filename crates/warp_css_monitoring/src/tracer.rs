//! This module configures `tracing_subscriber` to write to a log file and,
//! optionally, standard output.
use std::sync::Arc;
use std::sync::Mutex;

use crate::from_env::{optional_var, FromEnvError};
use serde::Deserialize;
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

pub const TRACING_MODE_VAR: &str = "WARP_CSS_TRACING_MODE";

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum TracerMode {
  /// Output the Tracer logs to Stdout
  Stdout,
}

impl TracerMode {
  pub fn from_env() -> Result<Vec<Self>, FromEnvError> {
    let Some(mode) = optional_var(TRACING_MODE_VAR) else {
      return Ok(vec![]);
    };

    let mut tracer_modes = vec![];

    for mode in mode.split(',').map(|s| s.trim()) {
      match mode {
        "stdout" => {
          if !tracer_modes.contains(&Self::Stdout) {
            tracer_modes.push(Self::Stdout);
          }
        }
        // The log file is always written
        "file" | "" => {}
        value => {
          return Err(FromEnvError::InvalidKey(
            String::from(TRACING_MODE_VAR),
            format!("Invalid value: {}", value),
          ))
        }
      }
    }

    Ok(tracer_modes)
  }
}

pub struct Tracer {
  #[allow(unused)]
  worker_guards: Arc<Mutex<Vec<WorkerGuard>>>,
}

impl Tracer {
  pub fn new(options: &[TracerMode]) -> anyhow::Result<Self> {
    let mut worker_guards = vec![];

    let directory = std::env::temp_dir()
      .join("warp_css_trace")
      .to_string_lossy()
      .to_string();
    let file_appender = tracing_appender::rolling::Builder::new()
      .rotation(tracing_appender::rolling::Rotation::HOURLY)
      .max_log_files(4)
      .filename_prefix("warp-css-tracing")
      .build(&directory)
      .map_err(|err| anyhow::anyhow!(err))?;
    let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);

    let layer = tracing_subscriber::fmt::layer()
      .with_writer(non_blocking)
      .with_span_events(FmtSpan::CLOSE)
      .with_filter(EnvFilter::from_default_env());

    worker_guards.push(worker_guard);

    let stdout_layer = if options.contains(&TracerMode::Stdout) {
      let (non_blocking, worker_guard) = tracing_appender::non_blocking(std::io::stdout());
      let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(EnvFilter::from_default_env());

      worker_guards.push(worker_guard);

      Some(stdout_layer)
    } else {
      None
    };

    let subscriber = Registry::default().with(layer).with(stdout_layer);

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(Self {
      worker_guards: Arc::new(Mutex::new(worker_guards)),
    })
  }
}
