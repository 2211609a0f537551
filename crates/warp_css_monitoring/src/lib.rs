//! This module configures tracing for the warp-css plugin.
//!
//! Tracing is written to a rolling log file in the temp directory; standard
//! output is opt-in through `WARP_CSS_TRACING_MODE=stdout`.
//!
//! Monitoring should only be initialized once.
use std::sync::Mutex;

pub use from_env::FromEnvError;
pub use tracer::TracerMode;

mod from_env;
mod tracer;

pub static MONITORING_GUARD: Mutex<Option<MonitoringGuard>> = Mutex::new(None);

#[derive(Default)]
pub struct MonitoringGuard {
  #[allow(unused)]
  tracer: Option<tracer::Tracer>,
}

#[derive(Debug, Default)]
pub struct MonitoringOptions {
  pub tracing_options: Vec<TracerMode>,
}

impl MonitoringOptions {
  pub fn from_env() -> Result<Self, FromEnvError> {
    Ok(Self {
      tracing_options: TracerMode::from_env()?,
    })
  }
}

pub fn initialize_monitoring(options: MonitoringOptions) -> anyhow::Result<()> {
  let mut global = MONITORING_GUARD
    .lock()
    .map_err(|_| anyhow::anyhow!("Monitoring guard lock was poisoned"))?;
  if global.is_some() {
    tracing::warn!("Monitoring is getting set-up twice, this will no-op");
    return Ok(());
  }

  let tracer = Some(tracer::Tracer::new(&options.tracing_options)?);

  *global = Some(MonitoringGuard { tracer });

  Ok(())
}

pub fn initialize_from_env() -> anyhow::Result<()> {
  initialize_monitoring(MonitoringOptions::from_env()?)
}

/// Drops the tracer guards so that buffered log lines are flushed.
pub fn close_monitoring() {
  if let Ok(mut guard) = MONITORING_GUARD.lock() {
    if let Some(monitoring_guard) = guard.as_mut() {
      tracing::debug!("Flushing tracing output");
      monitoring_guard.tracer.take();
    }
  }
}
