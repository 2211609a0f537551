use std::env;

#[derive(Debug, thiserror::Error)]
pub enum FromEnvError {
  #[error("Invalid value for {0}: {1}")]
  InvalidKey(String, String),
}

/// Reads an environment variable, treating unset and non-unicode values as absent.
pub fn optional_var(key: &str) -> Option<String> {
  env::var(key).ok()
}
