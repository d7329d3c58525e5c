// ============================================================
// Error Taxonomy
// ============================================================
// Every layer below the CLI returns `RecResult<T>`.
// Nothing is caught locally: a failing step ends the run and
// the error travels up to `main`, where anyhow prints it.
//
//   Config   — bad / missing config files, keys or values
//   Dataset  — missing or malformed interaction data
//   Lookup   — model or trainer name not in its registry
//   Trainer  — training diverged (non-finite loss)
//   Io / Csv / Yaml / Json / Checkpoint — wrapped library errors

use thiserror::Error;

pub type RecResult<T> = std::result::Result<T, RecError>;

#[derive(Debug, Error)]
pub enum RecError {
    #[error("config error: {0}")]
    Config(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("lookup error: {0}")]
    Lookup(String),

    #[error("trainer error: {0}")]
    Trainer(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RecError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }
}
