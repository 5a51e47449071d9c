use crate::config::ConfigError;
use crate::events::EventsError;
use crate::loader::LoadError;
use crate::nvdb::FetchError;
use crate::report::ReportError;
use thiserror::Error;

/// Fatal errors for a single command run.
///
/// Fetch failures only appear here when pagination was interrupted before a
/// single object arrived; otherwise they are logged and the partial harvest is
/// loaded.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("fetch failed before any objects were received: {0}")]
    Fetch(#[from] FetchError),
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("event file error: {0}")]
    Events(#[from] EventsError),
    #[error("report error: {0}")]
    Report(#[from] ReportError),
}
