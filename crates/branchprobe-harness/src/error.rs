//! Harness-level errors.
//!
//! These describe a malformed suite or a reporting failure. Failures of the
//! code under test never show up here; they become recorded checks.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("test case '{name}' registered twice")]
    DuplicateCase { name: String },
    #[error("test case registered with an empty name")]
    EmptyCaseName,
    #[error("no test case named '{name}'")]
    UnknownCase { name: String },
    #[error("child process for case '{case}': {detail}")]
    ChildProtocol { case: String, detail: String },
}
