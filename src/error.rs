//! Error kinds for the deploy pipeline.
//!
//! Each variant maps to one failure domain so callers can decide
//! isolate-vs-abort per call site: configuration and manifest defects abort
//! before any network activity, render and execution errors abort the deploy
//! command, tag-sync and prune failures are logged per item.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("API request failed: {method} {url} -> {detail}")]
    Api {
        method: &'static str,
        url: String,
        status: Option<u16>,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
