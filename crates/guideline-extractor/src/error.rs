use std::path::PathBuf;

use llm_common::completion::CompletionClientError;
use llm_common::error::CommonError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("include {directive:?} could not be resolved at {path}: {source}")]
    Include {
        directive: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("html conversion failed: {0}")]
    Html(String),

    #[error("invalid guideline json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build review prompt: {0}")]
    Prompt(#[source] serde_json::Error),

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Completion(#[from] CompletionClientError),

    #[error(transparent)]
    Common(#[from] CommonError),
}
