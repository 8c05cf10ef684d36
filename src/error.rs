// Copyright (c) 2024 PostFinance AG
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum ProvisionError {
    #[error("{0} must be set (via .env or environment variables)")]
    MissingEnvironment(&'static str),

    #[error("Failed to read mapping file '{path}': {source}")]
    MappingFile {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse mapping file: {0}")]
    MappingFormat(#[from] serde_yaml::Error),

    #[error("Failed to read CSV '{path}': {source}")]
    CsvInput { path: String, source: csv::Error },

    #[error("Token acquisition failed: {0}")]
    Token(String),

    #[error("{method} {url} failed: {status} {body}")]
    Http {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Request to Graph failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected response from {url}: {reason}")]
    UnexpectedResponse { url: String, reason: String },

    #[error("Failed to build HTTP runtime: {0}")]
    Runtime(std::io::Error),

    #[error("Failed to write report '{path}': {reason}")]
    Report { path: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProvisionError {
    /// Process exit code for errors that abort the run.
    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            ProvisionError::MissingEnvironment(_)
            | ProvisionError::MappingFile { .. }
            | ProvisionError::MappingFormat(_) => 2,
            _ => 1,
        }
    }
}
