//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("resource missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid apiVersion: {0}")]
    InvalidApiVersion(String),

    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
