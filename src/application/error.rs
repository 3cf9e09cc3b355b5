use thiserror::Error;

use crate::{config::LoadError, infra::error::InfraError, pipeline::FetchError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit status for this failure: 2 for bad input, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) | AppError::Validation(_) => 2,
            AppError::Infra(_) | AppError::Fetch(_) | AppError::Unexpected(_) => 1,
        }
    }
}
