// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

/// Classified failures surfaced to the user by mutation handlers.
#[derive(Debug, Error)]
pub enum CrmError {
    /// Required input missing; nothing was sent to storage.
    #[error("{0}")]
    Validation(String),
    /// A referenced record blocks the requested deletion.
    #[error("{0}")]
    Integrity(String),
    #[error("storage error: {0:#}")]
    Persistence(anyhow::Error),
}

impl CrmError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub const fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}

impl From<anyhow::Error> for CrmError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<CrmError>() {
            Ok(classified) => classified,
            Err(other) => Self::Persistence(other),
        }
    }
}

pub type CrmResult<T> = std::result::Result<T, CrmError>;
