// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for persona-audit

use thiserror::Error;

/// Result type alias for persona-audit operations
pub type Result<T> = std::result::Result<T, AuditError>;

/// persona-audit error types
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("File type not supported: {0}. Please upload SVG, PNG, JPG or GIF.")]
    UnsupportedType(String),

    #[error("File too large: {name} is {size} bytes (limit {limit})")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    #[error("{0}")]
    Precondition(String),

    #[error("An analysis run is already in progress")]
    AlreadyRunning,

    #[error("Failed to save image {name}: {message}")]
    PersistenceFailure { name: String, message: String },

    #[error("{0}")]
    SubmissionFailure(String),

    #[error("Analysis service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl AuditError {
    /// Whether this error came out of an analysis run (as opposed to local
    /// validation or tooling)
    pub fn is_pipeline_failure(&self) -> bool {
        matches!(
            self,
            Self::Precondition(_)
                | Self::PersistenceFailure { .. }
                | Self::SubmissionFailure(_)
                | Self::Transport(_)
        )
    }
}
