// SPDX-License-Identifier: Apache-2.0
use datapress_model::PublishStage;
use datapress_store::{StoreError, StoreErrorCode};
use std::collections::BTreeMap;
use std::fmt;

/// Failure classification for a publish request or attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishErrorCode {
    /// Dataset absent, or the requester is not a member of it. The two
    /// cases are deliberately indistinguishable to callers.
    NotFound,
    /// Metadata validation refused the dataset; field errors attached.
    ValidationFailed,
    /// An object-store call failed or an expected blob was missing.
    StorageUnreachable,
    /// A status or registry write that the attempt cannot proceed without.
    PersistenceFailure,
    /// The dataset is not in a state that admits this operation.
    InvalidState,
    /// Another attempt holds the dataset lease, or the process-wide
    /// attempt cap is exhausted.
    AttemptInProgress,
}

impl PublishErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PublishErrorCode::NotFound => "not_found",
            PublishErrorCode::ValidationFailed => "validation_failed",
            PublishErrorCode::StorageUnreachable => "storage_unreachable",
            PublishErrorCode::PersistenceFailure => "persistence_failure",
            PublishErrorCode::InvalidState => "invalid_state",
            PublishErrorCode::AttemptInProgress => "attempt_in_progress",
        }
    }
}

#[derive(Clone, Debug)]
pub struct PublishError {
    pub code: PublishErrorCode,
    pub message: String,
    /// Stage the attempt was in when it failed, when one applies.
    pub stage: Option<PublishStage>,
    /// Per-field messages attached to `ValidationFailed` errors.
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl PublishError {
    #[must_use]
    pub fn new(code: PublishErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            stage: None,
            field_errors: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(PublishErrorCode::NotFound, message)
    }

    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(PublishErrorCode::InvalidState, message)
    }

    #[must_use]
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(PublishErrorCode::PersistenceFailure, message)
    }

    #[must_use]
    pub fn attempt_in_progress(message: impl Into<String>) -> Self {
        Self::new(PublishErrorCode::AttemptInProgress, message)
    }

    #[must_use]
    pub fn validation(
        stage: PublishStage,
        field_errors: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            code: PublishErrorCode::ValidationFailed,
            message: "metadata validation failed".to_string(),
            stage: Some(stage),
            field_errors,
        }
    }

    #[must_use]
    pub fn at_stage(mut self, stage: PublishStage) -> Self {
        self.stage = Some(stage);
        self
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "{} at {}: {}", self.code.as_str(), stage, self.message),
            None => write!(f, "{}: {}", self.code.as_str(), self.message),
        }
    }
}

impl std::error::Error for PublishError {}

impl From<StoreError> for PublishError {
    fn from(err: StoreError) -> Self {
        let code = match err.code {
            StoreErrorCode::NotFound => PublishErrorCode::NotFound,
            _ => PublishErrorCode::StorageUnreachable,
        };
        Self::new(code, err.message)
    }
}
