// SPDX-License-Identifier: Apache-2.0
#![forbid(unsafe_code)]
//! Object-store adapter over the draft and published blob namespaces.
//!
//! Every backend exposes the same five calls through [`ObjectStore`]:
//! container provisioning, a full recursive listing, and the
//! read/create/write trio used to copy files between namespaces. Backends
//! perform no retries; the publish attempt is the retry unit.

mod http;
mod local;
mod memory;

pub use http::{HttpBlobStore, HttpBlobStoreConfig};
pub use local::LocalFsStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use datapress_model::{ContainerId, ObjectEntry};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two blob namespaces a call addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Draft,
    Published,
}

impl Namespace {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Namespace::Draft => "draft",
            Namespace::Published => "published",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a storage failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreErrorCode {
    NotFound,
    AlreadyExists,
    Unreachable,
    InvalidPath,
    Io,
}

impl StoreErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StoreErrorCode::NotFound => "not_found",
            StoreErrorCode::AlreadyExists => "already_exists",
            StoreErrorCode::Unreachable => "unreachable",
            StoreErrorCode::InvalidPath => "invalid_path",
            StoreErrorCode::Io => "io",
        }
    }
}

#[derive(Clone, Debug)]
pub struct StoreError {
    pub code: StoreErrorCode,
    pub message: String,
}

impl StoreError {
    #[must_use]
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::NotFound, message)
    }

    #[must_use]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::AlreadyExists, message)
    }

    #[must_use]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::Unreachable, message)
    }

    #[must_use]
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::InvalidPath, message)
    }

    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::Io, message)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for StoreError {}

/// Uniform interface over the draft and published blob namespaces.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Provisions an empty container. Fails with `AlreadyExists` when the
    /// name is taken.
    async fn create_container(
        &self,
        ns: Namespace,
        container: &ContainerId,
    ) -> Result<(), StoreError>;

    /// Lists every path under the container, directory entries included.
    /// The listing is finite and restartable from the beginning only.
    async fn list_all_paths(
        &self,
        ns: Namespace,
        container: &ContainerId,
    ) -> Result<Vec<ObjectEntry>, StoreError>;

    async fn read_file(
        &self,
        ns: Namespace,
        container: &ContainerId,
        path: &str,
    ) -> Result<Vec<u8>, StoreError>;

    /// First half of an upload: creates the named file empty.
    async fn create_file(
        &self,
        ns: Namespace,
        container: &ContainerId,
        path: &str,
    ) -> Result<(), StoreError>;

    /// Second half of an upload: fills the file created by
    /// [`ObjectStore::create_file`]. The two halves fail independently.
    async fn write_file(
        &self,
        ns: Namespace,
        container: &ContainerId,
        path: &str,
        bytes: &[u8],
    ) -> Result<(), StoreError>;
}

const MAX_OBJECT_PATH_LEN: usize = 1024;

/// Rejects object paths that are absolute, traverse upward, or contain
/// empty segments. Backends call this before touching storage.
pub fn validate_rel_path(path: &str) -> Result<(), StoreError> {
    if path.is_empty() {
        return Err(StoreError::invalid_path("object path must not be empty"));
    }
    if path.len() > MAX_OBJECT_PATH_LEN {
        return Err(StoreError::invalid_path(format!(
            "object path exceeds {MAX_OBJECT_PATH_LEN} bytes"
        )));
    }
    if path.starts_with('/') || path.contains('\\') {
        return Err(StoreError::invalid_path(format!(
            "object path `{path}` is not a clean relative path"
        )));
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StoreError::invalid_path(format!(
            "object path `{path}` contains empty or traversal segments"
        )));
    }
    Ok(())
}
