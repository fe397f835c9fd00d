// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ID_MAX_LEN: usize = 64;

/// Error raised when a wire-level value fails model validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

fn validate_id(kind: &str, raw: &str) -> Result<String, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError(format!("{kind} must not be empty")));
    }
    if raw.len() > ID_MAX_LEN {
        return Err(ValidationError(format!(
            "{kind} exceeds {ID_MAX_LEN} characters"
        )));
    }
    if !raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ValidationError(format!(
            "{kind} contains characters outside [A-Za-z0-9._-]"
        )));
    }
    Ok(raw.to_string())
}

/// Identity of a draft dataset aggregate.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        validate_id("dataset id", raw).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one blob container in either namespace.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        validate_id("container id", raw).map(Self)
    }

    /// Mints a fresh opaque container id. Never reused; a retried publish
    /// attempt always gets a new one.
    #[must_use]
    pub fn mint() -> Self {
        Self(datapress_core::token::mint())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the operator driving a publish attempt.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        validate_id("user id", raw).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(DatasetId::parse("").is_err());
        assert!(DatasetId::parse(&"x".repeat(ID_MAX_LEN + 1)).is_err());
        assert!(DatasetId::parse(&"x".repeat(ID_MAX_LEN)).is_ok());
    }

    #[test]
    fn rejects_path_characters() {
        assert!(DatasetId::parse("a/b").is_err());
        assert!(DatasetId::parse("a b").is_err());
        assert!(DatasetId::parse("a.b-c_d").is_ok());
    }

    #[test]
    fn minted_container_ids_parse_and_differ() {
        let a = ContainerId::mint();
        let b = ContainerId::mint();
        assert_ne!(a, b);
        assert!(ContainerId::parse(a.as_str()).is_ok());
    }
}
