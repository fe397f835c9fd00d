//! Identifier registration, two-phase. The durable identifier is derived
//! from the published row id, which does not exist until after insert, so
//! a row is created under a provisional identifier and immediately
//! re-pointed at the final one.

use async_trait::async_trait;
use datapress_core::token;
use std::fmt;

pub const DEFAULT_IDENTIFIER_PREFIX: &str = "10.60775";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrarError(pub String);

impl fmt::Display for RegistrarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RegistrarError {}

#[async_trait]
pub trait IdentifierRegistrar: Send + Sync {
    /// Phase one: an identifier valid before the row id exists. Minted
    /// from a random token, never reused.
    async fn provisional(&self) -> Result<String, RegistrarError>;

    /// Phase two: the permanent identifier for the given row id.
    async fn finalize(&self, published_id: i64) -> Result<String, RegistrarError>;
}

/// Registrar that derives identifiers locally under a fixed prefix. A
/// deployment with a real DOI registration API swaps this out behind the
/// same two-phase trait.
pub struct LocalRegistrar {
    prefix: String,
}

impl LocalRegistrar {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LocalRegistrar {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTIFIER_PREFIX)
    }
}

#[async_trait]
impl IdentifierRegistrar for LocalRegistrar {
    async fn provisional(&self) -> Result<String, RegistrarError> {
        Ok(format!("{}/draft.{}", self.prefix, token::mint()))
    }

    async fn finalize(&self, published_id: i64) -> Result<String, RegistrarError> {
        Ok(format!("{}/dataset.{}", self.prefix, published_id))
    }
}
