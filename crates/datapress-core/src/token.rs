// SPDX-License-Identifier: Apache-2.0
//! Opaque token minting for container ids and provisional identifiers.

use uuid::Uuid;

/// Mints a fresh opaque token: 32 lowercase hex characters, dash-free.
///
/// Tokens are never reused; every call yields a new value.
#[must_use]
pub fn mint() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_32_hex_chars() {
        let token = mint();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_differ_across_calls() {
        assert_ne!(mint(), mint());
    }
}
