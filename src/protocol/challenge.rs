//! The server's opening challenge line.
//!
//! ```text
//! salt:serverId:version:hashAlgos:endianness[:passwordHashAlgo[:...]]
//! ```

use crate::error::{MapiError, Result};

/// Fewest tokens a well-formed challenge carries
pub const MIN_CHALLENGE_TOKENS: usize = 5;

const SEPARATOR: char = ':';

/// Parsed challenge, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    tokens: Vec<String>,
}

impl Challenge {
    /// Split a challenge line into its tokens.
    ///
    /// # Errors
    /// `ProtocolError` naming the line when fewer than
    /// [`MIN_CHALLENGE_TOKENS`] tokens are present.
    pub fn parse(line: &str) -> Result<Self> {
        let tokens: Vec<String> = line.split(SEPARATOR).map(str::to_string).collect();
        if tokens.len() < MIN_CHALLENGE_TOKENS {
            return Err(MapiError::ProtocolError(format!(
                "Malformed challenge '{line}': expected at least {MIN_CHALLENGE_TOKENS} fields, got {}",
                tokens.len()
            )));
        }
        Ok(Self { tokens })
    }

    /// All tokens in wire order
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn salt(&self) -> &str {
        &self.tokens[0]
    }

    pub fn server_id(&self) -> &str {
        &self.tokens[1]
    }

    pub fn version_token(&self) -> &str {
        &self.tokens[2]
    }

    /// Protocol version as an integer.
    ///
    /// # Errors
    /// `ProtocolError` unless the version token is made of ASCII digits only.
    pub fn version(&self) -> Result<u32> {
        let token = self.version_token();
        let non_numeric =
            || MapiError::ProtocolError(format!("Non-numeric protocol version '{token}' in challenge"));

        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(non_numeric());
        }
        token.parse::<u32>().map_err(|_| non_numeric())
    }

    /// Hash algorithms the server accepts for the login digest
    pub fn hash_algorithms(&self) -> Vec<&str> {
        hash_list(&self.tokens[3])
    }

    pub fn endianness(&self) -> &str {
        &self.tokens[4]
    }

    /// Algorithm the server stores passwords with (version 9 onwards)
    pub fn password_hash_algorithm(&self) -> Option<&str> {
        self.tokens
            .get(5)
            .map(String::as_str)
            .filter(|algo| !algo.is_empty())
    }
}

/// Split a comma separated algorithm list, skipping empty entries
pub fn hash_list(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|algo| !algo.is_empty())
        .collect()
}
