//! Version-specific login response builders.
//!
//! A [`ProtocolHandler`] turns the challenge tokens plus credentials into
//! the single line the client sends back. Handlers are plain values held in
//! a [`crate::protocol::registry::HandlerRegistry`]; closures with the right
//! signature are handlers too.

use crate::error::{constants, MapiError, Result};
use crate::protocol::challenge::hash_list;
use crate::protocol::hash::HashAlgorithm;
use std::fmt;

/// Byte order announced in every login response
pub const CLIENT_ENDIANNESS: &str = "BIG";

/// Plain-text pseudo algorithm, only honoured on explicit request (version 8)
pub const PLAIN_ALGORITHM: &str = "PLAIN";

/// Everything a handler needs to build a login response
#[derive(Clone, Copy)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub language: &'a str,
    /// Raw challenge tokens, in wire order
    pub tokens: &'a [String],
    pub database: &'a str,
    /// `None` lets the handler choose from the advertised algorithms
    pub hash_override: Option<&'a str>,
}

impl fmt::Debug for LoginRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("language", &self.language)
            .field("tokens", &self.tokens)
            .field("database", &self.database)
            .field("hash_override", &self.hash_override)
            .finish()
    }
}

impl<'a> LoginRequest<'a> {
    fn token(&self, index: usize, name: &str) -> Result<&'a str> {
        self.tokens.get(index).map(String::as_str).ok_or_else(|| {
            MapiError::ProtocolError(format!("Challenge is missing the {name} field"))
        })
    }

    fn salt(&self) -> Result<&'a str> {
        self.token(0, "salt")
    }

    fn advertised(&self) -> Result<Vec<&'a str>> {
        Ok(hash_list(self.token(3, "hash algorithms")?))
    }
}

/// Builds a login response for one protocol version
pub trait ProtocolHandler: Send + Sync {
    fn build_response(&self, request: &LoginRequest<'_>) -> Result<String>;
}

impl<F> ProtocolHandler for F
where
    F: Fn(&LoginRequest<'_>) -> Result<String> + Send + Sync,
{
    fn build_response(&self, request: &LoginRequest<'_>) -> Result<String> {
        self(request)
    }
}

fn format_response(request: &LoginRequest<'_>, credential: &str) -> String {
    format!(
        "{CLIENT_ENDIANNESS}:{}:{credential}:{}:{}:",
        request.username, request.language, request.database
    )
}

/// Version 8: digest over the clear-text password and the salt
#[derive(Debug, Clone, Copy, Default)]
pub struct V8Handler;

impl ProtocolHandler for V8Handler {
    fn build_response(&self, request: &LoginRequest<'_>) -> Result<String> {
        let salt = request.salt()?;
        let advertised = request.advertised()?;

        if let Some(requested) = request.hash_override {
            if requested.eq_ignore_ascii_case(PLAIN_ALGORITHM) {
                if !advertised
                    .iter()
                    .any(|algo| algo.eq_ignore_ascii_case(PLAIN_ALGORITHM))
                {
                    return Err(MapiError::UnsupportedHash(format!(
                        "{PLAIN_ALGORITHM} not advertised by server"
                    )));
                }
                let credential = format!("{{plain}}{}{salt}", request.password);
                return Ok(format_response(request, &credential));
            }
        }

        let algo = HashAlgorithm::negotiate(&advertised, request.hash_override)?;
        let digest = algo.hex_digest(&[request.password.as_bytes(), salt.as_bytes()]);
        Ok(format_response(request, &format!("{{{}}}{digest}", algo.name())))
    }
}

/// Version 9: the password is first hashed with the server's storage
/// algorithm, then digested together with the salt
#[derive(Debug, Clone, Copy, Default)]
pub struct V9Handler;

impl ProtocolHandler for V9Handler {
    fn build_response(&self, request: &LoginRequest<'_>) -> Result<String> {
        let salt = request.salt()?;
        let advertised = request.advertised()?;

        let storage_name = request
            .tokens
            .get(5)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| MapiError::ProtocolError(constants::ERR_MISSING_PASSWORD_HASH.into()))?;
        let storage = HashAlgorithm::from_name(storage_name)
            .ok_or_else(|| MapiError::UnsupportedHash(storage_name.to_string()))?;
        let stored = storage.hex_digest(&[request.password.as_bytes()]);

        let algo = HashAlgorithm::negotiate(&advertised, request.hash_override)?;
        let digest = algo.hex_digest(&[stored.as_bytes(), salt.as_bytes()]);
        Ok(format_response(request, &format!("{{{}}}{digest}", algo.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(line: &str) -> Vec<String> {
        line.split(':').map(str::to_string).collect()
    }

    fn request<'a>(tokens: &'a [String], hash_override: Option<&'a str>) -> LoginRequest<'a> {
        LoginRequest {
            username: "monetdb",
            password: "secret",
            language: "sql",
            tokens,
            database: "demo",
            hash_override,
        }
    }

    #[test]
    fn test_v8_picks_strongest_advertised() {
        let toks = tokens("s4lt:mserver:8:MD5,SHA1:LIT:");
        let response = V8Handler.build_response(&request(&toks, None)).unwrap();
        let expected = HashAlgorithm::Sha1.hex_digest(&[b"secret", b"s4lt"]);
        assert_eq!(response, format!("BIG:monetdb:{{SHA1}}{expected}:sql:demo:"));
    }

    #[test]
    fn test_v8_plain_on_request_only() {
        let toks = tokens("s4lt:mserver:8:PLAIN,MD5:LIT:");
        let auto = V8Handler.build_response(&request(&toks, None)).unwrap();
        assert!(auto.contains("{MD5}"));

        let plain = V8Handler
            .build_response(&request(&toks, Some("plain")))
            .unwrap();
        assert_eq!(plain, "BIG:monetdb:{plain}secrets4lt:sql:demo:");
    }

    #[test]
    fn test_v9_prehashes_password() {
        let toks = tokens("s4lt:mserver:9:SHA256,MD5:LIT:SHA512:");
        let response = V9Handler.build_response(&request(&toks, None)).unwrap();

        let stored = HashAlgorithm::Sha512.hex_digest(&[b"secret"]);
        let digest = HashAlgorithm::Sha256.hex_digest(&[stored.as_bytes(), b"s4lt"]);
        assert_eq!(response, format!("BIG:monetdb:{{SHA256}}{digest}:sql:demo:"));
    }

    #[test]
    fn test_v9_requires_password_hash_field() {
        let toks = tokens("abc123:merovingian:9:RIPEMD160:FOO:");
        assert!(matches!(
            V9Handler.build_response(&request(&toks, None)),
            Err(MapiError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_closure_is_a_handler() {
        let handler =
            |req: &LoginRequest<'_>| -> Result<String> { Ok(format!("user={}", req.username)) };
        let toks = tokens("s:m:8:MD5:LIT:");
        assert_eq!(
            handler.build_response(&request(&toks, None)).unwrap(),
            "user=monetdb"
        );
    }
}
