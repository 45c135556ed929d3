//! # Error Types
//!
//! Error handling for the MAPI client core.
//!
//! Every operation in this crate returns [`Result`], and every failure is one
//! of the [`MapiError`] variants below. Errors surface synchronously to the
//! caller of the operation in progress; nothing is retried automatically.
//!
//! ## Error Categories
//! - **Transport**: the connection could not be established, or it was lost
//! - **Protocol**: the server sent something this client cannot interpret
//! - **Server**: the server answered with an explicit error line
//! - **Local**: configuration problems and misuse of the framing state
//!
//! ## Example Usage
//! ```rust
//! use mapi_protocol::error::{MapiError, Result};
//!
//! fn version_of(token: &str) -> Result<u32> {
//!     token
//!         .parse()
//!         .map_err(|_| MapiError::ProtocolError(format!("non-numeric protocol version: {token}")))
//! }
//!
//! assert!(version_of("9").is_ok());
//! assert!(matches!(version_of("nine"), Err(MapiError::ProtocolError(_))));
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Transport errors
    pub const ERR_STREAM_CLOSED: &str = "Stream closed before a complete line was received";
    pub const ERR_CHANNEL_CLOSED: &str = "Channel has been closed";
    pub const ERR_EMPTY_LINE: &str = "Unexpected empty line from server";
    pub const ERR_CONNECT_TIMEOUT: &str = "Timed out while connecting";

    /// Framing errors
    pub const ERR_CONTINUATION_PENDING: &str =
        "Cannot start a new command while a query is still being continued";
    pub const ERR_OVERSIZED_BLOCK: &str = "Block exceeds maximum size";

    /// Protocol errors
    pub const ERR_INVALID_UTF8: &str = "Server sent a line that is not valid UTF-8";
    pub const ERR_LINE_TOO_LONG: &str = "Server sent a line longer than the configured maximum";
    pub const ERR_TOO_MANY_REDIRECTS: &str = "Server redirected more than once";
    pub const ERR_MISSING_PASSWORD_HASH: &str =
        "Challenge does not name a password hash algorithm";
    pub const ERR_NO_COMMON_HASH: &str = "No supported hash algorithm advertised by server";
}

/// MapiError is the error type for all protocol operations
#[derive(Error, Debug)]
pub enum MapiError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport could not be established
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The stream ended, or an empty line arrived where content was expected
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Malformed challenge, non-numeric version, unexpected reply line
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// No handler is registered for the version the server advertised
    #[error("Unsupported protocol version: {0}")]
    UnsupportedProtocol(u32),

    /// Explicit error line from the server; the message is the line minus its marker
    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedHash(String),

    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl MapiError {
    /// Whether the error leaves the underlying transport unusable
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MapiError::ServerError(_) | MapiError::ConfigError(_))
    }
}

/// Type alias for Results using MapiError
pub type Result<T> = std::result::Result<T, MapiError>;
