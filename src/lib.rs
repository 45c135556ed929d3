//! # mapi-protocol
//!
//! Client-side core of the MAPI wire protocol: block framing, the
//! challenge-response login, chunked query dispatch, control commands and
//! redirect following.
//!
//! Result-set decoding is left to the caller, who reads classified reply
//! lines from a [`session::Session`] after sending a query.
//!
//! ## Layout
//! - [`core`]: block header and Tokio codec
//! - [`transport`]: the line-oriented connection channel
//! - [`protocol`]: handshake, dispatcher, classifier, redirects
//! - [`session`]: sessions and the factory that opens them
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging and metrics

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod utils;

pub use config::MapiConfig;
pub use error::{MapiError, Result};
pub use protocol::{HandlerRegistry, ProtocolHandler, ResponseLine};
pub use session::{Credentials, Session, SessionFactory};
pub use transport::{CloseHandle, ConnectionChannel, FrameState};
