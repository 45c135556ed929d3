//! # Protocol Layer
//!
//! Everything above block framing: login, command dispatch and the
//! interpretation of server lines.
//!
//! ## Components
//! - **Challenge / Hash**: challenge parsing and digest negotiation
//! - **Handler / Registry**: per-version login response builders
//! - **Handshake**: the challenge-response login exchange
//! - **Dispatcher**: query chunking and control commands
//! - **Response**: single-line classification by marker byte
//! - **Redirect**: redirect target parsing and the reconnect cycle
//!
//! ## Login Flow
//! ```text
//! server: salt:serverId:version:hashes:endian[:pwhash:...]\n  <prompt>\n
//! client: BIG:user:{ALGO}digest:sql:database:\n
//! server: [#warning | ^redirect | !error]* .\n
//! ```

pub mod challenge;
pub mod dispatcher;
pub mod handler;
pub mod handshake;
pub mod hash;
pub mod redirect;
pub mod registry;
pub mod response;

pub use challenge::Challenge;
pub use handler::{LoginRequest, ProtocolHandler, V8Handler, V9Handler};
pub use handshake::{authenticate, HandshakeOutcome, Login};
pub use hash::HashAlgorithm;
pub use redirect::RedirectTarget;
pub use registry::HandlerRegistry;
pub use response::{classify, ResponseLine};
