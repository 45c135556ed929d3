//! # Core Framing Components
//!
//! Low-level block framing for the MAPI byte stream.
//!
//! ## Components
//! - **Block**: one physical unit on the wire, with its continuation bit
//! - **Codec**: Tokio codec for framing blocks over byte streams
//!
//! ## Wire Format
//! ```text
//! [Header(2, LE) = (len << 1) | last] [Payload(len)]
//! ```

pub mod block;
pub mod codec;
