//! # Transport Layer
//!
//! The connection channel: one byte stream per session, framed as MAPI
//! blocks, read and written as lines.
//!
//! ## Guarantees
//! - `TCP_NODELAY` on every socket, so small command lines leave immediately
//! - Every read is bounded by the configured receive timeout
//! - `close()` is idempotent and never fails
//! - A [`channel::CloseHandle`] can abort a blocked read from another task

pub mod channel;

pub use channel::{ChannelOptions, CloseHandle, ConnectionChannel, FrameState};
