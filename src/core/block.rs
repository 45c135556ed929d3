//! Wire block format.
//!
//! Every physical write on a MAPI connection is a sequence of blocks:
//!
//! ```text
//! [Header(2, little-endian)] [Payload(N)]
//! header = (N << 1) | last
//! ```
//!
//! The low bit of the header marks the final block of a logical message. A
//! cleared bit tells the peer that more data belongs to the same message and
//! it must keep reading before acting.

use crate::error::{constants, MapiError, Result};
use bytes::{Bytes, BytesMut};

/// Length of the block header in bytes
pub const HEADER_LEN: usize = 2;

/// Largest payload the 15-bit length field can describe
pub const MAX_ENCODABLE_LEN: usize = (u16::MAX >> 1) as usize;

/// A single transport block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub payload: Bytes,
    /// Set on the final block of a logical message
    pub last: bool,
}

impl Block {
    pub fn new(payload: impl Into<Bytes>, last: bool) -> Self {
        Self {
            payload: payload.into(),
            last,
        }
    }

    /// Encode the header word for a payload of `len` bytes
    #[inline]
    pub fn header(len: usize, last: bool) -> Result<u16> {
        if len > MAX_ENCODABLE_LEN {
            return Err(MapiError::ProtocolError(format!(
                "{}: {len} bytes",
                constants::ERR_OVERSIZED_BLOCK
            )));
        }
        Ok(((len as u16) << 1) | last as u16)
    }

    /// Decode a header word into (payload length, last flag)
    #[inline]
    pub fn parse_header(raw: [u8; HEADER_LEN]) -> (usize, bool) {
        let word = u16::from_le_bytes(raw);
        ((word >> 1) as usize, word & 1 == 1)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let header = Self::header(self.payload.len(), self.last)?;
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&header.to_le_bytes());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Parse exactly one block from `data`; trailing bytes are ignored
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(MapiError::ProtocolError("Truncated block header".into()));
        }
        let (len, last) = Self::parse_header([data[0], data[1]]);
        let body = &data[HEADER_LEN..];
        if body.len() < len {
            return Err(MapiError::ProtocolError(format!(
                "Truncated block: header announces {len} bytes, {} available",
                body.len()
            )));
        }
        Ok(Self::new(Bytes::copy_from_slice(&body[..len]), last))
    }
}

/// Split one logical write into blocks of at most `max_block_size` bytes.
///
/// When `final_write` is false every block is a continuation block. An empty
/// payload still produces one (empty) block so the flag reaches the peer.
pub fn split_message(mut payload: BytesMut, max_block_size: usize, final_write: bool) -> Vec<Block> {
    let max = max_block_size.max(1);
    let mut blocks = Vec::with_capacity(payload.len() / max + 1);

    loop {
        let take = payload.len().min(max);
        let chunk = payload.split_to(take).freeze();
        let done = payload.is_empty();
        blocks.push(Block::new(chunk, done && final_write));
        if done {
            break;
        }
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        assert_eq!(Block::header(0, true).unwrap(), 1);
        assert_eq!(Block::header(5, false).unwrap(), 10);
        assert_eq!(Block::header(5, true).unwrap(), 11);
        assert_eq!(Block::parse_header(11u16.to_le_bytes()), (5, true));
        assert_eq!(Block::parse_header(10u16.to_le_bytes()), (5, false));
    }

    #[test]
    fn test_header_rejects_oversized() {
        assert!(Block::header(MAX_ENCODABLE_LEN + 1, true).is_err());
    }

    #[test]
    fn test_split_marks_only_final_block() {
        let payload = BytesMut::from(&[7u8; 25][..]);
        let blocks = split_message(payload, 10, true);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].payload.len(), 10);
        assert_eq!(blocks[2].payload.len(), 5);
        assert_eq!(
            blocks.iter().map(|b| b.last).collect::<Vec<_>>(),
            vec![false, false, true]
        );
    }

    #[test]
    fn test_split_continuation_never_marks_last() {
        let blocks = split_message(BytesMut::from(&b"abc"[..]), 2, false);
        assert!(blocks.iter().all(|b| !b.last));
    }

    #[test]
    fn test_split_empty_payload() {
        let blocks = split_message(BytesMut::new(), 10, true);
        assert_eq!(blocks, vec![Block::new(Bytes::new(), true)]);
    }

    #[test]
    fn test_from_bytes_truncated() {
        let mut raw = Block::new(&b"hello"[..], true).to_bytes().unwrap();
        raw.pop();
        assert!(matches!(
            Block::from_bytes(&raw),
            Err(MapiError::ProtocolError(_))
        ));
    }
}
