use crate::core::block::{Block, HEADER_LEN};
use crate::error::{MapiError, Result};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Tokio codec framing MAPI blocks over a byte stream.
///
/// Decoding splits complete blocks off the read buffer without copying the
/// payload; a partial block leaves the buffer untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockCodec;

impl Decoder for BlockCodec {
    type Item = Block;
    type Error = MapiError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Block>> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let (len, last) = Block::parse_header([src[0], src[1]]);
        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(len).freeze();
        Ok(Some(Block { payload, last }))
    }
}

impl Encoder<Block> for BlockCodec {
    type Error = MapiError;

    fn encode(&mut self, block: Block, dst: &mut BytesMut) -> Result<()> {
        let header = Block::header(block.payload.len(), block.last)?;
        dst.reserve(HEADER_LEN + block.payload.len());
        dst.put_u16_le(header);
        dst.extend_from_slice(&block.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_waits_for_full_block() {
        let mut codec = BlockCodec;
        let mut buf = BytesMut::from(&[11u8, 0, b'h', b'e'][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 4);

        buf.extend_from_slice(b"llo");
        let block = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&block.payload[..], b"hello");
        assert!(block.last);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_then_decode_two_blocks() {
        let mut codec = BlockCodec;
        let mut buf = BytesMut::new();
        codec.encode(Block::new(&b"sSELECT"[..], false), &mut buf).unwrap();
        codec.encode(Block::new(&b" 1;\n"[..], true), &mut buf).unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert!(!first.last);
        assert!(second.last);
        assert_eq!(&second.payload[..], b" 1;\n");
    }
}
