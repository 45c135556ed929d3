#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use mapi_protocol::core::block::Block;
use mapi_protocol::core::codec::BlockCodec;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    let _ = Block::from_bytes(data);

    let mut codec = BlockCodec;
    let mut buf = BytesMut::from(data);
    while let Ok(Some(block)) = codec.decode(&mut buf) {
        assert!(block.payload.len() <= data.len());
    }
});
