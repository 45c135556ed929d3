//! Property-based tests using proptest
//!
//! Chunking, framing and classification invariants over generated input.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use futures::StreamExt;
use mapi_protocol::config::{MAX_BLOCK_SIZE, MAX_QUERY_CHUNK};
use mapi_protocol::core::block::{split_message, Block};
use mapi_protocol::core::codec::BlockCodec;
use mapi_protocol::protocol::challenge::{Challenge, MIN_CHALLENGE_TOKENS};
use mapi_protocol::protocol::dispatcher::{chunk_count, send_query};
use mapi_protocol::protocol::response::{classify, ResponseLine};
use mapi_protocol::transport::{ChannelOptions, ConnectionChannel};
use mapi_protocol::utils::metrics::Metrics;
use proptest::prelude::*;
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder, Framed};

/// Run a query through a channel and collect the blocks the server sees
fn dispatch(sql: &str, chunk_size: usize) -> Vec<Block> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");

    runtime.block_on(async {
        let (client, server) = tokio::io::duplex(1 << 20);
        let mut channel =
            ConnectionChannel::from_stream(client, ChannelOptions::default(), Arc::new(Metrics::new()));
        let mut server = Framed::new(server, BlockCodec);

        send_query(&mut channel, sql, chunk_size).await.expect("send");

        let mut blocks = Vec::new();
        loop {
            let block = server.next().await.expect("block").expect("valid");
            let last = block.last;
            blocks.push(block);
            if last {
                return blocks;
            }
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Property: a query of L bytes produces floor((L-1)/chunk) continuation writes
    #[test]
    fn prop_continuation_write_count(len in 1usize..5000) {
        let sql = "v".repeat(len);
        let blocks = dispatch(&sql, MAX_QUERY_CHUNK);

        let continuation = blocks.iter().filter(|b| !b.last).count();
        prop_assert_eq!(continuation, (len - 1) / MAX_QUERY_CHUNK);
        prop_assert_eq!(blocks.len(), chunk_count(len, MAX_QUERY_CHUNK));
    }

    // Property: the server always receives `s`, the body, and exactly one `;\n`
    #[test]
    fn prop_query_body_and_single_terminator(
        body in "[a-zA-Z0-9 ,()*=']{0,3000}",
        separators in 0usize..4,
    ) {
        let sql = format!("{}{}", body, ";".repeat(separators));
        let blocks = dispatch(&sql, MAX_QUERY_CHUNK);
        let sent: Vec<u8> = blocks.iter().flat_map(|b| b.payload.iter().copied()).collect();

        let mut expected = vec![b's'];
        expected.extend_from_slice(body.as_bytes());
        expected.extend_from_slice(b";\n");
        prop_assert_eq!(sent, expected);
    }

    // Property: splitting keeps every byte, respects the size limit, flags once
    #[test]
    fn prop_split_preserves_payload(
        payload in prop::collection::vec(any::<u8>(), 0..(3 * MAX_BLOCK_SIZE)),
        final_write in any::<bool>(),
    ) {
        let blocks = split_message(BytesMut::from(&payload[..]), MAX_BLOCK_SIZE, final_write);

        let joined: Vec<u8> = blocks.iter().flat_map(|b| b.payload.iter().copied()).collect();
        prop_assert_eq!(joined, payload);
        prop_assert!(blocks.iter().all(|b| b.payload.len() <= MAX_BLOCK_SIZE));
        prop_assert_eq!(blocks.iter().filter(|b| b.last).count(), usize::from(final_write));
    }

    // Property: the decoder is indifferent to where reads are cut
    #[test]
    fn prop_decoder_any_cut_point(
        payload in prop::collection::vec(any::<u8>(), 0..512),
        cut in any::<prop::sample::Index>(),
    ) {
        let mut codec = BlockCodec;
        let mut wire = BytesMut::new();
        codec.encode(Block::new(payload.clone(), true), &mut wire).unwrap();

        let at = cut.index(wire.len() + 1);
        let mut buf = BytesMut::from(&wire[..at]);
        let early = codec.decode(&mut buf).unwrap();
        if at < wire.len() {
            prop_assert!(early.is_none());
            buf.extend_from_slice(&wire[at..]);
            let block = codec.decode(&mut buf).unwrap().expect("complete");
            prop_assert_eq!(&block.payload[..], &payload[..]);
        } else {
            let block = early.expect("complete");
            prop_assert_eq!(&block.payload[..], &payload[..]);
        }
    }

    // Property: classification only looks at the first character
    #[test]
    fn prop_marker_classification(rest in "[^\n]{0,64}") {
        prop_assert_eq!(classify(&format!("!{rest}")), ResponseLine::Error(rest.clone()));
        prop_assert_eq!(classify(&format!("#{rest}")), ResponseLine::Info(rest.clone()));
        prop_assert_eq!(classify(&format!("^{rest}")), ResponseLine::Redirect(rest.clone()));
        prop_assert_eq!(classify(&format!("\u{1}{rest}")), ResponseLine::Prompt);
    }

    // Property: lines without a marker come back whole
    #[test]
    fn prop_unmarked_lines_unclassified(line in "[a-z0-9 .]{1,64}") {
        prop_assume!(line != ".");
        prop_assert_eq!(classify(&line), ResponseLine::Unclassified(line.clone()));
    }

    // Property: challenge parsing accepts exactly the lines with enough fields
    #[test]
    fn prop_challenge_token_threshold(fields in prop::collection::vec("[A-Za-z0-9,]{0,12}", 1..9)) {
        let line = fields.join(":");
        let parsed = Challenge::parse(&line);
        prop_assert_eq!(parsed.is_ok(), fields.len() >= MIN_CHALLENGE_TOKENS);
        if let Ok(challenge) = parsed {
            prop_assert_eq!(challenge.tokens(), &fields[..]);
        }
    }
}
