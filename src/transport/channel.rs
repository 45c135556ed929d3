//! Line-oriented channel over the block transport.
//!
//! A [`ConnectionChannel`] owns one byte stream (a TCP socket in production,
//! any `AsyncRead + AsyncWrite` in tests), frames writes as MAPI blocks and
//! reassembles incoming blocks into `\n`-terminated lines.
//!
//! The channel carries an explicit [`FrameState`]. Only continuation writes
//! move it to `ContinuingQuery`, and only a final write moves it back; every
//! other command refuses to start while a query is still being continued.

use crate::config::{MapiConfig, LINE_TERMINATOR, MAX_BLOCK_SIZE, MAX_LINE_LENGTH};
use crate::core::block::split_message;
use crate::core::codec::BlockCodec;
use crate::error::{constants, MapiError, Result};
use crate::utils::metrics::Metrics;

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

/// Continuation-framing state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Ready for a new top-level command
    Idle,
    /// Fragments of a query have been sent; the server is waiting for more
    ContinuingQuery,
}

/// Channel tuning taken from [`MapiConfig`]
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    pub connect_timeout: Duration,
    pub receive_timeout: Duration,
    pub max_block_size: usize,
    /// Bytes buffered for one unterminated line before the read fails
    pub max_line_length: usize,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::from_config(&MapiConfig::default())
    }
}

impl ChannelOptions {
    pub fn from_config(config: &MapiConfig) -> Self {
        Self {
            connect_timeout: config.client.connect_timeout,
            receive_timeout: config.client.receive_timeout,
            max_block_size: config.transport.max_block_size.clamp(1, MAX_BLOCK_SIZE),
            max_line_length: MAX_LINE_LENGTH,
        }
    }
}

/// Closes a channel from outside the task that owns it.
///
/// Any read or write blocked on the channel fails with
/// [`MapiError::ConnectionLost`] once `close` has been called.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    token: CancellationToken,
}

impl CloseHandle {
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// One transport connection, read and written in lines
pub struct ConnectionChannel<S = TcpStream> {
    framed: Option<Framed<S, BlockCodec>>,
    /// Payload bytes received but not yet returned as lines
    pending: BytesMut,
    state: FrameState,
    options: ChannelOptions,
    close_token: CancellationToken,
    metrics: Arc<Metrics>,
    peer: String,
}

impl ConnectionChannel<TcpStream> {
    /// Open a TCP connection with `TCP_NODELAY` set.
    ///
    /// # Errors
    /// Returns `MapiError::ConnectionError` on any transport failure,
    /// including a connect that outlasts `connect_timeout`.
    #[instrument(skip(options, metrics))]
    pub async fn open(
        host: &str,
        port: u16,
        options: ChannelOptions,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let peer = format!("{host}:{port}");

        let connect = tokio::time::timeout(options.connect_timeout, TcpStream::connect((host, port)));
        let stream = match connect.await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                metrics.connection_error();
                return Err(MapiError::ConnectionError(format!("{peer}: {e}")));
            }
            Err(_) => {
                metrics.connection_error();
                return Err(MapiError::ConnectionError(format!(
                    "{peer}: {}",
                    constants::ERR_CONNECT_TIMEOUT
                )));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            metrics.connection_error();
            return Err(MapiError::ConnectionError(format!("{peer}: {e}")));
        }

        debug!(peer = %peer, "Transport established");
        Ok(Self::from_stream(stream, options, metrics).with_peer(peer))
    }
}

impl<S> ConnectionChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already connected stream
    pub fn from_stream(stream: S, options: ChannelOptions, metrics: Arc<Metrics>) -> Self {
        metrics.connection_established();
        Self {
            framed: Some(Framed::new(stream, BlockCodec)),
            pending: BytesMut::new(),
            state: FrameState::Idle,
            options,
            close_token: CancellationToken::new(),
            metrics,
            peer: String::from("stream"),
        }
    }

    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = peer.into();
        self
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.framed.is_some() && !self.close_token.is_cancelled()
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            token: self.close_token.clone(),
        }
    }

    /// Fail with `InvalidState` unless the channel is `Idle`
    pub fn ensure_idle(&self) -> Result<()> {
        match self.state {
            FrameState::Idle => Ok(()),
            FrameState::ContinuingQuery => {
                Err(MapiError::InvalidState(constants::ERR_CONTINUATION_PENDING))
            }
        }
    }

    /// Read the next line, without its terminator.
    ///
    /// # Errors
    /// `ConnectionLost` if the stream ends before the line completes or the
    /// channel is closed; `Timeout` if no data arrives within the receive
    /// timeout; `ProtocolError` if the line is not valid UTF-8 or grows past
    /// `max_line_length`, in which case the channel is closed.
    pub async fn read_line(&mut self) -> Result<String> {
        let max_line_length = self.options.max_line_length;

        loop {
            let terminator = self.pending.iter().position(|&b| b == LINE_TERMINATOR);
            let line_length = terminator.unwrap_or(self.pending.len());
            if line_length > max_line_length {
                debug!(peer = %self.peer, line_length, max_line_length, "Line too long");
                self.close();
                return Err(MapiError::ProtocolError(constants::ERR_LINE_TOO_LONG.into()));
            }

            if let Some(pos) = terminator {
                let mut raw = self.pending.split_to(pos + 1);
                raw.truncate(pos);
                self.metrics.line_received(pos as u64 + 1);

                let line = String::from_utf8(raw.to_vec())
                    .map_err(|_| MapiError::ProtocolError(constants::ERR_INVALID_UTF8.into()))?;
                trace!(peer = %self.peer, line = %line, "Line received");
                return Ok(line);
            }

            self.fill().await?;
        }
    }

    /// Write `text` followed by the line terminator as one final message
    pub async fn write_line(&mut self, text: &str) -> Result<()> {
        self.ensure_idle()?;
        let mut payload = BytesMut::with_capacity(text.len() + 1);
        payload.extend_from_slice(text.as_bytes());
        payload.extend_from_slice(&[LINE_TERMINATOR]);
        self.send(payload, true).await
    }

    /// Write a continuation fragment and enter `ContinuingQuery`.
    ///
    /// The peer is told more data follows; nothing is terminated.
    pub async fn write_fragment(&mut self, bytes: &[u8]) -> Result<()> {
        self.send(BytesMut::from(bytes), false).await?;
        self.state = FrameState::ContinuingQuery;
        Ok(())
    }

    /// Write the closing piece of a message and return to `Idle`
    pub async fn write_final(&mut self, bytes: &[u8]) -> Result<()> {
        self.send(BytesMut::from(bytes), true).await?;
        self.state = FrameState::Idle;
        Ok(())
    }

    /// Release the transport. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(framed) = self.framed.take() {
            drop(framed);
            self.metrics.connection_closed();
            debug!(peer = %self.peer, "Channel closed");
        }
        self.close_token.cancel();
        self.pending.clear();
        self.state = FrameState::Idle;
    }

    /// Pull one more block into the pending buffer
    async fn fill(&mut self) -> Result<()> {
        let lost = || MapiError::ConnectionLost(constants::ERR_CHANNEL_CLOSED.into());

        if self.close_token.is_cancelled() {
            self.close();
            return Err(lost());
        }
        let framed = self.framed.as_mut().ok_or_else(lost)?;
        let receive_timeout = self.options.receive_timeout;

        let outcome = tokio::select! {
            _ = self.close_token.cancelled() => Err(lost()),
            next = tokio::time::timeout(receive_timeout, framed.next()) => match next {
                Err(_) => Err(MapiError::Timeout),
                Ok(None) => Err(MapiError::ConnectionLost(constants::ERR_STREAM_CLOSED.into())),
                Ok(Some(Err(e))) => Err(into_lost(e)),
                Ok(Some(Ok(block))) => Ok(block),
            },
        };

        match outcome {
            Ok(block) => {
                self.pending.extend_from_slice(&block.payload);
                Ok(())
            }
            Err(e) => {
                if matches!(e, MapiError::ConnectionLost(_)) {
                    self.close();
                }
                Err(e)
            }
        }
    }

    async fn send(&mut self, payload: BytesMut, final_write: bool) -> Result<()> {
        let lost = || MapiError::ConnectionLost(constants::ERR_CHANNEL_CLOSED.into());

        if self.close_token.is_cancelled() {
            self.close();
            return Err(lost());
        }
        let framed = self.framed.as_mut().ok_or_else(lost)?;

        let byte_count = payload.len() as u64;
        let blocks = split_message(payload, self.options.max_block_size, final_write);
        let write = async {
            for block in blocks {
                framed.feed(block).await?;
            }
            framed.flush().await?;
            Ok::<(), MapiError>(())
        };

        let outcome = tokio::select! {
            _ = self.close_token.cancelled() => Err(lost()),
            written = write => written.map_err(into_lost),
        };

        match outcome {
            Ok(()) => {
                self.metrics.write_recorded(byte_count, !final_write);
                trace!(peer = %self.peer, bytes = byte_count, final_write, "Write flushed");
                Ok(())
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }
}

impl<S> Drop for ConnectionChannel<S> {
    fn drop(&mut self) {
        if self.framed.take().is_some() {
            self.metrics.connection_closed();
        }
    }
}

/// Transport-level I/O failures mean the connection is gone
fn into_lost(e: MapiError) -> MapiError {
    match e {
        MapiError::Io(io) => MapiError::ConnectionLost(io.to_string()),
        other => other,
    }
}
