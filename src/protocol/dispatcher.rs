//! Outbound command dispatch.
//!
//! Queries are sent as `s<sql>;` in chunks of at most `chunk_size` bytes.
//! Every chunk but the last travels as a continuation fragment, so the
//! server keeps reading until the final chunk (the only one carrying the
//! separator and line terminator) arrives.
//!
//! Control commands are administrative statements sent as one `X<statement>`
//! line and acknowledged by a single prompt or error line.

use crate::error::{constants, MapiError, Result};
use crate::protocol::response::{classify, ResponseLine};
use crate::transport::{ConnectionChannel, FrameState};

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, instrument};

/// Command-type marker for a statement start
pub const MSG_QUERY: u8 = b's';
/// Command-type marker for a control command
pub const MSG_CONTROL: char = 'X';
/// Statement separator appended to every query
pub const STATEMENT_SEPARATOR: u8 = b';';

/// Send `sql` as one query.
///
/// The channel must be `Idle`. On a transport failure the channel is closed
/// before the error is returned, so a half-sent query never leaves an open
/// socket behind.
#[instrument(skip_all, fields(peer = %channel.peer(), len = sql.len()))]
pub async fn send_query<S>(channel: &mut ConnectionChannel<S>, sql: &str, chunk_size: usize) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    channel.ensure_idle()?;

    match write_query(channel, sql.as_bytes(), chunk_size.max(1)).await {
        Ok(()) => {
            channel.metrics().query_sent();
            Ok(())
        }
        Err(e) => {
            debug!(error = %e, "Query dispatch failed, closing channel");
            channel.close();
            Err(e)
        }
    }
}

async fn write_query<S>(channel: &mut ConnectionChannel<S>, sql: &[u8], chunk_size: usize) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Bytes past `body_len` are trailing separators and are never sent
    let body_len = trimmed_len(sql);
    let chunk_count = chunk_count(sql.len(), chunk_size);

    for index in 0..chunk_count {
        let start = index * chunk_size;
        let end = (start + chunk_size).min(sql.len());
        let body = &sql[start.min(body_len)..end.min(body_len)];

        let mut payload = Vec::with_capacity(body.len() + 3);
        if channel.state() == FrameState::Idle {
            payload.push(MSG_QUERY);
        }
        payload.extend_from_slice(body);

        if index + 1 < chunk_count {
            channel.write_fragment(&payload).await?;
        } else {
            payload.push(STATEMENT_SEPARATOR);
            payload.push(b'\n');
            channel.write_final(&payload).await?;
        }
    }

    Ok(())
}

/// Number of physical writes for a query of `len` bytes (at least one)
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    let chunk_size = chunk_size.max(1);
    len.div_ceil(chunk_size).max(1)
}

/// Length of `sql` without its trailing statement separators
pub fn trimmed_len(sql: &[u8]) -> usize {
    sql.iter()
        .rposition(|&b| b != STATEMENT_SEPARATOR)
        .map_or(0, |pos| pos + 1)
}

/// Send a control command and wait for its acknowledgement.
///
/// # Errors
/// - `ServerError` carrying the error line minus its marker
/// - `ConnectionLost` on an empty reply line or a closed stream
/// - `ProtocolError` for any other reply line
#[instrument(skip_all, fields(peer = %channel.peer(), statement = %statement))]
pub async fn send_control<S>(channel: &mut ConnectionChannel<S>, statement: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    channel.ensure_idle()?;

    let result = control_exchange(channel, statement).await;
    match &result {
        Ok(()) => channel.metrics().control_sent(),
        Err(MapiError::ServerError(_)) => {
            channel.metrics().control_sent();
            channel.metrics().server_error();
        }
        Err(e) if e.is_fatal() => {
            debug!(error = %e, "Control command failed, closing channel");
            channel.close();
        }
        Err(_) => {}
    }
    result
}

async fn control_exchange<S>(channel: &mut ConnectionChannel<S>, statement: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut line = String::with_capacity(statement.len() + 1);
    line.push(MSG_CONTROL);
    line.push_str(statement);
    channel.write_line(&line).await?;

    let reply = channel.read_line().await?;
    if reply.is_empty() {
        return Err(MapiError::ConnectionLost(constants::ERR_EMPTY_LINE.into()));
    }

    match classify(&reply) {
        ResponseLine::Prompt => Ok(()),
        ResponseLine::Error(message) => Err(MapiError::ServerError(message)),
        other => Err(MapiError::ProtocolError(format!(
            "Unexpected {} line in control reply: {reply:?}",
            other.kind()
        ))),
    }
}
