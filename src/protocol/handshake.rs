//! Challenge-response login.
//!
//! The server speaks first: one challenge line, then a prompt. The client
//! answers with a single line built by the [`ProtocolHandler`] registered for
//! the challenge's protocol version, then drains the server's reply block up
//! to the terminator line.
//!
//! A reply block may carry warnings (kept, in order), redirects (only the
//! first is acted upon) or an error (aborts the login). The channel is closed
//! before any error leaves this module.

use crate::config::DEFAULT_LANGUAGE;
use crate::error::{constants, MapiError, Result};
use crate::protocol::challenge::Challenge;
use crate::protocol::handler::{LoginRequest, ProtocolHandler};
use crate::protocol::registry::HandlerRegistry;
use crate::protocol::response::{classify, ResponseLine};
use crate::session::Credentials;
use crate::transport::ConnectionChannel;
use crate::utils::metrics::Timer;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, instrument, warn};

/// What the server decided after accepting the login response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Logged in; warnings in the order the server sent them
    Ready { warnings: Vec<String> },
    /// Go elsewhere; the first redirect URI the server listed
    Redirect { target: String },
}

/// Login parameters for one handshake
#[derive(Debug, Clone, Copy)]
pub struct Login<'a> {
    pub credentials: &'a Credentials,
    pub database: &'a str,
    /// Explicit digest algorithm, `None` to let the handler choose
    pub hash_override: Option<&'a str>,
}

/// Run one handshake on a freshly opened channel.
///
/// # Errors
/// - `ProtocolError` for a malformed challenge or non-numeric version
/// - `UnsupportedProtocol` when no handler is registered for the version
/// - `ServerError` when the server rejects the login
/// - `ConnectionLost` when the stream ends or an empty line arrives early
///
/// On every error the channel has already been closed.
#[instrument(skip_all, fields(peer = %channel.peer(), database = %login.database))]
pub async fn authenticate<S>(
    channel: &mut ConnectionChannel<S>,
    registry: &HandlerRegistry,
    login: &Login<'_>,
) -> Result<HandshakeOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _timer = Timer::start("handshake");
    let metrics = channel.metrics().clone();
    metrics.handshake_attempt();

    match exchange(channel, registry, login).await {
        Ok(outcome) => {
            metrics.handshake_success();
            Ok(outcome)
        }
        Err(e) => {
            metrics.handshake_failed();
            if matches!(e, MapiError::ServerError(_)) {
                metrics.server_error();
            }
            debug!(error = %e, "Handshake failed, closing channel");
            channel.close();
            Err(e)
        }
    }
}

async fn exchange<S>(
    channel: &mut ConnectionChannel<S>,
    registry: &HandlerRegistry,
    login: &Login<'_>,
) -> Result<HandshakeOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let challenge_line = channel.read_line().await?;
    // Prompt that precedes the server accepting input; consumed unused
    channel.read_line().await?;

    let challenge = Challenge::parse(&challenge_line)?;
    let version = challenge.version()?;
    let handler = registry.resolve(version)?;
    debug!(
        version,
        server = challenge.server_id(),
        hashes = ?challenge.hash_algorithms(),
        "Challenge received"
    );

    let response = build_login_response(handler, &challenge, login)?;
    channel.write_line(&response).await?;

    drain_reply(channel).await
}

/// Invoke `handler` with the challenge tokens and login parameters
pub fn build_login_response(
    handler: &dyn ProtocolHandler,
    challenge: &Challenge,
    login: &Login<'_>,
) -> Result<String> {
    let request = LoginRequest {
        username: login.credentials.username(),
        password: login.credentials.password(),
        language: DEFAULT_LANGUAGE,
        tokens: challenge.tokens(),
        database: login.database,
        hash_override: login.hash_override,
    };
    handler.build_response(&request)
}

async fn drain_reply<S>(channel: &mut ConnectionChannel<S>) -> Result<HandshakeOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut warnings = Vec::new();
    let mut redirects = Vec::new();

    loop {
        let line = channel.read_line().await?;
        if line.is_empty() {
            return Err(MapiError::ConnectionLost(constants::ERR_EMPTY_LINE.into()));
        }

        match classify(&line) {
            ResponseLine::Terminator => break,
            ResponseLine::Error(message) => return Err(MapiError::ServerError(message)),
            ResponseLine::Info(message) => {
                warn!(warning = %message, "Server warning during login");
                warnings.push(message);
            }
            ResponseLine::Redirect(target) => redirects.push(target),
            other => debug!(kind = other.kind(), "Ignoring line in login reply"),
        }
    }

    let mut candidates = redirects.into_iter();
    match candidates.next() {
        Some(target) => {
            let discarded: Vec<String> = candidates.collect();
            if !discarded.is_empty() {
                debug!(?discarded, "Following first redirect only");
            }
            Ok(HandshakeOutcome::Redirect { target })
        }
        None => Ok(HandshakeOutcome::Ready { warnings }),
    }
}
