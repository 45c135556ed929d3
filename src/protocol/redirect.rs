//! Redirect targets and the reconnect that follows them.
//!
//! A redirect payload is URI shaped:
//!
//! ```text
//! mapi:monetdb://host:port/database?lang=sql
//! ```
//!
//! Following one is a hard cut: the current socket is dropped without a
//! logout exchange, and a brand-new channel runs a fresh handshake with the
//! same credentials against the target database.

use crate::config::DEFAULT_PORT;
use crate::error::{MapiError, Result};
use crate::protocol::handshake::{authenticate, HandshakeOutcome, Login};
use crate::protocol::registry::HandlerRegistry;
use crate::session::Credentials;
use crate::transport::{ChannelOptions, ConnectionChannel};
use crate::utils::metrics::Metrics;

use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};
use url::{Host, Url};

const MAPI_PREFIX: &str = "mapi:";

/// Where a redirect points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl RedirectTarget {
    /// Parse a redirect payload.
    ///
    /// # Errors
    /// `ProtocolError` when the URI does not parse or names no host or
    /// database.
    pub fn parse(uri: &str) -> Result<Self> {
        let trimmed = uri.trim();
        let without_prefix = trimmed.strip_prefix(MAPI_PREFIX).unwrap_or(trimmed);

        let url = Url::parse(without_prefix)
            .map_err(|e| MapiError::ProtocolError(format!("Invalid redirect '{uri}': {e}")))?;

        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => {
                return Err(MapiError::ProtocolError(format!(
                    "Redirect '{uri}' does not name a host"
                )))
            }
        };

        // path() never includes the query string
        let database = url.path().trim_start_matches('/').to_string();
        if database.is_empty() {
            return Err(MapiError::ProtocolError(format!(
                "Redirect '{uri}' does not name a database"
            )));
        }

        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            database,
        })
    }
}

impl fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.database)
    }
}

/// Connection parameters carried across a redirect
pub struct RedirectContext<'a> {
    pub registry: &'a HandlerRegistry,
    pub credentials: &'a Credentials,
    pub hash_override: Option<&'a str>,
    pub options: ChannelOptions,
    pub metrics: Arc<Metrics>,
}

/// Drop `current` and log in again at `target`.
///
/// Returns the new channel together with its handshake outcome; warnings
/// collected on the old connection are not carried over.
#[instrument(skip_all, fields(target = %target))]
pub async fn follow(
    current: &mut ConnectionChannel,
    target: &RedirectTarget,
    ctx: RedirectContext<'_>,
) -> Result<(ConnectionChannel, HandshakeOutcome)> {
    info!(from = %current.peer(), "Following redirect");
    current.close();
    ctx.metrics.redirect_followed();

    let mut channel =
        ConnectionChannel::open(&target.host, target.port, ctx.options, ctx.metrics).await?;
    let login = Login {
        credentials: ctx.credentials,
        database: &target.database,
        hash_override: ctx.hash_override,
    };
    let outcome = authenticate(&mut channel, ctx.registry, &login).await?;
    Ok((channel, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_uri() {
        let target = RedirectTarget::parse("mapi:monetdb://replica.local:50001/sales?lang=sql").unwrap();
        assert_eq!(
            target,
            RedirectTarget {
                host: "replica.local".into(),
                port: 50001,
                database: "sales".into(),
            }
        );
    }

    #[test]
    fn test_parse_defaults_port() {
        let target = RedirectTarget::parse("monetdb://10.0.0.7/demo").unwrap();
        assert_eq!(target.host, "10.0.0.7");
        assert_eq!(target.port, DEFAULT_PORT);
        assert_eq!(target.database, "demo");
    }

    #[test]
    fn test_parse_ipv6_host() {
        let target = RedirectTarget::parse("mapi:monetdb://[::1]:50002/demo").unwrap();
        assert_eq!(target.host, "::1");
        assert_eq!(target.port, 50002);
    }

    #[test]
    fn test_parse_rejects_missing_parts() {
        assert!(matches!(
            RedirectTarget::parse("mapi:monetdb://host:50000/"),
            Err(MapiError::ProtocolError(_))
        ));
        assert!(matches!(
            RedirectTarget::parse("not a uri"),
            Err(MapiError::ProtocolError(_))
        ));
    }
}
