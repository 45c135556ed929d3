//! Sessions and the factory that opens them.
//!
//! A [`SessionFactory`] owns everything shared between connections: the
//! validated [`MapiConfig`], the [`HandlerRegistry`] consulted during login
//! and the [`Metrics`] every channel reports into. Each successful
//! [`SessionFactory::connect`] yields one [`Session`] holding exactly one
//! live channel.
//!
//! ```no_run
//! use mapi_protocol::config::MapiConfig;
//! use mapi_protocol::session::SessionFactory;
//!
//! # async fn run() -> mapi_protocol::error::Result<()> {
//! let factory = SessionFactory::new(MapiConfig::default())?;
//! let (mut session, warnings) = factory.connect("monetdb").await?;
//! for warning in &warnings {
//!     println!("server warning: {warning}");
//! }
//! session.set_autocommit(true).await?;
//! session.execute("SELECT 1").await?;
//! while !session.next_response().await?.is_terminator() {}
//! session.close();
//! # Ok(())
//! # }
//! ```

use crate::config::MapiConfig;
use crate::error::{constants, MapiError, Result};
use crate::protocol::dispatcher::{send_control, send_query};
use crate::protocol::handshake::{authenticate, HandshakeOutcome, Login};
use crate::protocol::redirect::{self, RedirectContext, RedirectTarget};
use crate::protocol::registry::HandlerRegistry;
use crate::protocol::response::{classify, ResponseLine};
use crate::transport::{ChannelOptions, CloseHandle, ConnectionChannel, FrameState};
use crate::utils::metrics::Metrics;

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{info, instrument};

/// Login credentials. The password never shows up in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One authenticated connection
pub struct Session<S = TcpStream> {
    host: String,
    port: u16,
    username: String,
    database: String,
    created_at: SystemTime,
    chunk_size: usize,
    channel: ConnectionChannel<S>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a channel that has already completed its handshake
    pub fn from_channel(
        channel: ConnectionChannel<S>,
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        database: impl Into<String>,
        chunk_size: usize,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            database: database.into(),
            created_at: SystemTime::now(),
            chunk_size,
            channel,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn state(&self) -> FrameState {
        self.channel.state()
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.channel.close_handle()
    }

    /// Send one SQL statement; read its reply with [`Self::next_response`]
    pub async fn execute(&mut self, sql: &str) -> Result<()> {
        send_query(&mut self.channel, sql, self.chunk_size).await
    }

    /// Send a control command and wait for the prompt
    pub async fn control(&mut self, statement: &str) -> Result<()> {
        send_control(&mut self.channel, statement).await
    }

    pub async fn set_autocommit(&mut self, enabled: bool) -> Result<()> {
        self.control(&format!("auto_commit {}", u8::from(enabled)))
            .await
    }

    /// Rows per result page; `-1` asks for everything at once
    pub async fn set_reply_size(&mut self, rows: i64) -> Result<()> {
        self.control(&format!("reply_size {rows}")).await
    }

    /// Read and classify the next reply line
    pub async fn next_response(&mut self) -> Result<ResponseLine> {
        let line = self.channel.read_line().await?;
        Ok(classify(&line))
    }

    pub async fn read_line(&mut self) -> Result<String> {
        self.channel.read_line().await
    }

    /// Drop the transport. Idempotent.
    pub fn close(&mut self) {
        self.channel.close();
    }
}

impl<S> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("database", &self.database)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Opens sessions with shared configuration, handlers and metrics
#[derive(Debug, Clone)]
pub struct SessionFactory {
    registry: Arc<HandlerRegistry>,
    config: MapiConfig,
    metrics: Arc<Metrics>,
}

impl SessionFactory {
    /// Factory with the built-in version 8 and 9 handlers.
    ///
    /// # Errors
    /// `ConfigError` if `config` does not validate.
    pub fn new(config: MapiConfig) -> Result<Self> {
        Self::with_registry(config, HandlerRegistry::with_defaults())
    }

    pub fn with_registry(config: MapiConfig, registry: HandlerRegistry) -> Result<Self> {
        config.validate_strict()?;
        Ok(Self {
            registry: Arc::new(registry),
            config,
            metrics: Arc::new(Metrics::new()),
        })
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MapiConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Connect to the configured host and database as the configured user
    pub async fn connect(&self, password: &str) -> Result<(Session, Vec<String>)> {
        let client = &self.config.client;
        let credentials = Credentials::new(client.username.as_str(), password);
        self.connect_to(&client.host, client.port, &client.database, &credentials)
            .await
    }

    /// Connect and log in, following at most one redirect.
    ///
    /// Returns the session together with the login warnings of the
    /// connection that was finally kept.
    #[instrument(skip(self, credentials), fields(user = %credentials.username()))]
    pub async fn connect_to(
        &self,
        host: &str,
        port: u16,
        database: &str,
        credentials: &Credentials,
    ) -> Result<(Session, Vec<String>)> {
        let options = ChannelOptions::from_config(&self.config);
        let hash_override = self.config.client.hash_algorithm.as_deref();

        let mut channel =
            ConnectionChannel::open(host, port, options.clone(), self.metrics.clone()).await?;
        let login = Login {
            credentials,
            database,
            hash_override,
        };

        let uri = match authenticate(&mut channel, &self.registry, &login).await? {
            HandshakeOutcome::Ready { warnings } => {
                info!(host, port, database, "Session established");
                return Ok((self.session(channel, host, port, credentials, database), warnings));
            }
            HandshakeOutcome::Redirect { target } => target,
        };

        let target = match RedirectTarget::parse(&uri) {
            Ok(target) => target,
            Err(e) => {
                channel.close();
                return Err(e);
            }
        };

        let ctx = RedirectContext {
            registry: &self.registry,
            credentials,
            hash_override,
            options,
            metrics: self.metrics.clone(),
        };
        let (mut redirected, outcome) = redirect::follow(&mut channel, &target, ctx).await?;

        match outcome {
            HandshakeOutcome::Ready { warnings } => {
                info!(target = %target, "Session established after redirect");
                let session = self.session(
                    redirected,
                    &target.host,
                    target.port,
                    credentials,
                    &target.database,
                );
                Ok((session, warnings))
            }
            HandshakeOutcome::Redirect { target: next } => {
                redirected.close();
                Err(MapiError::ProtocolError(format!(
                    "{}: {next}",
                    constants::ERR_TOO_MANY_REDIRECTS
                )))
            }
        }
    }

    fn session(
        &self,
        channel: ConnectionChannel,
        host: &str,
        port: u16,
        credentials: &Credentials,
        database: &str,
    ) -> Session {
        Session::from_channel(
            channel,
            host,
            port,
            credentials.username(),
            database,
            self.config.transport.query_chunk_size,
        )
    }
}
