use crate::error::{MapiError, Result};
use crate::protocol::handler::{ProtocolHandler, V8Handler, V9Handler};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Immutable table from protocol version to login response builder.
///
/// Built once (usually by the session factory) and shared read-only after
/// that; lookups are exact, with no fallback to a neighbouring version.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<u32, Arc<dyn ProtocolHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with the built-in version 8 and 9 handlers
    pub fn with_defaults() -> Self {
        Self::new()
            .register(8, V8Handler)
            .register(9, V9Handler)
    }

    /// Add or replace the handler for `version`
    pub fn register<H>(mut self, version: u32, handler: H) -> Self
    where
        H: ProtocolHandler + 'static,
    {
        self.handlers.insert(version, Arc::new(handler));
        self
    }

    pub fn get(&self, version: u32) -> Option<&dyn ProtocolHandler> {
        self.handlers.get(&version).map(|handler| handler.as_ref())
    }

    /// Look up the handler for `version`.
    ///
    /// # Errors
    /// `UnsupportedProtocol(version)` when nothing is registered for it.
    pub fn resolve(&self, version: u32) -> Result<&dyn ProtocolHandler> {
        self.get(version)
            .ok_or(MapiError::UnsupportedProtocol(version))
    }

    /// Registered versions, ascending
    pub fn versions(&self) -> Vec<u32> {
        let mut versions: Vec<u32> = self.handlers.keys().copied().collect();
        versions.sort_unstable();
        versions
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("versions", &self.versions())
            .finish()
    }
}
