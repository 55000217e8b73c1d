// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared transport context and open-endpoint registry
//!
//! A [`TransportContext`] is a cheap, cloneable handle. Every endpoint is
//! created from it and registers itself for as long as it stays open.
//! ZMQ only tears the context down once all sockets are gone, so
//! [`TransportContext::terminate`] refuses while the registry is non-empty.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::common::{EndpointRole, TransportError, TransportResult};

/// Info about one open endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenEndpoint {
    pub id: u64,
    pub role: EndpointRole,
    pub address: String,
}

/// Tracks endpoints that are currently open on a context
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    next_id: AtomicU64,
    open: Mutex<BTreeMap<u64, OpenEndpoint>>,
}

impl EndpointRegistry {
    pub(crate) fn register(&self, role: EndpointRole, address: &str) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.open.lock().insert(
            id,
            OpenEndpoint {
                id,
                role,
                address: address.to_string(),
            },
        );
        id
    }

    /// Returns false if the id was not registered
    pub(crate) fn deregister(&self, id: u64) -> bool {
        self.open.lock().remove(&id).is_some()
    }

    /// Number of endpoints currently open
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    /// Snapshot of open endpoints, oldest first
    pub fn open_endpoints(&self) -> Vec<OpenEndpoint> {
        self.open.lock().values().cloned().collect()
    }
}

struct ContextInner {
    zmq: zmq::Context,
    registry: Arc<EndpointRegistry>,
}

/// Process-wide transport context shared by all endpoints
#[derive(Clone)]
pub struct TransportContext {
    inner: Arc<ContextInner>,
}

impl TransportContext {
    /// Create a context with ZMQ's default I/O thread count
    pub fn new() -> TransportResult<Self> {
        Ok(Self::from_zmq(zmq::Context::new()))
    }

    fn from_zmq(zmq: zmq::Context) -> Self {
        debug!("[ZMQ-CTX] Transport context created");
        Self {
            inner: Arc::new(ContextInner {
                zmq,
                registry: Arc::new(EndpointRegistry::default()),
            }),
        }
    }

    pub(crate) fn zmq(&self) -> &zmq::Context {
        &self.inner.zmq
    }

    /// Registry of endpoints open on this context
    pub fn registry(&self) -> &EndpointRegistry {
        &self.inner.registry
    }

    pub(crate) fn registry_handle(&self) -> Arc<EndpointRegistry> {
        Arc::clone(&self.inner.registry)
    }

    /// Terminate the context
    ///
    /// Consumes this handle. The ZMQ context is torn down here only when no
    /// endpoint is open and no other handle exists; otherwise teardown is left
    /// to the last owner and the reason is returned.
    ///
    /// # Errors
    /// - [`TransportError::EndpointsStillOpen`] if endpoints are registered
    /// - [`TransportError::ContextInUse`] if other handles are alive
    pub fn terminate(self) -> TransportResult<()> {
        let open = self.inner.registry.open_count();
        if open > 0 {
            for endpoint in self.inner.registry.open_endpoints() {
                warn!(
                    "[ZMQ-CTX] Endpoint #{} ({} {}) still open",
                    endpoint.id, endpoint.role, endpoint.address
                );
            }
            return Err(TransportError::EndpointsStillOpen(open));
        }

        match Arc::try_unwrap(self.inner) {
            Ok(inner) => {
                // Last handle: zmq_ctx_term runs here with no sockets left
                drop(inner);
                info!("[ZMQ-CTX] Transport context terminated");
                Ok(())
            }
            Err(_) => Err(TransportError::ContextInUse),
        }
    }
}

impl std::fmt::Debug for TransportContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportContext")
            .field("open_endpoints", &self.inner.registry.open_count())
            .finish()
    }
}
