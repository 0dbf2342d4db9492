//! Minimal guarded HTTP responder.
//!
//! # Responsibilities
//! - Accept connections and consult the connection guard
//! - Read one request, extract the User-Agent, consult the request guard
//! - Write the fixed page or close silently on denial
//! - Release the per-source slot on every exit path
//! - Drain in-flight connections on shutdown, bounded by the read timeout

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time;

use crate::config::ListenerConfig;
use crate::guard::{ConnectionGuard, RequestGuard, SourceKey};
use crate::http::request::extract_user_agent;
use crate::http::response::ok_response;
use crate::net::{AdmissionLease, ConnectionPermit, Listener, ListenerError};
use crate::observability::logging::SECURITY_TARGET;

#[derive(Debug, Error)]
enum ServeError {
    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Served,
    Blocked,
    /// Peer closed before sending anything.
    Empty,
}

/// Accept loop wired to both guards.
pub struct GuardServer {
    config: ListenerConfig,
    connections: Arc<ConnectionGuard>,
    requests: Arc<RequestGuard>,
}

impl GuardServer {
    pub fn new(
        config: ListenerConfig,
        connections: Arc<ConnectionGuard>,
        requests: Arc<RequestGuard>,
    ) -> Self {
        Self {
            config,
            connections,
            requests,
        }
    }

    /// Serve until `shutdown` fires, then wait for admitted connections to
    /// finish. Handlers still running after `read_timeout` are aborted.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %addr, "Server started");

        let mut in_flight = JoinSet::new();
        let result = loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.dispatch(&mut in_flight, stream, peer, permit),
                    Err(ListenerError::Closed) => break Err(ListenerError::Closed),
                    Err(e) => tracing::error!(error = %e, "Error accepting client"),
                },
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                _ = shutdown.recv() => {
                    tracing::info!("Server received shutdown signal, no longer accepting");
                    break Ok(());
                }
            }
        };

        self.drain(in_flight).await;
        result
    }

    async fn drain(&self, mut in_flight: JoinSet<()>) {
        if in_flight.is_empty() {
            return;
        }

        let pending = in_flight.len();
        let grace = self.config.read_timeout();
        tracing::info!(pending, ?grace, "Waiting for in-flight connections");

        let drained = time::timeout(grace, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(remaining = in_flight.len(), "Aborting connections still open after grace period");
            in_flight.abort_all();
            while in_flight.join_next().await.is_some() {}
        }
    }

    fn dispatch(
        &self,
        in_flight: &mut JoinSet<()>,
        stream: TcpStream,
        peer: SocketAddr,
        permit: ConnectionPermit,
    ) {
        let Some(lease) = AdmissionLease::acquire(&self.connections, peer.ip()) else {
            tracing::warn!(target: SECURITY_TARGET, source = %SourceKey::from(peer), "Connection blocked");
            return;
        };

        tracing::info!(connection_id = %lease.id(), source = %lease.source(), "New connection accepted");

        let requests = Arc::clone(&self.requests);
        let read_timeout = self.config.read_timeout();
        let buffer_bytes = self.config.read_buffer_bytes;
        in_flight.spawn(async move {
            let _permit = permit;
            handle_client(stream, lease, &requests, read_timeout, buffer_bytes).await;
        });
    }
}

async fn handle_client(
    mut stream: TcpStream,
    lease: AdmissionLease,
    requests: &RequestGuard,
    read_timeout: Duration,
    buffer_bytes: usize,
) {
    let id = lease.id();
    let source = lease.source();

    match serve(&mut stream, source, requests, read_timeout, buffer_bytes).await {
        Ok(Outcome::Served) => tracing::debug!(connection_id = %id, %source, "Sent response"),
        Ok(Outcome::Blocked) => {
            tracing::warn!(target: SECURITY_TARGET, connection_id = %id, %source, "Blocked suspicious activity")
        }
        Ok(Outcome::Empty) => tracing::debug!(connection_id = %id, %source, "Client sent no data"),
        Err(e) => tracing::warn!(connection_id = %id, %source, error = %e, "Error handling client"),
    }

    let _ = stream.shutdown().await;
    drop(lease);
    tracing::info!(connection_id = %id, %source, "Connection closed");
}

async fn serve(
    stream: &mut TcpStream,
    source: SourceKey,
    requests: &RequestGuard,
    read_timeout: Duration,
    buffer_bytes: usize,
) -> Result<Outcome, ServeError> {
    let mut buffer = vec![0u8; buffer_bytes];
    let read = time::timeout(read_timeout, stream.read(&mut buffer))
        .await
        .map_err(|_| ServeError::Timeout(read_timeout))??;
    if read == 0 {
        return Ok(Outcome::Empty);
    }

    let request = String::from_utf8_lossy(&buffer[..read]);
    if !requests.try_admit(source, extract_user_agent(&request)) {
        return Ok(Outcome::Blocked);
    }

    stream.write_all(ok_response().as_bytes()).await?;
    Ok(Outcome::Served)
}
