//! TCP request server
//!
//! Accepts connections, reads NDJSON requests with raw file bodies (see
//! [`protocol`]) and runs each analysis or transposition on the blocking
//! thread pool. The retention sweep runs for as long as the server does.

mod handler;
pub mod protocol;

use crate::config::ServiceConfig;
use crate::error::AudioError;
use crate::service::KeyService;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

use handler::handle_connection;

/// Server result type
pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Socket and protocol errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// Listener could not be set up
    #[error("Connection error: {0}")]
    Connection(String),
    /// Socket I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A message could not be encoded or decoded
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Service could not be initialised
    #[error("Service error: {0}")]
    Service(#[from] AudioError),
}

/// Bound server, ready to [`run`](KeyServer::run)
pub struct KeyServer {
    service: Arc<KeyService>,
    listener: TcpListener,
}

impl KeyServer {
    /// Create the service (and its transient directory) and bind the listener
    pub async fn bind(config: ServiceConfig) -> ServerResult<Self> {
        let addr = config.listen_addr.clone();
        let service = KeyService::new(config)?;

        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                ServerError::Connection(format!(
                    "Address {} is already in use. Is another instance running?",
                    addr
                ))
            } else {
                ServerError::Connection(format!("Failed to bind {}: {}", addr, e))
            }
        })?;

        Ok(Self {
            service: Arc::new(service),
            listener,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared service
    pub fn service(&self) -> &Arc<KeyService> {
        &self.service
    }

    /// Serve until `shutdown` completes
    ///
    /// Starts the retention sweep first and stops it before returning.
    pub async fn run<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        log::info!("Listening on {}", self.local_addr()?);
        let sweep = self.service.start_retention();

        let result = tokio::select! {
            _ = shutdown => {
                log::info!("Shutdown signal received, stopping server");
                Ok(())
            }
            result = Self::accept_loop(&self.listener, Arc::clone(&self.service)) => result,
        };

        sweep.shutdown().await;
        result
    }

    async fn accept_loop(listener: &TcpListener, service: Arc<KeyService>) -> ServerResult<()> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    log::debug!("Connection from {}", peer);
                    let service = Arc::clone(&service);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, service).await {
                            log::warn!("Error handling connection from {}: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    log::warn!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
