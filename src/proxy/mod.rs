//! Standalone gateway mode: serve the enforcing router and relay allowed
//! requests to the upstream application.

pub mod forward;

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{PiiGuardError, Result};

pub struct ProxyServer {
    listen_addr: String,
    app: Router,
}

impl ProxyServer {
    pub fn new(listen_addr: String, app: Router) -> Self {
        Self { listen_addr, app }
    }

    /// Start serving in the background and return the actual bound address.
    pub async fn start(self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .map_err(|e| PiiGuardError::Server(format!("bind {}: {}", self.listen_addr, e)))?;
        let local_addr = listener.local_addr()?;
        info!("piiguard listening on {}", local_addr);

        let app = self.app;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("server stopped: {}", e);
            }
        });

        Ok(local_addr)
    }
}
