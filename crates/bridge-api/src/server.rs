use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::routes;
use crate::state::AppState;

/// Builds and spawns the HTTP surface that alerts, operator tools, and
/// Prometheus scrape against.
pub struct ApiBuilder {
    listen: SocketAddr,
    state: AppState,
}

impl ApiBuilder {
    pub fn new(listen: SocketAddr, state: AppState) -> Self {
        Self { listen, state }
    }

    pub async fn spawn(self) -> anyhow::Result<ApiHandle> {
        let listener = TcpListener::bind(self.listen).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "api server listening");

        let router = routes::router(Arc::new(self.state));

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        });
        let task = tokio::spawn(async move {
            if let Err(err) = server.await {
                warn!(error = %err, "api server exited with error");
            }
        });

        Ok(ApiHandle { address: local_addr, task, shutdown: shutdown_tx })
    }
}

pub struct ApiHandle {
    address: SocketAddr,
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl ApiHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(()) => Ok(()),
            Err(join) => Err(anyhow::anyhow!(join)),
        }
    }
}
