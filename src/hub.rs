use crate::config::HubConfig;
use crate::dispatch::DispatchLoop;
use crate::engine::ClientRegistry;
use crate::router::RouterContext;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// A bound hub: the listening socket plus the shared engine table.
pub struct Hub {
    listener: TcpListener,
    registry: Arc<ClientRegistry>,
    budget_ms: f64,
}

impl Hub {
    pub async fn bind(config: &HubConfig) -> anyhow::Result<Hub> {
        let addr = format!("{}:{}", config.listen.host, config.listen.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        info!(addr = %listener.local_addr()?, "Hub listening");
        Ok(Hub {
            listener,
            registry: Arc::new(ClientRegistry::new(
                config.scheduler.default_max_wait_seconds,
            )),
            budget_ms: config.scheduler.computation_budget_ms as f64,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<ClientRegistry> {
        self.registry.clone()
    }

    /// Accept connections and run the dispatch loop until shutdown.
    pub async fn run(self) {
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let router_ctx = RouterContext {
            registry: self.registry.clone(),
            request_tx,
            event_tx,
        };
        let dispatch = DispatchLoop::new(
            self.registry.clone(),
            conn_rx,
            request_rx,
            event_rx,
            router_ctx,
            self.budget_ms,
        );

        let listener = self.listener;
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        if conn_tx.send(stream).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                }
            }
        });

        dispatch.run().await;
    }
}
