// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use anyhow::{anyhow, Context, Result};
use hyper::{server::conn::Http, Body, Request, Response};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Duration};
use tower::Service;

/// Builder pattern so `main.rs` can inject the status handler (or any handler).
pub struct ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    addr: SocketAddr,
    handler: Option<H>,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, handler: None }
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Bind the TCP socket without accepting yet.
    pub async fn bind(self) -> Result<BoundServer<H>> {
        let handler = self
            .handler
            .ok_or_else(|| anyhow!("handler must be set via with_handler()"))?;

        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        let local_addr = listener.local_addr()?;

        Ok(BoundServer {
            listener,
            local_addr,
            handler,
        })
    }
}

/// A listening socket paired with the handler that will serve it.
pub struct BoundServer<H> {
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: H,
}

impl<H> BoundServer<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `shutdown` resolves, one Tokio task per
    /// connection. Connections already accepted are left to finish.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let BoundServer {
            listener,
            local_addr,
            handler,
        } = self;
        let listener = &listener;

        serve_connections(move || listener.accept(), handler, local_addr, shutdown).await
    }
}

/// How long to wait before accepting again after `accept` fails.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

async fn serve_connections<A, Fut, H, F>(
    mut accept: A,
    handler: H,
    local_addr: SocketAddr,
    shutdown: F,
) -> Result<()>
where
    A: FnMut() -> Fut,
    Fut: Future<Output = io::Result<(TcpStream, SocketAddr)>>,
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
    F: Future<Output = ()>,
{
    tracing::info!("HTTP server listening on {}", local_addr);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = accept() => match accepted {
                Ok((stream, peer)) => {
                    let svc = handler.clone();

                    tokio::spawn(async move {
                        if let Err(err) = Http::new().serve_connection(stream, svc).await {
                            tracing::warn!(%peer, %err, "connection error");
                        }
                    });
                }
                // EMFILE and friends clear once open connections close.
                Err(e) => {
                    tracing::warn!(%e, "accept failed");
                    tokio::select! {
                        _ = sleep(ACCEPT_ERROR_BACKOFF) => {}
                        _ = &mut shutdown => {
                            tracing::info!("HTTP server on {} stopped accepting", local_addr);
                            return Ok(());
                        }
                    }
                }
            },
            _ = &mut shutdown => {
                tracing::info!("HTTP server on {} stopped accepting", local_addr);
                return Ok(());
            }
        }
    }
}
