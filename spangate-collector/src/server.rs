//! The HTTP intake server.
//!
//! A thin accept loop around the handlers: per-connection tasks, a
//! semaphore bounding concurrent requests, and a watch channel for
//! shutdown. Process lifecycle (signals, health checks) belongs to the
//! embedding binary.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::handler::{JaegerHandler, ZipkinHandler};

fn default_concurrent_requests_max() -> usize {
    100
}

/// Errors produced by [`IntakeServer`].
#[derive(Error, Debug)]
pub enum ServeError {
    /// Wrapper for [`std::io::Error`].
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for [`IntakeServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address — IP plus port — to bind to.
    pub binding_addr: SocketAddr,
    /// Number of concurrent HTTP connections to allow.
    pub concurrent_requests_max: usize,
}

impl ServerConfig {
    /// A config for the given bind address with default concurrency.
    pub fn new(binding_addr: SocketAddr) -> Self {
        ServerConfig {
            binding_addr,
            concurrent_requests_max: default_concurrent_requests_max(),
        }
    }
}

/// The span intake HTTP server.
#[derive(Debug)]
pub struct IntakeServer {
    config: ServerConfig,
    zipkin: Arc<ZipkinHandler>,
    jaeger: Arc<JaegerHandler>,
    shutdown: watch::Receiver<bool>,
}

impl IntakeServer {
    /// Create a new [`IntakeServer`] instance.
    pub fn new(
        config: ServerConfig,
        zipkin: ZipkinHandler,
        jaeger: JaegerHandler,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        IntakeServer {
            config,
            zipkin: Arc::new(zipkin),
            jaeger: Arc::new(jaeger),
            shutdown,
        }
    }

    /// Run the server until a shutdown signal is received or an
    /// unrecoverable error is encountered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the listen address fails.
    pub async fn run(mut self) -> Result<(), ServeError> {
        let listener = tokio::net::TcpListener::bind(&self.config.binding_addr).await?;
        let sem = Arc::new(Semaphore::new(self.config.concurrent_requests_max));
        let mut join_set = JoinSet::new();
        info!(addr = %self.config.binding_addr, "span intake listening");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    info!("shutdown signal received");
                    break;
                }
                incoming = listener.accept() => {
                    let (stream, addr) = match incoming {
                        Ok((stream, addr)) => (stream, addr),
                        Err(error) => {
                            error!("accept error: {error}");
                            continue;
                        }
                    };

                    let zipkin = Arc::clone(&self.zipkin);
                    let jaeger = Arc::clone(&self.jaeger);
                    let sem = Arc::clone(&sem);
                    join_set.spawn(async move {
                        debug!("accepted connection from {addr}");
                        let permit = match sem.acquire_owned().await {
                            Ok(permit) => permit,
                            Err(error) => {
                                error!("semaphore closed: {error}");
                                return;
                            }
                        };
                        let builder = auto::Builder::new(TokioExecutor::new());
                        let serve_future = builder.serve_connection(
                            TokioIo::new(stream),
                            service_fn(move |req| {
                                route(req, Arc::clone(&zipkin), Arc::clone(&jaeger))
                            }),
                        );

                        if let Err(error) = serve_future.await {
                            error!("error serving: {error}");
                        }
                        drop(permit);
                    });
                }
            }
        }

        drop(listener);
        while join_set.join_next().await.is_some() {}
        Ok(())
    }
}

async fn route(
    req: Request<Incoming>,
    zipkin: Arc<ZipkinHandler>,
    jaeger: Arc<JaegerHandler>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let response = match (method, path.as_str()) {
        (Method::POST, "/api/v1/spans") => zipkin.handle_v1(req).await,
        (Method::POST, "/api/v2/spans") => zipkin.handle_v2(req).await,
        (Method::POST, "/api/traces") => jaeger.handle_traces(req).await,
        _ => {
            let mut not_found = Response::new(Full::new(Bytes::new()));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            not_found
        }
    };
    Ok(response)
}
