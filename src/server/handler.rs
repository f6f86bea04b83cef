// src/server/handler.rs
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;

use crate::health::{handle_status_request, Registry};
use crate::metrics::{MetricsCollector, MetricsRegistry};

/// Routes the status path to the registry and everything else to the greeting.
#[derive(Clone)]
pub struct RequestHandler {
    registry: Arc<Registry>,
    status_path: Arc<str>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RequestHandler {
    pub fn new(registry: Arc<Registry>, status_path: impl Into<Arc<str>>) -> Self {
        Self {
            registry,
            status_path: status_path.into(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn handle(&self, req: &Request<Body>) -> Response<Body> {
        let path = req.uri().path();
        if path != &*self.status_path {
            return greeting(path);
        }

        let response = match *req.method() {
            Method::GET | Method::HEAD => handle_status_request(self.registry.snapshot()),
            _ => method_not_allowed(),
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_status_request(response.status().as_u16());
        }
        tracing::debug!(status = %response.status(), "served status request");
        response
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Status reads only cached results, so there is nothing to await.
        futures::future::ready(Ok(self.handle(&req)))
    }
}

/// Serves the Prometheus exposition on its own listener.
#[derive(Clone)]
pub struct MetricsHandler {
    metrics: Arc<MetricsRegistry>,
    registry: Arc<Registry>,
    path: Arc<str>,
}

impl MetricsHandler {
    pub fn new(
        metrics: Arc<MetricsRegistry>,
        registry: Arc<Registry>,
        path: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            metrics,
            registry,
            path: path.into(),
        }
    }

    pub fn handle(&self, req: &Request<Body>) -> Response<Body> {
        if req.uri().path() != &*self.path {
            return text_response(StatusCode::NOT_FOUND, "Not Found");
        }

        match self.metrics.gather_snapshot(&self.registry.snapshot()) {
            Ok(body) => {
                let mut response = Response::new(Body::from(body));
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; version=0.0.4"),
                );
                response
            }
            Err(e) => {
                tracing::error!(%e, "failed to encode metrics");
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics")
            }
        }
    }
}

impl Service<Request<Body>> for MetricsHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        futures::future::ready(Ok(self.handle(&req)))
    }
}

fn greeting(path: &str) -> Response<Body> {
    let subject = path.strip_prefix('/').unwrap_or(path);
    text_response(StatusCode::OK, format!("Hi there, I love {}!", subject))
}

fn method_not_allowed() -> Response<Body> {
    let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
    response
}

fn text_response(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
