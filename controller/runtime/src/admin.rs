use futures::future;
use hyper::{http, Request, Response};
use tokio::sync::watch;

type Body = http_body_util::Full<bytes::Bytes>;

/// Liveness and readiness probes.
///
/// `/live` answers as long as the process serves requests; `/ready` only once the policy controller
/// has loaded its state and started its tasks.
#[derive(Clone, Debug)]
pub struct Admin {
    ready: watch::Receiver<bool>,
}

// === impl Admin ===

impl Admin {
    pub fn new(ready: watch::Receiver<bool>) -> Self {
        Self { ready }
    }

    fn handle<B>(&self, req: &Request<B>) -> Response<Body> {
        match req.uri().path() {
            "/live" => probe(req, true, "live\n", "not live\n"),
            "/ready" => probe(req, *self.ready.borrow(), "ready\n", "not ready\n"),
            _ => Response::builder()
                .status(http::StatusCode::NOT_FOUND)
                .body(Body::default())
                .expect("not found response must be valid"),
        }
    }
}

impl<B> tower::Service<Request<B>> for Admin {
    type Response = Response<Body>;
    type Error = std::convert::Infallible;
    type Future = future::Ready<Result<Response<Body>, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        future::ok(self.handle(&req))
    }
}

fn probe<B>(req: &Request<B>, ok: bool, up: &'static str, down: &'static str) -> Response<Body> {
    match *req.method() {
        http::Method::GET | http::Method::HEAD => {
            let (status, body) = if ok {
                (http::StatusCode::OK, up)
            } else {
                (http::StatusCode::INTERNAL_SERVER_ERROR, down)
            };
            Response::builder()
                .status(status)
                .header(http::header::CONTENT_TYPE, "text/plain")
                .body(body.into())
                .expect("probe response must be valid")
        }
        _ => Response::builder()
            .status(http::StatusCode::METHOD_NOT_ALLOWED)
            .body(Body::default())
            .expect("method not allowed response must be valid"),
    }
}
