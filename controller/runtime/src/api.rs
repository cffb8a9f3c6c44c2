use crate::{
    core::Error,
    intents::Dig,
    policy::{AgentSpec, Controller, PolicyIntent},
};
use bytes::Bytes;
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// The policy controller's REST API, rooted at `/v2`.
#[derive(Clone)]
pub struct Api {
    controller: Arc<Controller>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),
}

type Body = http_body_util::Full<Bytes>;

#[derive(Debug, PartialEq)]
enum Route {
    Health,
    Intent(Dig, String),
    Agent(String),
    Agents,
}

// === impl Api ===

impl tower::Service<Request<hyper::body::Incoming>> for Api {
    type Response = Response<Body>;
    type Error = ApiError;
    type Future = future::BoxFuture<'static, Result<Response<Body>, ApiError>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        let api = self.clone();
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = body.collect().await?.to_bytes();
            Ok(api.handle(&parts.method, parts.uri.path(), body).await)
        })
    }
}

impl Api {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self { controller }
    }

    async fn handle(&self, method: &http::Method, path: &str, body: Bytes) -> Response<Body> {
        let Some(route) = Route::parse(path) else {
            return empty(http::StatusCode::NOT_FOUND);
        };
        debug!(%method, ?route);

        let res = match (method, route) {
            (&http::Method::GET, Route::Health) => {
                return text(http::StatusCode::OK, "Controller is UP");
            }

            (&http::Method::POST, Route::Intent(dig, id)) => match parse::<PolicyIntent>(&body) {
                Ok(intent) => self
                    .controller
                    .intents()
                    .create(&dig, &id, intent, false)
                    .await
                    .and_then(|(intent, existed)| {
                        info!(intent = %id, existed, "Policy intent stored");
                        json(created_or_updated(existed), &intent)
                    }),
                Err(rsp) => return rsp,
            },
            (&http::Method::GET, Route::Intent(dig, id)) => self
                .controller
                .intents()
                .get(&dig, &id)
                .await
                .and_then(|intent| json(http::StatusCode::OK, &intent)),
            (&http::Method::DELETE, Route::Intent(dig, id)) => {
                self.controller.intents().delete(&dig, &id).await.map(|()| {
                    info!(intent = %id, "Policy intent deleted");
                    empty(http::StatusCode::NO_CONTENT)
                })
            }

            (&http::Method::POST, Route::Agent(id)) => match parse::<AgentSpec>(&body) {
                Ok(spec) => self
                    .controller
                    .agents()
                    .register(&id, spec)
                    .await
                    .and_then(|agent| {
                        info!(agent = %id, "Agent registered");
                        json(http::StatusCode::CREATED, &agent)
                    }),
                Err(rsp) => return rsp,
            },
            (&http::Method::GET, Route::Agent(id)) => self
                .controller
                .agents()
                .get(&id)
                .await
                .and_then(|agent| json(http::StatusCode::OK, &agent)),
            (&http::Method::DELETE, Route::Agent(id)) => {
                self.controller.agents().delete(&id).await.map(|()| {
                    info!(agent = %id, "Agent deleted");
                    empty(http::StatusCode::NO_CONTENT)
                })
            }
            (&http::Method::GET, Route::Agents) => self
                .controller
                .agents()
                .get_all()
                .await
                .and_then(|agents| json(http::StatusCode::OK, &agents)),

            _ => return empty(http::StatusCode::METHOD_NOT_ALLOWED),
        };

        res.unwrap_or_else(|error| {
            warn!(%error, %method, %path, "Request failed");
            text(error.status(), &error.to_string())
        })
    }
}

// === impl Route ===

impl Route {
    fn parse(path: &str) -> Option<Self> {
        let segments = path.strip_prefix("/v2/")?.split('/').collect::<Vec<_>>();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        match segments.as_slice() {
            ["health"] => Some(Self::Health),
            ["policy", "agents"] => Some(Self::Agents),
            ["policy", "agents", id] => Some(Self::Agent(id.to_string())),
            [
                "projects",
                project,
                "composite-apps",
                app,
                version,
                "deployment-intent-groups",
                dig,
                "policy-intents",
                id,
            ] => Some(Self::Intent(
                Dig::new(project, app, version, dig),
                id.to_string(),
            )),
            _ => None,
        }
    }
}

fn created_or_updated(existed: bool) -> http::StatusCode {
    if existed {
        http::StatusCode::OK
    } else {
        http::StatusCode::CREATED
    }
}

fn parse<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response<Body>> {
    serde_json::from_slice(body).map_err(|error| {
        warn!(%error, "Failed to parse request body");
        text(http::StatusCode::BAD_REQUEST, &error.to_string())
    })
}

fn json<T>(status: http::StatusCode, value: &T) -> Result<Response<Body>, Error>
where
    T: serde::Serialize,
{
    let bytes = serde_json::to_vec(value)?;
    Ok(Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("json response must be valid"))
}

fn text(status: http::StatusCode, msg: &str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(format!("{msg}\n")))
        .expect("text response must be valid")
}

fn empty(status: http::StatusCode) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::default())
        .expect("empty response must be valid")
}
