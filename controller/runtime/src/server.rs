use anyhow::Result;
use hyper::{body::Incoming, server::conn::http1, Request, Response};
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info, info_span, instrument, Instrument};

/// Serves HTTP/1 connections on `addr` until `drain` is signaled.
///
/// Connections that are open when shutdown begins are closed gracefully, and the drain is held
/// until they finish.
#[instrument(skip_all, fields(%name, port = %addr.port()))]
pub(crate) async fn serve<S, B>(
    name: &'static str,
    addr: SocketAddr,
    svc: S,
    drain: drain::Watch,
) -> Result<()>
where
    S: tower::Service<Request<Incoming>, Response = Response<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    let signaled = drain.clone().signaled();
    tokio::pin!(signaled);
    loop {
        let (stream, client) = tokio::select! {
            res = listener.accept() => match res {
                Ok(accepted) => accepted,
                Err(error) => {
                    debug!(%error, "Failed to accept connection");
                    continue;
                }
            },
            _ = &mut signaled => {
                debug!("Server shutting down");
                return Ok(());
            }
        };

        let drain = drain.clone();
        let svc = TowerToHyperService::new(svc.clone());
        tokio::spawn(
            async move {
                let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), svc);
                tokio::pin!(conn);
                let res = tokio::select! {
                    res = &mut conn => res,
                    handle = drain.signaled() => {
                        conn.as_mut().graceful_shutdown();
                        handle.release_after(conn).await
                    }
                };
                if let Err(error) = res {
                    debug!(%error, "Connection closed");
                }
            }
            .instrument(info_span!("conn", %client)),
        );
    }
}
