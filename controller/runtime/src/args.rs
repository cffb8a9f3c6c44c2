use crate::{
    admin::Admin,
    api::Api,
    core::MemStore,
    intents::Db,
    policy::{self, Actors, Controller, GrpcEventSource, HttpPolicyEngine, TemporalActor},
    server,
};
use anyhow::{bail, Result};
use clap::Parser;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Parser)]
#[clap(name = "policy", about = "An event-driven policy controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "orchestrator=info,warn",
        env = "ORCHESTRATOR_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    /// Serves the policy intent and agent REST API.
    #[clap(long, default_value = "0.0.0.0:9060")]
    api_addr: SocketAddr,

    /// Serves the `/live` and `/ready` probes.
    #[clap(long, default_value = "0.0.0.0:9990")]
    admin_addr: SocketAddr,

    /// Agent events buffered before listeners stop reading from their agents.
    #[clap(long, default_value = "100")]
    events_queue_capacity: usize,

    /// Seconds between scheduled restarts of stopped agent listeners.
    #[clap(long, default_value = "300")]
    recovery_interval_secs: u64,

    #[clap(long, default_value = "1000")]
    recovery_delay_ms: u64,

    #[clap(long, default_value = "resources")]
    store_collection: String,

    #[clap(long, default_value = "data")]
    store_tag: String,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            api_addr,
            admin_addr,
            events_queue_capacity,
            recovery_interval_secs,
            recovery_delay_ms,
            store_collection,
            store_tag,
        } = self;

        log_format.try_init(log_level)?;
        let (shutdown, drain) = kubert::shutdown::sigint_or_sigterm()?;

        // Probes are answered while the controller loads its state.
        let (ready_tx, ready_rx) = watch::channel(false);
        tokio::spawn(server::serve(
            "admin",
            admin_addr,
            Admin::new(ready_rx),
            drain.clone(),
        ));

        let db = Db::new(Arc::new(MemStore::new()))
            .with_collection(store_collection)
            .with_tag(store_tag);
        let config = policy::Config {
            events_queue_capacity,
            recovery_interval: Duration::from_secs(recovery_interval_secs),
            recovery_delay: Duration::from_millis(recovery_delay_ms),
        };
        let client = reqwest::Client::new();
        let actors =
            Actors::default().with(TemporalActor::NAME, TemporalActor::new(client.clone()));
        let controller = Controller::init(
            db,
            config,
            Arc::new(HttpPolicyEngine::new(client)),
            Arc::new(GrpcEventSource),
            actors,
        )
        .await?;
        let controller = Arc::new(controller);

        let tasks = CancellationToken::new();
        controller.start(tasks.clone()).await?;
        info!("Policy controller started");
        let _ = ready_tx.send(true);

        tokio::spawn(server::serve("api", api_addr, Api::new(controller), drain));

        // Block the main thread on the shutdown signal. Once it fires, wait for the servers to
        // drain before stopping the controller's tasks.
        let res = shutdown.signaled().await;
        tasks.cancel();
        if res.is_err() {
            bail!("Aborted");
        }
        Ok(())
    }
}
