use crate::{
    agent_map::Started, proto, Actors, AgentClient, AgentMap, AgentUpdate, Event, EventSource,
    IntentSpec, IntentUpdate, Operation, PolicyEngine, PolicyIntentClient, ReverseMap,
};
use orchestrator_core::{Error, Result};
use orchestrator_intents::Db;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};


#[derive(Clone, Debug)]
pub struct Config {
    /// Events received from agents and not yet dispatched; listeners block when it is full.
    pub events_queue_capacity: usize,

    /// How often stopped listeners are restarted without a recovery signal.
    pub recovery_interval: Duration,

    /// How long a failed listener waits before asking to be restarted.
    pub recovery_delay: Duration,
}

/// Owns the policy clients and the scheduler tasks that keep the in-memory maps current.
pub struct Controller {
    intents: PolicyIntentClient,
    agents: AgentClient,
    scheduler: Scheduler,
    streams: Mutex<Option<Streams>>,
}

struct Streams {
    intent_updates: mpsc::UnboundedReceiver<IntentUpdate>,
    agent_updates: mpsc::UnboundedReceiver<AgentUpdate>,
    recovery: mpsc::UnboundedReceiver<()>,
    events: mpsc::Receiver<proto::Event>,
}

#[derive(Clone)]
struct Scheduler {
    reverse_map: Arc<ReverseMap>,
    agent_map: Arc<AgentMap>,
    engine: Arc<dyn PolicyEngine>,
    actors: Arc<Actors>,
    source: Arc<dyn EventSource>,
    recovery: mpsc::UnboundedSender<()>,
    events: mpsc::Sender<proto::Event>,
    config: Config,
}

// === impl Config ===

impl Default for Config {
    fn default() -> Self {
        Self {
            events_queue_capacity: 100,
            recovery_interval: Duration::from_secs(5 * 60),
            recovery_delay: Duration::from_secs(1),
        }
    }
}

// === impl Controller ===

impl Controller {
    pub async fn init(
        db: Db,
        config: Config,
        engine: Arc<dyn PolicyEngine>,
        source: Arc<dyn EventSource>,
        actors: Actors,
    ) -> Result<Self> {
        let (intent_tx, intent_updates) = mpsc::unbounded_channel();
        let (agent_tx, agent_updates) = mpsc::unbounded_channel();
        let (recovery_tx, recovery) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::channel(config.events_queue_capacity);

        let agents = AgentClient::new(db.clone(), agent_tx);
        agents.init().await?;

        Ok(Self {
            intents: PolicyIntentClient::new(db, intent_tx),
            agents,
            scheduler: Scheduler {
                reverse_map: Default::default(),
                agent_map: Default::default(),
                engine,
                actors: Arc::new(actors),
                source,
                recovery: recovery_tx,
                events: events_tx,
                config,
            },
            streams: Mutex::new(Some(Streams {
                intent_updates,
                agent_updates,
                recovery,
                events,
            })),
        })
    }

    pub fn intents(&self) -> &PolicyIntentClient {
        &self.intents
    }

    pub fn agents(&self) -> &AgentClient {
        &self.agents
    }

    pub fn reverse_map(&self) -> &ReverseMap {
        &self.scheduler.reverse_map
    }

    pub fn agent_map(&self) -> &AgentMap {
        &self.scheduler.agent_map
    }

    /// Loads the stored intents and agents, then spawns the scheduler tasks. The tasks exit when
    /// `shutdown` is cancelled, which also cancels every agent listener.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        let Streams {
            intent_updates,
            agent_updates,
            recovery,
            events,
        } = self
            .streams
            .lock()
            .take()
            .ok_or_else(|| Error::invariant("policy controller already started"))?;

        let intents = self.intents.get_all().await.map_err(|e| {
            e.context("Starting OperationalScheduler failed: Building In-memory ReverseMap failed")
        })?;
        for intent in intents {
            self.scheduler.reverse_map.add(intent);
        }

        tokio::spawn(
            self.scheduler
                .clone()
                .agent_manager(recovery, shutdown.clone())
                .instrument(info_span!("agent_manager")),
        );

        let agents = self
            .agents
            .get_all()
            .await
            .map_err(|e| e.context("Starting OperationalScheduler failed: BuildAgentMap failed"))?;
        if agents.is_empty() {
            warn!("No Agents found in DB");
        } else {
            for agent in agents {
                self.scheduler.agent_map.update_spec(&agent.id.clone(), agent);
            }
            self.scheduler.require_recovery();
        }

        tokio::spawn(
            self.scheduler
                .clone()
                .operational_scheduler(intent_updates, agent_updates, shutdown.clone())
                .instrument(info_span!("scheduler")),
        );
        tokio::spawn(
            self.scheduler
                .clone()
                .events_manager(events, shutdown)
                .instrument(info_span!("events")),
        );
        Ok(())
    }
}

// === impl Scheduler ===

impl Scheduler {
    /// Applies intent and agent updates in the order each stream delivers them.
    async fn operational_scheduler(
        self,
        mut intents: mpsc::UnboundedReceiver<IntentUpdate>,
        mut agents: mpsc::UnboundedReceiver<AgentUpdate>,
        shutdown: CancellationToken,
    ) {
        info!("Starting scheduler");
        loop {
            tokio::select! {
                Some(update) = intents.recv() => self.handle_intent_update(update),
                Some(update) = agents.recv() => self.handle_agent_update(update),
                _ = shutdown.cancelled() => {
                    debug!("Scheduler exiting");
                    return;
                }
            }
        }
    }

    fn handle_intent_update(&self, IntentUpdate { op, intent }: IntentUpdate) {
        match op {
            Operation::Append => self.reverse_map.add(intent),
            Operation::Delete => {
                if let Err(error) = self.reverse_map.remove(&intent) {
                    warn!(%error, "Delete intent failed");
                }
            }
        }
    }

    fn handle_agent_update(&self, AgentUpdate { op, spec }: AgentUpdate) {
        let id = spec.id.clone();
        match op {
            Operation::Delete => {
                if !self.agent_map.contains(&id) {
                    warn!(agent = %id, "Delete failed: agent not found");
                    return;
                }
                self.agent_map.cancel(&id);
                self.agent_map.remove(&id);
            }
            Operation::Append => {
                if self.agent_map.verify_spec(&id, &spec) {
                    warn!(agent = %id, "Agent spec unchanged; not updated");
                    return;
                }
                self.agent_map.cancel(&id);
                self.agent_map.update_spec(&id, spec);
                self.require_recovery();
            }
        }
    }

    /// Starts a listener for every stopped agent, whenever recovery is requested and on a timer.
    async fn agent_manager(
        self,
        mut recovery: mpsc::UnboundedReceiver<()>,
        shutdown: CancellationToken,
    ) {
        info!("Starting agent manager");
        loop {
            tokio::select! {
                Some(()) = recovery.recv() => debug!("Agent recovery required"),
                _ = time::sleep(self.config.recovery_interval) => {
                    debug!("Scheduled agent health check");
                }
                _ = shutdown.cancelled() => {
                    debug!("Agent manager exiting");
                    return;
                }
            }

            // Listing only needs the read lock; agents that change before they are started are
            // skipped and picked up by the next round.
            let stopped = self.agent_map.not_running();
            for started in self.agent_map.start(&stopped, &shutdown) {
                let span = info_span!("agent", id = %started.id);
                tokio::spawn(self.clone().listen(started).instrument(span));
            }
        }
    }

    async fn listen(self, started: Started) {
        let Started {
            id,
            endpoint,
            cancel,
            generation,
        } = started;
        info!(%endpoint, "Listening for agent events");
        let res = tokio::select! {
            res = self.source.listen(&endpoint, self.events.clone()) => res,
            _ = cancel.cancelled() => {
                debug!("Listener cancelled");
                return;
            }
        };
        match res {
            Ok(()) => info!("Agent event stream ended"),
            Err(error) => warn!(%error, "Agent listener failed"),
        }

        if self
            .agent_map
            .mark_for_recovery(&id, generation, self.config.recovery_delay)
            .await
        {
            self.require_recovery();
        }
    }

    fn require_recovery(&self) {
        if self.recovery.send(()).is_err() {
            debug!("Agent manager is not running");
        }
    }

    async fn events_manager(
        self,
        mut events: mpsc::Receiver<proto::Event>,
        shutdown: CancellationToken,
    ) {
        info!("Starting events manager");
        loop {
            tokio::select! {
                Some(event) = events.recv() => self.process_event(event),
                _ = shutdown.cancelled() => {
                    debug!("Events manager exiting");
                    return;
                }
            }
        }
    }

    /// Dispatches the event to every intent watching it from this agent or from any agent.
    ///
    /// Events that cannot be decoded are dropped.
    fn process_event(&self, event: proto::Event) {
        let proto::Event {
            event_id,
            agent_id,
            spec,
            message,
        } = event;
        debug!(id = %event_id, agent = %agent_id, "Processing event");

        let payloads = proto::decode_any(spec.as_ref())
            .and_then(|spec| Ok((spec, proto::decode_any(message.as_ref())?)));
        let (agent_spec, message) = match payloads {
            Ok(payloads) => payloads,
            Err(error) => {
                warn!(%error, id = %event_id, agent = %agent_id, "Dropping event");
                return;
            }
        };

        let mut intents = self.reverse_map.specs(&Event {
            id: event_id.clone(),
            agent_id: agent_id.clone(),
        });
        if !agent_id.is_empty() {
            intents.extend(self.reverse_map.specs(&Event {
                id: event_id,
                agent_id: String::new(),
            }));
        }

        for intent in intents {
            let scheduler = self.clone();
            let agent_spec = agent_spec.clone();
            let message = message.clone();
            tokio::spawn(
                async move {
                    let res = scheduler
                        .execute_event(&intent, &agent_spec, &message)
                        .await;
                    if let Err(error) = res {
                        warn!(%error, intent = %intent.path(), "Event execution failed");
                    }
                }
                .in_current_span(),
            );
        }
    }

    async fn execute_event(
        &self,
        intent: &IntentSpec,
        agent_spec: &Value,
        event: &Value,
    ) -> Result<()> {
        let input = json!({
            "input": {
                "intentSpec": intent,
                "agentSpec": agent_spec,
                "event": event,
            }
        });
        let evaluation = self.engine.evaluate(&intent.policy, &input).await?;
        let actor = self.actors.get(&intent.actor)?;
        actor.execute(&evaluation, intent, agent_spec).await
    }
}
