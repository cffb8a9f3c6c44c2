use crate::AgentSpec;
use parking_lot::RwLock;
use std::{collections::HashMap, time::Duration};
use tokio_util::sync::CancellationToken;

/// Tracks the event listener of every registered agent.
///
/// An agent is either running, with a listener holding its cancellation token, or waiting for the
/// agent manager to start one. Each start gets a new generation so that a listener that outlives a
/// restart cannot mark its successor for recovery.
#[derive(Debug, Default)]
pub struct AgentMap {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    runtimes: HashMap<String, AgentRuntime>,
    generation: u64,
}

#[derive(Debug)]
struct AgentRuntime {
    spec: AgentSpec,
    cancel: CancellationToken,
    running: bool,
    generation: u64,
}

/// A listener the agent manager must spawn.
#[derive(Clone, Debug)]
pub(crate) struct Started {
    pub id: String,
    pub endpoint: String,
    pub cancel: CancellationToken,
    pub generation: u64,
}

// === impl AgentMap ===

impl AgentMap {
    /// Cancels the agent's listener, if any.
    pub fn cancel(&self, id: &str) {
        if let Some(runtime) = self.inner.read().runtimes.get(id) {
            runtime.cancel.cancel();
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().runtimes.contains_key(id)
    }

    pub fn remove(&self, id: &str) {
        self.inner.write().runtimes.remove(id);
    }

    /// Whether the agent is known with exactly this spec.
    pub fn verify_spec(&self, id: &str, spec: &AgentSpec) -> bool {
        self.inner
            .read()
            .runtimes
            .get(id)
            .is_some_and(|runtime| runtime.spec == *spec)
    }

    /// Replaces the agent's runtime with a stopped one for `spec`.
    ///
    /// The previous listener is not cancelled; callers cancel it first.
    pub fn update_spec(&self, id: &str, spec: AgentSpec) {
        self.inner
            .write()
            .runtimes
            .insert(id.to_string(), AgentRuntime::stopped(spec));
    }

    pub fn is_running(&self, id: &str) -> Option<bool> {
        self.inner.read().runtimes.get(id).map(|r| r.running)
    }

    /// Lists the agents without a listener.
    pub(crate) fn not_running(&self) -> Vec<String> {
        self.inner
            .read()
            .runtimes
            .iter()
            .filter(|(_, runtime)| !runtime.running)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Marks the listed agents as running, each with a token cancelled along with `parent`.
    ///
    /// Agents that were removed, or started by someone else, since they were listed are skipped.
    pub(crate) fn start(&self, ids: &[String], parent: &CancellationToken) -> Vec<Started> {
        let mut inner = self.inner.write();
        let Inner {
            runtimes,
            generation,
        } = &mut *inner;

        let mut started = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(runtime) = runtimes.get_mut(id) else {
                continue;
            };
            if runtime.running {
                continue;
            }
            *generation += 1;
            runtime.cancel = parent.child_token();
            runtime.running = true;
            runtime.generation = *generation;
            started.push(Started {
                id: id.clone(),
                endpoint: runtime.spec.endpoint.clone(),
                cancel: runtime.cancel.clone(),
                generation: *generation,
            });
        }
        started
    }

    /// After `delay`, marks the listener started as `generation` as stopped.
    ///
    /// Returns false when the agent has since been removed or restarted.
    pub(crate) async fn mark_for_recovery(
        &self,
        id: &str,
        generation: u64,
        delay: Duration,
    ) -> bool {
        tokio::time::sleep(delay).await;
        match self.inner.write().runtimes.get_mut(id) {
            Some(runtime) if runtime.generation == generation => {
                runtime.running = false;
                true
            }
            _ => false,
        }
    }
}

// === impl AgentRuntime ===

impl AgentRuntime {
    fn stopped(spec: AgentSpec) -> Self {
        Self {
            spec,
            cancel: CancellationToken::new(),
            running: false,
            generation: 0,
        }
    }
}
