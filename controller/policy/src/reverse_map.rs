use crate::{Event, IntentSpec, PolicyIntent};
use orchestrator_core::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::info;

/// Indexes policy intents by the event they watch.
///
/// A bucket holds at most one intent per `project/compositeApp/version/dig/id`: adding an intent
/// that is already present replaces it.
#[derive(Debug, Default)]
pub struct ReverseMap {
    events: RwLock<HashMap<Event, Vec<PolicyIntent>>>,
}

// === impl ReverseMap ===

impl ReverseMap {
    pub fn add(&self, intent: PolicyIntent) {
        let event = intent.spec.event.clone();
        let mut events = self.events.write();
        let bucket = events.entry(event).or_default();
        if let Some(idx) = bucket.iter().position(|i| i.spec.same_intent(&intent.spec)) {
            bucket.remove(idx);
        }
        info!(
            event = %intent.spec.event.id,
            intent = %intent.spec.policy_intent_id,
            "Added intent to event list"
        );
        bucket.push(intent);
    }

    pub fn remove(&self, intent: &PolicyIntent) -> Result<()> {
        let event = &intent.spec.event;
        let mut events = self.events.write();
        let idx = events.get(event).and_then(|bucket| {
            bucket
                .iter()
                .position(|i| i.spec.same_intent(&intent.spec))
        });
        match (events.get_mut(event), idx) {
            (Some(bucket), Some(idx)) => {
                bucket.remove(idx);
                info!(
                    event = %event.id,
                    intent = %intent.spec.policy_intent_id,
                    "Removed intent from event list"
                );
                Ok(())
            }
            _ => Err(Error::not_found(format!(
                "RemoveIntent failed. No Policy Intent ({}) found in the IntentList of event {}",
                intent.spec.path(),
                event.id
            ))),
        }
    }

    /// Returns a snapshot of the intents watching `event`.
    pub fn intents(&self, event: &Event) -> Result<Vec<PolicyIntent>> {
        self.events.read().get(event).cloned().ok_or_else(|| {
            Error::not_found(format!(
                "GetPolicyIntentList failed. Event {} not found",
                event.id
            ))
        })
    }

    /// Returns a snapshot of the specs of the intents watching `event`; none if it is unknown.
    pub fn specs(&self, event: &Event) -> Vec<IntentSpec> {
        self.events
            .read()
            .get(event)
            .map(|bucket| bucket.iter().map(|i| i.spec.clone()).collect())
            .unwrap_or_default()
    }
}
