use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::constants::ADAPTATION_CHANNEL_CAPACITY;
use crate::selection::adaptive::AdaptationEvent;
use crate::selection::policy::SelectionPolicy;
use crate::services::registry::SessionRegistry;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    policy: Arc<SelectionPolicy>,
    sessions: Arc<SessionRegistry>,
    adaptation_tx: broadcast::Sender<AdaptationEvent>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        policy: SelectionPolicy,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        let (adaptation_tx, _) = broadcast::channel(ADAPTATION_CHANNEL_CAPACITY);
        Self {
            store,
            policy: Arc::new(policy),
            sessions: Arc::new(SessionRegistry::new(&config.sessions)),
            adaptation_tx,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Owned handle for blocking tasks.
    pub fn store_arc(&self) -> Arc<Store> {
        self.store.clone()
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    pub fn policy_arc(&self) -> Arc<SelectionPolicy> {
        self.policy.clone()
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Publishes to live subscribers; no subscriber is not an error.
    pub fn publish_adaptation(&self, event: AdaptationEvent) {
        let _ = self.adaptation_tx.send(event);
    }

    pub fn subscribe_adaptations(&self) -> broadcast::Receiver<AdaptationEvent> {
        self.adaptation_tx.subscribe()
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown_tx(&self) -> &broadcast::Sender<()> {
        &self.shutdown_tx
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::selection::adaptive::{AdaptationDirection, ControllerState};

    fn state(name: &str) -> (tempfile::TempDir, AppState, broadcast::Sender<()>) {
        let cfg = Config::from_env();
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(Store::open(tmp.path().join(name).to_str().unwrap()).unwrap());
        let (tx, _) = broadcast::channel(4);
        let state = AppState::new(store, SelectionPolicy::default(), &cfg, tx.clone());
        (tmp, state, tx)
    }

    #[tokio::test]
    async fn shutdown_receiver_can_clone() {
        let (_tmp, state, tx) = state("state_shutdown.sled");
        let mut rx1 = state.shutdown_rx();
        let mut rx2 = state.shutdown_rx();
        tx.send(()).unwrap();
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();
    }

    #[tokio::test]
    async fn adaptation_events_reach_subscribers() {
        let (_tmp, state, _tx) = state("state_events.sled");
        let mut rx = state.subscribe_adaptations();
        state.publish_adaptation(AdaptationEvent {
            id: "e1".to_string(),
            session_id: "s1".to_string(),
            learner_id: "u1".to_string(),
            from: ControllerState::Stable,
            to: ControllerState::AdaptingEasier,
            direction: AdaptationDirection::Easier,
            bucket: None,
            sample_accuracy: 0.0,
            window_size: 3,
            substituted: 0,
            created_at: Utc::now(),
        });
        assert_eq!(rx.recv().await.unwrap().id, "e1");
    }
}
