use crate::state::{AppState, HubCommand, StreamMessage};
use axum::extract::ws::Utf8Bytes;
use portable_atomic::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// The set of live /ws subscribers. Owned by exactly one task; nothing else
/// touches it, so there is no lock.
#[derive(Default)]
pub struct SubscriberSet {
    subscribers: HashMap<Uuid, mpsc::Sender<Utf8Bytes>>,
}

/// Outcome of one publish, for counters and logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
    pub removed: usize,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn add(&mut self, id: Uuid, tx: mpsc::Sender<Utf8Bytes>) {
        self.subscribers.insert(id, tx);
    }

    pub fn remove(&mut self, id: &Uuid) -> bool {
        self.subscribers.remove(id).is_some()
    }

    /// Fan a serialized message out without waiting on any subscriber.
    /// Closed subscribers are removed; a full queue loses this message only.
    pub fn publish(&mut self, payload: &Utf8Bytes) -> PublishReport {
        let mut report = PublishReport::default();
        let mut closed: Vec<Uuid> = Vec::new();

        for (id, tx) in &self.subscribers {
            match tx.try_send(payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    tracing::warn!(subscriber = %id, "subscriber queue full, dropping message");
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            self.subscribers.remove(&id);
            report.removed += 1;
            tracing::debug!(subscriber = %id, "removed disconnected subscriber");
        }

        report
    }
}

/// Hub task. Sole owner of the subscriber set; everything else talks to it
/// through HubCommand.
pub async fn run_hub(state: Arc<AppState>, mut rx: mpsc::Receiver<HubCommand>) {
    tracing::info!("subscriber hub started");

    let mut set = SubscriberSet::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            HubCommand::Subscribe { id, tx } => {
                set.add(id, tx);
                tracing::info!(subscriber = %id, total = set.len(), "subscriber connected");
            }
            HubCommand::Unsubscribe { id } => {
                if set.remove(&id) {
                    tracing::info!(subscriber = %id, total = set.len(), "subscriber disconnected");
                }
            }
            HubCommand::Publish(msg) => publish(&state, &mut set, &msg),
        }

        state
            .counters
            .active_subscribers
            .store(set.len() as u64, Ordering::Relaxed);
    }

    tracing::info!("subscriber hub shutting down");
}

fn publish(state: &AppState, set: &mut SubscriberSet, msg: &StreamMessage) {
    if set.is_empty() {
        return;
    }

    let payload = match serde_json::to_string(msg) {
        Ok(json) => Utf8Bytes::from(json),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize stream message");
            return;
        }
    };

    let report = set.publish(&payload);
    state
        .counters
        .ws_messages_sent
        .fetch_add(report.delivered as u64, Ordering::Relaxed);
    state
        .counters
        .ws_messages_dropped
        .fetch_add(report.dropped as u64, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::OptionType;
    use crate::state::MarketTick;

    fn sample_message() -> StreamMessage {
        let tick = MarketTick {
            timestamp: 1.0,
            spot_price: 100.0,
            strike_price: 100.0,
            time_to_maturity: 1.0,
            risk_free_rate: 0.05,
            volatility: 0.2,
            option_type: OptionType::Call,
        };
        let (state, _rx) = AppState::new(AppConfig::default());
        let pricing = state.model.price(&tick.to_params()).unwrap();
        StreamMessage { market_data: tick, pricing }
    }

    #[test]
    fn test_publish_reaches_all_live_subscribers() {
        let mut set = SubscriberSet::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        set.add(Uuid::new_v4(), tx_a);
        set.add(Uuid::new_v4(), tx_b);

        let report = set.publish(&Utf8Bytes::from("hello".to_string()));
        assert_eq!(report, PublishReport { delivered: 2, dropped: 0, removed: 0 });
        assert_eq!(rx_a.try_recv().unwrap().as_str(), "hello");
        assert_eq!(rx_b.try_recv().unwrap().as_str(), "hello");
    }

    #[test]
    fn test_closed_subscriber_is_removed() {
        let mut set = SubscriberSet::new();
        let (tx, rx) = mpsc::channel(4);
        set.add(Uuid::new_v4(), tx);
        drop(rx);

        let report = set.publish(&Utf8Bytes::from("x".to_string()));
        assert_eq!(report.removed, 1);
        assert!(set.is_empty());
    }

    #[test]
    fn test_full_subscriber_drops_message_but_stays() {
        let mut set = SubscriberSet::new();
        let (tx, mut rx) = mpsc::channel(1);
        set.add(Uuid::new_v4(), tx);

        assert_eq!(set.publish(&Utf8Bytes::from("first".to_string())).delivered, 1);
        let report = set.publish(&Utf8Bytes::from("second".to_string()));
        assert_eq!(report.dropped, 1);
        assert_eq!(set.len(), 1);
        assert_eq!(rx.try_recv().unwrap().as_str(), "first");
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut set = SubscriberSet::new();
        assert!(!set.remove(&Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_hub_task_routes_commands() {
        let (state, hub_rx) = AppState::new(AppConfig::default());
        let hub = tokio::spawn(run_hub(state.clone(), hub_rx));

        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);
        state.hub_tx.send(HubCommand::Subscribe { id, tx }).await.unwrap();

        let msg = sample_message();
        state
            .hub_tx
            .send(HubCommand::Publish(Box::new(msg.clone())))
            .await
            .unwrap();

        let payload = rx.recv().await.unwrap();
        let decoded: StreamMessage = serde_json::from_str(payload.as_str()).unwrap();
        assert_eq!(decoded, msg);

        state.hub_tx.send(HubCommand::Unsubscribe { id }).await.unwrap();
        // Once unsubscribed the hub drops its sender, closing our receiver.
        assert!(rx.recv().await.is_none());

        hub.abort();
    }

    #[test]
    fn test_publish_updates_counters() {
        let (state, _rx) = AppState::new(AppConfig::default());
        let mut set = SubscriberSet::new();

        publish(&state, &mut set, &sample_message());
        assert_eq!(state.counters.ws_messages_sent.load(Ordering::Relaxed), 0);

        let (tx, mut rx) = mpsc::channel(1);
        set.add(Uuid::new_v4(), tx);
        publish(&state, &mut set, &sample_message());
        publish(&state, &mut set, &sample_message());
        assert_eq!(state.counters.ws_messages_sent.load(Ordering::Relaxed), 1);
        assert_eq!(state.counters.ws_messages_dropped.load(Ordering::Relaxed), 1);
        assert!(rx.try_recv().unwrap().as_str().contains("market_data"));
    }
}
