use crate::config::AppConfig;
use crate::models::black_scholes::BlackScholes;
use crate::models::{OptionParameters, OptionType, PricingModel, PricingResult};
use axum::extract::ws::Utf8Bytes;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

// ── Streaming payloads ──

/// One synthetic market observation, as pushed to /ws clients.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarketTick {
    /// Unix seconds
    pub timestamp: f64,
    pub spot_price: f64,
    pub strike_price: f64,
    pub time_to_maturity: f64,
    pub risk_free_rate: f64,
    pub volatility: f64,
    pub option_type: OptionType,
}

impl MarketTick {
    pub fn to_params(&self) -> OptionParameters {
        OptionParameters::new(
            self.spot_price,
            self.strike_price,
            self.time_to_maturity,
            self.risk_free_rate,
            self.volatility,
            self.option_type.as_str(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StreamMessage {
    pub market_data: MarketTick,
    pub pricing: PricingResult,
}

// ── Commands to the subscriber hub (bounded channel) ──

#[derive(Debug)]
pub enum HubCommand {
    Subscribe { id: Uuid, tx: mpsc::Sender<Utf8Bytes> },
    Unsubscribe { id: Uuid },
    Publish(Box<StreamMessage>),
}

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub pricing_requests: AtomicU64,
    pub heatmap_requests: AtomicU64,
    pub rejected_requests: AtomicU64,
    pub ticks_published: AtomicU64,
    pub ws_messages_sent: AtomicU64,
    pub ws_messages_dropped: AtomicU64,
    pub active_subscribers: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            pricing_requests: AtomicU64::new(0),
            heatmap_requests: AtomicU64::new(0),
            rejected_requests: AtomicU64::new(0),
            ticks_published: AtomicU64::new(0),
            ws_messages_sent: AtomicU64::new(0),
            ws_messages_dropped: AtomicU64::new(0),
            active_subscribers: AtomicU64::new(0),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use Ordering::Relaxed;
        serde_json::json!({
            "pricing_requests": self.pricing_requests.load(Relaxed),
            "heatmap_requests": self.heatmap_requests.load(Relaxed),
            "rejected_requests": self.rejected_requests.load(Relaxed),
            "ticks_published": self.ticks_published.load(Relaxed),
            "ws_messages_sent": self.ws_messages_sent.load(Relaxed),
            "ws_messages_dropped": self.ws_messages_dropped.load(Relaxed),
            "active_subscribers": self.active_subscribers.load(Relaxed),
        })
    }
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

// ── Application shared state (channels, not locks) ──

pub struct AppState {
    pub config: AppConfig,

    pub model: Arc<dyn PricingModel>,

    // Feed -> Dashboard: latest priced tick (watch = single producer, multi consumer)
    pub latest_tx: watch::Sender<Option<StreamMessage>>,
    pub latest_rx: watch::Receiver<Option<StreamMessage>>,

    // Feed/WS handlers -> Hub: bounded command channel
    pub hub_tx: mpsc::Sender<HubCommand>,

    // Lock-free performance counters
    pub counters: PerfCounters,
}

impl AppState {
    /// Shared state plus the receiving end of the hub channel, which the hub task must own.
    pub fn new(config: AppConfig) -> (Arc<Self>, mpsc::Receiver<HubCommand>) {
        Self::with_model(config, Arc::new(BlackScholes::new()))
    }

    pub fn with_model(
        config: AppConfig,
        model: Arc<dyn PricingModel>,
    ) -> (Arc<Self>, mpsc::Receiver<HubCommand>) {
        let (hub_tx, hub_rx) = mpsc::channel(256);
        let (latest_tx, latest_rx) = watch::channel(None);

        let state = Arc::new(Self {
            config,
            model,
            latest_tx,
            latest_rx,
            hub_tx,
            counters: PerfCounters::new(),
        });
        (state, hub_rx)
    }

    #[inline]
    pub fn has_subscribers(&self) -> bool {
        self.counters.active_subscribers.load(Ordering::Relaxed) > 0
    }
}
