use crate::config::AppConfig;
use crate::errors::{EngineError, EngineResult};
use crate::models::OptionType;
use crate::state::{AppState, HubCommand, MarketTick, StreamMessage};
use portable_atomic::Ordering;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Simulated market data ranges
const SPOT_RANGE: std::ops::Range<f64> = 90.0..110.0;
const TTM_RANGE: std::ops::Range<f64> = 0.1..1.0;
const VOL_RANGE: std::ops::Range<f64> = 0.1..0.4;

/// Draw one synthetic observation. Strike and rate are fixed by config.
pub fn synthesize_tick<R: Rng>(rng: &mut R, strike: f64, rate: f64) -> MarketTick {
    MarketTick {
        timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        spot_price: rng.gen_range(SPOT_RANGE),
        strike_price: strike,
        time_to_maturity: rng.gen_range(TTM_RANGE),
        risk_free_rate: rate,
        volatility: rng.gen_range(VOL_RANGE),
        option_type: if rng.gen_bool(0.5) {
            OptionType::Call
        } else {
            OptionType::Put
        },
    }
}

/// Price one tick, store it as the latest snapshot, and hand it to the hub
/// when anyone is listening. Errors only if the hub is gone.
pub async fn publish_tick(state: &AppState, tick: MarketTick) -> EngineResult<()> {
    let pricing = match state.model.price(&tick.to_params()) {
        Ok(p) => p,
        Err(e) => {
            // Feed ranges keep every input in domain; log and skip if that ever changes.
            tracing::warn!(error = %e, spot = tick.spot_price, "simulated tick rejected by model");
            return Ok(());
        }
    };

    let msg = StreamMessage {
        market_data: tick,
        pricing,
    };
    state.latest_tx.send_replace(Some(msg.clone()));

    if !state.has_subscribers() {
        return Ok(());
    }

    state
        .hub_tx
        .send(HubCommand::Publish(Box::new(msg)))
        .await
        .map_err(|_| EngineError::ChannelClosed("subscriber hub".into()))?;

    state.counters.ticks_published.fetch_add(1, Ordering::Relaxed);
    Ok(())
}

/// Periodic simulated market feed. Synthesizes one OptionParameters per tick,
/// prices it, refreshes the latest snapshot, and publishes the pair to /ws
/// subscribers via the hub while any are connected.
pub async fn run_market_feed(config: AppConfig, state: Arc<AppState>) {
    tracing::info!(
        interval_ms = config.feed_interval.as_millis() as u64,
        strike = config.feed_strike,
        rate = config.feed_rate,
        "simulated market feed started"
    );

    let mut rng = StdRng::from_entropy();
    let mut interval = tokio::time::interval(config.feed_interval);

    loop {
        interval.tick().await;

        let tick = synthesize_tick(&mut rng, config.feed_strike, config.feed_rate);
        if let Err(e) = publish_tick(&state, tick).await {
            tracing::error!(error = %e, "market feed shutting down");
            return;
        }
    }
}
