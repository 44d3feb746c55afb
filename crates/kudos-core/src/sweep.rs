//! Background sweeper: periodic grace-window settlement.

use crate::model::SweepOutcome;
use crate::store::Store;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Runs [`Store::sweep_due`] on a fixed interval until told to stop.
///
/// Sweeps are idempotent, so the interval is a freshness knob, not a
/// correctness one: a missed or doubled tick never moves points twice.
pub struct Sweeper {
    store: Store,
    interval: Duration,
}

impl Sweeper {
    pub fn new(store: Store, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Interval from the store's config (`sweep_interval_secs`).
    pub fn from_config(store: Store) -> Self {
        let interval = Duration::from_secs(store.config().sweep_interval_secs);
        Self::new(store, interval)
    }

    /// Loop until the shutdown channel flips to `true` (or its sender
    /// drops). The first sweep runs immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow_and_update() {
                        tracing::info!("sweeper stopping");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.sweep_once();
                }
            }
        }
    }

    fn sweep_once(&self) -> Option<SweepOutcome> {
        match self.store.sweep_due(Utc::now()) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(error = %e, "sweep pass failed");
                None
            }
        }
    }
}
