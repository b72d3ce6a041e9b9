//! Demand Tracker
//!
//! Rolling 24h log of view / cart-add / sale events per product, feeding the
//! signal scorer. Built once at startup and shared by the HTTP handlers and
//! the pricing job.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::services::signal_scorer::DemandSignals;

/// Window counted by the scorer
pub const DEMAND_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandEventKind {
    View,
    CartAdd,
    Sale,
}

#[derive(Default)]
pub struct DemandTracker {
    events: RwLock<HashMap<i32, VecDeque<(DateTime<Utc>, DemandEventKind)>>>,
}

impl DemandTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, product_id: i32, kind: DemandEventKind) {
        self.record_at(product_id, kind, Utc::now());
    }

    pub fn record_at(&self, product_id: i32, kind: DemandEventKind, at: DateTime<Utc>) {
        let mut events = self.events.write();
        let log = events.entry(product_id).or_default();

        // keep the log time-ordered even for back-dated events
        let position = log.partition_point(|(ts, _)| *ts <= at);
        log.insert(position, (at, kind));
    }

    /// Scorer inputs for `product_id` as of now.
    pub fn signals(&self, product_id: i32, stock: i32) -> DemandSignals {
        self.signals_at(product_id, stock, Utc::now())
    }

    pub fn signals_at(&self, product_id: i32, stock: i32, now: DateTime<Utc>) -> DemandSignals {
        let cutoff = now - Duration::hours(DEMAND_WINDOW_HOURS);
        let mut signals = DemandSignals::with_stock(stock.max(0) as u32);

        let mut events = self.events.write();
        let Some(log) = events.get_mut(&product_id) else {
            return signals;
        };

        while log.front().is_some_and(|(ts, _)| *ts < cutoff) {
            log.pop_front();
        }

        for (ts, kind) in log.iter() {
            if *ts > now {
                break;
            }
            match kind {
                DemandEventKind::View => signals.views_24h = signals.views_24h.saturating_add(1),
                DemandEventKind::CartAdd => {
                    signals.cart_adds_24h = signals.cart_adds_24h.saturating_add(1)
                }
                DemandEventKind::Sale => signals.sales_24h = signals.sales_24h.saturating_add(1),
            }
        }

        if log.is_empty() {
            events.remove(&product_id);
        }

        signals
    }

    /// Drop expired events for every product. Returns the number removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::hours(DEMAND_WINDOW_HOURS);
        let mut removed = 0;

        let mut events = self.events.write();
        events.retain(|_, log| {
            while log.front().is_some_and(|(ts, _)| *ts < cutoff) {
                log.pop_front();
                removed += 1;
            }
            !log.is_empty()
        });

        removed
    }

    pub fn tracked_products(&self) -> usize {
        self.events.read().len()
    }
}
