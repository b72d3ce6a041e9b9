//! Maps scarcity and demand signals to a dynamic markup percentage.

use serde::{Deserialize, Serialize};

/// Upper bound for the dynamic markup (percent)
pub const MAX_DYNAMIC_MARKUP_PCT: u32 = 50;

/// Raw inputs for scoring. Missing counters default to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandSignals {
    pub stock: u32,
    #[serde(default)]
    pub views_24h: u32,
    #[serde(default)]
    pub cart_adds_24h: u32,
    #[serde(default)]
    pub sales_24h: u32,
}

impl DemandSignals {
    pub fn with_stock(stock: u32) -> Self {
        Self {
            stock,
            ..Default::default()
        }
    }

    /// Weighted demand: views + 3 * cart adds + 8 * sales
    pub fn demand_score(&self) -> u64 {
        u64::from(self.views_24h)
            + 3 * u64::from(self.cart_adds_24h)
            + 8 * u64::from(self.sales_24h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalScore {
    pub scarcity: u32,
    pub demand: u32,
    pub total: u32,
}

fn scarcity_score(stock: u32) -> u32 {
    match stock {
        0..=5 => 25,
        6..=20 => 15,
        21..=50 => 8,
        _ => 0,
    }
}

fn demand_score(weighted: u64) -> u32 {
    if weighted >= 200 {
        20
    } else if weighted >= 100 {
        12
    } else if weighted >= 50 {
        6
    } else {
        0
    }
}

/// Score with the per-component breakdown, for logging.
pub fn score_breakdown(signals: &DemandSignals) -> SignalScore {
    let scarcity = scarcity_score(signals.stock);
    let demand = demand_score(signals.demand_score());

    SignalScore {
        scarcity,
        demand,
        total: (scarcity + demand).min(MAX_DYNAMIC_MARKUP_PCT),
    }
}

/// Dynamic markup percentage in `[0, 50]`.
pub fn dynamic_markup_pct(signals: &DemandSignals) -> u32 {
    score_breakdown(signals).total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(stock: u32, views: u32, cart_adds: u32, sales: u32) -> DemandSignals {
        DemandSignals {
            stock,
            views_24h: views,
            cart_adds_24h: cart_adds,
            sales_24h: sales,
        }
    }

    #[test]
    fn test_score_table() {
        let cases = [
            (signals(3, 0, 0, 0), 25),
            (signals(5, 0, 0, 0), 25),
            (signals(6, 0, 0, 0), 15),
            (signals(20, 0, 0, 0), 15),
            (signals(50, 0, 0, 0), 8),
            (signals(51, 0, 0, 0), 0),
            (signals(100, 49, 0, 0), 0),
            (signals(100, 50, 0, 0), 6),
            (signals(100, 40, 20, 0), 12),
            (signals(100, 0, 0, 25), 20),
            (signals(0, 500, 100, 100), 45),
            (signals(10, 100, 0, 0), 27),
        ];

        for (input, expected) in cases {
            assert_eq!(dynamic_markup_pct(&input), expected, "inputs: {:?}", input);
        }
    }

    #[test]
    fn test_score_bounded_and_monotonic() {
        for stock in [0u32, 4, 12, 35, 80, 10_000] {
            let mut previous = 0;
            for step in 0..60u32 {
                let score = dynamic_markup_pct(&signals(stock, step * 3, step, step / 2));
                assert!(score <= MAX_DYNAMIC_MARKUP_PCT);
                assert!(score >= previous, "score decreased at stock={} step={}", stock, step);
                previous = score;
            }
        }

        let extreme = signals(0, u32::MAX, u32::MAX, u32::MAX);
        assert!(dynamic_markup_pct(&extreme) <= MAX_DYNAMIC_MARKUP_PCT);
    }

    #[test]
    fn test_breakdown() {
        let score = score_breakdown(&signals(3, 0, 0, 0));
        assert_eq!(score.scarcity, 25);
        assert_eq!(score.demand, 0);
        assert_eq!(score.total, 25);
    }
}
