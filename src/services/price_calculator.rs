use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Platform margin applied when an item has none stored
pub const DEFAULT_PLATFORM_MARKUP_PCT: Decimal = dec!(10);

/// Decimal places kept on base-currency final prices (whole units)
pub const BASE_PRICE_DECIMALS: u32 = 0;

/// Stored pricing fields of a product or variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceInputs {
    pub base_price: Decimal,
    pub platform_markup_pct: Option<Decimal>,
    pub dynamic_markup_pct: Option<Decimal>,
    pub manual_override_price: Option<Decimal>,
}

impl PriceInputs {
    pub fn new(base_price: Decimal) -> Self {
        Self {
            base_price,
            platform_markup_pct: None,
            dynamic_markup_pct: None,
            manual_override_price: None,
        }
    }

    pub fn with_platform_markup(mut self, pct: Decimal) -> Self {
        self.platform_markup_pct = Some(pct);
        self
    }

    pub fn with_dynamic_markup(mut self, pct: Decimal) -> Self {
        self.dynamic_markup_pct = Some(pct);
        self
    }

    pub fn with_override(mut self, price: Option<Decimal>) -> Self {
        self.manual_override_price = price;
        self
    }
}

/// Round a base-currency price to whole units, half away from zero.
pub fn round_base_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(BASE_PRICE_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute the authoritative final price.
///
/// 1. A positive manual override wins unchanged.
/// 2. A non-positive base price yields 0.
/// 3. Otherwise `max(base, base + platform% + dynamic%)`, rounded to whole units.
///
/// Always a pure recomputation from stored fields, so repeated runs agree.
pub fn calculate_final_price(inputs: &PriceInputs) -> Decimal {
    if let Some(override_price) = inputs.manual_override_price {
        if override_price > Decimal::ZERO {
            return override_price;
        }
    }

    let base = inputs.base_price;
    if base <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let platform_pct = inputs
        .platform_markup_pct
        .unwrap_or(DEFAULT_PLATFORM_MARKUP_PCT);
    let dynamic_pct = inputs.dynamic_markup_pct.unwrap_or(Decimal::ZERO);

    let platform_amount = base * platform_pct / dec!(100);
    let dynamic_amount = base * dynamic_pct / dec!(100);

    let rounded = round_base_price((base + platform_amount + dynamic_amount).max(base));
    // whole-unit rounding must not undercut a fractional merchant price
    if rounded < base { base.ceil() } else { rounded }
}
