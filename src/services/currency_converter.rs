//! Converts base-currency (USD) amounts into display currencies.
//!
//! Pure functions only: safe to call from any number of request handlers
//! at once. Rates and currency configs are supplied by the caller.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// All stored prices and fetched rates are relative to this currency
pub const BASE_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolPosition {
    #[default]
    Before,
    After,
}

impl SymbolPosition {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "before" => Some(SymbolPosition::Before),
            "after" => Some(SymbolPosition::After),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolPosition::Before => "before",
            SymbolPosition::After => "after",
        }
    }
}

/// Psychological rounding applied to converted prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PriceRounding {
    #[default]
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "NEAREST_1")]
    Nearest1,
    #[serde(rename = "NEAREST_5")]
    Nearest5,
    #[serde(rename = "NEAREST_10")]
    Nearest10,
    #[serde(rename = "ENDING_9")]
    Ending9,
    #[serde(rename = "CUSTOM")]
    Custom,
}

impl PriceRounding {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "NONE" => Some(PriceRounding::None),
            "NEAREST_1" => Some(PriceRounding::Nearest1),
            "NEAREST_5" => Some(PriceRounding::Nearest5),
            "NEAREST_10" => Some(PriceRounding::Nearest10),
            "ENDING_9" => Some(PriceRounding::Ending9),
            "CUSTOM" => Some(PriceRounding::Custom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceRounding::None => "NONE",
            PriceRounding::Nearest1 => "NEAREST_1",
            PriceRounding::Nearest5 => "NEAREST_5",
            PriceRounding::Nearest10 => "NEAREST_10",
            PriceRounding::Ending9 => "ENDING_9",
            PriceRounding::Custom => "CUSTOM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomRoundingMode {
    /// Floor to a multiple of `round_to`, then add `offset`
    #[default]
    Floor,
    /// Round to the nearest multiple of `round_to`, then add `offset`
    Nearest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRoundingRule {
    pub max_amount: Decimal,
    pub round_to: Decimal,
    #[serde(default)]
    pub offset: Decimal,
    #[serde(default)]
    pub mode: CustomRoundingMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyConfig {
    pub code: String,
    pub decimals: u32,
    pub symbol: String,
    pub symbol_position: SymbolPosition,
    pub rounding: PriceRounding,
    #[serde(default)]
    pub custom_rounding_rules: Vec<CustomRoundingRule>,
    /// Signed percentage applied after rounding
    #[serde(default)]
    pub market_markup_adjustment_pct: Decimal,
    #[serde(default)]
    pub allow_manual_rate: bool,
    #[serde(default)]
    pub manual_rate: Option<Decimal>,
    pub is_active: bool,
}

impl CurrencyConfig {
    /// Stand-in for a currency nobody configured: symbol = code, 2 decimals, no rounding.
    pub fn fallback(code: &str) -> Self {
        let code = code.trim().to_uppercase();
        Self {
            symbol: code.clone(),
            code,
            decimals: 2,
            symbol_position: SymbolPosition::Before,
            rounding: PriceRounding::None,
            custom_rounding_rules: Vec::new(),
            market_markup_adjustment_pct: Decimal::ZERO,
            allow_manual_rate: false,
            manual_rate: None,
            is_active: true,
        }
    }

    /// Display config for the base currency itself
    pub fn base() -> Self {
        Self {
            symbol: "$".to_string(),
            ..Self::fallback(BASE_CURRENCY)
        }
    }

    pub fn is_base(&self) -> bool {
        self.code.eq_ignore_ascii_case(BASE_CURRENCY)
    }

    /// Manual rate when the config allows one and it is usable
    pub fn usable_manual_rate(&self) -> Option<Decimal> {
        if !self.allow_manual_rate {
            return None;
        }
        self.manual_rate.filter(|rate| *rate > Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertedPrice {
    pub currency: String,
    pub amount: Decimal,
    pub formatted: String,
    pub rate: Option<Decimal>,
    pub rate_unavailable: bool,
}

fn base_passthrough(amount_base: Decimal) -> ConvertedPrice {
    let base = CurrencyConfig::base();
    ConvertedPrice {
        currency: base.code.clone(),
        amount: amount_base,
        formatted: format_price(amount_base, &base),
        rate: None,
        rate_unavailable: true,
    }
}

fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Nearest multiple of `step`; the value is kept as-is when that would overflow.
fn round_to_multiple(value: Decimal, step: Decimal) -> Decimal {
    value
        .checked_div(step)
        .and_then(|steps| round_half_up(steps, 0).checked_mul(step))
        .unwrap_or(value)
}

fn floor_to_multiple(value: Decimal, step: Decimal) -> Decimal {
    value
        .checked_div(step)
        .and_then(|steps| steps.floor().checked_mul(step))
        .unwrap_or(value)
}

/// `.99` / `9` endings, tiered by magnitude.
fn round_ending_9(amount: Decimal) -> Decimal {
    if amount < dec!(10) {
        let whole = amount.floor();
        if whole < Decimal::ONE {
            return dec!(0.99);
        }
        return (whole - Decimal::ONE + dec!(0.99)).max(dec!(0.99));
    }

    if amount < dec!(100) {
        let ten = (amount / dec!(10)).floor() * dec!(10);
        return if amount - ten > dec!(5) {
            ten + dec!(9.99)
        } else {
            ten - dec!(0.01)
        };
    }

    if amount < dec!(1000) {
        let hundred = (amount / dec!(100)).floor() * dec!(100);
        return if amount - hundred > dec!(50) {
            hundred + dec!(99)
        } else {
            hundred - Decimal::ONE
        };
    }

    round_to_multiple(amount, dec!(100)) - Decimal::ONE
}

fn round_custom(amount: Decimal, rules: &[CustomRoundingRule], decimals: u32) -> Decimal {
    let mut ordered: Vec<&CustomRoundingRule> = rules.iter().collect();
    ordered.sort_by(|a, b| a.max_amount.cmp(&b.max_amount));

    let rule = ordered
        .into_iter()
        .find(|rule| rule.max_amount > amount && rule.round_to > Decimal::ZERO);

    match rule {
        Some(rule) => {
            let rounded = match rule.mode {
                CustomRoundingMode::Floor => floor_to_multiple(amount, rule.round_to),
                CustomRoundingMode::Nearest => round_to_multiple(amount, rule.round_to),
            };
            rounded.checked_add(rule.offset).unwrap_or(rounded)
        }
        None => round_half_up(amount, decimals),
    }
}

/// Apply the currency's rounding strategy to an already converted amount.
pub fn apply_rounding(amount: Decimal, config: &CurrencyConfig) -> Decimal {
    match config.rounding {
        PriceRounding::None => round_half_up(amount, config.decimals),
        PriceRounding::Nearest1 => round_to_multiple(amount, dec!(1)),
        PriceRounding::Nearest5 => round_to_multiple(amount, dec!(5)),
        PriceRounding::Nearest10 => round_to_multiple(amount, dec!(10)),
        PriceRounding::Ending9 => round_ending_9(amount),
        PriceRounding::Custom => round_custom(amount, &config.custom_rounding_rules, config.decimals),
    }
}

/// Thousands-separated, fixed decimals, symbol placed per config.
pub fn format_price(amount: Decimal, config: &CurrencyConfig) -> String {
    let rounded = round_half_up(amount, config.decimals);
    let fixed = format!("{:.1$}", rounded, config.decimals as usize);

    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let number = match fraction {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    };

    match config.symbol_position {
        SymbolPosition::Before => format!("{}{}", config.symbol, number),
        SymbolPosition::After => format!("{} {}", number, config.symbol),
    }
}

/// Convert `amount_base` with `rate` and apply rounding plus the market adjustment.
///
/// A missing or non-positive rate never fails: the base amount is returned
/// as-is with `rate_unavailable` set. An amount too large to convert is
/// treated the same way.
pub fn convert(amount_base: Decimal, rate: Option<Decimal>, config: &CurrencyConfig) -> ConvertedPrice {
    let rate = if config.is_base() {
        Some(Decimal::ONE)
    } else {
        rate.filter(|r| *r > Decimal::ZERO)
    };

    let Some(rate) = rate else {
        return base_passthrough(amount_base);
    };

    let Some(converted) = amount_base.checked_mul(rate) else {
        tracing::warn!(
            currency = %config.code,
            amount = %amount_base,
            rate = %rate,
            "Converted amount overflows, showing base amount"
        );
        return base_passthrough(amount_base);
    };
    let mut amount = apply_rounding(converted, config);

    if !config.market_markup_adjustment_pct.is_zero() {
        let factor = Decimal::ONE + config.market_markup_adjustment_pct / dec!(100);
        match amount.checked_mul(factor) {
            Some(adjusted) => amount = apply_rounding(adjusted, config),
            None => tracing::warn!(
                currency = %config.code,
                "Market adjustment overflows, keeping unadjusted amount"
            ),
        }
    }

    ConvertedPrice {
        currency: config.code.clone(),
        amount,
        formatted: format_price(amount, config),
        rate: Some(rate),
        rate_unavailable: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(code: &str, rounding: PriceRounding) -> CurrencyConfig {
        CurrencyConfig {
            rounding,
            ..CurrencyConfig::fallback(code)
        }
    }

    #[test]
    fn test_ending_9_examples() {
        let c = config("EUR", PriceRounding::Ending9);

        assert_eq!(apply_rounding(dec!(7.23), &c), dec!(6.99));
        assert_eq!(apply_rounding(dec!(0.40), &c), dec!(0.99));
        assert_eq!(apply_rounding(dec!(1.50), &c), dec!(0.99));
        assert_eq!(apply_rounding(dec!(45.67), &c), dec!(49.99));
        assert_eq!(apply_rounding(dec!(43.10), &c), dec!(39.99));
        // exactly 5 above the ten favours the lower candidate
        assert_eq!(apply_rounding(dec!(45), &c), dec!(39.99));
        assert_eq!(apply_rounding(dec!(456), &c), dec!(499));
        assert_eq!(apply_rounding(dec!(420), &c), dec!(399));
        assert_eq!(apply_rounding(dec!(1234), &c), dec!(1199));
        assert_eq!(apply_rounding(dec!(1260), &c), dec!(1299));
    }

    #[test]
    fn test_ending_9_patterns_hold() {
        let c = config("EUR", PriceRounding::Ending9);
        let mut amount = dec!(10);
        while amount < dec!(100) {
            let rounded = apply_rounding(amount, &c);
            assert_eq!(rounded.fract(), dec!(0.99), "amount {}", amount);
            assert_eq!((rounded.trunc() % dec!(10)), dec!(9), "amount {}", amount);
            amount += dec!(0.37);
        }

        let mut amount = dec!(100);
        while amount < dec!(1000) {
            let rounded = apply_rounding(amount, &c);
            let tail = rounded % dec!(100);
            assert!(tail == dec!(49) || tail == dec!(99), "amount {} -> {}", amount, rounded);
            amount += dec!(13.7);
        }
    }

    #[test]
    fn test_nearest_multiples() {
        assert_eq!(apply_rounding(dec!(12.5), &config("X", PriceRounding::Nearest1)), dec!(13));
        assert_eq!(apply_rounding(dec!(12.4), &config("X", PriceRounding::Nearest5)), dec!(10));
        assert_eq!(apply_rounding(dec!(12.5), &config("X", PriceRounding::Nearest5)), dec!(15));
        assert_eq!(apply_rounding(dec!(1234), &config("X", PriceRounding::Nearest10)), dec!(1230));
    }

    #[test]
    fn test_none_rounds_to_decimals() {
        let mut c = config("JPY", PriceRounding::None);
        c.decimals = 0;
        assert_eq!(apply_rounding(dec!(1499.5), &c), dec!(1500));

        let c = config("EUR", PriceRounding::None);
        assert_eq!(apply_rounding(dec!(10.125), &c), dec!(10.13));
    }

    #[test]
    fn test_custom_rules() {
        let mut c = config("INR", PriceRounding::Custom);
        c.custom_rounding_rules = vec![
            CustomRoundingRule {
                max_amount: dec!(10000),
                round_to: dec!(100),
                offset: dec!(-1),
                mode: CustomRoundingMode::Nearest,
            },
            CustomRoundingRule {
                max_amount: dec!(1000),
                round_to: dec!(10),
                offset: dec!(9),
                mode: CustomRoundingMode::Floor,
            },
        ];

        // rules are evaluated in ascending max_amount order
        assert_eq!(apply_rounding(dec!(457.3), &c), dec!(459));
        assert_eq!(apply_rounding(dec!(4560), &c), dec!(4599));
        // nothing matches above the last bound: plain rounding
        assert_eq!(apply_rounding(dec!(25000.456), &c), dec!(25000.46));
    }

    #[test]
    fn test_convert_with_market_adjustment() {
        let mut c = config("EUR", PriceRounding::Ending9);
        c.market_markup_adjustment_pct = dec!(10);

        let price = convert(dec!(50), Some(dec!(0.92)), &c);
        // 46.00 -> 49.99, +10% = 54.989 -> 49.99
        assert_eq!(price.amount, dec!(49.99));
        assert!(!price.rate_unavailable);
        assert_eq!(price.currency, "EUR");

        c.market_markup_adjustment_pct = dec!(-20);
        let price = convert(dec!(60), Some(dec!(1)), &c);
        // 60 -> 59.99, -20% = 47.992 -> 49.99
        assert_eq!(price.amount, dec!(49.99));
    }

    #[test]
    fn test_convert_without_rate_passes_base_amount_through() {
        let c = config("NGN", PriceRounding::Nearest10);
        let price = convert(dec!(123.456), None, &c);

        assert!(price.rate_unavailable);
        assert_eq!(price.amount, dec!(123.456));
        assert_eq!(price.currency, "USD");
        assert_eq!(price.rate, None);

        let price = convert(dec!(10), Some(dec!(0)), &c);
        assert!(price.rate_unavailable);
    }

    #[test]
    fn test_convert_overflow_falls_back_to_base_amount() {
        let mut jpy = config("JPY", PriceRounding::Nearest10);
        jpy.decimals = 0;

        let price = convert(Decimal::MAX, Some(dec!(150)), &jpy);
        assert!(price.rate_unavailable);
        assert_eq!(price.currency, "USD");
        assert_eq!(price.amount, Decimal::MAX);

        // the conversion fits but the adjustment does not
        jpy.rounding = PriceRounding::None;
        jpy.market_markup_adjustment_pct = dec!(50);
        let price = convert(Decimal::MAX / dec!(2), Some(dec!(1.5)), &jpy);
        assert!(!price.rate_unavailable);
        assert_eq!(price.currency, "JPY");
        assert!(price.amount > Decimal::ZERO);
    }

    #[test]
    fn test_rounding_near_decimal_limits_does_not_panic() {
        let huge = Decimal::MAX - dec!(1);
        for rounding in [PriceRounding::Nearest10, PriceRounding::Ending9] {
            assert!(apply_rounding(huge, &config("X", rounding)) > Decimal::ZERO);
        }

        let mut c = config("X", PriceRounding::Custom);
        c.custom_rounding_rules = vec![CustomRoundingRule {
            max_amount: Decimal::MAX,
            round_to: dec!(0.05),
            offset: dec!(0.01),
            mode: CustomRoundingMode::Floor,
        }];
        assert!(apply_rounding(huge, &c) > Decimal::ZERO);
    }

    #[test]
    fn test_base_currency_always_has_rate() {
        let price = convert(dec!(135), None, &CurrencyConfig::base());
        assert!(!price.rate_unavailable);
        assert_eq!(price.rate, Some(Decimal::ONE));
        assert_eq!(price.formatted, "$135.00");
    }

    #[test]
    fn test_format_price() {
        let mut c = config("EUR", PriceRounding::None);
        c.symbol = "€".to_string();
        assert_eq!(format_price(dec!(1234567.891), &c), "€1,234,567.89");

        c.symbol_position = SymbolPosition::After;
        c.symbol = "kr".to_string();
        assert_eq!(format_price(dec!(999), &c), "999.00 kr");

        c.decimals = 0;
        c.symbol_position = SymbolPosition::Before;
        c.symbol = "¥".to_string();
        assert_eq!(format_price(dec!(1000), &c), "¥1,000");
        assert_eq!(format_price(dec!(-1234.4), &c), "¥-1,234");
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(PriceRounding::from_str("ending_9"), Some(PriceRounding::Ending9));
        assert_eq!(PriceRounding::from_str("bogus"), None);
        assert_eq!(PriceRounding::Nearest5.as_str(), "NEAREST_5");
        assert_eq!(SymbolPosition::from_str("AFTER"), Some(SymbolPosition::After));
    }
}
