use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Rounds a money amount to cents, halves away from zero. The result always
/// carries two decimal places so it serializes as e.g. `"0.00"`.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Flat shipping plus a single tax rate. Totals are recomputed on every read
/// and only persisted once an order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub shipping_cost: Decimal,
    pub tax_rate: Decimal,
    pub currency: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            shipping_cost: Decimal::new(1000, 2),
            tax_rate: Decimal::new(8, 2),
            currency: "USD".into(),
        }
    }
}

impl PricingConfig {
    pub fn tax_for(&self, subtotal: Decimal) -> Decimal {
        round_money(subtotal * self.tax_rate)
    }

    /// Tax is charged on the undiscounted subtotal; the discount comes off the
    /// grand total.
    pub fn quote(&self, subtotal: Decimal, discount: Decimal) -> Totals {
        let tax_amount = self.tax_for(subtotal);
        let discount_amount = discount.max(Decimal::ZERO).min(subtotal);
        Totals {
            subtotal,
            shipping_cost: self.shipping_cost,
            tax_amount,
            discount_amount,
            total: subtotal + self.shipping_cost + tax_amount - discount_amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quote_for_forty_dollars() {
        let totals = PricingConfig::default().quote(Decimal::new(4000, 2), Decimal::ZERO);
        assert_eq!(totals.shipping_cost, Decimal::new(1000, 2));
        assert_eq!(totals.tax_amount, Decimal::new(320, 2));
        assert_eq!(totals.total, Decimal::new(5320, 2));
    }

    #[test]
    fn tax_rounds_half_away_from_zero() {
        let cfg = PricingConfig::default();
        // 0.0625 * 0.08 = 0.005
        assert_eq!(cfg.tax_for(Decimal::new(625, 4)), Decimal::new(1, 2));
        assert_eq!(cfg.tax_for(Decimal::new(1999, 2)), Decimal::new(160, 2));
    }

    #[test]
    fn discount_is_subtracted_and_bounded_by_subtotal() {
        let cfg = PricingConfig::default();
        let totals = cfg.quote(Decimal::new(10000, 2), Decimal::new(500, 2));
        assert_eq!(totals.discount_amount, Decimal::new(500, 2));
        assert_eq!(totals.total, Decimal::new(11300, 2));

        let over = cfg.quote(Decimal::new(500, 2), Decimal::new(900, 2));
        assert_eq!(over.discount_amount, Decimal::new(500, 2));
    }

    #[test]
    fn rounded_money_keeps_two_places() {
        assert_eq!(round_money(Decimal::ZERO).to_string(), "0.00");
        assert_eq!(round_money(Decimal::new(40, 0)).to_string(), "40.00");
        assert_eq!(round_money(Decimal::new(12345, 3)).to_string(), "12.35");
    }
}
