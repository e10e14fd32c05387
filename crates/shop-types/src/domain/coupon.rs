use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::pricing::round_money;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }
}

impl std::str::FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(DiscountType::Percentage),
            "fixed" => Ok(DiscountType::Fixed),
            other => Err(format!("unknown discount type `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coupon {
    /// Always stored upper-cased; see [`Coupon::normalize_code`].
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub minimum_amount: Decimal,
    pub maximum_discount: Option<Decimal>,
    pub usage_limit: Option<u32>,
    pub usage_count: u32,
    pub usage_limit_per_customer: Option<u32>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Coupon {
    pub fn new(
        code: &str,
        discount_type: DiscountType,
        discount_value: Decimal,
        valid_from: DateTime<Utc>,
    ) -> Self {
        Self {
            code: Self::normalize_code(code),
            description: String::new(),
            discount_type,
            discount_value,
            minimum_amount: Decimal::ZERO,
            maximum_discount: None,
            usage_limit: None,
            usage_count: 0,
            usage_limit_per_customer: None,
            valid_from,
            valid_until: None,
            is_active: true,
        }
    }

    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_limit
            .is_some_and(|limit| self.usage_count >= limit)
    }

    /// Pure in `now` and the usage counters.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active || now < self.valid_from {
            return false;
        }
        if self.valid_until.is_some_and(|until| now > until) {
            return false;
        }
        !self.is_exhausted()
    }

    /// Discount this coupon grants on `amount`, always within `0..=amount`.
    /// Usage counters are not touched here.
    pub fn calculate_discount(&self, amount: Decimal, now: DateTime<Utc>) -> Decimal {
        if !self.is_valid(now) || amount < self.minimum_amount {
            return Decimal::ZERO;
        }
        let mut discount = match self.discount_type {
            DiscountType::Percentage => round_money(amount * (self.discount_value / Decimal::ONE_HUNDRED)),
            DiscountType::Fixed => self.discount_value,
        };
        if let Some(cap) = self.maximum_discount {
            discount = discount.min(cap);
        }
        discount.min(amount).max(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dec(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    fn percent(value: i64) -> Coupon {
        Coupon::new(" save10 ", DiscountType::Percentage, Decimal::from(value), Utc::now() - Duration::days(1))
    }

    #[test]
    fn code_is_normalized() {
        assert_eq!(percent(10).code, "SAVE10");
    }

    #[test]
    fn percentage_discount_is_capped() {
        let mut c = percent(10);
        c.maximum_discount = Some(dec(500));
        assert_eq!(c.calculate_discount(dec(10000), Utc::now()), dec(500));
        c.maximum_discount = None;
        assert_eq!(c.calculate_discount(dec(10000), Utc::now()), dec(1000));
    }

    #[test]
    fn fixed_discount_never_exceeds_amount() {
        let c = Coupon::new("FLAT", DiscountType::Fixed, dec(2500), Utc::now() - Duration::hours(1));
        assert_eq!(c.calculate_discount(dec(1000), Utc::now()), dec(1000));
        assert_eq!(c.calculate_discount(dec(4000), Utc::now()), dec(2500));
    }

    #[test]
    fn minimum_amount_gates_discount() {
        let mut c = percent(10);
        c.minimum_amount = dec(5000);
        assert_eq!(c.calculate_discount(dec(4999), Utc::now()), Decimal::ZERO);
        assert_eq!(c.calculate_discount(dec(5000), Utc::now()), dec(500));
    }

    #[test]
    fn validity_window_and_usage_limit() {
        let now = Utc::now();
        let mut c = percent(10);
        assert!(c.is_valid(now));

        c.valid_from = now + Duration::minutes(5);
        assert!(!c.is_valid(now));
        assert_eq!(c.calculate_discount(dec(10000), now), Decimal::ZERO);

        c.valid_from = now - Duration::days(2);
        c.valid_until = Some(now - Duration::days(1));
        assert!(!c.is_valid(now));

        c.valid_until = Some(now + Duration::days(1));
        c.usage_limit = Some(3);
        c.usage_count = 2;
        assert!(c.is_valid(now));
        c.usage_count = 3;
        assert!(!c.is_valid(now));
        assert!(c.is_exhausted());

        c.usage_limit = None;
        c.is_active = false;
        assert!(!c.is_valid(now));
    }

    #[test]
    fn discount_is_bounded_for_many_amounts() {
        let now = Utc::now();
        let mut c = percent(35);
        c.maximum_discount = Some(dec(2000));
        for cents in [0, 1, 99, 1000, 5714, 10000, 999_999] {
            let amount = dec(cents);
            let d = c.calculate_discount(amount, now);
            assert!(d >= Decimal::ZERO);
            assert!(d <= amount);
            assert!(d <= dec(2000));
        }
    }
}
