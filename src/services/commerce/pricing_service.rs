use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Monetary figures for one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PriceCalculation {
    pub unit_value: Decimal,
    pub tax_percentage: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_price: Decimal,
}

/// Sums of a sequence of line calculations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PriceTotals {
    pub total_items: i64,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_price: Decimal,
}

/// Exact decimal pricing. Callers validate inputs before invoking it:
/// unit value >= 0, tax percentage in [0, 100], quantity >= 1.
pub struct PricingEngine;

impl PricingEngine {
    pub fn calculate(unit_value: Decimal, tax_percentage: Decimal, quantity: i32) -> PriceCalculation {
        let subtotal = unit_value * Decimal::from(quantity);
        let tax_amount = subtotal * tax_percentage / Decimal::ONE_HUNDRED;
        PriceCalculation {
            unit_value,
            tax_percentage,
            quantity,
            subtotal,
            tax_amount,
            total_price: subtotal + tax_amount,
        }
    }

    /// Each field is summed on its own; totals are never re-derived from unit values.
    pub fn aggregate<'a, I>(lines: I) -> PriceTotals
    where
        I: IntoIterator<Item = &'a PriceCalculation>,
    {
        lines
            .into_iter()
            .fold(PriceTotals::default(), |mut acc, line| {
                acc.total_items += i64::from(line.quantity);
                acc.subtotal += line.subtotal;
                acc.tax_amount += line.tax_amount;
                acc.total_price += line.total_price;
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_calculate_basic_line() {
        let line = PricingEngine::calculate(dec!(10.00), dec!(19), 3);
        assert_eq!(line.subtotal, dec!(30.00));
        assert_eq!(line.tax_amount, dec!(5.70));
        assert_eq!(line.total_price, dec!(35.70));
    }

    #[test]
    fn test_calculate_without_tax() {
        let line = PricingEngine::calculate(dec!(4.33), Decimal::ZERO, 3);
        assert_eq!(line.subtotal, dec!(12.99));
        assert_eq!(line.tax_amount, Decimal::ZERO);
        assert_eq!(line.total_price, dec!(12.99));
    }

    #[test]
    fn test_fractional_tax_is_exact() {
        // 0.1 * 3 would drift in binary floating point
        let line = PricingEngine::calculate(dec!(0.10), dec!(7.5), 3);
        assert_eq!(line.subtotal, dec!(0.30));
        assert_eq!(line.tax_amount, dec!(0.0225));
        assert_eq!(line.total_price, dec!(0.3225));
    }

    #[test]
    fn test_free_item() {
        let line = PricingEngine::calculate(Decimal::ZERO, dec!(21), 5);
        assert_eq!(line.total_price, Decimal::ZERO);
    }

    #[test]
    fn test_aggregate_sums_fields_independently() {
        let lines = vec![
            PricingEngine::calculate(dec!(10.00), dec!(10), 2),
            PricingEngine::calculate(dec!(5.50), dec!(0), 1),
            PricingEngine::calculate(dec!(3.25), dec!(50), 4),
        ];
        let totals = PricingEngine::aggregate(&lines);

        assert_eq!(totals.total_items, 7);
        assert_eq!(totals.subtotal, dec!(38.50));
        assert_eq!(totals.tax_amount, dec!(8.50));
        assert_eq!(totals.total_price, dec!(47.00));
    }

    #[test]
    fn test_aggregate_empty() {
        let totals = PricingEngine::aggregate(&Vec::<PriceCalculation>::new());
        assert_eq!(totals, PriceTotals::default());
        assert_eq!(totals.total_price, Decimal::ZERO);
    }
}
