//! Tier price resolution, case conversion and checkout fee arithmetic.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::Product;
use crate::domain::value_objects::{CaseSize, Money, TierId};
use crate::domain::ValidationError;

/// Resolves the per-unit price of `product` at `tier`.
///
/// A missing tier column is a catalog configuration error, never a silent default.
pub fn resolve_price(product: &Product, tier: TierId) -> Result<Money, ValidationError> {
    let price = product
        .tier_price(tier)
        .ok_or_else(|| ValidationError::UnknownTierPrice { product: product.id().clone(), tier })?;
    if price.is_negative() {
        return Err(ValidationError::NegativeAmount(price.amount()));
    }
    Ok(price.clone())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseConversion {
    pub units_per_case: u32,
    pub case_size: CaseSize,
}

pub fn resolve_case_conversion(case: &CaseSize) -> Result<CaseConversion, ValidationError> {
    if case.size == 0 {
        return Err(ValidationError::MalformedCase(format!("case '{}' has size 0", case.label)));
    }
    if case.label.trim().is_empty() {
        return Err(ValidationError::MalformedCase(format!("{}-unit case has no label", case.size)));
    }
    Ok(CaseConversion { units_per_case: case.size, case_size: case.clone() })
}

/// Processing fee parameters: `fee = subtotal * rate + fixed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeeSchedule {
    pub rate: Decimal,
    pub fixed: Decimal,
}

impl FeeSchedule {
    pub fn new(rate: Decimal, fixed: Decimal) -> Self { Self { rate, fixed } }

    pub fn none() -> Self { Self::new(Decimal::ZERO, Decimal::ZERO) }

    /// Fee rounded half away from zero to cents.
    pub fn processing_fee(&self, subtotal: &Money) -> Money {
        let fee = subtotal.amount() * self.rate + self.fixed;
        Money::new(fee.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero), subtotal.currency())
    }
}

impl Default for FeeSchedule {
    fn default() -> Self { Self::new(Decimal::new(29, 3), Decimal::new(30, 2)) }
}

/// Price breakdown shown at checkout and frozen onto the order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSummary {
    pub subtotal: Money,
    pub processing_fee: Money,
    pub discount: Money,
    pub total: Money,
}

impl CheckoutSummary {
    /// `discount` is an externally resolved amount; it is subtracted as given.
    pub fn compute(subtotal: Money, fees: &FeeSchedule, discount: Option<Money>) -> Result<Self, ValidationError> {
        let processing_fee = fees.processing_fee(&subtotal);
        let discount = discount.unwrap_or_else(|| Money::zero(subtotal.currency()));
        if discount.is_negative() {
            return Err(ValidationError::NegativeAmount(discount.amount()));
        }
        let total = subtotal.add(&processing_fee)?.saturating_sub(&discount)?;
        Ok(Self { subtotal, processing_fee, discount, total })
    }
}
