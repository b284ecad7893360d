//! Product Aggregate

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{CaseSize, Money, ProductId, Sku, TierId};

/// A catalog product as seen by the cart: a per-tier price table and the
/// case configurations it is sold in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    sku: Sku,
    name: String,
    tier_prices: BTreeMap<TierId, Money>,
    #[serde(default)]
    case_sizes: Vec<CaseSize>,
}

impl Product {
    pub fn create(id: impl Into<String>, sku: Sku, name: impl Into<String>) -> Self {
        Self { id: ProductId::new(id), sku, name: name.into(), tier_prices: BTreeMap::new(), case_sizes: vec![] }
    }

    pub fn with_tier_price(mut self, tier: TierId, price: Money) -> Self {
        self.tier_prices.insert(tier, price);
        self
    }

    pub fn with_case_size(mut self, case: CaseSize) -> Self {
        self.case_sizes.push(case);
        self
    }

    pub fn id(&self) -> &ProductId { &self.id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn name(&self) -> &str { &self.name }
    pub fn tier_price(&self, tier: TierId) -> Option<&Money> { self.tier_prices.get(&tier) }
    pub fn case_sizes(&self) -> &[CaseSize] { &self.case_sizes }

    pub fn update_price(&mut self, tier: TierId, new_price: Money) {
        self.tier_prices.insert(tier, new_price);
    }
}
