//! Cart Aggregate
//!
//! Lines are keyed by `(product, tier, case key)`. Adding a line whose key
//! already exists merges quantities; the unit price captured on first insert
//! is kept for the life of the line.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::Product;
use crate::domain::pricing::{resolve_case_conversion, resolve_price};
use crate::domain::value_objects::{CaseKey, CaseSize, Money, ProductId, TierId};
use crate::domain::ValidationError;

/// Composite identity of a cart line.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub product_id: ProductId,
    pub tier: TierId,
    pub case_key: CaseKey,
}

impl LineKey {
    pub fn new(product_id: ProductId, tier: TierId, case_key: CaseKey) -> Self {
        Self { product_id, tier, case_key }
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.product_id, self.tier, self.case_key)
    }
}

/// How much of a product a buyer asks for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderQuantity {
    Units { quantity: u32 },
    Cases { case_size: CaseSize, cases: u32 },
}

impl OrderQuantity {
    pub fn units(quantity: u32) -> Self { Self::Units { quantity } }
    pub fn cases(case_size: CaseSize, cases: u32) -> Self { Self::Cases { case_size, cases } }
}

/// Quantity held by a line. A cased line stores its case count, so its unit
/// quantity is always `cases_ordered * units_per_case`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineQuantity {
    Units { quantity: u32 },
    Cased { case_size: CaseSize, cases_ordered: u32, units_per_case: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub tier: TierId,
    pub unit_price: Money,
    pub quantity: LineQuantity,
}

impl CartLine {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product_id.clone(), self.tier, self.case_key())
    }

    pub fn case_key(&self) -> CaseKey {
        match &self.quantity {
            LineQuantity::Units { .. } => CaseKey::unit(),
            LineQuantity::Cased { case_size, .. } => CaseKey::for_case(case_size),
        }
    }

    /// Total units represented by the line.
    pub fn units(&self) -> u32 {
        match &self.quantity {
            LineQuantity::Units { quantity } => *quantity,
            LineQuantity::Cased { cases_ordered, units_per_case, .. } => cases_ordered * units_per_case,
        }
    }

    pub fn cases_ordered(&self) -> Option<u32> {
        match &self.quantity {
            LineQuantity::Units { .. } => None,
            LineQuantity::Cased { cases_ordered, .. } => Some(*cases_ordered),
        }
    }

    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.units()) }
}

/// Frozen copy of a cart's lines, decoupled from later cart mutations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub currency: String,
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
}

#[derive(Clone, Debug)]
pub struct Cart {
    currency: String,
    lines: Vec<CartLine>,
    updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(currency: &str) -> Self {
        Self { currency: currency.to_string(), lines: vec![], updated_at: Utc::now() }
    }

    /// Rebuilds a cart from persisted lines.
    pub fn from_lines(currency: &str, lines: Vec<CartLine>) -> Self {
        Self { currency: currency.to_string(), lines, updated_at: Utc::now() }
    }

    pub fn currency(&self) -> &str { &self.currency }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn line(&self, key: &LineKey) -> Option<&CartLine> { self.lines.iter().find(|l| &l.key() == key) }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn add_line(&mut self, product: &Product, tier: TierId, requested: OrderQuantity) -> Result<(), CartError> {
        let (case_key, added) = match &requested {
            OrderQuantity::Units { quantity } => {
                if *quantity == 0 { return Err(ValidationError::InvalidQuantity(0).into()); }
                (CaseKey::unit(), None)
            }
            OrderQuantity::Cases { case_size, cases } => {
                if *cases == 0 { return Err(ValidationError::InvalidQuantity(0).into()); }
                if !product.case_sizes().contains(case_size) {
                    return Err(ValidationError::MalformedCase(CaseKey::for_case(case_size).to_string()).into());
                }
                let conversion = resolve_case_conversion(case_size)?;
                checked_units(*cases, conversion.units_per_case)?;
                (CaseKey::for_case(case_size), Some(conversion))
            }
        };
        let key = LineKey::new(product.id().clone(), tier, case_key);

        if let Some(existing) = self.lines.iter_mut().find(|l| l.key() == key) {
            match (&mut existing.quantity, requested) {
                (LineQuantity::Units { quantity }, OrderQuantity::Units { quantity: more }) => {
                    *quantity = quantity.checked_add(more).ok_or(ValidationError::InvalidQuantity(i64::from(more)))?;
                }
                (LineQuantity::Cased { cases_ordered, units_per_case, .. }, OrderQuantity::Cases { cases, .. }) => {
                    let merged = cases_ordered.checked_add(cases).ok_or(ValidationError::InvalidQuantity(i64::from(cases)))?;
                    checked_units(merged, *units_per_case)?;
                    *cases_ordered = merged;
                }
                // Keys embed the case identity, so a unit request never matches a cased line.
                _ => return Err(ValidationError::MalformedCase(key.case_key.to_string()).into()),
            }
        } else {
            let unit_price = resolve_price(product, tier)?;
            if unit_price.currency() != self.currency {
                return Err(ValidationError::CurrencyMismatch {
                    expected: self.currency.clone(),
                    found: unit_price.currency().to_string(),
                }
                .into());
            }
            let quantity = match (requested, added) {
                (OrderQuantity::Cases { cases, .. }, Some(conversion)) => LineQuantity::Cased {
                    case_size: conversion.case_size,
                    cases_ordered: cases,
                    units_per_case: conversion.units_per_case,
                },
                (OrderQuantity::Units { quantity }, _) | (OrderQuantity::Cases { cases: quantity, .. }, None) => {
                    LineQuantity::Units { quantity }
                }
            };
            self.lines.push(CartLine {
                product_id: product.id().clone(),
                name: product.name().to_string(),
                tier,
                unit_price,
                quantity,
            });
        }
        self.touch();
        Ok(())
    }

    /// Sets the unit quantity of a line. Non-positive values remove it.
    ///
    /// On a cased line the quantity must be a whole number of cases.
    pub fn update_quantity(&mut self, key: &LineKey, new_quantity: i64) -> Result<(), CartError> {
        if new_quantity <= 0 {
            self.remove_line(key);
            return Ok(());
        }
        let units = u32::try_from(new_quantity).map_err(|_| ValidationError::InvalidQuantity(new_quantity))?;
        let line = self.line_mut(key)?;
        match &mut line.quantity {
            LineQuantity::Units { quantity } => *quantity = units,
            LineQuantity::Cased { cases_ordered, units_per_case, .. } => {
                if units % *units_per_case != 0 {
                    return Err(ValidationError::NotCaseMultiple { quantity: new_quantity, units_per_case: *units_per_case }.into());
                }
                *cases_ordered = units / *units_per_case;
            }
        }
        self.touch();
        Ok(())
    }

    /// Sets the case count of a cased line. Non-positive values remove it.
    pub fn update_case_quantity(&mut self, key: &LineKey, new_case_count: i64) -> Result<(), CartError> {
        if new_case_count <= 0 {
            self.remove_line(key);
            return Ok(());
        }
        let cases = u32::try_from(new_case_count).map_err(|_| ValidationError::InvalidQuantity(new_case_count))?;
        let line = self.line_mut(key)?;
        match &mut line.quantity {
            LineQuantity::Units { .. } => return Err(CartError::NotCased(key.clone())),
            LineQuantity::Cased { cases_ordered, units_per_case, .. } => {
                checked_units(cases, *units_per_case)?;
                *cases_ordered = cases;
            }
        }
        self.touch();
        Ok(())
    }

    /// Removes a line; returns whether one was present. Missing keys are not an error.
    pub fn remove_line(&mut self, key: &LineKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| &l.key() != key);
        let removed = self.lines.len() != before;
        if removed { self.touch(); }
        removed
    }

    pub fn clear(&mut self) { self.lines.clear(); self.touch(); }

    /// `Σ unit_price * units` over all lines.
    pub fn total(&self) -> Money {
        self.lines.iter().fold(Money::zero(&self.currency), |acc, l| acc.add(&l.line_total()).unwrap_or(acc))
    }

    /// Legacy count: cases for cased lines plus units for unit lines.
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.cases_ordered().unwrap_or_else(|| l.units()))).sum()
    }

    pub fn total_cases(&self) -> u64 {
        self.lines.iter().filter_map(CartLine::cases_ordered).map(u64::from).sum()
    }

    pub fn total_units(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.units())).sum()
    }

    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot { currency: self.currency.clone(), lines: self.lines.clone(), subtotal: self.total() }
    }

    fn line_mut(&mut self, key: &LineKey) -> Result<&mut CartLine, CartError> {
        self.lines.iter_mut().find(|l| &l.key() == key).ok_or_else(|| CartError::LineNotFound(key.clone()))
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

fn checked_units(cases: u32, units_per_case: u32) -> Result<u32, ValidationError> {
    cases.checked_mul(units_per_case).ok_or(ValidationError::InvalidQuantity(i64::from(cases)))
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("Cart line not found: {0}")]
    LineNotFound(LineKey),

    #[error("Cart line {0} is not sold by the case")]
    NotCased(LineKey),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
