//! Core domain types for the pricing engine.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::Amount;

/// Number of units of one product in the cart.
pub type Quantity = u32;

/// Errors raised while building a catalog or a rule table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("product '{0}' has non-positive price {1}")]
    NonPositivePrice(String, Amount),
    #[error("duplicate product '{0}'")]
    DuplicateProduct(String),
    #[error("duplicate rule '{0}'")]
    DuplicateRule(String),
    #[error("rule '{0}': percentage {1} is not within 0..=100")]
    InvalidPercentage(String, u8),
}

/// Fixed product price list. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    prices: BTreeMap<String, Amount>,
}

impl Catalog {
    pub fn new<S: Into<String>>(
        entries: impl IntoIterator<Item = (S, Amount)>,
    ) -> Result<Self, ModelError> {
        let mut prices = BTreeMap::new();
        for (product, price) in entries {
            let product = product.into();
            if !price.is_positive() {
                return Err(ModelError::NonPositivePrice(product, price));
            }
            if prices.contains_key(&product) {
                return Err(ModelError::DuplicateProduct(product));
            }
            prices.insert(product, price);
        }
        Ok(Self { prices })
    }

    pub fn price(&self, product: &str) -> Option<Amount> {
        self.prices.get(product).copied()
    }

    pub fn contains(&self, product: &str) -> bool {
        self.prices.contains_key(product)
    }

    pub fn products(&self) -> impl Iterator<Item = (&str, Amount)> + '_ {
        self.prices.iter().map(|(name, price)| (name.as_str(), *price))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Default for Catalog {
    /// Products A, B and C at 20, 40 and 50.
    fn default() -> Self {
        Self {
            prices: BTreeMap::from([
                ("Product A".to_string(), Amount::from_units(20)),
                ("Product B".to_string(), Amount::from_units(40)),
                ("Product C".to_string(), Amount::from_units(50)),
            ]),
        }
    }
}

/// Cart contents: product name to quantity.
///
/// Zero quantities are not stored, so an emptied line disappears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Quantities(BTreeMap<String, Quantity>);

impl Quantities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, product: impl Into<String>, quantity: Quantity) {
        let product = product.into();
        if quantity == 0 {
            self.0.remove(&product);
        } else {
            self.0.insert(product, quantity);
        }
    }

    pub fn get(&self, product: &str) -> Quantity {
        self.0.get(product).copied().unwrap_or(0)
    }

    /// Sum of all quantities.
    pub fn total(&self) -> u64 {
        self.0.values().map(|&q| u64::from(q)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Quantity)> + '_ {
        self.0.iter().map(|(name, qty)| (name.as_str(), *qty))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Quantity)> for Quantities {
    fn from_iter<I: IntoIterator<Item = (S, Quantity)>>(iter: I) -> Self {
        let mut quantities = Quantities::new();
        for (product, quantity) in iter {
            quantities.set(product, quantity);
        }
        quantities
    }
}

/// What a discount rule checks and how much it takes off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountKind {
    /// Fixed amount off when the running total exceeds `threshold`.
    CartTotal { threshold: Amount, amount: Amount },
    /// Percentage off the line total of every product whose quantity exceeds `threshold`.
    ProductQuantity { threshold: Quantity, percentage: u8 },
    /// Percentage off the running total when the cart holds more than `threshold` items.
    TotalQuantity { threshold: u64, percentage: u8 },
    /// Percentage off the units above `product_threshold` of each product,
    /// once the cart holds more than `total_threshold` items.
    TieredQuantity {
        total_threshold: u64,
        product_threshold: Quantity,
        percentage: u8,
    },
}

impl DiscountKind {
    fn percentage(&self) -> Option<u8> {
        match self {
            DiscountKind::CartTotal { .. } => None,
            DiscountKind::ProductQuantity { percentage, .. }
            | DiscountKind::TotalQuantity { percentage, .. }
            | DiscountKind::TieredQuantity { percentage, .. } => Some(*percentage),
        }
    }
}

/// A named discount policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountRule {
    pub name: String,
    pub kind: DiscountKind,
}

impl DiscountRule {
    pub fn new(name: impl Into<String>, kind: DiscountKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered rule table. The order is the application order under the
/// cumulative policy and the tie-break order under best-single.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<DiscountRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<DiscountRule>) -> Result<Self, ModelError> {
        let mut seen = BTreeSet::new();
        for rule in &rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(ModelError::DuplicateRule(rule.name.clone()));
            }
            if let Some(percentage) = rule.kind.percentage().filter(|p| *p > 100) {
                return Err(ModelError::InvalidPercentage(rule.name.clone(), percentage));
            }
        }
        Ok(Self { rules })
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscountRule> + '_ {
        self.rules.iter()
    }

    pub fn get(&self, name: &str) -> Option<&DiscountRule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    /// flat10, bulk5, bulk10, tiered50, in that order.
    fn default() -> Self {
        Self {
            rules: vec![
                DiscountRule::new(
                    "flat_10_discount",
                    DiscountKind::CartTotal {
                        threshold: Amount::from_units(200),
                        amount: Amount::from_units(10),
                    },
                ),
                DiscountRule::new(
                    "bulk_5_discount",
                    DiscountKind::ProductQuantity {
                        threshold: 10,
                        percentage: 5,
                    },
                ),
                DiscountRule::new(
                    "bulk_10_discount",
                    DiscountKind::TotalQuantity {
                        threshold: 20,
                        percentage: 10,
                    },
                ),
                DiscountRule::new(
                    "tiered_50_discount",
                    DiscountKind::TieredQuantity {
                        total_threshold: 30,
                        product_threshold: 15,
                        percentage: 50,
                    },
                ),
            ],
        }
    }
}

/// Names of the rules currently switched on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnabledRules(BTreeSet<String>);

impl EnabledRules {
    pub fn none() -> Self {
        Self::default()
    }

    /// Every rule of the table.
    pub fn all(rules: &RuleSet) -> Self {
        rules.iter().map(|rule| rule.name.clone()).collect()
    }

    pub fn enable(&mut self, rule: impl Into<String>) {
        self.0.insert(rule.into());
    }

    pub fn disable(&mut self, rule: &str) {
        self.0.remove(rule);
    }

    pub fn is_enabled(&self, rule: &str) -> bool {
        self.0.contains(rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for EnabledRules {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// One rule that took money off the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedDiscount {
    pub rule: String,
    pub amount: Amount,
}

/// Outcome of rule evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscountResult {
    /// Rules that contributed, in application order.
    pub applied: Vec<AppliedDiscount>,
    /// Total discount, within `0..=subtotal`.
    pub amount: Amount,
}

impl DiscountResult {
    pub fn none() -> Self {
        Self::default()
    }

    /// Display name of the discount; `None` when no rule applied.
    pub fn name(&self) -> Option<String> {
        if self.applied.is_empty() {
            return None;
        }
        let names: Vec<&str> = self.applied.iter().map(|a| a.rule.as_str()).collect();
        Some(names.join(" + "))
    }
}

/// Shipping and gift-wrap charges for a cart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fees {
    pub shipping: Amount,
    pub gift_wrap: Amount,
}

impl Fees {
    pub fn total(&self) -> Amount {
        self.shipping + self.gift_wrap
    }
}

/// Final computed figures for one cart state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingResult {
    pub subtotal: Amount,
    pub total_quantity: u64,
    pub shipping_fee: Amount,
    pub gift_wrap_fee: Amount,
    pub discount: DiscountResult,
    /// `subtotal - discount + shipping_fee + gift_wrap_fee`
    pub grand_total: Amount,
}

/// An input event of a cart session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    /// Replace the quantity of one product; 0 removes it.
    SetQuantity { product: String, quantity: Quantity },
    EnableRule { rule: String },
    DisableRule { rule: String },
    /// Recompute without changing the cart.
    Submit,
}
