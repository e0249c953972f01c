//! Cart pricing engine.
//!
//! The engine turns a cart (quantities per product) and a set of enabled
//! discount rules into subtotal, shipping and gift-wrap fees, discount and
//! grand total. Every computation is a fresh pure evaluation of its inputs.
//! A [`Session`] keeps one cart and recomputes after each cart event, also
//! from an async stream of events.

use tracing::debug;

use crate::Amount;
use crate::config::{CombinationPolicy, DiscountBase, PricingConfig};
use crate::model::{
    AppliedDiscount, Catalog, DiscountResult, EnabledRules, Fees, PricingResult, Quantities,
    RuleSet,
};

mod rules;
use rules::PricedCart;

mod session;
pub use session::Session;

mod error;
pub use error::{EventKind, PricingError, SessionError};

/// The pricing engine.
///
/// Owns the catalog, the rule table and the pricing options; holds no cart
/// state.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    catalog: Catalog,
    rules: RuleSet,
    config: PricingConfig,
}

/// Public API
impl PricingEngine {
    pub fn new(catalog: Catalog, rules: RuleSet, config: PricingConfig) -> Self {
        Self {
            catalog,
            rules,
            config,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Sum of unit price times quantity over the cart.
    pub fn subtotal(&self, quantities: &Quantities) -> Result<Amount, PricingError> {
        Ok(PricedCart::resolve(&self.catalog, quantities)?.subtotal)
    }

    /// Shipping and gift-wrap fees:
    /// - one package per started `package_size` items, each `fee_per_package`
    /// - `gift_wrap_per_item` for every item
    pub fn compute_fees(&self, quantities: &Quantities) -> Result<Fees, PricingError> {
        self.fees_for(quantities.total())
    }

    /// Discount granted by the enabled rules for a cart whose subtotal is
    /// `subtotal`.
    ///
    /// `subtotal` must be [`PricingEngine::subtotal`] of the same
    /// `quantities`; the discount is clamped to it.
    pub fn compute_discount(
        &self,
        subtotal: Amount,
        quantities: &Quantities,
        enabled: &EnabledRules,
    ) -> Result<DiscountResult, PricingError> {
        let cart = PricedCart::resolve(&self.catalog, quantities)?;
        debug_assert_eq!(subtotal, cart.subtotal, "subtotal does not match the cart");
        let fees = self.fees_for(cart.total_quantity)?;
        self.discount_for(subtotal, fees, &cart, enabled)
    }

    /// Price a cart.
    pub fn price(
        &self,
        quantities: &Quantities,
        enabled: &EnabledRules,
    ) -> Result<PricingResult, PricingError> {
        let cart = PricedCart::resolve(&self.catalog, quantities)?;
        let subtotal = cart.subtotal;
        let fees = self.fees_for(cart.total_quantity)?;
        let discount = self.discount_for(subtotal, fees, &cart, enabled)?;
        // discount <= subtotal, so only the fees can push this past the range
        let grand_total = (subtotal - discount.amount)
            .checked_add(fees.total())
            .ok_or(PricingError::Overflow("grand total"))?;

        Ok(PricingResult {
            subtotal,
            total_quantity: cart.total_quantity,
            shipping_fee: fees.shipping,
            gift_wrap_fee: fees.gift_wrap,
            discount,
            grand_total,
        })
    }
}

/// Private API
impl PricingEngine {
    fn fees_for(&self, total_quantity: u64) -> Result<Fees, PricingError> {
        let schedule = &self.config.fees;
        let overflow = || PricingError::Overflow("fees");
        // an empty cart ships zero packages
        let packages = total_quantity.div_ceil(schedule.package_size.get());
        let fees = Fees {
            shipping: schedule.fee_per_package.times(packages).ok_or_else(overflow)?,
            gift_wrap: schedule
                .gift_wrap_per_item
                .times(total_quantity)
                .ok_or_else(overflow)?,
        };
        // keeps `Fees::total` in range
        fees.shipping.checked_add(fees.gift_wrap).ok_or_else(overflow)?;
        Ok(fees)
    }

    fn discount_for(
        &self,
        subtotal: Amount,
        fees: Fees,
        cart: &PricedCart,
        enabled: &EnabledRules,
    ) -> Result<DiscountResult, PricingError> {
        if let Some(unknown) = enabled.iter().find(|name| !self.rules.contains(name)) {
            return Err(PricingError::UnknownRule(unknown.to_string()));
        }

        let base = match self.config.discount_base {
            DiscountBase::Subtotal => subtotal,
            DiscountBase::SubtotalWithFees => subtotal
                .checked_add(fees.total())
                .ok_or(PricingError::Overflow("discount base"))?,
        };

        let mut result = match self.config.policy {
            CombinationPolicy::Cumulative => self.cumulative(base, cart, enabled)?,
            CombinationPolicy::BestSingle => self.best_single(base, cart, enabled)?,
        };

        // never negative, never more than the goods are worth
        result.amount = result.amount.clamp(Amount::ZERO, subtotal);
        Ok(result)
    }

    /// Apply every enabled rule, in table order, to a running net total.
    fn cumulative(
        &self,
        base: Amount,
        cart: &PricedCart,
        enabled: &EnabledRules,
    ) -> Result<DiscountResult, PricingError> {
        let mut running = base;
        let mut applied = Vec::new();

        for rule in self.rules.iter().filter(|r| enabled.is_enabled(&r.name)) {
            let step = rules::evaluate(&rule.kind, running, cart)?
                .clamp(Amount::ZERO, running.max(Amount::ZERO));
            debug!(rule = %rule.name, running = %running, discount = %step, "rule evaluated");

            if step.is_positive() {
                running -= step;
                applied.push(AppliedDiscount {
                    rule: rule.name.clone(),
                    amount: step,
                });
            }
        }

        Ok(DiscountResult {
            applied,
            amount: base - running,
        })
    }

    /// Apply only the enabled rule with the largest discount; ties keep the
    /// earlier rule.
    fn best_single(
        &self,
        base: Amount,
        cart: &PricedCart,
        enabled: &EnabledRules,
    ) -> Result<DiscountResult, PricingError> {
        let mut best: Option<AppliedDiscount> = None;

        for rule in self.rules.iter().filter(|r| enabled.is_enabled(&r.name)) {
            let amount = rules::evaluate(&rule.kind, base, cart)?
                .clamp(Amount::ZERO, base.max(Amount::ZERO));
            debug!(rule = %rule.name, base = %base, discount = %amount, "rule evaluated");

            let better = best.as_ref().is_none_or(|current| amount > current.amount);
            if amount.is_positive() && better {
                best = Some(AppliedDiscount {
                    rule: rule.name.clone(),
                    amount,
                });
            }
        }

        Ok(match best {
            Some(applied) => DiscountResult {
                amount: applied.amount,
                applied: vec![applied],
            },
            None => DiscountResult::none(),
        })
    }
}

impl Default for PricingEngine {
    /// Built-in catalog and rule table with default options.
    fn default() -> Self {
        Self::new(
            Catalog::default(),
            RuleSet::default(),
            PricingConfig::default(),
        )
    }
}
