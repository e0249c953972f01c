use crate::Amount;
use crate::engine::PricingError;
use crate::model::{Catalog, DiscountKind, Quantities, Quantity};

/// A cart line resolved against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Line {
    pub unit_price: Amount,
    pub quantity: Quantity,
    pub total: Amount,
}

/// Cart contents with every product priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PricedCart {
    pub lines: Vec<Line>,
    pub subtotal: Amount,
    pub total_quantity: u64,
}

impl PricedCart {
    /// Look up every product of `quantities`; unknown products are an error
    /// rather than a free item.
    pub fn resolve(catalog: &Catalog, quantities: &Quantities) -> Result<Self, PricingError> {
        let lines = quantities
            .iter()
            .map(|(product, quantity)| {
                let unit_price = catalog
                    .price(product)
                    .ok_or_else(|| PricingError::UnknownProduct(product.to_string()))?;
                let total = unit_price
                    .times(u64::from(quantity))
                    .ok_or(PricingError::Overflow("subtotal"))?;
                Ok(Line {
                    unit_price,
                    quantity,
                    total,
                })
            })
            .collect::<Result<Vec<_>, PricingError>>()?;

        let subtotal = checked_sum(lines.iter().map(|line| Some(line.total)))
            .ok_or(PricingError::Overflow("subtotal"))?;

        Ok(Self {
            lines,
            subtotal,
            total_quantity: quantities.total(),
        })
    }
}

fn checked_sum(mut amounts: impl Iterator<Item = Option<Amount>>) -> Option<Amount> {
    amounts.try_fold(Amount::ZERO, |acc, amount| acc.checked_add(amount?))
}

/// Discount a rule of the given kind grants when `running` is the current
/// net total. Not clamped.
pub(crate) fn evaluate(
    kind: &DiscountKind,
    running: Amount,
    cart: &PricedCart,
) -> Result<Amount, PricingError> {
    let discount = match *kind {
        DiscountKind::CartTotal { threshold, amount } => {
            if running > threshold {
                Some(amount)
            } else {
                Some(Amount::ZERO)
            }
        }
        DiscountKind::ProductQuantity {
            threshold,
            percentage,
        } => checked_sum(
            cart.lines
                .iter()
                .filter(|line| line.quantity > threshold)
                .map(|line| line.total.percent(percentage)),
        ),
        DiscountKind::TotalQuantity {
            threshold,
            percentage,
        } => {
            if cart.total_quantity > threshold {
                running.percent(percentage)
            } else {
                Some(Amount::ZERO)
            }
        }
        DiscountKind::TieredQuantity {
            total_threshold,
            product_threshold,
            percentage,
        } => {
            if cart.total_quantity <= total_threshold {
                return Ok(Amount::ZERO);
            }
            checked_sum(
                cart.lines
                    .iter()
                    .filter(|line| line.quantity > product_threshold)
                    .map(|line| {
                        let above = u64::from(line.quantity - product_threshold);
                        line.unit_price.times(above)?.percent(percentage)
                    }),
            )
        }
    };

    discount.ok_or(PricingError::Overflow("discount"))
}
