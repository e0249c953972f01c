//! Pricing options and their loading from the environment.

use std::num::NonZeroU64;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::Amount;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown combination policy '{0}' (expected 'cumulative' or 'best-single')")]
    UnknownPolicy(String),
    #[error("unknown discount base '{0}' (expected 'subtotal' or 'subtotal-with-fees')")]
    UnknownDiscountBase(String),
}

/// How several enabled discount rules combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombinationPolicy {
    /// Apply every enabled rule in table order to a running total.
    #[default]
    Cumulative,
    /// Apply only the enabled rule with the largest discount.
    BestSingle,
}

impl FromStr for CombinationPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cumulative" => Ok(CombinationPolicy::Cumulative),
            "best-single" | "best_single" => Ok(CombinationPolicy::BestSingle),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

/// The amount cart-total and total-quantity rules are measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscountBase {
    #[default]
    Subtotal,
    /// Subtotal plus shipping and gift wrap.
    SubtotalWithFees,
}

impl FromStr for DiscountBase {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subtotal" => Ok(DiscountBase::Subtotal),
            "subtotal-with-fees" | "subtotal_with_fees" => Ok(DiscountBase::SubtotalWithFees),
            other => Err(ConfigError::UnknownDiscountBase(other.to_string())),
        }
    }
}

const DEFAULT_PACKAGE_SIZE: NonZeroU64 = match NonZeroU64::new(10) {
    Some(size) => size,
    None => panic!("package size must be non-zero"),
};

/// Shipping and gift-wrap charges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    /// Items per shipped package.
    pub package_size: NonZeroU64,
    pub fee_per_package: Amount,
    pub gift_wrap_per_item: Amount,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            package_size: DEFAULT_PACKAGE_SIZE,
            fee_per_package: Amount::from_units(5),
            gift_wrap_per_item: Amount::from_units(1),
        }
    }
}

/// Options recognized by the pricing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PricingConfig {
    pub policy: CombinationPolicy,
    pub discount_base: DiscountBase,
    pub fees: FeeSchedule,
}

/// Process configuration of the `cart-calc` binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub pricing: PricingConfig,
    /// Catalog CSV (env: CART_CATALOG); built-in catalog when unset.
    pub catalog_path: Option<PathBuf>,
    /// Rule table CSV (env: CART_RULES); built-in rule table when unset.
    pub rules_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let set = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let policy: CombinationPolicy = set("CART_POLICY")
            .map(|value| value.parse())
            .transpose()?
            .unwrap_or_default();
        let discount_base: DiscountBase = set("CART_DISCOUNT_BASE")
            .map(|value| value.parse())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            pricing: PricingConfig {
                policy,
                discount_base,
                fees: FeeSchedule::default(),
            },
            catalog_path: set("CART_CATALOG").map(PathBuf::from),
            rules_path: set("CART_RULES").map(PathBuf::from),
        })
    }
}
