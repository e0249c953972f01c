//! Error types for pricing and cart sessions.

use thiserror::Error;

/// Error returned by the [`PricingEngine`](super::PricingEngine) computations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("product '{0}' is not in the catalog")]
    UnknownProduct(String),

    #[error("discount rule '{0}' is not in the rule table")]
    UnknownRule(String),

    #[error("amount overflow while computing {0}")]
    Overflow(&'static str),
}

/// The kind of cart event being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SetQuantity,
    EnableRule,
    DisableRule,
    Submit,
}

/// Error returned by [`Session::apply`](super::Session::apply).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("{0:?}: product '{1}' is not in the catalog")]
    UnknownProduct(EventKind, String),

    #[error("{0:?}: discount rule '{1}' is not in the rule table")]
    UnknownRule(EventKind, String),

    #[error("pricing failed: {0}")]
    Pricing(#[from] PricingError),
}
