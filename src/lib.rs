pub mod amount;
pub mod config;
pub mod csv;
pub mod engine;
pub mod model;

pub use amount::Amount;
pub use config::{CombinationPolicy, Config, DiscountBase, PricingConfig};
pub use engine::{PricingEngine, Session};
pub use model::{CartEvent, Catalog, DiscountResult, EnabledRules, PricingResult, Quantities, RuleSet};
