use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::config::CombinationPolicy;
use crate::engine::{EventKind, PricingEngine, PricingError, SessionError};
use crate::model::{CartEvent, EnabledRules, PricingResult, Quantities};

/// One in-memory cart with its rule switches.
///
/// Every accepted event triggers a complete recomputation; nothing is cached
/// between events.
#[derive(Debug, Clone)]
pub struct Session {
    engine: PricingEngine,
    quantities: Quantities,
    enabled: EnabledRules,
}

impl CartEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CartEvent::SetQuantity { .. } => EventKind::SetQuantity,
            CartEvent::EnableRule { .. } => EventKind::EnableRule,
            CartEvent::DisableRule { .. } => EventKind::DisableRule,
            CartEvent::Submit => EventKind::Submit,
        }
    }
}

/// Public API
impl Session {
    /// Start with an empty cart. Under the best-single policy every rule
    /// starts enabled, otherwise none.
    pub fn new(engine: PricingEngine) -> Self {
        let enabled = match engine.config().policy {
            CombinationPolicy::Cumulative => EnabledRules::none(),
            CombinationPolicy::BestSingle => EnabledRules::all(engine.rules()),
        };
        Self {
            engine,
            quantities: Quantities::new(),
            enabled,
        }
    }

    pub fn engine(&self) -> &PricingEngine {
        &self.engine
    }

    pub fn quantities(&self) -> &Quantities {
        &self.quantities
    }

    pub fn enabled(&self) -> &EnabledRules {
        &self.enabled
    }

    /// Price the current cart.
    pub fn current(&self) -> Result<PricingResult, PricingError> {
        self.engine.price(&self.quantities, &self.enabled)
    }

    /// Run the session over a stream of events, returning the result of
    /// every accepted event in order.
    pub async fn run(
        &mut self,
        mut stream: impl Stream<Item = CartEvent> + Unpin,
    ) -> Vec<PricingResult> {
        let mut results = Vec::new();
        while let Some(event) = stream.next().await {
            // a rejected event must not stop the session
            if let Ok(result) = self.apply(event) {
                results.push(result);
            }
        }
        results
    }

    /// Apply one event and recompute. A rejected event leaves the session
    /// unchanged.
    pub fn apply(&mut self, event: CartEvent) -> Result<PricingResult, SessionError> {
        let kind = event.kind();
        let result = self.apply_event(event);
        Self::log_result(kind, &result);
        result
    }
}

/// Private API
impl Session {
    fn log_result(kind: EventKind, result: &Result<PricingResult, SessionError>) {
        match result {
            Ok(priced) => {
                info!(
                    event = ?kind,
                    subtotal = %priced.subtotal,
                    discount = %priced.discount.amount,
                    grand_total = %priced.grand_total,
                    "cart event applied"
                );
            }
            Err(e) => {
                info!(event = ?kind, reason = %e, "cart event skipped");
            }
        }
    }

    fn apply_event(&mut self, event: CartEvent) -> Result<PricingResult, SessionError> {
        let kind = event.kind();
        match event {
            CartEvent::SetQuantity { product, quantity } => {
                if !self.engine.catalog().contains(&product) {
                    return Err(SessionError::UnknownProduct(kind, product));
                }
                self.quantities.set(product, quantity);
            }
            CartEvent::EnableRule { rule } => {
                self.ensure_rule(kind, &rule)?;
                self.enabled.enable(rule);
            }
            CartEvent::DisableRule { rule } => {
                self.ensure_rule(kind, &rule)?;
                self.enabled.disable(&rule);
            }
            CartEvent::Submit => {}
        }

        Ok(self.current()?)
    }

    fn ensure_rule(&self, kind: EventKind, rule: &str) -> Result<(), SessionError> {
        if self.engine.rules().contains(rule) {
            Ok(())
        } else {
            Err(SessionError::UnknownRule(kind, rule.to_string()))
        }
    }
}
