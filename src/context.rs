//! Context for conditional modifiers and operands.
//!
//! [`EngineContext`] carries game state the core does not interpret
//! (prestige flags, challenge toggles, settings); modifier `enabled`
//! predicates and dynamic operands read it at evaluation time.
//! [`EvalContext`] is the borrow-view handed into an evaluation, combining
//! the context with read-only resource balances.

use crate::id::ResourceId;
use crate::numeric::Decimal;
use crate::resource::ResourceLedger;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key/value game state for conditional calculations.
///
/// The core passes this through without interpreting it. Values are JSON,
/// so anything serializable can be stored.
///
/// # Examples
///
/// ```rust
/// use tickmill::EngineContext;
///
/// let mut context = EngineContext::new();
/// context.set("prestige_level", 3);
/// context.set("challenge_active", true);
///
/// let level: Option<i32> = context.get("prestige_level");
/// assert_eq!(level, Some(3));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineContext {
    data: HashMap<String, serde_json::Value>,
}

impl EngineContext {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a context value. The value must be serializable; if
    /// serialization fails, the value is silently not added.
    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.data.insert(key.into(), json_value);
        }
    }

    /// Get a context value, or `None` if the key is absent or the value
    /// cannot be deserialized to the requested type.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Check if a key exists in the context.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

/// Read-only view passed into modifier and operand evaluation.
///
/// Exposes the engine context plus current resource balances, so production
/// formulas that read another resource's amount do so through an explicit,
/// visible channel rather than incidental traversal.
///
/// # Examples
///
/// ```rust
/// use tickmill::{Decimal, EngineContext, EvalContext, Resource, ResourceId, ResourceLedger};
///
/// let context = EngineContext::new();
/// let mut ledger = ResourceLedger::new();
/// ledger.register(Resource::new(ResourceId::new("gold"), Decimal::from(25.0)));
///
/// let view = EvalContext::with_ledger(&context, &ledger);
/// assert_eq!(view.amount(&ResourceId::new("gold")), Decimal::from(25.0));
/// assert_eq!(view.amount(&ResourceId::new("unknown")), Decimal::ZERO);
/// ```
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    context: &'a EngineContext,
    resources: Option<&'a ResourceLedger>,
}

impl<'a> EvalContext<'a> {
    /// Create a view over a context alone (no resource balances). Unknown
    /// resources read as zero.
    pub fn new(context: &'a EngineContext) -> Self {
        Self {
            context,
            resources: None,
        }
    }

    /// Create a view over a context and a resource ledger.
    pub fn with_ledger(context: &'a EngineContext, resources: &'a ResourceLedger) -> Self {
        Self {
            context,
            resources: Some(resources),
        }
    }

    /// Get a context value.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.context.get(key)
    }

    /// Read a boolean context flag, defaulting to false. Convenience for
    /// `enabled` predicates.
    pub fn flag(&self, key: &str) -> bool {
        self.context.get::<bool>(key).unwrap_or(false)
    }

    /// Current balance of a resource. Zero if the resource is unknown or
    /// the view carries no ledger.
    pub fn amount(&self, id: &ResourceId) -> Decimal {
        self.resources
            .map(|ledger| ledger.amount(id))
            .unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_set_get() {
        let mut ctx = EngineContext::new();
        ctx.set("prestige_level", 5);

        let level: Option<i32> = ctx.get("prestige_level");
        assert_eq!(level, Some(5));
    }

    #[test]
    fn test_context_missing_key() {
        let ctx = EngineContext::new();
        let value: Option<i32> = ctx.get("missing");
        assert_eq!(value, None);
        assert!(!ctx.contains_key("missing"));
    }

    #[test]
    fn test_view_flag_defaults_false() {
        let mut ctx = EngineContext::new();
        ctx.set("challenge_active", true);

        let view = EvalContext::new(&ctx);
        assert!(view.flag("challenge_active"));
        assert!(!view.flag("missing"));
    }

    #[test]
    fn test_view_without_ledger_reads_zero() {
        let ctx = EngineContext::new();
        let view = EvalContext::new(&ctx);
        assert_eq!(view.amount(&ResourceId::new("gold")), Decimal::ZERO);
    }
}
