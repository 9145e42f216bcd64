//! Error types for the production engine.
//!
//! Invertibility failures are recoverable control flow for the caller (fall
//! back to single purchases); balance and registry errors are caller
//! contract violations and are surfaced, never silently clamped.

use crate::id::{PurchaseId, ResourceId};
use crate::numeric::Decimal;
use thiserror::Error;

/// Format a dependency cycle as a readable path.
fn format_cycle_path(path: &[ResourceId]) -> String {
    if path.is_empty() {
        return String::from("(empty cycle)");
    }
    path.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors that can occur during chain evaluation, purchasing, or ticking.
///
/// # Examples
///
/// ```rust
/// use tickmill::{EngineError, ResourceId};
///
/// let err = EngineError::MissingResource(ResourceId::new("gold"));
/// assert!(err.to_string().contains("gold"));
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// A modifier chain contains a step with no analytic inverse.
    ///
    /// Raised by `ModifierChain::invert` for clamp steps and for
    /// multiplicative or exponential steps whose operand evaluates to zero.
    /// Callers recover by taking the non-bulk purchase path.
    #[error("modifier '{modifier}' is not invertible: {reason}")]
    NotInvertible { modifier: String, reason: String },

    /// Bulk-buy was requested against a cost formula with no closed form.
    ///
    /// Distinct from [`EngineError::NotInvertible`]: this configuration
    /// never supports maximization, so no amount of toggling modifiers will
    /// help. There is deliberately no iterative fallback.
    #[error("cost formula for resource '{0}' has no closed-form inverse")]
    CannotMaximize(ResourceId),

    /// `pay()` was invoked without a prior successful `is_met` check.
    ///
    /// This is a programming error on the caller's side, not a user-facing
    /// condition; the debit is refused rather than driving the balance
    /// negative.
    #[error("insufficient balance of '{resource}': cost {cost}, balance {balance}")]
    InsufficientBalance {
        resource: ResourceId,
        cost: Decimal,
        balance: Decimal,
    },

    /// The declared production-ordering constraints form a cycle.
    ///
    /// Contains the path of resources involved, e.g. `[A, B, A]` when A
    /// reads B and B reads A.
    #[error("production order cycle: {}", format_cycle_path(.0))]
    Cycle(Vec<ResourceId>),

    /// A resource was referenced that is not registered in the ledger.
    #[error("unknown resource: {0}")]
    MissingResource(ResourceId),

    /// A purchase was referenced that is not registered with the engine.
    #[error("unknown purchase: {0}")]
    MissingPurchase(PurchaseId),
}
