//! Purchasable entities: repeatables and one-shot upgrades.
//!
//! A [`Repeatable`] is a buy-many entity (a generator, a stacking upgrade)
//! whose owned count feeds back into its own cost curves. An [`Upgrade`] is
//! bought at most once and buying it again is a harmless no-op.
//!
//! Buying is a two-step contract shared by every path: gate with the
//! requirement layer, then debit. Bulk buys debit the cumulative cost in
//! one movement, never a per-unit loop.

use crate::context::{EngineContext, EvalContext};
use crate::cost::{all_met, CostRequirement};
use crate::error::EngineError;
use crate::id::{PurchaseId, ResourceId};
use crate::modifier::Operand;
use crate::numeric::Decimal;
use crate::resource::ResourceLedger;
use serde::{Deserialize, Serialize};
use std::fmt;

type EffectFn = Box<dyn Fn(Decimal) -> Decimal + Send + Sync>;

/// Balances of every spending requirement's resource, captured before a
/// multi-requirement debit so a failed later step can roll back.
fn saved_balances(
    requirements: &[CostRequirement],
    ledger: &ResourceLedger,
) -> Vec<(ResourceId, Decimal)> {
    requirements
        .iter()
        .filter(|r| r.spends())
        .map(|r| (r.resource().clone(), ledger.amount(r.resource())))
        .collect()
}

fn restore_balances(ledger: &mut ResourceLedger, saved: &[(ResourceId, Decimal)]) {
    for (id, amount) in saved {
        if let Ok(resource) = ledger.get_mut(id) {
            resource.reset_to(*amount);
        }
    }
}

/// A purchasable entity that can be bought repeatedly.
///
/// The owned amount is the input to its cost curves, so each purchase
/// raises the price of the next. An optional effect function maps the
/// effective amount to a contribution (typically fed into a production
/// chain as a dynamic operand), and an optional bonus operand grants
/// context-dependent free copies.
///
/// # Examples
///
/// ```rust
/// use tickmill::{CostCurve, CostRequirement, Decimal, EngineContext,
///                PurchaseId, Repeatable, Resource, ResourceId, ResourceLedger};
///
/// let gold = ResourceId::new("gold");
/// let mut ledger = ResourceLedger::new();
/// ledger.register(Resource::new(gold.clone(), Decimal::from(100.0)));
///
/// let mut miner = Repeatable::new(PurchaseId::new("miner")).with_requirement(
///     CostRequirement::new(
///         gold.clone(),
///         CostCurve::Geometric { base: Decimal::ONE, growth: Decimal::from(2.0) },
///     ),
/// );
///
/// let context = EngineContext::new();
/// let bought = miner.buy_max(&mut ledger, &context).unwrap();
/// assert_eq!(bought, Decimal::from(6.0));
/// assert_eq!(miner.amount(), Decimal::from(6.0));
/// assert_eq!(ledger.amount(&gold), Decimal::from(37.0));
/// ```
pub struct Repeatable {
    id: PurchaseId,
    amount: Decimal,
    requirements: Vec<CostRequirement>,
    effect: Option<EffectFn>,
    bonus_amount: Option<Operand>,
}

impl Repeatable {
    pub fn new(id: PurchaseId) -> Self {
        Self {
            id,
            amount: Decimal::ZERO,
            requirements: Vec::new(),
            effect: None,
            bonus_amount: None,
        }
    }

    /// Add a cost requirement. All requirements must be met to buy.
    pub fn with_requirement(mut self, requirement: CostRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Set the effect function mapping effective amount to a contribution
    /// value.
    pub fn with_effect<F>(mut self, effect: F) -> Self
    where
        F: Fn(Decimal) -> Decimal + Send + Sync + 'static,
    {
        self.effect = Some(Box::new(effect));
        self
    }

    /// Grant bonus copies on top of the bought amount. The operand is
    /// re-evaluated every read, so context-driven bonuses track their
    /// source.
    pub fn with_bonus_amount(mut self, bonus: impl Into<Operand>) -> Self {
        self.bonus_amount = Some(bonus.into());
        self
    }

    pub fn id(&self) -> &PurchaseId {
        &self.id
    }

    /// Bought count, excluding bonuses.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn requirements(&self) -> &[CostRequirement] {
        &self.requirements
    }

    /// Bought count plus any bonus copies. Cost curves always use the
    /// bought count alone; bonuses are free and do not raise prices.
    pub fn effective_amount(&self, view: &EvalContext) -> Decimal {
        match &self.bonus_amount {
            Some(bonus) => self.amount + bonus.value(view),
            None => self.amount,
        }
    }

    /// The effect contribution at the current effective amount. Identity
    /// when no effect function is configured.
    pub fn effect_value(&self, view: &EvalContext) -> Decimal {
        let n = self.effective_amount(view);
        match &self.effect {
            Some(f) => f(n),
            None => n,
        }
    }

    /// Whether all requirements are met for the next unit.
    pub fn can_buy(&self, view: &EvalContext) -> bool {
        all_met(&self.requirements, self.amount, view)
    }

    /// Attempt to buy one unit. Returns `Ok(false)` when the requirements
    /// are jointly unaffordable; debits every spending requirement and
    /// increments the owned count on success. A failure mid-debit (an
    /// unregistered resource, say) rolls the touched balances back before
    /// surfacing the error, so a failed buy never half-pays.
    pub fn buy(
        &mut self,
        ledger: &mut ResourceLedger,
        context: &EngineContext,
    ) -> Result<bool, EngineError> {
        let affordable = {
            let view = EvalContext::with_ledger(context, ledger);
            self.can_buy(&view)
        };
        if !affordable {
            return Ok(false);
        }
        let saved = saved_balances(&self.requirements, ledger);
        for requirement in &self.requirements {
            if let Err(err) = requirement.pay(self.amount, ledger) {
                restore_balances(ledger, &saved);
                return Err(err);
            }
        }
        self.amount = self.amount + Decimal::ONE;
        Ok(true)
    }

    /// Buy as many units as the current balances afford, debiting the
    /// cumulative cost of each requirement in one movement.
    ///
    /// The quantity is the minimum of each requirement's closed-form
    /// maximum. Errors with [`EngineError::CannotMaximize`] if any
    /// requirement's curve lacks a closed form; callers fall back to
    /// single [`buy`](Self::buy) calls. If several spending requirements
    /// share one resource, the per-requirement minimum can still jointly
    /// overdraw; the debits are then rolled back and the
    /// [`EngineError::InsufficientBalance`] surfaced with balances intact.
    pub fn buy_max(
        &mut self,
        ledger: &mut ResourceLedger,
        context: &EngineContext,
    ) -> Result<Decimal, EngineError> {
        let count = {
            let view = EvalContext::with_ledger(context, ledger);
            let mut count = Decimal::INFINITY;
            for requirement in &self.requirements {
                count = count.min(requirement.max_affordable(self.amount, &view)?);
            }
            count
        };
        if count <= Decimal::ZERO || !count.is_finite() {
            // An all-free repeatable reports infinite affordability; there
            // is no meaningful bulk quantity to settle on.
            return Ok(Decimal::ZERO);
        }
        let saved = saved_balances(&self.requirements, ledger);
        for requirement in &self.requirements {
            if let Err(err) = requirement.pay_bulk(self.amount, count, ledger) {
                restore_balances(ledger, &saved);
                return Err(err);
            }
        }
        self.amount = self.amount + count;
        Ok(count)
    }

    /// Return the owned count to zero without refunding. The respec path
    /// for prestige mechanics; costs are sunk.
    pub fn respec(&mut self) {
        self.amount = Decimal::ZERO;
    }

    /// Persisted state for save/load.
    pub fn state(&self) -> RepeatableState {
        RepeatableState {
            id: self.id.clone(),
            amount: self.amount,
        }
    }

    /// Restore persisted state.
    pub fn apply_state(&mut self, state: &RepeatableState) {
        self.amount = state.amount;
    }
}

impl fmt::Debug for Repeatable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repeatable")
            .field("id", &self.id)
            .field("amount", &self.amount)
            .field("requirements", &self.requirements)
            .finish_non_exhaustive()
    }
}

/// Persisted values of one repeatable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepeatableState {
    pub id: PurchaseId,
    pub amount: Decimal,
}

/// A purchasable entity that can be bought at most once.
///
/// Buying an already-bought upgrade is a no-op returning `Ok(false)`, so
/// auto-buy rules can poll it every tick without guards.
#[derive(Debug)]
pub struct Upgrade {
    id: PurchaseId,
    bought: bool,
    requirements: Vec<CostRequirement>,
}

impl Upgrade {
    pub fn new(id: PurchaseId) -> Self {
        Self {
            id,
            bought: false,
            requirements: Vec::new(),
        }
    }

    pub fn with_requirement(mut self, requirement: CostRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn id(&self) -> &PurchaseId {
        &self.id
    }

    pub fn is_bought(&self) -> bool {
        self.bought
    }

    /// Whether the upgrade is unbought and all requirements are met.
    pub fn can_buy(&self, view: &EvalContext) -> bool {
        !self.bought && all_met(&self.requirements, Decimal::ZERO, view)
    }

    /// Attempt to buy. Idempotent: an already-bought upgrade returns
    /// `Ok(false)` without touching balances.
    pub fn buy(
        &mut self,
        ledger: &mut ResourceLedger,
        context: &EngineContext,
    ) -> Result<bool, EngineError> {
        if self.bought {
            return Ok(false);
        }
        let affordable = {
            let view = EvalContext::with_ledger(context, ledger);
            all_met(&self.requirements, Decimal::ZERO, &view)
        };
        if !affordable {
            return Ok(false);
        }
        let saved = saved_balances(&self.requirements, ledger);
        for requirement in &self.requirements {
            if let Err(err) = requirement.pay(Decimal::ZERO, ledger) {
                restore_balances(ledger, &saved);
                return Err(err);
            }
        }
        self.bought = true;
        Ok(true)
    }

    /// Persisted state for save/load.
    pub fn state(&self) -> UpgradeState {
        UpgradeState {
            id: self.id.clone(),
            bought: self.bought,
        }
    }

    /// Restore persisted state.
    pub fn apply_state(&mut self, state: &UpgradeState) {
        self.bought = state.bought;
    }
}

/// Persisted values of one upgrade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpgradeState {
    pub id: PurchaseId,
    pub bought: bool,
}
