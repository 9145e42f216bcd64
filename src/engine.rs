//! The tick driver.
//!
//! [`Engine`] owns the resource ledger, the registered productions and
//! purchases, and the game context, and advances them through wall-clock
//! time. A tick runs four phases in a fixed order:
//!
//! 1. resolve the production order from declared `reads` constraints
//! 2. produce every resource (rate times elapsed seconds)
//! 3. run auto-purchase rules
//! 4. fire queued actions whose completion condition is now met
//!
//! Rates are per second and ticks are linear, so one `advance(10.0)` and
//! ten `advance(1.0)` calls credit the same amounts (purchases aside).
//! A fault in one production (a NaN rate, an unregistered resource) is
//! logged and skipped without poisoning the rest of the tick.

use crate::context::{EngineContext, EvalContext};
use crate::error::EngineError;
use crate::graph::OrderGraph;
use crate::id::{PurchaseId, ResourceId};
use crate::modifier::{Modifier, ModifierChain, Operand, RateBreakdown};
use crate::numeric::Decimal;
use crate::purchase::{Repeatable, RepeatableState, Upgrade, UpgradeState};
use crate::resource::{LedgerSnapshot, Resource, ResourceLedger};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// A per-second production formula for one resource.
///
/// The base operand runs through the modifier chain to yield the rate.
/// If the formula reads another resource's balance, that read MUST be
/// declared with [`reads`](Self::reads); the driver orders productions by
/// declared reads only and never inspects what a closure touches.
///
/// # Examples
///
/// ```rust
/// use tickmill::{Decimal, Modifier, Production, ResourceId};
///
/// let production = Production::new(ResourceId::new("gold"), Decimal::ONE)
///     .with_modifier(Modifier::multiplicative("gilded", Decimal::from(2.0)));
/// ```
pub struct Production {
    resource: ResourceId,
    base: Operand,
    chain: ModifierChain,
    reads: Vec<ResourceId>,
}

impl Production {
    pub fn new(resource: ResourceId, base: impl Into<Operand>) -> Self {
        Self {
            resource,
            base: base.into(),
            chain: ModifierChain::new(),
            reads: Vec::new(),
        }
    }

    /// Replace the modifier chain wholesale.
    pub fn with_chain(mut self, chain: ModifierChain) -> Self {
        self.chain = chain;
        self
    }

    /// Append one modifier to the chain.
    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.chain.push(modifier);
        self
    }

    /// Declare that this formula reads `source`'s balance, ordering
    /// `source`'s production before this one within a tick.
    pub fn reads(mut self, source: ResourceId) -> Self {
        self.reads.push(source);
        self
    }

    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }

    pub fn chain(&self) -> &ModifierChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut ModifierChain {
        &mut self.chain
    }

    /// Current per-second rate.
    pub fn rate(&self, view: &EvalContext) -> Decimal {
        self.chain.apply(self.base.value(view), view)
    }

    /// Current rate with per-modifier intermediate values, for UI tooltips.
    pub fn breakdown(&self, view: &EvalContext) -> RateBreakdown {
        self.chain.apply_with_breakdown(self.base.value(view), view)
    }
}

impl fmt::Debug for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Production")
            .field("resource", &self.resource)
            .field("reads", &self.reads)
            .field("modifiers", &self.chain.len())
            .finish_non_exhaustive()
    }
}

type RuleFn = Box<dyn Fn(&EvalContext) -> bool + Send + Sync>;

/// An automation rule: attempt one purchase per tick while enabled.
pub struct AutoRule {
    purchase: PurchaseId,
    enabled: Option<RuleFn>,
}

impl AutoRule {
    pub fn new(purchase: PurchaseId) -> Self {
        Self {
            purchase,
            enabled: None,
        }
    }

    /// Gate the rule on a context predicate (unlock flags, player toggles).
    pub fn enabled_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&EvalContext) -> bool + Send + Sync + 'static,
    {
        self.enabled = Some(Box::new(predicate));
        self
    }

    pub fn purchase(&self) -> &PurchaseId {
        &self.purchase
    }

    fn is_enabled(&self, view: &EvalContext) -> bool {
        match &self.enabled {
            Some(predicate) => predicate(view),
            None => true,
        }
    }
}

impl fmt::Debug for AutoRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoRule")
            .field("purchase", &self.purchase)
            .finish_non_exhaustive()
    }
}

type DoneFn = Box<dyn Fn(&EvalContext) -> bool + Send + Sync>;
type CompleteFn = Box<dyn FnMut(&mut ResourceLedger) + Send + Sync>;

/// A deferred action that fires once when its condition is met.
///
/// Checked at the end of every tick; on the tick the condition first holds,
/// the completion handler runs against the ledger and the action is
/// removed. Timed rewards and research queues are the intended use.
pub struct QueuedAction {
    name: String,
    done: DoneFn,
    on_complete: CompleteFn,
}

impl QueuedAction {
    pub fn new<D, C>(name: impl Into<String>, done: D, on_complete: C) -> Self
    where
        D: Fn(&EvalContext) -> bool + Send + Sync + 'static,
        C: FnMut(&mut ResourceLedger) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            done: Box::new(done),
            on_complete: Box::new(on_complete),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for QueuedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedAction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The tick-driven production engine.
///
/// Single writer: all mutation funnels through `&mut self` methods, so the
/// core needs no locking. Embedders drive it from their own clock; the
/// engine never sleeps or spawns.
///
/// # Examples
///
/// ```rust
/// use tickmill::{Decimal, Engine, Modifier, Production, Resource, ResourceId};
///
/// let gold = ResourceId::new("gold");
/// let mut engine = Engine::new();
/// engine.register_resource(Resource::new(gold.clone(), Decimal::ZERO));
/// engine.register_production(
///     Production::new(gold.clone(), Decimal::ONE)
///         .with_modifier(Modifier::multiplicative("gilded", Decimal::from(2.0))),
/// );
///
/// engine.advance(5.0).unwrap();
/// assert_eq!(engine.ledger().amount(&gold), Decimal::from(10.0));
/// ```
#[derive(Debug, Default)]
pub struct Engine {
    ledger: ResourceLedger,
    context: EngineContext,
    productions: Vec<Production>,
    repeatables: HashMap<PurchaseId, Repeatable>,
    upgrades: HashMap<PurchaseId, Upgrade>,
    auto_rules: Vec<AutoRule>,
    queued: Vec<QueuedAction>,
    // Cached production order (indices into `productions`), invalidated on
    // registration.
    order: Option<Vec<usize>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_resource(&mut self, resource: Resource) {
        self.ledger.register(resource);
    }

    pub fn register_production(&mut self, production: Production) {
        self.productions.push(production);
        self.order = None;
    }

    pub fn register_repeatable(&mut self, repeatable: Repeatable) {
        self.repeatables.insert(repeatable.id().clone(), repeatable);
    }

    pub fn register_upgrade(&mut self, upgrade: Upgrade) {
        self.upgrades.insert(upgrade.id().clone(), upgrade);
    }

    pub fn register_auto_rule(&mut self, rule: AutoRule) {
        self.auto_rules.push(rule);
    }

    pub fn queue_action(&mut self, action: QueuedAction) {
        self.queued.push(action);
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut ResourceLedger {
        &mut self.ledger
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut EngineContext {
        &mut self.context
    }

    pub fn repeatable(&self, id: &PurchaseId) -> Option<&Repeatable> {
        self.repeatables.get(id)
    }

    pub fn upgrade(&self, id: &PurchaseId) -> Option<&Upgrade> {
        self.upgrades.get(id)
    }

    /// Advance game time by `elapsed_seconds`.
    ///
    /// Negative elapsed time is treated as zero. Errors only on a
    /// production-order cycle, before any mutation; per-resource and
    /// per-rule faults are logged and skipped instead.
    pub fn advance(&mut self, elapsed_seconds: f64) -> Result<(), EngineError> {
        let order = self.resolve_order()?;
        let dt = Decimal::from_f64(elapsed_seconds.max(0.0));

        for idx in order {
            let production = &self.productions[idx];
            let rate = {
                let view = EvalContext::with_ledger(&self.context, &self.ledger);
                production.rate(&view)
            };
            if rate.is_nan() {
                warn!(resource = %production.resource, "production rate is NaN, skipping");
                continue;
            }
            match self.ledger.get_mut(&production.resource) {
                Ok(resource) => resource.produce(rate * dt),
                Err(_) => {
                    warn!(resource = %production.resource, "production targets unregistered resource, skipping");
                }
            }
        }

        self.run_auto_rules();
        self.run_queued_actions();
        Ok(())
    }

    /// Buy one unit of a registered purchase by id. `Ok(false)` when
    /// unaffordable or (for upgrades) already bought.
    pub fn buy(&mut self, id: &PurchaseId) -> Result<bool, EngineError> {
        if let Some(repeatable) = self.repeatables.get_mut(id) {
            repeatable.buy(&mut self.ledger, &self.context)
        } else if let Some(upgrade) = self.upgrades.get_mut(id) {
            upgrade.buy(&mut self.ledger, &self.context)
        } else {
            Err(EngineError::MissingPurchase(id.clone()))
        }
    }

    /// Buy as many units of a repeatable as the balances afford, returning
    /// the quantity bought. For an upgrade this is a single buy.
    pub fn buy_max(&mut self, id: &PurchaseId) -> Result<Decimal, EngineError> {
        if let Some(repeatable) = self.repeatables.get_mut(id) {
            repeatable.buy_max(&mut self.ledger, &self.context)
        } else if let Some(upgrade) = self.upgrades.get_mut(id) {
            let bought = upgrade.buy(&mut self.ledger, &self.context)?;
            Ok(if bought { Decimal::ONE } else { Decimal::ZERO })
        } else {
            Err(EngineError::MissingPurchase(id.clone()))
        }
    }

    /// Current per-second rate of a resource, summed over its productions.
    /// `None` when nothing produces it.
    pub fn rate_of(&self, id: &ResourceId) -> Option<Decimal> {
        let view = EvalContext::with_ledger(&self.context, &self.ledger);
        let mut total = None;
        for production in self.productions.iter().filter(|p| p.resource() == id) {
            let rate = production.rate(&view);
            total = Some(total.unwrap_or(Decimal::ZERO) + rate);
        }
        total
    }

    /// Per-modifier breakdown of the first production targeting a resource.
    pub fn breakdown_of(&self, id: &ResourceId) -> Option<RateBreakdown> {
        let view = EvalContext::with_ledger(&self.context, &self.ledger);
        self.productions
            .iter()
            .find(|p| p.resource() == id)
            .map(|p| p.breakdown(&view))
    }

    /// Capture the full persisted state: resources, purchase counts, and
    /// context. Productions, rules, and queued actions are configuration
    /// and are rebuilt by the embedder on load.
    pub fn snapshot(&self) -> EngineSnapshot {
        let mut repeatables: Vec<RepeatableState> =
            self.repeatables.values().map(|r| r.state()).collect();
        repeatables.sort_by(|a, b| a.id.cmp(&b.id));
        let mut upgrades: Vec<UpgradeState> = self.upgrades.values().map(|u| u.state()).collect();
        upgrades.sort_by(|a, b| a.id.cmp(&b.id));
        EngineSnapshot {
            resources: self.ledger.snapshot(),
            repeatables,
            upgrades,
            context: self.context.clone(),
        }
    }

    /// Restore a previously captured snapshot. State for entities no longer
    /// registered is ignored.
    pub fn restore(&mut self, snapshot: &EngineSnapshot) {
        self.ledger.restore(&snapshot.resources);
        for state in &snapshot.repeatables {
            if let Some(repeatable) = self.repeatables.get_mut(&state.id) {
                repeatable.apply_state(state);
            }
        }
        for state in &snapshot.upgrades {
            if let Some(upgrade) = self.upgrades.get_mut(&state.id) {
                upgrade.apply_state(state);
            }
        }
        self.context = snapshot.context.clone();
    }

    /// Resolve (and cache) the production order from declared reads.
    /// Productions with no constraints keep registration order after the
    /// constrained ones, so the result is deterministic either way.
    fn resolve_order(&mut self) -> Result<Vec<usize>, EngineError> {
        if let Some(order) = &self.order {
            return Ok(order.clone());
        }

        let mut graph = OrderGraph::new();
        for production in &self.productions {
            for source in &production.reads {
                graph.add_read(production.resource.clone(), source.clone());
            }
        }
        let sorted = graph.production_order()?;
        let positions: HashMap<&ResourceId, usize> = sorted
            .iter()
            .enumerate()
            .map(|(pos, id)| (id, pos))
            .collect();

        let mut order: Vec<usize> = (0..self.productions.len()).collect();
        order.sort_by_key(|&idx| {
            positions
                .get(self.productions[idx].resource())
                .copied()
                .unwrap_or(usize::MAX)
        });

        self.order = Some(order.clone());
        Ok(order)
    }

    // A failing rule (an unregistered cost resource, say) is logged and
    // skipped; automation faults never abort the remaining rules or the
    // queued-action pass.
    fn run_auto_rules(&mut self) {
        for rule in &self.auto_rules {
            let enabled = {
                let view = EvalContext::with_ledger(&self.context, &self.ledger);
                rule.is_enabled(&view)
            };
            if !enabled {
                continue;
            }
            let result = if let Some(repeatable) = self.repeatables.get_mut(&rule.purchase) {
                repeatable.buy(&mut self.ledger, &self.context)
            } else if let Some(upgrade) = self.upgrades.get_mut(&rule.purchase) {
                upgrade.buy(&mut self.ledger, &self.context)
            } else {
                warn!(purchase = %rule.purchase, "auto rule targets unregistered purchase, skipping");
                continue;
            };
            if let Err(err) = result {
                warn!(purchase = %rule.purchase, error = %err, "auto purchase failed, skipping");
            }
        }
    }

    fn run_queued_actions(&mut self) {
        let completed: Vec<usize> = {
            let view = EvalContext::with_ledger(&self.context, &self.ledger);
            self.queued
                .iter()
                .enumerate()
                .filter(|(_, action)| (action.done)(&view))
                .map(|(idx, _)| idx)
                .collect()
        };
        // Remove back to front so earlier indices stay valid.
        for idx in completed.into_iter().rev() {
            let mut action = self.queued.remove(idx);
            (action.on_complete)(&mut self.ledger);
        }
    }
}

/// Full persisted engine state for save/load and swap-state checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub resources: LedgerSnapshot,
    pub repeatables: Vec<RepeatableState>,
    pub upgrades: Vec<UpgradeState>,
    pub context: EngineContext,
}
