//! Resources and the resource ledger.
//!
//! A [`Resource`] is a named, persisted quantity (an in-game currency) plus
//! derived read-only views: the best value ever seen and the cumulative
//! total ever produced. Resources are created once per currency and live
//! for the session; only their persisted values travel through save/load.

use crate::error::EngineError;
use crate::id::ResourceId;
use crate::numeric::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named, persisted quantity.
///
/// Mutated by the tick driver (continuous production), purchase actions
/// (debits) and reset/prestige actions. By default the amount is floored at
/// zero; resources that explicitly permit negative balances opt in with
/// [`allow_negative`](Self::allow_negative).
///
/// # Examples
///
/// ```rust
/// use tickmill::{Decimal, Resource, ResourceId};
///
/// let mut gold = Resource::new(ResourceId::new("gold"), Decimal::ZERO);
/// gold.produce(Decimal::from(10.0));
/// gold.withdraw(Decimal::from(4.0));
///
/// assert_eq!(gold.amount(), Decimal::from(6.0));
/// assert_eq!(gold.best(), Decimal::from(10.0));
/// assert_eq!(gold.total(), Decimal::from(10.0));
/// ```
#[derive(Debug)]
pub struct Resource {
    id: ResourceId,
    display_name: Option<String>,
    amount: Decimal,
    best: Decimal,
    total: Decimal,
    allow_negative: bool,
}

impl Resource {
    /// Create a resource with an initial amount.
    pub fn new(id: ResourceId, initial: Decimal) -> Self {
        Self {
            id,
            display_name: None,
            amount: initial,
            best: initial,
            total: Decimal::ZERO,
            allow_negative: false,
        }
    }

    /// Set the display name shown in UI. Without one, the id doubles as
    /// the name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Permit this resource's balance to go negative. Without this, all
    /// mutation paths clamp at zero.
    pub fn allow_negative(mut self) -> Self {
        self.allow_negative = true;
        self
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Human-readable name for UI display. Configuration, not persisted
    /// state.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.id.as_str())
    }

    /// Current balance.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Highest balance ever seen, across resets.
    pub fn best(&self) -> Decimal {
        self.best
    }

    /// Cumulative amount ever produced (production credits only, not
    /// deposits or refunds).
    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn permits_negative(&self) -> bool {
        self.allow_negative
    }

    /// Credit one tick's production. Negative production cannot drive the
    /// balance below the floor unless the resource permits negative
    /// balances. Positive production accrues into `total`.
    pub fn produce(&mut self, delta: Decimal) {
        if delta.is_nan() {
            return;
        }
        if delta > Decimal::ZERO {
            self.total = self.total + delta;
        }
        self.amount = self.amount + delta;
        if !self.allow_negative {
            self.amount = self.amount.max(Decimal::ZERO);
        }
        self.best = self.best.max(self.amount);
    }

    /// Credit a one-off amount (refunds, rewards). Does not count toward
    /// `total`.
    pub fn deposit(&mut self, delta: Decimal) {
        if delta.is_nan() {
            return;
        }
        self.amount = self.amount + delta;
        self.best = self.best.max(self.amount);
    }

    /// Debit a purchase cost. Callers verify affordability first via the
    /// requirement layer; this is the raw movement. An over-withdrawal
    /// drives the balance negative rather than clamping, so a missing
    /// `is_met` check stays visible instead of corrupting totals silently.
    pub fn withdraw(&mut self, cost: Decimal) {
        if cost.is_nan() {
            return;
        }
        self.amount = self.amount - cost;
    }

    /// Reset the balance to a fixed value (prestige zero or rescale).
    /// `best` and `total` survive resets.
    pub fn reset_to(&mut self, value: Decimal) {
        self.amount = value;
        self.best = self.best.max(self.amount);
    }

    /// Persisted state for save/load.
    pub fn state(&self) -> ResourceState {
        ResourceState {
            id: self.id.clone(),
            amount: self.amount,
            best: self.best,
            total: self.total,
        }
    }

    /// Restore persisted state.
    pub fn apply_state(&mut self, state: &ResourceState) {
        self.amount = state.amount;
        self.best = state.best;
        self.total = state.total;
    }
}

/// Persisted values of one resource, keyed by its stable identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceState {
    pub id: ResourceId,
    pub amount: Decimal,
    pub best: Decimal,
    pub total: Decimal,
}

/// Registry of all resources, keyed by [`ResourceId`].
///
/// Owned by the engine; there is a single writer (the tick loop), so no
/// locking exists anywhere in the core.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    resources: HashMap<ResourceId, Resource>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource. Replaces any previous resource with the same
    /// id.
    pub fn register(&mut self, resource: Resource) {
        self.resources.insert(resource.id().clone(), resource);
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Mutable access, with a [`EngineError::MissingResource`] error for
    /// unknown ids.
    pub fn get_mut(&mut self, id: &ResourceId) -> Result<&mut Resource, EngineError> {
        self.resources
            .get_mut(id)
            .ok_or_else(|| EngineError::MissingResource(id.clone()))
    }

    /// Current balance of a resource, zero for unknown ids. The zero
    /// default keeps formula evaluation total.
    pub fn amount(&self, id: &ResourceId) -> Decimal {
        self.resources
            .get(id)
            .map(|r| r.amount())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// Capture the persisted state of every resource.
    ///
    /// Together with [`restore`](Self::restore) this is the explicit
    /// checkpoint operation used by swap-state mechanics: take a snapshot,
    /// run the alternate state, restore.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut resources: Vec<ResourceState> = self.resources.values().map(|r| r.state()).collect();
        resources.sort_by(|a, b| a.id.cmp(&b.id));
        LedgerSnapshot { resources }
    }

    /// Restore a previously captured snapshot. Resources present in the
    /// snapshot but not registered are ignored.
    pub fn restore(&mut self, snapshot: &LedgerSnapshot) {
        for state in &snapshot.resources {
            if let Some(resource) = self.resources.get_mut(&state.id) {
                resource.apply_state(state);
            }
        }
    }
}

/// Serializable snapshot of all resource balances, sorted by id for
/// deterministic output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerSnapshot {
    pub resources: Vec<ResourceState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_produce_tracks_best_and_total() {
        let mut r = Resource::new(ResourceId::new("gold"), Decimal::ZERO);
        r.produce(Decimal::from(10.0));
        r.withdraw(Decimal::from(7.0));
        r.produce(Decimal::from(2.0));

        assert_eq!(r.amount(), Decimal::from(5.0));
        assert_eq!(r.best(), Decimal::from(10.0));
        assert_eq!(r.total(), Decimal::from(12.0));
    }

    #[test]
    fn test_negative_production_floors_at_zero() {
        let mut r = Resource::new(ResourceId::new("heat"), Decimal::from(3.0));
        r.produce(Decimal::from(-10.0));
        assert_eq!(r.amount(), Decimal::ZERO);
    }

    #[test]
    fn test_allow_negative_resource() {
        let mut r = Resource::new(ResourceId::new("karma"), Decimal::ZERO).allow_negative();
        r.produce(Decimal::from(-4.0));
        assert_eq!(r.amount(), Decimal::from(-4.0));
    }

    #[test]
    fn test_nan_delta_is_ignored() {
        let mut r = Resource::new(ResourceId::new("gold"), Decimal::from(5.0));
        r.produce(Decimal::NAN);
        r.withdraw(Decimal::NAN);
        assert_eq!(r.amount(), Decimal::from(5.0));
    }

    #[test]
    fn test_reset_keeps_best_and_total() {
        let mut r = Resource::new(ResourceId::new("gold"), Decimal::ZERO);
        r.produce(Decimal::from(100.0));
        r.reset_to(Decimal::ZERO);

        assert_eq!(r.amount(), Decimal::ZERO);
        assert_eq!(r.best(), Decimal::from(100.0));
        assert_eq!(r.total(), Decimal::from(100.0));
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let plain = Resource::new(ResourceId::new("gold"), Decimal::ZERO);
        assert_eq!(plain.display_name(), "gold");

        let named = Resource::new(ResourceId::new("gold"), Decimal::ZERO)
            .with_display_name("Gold Coins");
        assert_eq!(named.display_name(), "Gold Coins");
    }

    #[test]
    fn test_ledger_missing_resource() {
        let mut ledger = ResourceLedger::new();
        let unknown = ResourceId::new("void");
        assert_eq!(ledger.amount(&unknown), Decimal::ZERO);
        assert!(matches!(
            ledger.get_mut(&unknown),
            Err(EngineError::MissingResource(_))
        ));
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut ledger = ResourceLedger::new();
        ledger.register(Resource::new(ResourceId::new("gold"), Decimal::from(50.0)));
        ledger.register(Resource::new(ResourceId::new("mana"), Decimal::from(7.0)));

        let snapshot = ledger.snapshot();

        ledger
            .get_mut(&ResourceId::new("gold"))
            .unwrap()
            .produce(Decimal::from(1000.0));
        ledger.restore(&snapshot);

        assert_eq!(ledger.amount(&ResourceId::new("gold")), Decimal::from(50.0));
        assert_eq!(ledger.amount(&ResourceId::new("mana")), Decimal::from(7.0));
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let mut ledger = ResourceLedger::new();
        ledger.register(Resource::new(ResourceId::new("gold"), Decimal::from(123.456)));

        let snapshot = ledger.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: LedgerSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, back);
    }
}
