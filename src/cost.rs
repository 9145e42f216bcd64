//! Cost curves and purchase requirements.
//!
//! A [`CostCurve`] maps "amount already owned" to the price of the next
//! unit. The closed-form variants also expose the cumulative cost of buying
//! a run of units and can solve for the maximum affordable bulk quantity
//! analytically. Bulk affordability always works on the cumulative curve,
//! never unit-by-unit: the classic off-by-a-lot bug is computing
//! affordability per unit when the real spend is a running geometric sum.
//!
//! A [`CostRequirement`] binds a curve to a resource balance and gates a
//! purchase on it.

use crate::context::EvalContext;
use crate::error::EngineError;
use crate::id::ResourceId;
use crate::numeric::Decimal;
use crate::resource::ResourceLedger;
use std::collections::HashMap;
use std::fmt;

/// Steps of boundary correction after a closed-form solve. The analytic
/// answer can land one unit off from accumulated float error in the log or
/// sqrt; this is a fixed-width correction, not an iterative search.
const BOUNDARY_STEPS: u32 = 4;

/// Cost formula in terms of the amount already owned.
///
/// The first three variants are closed-form: their cumulative cost and its
/// inverse have analytic solutions, so bulk-buy works at any scale.
/// `Custom` accepts an arbitrary function and consequently answers
/// [`can_maximize`](Self::can_maximize) with false.
///
/// # Examples
///
/// ```rust
/// use tickmill::{CostCurve, Decimal};
///
/// // cost(n) = 2^n
/// let curve = CostCurve::Geometric {
///     base: Decimal::ONE,
///     growth: Decimal::from(2.0),
/// };
/// assert_eq!(curve.cost(Decimal::from(3.0)), Decimal::from(8.0));
///
/// // Buying 6 starting from 0 owned: 1+2+4+8+16+32 = 63.
/// let total = curve.cumulative(Decimal::ZERO, Decimal::from(6.0));
/// assert!(total.approx_eq(Decimal::from(63.0), 1e-9));
/// ```
pub enum CostCurve {
    /// Flat cost per unit.
    Constant(Decimal),
    /// `cost(n) = base + slope * n`. Requires a non-negative slope for the
    /// closed form.
    Linear { base: Decimal, slope: Decimal },
    /// `cost(n) = base * growth^n`. Requires positive growth for the
    /// closed form.
    Geometric { base: Decimal, growth: Decimal },
    /// Arbitrary cost function. Supports gating and single purchases but
    /// not bulk maximization.
    Custom(Box<dyn Fn(Decimal) -> Decimal + Send + Sync>),
}

impl CostCurve {
    /// Build a custom curve from a closure.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Decimal) -> Decimal + Send + Sync + 'static,
    {
        CostCurve::Custom(Box::new(f))
    }

    /// Price of the next unit given `owned` already held.
    pub fn cost(&self, owned: Decimal) -> Decimal {
        match self {
            CostCurve::Constant(c) => *c,
            CostCurve::Linear { base, slope } => *base + *slope * owned,
            CostCurve::Geometric { base, growth } => *base * growth.pow(owned),
            CostCurve::Custom(f) => f(owned),
        }
    }

    /// Total cost of buying `count` more units starting from `owned`.
    ///
    /// Closed form for the analytic variants. For `Custom` the terms are
    /// summed directly, which is only suitable for the small counts single
    /// and scripted purchases use.
    pub fn cumulative(&self, owned: Decimal, count: Decimal) -> Decimal {
        if count <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        match self {
            CostCurve::Constant(c) => *c * count,
            CostCurve::Linear { base, slope } => {
                // sum_{i=0}^{k-1} (base + slope*(owned+i))
                //   = k*(base + slope*owned) + slope*k*(k-1)/2
                let k = count;
                k * (*base + *slope * owned)
                    + *slope * k * (k - Decimal::ONE) / Decimal::from(2.0)
            }
            CostCurve::Geometric { base, growth } => {
                if *growth == Decimal::ONE {
                    return *base * count;
                }
                // base * growth^owned * (growth^count - 1) / (growth - 1)
                let first = *base * growth.pow(owned);
                first * (growth.pow(count) - Decimal::ONE) / (*growth - Decimal::ONE)
            }
            CostCurve::Custom(f) => {
                let n = count.floor().to_f64();
                let mut total = Decimal::ZERO;
                let mut i = 0.0;
                while i < n {
                    total = total + f(owned + Decimal::from(i));
                    i += 1.0;
                }
                total
            }
        }
    }

    /// Whether this curve supports closed-form bulk maximization.
    pub fn can_maximize(&self) -> bool {
        !matches!(self, CostCurve::Custom(_))
    }

    /// Largest whole quantity purchasable with `balance`, starting from
    /// `owned`, judged against the cumulative curve. `None` when the curve
    /// has no closed form. Boundary-exact: the answer `k` satisfies
    /// `cumulative(owned, k) <= balance < cumulative(owned, k + 1)`.
    ///
    /// Degenerate inputs resolve without error: an infinite next cost (a
    /// hard cap) affords zero, a zero cost affords infinitely many.
    pub fn max_affordable(&self, owned: Decimal, balance: Decimal) -> Option<Decimal> {
        if !self.can_maximize() {
            return None;
        }
        if balance.is_nan() {
            return Some(Decimal::ZERO);
        }

        let next = self.cost(owned);
        if next.is_nan() || next == Decimal::INFINITY {
            return Some(Decimal::ZERO);
        }
        if balance < next {
            return Some(Decimal::ZERO);
        }
        if balance == Decimal::INFINITY {
            return Some(Decimal::INFINITY);
        }

        let guess = match self {
            CostCurve::Constant(c) => {
                if *c <= Decimal::ZERO {
                    return Some(Decimal::INFINITY);
                }
                (balance / *c).floor()
            }
            CostCurve::Linear { base, slope } => {
                if *slope < Decimal::ZERO || *base < Decimal::ZERO {
                    return None;
                }
                if slope.is_zero() {
                    if base.is_zero() {
                        return Some(Decimal::INFINITY);
                    }
                    (balance / *base).floor()
                } else {
                    // Solve (slope/2) k^2 + (base + slope*owned - slope/2) k = balance.
                    let half_slope = *slope / Decimal::from(2.0);
                    let b = *base + *slope * owned - half_slope;
                    let discriminant = b * b + Decimal::from(4.0) * half_slope * balance;
                    ((discriminant.sqrt() - b) / *slope).floor()
                }
            }
            CostCurve::Geometric { base, growth } => {
                if *growth <= Decimal::ZERO {
                    return None;
                }
                if *base <= Decimal::ZERO {
                    return if base.is_zero() {
                        Some(Decimal::INFINITY)
                    } else {
                        None
                    };
                }
                if *growth == Decimal::ONE {
                    (balance / *base).floor()
                } else {
                    // cumulative(k) = A*(g^k - 1)/(g - 1) with A = base*g^owned,
                    // so k = log_g(balance*(g-1)/A + 1).
                    let first = *base * growth.pow(owned);
                    let x = balance * (*growth - Decimal::ONE) / first + Decimal::ONE;
                    if x <= Decimal::ZERO {
                        // Shrinking costs (g < 1) converge; past the series
                        // limit everything is affordable.
                        return Some(Decimal::INFINITY);
                    }
                    x.log(*growth).floor()
                }
            }
            // Already rejected by the can_maximize check above.
            CostCurve::Custom(_) => return None,
        };

        if !guess.is_finite() {
            return Some(Decimal::INFINITY);
        }

        let mut k = guess.max(Decimal::ZERO);
        for _ in 0..BOUNDARY_STEPS {
            if self.cumulative(owned, k + Decimal::ONE) <= balance {
                k = k + Decimal::ONE;
            } else {
                break;
            }
        }
        for _ in 0..BOUNDARY_STEPS {
            if k > Decimal::ZERO && self.cumulative(owned, k) > balance {
                k = k - Decimal::ONE;
            } else {
                break;
            }
        }
        Some(k)
    }
}

impl fmt::Debug for CostCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostCurve::Constant(c) => write!(f, "Constant({c})"),
            CostCurve::Linear { base, slope } => write!(f, "Linear({base} + {slope}*n)"),
            CostCurve::Geometric { base, growth } => {
                write!(f, "Geometric({base} * {growth}^n)")
            }
            CostCurve::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

/// Binds a resource balance to a cost curve and gates a purchase on it.
///
/// A requirement with `spend` false participates in gating but never
/// debits (e.g. "requires 1e6 total essence" thresholds).
///
/// # Examples
///
/// ```rust
/// use tickmill::{CostCurve, CostRequirement, Decimal, EngineContext, EvalContext,
///                Resource, ResourceId, ResourceLedger};
///
/// let gold = ResourceId::new("gold");
/// let mut ledger = ResourceLedger::new();
/// ledger.register(Resource::new(gold.clone(), Decimal::from(100.0)));
///
/// let req = CostRequirement::new(
///     gold.clone(),
///     CostCurve::Geometric { base: Decimal::ONE, growth: Decimal::from(2.0) },
/// );
///
/// let context = EngineContext::new();
/// let view = EvalContext::with_ledger(&context, &ledger);
/// assert!(req.is_met(Decimal::ZERO, &view));
/// assert_eq!(req.max_affordable(Decimal::ZERO, &view).unwrap(), Decimal::from(6.0));
/// ```
#[derive(Debug)]
pub struct CostRequirement {
    resource: ResourceId,
    curve: CostCurve,
    spend: bool,
}

impl CostRequirement {
    /// A spending requirement (the default): gates and debits.
    pub fn new(resource: ResourceId, curve: CostCurve) -> Self {
        Self {
            resource,
            curve,
            spend: true,
        }
    }

    /// A free requirement: gates but never debits.
    pub fn free(resource: ResourceId, curve: CostCurve) -> Self {
        Self {
            resource,
            curve,
            spend: false,
        }
    }

    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }

    pub fn spends(&self) -> bool {
        self.spend
    }

    /// Price of the next unit at the given owned count.
    pub fn next_cost(&self, owned: Decimal) -> Decimal {
        self.curve.cost(owned)
    }

    /// Whether the current balance clears the next unit's cost. An infinite
    /// cost (hard cap) is simply unmet; NaN costs are unmet as well.
    pub fn is_met(&self, owned: Decimal, view: &EvalContext) -> bool {
        let cost = self.curve.cost(owned);
        if cost.is_nan() || cost == Decimal::INFINITY {
            return false;
        }
        view.amount(&self.resource) >= cost
    }

    /// Whether bulk maximization is supported for this requirement.
    pub fn can_maximize(&self) -> bool {
        self.curve.can_maximize()
    }

    /// Maximum whole quantity affordable with the current balance, judged
    /// against the cumulative cost curve.
    pub fn max_affordable(
        &self,
        owned: Decimal,
        view: &EvalContext,
    ) -> Result<Decimal, EngineError> {
        let balance = view.amount(&self.resource);
        self.curve
            .max_affordable(owned, balance)
            .ok_or_else(|| EngineError::CannotMaximize(self.resource.clone()))
    }

    /// Debit the next unit's cost. Must only be invoked after a successful
    /// [`is_met`](Self::is_met) check; paying an unaffordable requirement
    /// is a caller bug and is refused with
    /// [`EngineError::InsufficientBalance`], never clamped.
    pub fn pay(&self, owned: Decimal, ledger: &mut ResourceLedger) -> Result<(), EngineError> {
        self.pay_bulk(owned, Decimal::ONE, ledger)
    }

    /// Debit the cumulative cost of `count` units starting from `owned`.
    pub fn pay_bulk(
        &self,
        owned: Decimal,
        count: Decimal,
        ledger: &mut ResourceLedger,
    ) -> Result<(), EngineError> {
        if !self.spend {
            return Ok(());
        }
        let cost = self.curve.cumulative(owned, count);
        let resource = ledger.get_mut(&self.resource)?;
        if resource.amount() < cost {
            return Err(EngineError::InsufficientBalance {
                resource: self.resource.clone(),
                cost,
                balance: resource.amount(),
            });
        }
        resource.withdraw(cost);
        Ok(())
    }
}

/// Whether a composite requirement list is affordable as a whole.
///
/// Spending requirements bound to the same resource are summed before the
/// balance comparison, so two requirements that are each affordable alone
/// cannot jointly overdraw. Non-spending requirements gate individually
/// (thresholds, not debits). Any infinite or NaN cost fails the gate.
pub fn all_met(requirements: &[CostRequirement], owned: Decimal, view: &EvalContext) -> bool {
    let mut spend_totals: HashMap<&ResourceId, Decimal> = HashMap::new();
    for requirement in requirements {
        let cost = requirement.next_cost(owned);
        if cost.is_nan() || cost == Decimal::INFINITY {
            return false;
        }
        if requirement.spends() {
            let total = spend_totals
                .entry(requirement.resource())
                .or_insert(Decimal::ZERO);
            *total = *total + cost;
        } else if view.amount(requirement.resource()) < cost {
            return false;
        }
    }
    spend_totals
        .iter()
        .all(|(resource, total)| view.amount(resource) >= *total)
}
