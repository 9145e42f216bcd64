//! Modifier chains: ordered, toggle-able production/cost formula steps.
//!
//! A [`ModifierChain`] composes named transformations (additive,
//! multiplicative, exponential, clamp) into one function of a base value.
//! `apply` folds the chain forward; `invert` runs it in reverse, solving for
//! the base that would produce a target output. Modifiers whose inverse is
//! not analytic (clamps, zero multipliers) make the chain report
//! [`EngineError::NotInvertible`] instead of guessing.

use crate::context::EvalContext;
use crate::error::EngineError;
use crate::numeric::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operand of a modifier: a constant, or a function of current game state
/// re-evaluated every time the chain runs.
pub enum Operand {
    Constant(Decimal),
    Dynamic(Box<dyn Fn(&EvalContext) -> Decimal + Send + Sync>),
}

impl Operand {
    /// Evaluate against the current view.
    pub fn value(&self, view: &EvalContext) -> Decimal {
        match self {
            Operand::Constant(v) => *v,
            Operand::Dynamic(f) => f(view),
        }
    }

    /// Build a dynamic operand from a closure.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&EvalContext) -> Decimal + Send + Sync + 'static,
    {
        Operand::Dynamic(Box::new(f))
    }
}

impl From<Decimal> for Operand {
    fn from(v: Decimal) -> Self {
        Operand::Constant(v)
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Constant(Decimal::from(v))
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Constant(v) => write!(f, "Constant({v})"),
            Operand::Dynamic(_) => write!(f, "Dynamic(<fn>)"),
        }
    }
}

/// What a modifier does to the running value.
///
/// The exponential sub-mode is a constructor-time choice: `Pow` raises the
/// running value to the operand, `PowScaleExponent` multiplies the running
/// value's power-of-ten exponent by the operand (leaving the mantissa
/// alone).
#[derive(Debug)]
enum ModifierKind {
    Add(Operand),
    Mul(Operand),
    Pow { operand: Operand, scale_exponent: bool },
    Clamp {
        min: Option<Decimal>,
        max: Option<Decimal>,
    },
}

type EnabledFn = Box<dyn Fn(&EvalContext) -> bool + Send + Sync>;

/// One named, toggle-able step in a production or cost formula.
///
/// The name is the human-readable description shown in UI breakdowns. The
/// `enabled` predicate is re-evaluated from current game state every time
/// the chain runs; a disabled modifier is an exact no-op.
///
/// # Examples
///
/// ```rust
/// use tickmill::{Decimal, EngineContext, EvalContext, Modifier, ModifierChain};
///
/// let chain = ModifierChain::new()
///     .with(Modifier::multiplicative("prestige bonus", Decimal::from(3.0)))
///     .with(Modifier::additive("flat generator", Decimal::from(5.0)));
///
/// let context = EngineContext::new();
/// let view = EvalContext::new(&context);
/// assert_eq!(chain.apply(Decimal::from(2.0), &view), Decimal::from(11.0));
/// ```
pub struct Modifier {
    name: String,
    kind: ModifierKind,
    enabled: Option<EnabledFn>,
}

impl Modifier {
    /// An additive modifier: `acc + operand`.
    pub fn additive(name: impl Into<String>, operand: impl Into<Operand>) -> Self {
        Self {
            name: name.into(),
            kind: ModifierKind::Add(operand.into()),
            enabled: None,
        }
    }

    /// A multiplicative modifier: `acc * operand`.
    pub fn multiplicative(name: impl Into<String>, operand: impl Into<Operand>) -> Self {
        Self {
            name: name.into(),
            kind: ModifierKind::Mul(operand.into()),
            enabled: None,
        }
    }

    /// An exponential modifier: `acc ^ operand`.
    pub fn exponential(name: impl Into<String>, operand: impl Into<Operand>) -> Self {
        Self {
            name: name.into(),
            kind: ModifierKind::Pow {
                operand: operand.into(),
                scale_exponent: false,
            },
            enabled: None,
        }
    }

    /// An exponential modifier in exponent-scaling mode: the running
    /// value's power-of-ten exponent is multiplied by the operand.
    pub fn exponent_scale(name: impl Into<String>, operand: impl Into<Operand>) -> Self {
        Self {
            name: name.into(),
            kind: ModifierKind::Pow {
                operand: operand.into(),
                scale_exponent: true,
            },
            enabled: None,
        }
    }

    /// A clamp modifier. Clamps are legitimate production steps but have no
    /// analytic inverse, so any chain containing an enabled clamp forfeits
    /// `invert`.
    pub fn clamp(
        name: impl Into<String>,
        min: Option<Decimal>,
        max: Option<Decimal>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ModifierKind::Clamp { min, max },
            enabled: None,
        }
    }

    /// Attach an `enabled` predicate, re-evaluated from game state at every
    /// chain run. Without one the modifier is always enabled.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tickmill::{Decimal, Modifier};
    ///
    /// let m = Modifier::multiplicative("challenge bonus", Decimal::from(2.0))
    ///     .enabled_when(|view| view.flag("challenge_done"));
    /// assert_eq!(m.name(), "challenge bonus");
    /// ```
    pub fn enabled_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&EvalContext) -> bool + Send + Sync + 'static,
    {
        self.enabled = Some(Box::new(predicate));
        self
    }

    /// The human-readable description of this modifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this modifier participates in the current evaluation.
    pub fn is_enabled(&self, view: &EvalContext) -> bool {
        self.enabled.as_ref().map_or(true, |p| p(view))
    }

    /// Apply this modifier to the running value. Caller has already checked
    /// `is_enabled`.
    fn apply(&self, acc: Decimal, view: &EvalContext) -> Decimal {
        match &self.kind {
            ModifierKind::Add(op) => acc + op.value(view),
            ModifierKind::Mul(op) => acc * op.value(view),
            ModifierKind::Pow {
                operand,
                scale_exponent: false,
            } => acc.pow(operand.value(view)),
            ModifierKind::Pow {
                operand,
                scale_exponent: true,
            } => acc.scale_exponent(operand.value(view)),
            ModifierKind::Clamp { min, max } => {
                let mut result = acc;
                if let Some(min) = min {
                    result = result.max(*min);
                }
                if let Some(max) = max {
                    result = result.min(*max);
                }
                result
            }
        }
    }

    /// Apply this modifier's inverse to the running value.
    fn invert(&self, acc: Decimal, view: &EvalContext) -> Result<Decimal, EngineError> {
        match &self.kind {
            ModifierKind::Add(op) => Ok(acc - op.value(view)),
            ModifierKind::Mul(op) => {
                let v = op.value(view);
                if v.is_zero() {
                    return Err(self.not_invertible("multiplicative operand is zero"));
                }
                Ok(acc / v)
            }
            ModifierKind::Pow {
                operand,
                scale_exponent,
            } => {
                let v = operand.value(view);
                if v.is_zero() {
                    return Err(self.not_invertible("exponential operand is zero"));
                }
                let inverted = if *scale_exponent {
                    acc.scale_exponent(v.recip())
                } else {
                    acc.pow(v.recip())
                };
                if inverted.is_nan() && !acc.is_nan() {
                    return Err(self.not_invertible("root is undefined for this value"));
                }
                Ok(inverted)
            }
            ModifierKind::Clamp { .. } => {
                Err(self.not_invertible("clamp has no analytic inverse"))
            }
        }
    }

    /// Whether this modifier has an analytic inverse under the current view.
    fn is_invertible(&self, view: &EvalContext) -> bool {
        match &self.kind {
            ModifierKind::Add(_) => true,
            ModifierKind::Mul(op) => !op.value(view).is_zero(),
            ModifierKind::Pow { operand, .. } => !operand.value(view).is_zero(),
            ModifierKind::Clamp { .. } => false,
        }
    }

    fn not_invertible(&self, reason: &str) -> EngineError {
        EngineError::NotInvertible {
            modifier: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Debug for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modifier")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("always_enabled", &self.enabled.is_none())
            .finish()
    }
}

/// An ordered sequence of modifiers folded over a base value.
///
/// `apply` iterates in declaration order, skipping modifiers whose
/// `enabled` predicate is false at call time. `invert` iterates in reverse,
/// applying each operator's inverse. An empty chain is the identity in both
/// directions.
///
/// # Examples
///
/// ```rust
/// use tickmill::{Decimal, EngineContext, EvalContext, Modifier, ModifierChain};
///
/// let chain = ModifierChain::new()
///     .with(Modifier::multiplicative("generators", Decimal::from(3.0)))
///     .with(Modifier::additive("base drip", Decimal::from(5.0)));
///
/// let context = EngineContext::new();
/// let view = EvalContext::new(&context);
///
/// let out = chain.apply(Decimal::from(2.0), &view);
/// assert_eq!(out, Decimal::from(11.0));
/// assert_eq!(chain.invert(out, &view).unwrap(), Decimal::from(2.0));
/// ```
#[derive(Debug, Default)]
pub struct ModifierChain {
    modifiers: Vec<Modifier>,
}

impl ModifierChain {
    /// Create a new empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a modifier, builder style.
    pub fn with(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Append a modifier.
    pub fn push(&mut self, modifier: Modifier) {
        self.modifiers.push(modifier);
    }

    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    /// Fold all enabled modifiers over `base`, in declaration order.
    pub fn apply(&self, base: Decimal, view: &EvalContext) -> Decimal {
        self.modifiers
            .iter()
            .filter(|m| m.is_enabled(view))
            .fold(base, |acc, m| m.apply(acc, view))
    }

    /// Like [`apply`](Self::apply), but records the value after each enabled
    /// step for UI rate breakdowns.
    pub fn apply_with_breakdown(&self, base: Decimal, view: &EvalContext) -> RateBreakdown {
        let mut breakdown = RateBreakdown::new(base);
        let mut acc = base;
        for modifier in self.modifiers.iter().filter(|m| m.is_enabled(view)) {
            acc = modifier.apply(acc, view);
            breakdown.add_step(modifier.name(), acc);
        }
        breakdown.value = acc;
        breakdown
    }

    /// Solve for the base that would produce `target` after applying all
    /// enabled modifiers.
    ///
    /// Iterates in reverse order, applying each operator's inverse
    /// (subtract, divide, root). Fails with [`EngineError::NotInvertible`]
    /// if any enabled modifier lacks an analytic inverse, including a
    /// multiplicative modifier whose operand is currently zero; it never
    /// answers with an Infinity/NaN stand-in.
    pub fn invert(&self, target: Decimal, view: &EvalContext) -> Result<Decimal, EngineError> {
        let mut acc = target;
        for modifier in self.modifiers.iter().rev().filter(|m| m.is_enabled(view)) {
            acc = modifier.invert(acc, view)?;
        }
        Ok(acc)
    }

    /// Whether every currently enabled modifier has an analytic inverse.
    pub fn is_invertible(&self, view: &EvalContext) -> bool {
        self.modifiers
            .iter()
            .filter(|m| m.is_enabled(view))
            .all(|m| m.is_invertible(view))
    }
}

/// A per-step trace of one chain evaluation, for UI rate explanations.
///
/// Each step entry is `(modifier_name, value_after_step)`, listed in
/// application order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateBreakdown {
    /// The base value the chain was applied to.
    pub base: Decimal,
    /// The final value after all enabled modifiers.
    pub value: Decimal,
    /// Value after each enabled step, in application order.
    pub steps: Vec<(String, Decimal)>,
}

impl RateBreakdown {
    fn new(base: Decimal) -> Self {
        Self {
            base,
            value: base,
            steps: Vec::new(),
        }
    }

    fn add_step(&mut self, name: impl Into<String>, value: Decimal) {
        self.steps.push((name.into(), value));
    }
}
