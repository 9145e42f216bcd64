//! Arbitrary-magnitude decimal numbers.
//!
//! Every game quantity (resource amounts, costs, rates, effects) is a
//! [`Decimal`]: a normalized `mantissa * 10^exponent` pair with an `i64`
//! exponent, which represents magnitudes far past the range of `f64`.
//!
//! All operations are total and deterministic: overflow saturates to an
//! infinite sentinel and domain errors (log of a negative, `0 / 0`) produce
//! NaN instead of panicking. Game formulas routinely pass through degenerate
//! states mid-tick (zero owned upgrades, empty balances), and those states
//! must never crash the tick loop.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Exponents past this magnitude collapse to the infinite sentinel (or to
/// zero, for very negative exponents). Leaves headroom so exponent sums
/// never overflow `i64` before the check.
const EXPONENT_LIMIT: i64 = i64::MAX / 4;

/// When two addends' exponents differ by more than this, the smaller one
/// cannot affect the `f64` mantissa of the larger at all.
const ADD_WINDOW: i64 = 17;

/// Exponent at or above which a value is integral to full `f64` mantissa
/// precision, making `floor`/`ceil` the identity.
const INTEGRAL_EXPONENT: i64 = 16;

/// An arbitrary-magnitude decimal value.
///
/// Immutable: every operation returns a new value. Normalized so that
/// `1 <= |mantissa| < 10`, or `mantissa == 0` for zero. The sign lives in
/// the mantissa.
///
/// Serializes as a `(mantissa, exponent)` tuple, which round-trips through
/// JSON without precision loss.
///
/// # Examples
///
/// ```rust
/// use tickmill::Decimal;
///
/// let a = Decimal::from(2.0);
/// let b = Decimal::from(5.0);
/// assert_eq!(a * b, Decimal::from(10.0));
///
/// // Magnitudes far beyond f64 range compare correctly.
/// let huge = Decimal::from(9.0).pow(Decimal::from(1e15));
/// assert!(huge > Decimal::from(f64::MAX));
/// assert!(huge.is_finite());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "(f64, i64)", into = "(f64, i64)")]
pub struct Decimal {
    mantissa: f64,
    exponent: i64,
}

impl Decimal {
    /// The value `0`.
    pub const ZERO: Decimal = Decimal {
        mantissa: 0.0,
        exponent: 0,
    };

    /// The value `1`.
    pub const ONE: Decimal = Decimal {
        mantissa: 1.0,
        exponent: 0,
    };

    /// The saturating "infinite" sentinel. Represents hard caps and
    /// overflow; never produced as a silent wraparound.
    pub const INFINITY: Decimal = Decimal {
        mantissa: f64::INFINITY,
        exponent: 0,
    };

    /// The negative infinite sentinel.
    pub const NEG_INFINITY: Decimal = Decimal {
        mantissa: f64::NEG_INFINITY,
        exponent: 0,
    };

    /// The not-a-number sentinel, produced by domain errors.
    pub const NAN: Decimal = Decimal {
        mantissa: f64::NAN,
        exponent: 0,
    };

    /// Build a normalized value from a raw mantissa/exponent pair.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tickmill::Decimal;
    ///
    /// let d = Decimal::from_parts(123.0, 4);
    /// assert_eq!(d, Decimal::from_parts(1.23, 6));
    /// ```
    pub fn from_parts(mantissa: f64, exponent: i64) -> Self {
        Self { mantissa, exponent }.normalized()
    }

    /// Convert an `f64` into a `Decimal`.
    pub fn from_f64(f: f64) -> Self {
        Self::from_parts(f, 0)
    }

    /// Convert an integer into a `Decimal`.
    ///
    /// Integers beyond 2^53 in magnitude round to the nearest representable
    /// mantissa, like any `f64` conversion.
    pub fn from_int(i: i64) -> Self {
        Self::from_parts(i as f64, 0)
    }

    /// Convert to `f64`, saturating to `f64::INFINITY` (or `0`) when the
    /// exponent is out of `f64` range.
    pub fn to_f64(self) -> f64 {
        if self.mantissa == 0.0 || !self.mantissa.is_finite() {
            return self.mantissa;
        }
        if self.exponent > 308 {
            return f64::INFINITY * self.mantissa.signum();
        }
        if self.exponent < -324 {
            return 0.0;
        }
        self.mantissa * 10f64.powi(self.exponent as i32)
    }

    /// The normalized mantissa, in `[1, 10)` by absolute value (or `0`).
    pub fn mantissa(self) -> f64 {
        self.mantissa
    }

    /// The power-of-ten exponent.
    pub fn exponent(self) -> i64 {
        self.exponent
    }

    pub fn is_zero(self) -> bool {
        self.mantissa == 0.0
    }

    pub fn is_nan(self) -> bool {
        self.mantissa.is_nan()
    }

    pub fn is_finite(self) -> bool {
        self.mantissa.is_finite()
    }

    pub fn is_infinite(self) -> bool {
        self.mantissa.is_infinite()
    }

    /// `-1`, `0`, or `1` depending on sign. NaN yields NaN.
    pub fn signum(self) -> f64 {
        if self.mantissa == 0.0 {
            0.0
        } else {
            self.mantissa.signum()
        }
    }

    pub fn abs(self) -> Self {
        Self {
            mantissa: self.mantissa.abs(),
            exponent: self.exponent,
        }
    }

    /// Multiplicative inverse. `1/0` is the infinite sentinel.
    pub fn recip(self) -> Self {
        Self::ONE / self
    }

    fn normalized(self) -> Self {
        let Self {
            mut mantissa,
            mut exponent,
        } = self;

        if mantissa.is_nan() {
            return Self::NAN;
        }
        if mantissa.is_infinite() {
            return Self {
                mantissa,
                exponent: 0,
            };
        }
        if mantissa == 0.0 {
            return Self::ZERO;
        }

        let shift = mantissa.abs().log10().floor();
        mantissa /= 10f64.powi(shift as i32);
        exponent = exponent.saturating_add(shift as i64);

        // log10/floor can land one step off at exact powers of ten.
        if mantissa.abs() >= 10.0 {
            mantissa /= 10.0;
            exponent = exponent.saturating_add(1);
        } else if mantissa.abs() < 1.0 {
            mantissa *= 10.0;
            exponent = exponent.saturating_sub(1);
        }

        if exponent > EXPONENT_LIMIT {
            return if mantissa > 0.0 {
                Self::INFINITY
            } else {
                Self::NEG_INFINITY
            };
        }
        if exponent < -EXPONENT_LIMIT {
            return Self::ZERO;
        }

        Self { mantissa, exponent }
    }

    /// Build a value from a mantissa and a fractional power-of-ten exponent.
    /// Used by `pow`, which works in log space.
    fn from_fractional_exponent(mantissa: f64, exponent: f64) -> Self {
        if exponent.is_nan() || mantissa.is_nan() {
            return Self::NAN;
        }
        if exponent > EXPONENT_LIMIT as f64 {
            return if mantissa >= 0.0 {
                Self::INFINITY
            } else {
                Self::NEG_INFINITY
            };
        }
        if exponent < -(EXPONENT_LIMIT as f64) {
            return Self::ZERO;
        }
        let whole = exponent.floor();
        let frac = exponent - whole;
        Self::from_parts(mantissa * 10f64.powf(frac), whole as i64)
    }

    /// Base-10 logarithm. `log10(0)` is negative infinity; negatives are
    /// NaN.
    pub fn log10(self) -> Self {
        if self.is_nan() {
            return Self::NAN;
        }
        if self.is_zero() {
            return Self::NEG_INFINITY;
        }
        if self.mantissa < 0.0 {
            return Self::NAN;
        }
        if self.is_infinite() {
            return Self::INFINITY;
        }
        Self::from_f64(self.exponent as f64 + self.mantissa.log10())
    }

    /// Natural logarithm.
    pub fn ln(self) -> Self {
        self.log10() * Self::from_f64(std::f64::consts::LN_10)
    }

    /// Logarithm in an arbitrary base.
    pub fn log(self, base: Decimal) -> Self {
        self.log10() / base.log10()
    }

    /// Raise to a power. Works in log space, so both operands may be huge.
    ///
    /// Negative bases support integer exponents only; fractional exponents
    /// of a negative base are NaN. `0^0` is `1` by the game-formula
    /// convention (an unpurchased upgrade contributes a neutral factor).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tickmill::Decimal;
    ///
    /// let d = Decimal::from(2.0).pow(Decimal::from(10.0));
    /// assert!((d.to_f64() - 1024.0).abs() < 1e-6);
    /// ```
    pub fn pow(self, exp: Decimal) -> Self {
        if self.is_nan() || exp.is_nan() {
            return Self::NAN;
        }
        if exp.is_zero() {
            return Self::ONE;
        }
        if self.is_zero() {
            return if exp.mantissa > 0.0 {
                Self::ZERO
            } else {
                Self::INFINITY
            };
        }
        if self.mantissa < 0.0 {
            let e = exp.to_f64();
            if !e.is_finite() || e.fract() != 0.0 {
                return Self::NAN;
            }
            let result = self.abs().pow(exp);
            return if (e as i64) % 2 == 0 { result } else { -result };
        }
        let log = self.exponent as f64 + self.mantissa.log10();
        Self::from_fractional_exponent(1.0, log * exp.to_f64())
    }

    /// Square root. Negative inputs are NaN.
    pub fn sqrt(self) -> Self {
        self.pow(Self::from_f64(0.5))
    }

    /// Cube root. Defined for negative inputs.
    pub fn cbrt(self) -> Self {
        if self.mantissa < 0.0 {
            -self.abs().pow(Self::from_f64(1.0 / 3.0))
        } else {
            self.pow(Self::from_f64(1.0 / 3.0))
        }
    }

    /// Multiply the power-of-ten exponent by `factor`, leaving the mantissa
    /// alone: `m * 10^e` becomes `m * 10^(e * factor)`.
    ///
    /// This is the "scale the exponent" mode of exponential modifiers. Its
    /// inverse is scaling by the reciprocal.
    pub fn scale_exponent(self, factor: Decimal) -> Self {
        if !self.is_finite() || self.is_zero() || factor.is_nan() {
            return if factor.is_nan() { Self::NAN } else { self };
        }
        Self::from_fractional_exponent(self.mantissa, self.exponent as f64 * factor.to_f64())
    }

    /// Round toward negative infinity. Values with exponents of 16 or more
    /// are already integral at `f64` mantissa precision.
    pub fn floor(self) -> Self {
        if !self.is_finite() || self.exponent >= INTEGRAL_EXPONENT {
            return self;
        }
        Self::from_f64(self.to_f64().floor())
    }

    /// Round toward positive infinity.
    pub fn ceil(self) -> Self {
        if !self.is_finite() || self.exponent >= INTEGRAL_EXPONENT {
            return self;
        }
        Self::from_f64(self.to_f64().ceil())
    }

    /// The smaller of two values. NaN propagates.
    pub fn min(self, other: Decimal) -> Self {
        match self.partial_cmp(&other) {
            Some(Ordering::Greater) => other,
            Some(_) => self,
            None => Self::NAN,
        }
    }

    /// The larger of two values. NaN propagates.
    pub fn max(self, other: Decimal) -> Self {
        match self.partial_cmp(&other) {
            Some(Ordering::Less) => other,
            Some(_) => self,
            None => Self::NAN,
        }
    }

    /// Clamp into `[min, max]`.
    pub fn clamp(self, min: Decimal, max: Decimal) -> Self {
        self.max(min).min(max)
    }

    /// Approximate equality with a relative tolerance, for comparing values
    /// that went through inverse operations.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tickmill::Decimal;
    ///
    /// let a = Decimal::from(10.0).sqrt().pow(Decimal::from(2.0));
    /// assert!(a.approx_eq(Decimal::from(10.0), 1e-9));
    /// ```
    pub fn approx_eq(self, other: Decimal, tolerance: f64) -> bool {
        if self == other {
            return true;
        }
        if !self.is_finite() || !other.is_finite() {
            return false;
        }
        let scale = self.abs().max(other.abs());
        (self - other).abs() <= scale * Decimal::from_f64(tolerance)
    }
}

impl Add for Decimal {
    type Output = Decimal;

    fn add(self, other: Decimal) -> Decimal {
        if self.is_nan() || other.is_nan() {
            return Decimal::NAN;
        }
        if self.is_infinite() || other.is_infinite() {
            return match (self.is_infinite(), other.is_infinite()) {
                (true, true) if self.mantissa != other.mantissa => Decimal::NAN,
                (true, _) => self,
                _ => other,
            };
        }
        if self.is_zero() {
            return other;
        }
        if other.is_zero() {
            return self;
        }

        let (big, small) = if self.exponent >= other.exponent {
            (self, other)
        } else {
            (other, self)
        };
        let gap = big.exponent - small.exponent;
        if gap > ADD_WINDOW {
            return big;
        }
        // Align at the smaller exponent: scaling up by a power of ten is
        // exact in binary, scaling down is not, and the downscaled form
        // drifts on plain integer sums like 100 - 63.
        Decimal::from_parts(
            big.mantissa * 10f64.powi(gap as i32) + small.mantissa,
            small.exponent,
        )
    }
}

impl Sub for Decimal {
    type Output = Decimal;

    fn sub(self, other: Decimal) -> Decimal {
        self + (-other)
    }
}

impl Mul for Decimal {
    type Output = Decimal;

    fn mul(self, other: Decimal) -> Decimal {
        if self.is_nan() || other.is_nan() {
            return Decimal::NAN;
        }
        if self.is_infinite() || other.is_infinite() {
            if self.is_zero() || other.is_zero() {
                return Decimal::NAN;
            }
            return if self.signum() * other.signum() > 0.0 {
                Decimal::INFINITY
            } else {
                Decimal::NEG_INFINITY
            };
        }
        if self.is_zero() || other.is_zero() {
            return Decimal::ZERO;
        }
        let exponent = self.exponent as i128 + other.exponent as i128;
        if exponent > EXPONENT_LIMIT as i128 {
            return if self.signum() * other.signum() > 0.0 {
                Decimal::INFINITY
            } else {
                Decimal::NEG_INFINITY
            };
        }
        if exponent < -(EXPONENT_LIMIT as i128) {
            return Decimal::ZERO;
        }
        Decimal::from_parts(self.mantissa * other.mantissa, exponent as i64)
    }
}

impl Div for Decimal {
    type Output = Decimal;

    fn div(self, other: Decimal) -> Decimal {
        if self.is_nan() || other.is_nan() {
            return Decimal::NAN;
        }
        if other.is_zero() {
            // 0/0 is NaN; x/0 saturates to the signed infinite sentinel.
            return if self.is_zero() {
                Decimal::NAN
            } else if self.signum() > 0.0 {
                Decimal::INFINITY
            } else {
                Decimal::NEG_INFINITY
            };
        }
        if other.is_infinite() {
            return if self.is_infinite() {
                Decimal::NAN
            } else {
                Decimal::ZERO
            };
        }
        if self.is_infinite() || self.is_zero() {
            return if self.is_infinite() && other.signum() < 0.0 {
                -self
            } else {
                self
            };
        }
        let exponent = self.exponent as i128 - other.exponent as i128;
        if exponent > EXPONENT_LIMIT as i128 {
            return if self.signum() * other.signum() > 0.0 {
                Decimal::INFINITY
            } else {
                Decimal::NEG_INFINITY
            };
        }
        if exponent < -(EXPONENT_LIMIT as i128) {
            return Decimal::ZERO;
        }
        Decimal::from_parts(self.mantissa / other.mantissa, exponent as i64)
    }
}

impl Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal {
            mantissa: -self.mantissa,
            exponent: self.exponent,
        }
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        matches!(self.partial_cmp(other), Some(Ordering::Equal))
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.is_nan() || other.is_nan() {
            return None;
        }
        if self.is_infinite() || other.is_infinite() {
            return self.mantissa.partial_cmp(&other.mantissa);
        }

        let sign = self.signum();
        let other_sign = other.signum();
        if sign != other_sign {
            return sign.partial_cmp(&other_sign);
        }
        if sign == 0.0 {
            return Some(Ordering::Equal);
        }

        // Same nonzero sign: the exponent decides, flipped for negatives.
        let by_exponent = if sign > 0.0 {
            self.exponent.cmp(&other.exponent)
        } else {
            other.exponent.cmp(&self.exponent)
        };
        match by_exponent {
            Ordering::Equal => self.mantissa.partial_cmp(&other.mantissa),
            ord => Some(ord),
        }
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<f64> for Decimal {
    fn from(f: f64) -> Self {
        Self::from_f64(f)
    }
}

impl From<i64> for Decimal {
    fn from(i: i64) -> Self {
        Self::from_int(i)
    }
}

impl From<(f64, i64)> for Decimal {
    fn from((mantissa, exponent): (f64, i64)) -> Self {
        Self::from_parts(mantissa, exponent)
    }
}

impl From<Decimal> for (f64, i64) {
    fn from(d: Decimal) -> Self {
        (d.mantissa, d.exponent)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nan() {
            return write!(f, "NaN");
        }
        if self.is_infinite() {
            return write!(f, "{}Infinity", if self.mantissa < 0.0 { "-" } else { "" });
        }
        if self.exponent.abs() <= 15 {
            write!(f, "{}", self.to_f64())
        } else {
            write!(f, "{:.3}e{}", self.mantissa, self.exponent)
        }
    }
}
