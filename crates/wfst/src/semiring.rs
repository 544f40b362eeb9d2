// Weight arithmetic over the tropical and log semirings.

use std::fmt;

use crate::{Result, WfstError};

/// A semiring over single-precision floats.
///
/// Both supported semirings share the same carrier: `zero` is `+inf`, `one`
/// is `0.0` and `times` is addition. They differ only in `plus`.
pub trait Semiring:
    Copy + Clone + fmt::Debug + fmt::Display + PartialEq + PartialOrd + Send + Sync + 'static
{
    /// Arc type name used in the binary header (`"standard"`, `"log"`).
    const ARC_TYPE: &'static str;
    /// `plus(a, a) == a` for every `a`.
    const IDEMPOTENT: bool;
    /// `plus(a, b)` is always either `a` or `b`.
    const PATH: bool;

    fn new(value: f32) -> Self;

    fn value(&self) -> f32;

    fn plus(&self, rhs: Self) -> Self;

    #[inline]
    fn zero() -> Self {
        Self::new(f32::INFINITY)
    }

    #[inline]
    fn one() -> Self {
        Self::new(0.0)
    }

    #[inline]
    fn times(&self, rhs: Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            Self::zero()
        } else {
            Self::new(self.value() + rhs.value())
        }
    }

    /// Left and right division coincide since both semirings are commutative.
    fn divide(&self, rhs: Self) -> Result<Self> {
        if rhs.is_zero() {
            return Err(WfstError::InvalidWeight(format!(
                "division of {} by zero",
                self.value()
            )));
        }
        if self.is_zero() {
            return Ok(Self::zero());
        }
        Ok(Self::new(self.value() - rhs.value()))
    }

    #[inline]
    fn is_zero(&self) -> bool {
        self.value() == f32::INFINITY
    }

    #[inline]
    fn is_one(&self) -> bool {
        self.value() == 0.0
    }

    fn plus_assign(&mut self, rhs: Self) {
        *self = self.plus(rhs);
    }

    fn times_assign(&mut self, rhs: Self) {
        *self = self.times(rhs);
    }

    /// Weight of the reversed path. Identity for commutative semirings.
    #[inline]
    fn reverse(&self) -> Self {
        *self
    }

    /// Round to the nearest multiple of `delta`. Infinities are unchanged.
    fn quantize(&self, delta: f32) -> Self {
        let v = self.value();
        if v.is_infinite() || v.is_nan() {
            *self
        } else {
            Self::new(((v / delta) + 0.5).floor() * delta)
        }
    }

    fn approx_equal(&self, other: &Self, delta: f32) -> bool {
        let (a, b) = (self.value(), other.value());
        if a.is_infinite() || b.is_infinite() {
            a == b
        } else {
            (a - b).abs() <= delta
        }
    }

    /// Hashable key of the quantized weight.
    #[inline]
    fn hash_key(&self, delta: f32) -> u32 {
        self.quantize(delta).value().to_bits()
    }

    fn is_member(&self) -> bool {
        let v = self.value();
        !v.is_nan() && v != f32::NEG_INFINITY
    }
}

/// Tropical semiring: `plus = min`, `times = +`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TropicalWeight(f32);

/// Log semiring: `plus(a, b) = -log(exp(-a) + exp(-b))`, `times = +`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct LogWeight(f32);

impl Semiring for TropicalWeight {
    const ARC_TYPE: &'static str = "standard";
    const IDEMPOTENT: bool = true;
    const PATH: bool = true;

    #[inline]
    fn new(value: f32) -> Self {
        Self(value)
    }

    #[inline]
    fn value(&self) -> f32 {
        self.0
    }

    #[inline]
    fn plus(&self, rhs: Self) -> Self {
        if rhs.0 < self.0 { rhs } else { *self }
    }
}

impl Semiring for LogWeight {
    const ARC_TYPE: &'static str = "log";
    const IDEMPOTENT: bool = false;
    const PATH: bool = false;

    #[inline]
    fn new(value: f32) -> Self {
        Self(value)
    }

    #[inline]
    fn value(&self) -> f32 {
        self.0
    }

    fn plus(&self, rhs: Self) -> Self {
        let (a, b) = (self.0, rhs.0);
        if a == f32::INFINITY {
            return rhs;
        }
        if b == f32::INFINITY {
            return *self;
        }
        // Computed in f64 around the smaller operand to avoid underflow.
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let diff = f64::from(hi) - f64::from(lo);
        Self((f64::from(lo) - (-diff).exp().ln_1p()) as f32)
    }
}

impl Default for TropicalWeight {
    fn default() -> Self {
        Self::one()
    }
}

impl Default for LogWeight {
    fn default() -> Self {
        Self::one()
    }
}

impl From<f32> for TropicalWeight {
    fn from(value: f32) -> Self {
        Self(value)
    }
}

impl From<f32> for LogWeight {
    fn from(value: f32) -> Self {
        Self(value)
    }
}

// Lets unsuffixed float literals, which default to f64, build weights.
impl From<f64> for TropicalWeight {
    fn from(value: f64) -> Self {
        Self(value as f32)
    }
}

impl From<f64> for LogWeight {
    fn from(value: f64) -> Self {
        Self(value as f32)
    }
}

/// Format a weight value the way the text format expects it.
pub(crate) fn format_weight(value: f32, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if value == f32::INFINITY {
        write!(f, "Infinity")
    } else if value == f32::NEG_INFINITY {
        write!(f, "-Infinity")
    } else {
        write!(f, "{value}")
    }
}

impl fmt::Display for TropicalWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_weight(self.0, f)
    }
}

impl fmt::Display for LogWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_weight(self.0, f)
    }
}

/// Parse a weight written by [`format_weight`].
pub fn parse_weight<W: Semiring>(s: &str) -> Result<W> {
    let value = match s {
        "Infinity" | "inf" => f32::INFINITY,
        "-Infinity" | "-inf" => f32::NEG_INFINITY,
        _ => s
            .parse::<f32>()
            .map_err(|_| WfstError::InvalidWeight(s.to_string()))?,
    };
    Ok(W::new(value))
}

/// Convert a weight between semirings through its float value.
#[inline]
pub fn convert_weight<W1: Semiring, W2: Semiring>(w: W1) -> W2 {
    W2::new(w.value())
}
