//! 256-bit fixed-point arithmetic for the three ledger scales.
//!
//! * `Wad` carries 18 decimals (token amounts, `ink`, `art`, `chop`).
//! * `Ray` carries 27 decimals (rates, `spot`, `par`, `mat`, prices).
//! * `Rad` carries 45 decimals (internal sikka, `sin`, `debt`, ceilings).
//!
//! Every operation is checked and rounds down unless stated otherwise.
//! Overflow, underflow and division by zero surface as [`MathError`].

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const WAD_DECIMALS: usize = 18;
pub const RAY_DECIMALS: usize = 27;
pub const RAD_DECIMALS: usize = 45;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("math/overflow")]
    Overflow,
    #[error("math/underflow")]
    Underflow,
    #[error("math/division-by-zero")]
    DivisionByZero,
    #[error("math/invalid-literal")]
    InvalidLiteral,
}

pub type MathResult<T> = Result<T, MathError>;

pub fn wad_unit() -> U256 {
    U256::exp10(WAD_DECIMALS)
}

pub fn ray_unit() -> U256 {
    U256::exp10(RAY_DECIMALS)
}

pub fn rad_unit() -> U256 {
    U256::exp10(RAD_DECIMALS)
}

/// 10^9, the gap between a wad and a ray.
pub fn billion() -> U256 {
    U256::exp10(RAY_DECIMALS - WAD_DECIMALS)
}

pub fn add(x: U256, y: U256) -> MathResult<U256> {
    x.checked_add(y).ok_or(MathError::Overflow)
}

pub fn sub(x: U256, y: U256) -> MathResult<U256> {
    x.checked_sub(y).ok_or(MathError::Underflow)
}

pub fn mul(x: U256, y: U256) -> MathResult<U256> {
    x.checked_mul(y).ok_or(MathError::Overflow)
}

pub fn div(x: U256, y: U256) -> MathResult<U256> {
    x.checked_div(y).ok_or(MathError::DivisionByZero)
}

pub fn wmul(x: U256, y: U256) -> MathResult<U256> {
    div(mul(x, y)?, wad_unit())
}

pub fn wdiv(x: U256, y: U256) -> MathResult<U256> {
    div(mul(x, wad_unit())?, y)
}

pub fn rmul(x: U256, y: U256) -> MathResult<U256> {
    div(mul(x, y)?, ray_unit())
}

pub fn rdiv(x: U256, y: U256) -> MathResult<U256> {
    div(mul(x, ray_unit())?, y)
}

/// `x^n` in fixed point with unit `base`, by repeated squaring.
///
/// Each intermediate product is rounded half up before rescaling, so the
/// result matches the on-chain `rpow` bit for bit. `rpow(0, 0) == base`.
pub fn rpow(x: U256, n: u64, base: U256) -> MathResult<U256> {
    if x.is_zero() {
        return Ok(if n == 0 { base } else { U256::zero() });
    }
    let half = base / 2;
    let mut z = if n % 2 == 0 { base } else { x };
    let mut x = x;
    let mut n = n / 2;
    while n > 0 {
        x = div(add(mul(x, x)?, half)?, base)?;
        if n % 2 == 1 {
            z = div(add(mul(z, x)?, half)?, base)?;
        }
        n /= 2;
    }
    Ok(z)
}

/// Converts a signed delta into its magnitude and sign.
fn split_signed(delta: i128) -> (bool, U256) {
    (delta < 0, U256::from(delta.unsigned_abs()))
}

/// Converts an unsigned quantity into a signed delta, failing above `i128::MAX`.
pub fn to_i128(value: U256) -> MathResult<i128> {
    if value > U256::from(i128::MAX as u128) {
        return Err(MathError::Overflow);
    }
    Ok(value.low_u128() as i128)
}

/// Negates a delta, failing on `i128::MIN`.
pub fn neg(delta: i128) -> MathResult<i128> {
    delta.checked_neg().ok_or(MathError::Overflow)
}

/// Signed difference `to - from`.
pub fn signed_diff(to: U256, from: U256) -> MathResult<i128> {
    if to >= from {
        to_i128(to - from)
    } else {
        neg(to_i128(from - to)?)
    }
}

/// Parses a decimal literal such as `"1.5"` into `decimals`-scaled units.
fn parse_units(literal: &str, decimals: usize) -> MathResult<U256> {
    let literal = literal.trim();
    let (int_part, frac_part) = match literal.split_once('.') {
        Some((i, f)) => (i, f),
        None => (literal, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(MathError::InvalidLiteral);
    }
    if frac_part.len() > decimals
        || !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(MathError::InvalidLiteral);
    }
    let int_value = if int_part.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(int_part).map_err(|_| MathError::InvalidLiteral)?
    };
    let frac_value = if frac_part.is_empty() {
        U256::zero()
    } else {
        let padded = format!("{frac_part:0<decimals$}");
        U256::from_dec_str(&padded).map_err(|_| MathError::InvalidLiteral)?
    };
    add(mul(int_value, U256::exp10(decimals))?, frac_value)
}

fn format_units(value: U256, decimals: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let unit = U256::exp10(decimals);
    let int_part = value / unit;
    let frac_part = value % unit;
    if frac_part.is_zero() {
        return write!(f, "{int_part}");
    }
    let digits = format!("{:0>width$}", frac_part.to_string(), width = decimals);
    write!(f, "{int_part}.{}", digits.trim_end_matches('0'))
}

macro_rules! fixed_point {
    ($(#[$doc:meta])* $name:ident, $decimals:expr) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub U256);

        impl $name {
            pub const DECIMALS: usize = $decimals;

            pub fn zero() -> Self {
                Self(U256::zero())
            }

            /// One whole unit (10^DECIMALS raw).
            pub fn one() -> Self {
                Self(U256::exp10($decimals))
            }

            pub fn from_raw(raw: impl Into<U256>) -> Self {
                Self(raw.into())
            }

            /// `n` whole units.
            pub fn units(n: u64) -> Self {
                Self(U256::from(n) * U256::exp10($decimals))
            }

            /// Parses a decimal literal in whole units, e.g. `"0.005"`.
            pub fn parse(literal: &str) -> MathResult<Self> {
                parse_units(literal, $decimals).map(Self)
            }

            pub fn raw(self) -> U256 {
                self.0
            }

            pub fn is_zero(self) -> bool {
                self.0.is_zero()
            }

            pub fn checked_add(self, other: Self) -> MathResult<Self> {
                add(self.0, other.0).map(Self)
            }

            pub fn checked_sub(self, other: Self) -> MathResult<Self> {
                sub(self.0, other.0).map(Self)
            }

            pub fn saturating_sub(self, other: Self) -> Self {
                Self(self.0.saturating_sub(other.0))
            }

            /// Applies a signed delta in the same scale.
            pub fn add_signed(self, delta: i128) -> MathResult<Self> {
                let (negative, magnitude) = split_signed(delta);
                if negative {
                    sub(self.0, magnitude).map(Self)
                } else {
                    add(self.0, magnitude).map(Self)
                }
            }

            pub fn to_i128(self) -> MathResult<i128> {
                to_i128(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                format_units(self.0, $decimals, f)
            }
        }
    };
}

fixed_point!(
    /// Token amount with 18 decimals.
    Wad,
    WAD_DECIMALS
);
fixed_point!(
    /// Rate or ratio with 27 decimals.
    Ray,
    RAY_DECIMALS
);
fixed_point!(
    /// Internal accounting quantity with 45 decimals (wad × ray).
    Rad,
    RAD_DECIMALS
);

impl Wad {
    /// Exact product with a ray, e.g. `art * rate` or `ink * spot`.
    pub fn mul_ray(self, ray: Ray) -> MathResult<Rad> {
        mul(self.0, ray.0).map(Rad)
    }

    /// Lifts a token amount into internal sikka (× 10^27).
    pub fn to_rad(self) -> MathResult<Rad> {
        mul(self.0, ray_unit()).map(Rad)
    }

    /// Lifts a wad price into ray precision (× 10^9).
    pub fn to_ray(self) -> MathResult<Ray> {
        mul(self.0, billion()).map(Ray)
    }

    pub fn wmul(self, other: Wad) -> MathResult<Wad> {
        wmul(self.0, other.0).map(Wad)
    }

    pub fn wdiv(self, other: Wad) -> MathResult<Wad> {
        wdiv(self.0, other.0).map(Wad)
    }
}

impl Ray {
    pub fn rmul(self, other: Ray) -> MathResult<Ray> {
        rmul(self.0, other.0).map(Ray)
    }

    pub fn rdiv(self, other: Ray) -> MathResult<Ray> {
        rdiv(self.0, other.0).map(Ray)
    }

    pub fn rpow(self, n: u64) -> MathResult<Ray> {
        rpow(self.0, n, ray_unit()).map(Ray)
    }

    /// Truncates to wad precision (÷ 10^9).
    pub fn to_wad(self) -> Wad {
        Wad(self.0 / billion())
    }
}

impl Rad {
    /// `self / ray`, flooring: e.g. `owe / price` yields a collateral amount.
    pub fn div_ray(self, ray: Ray) -> MathResult<Wad> {
        div(self.0, ray.0).map(Wad)
    }

    /// `self / wad`, flooring: e.g. debt per unit of collateral.
    pub fn div_wad(self, wad: Wad) -> MathResult<Ray> {
        div(self.0, wad.0).map(Ray)
    }

    /// `self * wad / WAD`, e.g. `tab * chop` or `tab * chip`.
    pub fn wmul(self, wad: Wad) -> MathResult<Rad> {
        wmul(self.0, wad.0).map(Rad)
    }

    /// Drops to token precision (÷ 10^27), flooring.
    pub fn to_wad(self) -> Wad {
        Wad(self.0 / ray_unit())
    }
}

/// A signed internal amount produced by multiplying a signed wad delta by a
/// rate: the sikka side of `frob`, `grab` and `fold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedRad {
    pub negative: bool,
    pub magnitude: Rad,
}

impl SignedRad {
    pub fn product(delta: i128, factor: U256) -> MathResult<Self> {
        let (negative, magnitude) = split_signed(delta);
        Ok(Self {
            negative,
            magnitude: Rad(mul(magnitude, factor)?),
        })
    }

    pub fn is_positive(&self) -> bool {
        !self.negative && !self.magnitude.is_zero()
    }

    /// `value + self`
    pub fn add_to(self, value: Rad) -> MathResult<Rad> {
        if self.negative {
            value.checked_sub(self.magnitude)
        } else {
            value.checked_add(self.magnitude)
        }
    }

    /// `value - self`
    pub fn sub_from(self, value: Rad) -> MathResult<Rad> {
        if self.negative {
            value.checked_add(self.magnitude)
        } else {
            value.checked_sub(self.magnitude)
        }
    }
}
