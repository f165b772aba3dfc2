//! Price-decay curves for collateral auctions.

use ledger_engine::math::{div, mul, ray_unit};
use ledger_engine::{require, Address, Classify, ErrorKind, MathError, MathResult, Ray, Wards, U256};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbacusError {
    #[error("{0}/not-authorized")]
    NotAuthorized(&'static str),
    #[error("{0}/file-unrecognized-param")]
    UnrecognizedParam(&'static str),
    #[error("{0}/cut-gt-RAY")]
    CutAboveOne(&'static str),
    #[error(transparent)]
    Math(#[from] MathError),
}

impl Classify for AbacusError {
    fn kind(&self) -> ErrorKind {
        match self {
            AbacusError::NotAuthorized(_) => ErrorKind::Authorization,
            AbacusError::UnrecognizedParam(_) | AbacusError::CutAboveOne(_) => ErrorKind::Config,
            AbacusError::Math(e) => e.kind(),
        }
    }
}

/// Auction price as a function of the starting price and the time elapsed.
/// Implementations must be non-increasing in `dur`.
pub trait Abacus: fmt::Debug + Send + Sync {
    fn price(&self, top: Ray, dur: u64) -> MathResult<Ray>;

    fn file(&mut self, caller: Address, what: &str, data: U256) -> Result<(), AbacusError>;

    fn address(&self) -> Address;

    fn clone_box(&self) -> Box<dyn Abacus>;
}

impl Clone for Box<dyn Abacus> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

fn to_seconds(data: U256) -> Result<u64, MathError> {
    require!(data <= U256::from(u64::MAX), MathError::Overflow);
    Ok(data.low_u64())
}

/// Linear decline to zero over `tau` seconds.
#[derive(Debug, Clone)]
pub struct LinearDecrease {
    address: Address,
    wards: Wards,
    tau: u64,
}

impl LinearDecrease {
    const NAME: &'static str = "LinearDecrease";

    pub fn new(address: Address, deployer: Address) -> Self {
        Self {
            address,
            wards: Wards::with(deployer),
            tau: 0,
        }
    }

    pub fn tau(&self) -> u64 {
        self.tau
    }
}

impl Abacus for LinearDecrease {
    fn price(&self, top: Ray, dur: u64) -> MathResult<Ray> {
        if dur >= self.tau {
            return Ok(Ray::zero());
        }
        let remaining = div(mul(U256::from(self.tau - dur), ray_unit())?, U256::from(self.tau))?;
        top.rmul(Ray(remaining))
    }

    fn file(&mut self, caller: Address, what: &str, data: U256) -> Result<(), AbacusError> {
        require!(self.wards.is_ward(&caller), AbacusError::NotAuthorized(Self::NAME));
        match what {
            "tau" => self.tau = to_seconds(data)?,
            _ => return Err(AbacusError::UnrecognizedParam(Self::NAME)),
        }
        Ok(())
    }

    fn address(&self) -> Address {
        self.address
    }

    fn clone_box(&self) -> Box<dyn Abacus> {
        Box::new(self.clone())
    }
}

/// Multiplies the price by `cut` once every `step` seconds.
#[derive(Debug, Clone)]
pub struct StairstepExponentialDecrease {
    address: Address,
    wards: Wards,
    step: u64,
    cut: Ray,
}

impl StairstepExponentialDecrease {
    const NAME: &'static str = "StairstepExponentialDecrease";

    pub fn new(address: Address, deployer: Address) -> Self {
        Self {
            address,
            wards: Wards::with(deployer),
            step: 0,
            cut: Ray::zero(),
        }
    }
}

impl Abacus for StairstepExponentialDecrease {
    fn price(&self, top: Ray, dur: u64) -> MathResult<Ray> {
        let steps = dur.checked_div(self.step).ok_or(MathError::DivisionByZero)?;
        top.rmul(self.cut.rpow(steps)?)
    }

    fn file(&mut self, caller: Address, what: &str, data: U256) -> Result<(), AbacusError> {
        require!(self.wards.is_ward(&caller), AbacusError::NotAuthorized(Self::NAME));
        match what {
            "cut" => {
                require!(Ray(data) <= Ray::one(), AbacusError::CutAboveOne(Self::NAME));
                self.cut = Ray(data);
            }
            "step" => self.step = to_seconds(data)?,
            _ => return Err(AbacusError::UnrecognizedParam(Self::NAME)),
        }
        Ok(())
    }

    fn address(&self) -> Address {
        self.address
    }

    fn clone_box(&self) -> Box<dyn Abacus> {
        Box::new(self.clone())
    }
}

/// Multiplies the price by `cut` every second.
#[derive(Debug, Clone)]
pub struct ExponentialDecrease {
    address: Address,
    wards: Wards,
    cut: Ray,
}

impl ExponentialDecrease {
    const NAME: &'static str = "ExponentialDecrease";

    pub fn new(address: Address, deployer: Address) -> Self {
        Self {
            address,
            wards: Wards::with(deployer),
            cut: Ray::zero(),
        }
    }
}

impl Abacus for ExponentialDecrease {
    fn price(&self, top: Ray, dur: u64) -> MathResult<Ray> {
        top.rmul(self.cut.rpow(dur)?)
    }

    fn file(&mut self, caller: Address, what: &str, data: U256) -> Result<(), AbacusError> {
        require!(self.wards.is_ward(&caller), AbacusError::NotAuthorized(Self::NAME));
        match what {
            "cut" => {
                require!(Ray(data) <= Ray::one(), AbacusError::CutAboveOne(Self::NAME));
                self.cut = Ray(data);
            }
            _ => return Err(AbacusError::UnrecognizedParam(Self::NAME)),
        }
        Ok(())
    }

    fn address(&self) -> Address {
        self.address
    }

    fn clone_box(&self) -> Box<dyn Abacus> {
        Box::new(self.clone())
    }
}
