//! The Jug: per-ilk stability fee accrual.
//!
//! Each ilk compounds at `base + duty` per second. `drip` folds the growth
//! since the last call into the Vat's `rate` and credits the fee to the Vow.

use ledger_engine::math::signed_diff;
use ledger_engine::{
    require, Address, Classify, ErrorKind, IlkId, MathError, Ray, Timestamp, Vat, VatError,
    Wards, U256,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JugError {
    #[error("Jug/not-authorized")]
    NotAuthorized,
    #[error("Jug/ilk-already-init")]
    IlkAlreadyInit,
    #[error("Jug/ilk-not-init")]
    IlkNotInit,
    #[error("Jug/invalid-now")]
    InvalidNow,
    #[error("Jug/rho-not-updated")]
    RhoNotUpdated,
    #[error("Jug/duty-lt-ONE")]
    DutyBelowOne,
    #[error("Jug/file-unrecognized-param")]
    UnrecognizedParam,
    #[error(transparent)]
    Vat(#[from] VatError),
    #[error(transparent)]
    Math(#[from] MathError),
}

impl Classify for JugError {
    fn kind(&self) -> ErrorKind {
        match self {
            JugError::NotAuthorized => ErrorKind::Authorization,
            JugError::IlkAlreadyInit | JugError::IlkNotInit | JugError::InvalidNow => {
                ErrorKind::Lifecycle
            }
            JugError::RhoNotUpdated | JugError::DutyBelowOne | JugError::UnrecognizedParam => {
                ErrorKind::Config
            }
            JugError::Vat(e) => e.kind(),
            JugError::Math(e) => e.kind(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JugIlk {
    /// Per-second fee on top of `base`.
    pub duty: Ray,
    /// Time of the last drip.
    pub rho: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Drip {
    pub ilk: IlkId,
    pub rate: Ray,
    pub delta: i128,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct Jug {
    address: Address,
    wards: Wards,
    ilks: BTreeMap<IlkId, JugIlk>,
    vow: Address,
    base: Ray,
    #[serde(skip)]
    events: Vec<Drip>,
}

impl Jug {
    pub fn new(address: Address, deployer: Address) -> Self {
        Self {
            address,
            wards: Wards::with(deployer),
            ilks: BTreeMap::new(),
            vow: Address::zero(),
            base: Ray::zero(),
            events: Vec::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn wards(&self) -> &Wards {
        &self.wards
    }

    pub fn vow(&self) -> Address {
        self.vow
    }

    pub fn base(&self) -> Ray {
        self.base
    }

    pub fn ilk(&self, ilk: &IlkId) -> Option<JugIlk> {
        self.ilks.get(ilk).copied()
    }

    fn auth(&self, caller: &Address) -> Result<(), JugError> {
        require!(self.wards.is_ward(caller), JugError::NotAuthorized);
        Ok(())
    }

    pub fn rely(&mut self, caller: Address, usr: Address) -> Result<(), JugError> {
        self.auth(&caller)?;
        self.wards.rely(usr);
        Ok(())
    }

    pub fn deny(&mut self, caller: Address, usr: Address) -> Result<(), JugError> {
        self.auth(&caller)?;
        self.wards.deny(&usr);
        Ok(())
    }

    pub fn init(&mut self, caller: Address, now: Timestamp, ilk: IlkId) -> Result<(), JugError> {
        self.auth(&caller)?;
        require!(!self.ilks.contains_key(&ilk), JugError::IlkAlreadyInit);
        self.ilks.insert(ilk, JugIlk { duty: Ray::one(), rho: now });
        log::info!("✅ Jug ilk {ilk} initialized at {now}");
        Ok(())
    }

    /// Per-ilk parameters. Recognised: `duty` (ray, at least one), which may
    /// only change right after a drip so that past time accrues at the old rate.
    pub fn file_ilk(
        &mut self,
        caller: Address,
        now: Timestamp,
        ilk: IlkId,
        what: &str,
        data: U256,
    ) -> Result<(), JugError> {
        self.auth(&caller)?;
        let entry = self.ilks.get_mut(&ilk).ok_or(JugError::IlkNotInit)?;
        require!(now == entry.rho, JugError::RhoNotUpdated);
        match what {
            "duty" => {
                require!(Ray(data) >= Ray::one(), JugError::DutyBelowOne);
                entry.duty = Ray(data);
            }
            _ => return Err(JugError::UnrecognizedParam),
        }
        log::debug!("Jug file {ilk}.{what} = {data}");
        Ok(())
    }

    /// Global parameters. Recognised: `base` (ray).
    pub fn file(&mut self, caller: Address, what: &str, data: U256) -> Result<(), JugError> {
        self.auth(&caller)?;
        match what {
            "base" => self.base = Ray(data),
            _ => return Err(JugError::UnrecognizedParam),
        }
        log::debug!("Jug file {what} = {data}");
        Ok(())
    }

    /// Address parameters. Recognised: `vow`.
    pub fn file_addr(&mut self, caller: Address, what: &str, data: Address) -> Result<(), JugError> {
        self.auth(&caller)?;
        match what {
            "vow" => self.vow = data,
            _ => return Err(JugError::UnrecognizedParam),
        }
        log::debug!("Jug file {what} = {data:?}");
        Ok(())
    }

    /// Accrues fees for `ilk` up to `now` and returns the new rate.
    /// Calling twice in the same second changes nothing the second time.
    pub fn drip(&mut self, vat: &mut Vat, now: Timestamp, ilk: IlkId) -> Result<Ray, JugError> {
        let entry = self.ilks.get(&ilk).copied().ok_or(JugError::IlkNotInit)?;
        require!(now >= entry.rho, JugError::InvalidNow);
        let prev = vat.ilk(&ilk).rate;
        require!(!prev.is_zero(), VatError::IlkNotInit);

        let rate = self
            .base
            .checked_add(entry.duty)?
            .rpow(now - entry.rho)?
            .rmul(prev)?;
        let delta = signed_diff(rate.raw(), prev.raw())?;
        vat.fold(self.address, ilk, self.vow, delta)?;

        if let Some(entry) = self.ilks.get_mut(&ilk) {
            entry.rho = now;
        }
        self.events.push(Drip {
            ilk,
            rate,
            delta,
            timestamp: now,
        });
        log::info!("✅ Jug drip {ilk}: rate={rate} (+{delta})");
        Ok(rate)
    }

    pub fn take_events(&mut self) -> Vec<Drip> {
        std::mem::take(&mut self.events)
    }
}
