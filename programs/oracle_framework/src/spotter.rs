use crate::feed::PriceFeed;
use ledger_engine::{
    require, Address, Classify, ErrorKind, IlkId, MathError, Ray, Vat, VatError, Wad, Wards, U256,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpotterError {
    #[error("Spotter/not-authorized")]
    NotAuthorized,
    #[error("Spotter/not-live")]
    NotLive,
    #[error("Spotter/file-unrecognized-param")]
    UnrecognizedParam,
    #[error("Spotter/no-pip")]
    NoPriceFeed,
    #[error("Spotter/miswired-vat")]
    MiswiredVat,
    #[error(transparent)]
    Vat(#[from] VatError),
    #[error(transparent)]
    Math(#[from] MathError),
}

impl Classify for SpotterError {
    fn kind(&self) -> ErrorKind {
        match self {
            SpotterError::NotAuthorized => ErrorKind::Authorization,
            SpotterError::NotLive => ErrorKind::Lifecycle,
            SpotterError::UnrecognizedParam
            | SpotterError::NoPriceFeed
            | SpotterError::MiswiredVat => ErrorKind::Config,
            SpotterError::Vat(e) => e.kind(),
            SpotterError::Math(e) => e.kind(),
        }
    }
}

/// Recorded on every `poke`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Poke {
    pub ilk: IlkId,
    pub val: Option<Wad>,
    pub spot: Ray,
}

#[derive(Debug, Clone, Default)]
pub struct SpotIlk {
    pub pip: Option<Arc<dyn PriceFeed>>,
    /// Liquidation ratio.
    pub mat: Ray,
}

/// Publishes risk-adjusted collateral prices into the Vat.
#[derive(Debug, Clone)]
pub struct Spotter {
    address: Address,
    wards: Wards,
    vat: Address,
    ilks: BTreeMap<IlkId, SpotIlk>,
    par: Ray,
    live: bool,
    events: Vec<Poke>,
}

impl Spotter {
    pub fn new(address: Address, deployer: Address, vat: Address) -> Self {
        Self {
            address,
            wards: Wards::with(deployer),
            vat,
            ilks: BTreeMap::new(),
            par: Ray::one(),
            live: true,
            events: Vec::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn wards(&self) -> &Wards {
        &self.wards
    }

    pub fn live(&self) -> bool {
        self.live
    }

    /// Value of the reference unit in which prices are expressed.
    pub fn par(&self) -> Ray {
        self.par
    }

    pub fn mat(&self, ilk: &IlkId) -> Ray {
        self.ilks.get(ilk).map(|i| i.mat).unwrap_or_default()
    }

    pub fn pip(&self, ilk: &IlkId) -> Option<&Arc<dyn PriceFeed>> {
        self.ilks.get(ilk).and_then(|i| i.pip.as_ref())
    }

    /// Current feed value for `ilk`, if the feed is set and has one.
    pub fn peek(&self, ilk: &IlkId) -> Option<Wad> {
        self.pip(ilk).and_then(|pip| pip.peek())
    }

    fn auth(&self, caller: &Address) -> Result<(), SpotterError> {
        require!(self.wards.is_ward(caller), SpotterError::NotAuthorized);
        Ok(())
    }

    pub fn rely(&mut self, caller: Address, usr: Address) -> Result<(), SpotterError> {
        self.auth(&caller)?;
        self.wards.rely(usr);
        Ok(())
    }

    pub fn deny(&mut self, caller: Address, usr: Address) -> Result<(), SpotterError> {
        self.auth(&caller)?;
        self.wards.deny(&usr);
        Ok(())
    }

    pub fn file_pip(
        &mut self,
        caller: Address,
        ilk: IlkId,
        what: &str,
        pip: Arc<dyn PriceFeed>,
    ) -> Result<(), SpotterError> {
        self.auth(&caller)?;
        require!(self.live, SpotterError::NotLive);
        require!(what == "pip", SpotterError::UnrecognizedParam);
        self.ilks.entry(ilk).or_default().pip = Some(pip);
        log::debug!("Spotter file {ilk}.pip");
        Ok(())
    }

    pub fn file(&mut self, caller: Address, what: &str, data: U256) -> Result<(), SpotterError> {
        self.auth(&caller)?;
        require!(self.live, SpotterError::NotLive);
        match what {
            "par" => self.par = Ray(data),
            _ => return Err(SpotterError::UnrecognizedParam),
        }
        log::debug!("Spotter file {what} = {data}");
        Ok(())
    }

    pub fn file_ilk(
        &mut self,
        caller: Address,
        ilk: IlkId,
        what: &str,
        data: U256,
    ) -> Result<(), SpotterError> {
        self.auth(&caller)?;
        require!(self.live, SpotterError::NotLive);
        match what {
            "mat" => self.ilks.entry(ilk).or_default().mat = Ray(data),
            _ => return Err(SpotterError::UnrecognizedParam),
        }
        log::debug!("Spotter file {ilk}.{what} = {data}");
        Ok(())
    }

    pub fn cage(&mut self, caller: Address) -> Result<(), SpotterError> {
        self.auth(&caller)?;
        self.live = false;
        log::warn!("Spotter caged");
        Ok(())
    }

    /// Reads the feed and writes `spot = val / par / mat` into the Vat,
    /// or zero when the feed has no value.
    pub fn poke(&mut self, vat: &mut Vat, ilk: IlkId) -> Result<Ray, SpotterError> {
        require!(vat.address() == self.vat, SpotterError::MiswiredVat);
        let spot_ilk = self.ilks.get(&ilk).ok_or(SpotterError::NoPriceFeed)?;
        let pip = spot_ilk.pip.as_ref().ok_or(SpotterError::NoPriceFeed)?;

        let val = pip.peek();
        let spot = match val {
            Some(val) => val.to_ray()?.rdiv(self.par)?.rdiv(spot_ilk.mat)?,
            None => Ray::zero(),
        };
        vat.file_ilk(self.address, ilk, "spot", spot.raw())?;

        self.events.push(Poke { ilk, val, spot });
        log::info!("✅ Spotter poke {ilk}: val={val:?} spot={spot}");
        Ok(spot)
    }

    pub fn take_events(&mut self) -> Vec<Poke> {
        std::mem::take(&mut self.events)
    }
}
