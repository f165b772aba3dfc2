//! The Dog: starts liquidations of unsafe vaults, bounded by a global and a
//! per-ilk budget of debt (plus penalty) that may be in auction at once.

use crate::clipper::{Clipper, ClipperError};
use ledger_engine::math::{div, mul, neg, wad_unit};
use ledger_engine::{
    require, Address, Classify, ErrorKind, IlkId, MathError, Rad, SaleId, Timestamp, Vat, VatError,
    Wad, Wards, U256,
};
use oracle_framework::Spotter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DogError {
    #[error("Dog/not-authorized")]
    NotAuthorized,
    #[error("Dog/not-live")]
    NotLive,
    #[error("Dog/no-clipper")]
    NoClipper,
    #[error("Dog/not-unsafe")]
    NotUnsafe,
    #[error("Dog/liquidation-limit-hit")]
    LiquidationLimitHit,
    #[error("Dog/dusty-auction-from-partial-liquidation")]
    DustyAuctionFromPartialLiquidation,
    #[error("Dog/null-auction")]
    NullAuction,
    #[error("Dog/overflow")]
    Overflow,
    #[error("Dog/file-chop-lt-WAD")]
    ChopBelowOne,
    #[error("Dog/file-ilk-neq-clip-ilk")]
    IlkMismatch,
    #[error("Dog/file-unrecognized-param")]
    UnrecognizedParam,
    #[error("Dog/miswired-{0}")]
    Miswired(&'static str),
    #[error(transparent)]
    Vat(#[from] VatError),
    #[error(transparent)]
    Clipper(#[from] ClipperError),
    #[error(transparent)]
    Math(#[from] MathError),
}

impl Classify for DogError {
    fn kind(&self) -> ErrorKind {
        match self {
            DogError::NotAuthorized => ErrorKind::Authorization,
            DogError::NotLive => ErrorKind::Lifecycle,
            DogError::NotUnsafe => ErrorKind::Solvency,
            DogError::LiquidationLimitHit | DogError::DustyAuctionFromPartialLiquidation => {
                ErrorKind::Budget
            }
            DogError::NullAuction => ErrorKind::AuctionState,
            DogError::NoClipper
            | DogError::ChopBelowOne
            | DogError::IlkMismatch
            | DogError::UnrecognizedParam
            | DogError::Miswired(_) => ErrorKind::Config,
            DogError::Overflow => ErrorKind::Arithmetic,
            DogError::Vat(e) => e.kind(),
            DogError::Clipper(e) => e.kind(),
            DogError::Math(e) => e.kind(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DogIlk {
    /// Auction house for the ilk.
    pub clip: Address,
    /// Liquidation penalty multiplier.
    pub chop: Wad,
    /// Max debt plus penalty in auction for the ilk.
    pub hole: Rad,
    /// Debt plus penalty currently in auction for the ilk.
    pub dirt: Rad,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum DogEvent {
    Bark {
        ilk: IlkId,
        urn: Address,
        ink: Wad,
        art: Wad,
        due: Rad,
        clip: Address,
        id: SaleId,
    },
    Digs {
        ilk: IlkId,
        rad: Rad,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Dog {
    address: Address,
    wards: Wards,
    vat: Address,
    ilks: BTreeMap<IlkId, DogIlk>,
    vow: Address,
    live: bool,
    /// Max debt plus penalty in auction across all ilks.
    global_hole: Rad,
    /// Debt plus penalty currently in auction across all ilks.
    global_dirt: Rad,
    #[serde(skip)]
    events: Vec<DogEvent>,
}

impl Dog {
    pub fn new(address: Address, deployer: Address, vat: Address) -> Self {
        Self {
            address,
            wards: Wards::with(deployer),
            vat,
            ilks: BTreeMap::new(),
            vow: Address::zero(),
            live: true,
            global_hole: Rad::zero(),
            global_dirt: Rad::zero(),
            events: Vec::new(),
        }
    }

    // --- Views ---

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn wards(&self) -> &Wards {
        &self.wards
    }

    pub fn live(&self) -> bool {
        self.live
    }

    pub fn vow(&self) -> Address {
        self.vow
    }

    pub fn global_hole(&self) -> Rad {
        self.global_hole
    }

    pub fn global_dirt(&self) -> Rad {
        self.global_dirt
    }

    pub fn ilk(&self, ilk: &IlkId) -> DogIlk {
        self.ilks.get(ilk).copied().unwrap_or_default()
    }

    pub fn chop(&self, ilk: &IlkId) -> Wad {
        self.ilk(ilk).chop
    }

    pub fn take_events(&mut self) -> Vec<DogEvent> {
        std::mem::take(&mut self.events)
    }

    // --- Administration ---

    fn auth(&self, caller: &Address) -> Result<(), DogError> {
        require!(self.wards.is_ward(caller), DogError::NotAuthorized);
        Ok(())
    }

    pub fn rely(&mut self, caller: Address, usr: Address) -> Result<(), DogError> {
        self.auth(&caller)?;
        self.wards.rely(usr);
        Ok(())
    }

    pub fn deny(&mut self, caller: Address, usr: Address) -> Result<(), DogError> {
        self.auth(&caller)?;
        self.wards.deny(&usr);
        Ok(())
    }

    /// Recognised: `Hole` (rad).
    pub fn file(&mut self, caller: Address, what: &str, data: U256) -> Result<(), DogError> {
        self.auth(&caller)?;
        match what {
            "Hole" => self.global_hole = Rad(data),
            _ => return Err(DogError::UnrecognizedParam),
        }
        log::debug!("Dog file {what} = {data}");
        Ok(())
    }

    /// Recognised: `vow`.
    pub fn file_addr(&mut self, caller: Address, what: &str, data: Address) -> Result<(), DogError> {
        self.auth(&caller)?;
        match what {
            "vow" => self.vow = data,
            _ => return Err(DogError::UnrecognizedParam),
        }
        log::debug!("Dog file {what} = {data:?}");
        Ok(())
    }

    /// Recognised: `chop` (wad, at least one), `hole` (rad).
    pub fn file_ilk(
        &mut self,
        caller: Address,
        ilk: IlkId,
        what: &str,
        data: U256,
    ) -> Result<(), DogError> {
        self.auth(&caller)?;
        match what {
            "chop" => {
                require!(Wad(data) >= Wad::one(), DogError::ChopBelowOne);
                self.ilks.entry(ilk).or_default().chop = Wad(data);
            }
            "hole" => self.ilks.entry(ilk).or_default().hole = Rad(data),
            _ => return Err(DogError::UnrecognizedParam),
        }
        log::debug!("Dog file {ilk}.{what} = {data}");
        Ok(())
    }

    /// Recognised: `clip`. The Clipper must auction the same ilk.
    pub fn file_clip(
        &mut self,
        caller: Address,
        ilk: IlkId,
        what: &str,
        clipper: &Clipper,
    ) -> Result<(), DogError> {
        self.auth(&caller)?;
        require!(what == "clip", DogError::UnrecognizedParam);
        require!(clipper.ilk() == ilk, DogError::IlkMismatch);
        self.ilks.entry(ilk).or_default().clip = clipper.address();
        log::debug!("Dog file {ilk}.clip = {:?}", clipper.address());
        Ok(())
    }

    pub fn cage(&mut self, caller: Address) -> Result<(), DogError> {
        self.auth(&caller)?;
        self.live = false;
        log::warn!("🛑 Dog caged");
        Ok(())
    }

    // --- Liquidation ---

    /// Liquidates the unsafe vault `(ilk, urn)`, wholly or partially
    /// depending on the remaining budget, and starts an auction for the
    /// seized collateral. `kpr` receives the keeper incentive.
    #[allow(clippy::too_many_arguments)]
    pub fn bark(
        &mut self,
        vat: &mut Vat,
        clipper: &mut Clipper,
        spotter: &Spotter,
        now: Timestamp,
        ilk: IlkId,
        urn: Address,
        kpr: Address,
    ) -> Result<SaleId, DogError> {
        require!(self.live, DogError::NotLive);
        require!(vat.address() == self.vat, DogError::Miswired("vat"));
        let milk = self.ilk(&ilk);
        require!(!milk.clip.is_zero(), DogError::NoClipper);
        require!(clipper.address() == milk.clip, DogError::Miswired("clip"));

        let vilk = vat.ilk(&ilk);
        let position = vat.urn(&ilk, &urn);
        require!(
            !vilk.spot.is_zero() && position.is_unsafe(&vilk)?,
            DogError::NotUnsafe
        );

        require!(
            self.global_hole > self.global_dirt && milk.hole > milk.dirt,
            DogError::LiquidationLimitHit
        );
        let room = self
            .global_hole
            .checked_sub(self.global_dirt)?
            .min(milk.hole.checked_sub(milk.dirt)?);

        // Largest debt whose liquidation, penalty included, fits the room.
        let budget = div(div(mul(room.raw(), wad_unit())?, vilk.rate.raw())?, milk.chop.raw())?;
        let mut dart = position.art.min(Wad(budget));
        if position.art > dart {
            if position.art.checked_sub(dart)?.mul_ray(vilk.rate)? < vilk.dust {
                dart = position.art;
            } else {
                require!(
                    dart.mul_ray(vilk.rate)? >= vilk.dust,
                    DogError::DustyAuctionFromPartialLiquidation
                );
            }
        }

        let dink = Wad(div(mul(position.ink.raw(), dart.raw())?, position.art.raw())?);
        require!(!dink.is_zero(), DogError::NullAuction);
        let dink_delta = dink.to_i128().map_err(|_| DogError::Overflow)?;
        let dart_delta = dart.to_i128().map_err(|_| DogError::Overflow)?;

        let due = dart.mul_ray(vilk.rate)?;
        let tab = due.wmul(milk.chop)?;
        let global_dirt = self.global_dirt.checked_add(tab)?;
        let dirt = milk.dirt.checked_add(tab)?;

        clipper.plan_kick(self.address, vat, spotter, tab, dink, urn)?;
        vat.grab(
            self.address,
            ilk,
            urn,
            milk.clip,
            self.vow,
            neg(dink_delta)?,
            neg(dart_delta)?,
        )?;
        self.global_dirt = global_dirt;
        self.ilks.entry(ilk).or_default().dirt = dirt;

        let id = clipper.kick(self.address, vat, spotter, now, tab, dink, urn, kpr)?;

        self.events.push(DogEvent::Bark {
            ilk,
            urn,
            ink: dink,
            art: dart,
            due,
            clip: milk.clip,
            id,
        });
        log::info!("⚡ Dog bark {ilk} {urn:?}: ink={dink} art={dart} tab={tab} sale #{id}");
        Ok(id)
    }

    fn plan_digs(&self, caller: &Address, ilk: &IlkId, rad: Rad) -> Result<(Rad, Rad), DogError> {
        self.auth(caller)?;
        Ok((
            self.global_dirt.checked_sub(rad)?,
            self.ilk(ilk).dirt.checked_sub(rad)?,
        ))
    }

    /// Fails exactly when `digs` with the same arguments would.
    pub fn ensure_digs(&self, caller: Address, ilk: &IlkId, rad: Rad) -> Result<(), DogError> {
        self.plan_digs(&caller, ilk, rad).map(|_| ())
    }

    /// Releases `rad` of liquidation budget once an auction has raised it.
    pub fn digs(&mut self, caller: Address, ilk: IlkId, rad: Rad) -> Result<(), DogError> {
        let (global_dirt, dirt) = self.plan_digs(&caller, &ilk, rad)?;
        self.global_dirt = global_dirt;
        self.ilks.entry(ilk).or_default().dirt = dirt;
        self.events.push(DogEvent::Digs { ilk, rad });
        log::debug!("Dog digs {ilk} {rad}");
        Ok(())
    }
}
