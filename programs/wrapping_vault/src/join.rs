//! Adapters between external token balances and the Vat's internal ledger.
//!
//! Each adapter validates the token side before touching the Vat, so that
//! once the Vat write succeeds the token write cannot fail.

use crate::token::{Token, TokenError};
use ledger_engine::{
    require, Address, Classify, ErrorKind, IlkId, MathError, Vat, VatError, Wad, Wards,
};
use serde::Serialize;
use thiserror::Error;

const GEM_JOIN: &str = "GemJoin";
const SIKKA_JOIN: &str = "SikkaJoin";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("{0}/not-authorized")]
    NotAuthorized(&'static str),
    #[error("{0}/not-live")]
    NotLive(&'static str),
    #[error("{0}/overflow")]
    Overflow(&'static str),
    #[error("{0}/wrong-token")]
    WrongToken(&'static str),
    #[error("{0}/miswired-vat")]
    MiswiredVat(&'static str),
    #[error(transparent)]
    Vat(#[from] VatError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Math(#[from] MathError),
}

impl Classify for JoinError {
    fn kind(&self) -> ErrorKind {
        match self {
            JoinError::NotAuthorized(_) => ErrorKind::Authorization,
            JoinError::NotLive(_) => ErrorKind::Lifecycle,
            JoinError::Overflow(_) => ErrorKind::Arithmetic,
            JoinError::WrongToken(_) | JoinError::MiswiredVat(_) => ErrorKind::Config,
            JoinError::Vat(e) => e.kind(),
            JoinError::Token(e) => e.kind(),
            JoinError::Math(e) => e.kind(),
        }
    }
}

/// Collateral adapter for one ilk.
#[derive(Debug, Clone, Serialize)]
pub struct GemJoin {
    address: Address,
    wards: Wards,
    vat: Address,
    ilk: IlkId,
    gem: Address,
    live: bool,
}

impl GemJoin {
    pub fn new(address: Address, deployer: Address, vat: Address, ilk: IlkId, gem: Address) -> Self {
        Self {
            address,
            wards: Wards::with(deployer),
            vat,
            ilk,
            gem,
            live: true,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn ilk(&self) -> IlkId {
        self.ilk
    }

    pub fn gem(&self) -> Address {
        self.gem
    }

    pub fn live(&self) -> bool {
        self.live
    }

    fn auth(&self, caller: &Address) -> Result<(), JoinError> {
        require!(self.wards.is_ward(caller), JoinError::NotAuthorized(GEM_JOIN));
        Ok(())
    }

    fn check_wiring(&self, vat: &Vat, gem: &Token) -> Result<(), JoinError> {
        require!(vat.address() == self.vat, JoinError::MiswiredVat(GEM_JOIN));
        require!(gem.address() == self.gem, JoinError::WrongToken(GEM_JOIN));
        Ok(())
    }

    pub fn rely(&mut self, caller: Address, usr: Address) -> Result<(), JoinError> {
        self.auth(&caller)?;
        self.wards.rely(usr);
        Ok(())
    }

    pub fn deny(&mut self, caller: Address, usr: Address) -> Result<(), JoinError> {
        self.auth(&caller)?;
        self.wards.deny(&usr);
        Ok(())
    }

    pub fn cage(&mut self, caller: Address) -> Result<(), JoinError> {
        self.auth(&caller)?;
        self.live = false;
        log::warn!("GemJoin {} caged", self.ilk);
        Ok(())
    }

    /// Pulls `wad` tokens from the caller and credits them to `usr` as
    /// unlocked collateral.
    pub fn join(
        &self,
        caller: Address,
        vat: &mut Vat,
        gem: &mut Token,
        usr: Address,
        wad: Wad,
    ) -> Result<(), JoinError> {
        self.auth(&caller)?;
        require!(self.live, JoinError::NotLive(GEM_JOIN));
        self.check_wiring(vat, gem)?;
        let amount = wad.to_i128().map_err(|_| JoinError::Overflow(GEM_JOIN))?;

        gem.ensure_transfer_from(self.address, caller, self.address, wad)?;
        vat.slip(self.address, self.ilk, usr, amount)?;
        gem.transfer_from(self.address, caller, self.address, wad)?;
        log::info!("✅ GemJoin {} join {wad} for {usr:?}", self.ilk);
        Ok(())
    }

    /// Debits the caller's unlocked collateral and sends `wad` tokens to `usr`.
    pub fn exit(
        &self,
        caller: Address,
        vat: &mut Vat,
        gem: &mut Token,
        usr: Address,
        wad: Wad,
    ) -> Result<(), JoinError> {
        self.auth(&caller)?;
        self.check_wiring(vat, gem)?;
        let amount = wad.to_i128().map_err(|_| JoinError::Overflow(GEM_JOIN))?;

        gem.ensure_transfer_from(self.address, self.address, usr, wad)?;
        vat.slip(self.address, self.ilk, caller, -amount)?;
        gem.transfer(self.address, usr, wad)?;
        log::info!("✅ GemJoin {} exit {wad} to {usr:?}", self.ilk);
        Ok(())
    }
}

/// Stablecoin adapter: burns tokens into internal sikka and mints them back out.
#[derive(Debug, Clone, Serialize)]
pub struct SikkaJoin {
    address: Address,
    wards: Wards,
    vat: Address,
    sikka: Address,
    live: bool,
}

impl SikkaJoin {
    pub fn new(address: Address, deployer: Address, vat: Address, sikka: Address) -> Self {
        Self {
            address,
            wards: Wards::with(deployer),
            vat,
            sikka,
            live: true,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sikka(&self) -> Address {
        self.sikka
    }

    pub fn wards(&self) -> &Wards {
        &self.wards
    }

    pub fn live(&self) -> bool {
        self.live
    }

    fn auth(&self, caller: &Address) -> Result<(), JoinError> {
        require!(self.wards.is_ward(caller), JoinError::NotAuthorized(SIKKA_JOIN));
        Ok(())
    }

    fn check_wiring(&self, vat: &Vat, sikka: &Token) -> Result<(), JoinError> {
        require!(vat.address() == self.vat, JoinError::MiswiredVat(SIKKA_JOIN));
        require!(sikka.address() == self.sikka, JoinError::WrongToken(SIKKA_JOIN));
        Ok(())
    }

    pub fn rely(&mut self, caller: Address, usr: Address) -> Result<(), JoinError> {
        self.auth(&caller)?;
        self.wards.rely(usr);
        Ok(())
    }

    pub fn deny(&mut self, caller: Address, usr: Address) -> Result<(), JoinError> {
        self.auth(&caller)?;
        self.wards.deny(&usr);
        Ok(())
    }

    pub fn cage(&mut self, caller: Address) -> Result<(), JoinError> {
        self.auth(&caller)?;
        self.live = false;
        log::warn!("SikkaJoin caged");
        Ok(())
    }

    /// Checks the Vat side of a `join` by `caller` of `wad`: authorization,
    /// wiring and the adapter's internal balance.
    pub fn ensure_join(&self, caller: Address, vat: &Vat, wad: Wad) -> Result<(), JoinError> {
        self.auth(&caller)?;
        require!(vat.address() == self.vat, JoinError::MiswiredVat(SIKKA_JOIN));
        let rad = wad.to_rad()?;
        vat.sikka(&self.address).checked_sub(rad)?;
        Ok(())
    }

    /// Burns `wad` tokens from the caller and credits `usr` with the same
    /// amount of internal sikka.
    pub fn join(
        &self,
        caller: Address,
        vat: &mut Vat,
        sikka: &mut Token,
        usr: Address,
        wad: Wad,
    ) -> Result<(), JoinError> {
        self.auth(&caller)?;
        self.check_wiring(vat, sikka)?;
        let rad = wad.to_rad()?;

        sikka.ensure_burn(self.address, caller, wad)?;
        vat.move_sikka(self.address, self.address, usr, rad)?;
        sikka.burn(self.address, caller, wad)?;
        log::info!("✅ SikkaJoin join {wad} for {usr:?}");
        Ok(())
    }

    /// Takes `wad` of internal sikka from the caller and mints tokens to `usr`.
    /// The caller must have `hope`d this adapter in the Vat.
    pub fn exit(
        &self,
        caller: Address,
        vat: &mut Vat,
        sikka: &mut Token,
        usr: Address,
        wad: Wad,
    ) -> Result<(), JoinError> {
        self.auth(&caller)?;
        require!(self.live, JoinError::NotLive(SIKKA_JOIN));
        self.check_wiring(vat, sikka)?;
        let rad = wad.to_rad()?;

        sikka.ensure_mint(self.address, usr, wad)?;
        vat.move_sikka(self.address, caller, self.address, rad)?;
        sikka.mint(self.address, usr, wad)?;
        log::info!("✅ SikkaJoin exit {wad} to {usr:?}");
        Ok(())
    }
}
