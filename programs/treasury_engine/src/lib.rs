//! The Vow: system balance sheet. It receives stability fees and auction
//! proceeds as surplus, carries liquidated debt as `sin`, cancels the two
//! against each other and sends excess surplus out to the multisig.

use ledger_engine::{
    require, Address, Classify, ErrorKind, MathError, Rad, Vat, VatError, Wad, Wards, U256,
};
use serde::Serialize;
use thiserror::Error;
use wrapping_vault::{JoinError, SikkaJoin, Token, TokenError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VowError {
    #[error("Vow/not-authorized")]
    NotAuthorized,
    #[error("Vow/not-live")]
    NotLive,
    #[error("Vow/insufficient-surplus")]
    InsufficientSurplus,
    #[error("Vow/insufficient-debt")]
    InsufficientDebt,
    #[error("Vow/debt-not-zero")]
    DebtNotZero,
    #[error("Vow/file-unrecognized-param")]
    UnrecognizedParam,
    #[error("Vow/miswired-{0}")]
    Miswired(&'static str),
    #[error(transparent)]
    Vat(#[from] VatError),
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Math(#[from] MathError),
}

impl Classify for VowError {
    fn kind(&self) -> ErrorKind {
        match self {
            VowError::NotAuthorized => ErrorKind::Authorization,
            VowError::NotLive => ErrorKind::Lifecycle,
            VowError::InsufficientSurplus | VowError::InsufficientDebt | VowError::DebtNotZero => {
                ErrorKind::Solvency
            }
            VowError::UnrecognizedParam | VowError::Miswired(_) => ErrorKind::Config,
            VowError::Vat(e) => e.kind(),
            VowError::Join(e) => e.kind(),
            VowError::Token(e) => e.kind(),
            VowError::Math(e) => e.kind(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Vow {
    address: Address,
    wards: Wards,
    vat: Address,
    multisig: Address,
    sikka_join: Address,
    sikka: Address,
    /// Surplus buffer kept back by `flap`.
    hump: Rad,
    live: bool,
}

impl Vow {
    /// Deploys the Vow and lets `sikka_join` pull its internal sikka.
    pub fn new(
        address: Address,
        deployer: Address,
        vat: &mut Vat,
        sikka_join: Address,
        multisig: Address,
    ) -> Self {
        vat.hope(address, sikka_join);
        log::info!("✅ Vow initialized with multisig: {multisig:?}");
        Self {
            address,
            wards: Wards::with(deployer),
            vat: vat.address(),
            multisig,
            sikka_join,
            sikka: Address::zero(),
            hump: Rad::zero(),
            live: true,
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

    pub fn hump(&self) -> Rad {
        self.hump
    }

    pub fn multisig(&self) -> Address {
        self.multisig
    }

    pub fn sikka_join(&self) -> Address {
        self.sikka_join
    }

    pub fn sikka(&self) -> Address {
        self.sikka
    }

    pub fn vat(&self) -> Address {
        self.vat
    }

    fn auth(&self, caller: &Address) -> Result<(), VowError> {
        require!(self.wards.is_ward(caller), VowError::NotAuthorized);
        Ok(())
    }

    fn check_vat(&self, vat: &Vat) -> Result<(), VowError> {
        require!(vat.address() == self.vat, VowError::Miswired("vat"));
        Ok(())
    }

    fn check_join(&self, join: &SikkaJoin, sikka: &Token) -> Result<(), VowError> {
        require!(join.address() == self.sikka_join, VowError::Miswired("sikkajoin"));
        require!(sikka.address() == self.sikka, VowError::Miswired("sikka"));
        Ok(())
    }

    pub fn rely(&mut self, caller: Address, usr: Address) -> Result<(), VowError> {
        self.auth(&caller)?;
        require!(self.live, VowError::NotLive);
        self.wards.rely(usr);
        Ok(())
    }

    pub fn deny(&mut self, caller: Address, usr: Address) -> Result<(), VowError> {
        self.auth(&caller)?;
        self.wards.deny(&usr);
        Ok(())
    }

    /// Recognised: `hump` (rad).
    pub fn file(&mut self, caller: Address, what: &str, data: U256) -> Result<(), VowError> {
        self.auth(&caller)?;
        match what {
            "hump" => self.hump = Rad(data),
            _ => return Err(VowError::UnrecognizedParam),
        }
        log::debug!("Vow file {what} = {data}");
        Ok(())
    }

    /// Recognised: `multisig`, `sikkajoin`, `sikka`, `vat`. Replacing the join
    /// moves the Vow's Vat delegation from the old adapter to the new one.
    pub fn file_addr(
        &mut self,
        caller: Address,
        vat: &mut Vat,
        what: &str,
        data: Address,
    ) -> Result<(), VowError> {
        self.auth(&caller)?;
        match what {
            "multisig" => self.multisig = data,
            "sikkajoin" => {
                self.check_vat(vat)?;
                vat.nope(self.address, self.sikka_join);
                self.sikka_join = data;
                vat.hope(self.address, self.sikka_join);
            }
            "sikka" => self.sikka = data,
            "vat" => self.vat = data,
            _ => return Err(VowError::UnrecognizedParam),
        }
        log::debug!("Vow file {what} = {data:?}");
        Ok(())
    }

    /// Cancels `rad` of the Vow's bad debt against its surplus.
    pub fn heal(&self, vat: &mut Vat, rad: Rad) -> Result<(), VowError> {
        self.check_vat(vat)?;
        require!(rad <= vat.sikka(&self.address), VowError::InsufficientSurplus);
        require!(rad <= vat.sin(&self.address), VowError::InsufficientDebt);
        vat.heal(self.address, rad)?;
        log::info!("✅ Vow healed {rad}");
        Ok(())
    }

    /// Takes `wad` stablecoin tokens from the caller and books them as surplus.
    /// The caller must have approved the Vow for `wad`.
    pub fn feed(
        &self,
        caller: Address,
        vat: &mut Vat,
        join: &mut SikkaJoin,
        sikka: &mut Token,
        wad: Wad,
    ) -> Result<(), VowError> {
        self.check_vat(vat)?;
        self.check_join(join, sikka)?;

        sikka.ensure_transfer_from(self.address, caller, self.address, wad)?;
        join.ensure_join(self.address, vat, wad)?;

        sikka.transfer_from(self.address, caller, self.address, wad)?;
        sikka.approve(self.address, join.address(), wad);
        join.join(self.address, vat, sikka, self.address, wad)?;
        log::info!("✅ Vow fed {wad} by {caller:?}");
        Ok(())
    }

    /// Sends surplus above `hump` to the multisig as tokens. Only allowed
    /// while the Vow carries no bad debt. Returns the amount sent.
    pub fn flap(&self, vat: &mut Vat, join: &mut SikkaJoin, sikka: &mut Token) -> Result<Wad, VowError> {
        self.check_vat(vat)?;
        self.check_join(join, sikka)?;

        let surplus = vat.sikka(&self.address);
        let sin = vat.sin(&self.address);
        require!(surplus >= sin.checked_add(self.hump)?, VowError::InsufficientSurplus);
        require!(sin.is_zero(), VowError::DebtNotZero);

        let wad = surplus.checked_sub(self.hump)?.to_wad();
        join.exit(self.address, vat, sikka, self.multisig, wad)?;
        log::info!("✅ Vow flapped {wad} to {:?}", self.multisig);
        Ok(wad)
    }

    /// Shuts the Vow down, cancelling as much bad debt as the surplus covers.
    pub fn cage(&mut self, caller: Address, vat: &mut Vat) -> Result<(), VowError> {
        self.auth(&caller)?;
        require!(self.live, VowError::NotLive);
        self.check_vat(vat)?;

        let rad = vat.sikka(&self.address).min(vat.sin(&self.address));
        vat.heal(self.address, rad)?;
        self.live = false;
        log::warn!("🛑 Vow caged, healed {rad}");
        Ok(())
    }
}
