//! The Vat: the single source of truth for collateral, debt and internal
//! sikka balances.
//!
//! Every mutating call takes the caller explicitly. Checks run in a fixed
//! order (liveness, initialization, authorization, arithmetic, solvency) and
//! all new values are computed before anything is written, so a failed call
//! leaves the ledger untouched.

use crate::auth::Wards;
use crate::error::VatError;
use crate::math::{neg, MathError, Rad, Ray, SignedRad, Wad};
use crate::require;
use crate::types::{Address, IlkId};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per collateral type accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ilk {
    /// Total normalised debt.
    pub total_art: Wad,
    /// Accumulated stability fee rate; zero until `init`.
    pub rate: Ray,
    /// Collateral price with the liquidation ratio applied.
    pub spot: Ray,
    /// Debt ceiling.
    pub line: Rad,
    /// Minimum debt per vault.
    pub dust: Rad,
}

impl Ilk {
    pub fn is_initialized(&self) -> bool {
        !self.rate.is_zero()
    }
}

/// A vault: locked collateral and normalised debt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Urn {
    pub ink: Wad,
    pub art: Wad,
}

impl Urn {
    /// Whether `art * rate > ink * spot` for the given ilk.
    pub fn is_unsafe(&self, ilk: &Ilk) -> Result<bool, MathError> {
        Ok(self.ink.mul_ray(ilk.spot)? < self.art.mul_ray(ilk.rate)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobalParam {
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IlkParam {
    Spot,
    Line,
    Dust,
}

impl GlobalParam {
    fn parse(what: &str) -> Result<Self, VatError> {
        match what {
            "Line" => Ok(Self::Line),
            _ => Err(VatError::UnrecognizedParam),
        }
    }
}

impl IlkParam {
    fn parse(what: &str) -> Result<Self, VatError> {
        match what {
            "spot" => Ok(Self::Spot),
            "line" => Ok(Self::Line),
            "dust" => Ok(Self::Dust),
            _ => Err(VatError::UnrecognizedParam),
        }
    }
}

/// Applies `dink`/`dart` to an urn and its ilk, returning the new values and
/// the signed sikka amount `rate * dart`. Shared by `frob` and `grab`.
fn shift(urn: Urn, ilk: &Ilk, dink: i128, dart: i128) -> Result<(Urn, Ilk, SignedRad), MathError> {
    let next_urn = Urn {
        ink: urn.ink.add_signed(dink)?,
        art: urn.art.add_signed(dart)?,
    };
    let next_ilk = Ilk {
        total_art: ilk.total_art.add_signed(dart)?,
        ..*ilk
    };
    let dtab = SignedRad::product(dart, ilk.rate.raw())?;
    Ok((next_urn, next_ilk, dtab))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vat {
    address: Address,
    wards: Wards,
    can: BTreeMap<Address, BTreeSet<Address>>,
    ilks: BTreeMap<IlkId, Ilk>,
    urns: BTreeMap<IlkId, BTreeMap<Address, Urn>>,
    gem: BTreeMap<IlkId, BTreeMap<Address, Wad>>,
    sikka: BTreeMap<Address, Rad>,
    sin: BTreeMap<Address, Rad>,
    debt: Rad,
    vice: Rad,
    global_line: Rad,
    live: bool,
}

impl Vat {
    pub fn new(address: Address, deployer: Address) -> Self {
        log::info!("✅ Vat {address:?} deployed by {deployer:?}");
        Self {
            address,
            wards: Wards::with(deployer),
            can: BTreeMap::new(),
            ilks: BTreeMap::new(),
            urns: BTreeMap::new(),
            gem: BTreeMap::new(),
            sikka: BTreeMap::new(),
            sin: BTreeMap::new(),
            debt: Rad::zero(),
            vice: Rad::zero(),
            global_line: Rad::zero(),
            live: true,
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

    pub fn debt(&self) -> Rad {
        self.debt
    }

    pub fn vice(&self) -> Rad {
        self.vice
    }

    pub fn global_line(&self) -> Rad {
        self.global_line
    }

    pub fn ilk(&self, ilk: &IlkId) -> Ilk {
        self.ilks.get(ilk).copied().unwrap_or_default()
    }

    pub fn ilks(&self) -> impl Iterator<Item = (&IlkId, &Ilk)> {
        self.ilks.iter()
    }

    pub fn urn(&self, ilk: &IlkId, usr: &Address) -> Urn {
        self.urns
            .get(ilk)
            .and_then(|urns| urns.get(usr))
            .copied()
            .unwrap_or_default()
    }

    /// Every urn with a non-zero position, in deterministic order.
    pub fn urns(&self) -> impl Iterator<Item = (IlkId, Address, Urn)> + '_ {
        self.urns.iter().flat_map(|(ilk, urns)| {
            urns.iter()
                .filter(|(_, urn)| !urn.ink.is_zero() || !urn.art.is_zero())
                .map(move |(usr, urn)| (*ilk, *usr, *urn))
        })
    }

    pub fn gem(&self, ilk: &IlkId, usr: &Address) -> Wad {
        self.gem
            .get(ilk)
            .and_then(|gems| gems.get(usr))
            .copied()
            .unwrap_or_default()
    }

    pub fn sikka(&self, usr: &Address) -> Rad {
        self.sikka.get(usr).copied().unwrap_or_default()
    }

    pub fn sin(&self, usr: &Address) -> Rad {
        self.sin.get(usr).copied().unwrap_or_default()
    }

    /// Whether `usr` may act on behalf of `bit`.
    pub fn can(&self, bit: &Address, usr: &Address) -> bool {
        bit == usr || self.can.get(bit).is_some_and(|allowed| allowed.contains(usr))
    }

    // --- Administration ---

    fn auth(&self, caller: &Address) -> Result<(), VatError> {
        require!(self.wards.is_ward(caller), VatError::NotAuthorized);
        Ok(())
    }

    pub fn rely(&mut self, caller: Address, usr: Address) -> Result<(), VatError> {
        self.auth(&caller)?;
        require!(self.live, VatError::NotLive);
        self.wards.rely(usr);
        log::debug!("Vat rely {usr:?}");
        Ok(())
    }

    pub fn deny(&mut self, caller: Address, usr: Address) -> Result<(), VatError> {
        self.auth(&caller)?;
        require!(self.live, VatError::NotLive);
        self.wards.deny(&usr);
        log::debug!("Vat deny {usr:?}");
        Ok(())
    }

    pub fn hope(&mut self, caller: Address, usr: Address) {
        self.can.entry(caller).or_default().insert(usr);
    }

    pub fn nope(&mut self, caller: Address, usr: Address) {
        if let Some(allowed) = self.can.get_mut(&caller) {
            allowed.remove(&usr);
        }
    }

    pub fn init(&mut self, caller: Address, ilk: IlkId) -> Result<(), VatError> {
        self.auth(&caller)?;
        let entry = self.ilks.entry(ilk).or_default();
        require!(!entry.is_initialized(), VatError::IlkAlreadyInit);
        entry.rate = Ray::one();
        log::info!("✅ Vat ilk {ilk} initialized");
        Ok(())
    }

    /// Sets a global parameter. Recognised: `Line` (rad).
    pub fn file(&mut self, caller: Address, what: &str, data: U256) -> Result<(), VatError> {
        self.auth(&caller)?;
        require!(self.live, VatError::NotLive);
        match GlobalParam::parse(what)? {
            GlobalParam::Line => self.global_line = Rad(data),
        }
        log::debug!("Vat file {what} = {data}");
        Ok(())
    }

    /// Sets a per-ilk parameter. Recognised: `spot` (ray), `line` (rad), `dust` (rad).
    pub fn file_ilk(
        &mut self,
        caller: Address,
        ilk: IlkId,
        what: &str,
        data: U256,
    ) -> Result<(), VatError> {
        self.auth(&caller)?;
        require!(self.live, VatError::NotLive);
        let param = IlkParam::parse(what)?;
        let entry = self.ilks.entry(ilk).or_default();
        match param {
            IlkParam::Spot => entry.spot = Ray(data),
            IlkParam::Line => entry.line = Rad(data),
            IlkParam::Dust => entry.dust = Rad(data),
        }
        log::debug!("Vat file {ilk}.{what} = {data}");
        Ok(())
    }

    pub fn cage(&mut self, caller: Address) -> Result<(), VatError> {
        self.auth(&caller)?;
        self.live = false;
        log::warn!("Vat caged");
        Ok(())
    }

    // --- Balances ---

    fn set_gem(&mut self, ilk: IlkId, usr: Address, wad: Wad) {
        self.gem.entry(ilk).or_default().insert(usr, wad);
    }

    fn set_urn(&mut self, ilk: IlkId, usr: Address, urn: Urn) {
        self.urns.entry(ilk).or_default().insert(usr, urn);
    }

    /// Credits or debits unlocked collateral. Used by collateral joins.
    pub fn slip(
        &mut self,
        caller: Address,
        ilk: IlkId,
        usr: Address,
        wad: i128,
    ) -> Result<(), VatError> {
        self.auth(&caller)?;
        let gem = self.gem(&ilk, &usr).add_signed(wad)?;
        self.set_gem(ilk, usr, gem);
        Ok(())
    }

    /// Moves unlocked collateral between addresses.
    pub fn flux(
        &mut self,
        caller: Address,
        ilk: IlkId,
        src: Address,
        dst: Address,
        wad: Wad,
    ) -> Result<(), VatError> {
        require!(self.can(&src, &caller), VatError::NotAllowed);
        let src_gem = self.gem(&ilk, &src).checked_sub(wad)?;
        let dst_gem = (if src == dst { src_gem } else { self.gem(&ilk, &dst) }).checked_add(wad)?;
        self.set_gem(ilk, src, src_gem);
        self.set_gem(ilk, dst, dst_gem);
        Ok(())
    }

    /// Moves internal sikka between addresses.
    pub fn move_sikka(
        &mut self,
        caller: Address,
        src: Address,
        dst: Address,
        rad: Rad,
    ) -> Result<(), VatError> {
        require!(self.can(&src, &caller), VatError::NotAllowed);
        let src_sikka = self.sikka(&src).checked_sub(rad)?;
        let dst_sikka = (if src == dst { src_sikka } else { self.sikka(&dst) }).checked_add(rad)?;
        self.sikka.insert(src, src_sikka);
        self.sikka.insert(dst, dst_sikka);
        Ok(())
    }

    // --- Vault manipulation ---

    /// Locks or frees collateral and draws or wipes debt on the urn `(ilk, u)`,
    /// taking collateral from `v` and sending sikka to `w`.
    #[allow(clippy::too_many_arguments)]
    pub fn frob(
        &mut self,
        caller: Address,
        ilk: IlkId,
        u: Address,
        v: Address,
        w: Address,
        dink: i128,
        dart: i128,
    ) -> Result<(), VatError> {
        require!(self.live, VatError::NotLive);
        let current = self.ilk(&ilk);
        require!(current.is_initialized(), VatError::IlkNotInit);

        let less_risky = dart <= 0 && dink >= 0;
        require!(less_risky || self.can(&u, &caller), VatError::NotAllowedU);
        require!(dink <= 0 || self.can(&v, &caller), VatError::NotAllowedV);
        require!(dart >= 0 || self.can(&w, &caller), VatError::NotAllowedW);

        let (urn, next, dtab) = shift(self.urn(&ilk, &u), &current, dink, dart)?;
        let tab = urn.art.mul_ray(next.rate)?;
        let debt = dtab.add_to(self.debt)?;

        if dart > 0 {
            let ilk_debt = next.total_art.mul_ray(next.rate)?;
            require!(
                ilk_debt <= next.line && debt <= self.global_line,
                VatError::CeilingExceeded
            );
        }
        require!(less_risky || tab <= urn.ink.mul_ray(next.spot)?, VatError::NotSafe);
        require!(urn.art.is_zero() || tab >= next.dust, VatError::Dust);

        let gem = self.gem(&ilk, &v).add_signed(neg(dink)?)?;
        let sikka = dtab.add_to(self.sikka(&w))?;

        self.set_gem(ilk, v, gem);
        self.sikka.insert(w, sikka);
        self.set_urn(ilk, u, urn);
        self.ilks.insert(ilk, next);
        self.debt = debt;
        log::debug!("Vat frob {ilk} {u:?} dink={dink} dart={dart}");
        Ok(())
    }

    /// Transfers collateral and debt between two urns of the same ilk.
    /// Both sides must consent and both must end up safe and not dusty.
    pub fn fork(
        &mut self,
        caller: Address,
        ilk: IlkId,
        src: Address,
        dst: Address,
        dink: i128,
        dart: i128,
    ) -> Result<(), VatError> {
        require!(
            self.can(&src, &caller) && self.can(&dst, &caller),
            VatError::NotAllowed
        );
        let current = self.ilk(&ilk);
        let from = self.urn(&ilk, &src);
        let from = Urn {
            ink: from.ink.add_signed(neg(dink)?)?,
            art: from.art.add_signed(neg(dart)?)?,
        };
        let to = if src == dst { from } else { self.urn(&ilk, &dst) };
        let to = Urn {
            ink: to.ink.add_signed(dink)?,
            art: to.art.add_signed(dart)?,
        };
        let from_tab = from.art.mul_ray(current.rate)?;
        let to_tab = to.art.mul_ray(current.rate)?;

        require!(from_tab <= from.ink.mul_ray(current.spot)?, VatError::NotSafeSrc);
        require!(to_tab <= to.ink.mul_ray(current.spot)?, VatError::NotSafeDst);
        require!(from.art.is_zero() || from_tab >= current.dust, VatError::DustSrc);
        require!(to.art.is_zero() || to_tab >= current.dust, VatError::DustDst);

        self.set_urn(ilk, src, from);
        self.set_urn(ilk, dst, to);
        Ok(())
    }

    /// Confiscates collateral and debt from an urn without any safety check,
    /// booking the debt as `sin` against `w`. Liquidation only.
    #[allow(clippy::too_many_arguments)]
    pub fn grab(
        &mut self,
        caller: Address,
        ilk: IlkId,
        u: Address,
        v: Address,
        w: Address,
        dink: i128,
        dart: i128,
    ) -> Result<(), VatError> {
        self.auth(&caller)?;
        let current = self.ilk(&ilk);
        require!(current.is_initialized(), VatError::IlkNotInit);

        let (urn, next, dtab) = shift(self.urn(&ilk, &u), &current, dink, dart)?;
        let gem = self.gem(&ilk, &v).add_signed(neg(dink)?)?;
        let sin = dtab.sub_from(self.sin(&w))?;
        let vice = dtab.sub_from(self.vice)?;

        self.set_urn(ilk, u, urn);
        self.ilks.insert(ilk, next);
        self.set_gem(ilk, v, gem);
        self.sin.insert(w, sin);
        self.vice = vice;
        log::debug!("Vat grab {ilk} {u:?} dink={dink} dart={dart}");
        Ok(())
    }

    // --- Settlement ---

    /// Cancels the caller's own bad debt against its own sikka.
    pub fn heal(&mut self, caller: Address, rad: Rad) -> Result<(), VatError> {
        let sin = self.sin(&caller).checked_sub(rad)?;
        let sikka = self.sikka(&caller).checked_sub(rad)?;
        let vice = self.vice.checked_sub(rad)?;
        let debt = self.debt.checked_sub(rad)?;

        self.sin.insert(caller, sin);
        self.sikka.insert(caller, sikka);
        self.vice = vice;
        self.debt = debt;
        log::debug!("Vat heal {caller:?} {rad}");
        Ok(())
    }

    /// Mints unbacked sikka to `v`, booking matching bad debt against `u`.
    pub fn suck(
        &mut self,
        caller: Address,
        u: Address,
        v: Address,
        rad: Rad,
    ) -> Result<(), VatError> {
        self.auth(&caller)?;
        let sin = self.sin(&u).checked_add(rad)?;
        let sikka = self.sikka(&v).checked_add(rad)?;
        let vice = self.vice.checked_add(rad)?;
        let debt = self.debt.checked_add(rad)?;

        self.sin.insert(u, sin);
        self.sikka.insert(v, sikka);
        self.vice = vice;
        self.debt = debt;
        Ok(())
    }

    // --- Rates ---

    /// Adjusts an ilk's rate by `rate` and credits the resulting fee,
    /// `Art * rate`, to `u`.
    pub fn fold(
        &mut self,
        caller: Address,
        ilk: IlkId,
        u: Address,
        rate: i128,
    ) -> Result<(), VatError> {
        self.auth(&caller)?;
        require!(self.live, VatError::NotLive);
        let mut current = self.ilk(&ilk);
        require!(current.is_initialized(), VatError::IlkNotInit);

        let rad = SignedRad::product(rate, current.total_art.raw())?;
        current.rate = current.rate.add_signed(rate)?;
        let sikka = rad.add_to(self.sikka(&u))?;
        let debt = rad.add_to(self.debt)?;

        self.ilks.insert(ilk, current);
        self.sikka.insert(u, sikka);
        self.debt = debt;
        log::debug!("Vat fold {ilk} rate={} delta={rate}", current.rate);
        Ok(())
    }
}
