//! The user-facing facade. Every operation here is a sequence of component
//! calls made by the Interaction, which is a ward of the Vat, Spotter, Jug,
//! Dog, joins and Clippers.
//!
//! The `Core` methods are not atomic across steps; the `Protocol` wrappers
//! run each one as a transaction.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{Core, Protocol};
use ledger_engine::math::{add, div, neg, ray_unit};
use ledger_engine::{
    require, Address, IlkId, MathResult, Rad, Ray, SaleId, Timestamp, Wad, Wards, U256,
};
use liquidation_engine::{SaleStatus, TakeOutcome};
use serde::Serialize;

/// Identity and admin set of the facade.
#[derive(Debug, Clone, Serialize)]
pub struct Interaction {
    address: Address,
    wards: Wards,
}

impl Interaction {
    pub fn new(address: Address, deployer: Address) -> Self {
        Self {
            address,
            wards: Wards::with(deployer),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn wards(&self) -> &Wards {
        &self.wards
    }

    pub(crate) fn auth(&self, caller: &Address) -> ProtocolResult<()> {
        require!(self.wards.is_ward(caller), ProtocolError::NotAuthorized);
        Ok(())
    }

    pub fn rely(&mut self, caller: Address, usr: Address) -> ProtocolResult<()> {
        self.auth(&caller)?;
        self.wards.rely(usr);
        Ok(())
    }

    pub fn deny(&mut self, caller: Address, usr: Address) -> ProtocolResult<()> {
        self.auth(&caller)?;
        self.wards.deny(&usr);
        Ok(())
    }
}

fn div_up(x: U256, y: U256) -> MathResult<U256> {
    let q = div(x, y)?;
    if (x % y).is_zero() {
        Ok(q)
    } else {
        add(q, U256::one())
    }
}

/// Smallest wad amount worth at least `rad`.
fn rad_to_wad_up(rad: Rad) -> MathResult<Wad> {
    Ok(Wad(div_up(rad.raw(), ray_unit())?))
}

impl Core {
    fn ensure_collateral(&self, ilk: &IlkId) -> ProtocolResult<()> {
        self.collateral(ilk).map(|_| ())
    }

    /// Pulls `wad` collateral tokens from the caller and locks them in the
    /// caller's vault. Returns the vault's locked collateral. The caller
    /// must have approved the Interaction on the collateral token.
    pub fn deposit(&mut self, caller: Address, ilk: IlkId, wad: Wad) -> ProtocolResult<Wad> {
        require!(!wad.is_zero(), ProtocolError::ZeroAmount);
        let ia = self.interaction.address();
        let dink = wad.to_i128()?;
        let collateral = self
            .collaterals
            .get_mut(&ilk)
            .ok_or(ProtocolError::UnknownIlk(ilk))?;

        collateral.gem.transfer_from(ia, caller, ia, wad)?;
        collateral
            .join
            .join(ia, &mut self.vat, &mut collateral.gem, caller, wad)?;
        // Depositing lets the Interaction manage the caller's vault.
        self.vat.hope(caller, ia);
        self.vat.frob(ia, ilk, caller, caller, caller, dink, 0)?;

        let ink = self.vat.urn(&ilk, &caller).ink;
        log::info!("✅ Deposit {wad} {ilk} by {caller:?}, locked {ink}");
        Ok(ink)
    }

    /// Draws `wad` sikka against the caller's vault and sends the tokens to
    /// the caller. Accrues fees first. Returns the vault's normalised debt.
    pub fn borrow(
        &mut self,
        caller: Address,
        now: Timestamp,
        ilk: IlkId,
        wad: Wad,
    ) -> ProtocolResult<Wad> {
        require!(!wad.is_zero(), ProtocolError::ZeroAmount);
        self.ensure_collateral(&ilk)?;
        let ia = self.interaction.address();

        let rate = self.jug.drip(&mut self.vat, now, ilk)?;
        let rad = wad.to_rad()?;
        let dart = Wad(div_up(rad.raw(), rate.raw())?);
        self.vat.frob(ia, ilk, caller, caller, caller, 0, dart.to_i128()?)?;
        self.vat.move_sikka(ia, caller, ia, rad)?;
        self.sikka_join
            .exit(ia, &mut self.vat, &mut self.sikka, caller, wad)?;

        let art = self.vat.urn(&ilk, &caller).art;
        log::info!("✅ Borrow {wad} against {ilk} by {caller:?}, art {art}");
        Ok(art)
    }

    /// Repays up to `wad` sikka of the caller's debt with tokens the caller
    /// approved to the Interaction. Only what the debt needs is pulled.
    /// Returns the remaining normalised debt.
    pub fn payback(
        &mut self,
        caller: Address,
        now: Timestamp,
        ilk: IlkId,
        wad: Wad,
    ) -> ProtocolResult<Wad> {
        require!(!wad.is_zero(), ProtocolError::ZeroAmount);
        self.ensure_collateral(&ilk)?;
        let ia = self.interaction.address();

        let rate = self.jug.drip(&mut self.vat, now, ilk)?;
        let art = self.vat.urn(&ilk, &caller).art;
        let pay = wad.min(rad_to_wad_up(art.mul_ray(rate)?)?);
        if pay.is_zero() {
            return Ok(art);
        }
        self.sikka.transfer_from(ia, caller, ia, pay)?;
        self.sikka_join
            .join(ia, &mut self.vat, &mut self.sikka, caller, pay)?;

        let dart = Wad(div(pay.to_rad()?.raw(), rate.raw())?).min(art);
        self.vat
            .frob(ia, ilk, caller, caller, caller, 0, neg(dart.to_i128()?)?)?;

        let art = self.vat.urn(&ilk, &caller).art;
        log::info!("✅ Payback {pay} on {ilk} by {caller:?}, art {art}");
        Ok(art)
    }

    /// Unlocks `wad` collateral from the caller's vault and sends the tokens
    /// to the caller. Returns the vault's remaining locked collateral.
    pub fn withdraw(
        &mut self,
        caller: Address,
        now: Timestamp,
        ilk: IlkId,
        wad: Wad,
    ) -> ProtocolResult<Wad> {
        require!(!wad.is_zero(), ProtocolError::ZeroAmount);
        self.ensure_collateral(&ilk)?;
        let ia = self.interaction.address();
        let dink = wad.to_i128()?;

        self.jug.drip(&mut self.vat, now, ilk)?;
        self.vat.frob(ia, ilk, caller, caller, caller, neg(dink)?, 0)?;
        self.vat.flux(ia, ilk, caller, ia, wad)?;
        let collateral = self
            .collaterals
            .get_mut(&ilk)
            .ok_or(ProtocolError::UnknownIlk(ilk))?;
        collateral
            .join
            .exit(ia, &mut self.vat, &mut collateral.gem, caller, wad)?;

        let ink = self.vat.urn(&ilk, &caller).ink;
        log::info!("✅ Withdraw {wad} {ilk} by {caller:?}, locked {ink}");
        Ok(ink)
    }

    pub fn poke(&mut self, ilk: IlkId) -> ProtocolResult<Ray> {
        self.ensure_collateral(&ilk)?;
        Ok(self.spotter.poke(&mut self.vat, ilk)?)
    }

    pub fn drip(&mut self, now: Timestamp, ilk: IlkId) -> ProtocolResult<Ray> {
        self.ensure_collateral(&ilk)?;
        Ok(self.jug.drip(&mut self.vat, now, ilk)?)
    }

    /// Accrues at the old duty, then switches to `duty`.
    pub fn set_collateral_duty(
        &mut self,
        caller: Address,
        now: Timestamp,
        ilk: IlkId,
        duty: Ray,
    ) -> ProtocolResult<()> {
        self.interaction.auth(&caller)?;
        self.ensure_collateral(&ilk)?;
        let ia = self.interaction.address();
        self.jug.drip(&mut self.vat, now, ilk)?;
        self.jug.file_ilk(ia, now, ilk, "duty", duty.raw())?;
        log::info!("✅ Duty for {ilk} set to {duty}");
        Ok(())
    }

    /// Liquidates the vault `(ilk, urn)` and returns the new sale's id.
    pub fn start_auction(
        &mut self,
        now: Timestamp,
        ilk: IlkId,
        urn: Address,
        kpr: Address,
    ) -> ProtocolResult<SaleId> {
        let collateral = self
            .collaterals
            .get_mut(&ilk)
            .ok_or(ProtocolError::UnknownIlk(ilk))?;
        let id = self.dog.bark(
            &mut self.vat,
            &mut collateral.clipper,
            &self.spotter,
            now,
            ilk,
            urn,
            kpr,
        )?;
        Ok(id)
    }

    /// Bids on sale `id` with sikka tokens: takes up to `amt` collateral at no
    /// more than `max` per unit, sends the collateral tokens to `receiver`
    /// and refunds unspent sikka to the caller. The caller must have approved
    /// the Interaction for `amt * max` sikka.
    #[allow(clippy::too_many_arguments)]
    pub fn buy_from_auction(
        &mut self,
        caller: Address,
        now: Timestamp,
        ilk: IlkId,
        id: SaleId,
        amt: Wad,
        max: Ray,
        receiver: Address,
    ) -> ProtocolResult<TakeOutcome> {
        require!(!amt.is_zero(), ProtocolError::ZeroAmount);
        let ia = self.interaction.address();
        let collateral = self
            .collaterals
            .get_mut(&ilk)
            .ok_or(ProtocolError::UnknownIlk(ilk))?;
        let clip = collateral.clipper.address();

        let budget = rad_to_wad_up(amt.mul_ray(max)?)?;
        let held = self.vat.sikka(&ia);
        self.sikka.transfer_from(ia, caller, ia, budget)?;
        self.sikka_join
            .join(ia, &mut self.vat, &mut self.sikka, ia, budget)?;

        self.vat.hope(ia, clip);
        let outcome = collateral
            .clipper
            .take(ia, &mut self.vat, &mut self.dog, now, id, amt, max, ia)?;
        self.vat.nope(ia, clip);

        if !outcome.slice.is_zero() {
            collateral
                .join
                .exit(ia, &mut self.vat, &mut collateral.gem, receiver, outcome.slice)?;
        }
        // Rounding dust left by earlier bids stays with the Interaction.
        let refund = self.vat.sikka(&ia).checked_sub(held)?.to_wad();
        if !refund.is_zero() {
            self.sikka_join
                .exit(ia, &mut self.vat, &mut self.sikka, caller, refund)?;
        }
        log::info!(
            "✅ Auction #{id} on {ilk}: {caller:?} bought {} for {}",
            outcome.slice,
            outcome.owe
        );
        Ok(outcome)
    }

    /// Restarts a stale sale at a fresh price.
    pub fn reset_auction(
        &mut self,
        now: Timestamp,
        ilk: IlkId,
        id: SaleId,
        kpr: Address,
    ) -> ProtocolResult<()> {
        let collateral = self
            .collaterals
            .get_mut(&ilk)
            .ok_or(ProtocolError::UnknownIlk(ilk))?;
        collateral
            .clipper
            .redo(&mut self.vat, &self.spotter, now, id, kpr)?;
        Ok(())
    }

    // --- Views ---

    pub fn locked(&self, ilk: &IlkId, usr: &Address) -> Wad {
        self.vat.urn(ilk, usr).ink
    }

    /// Debt including accrued fees up to the last drip.
    pub fn borrowed(&self, ilk: &IlkId, usr: &Address) -> ProtocolResult<Wad> {
        let rate = self.vat.ilk(ilk).rate;
        Ok(self.vat.urn(ilk, usr).art.mul_ray(rate)?.to_wad())
    }

    /// Further sikka the vault could draw at the current spot.
    pub fn available_to_borrow(&self, ilk: &IlkId, usr: &Address) -> ProtocolResult<Wad> {
        let vilk = self.vat.ilk(ilk);
        let urn = self.vat.urn(ilk, usr);
        let capacity = urn.ink.mul_ray(vilk.spot)?;
        let debt = urn.art.mul_ray(vilk.rate)?;
        Ok(capacity.saturating_sub(debt).to_wad())
    }

    /// Feed price at which the vault becomes unsafe, or `None` for an empty
    /// vault.
    pub fn current_liquidation_price(&self, ilk: &IlkId, usr: &Address) -> ProtocolResult<Option<Wad>> {
        let urn = self.vat.urn(ilk, usr);
        if urn.ink.is_zero() {
            return Ok(None);
        }
        let debt = urn.art.mul_ray(self.vat.ilk(ilk).rate)?;
        let price = debt
            .div_wad(urn.ink)?
            .rmul(self.spotter.mat(ilk))?
            .rmul(self.spotter.par())?;
        Ok(Some(price.to_wad()))
    }

    pub fn collateral_price(&self, ilk: &IlkId) -> Option<Wad> {
        self.spotter.peek(ilk)
    }

    pub fn auction_status(&self, ilk: &IlkId, id: SaleId, now: Timestamp) -> ProtocolResult<Option<SaleStatus>> {
        Ok(self.collateral(ilk)?.clipper.get_status(id, now)?)
    }

    /// Vaults priced and currently unsafe.
    pub fn unsafe_urns(&self) -> Vec<(IlkId, Address)> {
        self.vat
            .urns()
            .filter(|(ilk, _, urn)| {
                let vilk = self.vat.ilk(ilk);
                !vilk.spot.is_zero() && matches!(urn.is_unsafe(&vilk), Ok(true))
            })
            .map(|(ilk, usr, _)| (ilk, usr))
            .collect()
    }
}

impl Protocol {
    pub fn deposit(&self, caller: Address, ilk: IlkId, wad: Wad) -> ProtocolResult<Wad> {
        self.transact(|core, _| core.deposit(caller, ilk, wad))
    }

    pub fn borrow(&self, caller: Address, ilk: IlkId, wad: Wad) -> ProtocolResult<Wad> {
        self.transact(|core, now| core.borrow(caller, now, ilk, wad))
    }

    pub fn payback(&self, caller: Address, ilk: IlkId, wad: Wad) -> ProtocolResult<Wad> {
        self.transact(|core, now| core.payback(caller, now, ilk, wad))
    }

    pub fn withdraw(&self, caller: Address, ilk: IlkId, wad: Wad) -> ProtocolResult<Wad> {
        self.transact(|core, now| core.withdraw(caller, now, ilk, wad))
    }

    pub fn poke(&self, ilk: IlkId) -> ProtocolResult<Ray> {
        self.transact(|core, _| core.poke(ilk))
    }

    pub fn drip(&self, ilk: IlkId) -> ProtocolResult<Ray> {
        self.transact(|core, now| core.drip(now, ilk))
    }

    pub fn set_collateral_duty(&self, caller: Address, ilk: IlkId, duty: Ray) -> ProtocolResult<()> {
        self.transact(|core, now| core.set_collateral_duty(caller, now, ilk, duty))
    }

    pub fn start_auction(&self, ilk: IlkId, urn: Address, kpr: Address) -> ProtocolResult<SaleId> {
        self.transact(|core, now| core.start_auction(now, ilk, urn, kpr))
    }

    pub fn buy_from_auction(
        &self,
        caller: Address,
        ilk: IlkId,
        id: SaleId,
        amt: Wad,
        max: Ray,
        receiver: Address,
    ) -> ProtocolResult<TakeOutcome> {
        self.transact(|core, now| core.buy_from_auction(caller, now, ilk, id, amt, max, receiver))
    }

    pub fn reset_auction(&self, ilk: IlkId, id: SaleId, kpr: Address) -> ProtocolResult<()> {
        self.transact(|core, now| core.reset_auction(now, ilk, id, kpr))
    }

    pub fn locked(&self, ilk: &IlkId, usr: &Address) -> Wad {
        self.read().locked(ilk, usr)
    }

    pub fn borrowed(&self, ilk: &IlkId, usr: &Address) -> ProtocolResult<Wad> {
        self.read().borrowed(ilk, usr)
    }

    pub fn available_to_borrow(&self, ilk: &IlkId, usr: &Address) -> ProtocolResult<Wad> {
        self.read().available_to_borrow(ilk, usr)
    }

    pub fn current_liquidation_price(&self, ilk: &IlkId, usr: &Address) -> ProtocolResult<Option<Wad>> {
        self.read().current_liquidation_price(ilk, usr)
    }

    pub fn unsafe_urns(&self) -> Vec<(IlkId, Address)> {
        self.read().unsafe_urns()
    }
}

