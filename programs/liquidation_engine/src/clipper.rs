//! The Clipper: descending-price collateral auctions for one ilk.
//!
//! A sale starts at `top = feed * buf` and its price falls along the
//! configured [`Abacus`] curve. Bidders buy any amount at the current price
//! until the debt (`tab`) is covered or the collateral (`lot`) runs out. A
//! sale that is too old or too cheap must be reset with `redo`.

use crate::abacus::Abacus;
use crate::dog::{Dog, DogError};
use ledger_engine::{
    require, Address, Classify, ErrorKind, IlkId, MathError, Rad, Ray, SaleId, Timestamp, Vat,
    VatError, Wad, Wards, U256,
};
use oracle_framework::Spotter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipperError {
    #[error("Clipper/not-authorized")]
    NotAuthorized,
    #[error("Clipper/stopped-incorrect")]
    Stopped,
    #[error("Clipper/zero-tab")]
    ZeroTab,
    #[error("Clipper/zero-lot")]
    ZeroLot,
    #[error("Clipper/zero-usr")]
    ZeroUsr,
    #[error("Clipper/overflow")]
    Overflow,
    #[error("Clipper/invalid-price")]
    InvalidPrice,
    #[error("Clipper/zero-top-price")]
    ZeroTopPrice,
    #[error("Clipper/not-running-auction")]
    NotRunningAuction,
    #[error("Clipper/needs-reset")]
    NeedsReset,
    #[error("Clipper/too-expensive")]
    TooExpensive,
    #[error("Clipper/no-partial-purchase")]
    NoPartialPurchase,
    #[error("Clipper/cannot-reset")]
    CannotReset,
    #[error("Clipper/collateral-shortfall")]
    CollateralShortfall,
    #[error("Clipper/file-unrecognized-param")]
    UnrecognizedParam,
    #[error("Clipper/file-stopped-out-of-range")]
    StoppedOutOfRange,
    #[error("Clipper/miswired-{0}")]
    Miswired(&'static str),
    #[error(transparent)]
    Vat(#[from] VatError),
    #[error(transparent)]
    Dog(Box<DogError>),
    #[error(transparent)]
    Math(#[from] MathError),
}

impl From<DogError> for ClipperError {
    fn from(e: DogError) -> Self {
        ClipperError::Dog(Box::new(e))
    }
}

impl Classify for ClipperError {
    fn kind(&self) -> ErrorKind {
        match self {
            ClipperError::NotAuthorized => ErrorKind::Authorization,
            ClipperError::Stopped => ErrorKind::Lifecycle,
            ClipperError::ZeroTab
            | ClipperError::ZeroLot
            | ClipperError::ZeroUsr
            | ClipperError::NotRunningAuction
            | ClipperError::NeedsReset
            | ClipperError::TooExpensive
            | ClipperError::NoPartialPurchase
            | ClipperError::CannotReset => ErrorKind::AuctionState,
            ClipperError::CollateralShortfall => ErrorKind::Solvency,
            ClipperError::InvalidPrice
            | ClipperError::ZeroTopPrice
            | ClipperError::UnrecognizedParam
            | ClipperError::StoppedOutOfRange
            | ClipperError::Miswired(_) => ErrorKind::Config,
            ClipperError::Overflow => ErrorKind::Arithmetic,
            ClipperError::Vat(e) => e.kind(),
            ClipperError::Dog(e) => e.kind(),
            ClipperError::Math(e) => e.kind(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    /// Index in the active list.
    pub pos: usize,
    /// Debt left to raise.
    pub tab: Rad,
    /// Collateral left to sell.
    pub lot: Wad,
    /// Liquidated vault, which receives leftover collateral.
    pub usr: Address,
    /// Start (or last reset) time.
    pub tic: Timestamp,
    /// Starting price.
    pub top: Ray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaleStatus {
    pub needs_redo: bool,
    pub price: Ray,
    pub lot: Wad,
    pub tab: Rad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TakeOutcome {
    /// Collateral bought.
    pub slice: Wad,
    /// Sikka paid.
    pub owe: Rad,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum ClipperEvent {
    Kick {
        id: SaleId,
        top: Ray,
        tab: Rad,
        lot: Wad,
        usr: Address,
        kpr: Address,
        coin: Rad,
    },
    Take {
        id: SaleId,
        max: Ray,
        price: Ray,
        owe: Rad,
        tab: Rad,
        lot: Wad,
        usr: Address,
    },
    Redo {
        id: SaleId,
        top: Ray,
        tab: Rad,
        lot: Wad,
        usr: Address,
        kpr: Address,
        coin: Rad,
    },
    Yank {
        id: SaleId,
    },
}

/// What `kick` will do, computed without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KickPlan {
    pub id: SaleId,
    pub top: Ray,
    pub coin: Rad,
}

#[derive(Debug, Clone)]
pub struct Clipper {
    address: Address,
    ilk: IlkId,
    wards: Wards,
    vat: Address,
    spotter: Address,
    dog: Address,
    vow: Address,
    calc: Box<dyn Abacus>,
    /// Multiplier on the feed price for the starting price.
    buf: Ray,
    /// Seconds before a sale needs a reset.
    tail: u64,
    /// Fraction of `top` below which a sale needs a reset.
    cusp: Ray,
    /// Keeper reward as a fraction of `tab`.
    chip: Wad,
    /// Flat keeper reward.
    tip: Rad,
    /// Cached `dust * chop`.
    chost: Rad,
    kicks: SaleId,
    active: Vec<SaleId>,
    sales: BTreeMap<SaleId, Sale>,
    /// 0 running, 1 no kick, 2 no kick or redo, 3 nothing.
    stopped: u8,
    events: Vec<ClipperEvent>,
}

impl Clipper {
    pub fn new(
        address: Address,
        deployer: Address,
        vat: Address,
        spotter: Address,
        dog: Address,
        ilk: IlkId,
        calc: Box<dyn Abacus>,
    ) -> Self {
        log::info!("✅ Clipper for {ilk} deployed at {address:?}");
        Self {
            address,
            ilk,
            wards: Wards::with(deployer),
            vat,
            spotter,
            dog,
            vow: Address::zero(),
            calc,
            buf: Ray::one(),
            tail: 0,
            cusp: Ray::zero(),
            chip: Wad::zero(),
            tip: Rad::zero(),
            chost: Rad::zero(),
            kicks: 0,
            active: Vec::new(),
            sales: BTreeMap::new(),
            stopped: 0,
            events: Vec::new(),
        }
    }

    // --- Views ---

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn ilk(&self) -> IlkId {
        self.ilk
    }

    pub fn wards(&self) -> &Wards {
        &self.wards
    }

    pub fn calc(&self) -> &dyn Abacus {
        self.calc.as_ref()
    }

    pub fn buf(&self) -> Ray {
        self.buf
    }

    pub fn tail(&self) -> u64 {
        self.tail
    }

    pub fn cusp(&self) -> Ray {
        self.cusp
    }

    pub fn chip(&self) -> Wad {
        self.chip
    }

    pub fn tip(&self) -> Rad {
        self.tip
    }

    pub fn chost(&self) -> Rad {
        self.chost
    }

    pub fn stopped(&self) -> u8 {
        self.stopped
    }

    pub fn kicks(&self) -> SaleId {
        self.kicks
    }

    pub fn count(&self) -> usize {
        self.active.len()
    }

    pub fn list(&self) -> &[SaleId] {
        &self.active
    }

    pub fn sale(&self, id: SaleId) -> Option<&Sale> {
        self.sales.get(&id)
    }

    pub fn take_events(&mut self) -> Vec<ClipperEvent> {
        std::mem::take(&mut self.events)
    }

    // --- Administration ---

    fn auth(&self, caller: &Address) -> Result<(), ClipperError> {
        require!(self.wards.is_ward(caller), ClipperError::NotAuthorized);
        Ok(())
    }

    fn is_stopped(&self, level: u8) -> Result<(), ClipperError> {
        require!(self.stopped < level, ClipperError::Stopped);
        Ok(())
    }

    fn check_vat(&self, vat: &Vat) -> Result<(), ClipperError> {
        require!(vat.address() == self.vat, ClipperError::Miswired("vat"));
        Ok(())
    }

    pub fn rely(&mut self, caller: Address, usr: Address) -> Result<(), ClipperError> {
        self.auth(&caller)?;
        self.wards.rely(usr);
        Ok(())
    }

    pub fn deny(&mut self, caller: Address, usr: Address) -> Result<(), ClipperError> {
        self.auth(&caller)?;
        self.wards.deny(&usr);
        Ok(())
    }

    /// Recognised: `buf`, `cusp` (ray), `tail` (seconds), `chip` (wad),
    /// `tip` (rad), `stopped` (0-3).
    pub fn file(&mut self, caller: Address, what: &str, data: U256) -> Result<(), ClipperError> {
        self.auth(&caller)?;
        match what {
            "buf" => self.buf = Ray(data),
            "tail" => {
                require!(data <= U256::from(u64::MAX), ClipperError::Overflow);
                self.tail = data.low_u64();
            }
            "cusp" => self.cusp = Ray(data),
            "chip" => self.chip = Wad(data),
            "tip" => self.tip = Rad(data),
            "stopped" => {
                require!(data <= U256::from(3u8), ClipperError::StoppedOutOfRange);
                self.stopped = data.low_u32() as u8;
            }
            _ => return Err(ClipperError::UnrecognizedParam),
        }
        log::debug!("Clipper {} file {what} = {data}", self.ilk);
        Ok(())
    }

    /// Recognised: `spotter`, `dog`, `vow`.
    pub fn file_addr(&mut self, caller: Address, what: &str, data: Address) -> Result<(), ClipperError> {
        self.auth(&caller)?;
        match what {
            "spotter" => self.spotter = data,
            "dog" => self.dog = data,
            "vow" => self.vow = data,
            _ => return Err(ClipperError::UnrecognizedParam),
        }
        log::debug!("Clipper {} file {what} = {data:?}", self.ilk);
        Ok(())
    }

    /// Recognised: `calc`.
    pub fn file_calc(
        &mut self,
        caller: Address,
        what: &str,
        calc: Box<dyn Abacus>,
    ) -> Result<(), ClipperError> {
        self.auth(&caller)?;
        require!(what == "calc", ClipperError::UnrecognizedParam);
        log::debug!("Clipper {} file calc = {:?}", self.ilk, calc.address());
        self.calc = calc;
        Ok(())
    }

    /// Mutable access to the price curve for its own `file` calls.
    pub fn calc_mut(&mut self) -> &mut dyn Abacus {
        self.calc.as_mut()
    }

    /// Refreshes the cached minimum auction size from the Vat's dust and the
    /// Dog's penalty.
    pub fn upchost(&mut self, vat: &Vat, dog: &Dog) -> Result<Rad, ClipperError> {
        self.check_vat(vat)?;
        require!(dog.address() == self.dog, ClipperError::Miswired("dog"));
        self.chost = vat.ilk(&self.ilk).dust.wmul(dog.chop(&self.ilk))?;
        Ok(self.chost)
    }

    // --- Pricing ---

    /// Market price in units of `par`, from the Spotter's feed.
    fn feed_price(&self, spotter: &Spotter) -> Result<Ray, ClipperError> {
        require!(spotter.address() == self.spotter, ClipperError::Miswired("spotter"));
        let val = spotter.peek(&self.ilk).ok_or(ClipperError::InvalidPrice)?;
        Ok(val.to_ray()?.rdiv(spotter.par())?)
    }

    fn incentive(&self, tab: Rad) -> Result<Rad, ClipperError> {
        Ok(self.tip.checked_add(tab.wmul(self.chip)?)?)
    }

    /// Current price and whether the sale needs a reset.
    fn status(&self, sale: &Sale, now: Timestamp) -> Result<(bool, Ray), ClipperError> {
        let elapsed = now.checked_sub(sale.tic).ok_or(MathError::Underflow)?;
        let price = self.calc.price(sale.top, elapsed)?;
        let done = elapsed > self.tail || price.rdiv(sale.top)? < self.cusp;
        Ok((done, price))
    }

    pub fn get_status(&self, id: SaleId, now: Timestamp) -> Result<Option<SaleStatus>, ClipperError> {
        let Some(sale) = self.sales.get(&id) else {
            return Ok(None);
        };
        let (done, price) = self.status(sale, now)?;
        Ok(Some(SaleStatus {
            needs_redo: done,
            price,
            lot: sale.lot,
            tab: sale.tab,
        }))
    }

    // --- Auctions ---

    /// Validates a `kick` without side effects.
    pub fn plan_kick(
        &self,
        caller: Address,
        vat: &Vat,
        spotter: &Spotter,
        tab: Rad,
        lot: Wad,
        usr: Address,
    ) -> Result<KickPlan, ClipperError> {
        self.auth(&caller)?;
        self.is_stopped(1)?;
        self.check_vat(vat)?;
        require!(!tab.is_zero(), ClipperError::ZeroTab);
        require!(!lot.is_zero(), ClipperError::ZeroLot);
        require!(!usr.is_zero(), ClipperError::ZeroUsr);
        let id = self.kicks.checked_add(1).ok_or(ClipperError::Overflow)?;

        let top = self.feed_price(spotter)?.rmul(self.buf)?;
        require!(!top.is_zero(), ClipperError::ZeroTopPrice);

        let coin = if !self.tip.is_zero() || !self.chip.is_zero() {
            self.incentive(tab)?
        } else {
            Rad::zero()
        };
        if !coin.is_zero() {
            require!(vat.wards().is_ward(&self.address), VatError::NotAuthorized);
        }
        Ok(KickPlan { id, top, coin })
    }

    /// Starts an auction selling `lot` to cover `tab`, paying the keeper
    /// `kpr` its incentive. Returns the sale id.
    #[allow(clippy::too_many_arguments)]
    pub fn kick(
        &mut self,
        caller: Address,
        vat: &mut Vat,
        spotter: &Spotter,
        now: Timestamp,
        tab: Rad,
        lot: Wad,
        usr: Address,
        kpr: Address,
    ) -> Result<SaleId, ClipperError> {
        let KickPlan { id, top, coin } = self.plan_kick(caller, vat, spotter, tab, lot, usr)?;
        if !coin.is_zero() {
            vat.suck(self.address, self.vow, kpr, coin)?;
        }

        self.kicks = id;
        self.active.push(id);
        self.sales.insert(
            id,
            Sale {
                pos: self.active.len() - 1,
                tab,
                lot,
                usr,
                tic: now,
                top,
            },
        );
        self.events.push(ClipperEvent::Kick {
            id,
            top,
            tab,
            lot,
            usr,
            kpr,
            coin,
        });
        log::info!("✅ Clipper {} kick #{id}: tab={tab} lot={lot} top={top}", self.ilk);
        Ok(id)
    }

    /// Restarts a stale auction at a fresh price.
    pub fn redo(
        &mut self,
        vat: &mut Vat,
        spotter: &Spotter,
        now: Timestamp,
        id: SaleId,
        kpr: Address,
    ) -> Result<(), ClipperError> {
        self.is_stopped(2)?;
        self.check_vat(vat)?;
        let sale = self
            .sales
            .get(&id)
            .copied()
            .ok_or(ClipperError::NotRunningAuction)?;
        let (done, _) = self.status(&sale, now)?;
        require!(done, ClipperError::CannotReset);

        let feed = self.feed_price(spotter)?;
        let top = feed.rmul(self.buf)?;
        require!(!top.is_zero(), ClipperError::ZeroTopPrice);

        let coin = if (!self.tip.is_zero() || !self.chip.is_zero())
            && sale.tab >= self.chost
            && sale.lot.mul_ray(feed)? >= self.chost
        {
            self.incentive(sale.tab)?
        } else {
            Rad::zero()
        };
        if !coin.is_zero() {
            vat.suck(self.address, self.vow, kpr, coin)?;
        }

        if let Some(entry) = self.sales.get_mut(&id) {
            entry.tic = now;
            entry.top = top;
        }
        self.events.push(ClipperEvent::Redo {
            id,
            top,
            tab: sale.tab,
            lot: sale.lot,
            usr: sale.usr,
            kpr,
            coin,
        });
        log::info!("✅ Clipper {} redo #{id}: top={top}", self.ilk);
        Ok(())
    }

    /// Buys up to `amt` collateral from sale `id` at no more than `max` per
    /// unit. The caller pays from its internal sikka (it must have `hope`d
    /// this Clipper) and `who` receives the collateral.
    #[allow(clippy::too_many_arguments)]
    pub fn take(
        &mut self,
        caller: Address,
        vat: &mut Vat,
        dog: &mut Dog,
        now: Timestamp,
        id: SaleId,
        amt: Wad,
        max: Ray,
        who: Address,
    ) -> Result<TakeOutcome, ClipperError> {
        self.is_stopped(3)?;
        self.check_vat(vat)?;
        require!(dog.address() == self.dog, ClipperError::Miswired("dog"));
        let sale = self
            .sales
            .get(&id)
            .copied()
            .ok_or(ClipperError::NotRunningAuction)?;

        let (done, price) = self.status(&sale, now)?;
        require!(!done, ClipperError::NeedsReset);
        require!(max >= price, ClipperError::TooExpensive);

        let mut slice = sale.lot.min(amt);
        let mut owe = slice.mul_ray(price)?;
        if owe > sale.tab {
            owe = sale.tab;
            slice = owe.div_ray(price)?;
        } else if owe < sale.tab && slice < sale.lot && sale.tab.checked_sub(owe)? < self.chost {
            require!(sale.tab > self.chost, ClipperError::NoPartialPurchase);
            owe = sale.tab.checked_sub(self.chost)?;
            slice = owe.div_ray(price)?;
        }

        let tab = sale.tab.checked_sub(owe)?;
        let lot = sale.lot.checked_sub(slice)?;
        let dug = if lot.is_zero() { tab.checked_add(owe)? } else { owe };
        let returned = if !lot.is_zero() && tab.is_zero() { lot } else { Wad::zero() };

        dog.ensure_digs(self.address, &self.ilk, dug)?;
        require!(
            vat.gem(&self.ilk, &self.address) >= slice.checked_add(returned)?,
            ClipperError::CollateralShortfall
        );

        vat.move_sikka(self.address, caller, self.vow, owe)?;
        vat.flux(self.address, self.ilk, self.address, who, slice)?;
        dog.digs(self.address, self.ilk, dug)?;

        if lot.is_zero() {
            self.remove(id);
        } else if tab.is_zero() {
            vat.flux(self.address, self.ilk, self.address, sale.usr, lot)?;
            self.remove(id);
        } else if let Some(entry) = self.sales.get_mut(&id) {
            entry.tab = tab;
            entry.lot = lot;
        }

        self.events.push(ClipperEvent::Take {
            id,
            max,
            price,
            owe,
            tab,
            lot,
            usr: sale.usr,
        });
        log::info!(
            "✅ Clipper {} take #{id}: slice={slice} owe={owe} price={price}",
            self.ilk
        );
        Ok(TakeOutcome { slice, owe })
    }

    /// Cancels a sale, sending its collateral to the caller and releasing its
    /// budget in the Dog.
    pub fn yank(
        &mut self,
        caller: Address,
        vat: &mut Vat,
        dog: &mut Dog,
        id: SaleId,
    ) -> Result<(), ClipperError> {
        self.auth(&caller)?;
        self.check_vat(vat)?;
        require!(dog.address() == self.dog, ClipperError::Miswired("dog"));
        let sale = self
            .sales
            .get(&id)
            .copied()
            .ok_or(ClipperError::NotRunningAuction)?;

        dog.ensure_digs(self.address, &self.ilk, sale.tab)?;
        require!(
            vat.gem(&self.ilk, &self.address) >= sale.lot,
            ClipperError::CollateralShortfall
        );
        vat.flux(self.address, self.ilk, self.address, caller, sale.lot)?;
        dog.digs(self.address, self.ilk, sale.tab)?;
        self.remove(id);

        self.events.push(ClipperEvent::Yank { id });
        log::warn!("Clipper {} yank #{id}", self.ilk);
        Ok(())
    }

    fn remove(&mut self, id: SaleId) {
        let Some(sale) = self.sales.remove(&id) else {
            return;
        };
        let last = self.active.len() - 1;
        if sale.pos != last {
            let moved = self.active[last];
            self.active[sale.pos] = moved;
            if let Some(entry) = self.sales.get_mut(&moved) {
                entry.pos = sale.pos;
            }
        }
        self.active.pop();
    }
}
