//! The deployed system: every component behind one lock.
//!
//! [`Core`] owns the Vat and all the components around it. [`Protocol`]
//! shares a `Core` between threads: views take the read lock, every
//! mutation takes the write lock, and multi-step operations run against a
//! copy that replaces the live state only if every step succeeded.
//!
//! Component events are moved out of `Core` after every committed
//! operation into a bounded log, so the copied state never carries event
//! history.

use crate::config::{
    CollateralAddresses, CollateralParams, DeployedAddresses, NetworkConfig, SystemParams,
};
use crate::error::{ProtocolError, ProtocolResult};
use crate::interaction::Interaction;
use financing_engine::{Drip, Jug};
use ledger_engine::{require, Address, Clock, IlkId, Timestamp, Vat, U256};
use liquidation_engine::{Abacus, Clipper, ClipperEvent, Dog, DogEvent, LinearDecrease};
use oracle_framework::{Poke, PriceFeed, Spotter};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use treasury_engine::Vow;
use wrapping_vault::{GemJoin, SikkaJoin, Token};

pub const SIKKA_SYMBOL: &str = "SIKKA";

/// Events kept for [`Protocol::take_events`] before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 4096;

/// Hands out component addresses derived from the deployer and a counter.
#[derive(Debug, Clone)]
struct AddressAllocator {
    deployer: Address,
    nonce: u64,
}

impl AddressAllocator {
    fn new(deployer: Address) -> Self {
        Self { deployer, nonce: 0 }
    }

    fn next(&mut self) -> Address {
        self.nonce += 1;
        let mut bytes = self.deployer.to_fixed_bytes();
        bytes[0] ^= 0xc0;
        bytes[12..].copy_from_slice(&self.nonce.to_be_bytes());
        Address::from(bytes)
    }
}

/// One onboarded collateral type.
#[derive(Debug, Clone)]
pub struct Collateral {
    pub gem: Token,
    pub join: GemJoin,
    pub clipper: Clipper,
}

/// Anything a component recorded since the last drain.
#[derive(Debug, Clone, Serialize)]
pub enum ProtocolEvent {
    Poke(Poke),
    Drip(Drip),
    Dog(DogEvent),
    Clipper { ilk: IlkId, event: ClipperEvent },
}

#[derive(Debug, Clone)]
pub struct Core {
    pub vat: Vat,
    pub spotter: Spotter,
    pub jug: Jug,
    pub dog: Dog,
    pub vow: Vow,
    pub sikka: Token,
    pub sikka_join: SikkaJoin,
    pub interaction: Interaction,
    pub collaterals: BTreeMap<IlkId, Collateral>,
    addresses: DeployedAddresses,
    allocator: AddressAllocator,
}

impl Core {
    /// Deploys and wires the collateral-independent part of the system,
    /// in the order of the deployment script.
    pub fn bootstrap(deployer: Address, params: &SystemParams) -> ProtocolResult<Self> {
        let mut allocator = AddressAllocator::new(deployer);

        let mut vat = Vat::new(allocator.next(), deployer);
        let mut spotter = Spotter::new(allocator.next(), deployer, vat.address());
        let mut sikka = Token::new(allocator.next(), deployer, SIKKA_SYMBOL);
        let mut sikka_join =
            SikkaJoin::new(allocator.next(), deployer, vat.address(), sikka.address());
        let mut jug = Jug::new(allocator.next(), deployer);
        let mut vow = Vow::new(
            allocator.next(),
            deployer,
            &mut vat,
            sikka_join.address(),
            params.multisig,
        );
        let mut dog = Dog::new(allocator.next(), deployer, vat.address());
        let interaction = Interaction::new(allocator.next(), deployer);
        let ia = interaction.address();

        for usr in [spotter.address(), sikka_join.address(), jug.address(), dog.address(), ia] {
            vat.rely(deployer, usr)?;
        }
        vat.file(deployer, "Line", params.global_line.raw())?;

        sikka.rely(deployer, sikka_join.address())?;
        sikka.set_supply_cap(deployer, params.sikka_supply_cap)?;

        spotter.rely(deployer, ia)?;
        spotter.file(deployer, "par", params.par.raw())?;

        sikka_join.rely(deployer, ia)?;
        sikka_join.rely(deployer, vow.address())?;

        dog.rely(deployer, ia)?;
        dog.file_addr(deployer, "vow", vow.address())?;
        dog.file(deployer, "Hole", params.global_hole.raw())?;

        jug.rely(deployer, ia)?;
        jug.file_addr(deployer, "vow", vow.address())?;
        if !params.base.is_zero() {
            jug.file(deployer, "base", params.base.raw())?;
        }

        vow.rely(deployer, dog.address())?;
        vow.file_addr(deployer, &mut vat, "sikka", sikka.address())?;

        // The Interaction pays sikka out through the join and burns it back in.
        vat.hope(ia, sikka_join.address());
        sikka.approve(ia, sikka_join.address(), Token::unlimited());

        let addresses = DeployedAddresses {
            deployer,
            vat: vat.address(),
            spot: spotter.address(),
            sikka: sikka.address(),
            sikka_join: sikka_join.address(),
            jug: jug.address(),
            vow: vow.address(),
            dog: dog.address(),
            interaction: ia,
            multisig: params.multisig,
            collaterals: BTreeMap::new(),
        };
        log::info!("✅ Core system deployed by {deployer:?}");

        Ok(Self {
            vat,
            spotter,
            jug,
            dog,
            vow,
            sikka,
            sikka_join,
            interaction,
            collaterals: BTreeMap::new(),
            addresses,
            allocator,
        })
    }

    pub fn addresses(&self) -> &DeployedAddresses {
        &self.addresses
    }

    pub fn deployer(&self) -> Address {
        self.addresses.deployer
    }

    pub fn collateral(&self, ilk: &IlkId) -> ProtocolResult<&Collateral> {
        self.collaterals.get(ilk).ok_or(ProtocolError::UnknownIlk(*ilk))
    }

    pub fn collateral_mut(&mut self, ilk: &IlkId) -> ProtocolResult<&mut Collateral> {
        self.collaterals.get_mut(ilk).ok_or(ProtocolError::UnknownIlk(*ilk))
    }

    pub fn ilks(&self) -> impl Iterator<Item = &IlkId> {
        self.collaterals.keys()
    }

    /// Deploys the token, join, price curve and Clipper for a new collateral
    /// type, wires them in, and lets the Interaction register the ilk, price
    /// it and set its duty. `caller` must be a ward of every component.
    ///
    /// Not atomic on its own; [`Protocol::add_collateral`] runs it as one
    /// transaction.
    pub fn add_collateral(
        &mut self,
        caller: Address,
        now: Timestamp,
        params: CollateralParams,
        feed: Arc<dyn PriceFeed>,
    ) -> ProtocolResult<()> {
        self.interaction.auth(&caller)?;
        let ilk = params.ilk;
        require!(!self.collaterals.contains_key(&ilk), ProtocolError::IlkExists(ilk));
        let ia = self.interaction.address();

        let mut abacus = LinearDecrease::new(self.allocator.next(), caller);
        abacus.file(caller, "tau", U256::from(params.tau))?;
        let abacus_address = abacus.address();
        let mut gem = Token::new(self.allocator.next(), caller, &ilk.name());
        let mut join = GemJoin::new(
            self.allocator.next(),
            caller,
            self.vat.address(),
            ilk,
            gem.address(),
        );
        let mut clipper = Clipper::new(
            self.allocator.next(),
            caller,
            self.vat.address(),
            self.spotter.address(),
            self.dog.address(),
            ilk,
            Box::new(abacus),
        );

        self.vat.rely(caller, join.address())?;
        self.vat.rely(caller, clipper.address())?;
        self.vat.file_ilk(caller, ilk, "line", params.line.raw())?;
        self.vat.file_ilk(caller, ilk, "dust", params.dust.raw())?;

        self.spotter.file_pip(caller, ilk, "pip", feed)?;
        join.rely(caller, ia)?;

        self.dog.rely(caller, clipper.address())?;
        self.dog.file_ilk(caller, ilk, "hole", params.hole.raw())?;
        self.dog.file_ilk(caller, ilk, "chop", params.chop.raw())?;
        self.dog.file_clip(caller, ilk, "clip", &clipper)?;

        clipper.rely(caller, ia)?;
        clipper.rely(caller, self.dog.address())?;
        clipper.file(caller, "buf", params.buf.raw())?;
        clipper.file(caller, "tail", U256::from(params.tail))?;
        clipper.file(caller, "cusp", params.cusp.raw())?;
        clipper.file(caller, "chip", params.chip.raw())?;
        clipper.file(caller, "tip", params.tip.raw())?;
        clipper.file(caller, "stopped", U256::from(params.stopped))?;
        clipper.file_addr(caller, "vow", self.vow.address())?;

        gem.approve(ia, join.address(), Token::unlimited());

        // Registration as done by the Interaction's collateral setup.
        self.vat.init(ia, ilk)?;
        self.jug.init(ia, now, ilk)?;
        self.spotter.file_ilk(ia, ilk, "mat", params.mat.raw())?;
        self.spotter.poke(&mut self.vat, ilk)?;
        self.jug.drip(&mut self.vat, now, ilk)?;
        self.jug.file_ilk(ia, now, ilk, "duty", params.duty.raw())?;
        clipper.upchost(&self.vat, &self.dog)?;

        self.addresses.collaterals.insert(
            ilk,
            CollateralAddresses {
                gem: gem.address(),
                gem_join: join.address(),
                clip: clipper.address(),
                abacus: abacus_address,
            },
        );
        self.collaterals.insert(ilk, Collateral { gem, join, clipper });
        log::info!("✅ Collateral {ilk} onboarded");
        Ok(())
    }

    /// Drains the events every component recorded.
    pub fn take_events(&mut self) -> Vec<ProtocolEvent> {
        let mut events: Vec<ProtocolEvent> = self
            .spotter
            .take_events()
            .into_iter()
            .map(ProtocolEvent::Poke)
            .collect();
        events.extend(self.jug.take_events().into_iter().map(ProtocolEvent::Drip));
        events.extend(self.dog.take_events().into_iter().map(ProtocolEvent::Dog));
        for (ilk, collateral) in self.collaterals.iter_mut() {
            events.extend(
                collateral
                    .clipper
                    .take_events()
                    .into_iter()
                    .map(|event| ProtocolEvent::Clipper { ilk: *ilk, event }),
            );
        }
        events
    }
}

/// Events drained from committed operations, oldest first.
#[derive(Debug)]
struct EventLog {
    events: VecDeque<ProtocolEvent>,
    capacity: usize,
    dropped: u64,
}

impl EventLog {
    fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    fn extend(&mut self, events: Vec<ProtocolEvent>) {
        self.events.extend(events);
        self.trim();
    }

    fn trim(&mut self) {
        while self.events.len() > self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
    }
}

/// Shared handle on a deployed system.
#[derive(Clone)]
pub struct Protocol {
    inner: Arc<RwLock<Core>>,
    clock: Arc<dyn Clock>,
    events: Arc<Mutex<EventLog>>,
}

impl Protocol {
    pub fn new(core: Core, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(core)),
            clock,
            events: Arc::new(Mutex::new(EventLog::new(DEFAULT_EVENT_CAPACITY))),
        }
    }

    /// Deploys a full system with one collateral type from a network config.
    pub fn deploy(
        config: &NetworkConfig,
        deployer: Address,
        feed: Arc<dyn PriceFeed>,
        clock: Arc<dyn Clock>,
    ) -> ProtocolResult<Self> {
        let system = config.system_params()?;
        let collateral = config.collateral_params()?;
        let mut core = Core::bootstrap(deployer, &system)?;
        core.add_collateral(deployer, clock.now(), collateral, feed)?;
        log::info!(
            "✅ Protocol deployed: vat={:?} interaction={:?}",
            core.vat.address(),
            core.interaction.address()
        );
        Ok(Self::new(core, clock))
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Core> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Core> {
        self.inner.write()
    }

    pub fn try_write_for(&self, timeout: Duration) -> Option<RwLockWriteGuard<'_, Core>> {
        self.inner.try_write_for(timeout)
    }

    pub fn addresses(&self) -> DeployedAddresses {
        self.read().addresses().clone()
    }

    /// Runs `op` on a copy of the state under the write lock and keeps the
    /// copy only if `op` succeeds. The clock is read after the lock is
    /// taken.
    ///
    /// Every call clones the whole `Core`, so its cost grows with the number
    /// of vaults and open sales.
    pub fn transact<T>(
        &self,
        op: impl FnOnce(&mut Core, Timestamp) -> ProtocolResult<T>,
    ) -> ProtocolResult<T> {
        let mut core = self.inner.write();
        let now = self.clock.now();
        let mut draft = core.clone();
        let out = op(&mut draft, now)?;
        self.record_events(&mut draft);
        *core = draft;
        Ok(out)
    }

    /// Moves the events `core` recorded into the bounded log.
    pub fn record_events(&self, core: &mut Core) {
        let events = core.take_events();
        if !events.is_empty() {
            self.events.lock().extend(events);
        }
    }

    /// Caps the event log; the oldest events go first.
    pub fn set_event_capacity(&self, capacity: usize) {
        let mut buffer = self.events.lock();
        buffer.capacity = capacity;
        buffer.trim();
    }

    /// Events waiting in the log.
    pub fn buffered_events(&self) -> usize {
        self.events.lock().events.len()
    }

    /// Events discarded because the log was full.
    pub fn dropped_events(&self) -> u64 {
        self.events.lock().dropped
    }

    pub fn add_collateral(
        &self,
        caller: Address,
        params: CollateralParams,
        feed: Arc<dyn PriceFeed>,
    ) -> ProtocolResult<()> {
        self.transact(|core, now| core.add_collateral(caller, now, params, feed))
    }

    /// Drains the log, including anything recorded directly on `Core`.
    pub fn take_events(&self) -> Vec<ProtocolEvent> {
        let mut core = self.write();
        let pending = core.take_events();
        let mut buffer = self.events.lock();
        let mut events: Vec<ProtocolEvent> = buffer.events.drain(..).collect();
        events.extend(pending);
        events
    }
}
