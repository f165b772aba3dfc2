//! Periodic maintenance: accrue fees, refresh prices, liquidate unsafe
//! vaults and restart stale auctions.
//!
//! The keeper never blocks on the protocol lock for longer than its
//! timeout. Liquidations refused for lack of budget are retried first on the
//! next tick; anything else that fails is logged and left for the next scan.

use crate::error::ProtocolError;
use crate::protocol::{Core, Protocol};
use ledger_engine::{Address, Classify, ErrorKind, IlkId, SaleId, Timestamp};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("Keeper/lock-timeout after {0:?}")]
    LockTimeout(Duration),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl Classify for KeeperError {
    fn kind(&self) -> ErrorKind {
        match self {
            KeeperError::LockTimeout(_) => ErrorKind::Budget,
            KeeperError::Protocol(e) => e.kind(),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub now: Timestamp,
    pub dripped: Vec<IlkId>,
    pub poked: Vec<IlkId>,
    pub barked: Vec<(IlkId, Address, SaleId)>,
    pub deferred: Vec<(IlkId, Address)>,
    pub redone: Vec<(IlkId, SaleId)>,
    pub failures: usize,
}

pub struct Keeper {
    protocol: Protocol,
    address: Address,
    lock_timeout: Duration,
    deferred: BTreeSet<(IlkId, Address)>,
}

impl Keeper {
    pub fn new(protocol: Protocol, address: Address) -> Self {
        Self {
            protocol,
            address,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            deferred: BTreeSet::new(),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Vaults whose liquidation hit the budget and will be retried.
    pub fn deferred(&self) -> impl Iterator<Item = &(IlkId, Address)> {
        self.deferred.iter()
    }

    pub fn tick(&mut self) -> Result<TickReport, KeeperError> {
        let protocol = self.protocol.clone();
        let mut core = protocol
            .try_write_for(self.lock_timeout)
            .ok_or(KeeperError::LockTimeout(self.lock_timeout))?;
        let now = protocol.now();
        let mut report = TickReport {
            now,
            ..TickReport::default()
        };

        let ilks: Vec<IlkId> = core.ilks().copied().collect();
        for ilk in &ilks {
            match core.drip(now, *ilk) {
                Ok(_) => report.dripped.push(*ilk),
                Err(e) => Self::failed(&mut report, "drip", ilk, &e),
            }
            match core.poke(*ilk) {
                Ok(_) => report.poked.push(*ilk),
                Err(e) => Self::failed(&mut report, "poke", ilk, &e),
            }
        }

        self.liquidate(&mut core, now, &mut report);
        self.reset_stale(&mut core, now, &ilks, &mut report);
        protocol.record_events(&mut core);

        log::info!(
            "✅ Keeper tick at {now}: {} barked, {} deferred, {} redone, {} failed",
            report.barked.len(),
            report.deferred.len(),
            report.redone.len(),
            report.failures
        );
        Ok(report)
    }

    fn liquidate(&mut self, core: &mut Core, now: Timestamp, report: &mut TickReport) {
        let unsafe_now: BTreeSet<(IlkId, Address)> = core.unsafe_urns().into_iter().collect();
        // Vaults deferred last tick go first; those no longer unsafe drop out.
        let retry: Vec<(IlkId, Address)> = std::mem::take(&mut self.deferred)
            .into_iter()
            .filter(|candidate| unsafe_now.contains(candidate))
            .collect();
        let fresh = unsafe_now.iter().filter(|candidate| !retry.contains(*candidate));
        let candidates: Vec<(IlkId, Address)> = retry.iter().chain(fresh).copied().collect();

        for (ilk, urn) in candidates {
            match core.start_auction(now, ilk, urn, self.address) {
                Ok(id) => report.barked.push((ilk, urn, id)),
                Err(e) if e.kind() == ErrorKind::Budget => {
                    log::warn!("Keeper deferring {ilk} {urn:?}: {e}");
                    self.deferred.insert((ilk, urn));
                    report.deferred.push((ilk, urn));
                }
                Err(e) => Self::failed(report, "bark", &ilk, &e),
            }
        }
    }

    fn reset_stale(&self, core: &mut Core, now: Timestamp, ilks: &[IlkId], report: &mut TickReport) {
        for ilk in ilks {
            let stale: Vec<SaleId> = match core.collateral(ilk) {
                Ok(collateral) => collateral
                    .clipper
                    .list()
                    .iter()
                    .copied()
                    .filter(|id| {
                        matches!(
                            collateral.clipper.get_status(*id, now),
                            Ok(Some(status)) if status.needs_redo
                        )
                    })
                    .collect(),
                Err(_) => continue,
            };
            for id in stale {
                match core.reset_auction(now, *ilk, id, self.address) {
                    Ok(()) => report.redone.push((*ilk, id)),
                    Err(e) => Self::failed(report, "redo", ilk, &e),
                }
            }
        }
    }

    fn failed(report: &mut TickReport, step: &str, ilk: &IlkId, e: &ProtocolError) {
        log::warn!("Keeper {step} on {ilk} failed ({:?}): {e}", e.kind());
        report.failures += 1;
    }

    /// Ticks every `period` until `shutdown` turns true or its sender is
    /// dropped. Returns the number of ticks that completed.
    ///
    /// Each tick runs on the blocking pool, since it may wait on the
    /// protocol lock.
    pub async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut interval = tokio::time::interval(period);
        let mut keeper = self;
        let mut ticks = 0;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let handle = tokio::task::spawn_blocking(move || {
                        let outcome = keeper.tick();
                        (keeper, outcome)
                    });
                    let outcome = match handle.await {
                        Ok((returned, outcome)) => {
                            keeper = returned;
                            outcome
                        }
                        Err(e) => {
                            log::error!("Keeper tick panicked: {e}");
                            return ticks;
                        }
                    };
                    match outcome {
                        Ok(_) => ticks += 1,
                        Err(KeeperError::LockTimeout(timeout)) => {
                            log::warn!("Keeper skipped a tick: lock busy for {timeout:?}");
                        }
                        Err(e) => log::warn!("Keeper tick failed: {e}"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        log::info!("Keeper stopped after {ticks} ticks");
        ticks
    }
}
