use fixed::types::I80F48;
use ledger_engine::math::billion;
use ledger_engine::{require, Address, Classify, ErrorKind, Timestamp, Wad, U256};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A collateral price source. `None` means the feed currently has no valid
/// value; the Spotter then writes a zero spot.
pub trait PriceFeed: Send + Sync + fmt::Debug {
    fn peek(&self) -> Option<Wad>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("Unauthorized oracle update")]
    Unauthorized,
    #[error("Invalid price value")]
    InvalidPrice,
    #[error("Price out of bounds")]
    PriceOutOfBounds,
    #[error("Math overflow in oracle calculation")]
    MathOverflow,
    #[error("Oracle is paused")]
    OraclePaused,
    #[error("Oracle is already paused")]
    AlreadyPaused,
    #[error("Oracle is not paused")]
    NotPaused,
}

impl Classify for OracleError {
    fn kind(&self) -> ErrorKind {
        match self {
            OracleError::Unauthorized => ErrorKind::Authorization,
            OracleError::OraclePaused | OracleError::AlreadyPaused | OracleError::NotPaused => {
                ErrorKind::Lifecycle
            }
            OracleError::InvalidPrice | OracleError::PriceOutOfBounds => ErrorKind::Config,
            OracleError::MathOverflow => ErrorKind::Arithmetic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceUpdated {
    pub price: Wad,
    pub timestamp: Timestamp,
}

#[derive(Debug, Default)]
struct FeedState {
    price: Option<Wad>,
    paused: bool,
    last_update: Timestamp,
    updates: Vec<PriceUpdated>,
}

/// A feed whose value is pushed by a single authority. The admin can pause
/// updates (circuit breaker); a paused feed keeps serving its last value.
#[derive(Debug)]
pub struct SettableFeed {
    authority: Address,
    admin: Address,
    state: RwLock<FeedState>,
}

impl SettableFeed {
    pub fn new(authority: Address, admin: Address) -> Self {
        log::info!("✅ Price feed initialized with authority {authority:?}");
        Self {
            authority,
            admin,
            state: RwLock::new(FeedState::default()),
        }
    }

    /// A feed already holding `price`, updated and administered by `authority`.
    pub fn with_price(authority: Address, price: Wad) -> Self {
        let feed = Self::new(authority, authority);
        feed.state.write().price = Some(price);
        feed
    }

    pub fn update_price(&self, caller: Address, price: Wad, now: Timestamp) -> Result<(), OracleError> {
        let mut state = self.state.write();
        require!(!state.paused, OracleError::OraclePaused);
        require!(caller == self.authority, OracleError::Unauthorized);
        require!(!price.is_zero(), OracleError::InvalidPrice);
        require!(price.raw() <= U256::from(u128::MAX), OracleError::PriceOutOfBounds);

        state.price = Some(price);
        state.last_update = now;
        state.updates.push(PriceUpdated { price, timestamp: now });
        log::info!("✅ Price updated: {price}");
        Ok(())
    }

    /// Drops the current value so that `peek` reports no price.
    pub fn void(&self, caller: Address) -> Result<(), OracleError> {
        let mut state = self.state.write();
        require!(caller == self.authority, OracleError::Unauthorized);
        state.price = None;
        log::warn!("Price feed voided");
        Ok(())
    }

    pub fn pause(&self, caller: Address) -> Result<(), OracleError> {
        let mut state = self.state.write();
        require!(caller == self.admin, OracleError::Unauthorized);
        require!(!state.paused, OracleError::AlreadyPaused);
        state.paused = true;
        log::warn!("🛑 ORACLE PAUSED by admin: {caller:?}");
        Ok(())
    }

    pub fn unpause(&self, caller: Address) -> Result<(), OracleError> {
        let mut state = self.state.write();
        require!(caller == self.admin, OracleError::Unauthorized);
        require!(state.paused, OracleError::NotPaused);
        state.paused = false;
        log::info!("✅ ORACLE UNPAUSED by admin: {caller:?}");
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.state.read().paused
    }

    pub fn last_update(&self) -> Timestamp {
        self.state.read().last_update
    }

    pub fn take_updates(&self) -> Vec<PriceUpdated> {
        std::mem::take(&mut self.state.write().updates)
    }
}

impl PriceFeed for SettableFeed {
    fn peek(&self) -> Option<Wad> {
        self.state.read().price
    }
}

#[derive(Debug, Default)]
struct TwapState {
    twap: Option<I80F48>,
    last_update: Timestamp,
}

/// Time-weighted average over another feed.
///
/// `twap' = (twap * window + price * elapsed) / (window + elapsed)`, kept in
/// units of 10^-9 so that the accumulator fits the fixed-point range.
#[derive(Debug)]
pub struct TwapFeed {
    source: Arc<dyn PriceFeed>,
    window: u64,
    state: RwLock<TwapState>,
}

impl TwapFeed {
    pub fn new(source: Arc<dyn PriceFeed>, window: u64) -> Self {
        Self {
            source,
            window,
            state: RwLock::new(TwapState::default()),
        }
    }

    /// Folds the source's current price into the average and returns the result.
    pub fn update(&self, now: Timestamp) -> Result<Wad, OracleError> {
        let price = self.source.peek().ok_or(OracleError::InvalidPrice)?;
        let current = to_fixed(price)?;
        let mut state = self.state.write();

        let next = match state.twap {
            None => {
                log::info!("✅ Initial TWAP calculated: {price}");
                current
            }
            Some(old) => {
                let elapsed = now.saturating_sub(state.last_update);
                if elapsed == 0 {
                    return from_fixed(old);
                }
                let window_weight = I80F48::from_num(self.window);
                let elapsed_weight = I80F48::from_num(elapsed);
                let numerator = old
                    .checked_mul(window_weight)
                    .zip(current.checked_mul(elapsed_weight))
                    .and_then(|(a, b)| a.checked_add(b))
                    .ok_or(OracleError::MathOverflow)?;
                let denominator = window_weight
                    .checked_add(elapsed_weight)
                    .ok_or(OracleError::MathOverflow)?;
                let twap = numerator
                    .checked_div(denominator)
                    .ok_or(OracleError::MathOverflow)?;
                log::debug!(
                    "✅ Time-weighted TWAP calculated (window: {}s, elapsed: {}s)",
                    self.window,
                    elapsed
                );
                twap
            }
        };

        state.twap = Some(next);
        state.last_update = now;
        from_fixed(next)
    }
}

impl PriceFeed for TwapFeed {
    fn peek(&self) -> Option<Wad> {
        self.state
            .read()
            .twap
            .and_then(|twap| from_fixed(twap).ok())
    }
}

fn to_fixed(price: Wad) -> Result<I80F48, OracleError> {
    let scaled = price.raw() / billion();
    require!(scaled <= U256::from(u64::MAX), OracleError::PriceOutOfBounds);
    Ok(I80F48::from_num(scaled.low_u64()))
}

fn from_fixed(value: I80F48) -> Result<Wad, OracleError> {
    let scaled: u64 = value.checked_to_num().ok_or(OracleError::PriceOutOfBounds)?;
    Ok(Wad(U256::from(scaled) * billion()))
}
