//! Price feeds and the Spotter, which turns feed values into the
//! risk-adjusted `spot` the Vat checks vaults against.

pub mod feed;
pub mod spotter;

pub use feed::{OracleError, PriceFeed, PriceUpdated, SettableFeed, TwapFeed};
pub use spotter::{Poke, SpotIlk, Spotter, SpotterError};
