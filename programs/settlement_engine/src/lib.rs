//! A deployed Sikka system: wiring from a network config, the user-facing
//! Interaction operations over one shared lock, and the maintenance keeper.

pub mod config;
pub mod error;
pub mod interaction;
pub mod keeper;
pub mod protocol;

pub use config::{
    Amount, CollateralAddresses, CollateralParams, ConfigError, DeployedAddresses, NetworkConfig,
    SystemParams,
};
pub use error::{ProtocolError, ProtocolResult};
pub use interaction::Interaction;
pub use keeper::{Keeper, KeeperError, TickReport, DEFAULT_LOCK_TIMEOUT};
pub use protocol::{
    Collateral, Core, Protocol, ProtocolEvent, DEFAULT_EVENT_CAPACITY, SIKKA_SYMBOL,
};
