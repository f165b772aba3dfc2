//! External tokens and the join adapters that wrap them into the Vat.

pub mod join;
pub mod token;

pub use join::{GemJoin, JoinError, SikkaJoin};
pub use token::{Token, TokenError};
