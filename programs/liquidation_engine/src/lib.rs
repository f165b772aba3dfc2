//! Liquidations: the Dog decides what to seize, the Clipper auctions it and
//! an [`Abacus`] sets how the auction price falls over time.

pub mod abacus;
pub mod clipper;
pub mod dog;

pub use abacus::{Abacus, AbacusError, ExponentialDecrease, LinearDecrease, StairstepExponentialDecrease};
pub use clipper::{Clipper, ClipperError, ClipperEvent, KickPlan, Sale, SaleStatus, TakeOutcome};
pub use dog::{Dog, DogError, DogEvent, DogIlk};
