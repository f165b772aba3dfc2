//! Core ledger of the Sikka collateralized debt system: fixed-point units,
//! identifiers, ward sets, the shared error taxonomy and the [`Vat`].

pub mod auth;
pub mod clock;
pub mod error;
pub mod math;
pub mod types;
pub mod vat;

pub use auth::Wards;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Classify, ErrorKind, VatError};
pub use math::{MathError, MathResult, Rad, Ray, SignedRad, Wad};
pub use primitive_types::U256;
pub use types::{Address, IlkId, InvalidIlkId, SaleId, Timestamp};
pub use vat::{Ilk, Urn, Vat};
