use crate::config::ConfigError;
use financing_engine::JugError;
use ledger_engine::{Classify, ErrorKind, IlkId, MathError, VatError};
use liquidation_engine::{AbacusError, ClipperError, DogError};
use oracle_framework::SpotterError;
use thiserror::Error;
use treasury_engine::VowError;
use wrapping_vault::{JoinError, TokenError};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Interaction/not-authorized")]
    NotAuthorized,
    #[error("Interaction/unknown-collateral: {0}")]
    UnknownIlk(IlkId),
    #[error("Interaction/collateral-exists: {0}")]
    IlkExists(IlkId),
    #[error("Interaction/zero-amount")]
    ZeroAmount,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Vat(#[from] VatError),
    #[error(transparent)]
    Spotter(#[from] SpotterError),
    #[error(transparent)]
    Jug(#[from] JugError),
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Vow(#[from] VowError),
    #[error(transparent)]
    Dog(#[from] DogError),
    #[error(transparent)]
    Clipper(#[from] ClipperError),
    #[error(transparent)]
    Abacus(#[from] AbacusError),
    #[error(transparent)]
    Math(#[from] MathError),
}

impl Classify for ProtocolError {
    fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::NotAuthorized => ErrorKind::Authorization,
            ProtocolError::UnknownIlk(_) | ProtocolError::IlkExists(_) => ErrorKind::Lifecycle,
            ProtocolError::ZeroAmount | ProtocolError::Config(_) => ErrorKind::Config,
            ProtocolError::Vat(e) => e.kind(),
            ProtocolError::Spotter(e) => e.kind(),
            ProtocolError::Jug(e) => e.kind(),
            ProtocolError::Join(e) => e.kind(),
            ProtocolError::Token(e) => e.kind(),
            ProtocolError::Vow(e) => e.kind(),
            ProtocolError::Dog(e) => e.kind(),
            ProtocolError::Clipper(e) => e.kind(),
            ProtocolError::Abacus(e) => e.kind(),
            ProtocolError::Math(e) => e.kind(),
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
