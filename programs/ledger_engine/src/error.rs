use crate::math::MathError;
use serde::Serialize;
use thiserror::Error;

/// Category of a failed operation. Callers branch on this rather than on the
/// individual reason strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Caller lacks ward status or delegation.
    Authorization,
    /// Component caged, or a target not initialized / already initialized.
    Lifecycle,
    /// A safety, ceiling or dust rule would be broken.
    Solvency,
    /// Liquidation budget exhausted or too small for a non-dusty auction.
    Budget,
    /// Auction missing, stale, not stale, or priced above the bid.
    AuctionState,
    /// Unknown parameter key, invalid parameter value or miswired collaborator.
    Config,
    /// Overflow, underflow or division by zero.
    Arithmetic,
}

pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl Classify for MathError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Arithmetic
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VatError {
    #[error("Vat/not-authorized")]
    NotAuthorized,
    #[error("Vat/not-live")]
    NotLive,
    #[error("Vat/ilk-already-init")]
    IlkAlreadyInit,
    #[error("Vat/ilk-not-init")]
    IlkNotInit,
    #[error("Vat/not-allowed")]
    NotAllowed,
    #[error("Vat/not-allowed-u")]
    NotAllowedU,
    #[error("Vat/not-allowed-v")]
    NotAllowedV,
    #[error("Vat/not-allowed-w")]
    NotAllowedW,
    #[error("Vat/ceiling-exceeded")]
    CeilingExceeded,
    #[error("Vat/not-safe")]
    NotSafe,
    #[error("Vat/not-safe-src")]
    NotSafeSrc,
    #[error("Vat/not-safe-dst")]
    NotSafeDst,
    #[error("Vat/dust")]
    Dust,
    #[error("Vat/dust-src")]
    DustSrc,
    #[error("Vat/dust-dst")]
    DustDst,
    #[error("Vat/file-unrecognized-param")]
    UnrecognizedParam,
    #[error(transparent)]
    Math(#[from] MathError),
}

impl Classify for VatError {
    fn kind(&self) -> ErrorKind {
        match self {
            VatError::NotAuthorized
            | VatError::NotAllowed
            | VatError::NotAllowedU
            | VatError::NotAllowedV
            | VatError::NotAllowedW => ErrorKind::Authorization,
            VatError::NotLive | VatError::IlkAlreadyInit | VatError::IlkNotInit => {
                ErrorKind::Lifecycle
            }
            VatError::CeilingExceeded
            | VatError::NotSafe
            | VatError::NotSafeSrc
            | VatError::NotSafeDst
            | VatError::Dust
            | VatError::DustSrc
            | VatError::DustDst => ErrorKind::Solvency,
            VatError::UnrecognizedParam => ErrorKind::Config,
            VatError::Math(e) => e.kind(),
        }
    }
}
