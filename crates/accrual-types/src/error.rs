//! Error types for the escrow ledgers.
//!
//! All errors use the `AC_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Authorization errors
//! - 2xx: Lookup errors (deal, seller, offering, subscription)
//! - 3xx: Funds errors
//! - 4xx: Argument errors
//! - 5xx: Token ledger errors
//! - 9xx: General / internal errors
//!
//! Every error aborts the operation that raised it with no partial effect.

use thiserror::Error;

use crate::{AccountId, DealId, OfferingId, TokenAmount};

/// Central error enum for all ledger operations.
#[derive(Debug, Error)]
pub enum AccrualError {
    // =================================================================
    // Authorization Errors (1xx)
    // =================================================================
    /// Only the deal's owner (its buyer) may perform this operation.
    #[error("AC_ERR_100: {caller} is not the owner of {deal_id}")]
    NotDealOwner { deal_id: DealId, caller: AccountId },

    /// Only the offering's seller may perform this operation.
    #[error("AC_ERR_101: {caller} is not the seller of {offering_id}")]
    NotOfferingSeller {
        offering_id: OfferingId,
        caller: AccountId,
    },

    // =================================================================
    // Lookup Errors (2xx)
    // =================================================================
    #[error("AC_ERR_200: Deal not found: {0}")]
    DealNotFound(DealId),

    #[error("AC_ERR_201: Seller {seller} is not registered on {deal_id}")]
    SellerNotRegistered { deal_id: DealId, seller: AccountId },

    #[error("AC_ERR_202: Offering {offering_id} of seller {seller} not found")]
    OfferingNotFound {
        seller: AccountId,
        offering_id: OfferingId,
    },

    #[error("AC_ERR_203: Buyer {buyer} has no subscription to {offering_id}")]
    SubscriptionNotFound {
        offering_id: OfferingId,
        buyer: AccountId,
    },

    // =================================================================
    // Funds Errors (3xx)
    // =================================================================
    /// The request would dip into tokens already owed to a counterparty.
    #[error("AC_ERR_300: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds {
        needed: TokenAmount,
        available: TokenAmount,
    },

    // =================================================================
    // Argument Errors (4xx)
    // =================================================================
    #[error("AC_ERR_400: Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Subscribing requires a non-zero deposit.
    #[error("AC_ERR_401: Subscription deposit must be greater than zero")]
    ZeroDeposit,

    // =================================================================
    // Token Ledger Errors (5xx)
    // =================================================================
    /// The token ledger reported failure; the operation was rolled back.
    #[error("AC_ERR_500: Token transfer of {amount} rejected during {operation}")]
    TransferRejected {
        operation: &'static str,
        amount: TokenAmount,
    },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Token arithmetic left the representable range.
    #[error("AC_ERR_900: Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: &'static str },

    /// Escrow bookkeeping disagrees with the recorded flows.
    #[error("AC_ERR_901: Conservation violation: {reason}")]
    ConservationViolation { reason: String },

    /// Configuration error (invalid config file, zero cadence, etc.).
    #[error("AC_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Coarse classification of an [`AccrualError`], matching the categories a
/// host environment reports to its callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authorization,
    NotFound,
    InsufficientFunds,
    InvalidArgument,
    ExternalTransferFailure,
    Internal,
}

impl AccrualError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotDealOwner { .. } | Self::NotOfferingSeller { .. } => ErrorKind::Authorization,
            Self::DealNotFound(_)
            | Self::SellerNotRegistered { .. }
            | Self::OfferingNotFound { .. }
            | Self::SubscriptionNotFound { .. } => ErrorKind::NotFound,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidArgument { .. } | Self::ZeroDeposit => ErrorKind::InvalidArgument,
            Self::TransferRejected { .. } => ErrorKind::ExternalTransferFailure,
            Self::ArithmeticOverflow { .. }
            | Self::ConservationViolation { .. }
            | Self::Configuration(_) => ErrorKind::Internal,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, AccrualError>;
