//! Error types for the modelmart client library.
//!
//! Every failure from a collaborator (wallet, node, contract) is classified into
//! [`ClientError`] at the component boundary, so callers can tell a declined
//! prompt from a contract revert without inspecting message text.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::types::{ListingId, TxHash};
use crate::units::TokenAmount;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No wallet capability is present.
    #[error("No wallet available: install a wallet or enable one in the configuration")]
    WalletUnavailable,

    /// The user declined an account authorization prompt.
    #[error("Wallet authorization rejected: {0}")]
    UserRejected(String),

    /// The wallet could not be reached.
    #[error("Failed to connect to wallet: {0}")]
    ConnectionError(String),

    /// Malformed local input, caught before any network call.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// A write was attempted without a connected signing account.
    #[error("A connected signing account is required")]
    SigningRequired,

    /// Network or read failure.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The user declined to sign a transaction.
    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),

    /// Contract logic rejected the operation.
    #[error("{action} transaction reverted: {reason}")]
    TransactionReverted {
        action: String,
        hash: Option<TxHash>,
        reason: String,
    },

    /// The marketplace allowance was not visible after a confirmed approval.
    #[error("Allowance of {allowance} is below the required {required}")]
    InsufficientApproval {
        required: TokenAmount,
        allowance: TokenAmount,
    },

    /// A contract interface descriptor is missing or malformed.
    #[error("Invalid interface descriptor for {contract}: {reason}")]
    InvalidDescriptor { contract: String, reason: String },

    /// A submitted transaction was not mined in time. It may still land.
    #[error("Transaction {hash} not confirmed within {waited:?}")]
    ConfirmationTimeout { hash: TxHash, waited: Duration },

    /// Another purchase of the same listing is still in flight.
    #[error("A purchase of listing {0} is already in progress")]
    PurchaseInFlight(ListingId),

    /// A confirmed listing could not be located afterwards.
    #[error("Listing created by transaction {0} was not found in the catalog")]
    ListingNotObserved(TxHash),
}

/// Classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No wallet provider is present.
    WalletUnavailable,
    /// The user declined account authorization.
    UserRejected,
    /// The wallet or node could not be reached.
    ConnectionError,
    /// Input failed local validation.
    ValidationError,
    /// No connected signing account.
    SigningRequired,
    /// A read or transport failure.
    RpcError,
    /// The user declined to sign a transaction.
    TransactionRejected,
    /// Contract logic rejected a transaction.
    TransactionReverted,
    /// The allowance was below the price after approval.
    InsufficientApproval,
    /// A contract interface descriptor did not match.
    InvalidDescriptor,
    /// A transaction was not mined in time.
    ConfirmationTimeout,
    /// The listing already has a purchase running.
    PurchaseInFlight,
    /// A confirmed listing was missing from the catalog.
    ListingNotObserved,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WalletUnavailable => "WalletUnavailable",
            Self::UserRejected => "UserRejected",
            Self::ConnectionError => "ConnectionError",
            Self::ValidationError => "ValidationError",
            Self::SigningRequired => "SigningRequired",
            Self::RpcError => "RpcError",
            Self::TransactionRejected => "TransactionRejected",
            Self::TransactionReverted => "TransactionReverted",
            Self::InsufficientApproval => "InsufficientApproval",
            Self::InvalidDescriptor => "InvalidDescriptor",
            Self::ConfirmationTimeout => "ConfirmationTimeout",
            Self::PurchaseInFlight => "PurchaseInFlight",
            Self::ListingNotObserved => "ListingNotObserved",
        };
        f.write_str(name)
    }
}

impl ClientError {
    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WalletUnavailable => ErrorKind::WalletUnavailable,
            Self::UserRejected(_) => ErrorKind::UserRejected,
            Self::ConnectionError(_) => ErrorKind::ConnectionError,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::SigningRequired => ErrorKind::SigningRequired,
            Self::Rpc(_) => ErrorKind::RpcError,
            Self::TransactionRejected(_) => ErrorKind::TransactionRejected,
            Self::TransactionReverted { .. } => ErrorKind::TransactionReverted,
            Self::InsufficientApproval { .. } => ErrorKind::InsufficientApproval,
            Self::InvalidDescriptor { .. } => ErrorKind::InvalidDescriptor,
            Self::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            Self::PurchaseInFlight(_) => ErrorKind::PurchaseInFlight,
            Self::ListingNotObserved(_) => ErrorKind::ListingNotObserved,
        }
    }

    /// Whether repeating the same operation unchanged may succeed.
    ///
    /// Reverts and validation failures need the underlying condition fixed first.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UserRejected(_)
                | Self::ConnectionError(_)
                | Self::Rpc(_)
                | Self::TransactionRejected(_)
                | Self::ConfirmationTimeout { .. }
                | Self::PurchaseInFlight(_)
        )
    }
}

/// Local input validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required text field was empty.
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    /// The amount is not a decimal number.
    #[error("'{value}' is not a valid token amount")]
    MalformedAmount { value: String },

    /// The amount has more fractional digits than the token supports.
    #[error("'{value}' has more than {max} fractional digits")]
    TooManyDecimals { value: String, max: u8 },

    /// The amount does not fit in 256 bits of smallest units.
    #[error("'{value}' exceeds the maximum token amount")]
    AmountOverflow { value: String },

    /// No listing with this id is in the catalog.
    #[error("listing {id} does not exist")]
    UnknownListing { id: ListingId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::WalletUnavailable;
        assert!(err.to_string().contains("install a wallet"));

        let err = ClientError::TransactionReverted {
            action: "purchaseModel".to_string(),
            hash: None,
            reason: "listing already sold".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "purchaseModel transaction reverted: listing already sold"
        );

        let err: ClientError = ValidationError::EmptyField { field: "model name" }.into();
        assert_eq!(err.to_string(), "Invalid input: model name must not be empty");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(ClientError::SigningRequired.kind(), ErrorKind::SigningRequired);
        assert_eq!(
            ClientError::Rpc("timeout".to_string()).kind(),
            ErrorKind::RpcError
        );
        assert_eq!(
            ClientError::PurchaseInFlight(ListingId::from(3)).kind(),
            ErrorKind::PurchaseInFlight
        );
        assert_eq!(ErrorKind::TransactionReverted.to_string(), "TransactionReverted");
    }

    #[test]
    fn test_retry_policy() {
        assert!(ClientError::Rpc("connection reset".to_string()).is_retryable());
        assert!(ClientError::UserRejected("declined".to_string()).is_retryable());
        assert!(!ClientError::WalletUnavailable.is_retryable());
        assert!(!ClientError::TransactionReverted {
            action: "approve".to_string(),
            hash: None,
            reason: "paused".to_string(),
        }
        .is_retryable());
        assert!(
            !ClientError::from(ValidationError::MalformedAmount {
                value: "abc".to_string()
            })
            .is_retryable()
        );
    }
}
