//! The module contains the error the ledger engine can throw.
//!
//! The variants follow the operation outcome, not the storage layer:
//!
//! - [`Validation`] for malformed input (split sums that do not reconcile,
//!   unsupported split kinds, non-positive amounts).
//! - [`Authorization`] when the requester is not a member/admin/creator.
//! - [`NotFound`] for missing or invisible expenses, debts, payments, groups.
//! - [`Conflict`] for state conflicts (group finished, already simplified,
//!   amount exceeds the outstanding balance, nothing owed).
//! - [`Integrity`] for post-computation invariant violations; these abort the
//!   whole operation with no partial write.
//!
//! [`Validation`]: LedgerError::Validation
//! [`Authorization`]: LedgerError::Authorization
//! [`NotFound`]: LedgerError::NotFound
//! [`Conflict`]: LedgerError::Conflict
//! [`Integrity`]: LedgerError::Integrity
use sea_orm::DbErr;
use thiserror::Error;

/// Ledger engine custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("not allowed: {0}")]
    Authorization(String),
    #[error("\"{0}\" not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("ledger integrity violated: {0}")]
    Integrity(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Authorization(a), Self::Authorization(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Integrity(a), Self::Integrity(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
