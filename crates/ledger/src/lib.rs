//! Shared-expense ledger engine.
//!
//! The engine owns the debt graph of every group: recording expenses,
//! deriving the pairwise debts they imply, consuming those debts through
//! payments and keeping a minimized ("simplified") view of the graph for
//! groups that opt in. It is storage-backed (sea-orm over SQLite/Postgres)
//! and exposes one [`Ledger`] facade; the surrounding application owns
//! users, auth and transport.
//!
//! Construction goes through the builder:
//!
//! ```no_run
//! # async fn demo() -> Result<(), ledger::LedgerError> {
//! let db = sea_orm::Database::connect("sqlite::memory:").await?;
//! let ledger = ledger::Ledger::builder().database(db).build().await?;
//! # Ok(())
//! # }
//! ```

mod debt_payments;
mod debts;
mod error;
mod expense_payments;
mod expenses;
mod group_members;
mod group_payments;
mod groups;
pub mod money;
mod netting;
mod notify;
mod ops;
mod simplify;
mod split;
mod users;

pub use debts::{Debt, DebtStatus};
pub use error::LedgerError;
pub use expenses::{
    Expense, ExpenseInput, PayerContribution, SIMPLIFICATION_DESCRIPTION,
};
pub use group_members::GroupRole;
pub use netting::{DebtDraft, net_debts};
pub use notify::{DebtEvent, DebtNotification, NoopSink, NotificationSink};
pub use ops::{GroupLedgerSummary, Ledger, LedgerBuilder, MemberBalance, MemberPayment, PairBalance};
pub use simplify::min_cash_flow;
pub use split::{
    AmountPortion, ExtraPortion, PercentPortion, SharePortion, SplitAudit, SplitSpec, SplitType,
    compute_shares,
};

/// Convenience alias used throughout the engine.
pub type LedgerResult<T> = Result<T, LedgerError>;
