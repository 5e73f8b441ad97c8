use std::{collections::HashMap, sync::Arc};

use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;

use crate::{
    LedgerError, LedgerResult,
    notify::{DebtNotification, NoopSink, NotificationSink},
};

mod access;
mod balances;
mod expenses;
mod groups;
mod payments;
mod simplification;

pub use balances::{GroupLedgerSummary, MemberBalance, MemberPayment, PairBalance};

/// Run a block inside a DB transaction, committing on success and rolling back
/// (via drop) on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::LedgerResult<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// The ledger engine: every expense, debt and settlement mutation goes
/// through here, one DB transaction per logical operation.
///
/// A group's debt graph is the consistency unit. Mutations that read the
/// graph and write a derived result (resimplification, settle-up checks)
/// additionally serialize on a per-group async lock so two concurrent
/// requests cannot interleave their read-compute-write cycles.
pub struct Ledger {
    database: DatabaseConnection,
    sink: Arc<dyn NotificationSink>,
    group_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger").finish_non_exhaustive()
    }
}

impl Ledger {
    /// Return a builder for `Ledger`.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }

    pub(super) async fn group_lock(&self, group_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.group_locks.lock().await;
        // Entries nobody outside the map still holds are stale.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(group_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Best-effort delivery: sink failures are logged, never propagated.
    pub(super) async fn dispatch(&self, notifications: Vec<DebtNotification>) {
        for notification in notifications {
            if let Err(err) = self.sink.notify(notification).await {
                tracing::warn!("notification delivery failed: {err}");
            }
        }
    }
}

/// Trims a required text field, rejecting blank values.
pub(super) fn normalize_text(value: &str, label: &str) -> LedgerResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::Validation(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// The builder for `Ledger`.
#[derive(Default)]
pub struct LedgerBuilder {
    database: DatabaseConnection,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl LedgerBuilder {
    /// Pass the required database.
    pub fn database(mut self, db: DatabaseConnection) -> LedgerBuilder {
        self.database = db;
        self
    }

    /// Wire an application notification sink (defaults to a no-op).
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> LedgerBuilder {
        self.sink = Some(sink);
        self
    }

    /// Construct `Ledger`.
    pub async fn build(self) -> LedgerResult<Ledger> {
        Ok(Ledger {
            database: self.database,
            sink: self.sink.unwrap_or_else(|| Arc::new(NoopSink)),
            group_locks: Mutex::new(HashMap::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_group_locks_are_evicted() {
        let ledger = Ledger::builder().build().await.unwrap();

        let held = ledger.group_lock("kept").await;
        let released = ledger.group_lock("stale").await;
        drop(released);

        ledger.group_lock("fresh").await;
        let locks = ledger.group_locks.lock().await;
        assert!(locks.contains_key("kept"));
        assert!(!locks.contains_key("stale"));
        drop(held);
    }
}
