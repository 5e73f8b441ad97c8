//! Outbound notification seam.
//!
//! Delivery (push, mail, whatever the application wires in) is a
//! collaborator concern. The engine fires these events best-effort: a sink
//! failure is logged and swallowed, never rolled back against the ledger
//! write.
use rust_decimal::Decimal;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebtEvent {
    Created,
    Settled,
    Reactivated,
}

impl DebtEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "DEBT_CREATED",
            Self::Settled => "DEBT_SETTLED",
            Self::Reactivated => "DEBT_REACTIVATED",
        }
    }
}

/// What a recipient gets told about a debt change.
#[derive(Clone, Debug, PartialEq)]
pub struct DebtNotification {
    pub user_id: String,
    pub event: DebtEvent,
    pub group_id: String,
    /// The other side of the debt, from the recipient's point of view.
    pub counterparty_id: String,
    pub amount: Decimal,
    pub description: String,
    /// Whether the recipient is the one who owes.
    pub is_debtor: bool,
}

#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        notification: DebtNotification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Default sink: drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

#[async_trait::async_trait]
impl NotificationSink for NoopSink {
    async fn notify(
        &self,
        _notification: DebtNotification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}
