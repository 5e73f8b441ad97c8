#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use ledger::{
    AmountPortion, DebtNotification, ExpenseInput, GroupRole, Ledger, NotificationSink,
    PayerContribution, PercentPortion, SplitSpec,
};
use migration::MigratorTrait;

/// Captures every notification the engine fires, for assertions.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<DebtNotification>>,
}

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(
        &self,
        notification: DebtNotification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.events.lock().unwrap().push(notification);
        Ok(())
    }
}

impl RecordingSink {
    pub fn take(&self) -> Vec<DebtNotification> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

pub async fn ledger_with_db(
    users: &[&str],
) -> (Ledger, DatabaseConnection, Arc<RecordingSink>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    for user in users {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (id, display_name) VALUES (?, ?)",
            vec![(*user).into(), (*user).into()],
        ))
        .await
        .unwrap();
    }
    let sink = Arc::new(RecordingSink::default());
    let ledger = Ledger::builder()
        .database(db.clone())
        .sink(sink.clone())
        .build()
        .await
        .unwrap();
    (ledger, db, sink)
}

/// Creates a group with `admin` plus the given plain members.
pub async fn group_with_members(ledger: &Ledger, admin: &str, members: &[&str]) -> String {
    let group_id = ledger.new_group("Trip", admin).await.unwrap();
    for member in members {
        ledger
            .add_member(&group_id, member, GroupRole::Member, admin)
            .await
            .unwrap();
    }
    group_id
}

pub fn expense(
    description: &str,
    amount: Decimal,
    payers: &[(&str, Decimal)],
    split: SplitSpec,
) -> ExpenseInput {
    ExpenseInput {
        description: description.to_string(),
        amount,
        date: Utc::now(),
        payers: payers
            .iter()
            .map(|(user_id, paid)| PayerContribution {
                user_id: user_id.to_string(),
                amount: *paid,
            })
            .collect(),
        split,
    }
}

pub fn equal(debtor_ids: &[&str]) -> SplitSpec {
    SplitSpec::Equal {
        debtor_ids: debtor_ids.iter().map(ToString::to_string).collect(),
    }
}

pub fn percentage(portions: &[(&str, Decimal)]) -> SplitSpec {
    SplitSpec::Percentage {
        portions: portions
            .iter()
            .map(|(user_id, pct)| PercentPortion {
                user_id: user_id.to_string(),
                percentage: *pct,
            })
            .collect(),
    }
}

pub fn custom(portions: &[(&str, Decimal)]) -> SplitSpec {
    SplitSpec::Custom {
        portions: portions
            .iter()
            .map(|(user_id, amount)| AmountPortion {
                user_id: user_id.to_string(),
                amount: *amount,
            })
            .collect(),
    }
}

/// A one-payer expense whose whole amount lands as a debt `debtor -> creditor`.
pub async fn simple_debt(
    ledger: &Ledger,
    group_id: &str,
    debtor: &str,
    creditor: &str,
    amount: Decimal,
) {
    let input = expense(
        &format!("{debtor} owes {creditor}"),
        amount,
        &[(creditor, amount)],
        custom(&[(debtor, amount)]),
    );
    ledger.add_expense(group_id, creditor, &input).await.unwrap();
}

/// Ids of all recorded debt payments, oldest first.
pub async fn debt_payment_ids(db: &DatabaseConnection) -> Vec<String> {
    let backend = db.get_database_backend();
    let rows = db
        .query_all(Statement::from_string(
            backend,
            "SELECT id FROM debt_payments ORDER BY created_at, id",
        ))
        .await
        .unwrap();
    rows.iter().map(|row| row.try_get("", "id").unwrap()).collect()
}

/// `(debtor, creditor, remaining)` per open debt row of the group's live view.
pub async fn live_debt_rows(
    db: &DatabaseConnection,
    group_id: &str,
) -> Vec<(String, String, Decimal)> {
    let backend = db.get_database_backend();
    let rows = db
        .query_all(Statement::from_sql_and_values(
            backend,
            "SELECT d.debtor_id, d.creditor_id, d.remaining FROM debts d \
             JOIN expenses e ON e.id = d.expense_id \
             WHERE e.group_id = ? AND d.is_actual = 1 AND d.status = 'PENDING' \
             ORDER BY d.debtor_id, d.creditor_id",
            vec![group_id.into()],
        ))
        .await
        .unwrap();
    rows.iter()
        .map(|row| {
            (
                row.try_get("", "debtor_id").unwrap(),
                row.try_get("", "creditor_id").unwrap(),
                row.try_get("", "remaining").unwrap(),
            )
        })
        .collect()
}
