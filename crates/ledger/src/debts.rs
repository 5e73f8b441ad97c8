//! Debt rows: directed, amount-bearing obligations tied to an expense.
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerError, LedgerResult, netting::DebtDraft, split::SplitAudit};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebtStatus {
    Pending,
    Settled,
}

impl DebtStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Settled => "SETTLED",
        }
    }

    /// A debt is settled exactly when nothing remains of it.
    pub fn for_remaining(remaining: Decimal) -> Self {
        if remaining <= Decimal::ZERO {
            Self::Settled
        } else {
            Self::Pending
        }
    }
}

impl TryFrom<&str> for DebtStatus {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "SETTLED" => Ok(Self::Settled),
            other => Err(LedgerError::Validation(format!(
                "invalid debt status: {other}"
            ))),
        }
    }
}

/// A directed obligation from `debtor_id` to `creditor_id`.
///
/// `remaining` only ever decreases through payments; edits and
/// simplification replace the row's live view (`is_actual`) instead of
/// rewriting history.
#[derive(Clone, Debug, PartialEq)]
pub struct Debt {
    pub id: String,
    pub expense_id: String,
    pub debtor_id: String,
    pub creditor_id: String,
    pub amount: Decimal,
    pub remaining: Decimal,
    pub status: DebtStatus,
    pub is_actual: bool,
    pub percentage: Option<Decimal>,
    pub shares: Option<i32>,
    pub extra_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Debt {
    pub fn from_draft(expense_id: &str, draft: &DebtDraft, audit: SplitAudit) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            expense_id: expense_id.to_string(),
            debtor_id: draft.debtor_id.clone(),
            creditor_id: draft.creditor_id.clone(),
            amount: draft.amount,
            remaining: draft.amount,
            status: DebtStatus::Pending,
            is_actual: true,
            percentage: audit.percentage,
            shares: audit.shares,
            extra_amount: audit.extra_amount,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "debts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub expense_id: String,
    pub debtor_id: String,
    pub creditor_id: String,
    pub amount: Decimal,
    pub remaining: Decimal,
    pub status: String,
    pub is_actual: bool,
    pub percentage: Option<Decimal>,
    pub shares: Option<i32>,
    pub extra_amount: Option<Decimal>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Expenses,
    #[sea_orm(has_many = "super::debt_payments::Entity")]
    Payments,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl Related<super::debt_payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Debt> for ActiveModel {
    fn from(debt: &Debt) -> Self {
        Self {
            id: ActiveValue::Set(debt.id.clone()),
            expense_id: ActiveValue::Set(debt.expense_id.clone()),
            debtor_id: ActiveValue::Set(debt.debtor_id.clone()),
            creditor_id: ActiveValue::Set(debt.creditor_id.clone()),
            amount: ActiveValue::Set(debt.amount),
            remaining: ActiveValue::Set(debt.remaining),
            status: ActiveValue::Set(debt.status.as_str().to_string()),
            is_actual: ActiveValue::Set(debt.is_actual),
            percentage: ActiveValue::Set(debt.percentage),
            shares: ActiveValue::Set(debt.shares),
            extra_amount: ActiveValue::Set(debt.extra_amount),
            created_at: ActiveValue::Set(debt.created_at),
        }
    }
}

impl TryFrom<Model> for Debt {
    type Error = LedgerError;

    fn try_from(model: Model) -> LedgerResult<Self> {
        Ok(Self {
            id: model.id,
            expense_id: model.expense_id,
            debtor_id: model.debtor_id,
            creditor_id: model.creditor_id,
            amount: model.amount,
            remaining: model.remaining,
            status: DebtStatus::try_from(model.status.as_str())?,
            is_actual: model.is_actual,
            percentage: model.percentage,
            shares: model.shares,
            extra_amount: model.extra_amount,
            created_at: model.created_at,
        })
    }
}
