//! Expense records and the split-configuration snapshot.
//!
//! An expense's `form_data` column stores the exact [`ExpenseInput`] it was
//! created from. Editing an expense means replacing that value object and
//! re-running the pure split calculator over it; nothing is reconstructed
//! from the derived debt rows.
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    LedgerError, LedgerResult,
    split::{SplitSpec, SplitType},
};

/// Description stamped on the synthetic expense that carries a group's
/// simplified debt set.
pub const SIMPLIFICATION_DESCRIPTION: &str = "Simplified debts";

/// One payer's contribution towards an expense.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayerContribution {
    pub user_id: String,
    pub amount: Decimal,
}

/// Everything needed to (re)build an expense's debts. Persisted verbatim as
/// the expense's `form_data` so an edit can replay the original request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpenseInput {
    pub description: String,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub payers: Vec<PayerContribution>,
    pub split: SplitSpec,
}

/// A recorded shared cost.
#[derive(Clone, Debug, PartialEq)]
pub struct Expense {
    pub id: String,
    pub group_id: String,
    pub creator_id: String,
    pub description: String,
    pub amount: Decimal,
    /// `None` only for the synthetic simplification expense.
    pub split_type: Option<SplitType>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub form_data: Option<ExpenseInput>,
}

impl Expense {
    pub fn from_input(group_id: &str, creator_id: &str, input: &ExpenseInput) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            creator_id: creator_id.to_string(),
            description: input.description.clone(),
            amount: input.amount,
            split_type: Some(input.split.kind()),
            date: input.date,
            created_at: Utc::now(),
            form_data: Some(input.clone()),
        }
    }

    /// The zero-amount placeholder that holds a group's simplified debts.
    pub fn synthetic(group_id: &str, creator_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            creator_id: creator_id.to_string(),
            description: SIMPLIFICATION_DESCRIPTION.to_string(),
            amount: Decimal::ZERO,
            split_type: None,
            date: Utc::now(),
            created_at: Utc::now(),
            form_data: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub creator_id: String,
    pub description: String,
    pub amount: Decimal,
    pub split_type: Option<String>,
    pub date: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub form_data: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::debts::Entity")]
    Debts,
    #[sea_orm(has_many = "super::expense_payments::Entity")]
    Payers,
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Groups,
}

impl Related<super::debts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Debts.def()
    }
}

impl Related<super::expense_payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payers.def()
    }
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Serializes the split snapshot for storage; losing it would make the
/// expense impossible to edit faithfully, so failure aborts the write.
pub(crate) fn form_data_value(input: &ExpenseInput) -> LedgerResult<Json> {
    serde_json::to_value(input)
        .map_err(|err| LedgerError::Integrity(format!("unstorable expense form data: {err}")))
}

impl TryFrom<&Expense> for ActiveModel {
    type Error = LedgerError;

    fn try_from(expense: &Expense) -> LedgerResult<Self> {
        let form_data = expense.form_data.as_ref().map(form_data_value).transpose()?;
        Ok(Self {
            id: ActiveValue::Set(expense.id.clone()),
            group_id: ActiveValue::Set(expense.group_id.clone()),
            creator_id: ActiveValue::Set(expense.creator_id.clone()),
            description: ActiveValue::Set(expense.description.clone()),
            amount: ActiveValue::Set(expense.amount),
            split_type: ActiveValue::Set(expense.split_type.map(|k| k.as_str().to_string())),
            date: ActiveValue::Set(expense.date),
            created_at: ActiveValue::Set(expense.created_at),
            form_data: ActiveValue::Set(form_data),
        })
    }
}

impl TryFrom<Model> for Expense {
    type Error = LedgerError;

    fn try_from(model: Model) -> LedgerResult<Self> {
        let split_type = model
            .split_type
            .as_deref()
            .map(SplitType::try_from)
            .transpose()?;
        let form_data = model
            .form_data
            .map(|value| {
                serde_json::from_value::<ExpenseInput>(value).map_err(|err| {
                    LedgerError::Integrity(format!("unreadable expense form data: {err}"))
                })
            })
            .transpose()?;
        Ok(Self {
            id: model.id,
            group_id: model.group_id,
            creator_id: model.creator_id,
            description: model.description,
            amount: model.amount,
            split_type,
            date: model.date,
            created_at: model.created_at,
            form_data,
        })
    }
}
