//! Expense lifecycle: recording, editing and deleting shared costs, and
//! the debt rows derived from them.
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    LedgerError, LedgerResult, debt_payments, debts,
    debts::{Debt, DebtStatus},
    expense_payments, expenses,
    expenses::{Expense, ExpenseInput, PayerContribution},
    money::approx_eq,
    netting::net_debts,
    notify::{DebtEvent, DebtNotification},
    split::compute_shares,
};

use super::{Ledger, access, normalize_text, simplification, with_tx};

impl Ledger {
    /// Records a shared expense: validates the request, derives the debt
    /// rows and rebuilds the simplified view when the group runs on it.
    pub async fn add_expense(
        &self,
        group_id: &str,
        creator_id: &str,
        input: &ExpenseInput,
    ) -> LedgerResult<Expense> {
        let input = validated(input)?;
        let lock = self.group_lock(group_id).await;
        let _guard = lock.lock().await;
        let (expense, notifications) = with_tx!(self, |db_tx| {
            let group = access::require_group(&db_tx, group_id).await?;
            access::require_open(&group)?;
            access::require_member(&db_tx, group_id, creator_id).await?;
            let members = access::member_ids(&db_tx, group_id).await?;
            require_participants(&members, &input)?;

            let shares = compute_shares(input.amount, &input.split, &members)?;
            let contributions: Vec<(String, Decimal)> = input
                .payers
                .iter()
                .map(|p| (p.user_id.clone(), p.amount))
                .collect();
            let drafts = net_debts(&contributions, &shares);

            let expense = Expense::from_input(group_id, creator_id, &input);
            expenses::Entity::insert(expenses::ActiveModel::try_from(&expense)?)
                .exec(&db_tx)
                .await?;
            insert_payer_rows(&db_tx, &expense.id, &input.payers).await?;

            let mut notifications = Vec::new();
            if !drafts.is_empty() {
                let rows: Vec<debts::ActiveModel> = drafts
                    .iter()
                    .map(|draft| {
                        debts::ActiveModel::from(&Debt::from_draft(
                            &expense.id,
                            draft,
                            input.split.audit_for(&draft.debtor_id),
                        ))
                    })
                    .collect();
                debts::Entity::insert_many(rows).exec(&db_tx).await?;
                for draft in &drafts {
                    notifications.push(DebtNotification {
                        user_id: draft.debtor_id.clone(),
                        event: DebtEvent::Created,
                        group_id: group_id.to_string(),
                        counterparty_id: draft.creditor_id.clone(),
                        amount: draft.amount,
                        description: expense.description.clone(),
                        is_debtor: true,
                    });
                }
            }
            if group.is_simplified {
                simplification::resimplify(&db_tx, &group).await?;
            }
            tracing::info!(group_id, expense_id = %expense.id, "recorded expense");
            Ok((expense, notifications))
        })?;
        self.dispatch(notifications).await;
        Ok(expense)
    }

    /// Re-derives an expense's debts from an edited request.
    ///
    /// Debts are matched to the recomputed set by (debtor, creditor):
    /// matched rows keep their payment history and get a new amount and
    /// remainder, rows only in the old set are dropped (or retired when
    /// paid against), rows only in the new set are created fresh.
    pub async fn edit_expense(
        &self,
        expense_id: &str,
        editor_id: &str,
        input: &ExpenseInput,
    ) -> LedgerResult<()> {
        let input = validated(input)?;
        let model = access::require_expense(&self.database, expense_id).await?;
        let lock = self.group_lock(&model.group_id).await;
        let _guard = lock.lock().await;
        with_tx!(self, |db_tx| {
            let model = access::require_expense(&db_tx, expense_id).await?;
            let group = access::require_group(&db_tx, &model.group_id).await?;
            access::require_open(&group)?;
            if access::is_synthetic(&group, expense_id) {
                return Err(LedgerError::Conflict(
                    "the simplification expense cannot be edited".to_string(),
                ));
            }
            access::require_admin_or_creator(&db_tx, &group.id, editor_id, &model.creator_id)
                .await?;
            let members = access::member_ids(&db_tx, &group.id).await?;
            require_participants(&members, &input)?;

            let shares = compute_shares(input.amount, &input.split, &members)?;
            let contributions: Vec<(String, Decimal)> = input
                .payers
                .iter()
                .map(|p| (p.user_id.clone(), p.amount))
                .collect();
            let drafts = net_debts(&contributions, &shares);

            let existing = debts::Entity::find()
                .filter(debts::Column::ExpenseId.eq(expense_id))
                .order_by_asc(debts::Column::CreatedAt)
                .order_by_asc(debts::Column::Id)
                .all(&db_tx)
                .await?;
            let existing_ids: Vec<String> = existing.iter().map(|d| d.id.clone()).collect();
            let payments = if existing_ids.is_empty() {
                Vec::new()
            } else {
                debt_payments::Entity::find()
                    .filter(debt_payments::Column::DebtId.is_in(existing_ids))
                    .all(&db_tx)
                    .await?
            };
            let paid_for = |debt_id: &str| -> Decimal {
                payments
                    .iter()
                    .filter(|p| p.debt_id == debt_id)
                    .map(|p| p.amount)
                    .sum()
            };
            let has_payments =
                |debt_id: &str| -> bool { payments.iter().any(|p| p.debt_id == debt_id) };

            let mut matched: Vec<String> = Vec::new();
            for draft in &drafts {
                let candidate = existing
                    .iter()
                    .filter(|d| {
                        d.debtor_id == draft.debtor_id
                            && d.creditor_id == draft.creditor_id
                            && !matched.contains(&d.id)
                    })
                    .max_by_key(|d| (has_payments(&d.id), d.created_at, d.id.clone()));
                let audit = input.split.audit_for(&draft.debtor_id);
                match candidate {
                    Some(old) => {
                        matched.push(old.id.clone());
                        let remaining = (draft.amount - paid_for(&old.id)).max(Decimal::ZERO);
                        debts::Entity::update(debts::ActiveModel {
                            id: Set(old.id.clone()),
                            amount: Set(draft.amount),
                            remaining: Set(remaining),
                            status: Set(DebtStatus::for_remaining(remaining).as_str().to_string()),
                            is_actual: Set(true),
                            percentage: Set(audit.percentage),
                            shares: Set(audit.shares),
                            extra_amount: Set(audit.extra_amount),
                            ..Default::default()
                        })
                        .exec(&db_tx)
                        .await?;
                    }
                    None => {
                        debts::Entity::insert(debts::ActiveModel::from(&Debt::from_draft(
                            expense_id, draft, audit,
                        )))
                        .exec(&db_tx)
                        .await?;
                    }
                }
            }

            for old in existing.iter().filter(|d| !matched.contains(&d.id)) {
                if has_payments(&old.id) {
                    // Paid-against rows are retired, not erased.
                    debts::Entity::update(debts::ActiveModel {
                        id: Set(old.id.clone()),
                        remaining: Set(Decimal::ZERO),
                        status: Set(DebtStatus::Settled.as_str().to_string()),
                        is_actual: Set(false),
                        ..Default::default()
                    })
                    .exec(&db_tx)
                    .await?;
                } else {
                    debts::Entity::delete_by_id(old.id.clone()).exec(&db_tx).await?;
                }
            }

            expenses::Entity::update(expenses::ActiveModel {
                id: Set(expense_id.to_string()),
                description: Set(input.description.clone()),
                amount: Set(input.amount),
                split_type: Set(Some(input.split.kind().as_str().to_string())),
                date: Set(input.date),
                form_data: Set(Some(expenses::form_data_value(&input)?)),
                ..Default::default()
            })
            .exec(&db_tx)
            .await?;
            expense_payments::Entity::delete_many()
                .filter(expense_payments::Column::ExpenseId.eq(expense_id))
                .exec(&db_tx)
                .await?;
            insert_payer_rows(&db_tx, expense_id, &input.payers).await?;

            if group.is_simplified {
                simplification::resimplify(&db_tx, &group).await?;
            }
            tracing::info!(expense_id, "edited expense");
            Ok(())
        })
    }

    /// Removes an expense together with its debts and payer rows.
    pub async fn delete_expense(&self, expense_id: &str, editor_id: &str) -> LedgerResult<()> {
        let model = access::require_expense(&self.database, expense_id).await?;
        let lock = self.group_lock(&model.group_id).await;
        let _guard = lock.lock().await;
        with_tx!(self, |db_tx| {
            let model = access::require_expense(&db_tx, expense_id).await?;
            let group = access::require_group(&db_tx, &model.group_id).await?;
            access::require_open(&group)?;
            if access::is_synthetic(&group, expense_id) {
                return Err(LedgerError::Conflict(
                    "the simplification expense cannot be deleted".to_string(),
                ));
            }
            access::require_admin_or_creator(&db_tx, &group.id, editor_id, &model.creator_id)
                .await?;

            let debt_ids: Vec<String> = debts::Entity::find()
                .filter(debts::Column::ExpenseId.eq(expense_id))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|d| d.id)
                .collect();
            if !debt_ids.is_empty() {
                debt_payments::Entity::delete_many()
                    .filter(debt_payments::Column::DebtId.is_in(debt_ids))
                    .exec(&db_tx)
                    .await?;
                debts::Entity::delete_many()
                    .filter(debts::Column::ExpenseId.eq(expense_id))
                    .exec(&db_tx)
                    .await?;
            }
            expense_payments::Entity::delete_many()
                .filter(expense_payments::Column::ExpenseId.eq(expense_id))
                .exec(&db_tx)
                .await?;
            expenses::Entity::delete_by_id(expense_id).exec(&db_tx).await?;

            if group.is_simplified {
                simplification::resimplify(&db_tx, &group).await?;
            }
            tracing::info!(expense_id, "deleted expense");
            Ok(())
        })
    }

    /// The original request an expense was created from, for pre-filling
    /// an edit form. Admin or creator only.
    pub async fn expense_form_data(
        &self,
        expense_id: &str,
        requester_id: &str,
    ) -> LedgerResult<ExpenseInput> {
        let model = access::require_expense(&self.database, expense_id).await?;
        access::require_admin_or_creator(
            &self.database,
            &model.group_id,
            requester_id,
            &model.creator_id,
        )
        .await?;
        Expense::try_from(model)?
            .form_data
            .ok_or_else(|| LedgerError::NotFound(format!("no form data for expense {expense_id}")))
    }
}

/// Request-shape checks that need no database access.
fn validated(input: &ExpenseInput) -> LedgerResult<ExpenseInput> {
    let description = normalize_text(&input.description, "expense description")?;
    if input.amount <= Decimal::ZERO {
        return Err(LedgerError::Validation(
            "expense amount must be positive".to_string(),
        ));
    }
    if input.payers.is_empty() {
        return Err(LedgerError::Validation(
            "at least one payer is required".to_string(),
        ));
    }
    let mut paid = Decimal::ZERO;
    for (i, payer) in input.payers.iter().enumerate() {
        if payer.amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(format!(
                "payer {} must contribute a positive amount",
                payer.user_id
            )));
        }
        if input.payers[..i].iter().any(|p| p.user_id == payer.user_id) {
            return Err(LedgerError::Validation(format!(
                "payer \"{}\" listed more than once",
                payer.user_id
            )));
        }
        paid += payer.amount;
    }
    if !approx_eq(paid, input.amount) {
        return Err(LedgerError::Validation(format!(
            "payer contributions add up to {paid}, expected {}",
            input.amount
        )));
    }
    Ok(ExpenseInput {
        description,
        ..input.clone()
    })
}

fn require_participants(members: &[String], input: &ExpenseInput) -> LedgerResult<()> {
    for payer in &input.payers {
        if !members.contains(&payer.user_id) {
            return Err(LedgerError::Validation(format!(
                "payer {} is not a group member",
                payer.user_id
            )));
        }
    }
    for debtor in input.split.named_debtors() {
        if !members.iter().any(|m| m == debtor) {
            return Err(LedgerError::Validation(format!(
                "debtor {debtor} is not a group member"
            )));
        }
    }
    Ok(())
}

async fn insert_payer_rows(
    db: &impl ConnectionTrait,
    expense_id: &str,
    payers: &[PayerContribution],
) -> LedgerResult<()> {
    let rows: Vec<expense_payments::ActiveModel> = payers
        .iter()
        .map(|payer| expense_payments::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            expense_id: Set(expense_id.to_string()),
            payer_id: Set(payer.user_id.clone()),
            amount: Set(payer.amount),
        })
        .collect();
    if !rows.is_empty() {
        expense_payments::Entity::insert_many(rows).exec(db).await?;
    }
    Ok(())
}
