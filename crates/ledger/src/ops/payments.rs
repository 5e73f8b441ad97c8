//! Payment flows: consuming debts oldest-first, reversing recorded
//! payments and direct member-to-member settlements.
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    LedgerError, LedgerResult, debt_payments, debts,
    debts::DebtStatus,
    expenses, group_payments,
    money::{EPSILON, approx_eq, round2},
    notify::{DebtEvent, DebtNotification},
};

use super::{Ledger, access, balances, simplification, with_tx};

impl Ledger {
    /// Pays down the pending debts from `debtor_id` to `creditor_id`,
    /// oldest first. The amount may span several debts but must not
    /// exceed their combined remainder.
    pub async fn pay_debt(
        &self,
        group_id: &str,
        debtor_id: &str,
        creditor_id: &str,
        amount: Decimal,
        payer_id: &str,
    ) -> LedgerResult<()> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "payment amount must be positive".to_string(),
            ));
        }
        let lock = self.group_lock(group_id).await;
        let _guard = lock.lock().await;
        let notifications = with_tx!(self, |db_tx| {
            let group = access::require_group(&db_tx, group_id).await?;
            access::require_open(&group)?;
            access::require_member(&db_tx, group_id, payer_id).await?;

            // Only real per-expense debts take direct payments; the
            // carrier set is derived and settled through group payments.
            let mut query = debts::Entity::find()
                .join(JoinType::InnerJoin, debts::Relation::Expenses.def())
                .filter(expenses::Column::GroupId.eq(group_id))
                .filter(debts::Column::DebtorId.eq(debtor_id))
                .filter(debts::Column::CreditorId.eq(creditor_id))
                .filter(debts::Column::Status.eq(DebtStatus::Pending.as_str()))
                .filter(debts::Column::Remaining.gt(Decimal::ZERO))
                .order_by_asc(debts::Column::CreatedAt)
                .order_by_asc(debts::Column::Id);
            if let Some(carrier_id) = group.simplification_expense_id.as_deref() {
                query = query.filter(debts::Column::ExpenseId.ne(carrier_id));
            }
            let open = query.all(&db_tx).await?;
            if open.is_empty() {
                return Err(LedgerError::NotFound(format!(
                    "no pending debts from {debtor_id} to {creditor_id}"
                )));
            }
            let outstanding: Decimal = open.iter().map(|d| d.remaining).sum();
            if amount > outstanding + EPSILON {
                return Err(LedgerError::Conflict(format!(
                    "payment of {amount} exceeds the outstanding {outstanding}"
                )));
            }

            let mut left = amount;
            let mut settled_total = Decimal::ZERO;
            for debt in &open {
                if left <= Decimal::ZERO {
                    break;
                }
                let slice = left.min(debt.remaining);
                debt_payments::Entity::insert(debt_payments::ActiveModel {
                    id: Set(Uuid::new_v4().to_string()),
                    debt_id: Set(debt.id.clone()),
                    amount: Set(slice),
                    creator_id: Set(payer_id.to_string()),
                    created_at: Set(Utc::now()),
                    is_actual: Set(true),
                })
                .exec(&db_tx)
                .await?;
                let remaining = round2(debt.remaining - slice);
                debts::Entity::update(debts::ActiveModel {
                    id: Set(debt.id.clone()),
                    remaining: Set(remaining),
                    status: Set(DebtStatus::for_remaining(remaining).as_str().to_string()),
                    ..Default::default()
                })
                .exec(&db_tx)
                .await?;
                if remaining <= Decimal::ZERO {
                    settled_total += debt.remaining;
                }
                left -= slice;
            }

            // Once the pair's opposing pending totals match, both sides
            // settle outright instead of waiting for two mirror payments.
            let mut pending = debts::Entity::find()
                .join(JoinType::InnerJoin, debts::Relation::Expenses.def())
                .filter(expenses::Column::GroupId.eq(group_id))
                .filter(debts::Column::Status.eq(DebtStatus::Pending.as_str()))
                .filter(
                    debts::Column::DebtorId
                        .eq(debtor_id)
                        .and(debts::Column::CreditorId.eq(creditor_id))
                        .or(debts::Column::DebtorId
                            .eq(creditor_id)
                            .and(debts::Column::CreditorId.eq(debtor_id))),
                );
            if let Some(carrier_id) = group.simplification_expense_id.as_deref() {
                pending = pending.filter(debts::Column::ExpenseId.ne(carrier_id));
            }
            let pending = pending.all(&db_tx).await?;
            let direct: Decimal = pending
                .iter()
                .filter(|d| d.debtor_id == debtor_id)
                .map(|d| d.remaining)
                .sum();
            let reverse: Decimal = pending
                .iter()
                .filter(|d| d.debtor_id == creditor_id)
                .map(|d| d.remaining)
                .sum();
            if direct > Decimal::ZERO && (direct - reverse).abs() < EPSILON {
                let ids: Vec<String> = pending.iter().map(|d| d.id.clone()).collect();
                debts::Entity::update_many()
                    .col_expr(debts::Column::Remaining, Expr::value(Decimal::ZERO))
                    .col_expr(
                        debts::Column::Status,
                        Expr::value(DebtStatus::Settled.as_str()),
                    )
                    .filter(debts::Column::Id.is_in(ids))
                    .exec(&db_tx)
                    .await?;
                settled_total += direct;
            }

            // One settlement event per counter-party, not per debt row.
            let notifications = if settled_total > Decimal::ZERO {
                pair_notifications(
                    DebtEvent::Settled,
                    group_id,
                    debtor_id,
                    creditor_id,
                    settled_total,
                    &group.name,
                )
            } else {
                Vec::new()
            };
            if group.is_simplified {
                simplification::resimplify(&db_tx, &group).await?;
            }
            tracing::info!(group_id, debtor_id, creditor_id, %amount, "recorded debt payment");
            Ok(notifications)
        })?;
        self.dispatch(notifications).await;
        Ok(())
    }

    /// Reverses a recorded payment, restoring the debt's remainder
    /// exactly. A settled debt going back above zero becomes pending
    /// again and both parties are told.
    pub async fn delete_payment(&self, payment_id: &str, requester_id: &str) -> LedgerResult<()> {
        let payment = require_payment(&self.database, payment_id).await?;
        let debt = require_debt(&self.database, &payment.debt_id).await?;
        let expense = access::require_expense(&self.database, &debt.expense_id).await?;
        let lock = self.group_lock(&expense.group_id).await;
        let _guard = lock.lock().await;
        let notifications = with_tx!(self, |db_tx| {
            let payment = require_payment(&db_tx, payment_id).await?;
            let debt = require_debt(&db_tx, &payment.debt_id).await?;
            let expense = access::require_expense(&db_tx, &debt.expense_id).await?;
            let group = access::require_group(&db_tx, &expense.group_id).await?;
            access::require_open(&group)?;
            access::require_admin_or_creator(&db_tx, &group.id, requester_id, &payment.creator_id)
                .await?;

            debt_payments::Entity::delete_by_id(payment_id)
                .exec(&db_tx)
                .await?;
            // An edit may have shrunk the debt below what was once paid;
            // the restored remainder never exceeds the current amount.
            let remaining = round2((debt.remaining + payment.amount).min(debt.amount));
            debts::Entity::update(debts::ActiveModel {
                id: Set(debt.id.clone()),
                remaining: Set(remaining),
                status: Set(DebtStatus::for_remaining(remaining).as_str().to_string()),
                ..Default::default()
            })
            .exec(&db_tx)
            .await?;

            let reactivated =
                debt.status == DebtStatus::Settled.as_str() && remaining > Decimal::ZERO;
            let notifications = if reactivated {
                pair_notifications(
                    DebtEvent::Reactivated,
                    &group.id,
                    &debt.debtor_id,
                    &debt.creditor_id,
                    remaining,
                    &expense.description,
                )
            } else {
                Vec::new()
            };
            if group.is_simplified {
                simplification::resimplify(&db_tx, &group).await?;
            }
            tracing::info!(payment_id, "deleted debt payment");
            Ok(notifications)
        })?;
        self.dispatch(notifications).await;
        Ok(())
    }

    /// Records a direct settlement from `from_id` to `to_id` against the
    /// pair's net outstanding balance.
    pub async fn settle_up(
        &self,
        group_id: &str,
        from_id: &str,
        to_id: &str,
        amount: Decimal,
        creator_id: &str,
    ) -> LedgerResult<()> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "settlement amount must be positive".to_string(),
            ));
        }
        if from_id == to_id {
            return Err(LedgerError::Validation(
                "cannot settle a balance with oneself".to_string(),
            ));
        }
        let lock = self.group_lock(group_id).await;
        let _guard = lock.lock().await;
        let notifications = with_tx!(self, |db_tx| {
            let group = access::require_group(&db_tx, group_id).await?;
            access::require_open(&group)?;
            access::require_member(&db_tx, group_id, creator_id).await?;
            access::require_member(&db_tx, group_id, from_id).await?;
            access::require_member(&db_tx, group_id, to_id).await?;

            let debts = balances::active_debts(&db_tx, group_id).await?;
            let settlements = balances::settlements(&db_tx, group_id).await?;
            let current = balances::directed_net(&debts, &settlements, from_id, to_id);
            if current <= EPSILON {
                return Err(LedgerError::Conflict(format!(
                    "nothing owed from {from_id} to {to_id}"
                )));
            }
            if amount > current + EPSILON {
                return Err(LedgerError::Conflict(format!(
                    "settlement of {amount} exceeds the outstanding {current}"
                )));
            }

            group_payments::Entity::insert(group_payments::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                group_id: Set(group_id.to_string()),
                from_id: Set(from_id.to_string()),
                to_id: Set(to_id.to_string()),
                amount: Set(amount),
                creator_id: Set(creator_id.to_string()),
                created_at: Set(Utc::now()),
            })
            .exec(&db_tx)
            .await?;

            let notifications = if approx_eq(amount, current) {
                pair_notifications(
                    DebtEvent::Settled,
                    group_id,
                    from_id,
                    to_id,
                    amount,
                    &group.name,
                )
            } else {
                Vec::new()
            };
            if group.is_simplified {
                simplification::resimplify(&db_tx, &group).await?;
            }
            tracing::info!(group_id, from_id, to_id, %amount, "recorded settlement");
            Ok(notifications)
        })?;
        self.dispatch(notifications).await;
        Ok(())
    }
}

fn pair_notifications(
    event: DebtEvent,
    group_id: &str,
    debtor_id: &str,
    creditor_id: &str,
    amount: Decimal,
    description: &str,
) -> Vec<DebtNotification> {
    vec![
        DebtNotification {
            user_id: debtor_id.to_string(),
            event,
            group_id: group_id.to_string(),
            counterparty_id: creditor_id.to_string(),
            amount,
            description: description.to_string(),
            is_debtor: true,
        },
        DebtNotification {
            user_id: creditor_id.to_string(),
            event,
            group_id: group_id.to_string(),
            counterparty_id: debtor_id.to_string(),
            amount,
            description: description.to_string(),
            is_debtor: false,
        },
    ]
}

async fn require_payment(
    db: &impl sea_orm::ConnectionTrait,
    payment_id: &str,
) -> LedgerResult<debt_payments::Model> {
    debt_payments::Entity::find_by_id(payment_id)
        .one(db)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("payment {payment_id}")))
}

async fn require_debt(
    db: &impl sea_orm::ConnectionTrait,
    debt_id: &str,
) -> LedgerResult<debts::Model> {
    debts::Entity::find_by_id(debt_id)
        .one(db)
        .await?
        .ok_or_else(|| {
            LedgerError::Integrity(format!("payment references a missing debt {debt_id}"))
        })
}
