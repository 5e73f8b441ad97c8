//! Debt simplification: collapsing a group's open debts into the minimal
//! transfer set.
//!
//! The per-expense debt rows stay the source of truth. A simplified group
//! additionally carries a synthetic zero-amount expense whose debt set is
//! the minimized view of the graph; that set is derived, rebuilt from the
//! real rows after every mutation and safe to throw away wholesale.
//! Group-level settlements are a read-time overlay and are not consulted
//! here.
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait, sea_query::Expr,
};

use crate::{
    LedgerError, LedgerResult, debt_payments, debts,
    debts::{Debt, DebtStatus},
    expenses,
    expenses::Expense,
    groups,
    netting::accumulate,
    simplify::min_cash_flow,
    split::SplitAudit,
};

use super::{Ledger, access, with_tx};

impl Ledger {
    /// Turns on simplified accounting for a group. Admin-only, one-way.
    ///
    /// Creates the synthetic carrier expense, flips the group flag and
    /// runs the first recompute; returns how many transfers the minimal
    /// set contains.
    pub async fn enable_simplification(
        &self,
        group_id: &str,
        requester_id: &str,
    ) -> LedgerResult<usize> {
        let lock = self.group_lock(group_id).await;
        let _guard = lock.lock().await;
        with_tx!(self, |db_tx| {
            let group = access::require_group(&db_tx, group_id).await?;
            access::require_open(&group)?;
            access::require_admin(&db_tx, group_id, requester_id).await?;
            if group.is_simplified {
                return Err(LedgerError::Conflict(format!(
                    "group {group_id} is already simplified"
                )));
            }

            let carrier = Expense::synthetic(group_id, requester_id);
            expenses::Entity::insert(expenses::ActiveModel::try_from(&carrier)?)
                .exec(&db_tx)
                .await?;
            groups::Entity::update(groups::ActiveModel {
                id: Set(group_id.to_string()),
                is_simplified: Set(true),
                simplification_expense_id: Set(Some(carrier.id.clone())),
                ..Default::default()
            })
            .exec(&db_tx)
            .await?;

            let group = groups::Model {
                is_simplified: true,
                simplification_expense_id: Some(carrier.id),
                ..group
            };
            let count = resimplify(&db_tx, &group).await?;
            tracing::info!(group_id, count, "enabled debt simplification");
            Ok(count)
        })
    }
}

/// Rebuilds the group's synthetic debt set from its open real debts.
///
/// Reads every pending debt with money still outstanding on a
/// non-synthetic expense, nets the per-user positions and replaces the
/// carrier expense's debts with the minimal transfer set. Idempotent for
/// a fixed debt snapshot.
pub(super) async fn resimplify(
    db: &impl ConnectionTrait,
    group: &groups::Model,
) -> LedgerResult<usize> {
    let Some(carrier_id) = group.simplification_expense_id.as_deref() else {
        return Err(LedgerError::Integrity(format!(
            "group {} is simplified but has no carrier expense",
            group.id
        )));
    };

    let real_expense_ids: Vec<String> = expenses::Entity::find()
        .filter(expenses::Column::GroupId.eq(&group.id))
        .filter(expenses::Column::Id.ne(carrier_id))
        .all(db)
        .await?
        .into_iter()
        .map(|e| e.id)
        .collect();

    let mut positions: Vec<(String, Decimal)> = Vec::new();
    if !real_expense_ids.is_empty() {
        let open = debts::Entity::find()
            .filter(debts::Column::ExpenseId.is_in(real_expense_ids.clone()))
            .filter(debts::Column::Status.eq(DebtStatus::Pending.as_str()))
            .filter(debts::Column::Remaining.gt(Decimal::ZERO))
            .order_by_asc(debts::Column::CreatedAt)
            .order_by_asc(debts::Column::Id)
            .all(db)
            .await?;
        for debt in &open {
            accumulate(&mut positions, &debt.creditor_id, debt.remaining);
            accumulate(&mut positions, &debt.debtor_id, -debt.remaining);
        }
    }
    let transfers = min_cash_flow(&positions);

    // The real rows leave the live view; the rebuilt carrier set replaces
    // them. Carrier debts never accumulate payment history, so the old
    // set can be dropped outright.
    if !real_expense_ids.is_empty() {
        let real_debt_ids: Vec<String> = debts::Entity::find()
            .filter(debts::Column::ExpenseId.is_in(real_expense_ids.clone()))
            .all(db)
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();
        debts::Entity::update_many()
            .col_expr(debts::Column::IsActual, Expr::value(false))
            .filter(debts::Column::ExpenseId.is_in(real_expense_ids))
            .exec(db)
            .await?;
        if !real_debt_ids.is_empty() {
            debt_payments::Entity::update_many()
                .col_expr(debt_payments::Column::IsActual, Expr::value(false))
                .filter(debt_payments::Column::DebtId.is_in(real_debt_ids))
                .exec(db)
                .await?;
        }
    }
    debts::Entity::delete_many()
        .filter(debts::Column::ExpenseId.eq(carrier_id))
        .exec(db)
        .await?;

    if !transfers.is_empty() {
        let rows: Vec<debts::ActiveModel> = transfers
            .iter()
            .map(|draft| {
                debts::ActiveModel::from(&Debt::from_draft(carrier_id, draft, SplitAudit::default()))
            })
            .collect();
        debts::Entity::insert_many(rows).exec(db).await?;
    }

    tracing::debug!(
        group_id = %group.id,
        count = transfers.len(),
        "rebuilt simplified debts"
    );
    Ok(transfers.len())
}
