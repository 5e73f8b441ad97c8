//! Balance reads: everything here nets the live debt graph against the
//! group-level settlements without mutating either.
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait,
};

use crate::{
    LedgerResult, debt_payments, debts,
    debts::DebtStatus,
    expenses, group_payments,
    money::{is_negligible, round2},
};

use super::{Ledger, access};

/// A member's standing against one counterparty: positive means the
/// counterparty owes the member, negative the other way around.
#[derive(Clone, Debug, PartialEq)]
pub struct PairBalance {
    pub counterparty_id: String,
    pub amount: Decimal,
}

/// One member's net position in a group plus its per-counterparty
/// breakdown.
#[derive(Clone, Debug, PartialEq)]
pub struct MemberBalance {
    pub user_id: String,
    pub balance: Decimal,
    pub breakdown: Vec<PairBalance>,
}

/// Money that actually moved between two members, debt payments and
/// direct settlements combined.
#[derive(Clone, Debug, PartialEq)]
pub struct MemberPayment {
    pub from_id: String,
    pub to_id: String,
    pub amount: Decimal,
}

/// The group-wide financial picture served to clients.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupLedgerSummary {
    pub balances: Vec<MemberBalance>,
    pub payments: Vec<MemberPayment>,
}

impl Ledger {
    /// `user_id`'s net position in one group. Positive means the group
    /// owes the user.
    pub async fn user_balance(&self, group_id: &str, user_id: &str) -> LedgerResult<Decimal> {
        access::require_member(&self.database, group_id, user_id).await?;
        let debts = active_debts(&self.database, group_id).await?;
        let payments = settlements(&self.database, group_id).await?;
        Ok(round2(balance_of(&debts, &payments, user_id)))
    }

    /// `user_id`'s net position summed over every group they belong to.
    pub async fn user_total_balance(&self, user_id: &str) -> LedgerResult<Decimal> {
        access::require_user(&self.database, user_id).await?;
        let debts = debts::Entity::find()
            .filter(debts::Column::IsActual.eq(true))
            .filter(debts::Column::Status.eq(DebtStatus::Pending.as_str()))
            .filter(
                debts::Column::DebtorId
                    .eq(user_id)
                    .or(debts::Column::CreditorId.eq(user_id)),
            )
            .all(&self.database)
            .await?;
        let payments = group_payments::Entity::find()
            .filter(
                group_payments::Column::FromId
                    .eq(user_id)
                    .or(group_payments::Column::ToId.eq(user_id)),
            )
            .all(&self.database)
            .await?;
        Ok(round2(balance_of(&debts, &payments, user_id)))
    }

    /// Per-member balances, pairwise breakdowns and the payment history
    /// between members. Requires membership.
    pub async fn group_ledger_summary(
        &self,
        group_id: &str,
        requester_id: &str,
    ) -> LedgerResult<GroupLedgerSummary> {
        access::require_member(&self.database, group_id, requester_id).await?;
        let members = access::member_ids(&self.database, group_id).await?;
        let debts = active_debts(&self.database, group_id).await?;
        let settlements = settlements(&self.database, group_id).await?;

        let balances = members
            .iter()
            .map(|member| {
                let breakdown = members
                    .iter()
                    .filter(|other| *other != member)
                    .filter_map(|other| {
                        let net = directed_net(&debts, &settlements, other, member);
                        if is_negligible(net) {
                            None
                        } else {
                            Some(PairBalance {
                                counterparty_id: other.clone(),
                                amount: round2(net),
                            })
                        }
                    })
                    .collect();
                MemberBalance {
                    user_id: member.clone(),
                    balance: round2(balance_of(&debts, &settlements, member)),
                    breakdown,
                }
            })
            .collect();

        // Payment history survives edits and simplification, so attribution
        // goes through every debt row, live or not.
        let mut payments: Vec<MemberPayment> = Vec::new();
        let all_rows = all_debts(&self.database, group_id).await?;
        let debt_payments = debt_payments_of(&self.database, group_id).await?;
        for payment in &debt_payments {
            if let Some(debt) = all_rows.iter().find(|d| d.id == payment.debt_id) {
                record_payment(
                    &mut payments,
                    &debt.debtor_id,
                    &debt.creditor_id,
                    payment.amount,
                );
            }
        }
        for settlement in &settlements {
            record_payment(
                &mut payments,
                &settlement.from_id,
                &settlement.to_id,
                settlement.amount,
            );
        }
        payments.sort_by(|a, b| (&a.from_id, &a.to_id).cmp(&(&b.from_id, &b.to_id)));

        Ok(GroupLedgerSummary { balances, payments })
    }
}

fn record_payment(payments: &mut Vec<MemberPayment>, from: &str, to: &str, amount: Decimal) {
    match payments
        .iter_mut()
        .find(|p| p.from_id == from && p.to_id == to)
    {
        Some(existing) => existing.amount += amount,
        None => payments.push(MemberPayment {
            from_id: from.to_string(),
            to_id: to.to_string(),
            amount,
        }),
    }
}

/// All live debt rows of a group, oldest first.
pub(super) async fn active_debts(
    db: &impl ConnectionTrait,
    group_id: &str,
) -> LedgerResult<Vec<debts::Model>> {
    let rows = debts::Entity::find()
        .join(JoinType::InnerJoin, debts::Relation::Expenses.def())
        .filter(expenses::Column::GroupId.eq(group_id))
        .filter(debts::Column::IsActual.eq(true))
        .order_by_asc(debts::Column::CreatedAt)
        .order_by_asc(debts::Column::Id)
        .all(db)
        .await?;
    Ok(rows)
}

/// Direct member-to-member settlements of a group, oldest first.
pub(super) async fn settlements(
    db: &impl ConnectionTrait,
    group_id: &str,
) -> LedgerResult<Vec<group_payments::Model>> {
    let rows = group_payments::Entity::find()
        .filter(group_payments::Column::GroupId.eq(group_id))
        .order_by_asc(group_payments::Column::CreatedAt)
        .order_by_asc(group_payments::Column::Id)
        .all(db)
        .await?;
    Ok(rows)
}

/// Every debt row of a group, regardless of liveness.
async fn all_debts(
    db: &impl ConnectionTrait,
    group_id: &str,
) -> LedgerResult<Vec<debts::Model>> {
    let rows = debts::Entity::find()
        .join(JoinType::InnerJoin, debts::Relation::Expenses.def())
        .filter(expenses::Column::GroupId.eq(group_id))
        .all(db)
        .await?;
    Ok(rows)
}

async fn debt_payments_of(
    db: &impl ConnectionTrait,
    group_id: &str,
) -> LedgerResult<Vec<debt_payments::Model>> {
    let rows = debt_payments::Entity::find()
        .join(JoinType::InnerJoin, debt_payments::Relation::Debts.def())
        .join(JoinType::InnerJoin, debts::Relation::Expenses.def())
        .filter(expenses::Column::GroupId.eq(group_id))
        .order_by_asc(debt_payments::Column::CreatedAt)
        .all(db)
        .await?;
    Ok(rows)
}

/// What `debtor` still owes `creditor` once open debts and settlements in
/// both directions cancel out. Positive means `debtor` owes.
pub(super) fn directed_net(
    debts: &[debts::Model],
    settlements: &[group_payments::Model],
    debtor: &str,
    creditor: &str,
) -> Decimal {
    let mut net = Decimal::ZERO;
    for debt in debts {
        if debt.debtor_id == debtor && debt.creditor_id == creditor {
            net += debt.remaining;
        } else if debt.debtor_id == creditor && debt.creditor_id == debtor {
            net -= debt.remaining;
        }
    }
    for payment in settlements {
        if payment.from_id == debtor && payment.to_id == creditor {
            net -= payment.amount;
        } else if payment.from_id == creditor && payment.to_id == debtor {
            net += payment.amount;
        }
    }
    net
}

/// `user`'s net position over the given rows: credit remaining minus debt
/// remaining, settlements sent minus settlements received.
fn balance_of(
    debts: &[debts::Model],
    settlements: &[group_payments::Model],
    user: &str,
) -> Decimal {
    let mut balance = Decimal::ZERO;
    for debt in debts {
        if debt.creditor_id == user {
            balance += debt.remaining;
        } else if debt.debtor_id == user {
            balance -= debt.remaining;
        }
    }
    for payment in settlements {
        if payment.from_id == user {
            balance += payment.amount;
        } else if payment.to_id == user {
            balance -= payment.amount;
        }
    }
    balance
}

/// Net amount per unordered member pair, keyed `(a, b)` with `a < b`;
/// positive means `a` owes `b`. Pairs are sorted for determinism.
pub(super) async fn pair_nets(
    db: &impl ConnectionTrait,
    group_id: &str,
) -> LedgerResult<Vec<((String, String), Decimal)>> {
    let debts = active_debts(db, group_id).await?;
    let settlements = settlements(db, group_id).await?;

    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut remember = |x: &str, y: &str| {
        let key = if x < y {
            (x.to_string(), y.to_string())
        } else {
            (y.to_string(), x.to_string())
        };
        if !pairs.contains(&key) {
            pairs.push(key);
        }
    };
    for debt in &debts {
        remember(&debt.debtor_id, &debt.creditor_id);
    }
    for payment in &settlements {
        remember(&payment.from_id, &payment.to_id);
    }
    pairs.sort();

    Ok(pairs
        .into_iter()
        .map(|(a, b)| {
            let net = directed_net(&debts, &settlements, &a, &b);
            ((a, b), net)
        })
        .collect())
}
