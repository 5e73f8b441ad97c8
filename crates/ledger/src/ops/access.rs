//! Lookup and authorization helpers shared by the ledger operations.
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::{
    LedgerError, LedgerResult, expenses, group_members, group_members::GroupRole, groups, users,
};

use super::Ledger;

impl Ledger {
    /// Whether `user_id` belongs to `group_id`.
    pub async fn is_group_member(&self, group_id: &str, user_id: &str) -> LedgerResult<bool> {
        Ok(member_role(&self.database, group_id, user_id)
            .await?
            .is_some())
    }

    /// Whether `user_id` is an admin of `group_id`.
    pub async fn is_group_admin(&self, group_id: &str, user_id: &str) -> LedgerResult<bool> {
        Ok(member_role(&self.database, group_id, user_id).await? == Some(GroupRole::Admin))
    }

    /// Whether the group has been closed for new ledger activity.
    pub async fn is_group_finished(&self, group_id: &str) -> LedgerResult<bool> {
        Ok(require_group(&self.database, group_id).await?.is_finished)
    }
}

pub(super) async fn require_group(
    db: &impl ConnectionTrait,
    group_id: &str,
) -> LedgerResult<groups::Model> {
    groups::Entity::find_by_id(group_id)
        .one(db)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("group {group_id}")))
}

/// Finished groups are read-only; every mutation checks this first.
pub(super) fn require_open(group: &groups::Model) -> LedgerResult<()> {
    if group.is_finished {
        return Err(LedgerError::Conflict(format!(
            "group {} is finished",
            group.id
        )));
    }
    Ok(())
}

pub(super) async fn require_user(db: &impl ConnectionTrait, user_id: &str) -> LedgerResult<()> {
    if users::Entity::find_by_id(user_id).one(db).await?.is_none() {
        return Err(LedgerError::NotFound(format!("user {user_id}")));
    }
    Ok(())
}

pub(super) async fn member_role(
    db: &impl ConnectionTrait,
    group_id: &str,
    user_id: &str,
) -> LedgerResult<Option<GroupRole>> {
    let membership = group_members::Entity::find_by_id((group_id.to_string(), user_id.to_string()))
        .one(db)
        .await?;
    membership
        .map(|m| GroupRole::try_from(m.role.as_str()))
        .transpose()
}

pub(super) async fn require_member(
    db: &impl ConnectionTrait,
    group_id: &str,
    user_id: &str,
) -> LedgerResult<GroupRole> {
    member_role(db, group_id, user_id).await?.ok_or_else(|| {
        LedgerError::Authorization(format!("user {user_id} is not a member of group {group_id}"))
    })
}

pub(super) async fn require_admin(
    db: &impl ConnectionTrait,
    group_id: &str,
    user_id: &str,
) -> LedgerResult<()> {
    match require_member(db, group_id, user_id).await? {
        GroupRole::Admin => Ok(()),
        GroupRole::Member => Err(LedgerError::Authorization(format!(
            "user {user_id} is not an admin of group {group_id}"
        ))),
    }
}

/// Admins may touch anything in the group; plain members only what they
/// created themselves.
pub(super) async fn require_admin_or_creator(
    db: &impl ConnectionTrait,
    group_id: &str,
    user_id: &str,
    creator_id: &str,
) -> LedgerResult<()> {
    match require_member(db, group_id, user_id).await? {
        GroupRole::Admin => Ok(()),
        GroupRole::Member if user_id == creator_id => Ok(()),
        GroupRole::Member => Err(LedgerError::Authorization(format!(
            "user {user_id} may not modify this record"
        ))),
    }
}

/// Member ids in join order; split and balance computations rely on a
/// stable ordering.
pub(super) async fn member_ids(
    db: &impl ConnectionTrait,
    group_id: &str,
) -> LedgerResult<Vec<String>> {
    let members = group_members::Entity::find()
        .filter(group_members::Column::GroupId.eq(group_id))
        .order_by_asc(group_members::Column::JoinedAt)
        .order_by_asc(group_members::Column::UserId)
        .all(db)
        .await?;
    Ok(members.into_iter().map(|m| m.user_id).collect())
}

pub(super) async fn require_expense(
    db: &impl ConnectionTrait,
    expense_id: &str,
) -> LedgerResult<expenses::Model> {
    expenses::Entity::find_by_id(expense_id)
        .one(db)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("expense {expense_id}")))
}

/// Whether `expense_id` is the group's synthetic simplification expense.
pub(super) fn is_synthetic(group: &groups::Model, expense_id: &str) -> bool {
    group.simplification_expense_id.as_deref() == Some(expense_id)
}
