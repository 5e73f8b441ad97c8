//! Group lifecycle: creation, membership and finishing.
use chrono::Utc;
use sea_orm::{ActiveValue::Set, EntityTrait, TransactionTrait};
use uuid::Uuid;

use crate::{
    LedgerError, LedgerResult, group_members, group_members::GroupRole, groups,
    money::is_negligible,
};

use super::{Ledger, access, balances, normalize_text, with_tx};

impl Ledger {
    /// Creates a group with `creator_id` as its first admin; returns the
    /// new group id.
    pub async fn new_group(&self, name: &str, creator_id: &str) -> LedgerResult<String> {
        let name = normalize_text(name, "group name")?;
        with_tx!(self, |db_tx| {
            access::require_user(&db_tx, creator_id).await?;
            let group_id = Uuid::new_v4().to_string();
            groups::Entity::insert(groups::ActiveModel {
                id: Set(group_id.clone()),
                name: Set(name),
                is_simplified: Set(false),
                simplification_expense_id: Set(None),
                is_finished: Set(false),
                created_at: Set(Utc::now()),
            })
            .exec(&db_tx)
            .await?;
            group_members::Entity::insert(group_members::ActiveModel {
                group_id: Set(group_id.clone()),
                user_id: Set(creator_id.to_string()),
                role: Set(GroupRole::Admin.as_str().to_string()),
                joined_at: Set(Utc::now()),
            })
            .exec(&db_tx)
            .await?;
            tracing::info!(group_id, "created group");
            Ok(group_id)
        })
    }

    /// Adds `user_id` to the group. Only admins may invite.
    pub async fn add_member(
        &self,
        group_id: &str,
        user_id: &str,
        role: GroupRole,
        requester_id: &str,
    ) -> LedgerResult<()> {
        with_tx!(self, |db_tx| {
            let group = access::require_group(&db_tx, group_id).await?;
            access::require_open(&group)?;
            access::require_admin(&db_tx, group_id, requester_id).await?;
            access::require_user(&db_tx, user_id).await?;
            if access::member_role(&db_tx, group_id, user_id)
                .await?
                .is_some()
            {
                return Err(LedgerError::Conflict(format!(
                    "user {user_id} is already a member of group {group_id}"
                )));
            }
            group_members::Entity::insert(group_members::ActiveModel {
                group_id: Set(group_id.to_string()),
                user_id: Set(user_id.to_string()),
                role: Set(role.as_str().to_string()),
                joined_at: Set(Utc::now()),
            })
            .exec(&db_tx)
            .await?;
            Ok(())
        })
    }

    /// Closes the group for further ledger activity.
    ///
    /// Only allowed once every pairwise net balance is within a cent of
    /// zero; a finished group rejects all mutations.
    pub async fn finish_group(&self, group_id: &str, requester_id: &str) -> LedgerResult<()> {
        let lock = self.group_lock(group_id).await;
        let _guard = lock.lock().await;
        with_tx!(self, |db_tx| {
            let group = access::require_group(&db_tx, group_id).await?;
            if group.is_finished {
                return Err(LedgerError::Conflict(format!(
                    "group {group_id} is already finished"
                )));
            }
            access::require_admin(&db_tx, group_id, requester_id).await?;
            for ((a, b), net) in balances::pair_nets(&db_tx, group_id).await? {
                if !is_negligible(net) {
                    return Err(LedgerError::Conflict(format!(
                        "group has an unsettled balance between {a} and {b}"
                    )));
                }
            }
            groups::Entity::update(groups::ActiveModel {
                id: Set(group_id.to_string()),
                is_finished: Set(true),
                ..Default::default()
            })
            .exec(&db_tx)
            .await?;
            tracing::info!(group_id, "finished group");
            Ok(())
        })
    }
}
