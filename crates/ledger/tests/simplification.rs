mod common;

use common::*;
use ledger::LedgerError;
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};

async fn carrier_expense_id(db: &DatabaseConnection, group_id: &str) -> String {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_sql_and_values(
            backend,
            "SELECT simplification_expense_id FROM groups WHERE id = ?",
            vec![group_id.into()],
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get("", "simplification_expense_id").unwrap()
}

#[tokio::test]
async fn cyclic_debts_cancel_out() {
    let (ledger, db, _sink) = ledger_with_db(&["ann", "bob", "cid"]).await;
    let group_id = group_with_members(&ledger, "ann", &["bob", "cid"]).await;
    simple_debt(&ledger, &group_id, "ann", "bob", dec!(20)).await;
    simple_debt(&ledger, &group_id, "bob", "cid", dec!(20)).await;
    simple_debt(&ledger, &group_id, "cid", "ann", dec!(20)).await;

    let count = ledger.enable_simplification(&group_id, "ann").await.unwrap();
    assert_eq!(count, 0);
    assert!(live_debt_rows(&db, &group_id).await.is_empty());
    for user in ["ann", "bob", "cid"] {
        assert_eq!(ledger.user_balance(&group_id, user).await.unwrap(), dec!(0));
    }
}

#[tokio::test]
async fn debt_chains_collapse_without_changing_positions() {
    let (ledger, db, _sink) = ledger_with_db(&["ann", "bob", "cid"]).await;
    let group_id = group_with_members(&ledger, "ann", &["bob", "cid"]).await;
    simple_debt(&ledger, &group_id, "ann", "bob", dec!(50)).await;
    simple_debt(&ledger, &group_id, "bob", "cid", dec!(30)).await;

    let before: Vec<_> = [
        ledger.user_balance(&group_id, "ann").await.unwrap(),
        ledger.user_balance(&group_id, "bob").await.unwrap(),
        ledger.user_balance(&group_id, "cid").await.unwrap(),
    ]
    .to_vec();
    assert_eq!(before, vec![dec!(-50), dec!(20), dec!(30)]);

    let count = ledger.enable_simplification(&group_id, "ann").await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(
        live_debt_rows(&db, &group_id).await,
        vec![
            ("ann".to_string(), "bob".to_string(), dec!(20)),
            ("ann".to_string(), "cid".to_string(), dec!(30)),
        ]
    );
    // Net positions are untouched by the reshaping.
    assert_eq!(ledger.user_balance(&group_id, "ann").await.unwrap(), dec!(-50));
    assert_eq!(ledger.user_balance(&group_id, "bob").await.unwrap(), dec!(20));
    assert_eq!(ledger.user_balance(&group_id, "cid").await.unwrap(), dec!(30));

    // A settlement only overlays the graph; the rebuilt set is identical.
    ledger
        .settle_up(&group_id, "ann", "cid", dec!(10), "ann")
        .await
        .unwrap();
    assert_eq!(
        live_debt_rows(&db, &group_id).await,
        vec![
            ("ann".to_string(), "bob".to_string(), dec!(20)),
            ("ann".to_string(), "cid".to_string(), dec!(30)),
        ]
    );
    assert_eq!(ledger.user_balance(&group_id, "ann").await.unwrap(), dec!(-40));
}

#[tokio::test]
async fn simplified_set_stays_within_the_transfer_bound() {
    let (ledger, db, _sink) = ledger_with_db(&["ann", "bob", "cid", "dee"]).await;
    let group_id = group_with_members(&ledger, "ann", &["bob", "cid", "dee"]).await;
    simple_debt(&ledger, &group_id, "bob", "ann", dec!(25)).await;
    simple_debt(&ledger, &group_id, "cid", "ann", dec!(15)).await;
    simple_debt(&ledger, &group_id, "cid", "bob", dec!(10)).await;
    simple_debt(&ledger, &group_id, "dee", "cid", dec!(40)).await;

    let count = ledger.enable_simplification(&group_id, "ann").await.unwrap();
    assert!(count <= 3);
    assert_eq!(live_debt_rows(&db, &group_id).await.len(), count);
}

#[tokio::test]
async fn mutations_after_enabling_refold_the_graph() {
    let (ledger, db, _sink) = ledger_with_db(&["ann", "bob", "cid"]).await;
    let group_id = group_with_members(&ledger, "ann", &["bob", "cid"]).await;
    let count = ledger.enable_simplification(&group_id, "ann").await.unwrap();
    assert_eq!(count, 0);

    let recorded = ledger
        .add_expense(
            &group_id,
            "ann",
            &expense(
                "groceries",
                dec!(90),
                &[("ann", dec!(90))],
                equal(&["ann", "bob", "cid"]),
            ),
        )
        .await
        .unwrap();
    assert_eq!(
        live_debt_rows(&db, &group_id).await,
        vec![
            ("bob".to_string(), "ann".to_string(), dec!(30)),
            ("cid".to_string(), "ann".to_string(), dec!(30)),
        ]
    );

    ledger.delete_expense(&recorded.id, "ann").await.unwrap();
    assert!(live_debt_rows(&db, &group_id).await.is_empty());
}

#[tokio::test]
async fn enabling_is_admin_only_and_one_way() {
    let (ledger, _db, _sink) = ledger_with_db(&["ann", "bob"]).await;
    let group_id = group_with_members(&ledger, "ann", &["bob"]).await;

    assert!(matches!(
        ledger.enable_simplification(&group_id, "bob").await.unwrap_err(),
        LedgerError::Authorization(_)
    ));
    ledger.enable_simplification(&group_id, "ann").await.unwrap();
    assert!(matches!(
        ledger.enable_simplification(&group_id, "ann").await.unwrap_err(),
        LedgerError::Conflict(_)
    ));
}

#[tokio::test]
async fn the_carrier_expense_is_read_only() {
    let (ledger, db, _sink) = ledger_with_db(&["ann", "bob"]).await;
    let group_id = group_with_members(&ledger, "ann", &["bob"]).await;
    ledger.enable_simplification(&group_id, "ann").await.unwrap();

    let carrier_id = carrier_expense_id(&db, &group_id).await;
    let edit = expense("sneaky", dec!(10), &[("ann", dec!(10))], equal(&["bob"]));
    assert!(matches!(
        ledger.edit_expense(&carrier_id, "ann", &edit).await.unwrap_err(),
        LedgerError::Conflict(_)
    ));
    assert!(matches!(
        ledger.delete_expense(&carrier_id, "ann").await.unwrap_err(),
        LedgerError::Conflict(_)
    ));
}

#[tokio::test]
async fn groups_finish_only_once_everyone_is_square() {
    let (ledger, _db, _sink) = ledger_with_db(&["ann", "bob"]).await;
    let group_id = group_with_members(&ledger, "ann", &["bob"]).await;
    simple_debt(&ledger, &group_id, "bob", "ann", dec!(30)).await;
    ledger.enable_simplification(&group_id, "ann").await.unwrap();

    assert!(matches!(
        ledger.finish_group(&group_id, "ann").await.unwrap_err(),
        LedgerError::Conflict(_)
    ));

    ledger
        .settle_up(&group_id, "bob", "ann", dec!(30), "bob")
        .await
        .unwrap();
    ledger.finish_group(&group_id, "ann").await.unwrap();
    assert!(ledger.is_group_finished(&group_id).await.unwrap());
}
