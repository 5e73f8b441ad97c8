mod common;

use common::*;
use ledger::{DebtEvent, LedgerError};
use rust_decimal_macros::dec;

#[tokio::test]
async fn full_payment_settles_and_reversal_restores() {
    let (ledger, db, sink) = ledger_with_db(&["ann", "bob"]).await;
    let group_id = group_with_members(&ledger, "ann", &["bob"]).await;
    simple_debt(&ledger, &group_id, "bob", "ann", dec!(30)).await;
    sink.take();

    ledger
        .pay_debt(&group_id, "bob", "ann", dec!(30), "bob")
        .await
        .unwrap();
    assert!(live_debt_rows(&db, &group_id).await.is_empty());
    assert_eq!(ledger.user_balance(&group_id, "bob").await.unwrap(), dec!(0));

    let events = sink.take();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.event == DebtEvent::Settled));
    assert!(events.iter().any(|e| e.user_id == "bob" && e.is_debtor));
    assert!(events.iter().any(|e| e.user_id == "ann" && !e.is_debtor));

    // Reversing the payment brings the debt back exactly.
    let payment_ids = debt_payment_ids(&db).await;
    assert_eq!(payment_ids.len(), 1);
    ledger.delete_payment(&payment_ids[0], "bob").await.unwrap();
    assert_eq!(
        live_debt_rows(&db, &group_id).await,
        vec![("bob".to_string(), "ann".to_string(), dec!(30))]
    );
    assert_eq!(ledger.user_balance(&group_id, "bob").await.unwrap(), dec!(-30));

    let events = sink.take();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.event == DebtEvent::Reactivated && e.amount == dec!(30)));
}

#[tokio::test]
async fn invalid_payments_are_rejected() {
    let (ledger, _db, _sink) = ledger_with_db(&["ann", "bob"]).await;
    let group_id = group_with_members(&ledger, "ann", &["bob"]).await;
    simple_debt(&ledger, &group_id, "bob", "ann", dec!(30)).await;

    assert!(matches!(
        ledger
            .pay_debt(&group_id, "bob", "ann", dec!(0), "bob")
            .await
            .unwrap_err(),
        LedgerError::Validation(_)
    ));
    assert!(matches!(
        ledger
            .pay_debt(&group_id, "bob", "ann", dec!(40), "bob")
            .await
            .unwrap_err(),
        LedgerError::Conflict(_)
    ));
    // Nothing pending in the opposite direction.
    assert!(matches!(
        ledger
            .pay_debt(&group_id, "ann", "bob", dec!(10), "ann")
            .await
            .unwrap_err(),
        LedgerError::NotFound(_)
    ));
}

#[tokio::test]
async fn payments_consume_debts_oldest_first() {
    let (ledger, db, _sink) = ledger_with_db(&["ann", "bob"]).await;
    let group_id = group_with_members(&ledger, "ann", &["bob"]).await;
    simple_debt(&ledger, &group_id, "bob", "ann", dec!(30)).await;
    simple_debt(&ledger, &group_id, "bob", "ann", dec!(20)).await;

    // 40 wipes the older 30 and leaves 10 on the newer debt.
    ledger
        .pay_debt(&group_id, "bob", "ann", dec!(40), "bob")
        .await
        .unwrap();
    assert_eq!(
        live_debt_rows(&db, &group_id).await,
        vec![("bob".to_string(), "ann".to_string(), dec!(10))]
    );
    assert_eq!(ledger.user_balance(&group_id, "bob").await.unwrap(), dec!(-10));
}

#[tokio::test]
async fn reversal_after_a_shrinking_edit_caps_the_remainder() {
    let (ledger, db, _sink) = ledger_with_db(&["ann", "bob"]).await;
    let group_id = group_with_members(&ledger, "ann", &["bob"]).await;

    let original = expense(
        "dinner",
        dec!(30),
        &[("ann", dec!(30))],
        custom(&[("bob", dec!(30))]),
    );
    let recorded = ledger.add_expense(&group_id, "ann", &original).await.unwrap();
    ledger
        .pay_debt(&group_id, "bob", "ann", dec!(10), "bob")
        .await
        .unwrap();

    // Shrinking below what was already paid settles the debt outright.
    let shrunk = expense(
        "dinner",
        dec!(5),
        &[("ann", dec!(5))],
        custom(&[("bob", dec!(5))]),
    );
    ledger.edit_expense(&recorded.id, "ann", &shrunk).await.unwrap();
    assert!(live_debt_rows(&db, &group_id).await.is_empty());

    // Reversing the old payment reopens the debt, but never beyond its
    // current amount.
    let payment_ids = debt_payment_ids(&db).await;
    ledger.delete_payment(&payment_ids[0], "bob").await.unwrap();
    assert_eq!(
        live_debt_rows(&db, &group_id).await,
        vec![("bob".to_string(), "ann".to_string(), dec!(5))]
    );
    assert_eq!(ledger.user_balance(&group_id, "bob").await.unwrap(), dec!(-5));
}

#[tokio::test]
async fn mutual_debts_settle_once_a_payment_equalizes_them() {
    let (ledger, db, sink) = ledger_with_db(&["ann", "bob"]).await;
    let group_id = group_with_members(&ledger, "ann", &["bob"]).await;
    simple_debt(&ledger, &group_id, "bob", "ann", dec!(40)).await;
    simple_debt(&ledger, &group_id, "ann", "bob", dec!(25)).await;
    sink.take();

    // 15 brings bob's side down to 25, the mirror of ann's: both settle.
    ledger
        .pay_debt(&group_id, "bob", "ann", dec!(15), "bob")
        .await
        .unwrap();
    assert!(live_debt_rows(&db, &group_id).await.is_empty());
    assert_eq!(ledger.user_balance(&group_id, "ann").await.unwrap(), dec!(0));
    assert_eq!(ledger.user_balance(&group_id, "bob").await.unwrap(), dec!(0));

    let events = sink.take();
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|e| e.event == DebtEvent::Settled && e.amount == dec!(25)));
}

#[tokio::test]
async fn only_admin_or_creator_may_reverse_a_payment() {
    let (ledger, db, _sink) = ledger_with_db(&["ann", "bob", "cid"]).await;
    let group_id = group_with_members(&ledger, "ann", &["bob", "cid"]).await;
    simple_debt(&ledger, &group_id, "bob", "ann", dec!(15)).await;
    ledger
        .pay_debt(&group_id, "bob", "ann", dec!(15), "bob")
        .await
        .unwrap();

    let payment_ids = debt_payment_ids(&db).await;
    assert!(matches!(
        ledger.delete_payment(&payment_ids[0], "cid").await.unwrap_err(),
        LedgerError::Authorization(_)
    ));
    ledger.delete_payment(&payment_ids[0], "ann").await.unwrap();
}

#[tokio::test]
async fn settlements_are_checked_against_the_net_balance() {
    let (ledger, _db, sink) = ledger_with_db(&["ann", "bob"]).await;
    let group_id = group_with_members(&ledger, "ann", &["bob"]).await;
    simple_debt(&ledger, &group_id, "bob", "ann", dec!(50)).await;
    ledger.enable_simplification(&group_id, "ann").await.unwrap();
    sink.take();

    // Nothing owed in the other direction.
    assert!(matches!(
        ledger
            .settle_up(&group_id, "ann", "bob", dec!(10), "ann")
            .await
            .unwrap_err(),
        LedgerError::Conflict(_)
    ));

    ledger
        .settle_up(&group_id, "bob", "ann", dec!(20), "bob")
        .await
        .unwrap();
    assert_eq!(ledger.user_balance(&group_id, "bob").await.unwrap(), dec!(-30));

    // Exceeding what is left is rejected.
    assert!(matches!(
        ledger
            .settle_up(&group_id, "bob", "ann", dec!(40), "bob")
            .await
            .unwrap_err(),
        LedgerError::Conflict(_)
    ));

    // Paying it off exactly settles the pair.
    ledger
        .settle_up(&group_id, "bob", "ann", dec!(30), "bob")
        .await
        .unwrap();
    assert_eq!(ledger.user_balance(&group_id, "bob").await.unwrap(), dec!(0));
    assert_eq!(ledger.user_balance(&group_id, "ann").await.unwrap(), dec!(0));
    let events = sink.take();
    assert!(events.iter().any(|e| e.event == DebtEvent::Settled));
}
