//! The minimum-cash-flow reduction behind debt simplification.
//!
//! Unlike the balance netter this one sorts both sides by magnitude before
//! matching, which bounds the result to at most `n - 1` transfers for `n`
//! participants with a non-zero balance. The function is pure; loading the
//! active debts and committing the replacement set live in
//! `ops::simplification`.
use rust_decimal::Decimal;

use crate::{
    money::{EPSILON, round2},
    netting::DebtDraft,
};

/// Collapses signed net balances into a minimal transfer set.
///
/// `balances` holds one signed entry per user (positive = is owed money).
/// Users within 0.01 of zero are ignored. Matching is a two-pointer greedy
/// over both lists sorted by descending magnitude, user id as tie-break,
/// so a fixed input always produces the same output.
pub fn min_cash_flow(balances: &[(String, Decimal)]) -> Vec<DebtDraft> {
    let mut debtors: Vec<(String, Decimal)> = Vec::new();
    let mut creditors: Vec<(String, Decimal)> = Vec::new();
    for (user_id, balance) in balances {
        if *balance < -EPSILON {
            debtors.push((user_id.clone(), -*balance));
        } else if *balance > EPSILON {
            creditors.push((user_id.clone(), *balance));
        }
    }

    let by_magnitude =
        |a: &(String, Decimal), b: &(String, Decimal)| b.1.cmp(&a.1).then(a.0.cmp(&b.0));
    debtors.sort_by(by_magnitude);
    creditors.sort_by(by_magnitude);

    let mut transfers = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < debtors.len() && j < creditors.len() {
        let amount = debtors[i].1.min(creditors[j].1);
        transfers.push(DebtDraft {
            debtor_id: debtors[i].0.clone(),
            creditor_id: creditors[j].0.clone(),
            amount: round2(amount),
        });
        debtors[i].1 -= amount;
        creditors[j].1 -= amount;
        if debtors[i].1 <= EPSILON {
            i += 1;
        }
        if creditors[j].1 <= EPSILON {
            j += 1;
        }
    }
    transfers
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal_macros::dec;

    use super::*;

    fn balances(entries: &[(&str, Decimal)]) -> Vec<(String, Decimal)> {
        entries
            .iter()
            .map(|(id, amount)| (id.to_string(), *amount))
            .collect()
    }

    fn net_positions(transfers: &[DebtDraft]) -> HashMap<String, Decimal> {
        let mut positions: HashMap<String, Decimal> = HashMap::new();
        for t in transfers {
            *positions.entry(t.creditor_id.clone()).or_default() += t.amount;
            *positions.entry(t.debtor_id.clone()).or_default() -= t.amount;
        }
        positions
    }

    #[test]
    fn cycle_cancels_out() {
        // A owes B, B owes C, C owes A, all 20: everyone nets to zero.
        let transfers = min_cash_flow(&balances(&[
            ("ann", dec!(0)),
            ("bob", dec!(0)),
            ("cid", dec!(0)),
        ]));
        assert!(transfers.is_empty());
    }

    #[test]
    fn chain_collapses_to_two_edges() {
        // From debts A->B:50, B->C:30 the balances are A:-50, B:+20, C:+30.
        let transfers = min_cash_flow(&balances(&[
            ("ann", dec!(-50)),
            ("bob", dec!(20)),
            ("cid", dec!(30)),
        ]));
        assert_eq!(transfers.len(), 2);
        assert_eq!(
            transfers[0],
            DebtDraft {
                debtor_id: "ann".to_string(),
                creditor_id: "cid".to_string(),
                amount: dec!(30),
            }
        );
        assert_eq!(
            transfers[1],
            DebtDraft {
                debtor_id: "ann".to_string(),
                creditor_id: "bob".to_string(),
                amount: dec!(20),
            }
        );
    }

    #[test]
    fn transfer_count_is_bounded_by_participants() {
        let input = balances(&[
            ("ann", dec!(-70)),
            ("bob", dec!(-30)),
            ("cid", dec!(45)),
            ("dee", dec!(40)),
            ("eve", dec!(15)),
        ]);
        let transfers = min_cash_flow(&input);
        assert!(transfers.len() <= input.len() - 1);
    }

    #[test]
    fn preserves_every_net_position() {
        let input = balances(&[
            ("ann", dec!(-70)),
            ("bob", dec!(-30)),
            ("cid", dec!(45)),
            ("dee", dec!(40)),
            ("eve", dec!(15)),
        ]);
        let positions = net_positions(&min_cash_flow(&input));
        for (user_id, balance) in &input {
            let got = positions.get(user_id).copied().unwrap_or_default();
            assert_eq!(got, *balance, "net position changed for {user_id}");
        }
    }

    #[test]
    fn rerun_on_same_input_is_identical() {
        let input = balances(&[
            ("ann", dec!(-12.25)),
            ("bob", dec!(-7.75)),
            ("cid", dec!(20)),
        ]);
        assert_eq!(min_cash_flow(&input), min_cash_flow(&input));
    }

    #[test]
    fn negligible_balances_are_ignored() {
        let transfers = min_cash_flow(&balances(&[("ann", dec!(0.01)), ("bob", dec!(-0.01))]));
        assert!(transfers.is_empty());
    }
}
