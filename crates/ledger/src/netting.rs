//! The balance netter.
//!
//! Takes who paid and who owes for a single expense and produces the
//! pairwise debt records to persist. This is a plain multi-way
//! reconciliation in input order; it can emit up to
//! `debtors x creditors` edges. Minimizing the transaction count is the
//! simplification engine's job, not this module's.
use rust_decimal::Decimal;

use crate::money::{EPSILON, round2};

/// A directed debt about to be persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct DebtDraft {
    pub debtor_id: String,
    pub creditor_id: String,
    pub amount: Decimal,
}

/// Accumulates `delta` for `user_id`, keeping first-seen order.
pub(crate) fn accumulate(balances: &mut Vec<(String, Decimal)>, user_id: &str, delta: Decimal) {
    match balances.iter_mut().find(|(id, _)| id == user_id) {
        Some((_, balance)) => *balance += delta,
        None => balances.push((user_id.to_string(), delta)),
    }
}

/// Nets payer contributions against debtor shares into pairwise debts.
///
/// `balance[user] = contributions - shares`; users below -0.01 owe money,
/// users above +0.01 are owed. Each debtor pays creditors in input order
/// until exhausted. Emitted amounts are rounded to two decimals.
pub fn net_debts(
    contributions: &[(String, Decimal)],
    shares: &[(String, Decimal)],
) -> Vec<DebtDraft> {
    let mut balances: Vec<(String, Decimal)> = Vec::new();
    for (user_id, paid) in contributions {
        accumulate(&mut balances, user_id, *paid);
    }
    for (user_id, share) in shares {
        accumulate(&mut balances, user_id, -*share);
    }

    let mut debtors: Vec<(String, Decimal)> = Vec::new();
    let mut creditors: Vec<(String, Decimal)> = Vec::new();
    for (user_id, balance) in balances {
        if balance < -EPSILON {
            debtors.push((user_id, -balance));
        } else if balance > EPSILON {
            creditors.push((user_id, balance));
        }
    }

    let mut drafts = Vec::new();
    for (debtor_id, mut owed) in debtors {
        for (creditor_id, available) in &mut creditors {
            if *available <= Decimal::ZERO || owed <= Decimal::ZERO {
                continue;
            }
            let transfer = owed.min(*available);
            drafts.push(DebtDraft {
                debtor_id: debtor_id.clone(),
                creditor_id: creditor_id.clone(),
                amount: round2(transfer),
            });
            owed -= transfer;
            *available -= transfer;
        }
    }
    drafts
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn pairs(entries: &[(&str, Decimal)]) -> Vec<(String, Decimal)> {
        entries
            .iter()
            .map(|(id, amount)| (id.to_string(), *amount))
            .collect()
    }

    #[test]
    fn single_payer_equal_split() {
        // 90 paid by ann, split 30/30/30: two debts of 30 towards ann.
        let debts = net_debts(
            &pairs(&[("ann", dec!(90))]),
            &pairs(&[("ann", dec!(30)), ("bob", dec!(30)), ("eve", dec!(30))]),
        );
        assert_eq!(
            debts,
            vec![
                DebtDraft {
                    debtor_id: "bob".to_string(),
                    creditor_id: "ann".to_string(),
                    amount: dec!(30),
                },
                DebtDraft {
                    debtor_id: "eve".to_string(),
                    creditor_id: "ann".to_string(),
                    amount: dec!(30),
                },
            ]
        );
    }

    #[test]
    fn payer_outside_the_debtor_list() {
        // cid pays 100 for a 60/40 split between ann and bob.
        let debts = net_debts(
            &pairs(&[("cid", dec!(100))]),
            &pairs(&[("ann", dec!(60)), ("bob", dec!(40))]),
        );
        assert_eq!(debts.len(), 2);
        assert_eq!(debts[0].debtor_id, "ann");
        assert_eq!(debts[0].amount, dec!(60));
        assert_eq!(debts[1].debtor_id, "bob");
        assert_eq!(debts[1].amount, dec!(40));
    }

    #[test]
    fn one_debtor_spread_over_two_creditors() {
        let debts = net_debts(
            &pairs(&[("ann", dec!(30)), ("bob", dec!(30))]),
            &pairs(&[("eve", dec!(60))]),
        );
        assert_eq!(debts.len(), 2);
        assert_eq!(debts[0].creditor_id, "ann");
        assert_eq!(debts[0].amount, dec!(30));
        assert_eq!(debts[1].creditor_id, "bob");
        assert_eq!(debts[1].amount, dec!(30));
    }

    #[test]
    fn payer_covering_own_share_owes_nothing() {
        let debts = net_debts(
            &pairs(&[("ann", dec!(50))]),
            &pairs(&[("ann", dec!(25)), ("bob", dec!(25))]),
        );
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].debtor_id, "bob");
        assert_eq!(debts[0].creditor_id, "ann");
        assert_eq!(debts[0].amount, dec!(25));
    }

    #[test]
    fn netting_conserves_total_debt() {
        let contributions = pairs(&[("ann", dec!(70)), ("bob", dec!(30))]);
        let shares = pairs(&[
            ("ann", dec!(25)),
            ("bob", dec!(25)),
            ("eve", dec!(25)),
            ("cid", dec!(25)),
        ]);
        let debts = net_debts(&contributions, &shares);

        let total_debited: Decimal = debts.iter().map(|d| d.amount).sum();
        // eve and cid each owe their full 25 share.
        assert_eq!(total_debited, dec!(50));
    }

    #[test]
    fn balanced_ledger_yields_no_debts() {
        let debts = net_debts(
            &pairs(&[("ann", dec!(25)), ("bob", dec!(25))]),
            &pairs(&[("ann", dec!(25)), ("bob", dec!(25))]),
        );
        assert!(debts.is_empty());
    }
}
