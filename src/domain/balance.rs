//! Balance netting across confirmed shared-expense splits.
//!
//! Netting is a pure fold: the confirmed splits returned by the store are
//! reduced into one signed [`Position`] per counterparty, then partitioned
//! into amounts owed to the user and amounts the user owes. All sums use
//! [`Decimal`], so `Σ to_receive − Σ to_pay == net_balance` holds exactly.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::party::User;
use super::{ExpenseId, SplitId, UserId};

/// A split on a shared expense, with its member's contact details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitShare {
    /// Member who owes the share.
    pub user: User,
    /// Share amount.
    pub amount: Decimal,
    /// Whether the member acknowledged the share.
    pub confirmed: bool,
}

/// A group-shared expense with its creator and every split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedExpense {
    /// Expense identifier.
    pub id: ExpenseId,
    /// User who created and paid the expense.
    pub creator: User,
    /// All splits of the expense, confirmed or not.
    pub splits: Vec<SplitShare>,
}

/// A confirmed split as returned by the store, carrying its expense.
///
/// Several confirmed splits reference the same expense, so the same
/// [`SharedExpense`] appears once per confirmed split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedSplit {
    /// Split identifier.
    pub split: SplitId,
    /// Member owning the split.
    pub user: UserId,
    /// The expense the split belongs to.
    pub expense: SharedExpense,
}

/// Accumulated signed amount between the user and one counterparty.
/// Positive means the counterparty owes the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// The other user.
    pub counterparty: User,
    /// Signed net amount.
    pub amount: Decimal,
}

/// Amount owed between the user and one counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Counterparty identifier.
    pub user_id: UserId,
    /// Counterparty display name.
    pub user_name: String,
    /// Counterparty email.
    pub user_email: String,
    /// Absolute amount (always positive).
    pub amount: Decimal,
}

/// Settlement summary for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// Counterparties who owe the user, ordered by id.
    pub to_receive: Vec<Balance>,
    /// Counterparties the user owes, ordered by id.
    pub to_pay: Vec<Balance>,
    /// Signed total: positive when others owe the user.
    pub net_balance: Decimal,
}

/// Signed contribution of one confirmed split to `user`'s balances.
fn contribution<'a>(
    user: UserId,
    expense: &'a SharedExpense,
    split: &'a SplitShare,
) -> Option<(&'a User, Decimal)> {
    let creator_is_user = expense.creator.id == user;
    let split_is_user = split.user.id == user;
    match (creator_is_user, split_is_user) {
        (true, false) => Some((&split.user, split.amount)),
        (false, true) => Some((&expense.creator, -split.amount)),
        _ => None,
    }
}

/// Folds confirmed splits into one position per counterparty.
///
/// Each expense is processed once no matter how many of its splits are
/// in `splits`; unconfirmed splits on an expense contribute nothing.
#[must_use]
pub fn net_positions(user: UserId, splits: &[ConfirmedSplit]) -> BTreeMap<UserId, Position> {
    let mut seen = BTreeSet::new();
    splits
        .iter()
        .map(|confirmed| &confirmed.expense)
        .filter(|expense| seen.insert(expense.id))
        .flat_map(|expense| {
            expense
                .splits
                .iter()
                .filter(|split| split.confirmed)
                .filter_map(move |split| contribution(user, expense, split))
        })
        .fold(BTreeMap::new(), |mut positions, (counterparty, amount)| {
            positions
                .entry(counterparty.id)
                .and_modify(|position: &mut Position| position.amount += amount)
                .or_insert_with(|| Position {
                    counterparty: counterparty.clone(),
                    amount,
                });
            positions
        })
}

impl BalanceSummary {
    /// Partitions per-counterparty positions into a summary. Positions
    /// netting to exactly zero are dropped.
    #[must_use]
    pub fn from_positions(positions: BTreeMap<UserId, Position>) -> Self {
        positions
            .into_values()
            .fold(Self::default(), |mut summary, position| {
                let balance = Balance {
                    user_id: position.counterparty.id,
                    user_name: position.counterparty.name,
                    user_email: position.counterparty.email,
                    amount: position.amount.abs(),
                };
                if position.amount > Decimal::ZERO {
                    summary.to_receive.push(balance);
                } else if position.amount < Decimal::ZERO {
                    summary.to_pay.push(balance);
                }
                summary.net_balance += position.amount;
                summary
            })
    }

    /// Nets `splits` from the point of view of `user`.
    #[must_use]
    pub fn compute(user: UserId, splits: &[ConfirmedSplit]) -> Self {
        Self::from_positions(net_positions(user, splits))
    }

    /// Total owed to the user.
    #[must_use]
    pub fn total_to_receive(&self) -> Decimal {
        self.to_receive.iter().map(|b| b.amount).sum()
    }

    /// Total the user owes.
    #[must_use]
    pub fn total_to_pay(&self) -> Decimal {
        self.to_pay.iter().map(|b| b.amount).sum()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn user(n: u128, name: &str) -> User {
        User {
            id: UserId::from_uuid(uuid::Uuid::from_u128(n)),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
        }
    }

    fn share(user: &User, amount: Decimal, confirmed: bool) -> SplitShare {
        SplitShare {
            user: user.clone(),
            amount,
            confirmed,
        }
    }

    /// Expands an expense into the rows the store returns: one per
    /// confirmed split.
    fn rows(creator: &User, splits: Vec<SplitShare>) -> Vec<ConfirmedSplit> {
        let expense = SharedExpense {
            id: ExpenseId::new(),
            creator: creator.clone(),
            splits,
        };
        expense
            .splits
            .iter()
            .filter(|s| s.confirmed)
            .map(|s| ConfirmedSplit {
                split: SplitId::new(),
                user: s.user.id,
                expense: expense.clone(),
            })
            .collect()
    }

    #[test]
    fn nets_opposite_expenses_into_one_entry() {
        let u = user(1, "Ursula");
        let v = user(2, "Victor");
        let mut input = rows(&u, vec![share(&u, dec!(50.00), true), share(&v, dec!(50.00), true)]);
        input.extend(rows(&v, vec![share(&v, dec!(30.00), true), share(&u, dec!(30.00), true)]));

        let summary = BalanceSummary::compute(u.id, &input);
        assert_eq!(summary.to_receive.len(), 1);
        assert!(summary.to_pay.is_empty());
        let Some(entry) = summary.to_receive.first() else {
            panic!("expected a receivable");
        };
        assert_eq!(entry.user_id, v.id);
        assert_eq!(entry.user_name, "Victor");
        assert_eq!(entry.amount, dec!(20.00));
        assert_eq!(summary.net_balance, dec!(20.00));
    }

    #[test]
    fn debtor_view_is_mirrored() {
        let u = user(1, "Ursula");
        let v = user(2, "Victor");
        let input = rows(&u, vec![share(&u, dec!(50.00), true), share(&v, dec!(50.00), true)]);

        let summary = BalanceSummary::compute(v.id, &input);
        assert!(summary.to_receive.is_empty());
        assert_eq!(summary.to_pay.first().map(|b| b.amount), Some(dec!(50.00)));
        assert_eq!(summary.net_balance, dec!(-50.00));
    }

    #[test]
    fn unconfirmed_splits_contribute_nothing() {
        let u = user(1, "Ursula");
        let v = user(2, "Victor");
        let input = rows(&u, vec![share(&u, dec!(50.00), true), share(&v, dec!(50.00), false)]);

        let summary = BalanceSummary::compute(u.id, &input);
        assert_eq!(summary, BalanceSummary::default());
    }

    #[test]
    fn never_pairs_user_with_self() {
        let u = user(1, "Ursula");
        let input = rows(&u, vec![share(&u, dec!(10.10), true), share(&u, dec!(33.33), true)]);

        let positions = net_positions(u.id, &input);
        assert!(!positions.contains_key(&u.id));
        assert_eq!(BalanceSummary::compute(u.id, &input), BalanceSummary::default());
    }

    #[test]
    fn ignores_expenses_between_other_users() {
        let u = user(1, "Ursula");
        let v = user(2, "Victor");
        let w = user(3, "Wanda");
        let input = rows(&v, vec![share(&v, dec!(5.00), true), share(&w, dec!(5.00), true)]);

        assert_eq!(BalanceSummary::compute(u.id, &input), BalanceSummary::default());
    }

    #[test]
    fn duplicate_expense_rows_are_counted_once() {
        let u = user(1, "Ursula");
        let v = user(2, "Victor");
        let w = user(3, "Wanda");
        // Three confirmed splits produce three rows for the same expense.
        let input = rows(
            &u,
            vec![
                share(&u, dec!(10.00), true),
                share(&v, dec!(10.00), true),
                share(&w, dec!(10.00), true),
            ],
        );
        assert_eq!(input.len(), 3);

        let summary = BalanceSummary::compute(u.id, &input);
        assert_eq!(summary.net_balance, dec!(20.00));
        assert_eq!(summary.to_receive.len(), 2);
    }

    #[test]
    fn exactly_zero_balance_is_omitted() {
        let u = user(1, "Ursula");
        let v = user(2, "Victor");
        let mut input = rows(&u, vec![share(&v, dec!(12.34), true)]);
        input.extend(rows(&v, vec![share(&u, dec!(12.34), true)]));

        let summary = BalanceSummary::compute(u.id, &input);
        assert!(summary.to_receive.is_empty());
        assert!(summary.to_pay.is_empty());
        assert_eq!(summary.net_balance, Decimal::ZERO);
    }

    #[test]
    fn zero_sum_holds_for_decimal_sensitive_amounts() {
        let u = user(1, "Ursula");
        let others: Vec<User> = (2..=7).map(|n| user(n, &format!("Member{n}"))).collect();
        let amounts = [
            dec!(10.10),
            dec!(33.33),
            dec!(0.01),
            dec!(0.10),
            dec!(0.20),
            dec!(19.99),
        ];

        let mut input = Vec::new();
        for (i, (other, amount)) in others.iter().zip(amounts).enumerate() {
            // Alternate who paid so both lists are populated.
            if i % 2 == 0 {
                input.extend(rows(&u, vec![share(other, amount, true)]));
                input.extend(rows(&u, vec![share(other, dec!(0.10), true)]));
            } else {
                input.extend(rows(other, vec![share(&u, amount, true)]));
                input.extend(rows(other, vec![share(&u, dec!(0.20), true)]));
            }
        }

        for _ in 0..3 {
            let summary = BalanceSummary::compute(u.id, &input);
            assert_eq!(
                summary.total_to_receive() - summary.total_to_pay(),
                summary.net_balance
            );
            assert_eq!(summary.to_receive.len() + summary.to_pay.len(), 6);
            // 10.20 + 0.11 + 0.30 - 33.53 - 0.30 - 20.19
            assert_eq!(summary.net_balance, dec!(-43.41));
        }
    }

    #[test]
    fn output_is_ordered_by_counterparty_id() {
        let u = user(1, "Ursula");
        let late = user(9, "Zed");
        let early = user(2, "Amy");
        let mut input = rows(&u, vec![share(&late, dec!(1.00), true)]);
        input.extend(rows(&u, vec![share(&early, dec!(2.00), true)]));

        let summary = BalanceSummary::compute(u.id, &input);
        let ids: Vec<UserId> = summary.to_receive.iter().map(|b| b.user_id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }
}
