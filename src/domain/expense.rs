//! Expenses, their installment plans, and shared-expense splits.
//!
//! An [`ExpenseRecord`] bundles an expense with every installment and
//! split created alongside it. Stores persist a record as a single unit
//! of work so that no reader ever sees an expense without its
//! installments.

use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::{split_evenly, to_currency};
use super::{CategoryId, ExpenseId, GroupId, InstallmentId, RecurringId, SplitId, UserId};
use crate::error::LedgerError;

/// Upper bound on the number of installments in one plan.
pub const MAX_INSTALLMENTS: u32 = 120;

/// A recorded expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    /// Expense identifier.
    pub id: ExpenseId,
    /// User who created (and paid) the expense.
    pub owner: UserId,
    /// Category the expense is filed under.
    pub category: CategoryId,
    /// Free-form description.
    pub description: String,
    /// Total amount.
    pub amount: Decimal,
    /// Purchase (or competence) date.
    pub date: NaiveDate,
    /// Whether the expense is split among group members.
    pub is_shared: bool,
    /// Group the expense is shared with, if any.
    pub group: Option<GroupId>,
    /// Whether the expense is paid in more than one installment.
    pub is_installment: bool,
    /// Number of installments (1 for single-payment expenses).
    pub installment_count: u32,
    /// Recurring definition this expense was generated from, if any.
    pub recurring: Option<RecurringId>,
}

/// Payment state of an installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallmentStatus {
    /// Not paid yet.
    Open,
    /// Paid by some user.
    Paid,
}

impl InstallmentStatus {
    /// Storage representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Paid => "PAID",
        }
    }

    /// Parses the storage representation; anything but `PAID` is open.
    #[must_use]
    pub fn from_storage(value: &str) -> Self {
        if value.eq_ignore_ascii_case("PAID") {
            Self::Paid
        } else {
            Self::Open
        }
    }
}

/// One scheduled payment of an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    /// Installment identifier.
    pub id: InstallmentId,
    /// Expense the installment belongs to.
    pub expense: ExpenseId,
    /// 1-based position inside the plan.
    pub number: u32,
    /// Amount due.
    pub amount: Decimal,
    /// Due date.
    pub due_date: NaiveDate,
    /// Payment state.
    pub status: InstallmentStatus,
    /// User who paid, once paid.
    pub paid_by: Option<UserId>,
    /// Payment timestamp, once paid.
    pub paid_at: Option<DateTime<Utc>>,
}

impl Installment {
    /// Creates an open installment.
    #[must_use]
    pub fn open(expense: ExpenseId, number: u32, amount: Decimal, due_date: NaiveDate) -> Self {
        Self {
            id: InstallmentId::new(),
            expense,
            number,
            amount,
            due_date,
            status: InstallmentStatus::Open,
            paid_by: None,
            paid_at: None,
        }
    }
}

/// One member's share of a shared expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseSplit {
    /// Split identifier.
    pub id: SplitId,
    /// Expense being split.
    pub expense: ExpenseId,
    /// Member who owes this share.
    pub user: UserId,
    /// Share amount.
    pub amount: Decimal,
    /// Whether the member acknowledged the share.
    pub confirmed: bool,
}

/// Installment joined with the fields of its expense needed by listings
/// and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentDetail {
    /// The installment itself.
    pub installment: Installment,
    /// Description of the owning expense.
    pub description: String,
    /// Category of the owning expense.
    pub category: CategoryId,
    /// Category display name.
    pub category_name: String,
    /// Owner of the expense.
    pub owner: UserId,
    /// Whether the owning expense is shared.
    pub is_shared: bool,
}

/// Request to record a new expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    /// Category to file the expense under.
    pub category: CategoryId,
    /// Free-form description.
    pub description: String,
    /// Total amount, must be positive.
    pub amount: Decimal,
    /// Purchase date; the first installment falls due on it.
    pub date: NaiveDate,
    /// Number of monthly installments; `None` means a single payment.
    #[serde(default)]
    pub installment_count: Option<u32>,
    /// Group to share the expense with.
    #[serde(default)]
    pub group: Option<GroupId>,
}

/// An expense together with the installments and splits written with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    /// The expense row.
    pub expense: Expense,
    /// Its installment plan, ordered by number.
    pub installments: Vec<Installment>,
    /// Its splits (empty for personal expenses).
    pub splits: Vec<ExpenseSplit>,
}

impl ExpenseRecord {
    /// Plans the rows for a new expense owned by `owner`.
    ///
    /// `members` lists the group members when the expense is shared; the
    /// total is split evenly among them and only the owner's share starts
    /// confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] for a non-positive amount,
    /// an empty description, an installment count outside
    /// 1..=[`MAX_INSTALLMENTS`], or a shared expense without members.
    pub fn plan(
        owner: UserId,
        request: NewExpense,
        members: &[UserId],
    ) -> Result<Self, LedgerError> {
        let description = request.description.trim().to_string();
        if description.is_empty() {
            return Err(LedgerError::InvalidRequest(
                "description must not be empty".to_string(),
            ));
        }
        let amount = to_currency(request.amount);
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidRequest(
                "amount must be positive".to_string(),
            ));
        }
        let count = request.installment_count.unwrap_or(1);
        if !(1..=MAX_INSTALLMENTS).contains(&count) {
            return Err(LedgerError::InvalidRequest(format!(
                "installment count must be between 1 and {MAX_INSTALLMENTS}, got {count}"
            )));
        }
        if request.group.is_some() && members.is_empty() {
            return Err(LedgerError::InvalidRequest(
                "shared expense needs at least one group member".to_string(),
            ));
        }

        let expense = Expense {
            id: ExpenseId::new(),
            owner,
            category: request.category,
            description,
            amount,
            date: request.date,
            is_shared: request.group.is_some(),
            group: request.group,
            is_installment: count > 1,
            installment_count: count,
            recurring: None,
        };

        let installments = split_evenly(amount, count)
            .into_iter()
            .zip(0..count)
            .map(|(share, offset)| {
                let due_date = request
                    .date
                    .checked_add_months(Months::new(offset))
                    .unwrap_or(request.date);
                Installment::open(expense.id, offset + 1, share, due_date)
            })
            .collect();

        let splits = if expense.is_shared {
            let parts = u32::try_from(members.len()).unwrap_or(u32::MAX);
            members
                .iter()
                .zip(split_evenly(amount, parts))
                .map(|(&user, share)| ExpenseSplit {
                    id: SplitId::new(),
                    expense: expense.id,
                    user,
                    amount: share,
                    confirmed: user == owner,
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(Self {
            expense,
            installments,
            splits,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        let Some(date) = NaiveDate::from_ymd_opt(y, m, d) else {
            panic!("valid date");
        };
        date
    }

    fn request(amount: Decimal, installments: Option<u32>) -> NewExpense {
        NewExpense {
            category: CategoryId::new(),
            description: "Groceries".to_string(),
            amount,
            date: date(2024, 1, 31),
            installment_count: installments,
            group: None,
        }
    }

    #[test]
    fn single_payment_has_one_installment() {
        let owner = UserId::new();
        let Ok(record) = ExpenseRecord::plan(owner, request(dec!(42.50), None), &[]) else {
            panic!("valid plan");
        };
        assert!(!record.expense.is_installment);
        assert_eq!(record.installments.len(), 1);
        assert_eq!(record.installments.first().map(|i| i.amount), Some(dec!(42.50)));
        assert!(record.splits.is_empty());
    }

    #[test]
    fn installment_plan_sums_to_total_and_advances_monthly() {
        let owner = UserId::new();
        let Ok(record) = ExpenseRecord::plan(owner, request(dec!(100.00), Some(3)), &[]) else {
            panic!("valid plan");
        };
        let total: Decimal = record.installments.iter().map(|i| i.amount).sum();
        assert_eq!(total, dec!(100.00));
        let dates: Vec<NaiveDate> = record.installments.iter().map(|i| i.due_date).collect();
        assert_eq!(dates, vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31)]);
        let numbers: Vec<u32> = record.installments.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn shared_expense_confirms_only_owner_split() {
        let owner = UserId::new();
        let other = UserId::new();
        let mut req = request(dec!(10.00), None);
        req.group = Some(GroupId::new());
        let Ok(record) = ExpenseRecord::plan(owner, req, &[owner, other]) else {
            panic!("valid plan");
        };
        assert!(record.expense.is_shared);
        assert_eq!(record.splits.len(), 2);
        for split in &record.splits {
            assert_eq!(split.amount, dec!(5.00));
            assert_eq!(split.confirmed, split.user == owner);
        }
    }

    #[test]
    fn rejects_non_positive_amount() {
        let result = ExpenseRecord::plan(UserId::new(), request(dec!(0), None), &[]);
        assert!(matches!(result, Err(LedgerError::InvalidRequest(_))));
    }

    #[test]
    fn rejects_zero_installments() {
        let result = ExpenseRecord::plan(UserId::new(), request(dec!(5), Some(0)), &[]);
        assert!(matches!(result, Err(LedgerError::InvalidRequest(_))));
    }

    #[test]
    fn status_storage_round_trip() {
        assert_eq!(InstallmentStatus::from_storage("PAID"), InstallmentStatus::Paid);
        assert_eq!(
            InstallmentStatus::from_storage(InstallmentStatus::Open.as_str()),
            InstallmentStatus::Open
        );
    }
}
