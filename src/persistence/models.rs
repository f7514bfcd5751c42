//! Database row models and their conversion into domain types.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    Category, ConfirmedSplit, Expense, ExpenseSplit, Group, GroupMember, Income, Installment,
    InstallmentDetail, InstallmentStatus, Invite, InviteStatus, MemberRole, PendingInvite,
    RecurringExpense, SharedExpense, SplitShare, User,
};
use crate::error::LedgerError;

/// Converts a non-negative `INT4` column into `u32`.
fn to_u32(value: i32, column: &str) -> Result<u32, LedgerError> {
    u32::try_from(value)
        .map_err(|_| LedgerError::Internal(format!("negative value {value} in column {column}")))
}

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    /// User id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            email: row.email,
        }
    }
}

/// A row from the `groups` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupRow {
    /// Group id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner_id: Uuid,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            owner: row.owner_id.into(),
        }
    }
}

/// A row from the `group_members` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MemberRow {
    /// Group id.
    pub group_id: Uuid,
    /// Member user id.
    pub user_id: Uuid,
    /// `OWNER` or `MEMBER`.
    pub role: String,
}

impl From<MemberRow> for GroupMember {
    fn from(row: MemberRow) -> Self {
        Self {
            group: row.group_id.into(),
            user: row.user_id.into(),
            role: MemberRole::from_storage(&row.role),
        }
    }
}

/// A row from the `categories` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    /// Category id.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id.into(),
            owner: row.user_id.into(),
            name: row.name,
        }
    }
}

/// A row from the `expenses` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExpenseRow {
    /// Expense id.
    pub id: Uuid,
    /// Creator.
    pub user_id: Uuid,
    /// Category.
    pub category_id: Uuid,
    /// Description.
    pub description: String,
    /// Total amount.
    pub amount: Decimal,
    /// Expense date.
    pub date: NaiveDate,
    /// Shared flag.
    pub is_shared: bool,
    /// Sharing group.
    pub group_id: Option<Uuid>,
    /// Installment flag.
    pub is_installment: bool,
    /// Number of installments.
    pub installment_count: i32,
    /// Generating recurring definition.
    pub recurring_expense_id: Option<Uuid>,
}

impl TryFrom<ExpenseRow> for Expense {
    type Error = LedgerError;

    fn try_from(row: ExpenseRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            owner: row.user_id.into(),
            category: row.category_id.into(),
            description: row.description,
            amount: row.amount,
            date: row.date,
            is_shared: row.is_shared,
            group: row.group_id.map(Into::into),
            is_installment: row.is_installment,
            installment_count: to_u32(row.installment_count, "installment_count")?,
            recurring: row.recurring_expense_id.map(Into::into),
        })
    }
}

/// A row from the `installments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InstallmentRow {
    /// Installment id.
    pub id: Uuid,
    /// Owning expense.
    pub expense_id: Uuid,
    /// Position in the plan.
    pub number: i32,
    /// Amount due.
    pub amount: Decimal,
    /// Due date.
    pub due_date: NaiveDate,
    /// `OPEN` or `PAID`.
    pub status: String,
    /// Payer.
    pub paid_by: Option<Uuid>,
    /// Payment timestamp.
    pub paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<InstallmentRow> for Installment {
    type Error = LedgerError;

    fn try_from(row: InstallmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            expense: row.expense_id.into(),
            number: to_u32(row.number, "number")?,
            amount: row.amount,
            due_date: row.due_date,
            status: InstallmentStatus::from_storage(&row.status),
            paid_by: row.paid_by.map(Into::into),
            paid_at: row.paid_at,
        })
    }
}

/// An installment joined with its expense and category.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InstallmentDetailRow {
    /// Installment columns.
    #[sqlx(flatten)]
    pub installment: InstallmentRow,
    /// Expense description.
    pub description: String,
    /// Expense category.
    pub category_id: Uuid,
    /// Category name (empty when the category is gone).
    pub category_name: String,
    /// Expense creator.
    pub owner_id: Uuid,
    /// Shared flag of the expense.
    pub is_shared: bool,
}

impl TryFrom<InstallmentDetailRow> for InstallmentDetail {
    type Error = LedgerError;

    fn try_from(row: InstallmentDetailRow) -> Result<Self, Self::Error> {
        Ok(Self {
            installment: row.installment.try_into()?,
            description: row.description,
            category: row.category_id.into(),
            category_name: row.category_name,
            owner: row.owner_id.into(),
            is_shared: row.is_shared,
        })
    }
}

/// A row from the `expense_splits` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SplitRow {
    /// Split id.
    pub id: Uuid,
    /// Expense being split.
    pub expense_id: Uuid,
    /// Member owing the share.
    pub user_id: Uuid,
    /// Share amount.
    pub amount: Decimal,
    /// Confirmation flag.
    pub confirmed: bool,
}

impl From<SplitRow> for ExpenseSplit {
    fn from(row: SplitRow) -> Self {
        Self {
            id: row.id.into(),
            expense: row.expense_id.into(),
            user: row.user_id.into(),
            amount: row.amount,
            confirmed: row.confirmed,
        }
    }
}

/// One split of a group expense joined with its member and the expense
/// creator. Used to assemble confirmed-split views for balance netting.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SharedSplitRow {
    /// Split id.
    pub split_id: Uuid,
    /// Share amount.
    pub amount: Decimal,
    /// Confirmation flag.
    pub confirmed: bool,
    /// Member id.
    pub member_id: Uuid,
    /// Member name.
    pub member_name: String,
    /// Member email.
    pub member_email: String,
    /// Expense id.
    pub expense_id: Uuid,
    /// Creator id.
    pub creator_id: Uuid,
    /// Creator name.
    pub creator_name: String,
    /// Creator email.
    pub creator_email: String,
}

/// A row from the `incomes` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IncomeRow {
    /// Income id.
    pub id: Uuid,
    /// Owner.
    pub user_id: Uuid,
    /// Category.
    pub category_id: Uuid,
    /// Description.
    pub description: String,
    /// Amount received.
    pub amount: Decimal,
    /// Date received.
    pub date: NaiveDate,
}

impl From<IncomeRow> for Income {
    fn from(row: IncomeRow) -> Self {
        Self {
            id: row.id.into(),
            owner: row.user_id.into(),
            category: row.category_id.into(),
            description: row.description,
            amount: row.amount,
            date: row.date,
        }
    }
}

/// A row from the `group_invites` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InviteRow {
    /// Invite id.
    pub id: Uuid,
    /// Target group.
    pub group_id: Uuid,
    /// Inviting member.
    pub inviter_id: Uuid,
    /// Invitee email.
    pub invitee_email: String,
    /// Secret token.
    pub token: String,
    /// `PENDING`, `ACCEPTED` or `REJECTED`.
    pub status: String,
    /// Issue time.
    pub created_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

impl TryFrom<InviteRow> for Invite {
    type Error = LedgerError;

    fn try_from(row: InviteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            group: row.group_id.into(),
            inviter: row.inviter_id.into(),
            invitee_email: row.invitee_email,
            token: row.token,
            status: InviteStatus::from_storage(&row.status)?,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

/// An invite joined with its group name and inviter name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingInviteRow {
    /// Invite columns.
    #[sqlx(flatten)]
    pub invite: InviteRow,
    /// Group name.
    pub group_name: String,
    /// Inviter name.
    pub inviter_name: String,
}

impl TryFrom<PendingInviteRow> for PendingInvite {
    type Error = LedgerError;

    fn try_from(row: PendingInviteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            invite: row.invite.try_into()?,
            group_name: row.group_name,
            inviter_name: row.inviter_name,
        })
    }
}

/// Assembles one [`ConfirmedSplit`] per confirmed row. Each carries its
/// expense with the creator and every split of that expense, confirmed or
/// not, in row order.
#[must_use]
pub fn group_confirmed_splits(rows: Vec<SharedSplitRow>) -> Vec<ConfirmedSplit> {
    let mut expenses: BTreeMap<Uuid, SharedExpense> = BTreeMap::new();
    let mut confirmed: Vec<(Uuid, Uuid, Uuid)> = Vec::new();
    for row in rows {
        if row.confirmed {
            confirmed.push((row.split_id, row.member_id, row.expense_id));
        }
        let expense = expenses
            .entry(row.expense_id)
            .or_insert_with(|| SharedExpense {
                id: row.expense_id.into(),
                creator: User {
                    id: row.creator_id.into(),
                    name: row.creator_name.clone(),
                    email: row.creator_email.clone(),
                },
                splits: Vec::new(),
            });
        expense.splits.push(SplitShare {
            user: User {
                id: row.member_id.into(),
                name: row.member_name,
                email: row.member_email,
            },
            amount: row.amount,
            confirmed: row.confirmed,
        });
    }

    confirmed
        .into_iter()
        .filter_map(|(split, user, expense)| {
            expenses.get(&expense).map(|shared| ConfirmedSplit {
                split: split.into(),
                user: user.into(),
                expense: shared.clone(),
            })
        })
        .collect()
}

/// A row from the `recurring_expenses` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecurringRow {
    /// Definition id.
    pub id: Uuid,
    /// Owner.
    pub user_id: Uuid,
    /// Category.
    pub category_id: Uuid,
    /// Description.
    pub description: String,
    /// Amount per occurrence.
    pub amount: Decimal,
    /// Day of month (1–31).
    pub day_of_month: i32,
    /// Active flag.
    pub active: bool,
}

impl TryFrom<RecurringRow> for RecurringExpense {
    type Error = LedgerError;

    fn try_from(row: RecurringRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            owner: row.user_id.into(),
            category: row.category_id.into(),
            description: row.description,
            amount: row.amount,
            day_of_month: to_u32(row.day_of_month, "day_of_month")?,
            active: row.active,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct Person {
        id: Uuid,
        name: &'static str,
        email: &'static str,
    }

    fn person(name: &'static str, email: &'static str) -> Person {
        Person {
            id: Uuid::new_v4(),
            name,
            email,
        }
    }

    fn split_row(
        expense: Uuid,
        creator: &Person,
        member: &Person,
        amount: Decimal,
        confirmed: bool,
    ) -> SharedSplitRow {
        SharedSplitRow {
            split_id: Uuid::new_v4(),
            amount,
            confirmed,
            member_id: member.id,
            member_name: member.name.to_string(),
            member_email: member.email.to_string(),
            expense_id: expense,
            creator_id: creator.id,
            creator_name: creator.name.to_string(),
            creator_email: creator.email.to_string(),
        }
    }

    #[test]
    fn only_confirmed_rows_become_splits_with_full_expense() {
        let u = person("Ursula", "u@example.com");
        let v = person("Victor", "v@example.com");
        let w = person("Wanda", "w@example.com");
        let expense = Uuid::new_v4();
        let rows = vec![
            split_row(expense, &u, &u, dec!(30), false),
            split_row(expense, &u, &v, dec!(30), true),
            split_row(expense, &u, &w, dec!(30), false),
        ];
        let confirmed_split = rows.get(1).map(|row| row.split_id);

        let splits = group_confirmed_splits(rows);
        let [only] = splits.as_slice() else {
            panic!("one confirmed split");
        };
        assert_eq!(Some(*only.split.as_uuid()), confirmed_split);
        assert_eq!(*only.user.as_uuid(), v.id);
        assert_eq!(*only.expense.id.as_uuid(), expense);
        let members: Vec<(Uuid, bool)> = only
            .expense
            .splits
            .iter()
            .map(|share| (*share.user.id.as_uuid(), share.confirmed))
            .collect();
        assert_eq!(members, vec![(u.id, false), (v.id, true), (w.id, false)]);
    }

    #[test]
    fn splits_of_two_expenses_stay_apart() {
        let u = person("Ursula", "u@example.com");
        let v = person("Victor", "v@example.com");
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let rows = vec![
            split_row(first, &u, &u, dec!(50), true),
            split_row(first, &u, &v, dec!(50), true),
            split_row(second, &v, &u, dec!(15), true),
            split_row(second, &v, &v, dec!(15), false),
        ];

        let splits = group_confirmed_splits(rows);
        assert_eq!(splits.len(), 3);
        for split in &splits {
            assert_eq!(split.expense.splits.len(), 2);
        }
        let on_second: Vec<&ConfirmedSplit> = splits
            .iter()
            .filter(|split| *split.expense.id.as_uuid() == second)
            .collect();
        let [on_second] = on_second.as_slice() else {
            panic!("one confirmed split on the second expense");
        };
        assert_eq!(*on_second.user.as_uuid(), u.id);
        assert_eq!(
            on_second.expense.splits.iter().map(|s| s.amount).sum::<Decimal>(),
            dec!(30)
        );
    }

    #[test]
    fn creator_details_are_copied() {
        let u = person("Ursula", "u@example.com");
        let v = person("Victor", "v@example.com");
        let expense = Uuid::new_v4();
        let splits = group_confirmed_splits(vec![split_row(expense, &u, &v, dec!(8), true)]);

        let [split] = splits.as_slice() else {
            panic!("one confirmed split");
        };
        let creator = &split.expense.creator;
        assert_eq!(*creator.id.as_uuid(), u.id);
        assert_eq!(creator.name, "Ursula");
        assert_eq!(creator.email, "u@example.com");
        let Some(share) = split.expense.splits.first() else {
            panic!("one share");
        };
        assert_eq!(share.user.name, "Victor");
        assert_eq!(share.user.email, "v@example.com");
        assert_eq!(share.amount, dec!(8));
    }

    #[test]
    fn no_rows_give_no_splits() {
        assert!(group_confirmed_splits(Vec::new()).is_empty());
    }

    #[test]
    fn unknown_invite_status_is_an_error() {
        let row = InviteRow {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            inviter_id: Uuid::new_v4(),
            invitee_email: "v@example.com".to_string(),
            token: "abc".to_string(),
            status: "EXPIRED".to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now(),
        };
        assert!(matches!(Invite::try_from(row), Err(LedgerError::Internal(_))));
    }

    #[test]
    fn negative_counts_are_rejected() {
        let row = RecurringRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            description: "Gym".to_string(),
            amount: dec!(30),
            day_of_month: -1,
            active: true,
        };
        assert!(RecurringExpense::try_from(row).is_err());
    }

    #[test]
    fn installment_status_is_parsed() {
        let row = InstallmentRow {
            id: Uuid::new_v4(),
            expense_id: Uuid::new_v4(),
            number: 2,
            amount: dec!(12.50),
            due_date: NaiveDate::default(),
            status: "PAID".to_string(),
            paid_by: None,
            paid_at: None,
        };
        let Ok(installment) = Installment::try_from(row) else {
            panic!("valid row");
        };
        assert_eq!(installment.status, InstallmentStatus::Paid);
        assert_eq!(installment.number, 2);
    }
}
