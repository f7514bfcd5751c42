//! Persistence layer: the [`LedgerStore`] trait and its implementations.
//!
//! Services depend only on the trait. [`PostgresStore`] backs production
//! through `sqlx::PgPool`; [`InMemoryStore`] backs tests and local
//! experiments and supports fault injection.
//!
//! Multi-row writes ([`LedgerStore::insert_expense`] and
//! [`LedgerStore::materialize_occurrence`]) are a single unit of work:
//! either every row of the [`ExpenseRecord`] becomes visible or none does.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{
    Category, ConfirmedSplit, Expense, ExpenseId, ExpenseRecord, ExpenseSplit, Group, GroupId,
    GroupMember, Income, IncomeId, Installment, InstallmentDetail, InstallmentId, Invite,
    InviteId, PendingInvite, Period, RecurringExpense, RecurringId, User, UserId,
};
use crate::error::LedgerError;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Result of trying to materialize one recurring occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// The expense and its installment were written.
    Created(ExpenseId),
    /// An expense for this definition and period already exists, possibly
    /// written by a concurrent caller. Nothing was written.
    AlreadyPresent,
}

/// Storage collaborator for every ledger service.
///
/// "Visible to a user" below means the user owns the expense or holds a
/// split on it.
#[async_trait]
pub trait LedgerStore: Send + Sync + fmt::Debug {
    /// Looks up a user.
    async fn find_user(&self, id: UserId) -> Result<Option<User>, LedgerError>;

    /// Looks up a user by email, ignoring ASCII case.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, LedgerError>;

    /// Inserts a group and its owner membership.
    async fn insert_group(&self, group: &Group) -> Result<(), LedgerError>;

    /// Looks up a group.
    async fn find_group(&self, id: GroupId) -> Result<Option<Group>, LedgerError>;

    /// Members of a group, ordered by user id.
    async fn group_members(&self, id: GroupId) -> Result<Vec<GroupMember>, LedgerError>;

    /// Adds a membership.
    async fn insert_member(&self, member: &GroupMember) -> Result<(), LedgerError>;

    /// Removes a membership, returning whether one existed.
    async fn delete_member(&self, group: GroupId, user: UserId) -> Result<bool, LedgerError>;

    /// Inserts a category.
    async fn insert_category(&self, category: &Category) -> Result<(), LedgerError>;

    /// Categories owned by `owner`, ordered by name.
    async fn categories_for(&self, owner: UserId) -> Result<Vec<Category>, LedgerError>;

    /// Inserts an income.
    async fn insert_income(&self, income: &Income) -> Result<(), LedgerError>;

    /// Looks up an income.
    async fn find_income(&self, id: IncomeId) -> Result<Option<Income>, LedgerError>;

    /// Incomes owned by `owner`, newest first. Restricted to incomes dated
    /// inside `period` when one is given.
    async fn incomes_for(
        &self,
        owner: UserId,
        period: Option<Period>,
    ) -> Result<Vec<Income>, LedgerError>;

    /// Replaces an income, returning whether it existed.
    async fn update_income(&self, income: &Income) -> Result<bool, LedgerError>;

    /// Deletes an income, returning whether it existed.
    async fn delete_income(&self, id: IncomeId) -> Result<bool, LedgerError>;

    /// Writes an expense with its installments and splits atomically.
    async fn insert_expense(&self, record: &ExpenseRecord) -> Result<(), LedgerError>;

    /// Looks up an expense.
    async fn find_expense(&self, id: ExpenseId) -> Result<Option<Expense>, LedgerError>;

    /// Expenses visible to `user` dated inside `period`, newest first.
    async fn expenses_in_period(
        &self,
        user: UserId,
        period: Period,
    ) -> Result<Vec<Expense>, LedgerError>;

    /// Installments visible to `user` due inside `period`, oldest first.
    async fn installments_in_period(
        &self,
        user: UserId,
        period: Period,
    ) -> Result<Vec<InstallmentDetail>, LedgerError>;

    /// Open installments visible to `user` due strictly after `after`,
    /// oldest first.
    async fn open_installments_after(
        &self,
        user: UserId,
        after: NaiveDate,
    ) -> Result<Vec<InstallmentDetail>, LedgerError>;

    /// Looks up an installment with its expense details.
    async fn find_installment(
        &self,
        id: InstallmentId,
    ) -> Result<Option<InstallmentDetail>, LedgerError>;

    /// Marks an open installment paid. Returns `None` when the installment
    /// is missing or no longer open.
    async fn mark_installment_paid(
        &self,
        id: InstallmentId,
        paid_by: UserId,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Installment>, LedgerError>;

    /// Splits of an expense, ordered by user id.
    async fn splits_for_expense(&self, expense: ExpenseId)
    -> Result<Vec<ExpenseSplit>, LedgerError>;

    /// Confirms the split of `user` on `expense`. Returns `None` when no
    /// such split exists.
    async fn confirm_split(
        &self,
        expense: ExpenseId,
        user: UserId,
    ) -> Result<Option<ExpenseSplit>, LedgerError>;

    /// Every confirmed split of every group expense, each carrying its
    /// expense with the creator and all of the expense's splits.
    async fn confirmed_group_splits(&self) -> Result<Vec<ConfirmedSplit>, LedgerError>;

    /// Inserts a recurring definition.
    async fn insert_recurring(&self, definition: &RecurringExpense) -> Result<(), LedgerError>;

    /// Replaces a recurring definition, returning whether it existed.
    async fn update_recurring(&self, definition: &RecurringExpense) -> Result<bool, LedgerError>;

    /// Deletes a recurring definition, returning whether it existed.
    /// Expenses already generated from it are kept.
    async fn delete_recurring(&self, id: RecurringId) -> Result<bool, LedgerError>;

    /// Looks up a recurring definition.
    async fn find_recurring(&self, id: RecurringId)
    -> Result<Option<RecurringExpense>, LedgerError>;

    /// All definitions owned by `owner`.
    async fn recurring_for(&self, owner: UserId) -> Result<Vec<RecurringExpense>, LedgerError>;

    /// Active definitions owned by `owner`.
    async fn active_recurring_for(
        &self,
        owner: UserId,
    ) -> Result<Vec<RecurringExpense>, LedgerError>;

    /// Whether an expense generated from `recurring` is dated inside
    /// `period`.
    async fn occurrence_exists(
        &self,
        recurring: RecurringId,
        period: Period,
    ) -> Result<bool, LedgerError>;

    /// Writes a recurring occurrence unless one already exists for the
    /// same definition and period. The check and the write are a single
    /// atomic step; losing a race yields
    /// [`MaterializeOutcome::AlreadyPresent`].
    async fn materialize_occurrence(
        &self,
        record: &ExpenseRecord,
        period: Period,
    ) -> Result<MaterializeOutcome, LedgerError>;

    /// Inserts a pending invite unless the same group already has a
    /// pending invite for the same email that is unexpired at
    /// `invite.created_at`. Returns whether the invite was written.
    async fn insert_invite(&self, invite: &Invite) -> Result<bool, LedgerError>;

    /// Looks up an invite by its token.
    async fn find_invite_by_token(&self, token: &str) -> Result<Option<Invite>, LedgerError>;

    /// Pending invites for `email` still valid at `now`, newest first.
    async fn pending_invites_for(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PendingInvite>, LedgerError>;

    /// Marks a pending invite accepted and inserts `member` as one unit of
    /// work. Returns `false`, writing nothing, when the invite is no longer
    /// pending.
    async fn accept_invite(&self, id: InviteId, member: &GroupMember) -> Result<bool, LedgerError>;

    /// Marks a pending invite rejected. Returns `false` when it is no
    /// longer pending.
    async fn reject_invite(&self, id: InviteId) -> Result<bool, LedgerError>;
}
