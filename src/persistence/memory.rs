//! In-memory implementation of [`LedgerStore`].
//!
//! All tables live behind one [`tokio::sync::Mutex`]. Multi-row writes
//! run against a copy of the tables that replaces the original only when
//! every row was written, which gives the same all-or-nothing visibility
//! as a database transaction.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use super::{LedgerStore, MaterializeOutcome};
use crate::domain::{
    Category, CategoryId, ConfirmedSplit, Expense, ExpenseId, ExpenseRecord, ExpenseSplit, Group,
    GroupId, GroupMember, Income, IncomeId, Installment, InstallmentDetail, InstallmentId,
    InstallmentStatus, Invite, InviteId, InviteStatus, MemberRole, PendingInvite, Period,
    RecurringExpense, RecurringId, SharedExpense, SplitId, SplitShare, User, UserId,
};
use crate::error::LedgerError;

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    groups: BTreeMap<GroupId, Group>,
    members: BTreeMap<(GroupId, UserId), GroupMember>,
    categories: BTreeMap<CategoryId, Category>,
    expenses: BTreeMap<ExpenseId, Expense>,
    installments: BTreeMap<InstallmentId, Installment>,
    splits: BTreeMap<SplitId, ExpenseSplit>,
    recurring: BTreeMap<RecurringId, RecurringExpense>,
    incomes: BTreeMap<IncomeId, Income>,
    invites: BTreeMap<InviteId, Invite>,
}

impl Tables {
    fn visible_to(&self, user: UserId, expense: &Expense) -> bool {
        expense.owner == user
            || self
                .splits
                .values()
                .any(|s| s.expense == expense.id && s.user == user)
    }

    fn detail(&self, installment: &Installment) -> Option<InstallmentDetail> {
        let expense = self.expenses.get(&installment.expense)?;
        let category_name = self
            .categories
            .get(&expense.category)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        Some(InstallmentDetail {
            installment: installment.clone(),
            description: expense.description.clone(),
            category: expense.category,
            category_name,
            owner: expense.owner,
            is_shared: expense.is_shared,
        })
    }

    fn visible_installments<F>(&self, user: UserId, keep: F) -> Vec<InstallmentDetail>
    where
        F: Fn(&Installment) -> bool,
    {
        let mut details: Vec<InstallmentDetail> = self
            .installments
            .values()
            .filter(|i| keep(i))
            .filter(|i| {
                self.expenses
                    .get(&i.expense)
                    .is_some_and(|e| self.visible_to(user, e))
            })
            .filter_map(|i| self.detail(i))
            .collect();
        details.sort_by_key(|d| (d.installment.due_date, d.installment.number));
        details
    }

    fn has_occurrence(&self, recurring: RecurringId, period: Period) -> bool {
        self.expenses
            .values()
            .any(|e| e.recurring == Some(recurring) && period.contains(e.date))
    }

    fn user(&self, id: UserId) -> User {
        self.users.get(&id).cloned().unwrap_or_else(|| User {
            id,
            name: String::new(),
            email: String::new(),
        })
    }
}

#[derive(Debug, Default)]
struct Faults {
    failing_installments: BTreeSet<RecurringId>,
}

/// Thread-safe in-memory ledger store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user. Users are owned by an external identity service,
    /// so this exists for seeding only.
    pub async fn add_user(&self, name: &str, email: &str) -> User {
        let user = User {
            id: UserId::new(),
            name: name.to_string(),
            email: email.to_string(),
        };
        self.tables
            .lock()
            .await
            .users
            .insert(user.id, user.clone());
        user
    }

    /// Makes every installment write for occurrences of `recurring` fail
    /// after the expense row has been staged.
    pub async fn fail_installments_for(&self, recurring: RecurringId) {
        self.faults
            .lock()
            .await
            .failing_installments
            .insert(recurring);
    }

    /// Removes all injected faults.
    pub async fn clear_faults(&self) {
        self.faults.lock().await.failing_installments.clear();
    }

    /// Number of expenses currently stored.
    pub async fn expense_count(&self) -> usize {
        self.tables.lock().await.expenses.len()
    }

    /// Number of installments currently stored.
    pub async fn installment_count(&self) -> usize {
        self.tables.lock().await.installments.len()
    }

    /// Stages every row of `record` into `tx`.
    async fn stage(&self, tx: &mut Tables, record: &ExpenseRecord) -> Result<(), LedgerError> {
        let expense = &record.expense;
        tx.expenses.insert(expense.id, expense.clone());

        let failing = {
            let faults = self.faults.lock().await;
            expense
                .recurring
                .is_some_and(|id| faults.failing_installments.contains(&id))
        };
        if failing {
            return Err(LedgerError::Persistence(format!(
                "injected installment write failure for expense {}",
                expense.id
            )));
        }
        for installment in &record.installments {
            tx.installments.insert(installment.id, installment.clone());
        }

        for split in &record.splits {
            let duplicate = tx
                .splits
                .values()
                .any(|s| s.expense == split.expense && s.user == split.user);
            if duplicate {
                return Err(LedgerError::Persistence(format!(
                    "duplicate split for user {} on expense {}",
                    split.user, split.expense
                )));
            }
            tx.splits.insert(split.id, split.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_group(&self, group: &Group) -> Result<(), LedgerError> {
        let mut tables = self.tables.lock().await;
        tables.groups.insert(group.id, group.clone());
        tables.members.insert(
            (group.id, group.owner),
            GroupMember {
                group: group.id,
                user: group.owner,
                role: MemberRole::Owner,
            },
        );
        Ok(())
    }

    async fn find_group(&self, id: GroupId) -> Result<Option<Group>, LedgerError> {
        Ok(self.tables.lock().await.groups.get(&id).cloned())
    }

    async fn group_members(&self, id: GroupId) -> Result<Vec<GroupMember>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .members
            .values()
            .filter(|m| m.group == id)
            .cloned()
            .collect())
    }

    async fn insert_member(&self, member: &GroupMember) -> Result<(), LedgerError> {
        let mut tables = self.tables.lock().await;
        let key = (member.group, member.user);
        if tables.members.contains_key(&key) {
            return Err(LedgerError::Persistence(format!(
                "user {} is already a member of group {}",
                member.user, member.group
            )));
        }
        tables.members.insert(key, member.clone());
        Ok(())
    }

    async fn delete_member(&self, group: GroupId, user: UserId) -> Result<bool, LedgerError> {
        Ok(self
            .tables
            .lock()
            .await
            .members
            .remove(&(group, user))
            .is_some())
    }

    async fn insert_category(&self, category: &Category) -> Result<(), LedgerError> {
        self.tables
            .lock()
            .await
            .categories
            .insert(category.id, category.clone());
        Ok(())
    }

    async fn categories_for(&self, owner: UserId) -> Result<Vec<Category>, LedgerError> {
        let tables = self.tables.lock().await;
        let mut categories: Vec<Category> = tables
            .categories
            .values()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn insert_income(&self, income: &Income) -> Result<(), LedgerError> {
        self.tables
            .lock()
            .await
            .incomes
            .insert(income.id, income.clone());
        Ok(())
    }

    async fn find_income(&self, id: IncomeId) -> Result<Option<Income>, LedgerError> {
        Ok(self.tables.lock().await.incomes.get(&id).cloned())
    }

    async fn incomes_for(
        &self,
        owner: UserId,
        period: Option<Period>,
    ) -> Result<Vec<Income>, LedgerError> {
        let tables = self.tables.lock().await;
        let mut incomes: Vec<Income> = tables
            .incomes
            .values()
            .filter(|i| i.owner == owner && period.is_none_or(|p| p.contains(i.date)))
            .cloned()
            .collect();
        incomes.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(incomes)
    }

    async fn update_income(&self, income: &Income) -> Result<bool, LedgerError> {
        let mut tables = self.tables.lock().await;
        match tables.incomes.get_mut(&income.id) {
            Some(existing) => {
                *existing = income.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_income(&self, id: IncomeId) -> Result<bool, LedgerError> {
        Ok(self.tables.lock().await.incomes.remove(&id).is_some())
    }

    async fn insert_expense(&self, record: &ExpenseRecord) -> Result<(), LedgerError> {
        let mut tables = self.tables.lock().await;
        let mut tx = tables.clone();
        self.stage(&mut tx, record).await?;
        *tables = tx;
        Ok(())
    }

    async fn find_expense(&self, id: ExpenseId) -> Result<Option<Expense>, LedgerError> {
        Ok(self.tables.lock().await.expenses.get(&id).cloned())
    }

    async fn expenses_in_period(
        &self,
        user: UserId,
        period: Period,
    ) -> Result<Vec<Expense>, LedgerError> {
        let tables = self.tables.lock().await;
        let mut expenses: Vec<Expense> = tables
            .expenses
            .values()
            .filter(|e| period.contains(e.date) && tables.visible_to(user, e))
            .cloned()
            .collect();
        expenses.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(expenses)
    }

    async fn installments_in_period(
        &self,
        user: UserId,
        period: Period,
    ) -> Result<Vec<InstallmentDetail>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables.visible_installments(user, |i| period.contains(i.due_date)))
    }

    async fn open_installments_after(
        &self,
        user: UserId,
        after: NaiveDate,
    ) -> Result<Vec<InstallmentDetail>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables.visible_installments(user, |i| {
            i.due_date > after && i.status == InstallmentStatus::Open
        }))
    }

    async fn find_installment(
        &self,
        id: InstallmentId,
    ) -> Result<Option<InstallmentDetail>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .installments
            .get(&id)
            .and_then(|installment| tables.detail(installment)))
    }

    async fn mark_installment_paid(
        &self,
        id: InstallmentId,
        paid_by: UserId,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Installment>, LedgerError> {
        let mut tables = self.tables.lock().await;
        let Some(installment) = tables.installments.get_mut(&id) else {
            return Ok(None);
        };
        if installment.status != InstallmentStatus::Open {
            return Ok(None);
        }
        installment.status = InstallmentStatus::Paid;
        installment.paid_by = Some(paid_by);
        installment.paid_at = Some(paid_at);
        Ok(Some(installment.clone()))
    }

    async fn splits_for_expense(
        &self,
        expense: ExpenseId,
    ) -> Result<Vec<ExpenseSplit>, LedgerError> {
        let tables = self.tables.lock().await;
        let mut splits: Vec<ExpenseSplit> = tables
            .splits
            .values()
            .filter(|s| s.expense == expense)
            .cloned()
            .collect();
        splits.sort_by_key(|s| s.user);
        Ok(splits)
    }

    async fn confirm_split(
        &self,
        expense: ExpenseId,
        user: UserId,
    ) -> Result<Option<ExpenseSplit>, LedgerError> {
        let mut tables = self.tables.lock().await;
        let split = tables
            .splits
            .values_mut()
            .find(|s| s.expense == expense && s.user == user);
        Ok(split.map(|s| {
            s.confirmed = true;
            s.clone()
        }))
    }

    async fn confirmed_group_splits(&self) -> Result<Vec<ConfirmedSplit>, LedgerError> {
        let tables = self.tables.lock().await;
        let shared: BTreeMap<ExpenseId, SharedExpense> = tables
            .expenses
            .values()
            .filter(|e| e.group.is_some())
            .map(|e| {
                let splits = tables
                    .splits
                    .values()
                    .filter(|s| s.expense == e.id)
                    .map(|s| SplitShare {
                        user: tables.user(s.user),
                        amount: s.amount,
                        confirmed: s.confirmed,
                    })
                    .collect();
                let shared = SharedExpense {
                    id: e.id,
                    creator: tables.user(e.owner),
                    splits,
                };
                (e.id, shared)
            })
            .collect();

        Ok(tables
            .splits
            .values()
            .filter(|s| s.confirmed)
            .filter_map(|s| {
                shared.get(&s.expense).map(|expense| ConfirmedSplit {
                    split: s.id,
                    user: s.user,
                    expense: expense.clone(),
                })
            })
            .collect())
    }

    async fn insert_recurring(&self, definition: &RecurringExpense) -> Result<(), LedgerError> {
        self.tables
            .lock()
            .await
            .recurring
            .insert(definition.id, definition.clone());
        Ok(())
    }

    async fn update_recurring(&self, definition: &RecurringExpense) -> Result<bool, LedgerError> {
        let mut tables = self.tables.lock().await;
        match tables.recurring.get_mut(&definition.id) {
            Some(existing) => {
                *existing = definition.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_recurring(&self, id: RecurringId) -> Result<bool, LedgerError> {
        let mut tables = self.tables.lock().await;
        let existed = tables.recurring.remove(&id).is_some();
        for expense in tables.expenses.values_mut() {
            if expense.recurring == Some(id) {
                expense.recurring = None;
            }
        }
        Ok(existed)
    }

    async fn find_recurring(
        &self,
        id: RecurringId,
    ) -> Result<Option<RecurringExpense>, LedgerError> {
        Ok(self.tables.lock().await.recurring.get(&id).cloned())
    }

    async fn recurring_for(&self, owner: UserId) -> Result<Vec<RecurringExpense>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .recurring
            .values()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect())
    }

    async fn active_recurring_for(
        &self,
        owner: UserId,
    ) -> Result<Vec<RecurringExpense>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .recurring
            .values()
            .filter(|r| r.owner == owner && r.active)
            .cloned()
            .collect())
    }

    async fn occurrence_exists(
        &self,
        recurring: RecurringId,
        period: Period,
    ) -> Result<bool, LedgerError> {
        Ok(self.tables.lock().await.has_occurrence(recurring, period))
    }

    async fn materialize_occurrence(
        &self,
        record: &ExpenseRecord,
        period: Period,
    ) -> Result<MaterializeOutcome, LedgerError> {
        let Some(recurring) = record.expense.recurring else {
            return Err(LedgerError::InvalidRequest(
                "occurrence must reference a recurring definition".to_string(),
            ));
        };
        let mut tables = self.tables.lock().await;
        if tables.has_occurrence(recurring, period) {
            return Ok(MaterializeOutcome::AlreadyPresent);
        }
        let mut tx = tables.clone();
        self.stage(&mut tx, record).await?;
        *tables = tx;
        Ok(MaterializeOutcome::Created(record.expense.id))
    }

    async fn insert_invite(&self, invite: &Invite) -> Result<bool, LedgerError> {
        let mut tables = self.tables.lock().await;
        let blocked = tables.invites.values().any(|other| {
            other.group == invite.group
                && other.invitee_email == invite.invitee_email
                && other.status == InviteStatus::Pending
                && !other.is_expired(invite.created_at)
        });
        if blocked {
            return Ok(false);
        }
        tables.invites.insert(invite.id, invite.clone());
        Ok(true)
    }

    async fn find_invite_by_token(&self, token: &str) -> Result<Option<Invite>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables.invites.values().find(|i| i.token == token).cloned())
    }

    async fn pending_invites_for(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PendingInvite>, LedgerError> {
        let tables = self.tables.lock().await;
        let mut pending: Vec<PendingInvite> = tables
            .invites
            .values()
            .filter(|i| i.status == InviteStatus::Pending && !i.is_expired(now) && i.is_for(email))
            .map(|i| PendingInvite {
                invite: i.clone(),
                group_name: tables
                    .groups
                    .get(&i.group)
                    .map(|g| g.name.clone())
                    .unwrap_or_default(),
                inviter_name: tables.user(i.inviter).name,
            })
            .collect();
        pending.sort_by(|a, b| b.invite.created_at.cmp(&a.invite.created_at));
        Ok(pending)
    }

    async fn accept_invite(&self, id: InviteId, member: &GroupMember) -> Result<bool, LedgerError> {
        let mut tables = self.tables.lock().await;
        let pending = tables
            .invites
            .get(&id)
            .is_some_and(|invite| invite.status == InviteStatus::Pending);
        if !pending {
            return Ok(false);
        }
        let key = (member.group, member.user);
        if tables.members.contains_key(&key) {
            return Err(LedgerError::Persistence(format!(
                "user {} is already a member of group {}",
                member.user, member.group
            )));
        }
        if let Some(invite) = tables.invites.get_mut(&id) {
            invite.status = InviteStatus::Accepted;
        }
        tables.members.insert(key, member.clone());
        Ok(true)
    }

    async fn reject_invite(&self, id: InviteId) -> Result<bool, LedgerError> {
        let mut tables = self.tables.lock().await;
        match tables.invites.get_mut(&id) {
            Some(invite) if invite.status == InviteStatus::Pending => {
                invite.status = InviteStatus::Rejected;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{RecurringDraft, RecurringExpense};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn definition(store: &InMemoryStore, day: u32) -> RecurringExpense {
        let owner = store.add_user("Ada", "ada@example.com").await;
        let draft = RecurringDraft {
            category: CategoryId::new(),
            description: "Internet".to_string(),
            amount: dec!(99.90),
            day_of_month: Some(day),
            active: None,
        };
        let Ok(def) = RecurringExpense::create(owner.id, draft) else {
            panic!("valid definition");
        };
        def
    }

    fn march() -> Period {
        let Ok(p) = Period::new(3, 2024) else {
            panic!("valid period");
        };
        p
    }

    #[tokio::test]
    async fn second_occurrence_is_already_present() {
        let store = InMemoryStore::new();
        let def = definition(&store, 10).await;

        let first = store.materialize_occurrence(&def.occurrence(march()), march()).await;
        assert!(matches!(first, Ok(MaterializeOutcome::Created(_))));
        let second = store.materialize_occurrence(&def.occurrence(march()), march()).await;
        assert!(matches!(second, Ok(MaterializeOutcome::AlreadyPresent)));
        assert_eq!(store.expense_count().await, 1);
    }

    #[tokio::test]
    async fn failed_installment_write_leaves_no_expense() {
        let store = InMemoryStore::new();
        let def = definition(&store, 10).await;
        store.fail_installments_for(def.id).await;

        let result = store.materialize_occurrence(&def.occurrence(march()), march()).await;
        assert!(matches!(result, Err(LedgerError::Persistence(_))));
        assert_eq!(store.expense_count().await, 0);
        assert_eq!(store.installment_count().await, 0);
        assert!(!tokio_test::assert_ok!(store.occurrence_exists(def.id, march()).await));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_writers_store_one_occurrence() {
        let store = Arc::new(InMemoryStore::new());
        let def = definition(&store, 31).await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let record = def.occurrence(march());
                tokio::spawn(async move { store.materialize_occurrence(&record, march()).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            let Ok(Ok(outcome)) = handle.await else {
                panic!("materialization task failed");
            };
            if matches!(outcome, MaterializeOutcome::Created(_)) {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.expense_count().await, 1);
        assert_eq!(store.installment_count().await, 1);
    }

    #[tokio::test]
    async fn deleting_definition_keeps_generated_expenses() {
        let store = InMemoryStore::new();
        let def = definition(&store, 1).await;
        let _ = store.insert_recurring(&def).await;
        let _ = store.materialize_occurrence(&def.occurrence(march()), march()).await;

        assert!(tokio_test::assert_ok!(store.delete_recurring(def.id).await));
        assert_eq!(store.expense_count().await, 1);
        assert!(!tokio_test::assert_ok!(store.occurrence_exists(def.id, march()).await));
    }

    async fn group_with_invite(store: &InMemoryStore) -> (Group, Invite) {
        let owner = store.add_user("Ada", "ada@example.com").await;
        let group = Group {
            id: GroupId::new(),
            name: "Flat".to_string(),
            owner: owner.id,
        };
        tokio_test::assert_ok!(store.insert_group(&group).await);
        let Ok(invite) = Invite::issue(group.id, owner.id, "bo@example.com", Utc::now()) else {
            panic!("valid invite");
        };
        (group, invite)
    }

    #[tokio::test]
    async fn second_pending_invite_for_same_email_is_not_written() {
        let store = InMemoryStore::new();
        let (group, invite) = group_with_invite(&store).await;
        assert!(tokio_test::assert_ok!(store.insert_invite(&invite).await));

        let Ok(again) = Invite::issue(group.id, group.owner, "BO@example.com", Utc::now()) else {
            panic!("valid invite");
        };
        assert!(!tokio_test::assert_ok!(store.insert_invite(&again).await));
        let pending =
            tokio_test::assert_ok!(store.pending_invites_for("bo@example.com", Utc::now()).await);
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn failed_accept_leaves_invite_pending() {
        let store = InMemoryStore::new();
        let (group, invite) = group_with_invite(&store).await;
        assert!(tokio_test::assert_ok!(store.insert_invite(&invite).await));
        let owner_again = GroupMember {
            group: group.id,
            user: group.owner,
            role: MemberRole::Member,
        };

        let result = store.accept_invite(invite.id, &owner_again).await;
        assert!(matches!(result, Err(LedgerError::Persistence(_))));
        let Some(stored) = tokio_test::assert_ok!(store.find_invite_by_token(&invite.token).await)
        else {
            panic!("invite stored");
        };
        assert_eq!(stored.status, InviteStatus::Pending);

        assert!(tokio_test::assert_ok!(store.reject_invite(invite.id).await));
        assert!(!tokio_test::assert_ok!(store.reject_invite(invite.id).await));
    }
}
