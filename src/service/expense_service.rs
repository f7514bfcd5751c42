//! Expense service: expenses, installment plans, splits and payments.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use super::RecurringService;
use crate::domain::{
    Expense, ExpenseId, ExpenseRecord, ExpenseSplit, Installment, InstallmentDetail,
    InstallmentId, InstallmentStatus, NewExpense, Period, UserId,
};
use crate::error::LedgerError;
use crate::persistence::LedgerStore;

/// Orchestration layer for expense operations.
///
/// Period-scoped reads materialize the caller's recurring expenses for
/// that period before querying.
#[derive(Debug, Clone)]
pub struct ExpenseService {
    store: Arc<dyn LedgerStore>,
    recurring: RecurringService,
}

impl ExpenseService {
    /// Creates a new `ExpenseService`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, recurring: RecurringService) -> Self {
        Self { store, recurring }
    }

    /// Creates an expense with its installment plan and, when a group is
    /// given, one split per group member.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidRequest`] for an invalid amount, description
    ///   or installment count.
    /// - [`LedgerError::NotFound`] if the group does not exist.
    /// - [`LedgerError::Forbidden`] if `user` is not a member of the group.
    pub async fn create_expense(
        &self,
        user: UserId,
        request: NewExpense,
    ) -> Result<ExpenseRecord, LedgerError> {
        let members = match request.group {
            Some(group) => {
                if self.store.find_group(group).await?.is_none() {
                    return Err(LedgerError::not_found("group", group));
                }
                let members: Vec<UserId> = self
                    .store
                    .group_members(group)
                    .await?
                    .into_iter()
                    .map(|m| m.user)
                    .collect();
                if !members.contains(&user) {
                    return Err(LedgerError::Forbidden(format!(
                        "user {user} is not a member of group {group}"
                    )));
                }
                members
            }
            None => Vec::new(),
        };

        let record = ExpenseRecord::plan(user, request, &members)?;
        self.store.insert_expense(&record).await?;
        tracing::info!(
            expense_id = %record.expense.id,
            %user,
            amount = %record.expense.amount,
            installments = record.installments.len(),
            splits = record.splits.len(),
            "expense created"
        );
        Ok(record)
    }

    /// Expenses dated in the month that `user` owns or shares, newest
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] for an invalid month, or a
    /// store failure.
    pub async fn list_expenses(
        &self,
        user: UserId,
        month: u32,
        year: i32,
    ) -> Result<Vec<Expense>, LedgerError> {
        let period = Period::new(month, year)?;
        self.recurring.materialize_period(user, period).await;
        self.store.expenses_in_period(user, period).await
    }

    /// Installments due in the month, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] for an invalid month, or a
    /// store failure.
    pub async fn list_installments(
        &self,
        user: UserId,
        month: u32,
        year: i32,
    ) -> Result<Vec<InstallmentDetail>, LedgerError> {
        let period = Period::new(month, year)?;
        self.recurring.materialize_period(user, period).await;
        self.store.installments_in_period(user, period).await
    }

    /// Open installments due after `today`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list_future_installments(
        &self,
        user: UserId,
        today: NaiveDate,
    ) -> Result<Vec<InstallmentDetail>, LedgerError> {
        self.store.open_installments_after(user, today).await
    }

    /// Marks an installment paid by `user`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the installment does not exist or
    ///   its expense is not visible to `user`.
    /// - [`LedgerError::InvalidRequest`] if it is already paid.
    pub async fn pay_installment(
        &self,
        user: UserId,
        id: InstallmentId,
    ) -> Result<Installment, LedgerError> {
        let detail = self
            .store
            .find_installment(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("installment", id))?;
        if !self.is_visible(user, detail.owner, detail.installment.expense).await? {
            return Err(LedgerError::not_found("installment", id));
        }
        if detail.installment.status == InstallmentStatus::Paid {
            return Err(LedgerError::InvalidRequest(format!(
                "installment {id} is already paid"
            )));
        }

        let paid = self
            .store
            .mark_installment_paid(id, user, Utc::now())
            .await?
            .ok_or_else(|| {
                LedgerError::InvalidRequest(format!("installment {id} is already paid"))
            })?;
        tracing::info!(
            installment_id = %id,
            paid_by = %user,
            amount = %paid.amount,
            "installment paid"
        );
        Ok(paid)
    }

    /// Splits of an expense visible to `user`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] if the expense does not exist or
    /// is not visible to `user`.
    pub async fn splits_for_expense(
        &self,
        user: UserId,
        expense: ExpenseId,
    ) -> Result<Vec<ExpenseSplit>, LedgerError> {
        let found = self
            .store
            .find_expense(expense)
            .await?
            .ok_or_else(|| LedgerError::not_found("expense", expense))?;
        let splits = self.store.splits_for_expense(expense).await?;
        if found.owner != user && !splits.iter().any(|s| s.user == user) {
            return Err(LedgerError::not_found("expense", expense));
        }
        Ok(splits)
    }

    /// Confirms `user`'s split on `expense`, making it count in balances.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] if `user` has no split on the
    /// expense.
    pub async fn confirm_split(
        &self,
        user: UserId,
        expense: ExpenseId,
    ) -> Result<ExpenseSplit, LedgerError> {
        let split = self
            .store
            .confirm_split(expense, user)
            .await?
            .ok_or_else(|| LedgerError::not_found("split", format!("{expense}/{user}")))?;
        tracing::info!(expense_id = %expense, %user, "split confirmed");
        Ok(split)
    }

    async fn is_visible(
        &self,
        user: UserId,
        owner: UserId,
        expense: ExpenseId,
    ) -> Result<bool, LedgerError> {
        if owner == user {
            return Ok(true);
        }
        let splits = self.store.splits_for_expense(expense).await?;
        Ok(splits.iter().any(|s| s.user == user))
    }
}
