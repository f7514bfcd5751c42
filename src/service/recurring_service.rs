//! Recurring service: definition CRUD and monthly materialization.

use std::sync::Arc;

use serde::Serialize;

use super::PeriodLocks;
use crate::domain::{
    Period, RecurringDraft, RecurringExpense, RecurringId, RecurringUpdate, UserId,
};
use crate::error::LedgerError;
use crate::persistence::{LedgerStore, MaterializeOutcome};

/// What one call to [`RecurringService::ensure_materialized`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MaterializationReport {
    /// The period that was materialized.
    pub period: Period,
    /// Occurrences written by this call.
    pub created: usize,
    /// Definitions whose occurrence already existed.
    pub skipped: usize,
    /// Definitions whose occurrence could not be written. Retried by the
    /// next call for the same period.
    pub failed: usize,
}

impl MaterializationReport {
    fn empty(period: Period) -> Self {
        Self {
            period,
            created: 0,
            skipped: 0,
            failed: 0,
        }
    }

    /// Returns `true` when every active definition has its occurrence.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

enum Step {
    Created,
    Skipped,
}

/// Coordinates recurring definitions and their monthly occurrences.
///
/// Materialization of one (user, period) is serialized through
/// [`PeriodLocks`]; the store's uniqueness rule on (definition, period)
/// covers writers outside this process.
#[derive(Debug, Clone)]
pub struct RecurringService {
    store: Arc<dyn LedgerStore>,
    locks: Arc<PeriodLocks>,
    materialization_enabled: bool,
}

impl RecurringService {
    /// Creates a new `RecurringService` with materialization enabled.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, locks: Arc<PeriodLocks>) -> Self {
        Self {
            store,
            locks,
            materialization_enabled: true,
        }
    }

    /// Turns materialization on or off. When off,
    /// [`ensure_materialized`](Self::ensure_materialized) writes nothing.
    #[must_use]
    pub fn with_materialization(mut self, enabled: bool) -> Self {
        self.materialization_enabled = enabled;
        self
    }

    /// Creates a definition owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] for an invalid draft, or a
    /// store failure.
    pub async fn create(
        &self,
        owner: UserId,
        draft: RecurringDraft,
    ) -> Result<RecurringExpense, LedgerError> {
        let definition = RecurringExpense::create(owner, draft)?;
        self.store.insert_recurring(&definition).await?;
        tracing::info!(
            recurring_id = %definition.id,
            %owner,
            day_of_month = definition.day_of_month,
            "recurring expense created"
        );
        Ok(definition)
    }

    /// All definitions owned by `owner`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list(&self, owner: UserId) -> Result<Vec<RecurringExpense>, LedgerError> {
        self.store.recurring_for(owner).await
    }

    /// Looks up a definition owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] when the definition is missing or
    /// belongs to someone else.
    pub async fn get(
        &self,
        owner: UserId,
        id: RecurringId,
    ) -> Result<RecurringExpense, LedgerError> {
        self.store
            .find_recurring(id)
            .await?
            .filter(|definition| definition.owner == owner)
            .ok_or_else(|| LedgerError::not_found("recurring expense", id))
    }

    /// Applies a partial update to a definition owned by `owner`.
    ///
    /// Occurrences already materialized keep their original values.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] as [`get`](Self::get) does, or
    /// [`LedgerError::InvalidRequest`] if the result is invalid.
    pub async fn update(
        &self,
        owner: UserId,
        id: RecurringId,
        update: RecurringUpdate,
    ) -> Result<RecurringExpense, LedgerError> {
        let updated = self.get(owner, id).await?.apply(update)?;
        if !self.store.update_recurring(&updated).await? {
            return Err(LedgerError::not_found("recurring expense", id));
        }
        tracing::info!(recurring_id = %id, active = updated.active, "recurring expense updated");
        Ok(updated)
    }

    /// Deletes a definition owned by `owner`. Generated expenses stay.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] as [`get`](Self::get) does.
    pub async fn delete(&self, owner: UserId, id: RecurringId) -> Result<(), LedgerError> {
        self.get(owner, id).await?;
        if !self.store.delete_recurring(id).await? {
            return Err(LedgerError::not_found("recurring expense", id));
        }
        tracing::info!(recurring_id = %id, "recurring expense deleted");
        Ok(())
    }

    /// Ensures every active definition of `user` has exactly one expense
    /// and installment dated in the given month.
    ///
    /// Definitions are processed independently. A definition whose write
    /// fails is logged, counted in [`MaterializationReport::failed`] and
    /// left for the next call; it never fails the whole operation.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] if `month` or `year` is out
    /// of range. No other error is returned.
    pub async fn ensure_materialized(
        &self,
        user: UserId,
        month: u32,
        year: i32,
    ) -> Result<MaterializationReport, LedgerError> {
        let period = Period::new(month, year)?;
        Ok(self.materialize_period(user, period).await)
    }

    /// [`ensure_materialized`](Self::ensure_materialized) for an already
    /// validated period.
    pub async fn materialize_period(&self, user: UserId, period: Period) -> MaterializationReport {
        let mut report = MaterializationReport::empty(period);
        if !self.materialization_enabled {
            tracing::debug!(%user, %period, "recurring materialization disabled");
            return report;
        }

        let _guard = self.locks.acquire(user, period).await;

        let definitions = match self.store.active_recurring_for(user).await {
            Ok(definitions) => definitions,
            Err(err) => {
                tracing::warn!(%user, %period, error = %err, "failed to load recurring expenses");
                return report;
            }
        };

        for definition in &definitions {
            match self.materialize_one(definition, period).await {
                Ok(Step::Created) => report.created += 1,
                Ok(Step::Skipped) => report.skipped += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        recurring_id = %definition.id,
                        %user,
                        %period,
                        error = %err,
                        "recurring expense not materialized"
                    );
                }
            }
        }

        if report.created > 0 || report.failed > 0 {
            tracing::info!(
                %user,
                %period,
                created = report.created,
                skipped = report.skipped,
                failed = report.failed,
                "recurring expenses materialized"
            );
        }
        report
    }

    async fn materialize_one(
        &self,
        definition: &RecurringExpense,
        period: Period,
    ) -> Result<Step, LedgerError> {
        if self.store.occurrence_exists(definition.id, period).await? {
            tracing::debug!(recurring_id = %definition.id, %period, "occurrence exists");
            return Ok(Step::Skipped);
        }
        let record = definition.occurrence(period);
        match self.store.materialize_occurrence(&record, period).await? {
            MaterializeOutcome::Created(expense_id) => {
                tracing::debug!(
                    recurring_id = %definition.id,
                    %expense_id,
                    date = %record.expense.date,
                    "occurrence created"
                );
                Ok(Step::Created)
            }
            MaterializeOutcome::AlreadyPresent => {
                tracing::debug!(
                    recurring_id = %definition.id,
                    %period,
                    "occurrence written by a concurrent caller"
                );
                Ok(Step::Skipped)
            }
        }
    }
}
