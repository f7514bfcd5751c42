//! Income tracking.

use std::sync::Arc;

use crate::domain::{CategoryId, Income, IncomeId, IncomeUpdate, NewIncome, Period, UserId};
use crate::error::LedgerError;
use crate::persistence::LedgerStore;

/// Records incomes. Every income is visible to its owner only.
#[derive(Debug, Clone)]
pub struct IncomeService {
    store: Arc<dyn LedgerStore>,
}

impl IncomeService {
    /// Creates a new `IncomeService`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Records an income for `owner`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidRequest`] for an empty description or a
    ///   non-positive amount.
    /// - [`LedgerError::NotFound`] if the category is not one of `owner`'s.
    pub async fn create(&self, owner: UserId, request: NewIncome) -> Result<Income, LedgerError> {
        let income = Income::create(owner, request)?;
        self.owned_category(owner, income.category).await?;
        self.store.insert_income(&income).await?;
        tracing::info!(income_id = %income.id, %owner, amount = %income.amount, "income created");
        Ok(income)
    }

    /// Incomes of `owner`, newest first. When both `month` and `year` are
    /// given only incomes of that month are returned.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] for an invalid month or when
    /// only one of `month` and `year` is given.
    pub async fn list(
        &self,
        owner: UserId,
        month: Option<u32>,
        year: Option<i32>,
    ) -> Result<Vec<Income>, LedgerError> {
        let period = match (month, year) {
            (Some(month), Some(year)) => Some(Period::new(month, year)?),
            (None, None) => None,
            _ => {
                return Err(LedgerError::InvalidRequest(
                    "month and year must be given together".to_string(),
                ));
            }
        };
        self.store.incomes_for(owner, period).await
    }

    /// Looks up an income owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] when the income is missing or
    /// belongs to someone else.
    pub async fn get(&self, owner: UserId, id: IncomeId) -> Result<Income, LedgerError> {
        self.store
            .find_income(id)
            .await?
            .filter(|income| income.owner == owner)
            .ok_or_else(|| LedgerError::not_found("income", id))
    }

    /// Applies a partial update to an income owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] as [`get`](Self::get) does or for
    /// a foreign category, and [`LedgerError::InvalidRequest`] if the
    /// result is invalid.
    pub async fn update(
        &self,
        owner: UserId,
        id: IncomeId,
        update: IncomeUpdate,
    ) -> Result<Income, LedgerError> {
        let current = self.get(owner, id).await?;
        let updated = current.apply(update)?;
        if updated.category != current.category {
            self.owned_category(owner, updated.category).await?;
        }
        if !self.store.update_income(&updated).await? {
            return Err(LedgerError::not_found("income", id));
        }
        tracing::debug!(income_id = %id, "income updated");
        Ok(updated)
    }

    /// Deletes an income owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] as [`get`](Self::get) does.
    pub async fn delete(&self, owner: UserId, id: IncomeId) -> Result<(), LedgerError> {
        self.get(owner, id).await?;
        if !self.store.delete_income(id).await? {
            return Err(LedgerError::not_found("income", id));
        }
        tracing::info!(income_id = %id, "income deleted");
        Ok(())
    }

    async fn owned_category(&self, owner: UserId, id: CategoryId) -> Result<(), LedgerError> {
        let categories = self.store.categories_for(owner).await?;
        if categories.iter().any(|c| c.id == id) {
            Ok(())
        } else {
            Err(LedgerError::not_found("category", id))
        }
    }
}
