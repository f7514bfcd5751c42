//! Incomes: money received by a user, listed per calendar month.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::to_currency;
use super::{CategoryId, IncomeId, UserId};
use crate::error::LedgerError;

/// One income entry. Private to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Income {
    /// Income identifier.
    pub id: IncomeId,
    /// Owning user.
    pub owner: UserId,
    /// Category, owned by the same user.
    pub category: CategoryId,
    /// Description.
    pub description: String,
    /// Amount received (positive).
    pub amount: Decimal,
    /// Date the income was received.
    pub date: NaiveDate,
}

/// Input for recording an income.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIncome {
    /// Category.
    pub category: CategoryId,
    /// Description.
    pub description: String,
    /// Amount received.
    pub amount: Decimal,
    /// Date received.
    pub date: NaiveDate,
}

/// Partial update of an income.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeUpdate {
    /// New category.
    #[serde(default)]
    pub category: Option<CategoryId>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New amount.
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// New date.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl Income {
    /// Builds a validated income owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] if the description is empty
    /// or the amount is not positive.
    pub fn create(owner: UserId, request: NewIncome) -> Result<Self, LedgerError> {
        let income = Self {
            id: IncomeId::new(),
            owner,
            category: request.category,
            description: request.description.trim().to_string(),
            amount: to_currency(request.amount),
            date: request.date,
        };
        income.validate()?;
        Ok(income)
    }

    /// Returns a copy with `update` applied, re-validated.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] if the result is invalid.
    pub fn apply(&self, update: IncomeUpdate) -> Result<Self, LedgerError> {
        let updated = Self {
            id: self.id,
            owner: self.owner,
            category: update.category.unwrap_or(self.category),
            description: update
                .description
                .map_or_else(|| self.description.clone(), |d| d.trim().to_string()),
            amount: update.amount.map_or(self.amount, to_currency),
            date: update.date.unwrap_or(self.date),
        };
        updated.validate()?;
        Ok(updated)
    }

    fn validate(&self) -> Result<(), LedgerError> {
        if self.description.is_empty() {
            return Err(LedgerError::InvalidRequest(
                "description must not be empty".to_string(),
            ));
        }
        if self.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidRequest(
                "amount must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
