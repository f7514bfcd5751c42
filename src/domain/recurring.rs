//! Recurring expense definitions and their monthly occurrences.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::expense::{Expense, ExpenseRecord, Installment};
use super::money::to_currency;
use super::{CategoryId, ExpenseId, Period, RecurringId, UserId};
use crate::error::LedgerError;

/// Template for a monthly obligation from which concrete expenses are
/// generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringExpense {
    /// Definition identifier.
    pub id: RecurringId,
    /// Owning user.
    pub owner: UserId,
    /// Category of the generated expenses.
    pub category: CategoryId,
    /// Description copied onto generated expenses.
    pub description: String,
    /// Amount of every occurrence (positive).
    pub amount: Decimal,
    /// Preferred day of month (1–31), clamped in shorter months.
    pub day_of_month: u32,
    /// Inactive definitions are never materialized.
    pub active: bool,
}

/// Input for creating a recurring expense definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringDraft {
    /// Category of the generated expenses.
    pub category: CategoryId,
    /// Description copied onto generated expenses.
    pub description: String,
    /// Amount of every occurrence.
    pub amount: Decimal,
    /// Day of month; defaults to 1.
    #[serde(default)]
    pub day_of_month: Option<u32>,
    /// Whether the definition starts active; defaults to `true`.
    #[serde(default)]
    pub active: Option<bool>,
}

/// Partial update of a recurring expense definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringUpdate {
    /// New category.
    #[serde(default)]
    pub category: Option<CategoryId>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New amount.
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// New day of month.
    #[serde(default)]
    pub day_of_month: Option<u32>,
    /// Activate or deactivate.
    #[serde(default)]
    pub active: Option<bool>,
}

impl RecurringExpense {
    /// Builds a validated definition owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] if the description is
    /// empty, the amount is not positive, or the day is outside 1–31.
    pub fn create(owner: UserId, draft: RecurringDraft) -> Result<Self, LedgerError> {
        let definition = Self {
            id: RecurringId::new(),
            owner,
            category: draft.category,
            description: draft.description.trim().to_string(),
            amount: to_currency(draft.amount),
            day_of_month: draft.day_of_month.unwrap_or(1),
            active: draft.active.unwrap_or(true),
        };
        definition.validate()?;
        Ok(definition)
    }

    /// Returns a copy with `update` applied, re-validated.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] if the result is invalid.
    pub fn apply(&self, update: RecurringUpdate) -> Result<Self, LedgerError> {
        let updated = Self {
            id: self.id,
            owner: self.owner,
            category: update.category.unwrap_or(self.category),
            description: update
                .description
                .map_or_else(|| self.description.clone(), |d| d.trim().to_string()),
            amount: update.amount.map_or(self.amount, to_currency),
            day_of_month: update.day_of_month.unwrap_or(self.day_of_month),
            active: update.active.unwrap_or(self.active),
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
        if !(1..=31).contains(&self.day_of_month) {
            return Err(LedgerError::InvalidRequest(format!(
                "day of month must be between 1 and 31, got {}",
                self.day_of_month
            )));
        }
        Ok(())
    }

    /// Plans the expense and single open installment realizing this
    /// definition in `period`.
    #[must_use]
    pub fn occurrence(&self, period: Period) -> ExpenseRecord {
        let date = period.clamped_date(self.day_of_month);
        let expense = Expense {
            id: ExpenseId::new(),
            owner: self.owner,
            category: self.category,
            description: self.description.clone(),
            amount: self.amount,
            date,
            is_shared: false,
            group: None,
            is_installment: false,
            installment_count: 1,
            recurring: Some(self.id),
        };
        let installment = Installment::open(expense.id, 1, self.amount, date);
        ExpenseRecord {
            expense,
            installments: vec![installment],
            splits: Vec::new(),
        }
    }
}
