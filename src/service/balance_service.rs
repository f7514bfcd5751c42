//! Balance service: nets confirmed shared-expense splits per counterparty.

use std::sync::Arc;

use crate::domain::{BalanceSummary, UserId};
use crate::error::LedgerError;
use crate::persistence::LedgerStore;

/// Read-only settlement reporting.
///
/// Performs no locking. Concurrent split or expense writes may or may not
/// be reflected in a given summary.
#[derive(Debug, Clone)]
pub struct BalanceService {
    store: Arc<dyn LedgerStore>,
}

impl BalanceService {
    /// Creates a new `BalanceService`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Computes what `user` is owed and owes across every confirmed split
    /// of every group expense.
    ///
    /// A user with no shared expenses, including an unknown user, gets an
    /// empty summary.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn compute_balances(&self, user: UserId) -> Result<BalanceSummary, LedgerError> {
        let splits = self.store.confirmed_group_splits().await?;
        let summary = BalanceSummary::compute(user, &splits);
        tracing::debug!(
            %user,
            splits = splits.len(),
            to_receive = summary.to_receive.len(),
            to_pay = summary.to_pay.len(),
            net = %summary.net_balance,
            "balances computed"
        );
        Ok(summary)
    }
}
