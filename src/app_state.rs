//! Wiring of every service over one store.

use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::persistence::LedgerStore;
use crate::service::{
    BalanceService, ExpenseService, GroupService, IncomeService, InviteService, PeriodLocks,
    RecurringService, ReportService,
};

/// The ledger's services, sharing one store and one set of
/// materialization locks.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Balance netting.
    pub balances: BalanceService,
    /// Recurring definitions and materialization.
    pub recurring: RecurringService,
    /// Expenses, installments and splits.
    pub expenses: ExpenseService,
    /// Groups and categories.
    pub groups: GroupService,
    /// Group invitations.
    pub invites: InviteService,
    /// Incomes.
    pub incomes: IncomeService,
    /// Dashboard reports.
    pub reports: ReportService,
}

impl AppState {
    /// Builds every service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, config: &LedgerConfig) -> Self {
        let locks = Arc::new(PeriodLocks::new());
        let recurring = RecurringService::new(Arc::clone(&store), locks)
            .with_materialization(config.recurring_materialization_enabled);
        Self {
            balances: BalanceService::new(Arc::clone(&store)),
            expenses: ExpenseService::new(Arc::clone(&store), recurring.clone()),
            reports: ReportService::new(Arc::clone(&store), recurring.clone()),
            groups: GroupService::new(Arc::clone(&store)),
            invites: InviteService::new(Arc::clone(&store)),
            incomes: IncomeService::new(store),
            recurring,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use tokio_test::assert_ok;

    use super::*;
    use crate::domain::{NewIncome, RecurringDraft};
    use crate::persistence::InMemoryStore;

    #[tokio::test]
    async fn services_share_the_store() {
        let store = Arc::new(InMemoryStore::new());
        let user = store.add_user("Ursula", "u@example.com").await;
        let state = AppState::new(Arc::<InMemoryStore>::clone(&store), &LedgerConfig::default());

        let category = assert_ok!(state.groups.create_category(user.id, "Bills").await);
        let draft = RecurringDraft {
            category: category.id,
            description: "Rent".to_string(),
            amount: dec!(700),
            day_of_month: Some(1),
            active: None,
        };
        assert_ok!(state.recurring.create(user.id, draft).await);

        let expenses = assert_ok!(state.expenses.list_expenses(user.id, 9, 2024).await);
        assert_eq!(expenses.len(), 1);
        let dashboard = assert_ok!(state.reports.dashboard(user.id, 9, 2024).await);
        assert_eq!(dashboard.materialization.skipped, 1);
        assert_eq!(dashboard.total_spent, dec!(700));
    }

    #[tokio::test]
    async fn disabled_materialization_is_honored() {
        let store = Arc::new(InMemoryStore::new());
        let user = store.add_user("Ursula", "u@example.com").await;
        let config = LedgerConfig {
            recurring_materialization_enabled: false,
            ..LedgerConfig::default()
        };
        let state = AppState::new(Arc::<InMemoryStore>::clone(&store), &config);
        let category = assert_ok!(state.groups.create_category(user.id, "Bills").await);
        let draft = RecurringDraft {
            category: category.id,
            description: "Rent".to_string(),
            amount: dec!(700),
            day_of_month: None,
            active: None,
        };
        assert_ok!(state.recurring.create(user.id, draft).await);

        assert!(assert_ok!(state.expenses.list_expenses(user.id, 9, 2024).await).is_empty());
    }

    #[tokio::test]
    async fn invites_and_incomes_use_the_same_store() {
        let store = Arc::new(InMemoryStore::new());
        let owner = store.add_user("Ursula", "u@example.com").await;
        let guest = store.add_user("Victor", "v@example.com").await;
        let state = AppState::new(Arc::<InMemoryStore>::clone(&store), &LedgerConfig::default());

        let group = assert_ok!(state.groups.create_group(owner.id, "Flat").await);
        let invite = assert_ok!(state.invites.create(owner.id, group.id, &guest.email).await);
        assert_ok!(state.invites.accept(guest.id, &invite.token).await);
        assert_eq!(assert_ok!(state.groups.members(guest.id, group.id).await).len(), 2);

        let category = assert_ok!(state.groups.create_category(guest.id, "Salary").await);
        let request = NewIncome {
            category: category.id,
            description: "Payroll".to_string(),
            amount: dec!(2500),
            date: chrono::NaiveDate::from_ymd_opt(2024, 9, 1).unwrap_or_default(),
        };
        assert_ok!(state.incomes.create(guest.id, request).await);
        let listed = assert_ok!(state.incomes.list(guest.id, Some(9), Some(2024)).await);
        assert_eq!(listed.len(), 1);
    }
}
