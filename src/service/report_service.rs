//! Monthly dashboard report.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use super::{MaterializationReport, RecurringService};
use crate::domain::{CategoryId, InstallmentDetail, InstallmentStatus, Period, UserId};
use crate::error::LedgerError;
use crate::persistence::LedgerStore;

/// Spending of one category in the period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    /// Category id.
    pub category: CategoryId,
    /// Category name.
    pub name: String,
    /// Sum of installments due in the period.
    pub total: Decimal,
}

/// Amount one user paid towards shared installments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayerTotal {
    /// Payer id.
    pub user: UserId,
    /// Payer name, empty when unknown.
    pub name: String,
    /// Sum paid.
    pub amount: Decimal,
}

/// Shared-expense figures of the period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SharedStats {
    /// Sum of shared installments due in the period.
    pub total_shared: Decimal,
    /// Paid shared installments per payer, ordered by payer id.
    pub paid_by: Vec<PayerTotal>,
}

/// Monthly overview for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    /// Reported period.
    pub period: Period,
    /// Sum of installments due in the period.
    pub total_spent: Decimal,
    /// Sum of installments due in the following month.
    pub total_next_month: Decimal,
    /// Per-category totals, ordered by name.
    pub by_category: Vec<CategoryTotal>,
    /// Shared-expense figures.
    pub shared: SharedStats,
    /// Materialization of the reported period.
    pub materialization: MaterializationReport,
}

/// Builds dashboard reports.
#[derive(Debug, Clone)]
pub struct ReportService {
    store: Arc<dyn LedgerStore>,
    recurring: RecurringService,
}

impl ReportService {
    /// Creates a new `ReportService`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, recurring: RecurringService) -> Self {
        Self { store, recurring }
    }

    /// Dashboard of `user` for the month. Recurring expenses of the month
    /// and of the following one are materialized first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] for an invalid month or one
    /// without a following month, or a store failure.
    pub async fn dashboard(
        &self,
        user: UserId,
        month: u32,
        year: i32,
    ) -> Result<Dashboard, LedgerError> {
        let period = Period::new(month, year)?;
        let next = period.next()?;
        let materialization = self.recurring.materialize_period(user, period).await;
        self.recurring.materialize_period(user, next).await;

        let current = self.store.installments_in_period(user, period).await?;
        let upcoming = self.store.installments_in_period(user, next).await?;

        let shared = self.shared_stats(&current).await?;
        let dashboard = Dashboard {
            period,
            total_spent: sum(&current),
            total_next_month: sum(&upcoming),
            by_category: by_category(&current),
            shared,
            materialization,
        };
        tracing::debug!(
            %user,
            %period,
            total_spent = %dashboard.total_spent,
            categories = dashboard.by_category.len(),
            "dashboard built"
        );
        Ok(dashboard)
    }

    async fn shared_stats(
        &self,
        installments: &[InstallmentDetail],
    ) -> Result<SharedStats, LedgerError> {
        let shared: Vec<&InstallmentDetail> =
            installments.iter().filter(|d| d.is_shared).collect();
        let paid: BTreeMap<UserId, Decimal> = shared
            .iter()
            .filter(|d| d.installment.status == InstallmentStatus::Paid)
            .filter_map(|d| d.installment.paid_by.map(|payer| (payer, d.installment.amount)))
            .fold(BTreeMap::new(), |mut acc, (payer, amount)| {
                *acc.entry(payer).or_insert(Decimal::ZERO) += amount;
                acc
            });

        let mut paid_by = Vec::with_capacity(paid.len());
        for (user, amount) in paid {
            let name = self
                .store
                .find_user(user)
                .await?
                .map(|u| u.name)
                .unwrap_or_default();
            paid_by.push(PayerTotal { user, name, amount });
        }
        Ok(SharedStats {
            total_shared: shared.iter().map(|d| d.installment.amount).sum(),
            paid_by,
        })
    }
}

fn sum(installments: &[InstallmentDetail]) -> Decimal {
    installments.iter().map(|d| d.installment.amount).sum()
}

fn by_category(installments: &[InstallmentDetail]) -> Vec<CategoryTotal> {
    installments
        .iter()
        .fold(
            BTreeMap::<(String, CategoryId), Decimal>::new(),
            |mut acc, d| {
                *acc.entry((d.category_name.clone(), d.category))
                    .or_insert(Decimal::ZERO) += d.installment.amount;
                acc
            },
        )
        .into_iter()
        .map(|((name, category), total)| CategoryTotal {
            category,
            name,
            total,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::domain::{Category, NewExpense, RecurringDraft, User};
    use crate::persistence::InMemoryStore;
    use crate::service::{ExpenseService, GroupService, PeriodLocks};

    struct Fixture {
        store: Arc<InMemoryStore>,
        reports: ReportService,
        expenses: ExpenseService,
        recurring: RecurringService,
        groups: GroupService,
        u: User,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let u = store.add_user("Ursula", "u@example.com").await;
        let recurring = RecurringService::new(
            Arc::<InMemoryStore>::clone(&store),
            Arc::new(PeriodLocks::new()),
        );
        Fixture {
            reports: ReportService::new(Arc::<InMemoryStore>::clone(&store), recurring.clone()),
            expenses: ExpenseService::new(Arc::<InMemoryStore>::clone(&store), recurring.clone()),
            groups: GroupService::new(Arc::<InMemoryStore>::clone(&store)),
            recurring,
            store,
            u,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        let Some(date) = NaiveDate::from_ymd_opt(y, m, d) else {
            panic!("valid date");
        };
        date
    }

    fn expense(category: &Category, amount: Decimal, day: u32) -> NewExpense {
        NewExpense {
            category: category.id,
            description: "Purchase".to_string(),
            amount,
            date: date(2024, 5, day),
            installment_count: None,
            group: None,
        }
    }

    #[tokio::test]
    async fn totals_group_by_category_name() {
        let f = fixture().await;
        let travel = assert_ok!(f.groups.create_category(f.u.id, "Travel").await);
        let food = assert_ok!(f.groups.create_category(f.u.id, "Food").await);
        assert_ok!(f.expenses.create_expense(f.u.id, expense(&travel, dec!(120), 3)).await);
        assert_ok!(f.expenses.create_expense(f.u.id, expense(&food, dec!(10.10), 4)).await);
        assert_ok!(f.expenses.create_expense(f.u.id, expense(&food, dec!(5.25), 9)).await);

        let dashboard = assert_ok!(f.reports.dashboard(f.u.id, 5, 2024).await);
        assert_eq!(dashboard.total_spent, dec!(135.35));
        let names: Vec<&str> = dashboard.by_category.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Food", "Travel"]);
        let Some(food_total) = dashboard.by_category.first() else {
            panic!("food total");
        };
        assert_eq!(food_total.total, dec!(15.35));
        assert_eq!(dashboard.total_next_month, Decimal::ZERO);
    }

    #[tokio::test]
    async fn next_month_includes_installments_and_recurring() {
        let f = fixture().await;
        let bills = assert_ok!(f.groups.create_category(f.u.id, "Bills").await);
        let mut plan = expense(&bills, dec!(300), 15);
        plan.installment_count = Some(3);
        assert_ok!(f.expenses.create_expense(f.u.id, plan).await);
        let draft = RecurringDraft {
            category: bills.id,
            description: "Internet".to_string(),
            amount: dec!(40),
            day_of_month: Some(20),
            active: None,
        };
        assert_ok!(f.recurring.create(f.u.id, draft).await);

        let dashboard = assert_ok!(f.reports.dashboard(f.u.id, 5, 2024).await);
        assert_eq!(dashboard.materialization.created, 1);
        assert_eq!(dashboard.total_spent, dec!(140));
        assert_eq!(dashboard.total_next_month, dec!(140));
        // Two recurring occurrences plus the installment expense.
        assert_eq!(f.store.expense_count().await, 3);
    }

    #[tokio::test]
    async fn shared_stats_count_paid_installments_per_payer() {
        let f = fixture().await;
        let v = f.store.add_user("Victor", "v@example.com").await;
        let home = assert_ok!(f.groups.create_category(f.u.id, "Home").await);
        let group = assert_ok!(f.groups.create_group(f.u.id, "Flat").await);
        assert_ok!(f.groups.add_member(f.u.id, group.id, v.id).await);

        let mut shared = expense(&home, dec!(80), 2);
        shared.group = Some(group.id);
        let record = assert_ok!(f.expenses.create_expense(f.u.id, shared).await);
        assert_ok!(f.expenses.create_expense(f.u.id, expense(&home, dec!(20), 2)).await);
        let Some(installment) = record.installments.first() else {
            panic!("one installment");
        };
        assert_ok!(f.expenses.pay_installment(v.id, installment.id).await);

        let dashboard = assert_ok!(f.reports.dashboard(f.u.id, 5, 2024).await);
        assert_eq!(dashboard.shared.total_shared, dec!(80));
        let [payer] = dashboard.shared.paid_by.as_slice() else {
            panic!("one payer");
        };
        assert_eq!(payer.user, v.id);
        assert_eq!(payer.name, "Victor");
        assert_eq!(payer.amount, dec!(80));
    }

    #[tokio::test]
    async fn invalid_month_is_rejected() {
        let f = fixture().await;
        assert_err!(f.reports.dashboard(f.u.id, 0, 2024).await);
    }

    #[tokio::test]
    async fn last_supported_month_is_rejected_without_writes() {
        let f = fixture().await;
        let bills = assert_ok!(f.groups.create_category(f.u.id, "Bills").await);
        let draft = RecurringDraft {
            category: bills.id,
            description: "Internet".to_string(),
            amount: dec!(40),
            day_of_month: Some(20),
            active: None,
        };
        assert_ok!(f.recurring.create(f.u.id, draft).await);

        let err = assert_err!(f.reports.dashboard(f.u.id, 12, 262_142).await);
        assert!(matches!(err, LedgerError::InvalidRequest(_)));
        assert_eq!(f.store.expense_count().await, 0);
    }
}
