//! Service layer: ledger operations over a [`LedgerStore`].
//!
//! Services are cheap to clone and hold an `Arc<dyn LedgerStore>`.
//! [`RecurringService`] owns materialization; the period-scoped reads of
//! [`ExpenseService`] and [`ReportService`] call into it before querying.
//!
//! [`LedgerStore`]: crate::persistence::LedgerStore

pub mod balance_service;
pub mod expense_service;
pub mod group_service;
pub mod income_service;
pub mod invite_service;
pub mod period_locks;
pub mod recurring_service;
pub mod report_service;

pub use balance_service::BalanceService;
pub use expense_service::ExpenseService;
pub use group_service::GroupService;
pub use income_service::IncomeService;
pub use invite_service::InviteService;
pub use period_locks::{PeriodGuard, PeriodLocks};
pub use recurring_service::{MaterializationReport, RecurringService};
pub use report_service::{CategoryTotal, Dashboard, PayerTotal, ReportService, SharedStats};
