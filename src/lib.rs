//! # expense-ledger
//!
//! Core of a personal and shared expense tracker: settlement netting
//! between group members and on-read materialization of recurring
//! expenses, plus the expense, installment, split, group, invite and
//! income operations they sit on.
//!
//! ## Architecture
//!
//! ```text
//! Operator CLI (main.rs)
//!     │
//!     ├── AppState
//!     │
//!     ├── BalanceService ─────────── BalanceSummary::compute (domain/)
//!     ├── ExpenseService ──┐
//!     ├── ReportService ───┼── RecurringService ── PeriodLocks
//!     ├── GroupService     │
//!     ├── InviteService    │
//!     ├── IncomeService    │
//!     │                    │
//!     └── LedgerStore (persistence/)
//!             ├── PostgresStore (sqlx)
//!             └── InMemoryStore
//! ```

pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
