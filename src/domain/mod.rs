//! Domain layer: identifiers, value types, and the pure ledger algorithms.
//!
//! Everything here is free of I/O. Balance netting lives in [`balance`],
//! month arithmetic in [`period`], and installment/split planning in
//! [`expense`] and [`recurring`]. Incomes and group invitations are plain
//! validated records in [`income`] and [`invite`].

pub mod balance;
pub mod expense;
pub mod ids;
pub mod income;
pub mod invite;
pub mod money;
pub mod party;
pub mod period;
pub mod recurring;

pub use balance::{Balance, BalanceSummary, ConfirmedSplit, SharedExpense, SplitShare};
pub use expense::{
    Expense, ExpenseRecord, ExpenseSplit, Installment, InstallmentDetail, InstallmentStatus,
    NewExpense,
};
pub use ids::{
    CategoryId, ExpenseId, GroupId, IncomeId, InstallmentId, InviteId, RecurringId, SplitId,
    UserId,
};
pub use income::{Income, IncomeUpdate, NewIncome};
pub use invite::{INVITE_TTL_DAYS, Invite, InviteStatus, PendingInvite};
pub use party::{Category, Group, GroupMember, MemberRole, User};
pub use period::Period;
pub use recurring::{RecurringDraft, RecurringExpense, RecurringUpdate};
