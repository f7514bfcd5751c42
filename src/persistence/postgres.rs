//! PostgreSQL implementation of the persistence layer.
//!
//! Table layout is documented in `sql/schema.sql`. Recurring occurrences
//! rely on the `UNIQUE (recurring_expense_id, recurring_period)`
//! constraint: inserts use `ON CONFLICT DO NOTHING`, so a caller that
//! loses a race sees no row returned and reports
//! [`MaterializeOutcome::AlreadyPresent`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::models::{
    CategoryRow, ExpenseRow, GroupRow, IncomeRow, InstallmentDetailRow, InstallmentRow,
    InviteRow, MemberRow, PendingInviteRow, RecurringRow, SharedSplitRow, SplitRow, UserRow,
    group_confirmed_splits,
};
use super::{LedgerStore, MaterializeOutcome};
use crate::config::LedgerConfig;
use crate::domain::{
    Category, ConfirmedSplit, Expense, ExpenseId, ExpenseRecord, ExpenseSplit, Group, GroupId,
    GroupMember, Income, IncomeId, Installment, InstallmentDetail, InstallmentId,
    InstallmentStatus, Invite, InviteId, InviteStatus, MemberRole, PendingInvite, Period,
    RecurringExpense, RecurringId, User, UserId,
};
use crate::error::LedgerError;

const EXPENSE_COLUMNS: &str = "e.id, e.user_id, e.category_id, e.description, e.amount, e.date, \
     e.is_shared, e.group_id, e.is_installment, e.installment_count, e.recurring_expense_id";

const INSTALLMENT_DETAIL_SELECT: &str = "SELECT i.id, i.expense_id, i.number, i.amount, \
     i.due_date, i.status, i.paid_by, i.paid_at, e.description, e.category_id, \
     COALESCE(c.name, '') AS category_name, e.user_id AS owner_id, e.is_shared \
     FROM installments i \
     JOIN expenses e ON e.id = i.expense_id \
     LEFT JOIN categories c ON c.id = e.category_id";

/// Restricts `e` to expenses owned by, or split with, the user bound as `$1`.
const VISIBLE_TO_USER: &str = "(e.user_id = $1 OR EXISTS \
     (SELECT 1 FROM expense_splits vs WHERE vs.expense_id = e.id AND vs.user_id = $1))";

const INCOME_COLUMNS: &str = "id, user_id, category_id, description, amount, date";

const INVITE_COLUMNS: &str =
    "id, group_id, inviter_id, invitee_email, token, status, created_at, expires_at";

const RECURRING_COLUMNS: &str =
    "id, user_id, category_id, description, amount, day_of_month, active";

/// Converts a `u32` into an `INT4` bind value.
fn to_i32(value: u32, column: &str) -> Result<i32, LedgerError> {
    i32::try_from(value)
        .map_err(|_| LedgerError::InvalidRequest(format!("{column} {value} is too large")))
}

/// PostgreSQL-backed ledger store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Persistence`] if the database is unreachable.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        tracing::info!(
            max_connections = config.database_max_connections,
            "connected to postgres"
        );
        Ok(Self::new(pool))
    }

    /// Inserts every row of `record` on `conn`. Returns `false` when the
    /// expense row hit the recurring-period uniqueness constraint, in
    /// which case nothing was written.
    async fn insert_record(
        conn: &mut PgConnection,
        record: &ExpenseRecord,
        recurring_period: Option<NaiveDate>,
    ) -> Result<bool, LedgerError> {
        let expense = &record.expense;
        let inserted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO expenses (id, user_id, category_id, description, amount, date, \
             is_shared, group_id, is_installment, installment_count, recurring_expense_id, \
             recurring_period) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (recurring_expense_id, recurring_period) DO NOTHING \
             RETURNING id",
        )
        .bind(*expense.id.as_uuid())
        .bind(*expense.owner.as_uuid())
        .bind(*expense.category.as_uuid())
        .bind(&expense.description)
        .bind(expense.amount)
        .bind(expense.date)
        .bind(expense.is_shared)
        .bind(expense.group.map(Uuid::from))
        .bind(expense.is_installment)
        .bind(to_i32(expense.installment_count, "installment_count")?)
        .bind(expense.recurring.map(Uuid::from))
        .bind(recurring_period)
        .fetch_optional(&mut *conn)
        .await?;

        if inserted.is_none() {
            return Ok(false);
        }

        for installment in &record.installments {
            sqlx::query(
                "INSERT INTO installments (id, expense_id, number, amount, due_date, status) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(*installment.id.as_uuid())
            .bind(*installment.expense.as_uuid())
            .bind(to_i32(installment.number, "number")?)
            .bind(installment.amount)
            .bind(installment.due_date)
            .bind(installment.status.as_str())
            .execute(&mut *conn)
            .await?;
        }

        for split in &record.splits {
            sqlx::query(
                "INSERT INTO expense_splits (id, expense_id, user_id, amount, confirmed) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(*split.id.as_uuid())
            .bind(*split.expense.as_uuid())
            .bind(*split.user.as_uuid())
            .bind(split.amount)
            .bind(split.confirmed)
            .execute(&mut *conn)
            .await?;
        }

        Ok(true)
    }

    async fn installment_details(
        &self,
        filter: &str,
        user: UserId,
        bound: NaiveDate,
        upper: Option<NaiveDate>,
    ) -> Result<Vec<InstallmentDetail>, LedgerError> {
        let sql = format!(
            "{INSTALLMENT_DETAIL_SELECT} WHERE {VISIBLE_TO_USER} AND {filter} \
             ORDER BY i.due_date ASC, i.number ASC"
        );
        let mut query = sqlx::query_as::<_, InstallmentDetailRow>(&sql)
            .bind(*user.as_uuid())
            .bind(bound);
        if let Some(upper) = upper {
            query = query.bind(upper);
        }
        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(InstallmentDetail::try_from)
            .collect()
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name, email FROM users WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, LedgerError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn insert_group(&self, group: &Group) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO groups (id, name, owner_id) VALUES ($1, $2, $3)")
            .bind(*group.id.as_uuid())
            .bind(&group.name)
            .bind(*group.owner.as_uuid())
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO group_members (group_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(*group.id.as_uuid())
            .bind(*group.owner.as_uuid())
            .bind(MemberRole::Owner.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_group(&self, id: GroupId) -> Result<Option<Group>, LedgerError> {
        let row =
            sqlx::query_as::<_, GroupRow>("SELECT id, name, owner_id FROM groups WHERE id = $1")
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Group::from))
    }

    async fn group_members(&self, id: GroupId) -> Result<Vec<GroupMember>, LedgerError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT group_id, user_id, role FROM group_members WHERE group_id = $1 \
             ORDER BY user_id",
        )
        .bind(*id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(GroupMember::from).collect())
    }

    async fn insert_member(&self, member: &GroupMember) -> Result<(), LedgerError> {
        sqlx::query("INSERT INTO group_members (group_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(*member.group.as_uuid())
            .bind(*member.user.as_uuid())
            .bind(member.role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_member(&self, group: GroupId, user: UserId) -> Result<bool, LedgerError> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
            .bind(*group.as_uuid())
            .bind(*user.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_category(&self, category: &Category) -> Result<(), LedgerError> {
        sqlx::query("INSERT INTO categories (id, user_id, name) VALUES ($1, $2, $3)")
            .bind(*category.id.as_uuid())
            .bind(*category.owner.as_uuid())
            .bind(&category.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn categories_for(&self, owner: UserId) -> Result<Vec<Category>, LedgerError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, user_id, name FROM categories WHERE user_id = $1 ORDER BY name",
        )
        .bind(*owner.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn insert_income(&self, income: &Income) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO incomes (id, user_id, category_id, description, amount, date) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(*income.id.as_uuid())
        .bind(*income.owner.as_uuid())
        .bind(*income.category.as_uuid())
        .bind(&income.description)
        .bind(income.amount)
        .bind(income.date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_income(&self, id: IncomeId) -> Result<Option<Income>, LedgerError> {
        let sql = format!("SELECT {INCOME_COLUMNS} FROM incomes WHERE id = $1");
        let row = sqlx::query_as::<_, IncomeRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Income::from))
    }

    async fn incomes_for(
        &self,
        owner: UserId,
        period: Option<Period>,
    ) -> Result<Vec<Income>, LedgerError> {
        let rows = match period {
            Some(period) => {
                let sql = format!(
                    "SELECT {INCOME_COLUMNS} FROM incomes \
                     WHERE user_id = $1 AND date BETWEEN $2 AND $3 ORDER BY date DESC"
                );
                sqlx::query_as::<_, IncomeRow>(&sql)
                    .bind(*owner.as_uuid())
                    .bind(period.first_day())
                    .bind(period.last_day())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {INCOME_COLUMNS} FROM incomes WHERE user_id = $1 ORDER BY date DESC"
                );
                sqlx::query_as::<_, IncomeRow>(&sql)
                    .bind(*owner.as_uuid())
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows.into_iter().map(Income::from).collect())
    }

    async fn update_income(&self, income: &Income) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            "UPDATE incomes SET category_id = $2, description = $3, amount = $4, date = $5 \
             WHERE id = $1",
        )
        .bind(*income.id.as_uuid())
        .bind(*income.category.as_uuid())
        .bind(&income.description)
        .bind(income.amount)
        .bind(income.date)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_income(&self, id: IncomeId) -> Result<bool, LedgerError> {
        let result = sqlx::query("DELETE FROM incomes WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_expense(&self, record: &ExpenseRecord) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;
        if !Self::insert_record(&mut tx, record, None).await? {
            return Err(LedgerError::Persistence(format!(
                "expense {} conflicted on insert",
                record.expense.id
            )));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_expense(&self, id: ExpenseId) -> Result<Option<Expense>, LedgerError> {
        let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expenses e WHERE e.id = $1");
        sqlx::query_as::<_, ExpenseRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Expense::try_from)
            .transpose()
    }

    async fn expenses_in_period(
        &self,
        user: UserId,
        period: Period,
    ) -> Result<Vec<Expense>, LedgerError> {
        let sql = format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses e \
             WHERE {VISIBLE_TO_USER} AND e.date BETWEEN $2 AND $3 \
             ORDER BY e.date DESC"
        );
        sqlx::query_as::<_, ExpenseRow>(&sql)
            .bind(*user.as_uuid())
            .bind(period.first_day())
            .bind(period.last_day())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Expense::try_from)
            .collect()
    }

    async fn installments_in_period(
        &self,
        user: UserId,
        period: Period,
    ) -> Result<Vec<InstallmentDetail>, LedgerError> {
        self.installment_details(
            "i.due_date BETWEEN $2 AND $3",
            user,
            period.first_day(),
            Some(period.last_day()),
        )
        .await
    }

    async fn open_installments_after(
        &self,
        user: UserId,
        after: NaiveDate,
    ) -> Result<Vec<InstallmentDetail>, LedgerError> {
        self.installment_details("i.due_date > $2 AND i.status = 'OPEN'", user, after, None)
            .await
    }

    async fn find_installment(
        &self,
        id: InstallmentId,
    ) -> Result<Option<InstallmentDetail>, LedgerError> {
        let sql = format!("{INSTALLMENT_DETAIL_SELECT} WHERE i.id = $1");
        sqlx::query_as::<_, InstallmentDetailRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(InstallmentDetail::try_from)
            .transpose()
    }

    async fn mark_installment_paid(
        &self,
        id: InstallmentId,
        paid_by: UserId,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Installment>, LedgerError> {
        sqlx::query_as::<_, InstallmentRow>(
            "UPDATE installments SET status = $2, paid_by = $3, paid_at = $4 \
             WHERE id = $1 AND status = $5 \
             RETURNING id, expense_id, number, amount, due_date, status, paid_by, paid_at",
        )
        .bind(*id.as_uuid())
        .bind(InstallmentStatus::Paid.as_str())
        .bind(*paid_by.as_uuid())
        .bind(paid_at)
        .bind(InstallmentStatus::Open.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(Installment::try_from)
        .transpose()
    }

    async fn splits_for_expense(
        &self,
        expense: ExpenseId,
    ) -> Result<Vec<ExpenseSplit>, LedgerError> {
        let rows = sqlx::query_as::<_, SplitRow>(
            "SELECT id, expense_id, user_id, amount, confirmed FROM expense_splits \
             WHERE expense_id = $1 ORDER BY user_id",
        )
        .bind(*expense.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ExpenseSplit::from).collect())
    }

    async fn confirm_split(
        &self,
        expense: ExpenseId,
        user: UserId,
    ) -> Result<Option<ExpenseSplit>, LedgerError> {
        let row = sqlx::query_as::<_, SplitRow>(
            "UPDATE expense_splits SET confirmed = TRUE \
             WHERE expense_id = $1 AND user_id = $2 \
             RETURNING id, expense_id, user_id, amount, confirmed",
        )
        .bind(*expense.as_uuid())
        .bind(*user.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ExpenseSplit::from))
    }

    async fn confirmed_group_splits(&self) -> Result<Vec<ConfirmedSplit>, LedgerError> {
        let rows = sqlx::query_as::<_, SharedSplitRow>(
            "SELECT s.id AS split_id, s.amount, s.confirmed, \
                    su.id AS member_id, su.name AS member_name, su.email AS member_email, \
                    e.id AS expense_id, cu.id AS creator_id, cu.name AS creator_name, \
                    cu.email AS creator_email \
             FROM expense_splits s \
             JOIN expenses e ON e.id = s.expense_id \
             JOIN users su ON su.id = s.user_id \
             JOIN users cu ON cu.id = e.user_id \
             WHERE e.group_id IS NOT NULL \
               AND EXISTS (SELECT 1 FROM expense_splits c \
                           WHERE c.expense_id = e.id AND c.confirmed) \
             ORDER BY e.id, s.id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(group_confirmed_splits(rows))
    }

    async fn insert_recurring(&self, definition: &RecurringExpense) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO recurring_expenses \
             (id, user_id, category_id, description, amount, day_of_month, active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(*definition.id.as_uuid())
        .bind(*definition.owner.as_uuid())
        .bind(*definition.category.as_uuid())
        .bind(&definition.description)
        .bind(definition.amount)
        .bind(to_i32(definition.day_of_month, "day_of_month")?)
        .bind(definition.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_recurring(&self, definition: &RecurringExpense) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            "UPDATE recurring_expenses SET category_id = $2, description = $3, amount = $4, \
             day_of_month = $5, active = $6 WHERE id = $1",
        )
        .bind(*definition.id.as_uuid())
        .bind(*definition.category.as_uuid())
        .bind(&definition.description)
        .bind(definition.amount)
        .bind(to_i32(definition.day_of_month, "day_of_month")?)
        .bind(definition.active)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_recurring(&self, id: RecurringId) -> Result<bool, LedgerError> {
        let result = sqlx::query("DELETE FROM recurring_expenses WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_recurring(
        &self,
        id: RecurringId,
    ) -> Result<Option<RecurringExpense>, LedgerError> {
        let sql = format!("SELECT {RECURRING_COLUMNS} FROM recurring_expenses WHERE id = $1");
        sqlx::query_as::<_, RecurringRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(RecurringExpense::try_from)
            .transpose()
    }

    async fn recurring_for(&self, owner: UserId) -> Result<Vec<RecurringExpense>, LedgerError> {
        let sql = format!(
            "SELECT {RECURRING_COLUMNS} FROM recurring_expenses WHERE user_id = $1 \
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, RecurringRow>(&sql)
            .bind(*owner.as_uuid())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(RecurringExpense::try_from)
            .collect()
    }

    async fn active_recurring_for(
        &self,
        owner: UserId,
    ) -> Result<Vec<RecurringExpense>, LedgerError> {
        let sql = format!(
            "SELECT {RECURRING_COLUMNS} FROM recurring_expenses \
             WHERE user_id = $1 AND active ORDER BY id"
        );
        sqlx::query_as::<_, RecurringRow>(&sql)
            .bind(*owner.as_uuid())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(RecurringExpense::try_from)
            .collect()
    }

    async fn occurrence_exists(
        &self,
        recurring: RecurringId,
        period: Period,
    ) -> Result<bool, LedgerError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM expenses \
             WHERE recurring_expense_id = $1 AND date BETWEEN $2 AND $3)",
        )
        .bind(*recurring.as_uuid())
        .bind(period.first_day())
        .bind(period.last_day())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn materialize_occurrence(
        &self,
        record: &ExpenseRecord,
        period: Period,
    ) -> Result<MaterializeOutcome, LedgerError> {
        if record.expense.recurring.is_none() {
            return Err(LedgerError::InvalidRequest(
                "occurrence must reference a recurring definition".to_string(),
            ));
        }
        let mut tx = self.pool.begin().await?;
        if !Self::insert_record(&mut tx, record, Some(period.first_day())).await? {
            tx.rollback().await?;
            return Ok(MaterializeOutcome::AlreadyPresent);
        }
        tx.commit().await?;
        Ok(MaterializeOutcome::Created(record.expense.id))
    }

    async fn insert_invite(&self, invite: &Invite) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            "INSERT INTO group_invites \
             (id, group_id, inviter_id, invitee_email, token, status, created_at, expires_at) \
             SELECT $1, $2, $3, $4, $5, $6, $7, $8 \
             WHERE NOT EXISTS (SELECT 1 FROM group_invites p \
                               WHERE p.group_id = $2 AND p.invitee_email = $4 \
                                 AND p.status = 'PENDING' AND p.expires_at >= $7)",
        )
        .bind(*invite.id.as_uuid())
        .bind(*invite.group.as_uuid())
        .bind(*invite.inviter.as_uuid())
        .bind(&invite.invitee_email)
        .bind(&invite.token)
        .bind(invite.status.as_str())
        .bind(invite.created_at)
        .bind(invite.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_invite_by_token(&self, token: &str) -> Result<Option<Invite>, LedgerError> {
        let sql = format!("SELECT {INVITE_COLUMNS} FROM group_invites WHERE token = $1");
        sqlx::query_as::<_, InviteRow>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?
            .map(Invite::try_from)
            .transpose()
    }

    async fn pending_invites_for(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PendingInvite>, LedgerError> {
        sqlx::query_as::<_, PendingInviteRow>(
            "SELECT gi.id, gi.group_id, gi.inviter_id, gi.invitee_email, gi.token, gi.status, \
                    gi.created_at, gi.expires_at, g.name AS group_name, \
                    COALESCE(u.name, '') AS inviter_name \
             FROM group_invites gi \
             JOIN groups g ON g.id = gi.group_id \
             LEFT JOIN users u ON u.id = gi.inviter_id \
             WHERE lower(gi.invitee_email) = lower($1) \
               AND gi.status = 'PENDING' AND gi.expires_at >= $2 \
             ORDER BY gi.created_at DESC",
        )
        .bind(email)
        .bind(now)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(PendingInvite::try_from)
        .collect()
    }

    async fn accept_invite(&self, id: InviteId, member: &GroupMember) -> Result<bool, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let updated =
            sqlx::query("UPDATE group_invites SET status = $2 WHERE id = $1 AND status = $3")
                .bind(*id.as_uuid())
                .bind(InviteStatus::Accepted.as_str())
                .bind(InviteStatus::Pending.as_str())
                .execute(&mut *tx)
                .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        sqlx::query("INSERT INTO group_members (group_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(*member.group.as_uuid())
            .bind(*member.user.as_uuid())
            .bind(member.role.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn reject_invite(&self, id: InviteId) -> Result<bool, LedgerError> {
        let result =
            sqlx::query("UPDATE group_invites SET status = $2 WHERE id = $1 AND status = $3")
                .bind(*id.as_uuid())
                .bind(InviteStatus::Rejected.as_str())
                .bind(InviteStatus::Pending.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
