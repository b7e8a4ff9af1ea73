use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, MySqlConnection, MySqlPool, mysql::MySqlDatabaseError};
use tracing::warn;

use super::{DayState, LedgerWrite, OvertimeRule, PayrollRun, Store, UserLedger};
use crate::{
    error::{AppError, PERIOD_NOT_FOUND, db_error},
    model::{
        attendance::{AttendanceRecord, DayKey},
        attendance_period::{AttendancePeriod, NewPeriod},
        overtime::OvertimeEntry,
        payroll::{Payslip, PayslipSummary},
        reimbursement::{NewReimbursement, ReimbursementEntry},
        role::Role,
        user::User,
    },
};

/// Writes that lose a unique-key race or a deadlock are replayed this many extra times.
const CONFLICT_RETRIES: usize = 1;

/// `ER_DUP_ENTRY`
const DUPLICATE_ENTRY: u16 = 1062;
/// `ER_LOCK_DEADLOCK`
const LOCK_DEADLOCK: u16 = 1213;

#[derive(FromRow)]
struct UserRow {
    id: u64,
    username: String,
    role_id: u8,
    salary: i64,
}

impl UserRow {
    fn into_user(self) -> Result<User, AppError> {
        let role = Role::from_id(self.role_id).ok_or_else(|| {
            tracing::error!(user_id = self.id, role_id = self.role_id, "Unknown role id");
            AppError::Internal
        })?;

        Ok(User {
            id: self.id,
            username: self.username,
            role,
            salary: self.salary,
        })
    }
}

#[derive(FromRow)]
struct PayslipRow {
    id: u64,
    user_id: u64,
    period_id: u64,
    attendance_days: i64,
    base_salary: i64,
    prorated_amount: i64,
    overtime_total: i64,
    reimbursement_total: i64,
    take_home_pay: i64,
}

impl From<PayslipRow> for Payslip {
    fn from(row: PayslipRow) -> Self {
        Payslip {
            id: row.id,
            user_id: row.user_id,
            period_id: row.period_id,
            attendance_days: row.attendance_days,
            summary: PayslipSummary {
                base_salary: row.base_salary,
                prorated_amount: row.prorated_amount,
                overtime_total: row.overtime_total,
                reimbursement_total: row.reimbursement_total,
                take_home_pay: row.take_home_pay,
            },
        }
    }
}

fn server_error_number(e: &sqlx::Error) -> Option<u16> {
    match e {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(MySqlDatabaseError::number),
        _ => None,
    }
}

/// A duplicate entry on one of the unique keys, or a deadlock victim.
/// Foreign key and other integrity errors share SQLSTATE `23000` and are not replayed.
fn is_retryable(e: &sqlx::Error) -> bool {
    matches!(
        server_error_number(e),
        Some(DUPLICATE_ENTRY | LOCK_DEADLOCK)
    )
}

enum PeriodLock {
    /// Held by ledger writes; many may run at once
    Shared,
    /// Held by payroll processing
    Exclusive,
}

/// Locks the period row and fails unless it exists and is still open.
async fn lock_open_period(
    conn: &mut MySqlConnection,
    period_id: u64,
    mode: PeriodLock,
) -> Result<AttendancePeriod, WriteError> {
    let sql = match mode {
        PeriodLock::Shared => {
            "SELECT id, start_at, end_at, processed FROM attendance_periods WHERE id = ? LOCK IN SHARE MODE"
        }
        PeriodLock::Exclusive => {
            "SELECT id, start_at, end_at, processed FROM attendance_periods WHERE id = ? FOR UPDATE"
        }
    };

    let period = sqlx::query_as::<_, AttendancePeriod>(sql)
        .bind(period_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(write_error("lock attendance period"))?;

    match period {
        None => Err(AppError::not_found(PERIOD_NOT_FOUND).into()),
        Some(p) if p.processed => Err(AppError::PeriodProcessed.into()),
        Some(p) => Ok(p),
    }
}

// Day rows are read without locks. A locking read of a missing row takes a gap
// lock, and two such transactions inserting into the same gap deadlock. The
// unique keys arbitrate instead: the loser gets a duplicate entry and replays.

async fn fetch_attendance(
    conn: &mut MySqlConnection,
    key: DayKey,
) -> Result<Option<AttendanceRecord>, WriteError> {
    sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT id, user_id, period_id, day, checked_in_at
        FROM attendance_records
        WHERE user_id = ? AND period_id = ? AND day = ?
        "#,
    )
    .bind(key.user_id)
    .bind(key.period_id)
    .bind(key.day)
    .fetch_optional(&mut *conn)
    .await
    .map_err(write_error("fetch attendance record"))
}

async fn fetch_overtime(
    conn: &mut MySqlConnection,
    key: DayKey,
) -> Result<Option<OvertimeEntry>, WriteError> {
    sqlx::query_as::<_, OvertimeEntry>(
        r#"
        SELECT id, user_id, period_id, day, extra_hours
        FROM overtime_entries
        WHERE user_id = ? AND period_id = ? AND day = ?
        "#,
    )
    .bind(key.user_id)
    .bind(key.period_id)
    .bind(key.day)
    .fetch_optional(&mut *conn)
    .await
    .map_err(write_error("fetch overtime entry"))
}

/// Re-reads an existing entry under a record lock on its primary key.
async fn lock_overtime(
    conn: &mut MySqlConnection,
    id: u64,
) -> Result<Option<OvertimeEntry>, WriteError> {
    sqlx::query_as::<_, OvertimeEntry>(
        "SELECT id, user_id, period_id, day, extra_hours FROM overtime_entries WHERE id = ? FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(write_error("lock overtime entry"))
}

async fn fetch_user(conn: &mut MySqlConnection, user_id: u64) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, UserRow>("SELECT id, username, role_id, salary FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("fetch user"))?
        .map(UserRow::into_user)
        .transpose()
}

/// Loads ledgers for `user_id`, or for every attendee when `None`.
async fn load_ledgers(
    conn: &mut MySqlConnection,
    period_id: u64,
    user_id: Option<u64>,
) -> Result<Vec<UserLedger>, AppError> {
    let users: Vec<(User, i64)> = match user_id {
        Some(id) => match fetch_user(&mut *conn, id).await? {
            Some(user) => {
                let days = count_attendance(&mut *conn, period_id, id).await?;
                vec![(user, days)]
            }
            None => Vec::new(),
        },
        None => {
            let rows = sqlx::query_as::<_, (u64, String, u8, i64, i64)>(
                r#"
                SELECT u.id, u.username, u.role_id, u.salary, COUNT(a.id)
                FROM attendance_records a
                JOIN users u ON u.id = a.user_id
                WHERE a.period_id = ?
                GROUP BY u.id, u.username, u.role_id, u.salary
                ORDER BY u.id
                "#,
            )
            .bind(period_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error("fetch attendees"))?;

            rows.into_iter()
                .map(|(id, username, role_id, salary, days)| {
                    let user = UserRow {
                        id,
                        username,
                        role_id,
                        salary,
                    }
                    .into_user()?;
                    Ok((user, days))
                })
                .collect::<Result<_, AppError>>()?
        }
    };

    if users.is_empty() {
        return Ok(Vec::new());
    }

    let overtimes = sqlx::query_as::<_, OvertimeEntry>(
        r#"
        SELECT id, user_id, period_id, day, extra_hours
        FROM overtime_entries
        WHERE period_id = ? AND (? IS NULL OR user_id = ?)
        ORDER BY user_id, day
        "#,
    )
    .bind(period_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("fetch overtime entries"))?;

    let reimbursements = sqlx::query_as::<_, ReimbursementEntry>(
        r#"
        SELECT id, user_id, period_id, description, amount
        FROM reimbursement_entries
        WHERE period_id = ? AND (? IS NULL OR user_id = ?)
        ORDER BY user_id, id
        "#,
    )
    .bind(period_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("fetch reimbursement entries"))?;

    Ok(users
        .into_iter()
        .map(|(user, attendance_days)| UserLedger {
            overtimes: overtimes
                .iter()
                .filter(|o| o.user_id == user.id)
                .cloned()
                .collect(),
            reimbursements: reimbursements
                .iter()
                .filter(|r| r.user_id == user.id)
                .cloned()
                .collect(),
            user,
            attendance_days,
        })
        .collect())
}

async fn count_attendance(
    conn: &mut MySqlConnection,
    period_id: u64,
    user_id: u64,
) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM attendance_records WHERE period_id = ? AND user_id = ?",
    )
    .bind(period_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("count attendance"))
}

/// Failure of one write attempt; `Conflict` means another request won a
/// unique-key race or the server rolled the attempt back to break a deadlock.
enum WriteError {
    Conflict,
    App(AppError),
}

impl From<AppError> for WriteError {
    fn from(e: AppError) -> Self {
        WriteError::App(e)
    }
}

/// For paths that never replay.
impl From<WriteError> for AppError {
    fn from(e: WriteError) -> Self {
        match e {
            WriteError::App(e) => e,
            WriteError::Conflict => {
                tracing::error!("Write conflict outside a retried operation");
                AppError::Internal
            }
        }
    }
}

fn write_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> WriteError {
    move |e| {
        if is_retryable(&e) {
            warn!(error = %e, operation, "Write lost a race");
            WriteError::Conflict
        } else {
            WriteError::App(db_error(operation)(e))
        }
    }
}

async fn retry_on_conflict<T, F, Fut>(operation: &'static str, mut attempt: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WriteError>>,
{
    for retry in 0..=CONFLICT_RETRIES {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(WriteError::App(e)) => return Err(e),
            Err(WriteError::Conflict) => {
                warn!(operation, retry, "Write conflict, retrying");
            }
        }
    }

    tracing::error!(operation, "Write conflict persisted after retry");
    Err(AppError::Internal)
}

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn try_check_in(
        &self,
        key: DayKey,
        at: NaiveDateTime,
    ) -> Result<LedgerWrite<AttendanceRecord>, WriteError> {
        let mut tx = self.pool.begin().await.map_err(write_error("begin check-in"))?;
        lock_open_period(&mut tx, key.period_id, PeriodLock::Shared).await?;

        if let Some(existing) = fetch_attendance(&mut tx, key).await? {
            tx.commit().await.map_err(write_error("commit check-in"))?;
            return Ok(LedgerWrite::Existing(existing));
        }

        let id = sqlx::query(
            r#"
            INSERT INTO attendance_records (user_id, period_id, day, checked_in_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(key.user_id)
        .bind(key.period_id)
        .bind(key.day)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(write_error("insert attendance record"))?
        .last_insert_id();

        tx.commit().await.map_err(write_error("commit check-in"))?;

        Ok(LedgerWrite::Created(AttendanceRecord {
            id,
            user_id: key.user_id,
            period_id: key.period_id,
            day: key.day,
            checked_in_at: at,
        }))
    }

    async fn try_submit_overtime(
        &self,
        key: DayKey,
        at: NaiveDateTime,
        rule: &OvertimeRule<'_>,
    ) -> Result<LedgerWrite<OvertimeEntry>, WriteError> {
        let mut tx = self.pool.begin().await.map_err(write_error("begin overtime"))?;
        lock_open_period(&mut tx, key.period_id, PeriodLock::Shared).await?;

        let checked_in = fetch_attendance(&mut tx, key).await?.is_some();
        // Submissions for a day that already has an entry queue on its row lock.
        // The first one for a new day races on `uq_overtime_day` instead.
        let existing = match fetch_overtime(&mut tx, key).await? {
            Some(entry) => lock_overtime(&mut tx, entry.id).await?,
            None => None,
        };

        let hours = rule(DayState {
            checked_in,
            overtime: existing.as_ref(),
        })?;

        let written = match existing {
            Some(entry) => {
                sqlx::query("UPDATE overtime_entries SET extra_hours = ?, updated_at = ? WHERE id = ?")
                    .bind(hours)
                    .bind(at)
                    .bind(entry.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(write_error("update overtime entry"))?;

                LedgerWrite::Updated(OvertimeEntry {
                    extra_hours: hours,
                    ..entry
                })
            }
            None => {
                let id = sqlx::query(
                    r#"
                    INSERT INTO overtime_entries (user_id, period_id, day, extra_hours, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(key.user_id)
                .bind(key.period_id)
                .bind(key.day)
                .bind(hours)
                .bind(at)
                .bind(at)
                .execute(&mut *tx)
                .await
                .map_err(write_error("insert overtime entry"))?
                .last_insert_id();

                LedgerWrite::Created(OvertimeEntry {
                    id,
                    user_id: key.user_id,
                    period_id: key.period_id,
                    day: key.day,
                    extra_hours: hours,
                })
            }
        };

        tx.commit().await.map_err(write_error("commit overtime"))?;
        Ok(written)
    }

    async fn try_insert_reimbursement(
        &self,
        entry: &NewReimbursement,
        at: NaiveDateTime,
    ) -> Result<ReimbursementEntry, WriteError> {
        let mut tx = self.pool.begin().await.map_err(write_error("begin reimbursement"))?;
        lock_open_period(&mut tx, entry.period_id, PeriodLock::Shared).await?;

        let id = sqlx::query(
            r#"
            INSERT INTO reimbursement_entries (user_id, period_id, description, amount, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.period_id)
        .bind(&entry.description)
        .bind(entry.amount)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(write_error("insert reimbursement entry"))?
        .last_insert_id();

        tx.commit().await.map_err(write_error("commit reimbursement"))?;

        Ok(ReimbursementEntry {
            id,
            user_id: entry.user_id,
            period_id: entry.period_id,
            description: entry.description.clone(),
            amount: entry.amount,
        })
    }
}

#[async_trait]
impl Store for MySqlStore {
    async fn find_user(&self, user_id: u64) -> Result<Option<User>, AppError> {
        let mut conn = self.pool.acquire().await.map_err(db_error("acquire connection"))?;
        fetch_user(&mut conn, user_id).await
    }

    async fn insert_period(
        &self,
        period: NewPeriod,
        at: NaiveDateTime,
    ) -> Result<AttendancePeriod, AppError> {
        let id = sqlx::query(
            r#"
            INSERT INTO attendance_periods (start_at, end_at, processed, created_by, created_at, updated_at)
            VALUES (?, ?, FALSE, ?, ?, ?)
            "#,
        )
        .bind(period.start_at)
        .bind(period.end_at)
        .bind(period.created_by)
        .bind(at)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db_error("insert attendance period"))?
        .last_insert_id();

        Ok(AttendancePeriod {
            id,
            start_at: period.start_at,
            end_at: period.end_at,
            processed: false,
        })
    }

    async fn find_period(&self, period_id: u64) -> Result<Option<AttendancePeriod>, AppError> {
        sqlx::query_as::<_, AttendancePeriod>(
            "SELECT id, start_at, end_at, processed FROM attendance_periods WHERE id = ?",
        )
        .bind(period_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch attendance period"))
    }

    async fn check_in(
        &self,
        key: DayKey,
        at: NaiveDateTime,
    ) -> Result<LedgerWrite<AttendanceRecord>, AppError> {
        retry_on_conflict("check-in", || self.try_check_in(key, at)).await
    }

    async fn submit_overtime(
        &self,
        key: DayKey,
        at: NaiveDateTime,
        rule: &OvertimeRule<'_>,
    ) -> Result<LedgerWrite<OvertimeEntry>, AppError> {
        retry_on_conflict("overtime", || self.try_submit_overtime(key, at, rule)).await
    }

    async fn insert_reimbursement(
        &self,
        entry: NewReimbursement,
        at: NaiveDateTime,
    ) -> Result<ReimbursementEntry, AppError> {
        retry_on_conflict("reimbursement", || self.try_insert_reimbursement(&entry, at)).await
    }

    async fn attendance_days(&self, period_id: u64, user_id: u64) -> Result<i64, AppError> {
        let mut conn = self.pool.acquire().await.map_err(db_error("acquire connection"))?;
        count_attendance(&mut conn, period_id, user_id).await
    }

    async fn user_ledger(
        &self,
        period_id: u64,
        user_id: u64,
    ) -> Result<Option<UserLedger>, AppError> {
        let mut conn = self.pool.acquire().await.map_err(db_error("acquire connection"))?;
        Ok(load_ledgers(&mut conn, period_id, Some(user_id))
            .await?
            .into_iter()
            .next())
    }

    async fn attendee_ledgers(&self, period_id: u64) -> Result<Vec<UserLedger>, AppError> {
        let mut conn = self.pool.acquire().await.map_err(db_error("acquire connection"))?;
        load_ledgers(&mut conn, period_id, None).await
    }

    async fn process_period(
        &self,
        period_id: u64,
        at: NaiveDateTime,
        run: &PayrollRun<'_>,
    ) -> Result<(AttendancePeriod, Vec<Payslip>), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin payroll"))?;
        let period = lock_open_period(&mut tx, period_id, PeriodLock::Exclusive).await?;

        let ledgers = load_ledgers(&mut tx, period_id, None).await?;
        let payslips = run(&period, &ledgers)?;
        let mut issued = Vec::with_capacity(payslips.len());

        for new in payslips {
            let summary = new.summary;
            let id = sqlx::query(
                r#"
                INSERT INTO payslips
                    (user_id, period_id, attendance_days, base_salary, prorated_amount,
                     overtime_total, reimbursement_total, take_home_pay, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(new.user_id)
            .bind(period_id)
            .bind(new.attendance_days)
            .bind(summary.base_salary)
            .bind(summary.prorated_amount)
            .bind(summary.overtime_total)
            .bind(summary.reimbursement_total)
            .bind(summary.take_home_pay)
            .bind(at)
            .execute(&mut *tx)
            .await
            .map_err(db_error("insert payslip"))?
            .last_insert_id();

            issued.push(Payslip {
                id,
                user_id: new.user_id,
                period_id,
                attendance_days: new.attendance_days,
                summary,
            });
        }

        sqlx::query("UPDATE attendance_periods SET processed = TRUE, updated_at = ? WHERE id = ?")
            .bind(at)
            .bind(period_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("mark period processed"))?;

        tx.commit().await.map_err(db_error("commit payroll"))?;

        Ok((
            AttendancePeriod {
                processed: true,
                ..period
            },
            issued,
        ))
    }

    async fn payslips(&self, period_id: u64) -> Result<Vec<Payslip>, AppError> {
        let rows = sqlx::query_as::<_, PayslipRow>(
            r#"
            SELECT id, user_id, period_id, attendance_days, base_salary, prorated_amount,
                   overtime_total, reimbursement_total, take_home_pay
            FROM payslips
            WHERE period_id = ?
            ORDER BY user_id
            "#,
        )
        .bind(period_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch payslips"))?;

        Ok(rows.into_iter().map(Payslip::from).collect())
    }

    async fn payslip(&self, period_id: u64, user_id: u64) -> Result<Option<Payslip>, AppError> {
        let row = sqlx::query_as::<_, PayslipRow>(
            r#"
            SELECT id, user_id, period_id, attendance_days, base_salary, prorated_amount,
                   overtime_total, reimbursement_total, take_home_pay
            FROM payslips
            WHERE period_id = ? AND user_id = ?
            "#,
        )
        .bind(period_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch payslip"))?;

        Ok(row.map(Payslip::from))
    }
}
