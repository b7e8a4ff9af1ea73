use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::{
    error::AppError,
    model::{
        attendance::{AttendanceRecord, DayKey},
        attendance_period::{AttendancePeriod, NewPeriod},
        overtime::OvertimeEntry,
        payroll::{NewPayslip, Payslip},
        reimbursement::{NewReimbursement, ReimbursementEntry},
        user::User,
    },
};

pub mod memory;
pub mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

/// Outcome of a ledger write that may hit an existing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWrite<T> {
    Created(T),
    /// Row already present and left untouched
    Existing(T),
    /// Row already present and changed in place
    Updated(T),
}

impl<T> LedgerWrite<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, LedgerWrite::Created(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            LedgerWrite::Created(v) | LedgerWrite::Existing(v) | LedgerWrite::Updated(v) => v,
        }
    }
}

/// What the store knows about one user's day while the day is locked.
#[derive(Debug, Clone, Copy)]
pub struct DayState<'a> {
    pub checked_in: bool,
    pub overtime: Option<&'a OvertimeEntry>,
}

/// Everything payroll needs about one user in one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLedger {
    pub user: User,
    pub attendance_days: i64,
    pub overtimes: Vec<OvertimeEntry>,
    pub reimbursements: Vec<ReimbursementEntry>,
}

/// Decides the hours to store for a day, or rejects the submission.
/// May borrow from the caller for the duration of the write.
pub type OvertimeRule<'a> = dyn Fn(DayState<'_>) -> Result<u8, AppError> + Send + Sync + 'a;

/// Turns a locked period's ledgers into payslips. An error aborts processing
/// and leaves the period open.
pub type PayrollRun<'a> =
    dyn Fn(&AttendancePeriod, &[UserLedger]) -> Result<Vec<NewPayslip>, AppError> + Send + Sync + 'a;

/// Durable state behind the engine.
///
/// Ledger writes fail with `NotFound` for unknown periods and `PeriodProcessed`
/// once the period is closed; both checks happen atomically with the write.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user(&self, user_id: u64) -> Result<Option<User>, AppError>;

    async fn insert_period(
        &self,
        period: NewPeriod,
        at: NaiveDateTime,
    ) -> Result<AttendancePeriod, AppError>;

    async fn find_period(&self, period_id: u64) -> Result<Option<AttendancePeriod>, AppError>;

    /// Inserts the day's record unless one already exists.
    async fn check_in(
        &self,
        key: DayKey,
        at: NaiveDateTime,
    ) -> Result<LedgerWrite<AttendanceRecord>, AppError>;

    /// Runs `rule` against the locked day and stores the hours it returns.
    async fn submit_overtime(
        &self,
        key: DayKey,
        at: NaiveDateTime,
        rule: &OvertimeRule<'_>,
    ) -> Result<LedgerWrite<OvertimeEntry>, AppError>;

    async fn insert_reimbursement(
        &self,
        entry: NewReimbursement,
        at: NaiveDateTime,
    ) -> Result<ReimbursementEntry, AppError>;

    async fn attendance_days(&self, period_id: u64, user_id: u64) -> Result<i64, AppError>;

    /// `None` when the user is unknown.
    async fn user_ledger(
        &self,
        period_id: u64,
        user_id: u64,
    ) -> Result<Option<UserLedger>, AppError>;

    /// Ledgers of every user with at least one check-in, ordered by user id.
    async fn attendee_ledgers(&self, period_id: u64) -> Result<Vec<UserLedger>, AppError>;

    /// Under an exclusive period lock: reads all ledgers, stores the payslips
    /// produced by `run` and marks the period processed.
    async fn process_period(
        &self,
        period_id: u64,
        at: NaiveDateTime,
        run: &PayrollRun<'_>,
    ) -> Result<(AttendancePeriod, Vec<Payslip>), AppError>;

    async fn payslips(&self, period_id: u64) -> Result<Vec<Payslip>, AppError>;

    async fn payslip(&self, period_id: u64, user_id: u64) -> Result<Option<Payslip>, AppError>;
}
