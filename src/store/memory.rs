use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::lock::Mutex;

use super::{DayState, LedgerWrite, OvertimeRule, PayrollRun, Store, UserLedger};
use crate::{
    error::{AppError, PERIOD_NOT_FOUND},
    model::{
        attendance::{AttendanceRecord, DayKey},
        attendance_period::{AttendancePeriod, NewPeriod},
        overtime::OvertimeEntry,
        payroll::Payslip,
        reimbursement::{NewReimbursement, ReimbursementEntry},
        user::User,
    },
};

#[derive(Default)]
struct State {
    last_id: u64,
    users: HashMap<u64, User>,
    periods: HashMap<u64, AttendancePeriod>,
    attendance: HashMap<DayKey, AttendanceRecord>,
    overtime: HashMap<DayKey, OvertimeEntry>,
    reimbursements: Vec<ReimbursementEntry>,
    payslips: HashMap<(u64, u64), Payslip>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn open_period(&self, period_id: u64) -> Result<&AttendancePeriod, AppError> {
        match self.periods.get(&period_id) {
            None => Err(AppError::not_found(PERIOD_NOT_FOUND)),
            Some(p) if p.processed => Err(AppError::PeriodProcessed),
            Some(p) => Ok(p),
        }
    }

    fn attendance_days(&self, period_id: u64, user_id: u64) -> i64 {
        self.attendance
            .keys()
            .filter(|k| k.period_id == period_id && k.user_id == user_id)
            .count() as i64
    }

    fn ledger(&self, period_id: u64, user: &User) -> UserLedger {
        let mut overtimes: Vec<_> = self
            .overtime
            .values()
            .filter(|o| o.period_id == period_id && o.user_id == user.id)
            .cloned()
            .collect();
        overtimes.sort_by_key(|o| o.day);

        let reimbursements = self
            .reimbursements
            .iter()
            .filter(|r| r.period_id == period_id && r.user_id == user.id)
            .cloned()
            .collect();

        UserLedger {
            user: user.clone(),
            attendance_days: self.attendance_days(period_id, user.id),
            overtimes,
            reimbursements,
        }
    }

    fn attendee_ledgers(&self, period_id: u64) -> Vec<UserLedger> {
        let mut attendees: Vec<u64> = self
            .attendance
            .keys()
            .filter(|k| k.period_id == period_id)
            .map(|k| k.user_id)
            .collect();
        attendees.sort_unstable();
        attendees.dedup();

        attendees
            .iter()
            .filter_map(|id| self.users.get(id))
            .map(|user| self.ledger(period_id, user))
            .collect()
    }
}

/// Process-local store. One async mutex serialises every operation, which
/// trivially gives the per-day and per-period exclusivity the engine needs.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let mut state = State::default();
        for user in users {
            state.last_id = state.last_id.max(user.id);
            state.users.insert(user.id, user);
        }

        Self {
            state: Mutex::new(state),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user(&self, user_id: u64) -> Result<Option<User>, AppError> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn insert_period(
        &self,
        period: NewPeriod,
        _at: NaiveDateTime,
    ) -> Result<AttendancePeriod, AppError> {
        let mut state = self.state.lock().await;
        let period = AttendancePeriod {
            id: state.next_id(),
            start_at: period.start_at,
            end_at: period.end_at,
            processed: false,
        };
        state.periods.insert(period.id, period.clone());

        Ok(period)
    }

    async fn find_period(&self, period_id: u64) -> Result<Option<AttendancePeriod>, AppError> {
        Ok(self.state.lock().await.periods.get(&period_id).cloned())
    }

    async fn check_in(
        &self,
        key: DayKey,
        at: NaiveDateTime,
    ) -> Result<LedgerWrite<AttendanceRecord>, AppError> {
        let mut state = self.state.lock().await;
        state.open_period(key.period_id)?;

        if let Some(existing) = state.attendance.get(&key) {
            return Ok(LedgerWrite::Existing(existing.clone()));
        }

        let record = AttendanceRecord {
            id: state.next_id(),
            user_id: key.user_id,
            period_id: key.period_id,
            day: key.day,
            checked_in_at: at,
        };
        state.attendance.insert(key, record.clone());

        Ok(LedgerWrite::Created(record))
    }

    async fn submit_overtime(
        &self,
        key: DayKey,
        _at: NaiveDateTime,
        rule: &OvertimeRule<'_>,
    ) -> Result<LedgerWrite<OvertimeEntry>, AppError> {
        let mut state = self.state.lock().await;
        state.open_period(key.period_id)?;

        let hours = rule(DayState {
            checked_in: state.attendance.contains_key(&key),
            overtime: state.overtime.get(&key),
        })?;

        if let Some(entry) = state.overtime.get_mut(&key) {
            entry.extra_hours = hours;
            return Ok(LedgerWrite::Updated(entry.clone()));
        }

        let entry = OvertimeEntry {
            id: state.next_id(),
            user_id: key.user_id,
            period_id: key.period_id,
            day: key.day,
            extra_hours: hours,
        };
        state.overtime.insert(key, entry.clone());

        Ok(LedgerWrite::Created(entry))
    }

    async fn insert_reimbursement(
        &self,
        entry: NewReimbursement,
        _at: NaiveDateTime,
    ) -> Result<ReimbursementEntry, AppError> {
        let mut state = self.state.lock().await;
        state.open_period(entry.period_id)?;

        let entry = ReimbursementEntry {
            id: state.next_id(),
            user_id: entry.user_id,
            period_id: entry.period_id,
            description: entry.description,
            amount: entry.amount,
        };
        state.reimbursements.push(entry.clone());

        Ok(entry)
    }

    async fn attendance_days(&self, period_id: u64, user_id: u64) -> Result<i64, AppError> {
        Ok(self.state.lock().await.attendance_days(period_id, user_id))
    }

    async fn user_ledger(
        &self,
        period_id: u64,
        user_id: u64,
    ) -> Result<Option<UserLedger>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .get(&user_id)
            .map(|user| state.ledger(period_id, user)))
    }

    async fn attendee_ledgers(&self, period_id: u64) -> Result<Vec<UserLedger>, AppError> {
        Ok(self.state.lock().await.attendee_ledgers(period_id))
    }

    async fn process_period(
        &self,
        period_id: u64,
        _at: NaiveDateTime,
        run: &PayrollRun<'_>,
    ) -> Result<(AttendancePeriod, Vec<Payslip>), AppError> {
        let mut state = self.state.lock().await;
        let period = state.open_period(period_id)?.clone();

        let ledgers = state.attendee_ledgers(period_id);
        let mut issued = Vec::new();
        for new in run(&period, &ledgers)? {
            let payslip = Payslip {
                id: state.next_id(),
                user_id: new.user_id,
                period_id,
                attendance_days: new.attendance_days,
                summary: new.summary,
            };
            state
                .payslips
                .insert((period_id, new.user_id), payslip.clone());
            issued.push(payslip);
        }

        let period = AttendancePeriod {
            processed: true,
            ..period
        };
        state.periods.insert(period_id, period.clone());

        Ok((period, issued))
    }

    async fn payslips(&self, period_id: u64) -> Result<Vec<Payslip>, AppError> {
        let state = self.state.lock().await;
        let mut payslips: Vec<_> = state
            .payslips
            .values()
            .filter(|p| p.period_id == period_id)
            .cloned()
            .collect();
        payslips.sort_by_key(|p| p.user_id);

        Ok(payslips)
    }

    async fn payslip(&self, period_id: u64, user_id: u64) -> Result<Option<Payslip>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .payslips
            .get(&(period_id, user_id))
            .cloned())
    }
}
