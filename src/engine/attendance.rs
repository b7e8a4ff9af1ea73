use chrono::NaiveDateTime;
use tracing::{debug, info};

use super::{
    PayrollEngine,
    access::{Action, Principal, authorize},
};
use crate::{
    error::{AppError, WEEKEND_CHECK_IN},
    model::attendance::{AttendanceRecord, DayKey},
    store::LedgerWrite,
    utils::working_days::is_weekend,
};

impl PayrollEngine {
    /// Records the caller's attendance for `now`'s calendar day.
    ///
    /// Repeating the call on the same day returns the stored record as `Existing`.
    pub async fn check_in(
        &self,
        principal: &Principal,
        period_id: u64,
        now: NaiveDateTime,
    ) -> Result<LedgerWrite<AttendanceRecord>, AppError> {
        authorize(principal, Action::CheckIn)?;
        self.require_user(principal.user_id).await?;

        let period = self.find_period(period_id).await?;
        if period.processed {
            return Err(AppError::PeriodProcessed);
        }

        let day = now.date();
        if is_weekend(day) {
            return Err(AppError::bad_request(WEEKEND_CHECK_IN));
        }

        let key = DayKey {
            period_id,
            user_id: principal.user_id,
            day,
        };
        let written = self.store.check_in(key, now).await?;

        if written.is_created() {
            // the record is already committed; a failed count only costs the log field
            let total_days = self.attendance_days(period_id, key.user_id).await.ok();
            info!(period_id, user_id = key.user_id, %day, ?total_days, "Checked in");
        } else {
            debug!(period_id, user_id = key.user_id, %day, "Already checked in");
        }

        Ok(written)
    }

    pub async fn attendance_days(&self, period_id: u64, user_id: u64) -> Result<i64, AppError> {
        self.store.attendance_days(period_id, user_id).await
    }
}
