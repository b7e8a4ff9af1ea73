use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use super::{
    PayrollEngine,
    access::{Action, Principal, authorize},
};
use crate::{
    error::{AppError, END_BEFORE_START, PERIOD_NOT_FOUND},
    model::attendance_period::{AttendancePeriod, NewPeriod},
};

impl PayrollEngine {
    pub async fn create_period(
        &self,
        principal: &Principal,
        start_at: NaiveDate,
        end_at: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<AttendancePeriod, AppError> {
        authorize(principal, Action::CreatePeriod)?;

        if end_at < start_at {
            return Err(AppError::bad_request(END_BEFORE_START));
        }

        let period = self
            .store
            .insert_period(
                NewPeriod {
                    start_at,
                    end_at,
                    created_by: principal.user_id,
                },
                now,
            )
            .await?;

        info!(
            period_id = period.id,
            %start_at,
            %end_at,
            created_by = principal.user_id,
            "Attendance period created"
        );
        Ok(period)
    }

    pub async fn get_period(
        &self,
        principal: &Principal,
        period_id: u64,
    ) -> Result<AttendancePeriod, AppError> {
        authorize(principal, Action::ViewPeriod)?;
        self.find_period(period_id).await
    }

    pub(super) async fn find_period(&self, period_id: u64) -> Result<AttendancePeriod, AppError> {
        self.store
            .find_period(period_id)
            .await?
            .ok_or_else(|| AppError::not_found(PERIOD_NOT_FOUND))
    }
}
