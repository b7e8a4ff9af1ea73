use chrono::{NaiveDateTime, Timelike};
use tracing::info;

use super::{
    PayrollEngine,
    access::{Action, Principal, authorize},
};
use crate::{
    error::{AppError, NOT_CHECKED_IN, OVERTIME_CAP, OVERTIME_NOT_POSITIVE, WORK_HOURS_NOT_DONE},
    model::{attendance::DayKey, overtime::OvertimeEntry},
    store::{DayState, LedgerWrite},
};

pub const MAX_OVERTIME_HOURS_PER_DAY: u8 = 3;

/// Overtime starts once the regular 09:00-17:00 day is over.
pub const WORKDAY_END_HOUR: u32 = 17;

/// Hours to store for the day after adding `requested` to what is already there.
///
/// `requested` is taken as submitted so that out-of-range values get the
/// business messages instead of a decoding error.
pub fn next_overtime_hours(
    state: DayState<'_>,
    requested: i64,
    now: NaiveDateTime,
) -> Result<u8, AppError> {
    if !state.checked_in {
        return Err(AppError::bad_request(NOT_CHECKED_IN));
    }
    if now.hour() < WORKDAY_END_HOUR {
        return Err(AppError::bad_request(WORK_HOURS_NOT_DONE));
    }
    if requested <= 0 {
        return Err(AppError::bad_request(OVERTIME_NOT_POSITIVE));
    }

    let stored = state.overtime.map_or(0, |o| i64::from(o.extra_hours));
    stored
        .checked_add(requested)
        .filter(|total| *total <= i64::from(MAX_OVERTIME_HOURS_PER_DAY))
        .and_then(|total| u8::try_from(total).ok())
        .ok_or_else(|| AppError::bad_request(OVERTIME_CAP))
}

impl PayrollEngine {
    /// Adds overtime to the caller's current day. The day's entry keeps its id
    /// across submissions; a rejected submission leaves it unchanged.
    pub async fn submit_overtime(
        &self,
        principal: &Principal,
        period_id: u64,
        extra_hours: i64,
        now: NaiveDateTime,
    ) -> Result<LedgerWrite<OvertimeEntry>, AppError> {
        authorize(principal, Action::SubmitOvertime)?;
        self.require_user(principal.user_id).await?;

        let key = DayKey {
            period_id,
            user_id: principal.user_id,
            day: now.date(),
        };
        let written = self
            .store
            .submit_overtime(key, now, &move |state| {
                next_overtime_hours(state, extra_hours, now)
            })
            .await?;

        let entry = match &written {
            LedgerWrite::Created(e) | LedgerWrite::Existing(e) | LedgerWrite::Updated(e) => e,
        };
        info!(
            entry_id = entry.id,
            period_id,
            user_id = key.user_id,
            day = %key.day,
            hours = entry.extra_hours,
            "Overtime recorded"
        );

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::{
        error::{PERIOD_NOT_FOUND, USER_NOT_FOUND},
        model::attendance_period::AttendancePeriod,
    };
    use futures::future::join_all;

    async fn checked_in(engine: &PayrollEngine, hour: u32) -> AttendancePeriod {
        let period = engine
            .create_period(&admin(), date(3), date(5), at(3, 9))
            .await
            .unwrap();
        engine
            .check_in(&employee(ALICE_ID), period.id, at(3, hour))
            .await
            .unwrap();
        period
    }

    #[actix_web::test]
    async fn submissions_add_up_to_the_daily_cap() {
        let engine = engine();
        let period = engine
            .create_period(&admin(), date(3), date(5), at(3, 9))
            .await
            .unwrap();
        let alice = employee(ALICE_ID);

        let not_checked_in = engine.submit_overtime(&alice, period.id, 1, at(3, 18)).await;
        assert_eq!(not_checked_in, Err(AppError::bad_request(NOT_CHECKED_IN)));

        engine.check_in(&alice, period.id, at(3, 18)).await.unwrap();

        let too_many = engine.submit_overtime(&alice, period.id, 4, at(3, 18)).await;
        assert_eq!(too_many, Err(AppError::bad_request(OVERTIME_CAP)));

        let first = engine
            .submit_overtime(&alice, period.id, 1, at(3, 18))
            .await
            .unwrap();
        assert!(first.is_created());

        let second = engine
            .submit_overtime(&alice, period.id, 2, at(3, 18))
            .await
            .unwrap();
        let first = first.into_inner();
        assert_eq!(
            second,
            LedgerWrite::Updated(OvertimeEntry {
                extra_hours: 3,
                ..first.clone()
            })
        );

        let over = engine.submit_overtime(&alice, period.id, 1, at(3, 18)).await;
        assert_eq!(over, Err(AppError::bad_request(OVERTIME_CAP)));

        let ledger = engine
            .store
            .user_ledger(period.id, ALICE_ID)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ledger.overtimes.len(), 1);
        assert_eq!(ledger.overtimes[0].id, first.id);
        assert_eq!(ledger.overtimes[0].extra_hours, 3);
    }

    #[actix_web::test]
    async fn overtime_waits_for_the_end_of_the_workday() {
        let engine = engine();
        let period = checked_in(&engine, 10).await;

        let early = engine
            .submit_overtime(&employee(ALICE_ID), period.id, 1, at(3, 16))
            .await;
        assert_eq!(early, Err(AppError::bad_request(WORK_HOURS_NOT_DONE)));
    }

    #[actix_web::test]
    async fn zero_hours_are_rejected() {
        let engine = engine();
        let period = checked_in(&engine, 10).await;

        let zero = engine
            .submit_overtime(&employee(ALICE_ID), period.id, 0, at(3, 18))
            .await;
        assert_eq!(zero, Err(AppError::bad_request(OVERTIME_NOT_POSITIVE)));
    }

    #[actix_web::test]
    async fn yesterdays_check_in_does_not_count() {
        let engine = engine();
        let period = checked_in(&engine, 10).await;

        let next_day = engine
            .submit_overtime(&employee(ALICE_ID), period.id, 1, at(4, 18))
            .await;
        assert_eq!(next_day, Err(AppError::bad_request(NOT_CHECKED_IN)));
    }

    #[actix_web::test]
    async fn unknown_period() {
        let missing = engine()
            .submit_overtime(&employee(ALICE_ID), 999, 1, at(3, 18))
            .await;
        assert_eq!(missing, Err(AppError::not_found(PERIOD_NOT_FOUND)));
    }

    #[test]
    fn large_requests_do_not_overflow() {
        let stored = OvertimeEntry {
            id: 1,
            user_id: ALICE_ID,
            period_id: 1,
            day: date(3),
            extra_hours: 2,
        };
        let state = DayState {
            checked_in: true,
            overtime: Some(&stored),
        };

        for requested in [2, 300, i64::MAX] {
            assert_eq!(
                next_overtime_hours(state, requested, at(3, 18)),
                Err(AppError::bad_request(OVERTIME_CAP))
            );
        }
        assert_eq!(next_overtime_hours(state, 1, at(3, 18)), Ok(3));
    }

    #[test]
    fn first_submission_of_the_day_is_capped_too() {
        let state = DayState {
            checked_in: true,
            overtime: None,
        };

        assert_eq!(
            next_overtime_hours(state, 4, at(3, 18)),
            Err(AppError::bad_request(OVERTIME_CAP))
        );
        assert_eq!(next_overtime_hours(state, 3, at(3, 18)), Ok(3));
        assert_eq!(
            next_overtime_hours(state, -1, at(3, 18)),
            Err(AppError::bad_request(OVERTIME_NOT_POSITIVE))
        );
    }

    #[actix_web::test]
    async fn concurrent_submissions_share_one_entry() {
        let engine = engine();
        let period = checked_in(&engine, 10).await;
        let alice = employee(ALICE_ID);

        let results = join_all(
            (0..5).map(|_| engine.submit_overtime(&alice, period.id, 1, at(3, 18))),
        )
        .await;

        let created = results
            .iter()
            .filter(|r| matches!(r, Ok(LedgerWrite::Created(_))))
            .count();
        let updated = results
            .iter()
            .filter(|r| matches!(r, Ok(LedgerWrite::Updated(_))))
            .count();
        let capped = results
            .iter()
            .filter(|r| **r == Err(AppError::bad_request(OVERTIME_CAP)))
            .count();
        assert_eq!((created, updated, capped), (1, 2, 2));

        let ledger = engine
            .store
            .user_ledger(period.id, ALICE_ID)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ledger.overtimes.len(), 1);
        assert_eq!(ledger.overtimes[0].extra_hours, MAX_OVERTIME_HOURS_PER_DAY);
    }

    #[actix_web::test]
    async fn unknown_user_cannot_submit() {
        let engine = engine();
        let period = checked_in(&engine, 10).await;

        let ghost = engine
            .submit_overtime(&employee(4242), period.id, 1, at(3, 18))
            .await;
        assert_eq!(ghost, Err(AppError::not_found(USER_NOT_FOUND)));
    }
}
