use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::{
    PayrollEngine,
    access::{Action, Principal, authorize},
    calculator::{OvertimeLine, ReimbursementLine, calculate},
};
use crate::{
    error::{AppError, PAYSLIP_NOT_FOUND, USER_NOT_FOUND},
    model::{
        attendance_period::AttendancePeriod,
        payroll::{NewPayslip, Payslip, PayslipSummary},
    },
    store::UserLedger,
    utils::working_days::count_working_days,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PayslipEmployee {
    pub id: u64,
    pub username: String,
    pub base_salary: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PayslipPeriod {
    pub id: u64,
    #[schema(value_type = String, format = Date)]
    pub start_at: NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub end_at: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PayslipAttendance {
    pub total_days: i64,
    pub prorated_amount: i64,
}

/// A payslip as shown to callers.
///
/// `processed` is false for a preview computed from the live ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PayslipView {
    pub employee: PayslipEmployee,
    pub period: PayslipPeriod,
    pub attendance: PayslipAttendance,
    pub overtimes: Vec<OvertimeLine>,
    pub reimbursements: Vec<ReimbursementLine>,
    pub summary: PayslipSummary,
    pub processed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct EmployeePayslips {
    pub payslips: Vec<PayslipView>,
    pub total_take_home: i64,
}

/// Computes the payslips of every attendee from their ledgers.
fn issue_payslips(
    period: &AttendancePeriod,
    ledgers: &[UserLedger],
) -> Result<Vec<NewPayslip>, AppError> {
    let working_days = count_working_days(period.start_at, period.end_at);

    ledgers
        .iter()
        .map(|ledger| {
            let calc = calculate(
                ledger.user.salary,
                working_days,
                ledger.attendance_days,
                &ledger.overtimes,
                &ledger.reimbursements,
            )?;
            Ok(NewPayslip {
                user_id: ledger.user.id,
                attendance_days: ledger.attendance_days,
                summary: calc.summary,
            })
        })
        .collect()
}

fn payslip_view(
    period: &AttendancePeriod,
    ledger: &UserLedger,
    issued: Option<&Payslip>,
) -> Result<PayslipView, AppError> {
    // line rates follow the salary the payslip was issued with, not today's
    let salary = issued.map_or(ledger.user.salary, |p| p.summary.base_salary);
    let calc = calculate(
        salary,
        count_working_days(period.start_at, period.end_at),
        ledger.attendance_days,
        &ledger.overtimes,
        &ledger.reimbursements,
    )?;

    // issued figures win over anything recomputed from the ledger
    let (total_days, summary) = match issued {
        Some(p) => (p.attendance_days, p.summary),
        None => (ledger.attendance_days, calc.summary),
    };

    Ok(PayslipView {
        employee: PayslipEmployee {
            id: ledger.user.id,
            username: ledger.user.username.clone(),
            base_salary: summary.base_salary,
        },
        period: PayslipPeriod {
            id: period.id,
            start_at: period.start_at,
            end_at: period.end_at,
        },
        attendance: PayslipAttendance {
            total_days,
            prorated_amount: summary.prorated_amount,
        },
        overtimes: calc.overtimes,
        reimbursements: calc.reimbursements,
        summary,
        processed: issued.is_some(),
    })
}

impl PayrollEngine {
    /// Issues payslips for every attendee and closes the period.
    ///
    /// A closed period can't be processed again, so issued payslips never change.
    pub async fn process_payroll(
        &self,
        principal: &Principal,
        period_id: u64,
        now: NaiveDateTime,
    ) -> Result<AttendancePeriod, AppError> {
        authorize(principal, Action::ProcessPayroll)?;

        let (period, issued) = self
            .store
            .process_period(period_id, now, &issue_payslips)
            .await?;

        self.cache.insert_all(&issued).await;

        info!(
            period_id,
            payslips = issued.len(),
            total_take_home = issued.iter().map(|p| p.summary.take_home_pay).sum::<i64>(),
            processed_by = principal.user_id,
            "Payroll processed"
        );
        Ok(period)
    }

    /// Payslip of `user_id`, or of the caller when `None`.
    pub async fn get_payslip(
        &self,
        principal: &Principal,
        period_id: u64,
        user_id: Option<u64>,
    ) -> Result<PayslipView, AppError> {
        let subject = user_id.unwrap_or(principal.user_id);
        authorize(principal, Action::ViewPayslip { subject })?;

        let period = self.find_period(period_id).await?;
        let ledger = self
            .store
            .user_ledger(period_id, subject)
            .await?
            .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))?;

        if !period.processed {
            return payslip_view(&period, &ledger, None);
        }

        let issued = self.issued_payslip(period_id, subject).await?;
        payslip_view(&period, &ledger, Some(&issued))
    }

    pub async fn get_employee_payslips(
        &self,
        principal: &Principal,
        period_id: u64,
    ) -> Result<EmployeePayslips, AppError> {
        authorize(principal, Action::ViewAllPayslips)?;

        let period = self.find_period(period_id).await?;
        let ledgers = self.store.attendee_ledgers(period_id).await?;

        let payslips = if period.processed {
            let issued = self.store.payslips(period_id).await?;
            self.cache.insert_all(&issued).await;

            let issued: HashMap<u64, Payslip> =
                issued.into_iter().map(|p| (p.user_id, p)).collect();
            ledgers
                .iter()
                .filter_map(|l| {
                    issued
                        .get(&l.user.id)
                        .map(|p| payslip_view(&period, l, Some(p)))
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            ledgers
                .iter()
                .map(|l| payslip_view(&period, l, None))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(EmployeePayslips {
            total_take_home: payslips.iter().map(|p| p.summary.take_home_pay).sum(),
            payslips,
        })
    }

    async fn issued_payslip(&self, period_id: u64, user_id: u64) -> Result<Payslip, AppError> {
        if let Some(payslip) = self.cache.get(period_id, user_id).await {
            debug!(period_id, user_id, "Payslip cache hit");
            return Ok(payslip);
        }

        let payslip = self
            .store
            .payslip(period_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found(PAYSLIP_NOT_FOUND))?;
        self.cache.insert(payslip.clone()).await;

        Ok(payslip)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    /// Monday: both check in, Alice claims commute and Bob office supplies.
    /// Tuesday 18:00: Alice checks in, claims commute again and works 3 extra hours.
    async fn two_day_period(engine: &PayrollEngine) -> AttendancePeriod {
        let period = engine
            .create_period(&admin(), date(3), date(5), at(3, 9))
            .await
            .unwrap();
        let (alice, bob) = (employee(ALICE_ID), employee(BOB_ID));

        engine.check_in(&alice, period.id, at(3, 10)).await.unwrap();
        engine.check_in(&bob, period.id, at(3, 10)).await.unwrap();
        engine
            .submit_reimbursement(&alice, period.id, "Commute".into(), 20_000, at(3, 10))
            .await
            .unwrap();
        engine
            .submit_reimbursement(&bob, period.id, "Office supplies".into(), 100_000, at(3, 10))
            .await
            .unwrap();

        engine.check_in(&alice, period.id, at(4, 18)).await.unwrap();
        engine
            .submit_reimbursement(&alice, period.id, "Commute".into(), 20_000, at(4, 18))
            .await
            .unwrap();
        engine
            .submit_overtime(&alice, period.id, 3, at(4, 18))
            .await
            .unwrap();

        period
    }

    #[actix_web::test]
    async fn processing_issues_reference_payslips() {
        let engine = engine();
        let period = two_day_period(&engine).await;

        let processed = engine
            .process_payroll(&admin(), period.id, at(5, 9))
            .await
            .unwrap();
        assert!(processed.processed);

        let alice = engine
            .get_payslip(&employee(ALICE_ID), period.id, None)
            .await
            .unwrap();
        assert!(alice.processed);
        assert_eq!(alice.attendance.total_days, 2);
        assert_eq!(
            alice.summary,
            PayslipSummary {
                base_salary: 5_000_000,
                prorated_amount: 3_333_333,
                overtime_total: 1_249_998,
                reimbursement_total: 40_000,
                take_home_pay: 4_623_331,
            }
        );
        assert_eq!(alice.overtimes.len(), 1);
        assert_eq!(alice.reimbursements.len(), 2);

        let bob = engine
            .get_payslip(&employee(BOB_ID), period.id, None)
            .await
            .unwrap();
        assert_eq!(bob.attendance.total_days, 1);
        assert_eq!(bob.summary.prorated_amount, 1_666_666);
        assert_eq!(bob.summary.take_home_pay, 1_766_666);
    }

    #[actix_web::test]
    async fn aggregate_matches_individual_payslips() {
        let engine = engine();
        let period = two_day_period(&engine).await;
        engine
            .process_payroll(&admin(), period.id, at(5, 9))
            .await
            .unwrap();

        let all = engine
            .get_employee_payslips(&admin(), period.id)
            .await
            .unwrap();

        let mut individual = 0;
        for id in [ALICE_ID, BOB_ID] {
            let payslip = engine
                .get_payslip(&admin(), period.id, Some(id))
                .await
                .unwrap();
            individual += payslip.summary.take_home_pay;
        }

        assert_eq!(all.payslips.len(), 2);
        assert_eq!(all.total_take_home, individual);
        assert_eq!(all.total_take_home, 4_623_331 + 1_766_666);
    }

    #[actix_web::test]
    async fn second_process_is_rejected_and_changes_nothing() {
        let engine = engine();
        let period = two_day_period(&engine).await;
        engine
            .process_payroll(&admin(), period.id, at(5, 9))
            .await
            .unwrap();
        let before = engine
            .get_employee_payslips(&admin(), period.id)
            .await
            .unwrap();

        let again = engine.process_payroll(&admin(), period.id, at(5, 10)).await;
        assert_eq!(again, Err(AppError::PeriodProcessed));

        let after = engine
            .get_employee_payslips(&admin(), period.id)
            .await
            .unwrap();
        assert_eq!(before, after);
    }

    #[actix_web::test]
    async fn concurrent_processing_succeeds_once() {
        let engine = engine();
        let period = two_day_period(&engine).await;
        let admin = admin();

        let (first, second) = futures::join!(
            engine.process_payroll(&admin, period.id, at(5, 9)),
            engine.process_payroll(&admin, period.id, at(5, 9)),
        );

        assert_eq!(
            [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );
        assert_eq!(engine.store.payslips(period.id).await.unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn unprocessed_period_shows_a_preview() {
        let engine = engine();
        let period = two_day_period(&engine).await;

        let preview = engine
            .get_payslip(&employee(ALICE_ID), period.id, None)
            .await
            .unwrap();
        assert!(!preview.processed);
        assert_eq!(preview.summary.take_home_pay, 4_623_331);

        let all = engine
            .get_employee_payslips(&admin(), period.id)
            .await
            .unwrap();
        assert!(all.payslips.iter().all(|p| !p.processed));
        assert!(engine.store.payslips(period.id).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn payslip_access_is_role_checked() {
        let engine = engine();
        let period = two_day_period(&engine).await;

        assert_eq!(
            engine
                .get_payslip(&employee(BOB_ID), period.id, Some(ALICE_ID))
                .await,
            Err(AppError::Forbidden)
        );
        assert_eq!(
            engine
                .get_employee_payslips(&employee(BOB_ID), period.id)
                .await,
            Err(AppError::Forbidden)
        );
        assert_eq!(
            engine
                .process_payroll(&employee(BOB_ID), period.id, at(5, 9))
                .await,
            Err(AppError::Forbidden)
        );
    }

    #[actix_web::test]
    async fn absentees_have_no_issued_payslip() {
        let engine = engine();
        let period = engine
            .create_period(&admin(), date(3), date(5), at(3, 9))
            .await
            .unwrap();
        engine
            .check_in(&employee(BOB_ID), period.id, at(3, 10))
            .await
            .unwrap();
        engine
            .process_payroll(&admin(), period.id, at(5, 18))
            .await
            .unwrap();

        assert_eq!(
            engine
                .get_payslip(&employee(ALICE_ID), period.id, None)
                .await,
            Err(AppError::not_found(PAYSLIP_NOT_FOUND))
        );
        assert_eq!(
            engine.get_payslip(&admin(), period.id, Some(999)).await,
            Err(AppError::not_found(USER_NOT_FOUND))
        );
    }

    #[actix_web::test]
    async fn full_attendance_is_paid_in_full() {
        let engine = engine();
        let period = engine
            .create_period(&admin(), date(3), date(5), at(3, 9))
            .await
            .unwrap();
        for d in [3, 4, 5] {
            engine
                .check_in(&employee(ALICE_ID), period.id, at(d, 10))
                .await
                .unwrap();
        }
        engine
            .process_payroll(&admin(), period.id, at(5, 18))
            .await
            .unwrap();

        let payslip = engine
            .get_payslip(&employee(ALICE_ID), period.id, None)
            .await
            .unwrap();
        assert_eq!(payslip.summary.prorated_amount, 5_000_000);
        assert_eq!(payslip.summary.take_home_pay, 5_000_000);
    }

    #[test]
    fn issued_lines_use_the_issued_salary() {
        let period = AttendancePeriod {
            id: 1,
            start_at: date(3),
            end_at: date(5),
            processed: true,
        };
        let ledger = UserLedger {
            user: crate::model::user::User {
                id: ALICE_ID,
                username: "alice".into(),
                role: crate::model::role::Role::Employee,
                // raised after the payslip was issued
                salary: 9_000_000,
            },
            attendance_days: 2,
            overtimes: vec![crate::model::overtime::OvertimeEntry {
                id: 7,
                user_id: ALICE_ID,
                period_id: 1,
                day: date(4),
                extra_hours: 3,
            }],
            reimbursements: Vec::new(),
        };
        let issued = Payslip {
            id: 9,
            user_id: ALICE_ID,
            period_id: 1,
            attendance_days: 2,
            summary: PayslipSummary {
                base_salary: 5_000_000,
                prorated_amount: 3_333_333,
                overtime_total: 1_249_998,
                reimbursement_total: 0,
                take_home_pay: 4_583_331,
            },
        };

        let view = payslip_view(&period, &ledger, Some(&issued)).unwrap();

        assert_eq!(view.employee.base_salary, 5_000_000);
        assert_eq!(view.overtimes[0].amount, 1_249_998);
        assert_eq!(
            view.overtimes.iter().map(|o| o.amount).sum::<i64>(),
            view.summary.overtime_total
        );
    }
}
