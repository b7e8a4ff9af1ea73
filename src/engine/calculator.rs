use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, PAYSLIP_OUT_OF_RANGE},
    model::{overtime::OvertimeEntry, payroll::PayslipSummary, reimbursement::ReimbursementEntry},
};

pub const WORKING_HOURS_PER_DAY: i64 = 8;
pub const OVERTIME_MULTIPLIER: i64 = 2;

/// Per-hour rates derived from a monthly salary and a period's working days.
///
/// Integer division truncates at every step; the reference payslips depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayRates {
    salary: i64,
    working_days: i64,
    pub overtime: i64,
}

impl PayRates {
    pub fn new(salary: i64, working_days: i64) -> Self {
        let hourly = working_days
            .checked_mul(WORKING_HOURS_PER_DAY)
            .filter(|hours| *hours > 0)
            .map_or(0, |hours| salary / hours);

        Self {
            salary,
            working_days,
            overtime: hourly.saturating_mul(OVERTIME_MULTIPLIER),
        }
    }

    /// `None` when the result does not fit an `i64`.
    pub fn prorated(&self, attendance_days: i64) -> Option<i64> {
        if self.working_days <= 0 {
            return Some(0);
        }
        // widened so a large salary times the day count cannot wrap
        let prorated =
            i128::from(self.salary) * i128::from(attendance_days) / i128::from(self.working_days);
        i64::try_from(prorated).ok()
    }
}

fn checked_total(amounts: impl IntoIterator<Item = i64>) -> Option<i64> {
    amounts.into_iter().try_fold(0i64, i64::checked_add)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OvertimeLine {
    #[schema(value_type = String, format = Date)]
    pub day: NaiveDate,
    pub hours: u8,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReimbursementLine {
    pub description: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calculation {
    pub summary: PayslipSummary,
    pub overtimes: Vec<OvertimeLine>,
    pub reimbursements: Vec<ReimbursementLine>,
}

/// Derives one user's payslip for a period. Pure; the same ledger always
/// produces the same figures.
///
/// Fails with [`PAYSLIP_OUT_OF_RANGE`] instead of wrapping when a total does not fit.
pub fn calculate(
    salary: i64,
    working_days: i64,
    attendance_days: i64,
    overtimes: &[OvertimeEntry],
    reimbursements: &[ReimbursementEntry],
) -> Result<Calculation, AppError> {
    let out_of_range = || {
        tracing::error!(salary, working_days, attendance_days, "Payslip amounts overflow");
        AppError::bad_request(PAYSLIP_OUT_OF_RANGE)
    };
    let rates = PayRates::new(salary, working_days);

    let overtimes: Vec<_> = overtimes
        .iter()
        .map(|o| {
            let amount = rates.overtime.checked_mul(i64::from(o.extra_hours))?;
            Some(OvertimeLine {
                day: o.day,
                hours: o.extra_hours,
                amount,
            })
        })
        .collect::<Option<_>>()
        .ok_or_else(out_of_range)?;

    let reimbursements: Vec<_> = reimbursements
        .iter()
        .map(|r| ReimbursementLine {
            description: r.description.clone(),
            amount: r.amount,
        })
        .collect();

    let prorated_amount = rates.prorated(attendance_days).ok_or_else(out_of_range)?;
    let overtime_total = checked_total(overtimes.iter().map(|o| o.amount)).ok_or_else(out_of_range)?;
    let reimbursement_total =
        checked_total(reimbursements.iter().map(|r| r.amount)).ok_or_else(out_of_range)?;
    let take_home_pay = checked_total([prorated_amount, overtime_total, reimbursement_total])
        .ok_or_else(out_of_range)?;

    Ok(Calculation {
        summary: PayslipSummary {
            base_salary: salary,
            prorated_amount,
            overtime_total,
            reimbursement_total,
            take_home_pay,
        },
        overtimes,
        reimbursements,
    })
}
