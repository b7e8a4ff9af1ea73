use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "base_salary": 5000000,
    "prorated_amount": 3333333,
    "overtime_total": 1249998,
    "reimbursement_total": 40000,
    "take_home_pay": 4623331
}))]
pub struct PayslipSummary {
    pub base_salary: i64,
    pub prorated_amount: i64,
    pub overtime_total: i64,
    pub reimbursement_total: i64,
    pub take_home_pay: i64,
}

/// Payslip issued when a period is processed. Never rewritten afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payslip {
    pub id: u64,
    pub user_id: u64,
    pub period_id: u64,
    pub attendance_days: i64,
    pub summary: PayslipSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayslip {
    pub user_id: u64,
    pub attendance_days: i64,
    pub summary: PayslipSummary,
}
