use crate::api::attendance::{CreateOvertime, CreatePeriod, CreateReimbursement};
use crate::engine::calculator::{OvertimeLine, ReimbursementLine};
use crate::engine::processor::{
    EmployeePayslips, PayslipAttendance, PayslipEmployee, PayslipPeriod, PayslipView,
};
use crate::model::{
    attendance::AttendanceRecord, attendance_period::AttendancePeriod, overtime::OvertimeEntry,
    payroll::PayslipSummary, reimbursement::ReimbursementEntry,
};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Payroll Engine API",
        version = "1.0.0",
        description = r#"
## Attendance & Payroll

Admins open **attendance periods**; employees check in on weekdays, log
overtime after work hours and claim reimbursements against an open period.
Processing a period issues one payslip per attendee and closes it for good.

### Payslip arithmetic
- hourly rate = salary / (working days × 8), truncated
- overtime = 2 × hourly rate × hours
- prorated base = salary × attended days / working days, truncated
- take-home = prorated base + overtime + reimbursements

### Security
Every endpoint takes a **JWT bearer** token (`Authorization: Bearer …` or `JWT …`).
Errors are plain text.
"#,
    ),
    paths(
        crate::api::attendance::create_period,
        crate::api::attendance::get_period,
        crate::api::attendance::check_in,
        crate::api::attendance::submit_overtime,
        crate::api::attendance::submit_reimbursement,

        crate::api::payroll::process_payroll,
        crate::api::payroll::get_payslip,
        crate::api::payroll::get_employee_payslips
    ),
    components(
        schemas(
            CreatePeriod,
            CreateOvertime,
            CreateReimbursement,
            AttendancePeriod,
            AttendanceRecord,
            OvertimeEntry,
            ReimbursementEntry,
            PayslipSummary,
            PayslipEmployee,
            PayslipPeriod,
            PayslipAttendance,
            OvertimeLine,
            ReimbursementLine,
            PayslipView,
            EmployeePayslips
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Attendance periods and employee ledgers"),
        (name = "Payroll", description = "Payroll processing and payslips"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
