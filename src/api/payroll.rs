use actix_web::{HttpResponse, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::auth::AuthUser,
    clock::Clock,
    engine::{
        PayrollEngine,
        processor::{EmployeePayslips, PayslipView},
    },
    error::AppError,
    model::attendance_period::AttendancePeriod,
};

#[derive(Deserialize, IntoParams)]
pub struct PayslipQuery {
    /// Employee whose payslip to read; admins only, defaults to the caller
    pub user_id: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/api/attendance/{attendance_id}/process_payroll",
    params(("attendance_id", description = "Attendance period ID")),
    responses(
        (status = 200, description = "Payslips issued and period closed", body = AttendancePeriod),
        (status = 400, description = "attendance is already processed", body = String),
        (status = 403, description = "Admins only"),
        (status = 404, description = "attendance period not found", body = String)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn process_payroll(
    auth: AuthUser,
    engine: web::Data<PayrollEngine>,
    clock: web::Data<Clock>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let period = engine
        .process_payroll(&auth.principal(), path.into_inner(), clock.now())
        .await?;

    Ok(HttpResponse::Ok().json(period))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{attendance_id}/payslip",
    params(
        ("attendance_id", description = "Attendance period ID"),
        PayslipQuery
    ),
    responses(
        (status = 200, body = PayslipView),
        (status = 403, description = "Another employee's payslip"),
        (status = 404, description = "Unknown period or user, or no payslip issued", body = String)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payslip(
    auth: AuthUser,
    engine: web::Data<PayrollEngine>,
    path: web::Path<u64>,
    query: web::Query<PayslipQuery>,
) -> Result<HttpResponse, AppError> {
    let payslip = engine
        .get_payslip(&auth.principal(), path.into_inner(), query.user_id)
        .await?;

    Ok(HttpResponse::Ok().json(payslip))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{attendance_id}/employee_payslips",
    params(("attendance_id", description = "Attendance period ID")),
    responses(
        (status = 200, body = EmployeePayslips),
        (status = 403, description = "Admins only"),
        (status = 404, description = "attendance period not found", body = String)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_employee_payslips(
    auth: AuthUser,
    engine: web::Data<PayrollEngine>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let payslips = engine
        .get_employee_payslips(&auth.principal(), path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(payslips))
}
