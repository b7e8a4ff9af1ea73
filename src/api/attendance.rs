use actix_web::{HttpResponse, web};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;
use utoipa::ToSchema;

use super::ledger_response;
use crate::{
    auth::auth::AuthUser,
    clock::Clock,
    engine::PayrollEngine,
    error::AppError,
    model::{
        attendance::AttendanceRecord, attendance_period::AttendancePeriod,
        overtime::OvertimeEntry, reimbursement::ReimbursementEntry,
    },
};

/// Period bound: a plain date, or a timestamp whose calendar date is used.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum PeriodBound {
    Date(NaiveDate),
    Timestamp(DateTime<FixedOffset>),
}

impl PeriodBound {
    pub fn date(self) -> NaiveDate {
        match self {
            PeriodBound::Date(d) => d,
            PeriodBound::Timestamp(t) => t.date_naive(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreatePeriod {
    #[schema(value_type = String, example = "2024-06-03")]
    pub start_at: PeriodBound,

    #[schema(value_type = String, example = "2024-06-05T00:00:00+00:00")]
    pub end_at: PeriodBound,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateOvertime {
    /// Any integer is accepted here; values outside 1..=3 get a business error
    #[schema(example = 2, minimum = 1, maximum = 3)]
    pub extra_hours: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateReimbursement {
    #[schema(example = "Commute")]
    pub description: String,

    #[schema(example = 20000)]
    pub amount: i64,
}

#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = CreatePeriod,
    responses(
        (status = 201, description = "Attendance period created", body = AttendancePeriod),
        (status = 400, description = "end_at is lower than start_at", body = String),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admins only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn create_period(
    auth: AuthUser,
    engine: web::Data<PayrollEngine>,
    clock: web::Data<Clock>,
    payload: web::Json<CreatePeriod>,
) -> Result<HttpResponse, AppError> {
    let period = engine
        .create_period(
            &auth.principal(),
            payload.start_at.date(),
            payload.end_at.date(),
            clock.now(),
        )
        .await?;

    Ok(HttpResponse::Created().json(period))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{attendance_id}",
    params(("attendance_id", description = "Attendance period ID")),
    responses(
        (status = 200, body = AttendancePeriod),
        (status = 404, description = "attendance period not found", body = String)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn get_period(
    auth: AuthUser,
    engine: web::Data<PayrollEngine>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let period = engine
        .get_period(&auth.principal(), path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(period))
}

#[utoipa::path(
    post,
    path = "/api/attendance/{attendance_id}",
    params(("attendance_id", description = "Attendance period ID")),
    responses(
        (status = 201, description = "Checked in", body = AttendanceRecord),
        (status = 200, description = "Already checked in today", body = AttendanceRecord),
        (status = 400, description = "Weekend, or the period is already processed", body = String),
        (status = 404, description = "attendance period not found", body = String)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    engine: web::Data<PayrollEngine>,
    clock: web::Data<Clock>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let written = engine
        .check_in(&auth.principal(), path.into_inner(), clock.now())
        .await?;

    Ok(ledger_response(written))
}

#[utoipa::path(
    post,
    path = "/api/attendance/{attendance_id}/overtime",
    request_body = CreateOvertime,
    params(("attendance_id", description = "Attendance period ID")),
    responses(
        (status = 201, description = "Overtime recorded", body = OvertimeEntry),
        (status = 200, description = "Hours added to today's entry", body = OvertimeEntry),
        (status = 400, description = "Not checked in, work hours not done, or over 3 hours", body = String),
        (status = 404, description = "attendance period not found", body = String)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn submit_overtime(
    auth: AuthUser,
    engine: web::Data<PayrollEngine>,
    clock: web::Data<Clock>,
    path: web::Path<u64>,
    payload: web::Json<CreateOvertime>,
) -> Result<HttpResponse, AppError> {
    let written = engine
        .submit_overtime(
            &auth.principal(),
            path.into_inner(),
            payload.extra_hours,
            clock.now(),
        )
        .await?;

    Ok(ledger_response(written))
}

#[utoipa::path(
    post,
    path = "/api/attendance/{attendance_id}/reimburse",
    request_body = CreateReimbursement,
    params(("attendance_id", description = "Attendance period ID")),
    responses(
        (status = 201, description = "Reimbursement claimed", body = ReimbursementEntry),
        (status = 400, description = "Non-positive or oversized amount, or attendance is already processed", body = String),
        (status = 404, description = "attendance period not found", body = String)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn submit_reimbursement(
    auth: AuthUser,
    engine: web::Data<PayrollEngine>,
    clock: web::Data<Clock>,
    path: web::Path<u64>,
    payload: web::Json<CreateReimbursement>,
) -> Result<HttpResponse, AppError> {
    let CreateReimbursement {
        description,
        amount,
    } = payload.into_inner();

    let entry = engine
        .submit_reimbursement(
            &auth.principal(),
            path.into_inner(),
            description,
            amount,
            clock.now(),
        )
        .await?;

    Ok(HttpResponse::Created().json(entry))
}
