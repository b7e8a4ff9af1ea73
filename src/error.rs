use actix_web::{
    HttpResponse, ResponseError,
    http::{StatusCode, header::ContentType},
};
use derive_more::Display;

pub const END_BEFORE_START: &str = "end_at is lower than start_at";
pub const WEEKEND_CHECK_IN: &str = "cannot attend on weekend";
pub const NOT_CHECKED_IN: &str = "you have not checked-in today";
pub const WORK_HOURS_NOT_DONE: &str = "your work hours are not done yet";
pub const OVERTIME_CAP: &str = "you cannot take overtime for more than 3 hours a day";
pub const OVERTIME_NOT_POSITIVE: &str = "extra_hours must be greater than 0";
pub const PERIOD_NOT_FOUND: &str = "attendance period not found";
pub const USER_NOT_FOUND: &str = "user not found";
pub const PAYSLIP_NOT_FOUND: &str = "payslip not found";
pub const REIMBURSEMENT_NOT_POSITIVE: &str = "amount must be greater than 0";
pub const REIMBURSEMENT_TOO_LARGE: &str = "amount exceeds the reimbursement limit";
pub const PAYSLIP_OUT_OF_RANGE: &str = "payslip amounts are out of range";

/// Every failure the engine reports to a caller.
///
/// Bodies are plain text so the business messages above reach clients verbatim.
#[derive(Debug, Display, PartialEq, Eq)]
pub enum AppError {
    #[display(fmt = "forbidden")]
    Forbidden,

    #[display(fmt = "{}", _0)]
    BadRequest(String),

    #[display(fmt = "{}", _0)]
    NotFound(String),

    #[display(fmt = "attendance is already processed")]
    PeriodProcessed,

    #[display(fmt = "Internal Server Error")]
    Internal,
}

impl AppError {
    pub fn bad_request(message: &str) -> Self {
        AppError::BadRequest(message.to_string())
    }

    pub fn not_found(message: &str) -> Self {
        AppError::NotFound(message.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) | AppError::PeriodProcessed => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(self.to_string())
    }
}

/// Logs a storage failure with the operation that hit it and hides the detail from callers.
pub fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        tracing::error!(error = %e, operation, "Database operation failed");
        AppError::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::MessageBody;

    #[test]
    fn business_messages_are_sent_verbatim() {
        let err = AppError::bad_request(WEEKEND_CHECK_IN);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let body = err.error_response().into_body().try_into_bytes().unwrap();
        assert_eq!(body, "cannot attend on weekend".as_bytes());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::PeriodProcessed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::not_found(PERIOD_NOT_FOUND).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::Internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
