use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifies one user's ledger slot for one calendar day of a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayKey {
    pub period_id: u64,
    pub user_id: u64,
    pub day: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    #[serde(rename = "attendance_period_id")]
    pub period_id: u64,
    #[schema(value_type = String, format = Date)]
    pub day: NaiveDate,
    #[schema(value_type = String, format = DateTime)]
    pub checked_in_at: NaiveDateTime,
}
