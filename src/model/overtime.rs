use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct OvertimeEntry {
    pub id: u64,
    pub user_id: u64,
    #[serde(rename = "attendance_period_id")]
    pub period_id: u64,
    #[schema(value_type = String, format = Date)]
    pub day: NaiveDate,
    pub extra_hours: u8,
}
