use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "start_at": "2024-06-03",
    "end_at": "2024-06-05",
    "processed": false
}))]
pub struct AttendancePeriod {
    pub id: u64,
    #[schema(value_type = String, format = Date)]
    pub start_at: NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub end_at: NaiveDate,
    pub processed: bool,
}

#[derive(Debug, Clone)]
pub struct NewPeriod {
    pub start_at: NaiveDate,
    pub end_at: NaiveDate,
    pub created_by: u64,
}
