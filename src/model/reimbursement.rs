use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ReimbursementEntry {
    pub id: u64,
    pub user_id: u64,
    #[serde(rename = "attendance_period_id")]
    pub period_id: u64,
    pub description: String,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct NewReimbursement {
    pub period_id: u64,
    pub user_id: u64,
    pub description: String,
    pub amount: i64,
}
