use serde::{Deserialize, Serialize};

use super::role::Role;

/// Payroll view of a user. Owned outside this service; never written here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub role: Role,
    /// Monthly salary in minor currency units
    pub salary: i64,
}
