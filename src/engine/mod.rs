use std::sync::Arc;

use crate::{
    error::{AppError, USER_NOT_FOUND},
    model::user::User,
    store::Store,
    utils::payslip_cache::PayslipCache,
};

pub mod access;
pub mod attendance;
pub mod calculator;
pub mod overtime;
pub mod period;
pub mod processor;
pub mod reimbursement;

/// Entry point for every attendance and payroll operation.
///
/// Each operation takes the caller's principal and, where it writes, the
/// current time; the engine itself never reads a clock.
#[derive(Clone)]
pub struct PayrollEngine {
    store: Arc<dyn Store>,
    cache: PayslipCache,
}

impl PayrollEngine {
    pub fn new(store: Arc<dyn Store>, cache: PayslipCache) -> Self {
        Self { store, cache }
    }

    /// Ledger rows are only written for callers that exist in the user store.
    async fn require_user(&self, user_id: u64) -> Result<User, AppError> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))
    }
}
