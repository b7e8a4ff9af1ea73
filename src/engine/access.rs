use crate::{error::AppError, model::role::Role};

/// Authenticated caller as the engine sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: u64,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreatePeriod,
    ViewPeriod,
    CheckIn,
    SubmitOvertime,
    SubmitReimbursement,
    ProcessPayroll,
    ViewPayslip { subject: u64 },
    ViewAllPayslips,
}

/// Capability check run at the entry of every engine operation.
pub fn authorize(principal: &Principal, action: Action) -> Result<(), AppError> {
    let allowed = match action {
        Action::CreatePeriod | Action::ProcessPayroll | Action::ViewAllPayslips => {
            principal.is_admin()
        }
        Action::ViewPeriod
        | Action::CheckIn
        | Action::SubmitOvertime
        | Action::SubmitReimbursement => true,
        Action::ViewPayslip { subject } => principal.is_admin() || subject == principal.user_id,
    };

    if allowed {
        Ok(())
    } else {
        tracing::debug!(user_id = principal.user_id, ?action, "Action denied");
        Err(AppError::Forbidden)
    }
}
