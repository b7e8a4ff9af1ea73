pub mod attendance;
pub mod attendance_period;
pub mod overtime;
pub mod payroll;
pub mod reimbursement;
pub mod role;
pub mod user;
