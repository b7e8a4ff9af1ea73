pub mod payslip_cache;
pub mod working_days;
