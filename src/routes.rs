use crate::api::{attendance, payroll};
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig, api_prefix: &str) {
    cfg.service(
        web::scope(api_prefix).service(
            web::scope("/attendance")
                // /attendance
                .service(web::resource("").route(web::post().to(attendance::create_period)))
                // /attendance/{id}
                .service(
                    web::resource("/{attendance_id}")
                        .route(web::get().to(attendance::get_period))
                        .route(web::post().to(attendance::check_in)),
                )
                // /attendance/{id}/overtime
                .service(
                    web::resource("/{attendance_id}/overtime")
                        .route(web::post().to(attendance::submit_overtime)),
                )
                // /attendance/{id}/reimburse
                .service(
                    web::resource("/{attendance_id}/reimburse")
                        .route(web::post().to(attendance::submit_reimbursement)),
                )
                // /attendance/{id}/process_payroll
                .service(
                    web::resource("/{attendance_id}/process_payroll")
                        .route(web::post().to(payroll::process_payroll)),
                )
                // /attendance/{id}/payslip
                .service(
                    web::resource("/{attendance_id}/payslip")
                        .route(web::get().to(payroll::get_payslip)),
                )
                // /attendance/{id}/employee_payslips
                .service(
                    web::resource("/{attendance_id}/employee_payslips")
                        .route(web::get().to(payroll::get_employee_payslips)),
                ),
        ),
    );
}
