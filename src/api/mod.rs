use actix_web::HttpResponse;
use serde::Serialize;

use crate::store::LedgerWrite;

pub mod attendance;
pub mod payroll;

/// 201 for a new ledger row, 200 when the call hit an existing one.
fn ledger_response<T: Serialize>(written: LedgerWrite<T>) -> HttpResponse {
    match written {
        LedgerWrite::Created(row) => HttpResponse::Created().json(row),
        LedgerWrite::Existing(row) | LedgerWrite::Updated(row) => HttpResponse::Ok().json(row),
    }
}
