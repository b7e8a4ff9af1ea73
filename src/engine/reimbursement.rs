use chrono::NaiveDateTime;
use tracing::info;

use super::{
    PayrollEngine,
    access::{Action, Principal, authorize},
};
use crate::{
    error::{AppError, REIMBURSEMENT_NOT_POSITIVE, REIMBURSEMENT_TOO_LARGE},
    model::reimbursement::{NewReimbursement, ReimbursementEntry},
};

/// Largest single claim, in the same minor unit as salaries.
pub const MAX_REIMBURSEMENT_AMOUNT: i64 = 1_000_000_000_000;

impl PayrollEngine {
    /// Appends a claim; claims are never merged. Each claim must be positive
    /// and at most [`MAX_REIMBURSEMENT_AMOUNT`].
    pub async fn submit_reimbursement(
        &self,
        principal: &Principal,
        period_id: u64,
        description: String,
        amount: i64,
        now: NaiveDateTime,
    ) -> Result<ReimbursementEntry, AppError> {
        authorize(principal, Action::SubmitReimbursement)?;
        if amount <= 0 {
            return Err(AppError::bad_request(REIMBURSEMENT_NOT_POSITIVE));
        }
        if amount > MAX_REIMBURSEMENT_AMOUNT {
            return Err(AppError::bad_request(REIMBURSEMENT_TOO_LARGE));
        }
        self.require_user(principal.user_id).await?;

        let entry = self
            .store
            .insert_reimbursement(
                NewReimbursement {
                    period_id,
                    user_id: principal.user_id,
                    description,
                    amount,
                },
                now,
            )
            .await?;

        info!(entry_id = entry.id, period_id, user_id = entry.user_id, amount, "Reimbursement claimed");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::error::USER_NOT_FOUND;

    #[actix_web::test]
    async fn claims_are_appended() {
        let engine = engine();
        let period = engine
            .create_period(&admin(), date(1), date(30), at(3, 9))
            .await
            .unwrap();
        let alice = employee(ALICE_ID);

        let first = engine
            .submit_reimbursement(&alice, period.id, "Commute".into(), 20_000, at(3, 10))
            .await
            .unwrap();
        let second = engine
            .submit_reimbursement(&alice, period.id, "Commute".into(), 20_000, at(3, 11))
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.period_id, period.id);
        assert_eq!(first.description, "Commute");

        let ledger = engine
            .store
            .user_ledger(period.id, ALICE_ID)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ledger.reimbursements, vec![first, second]);
    }

    #[actix_web::test]
    async fn weekend_claims_are_accepted() {
        let engine = engine();
        let period = engine
            .create_period(&admin(), date(1), date(30), at(1, 9))
            .await
            .unwrap();

        let claim = engine
            .submit_reimbursement(&employee(BOB_ID), period.id, "Parking".into(), 5_000, at(1, 12))
            .await;
        assert!(claim.is_ok());
    }

    #[actix_web::test]
    async fn processed_period_rejects_claims() {
        let engine = engine();
        let period = engine
            .create_period(&admin(), date(3), date(5), at(3, 9))
            .await
            .unwrap();
        engine
            .process_payroll(&admin(), period.id, at(5, 18))
            .await
            .unwrap();

        let late = engine
            .submit_reimbursement(&employee(BOB_ID), period.id, "Taxi".into(), 1, at(5, 19))
            .await;
        assert_eq!(late, Err(AppError::PeriodProcessed));
    }

    #[actix_web::test]
    async fn amounts_must_be_positive_and_bounded() {
        let engine = engine();
        let period = engine
            .create_period(&admin(), date(3), date(5), at(3, 9))
            .await
            .unwrap();
        let alice = employee(ALICE_ID);

        for amount in [0, -1, i64::MIN] {
            let claim = engine
                .submit_reimbursement(&alice, period.id, "Refund".into(), amount, at(3, 10))
                .await;
            assert_eq!(claim, Err(AppError::bad_request(REIMBURSEMENT_NOT_POSITIVE)));
        }
        for amount in [MAX_REIMBURSEMENT_AMOUNT + 1, i64::MAX] {
            let claim = engine
                .submit_reimbursement(&alice, period.id, "Yacht".into(), amount, at(3, 10))
                .await;
            assert_eq!(claim, Err(AppError::bad_request(REIMBURSEMENT_TOO_LARGE)));
        }

        let ledger = engine
            .store
            .user_ledger(period.id, ALICE_ID)
            .await
            .unwrap()
            .unwrap();
        assert!(ledger.reimbursements.is_empty());
    }

    #[actix_web::test]
    async fn largest_claims_still_process() {
        let engine = engine();
        let period = engine
            .create_period(&admin(), date(3), date(5), at(3, 9))
            .await
            .unwrap();
        let alice = employee(ALICE_ID);
        engine.check_in(&alice, period.id, at(3, 10)).await.unwrap();
        for _ in 0..2 {
            engine
                .submit_reimbursement(&alice, period.id, "Relocation".into(), MAX_REIMBURSEMENT_AMOUNT, at(3, 11))
                .await
                .unwrap();
        }

        engine
            .process_payroll(&admin(), period.id, at(5, 18))
            .await
            .unwrap();
        let payslip = engine
            .get_payslip(&alice, period.id, None)
            .await
            .unwrap();
        assert_eq!(payslip.summary.reimbursement_total, 2 * MAX_REIMBURSEMENT_AMOUNT);
    }

    #[actix_web::test]
    async fn unknown_user_cannot_claim() {
        let engine = engine();
        let period = engine
            .create_period(&admin(), date(3), date(5), at(3, 9))
            .await
            .unwrap();

        let ghost = engine
            .submit_reimbursement(&employee(4242), period.id, "Taxi".into(), 1, at(3, 10))
            .await;
        assert_eq!(ghost, Err(AppError::not_found(USER_NOT_FOUND)));
    }
}
