use moka::future::Cache;

use crate::model::payroll::Payslip;

/// Issued payslips keyed by (period_id, user_id).
///
/// Only payslips of processed periods go in here; those never change, so entries need no expiry.
#[derive(Clone)]
pub struct PayslipCache {
    inner: Cache<(u64, u64), Payslip>,
}

impl PayslipCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(capacity).build(),
        }
    }

    pub async fn get(&self, period_id: u64, user_id: u64) -> Option<Payslip> {
        self.inner.get(&(period_id, user_id)).await
    }

    pub async fn insert(&self, payslip: Payslip) {
        self.inner
            .insert((payslip.period_id, payslip.user_id), payslip)
            .await;
    }

    /// Batch insert after a period is processed
    pub async fn insert_all(&self, payslips: &[Payslip]) {
        let futures: Vec<_> = payslips
            .iter()
            .map(|p| self.inner.insert((p.period_id, p.user_id), p.clone()))
            .collect();

        futures::future::join_all(futures).await;
    }
}
