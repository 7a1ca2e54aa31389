//! Settle Payment Handler
//!
//! Applies a gateway outcome to a payment and reconciles its session. The
//! store performs the whole settlement as one atomic unit.

use crate::audit::{AuditAction, AuditRecord};
use crate::domain::{OperationContext, Settlement};
use crate::error::AppError;
use crate::store::SharedStore;

use super::SettlePaymentCommand;

pub struct SettlePaymentHandler {
    store: SharedStore,
}

impl SettlePaymentHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Settle a payment. Re-delivering the outcome already recorded is a
    /// no-op; a contradicting outcome is rejected.
    pub async fn execute(
        &self,
        command: SettlePaymentCommand,
        context: &OperationContext,
    ) -> Result<Settlement, AppError> {
        let audit = AuditRecord::new(
            AuditAction::PaymentSettled,
            "transaction",
            command.transaction_id,
            context,
        );

        let settlement = self
            .store
            .settle_transaction(command.transaction_id, &command.outcome, audit)
            .await
            .map_err(|e| {
                tracing::warn!(
                    transaction_id = %command.transaction_id,
                    outcome = ?command.outcome,
                    error = %e,
                    "Settlement rejected"
                );
                e
            })?;

        if settlement.transaction_changed {
            tracing::info!(
                transaction_id = %settlement.transaction.id,
                status = %settlement.transaction.status,
                session_id = %settlement.session.id,
                session_status = %settlement.session.status,
                session_advanced = settlement.session_advanced,
                "Payment settled"
            );
        } else {
            tracing::debug!(
                transaction_id = %settlement.transaction.id,
                status = %settlement.transaction.status,
                "Settlement replayed, nothing to do"
            );
        }

        Ok(settlement)
    }
}
