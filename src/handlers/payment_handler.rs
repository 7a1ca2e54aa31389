//! Create Payment Handler
//!
//! Records a pending payment for a session and submits it to the payment
//! gateway. A synchronous gateway answer is settled straight away; a
//! deferred one leaves the payment pending for the settle callback.

use std::sync::Arc;

use chrono::Utc;

use crate::audit::{AuditAction, AuditRecord};
use crate::domain::{DomainError, OperationContext, Transaction};
use crate::error::AppError;
use crate::gateway::{ChargeRequest, PaymentGateway};
use crate::store::SharedStore;

use super::{CreatePaymentCommand, PaymentResult, SettlePaymentCommand, SettlePaymentHandler};

pub struct CreatePaymentHandler {
    store: SharedStore,
    gateway: Arc<dyn PaymentGateway>,
    settle: SettlePaymentHandler,
}

impl CreatePaymentHandler {
    pub fn new(store: SharedStore, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            settle: SettlePaymentHandler::new(store.clone()),
            store,
            gateway,
        }
    }

    /// Pay for a session on behalf of its student.
    ///
    /// The amount is priced with the educator's hourly rate at the time of
    /// payment.
    pub async fn execute(
        &self,
        command: CreatePaymentCommand,
        context: &OperationContext,
    ) -> Result<PaymentResult, AppError> {
        let actor = context.actor()?;

        let session = self
            .store
            .get_session(command.session_id)
            .await?
            .ok_or_else(|| DomainError::not_found("session", command.session_id))?;

        let student_id = actor.student_id()?;
        let educator = self
            .store
            .get_educator(session.educator_id)
            .await?
            .ok_or_else(|| DomainError::not_found("educator", session.educator_id))?;

        let transaction = Transaction::payment_for(
            &session,
            student_id,
            &educator.hourly_rate,
            &command.payment_method,
            Utc::now(),
        )?;

        let audit = AuditRecord::new(
            AuditAction::PaymentCreated,
            "transaction",
            transaction.id,
            context,
        )
        .after(&transaction);
        self.store.insert_transaction(&transaction, &audit).await?;

        tracing::info!(
            transaction_id = %transaction.id,
            session_id = %session.id,
            amount = %transaction.amount,
            gateway = self.gateway.name(),
            "Payment created"
        );

        let charge = ChargeRequest {
            transaction_id: transaction.id,
            amount: transaction.amount,
            payment_method: transaction.payment_method.clone(),
        };
        let response = self.gateway.submit(&charge).await.map_err(|e| {
            tracing::error!(
                transaction_id = %transaction.id,
                error = %e,
                "Payment gateway submission failed, transaction left pending"
            );
            e
        })?;

        match response.outcome() {
            Some(outcome) => {
                let settlement = self
                    .settle
                    .execute(SettlePaymentCommand::new(transaction.id, outcome), context)
                    .await?;
                Ok(PaymentResult {
                    transaction: settlement.transaction,
                    session: settlement.session,
                })
            }
            None => {
                let mut transaction = transaction;
                if let Some(reference) = response.reference() {
                    self.store
                        .record_gateway_reference(transaction.id, reference)
                        .await?;
                    transaction.gateway_reference = Some(reference.to_string());
                }
                tracing::info!(
                    transaction_id = %transaction.id,
                    "Payment awaiting gateway callback"
                );
                Ok(PaymentResult {
                    transaction,
                    session,
                })
            }
        }
    }
}
