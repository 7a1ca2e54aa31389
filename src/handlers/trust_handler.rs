//! Trust & Ops Handlers
//!
//! Admin decisions on educator vetting and payout account verification.

use crate::audit::{AuditAction, AuditRecord};
use crate::domain::{DomainError, Educator, OperationContext, PayoutAccount};
use crate::error::AppError;
use crate::store::SharedStore;

use super::{require_admin, SetEducatorVerificationCommand, VerifyPayoutAccountCommand};

pub struct SetEducatorVerificationHandler {
    store: SharedStore,
}

impl SetEducatorVerificationHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        command: SetEducatorVerificationCommand,
        context: &OperationContext,
    ) -> Result<Educator, AppError> {
        require_admin(context)?;

        let audit = AuditRecord::new(
            AuditAction::EducatorVerificationChanged,
            "educator",
            command.educator_id,
            context,
        );
        let educator = self
            .store
            .set_educator_verification(command.educator_id, command.status, audit)
            .await?
            .ok_or_else(|| DomainError::not_found("educator", command.educator_id))?;

        tracing::info!(
            educator_id = %educator.id,
            status = %educator.verification_status,
            "Educator verification updated"
        );
        Ok(educator)
    }
}

pub struct VerifyPayoutAccountHandler {
    store: SharedStore,
}

impl VerifyPayoutAccountHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        command: VerifyPayoutAccountCommand,
        context: &OperationContext,
    ) -> Result<PayoutAccount, AppError> {
        require_admin(context)?;

        let audit = AuditRecord::new(
            AuditAction::PayoutAccountVerified,
            "educator",
            command.educator_id,
            context,
        );
        let account = self
            .store
            .verify_payout_account(command.educator_id, audit)
            .await?
            .ok_or_else(|| DomainError::not_found("payout account", command.educator_id))?;

        tracing::info!(educator_id = %command.educator_id, "Payout account verified");
        Ok(account)
    }
}
