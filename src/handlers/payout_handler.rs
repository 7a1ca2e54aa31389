//! Payout Account Handler

use crate::audit::{AuditAction, AuditRecord};
use crate::domain::{OperationContext, PayoutAccount};
use crate::error::AppError;
use crate::store::SharedStore;

use super::SavePayoutAccountCommand;

/// Create-or-replace the acting educator's payout account.
///
/// The verification flag is never set here; replacing the details of an
/// already verified account keeps it verified.
pub struct SavePayoutAccountHandler {
    store: SharedStore,
}

impl SavePayoutAccountHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        command: SavePayoutAccountCommand,
        context: &OperationContext,
    ) -> Result<PayoutAccount, AppError> {
        let educator_id = context.actor()?.educator_id()?;
        let details = command.details.validate()?;

        let audit = AuditRecord::new(
            AuditAction::PayoutAccountSaved,
            "educator",
            educator_id,
            context,
        );
        let account = self
            .store
            .upsert_payout_account(educator_id, &details, audit)
            .await?;

        tracing::info!(
            educator_id = %educator_id,
            account = %account.masked_account_number(),
            verified = account.is_verified,
            "Payout account saved"
        );
        Ok(account)
    }
}
