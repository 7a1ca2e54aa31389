//! Profile Handlers
//!
//! Users editing their own account details, and educators their degree and
//! hourly rate.

use crate::audit::{AuditAction, AuditRecord};
use crate::domain::{
    DomainError, Educator, EducatorChanges, HourlyRate, OperationContext, ProfileChanges, User,
};
use crate::error::AppError;
use crate::store::SharedStore;

use super::{UpdateEducatorProfileCommand, UpdateProfileCommand};

pub struct UpdateProfileHandler {
    store: SharedStore,
}

impl UpdateProfileHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        command: UpdateProfileCommand,
        context: &OperationContext,
    ) -> Result<User, AppError> {
        let user_id = context.actor()?.user_id();

        let changes = ProfileChanges {
            first_name: command.first_name,
            last_name: command.last_name,
            bio: command.bio,
        };
        if changes.is_empty() {
            return Err(DomainError::InvalidRequest("no profile fields given".to_string()).into());
        }

        let audit = AuditRecord::new(AuditAction::ProfileUpdated, "user", user_id, context);
        let user = self
            .store
            .update_user_profile(user_id, &changes, audit)
            .await?
            .ok_or_else(|| DomainError::not_found("user", user_id))?;

        tracing::info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }
}

/// Rate changes take effect for every later payment, see [`EducatorChanges`].
pub struct UpdateEducatorProfileHandler {
    store: SharedStore,
}

impl UpdateEducatorProfileHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        command: UpdateEducatorProfileCommand,
        context: &OperationContext,
    ) -> Result<Educator, AppError> {
        let educator_id = context.actor()?.educator_id()?;

        let hourly_rate = command
            .hourly_rate
            .map(|rate| rate.parse::<HourlyRate>())
            .transpose()
            .map_err(|e| DomainError::InvalidRate(format!("{}", e)))?;
        let changes = EducatorChanges {
            degree: command.degree,
            hourly_rate,
        };
        if changes.is_empty() {
            return Err(DomainError::InvalidRequest("no profile fields given".to_string()).into());
        }

        let audit = AuditRecord::new(
            AuditAction::EducatorProfileUpdated,
            "educator",
            educator_id,
            context,
        );
        let educator = self
            .store
            .update_educator_profile(educator_id, &changes, audit)
            .await?
            .ok_or_else(|| DomainError::not_found("educator", educator_id))?;

        tracing::info!(
            educator_id = %educator.id,
            hourly_rate = %educator.hourly_rate,
            "Educator profile updated"
        );
        Ok(educator)
    }
}
