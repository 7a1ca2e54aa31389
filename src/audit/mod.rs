//! Audit Log
//!
//! Every state-changing command records what happened, to which resource and
//! on whose behalf. Records are written by the store in the same atomic unit
//! as the change they describe, so a rolled-back command leaves no trace and
//! a committed one always has its record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::OperationContext;

/// Audit action types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    UserRegistered,
    ProfileUpdated,
    EducatorProfileUpdated,
    SubjectCreated,
    FavoriteToggled,
    EducatorVerificationChanged,
    SessionBooked,
    SessionStatusChanged,
    ReviewAttached,
    PaymentCreated,
    PaymentSettled,
    PayoutAccountSaved,
    PayoutAccountVerified,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserRegistered => "user.registered",
            AuditAction::ProfileUpdated => "user.profile_updated",
            AuditAction::EducatorProfileUpdated => "educator.profile_updated",
            AuditAction::SubjectCreated => "subject.created",
            AuditAction::FavoriteToggled => "subject.favorite_toggled",
            AuditAction::EducatorVerificationChanged => "educator.verification_changed",
            AuditAction::SessionBooked => "session.booked",
            AuditAction::SessionStatusChanged => "session.status_changed",
            AuditAction::ReviewAttached => "review.attached",
            AuditAction::PaymentCreated => "payment.created",
            AuditAction::PaymentSettled => "payment.settled",
            AuditAction::PayoutAccountSaved => "payout_account.saved",
            AuditAction::PayoutAccountVerified => "payout_account.verified",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audit log row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub actor_user_id: Option<Uuid>,
    pub api_key_id: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Start a record for `action` on the given resource
    pub fn new(
        action: AuditAction,
        resource_type: &str,
        resource_id: Uuid,
        context: &OperationContext,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.as_str().to_string(),
            resource_type: resource_type.to_string(),
            resource_id,
            actor_user_id: context.actor_user_id(),
            api_key_id: context.api_key_id,
            correlation_id: context.correlation_id,
            before_state: None,
            after_state: None,
            created_at: Utc::now(),
        }
    }

    /// Set the before state
    pub fn before<T: Serialize>(mut self, state: &T) -> Self {
        self.before_state = serde_json::to_value(state).ok();
        self
    }

    /// Set the after state
    pub fn after<T: Serialize>(mut self, state: &T) -> Self {
        self.after_state = serde_json::to_value(state).ok();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Actor;

    #[test]
    fn test_audit_action_as_str() {
        assert_eq!(AuditAction::SessionBooked.as_str(), "session.booked");
        assert_eq!(AuditAction::PaymentSettled.to_string(), "payment.settled");
    }

    #[test]
    fn test_record_carries_context() {
        let actor = Actor::Admin { user_id: Uuid::new_v4() };
        let correlation_id = Uuid::new_v4();
        let context = OperationContext::new()
            .with_actor(actor)
            .with_correlation_id(correlation_id);

        let resource_id = Uuid::new_v4();
        let record = AuditRecord::new(AuditAction::SubjectCreated, "subject", resource_id, &context)
            .after(&serde_json::json!({"name": "Algebra"}));

        assert_eq!(record.action, "subject.created");
        assert_eq!(record.resource_id, resource_id);
        assert_eq!(record.actor_user_id, Some(actor.user_id()));
        assert_eq!(record.correlation_id, Some(correlation_id));
        assert!(record.before_state.is_none());
        assert_eq!(record.after_state.unwrap()["name"], "Algebra");
    }
}
