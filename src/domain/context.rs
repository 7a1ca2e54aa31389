//! Operation Context
//!
//! Who is calling and on whose behalf, carried from the API layer into the
//! command handlers for authorization, auditing and tracing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Actor, DomainError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationContext {
    /// API key of the calling client application
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<Uuid>,

    /// End user resolved from X-Request-User-Id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key_id: Uuid) -> Self {
        self.api_key_id = Some(api_key_id);
        self
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// The acting user, required by every user-facing command
    pub fn actor(&self) -> Result<&Actor, DomainError> {
        self.actor.as_ref().ok_or_else(|| {
            DomainError::Forbidden("this action requires an identified user".to_string())
        })
    }

    pub fn actor_user_id(&self) -> Option<Uuid> {
        self.actor.as_ref().map(Actor::user_id)
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }
}
