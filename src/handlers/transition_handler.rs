//! Session Status Transition Handler

use chrono::Utc;

use crate::audit::{AuditAction, AuditRecord};
use crate::domain::{DomainError, OperationContext, Session};
use crate::error::AppError;
use crate::store::{CasResult, SharedStore};

use super::TransitionSessionCommand;

/// Handler for educator-driven status changes
pub struct TransitionSessionHandler {
    store: SharedStore,
}

impl TransitionSessionHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Apply the transition as a compare-and-swap on the status that was
    /// read. A concurrent change in between surfaces as `Conflict`.
    pub async fn execute(
        &self,
        command: TransitionSessionCommand,
        context: &OperationContext,
    ) -> Result<Session, AppError> {
        let actor = context.actor()?;

        let session = self
            .store
            .get_session(command.session_id)
            .await?
            .ok_or_else(|| DomainError::not_found("session", command.session_id))?;

        let educator_id = actor.educator_id()?;
        let updated = session
            .transition_by_educator(educator_id, command.status, command.meeting_link, Utc::now())
            .map_err(|e| {
                tracing::warn!(
                    session_id = %session.id,
                    from = %session.status,
                    to = %command.status,
                    error = %e,
                    "Session transition rejected"
                );
                e
            })?;

        let audit = AuditRecord::new(
            AuditAction::SessionStatusChanged,
            "session",
            session.id,
            context,
        )
        .before(&session)
        .after(&updated);

        match self.store.cas_session(&updated, session.status, &audit).await? {
            CasResult::Success => {
                tracing::info!(
                    session_id = %session.id,
                    from = %session.status,
                    to = %updated.status,
                    "Session status changed"
                );
                Ok(updated)
            }
            CasResult::StatusMismatch { actual } => {
                tracing::warn!(
                    session_id = %session.id,
                    expected = %session.status,
                    actual = %actual,
                    "Lost status race"
                );
                Err(DomainError::Conflict(format!(
                    "session {} changed concurrently (now {})",
                    session.id, actual
                ))
                .into())
            }
            CasResult::NotFound => Err(DomainError::not_found("session", session.id).into()),
        }
    }
}
