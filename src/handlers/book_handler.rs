//! Book Session Handler
//!
//! Turns a student's booking request into a pending session.

use chrono::Utc;

use crate::audit::{AuditAction, AuditRecord};
use crate::domain::{DomainError, OperationContext, Session, TimeSlot};
use crate::error::AppError;
use crate::store::SharedStore;

use super::BookSessionCommand;

/// Handler for session bookings
pub struct BookSessionHandler {
    store: SharedStore,
}

impl BookSessionHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Book a session for the acting student.
    ///
    /// The educator must be verified and teach the subject. The educator's
    /// pending and confirmed sessions must not overlap the requested slot;
    /// the store enforces that atomically and answers `Conflict`.
    pub async fn execute(
        &self,
        command: BookSessionCommand,
        context: &OperationContext,
    ) -> Result<Session, AppError> {
        let student_id = context.actor()?.student_id()?;

        self.store
            .get_student(student_id)
            .await?
            .ok_or_else(|| DomainError::not_found("student", student_id))?;

        let educator = self
            .store
            .get_educator(command.educator_id)
            .await?
            .ok_or_else(|| DomainError::not_found("educator", command.educator_id))?;

        self.store
            .get_subject(command.subject_id)
            .await?
            .ok_or_else(|| DomainError::not_found("subject", command.subject_id))?;

        if !educator.is_bookable() {
            return Err(DomainError::NotEligible(format!(
                "educator {} is not verified (status: {})",
                educator.id, educator.verification_status
            ))
            .into());
        }

        if !self
            .store
            .educator_teaches(educator.id, command.subject_id)
            .await?
        {
            return Err(DomainError::NotEligible(format!(
                "educator {} does not teach subject {}",
                educator.id, command.subject_id
            ))
            .into());
        }

        let slot = TimeSlot::new(command.start_time, command.end_time)?;
        let session = Session::book(
            student_id,
            educator.id,
            command.subject_id,
            slot,
            command.notes,
            Utc::now(),
        );

        let audit = AuditRecord::new(AuditAction::SessionBooked, "session", session.id, context)
            .after(&session);

        if let Err(e) = self.store.insert_session(&session, &audit).await {
            tracing::warn!(
                educator_id = %educator.id,
                start_time = %session.start_time,
                end_time = %session.end_time,
                error = %e,
                "Booking rejected"
            );
            return Err(e.into());
        }

        tracing::info!(
            session_id = %session.id,
            student_id = %student_id,
            educator_id = %educator.id,
            "Session booked"
        );
        Ok(session)
    }
}
