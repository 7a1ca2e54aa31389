//! Review Handler

use chrono::Utc;

use crate::audit::{AuditAction, AuditRecord};
use crate::domain::{DomainError, OperationContext, Rating, Review};
use crate::error::AppError;
use crate::store::SharedStore;

use super::AttachReviewCommand;

pub struct AttachReviewHandler {
    store: SharedStore,
}

impl AttachReviewHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Review a completed session. Checks run in this order: session
    /// exists, rating in range, actor is the session's student, session is
    /// completed, no review yet.
    pub async fn execute(
        &self,
        command: AttachReviewCommand,
        context: &OperationContext,
    ) -> Result<Review, AppError> {
        let actor = context.actor()?;

        let session = self
            .store
            .get_session(command.session_id)
            .await?
            .ok_or_else(|| DomainError::not_found("session", command.session_id))?;

        let rating = Rating::new(command.rating)?;
        let student_id = actor.student_id()?;
        let already_reviewed = self
            .store
            .get_review_for_session(session.id)
            .await?
            .is_some();

        let review = Review::attach(
            &session,
            student_id,
            rating,
            command.comment,
            already_reviewed,
            Utc::now(),
        )?;

        let audit = AuditRecord::new(AuditAction::ReviewAttached, "review", review.id, context)
            .after(&review);
        self.store.insert_review(&review, &audit).await?;

        tracing::info!(
            session_id = %session.id,
            review_id = %review.id,
            rating = review.rating.value(),
            "Review attached"
        );
        Ok(review)
    }
}
