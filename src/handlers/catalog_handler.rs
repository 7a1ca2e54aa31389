//! Catalog Handlers
//!
//! Subject creation (admin) and favorite toggling (students).

use crate::audit::{AuditAction, AuditRecord};
use crate::domain::{FavoriteToggle, OperationContext, Subject};
use crate::error::AppError;
use crate::store::SharedStore;

use super::{require_admin, CreateSubjectCommand, ToggleFavoriteCommand};

pub struct CreateSubjectHandler {
    store: SharedStore,
}

impl CreateSubjectHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        command: CreateSubjectCommand,
        context: &OperationContext,
    ) -> Result<Subject, AppError> {
        require_admin(context)?;

        let subject = Subject::new(&command.name, command.description)?;
        let audit = AuditRecord::new(AuditAction::SubjectCreated, "subject", subject.id, context)
            .after(&subject);
        self.store.create_subject(&subject, &audit).await?;

        tracing::info!(subject_id = %subject.id, name = %subject.name, "Subject created");
        Ok(subject)
    }
}

pub struct ToggleFavoriteHandler {
    store: SharedStore,
}

impl ToggleFavoriteHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        command: ToggleFavoriteCommand,
        context: &OperationContext,
    ) -> Result<FavoriteToggle, AppError> {
        let student_id = context.actor()?.student_id()?;

        let audit = AuditRecord::new(
            AuditAction::FavoriteToggled,
            "subject",
            command.subject_id,
            context,
        );
        let toggle = self
            .store
            .toggle_favorite(student_id, command.subject_id, audit)
            .await?;

        tracing::debug!(
            student_id = %student_id,
            subject_id = %command.subject_id,
            favorite = toggle.is_favorite(),
            "Favorite toggled"
        );
        Ok(toggle)
    }
}
