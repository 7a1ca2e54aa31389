//! Registration Handlers
//!
//! Create a user together with its student or educator profile.

use chrono::Utc;

use crate::audit::{AuditAction, AuditRecord};
use crate::domain::{DomainError, Educator, HourlyRate, OperationContext, Role, Student, User};
use crate::error::AppError;
use crate::store::SharedStore;

use super::{RegisterEducatorCommand, RegisterStudentCommand, RegistrationResult};

/// Handler for student sign-up
pub struct RegisterStudentHandler {
    store: SharedStore,
}

impl RegisterStudentHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        command: RegisterStudentCommand,
        context: &OperationContext,
    ) -> Result<RegistrationResult, AppError> {
        let user = User::register(
            &command.email,
            command.first_name,
            command.last_name,
            command.bio,
            Role::Student,
            Utc::now(),
        )?;
        let student = Student::for_user(&user);

        let audit = AuditRecord::new(AuditAction::UserRegistered, "user", user.id, context)
            .after(&user);
        self.store.register_student(&user, &student, &audit).await?;

        tracing::info!(user_id = %user.id, student_id = %student.id, "Student registered");

        Ok(RegistrationResult {
            user,
            profile_id: student.id,
        })
    }
}

/// Handler for educator sign-up. New educators wait for vetting.
pub struct RegisterEducatorHandler {
    store: SharedStore,
}

impl RegisterEducatorHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        command: RegisterEducatorCommand,
        context: &OperationContext,
    ) -> Result<RegistrationResult, AppError> {
        let hourly_rate: HourlyRate = command
            .hourly_rate
            .parse()
            .map_err(|e| DomainError::InvalidRate(format!("{}", e)))?;

        let user = User::register(
            &command.email,
            command.first_name,
            command.last_name,
            command.bio,
            Role::Educator,
            Utc::now(),
        )?;
        let educator = Educator::for_user(&user, command.degree, hourly_rate)?;

        let mut subject_ids = command.subject_ids;
        subject_ids.sort();
        subject_ids.dedup();

        let audit = AuditRecord::new(AuditAction::UserRegistered, "user", user.id, context)
            .after(&serde_json::json!({ "user": &user, "educator": &educator }));
        self.store
            .register_educator(&user, &educator, &subject_ids, &audit)
            .await?;

        tracing::info!(
            user_id = %user.id,
            educator_id = %educator.id,
            subjects = subject_ids.len(),
            "Educator registered, pending verification"
        );

        Ok(RegistrationResult {
            user,
            profile_id: educator.id,
        })
    }
}
