//! Command Handlers module
//!
//! Each handler validates one command against the domain rules and commits
//! its effects through a single atomic store call.

mod book_handler;
mod catalog_handler;
mod commands;
mod payment_handler;
mod payout_handler;
mod profile_handler;
mod registration_handler;
mod review_handler;
mod settle_handler;
mod transition_handler;
mod trust_handler;

#[cfg(test)]
mod tests;

pub use book_handler::BookSessionHandler;
pub use catalog_handler::{CreateSubjectHandler, ToggleFavoriteHandler};
pub use commands::*;
pub use payment_handler::CreatePaymentHandler;
pub use payout_handler::SavePayoutAccountHandler;
pub use profile_handler::{UpdateEducatorProfileHandler, UpdateProfileHandler};
pub use registration_handler::{RegisterEducatorHandler, RegisterStudentHandler};
pub use review_handler::AttachReviewHandler;
pub use settle_handler::SettlePaymentHandler;
pub use transition_handler::TransitionSessionHandler;
pub use trust_handler::{SetEducatorVerificationHandler, VerifyPayoutAccountHandler};

use crate::domain::{Actor, DomainError, OperationContext};

/// The acting user, if it is an admin
pub(crate) fn require_admin(context: &OperationContext) -> Result<&Actor, DomainError> {
    let actor = context.actor()?;
    if actor.is_admin() {
        Ok(actor)
    } else {
        Err(DomainError::Forbidden(
            "only admins may perform this action".to_string(),
        ))
    }
}
