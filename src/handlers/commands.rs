//! Command definitions
//!
//! Commands represent intentions to change the system state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    PayoutDetails, Session, SessionStatus, SettlementOutcome, Transaction, User,
    VerificationStatus,
};

// =========================================================================
// Registration
// =========================================================================

/// Command to register a student
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterStudentCommand {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
}

impl RegisterStudentCommand {
    pub fn new(email: String, first_name: String, last_name: String) -> Self {
        Self {
            email,
            first_name,
            last_name,
            bio: None,
        }
    }

    pub fn with_bio(mut self, bio: String) -> Self {
        self.bio = Some(bio);
        self
    }
}

/// Command to register an educator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterEducatorCommand {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub degree: String,
    /// Hourly rate as a decimal string
    pub hourly_rate: String,
    pub subject_ids: Vec<Uuid>,
}

impl RegisterEducatorCommand {
    pub fn new(
        email: String,
        first_name: String,
        last_name: String,
        degree: String,
        hourly_rate: String,
    ) -> Self {
        Self {
            email,
            first_name,
            last_name,
            bio: None,
            degree,
            hourly_rate,
            subject_ids: Vec::new(),
        }
    }

    pub fn with_bio(mut self, bio: String) -> Self {
        self.bio = Some(bio);
        self
    }

    pub fn with_subjects(mut self, subject_ids: Vec<Uuid>) -> Self {
        self.subject_ids = subject_ids;
        self
    }
}

/// Result of a successful registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationResult {
    pub user: User,
    /// Id of the student or educator profile created with the user
    pub profile_id: Uuid,
}

/// Command to edit the acting user's own profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileCommand {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

impl UpdateProfileCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_first_name(mut self, first_name: String) -> Self {
        self.first_name = Some(first_name);
        self
    }

    pub fn with_last_name(mut self, last_name: String) -> Self {
        self.last_name = Some(last_name);
        self
    }

    /// An empty bio clears it
    pub fn with_bio(mut self, bio: String) -> Self {
        self.bio = Some(bio);
        self
    }
}

/// Command to edit the acting educator's degree or hourly rate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEducatorProfileCommand {
    pub degree: Option<String>,
    /// Hourly rate as a decimal string
    pub hourly_rate: Option<String>,
}

impl UpdateEducatorProfileCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_degree(mut self, degree: String) -> Self {
        self.degree = Some(degree);
        self
    }

    pub fn with_hourly_rate(mut self, hourly_rate: String) -> Self {
        self.hourly_rate = Some(hourly_rate);
        self
    }
}

// =========================================================================
// Catalog
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubjectCommand {
    pub name: String,
    pub description: Option<String>,
}

impl CreateSubjectCommand {
    pub fn new(name: String) -> Self {
        Self {
            name,
            description: None,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleFavoriteCommand {
    pub subject_id: Uuid,
}

impl ToggleFavoriteCommand {
    pub fn new(subject_id: Uuid) -> Self {
        Self { subject_id }
    }
}

// =========================================================================
// Session lifecycle
// =========================================================================

/// Command to book a session for the acting student
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSessionCommand {
    pub educator_id: Uuid,
    pub subject_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
}

impl BookSessionCommand {
    pub fn new(
        educator_id: Uuid,
        subject_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            educator_id,
            subject_id,
            start_time,
            end_time,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: String) -> Self {
        self.notes = Some(notes);
        self
    }
}

/// Command to move a session to a new status on behalf of its educator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionSessionCommand {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub meeting_link: Option<String>,
}

impl TransitionSessionCommand {
    pub fn new(session_id: Uuid, status: SessionStatus) -> Self {
        Self {
            session_id,
            status,
            meeting_link: None,
        }
    }

    pub fn with_meeting_link(mut self, meeting_link: String) -> Self {
        self.meeting_link = Some(meeting_link);
        self
    }
}

/// Command to review a completed session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachReviewCommand {
    pub session_id: Uuid,
    /// Raw rating as submitted; validated to 1..=5
    pub rating: i64,
    pub comment: Option<String>,
}

impl AttachReviewCommand {
    pub fn new(session_id: Uuid, rating: i64) -> Self {
        Self {
            session_id,
            rating,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: String) -> Self {
        self.comment = Some(comment);
        self
    }
}

// =========================================================================
// Payment ledger
// =========================================================================

/// Command to pay for a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentCommand {
    pub session_id: Uuid,
    pub payment_method: String,
}

impl CreatePaymentCommand {
    pub fn new(session_id: Uuid, payment_method: String) -> Self {
        Self {
            session_id,
            payment_method,
        }
    }
}

/// Result of a payment request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub transaction: Transaction,
    pub session: Session,
}

/// Command to apply a gateway outcome to a payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlePaymentCommand {
    pub transaction_id: Uuid,
    pub outcome: SettlementOutcome,
}

impl SettlePaymentCommand {
    pub fn new(transaction_id: Uuid, outcome: SettlementOutcome) -> Self {
        Self {
            transaction_id,
            outcome,
        }
    }
}

/// Command to create or replace the acting educator's payout account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavePayoutAccountCommand {
    pub details: PayoutDetails,
}

impl SavePayoutAccountCommand {
    pub fn new(details: PayoutDetails) -> Self {
        Self { details }
    }
}

// =========================================================================
// Trust & ops
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetEducatorVerificationCommand {
    pub educator_id: Uuid,
    pub status: VerificationStatus,
}

impl SetEducatorVerificationCommand {
    pub fn new(educator_id: Uuid, status: VerificationStatus) -> Self {
        Self {
            educator_id,
            status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPayoutAccountCommand {
    pub educator_id: Uuid,
}

impl VerifyPayoutAccountCommand {
    pub fn new(educator_id: Uuid) -> Self {
        Self { educator_id }
    }
}
