//! Reviews
//!
//! One immutable review per completed session, written by its student.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DomainError, Session, SessionStatus};

/// Star rating between 1 and 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: i64 = 1;
    pub const MAX: i64 = 5;

    pub fn new(value: i64) -> Result<Self, DomainError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(DomainError::InvalidRating(value.to_string()))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Rating::new(value)
    }
}

impl From<Rating> for i64 {
    fn from(rating: Rating) -> Self {
        i64::from(rating.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub session_id: Uuid,
    pub rating: Rating,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Write a review for `session`.
    ///
    /// Checks, in order: the actor is the session's student, the session is
    /// completed, and it has not been reviewed yet.
    pub fn attach(
        session: &Session,
        actor_student_id: Uuid,
        rating: Rating,
        comment: Option<String>,
        already_reviewed: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if session.student_id != actor_student_id {
            return Err(DomainError::Forbidden(
                "you can only review your own sessions".to_string(),
            ));
        }
        if session.status != SessionStatus::Completed {
            return Err(DomainError::NotEligible(format!(
                "only completed sessions can be reviewed (session is {})",
                session.status
            )));
        }
        if already_reviewed {
            return Err(DomainError::NotEligible(
                "this session has already been reviewed".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            session_id: session.id,
            rating,
            comment: comment.map(|c| c.trim().to_string()).unwrap_or_default(),
            created_at: now,
        })
    }
}
