//! Session lifecycle
//!
//! A session is one booked tutoring engagement. Its status moves through a
//! small state machine:
//!
//! ```text
//! pending ──► confirmed ──► completed
//!    │            │
//!    └──► canceled ◄┘
//! ```
//!
//! `completed` and `canceled` are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Actor, DomainError, HourlyRate, Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Confirmed,
    Completed,
    Canceled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Confirmed => "confirmed",
            SessionStatus::Completed => "completed",
            SessionStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Canceled)
    }

    /// Sessions in these states hold their educator's time slot
    pub fn holds_slot(&self) -> bool {
        matches!(self, SessionStatus::Pending | SessionStatus::Confirmed)
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Canceled) | (Confirmed, Completed) | (Confirmed, Canceled)
        )
    }

    /// Validate a requested status change.
    pub fn transition(&self, next: SessionStatus) -> Result<SessionStatus, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::invalid_transition("session", self, next))
        }
    }

    /// Status after a payment for the session settles successfully.
    ///
    /// A pending session is confirmed; anything further along is left as is.
    pub fn after_payment(&self) -> SessionStatus {
        match self {
            SessionStatus::Pending => SessionStatus::Confirmed,
            other => *other,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "confirmed" => Ok(SessionStatus::Confirmed),
            "completed" => Ok(SessionStatus::Completed),
            "canceled" => Ok(SessionStatus::Canceled),
            other => Err(DomainError::InvalidRequest(format!(
                "unknown session status '{}'",
                other
            ))),
        }
    }
}

/// A validated half-open booking interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeSlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DomainError> {
        if end <= start {
            return Err(DomainError::InvalidSession(format!(
                "end_time {} must be after start_time {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Adjacent slots (one ends exactly when the other starts) do not overlap.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub student_id: Uuid,
    pub educator_id: Uuid,
    pub subject_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
    pub meeting_link: Option<String>,
    pub session_notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A new booking request. Always starts `pending`.
    pub fn book(
        student_id: Uuid,
        educator_id: Uuid,
        subject_id: Uuid,
        slot: TimeSlot,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            educator_id,
            subject_id,
            start_time: slot.start(),
            end_time: slot.end(),
            status: SessionStatus::Pending,
            meeting_link: None,
            session_notes: notes.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Interval of the session, or `InvalidSession` if the stored times are
    /// inconsistent.
    pub fn slot(&self) -> Result<TimeSlot, DomainError> {
        TimeSlot::new(self.start_time, self.end_time)
    }

    /// Whole minutes between start and end.
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// `duration_minutes / 60 × hourly_rate`, evaluated with the rate given.
    pub fn cost(&self, rate: &HourlyRate) -> Result<Money, DomainError> {
        let slot = self.slot()?;
        let minutes = (slot.end() - slot.start()).num_minutes();
        rate.charge_for_minutes(minutes).map_err(|e| {
            DomainError::InvalidSession(format!(
                "session of {} minutes cannot be priced: {}",
                minutes, e
            ))
        })
    }

    /// Only the two participants and admins may look at a session
    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        match actor {
            Actor::Student { student_id, .. } => *student_id == self.student_id,
            Actor::Educator { educator_id, .. } => *educator_id == self.educator_id,
            Actor::Admin { .. } => true,
        }
    }

    /// Apply an educator-requested status change.
    ///
    /// Only the session's own educator may drive the lifecycle. A meeting
    /// link can accompany a confirmation.
    pub fn transition_by_educator(
        &self,
        actor_educator_id: Uuid,
        next: SessionStatus,
        meeting_link: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Session, DomainError> {
        if actor_educator_id != self.educator_id {
            return Err(DomainError::Forbidden(
                "only the session's educator may change its status".to_string(),
            ));
        }

        let status = self.status.transition(next)?;

        let meeting_link = match meeting_link {
            Some(link) if status == SessionStatus::Confirmed => Some(validate_meeting_link(link)?),
            Some(_) => {
                return Err(DomainError::InvalidRequest(
                    "meeting_link can only be set when confirming".to_string(),
                ))
            }
            None => self.meeting_link.clone(),
        };

        Ok(Session {
            status,
            meeting_link,
            updated_at: now,
            ..self.clone()
        })
    }

    /// The session as it stands after one of its payments settled
    /// successfully, or `None` if settlement leaves it untouched.
    pub fn reconcile_after_payment(&self, now: DateTime<Utc>) -> Option<Session> {
        let status = self.status.after_payment();
        if status == self.status {
            return None;
        }
        Some(Session {
            status,
            updated_at: now,
            ..self.clone()
        })
    }
}

fn validate_meeting_link(link: String) -> Result<String, DomainError> {
    let link = link.trim();
    if link.starts_with("https://") || link.starts_with("http://") {
        Ok(link.to_string())
    } else {
        Err(DomainError::InvalidRequest(format!(
            "meeting_link must be an http(s) URL, got '{}'",
            link
        )))
    }
}
