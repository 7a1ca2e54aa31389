//! Identity & Profiles
//!
//! Users, their role-specific profiles and the resolved acting party of a
//! request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::ensure_max_chars;
use super::{DomainError, HourlyRate};

const MAX_PERSON_NAME_LEN: usize = 150;
const MAX_DEGREE_LEN: usize = 100;

/// Role tag of a user. Fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Educator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Educator => "educator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "educator" => Ok(Role::Educator),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::InvalidRequest(format!("unknown role '{}'", other))),
        }
    }
}

/// Educator vetting state, owned by the trust/ops process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VerificationStatus::Pending),
            "verified" => Ok(VerificationStatus::Verified),
            "rejected" => Ok(VerificationStatus::Rejected),
            other => Err(DomainError::InvalidRequest(format!(
                "unknown verification status '{}'",
                other
            ))),
        }
    }
}

/// Account record shared by every role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// Build a new, unverified user.
    pub fn register(
        email: &str,
        first_name: String,
        last_name: String,
        bio: Option<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let email = normalize_email(email)?;

        if first_name.trim().is_empty() || last_name.trim().is_empty() {
            return Err(DomainError::InvalidRequest(
                "first_name and last_name are required".to_string(),
            ));
        }
        ensure_max_chars("first_name", first_name.trim(), MAX_PERSON_NAME_LEN)?;
        ensure_max_chars("last_name", last_name.trim(), MAX_PERSON_NAME_LEN)?;

        Ok(Self {
            id: Uuid::new_v4(),
            email,
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            bio: bio.filter(|b| !b.trim().is_empty()),
            role,
            is_verified: false,
            date_joined: now,
        })
    }

    /// The user with `changes` applied. Names may not be blanked; an empty
    /// bio clears it.
    pub fn with_profile(&self, changes: &ProfileChanges) -> Result<Self, DomainError> {
        let name = |field: &str,
                    value: &Option<String>,
                    current: &str|
         -> Result<String, DomainError> {
            match value {
                Some(value) if value.trim().is_empty() => {
                    Err(DomainError::InvalidRequest(format!("{} cannot be empty", field)))
                }
                Some(value) => {
                    ensure_max_chars(field, value.trim(), MAX_PERSON_NAME_LEN)?;
                    Ok(value.trim().to_string())
                }
                None => Ok(current.to_string()),
            }
        };

        Ok(Self {
            first_name: name("first_name", &changes.first_name, &self.first_name)?,
            last_name: name("last_name", &changes.last_name, &self.last_name)?,
            bio: match &changes.bio {
                Some(bio) if bio.trim().is_empty() => None,
                Some(bio) => Some(bio.clone()),
                None => self.bio.clone(),
            },
            ..self.clone()
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Edits a user may make to their own profile. `None` keeps the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileChanges {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.bio.is_none()
    }
}

/// Lowercase the domain part of an address and check its basic shape.
pub fn normalize_email(email: &str) -> Result<String, DomainError> {
    let email = email.trim();
    let (local, domain) = email
        .rsplit_once('@')
        .ok_or_else(|| DomainError::InvalidRequest("email must contain '@'".to_string()))?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(DomainError::InvalidRequest(format!(
            "invalid email address '{}'",
            email
        )));
    }

    Ok(format!("{}@{}", local, domain.to_lowercase()))
}

/// Student profile. Favorite subjects live in their own relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub user_id: Uuid,
}

impl Student {
    pub fn for_user(user: &User) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user.id,
        }
    }
}

/// Educator profile. Taught subjects live in their own relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Educator {
    pub id: Uuid,
    pub user_id: Uuid,
    pub degree: String,
    pub hourly_rate: HourlyRate,
    pub verification_status: VerificationStatus,
    pub contract_signed: bool,
}

impl Educator {
    /// New educators start unvetted and without a signed contract.
    pub fn for_user(user: &User, degree: String, hourly_rate: HourlyRate) -> Result<Self, DomainError> {
        if degree.trim().is_empty() {
            return Err(DomainError::InvalidRequest("degree is required".to_string()));
        }
        ensure_max_chars("degree", degree.trim(), MAX_DEGREE_LEN)?;

        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user.id,
            degree: degree.trim().to_string(),
            hourly_rate,
            verification_status: VerificationStatus::Pending,
            contract_signed: false,
        })
    }

    /// The educator with `changes` applied. Vetting state is untouched.
    pub fn with_profile(&self, changes: &EducatorChanges) -> Result<Self, DomainError> {
        let degree = match &changes.degree {
            Some(degree) if degree.trim().is_empty() => {
                return Err(DomainError::InvalidRequest("degree cannot be empty".to_string()))
            }
            Some(degree) => {
                ensure_max_chars("degree", degree.trim(), MAX_DEGREE_LEN)?;
                degree.trim().to_string()
            }
            None => self.degree.clone(),
        };

        Ok(Self {
            degree,
            hourly_rate: changes.hourly_rate.unwrap_or(self.hourly_rate),
            ..self.clone()
        })
    }

    /// Only verified educators can be discovered and booked
    pub fn is_bookable(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }
}

/// Edits an educator may make to their own profile. `None` keeps the field.
///
/// A new rate applies to payments made from then on, including payments
/// for sessions booked earlier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducatorChanges {
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub hourly_rate: Option<HourlyRate>,
}

impl EducatorChanges {
    pub fn is_empty(&self) -> bool {
        self.degree.is_none() && self.hourly_rate.is_none()
    }
}

/// The party performing an operation, resolved from the caller's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Actor {
    Student { user_id: Uuid, student_id: Uuid },
    Educator { user_id: Uuid, educator_id: Uuid },
    Admin { user_id: Uuid },
}

impl Actor {
    pub fn user_id(&self) -> Uuid {
        match self {
            Actor::Student { user_id, .. }
            | Actor::Educator { user_id, .. }
            | Actor::Admin { user_id } => *user_id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Actor::Student { .. } => Role::Student,
            Actor::Educator { .. } => Role::Educator,
            Actor::Admin { .. } => Role::Admin,
        }
    }

    /// Student profile id, or `Forbidden` for any other role
    pub fn student_id(&self) -> Result<Uuid, DomainError> {
        match self {
            Actor::Student { student_id, .. } => Ok(*student_id),
            Actor::Educator { .. } | Actor::Admin { .. } => Err(DomainError::Forbidden(
                "only students may perform this action".to_string(),
            )),
        }
    }

    /// Educator profile id, or `Forbidden` for any other role
    pub fn educator_id(&self) -> Result<Uuid, DomainError> {
        match self {
            Actor::Educator { educator_id, .. } => Ok(*educator_id),
            Actor::Student { .. } | Actor::Admin { .. } => Err(DomainError::Forbidden(
                "only educators may perform this action".to_string(),
            )),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin { .. })
    }
}
