//! Catalog
//!
//! Subjects offered on the platform.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DomainError;

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

impl Subject {
    pub fn new(name: &str, description: Option<String>) -> Result<Self, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::InvalidRequest("subject name is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::InvalidRequest(format!(
                "subject name exceeds {} characters",
                MAX_NAME_LEN
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.unwrap_or_default(),
        })
    }
}

/// Outcome of toggling a favorite subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteToggle {
    Added,
    Removed,
}

impl FavoriteToggle {
    pub fn is_favorite(&self) -> bool {
        matches!(self, FavoriteToggle::Added)
    }
}
