//! User model for storage and API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Also used as the document ID
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    /// Free-form, as entered by the user
    pub sex: String,
}

/// Editable user fields (create and update share the same shape).
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub sex: String,
}

impl User {
    /// Build a new user with a fresh id.
    pub fn new(profile: UserProfile) -> Self {
        Self::with_id(Uuid::new_v4(), profile)
    }

    pub fn with_id(id: Uuid, profile: UserProfile) -> Self {
        Self {
            id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            birth_date: profile.birth_date,
            sex: profile.sex,
        }
    }
}
