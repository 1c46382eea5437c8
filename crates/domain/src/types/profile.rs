//! Marketplace user profile
//!
//! Application-owned record keyed by the session subject.

use serde::{Deserialize, Serialize};

use crate::impl_domain_str_conversions;

/// Marketplace role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Manager,
    Contractor,
}

impl_domain_str_conversions!(UserRole {
    Manager => "manager",
    Contractor => "contractor",
});

/// Extended profile for an authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Same value as the owning session's `subject_id`
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub profile_completed: bool,
    #[serde(default)]
    pub onboarding_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Profile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim()).trim().to_string()
    }

    pub fn is_manager(&self) -> bool {
        self.role == UserRole::Manager
    }

    pub fn is_contractor(&self) -> bool {
        self.role == UserRole::Contractor
    }

    /// Whether this profile belongs to the given subject.
    pub fn belongs_to(&self, subject_id: &str) -> bool {
        self.id == subject_id
    }
}
