use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::Role;

/// Row of the institutional `users` table. Read-only.
#[derive(Debug, Clone, FromRow)]
pub struct InstitutionalUser {
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub student_id: Option<String>,
    pub employee_id: Option<String>,
    pub is_active: bool,
}

impl InstitutionalUser {
    pub fn role(&self) -> Role {
        Role::from_institutional(&self.role)
    }
}

/// Identity resolved from the institutional directory. Every field other
/// than `username` is optional: a missing record yields an empty profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IdentityProfile {
    pub username: String,
    pub role: Option<Role>,
    pub student_id: Option<String>,
    pub employee_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub campus: Option<String>,
    pub faculty: Option<String>,
}

impl IdentityProfile {
    pub fn empty(username: &str) -> Self {
        Self {
            username: username.to_string(),
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            _ => self.username.clone(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct PersonRow {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Instructor {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub employee_type: String,
    pub contract_type: String,
    pub faculty: Option<String>,
}

impl Instructor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InstructorDetail {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub employee_type: String,
    pub faculty: String,
    pub campus: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_username() {
        let mut profile = IdentityProfile::empty("laura.gomez");
        assert_eq!(profile.display_name(), "laura.gomez");

        profile.first_name = Some("Laura".to_string());
        assert_eq!(profile.display_name(), "Laura");

        profile.last_name = Some("Gomez".to_string());
        assert_eq!(profile.display_name(), "Laura Gomez");
    }
}
