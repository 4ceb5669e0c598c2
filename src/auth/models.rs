use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account roles. Mirrors the institutional STUDENT / EMPLOYEE / ADMIN roles.
///
/// Ordering matters: a higher role includes every capability of a lower one,
/// and logins never move an account to a lower role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(type_name = "account_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Employee,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Employee => "employee",
            Role::Admin => "admin",
        }
    }

    /// Parse an institutional role string. Anything unrecognised is treated
    /// as a student, the least privileged role.
    pub fn from_institutional(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Role::Admin,
            "EMPLOYEE" => Role::Employee,
            _ => Role::Student,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "student" => Some(Role::Student),
            "employee" => Some(Role::Employee),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// The single place that decides whether an account may act as a trainer.
    pub fn is_trainer(&self) -> bool {
        matches!(self, Role::Employee | Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Role after a successful institutional login: never lower than before.
    pub fn merged_with(self, institutional: Role) -> Role {
        self.max(institutional)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // account id
    pub username: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,      // token id, used for revocation
    #[serde(default)]
    pub kind: TokenKind,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[default]
    Access,
    Refresh,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: usize,
    pub account: AccountInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountInfo {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Authenticated caller, placed in request extensions by the JWT middleware.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub account_id: Uuid,
    pub username: String,
    pub role: Role,
    pub jti: String,
}

impl UserSession {
    pub fn from_claims(claims: &Claims) -> Result<Self, uuid::Error> {
        Ok(Self {
            account_id: Uuid::parse_str(&claims.sub)?,
            username: claims.username.clone(),
            role: claims.role,
            jti: claims.jti.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn institutional_roles_parse_case_insensitively() {
        assert_eq!(Role::from_institutional("admin"), Role::Admin);
        assert_eq!(Role::from_institutional(" Employee "), Role::Employee);
        assert_eq!(Role::from_institutional("STUDENT"), Role::Student);
        assert_eq!(Role::from_institutional("visitor"), Role::Student);
        assert_eq!(Role::from_institutional(""), Role::Student);
    }

    #[test]
    fn trainer_capability_is_derived_from_role_only() {
        assert!(!Role::Student.is_trainer());
        assert!(Role::Employee.is_trainer());
        assert!(Role::Admin.is_trainer());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Employee.is_admin());
    }

    #[test]
    fn login_never_downgrades_role() {
        assert_eq!(Role::Admin.merged_with(Role::Student), Role::Admin);
        assert_eq!(Role::Employee.merged_with(Role::Student), Role::Employee);
        assert_eq!(Role::Student.merged_with(Role::Employee), Role::Employee);
    }

    #[test]
    fn role_round_trips_through_its_name() {
        for role in [Role::Student, Role::Employee, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("coach"), None);
    }
}
