use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::{AuthError, Claims, Role, TokenKind, UserSession};

/// JWT token service for creating and validating tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires_in: Duration,
    refresh_token_expires_in: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .field("access_token_expires_in", &self.access_token_expires_in)
            .field("refresh_token_expires_in", &self.refresh_token_expires_in)
            .finish()
    }
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expires_in: Duration::minutes(15),
            refresh_token_expires_in: Duration::days(30),
        }
    }

    fn create_token(
        &self,
        account_id: Uuid,
        username: &str,
        role: Role,
        kind: TokenKind,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let lifetime = match kind {
            TokenKind::Access => self.access_token_expires_in,
            TokenKind::Refresh => self.refresh_token_expires_in,
        };

        let claims = Claims {
            sub: account_id.to_string(),
            username: username.to_string(),
            role,
            exp: (now + lifetime).timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
            kind,
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    pub fn create_access_token(&self, account_id: Uuid, username: &str, role: Role) -> Result<String, AuthError> {
        self.create_token(account_id, username, role, TokenKind::Access)
    }

    pub fn create_refresh_token(&self, account_id: Uuid, username: &str, role: Role) -> Result<String, AuthError> {
        self.create_token(account_id, username, role, TokenKind::Refresh)
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    /// Session for an access token. Refresh tokens are rejected.
    pub fn extract_user_session(&self, token: &str) -> Result<UserSession, AuthError> {
        let claims = self.validate_token(token)?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::InvalidToken);
        }
        UserSession::from_claims(&claims).map_err(|_| AuthError::InvalidToken)
    }

    pub fn access_token_expires_in_seconds(&self) -> usize {
        self.access_token_expires_in.num_seconds() as usize
    }

    pub fn create_token_pair(
        &self,
        account_id: Uuid,
        username: &str,
        role: Role,
    ) -> Result<(String, String), AuthError> {
        let access_token = self.create_access_token(account_id, username, role)?;
        let refresh_token = self.create_refresh_token(account_id, username, role)?;
        Ok((access_token, refresh_token))
    }
}

/// Extract bearer token from authorization header
pub fn extract_bearer_token(auth_header: &str) -> Result<&str, AuthError> {
    match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::InvalidAuthHeaderFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_creation_and_validation() {
        let jwt_service = JwtService::new("test_secret");
        let account_id = Uuid::new_v4();

        let token = jwt_service
            .create_access_token(account_id, "laura.gomez", Role::Student)
            .unwrap();
        let claims = jwt_service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.username, "laura.gomez");
        assert_eq!(claims.role, Role::Student);
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(extract_bearer_token("Bearer test_token").unwrap(), "test_token");
        assert!(extract_bearer_token("Invalid header").is_err());
        assert!(extract_bearer_token("Bearer ").is_err());
        assert!(extract_bearer_token("bearer test_token").is_err());
    }

    #[test]
    fn test_user_session_extraction() {
        let jwt_service = JwtService::new("test_secret");
        let account_id = Uuid::new_v4();

        let token = jwt_service
            .create_access_token(account_id, "carlos.ruiz", Role::Employee)
            .unwrap();
        let session = jwt_service.extract_user_session(&token).unwrap();

        assert_eq!(session.account_id, account_id);
        assert_eq!(session.username, "carlos.ruiz");
        assert_eq!(session.role, Role::Employee);
    }

    #[test]
    fn refresh_tokens_do_not_open_sessions() {
        let jwt_service = JwtService::new("test_secret");
        let refresh = jwt_service
            .create_refresh_token(Uuid::new_v4(), "ana.lopez", Role::Admin)
            .unwrap();

        assert!(matches!(
            jwt_service.extract_user_session(&refresh),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_token_pair_creation() {
        let jwt_service = JwtService::new("test_secret");
        let (access_token, refresh_token) = jwt_service
            .create_token_pair(Uuid::new_v4(), "ana.lopez", Role::Admin)
            .unwrap();

        let access = jwt_service.validate_token(&access_token).unwrap();
        let refresh = jwt_service.validate_token(&refresh_token).unwrap();
        assert_ne!(access.jti, refresh.jti);
        assert_eq!(refresh.kind, TokenKind::Refresh);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let issuer = JwtService::new("secret-one");
        let verifier = JwtService::new("secret-two");
        let token = issuer
            .create_access_token(Uuid::new_v4(), "laura.gomez", Role::Student)
            .unwrap();

        assert!(matches!(verifier.validate_token(&token), Err(AuthError::InvalidToken)));
    }
}
