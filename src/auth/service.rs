use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_institutional_password, verify_password};
use crate::auth::{
    AccountInfo, AuthError, AuthResponse, JwtService, LoginRequest, MessageResponse,
    RefreshTokenRequest, Role, TokenKind, TokenResponse, UserSession,
};
use crate::documents::{ActivityRecord, ClientInfo, Outbox, WriteMode};
use crate::models::Account;
use crate::services::IdentityService;

const ACCOUNT_COLUMNS: &str =
    "id, username, email, password_hash, role, is_active, last_login_at, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct AuthService {
    jwt_service: JwtService,
    db: PgPool,
    identity: IdentityService,
    outbox: Outbox,
    email_domain: String,
}

impl AuthService {
    pub fn new(
        db: PgPool,
        jwt_secret: &str,
        identity: IdentityService,
        outbox: Outbox,
        email_domain: &str,
    ) -> Self {
        Self {
            jwt_service: JwtService::new(jwt_secret),
            db,
            identity,
            outbox,
            email_domain: email_domain.to_string(),
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Institutional credentials first, then a local bcrypt account. Every
    /// failure looks the same to the caller.
    #[tracing::instrument(skip(self, request, client), fields(username = %request.username))]
    pub async fn login(&self, request: LoginRequest, client: ClientInfo) -> Result<AuthResponse, AuthError> {
        let username = request.username.trim();
        if username.is_empty() || request.password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let institutional = match self.identity.find_active_user(username).await {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "institutional directory unavailable, trying local accounts");
                None
            }
        };

        let verified = institutional
            .filter(|user| verify_institutional_password(&user.password_hash, &request.password));

        let mut tx = self.db.begin().await?;

        let (account, source) = match verified {
            Some(user) => {
                let profile = self.identity.resolve_profile(username).await;
                let email = profile
                    .email
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| format!("{}@{}", username, self.email_domain));
                let account = upsert_institutional_account(&mut tx, username, &email, user.role()).await?;
                (account, "institutional")
            }
            None => {
                let account = sqlx::query_as::<_, Account>(&format!(
                    "SELECT {} FROM accounts WHERE username = $1 AND is_active",
                    ACCOUNT_COLUMNS
                ))
                .bind(username)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AuthError::InvalidCredentials)?;

                let matches = account
                    .password_hash
                    .as_deref()
                    .map_or(false, |hash| verify_password(&request.password, hash));
                if !matches {
                    return Err(AuthError::InvalidCredentials);
                }

                sqlx::query("UPDATE accounts SET last_login_at = NOW() WHERE id = $1")
                    .bind(account.id)
                    .execute(&mut *tx)
                    .await?;
                (account, "local")
            }
        };

        let (access_token, refresh_token) =
            self.jwt_service
                .create_token_pair(account.id, &account.username, account.role)?;
        self.store_refresh_token(&mut tx, account.id, &refresh_token).await?;

        let activity = ActivityRecord::new(account.id, "login")
            .metadata(json!({ "source": source, "role": account.role }))
            .client(client)
            .into_document();
        self.outbox.enqueue(&mut tx, &activity, WriteMode::Insert).await?;

        tx.commit().await?;
        self.outbox.nudge();

        info!(account_id = %account.id, role = %account.role, source, "login succeeded");

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
            account: account_info(&account),
        })
    }

    /// New access token for a stored, unrevoked refresh token. The role is
    /// read again so promotions take effect without a new login.
    #[tracing::instrument(skip(self, request))]
    pub async fn refresh_token(&self, request: RefreshTokenRequest) -> Result<TokenResponse, AuthError> {
        let claims = self.jwt_service.validate_token(&request.refresh_token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::InvalidToken);
        }

        let account_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        if !self.is_refresh_token_valid(account_id, &request.refresh_token).await? {
            return Err(AuthError::InvalidToken);
        }

        let account = self
            .find_account(account_id)
            .await?
            .filter(|a| a.is_active)
            .ok_or(AuthError::InvalidToken)?;

        let access_token =
            self.jwt_service
                .create_access_token(account.id, &account.username, account.role)?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
        })
    }

    /// Blacklist the access token and revoke every refresh token of the account.
    #[tracing::instrument(skip(self, token))]
    pub async fn logout(&self, token: &str) -> Result<MessageResponse, AuthError> {
        let claims = self.jwt_service.validate_token(token)?;
        let account_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp as i64, 0).ok_or(AuthError::InvalidToken)?;

        let mut tx = self.db.begin().await?;
        sqlx::query(
            "INSERT INTO token_blacklist (jti, expires_at) VALUES ($1, $2)
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(&claims.jti)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE account_id = $1 AND NOT revoked")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        let activity = ActivityRecord::new(account_id, "logout").into_document();
        self.outbox.enqueue(&mut tx, &activity, WriteMode::Insert).await?;
        tx.commit().await?;
        self.outbox.nudge();

        Ok(MessageResponse {
            message: "Successfully logged out".to_string(),
        })
    }

    pub async fn is_token_blacklisted(&self, jti: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("SELECT 1 FROM token_blacklist WHERE jti = $1 AND expires_at > NOW()")
            .bind(jti)
            .fetch_optional(&self.db)
            .await?;

        Ok(result.is_some())
    }

    pub async fn validate_session(&self, token: &str) -> Result<UserSession, AuthError> {
        let session = self.jwt_service.extract_user_session(token)?;

        if self.is_token_blacklisted(&session.jti).await? {
            return Err(AuthError::InvalidToken);
        }

        Ok(session)
    }

    pub async fn me(&self, account_id: Uuid) -> Result<AccountInfo, AuthError> {
        let account = self.find_account(account_id).await?.ok_or(AuthError::AccountNotFound)?;
        Ok(account_info(&account))
    }

    /// Local account with a bcrypt password, for bootstrap and accounts that
    /// do not exist in the institutional directory.
    pub async fn create_local_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Account, AuthError> {
        let password_hash =
            hash_password(password).map_err(|e| AuthError::PasswordValidation(e.to_string()))?;

        let account = sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (id, username, email, password_hash, role)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (username) DO NOTHING
             RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(username.trim())
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AuthError::UsernameTaken)?;

        info!(account_id = %account.id, role = %role, "local account created");
        Ok(account)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_role(&self, account_id: Uuid, role: Role) -> Result<Account, AuthError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "UPDATE accounts SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .bind(role)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AuthError::AccountNotFound)?;

        info!(account_id = %account.id, role = %role, "account role changed");
        Ok(account)
    }

    async fn find_account(&self, account_id: Uuid) -> Result<Option<Account>, AuthError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    async fn store_refresh_token(
        &self,
        conn: &mut PgConnection,
        account_id: Uuid,
        refresh_token: &str,
    ) -> Result<(), AuthError> {
        let claims = self.jwt_service.validate_token(refresh_token)?;
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp as i64, 0).ok_or(AuthError::InvalidToken)?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, account_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(account_id)
        .bind(format!("{:x}", md5::compute(refresh_token)))
        .bind(expires_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    async fn is_refresh_token_valid(&self, account_id: Uuid, refresh_token: &str) -> Result<bool, AuthError> {
        let token_hash = format!("{:x}", md5::compute(refresh_token));

        let result = sqlx::query(
            "SELECT 1 FROM refresh_tokens
             WHERE account_id = $1 AND token_hash = $2 AND expires_at > NOW() AND NOT revoked",
        )
        .bind(account_id)
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await?;

        Ok(result.is_some())
    }
}

/// Create or refresh the local account of an institutional user. The stored
/// role only ever goes up.
async fn upsert_institutional_account(
    conn: &mut PgConnection,
    username: &str,
    email: &str,
    role: Role,
) -> Result<Account, AuthError> {
    let account = sqlx::query_as::<_, Account>(&format!(
        "INSERT INTO accounts (id, username, email, role, is_active, last_login_at)
         VALUES ($1, $2, $3, $4, TRUE, NOW())
         ON CONFLICT (username) DO UPDATE
         SET role = GREATEST(accounts.role, EXCLUDED.role),
             email = CASE WHEN accounts.email = '' THEN EXCLUDED.email ELSE accounts.email END,
             is_active = TRUE,
             last_login_at = NOW(),
             updated_at = NOW()
         RETURNING {}",
        ACCOUNT_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(role)
    .fetch_one(conn)
    .await?;

    Ok(account)
}

fn account_info(account: &Account) -> AccountInfo {
    AccountInfo {
        id: account.id,
        username: account.username.clone(),
        email: account.email.clone(),
        role: account.role,
        created_at: account.created_at,
    }
}
