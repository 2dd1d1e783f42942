//! User service: local accounts and bearer tokens.

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use regex::Regex;
use sea_orm::Set;
use serde::Deserialize;
use sinmungo_common::{AppError, AppResult, IdGenerator, config::AuthConfig};
use sinmungo_db::{entities::user, repositories::UserRepository};
use validator::{Validate, ValidationError};

#[allow(clippy::unwrap_used)]
static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(ValidationError::new("username_chars")
            .with_message("username may only contain letters, digits and '_'".into()))
    }
}

/// Input for creating an account.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupInput {
    #[validate(length(min = 1, max = 64), custom(function = "validate_username"))]
    pub username: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(length(max = 64))]
    pub nickname: Option<String>,
}

/// Credentials for signing in.
#[derive(Debug, Deserialize)]
pub struct SigninInput {
    pub username: String,
    pub password: String,
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    auth: AuthConfig,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository, auth: AuthConfig) -> Self {
        Self {
            user_repo,
            auth,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a new account with a fresh token.
    pub async fn signup(&self, input: SignupInput) -> AppResult<user::Model> {
        input.validate()?;

        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let password_hash = hash_password(&input.password)?;
        let is_admin = self.auth.is_admin_username(&input.username);
        let nickname = input
            .nickname
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username.clone()),
            username_lower: Set(input.username.to_lowercase()),
            nickname: Set(nickname),
            token: Set(Some(self.id_gen.generate_token())),
            password_hash: Set(password_hash),
            is_admin: Set(is_admin),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };

        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, username = %user.username, is_admin, "User signed up");
        Ok(user)
    }

    /// Check credentials and return the user with a usable token.
    pub async fn signin(&self, input: SigninInput) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        let is_admin = self.auth.is_admin_username(&user.username);
        if user.token.is_some() && user.is_admin == is_admin {
            return Ok(user);
        }

        let token = user
            .token
            .clone()
            .unwrap_or_else(|| self.id_gen.generate_token());
        let mut active: user::ActiveModel = user.into();
        active.token = Set(Some(token));
        active.is_admin = Set(is_admin);
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        self.user_repo.update(active).await
    }

    /// Resolve a bearer token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Replace the user's token, invalidating the old one.
    pub async fn regenerate_token(&self, user: &user::Model) -> AppResult<String> {
        let token = self.id_gen.generate_token();
        let mut active: user::ActiveModel = user.clone().into();
        active.token = Set(Some(token.clone()));
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        self.user_repo.update(active).await?;
        Ok(token)
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn auth(admins: &[&str]) -> AuthConfig {
        AuthConfig {
            admin_usernames: admins.iter().map(ToString::to_string).collect(),
        }
    }

    fn service(db: MockDatabase, admins: &[&str]) -> UserService {
        UserService::new(UserRepository::new(Arc::new(db.into_connection())), auth(admins))
    }

    fn signup_input(username: &str, password: &str) -> SignupInput {
        SignupInput {
            username: username.to_string(),
            password: password.to_string(),
            nickname: Some("시민".to_string()),
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_signup_validation() {
        assert!(signup_input("citizen_1", "password1").validate().is_ok());
        assert!(signup_input("", "password1").validate().is_err());
        assert!(signup_input("bad name", "password1").validate().is_err());
        assert!(signup_input("시민", "password1").validate().is_err());
        assert!(signup_input("citizen", "short").validate().is_err());
        assert!(signup_input(&"a".repeat(65), "password1").validate().is_err());
    }

    #[tokio::test]
    async fn test_signup_rejects_taken_username() {
        let existing = test_support::user("alice", false);
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[existing]]);

        let result = service(db, &[])
            .signup(signup_input("Alice", "password1"))
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_signup_invalid_input_skips_database() {
        let db = MockDatabase::new(DatabaseBackend::Postgres);
        let result = service(db, &[]).signup(signup_input("a b", "password1")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_signup_creates_admin_from_config() {
        let mut created = test_support::user("root", true);
        created.username = "root".to_string();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .append_query_results([[created]]);

        let user = service(db, &["root"])
            .signup(signup_input("root", "password1"))
            .await
            .unwrap();
        assert!(user.is_admin);
        assert!(user.token.is_some());
    }

    #[tokio::test]
    async fn test_signin_wrong_password() {
        let mut existing = test_support::user("alice", false);
        existing.password_hash = hash_password("password1").unwrap();
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[existing]]);

        let result = service(db, &[])
            .signin(SigninInput {
                username: "alice".to_string(),
                password: "password2".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_signin_returns_existing_token() {
        let mut existing = test_support::user("alice", false);
        existing.password_hash = hash_password("password1").unwrap();
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[existing]]);

        let user = service(db, &[])
            .signin(SigninInput {
                username: "alice".to_string(),
                password: "password1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(user.token.as_deref(), Some("alice-token"));
    }

    #[tokio::test]
    async fn test_authenticate_unknown_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()]);
        let result = service(db, &[]).authenticate_by_token("nope").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }
}
