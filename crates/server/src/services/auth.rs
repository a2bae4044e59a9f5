//! Credential checks and session tokens.
//!
//! The [`Authenticator`] is the only component that turns an email/password
//! pair into an [`Identity`]; [`SessionKeys`] is the only component that turns
//! an identity into a token and back.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::DemoAccount,
    db::{self, models::User, Database},
    error::{AppError, Result},
};

pub const SESSION_TTL_DAYS: i64 = 30;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Who is calling. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.sub.clone(),
            email: self.email.clone(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp as i64, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<Session> {
        let now = Utc::now();
        let expires_at = now + Duration::days(SESSION_TTL_DAYS);

        let claims = Claims {
            sub: identity.id.clone(),
            email: identity.email.clone(),
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {e}")))?;

        Ok(Session { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected session token");
                AppError::Unauthenticated
            })
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AppError::Internal("Failed to hash password".to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// `local@domain.tld`: no whitespace, one `@`, and a dot inside the domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    // At least one dot with something on both sides of it
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

#[derive(Clone)]
pub struct Authenticator {
    db: Database,
    sessions: SessionKeys,
    demo: Option<DemoAccount>,
}

impl Authenticator {
    pub fn new(db: Database, sessions: SessionKeys, demo: Option<DemoAccount>) -> Self {
        Self { db, sessions, demo }
    }

    pub fn sessions(&self) -> &SessionKeys {
        &self.sessions
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Identity> {
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Please provide both email and password".to_string(),
            ));
        }
        if !is_valid_email(email) {
            return Err(AppError::Validation(
                "Please provide a valid email address".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }

        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.db.pool)
            .await?;
        if existing > 0 {
            return Err(AppError::DuplicateAccount);
        }

        let password_hash = hash_password(password)?;
        let user_id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&user_id)
        .bind(email)
        .bind(&password_hash)
        .bind(db::timestamp())
        .execute(&self.db.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::DuplicateAccount
            }
            other => AppError::Database(other),
        })?;

        tracing::info!(user_id = %user_id, "registered account");

        Ok(Identity {
            id: user_id,
            email: email.to_string(),
        })
    }

    /// Every failure is the same `InvalidCredentials`, whichever check failed.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Identity> {
        if let Some(demo) = &self.demo {
            if email == demo.email && password == demo.password {
                tracing::info!(user_id = %demo.id, "demo account signed in");
                return Ok(Identity {
                    id: demo.id.clone(),
                    email: demo.email.clone(),
                });
            }
        }

        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.db.pool)
        .await?;

        let Some(user) = user else {
            tracing::warn!("sign-in for unknown account");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "sign-in with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "signed in");
        Ok(Identity {
            id: user.id,
            email: user.email,
        })
    }

    pub fn issue_session(&self, identity: &Identity) -> Result<Session> {
        self.sessions.issue(identity)
    }

    /// Gives the demo identity a users row so projects it creates have an owner.
    /// Fails when the demo email already belongs to another account.
    pub async fn ensure_demo_account(&self) -> Result<()> {
        let Some(demo) = &self.demo else {
            return Ok(());
        };

        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(&demo.id)
            .fetch_one(&self.db.pool)
            .await?;
        if exists > 0 {
            return Ok(());
        }

        let password_hash = hash_password(&demo.password)?;
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO users (id, email, name, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&demo.id)
        .bind(&demo.email)
        .bind(&demo.name)
        .bind(&password_hash)
        .bind(db::timestamp())
        .execute(&self.db.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(AppError::Internal(format!(
                "demo email {} already belongs to another account; set DEMO_ACCOUNT=off or free the address",
                demo.email
            )));
        }

        tracing::info!(user_id = %demo.id, "seeded demo account");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn authenticator(demo: Option<DemoAccount>) -> Authenticator {
        let db = Database::in_memory().await.unwrap();
        Authenticator::new(db, SessionKeys::new("test-secret"), demo)
    }

    #[test]
    fn email_structure() {
        assert!(is_valid_email("demo2@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("demo2example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("demo@example"));
        assert!(!is_valid_email("demo@.com"));
        assert!(!is_valid_email("demo@example."));
        assert!(!is_valid_email("de mo@example.com"));
        assert!(!is_valid_email("a@b@example.com"));
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("demo123").unwrap();
        assert_ne!(hash, "demo123");
        assert!(verify_password("demo123", &hash).unwrap());
        assert!(!verify_password("demo124", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn session_token_carries_identity_for_thirty_days() {
        let keys = SessionKeys::new("test-secret");
        let identity = Identity {
            id: "u1".into(),
            email: "u1@example.com".into(),
        };
        let session = keys.issue(&identity).unwrap();
        let claims = keys.verify(&session.token).unwrap();

        assert_eq!(claims.identity(), identity);
        assert_eq!(claims.exp - claims.iat, (SESSION_TTL_DAYS * 24 * 60 * 60) as usize);
        assert_eq!(claims.expires_at().timestamp(), session.expires_at.timestamp());
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let identity = Identity {
            id: "u1".into(),
            email: "u1@example.com".into(),
        };
        let foreign = SessionKeys::new("other-secret").issue(&identity).unwrap();
        let result = SessionKeys::new("test-secret").verify(&foreign.token);
        assert!(matches!(result, Err(AppError::Unauthenticated)));
        assert!(matches!(
            SessionKeys::new("test-secret").verify("not-a-token"),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = SessionKeys::new("test-secret");
        let past = (Utc::now() - Duration::days(1)).timestamp() as usize;
        let claims = Claims {
            sub: "u1".into(),
            email: "u1@example.com".into(),
            iat: past - 10,
            exp: past,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-secret"))
            .unwrap();
        assert!(matches!(keys.verify(&token), Err(AppError::Unauthenticated)));
    }

    #[tokio::test]
    async fn register_then_duplicate() {
        let auth = authenticator(None).await;
        let identity = auth.register("demo2@example.com", "demo123").await.unwrap();
        assert_eq!(identity.email, "demo2@example.com");

        let again = auth.register("demo2@example.com", "another1").await;
        assert!(matches!(again, Err(AppError::DuplicateAccount)));
    }

    #[tokio::test]
    async fn emails_are_case_sensitive() {
        let auth = authenticator(None).await;
        auth.register("Case@example.com", "demo123").await.unwrap();
        assert!(auth.register("case@example.com", "demo123").await.is_ok());
    }

    #[tokio::test]
    async fn registration_validation() {
        let auth = authenticator(None).await;
        for (email, password) in [
            ("", "demo123"),
            ("demo@example.com", ""),
            ("not-an-email", "demo123"),
            ("demo@example.com", "12345"),
        ] {
            let result = auth.register(email, password).await;
            assert!(matches!(result, Err(AppError::Validation(_))), "{email:?}/{password:?}");
        }
        assert!(auth.register("demo@example.com", "123456").await.is_ok());
    }

    #[tokio::test]
    async fn authenticate_checks_stored_hash() {
        let auth = authenticator(None).await;
        let registered = auth.register("demo2@example.com", "demo123").await.unwrap();

        let identity = auth.authenticate("demo2@example.com", "demo123").await.unwrap();
        assert_eq!(identity, registered);

        assert!(matches!(
            auth.authenticate("demo2@example.com", "wrong!").await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.authenticate("nobody@example.com", "demo123").await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn demo_account_bypasses_store() {
        let demo = DemoAccount::default();
        let auth = authenticator(Some(demo.clone())).await;

        let identity = auth.authenticate(&demo.email, &demo.password).await.unwrap();
        assert_eq!(identity.id, demo.id);

        assert!(matches!(
            auth.authenticate(&demo.email, "wrong!").await,
            Err(AppError::InvalidCredentials)
        ));

        let disabled = authenticator(None).await;
        assert!(disabled.authenticate(&demo.email, &demo.password).await.is_err());
    }

    #[tokio::test]
    async fn demo_seeding_refuses_a_taken_email() {
        let demo = DemoAccount::default();
        let without_demo = authenticator(None).await;
        let taken = without_demo.register(&demo.email, "someone1").await.unwrap();
        assert_ne!(taken.id, demo.id);

        let with_demo = Authenticator::new(
            without_demo.db.clone(),
            SessionKeys::new("test-secret"),
            Some(demo.clone()),
        );
        let result = with_demo.ensure_demo_account().await;
        assert!(matches!(result, Err(AppError::Internal(_))));

        let demo_rows = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(&demo.id)
            .fetch_one(&with_demo.db.pool)
            .await
            .unwrap();
        assert_eq!(demo_rows, 0);
    }

    #[tokio::test]
    async fn demo_account_is_seeded_once() {
        let demo = DemoAccount::default();
        let auth = authenticator(Some(demo.clone())).await;
        auth.ensure_demo_account().await.unwrap();
        auth.ensure_demo_account().await.unwrap();

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(&demo.id)
            .fetch_one(&auth.db.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        assert!(matches!(
            auth.register(&demo.email, "whatever1").await,
            Err(AppError::DuplicateAccount)
        ));
    }
}
