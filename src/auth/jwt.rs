use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use super::claims::Claims;
use crate::{
    config::JwtConfig,
    error::ApiError,
    state::AppState,
    users::repo_types::{RegisteredUser, UnregisteredUser},
};

/// Lifetime of a registered-subject token (`accessToken` cookie).
pub const REGISTERED_TTL: Duration = Duration::minutes(60);
/// Lifetime of an unregistered-subject token (`accessTokenRegistration` cookie).
pub const UNREGISTERED_TTL: Duration = Duration::minutes(30);

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }

    fn sign(&self, mut claims: Claims, now: OffsetDateTime, ttl: Duration) -> anyhow::Result<String> {
        claims.iat = now.unix_timestamp() as usize;
        claims.exp = (now + ttl).unix_timestamp() as usize;
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(id = %claims.id, registered = claims.username.is_some(), "jwt signed");
        Ok(token)
    }

    fn blank_claims(&self, id: uuid::Uuid) -> Claims {
        Claims {
            id,
            username: None,
            email: None,
            iat: 0,
            exp: 0,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        }
    }

    pub fn issue_registered_token(&self, user: &RegisteredUser) -> anyhow::Result<String> {
        self.issue_registered_token_at(user, OffsetDateTime::now_utc())
    }

    pub fn issue_registered_token_at(
        &self,
        user: &RegisteredUser,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let mut claims = self.blank_claims(user.id);
        claims.username = Some(user.username.clone());
        self.sign(claims, now, REGISTERED_TTL)
    }

    pub fn issue_unregistered_token(&self, user: &UnregisteredUser) -> anyhow::Result<String> {
        self.issue_unregistered_token_at(user, OffsetDateTime::now_utc())
    }

    pub fn issue_unregistered_token_at(
        &self,
        user: &UnregisteredUser,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let mut claims = self.blank_claims(user.id);
        claims.email = Some(user.email.clone());
        self.sign(claims, now, UNREGISTERED_TTL)
    }

    /// Checks signature, issuer, audience and expiry (no leeway).
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => {
                debug!("jwt expired");
                ApiError::SessionExpired
            }
            other => {
                warn!(reason = ?other, "jwt rejected");
                ApiError::InvalidCredential
            }
        })?;
        debug!(id = %data.claims.id, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::claims::Subject;
    use crate::users::repo_types::{NewRegisteredUser, UnregisteredUser};
    use sqlx::types::Json;
    use uuid::Uuid;

    pub(crate) fn make_keys(secret: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
        })
    }

    pub(crate) fn registered(username: &str, email: &str) -> RegisteredUser {
        let n = NewRegisteredUser::basic(username, email, "Test");
        RegisteredUser {
            id: Uuid::new_v4(),
            username: n.username,
            email: n.email,
            name: n.name,
            password_hash: None,
            picture: None,
            linkedin_link: None,
            github_link: None,
            portfolio_link: None,
            skills_proficient_at: vec![],
            skills_to_learn: vec![],
            education: Json(vec![]),
            bio: None,
            projects: Json(vec![]),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub(crate) fn unregistered(email: &str) -> UnregisteredUser {
        UnregisteredUser {
            id: Uuid::new_v4(),
            email: email.into(),
            name: Some("Provisional".into()),
            username: None,
            picture: None,
            linkedin_link: None,
            github_link: None,
            portfolio_link: None,
            skills_proficient_at: vec![],
            skills_to_learn: vec![],
            education: Json(vec![]),
            bio: None,
            projects: Json(vec![]),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn registered_token_roundtrip() {
        let keys = make_keys("dev-secret");
        let user = registered("alice", "a@x.com");
        let token = keys.issue_registered_token(&user).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(
            claims.subject(),
            Some(Subject::Registered {
                id: user.id,
                username: "alice".into()
            })
        );
        assert!(claims.email.is_none());
        assert_eq!(claims.exp - claims.iat, 60 * 60);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[test]
    fn unregistered_token_has_email_and_half_hour_ttl() {
        let keys = make_keys("dev-secret");
        let user = unregistered("b@y.com");
        let token = keys.issue_unregistered_token(&user).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(
            claims.subject(),
            Some(Subject::Unregistered {
                id: user.id,
                email: "b@y.com".into()
            })
        );
        assert!(claims.username.is_none());
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn expired_token_is_session_expired() {
        let keys = make_keys("dev-secret");
        let user = registered("alice", "a@x.com");
        let issued = OffsetDateTime::now_utc() - Duration::minutes(61);
        let token = keys.issue_registered_token_at(&user, issued).expect("sign");
        assert!(matches!(keys.verify(&token), Err(ApiError::SessionExpired)));
    }

    #[test]
    fn unregistered_token_expires_after_thirty_minutes() {
        let keys = make_keys("dev-secret");
        let user = unregistered("b@y.com");
        let issued = OffsetDateTime::now_utc() - Duration::minutes(31);
        let token = keys.issue_unregistered_token_at(&user, issued).expect("sign");
        assert!(matches!(keys.verify(&token), Err(ApiError::SessionExpired)));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = make_keys("one")
            .issue_registered_token(&registered("alice", "a@x.com"))
            .expect("sign");
        assert!(matches!(
            make_keys("two").verify(&token),
            Err(ApiError::InvalidCredential)
        ));
    }

    #[test]
    fn garbage_is_invalid() {
        let keys = make_keys("dev-secret");
        assert!(matches!(
            keys.verify("not.a.jwt"),
            Err(ApiError::InvalidCredential)
        ));
    }

    #[test]
    fn wrong_audience_is_invalid() {
        let good = make_keys("same");
        let mut bad = make_keys("same");
        bad.audience = "someone-else".into();
        let token = good
            .issue_registered_token(&registered("alice", "a@x.com"))
            .expect("sign");
        assert!(matches!(bad.verify(&token), Err(ApiError::InvalidCredential)));
    }
}
