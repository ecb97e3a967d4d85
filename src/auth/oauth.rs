use anyhow::Context;
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::config::GoogleConfig;

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const STATE_LEN: usize = 32;

/// Profile handed over by the identity provider after a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthProfile {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

/// Fresh anti-forgery value for one login round trip.
pub fn new_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Where to send the browser to start the login; `state` comes back on the callback.
    fn authorize_url(&self, state: &str) -> anyhow::Result<String>;
    /// Trades the callback's authorization code for the user's profile.
    async fn exchange_code(&self, code: &str) -> anyhow::Result<OAuthProfile>;
}

#[derive(Clone)]
pub struct GoogleOAuth {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GoogleOAuth {
    pub fn new(cfg: &GoogleConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            redirect_url: cfg.redirect_url.clone(),
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuth {
    fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
        let url = Url::parse_with_params(
            GOOGLE_AUTHORIZE_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid profile email"),
                ("state", state),
            ],
        )
        .context("build google authorize url")?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> anyhow::Result<OAuthProfile> {
        let token: TokenResponse = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("google token request")?
            .error_for_status()
            .context("google token exchange rejected")?
            .json()
            .await
            .context("decode google token response")?;

        let profile: OAuthProfile = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("google userinfo request")?
            .error_for_status()
            .context("google userinfo rejected")?
            .json()
            .await
            .context("decode google profile")?;

        debug!(email = %profile.email, "google profile fetched");
        Ok(profile)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Provider that accepts one fixed code.
    pub(crate) struct StaticOAuth {
        pub code: String,
        pub profile: OAuthProfile,
    }

    #[async_trait]
    impl OAuthProvider for StaticOAuth {
        fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
            Ok(format!("https://provider.test/authorize?state={state}"))
        }

        async fn exchange_code(&self, code: &str) -> anyhow::Result<OAuthProfile> {
            anyhow::ensure!(code == self.code, "unknown code");
            Ok(self.profile.clone())
        }
    }

    #[test]
    fn google_authorize_url_carries_client_and_redirect() {
        let google = GoogleOAuth::new(&GoogleConfig {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            redirect_url: "http://localhost:8080/auth/google/callback".into(),
        });
        let url = Url::parse(&google.authorize_url("abc123").unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "cid");
        assert_eq!(params["redirect_uri"], "http://localhost:8080/auth/google/callback");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["state"], "abc123");
        assert!(!params.contains_key("client_secret"));
    }

    #[test]
    fn states_are_long_and_unpredictable() {
        let a = new_state();
        let b = new_state();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn userinfo_without_verification_flag_is_unverified() {
        let profile: OAuthProfile =
            serde_json::from_str(r#"{"email":"b@y.com","name":"Bea"}"#).unwrap();
        assert!(!profile.email_verified);
        let profile: OAuthProfile =
            serde_json::from_str(r#"{"email":"b@y.com","name":"Bea","email_verified":true}"#).unwrap();
        assert!(profile.email_verified);
    }
}
