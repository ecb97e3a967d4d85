use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use super::jwt::{REGISTERED_TTL, UNREGISTERED_TTL};
use crate::config::Environment;

/// Carries a registered-subject token.
pub const ACCESS_COOKIE: &str = "accessToken";
/// Carries an unregistered-subject token during onboarding.
pub const REGISTRATION_COOKIE: &str = "accessTokenRegistration";
/// Holds the OAuth `state` between `/auth/google` and its callback.
pub const OAUTH_STATE_COOKIE: &str = "oauthState";

pub const OAUTH_STATE_TTL: Duration = Duration::minutes(10);
const OAUTH_STATE_PATH: &str = "/auth/google";

fn session_cookie(name: &'static str, token: String, ttl: Duration, env: Environment) -> Cookie<'static> {
    let production = env.is_production();
    Cookie::build((name, token))
        .path("/")
        .http_only(true)
        .secure(production)
        .same_site(if production { SameSite::None } else { SameSite::Lax })
        .max_age(ttl)
        .build()
}

pub fn access_cookie(token: String, env: Environment) -> Cookie<'static> {
    session_cookie(ACCESS_COOKIE, token, REGISTERED_TTL, env)
}

pub fn registration_cookie(token: String, env: Environment) -> Cookie<'static> {
    session_cookie(REGISTRATION_COOKIE, token, UNREGISTERED_TTL, env)
}

pub fn clear_registration(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(REGISTRATION_COOKIE).path("/"))
}

/// Lax even in production: the callback arrives as a top-level redirect.
pub fn oauth_state_cookie(state: String, env: Environment) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, state))
        .path(OAUTH_STATE_PATH)
        .http_only(true)
        .secure(env.is_production())
        .same_site(SameSite::Lax)
        .max_age(OAUTH_STATE_TTL)
        .build()
}

pub fn clear_oauth_state(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(OAUTH_STATE_COOKIE).path(OAUTH_STATE_PATH))
}

pub fn clear_all(jar: CookieJar) -> CookieJar {
    clear_registration(jar).remove(Cookie::build(ACCESS_COOKIE).path("/"))
}
