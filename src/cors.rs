use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Exact match against the configured list, ignoring one trailing `/`.
pub fn origin_allowed(origin: &str, allowed: &[String]) -> bool {
    let origin = origin.trim().trim_end_matches('/');
    !origin.is_empty() && allowed.iter().any(|a| a == origin)
}

pub fn cors_layer(allowed: &[String]) -> CorsLayer {
    let allowed: Arc<[String]> = allowed.into();
    if allowed.is_empty() {
        tracing::warn!("CORS: no origins configured, cross-origin requests will be refused");
    } else {
        tracing::info!("CORS: allowing {} origin(s)", allowed.len());
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|o| origin_allowed(o, &allowed))
                .unwrap_or(false)
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> Vec<String> {
        vec![
            "https://setu.example.com".to_string(),
            "http://localhost:5173".to_string(),
        ]
    }

    #[test]
    fn listed_origins_pass() {
        assert!(origin_allowed("https://setu.example.com", &list()));
        assert!(origin_allowed("http://localhost:5173/", &list()));
    }

    #[test]
    fn unlisted_origins_fail() {
        assert!(!origin_allowed("https://evil.example.com", &list()));
        assert!(!origin_allowed("https://setu.example.com.evil.io", &list()));
        assert!(!origin_allowed("http://setu.example.com", &list()));
        assert!(!origin_allowed("", &list()));
        assert!(!origin_allowed("null", &list()));
    }

    #[test]
    fn empty_list_denies_everything() {
        assert!(!origin_allowed("http://localhost:5173", &[]));
    }
}
