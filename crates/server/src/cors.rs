// CORS for the file API and MCP endpoint.
//
// Without configured origins no CORS layer is installed and browsers are
// limited to same-origin calls.

use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::api::error::REQUEST_ID_HEADER;

/// Build a [`CorsLayer`] for `origins`; `None` when the list is empty.
///
/// A single `*` allows any origin. Otherwise exactly the listed origins
/// are allowed.
pub fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(REQUEST_ID_HEADER)])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .max_age(Duration::from_secs(3600));

    if origins.iter().any(|origin| origin == "*") {
        return Some(base.allow_origin(AllowOrigin::any()));
    }
    Some(base.allow_origin(parse_origins(origins)))
}

fn parse_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request, response::IntoResponse, routing::get, Router};
    use tower::ServiceExt;

    use super::*;

    async fn ok_handler() -> impl IntoResponse {
        "ok"
    }

    fn test_app(origins: &[&str]) -> Router {
        let origins: Vec<String> = origins.iter().map(|o| o.to_string()).collect();
        let router = Router::new().route("/test", get(ok_handler));
        match cors_layer(&origins) {
            Some(layer) => router.layer(layer),
            None => router,
        }
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/test")
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn no_origins_means_no_layer() {
        assert!(cors_layer(&[]).is_none());
    }

    #[tokio::test]
    async fn preflight_returns_cors_headers_for_allowed_origin() {
        let app = test_app(&["http://localhost:5173"]);
        let response = app.oneshot(preflight("http://localhost:5173")).await.unwrap();

        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(response.headers().get("access-control-max-age").unwrap(), "3600");
    }

    #[tokio::test]
    async fn preflight_rejects_unknown_origin() {
        let app = test_app(&["http://localhost:5173"]);
        let response = app.oneshot(preflight("https://evil.example.com")).await.unwrap();

        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn wildcard_allows_any_origin() {
        let app = test_app(&["*"]);
        let response = app.oneshot(preflight("https://anything.example.com")).await.unwrap();

        assert_eq!(response.headers().get("access-control-allow-origin").unwrap(), "*");
    }

    #[test]
    fn parse_origins_skips_blank_entries() {
        let origins = parse_origins(&["  https://a.com ".into(), "".into(), "https://b.com".into()]);
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "https://a.com");
    }
}
