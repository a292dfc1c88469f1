//! Directory HTTP API
//!
//! - `POST /`  heartbeat ingest, body `{"cluster","url","ca"}`
//! - `GET /`   live member listing (evicts stale members as a side effect)
//! - `GET /livez`, `GET /readyz`  probes, no auth
//!
//! Both directory routes require the shared token in the `Authorization`
//! header, as `Bearer <token>` or `Token <token>`.

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::member::Member;
use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    token: Arc<str>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, token: &str) -> Self {
        Self {
            registry,
            token: Arc::from(token),
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };

        let Some((scheme, presented)) = value.trim().split_once(' ') else {
            return false;
        };

        let scheme_ok =
            scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token");
        scheme_ok && bool::from(presented.trim().as_bytes().ct_eq(self.token.as_bytes()))
    }
}

pub struct ApiError(pub StatusCode, pub String);

impl ApiError {
    pub fn unauthorized() -> Self {
        ApiError(StatusCode::UNAUTHORIZED, "missing or invalid token".to_string())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    let directory = Router::new()
        .route("/", get(list_members).post(register_member))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/livez", get(probe))
        .route("/readyz", get(probe))
        .merge(directory)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn probe() -> StatusCode {
    StatusCode::OK
}

async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.authorized(request.headers()) {
        next.run(request).await
    } else {
        warn!(method = %request.method(), "Rejected request without a valid token");
        ApiError::unauthorized().into_response()
    }
}

async fn register_member(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let member: Member = serde_json::from_slice(&body).map_err(|e| {
        error!(error = %e, "Failed to decode heartbeat JSON");
        ApiError::internal_error(format!("invalid heartbeat: {}", e))
    })?;

    debug!(cluster = %member.name, url = %member.url, "Heartbeat received");
    state.registry.register(member).await;
    Ok(StatusCode::OK)
}

async fn list_members(State(state): State<AppState>) -> Result<Response, ApiError> {
    let snapshot = state.registry.snapshot().await;

    let body = serde_json::to_vec(&snapshot.live).map_err(|e| {
        error!(error = %e, "Failed to encode JSON response");
        ApiError::internal_error("failed to encode listing")
    })?;

    debug!(
        live = snapshot.live.len(),
        evicted = snapshot.evicted.len(),
        "Served member listing"
    );
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    const TOKEN: &str = "test-token";

    fn setup() -> (Router, Arc<Registry>) {
        let registry = Arc::new(Registry::default());
        let app = create_router(AppState::new(registry.clone(), TOKEN));
        (app, registry)
    }

    fn request(method: Method, auth: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri("/");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    const HEARTBEAT: &str = r#"{"cluster":"uksouth-a","url":"https://a:6443","ca":"PEM"}"#;

    #[tokio::test]
    async fn test_heartbeat_registers_member() {
        let (app, registry) = setup();

        let response = app
            .oneshot(request(Method::POST, Some("Bearer test-token"), HEARTBEAT))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_bytes(response).await.is_empty());
        assert_eq!(registry.len().await, 1);
        assert!(registry.last_heartbeat("uksouth-a").await.is_some());
    }

    #[tokio::test]
    async fn test_token_scheme_accepted() {
        let (app, registry) = setup();

        let response = app
            .oneshot(request(Method::POST, Some("Token test-token"), HEARTBEAT))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_malformed_heartbeat_is_500() {
        let (app, registry) = setup();

        let response = app
            .oneshot(request(Method::POST, Some("Bearer test-token"), "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_heartbeat_without_token_is_401() {
        let (app, registry) = setup();

        let response = app
            .oneshot(request(Method::POST, None, HEARTBEAT))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_listing_requires_token() {
        let (app, registry) = setup();
        registry
            .register(Member::new("uksouth-a", "https://a:6443", "PEM"))
            .await;
        registry
            .register_at(
                Member::new("uksouth-stale", "https://s:6443", "PEM-S"),
                chrono::Utc::now() - chrono::Duration::minutes(10),
            )
            .await;

        for auth in [
            None,
            Some("Bearer wrong-token"),
            Some("test-token"),
            Some("Basic test-token"),
        ] {
            let response = app
                .clone()
                .oneshot(request(Method::GET, auth, ""))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "auth: {:?}", auth);
        }

        // Rejected listings must not evict anything
        assert_eq!(registry.len().await, 2);
        assert!(registry.last_heartbeat("uksouth-stale").await.is_some());
    }

    #[tokio::test]
    async fn test_listing_returns_live_members() {
        let (app, registry) = setup();
        registry
            .register(Member::new("uksouth-b", "https://b:6443", "PEM-B"))
            .await;
        registry
            .register_at(
                Member::new("uksouth-stale", "https://s:6443", "PEM-S"),
                chrono::Utc::now() - chrono::Duration::minutes(10),
            )
            .await;

        let response = app
            .oneshot(request(Method::GET, Some("Bearer test-token"), ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let members: Vec<Member> = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(members, vec![Member::new("uksouth-b", "https://b:6443", "PEM-B")]);

        // Listing evicted the stale member
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_empty_listing_is_empty_array() {
        let (app, _) = setup();

        let response = app
            .oneshot(request(Method::GET, Some("Bearer test-token"), ""))
            .await
            .unwrap();

        assert_eq!(body_bytes(response).await, b"[]");
    }

    #[tokio::test]
    async fn test_other_methods_are_405() {
        let (app, _) = setup();

        for method in [Method::PUT, Method::DELETE, Method::PATCH] {
            let response = app
                .clone()
                .oneshot(request(method.clone(), Some("Bearer test-token"), HEARTBEAT))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{}", method);
        }
    }

    #[tokio::test]
    async fn test_probes_need_no_token() {
        let (app, _) = setup();

        for uri in ["/livez", "/readyz"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    fn headers(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth.parse().unwrap());
        headers
    }

    #[test]
    fn test_authorized_compares_whole_token() {
        let state = AppState::new(Arc::new(Registry::default()), TOKEN);

        assert!(state.authorized(&headers("Bearer test-token")));
        assert!(state.authorized(&headers("token test-token")));
        assert!(!state.authorized(&headers("Bearer test-tokeo")));
        assert!(!state.authorized(&headers("Bearer test-token-longer")));
        assert!(!state.authorized(&headers("Bearer test")));
        assert!(!state.authorized(&headers("Bearer ")));
        assert!(!state.authorized(&HeaderMap::new()));
    }
}
