//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, CORS, panic recovery, limits,
//!   timeout, gate)
//! - Serve on a bound listener until shutdown is signalled

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{header, HeaderName, Method, Request},
    middleware::{from_fn, from_fn_with_state, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::PasswordHasher;
use crate::config::ForumConfig;
use crate::gate::RequestGate;
use crate::http::error::panic_response;
use crate::http::handlers::{auth, health, posts, users};
use crate::http::middleware::{auth_middleware, rate_limit_middleware};
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::mail::Mailer;
use crate::observability::metrics;
use crate::store::Store;

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    /// The admission gate (limiter, authenticator, identities, authz).
    pub gate: RequestGate,
    /// Persistence collaborator for handler I/O.
    pub store: Arc<dyn Store>,
    /// Deadline applied to every store call a handler makes.
    pub store_timeout: Duration,
    /// Derive client keys from forwarding headers.
    pub trust_forwarded_for: bool,
    /// Deployment environment name, reported by `/v1/health`.
    pub env: String,
    /// Hashes passwords of newly registered users.
    pub passwords: PasswordHasher,
    /// Delivers activation mails.
    pub mailer: Arc<dyn Mailer>,
    /// Lifetime of an activation token.
    pub activation_ttl: Duration,
    /// Base URL activation links point at.
    pub frontend_url: String,
}

/// HTTP server for the forum API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given state and configuration.
    pub fn new(state: AppState, config: &ForumConfig) -> Self {
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ForumConfig, state: AppState) -> Router {
        let protected = Router::new()
            .route("/posts", post(posts::create_post))
            .route(
                "/posts/{id}",
                get(posts::get_post)
                    .patch(posts::update_post)
                    .delete(posts::delete_post),
            )
            .route("/users/{id}", get(users::get_user))
            .route("/users/{id}/follow", put(users::follow_user))
            .route("/users/{id}/unfollow", put(users::unfollow_user))
            .route_layer(from_fn_with_state(state.clone(), auth_middleware));

        let public = Router::new()
            .route("/health", get(health::health))
            .route("/authentication/user", post(auth::register_user))
            .route("/authentication/token", post(auth::create_token))
            .route("/users/activate/{token}", put(users::activate_user));

        Router::new()
            .nest("/v1", public.merge(protected))
            .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
            .layer(from_fn(track_metrics))
            .with_state(state)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(cors_layer())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, without connect info.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal, draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Browser access from any http(s) origin, without credentials.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin, _| {
            let origin = origin.as_bytes();
            origin.starts_with(b"https://") || origin.starts_with(b"http://")
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .expose_headers([header::LINK])
        .max_age(Duration::from_secs(300))
}

/// Record request count and latency.
async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
