use std::sync::Arc;

use axum::{
    http::{
        header::{ALLOW, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    middleware::{from_fn_with_state, map_response},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::Authorizer;
use crate::config::SecurityConfig;
use crate::database::DrinkStore;
use crate::error::ApiError;
use crate::handlers::{self, drinks};
use crate::middleware::{require_permission, PermissionGuard};

/// Handles every route receives; nothing here is global
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DrinkStore>,
    pub authorizer: Arc<Authorizer>,
}

impl AppState {
    pub fn new(store: Arc<dyn DrinkStore>, authorizer: Arc<Authorizer>) -> Self {
        Self { store, authorizer }
    }
}

pub fn app(state: AppState, security: &SecurityConfig) -> Router {
    Router::new()
        // Public
        .route("/health", get(handlers::health))
        .merge(drink_routes(&state.authorizer))
        .fallback(not_found)
        // Global middleware
        .layer(map_response(method_not_allowed))
        .layer(cors_layer(security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn drink_routes(authorizer: &Arc<Authorizer>) -> Router<AppState> {
    Router::new()
        .route(
            "/drinks",
            get(drinks::list).merge(guarded(post(drinks::create), authorizer, "post:drinks")),
        )
        .route(
            "/drinks-detail",
            guarded(get(drinks::detail), authorizer, "get:drinks-detail"),
        )
        .route(
            "/drinks/:id",
            guarded(patch(drinks::update), authorizer, "patch:drinks").merge(guarded(
                delete(drinks::delete),
                authorizer,
                "delete:drinks",
            )),
        )
}

async fn not_found() -> ApiError {
    ApiError::not_found("resource not found")
}

/// The router answers unsupported methods with an empty 405; give it the
/// error envelope and keep its `Allow` header
async fn method_not_allowed(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }

    let allow = response.headers().get(ALLOW).cloned();
    let mut response = ApiError::method_not_allowed("method not allowed").into_response();
    if let Some(allow) = allow {
        response.headers_mut().insert(ALLOW, allow);
    }
    response
}

/// Wrap a method route so it only runs for tokens holding `permission`
fn guarded(
    route: MethodRouter<AppState>,
    authorizer: &Arc<Authorizer>,
    permission: &'static str,
) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(
        PermissionGuard::new(authorizer.clone(), permission),
        require_permission,
    ))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    if security.cors_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}
