use axum::{
    extract::{Request, State},
    http::Uri,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::{
    handlers::{
        health_check,
        moods::{create_entry, delete_entry, list_entries, update_entry},
        users::{create_or_get_user, create_user, get_user_by_id, get_user_by_username},
    },
    middleware::with_http_layers,
    AppState,
};

/// Prefixes under which the v1 API is mounted. `/prod/api` mirrors `/api`
/// for deployments behind a `prod` stage path.
pub const API_PREFIXES: [&str; 2] = ["/api", "/prod/api"];

/// Version 1 routes, relative to an API prefix.
/// Collection routes answer with and without the trailing slash.
fn api_v1() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(health_check))
        // User endpoints
        .route("/v1/users", post(create_user).get(get_user_by_username))
        .route("/v1/users/", post(create_user).get(get_user_by_username))
        .route("/v1/users/create-or-get", post(create_or_get_user))
        .route("/v1/users/:id", get(get_user_by_id))
        // Mood entry endpoints
        .route("/v1/moods", get(list_entries))
        .route("/v1/moods/", get(list_entries))
        .route("/v1/moods/user/:user_id", post(create_entry))
        .route("/v1/moods/:id", put(update_entry).delete(delete_entry))
}

/// Create the Axum router with all endpoints, static files and middleware
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new();
    for prefix in API_PREFIXES {
        router = router.nest(prefix, api_v1());
    }

    with_http_layers(router.fallback(serve_static).with_state(state))
}

/// Serves files from the static directory for any path the API does not own.
/// `/prod/...` resolves to the same file as `/...`.
async fn serve_static(State(state): State<AppState>, request: Request) -> Response {
    let request = strip_prod_prefix(request);

    match ServeDir::new(&state.static_dir).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

fn strip_prod_prefix(mut request: Request) -> Request {
    let path = request.uri().path().to_owned();
    let stripped = match path.strip_prefix("/prod") {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => return request,
    };

    let path_and_query = match request.uri().query() {
        Some(query) => format!("{}?{}", stripped, query),
        None => stripped.to_string(),
    };

    if let Ok(uri) = path_and_query.parse::<Uri>() {
        *request.uri_mut() = uri;
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn path_after_strip(uri: &str) -> String {
        let request = axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        strip_prod_prefix(request).uri().to_string()
    }

    #[test]
    fn test_strip_prod_prefix() {
        assert_eq!(path_after_strip("/prod/index.html"), "/index.html");
        assert_eq!(path_after_strip("/prod"), "/");
        assert_eq!(path_after_strip("/prod/app.js?v=2"), "/app.js?v=2");
        assert_eq!(path_after_strip("/production.html"), "/production.html");
        assert_eq!(path_after_strip("/index.html"), "/index.html");
    }
}
