pub mod assets;
pub mod auth;
pub mod home;
pub mod messages;
pub mod users;
pub mod views;

use axum::extract::Request;
use axum::http::{header, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::flash;
use crate::state::AppState;

/// The full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/static/{*path}", get(assets::serve))
        .merge(auth::router())
        .merge(users::router())
        .merge(messages::router())
        .layer(middleware::from_fn(flash::consume))
        .layer(middleware::from_fn(no_cache))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Mark responses uncacheable unless the handler chose a policy.
async fn no_cache(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .entry(header::CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-cache, no-store, must-revalidate"));
    response
}
