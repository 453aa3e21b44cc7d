use axum::{Router, extract::DefaultBodyLimit};
use state::AppState;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod routes;

pub mod error;
pub mod state;

pub use axum;
pub use routes::health::HealthResponse;

pub fn construct_router(state: AppState) -> Router {
    Router::new()
        .nest("/health", routes::health::routes())
        .nest("/predict", routes::predict::routes())
        .with_state(state.clone())
        .layer(CorsLayer::permissive())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
}
