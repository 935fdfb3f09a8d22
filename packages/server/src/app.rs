use axum::{
    http::{self, HeaderValue, Method},
    Router,
};
use log::warn;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{routes, state::AppState};

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origin);

    routes::create_routes(state).layer(cors).layer(
        TraceLayer::new_for_http().make_span_with(|request: &http::Request<_>| {
            tracing::info_span!(
                "HTTP request",
                method = %request.method(),
                uri = %request.uri(),
            )
        }),
    )
}

fn cors_layer(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([http::header::CONTENT_TYPE]);

    match client_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            warn!("Invalid CLIENT_ORIGIN {:?}: {}", client_origin, e);
            cors
        }
    }
}
