//! Router for the rendezvous broker

use axum::routing::{get, post};
use axum::Router;

use crate::broker::{handlers, BrokerState};

pub fn router(state: BrokerState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route(
            "/sessions/:id",
            post(handlers::register_session)
                .get(handlers::lookup_session)
                .delete(handlers::release_session),
        )
        .with_state(state)
}
