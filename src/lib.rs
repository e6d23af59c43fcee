pub mod config;
pub mod error;
pub mod fault;
pub mod gateway;
pub mod image;
pub mod metrics;
pub mod model;

use axum::{
    routing::{get, post},
    Router,
};
use gateway::{
    handle_generations, handle_health, handle_metrics, handle_root, handle_txt2img, AppState,
};
use std::sync::Arc;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route("/v1/images/generations", post(handle_generations))
        .route("/generate", post(handle_generations))
        .route("/sdapi/v1/txt2img", post(handle_txt2img))
        .with_state(state)
}
