use crate::config::MockConfig;
use crate::error::ApiError;
use crate::fault::{FaultPolicy, Outcome};
use crate::image;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::model::{
    GeneratedImage, GenerationRequest, GenerationResponse, ImagePayload, ResponseFormat,
    Txt2ImgResponse, DEFAULT_MODEL,
};
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Local, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

pub const SERVICE_TYPE: &str = "mock-image-backend";

pub const ENDPOINTS: [&str; 5] = [
    "/health",
    "/metrics",
    "/v1/images/generations",
    "/generate",
    "/sdapi/v1/txt2img",
];

// Defaults that differ for the A1111 body.
const TXT2IMG_DIMENSION: u32 = 512;
const TXT2IMG_UNSET_SEED: i64 = -1;

pub struct AppState {
    pub config: MockConfig,
    pub policy: FaultPolicy,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: MockConfig) -> Self {
        let policy = FaultPolicy::from_config(&config);
        Self {
            config,
            policy,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Runs one generation through the timeout, error and delay policies.
    pub async fn generate(&self, req: GenerationRequest) -> Result<GenerationResponse, ApiError> {
        let start = Instant::now();
        self.metrics.record_request();

        // Request-scoped so a pinned seed never leaks into other requests.
        let mut rng = StdRng::from_entropy();

        debug!(
            prompt = %req.prompt,
            n = req.n,
            width = req.width,
            height = req.height,
            seed = ?req.seed,
            guidance_scale = ?req.guidance_scale,
            steps = ?req.num_inference_steps,
            "Generation request"
        );

        match self.policy.decide(&mut rng) {
            Outcome::Timeout(hang) => {
                warn!(hang_secs = hang.as_secs(), "Simulating gateway timeout");
                sleep(hang).await;
                return Err(ApiError::Timeout);
            }
            Outcome::Error { status, message } => {
                self.metrics.record_failure();
                warn!(status = status.as_u16(), error = message, "Simulating backend error");
                return Err(ApiError::Simulated { status, message });
            }
            Outcome::Proceed(delay) => sleep(delay).await,
        }

        let data = match self.synthesize_all(&req, &mut rng) {
            Ok(data) => data,
            Err(e) => {
                self.metrics.record_failure();
                error!(
                    width = req.width,
                    height = req.height,
                    n = req.n,
                    "Image synthesis failed: {}",
                    e
                );
                return Err(e);
            }
        };

        let elapsed = start.elapsed();
        self.metrics.record_success(elapsed);

        info!(
            images = data.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Generation completed"
        );

        Ok(GenerationResponse {
            created: Utc::now().timestamp(),
            data,
            model: req.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    fn synthesize_all(
        &self,
        req: &GenerationRequest,
        rng: &mut StdRng,
    ) -> Result<Vec<GeneratedImage>, ApiError> {
        let mut data = Vec::new();
        data.try_reserve_exact(req.n as usize)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        for index in 0..req.n {
            data.push(self.synthesize(req, index, rng)?);
        }
        Ok(data)
    }

    fn synthesize(
        &self,
        req: &GenerationRequest,
        index: u32,
        rng: &mut StdRng,
    ) -> Result<GeneratedImage, ApiError> {
        let seed = req.effective_seed(index);

        let payload = match req.response_format {
            ResponseFormat::B64Json => {
                let b64 = image::mock_image_b64(req.width, req.height, seed, rng)
                    .map_err(|e| ApiError::Internal(e.to_string()))?;
                ImagePayload::B64Json(b64)
            }
            ResponseFormat::Url => {
                ImagePayload::Url(image::placeholder_url(&self.config.name, self.config.port))
            }
        };

        Ok(GeneratedImage {
            payload,
            revised_prompt: format!("[{}] {}", self.config.name, req.prompt),
            seed: seed.unwrap_or_else(|| i64::from(rng.gen::<u32>())),
        })
    }
}

pub async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "healthy": true,
        "name": state.config.name,
        "timestamp": Local::now(),
    }))
}

pub async fn handle_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

pub async fn handle_root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "name": state.config.name,
        "type": SERVICE_TYPE,
        "endpoints": ENDPOINTS,
    }))
}

/// Serves both `/v1/images/generations` and `/generate`.
pub async fn handle_generations(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let Json(req) = payload?;
    req.validate().map_err(ApiError::invalid)?;

    let resp = state.generate(req).await?;
    Ok(Json(resp))
}

pub async fn handle_txt2img(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Txt2ImgResponse>, ApiError> {
    // Parsed by hand so clients that omit the JSON content type are still served.
    let body: Value = serde_json::from_slice(&body).map_err(|e| ApiError::InvalidRequest {
        status: StatusCode::BAD_REQUEST,
        message: format!("Failed to parse the request body as JSON: {}", e),
    })?;
    let req = txt2img_request(&body);
    req.validate().map_err(ApiError::invalid)?;

    let resp = state.generate(req).await?;
    let info = serde_json::to_string(&resp).map_err(|e| ApiError::Internal(e.to_string()))?;

    let images = resp
        .data
        .into_iter()
        .map(|item| match item.payload {
            ImagePayload::B64Json(b64) => b64,
            ImagePayload::Url(_) => String::new(),
        })
        .collect();

    Ok(Json(Txt2ImgResponse {
        images,
        parameters: body,
        info,
    }))
}

/// Maps a loosely-typed A1111 body onto a generation request. Fields of the
/// wrong type fall back to their defaults.
pub fn txt2img_request(body: &Value) -> GenerationRequest {
    let uint = |key: &str, default: u32| {
        body.get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(default)
    };

    let mut req = GenerationRequest::new(body.get("prompt").and_then(Value::as_str).unwrap_or(""));
    req.negative_prompt = body
        .get("negative_prompt")
        .and_then(Value::as_str)
        .map(str::to_string);
    req.n = uint("batch_size", 1);
    req.width = uint("width", TXT2IMG_DIMENSION);
    req.height = uint("height", TXT2IMG_DIMENSION);
    req.seed = body
        .get("seed")
        .and_then(Value::as_i64)
        .filter(|seed| *seed != TXT2IMG_UNSET_SEED);
    if let Some(cfg_scale) = body.get("cfg_scale").and_then(Value::as_f64) {
        req.guidance_scale = Some(cfg_scale as f32);
    }
    if let Some(steps) = body.get("steps").and_then(Value::as_u64) {
        req.num_inference_steps = u32::try_from(steps).ok();
    }
    req
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txt2img_maps_a1111_fields() {
        let req = txt2img_request(&json!({
            "prompt": "x",
            "negative_prompt": "blurry",
            "batch_size": 3,
            "steps": 10,
            "cfg_scale": 5,
            "seed": 11,
            "width": 64,
        }));
        assert_eq!(req.prompt, "x");
        assert_eq!(req.negative_prompt.as_deref(), Some("blurry"));
        assert_eq!(req.n, 3);
        assert_eq!(req.num_inference_steps, Some(10));
        assert_eq!(req.guidance_scale, Some(5.0));
        assert_eq!(req.seed, Some(11));
        assert_eq!((req.width, req.height), (64, 512));
        assert_eq!(req.response_format, ResponseFormat::B64Json);
    }

    #[test]
    fn txt2img_sentinel_seed_means_unset() {
        let req = txt2img_request(&json!({"prompt": "x", "seed": -1}));
        assert_eq!(req.seed, None);
    }

    #[test]
    fn txt2img_tolerates_empty_and_mistyped_bodies() {
        let req = txt2img_request(&json!({"batch_size": "two", "prompt": 5}));
        assert_eq!(req.prompt, "");
        assert_eq!(req.n, 1);
        assert_eq!(req.guidance_scale, Some(7.5));
        assert_eq!(req.num_inference_steps, Some(50));
    }
}
