use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "mock-sd-v1";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    B64Json,
    Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    /// Number of images to produce.
    #[serde(default = "default_count")]
    pub n: u32,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: Option<f32>,
    #[serde(default = "default_steps")]
    pub num_inference_steps: Option<u32>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

fn default_count() -> u32 {
    1
}

fn default_dimension() -> u32 {
    1024
}

fn default_guidance_scale() -> Option<f32> {
    Some(7.5)
}

fn default_steps() -> Option<u32> {
    Some(50)
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            n: default_count(),
            width: default_dimension(),
            height: default_dimension(),
            model: None,
            seed: None,
            guidance_scale: default_guidance_scale(),
            num_inference_steps: default_steps(),
            response_format: ResponseFormat::default(),
        }
    }

    /// Checks the constraints serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.n == 0 {
            return Err("n must be at least 1".to_string());
        }
        Ok(())
    }

    /// Seed of the `index`-th image, if the caller pinned one.
    pub fn effective_seed(&self, index: u32) -> Option<i64> {
        self.seed.map(|seed| seed.wrapping_add(i64::from(index)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImagePayload {
    B64Json(String),
    Url(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    #[serde(flatten)]
    pub payload: ImagePayload,
    pub revised_prompt: String,
    pub seed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub created: i64,
    pub data: Vec<GeneratedImage>,
    pub model: String,
}

/// Automatic1111 `txt2img` reply shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Txt2ImgResponse {
    pub images: Vec<String>,
    pub parameters: serde_json::Value,
    pub info: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_request_takes_defaults() {
        let req: GenerationRequest = serde_json::from_value(json!({"prompt": "a cat"})).unwrap();
        assert_eq!(req.n, 1);
        assert_eq!((req.width, req.height), (1024, 1024));
        assert_eq!(req.guidance_scale, Some(7.5));
        assert_eq!(req.num_inference_steps, Some(50));
        assert_eq!(req.response_format, ResponseFormat::B64Json);
        assert!(req.seed.is_none());
        assert!(req.model.is_none());
    }

    #[test]
    fn missing_prompt_fails_to_parse() {
        let parsed = serde_json::from_value::<GenerationRequest>(json!({"n": 2}));
        assert!(parsed.is_err());
    }

    #[test]
    fn unknown_response_format_fails_to_parse() {
        let parsed = serde_json::from_value::<GenerationRequest>(
            json!({"prompt": "x", "response_format": "png"}),
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn zero_count_fails_validation() {
        let mut req = GenerationRequest::new("x");
        req.n = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn effective_seed_offsets_by_index() {
        let mut req = GenerationRequest::new("x");
        assert_eq!(req.effective_seed(3), None);
        req.seed = Some(7);
        assert_eq!(req.effective_seed(0), Some(7));
        assert_eq!(req.effective_seed(1), Some(8));
    }

    #[test]
    fn image_payload_is_flattened_into_item() {
        let item = GeneratedImage {
            payload: ImagePayload::Url("http://mock/images/1.png".to_string()),
            revised_prompt: "[mock] x".to_string(),
            seed: 3,
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({"url": "http://mock/images/1.png", "revised_prompt": "[mock] x", "seed": 3})
        );
    }
}
