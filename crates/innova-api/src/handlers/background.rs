//! Image handlers.

use axum::Json;
use innova_imaging::{remove_background_data_url, BackgroundColorEstimate, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::metrics;

/// Largest meaningful threshold: the distance between black and white.
const MAX_THRESHOLD: u32 = 765;

#[derive(Debug, Deserialize)]
pub struct RemoveBackgroundRequest {
    /// `data:image/...;base64,` URL
    pub image: String,
    #[serde(default)]
    pub threshold: Option<u32>,
}

#[derive(Serialize)]
pub struct RemoveBackgroundResponse {
    pub success: bool,
    /// PNG data URL with the background made transparent
    pub image: String,
    pub background: BackgroundColor,
}

/// Mean corner color, unrounded, on a 0-255 scale per channel.
#[derive(Debug, Serialize)]
pub struct BackgroundColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl From<BackgroundColorEstimate> for BackgroundColor {
    fn from(estimate: BackgroundColorEstimate) -> Self {
        Self {
            r: estimate.r,
            g: estimate.g,
            b: estimate.b,
        }
    }
}

/// Make the dominant border color of an image transparent.
pub async fn remove_background(
    Json(request): Json<RemoveBackgroundRequest>,
) -> ApiResult<Json<RemoveBackgroundResponse>> {
    let threshold = request.threshold.unwrap_or(DEFAULT_THRESHOLD);
    if threshold > MAX_THRESHOLD {
        return Err(ApiError::bad_request(format!(
            "threshold must be at most {}",
            MAX_THRESHOLD
        )));
    }

    // Pixel work is CPU bound; keep it off the async workers.
    let result = tokio::task::spawn_blocking(move || {
        remove_background_data_url(&request.image, threshold)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Segmentation task failed: {}", e)))?;

    let (image, estimate) = match result {
        Ok(output) => {
            metrics::record_segmentation("ok");
            output
        }
        Err(e) => {
            metrics::record_segmentation("error");
            return Err(e.into());
        }
    };

    debug!(r = estimate.r, g = estimate.g, b = estimate.b, "Background removed");

    Ok(Json(RemoveBackgroundResponse {
        success: true,
        image,
        background: estimate.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_color_keeps_fraction() {
        let color = BackgroundColor::from(BackgroundColorEstimate {
            r: 254.75,
            g: 0.25,
            b: 128.5,
        });
        assert_eq!(
            serde_json::to_value(&color).unwrap(),
            serde_json::json!({"r": 254.75, "g": 0.25, "b": 128.5})
        );
    }
}
