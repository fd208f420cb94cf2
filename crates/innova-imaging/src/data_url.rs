//! `data:` URL handling for browser-sourced images.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::background::{remove_background_with_threshold, BackgroundColorEstimate};
use crate::error::{SegmentationError, SegmentationResult};

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Decode `data:<mime>;base64,<payload>` into raw bytes.
pub fn decode_data_url(url: &str) -> SegmentationResult<Vec<u8>> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| SegmentationError::InvalidDataUrl("missing data: scheme".to_string()))?;

    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| SegmentationError::InvalidDataUrl("missing payload".to_string()))?;

    let mut parts = meta.split(';');
    let mime = parts.next().unwrap_or_default();
    if !mime.is_empty() && !mime.starts_with("image/") {
        return Err(SegmentationError::InvalidDataUrl(format!(
            "unsupported media type {}",
            mime
        )));
    }
    if !parts.any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(SegmentationError::InvalidDataUrl(
            "payload is not base64".to_string(),
        ));
    }

    // Browsers never emit whitespace, but pasted URLs often wrap.
    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(STANDARD.decode(payload)?)
}

/// Encode PNG bytes as a `data:image/png;base64,` URL.
pub fn encode_png_data_url(png: &[u8]) -> String {
    format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(png))
}

/// Remove the background of a data-URL image, returning a PNG data URL.
pub fn remove_background_data_url(
    url: &str,
    threshold: u32,
) -> SegmentationResult<(String, BackgroundColorEstimate)> {
    let bytes = decode_data_url(url)?;
    let (png, background) = remove_background_with_threshold(&bytes, threshold)?;
    Ok((encode_png_data_url(&png), background))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::{encode_png, DEFAULT_THRESHOLD};
    use image::{Rgba, RgbaImage};

    fn sample_data_url() -> String {
        let mut img = RgbaImage::from_pixel(6, 4, Rgba([255, 255, 255, 255]));
        img.put_pixel(3, 2, Rgba([0, 0, 0, 255]));
        encode_png_data_url(&encode_png(img).unwrap())
    }

    #[test]
    fn test_round_trip_keeps_dimensions() {
        let (out, background) =
            remove_background_data_url(&sample_data_url(), DEFAULT_THRESHOLD).unwrap();
        assert!(out.starts_with(PNG_DATA_URL_PREFIX));
        assert_eq!(background.r, 255.0);

        let png = decode_data_url(&out).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (6, 4));
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(img.get_pixel(3, 2)[3], 255);
    }

    #[test]
    fn test_rejects_non_data_urls() {
        assert!(matches!(
            decode_data_url("https://example.com/cat.png"),
            Err(SegmentationError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            decode_data_url("data:image/png;base64"),
            Err(SegmentationError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            decode_data_url("data:text/plain;base64,aGVsbG8="),
            Err(SegmentationError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            decode_data_url("data:image/png,rawbytes"),
            Err(SegmentationError::InvalidDataUrl(_))
        ));
    }

    #[test]
    fn test_bad_base64() {
        assert!(matches!(
            decode_data_url("data:image/png;base64,@@@"),
            Err(SegmentationError::Base64(_))
        ));
    }

    #[test]
    fn test_payload_whitespace_is_ignored() {
        let url = "data:image/png;base64,aGVs\nbG8=";
        assert_eq!(decode_data_url(url).unwrap(), b"hello");
    }
}
