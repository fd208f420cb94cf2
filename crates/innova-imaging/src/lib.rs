//! Background removal by corner color sampling.
//!
//! The background color is estimated as the mean of the four corner pixels.
//! Every pixel whose Manhattan RGB distance to that color is below a
//! threshold becomes fully transparent; nothing else is touched. This works
//! for flat studio-style backdrops and nothing fancier.

pub mod background;
pub mod data_url;
pub mod error;

pub use background::{
    estimate_background, remove_background, remove_background_with_threshold, segment, BackgroundColorEstimate, DEFAULT_THRESHOLD,
};
pub use data_url::{decode_data_url, encode_png_data_url, remove_background_data_url};
pub use error::{SegmentationError, SegmentationResult};
